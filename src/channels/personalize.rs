//! `{{placeholder}}` substitution from contact records.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::workflow::Contact;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap());

/// Replace every `{{field}}` whose name is a field on `contact` with a
/// non-empty value. Unknown or empty placeholders are left verbatim.
pub fn personalize(template: &str, contact: &Contact) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match contact.field(&caps[1]) {
            Some(value) => value.into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
