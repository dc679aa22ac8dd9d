//! Human-readable delay expressions ("2 hours", "30 min", "immediate").
//!
//! Parsing is fail-open: anything unrecognized becomes a zero delay so a
//! malformed expression never blocks delivery.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

static DELAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d)$").unwrap()
});

/// Parse a delay expression into a duration.
///
/// Case and surrounding whitespace are ignored. `immediate`, `now` and the
/// empty string are zero. Unrecognized input is also zero.
pub fn parse_delay(spec: &str) -> Duration {
    let normalized = spec.trim().to_lowercase();
    if normalized.is_empty() || normalized == "immediate" || normalized == "now" {
        return Duration::ZERO;
    }

    let Some(caps) = DELAY_RE.captures(&normalized) else {
        warn!(delay = %spec, "Unrecognized delay expression, sending immediately");
        return Duration::ZERO;
    };

    let Ok(amount) = caps[1].parse::<u64>() else {
        warn!(delay = %spec, "Delay amount out of range, sending immediately");
        return Duration::ZERO;
    };

    let unit_secs: u64 = match caps[2].chars().next() {
        Some('s') => 1,
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 24 * 60 * 60,
        _ => return Duration::ZERO,
    };

    Duration::from_secs(amount.saturating_mul(unit_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(spec: &str) -> u128 {
        parse_delay(spec).as_millis()
    }

    #[test]
    fn canonical_inputs() {
        assert_eq!(ms("2 hours"), 7_200_000);
        assert_eq!(ms("30 min"), 1_800_000);
        assert_eq!(ms("immediate"), 0);
        assert_eq!(ms("gibberish"), 0);
    }

    #[test]
    fn immediate_aliases() {
        assert_eq!(ms("now"), 0);
        assert_eq!(ms("  Immediate "), 0);
        assert_eq!(ms(""), 0);
    }

    #[test]
    fn unit_spellings() {
        assert_eq!(ms("1 second"), 1_000);
        assert_eq!(ms("45 secs"), 45_000);
        assert_eq!(ms("10s"), 10_000);
        assert_eq!(ms("5 minutes"), 300_000);
        assert_eq!(ms("5m"), 300_000);
        assert_eq!(ms("1 hour"), 3_600_000);
        assert_eq!(ms("3h"), 10_800_000);
        assert_eq!(ms("1 day"), 86_400_000);
        assert_eq!(ms("2 Days"), 172_800_000);
    }

    #[test]
    fn rejects_partial_matches() {
        assert_eq!(ms("in 2 hours"), 0);
        assert_eq!(ms("2 weeks"), 0);
        assert_eq!(ms("-5 minutes"), 0);
        assert_eq!(ms("two hours"), 0);
    }

    #[test]
    fn huge_amounts_do_not_overflow() {
        assert_eq!(ms("99999999999999999999999 days"), 0);
        assert!(parse_delay("18446744073709551615 days") > Duration::ZERO);
    }
}
