//! Strips the bracketed timestamp prefix from raw log lines.
//!
//! Every line the game client writes starts with
//! `[Weekday Mon DD HH:MM:SS YYYY] `. The embedded time is discarded;
//! lines are stamped with the wall-clock time they were read instead.

use std::sync::OnceLock;

use regex::Regex;

/// Length of `[Mon Jan 01 00:00:01 2024] `, including the trailing space.
pub const TIMESTAMP_PREFIX_LEN: usize = 27;

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[[A-Z][a-z]{2} [A-Z][a-z]{2} [ 0-9][0-9] [0-9]{2}:[0-9]{2}:[0-9]{2} [0-9]{4}\] ")
            .expect("timestamp prefix pattern is valid")
    })
}

/// Return the message text of `line` with the timestamp prefix removed.
///
/// Lines that don't carry the expected prefix come back unmodified.
pub fn strip_timestamp(line: &str) -> &str {
    if line.len() >= TIMESTAMP_PREFIX_LEN && prefix_pattern().is_match(line) {
        &line[TIMESTAMP_PREFIX_LEN..]
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix() {
        assert_eq!(
            strip_timestamp("[Mon Jan 01 00:00:01 2024] Your Location is 100.00, 200.00, 0.00"),
            "Your Location is 100.00, 200.00, 0.00"
        );
    }

    #[test]
    fn keeps_text_after_prefix_verbatim() {
        assert_eq!(
            strip_timestamp("[Sat Feb 17 23:59:59 2001]   spaced  "),
            "  spaced  "
        );
        assert_eq!(strip_timestamp("[Sat Feb 17 23:59:59 2001] "), "");
    }

    #[test]
    fn unmatched_lines_pass_through() {
        assert_eq!(strip_timestamp(""), "");
        assert_eq!(strip_timestamp("no timestamp here"), "no timestamp here");
        assert_eq!(strip_timestamp("[Mon Jan 01 00:00:01 2024]"), "[Mon Jan 01 00:00:01 2024]");
        assert_eq!(
            strip_timestamp("[mon jan 01 00:00:01 2024] lower"),
            "[mon jan 01 00:00:01 2024] lower"
        );
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let line = "ÄÖÜ short";
        assert_eq!(strip_timestamp(line), line);
        let long = "ÄÖÜÄÖÜÄÖÜÄÖÜÄÖÜÄÖÜÄÖÜ and more text";
        assert_eq!(strip_timestamp(long), long);
    }
}
