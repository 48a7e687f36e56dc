//! Live message formatting.

use chrono::NaiveTime;

/// Build the tagged line `(HH:MM:SS) <identity>: <words joined by spaces>`.
///
/// The result is stored verbatim in the log; replays never re-stamp it.
pub fn format_message(clock: NaiveTime, identity: &str, words: &[String]) -> String {
    format!("({}) {}: {}", clock.format("%H:%M:%S"), identity, words.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_tag_and_joins_words() {
        let clock = NaiveTime::from_hms_opt(9, 5, 3).unwrap();
        let words = vec!["UGA".to_string(), "CS".to_string(), "Rocks".to_string()];
        assert_eq!(format_message(clock, "alice", &words), "(09:05:03) alice: UGA CS Rocks");
    }
}
