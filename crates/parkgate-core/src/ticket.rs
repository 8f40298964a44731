//! # Offline Ticket Numbers
//!
//! Format of ticket numbers issued while the server is unreachable.
//!
//! ```text
//!   OFF 0007
//!   ─┬─ ──┬─
//!    │    └── sequence, zero-padded to at least 4 digits (grows past 9999)
//!    └─────── prefix marking a locally issued ticket
//!
//!   OFF 20240301083000
//!       ──────┬───────
//!             └── older clients: local time of issue (yyyymmddHHMMSS),
//!                 still an offline ticket but outside the sequence
//! ```
//!
//! The sequence itself is allocated and persisted by the store layer; this
//! module only spells and parses it.

use chrono::NaiveDateTime;

/// Prefix of every locally issued ticket number.
pub const OFFLINE_PREFIX: &str = "OFF";

/// Minimum number of sequence digits.
pub const SEQUENCE_WIDTH: usize = 4;

const TIMESTAMP_DIGITS: usize = 14;

/// Formats an offline ticket number for a sequence value.
pub fn format_offline_ticket(sequence: u64) -> String {
    format!("{}{:0width$}", OFFLINE_PREFIX, sequence, width = SEQUENCE_WIDTH)
}

fn offline_digits(ticket: &str) -> Option<&str> {
    let digits = ticket.strip_prefix(OFFLINE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

fn is_timestamp_digits(digits: &str) -> bool {
    digits.len() == TIMESTAMP_DIGITS
        && NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").is_ok()
}

/// Extracts the sequence from an offline ticket number.
///
/// Returns `None` for server-issued numbers, for timestamp-style numbers
/// and for anything that is not `OFF` followed only by digits.
pub fn parse_offline_sequence(ticket: &str) -> Option<u64> {
    let digits = offline_digits(ticket)?;
    if is_timestamp_digits(digits) {
        return None;
    }
    digits.parse().ok()
}

/// True for timestamp-style offline numbers written by older clients.
pub fn is_timestamp_ticket(ticket: &str) -> bool {
    offline_digits(ticket).is_some_and(is_timestamp_digits)
}

/// True when the ticket number was issued locally, in either style.
pub fn is_offline_ticket(ticket: &str) -> bool {
    offline_digits(ticket).is_some()
}

/// Highest offline sequence among the given ticket numbers.
pub fn highest_offline_sequence<'a, I>(tickets: I) -> Option<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    tickets.into_iter().filter_map(parse_offline_sequence).max()
}

/// Highest offline sequence mentioned anywhere in `text`.
///
/// Used on files that no longer parse, so only the `OFF<digits>` tokens
/// themselves are trusted.
pub fn scan_offline_sequences(text: &str) -> Option<u64> {
    let mut highest = None;
    let mut rest = text;

    while let Some(at) = rest.find(OFFLINE_PREFIX) {
        let tail = &rest[at + OFFLINE_PREFIX.len()..];
        let len = tail.bytes().take_while(u8::is_ascii_digit).count();
        let preceded_by_word = rest[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric());

        if len > 0 && !preceded_by_word {
            let token = &rest[at..at + OFFLINE_PREFIX.len() + len];
            if let Some(seq) = parse_offline_sequence(token) {
                highest = highest.max(Some(seq));
            }
        }
        rest = &tail[len..];
    }

    highest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_width() {
        assert_eq!(format_offline_ticket(1), "OFF0001");
        assert_eq!(format_offline_ticket(42), "OFF0042");
        assert_eq!(format_offline_ticket(9999), "OFF9999");
        assert_eq!(format_offline_ticket(12345), "OFF12345");
    }

    #[test]
    fn test_parse_round_trip() {
        for seq in [1, 7, 100, 10_000] {
            assert_eq!(parse_offline_sequence(&format_offline_ticket(seq)), Some(seq));
        }
    }

    #[test]
    fn test_parse_rejects_foreign_numbers() {
        assert_eq!(parse_offline_sequence("TKT-000123"), None);
        assert_eq!(parse_offline_sequence("OFF"), None);
        assert_eq!(parse_offline_sequence("OFF12a"), None);
        assert_eq!(parse_offline_sequence("off0001"), None);
        assert!(!is_offline_ticket("TKT-1"));
    }

    #[test]
    fn test_timestamp_tickets_are_offline_but_not_sequenced() {
        assert!(is_offline_ticket("OFF20240301083000"));
        assert!(is_timestamp_ticket("OFF20240301083000"));
        assert_eq!(parse_offline_sequence("OFF20240301083000"), None);

        // 14 digits that are not a date stay a sequence.
        assert!(!is_timestamp_ticket("OFF99999999999999"));
        assert_eq!(
            parse_offline_sequence("OFF99999999999999"),
            Some(99_999_999_999_999)
        );
    }

    #[test]
    fn test_highest_sequence() {
        let tickets = ["OFF0003", "TKT-99", "OFF0010", "OFF0002", "OFF20240301083000"];
        assert_eq!(highest_offline_sequence(tickets), Some(10));
        assert_eq!(highest_offline_sequence(["TKT-1"]), None);
    }

    #[test]
    fn test_scan_truncated_text() {
        let text = r#"[{"plat": "B1", "ticket_number": "OFF0041"},
            {"plat": "KOFF9", "ticket_number": "OFF0012"},
            {"ticket_number": "OFF20240301083000"}, {"ticket_number": "OFF00"#;
        assert_eq!(scan_offline_sequences(text), Some(41));
        assert_eq!(scan_offline_sequences("no tickets here"), None);
    }
}
