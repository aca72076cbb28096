//! Human-readable order numbers: `ORD-YYMMDDHHMMSS-XXXXXX`.
//!
//! The timestamp prefix keeps numbers sortable; the six-character random
//! suffix makes same-second collisions unlikely. The storage layer's UNIQUE
//! constraint is still the final guard and the caller retries on violation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const PREFIX: &str = "ORD";
const SUFFIX_LEN: usize = 6;

/// A fresh order number for `now`.
pub fn generate(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string().to_uppercase();
    format_number(now, &random[..SUFFIX_LEN])
}

pub fn format_number(now: DateTime<Utc>, suffix: &str) -> String {
    format!("{}-{}-{}", PREFIX, now.format("%y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_number(at, "A1B2C3"), "ORD-260309140507-A1B2C3");
    }

    #[test]
    fn test_generated_numbers_differ() {
        let now = Utc::now();
        let a = generate(now);
        let b = generate(now);
        assert_eq!(a.len(), "ORD-YYMMDDHHMMSS-XXXXXX".len());
        assert!(a.starts_with("ORD-"));
        assert_ne!(a, b);
    }
}
