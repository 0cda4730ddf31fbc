use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};

/// Wall-clock unix time in whole seconds.
pub fn unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Formats a unix timestamp as local `YYYY-MM-DD HH:MM:SS`.
/// Falls back to the raw number when the local zone cannot map it.
pub fn format_local(unix_secs: i64) -> String {
    match Local.timestamp_opt(unix_secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => unix_secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_format_shape() {
        let s = format_local(1_700_000_000);
        assert_eq!(s.len(), 19, "got {s}");
        assert_eq!(&s[4..5], "-");
        assert_eq!(&s[10..11], " ");
        assert_eq!(&s[13..14], ":");
    }

    #[test]
    fn unix_secs_is_after_2020() {
        assert!(unix_secs() > 1_577_836_800);
    }
}
