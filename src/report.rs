use std::fmt::Write;

use crate::clock::format_local;
use crate::engine::history::History;
use crate::error::Result;
use crate::types::HistorySnapshot;

/// Returned instead of an empty report body.
pub const NO_DATA: &str = "no data";

const BANNER_BEGIN: &str = "===== BEGIN RUNTIME STATISTIC =====";
const BANNER_END: &str = "===== END RUNTIME STATISTIC =====";
const EPOCH_DELIMITER: &str = "----------------------------------------";

/// Human-readable report of every retained epoch, oldest first.
pub fn render_text(history: &History, duration_ms: u64) -> String {
    if history.is_empty() {
        return NO_DATA.to_string();
    }

    let mut out = String::with_capacity(256 + history.len() * 512);
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{BANNER_BEGIN}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "\tduration_ms:{}, samples:{}, dropped:{}",
        duration_ms,
        history.capacity(),
        history.dropped_count()
    );
    let _ = writeln!(out);

    for epoch in history.iter() {
        for (metric, s) in epoch.iter() {
            let _ = writeln!(out, "\tmetric:{metric}, start from:{}", format_local(s.start_time));
            let _ = writeln!(out, "\tmin:{}, max:{}, avg:{}", s.min, s.max, s.avg);
            let _ = writeln!(out, "\tcnt:{}, sum:{}, tps:{}", s.count, s.sum, s.throughput);
            let _ = writeln!(out, "\tp10:{}, p50:{}, p99:{}", s.p10, s.p50, s.p99);
            let _ = writeln!(out, "\tp999:{}", s.p999);
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "{EPOCH_DELIMITER}");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{BANNER_END}");
    out
}

pub fn render_json(snapshot: &HistorySnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Summary, SummarySet};

    fn summary(start_time: i64) -> Summary {
        Summary {
            start_time,
            duration_ms: 1_000,
            count: 4,
            sum: 10,
            avg: 2,
            min: 1,
            max: 4,
            p10: 1,
            p50: 3,
            p99: 4,
            p999: 4,
            throughput: 4,
        }
    }

    fn history_with(epochs: Vec<(i64, Vec<&str>)>, capacity: usize) -> History {
        let mut h = History::new(capacity);
        for (start, metrics) in epochs {
            let mut set = SummarySet::new(start, 1_000);
            for m in metrics {
                set.metrics.insert(m.to_string(), summary(start));
            }
            h.push(set);
        }
        h
    }

    #[test]
    fn empty_history_is_no_data() {
        assert_eq!(render_text(&History::new(1), 60_000), NO_DATA);
    }

    #[test]
    fn text_carries_every_field() {
        let h = history_with(vec![(1_700_000_000, vec!["metric-101"])], 1);
        let text = render_text(&h, 1_000);

        assert!(text.starts_with(BANNER_BEGIN));
        assert!(text.trim_end().ends_with(BANNER_END));
        assert!(text.contains("duration_ms:1000, samples:1, dropped:0"));
        assert!(text.contains("metric:metric-101, start from:"));
        assert!(text.contains(&format_local(1_700_000_000)));
        assert!(text.contains("min:1, max:4, avg:2"));
        assert!(text.contains("cnt:4, sum:10, tps:4"));
        assert!(text.contains("p10:1, p50:3, p99:4"));
        assert!(text.contains("p999:4"));
    }

    #[test]
    fn one_delimiter_per_epoch_and_one_block_per_metric() {
        let h = history_with(vec![(1, vec!["a", "b"]), (2, vec!["a"]), (3, vec!["c"])], 2);
        let text = render_text(&h, 1_000);
        assert_eq!(text.matches(EPOCH_DELIMITER).count(), 2);
        assert_eq!(text.matches("\tmetric:").count(), 2);
        assert!(text.contains("dropped:1"));
        // Oldest retained epoch first.
        let a = text.find("metric:a").unwrap();
        let c = text.find("metric:c").unwrap();
        assert!(a < c);
    }

    #[test]
    fn json_mirrors_snapshot() {
        let h = history_with(vec![(5, vec!["m"])], 3);
        let json = render_json(&h.snapshot(1_000)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["sample_count"], 3);
        assert_eq!(v["dropped_count"], 0);
        assert_eq!(v["epochs"][0]["metrics"]["m"]["p50"], 3);
        assert_eq!(v["epochs"][0]["start_time"], 5);
    }
}
