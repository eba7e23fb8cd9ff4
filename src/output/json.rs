//! JSON output

use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::stats::TcpStats;

#[derive(Serialize)]
struct JsonReading<'a> {
    elapsed_ms: u64,
    #[serde(flatten)]
    stats: &'a TcpStats,
}

pub fn output_json(stats: &TcpStats) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_else(|_| "{}".to_string())
}

/// One compact JSON object per reading, for streaming output
pub fn output_json_line(elapsed_ms: u64, stats: &TcpStats) -> String {
    serde_json::to_string(&JsonReading { elapsed_ms, stats }).unwrap_or_else(|_| "{}".to_string())
}

pub fn save_json(stats: &TcpStats, path: &Path) -> anyhow::Result<()> {
    let json = output_json(stats);
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_flattens_stats() {
        let stats = TcpStats {
            is_valid: true,
            rtt_us: 420,
            cwnd_kib: Some(14),
            ..TcpStats::unavailable()
        };
        let line = output_json_line(1500, &stats);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["elapsed_ms"], 1500);
        assert_eq!(value["rtt_us"], 420);
        assert_eq!(value["cwnd_kib"], 14);
        assert!(value.get("mss").is_none());
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        save_json(&TcpStats::unavailable(), &path).unwrap();

        let parsed: TcpStats = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!parsed.is_valid);
        assert_eq!(parsed.rtt_us, 1);
    }
}
