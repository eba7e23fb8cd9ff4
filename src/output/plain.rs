//! Plain text output
//!
//! Invalid records and fields a platform cannot measure print as `N/A`.

use crate::stats::TcpStats;

const NOT_AVAILABLE: &str = "N/A";

fn or_na<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{}{}", v, unit),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn output_plain(stats: &TcpStats) -> String {
    let mut output = String::new();

    output.push_str("  TCP Info:\n");
    if let Some(connect_ms) = stats.connect_time_ms {
        output.push_str(&format!("    Connect:     {:.2}ms\n", connect_ms));
    }

    let Some(rtt_ms) = stats.rtt_ms() else {
        output.push_str(&format!("    {}\n", NOT_AVAILABLE));
        return output;
    };

    output.push_str(&format!("    Retransmits: {}\n", stats.retransmits));
    output.push_str(&format!("    RTT:         {:.2}ms\n", rtt_ms));
    output.push_str(&format!(
        "    RTT Var:     {:.2}ms\n",
        stats.rtt_var_us as f64 / 1000.0
    ));
    output.push_str(&format!(
        "    Cwnd:        {} ({})\n",
        or_na(stats.cwnd_kib, " KB"),
        or_na(stats.cwnd_packets, " pkts")
    ));
    output.push_str(&format!("    MSS:         {}\n", or_na(stats.mss, "")));
    if let Some(packets) = stats.packets_in_flight {
        output.push_str(&format!(
            "    In Flight:   {} pkts / {}\n",
            packets,
            or_na(stats.bytes_in_flight_kib, " KB")
        ));
    }

    output
}

/// One line per reading: `[  1.0s] rtt ... cwnd ... rtx ...`
pub fn output_interval(elapsed_secs: f64, stats: &TcpStats) -> String {
    let Some(rtt_ms) = stats.rtt_ms() else {
        return format!("[{:6.1}s] tcp stats {}", elapsed_secs, NOT_AVAILABLE);
    };

    let mut line = format!(
        "[{:6.1}s] rtt {:.2}ms  rttvar {:.2}ms  cwnd {}  rtx {}",
        elapsed_secs,
        rtt_ms,
        stats.rtt_var_us as f64 / 1000.0,
        or_na(stats.cwnd_kib, " KB"),
        stats.retransmits
    );
    if let Some(packets) = stats.packets_in_flight {
        line.push_str(&format!("  inflight {}", packets));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_stats() -> TcpStats {
        TcpStats {
            is_valid: true,
            rtt_us: 1250,
            rtt_var_us: 500,
            cwnd_packets: None,
            cwnd_kib: Some(64),
            retransmits: 2,
            mss: Some(1448),
            packets_in_flight: None,
            bytes_in_flight_kib: None,
            connect_time_ms: None,
        }
    }

    #[test]
    fn test_plain_invalid_shows_na() {
        let output = output_plain(&TcpStats::unavailable().with_connect_time_ms(0.5));
        assert!(output.contains("Connect:     0.50ms"));
        assert!(output.contains("N/A"));
        assert!(!output.contains("RTT"));
    }

    #[test]
    fn test_plain_absent_packet_count() {
        let output = output_plain(&valid_stats());
        assert!(output.contains("RTT:         1.25ms"));
        assert!(output.contains("Cwnd:        64 KB (N/A)"));
        assert!(output.contains("MSS:         1448"));
        assert!(!output.contains("In Flight"));
    }

    #[test]
    fn test_interval_line() {
        let stats = TcpStats {
            packets_in_flight: Some(18),
            ..valid_stats()
        };
        assert_eq!(
            output_interval(1.0, &stats),
            "[   1.0s] rtt 1.25ms  rttvar 0.50ms  cwnd 64 KB  rtx 2  inflight 18"
        );
        assert_eq!(
            output_interval(2.0, &TcpStats::unavailable()),
            "[   2.0s] tcp stats N/A"
        );
    }

    #[test]
    fn test_invalid_record_hides_rtt() {
        let stats = TcpStats {
            rtt_us: 5000,
            ..TcpStats::unavailable()
        };
        assert_eq!(output_interval(3.0, &stats), "[   3.0s] tcp stats N/A");
        assert!(!output_plain(&stats).contains("5.00ms"));
    }
}
