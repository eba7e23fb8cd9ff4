//! Normalized TCP statistics record
//!
//! [`TcpStats`] is the single platform-independent shape that every probe
//! fills. Fields a platform cannot measure are `None` rather than zero, so a
//! consumer can tell "not measurable here" apart from a genuine zero.

use serde::{Deserialize, Serialize};

/// RTT value carried by a record that holds no kernel data.
pub const UNAVAILABLE_RTT_US: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpStats {
    /// Whether this reading reflects real kernel data
    pub is_valid: bool,

    /// Smoothed round-trip time in microseconds
    pub rtt_us: u64,

    /// RTT variance, in the unit the platform reports it
    pub rtt_var_us: u64,

    /// Congestion window in segments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwnd_packets: Option<u32>,

    /// Congestion window in KiB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwnd_kib: Option<u64>,

    /// Cumulative retransmit counter. See [`crate::platform::RetransmitCounter`]
    /// for what each platform actually counts.
    pub retransmits: u64,

    /// Negotiated maximum segment size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mss: Option<u32>,

    /// Segments sent, not yet acked, not SACKed and not marked lost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets_in_flight: Option<i64>,

    /// `packets_in_flight * mss / 1024`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_in_flight_kib: Option<i64>,

    /// Connection establishment time, recorded by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_time_ms: Option<f64>,
}

impl Default for TcpStats {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl TcpStats {
    /// A record carrying no kernel data.
    pub fn unavailable() -> Self {
        Self {
            is_valid: false,
            rtt_us: UNAVAILABLE_RTT_US,
            rtt_var_us: 0,
            cwnd_packets: None,
            cwnd_kib: None,
            retransmits: 0,
            mss: None,
            packets_in_flight: None,
            bytes_in_flight_kib: None,
            connect_time_ms: None,
        }
    }

    /// Reset every kernel-derived field to the fallback state.
    ///
    /// `connect_time_ms` belongs to the caller and is left alone.
    pub fn mark_unavailable(&mut self) {
        let connect_time_ms = self.connect_time_ms;
        *self = Self {
            connect_time_ms,
            ..Self::unavailable()
        };
    }

    /// Builder-style setter for the caller-owned connect time.
    pub fn with_connect_time_ms(mut self, connect_time_ms: f64) -> Self {
        self.connect_time_ms = Some(connect_time_ms);
        self
    }

    /// RTT in milliseconds, or `None` when the record is invalid.
    pub fn rtt_ms(&self) -> Option<f64> {
        self.is_valid.then(|| self.rtt_us as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_sentinel() {
        let stats = TcpStats::unavailable();
        assert!(!stats.is_valid);
        assert_eq!(stats.rtt_us, 1);
        assert_eq!(stats.cwnd_packets, None);
        assert_eq!(stats.mss, None);
        assert_eq!(stats.rtt_ms(), None);
    }

    #[test]
    fn test_default_is_unavailable() {
        assert_eq!(TcpStats::default(), TcpStats::unavailable());
    }

    #[test]
    fn test_mark_unavailable_keeps_connect_time() {
        let mut stats = TcpStats {
            is_valid: true,
            rtt_us: 250,
            rtt_var_us: 40,
            cwnd_packets: Some(10),
            cwnd_kib: Some(14),
            retransmits: 3,
            mss: Some(1460),
            packets_in_flight: Some(4),
            bytes_in_flight_kib: Some(5),
            connect_time_ms: Some(1.25),
        };

        stats.mark_unavailable();

        assert!(!stats.is_valid);
        assert_eq!(stats.rtt_us, UNAVAILABLE_RTT_US);
        assert_eq!(stats.cwnd_kib, None);
        assert_eq!(stats.retransmits, 0);
        assert_eq!(stats.packets_in_flight, None);
        assert_eq!(stats.connect_time_ms, Some(1.25));
    }

    #[test]
    fn test_absent_fields_skipped_in_json() {
        let stats = TcpStats::unavailable();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"is_valid\":false"));
        assert!(json.contains("\"rtt_us\":1"));
        assert!(!json.contains("cwnd_packets"));
        assert!(!json.contains("connect_time_ms"));

        let parsed: TcpStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }

    #[test]
    fn test_rtt_ms() {
        let stats = TcpStats {
            is_valid: true,
            rtt_us: 1500,
            ..TcpStats::unavailable()
        };
        assert_eq!(stats.rtt_ms(), Some(1.5));
    }
}
