//! Platform capability selection
//!
//! Which TCP diagnostics facility a probe talks to is an explicit value
//! rather than a scatter of `cfg` checks. [`Platform::native`] resolves the
//! build target's facility; tests and the config file can pick any other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::stats::TcpStats;

/// TCP diagnostics facility available to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Platform {
    /// Linux-style `TCP_INFO` returning `struct tcp_info`
    TcpInfo(TcpInfoFields),
    /// Apple/BSD-style `TCP_CONNECTION_INFO` returning `struct tcp_connection_info`
    ConnectionInfo {
        #[serde(default)]
        flavor: ConnectionInfoFlavor,
    },
    /// No diagnostics facility; every query yields the fallback record
    Unsupported,
}

/// Optional members of `struct tcp_info` the target exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpInfoFields {
    /// `tcpi_snd_cwnd`
    pub snd_cwnd: bool,
    /// `tcpi_snd_mss`
    pub snd_mss: bool,
    /// `tcpi_unacked`, `tcpi_sacked`, `tcpi_lost` and `tcpi_retrans`
    pub inflight: bool,
}

impl Default for TcpInfoFields {
    fn default() -> Self {
        Self::all()
    }
}

impl TcpInfoFields {
    pub const fn all() -> Self {
        Self {
            snd_cwnd: true,
            snd_mss: true,
            inflight: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionInfoFlavor {
    /// `tcpi_snd_cwnd` is in bytes; no segment-count form
    #[default]
    Apple,
    /// `tcpi_snd_cwnd` is in segments
    Bsd,
}

/// What the `retransmits` field of a valid record counts.
///
/// The families disagree and are deliberately not reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetransmitCounter {
    /// `tcpi_total_retrans`: segments retransmitted over the connection's
    /// lifetime, as accounted by the Linux stack (DSACK duplicates included).
    TotalRetrans,
    /// `tcpi_txretransmitpackets`: raw count of retransmitted packets.
    TxRetransmitPackets,
}

impl Platform {
    /// The facility compiled in for the current target.
    pub const fn native() -> Self {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            Platform::TcpInfo(TcpInfoFields::all())
        }

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            Platform::ConnectionInfo {
                flavor: ConnectionInfoFlavor::Apple,
            }
        }

        #[cfg(not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "ios"
        )))]
        {
            Platform::Unsupported
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::TcpInfo(_) => "tcp_info",
            Platform::ConnectionInfo {
                flavor: ConnectionInfoFlavor::Apple,
            } => "tcp_connection_info (apple)",
            Platform::ConnectionInfo {
                flavor: ConnectionInfoFlavor::Bsd,
            } => "tcp_connection_info (bsd)",
            Platform::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Platform::Unsupported)
    }

    /// Whether valid records carry `packets_in_flight` and `bytes_in_flight_kib`.
    pub fn supports_inflight(&self) -> bool {
        matches!(self, Platform::TcpInfo(fields) if fields.inflight)
    }

    pub fn retransmit_counter(&self) -> Option<RetransmitCounter> {
        match self {
            Platform::TcpInfo(_) => Some(RetransmitCounter::TotalRetrans),
            Platform::ConnectionInfo { .. } => Some(RetransmitCounter::TxRetransmitPackets),
            Platform::Unsupported => None,
        }
    }

    /// Copy every field this platform can produce from `src` into `dst`.
    ///
    /// `src.is_valid` is not checked; an invalid record copies its sentinel
    /// state as-is. On an unsupported platform only `rtt_us` and `is_valid`
    /// are copied.
    pub fn copy_stats(&self, dst: &mut TcpStats, src: &TcpStats) {
        if !self.is_supported() {
            dst.rtt_us = src.rtt_us;
            dst.is_valid = src.is_valid;
            return;
        }

        dst.cwnd_kib = src.cwnd_kib;
        dst.cwnd_packets = src.cwnd_packets;
        dst.rtt_us = src.rtt_us;
        dst.rtt_var_us = src.rtt_var_us;
        dst.mss = src.mss;
        dst.retransmits = src.retransmits;
        dst.connect_time_ms = src.connect_time_ms;
        dst.is_valid = src.is_valid;
        if self.supports_inflight() {
            dst.packets_in_flight = src.packets_in_flight;
            dst.bytes_in_flight_kib = src.bytes_in_flight_kib;
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(Platform::native()),
            "tcp-info" | "tcp_info" | "linux" => Ok(Platform::TcpInfo(TcpInfoFields::all())),
            "apple" | "macos" => Ok(Platform::ConnectionInfo {
                flavor: ConnectionInfoFlavor::Apple,
            }),
            "bsd" => Ok(Platform::ConnectionInfo {
                flavor: ConnectionInfoFlavor::Bsd,
            }),
            "unsupported" | "none" => Ok(Platform::Unsupported),
            _ => Err(format!(
                "Invalid platform '{}'. Use native, tcp-info, apple, bsd, or unsupported",
                s
            )),
        }
    }
}
