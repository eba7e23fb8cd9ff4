//! tcpstats - Portable TCP congestion telemetry
//!
//! Reads the kernel's per-connection TCP diagnostics (`tcp_info` on Linux,
//! `tcp_connection_info` on macOS/BSD) and normalizes them into a single
//! [`TcpStats`] record for bandwidth testing tools.
//!
//! # Library Usage
//!
//! ```ignore
//! use tcpstats::{TcpStats, TcpStatsProbe};
//! use std::net::TcpStream;
//!
//! let stream = TcpStream::connect("192.168.1.1:5201")?;
//! let probe = TcpStatsProbe::native();
//!
//! let mut stats = TcpStats::default();
//! probe.query_socket(&stream, &mut stats);
//! if stats.is_valid {
//!     println!("rtt {}us cwnd {:?} KiB", stats.rtt_us, stats.cwnd_kib);
//! }
//! ```
//!
//! # Modules
//!
//! - [`tcp_info`] - Telemetry query against the kernel
//! - [`platform`] - Diagnostics facility selection and snapshot copy
//! - [`stats`] - The normalized record
//! - [`tcp`] - Connection helpers for live sampling
//! - [`output`] - Plain and JSON rendering
//! - [`config`] - Config file support

pub mod config;
pub mod output;
pub mod platform;
pub mod stats;
pub mod tcp;
pub mod tcp_info;

pub use platform::{ConnectionInfoFlavor, Platform, RetransmitCounter, TcpInfoFields};
pub use stats::TcpStats;
pub use tcp_info::{SocketHandle, SystemSource, TcpInfoSource, TcpStatsProbe};
