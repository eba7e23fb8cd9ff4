//! TCP_INFO extraction for Linux, macOS and BSD
//!
//! Reads the kernel's per-connection diagnostics block and normalizes it into
//! a [`TcpStats`] record. The facility to use is a [`Platform`] value and the
//! system call sits behind [`TcpInfoSource`], so every branch can run against
//! canned kernel structs in tests.
//!
//! A query never fails. When no data can be read (unsupported platform,
//! invalid handle, `getsockopt` error) the record is marked unavailable:
//! `is_valid = false` and `rtt_us = 1`.

use std::ffi::c_int;
use std::io;

use tracing::{debug, trace};

use crate::platform::{ConnectionInfoFlavor, Platform, TcpInfoFields};
use crate::stats::TcpStats;

/// OS socket handle. Values `<= 0`, or too large for a C `int`, carry no data.
pub type SocketHandle = i64;

/// `struct tcp_info` up to `tcpi_total_retrans`.
///
/// The kernel copies `min(len, sizeof)` bytes, so the prefix is enough and
/// works on every kernel since 2.6.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpInfo {
    pub tcpi_state: u8,
    pub tcpi_ca_state: u8,
    pub tcpi_retransmits: u8,
    pub tcpi_probes: u8,
    pub tcpi_backoff: u8,
    pub tcpi_options: u8,
    /// `tcpi_snd_wscale : 4, tcpi_rcv_wscale : 4`
    pub tcpi_wscale: u8,
    /// `tcpi_delivery_rate_app_limited : 1, tcpi_fastopen_client_fail : 2`
    pub tcpi_app_limited_bits: u8,

    pub tcpi_rto: u32,
    pub tcpi_ato: u32,
    pub tcpi_snd_mss: u32,
    pub tcpi_rcv_mss: u32,

    pub tcpi_unacked: u32,
    pub tcpi_sacked: u32,
    pub tcpi_lost: u32,
    pub tcpi_retrans: u32,
    pub tcpi_fackets: u32,

    pub tcpi_last_data_sent: u32,
    pub tcpi_last_ack_sent: u32,
    pub tcpi_last_data_recv: u32,
    pub tcpi_last_ack_recv: u32,

    pub tcpi_pmtu: u32,
    pub tcpi_rcv_ssthresh: u32,
    pub tcpi_rtt: u32,
    pub tcpi_rttvar: u32,
    pub tcpi_snd_ssthresh: u32,
    pub tcpi_snd_cwnd: u32,
    pub tcpi_advmss: u32,
    pub tcpi_reordering: u32,

    pub tcpi_rcv_rtt: u32,
    pub tcpi_rcv_space: u32,

    pub tcpi_total_retrans: u32,
}

/// `struct tcp_connection_info` as returned by `TCP_CONNECTION_INFO`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnectionInfo {
    pub tcpi_state: u8,
    pub tcpi_snd_wscale: u8,
    pub tcpi_rcv_wscale: u8,
    pub __pad1: u8,
    pub tcpi_options: u32,
    pub tcpi_flags: u32,
    pub tcpi_rto: u32,
    pub tcpi_maxseg: u32,
    pub tcpi_snd_ssthresh: u32,
    pub tcpi_snd_cwnd: u32,
    pub tcpi_snd_wnd: u32,
    pub tcpi_snd_sbbytes: u32,
    pub tcpi_rcv_wnd: u32,
    /// Milliseconds
    pub tcpi_rttcur: u32,
    pub tcpi_srtt: u32,
    pub tcpi_rttvar: u32,
    /// TFO status bitfield word
    pub tcpi_tfo_bits: u32,
    pub tcpi_txpackets: u64,
    pub tcpi_txbytes: u64,
    pub tcpi_txretransmitbytes: u64,
    pub tcpi_rxpackets: u64,
    pub tcpi_rxbytes: u64,
    pub tcpi_rxoutoforderbytes: u64,
    pub tcpi_txretransmitpackets: u64,
}

/// Access to the kernel's TCP diagnostics for a socket descriptor.
pub trait TcpInfoSource {
    /// `getsockopt(fd, IPPROTO_TCP, TCP_INFO)`
    fn tcp_info(&self, fd: c_int) -> io::Result<TcpInfo>;

    /// `getsockopt(fd, IPPROTO_TCP, TCP_CONNECTION_INFO)`
    fn connection_info(&self, fd: c_int) -> io::Result<TcpConnectionInfo>;
}

/// [`TcpInfoSource`] backed by the running kernel.
///
/// Facilities the target does not have fail with [`io::ErrorKind::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSource;

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
))]
fn getsockopt_tcp<T: Default>(fd: c_int, option: c_int) -> io::Result<T> {
    let mut value = T::default();
    let mut len = std::mem::size_of::<T>() as libc::socklen_t;

    // Only instantiated with the repr(C) integer structs above.
    let ret = unsafe {
        libc::getsockopt(
            fd,
            libc::IPPROTO_TCP,
            option,
            &mut value as *mut T as *mut libc::c_void,
            &mut len,
        )
    };

    if ret == 0 {
        Ok(value)
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
const TCP_CONNECTION_INFO: c_int = 0x106;

fn unsupported(option: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} is not available on this platform", option),
    )
}

impl TcpInfoSource for SystemSource {
    fn tcp_info(&self, fd: c_int) -> io::Result<TcpInfo> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            getsockopt_tcp(fd, libc::TCP_INFO)
        }

        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        {
            let _ = fd;
            Err(unsupported("TCP_INFO"))
        }
    }

    fn connection_info(&self, fd: c_int) -> io::Result<TcpConnectionInfo> {
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            getsockopt_tcp(fd, TCP_CONNECTION_INFO)
        }

        #[cfg(not(any(target_os = "macos", target_os = "ios")))]
        {
            let _ = fd;
            Err(unsupported("TCP_CONNECTION_INFO"))
        }
    }
}

/// Fill `out` from a Linux `tcp_info` block.
///
/// RTT and variance are already microseconds. In-flight values are computed
/// in signed arithmetic and only when the counters are exposed; the byte form
/// additionally needs `tcpi_snd_mss`.
pub fn normalize_tcp_info(info: &TcpInfo, fields: TcpInfoFields, out: &mut TcpStats) {
    let cwnd = u64::from(info.tcpi_snd_cwnd);
    let mss = u64::from(info.tcpi_snd_mss);

    out.cwnd_packets = fields.snd_cwnd.then_some(info.tcpi_snd_cwnd);
    out.cwnd_kib = (fields.snd_cwnd && fields.snd_mss).then(|| cwnd * mss / 1024);
    out.rtt_us = u64::from(info.tcpi_rtt);
    out.rtt_var_us = u64::from(info.tcpi_rttvar);
    out.retransmits = u64::from(info.tcpi_total_retrans);
    out.mss = fields.snd_mss.then_some(info.tcpi_snd_mss);

    if fields.inflight {
        let packets = i64::from(info.tcpi_unacked) - i64::from(info.tcpi_sacked)
            - i64::from(info.tcpi_lost)
            + i64::from(info.tcpi_retrans);
        out.packets_in_flight = Some(packets);
        out.bytes_in_flight_kib = fields
            .snd_mss
            .then(|| packets * i64::from(info.tcpi_snd_mss) / 1024);
    } else {
        out.packets_in_flight = None;
        out.bytes_in_flight_kib = None;
    }

    out.is_valid = true;
}

/// Fill `out` from an Apple/BSD `tcp_connection_info` block.
///
/// Apple reports `tcpi_snd_cwnd` in bytes, other BSDs in segments.
/// `tcpi_rttcur` is milliseconds; `tcpi_rttvar` is copied unconverted.
pub fn normalize_connection_info(
    info: &TcpConnectionInfo,
    flavor: ConnectionInfoFlavor,
    out: &mut TcpStats,
) {
    let cwnd = u64::from(info.tcpi_snd_cwnd);

    match flavor {
        ConnectionInfoFlavor::Apple => {
            out.cwnd_kib = Some(cwnd / 1024);
            out.cwnd_packets = None;
        }
        ConnectionInfoFlavor::Bsd => {
            out.cwnd_kib = Some(cwnd * u64::from(info.tcpi_maxseg) / 1024);
            out.cwnd_packets = Some(info.tcpi_snd_cwnd);
        }
    }

    out.rtt_us = u64::from(info.tcpi_rttcur) * 1000;
    out.rtt_var_us = u64::from(info.tcpi_rttvar);
    out.retransmits = info.tcpi_txretransmitpackets;
    out.mss = Some(info.tcpi_maxseg);
    out.packets_in_flight = None;
    out.bytes_in_flight_kib = None;
    out.is_valid = true;
}

fn raw_fd(handle: SocketHandle) -> Option<c_int> {
    if handle <= 0 {
        return None;
    }
    c_int::try_from(handle).ok()
}

/// Telemetry probe: a platform facility plus the source that reads it.
#[derive(Debug, Clone)]
pub struct TcpStatsProbe<S = SystemSource> {
    platform: Platform,
    source: S,
}

impl TcpStatsProbe<SystemSource> {
    /// Probe for the facility compiled into this target.
    pub fn native() -> Self {
        Self::new(Platform::native())
    }

    pub fn new(platform: Platform) -> Self {
        Self::with_source(platform, SystemSource)
    }
}

impl Default for TcpStatsProbe<SystemSource> {
    fn default() -> Self {
        Self::native()
    }
}

impl<S: TcpInfoSource> TcpStatsProbe<S> {
    pub fn with_source(platform: Platform, source: S) -> Self {
        Self { platform, source }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Read the current TCP diagnostics for `handle` into `out`.
    ///
    /// Always leaves `out` fully defined: either every field the platform can
    /// report is filled and `is_valid` is set, or the record is marked
    /// unavailable. `connect_time_ms` is never touched.
    pub fn query(&self, handle: SocketHandle, out: &mut TcpStats) {
        let filled = match (self.platform, raw_fd(handle)) {
            (Platform::Unsupported, _) => false,
            (_, None) => {
                debug!("No TCP stats for invalid socket handle {}", handle);
                false
            }
            (Platform::TcpInfo(fields), Some(fd)) => match self.source.tcp_info(fd) {
                Ok(info) => {
                    normalize_tcp_info(&info, fields, out);
                    true
                }
                Err(e) => {
                    debug!("TCP_INFO failed on fd {}: {}", fd, e);
                    false
                }
            },
            (Platform::ConnectionInfo { flavor }, Some(fd)) => {
                match self.source.connection_info(fd) {
                    Ok(info) => {
                        normalize_connection_info(&info, flavor, out);
                        true
                    }
                    Err(e) => {
                        debug!("TCP_CONNECTION_INFO failed on fd {}: {}", fd, e);
                        false
                    }
                }
            }
        };

        if filled {
            trace!(
                "fd {}: rtt={}us cwnd={:?}KiB retransmits={}",
                handle,
                out.rtt_us,
                out.cwnd_kib,
                out.retransmits
            );
        } else {
            out.mark_unavailable();
        }
    }

    /// Query into a fresh record.
    pub fn probe(&self, handle: SocketHandle) -> TcpStats {
        let mut stats = TcpStats::unavailable();
        self.query(handle, &mut stats);
        stats
    }

    #[cfg(unix)]
    pub fn query_socket<T: std::os::unix::io::AsRawFd>(&self, socket: &T, out: &mut TcpStats) {
        self.query(SocketHandle::from(socket.as_raw_fd()), out);
    }

    /// Snapshot copy of the fields this probe's platform can produce.
    pub fn copy(&self, dst: &mut TcpStats, src: &TcpStats) {
        self.platform.copy_stats(dst, src);
    }
}

/// Read TCP stats for a socket using the native facility.
#[cfg(unix)]
pub fn tcp_stats<T: std::os::unix::io::AsRawFd>(socket: &T) -> TcpStats {
    TcpStatsProbe::native().probe(SocketHandle::from(socket.as_raw_fd()))
}
