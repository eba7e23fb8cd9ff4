//! TCP connection helpers for live sampling
//!
//! Opens the measured connection, records how long establishment took, and
//! optionally keeps the send path busy so the congestion window has
//! something to grow into.

use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::stats::TcpStats;
use crate::tcp_info::{SocketHandle, TcpInfoSource, TcpStatsProbe};

pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024; // 128 KB

/// Connect to `host:port`, returning the stream and the connect time in ms.
pub async fn connect(host: &str, port: u16) -> anyhow::Result<(TcpStream, f64)> {
    let start = Instant::now();
    let stream = TcpStream::connect((host, port)).await?;
    let connect_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        "Connected to {} in {:.2}ms",
        stream.peer_addr()?,
        connect_time_ms
    );
    Ok((stream, connect_time_ms))
}

/// The OS handle a probe should be pointed at.
#[cfg(unix)]
pub fn socket_handle(stream: &TcpStream) -> SocketHandle {
    use std::os::unix::io::AsRawFd;
    SocketHandle::from(stream.as_raw_fd())
}

#[cfg(windows)]
pub fn socket_handle(stream: &TcpStream) -> SocketHandle {
    use std::os::windows::io::AsRawSocket;
    SocketHandle::try_from(stream.as_raw_socket()).unwrap_or(-1)
}

#[cfg(not(any(unix, windows)))]
pub fn socket_handle(_stream: &TcpStream) -> SocketHandle {
    -1
}

/// Take one reading for `handle`, stamping the caller-owned connect time.
pub fn sample<S: TcpInfoSource>(
    probe: &TcpStatsProbe<S>,
    handle: SocketHandle,
    connect_time_ms: Option<f64>,
) -> TcpStats {
    let mut stats = TcpStats::unavailable();
    stats.connect_time_ms = connect_time_ms;
    probe.query(handle, &mut stats);
    stats
}

/// Write zeros until cancelled or the peer goes away. Returns bytes sent.
pub async fn send_data_half(
    mut write_half: OwnedWriteHalf,
    buffer_size: usize,
    mut cancel: watch::Receiver<bool>,
) -> anyhow::Result<u64> {
    let buffer = vec![0u8; buffer_size];
    let mut sent = 0u64;

    loop {
        if *cancel.borrow() {
            debug!("Send cancelled after {} bytes", sent);
            break;
        }

        tokio::select! {
            result = write_half.write(&buffer) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => sent += n as u64,
                    Err(e) => {
                        error!("Send error: {}", e);
                        return Err(e.into());
                    }
                }
            }
            changed = cancel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    write_half.shutdown().await?;
    Ok(sent)
}

/// Read and discard until EOF. Used by the loopback sink in tests and demos.
pub async fn drain(mut stream: TcpStream) -> anyhow::Result<u64> {
    let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
    let mut received = 0u64;
    loop {
        match stream.read(&mut buffer).await? {
            0 => break,
            n => received += n as u64,
        }
    }
    debug!("Drained {} bytes", received);
    Ok(received)
}
