//! Telemetry query tests against real sockets

use std::net::{TcpListener, TcpStream};

use tcpstats::platform::{Platform, TcpInfoFields};
use tcpstats::stats::TcpStats;
use tcpstats::tcp_info::TcpStatsProbe;

fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    (client, server)
}

#[test]
fn test_invalid_handles_are_unavailable() {
    let probe = TcpStatsProbe::native();
    for handle in [-1, 0] {
        let stats = probe.probe(handle);
        assert!(!stats.is_valid);
        assert_eq!(stats.rtt_us, 1);
    }
}

#[test]
fn test_unsupported_platform_ignores_live_socket() {
    let (client, _server) = loopback_pair();
    let probe = TcpStatsProbe::new(Platform::Unsupported);

    let mut stats = TcpStats::default();
    #[cfg(unix)]
    probe.query_socket(&client, &mut stats);
    #[cfg(not(unix))]
    probe.query(1, &mut stats);

    assert!(!stats.is_valid);
    assert_eq!(stats.rtt_us, 1);
    drop(client);
}

#[cfg(target_os = "linux")]
#[test]
fn test_linux_loopback_reading() {
    use std::io::Write;
    use std::os::unix::io::AsRawFd;

    let (mut client, _server) = loopback_pair();
    client.write_all(&[0u8; 4096]).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    let probe = TcpStatsProbe::native();
    let mut stats = TcpStats::default().with_connect_time_ms(0.1);
    probe.query_socket(&client, &mut stats);

    assert!(stats.is_valid);
    let mss = stats.mss.expect("tcp_info exposes snd_mss");
    assert!(mss > 0);
    let cwnd = stats.cwnd_packets.expect("tcp_info exposes snd_cwnd");
    assert!(cwnd > 0);
    assert_eq!(stats.cwnd_kib, Some(u64::from(cwnd) * u64::from(mss) / 1024));
    assert!(stats.packets_in_flight.is_some());
    assert_eq!(stats.connect_time_ms, Some(0.1));

    // Same socket, reduced capability set
    let reduced = TcpStatsProbe::new(Platform::TcpInfo(TcpInfoFields {
        inflight: false,
        ..TcpInfoFields::all()
    }));
    let stats = reduced.probe(i64::from(client.as_raw_fd()));
    assert!(stats.is_valid);
    assert_eq!(stats.packets_in_flight, None);
    assert_eq!(stats.bytes_in_flight_kib, None);
}

#[cfg(target_os = "linux")]
#[test]
fn test_linux_listener_socket_still_reads() {
    // A listening socket has a tcp_info block too, just mostly zeros
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let stats = tcpstats::tcp_info::tcp_stats(&listener);
    assert!(stats.is_valid);
}

#[cfg(unix)]
#[test]
fn test_non_socket_fd_is_unavailable() {
    let file = tempfile::tempfile().unwrap();
    let stats = tcpstats::tcp_info::tcp_stats(&file);
    assert!(!stats.is_valid);
    assert_eq!(stats.rtt_us, 1);
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
#[test]
fn test_apple_loopback_reading() {
    use std::io::Write;

    let (mut client, _server) = loopback_pair();
    client.write_all(&[0u8; 4096]).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    let stats = tcpstats::tcp_info::tcp_stats(&client);
    assert!(stats.is_valid);
    assert_eq!(stats.cwnd_packets, None);
    assert!(stats.mss.is_some());
    assert_eq!(stats.rtt_us % 1000, 0);
}

#[test]
fn test_snapshot_copy_across_threads() {
    let probe = TcpStatsProbe::native();
    let reading = probe.probe(-1);

    let snapshot = std::thread::spawn(move || {
        let mut dst = TcpStats::default();
        TcpStatsProbe::native().copy(&mut dst, &reading);
        dst
    })
    .join()
    .unwrap();

    assert!(!snapshot.is_valid);
    assert_eq!(snapshot.rtt_us, 1);
}
