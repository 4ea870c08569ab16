//! End-to-end tests against a scripted in-process cluster node.

use std::time::Duration;

use dx_cluster_client::{ClientError, ClusterClient, ClusterClientConfig, ConnectionState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

const SPOTS: &str = "\
DX de W1AW:     14074.0  K1ABC     FT8 signal                    1234Z\r\n\
WWV de W0MU <18>:   SFI=70, A=5, K=1, No Storms\r\n\
DX de EA5WU-#:    7018.3  RW1M           CW    19 dB  18 WPM  CQ      2259Z\r\n\
DX de DL1ABC:    7150.0  VK2XYZ       SSB 59                     0815Z\r\n";

fn config(port: u16) -> ClusterClientConfig {
    ClusterClientConfig {
        buffer_size: 3,
        connect_timeout: Duration::from_secs(2),
        receive_timeout: Duration::from_secs(5),
        login_delay: Duration::ZERO,
        initial_wait: Duration::from_millis(50),
        ..ClusterClientConfig::with_callsign("W6JSV").with_server("127.0.0.1", port)
    }
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accept one client, check its login and send the spot feed.
async fn accept_and_login(listener: &TcpListener) -> BufReader<TcpStream> {
    let (socket, _) = listener.accept().await.unwrap();
    let mut socket = BufReader::new(socket);
    socket
        .get_mut()
        .write_all(b"Welcome to the test cluster\r\nPlease enter your call: ")
        .await
        .unwrap();

    let mut login = String::new();
    socket.read_line(&mut login).await.unwrap();
    assert_eq!(login, "W6JSV\r\n");
    socket
}

async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    timeout(Duration::from_secs(3), rx.wait_for(|state| *state == want))
        .await
        .expect("state change timed out")
        .unwrap();
}

async fn wait_for_spots(client: &ClusterClient, count: usize) {
    timeout(Duration::from_secs(3), async {
        while client.status().total_spots < count as u64 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("spots did not arrive");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (listener, port) = listener().await;
    let server = tokio::spawn(async move {
        let mut socket = accept_and_login(&listener).await;
        socket.get_mut().write_all(SPOTS.as_bytes()).await.unwrap();

        let mut command = String::new();
        socket.read_line(&mut command).await.unwrap();
        assert_eq!(command, "SH/DX 5\r\n");

        // Wait for the client to hang up.
        let mut rest = String::new();
        let _ = socket.read_line(&mut rest).await;
    });

    let client = ClusterClient::new(config(port)).unwrap();
    client.connect().await.unwrap();
    assert!(client.is_connected());

    wait_for_spots(&client, 3).await;

    let status = client.status();
    assert!(status.connected);
    assert_eq!(status.host, "127.0.0.1");
    assert_eq!(status.port, port);
    assert_eq!(status.cached_spots, 3);

    let recent = client.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].callsign, "RW1M");
    assert_eq!(recent[1].callsign, "VK2XYZ");

    assert_eq!(client.by_callsign("k1a")[0].frequency, 14074.0);
    assert_eq!(client.by_frequency(7000.0, 7200.0).len(), 2);
    assert_eq!(client.by_band("40m", Some("1")).len(), 2);
    assert_eq!(client.by_band("20m", None).len(), 1);

    client.send_line("SH/DX 5").await.unwrap();

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        client.send_line("BYE").await,
        Err(ClientError::NotConnected)
    ));
    // The history outlives the connection.
    assert_eq!(client.snapshot().len(), 3);

    timeout(Duration::from_secs(3), server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_buffer_evicts_oldest_spot() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let mut socket = accept_and_login(&listener).await;
        socket.get_mut().write_all(SPOTS.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = ClusterClient::new(ClusterClientConfig {
        buffer_size: 2,
        ..config(port)
    })
    .unwrap();
    client.connect().await.unwrap();
    wait_for_spots(&client, 3).await;

    let calls: Vec<_> = client.snapshot().into_iter().map(|s| s.callsign).collect();
    assert_eq!(calls, vec!["RW1M", "VK2XYZ"]);
    assert_eq!(client.status().evicted_spots, 1);
    client.disconnect().await;
}

#[tokio::test]
async fn test_server_close_marks_disconnected() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let mut socket = accept_and_login(&listener).await;
        socket
            .get_mut()
            .write_all(b"DX de W1AW: 14074.0 K1ABC FT8 1234Z\r\n")
            .await
            .unwrap();
        // Dropping the socket closes the connection.
    });

    let client = ClusterClient::new(config(port)).unwrap();
    let mut state = client.watch_state();
    client.connect().await.unwrap();

    wait_for_state(&mut state, ConnectionState::Disconnected).await;
    assert!(!client.status().connected);
    assert_eq!(client.snapshot().len(), 1);
    assert!(matches!(
        client.send_line("SH/DX").await,
        Err(ClientError::NotConnected)
    ));

    client.disconnect().await;
}

#[tokio::test]
async fn test_receive_timeout_marks_disconnected() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let _socket = accept_and_login(&listener).await;
        // Stay silent past the receive timeout.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = ClusterClient::new(ClusterClientConfig {
        receive_timeout: Duration::from_millis(300),
        ..config(port)
    })
    .unwrap();
    let mut state = client.watch_state();
    client.connect().await.unwrap();

    wait_for_state(&mut state, ConnectionState::Disconnected).await;
    client.disconnect().await;
}

#[tokio::test]
async fn test_reconnect_after_server_close() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        for _ in 0..2 {
            let mut socket = accept_and_login(&listener).await;
            socket
                .get_mut()
                .write_all(b"DX de W1AW: 14074.0 K1ABC FT8 1234Z\r\n")
                .await
                .unwrap();
        }
    });

    let client = ClusterClient::new(config(port)).unwrap();
    let mut state = client.watch_state();

    client.connect().await.unwrap();
    wait_for_state(&mut state, ConnectionState::Disconnected).await;

    client.connect().await.unwrap();
    wait_for_spots(&client, 2).await;
    assert_eq!(client.snapshot().len(), 2);

    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let _socket = accept_and_login(&listener).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = ClusterClient::new(config(port)).unwrap();
    client.connect().await.unwrap();
    assert!(matches!(
        client.connect().await,
        Err(ClientError::AlreadyConnected)
    ));
    client.disconnect().await;
}

#[tokio::test]
async fn test_connection_refused() {
    let (listener, port) = listener().await;
    drop(listener);

    let client = ClusterClient::new(config(port)).unwrap();
    assert!(matches!(client.connect().await, Err(ClientError::Io(_))));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
