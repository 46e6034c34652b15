//! Integration tests for the stream and datagram transports.
//!
//! These spin up real loopback sockets (port 0, so the OS picks a free
//! port) and check that whole messages survive the trip in both
//! directions.

use std::time::Duration;

use chatrelay_transport::{
    read_frame, write_frame, DatagramTransport, Listener, StreamListener,
    StreamTransport, Transport, TransportError, TransportHandle,
    TransportKind, MAX_DATAGRAM_SIZE,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Binds a listener and connects one client to it. Returns
/// `(server side, client side)`.
async fn stream_pair() -> (StreamTransport, StreamTransport) {
    let mut listener = StreamListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have addr");

    let server = tokio::spawn(async move {
        listener.accept().await.expect("should accept")
    });
    let client = StreamTransport::connect(addr)
        .await
        .expect("client should connect");
    let server = server.await.expect("task should complete");
    (server, client)
}

// =========================================================================
// Framing round trip
// =========================================================================

#[tokio::test]
async fn test_frame_round_trip_preserves_bytes_for_many_sizes() {
    // Empty, tiny, exactly one header's worth, and larger than any
    // single socket read.
    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"x".to_vec(),
        vec![0xAB; 4],
        (0..=255u8).collect(),
        vec![7u8; 200_000],
    ];

    for payload in payloads {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut a, &payload).await.expect("write frame");
        });

        let got = read_frame(&mut b)
            .await
            .expect("read should not error")
            .expect("should have a frame");
        writer.await.unwrap();
        assert_eq!(got, expected, "frame of {} bytes changed", expected.len());
    }
}

#[tokio::test]
async fn test_frame_split_across_writes_is_reassembled() {
    // The header and body arrive in dribbles; the reader keeps going
    // until the whole frame is in.
    let (mut a, mut b) = tokio::io::duplex(64);
    let writer = tokio::spawn(async move {
        let chunks: [&[u8]; 4] = [&[0, 0], &[0, 5], b"he", b"llo"];
        for chunk in chunks {
            a.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let got = read_frame(&mut b).await.unwrap().unwrap();
    writer.await.unwrap();
    assert_eq!(got, b"hello");
}

// =========================================================================
// Stream transport
// =========================================================================

#[tokio::test]
async fn test_stream_send_and_receive_both_directions() {
    let (server, client) = stream_pair().await;
    assert!(server.id().into_inner() > 0);
    assert_eq!(server.kind(), TransportKind::Stream);

    server.send(b"hello from server", None).await.expect("send");
    let (data, from) = client.recv().await.unwrap().expect("should have data");
    assert_eq!(data, b"hello from server");
    assert_eq!(from, client.peer_addr());

    client.send(b"hello from client", None).await.expect("send");
    let (data, from) = server.recv().await.unwrap().expect("should have data");
    assert_eq!(data, b"hello from client");
    assert_eq!(from, server.peer_addr());
}

#[tokio::test]
async fn test_stream_recv_returns_none_when_peer_closes() {
    let (server, client) = stream_pair().await;

    client.close().await.expect("close should succeed");

    let result = tokio::time::timeout(RECV_TIMEOUT, server.recv())
        .await
        .expect("should not hang")
        .expect("recv should not error");
    assert!(result.is_none(), "closed peer should mean end-of-input");
}

#[tokio::test]
async fn test_stream_recv_returns_none_on_frame_cut_short() {
    let mut listener = StreamListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { listener.accept().await.unwrap() });

    // A raw client that promises 100 bytes, sends 3, and hangs up.
    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = server.await.unwrap();
    raw.write_all(&[0, 0, 0, 100, 1, 2, 3]).await.unwrap();
    drop(raw);

    let result = tokio::time::timeout(RECV_TIMEOUT, server.recv())
        .await
        .expect("should not hang");
    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_stream_concurrent_sends_do_not_interleave() {
    let (server, client) = stream_pair().await;
    let server = std::sync::Arc::new(server);

    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let server = std::sync::Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            let payload = vec![i; 1_000];
            server.send(&payload, None).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for _ in 0..8 {
        let (data, _) = client.recv().await.unwrap().unwrap();
        assert_eq!(data.len(), 1_000);
        assert!(data.iter().all(|b| *b == data[0]), "frame was interleaved");
    }
}

// =========================================================================
// Datagram transport
// =========================================================================

#[tokio::test]
async fn test_datagram_send_and_receive() {
    let server = DatagramTransport::bind("127.0.0.1:0").await.unwrap();
    let client = DatagramTransport::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server.local_addr().unwrap();
    let client_addr = client.local_addr().unwrap();
    assert_eq!(server.kind(), TransportKind::Datagram);

    client.send(b"ping", Some(server_addr)).await.unwrap();
    let (data, from) = tokio::time::timeout(RECV_TIMEOUT, server.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(data, b"ping");
    assert_eq!(from, client_addr);

    server.send(b"pong", Some(from)).await.unwrap();
    let (data, _) = tokio::time::timeout(RECV_TIMEOUT, client.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(data, b"pong");
}

#[tokio::test]
async fn test_datagram_send_without_destination_fails() {
    let socket = DatagramTransport::bind("127.0.0.1:0").await.unwrap();

    let result = socket.send(b"lost", None).await;

    assert!(matches!(result, Err(TransportError::MissingDestination)));
}

#[tokio::test]
async fn test_datagram_oversized_unit_is_truncated() {
    let server = DatagramTransport::bind("127.0.0.1:0").await.unwrap();
    let client = DatagramTransport::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server.local_addr().unwrap();

    client
        .send(&vec![1u8; MAX_DATAGRAM_SIZE + 500], Some(server_addr))
        .await
        .unwrap();

    let (data, _) = tokio::time::timeout(RECV_TIMEOUT, server.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(data.len(), MAX_DATAGRAM_SIZE);
}

// =========================================================================
// TransportHandle
// =========================================================================

#[tokio::test]
async fn test_handle_forwards_to_the_variant_inside() {
    let (server, client) = stream_pair().await;
    let stream: TransportHandle = std::sync::Arc::new(server).into();
    let socket = DatagramTransport::bind("127.0.0.1:0").await.unwrap();
    let datagram: TransportHandle = socket.clone().into();

    assert_eq!(stream.kind(), TransportKind::Stream);
    assert_eq!(datagram.kind(), TransportKind::Datagram);
    assert_eq!(datagram.local_addr().unwrap(), socket.local_addr().unwrap());

    stream.send(b"via handle", None).await.unwrap();
    let (data, _) = client.recv().await.unwrap().unwrap();
    assert_eq!(data, b"via handle");

    assert!(matches!(
        datagram.send(b"nowhere", None).await,
        Err(TransportError::MissingDestination)
    ));
}
