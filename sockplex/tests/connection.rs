//! End-to-end exercises of the connection variants over loopback.

use std::thread;
use std::time::Duration;

use sockplex::{ConnectionError, MAX_MESSAGE_LENGTH, ProtocolKind, Transport, create};

fn patterned_message(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i % 251) as u8).collect()
}

#[test]
fn tcp_auto_port_bind_accept_and_reply_on_the_accepted_peer() {
    let mut server = create("", "", true, Transport::Tcp).unwrap();
    server.bind().unwrap();

    let port = server.port().expect("auto-port bind assigns a port");
    assert!((1..=65535).contains(&port));

    let server_thread = thread::spawn(move || {
        let peer = server.accept_next().unwrap();
        let request = server.receive_from(&peer).unwrap();
        assert_eq!(request, b"ping");
        server.send_to(b"pong", &peer).unwrap();
    });

    let mut client = create("127.0.0.1", &port.to_string(), true, Transport::Tcp).unwrap();
    client.connect_to().unwrap();
    client.send(b"ping").unwrap();
    assert_eq!(client.receive().unwrap(), b"pong");

    server_thread.join().unwrap();
}

#[test]
fn tcp_round_trip_is_byte_identical_with_caller_reassembly() {
    // TCP preserves no message boundaries, so both sides reassemble by expected length; the
    // peers run in lockstep so no bytes of a later message can bleed into an earlier read.
    let lengths = [1usize, MAX_MESSAGE_LENGTH - 1, MAX_MESSAGE_LENGTH];

    let mut server = create("::1", "", true, Transport::Tcp).unwrap();
    assert_eq!(server.kind(), ProtocolKind::TcpV6);
    server.bind().unwrap();
    let port = server.port().unwrap();

    let echo = thread::spawn(move || {
        let peer = server.accept_next().unwrap();
        for length in lengths {
            let mut collected = Vec::new();
            while collected.len() < length {
                collected.extend(peer.receive().unwrap());
            }
            assert_eq!(collected, patterned_message(length));
            peer.send(&collected).unwrap();
        }
    });

    let mut client = create("::1", &port.to_string(), true, Transport::Tcp).unwrap();
    client.connect_to().unwrap();
    for length in lengths {
        let message = patterned_message(length);
        client.send(&message).unwrap();
        let mut echoed = Vec::new();
        while echoed.len() < length {
            echoed.extend(client.receive().unwrap());
        }
        assert_eq!(echoed, message);
    }

    echo.join().unwrap();
}

#[test]
fn udp_round_trip_preserves_datagram_boundaries() {
    let mut server = create("127.0.0.1", "", true, Transport::Udp).unwrap();
    server.bind().unwrap();
    let port = server.port().expect("auto-port bind assigns a port");

    let mut client = create("127.0.0.1", &port.to_string(), true, Transport::Udp).unwrap();
    client.connect_to().unwrap();

    // One send is one datagram, including the empty one and the payload ceiling.
    for length in [0, 1, MAX_MESSAGE_LENGTH - 1, MAX_MESSAGE_LENGTH] {
        let message = patterned_message(length);
        client.send(&message).unwrap();
        assert_eq!(server.receive().unwrap(), message);
    }
}

#[test]
fn orderly_peer_close_is_reported_as_closed_by_peer() {
    let mut server = create("", "", true, Transport::Tcp).unwrap();
    server.bind().unwrap();
    let port = server.port().unwrap();

    let client = thread::spawn(move || {
        let mut client = create("127.0.0.1", &port.to_string(), true, Transport::Tcp).unwrap();
        client.connect_to().unwrap();
        // Dropping the connection closes the descriptor in an orderly fashion.
    });

    let peer = server.accept_next().unwrap();
    client.join().unwrap();

    assert!(matches!(
        peer.receive(),
        Err(ConnectionError::ClosedByPeer)
    ));
}

#[test]
fn duplicate_bind_fails_deterministically() {
    let mut tcp = create("", "", true, Transport::Tcp).unwrap();
    tcp.bind().unwrap();
    assert!(matches!(tcp.bind(), Err(ConnectionError::AlreadyBound)));

    let mut udp = create("", "", true, Transport::Udp).unwrap();
    udp.bind().unwrap();
    assert!(matches!(udp.bind(), Err(ConnectionError::AlreadyBound)));
}

#[test]
fn connect_on_a_listening_connection_is_invalid() {
    let mut server = create("", "", true, Transport::Tcp).unwrap();
    server.bind().unwrap();
    assert!(matches!(
        server.connect_to(),
        Err(ConnectionError::InvalidState(_))
    ));
}

#[test]
fn malformed_address_fails_before_any_socket_exists() {
    let error = create(":::1", "4444", true, Transport::Udp).unwrap_err();
    assert!(matches!(error, ConnectionError::AddressResolution(_)));
}

#[test]
fn non_blocking_accept_and_receive_surface_would_block() {
    let mut server = create("", "", false, Transport::Tcp).unwrap();
    server.bind().unwrap();
    assert!(matches!(
        server.accept_next(),
        Err(ConnectionError::WouldBlock)
    ));

    let mut udp = create("127.0.0.1", "", false, Transport::Udp).unwrap();
    udp.bind().unwrap();
    assert!(matches!(udp.receive(), Err(ConnectionError::WouldBlock)));
}

#[test]
fn non_blocking_connect_completes_under_caller_polling() {
    let mut server = create("", "", true, Transport::Tcp).unwrap();
    server.bind().unwrap();
    let port = server.port().unwrap();

    let mut client = create("127.0.0.1", &port.to_string(), false, Transport::Tcp).unwrap();
    let mut attempts = 0;
    loop {
        match client.connect_to() {
            Ok(()) => break,
            Err(ConnectionError::WouldBlock) => {
                attempts += 1;
                assert!(attempts < 100, "connect never completed");
                thread::sleep(Duration::from_millis(10));
            }
            Err(error) => panic!("unexpected connect error: {error}"),
        }
    }

    let peer = server.accept_next().unwrap();
    client.send(b"hi").unwrap();
    assert_eq!(server.receive_from(&peer).unwrap(), b"hi");
}

#[test]
fn accepted_children_are_independent_of_the_listener() {
    let mut server = create("", "", true, Transport::Tcp).unwrap();
    server.bind().unwrap();
    let port = server.port().unwrap();

    let mut first = create("127.0.0.1", &port.to_string(), true, Transport::Tcp).unwrap();
    first.connect_to().unwrap();
    let mut second = create("127.0.0.1", &port.to_string(), true, Transport::Tcp).unwrap();
    second.connect_to().unwrap();

    let first_peer = server.accept_next().unwrap();
    let second_peer = server.accept_next().unwrap();
    assert_ne!(first_peer.descriptor(), second_peer.descriptor());
    assert_ne!(first_peer.descriptor(), server.descriptor());

    // Dropping one child leaves the listener and the other child usable.
    drop(first_peer);
    second.send(b"still here").unwrap();
    assert_eq!(second_peer.receive().unwrap(), b"still here");
}
