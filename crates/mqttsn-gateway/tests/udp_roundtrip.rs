// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! End-to-end tests over a real UDP socket.
//!
//! The broker side is a recording `BrokerLink`, so no MQTT broker is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mqttsn_gateway::{
    parse_packet, serialize_packet, BrokerLink, ConnectPayload, Flags, Gateway, GatewayConfig,
    GatewayError, Packet, PubAckPayload, PublishPayload, QosLevel, RegAckPayload,
    RegisterPayload, ReturnCode, TopicRef,
};
use tokio::net::UdpSocket;

#[derive(Default)]
struct RecordingBroker {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl BrokerLink for RecordingBroker {
    fn publish(&self, topic: &str, payload: &[u8], _qos: QosLevel) -> Result<(), GatewayError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn loopback_config() -> GatewayConfig {
    GatewayConfig {
        udp_port: 0,
        bind_address: "127.0.0.1".into(),
        workers: 2,
        stats_interval_secs: 0,
        ..Default::default()
    }
}

async fn send(sock: &UdpSocket, to: std::net::SocketAddr, packet: &Packet) {
    let bytes = serialize_packet(packet).unwrap();
    sock.send_to(&bytes, to).await.unwrap();
}

async fn recv_packet(sock: &UdpSocket) -> Packet {
    let mut buf = [0u8; 512];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), sock.recv_from(&mut buf))
        .await
        .expect("timed out waiting for gateway")
        .unwrap();
    parse_packet(&buf[..n]).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_register_publish_over_udp() {
    let broker = Arc::new(RecordingBroker::default());
    let gateway = Arc::new(Gateway::new(loopback_config(), broker.clone()).unwrap());
    let transport = gateway.bind().unwrap();
    let gw_addr = transport.local_addr().unwrap();
    let handle = gateway.handle();

    let server = Arc::clone(&gateway);
    let serve_transport = Arc::clone(&transport);
    let server_task = tokio::spawn(async move { server.serve(serve_transport).await });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // CONNECT -> CONNACK
    send(
        &client,
        gw_addr,
        &Packet::Connect(ConnectPayload {
            flags: Flags {
                clean_session: true,
                ..Flags::default()
            },
            protocol_id: 1,
            keep_alive: 60,
            client_id: "pico-w".into(),
        }),
    )
    .await;
    match recv_packet(&client).await {
        Packet::ConnAck(ack) => assert_eq!(ack.return_code, ReturnCode::Accepted),
        other => panic!("expected ConnAck, got {:?}", other),
    }
    assert!(handle.is_running());

    // REGISTER -> REGACK
    send(
        &client,
        gw_addr,
        &Packet::Register(RegisterPayload {
            topic_id: 0,
            msg_id: 7,
            topic_name: "sensors/temp".into(),
        }),
    )
    .await;
    assert_eq!(
        recv_packet(&client).await,
        Packet::RegAck(RegAckPayload {
            topic_id: 1,
            msg_id: 7,
            return_code: ReturnCode::Accepted,
        })
    );

    // PUBLISH QoS 1 -> PUBACK, forwarded to the broker
    send(
        &client,
        gw_addr,
        &Packet::Publish(PublishPayload {
            flags: Flags::with_qos(QosLevel::AtLeastOnce),
            topic: TopicRef::Id(1),
            msg_id: 7,
            data: b"21.5".to_vec(),
        }),
    )
    .await;
    assert_eq!(
        recv_packet(&client).await,
        Packet::PubAck(PubAckPayload {
            topic_id: 1,
            msg_id: 7,
            return_code: ReturnCode::Accepted,
        })
    );
    assert_eq!(
        broker.published.lock().unwrap().clone(),
        vec![("sensors/temp".to_string(), b"21.5".to_vec())]
    );

    // Broker message fanned out through the real socket.
    let report = gateway
        .engine()
        .deliver_from_broker("sensors/temp", b"22.0", transport.as_ref());
    assert_eq!(report.delivered, 1);
    match recv_packet(&client).await {
        Packet::Publish(p) => {
            assert_eq!(p.topic, TopicRef::Id(1));
            assert_eq!(p.data, b"22.0");
        }
        other => panic!("expected Publish, got {:?}", other),
    }

    let stats = gateway.stats().snapshot();
    assert_eq!(stats.datagrams_received, 3);
    assert_eq!(stats.acks_sent, 3);
    assert_eq!(stats.publishes_forwarded, 1);

    handle.stop();
    tokio::time::timeout(Duration::from_secs(2), server_task)
        .await
        .expect("serve did not stop")
        .unwrap()
        .unwrap();
    assert!(!handle.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_datagram_dropped_then_ping() {
    // One worker keeps the two datagrams in order.
    let config = GatewayConfig {
        workers: 1,
        ..loopback_config()
    };
    let broker = Arc::new(RecordingBroker::default());
    let gateway = Arc::new(Gateway::new(config, broker).unwrap());
    let transport = gateway.bind().unwrap();
    let gw_addr = transport.local_addr().unwrap();
    let handle = gateway.handle();

    let server = Arc::clone(&gateway);
    let server_task = tokio::spawn(async move { server.serve(transport).await });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // Declared length 9, actual 3.
    client.send_to(&[9, 0x0C, 0x00], gw_addr).await.unwrap();
    send(&client, gw_addr, &Packet::PingReq).await;
    // Only the PINGRESP comes back.
    assert_eq!(recv_packet(&client).await, Packet::PingResp);
    assert_eq!(gateway.stats().snapshot().malformed, 1);

    handle.stop();
    tokio::time::timeout(Duration::from_secs(2), server_task)
        .await
        .expect("serve did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_failure_names_address() {
    let config = GatewayConfig {
        // TEST-NET-3, never a local address.
        bind_address: "203.0.113.1".into(),
        udp_port: 1884,
        ..Default::default()
    };
    let gateway = Gateway::new(config, Arc::new(RecordingBroker::default())).unwrap();
    let err = gateway.bind().unwrap_err();
    assert!(matches!(err, GatewayError::Bind { .. }));
    assert!(err.to_string().contains("203.0.113.1:1884"));
}

#[tokio::test]
async fn test_bind_fails_when_port_in_use() {
    let first = Gateway::new(loopback_config(), Arc::new(RecordingBroker::default())).unwrap();
    let held = first.bind().unwrap();
    let port = held.local_addr().unwrap().port();

    let config = GatewayConfig {
        udp_port: port,
        ..loopback_config()
    };
    let second = Gateway::new(config, Arc::new(RecordingBroker::default())).unwrap();
    let err = second.bind().unwrap_err();
    assert!(matches!(err, GatewayError::Bind { .. }));
    assert!(err.to_string().contains(&format!("127.0.0.1:{}", port)));
}

#[tokio::test]
async fn test_serve_returns_when_stopped_before_start() {
    let gateway = Gateway::new(loopback_config(), Arc::new(RecordingBroker::default())).unwrap();
    let transport = gateway.bind().unwrap();
    let handle = gateway.handle();

    handle.stop();
    assert!(handle.is_stopped());
    tokio::time::timeout(Duration::from_secs(2), gateway.serve(transport))
        .await
        .expect("serve ignored an earlier stop")
        .unwrap();
    assert!(!handle.is_running());
}

#[test]
fn test_invalid_config_rejected() {
    let config = GatewayConfig {
        workers: 0,
        ..Default::default()
    };
    assert!(matches!(
        Gateway::new(config, Arc::new(RecordingBroker::default())),
        Err(GatewayError::Config(_))
    ));
}
