// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT-SN v1.2 to MQTT gateway.
//!
//! Bridges resource-constrained devices speaking MQTT-SN over UDP to a
//! standard MQTT broker over TCP. Clients address topics by 16-bit ids; the
//! gateway keeps one global name <-> id registry shared by all clients.
//!
//! # Architecture
//!
//! ```text
//! MQTT-SN Client (MCU)             Gateway (this crate)             MQTT Broker
//!   Pico W / ESP32                   Linux / Windows
//!        |                                |                              |
//!        |--- CONNECT ------------------>|                              |
//!        |<-- CONNACK -------------------|                              |
//!        |--- REGISTER(sensors/temp) --->|  (topic id 1)                |
//!        |<-- REGACK(1) -----------------|                              |
//!        |--- PUBLISH(id 1, QoS 1) ----->|--- PUBLISH sensors/temp ---->|
//!        |<-- PUBACK --------------------|                              |
//!        |<-- PUBLISH(id 1, QoS 0) ------|<-- PUBLISH sensors/temp -----|
//! ```
//!
//! # Key Features
//!
//! - **Broker-agnostic engine**: the engine talks to [`BrokerLink`]; [`MqttBridge`]
//!   implements it with `rumqttc`
//! - **Bounded memory**: fixed worker pool, bounded datagram queue, non-blocking
//!   broker publishes and fan-out sends
//! - **Legacy framing**: PUBLISH-by-name boundaries are inferred from configured
//!   well-known topics or the topic-name character class

pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

// Re-exports for convenience.
pub use broker::{BrokerEventLoop, BrokerLink, MessageHandler, MqttBridge};
pub use config::{BrokerConfig, ConfigError, FanoutPolicy, GatewayConfig};
pub use engine::{FanoutReport, GatewayEngine, InFlightPublish};
pub use error::{GatewayError, ProtocolError};
pub use protocol::{
    // Errors
    DecodeError, EncodeError,
    // Framing
    FrameHeader, Flags, QosLevel, ReturnCode, TopicRef,
    // Packets
    Packet, ConnectPayload, ConnAckPayload, RegisterPayload, RegAckPayload,
    PublishPayload, PubAckPayload, SubscribePayload, SubAckPayload,
    UnsubscribePayload, UnsubAckPayload,
    // Functions
    parse_packet, parse_packet_with, serialize_packet,
};
pub use registry::{topic_matches, RegistryError, TopicRegistration, TopicRegistry};
pub use server::{Gateway, GatewayHandle};
pub use session::{ClientSession, SessionError, SessionTable};
pub use stats::{GatewayStats, GatewayStatsSnapshot};
pub use transport::{DatagramSink, UdpTransport};
