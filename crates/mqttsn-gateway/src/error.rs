// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway error types.

use std::net::SocketAddr;

use thiserror::Error;

pub use crate::protocol::{DecodeError, EncodeError};
pub use crate::registry::RegistryError;
pub use crate::session::SessionError;

/// Protocol-level rejection of an otherwise well-formed packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown topic id {0}")]
    UnknownTopicId(u16),
    #[error("short topic names are not supported")]
    ShortTopicUnsupported,
}

/// Umbrella error for the gateway runtime.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("send to {addr} failed: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("gateway is already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
