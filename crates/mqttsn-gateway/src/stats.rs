// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters shared by the read loop, workers and broker task.
#[derive(Debug)]
pub struct GatewayStats {
    /// Datagrams read from the UDP socket.
    pub datagrams_received: AtomicU64,

    /// Datagrams that failed to decode.
    pub malformed: AtomicU64,

    /// Datagrams dropped because the worker queue was full.
    pub queue_drops: AtomicU64,

    /// Client publishes handed to the broker.
    pub publishes_forwarded: AtomicU64,

    /// Payload bytes handed to the broker.
    pub bytes_forwarded: AtomicU64,

    /// Client publishes dropped (unknown id, broker down, unsupported topic type).
    pub publishes_dropped: AtomicU64,

    /// Replies sent to clients (CONNACK, REGACK, PUBACK, ...).
    pub acks_sent: AtomicU64,

    /// Messages received from the broker.
    pub broker_messages: AtomicU64,

    /// PUBLISH frames sent to clients.
    pub fanout_sent: AtomicU64,

    /// PUBLISH frames that failed to send.
    pub fanout_failed: AtomicU64,

    pub started: Instant,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            queue_drops: AtomicU64::new(0),
            publishes_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            publishes_dropped: AtomicU64::new(0),
            acks_sent: AtomicU64::new(0),
            broker_messages: AtomicU64::new(0),
            fanout_sent: AtomicU64::new(0),
            fanout_failed: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        GatewayStatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            publishes_forwarded: self.publishes_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            publishes_dropped: self.publishes_dropped.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            broker_messages: self.broker_messages.load(Ordering::Relaxed),
            fanout_sent: self.fanout_sent.load(Ordering::Relaxed),
            fanout_failed: self.fanout_failed.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStatsSnapshot {
    pub datagrams_received: u64,
    pub malformed: u64,
    pub queue_drops: u64,
    pub publishes_forwarded: u64,
    pub bytes_forwarded: u64,
    pub publishes_dropped: u64,
    pub acks_sent: u64,
    pub broker_messages: u64,
    pub fanout_sent: u64,
    pub fanout_failed: u64,
    pub uptime_secs: u64,
}

impl GatewayStatsSnapshot {
    /// Client publishes forwarded per second of uptime.
    pub fn publishes_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.publishes_forwarded as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = GatewayStats::new();
        GatewayStats::incr(&stats.datagrams_received);
        GatewayStats::incr(&stats.datagrams_received);
        GatewayStats::incr(&stats.malformed);
        GatewayStats::add(&stats.bytes_forwarded, 300);

        let snap = stats.snapshot();
        assert_eq!(snap.datagrams_received, 2);
        assert_eq!(snap.malformed, 1);
        assert_eq!(snap.bytes_forwarded, 300);
        assert_eq!(snap.fanout_failed, 0);
    }

    #[test]
    fn test_rate_with_zero_uptime() {
        let snap = GatewayStatsSnapshot {
            publishes_forwarded: 10,
            ..Default::default()
        };
        assert_eq!(snap.publishes_per_second(), 0.0);
    }
}
