// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// MQTT-SN gateway engine.
//
// Owns the topic registry and session table, turns inbound datagrams into
// replies and broker publishes, and fans broker messages out to clients.
// All methods take `&self`; the engine is shared across workers via `Arc`.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::broker::BrokerLink;
use crate::config::{FanoutPolicy, GatewayConfig};
use crate::error::{GatewayError, ProtocolError, RegistryError};
use crate::protocol::{
    self, ConnAckPayload, ConnectPayload, Flags, Packet, PubAckPayload, PublishPayload,
    QosLevel, RegAckPayload, RegisterPayload, ReturnCode, SubAckPayload, SubscribePayload,
    TopicRef, UnsubAckPayload, UnsubscribePayload,
};
use crate::registry::{is_wildcard, TopicRegistry};
use crate::session::SessionTable;
use crate::stats::GatewayStats;
use crate::transport::DatagramSink;

/// A QoS 1 publish awaiting its PUBACK. Lives only until the ack is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightPublish {
    pub msg_id: u16,
    pub topic_id: u16,
    pub client: SocketAddr,
}

impl InFlightPublish {
    pub fn ack(&self) -> Packet {
        Packet::PubAck(PubAckPayload {
            topic_id: self.topic_id,
            msg_id: self.msg_id,
            return_code: ReturnCode::Accepted,
        })
    }
}

/// Outcome of one broker -> clients delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

/// The gateway. Bridges MQTT-SN clients to an MQTT broker.
pub struct GatewayEngine {
    registry: TopicRegistry,
    sessions: SessionTable,
    broker: Arc<dyn BrokerLink>,
    stats: Arc<GatewayStats>,
    known_topics: Vec<String>,
    fanout: FanoutPolicy,
}

impl GatewayEngine {
    pub fn new(config: &GatewayConfig, broker: Arc<dyn BrokerLink>) -> Self {
        Self::with_stats(config, broker, Arc::new(GatewayStats::new()))
    }

    /// Create an engine that records into existing counters.
    pub fn with_stats(
        config: &GatewayConfig,
        broker: Arc<dyn BrokerLink>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            registry: TopicRegistry::new(config.max_topics),
            sessions: SessionTable::new(config.max_clients),
            broker,
            stats,
            known_topics: config.known_topics.clone(),
            fanout: config.fanout,
        }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Process one inbound datagram.
    /// Returns the (destination, frame) replies to send back.
    pub fn process_incoming(&self, from: SocketAddr, data: &[u8]) -> Vec<(SocketAddr, Vec<u8>)> {
        let packet = match protocol::parse_packet_with(data, &self.known_topics) {
            Ok(p) => p,
            Err(e) => {
                GatewayStats::incr(&self.stats.malformed);
                tracing::warn!(%from, error = %e, "dropping datagram");
                return Vec::new();
            }
        };

        let Some(reply) = self.handle_packet(from, packet) else {
            return Vec::new();
        };
        match protocol::serialize_packet(&reply) {
            Ok(frame) => {
                GatewayStats::incr(&self.stats.acks_sent);
                vec![(from, frame)]
            }
            Err(e) => {
                tracing::warn!(%from, reply = reply.name(), error = %e, "cannot encode reply");
                Vec::new()
            }
        }
    }

    /// Apply one decoded packet and return the reply, if any.
    pub fn handle_packet(&self, from: SocketAddr, packet: Packet) -> Option<Packet> {
        match &packet {
            Packet::Connect(_) => {}
            Packet::Publish(_) => {
                if let Err(e) = self.sessions.touch(from) {
                    tracing::debug!(%from, error = %e, "publish from untracked client");
                }
            }
            _ => {
                self.sessions.refresh(from);
            }
        }

        match packet {
            Packet::Connect(p) => Some(self.handle_connect(from, &p)),
            Packet::Register(p) => Some(self.handle_register(from, &p)),
            Packet::Publish(p) => self.handle_publish(from, p),
            Packet::Subscribe(p) => Some(self.handle_subscribe(from, &p)),
            Packet::Unsubscribe(p) => Some(self.handle_unsubscribe(from, &p)),
            Packet::PingReq => Some(Packet::PingResp),
            Packet::Disconnect => {
                if self.sessions.remove(from.ip()).is_some() {
                    tracing::info!(%from, "client disconnected");
                }
                None
            }
            other @ (Packet::ConnAck(_)
            | Packet::RegAck(_)
            | Packet::PubAck(_)
            | Packet::SubAck(_)
            | Packet::UnsubAck(_)
            | Packet::PingResp) => {
                tracing::debug!(%from, packet = other.name(), "ignoring gateway-bound packet type");
                None
            }
        }
    }

    fn handle_connect(&self, from: SocketAddr, p: &ConnectPayload) -> Packet {
        let return_code = match self.sessions.connect(from, &p.client_id, p.keep_alive) {
            Ok(()) => {
                tracing::info!(
                    %from,
                    client_id = %p.client_id,
                    keep_alive = p.keep_alive,
                    "client connected"
                );
                ReturnCode::Accepted
            }
            Err(e) => {
                tracing::warn!(%from, error = %e, "rejecting CONNECT");
                ReturnCode::Congestion
            }
        };
        Packet::ConnAck(ConnAckPayload { return_code })
    }

    fn handle_register(&self, from: SocketAddr, p: &RegisterPayload) -> Packet {
        // Filters are not publishable topic names.
        if is_wildcard(&p.topic_name) {
            tracing::warn!(%from, topic = %p.topic_name, "REGISTER of a wildcard filter rejected");
            return Packet::RegAck(RegAckPayload {
                topic_id: 0,
                msg_id: p.msg_id,
                return_code: ReturnCode::InvalidTopicId,
            });
        }
        let (topic_id, return_code) = match self.registry.resolve(&p.topic_name) {
            Ok(id) => (id, ReturnCode::Accepted),
            Err(e) => {
                tracing::warn!(%from, topic = %p.topic_name, error = %e, "REGISTER rejected");
                (0, registry_return_code(&e))
            }
        };
        Packet::RegAck(RegAckPayload {
            topic_id,
            msg_id: p.msg_id,
            return_code,
        })
    }

    fn handle_subscribe(&self, from: SocketAddr, p: &SubscribePayload) -> Packet {
        let (filter, topic_id, return_code) = match &p.topic {
            TopicRef::Name(filter) if is_wildcard(filter) => {
                (Some(filter.clone()), 0, ReturnCode::Accepted)
            }
            TopicRef::Name(name) => match self.registry.resolve(name) {
                Ok(id) => (Some(name.clone()), id, ReturnCode::Accepted),
                Err(e) => {
                    tracing::warn!(%from, topic = %name, error = %e, "SUBSCRIBE rejected");
                    (None, 0, registry_return_code(&e))
                }
            },
            TopicRef::Id(id) => match self.registry.lookup(*id) {
                Some(name) => (Some(name), *id, ReturnCode::Accepted),
                None => {
                    tracing::warn!(%from, topic_id = id, "SUBSCRIBE to unknown topic id");
                    (None, 0, ReturnCode::InvalidTopicId)
                }
            },
            TopicRef::Short(_) => (None, 0, ReturnCode::NotSupported),
        };

        if let Some(filter) = filter {
            if !self.sessions.subscribe(from.ip(), &filter) {
                tracing::debug!(%from, filter = %filter, "SUBSCRIBE without session");
            }
            tracing::info!(%from, filter = %filter, topic_id, "client subscribed");
        }

        Packet::SubAck(SubAckPayload {
            flags: Flags::with_qos(p.flags.qos),
            topic_id,
            msg_id: p.msg_id,
            return_code,
        })
    }

    fn handle_unsubscribe(&self, from: SocketAddr, p: &UnsubscribePayload) -> Packet {
        let filter = match &p.topic {
            TopicRef::Name(name) => Some(name.clone()),
            TopicRef::Id(id) => self.registry.lookup(*id),
            TopicRef::Short(_) => None,
        };
        if let Some(filter) = filter {
            if self.sessions.unsubscribe(from.ip(), &filter) {
                tracing::info!(%from, filter = %filter, "client unsubscribed");
            }
        }
        Packet::UnsubAck(UnsubAckPayload { msg_id: p.msg_id })
    }

    fn handle_publish(&self, from: SocketAddr, p: PublishPayload) -> Option<Packet> {
        let resolved = match &p.topic {
            TopicRef::Id(id) => self
                .registry
                .lookup(*id)
                .map(|name| (*id, name))
                .ok_or(GatewayError::Protocol(ProtocolError::UnknownTopicId(*id))),
            TopicRef::Name(name) => self
                .registry
                .resolve(name)
                .map(|id| (id, name.clone()))
                .map_err(GatewayError::from),
            TopicRef::Short(_) => Err(ProtocolError::ShortTopicUnsupported.into()),
        };

        let (topic_id, topic) = match resolved {
            Ok(r) => r,
            Err(e) => {
                GatewayStats::incr(&self.stats.publishes_dropped);
                tracing::warn!(%from, msg_id = p.msg_id, error = %e, "dropping PUBLISH");
                return None;
            }
        };

        if let Err(e) = self.broker.publish(&topic, &p.data, p.flags.qos) {
            GatewayStats::incr(&self.stats.publishes_dropped);
            tracing::warn!(%from, topic = %topic, error = %e, "dropping PUBLISH");
            return None;
        }
        GatewayStats::incr(&self.stats.publishes_forwarded);
        GatewayStats::add(&self.stats.bytes_forwarded, p.data.len() as u64);
        tracing::debug!(
            %from,
            topic = %topic,
            topic_id,
            qos = p.flags.qos.bits(),
            dup = p.flags.dup,
            bytes = p.data.len(),
            "forwarded PUBLISH"
        );

        // QoS 2 handshakes are not implemented; only QoS 1 is acknowledged.
        (p.flags.qos == QosLevel::AtLeastOnce).then(|| {
            InFlightPublish {
                msg_id: p.msg_id,
                topic_id,
                client: from,
            }
            .ack()
        })
    }

    /// Deliver a broker message to clients as a QoS 0 PUBLISH by topic id.
    ///
    /// Sends are non-blocking and independent: a failure to one client is
    /// logged and counted, and delivery continues with the rest.
    pub fn deliver_from_broker(
        &self,
        topic: &str,
        payload: &[u8],
        sink: &dyn DatagramSink,
    ) -> FanoutReport {
        GatewayStats::incr(&self.stats.broker_messages);
        let mut report = FanoutReport::default();

        let topic_id = match self.registry.resolve(topic) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(topic, error = %e, "cannot forward broker message");
                return report;
            }
        };

        let frame = match protocol::serialize_packet(&Packet::Publish(PublishPayload {
            flags: Flags::default(),
            topic: TopicRef::Id(topic_id),
            msg_id: 0,
            data: payload.to_vec(),
        })) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(topic, bytes = payload.len(), error = %e, "broker message too large");
                return report;
            }
        };

        let targets = self
            .sessions
            .connected()
            .into_iter()
            .filter(|s| self.fanout == FanoutPolicy::All || s.is_subscribed(topic));
        for session in targets {
            match sink.send_to(session.last_seen, &frame) {
                Ok(()) => {
                    report.delivered += 1;
                    GatewayStats::incr(&self.stats.fanout_sent);
                }
                Err(e) => {
                    report.failed += 1;
                    GatewayStats::incr(&self.stats.fanout_failed);
                    tracing::warn!(client = %session.last_seen, error = %e, "fan-out send failed");
                }
            }
        }

        tracing::debug!(
            topic,
            topic_id,
            delivered = report.delivered,
            failed = report.failed,
            "broker message fanned out"
        );
        report
    }
}

fn registry_return_code(e: &RegistryError) -> ReturnCode {
    match e {
        RegistryError::Exhausted(_) => ReturnCode::Congestion,
        RegistryError::EmptyName => ReturnCode::InvalidTopicId,
    }
}
