// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Broker bridge: the engine's view of the upstream MQTT broker.
//
// `BrokerLink` is broker-agnostic; `MqttBridge` implements it with rumqttc.
// The network loop lives in `BrokerEventLoop`, which runs on its own task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::watch;

use crate::config::BrokerConfig;
use crate::error::GatewayError;
use crate::protocol::QosLevel;

/// Outbound side of the broker connection, as seen by the engine.
pub trait BrokerLink: Send + Sync {
    /// Queue a publish. Fails with `BrokerUnavailable` while disconnected or
    /// when the outgoing queue is full; never blocks.
    fn publish(&self, topic: &str, payload: &[u8], qos: QosLevel) -> Result<(), GatewayError>;

    fn is_connected(&self) -> bool;
}

/// Callback invoked for every message the broker delivers.
pub type MessageHandler = Box<dyn Fn(&str, &[u8]) + Send + Sync>;

fn to_mqtt_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        QosLevel::AtMostOnce | QosLevel::NoSession => QoS::AtMostOnce,
    }
}

fn subscribe_qos(level: u8) -> QoS {
    match level {
        2 => QoS::ExactlyOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::AtMostOnce,
    }
}

// ---------------------------------------------------------------------------
// rumqttc bridge
// ---------------------------------------------------------------------------

/// Publishing half of the rumqttc connection.
#[derive(Clone)]
pub struct MqttBridge {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttBridge {
    /// Create the client and its (not yet running) event loop.
    pub fn new(config: &BrokerConfig) -> (Self, BrokerEventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
        let connected = Arc::new(AtomicBool::new(false));

        let bridge = Self {
            client: client.clone(),
            connected: Arc::clone(&connected),
        };
        let event_loop = BrokerEventLoop {
            eventloop,
            client,
            connected,
            topic_filter: config.topic_filter.clone(),
            filter_qos: subscribe_qos(config.subscribe_qos),
            backoff: Backoff::new(config.reconnect_min_ms, config.reconnect_max_ms),
            handler: None,
        };
        (bridge, event_loop)
    }
}

impl BrokerLink for MqttBridge {
    fn publish(&self, topic: &str, payload: &[u8], qos: QosLevel) -> Result<(), GatewayError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(GatewayError::BrokerUnavailable("not connected".into()));
        }
        self.client
            .try_publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .map_err(|e| GatewayError::BrokerUnavailable(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Drives the MQTT connection: reconnects, re-subscribes and dispatches
/// inbound messages to the registered handler.
pub struct BrokerEventLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    topic_filter: String,
    filter_qos: QoS,
    backoff: Backoff,
    handler: Option<MessageHandler>,
}

impl BrokerEventLoop {
    /// Register the forwarding handler. Replaces any previous one.
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Poll the connection until `shutdown` turns true.
    ///
    /// A shutdown signalled before the first poll still stops the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let stop = async move {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
        };
        tokio::pin!(stop);

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut stop => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        tracing::error!(code = ?ack.code, "broker rejected connection");
                        continue;
                    }
                    self.connected.store(true, Ordering::Release);
                    self.backoff.reset();
                    tracing::info!(filter = %self.topic_filter, "connected to broker");
                    // Clean sessions drop subscriptions, so resubscribe every time.
                    if let Err(e) = self
                        .client
                        .try_subscribe(self.topic_filter.clone(), self.filter_qos)
                    {
                        tracing::warn!(error = %e, "failed to queue broker subscription");
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    tracing::debug!(topic = %publish.topic, bytes = publish.payload.len(), "broker message");
                    if let Some(handler) = &self.handler {
                        handler(&publish.topic, &publish.payload);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        error = %err,
                        retry_ms = delay.as_millis() as u64,
                        "broker connection lost"
                    );
                    tokio::select! {
                        biased;
                        _ = &mut stop => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.connected.store(false, Ordering::Release);
        let _ = self.client.try_disconnect();
        tracing::info!("broker event loop stopped");
    }
}

// ---------------------------------------------------------------------------
// Reconnect backoff
// ---------------------------------------------------------------------------

/// Exponential reconnect delay with +/-25% jitter.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    min_ms: u64,
    current_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub(crate) fn new(min_ms: u64, max_ms: u64) -> Self {
        let min_ms = min_ms.max(1);
        Self {
            min_ms,
            current_ms: min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        let jitter = delay / 4;
        let actual = if jitter == 0 {
            delay
        } else {
            delay - jitter + fastrand::u64(0..=jitter * 2)
        };
        Duration::from_millis(actual)
    }

    pub(crate) fn reset(&mut self) {
        self.current_ms = self.min_ms;
    }
}
