// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway runtime.
//!
//! One task reads the UDP socket and feeds a bounded queue; a fixed pool of
//! workers drains it through the engine and sends replies. The broker event
//! loop runs on its own task and fans broker messages out with non-blocking
//! sends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::{BrokerEventLoop, BrokerLink};
use crate::config::GatewayConfig;
use crate::engine::GatewayEngine;
use crate::error::GatewayError;
use crate::stats::GatewayStats;
use crate::transport::UdpTransport;

type Datagram = (SocketAddr, Vec<u8>);
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Datagram>>>;

/// MQTT-SN gateway server.
pub struct Gateway {
    config: Arc<GatewayConfig>,
    engine: Arc<GatewayEngine>,
    stats: Arc<GatewayStats>,
    shutdown: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl Gateway {
    /// Create a gateway forwarding client publishes to `broker`.
    pub fn new(config: GatewayConfig, broker: Arc<dyn BrokerLink>) -> Result<Self, GatewayError> {
        config.validate()?;
        let stats = Arc::new(GatewayStats::new());
        let engine = Arc::new(GatewayEngine::with_stats(&config, broker, Arc::clone(&stats)));
        Ok(Self {
            config: Arc::new(config),
            engine,
            stats,
            shutdown: Arc::new(watch::channel(false).0),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn engine(&self) -> &Arc<GatewayEngine> {
        &self.engine
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            shutdown: Arc::clone(&self.shutdown),
            running: Arc::clone(&self.running),
        }
    }

    /// Bind the configured UDP address.
    pub fn bind(&self) -> Result<Arc<UdpTransport>, GatewayError> {
        let transport = UdpTransport::bind(&self.config.bind_address, self.config.udp_port)?;
        info!("MQTT-SN gateway listening on {}", transport.local_addr()?);
        Ok(Arc::new(transport))
    }

    /// Register the fan-out handler on `event_loop` and run it until shutdown.
    pub fn spawn_broker(
        &self,
        mut event_loop: BrokerEventLoop,
        transport: Arc<UdpTransport>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        event_loop.on_message(move |topic, payload| {
            engine.deliver_from_broker(topic, payload, transport.as_ref());
        });
        tokio::spawn(event_loop.run(self.shutdown.subscribe()))
    }

    /// Serve datagrams on `transport` until [`GatewayHandle::stop`].
    pub async fn serve(&self, transport: Arc<UdpTransport>) -> Result<(), GatewayError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyRunning);
        }

        // The stop flag is latched, so a stop issued before this point is seen.
        let mut stop_rx = self.shutdown.subscribe();
        let stop = async move {
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
        };
        tokio::pin!(stop);

        let (tx, rx) = mpsc::channel::<Datagram>(self.config.queue_depth);
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));

        let workers: Vec<JoinHandle<()>> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&self.engine),
                    Arc::clone(&transport),
                    Arc::clone(&rx),
                ))
            })
            .collect();
        debug!("Started {} workers", workers.len());

        let mut buf = vec![0u8; self.config.max_message_size];
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("Shutdown signal received");
                    break;
                }
                result = transport.recv_from(&mut buf) => {
                    match result {
                        Ok((n, from)) => {
                            GatewayStats::incr(&self.stats.datagrams_received);
                            match tx.try_send((from, buf[..n].to_vec())) {
                                Ok(()) => {}
                                Err(TrySendError::Full(_)) => {
                                    GatewayStats::incr(&self.stats.queue_drops);
                                    debug!(%from, "worker queue full, dropping datagram");
                                }
                                Err(TrySendError::Closed(_)) => break,
                            }
                        }
                        // ICMP errors from earlier sends surface here on some platforms.
                        Err(e) => warn!("UDP receive error: {}", e),
                    }
                }
            }
        }

        drop(tx);
        for w in workers {
            let _ = w.await;
        }
        self.running.store(false, Ordering::SeqCst);
        info!("MQTT-SN gateway stopped");
        Ok(())
    }
}

async fn worker(
    id: usize,
    engine: Arc<GatewayEngine>,
    transport: Arc<UdpTransport>,
    rx: SharedReceiver,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some((from, data)) = next else {
            break;
        };
        for (addr, frame) in engine.process_incoming(from, &data) {
            if let Err(e) = transport.send(addr, &frame).await {
                warn!(worker = id, error = %e, "failed to send reply");
            }
        }
    }
    debug!(worker = id, "worker exiting");
}

/// Cloneable control handle for a running [`Gateway`].
#[derive(Clone)]
pub struct GatewayHandle {
    shutdown: Arc<watch::Sender<bool>>,
    running: Arc<AtomicBool>,
}

impl GatewayHandle {
    /// Check if the gateway is serving.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the read loop, workers and broker event loop.
    ///
    /// Sticky: a `serve` or broker loop started after this returns at once.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Check if [`stop`](Self::stop) has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}
