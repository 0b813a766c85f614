// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// MQTT-SN client session table.
//
// Sessions are keyed by client IP only; the source port is kept as
// `last_seen` and used as the destination for asynchronous forwarding.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;

use crate::registry::topic_matches;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session table full ({0} clients)")]
    Full(usize),
}

// ---------------------------------------------------------------------------
// Client session
// ---------------------------------------------------------------------------

/// State for one client IP.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub ip: IpAddr,
    /// Set by CONNECT. Sessions created by a bare PUBLISH stay unconnected.
    pub connected: bool,
    /// Most recent source address; replies and fan-out go here.
    pub last_seen: SocketAddr,
    pub client_id: String,
    pub keep_alive: u16,
    /// Topic filters from SUBSCRIBE, in arrival order, no duplicates.
    pub subscriptions: Vec<String>,
    pub last_activity: Instant,
}

impl ClientSession {
    fn new(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip(),
            connected: false,
            last_seen: addr,
            client_id: String::new(),
            keep_alive: 0,
            subscriptions: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    fn seen_from(&mut self, addr: SocketAddr) {
        self.last_seen = addr;
        self.last_activity = Instant::now();
    }

    /// True if any recorded filter matches `topic`.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|f| topic_matches(f, topic))
    }
}

// ---------------------------------------------------------------------------
// Session table
// ---------------------------------------------------------------------------

/// All client sessions behind one mutex. Readers get point-in-time clones.
#[derive(Debug)]
pub struct SessionTable {
    sessions: Mutex<HashMap<IpAddr, ClientSession>>,
    max_clients: usize,
}

impl SessionTable {
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_clients,
        }
    }

    fn check_capacity(
        &self,
        sessions: &HashMap<IpAddr, ClientSession>,
        ip: &IpAddr,
    ) -> Result<(), SessionError> {
        if !sessions.contains_key(ip) && sessions.len() >= self.max_clients {
            return Err(SessionError::Full(self.max_clients));
        }
        Ok(())
    }

    /// Create or overwrite the session for `addr.ip()` and mark it connected.
    pub fn connect(
        &self,
        addr: SocketAddr,
        client_id: &str,
        keep_alive: u16,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        self.check_capacity(&sessions, &addr.ip())?;
        let mut session = ClientSession::new(addr);
        session.connected = true;
        session.client_id = client_id.to_string();
        session.keep_alive = keep_alive;
        sessions.insert(addr.ip(), session);
        Ok(())
    }

    /// Refresh `last_seen`, creating an unconnected session if none exists.
    pub fn touch(&self, addr: SocketAddr) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        if let Some(s) = sessions.get_mut(&addr.ip()) {
            s.seen_from(addr);
            return Ok(());
        }
        self.check_capacity(&sessions, &addr.ip())?;
        sessions.insert(addr.ip(), ClientSession::new(addr));
        Ok(())
    }

    /// Refresh `last_seen` of an existing session. Returns false if unknown.
    pub fn refresh(&self, addr: SocketAddr) -> bool {
        match self.sessions.lock().get_mut(&addr.ip()) {
            Some(s) => {
                s.seen_from(addr);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, ip: IpAddr) -> Option<ClientSession> {
        self.sessions.lock().get(&ip).cloned()
    }

    pub fn remove(&self, ip: IpAddr) -> Option<ClientSession> {
        self.sessions.lock().remove(&ip)
    }

    /// Snapshot of every session.
    pub fn all(&self) -> Vec<ClientSession> {
        self.sessions.lock().values().cloned().collect()
    }

    /// Snapshot of connected sessions only.
    pub fn connected(&self) -> Vec<ClientSession> {
        self.sessions
            .lock()
            .values()
            .filter(|s| s.connected)
            .cloned()
            .collect()
    }

    /// Record a topic filter. Returns false if the session is unknown.
    pub fn subscribe(&self, ip: IpAddr, filter: &str) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(s) = sessions.get_mut(&ip) else {
            return false;
        };
        if !s.subscriptions.iter().any(|f| f == filter) {
            s.subscriptions.push(filter.to_string());
        }
        true
    }

    /// Drop a topic filter. Returns true if it was recorded.
    pub fn unsubscribe(&self, ip: IpAddr, filter: &str) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(s) = sessions.get_mut(&ip) else {
            return false;
        };
        let before = s.subscriptions.len();
        s.subscriptions.retain(|f| f != filter);
        s.subscriptions.len() != before
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
