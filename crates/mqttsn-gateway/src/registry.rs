// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global topic registry.
//!
//! One name <-> id mapping shared by every client. Ids start at 1, are
//! handed out in order and never reused; 0 means "unregistered" on the wire.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

/// Upper bound on the number of topics when none is configured.
pub const DEFAULT_MAX_TOPICS: u16 = u16::MAX;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("topic id space exhausted ({0} topics registered)")]
    Exhausted(u16),

    #[error("empty topic name")]
    EmptyName,
}

/// One registered topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRegistration {
    pub name: String,
    pub id: u16,
}

struct Inner {
    by_name: HashMap<String, u16>,
    by_id: HashMap<u16, String>,
    next_id: u16,
}

/// Thread-safe topic registry. Both maps and the counter live under a
/// single mutex so every mutation is atomic.
pub struct TopicRegistry {
    inner: Mutex<Inner>,
    max_topics: u16,
}

impl TopicRegistry {
    pub fn new(max_topics: u16) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_name: HashMap::new(),
                by_id: HashMap::new(),
                next_id: 1,
            }),
            max_topics,
        }
    }

    /// Return the id for `name`, assigning the next free one if unseen.
    pub fn resolve(&self, name: &str) -> Result<u16, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_name.get(name) {
            return Ok(id);
        }

        let id = inner.next_id;
        if id == 0 || id > self.max_topics {
            return Err(RegistryError::Exhausted(inner.by_id.len() as u16));
        }
        // Wraps to 0 after u16::MAX, which the check above treats as exhausted.
        inner.next_id = id.wrapping_add(1);
        inner.by_name.insert(name.to_string(), id);
        inner.by_id.insert(id, name.to_string());
        drop(inner);

        tracing::info!(topic = name, topic_id = id, "registered topic");
        Ok(id)
    }

    /// Name registered under `id`, if any.
    pub fn lookup(&self, id: u16) -> Option<String> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Id registered for `name`, without assigning one.
    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.inner.lock().by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registrations, sorted by id.
    pub fn snapshot(&self) -> Vec<TopicRegistration> {
        let mut out: Vec<TopicRegistration> = self
            .inner
            .lock()
            .by_id
            .iter()
            .map(|(&id, name)| TopicRegistration {
                name: name.clone(),
                id,
            })
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOPICS)
    }
}

/// MQTT topic filter matching: `+` matches one level, a trailing `#`
/// matches any number of remaining levels (including none).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return f.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(a), Some(b)) if a == b => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// True if `filter` contains MQTT wildcards.
pub fn is_wildcard(filter: &str) -> bool {
    filter.split('/').any(|level| level == "+" || level == "#")
}
