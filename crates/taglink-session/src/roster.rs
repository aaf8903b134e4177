//! The roster: the server's authoritative view of its clients.
//!
//! Two indexes, kept in lockstep: the primary `id → record` map and a
//! secondary `name → ids` map for name-addressed fan-out. All mutation
//! happens through this type so the indexes can never disagree.
//!
//! # Concurrency note
//!
//! `Roster` is not thread-safe by itself — it is owned by the server and
//! guarded by the server's mutex. Keeping it plain avoids hidden locking
//! and makes the index invariant easy to test in isolation.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::{ClientRecord, SessionError};

/// Id allocation starts here; 0 is the unregistered placeholder on the
/// wire and −1 the client-side sentinel, so neither is ever allocated.
pub const FIRST_CLIENT_ID: i16 = 1;

/// All accepted clients, indexed by id and by name.
pub struct Roster {
    /// Primary index: one record per assigned id.
    records: HashMap<i16, ClientRecord>,

    /// Secondary index: the ids registered under each name, in admission
    /// order. An entry exists exactly while at least one id carries the
    /// name.
    names: HashMap<String, Vec<i16>>,

    /// Next id to hand out. Monotonic; never reused within a roster.
    next_id: i16,
}

impl Roster {
    /// Creates an empty roster allocating ids from [`FIRST_CLIENT_ID`].
    pub fn new() -> Self {
        Self::starting_at(FIRST_CLIENT_ID)
    }

    /// Creates an empty roster with an explicit starting counter.
    pub fn starting_at(first_id: i16) -> Self {
        Self {
            records: HashMap::new(),
            names: HashMap::new(),
            next_id: first_id,
        }
    }

    /// Accepts a client: allocates the next id, inserts the record into
    /// both indexes with `alive = true`, and returns it.
    pub fn admit(&mut self, name: &str, endpoint: SocketAddr) -> &ClientRecord {
        let id = self.next_id;
        self.next_id += 1;

        let record = ClientRecord {
            id,
            name: name.to_string(),
            endpoint,
            alive: true,
        };
        self.names.entry(name.to_string()).or_default().push(id);
        self.records.insert(id, record);

        tracing::info!(%id, name, %endpoint, "client admitted");
        self.records.get(&id).expect("just inserted")
    }

    /// Removes a client from both indexes and returns its record.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownClient`] if no record exists.
    pub fn evict(&mut self, id: i16) -> Result<ClientRecord, SessionError> {
        let record = self
            .records
            .remove(&id)
            .ok_or(SessionError::UnknownClient(id))?;

        if let Some(ids) = self.names.get_mut(&record.name) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.names.remove(&record.name);
            }
        }

        tracing::info!(%id, name = %record.name, "client evicted");
        Ok(record)
    }

    /// Drops a stale record for a re-handshaking sender id, if one exists.
    /// The replacement is admitted separately under a fresh id.
    pub fn remove_stale(&mut self, id: i16) {
        if self.records.contains_key(&id) {
            tracing::debug!(%id, "replacing stale record on re-handshake");
            let _ = self.evict(id);
        }
    }

    /// Marks a client alive (its pong arrived). Returns whether the id
    /// was known.
    pub fn mark_alive(&mut self, id: i16) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.alive = true;
                true
            }
            None => false,
        }
    }

    /// Marks every client suspect. Called when pings go out; pongs flip
    /// their senders back before the eviction deadline.
    pub fn mark_all_suspect(&mut self) {
        for record in self.records.values_mut() {
            record.alive = false;
        }
    }

    /// Snapshot of the clients still marked suspect.
    pub fn silent(&self) -> Vec<ClientRecord> {
        self.records
            .values()
            .filter(|record| !record.alive)
            .cloned()
            .collect()
    }

    /// Whether a record exists for this id.
    pub fn contains(&self, id: i16) -> bool {
        self.records.contains_key(&id)
    }

    /// The record for an id, if any.
    pub fn get(&self, id: i16) -> Option<&ClientRecord> {
        self.records.get(&id)
    }

    /// The endpoint registered for an id, if any.
    pub fn endpoint_of(&self, id: i16) -> Option<SocketAddr> {
        self.records.get(&id).map(|record| record.endpoint)
    }

    /// The ids registered under a name, in admission order.
    pub fn ids_named(&self, name: &str) -> Vec<i16> {
        self.names.get(name).cloned().unwrap_or_default()
    }

    /// Snapshot of every record. Fan-out sends iterate this copy so a
    /// concurrent eviction cannot invalidate the iteration.
    pub fn records(&self) -> Vec<ClientRecord> {
        self.records.values().cloned().collect()
    }

    /// Number of accepted clients.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
