//! Correlation table - pending request ids and what they asked for

use std::collections::HashMap;
use tokio::time::Instant;

use crate::core::{Error, Result};
use crate::protocol::request::Method;

/// Why a request was sent, so its reply can be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Logon,
    MassStatus,
    NewOrder,
    Cancel,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Logon => "logon",
            Purpose::MassStatus => "mass_status",
            Purpose::NewOrder => "new_order",
            Purpose::Cancel => "cancel",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Purpose::Logon => Method::Logon,
            Purpose::MassStatus => Method::OrderMassStatusRequest,
            Purpose::NewOrder => Method::NewOrderSingle,
            Purpose::Cancel => Method::OrderCancelRequest,
        }
    }

    /// Mass status is answered through notifications, so a deadline on its
    /// direct response would fire spuriously.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Purpose::MassStatus)
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    purpose: Purpose,
    deadline: Option<Instant>,
}

/// Outstanding requests, keyed by correlation id.
///
/// Each entry is consumed exactly once by [`CorrelationTable::resolve`].
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: HashMap<u64, Entry>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: u64, purpose: Purpose) -> Result<()> {
        self.insert(id, Entry { purpose, deadline: None })
    }

    pub fn register_with_deadline(&mut self, id: u64, purpose: Purpose, deadline: Instant) -> Result<()> {
        self.insert(id, Entry { purpose, deadline: Some(deadline) })
    }

    fn insert(&mut self, id: u64, entry: Entry) -> Result<()> {
        if self.pending.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        self.pending.insert(id, entry);
        Ok(())
    }

    /// Remove and return the purpose registered under `id`.
    pub fn resolve(&mut self, id: u64) -> Result<Purpose> {
        self.pending
            .remove(&id)
            .map(|entry| entry.purpose)
            .ok_or(Error::UnknownId(id))
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among outstanding entries
    pub fn next_deadline(&self) -> Option<(u64, Purpose, Instant)> {
        self.pending
            .iter()
            .filter_map(|(id, e)| e.deadline.map(|d| (*id, e.purpose, d)))
            .min_by_key(|(id, _, d)| (*d, *id))
    }
}
