use crate::error::PendingError;
use dns::DomainName;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A client query that was forwarded upstream and waits for its answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingQuery {
    pub transaction_id: u16,
    pub client: SocketAddr,
    pub question: DomainName,
    pub created_at: Instant,
}

impl PendingQuery {
    pub fn new(transaction_id: u16, client: SocketAddr, question: DomainName) -> Self {
        Self {
            transaction_id,
            client,
            question,
            created_at: Instant::now(),
        }
    }
}

/// What `register` does when a live entry already holds the transaction id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Reject,
    Replace,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        DuplicatePolicy::Replace
    }
}

/// In-flight queries keyed by transaction id. An entry is expired once its
/// age reaches the timeout; expired entries never match.
pub struct PendingTable {
    h_map: HashMap<u16, PendingQuery>,
    timeout: Duration,
}

impl PendingTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            h_map: HashMap::new(),
            timeout,
        }
    }

    fn is_expired(&self, query: &PendingQuery, now: Instant) -> bool {
        now.saturating_duration_since(query.created_at) >= self.timeout
    }

    /// Returns the live entry displaced under [`DuplicatePolicy::Replace`].
    pub fn register(
        &mut self,
        query: PendingQuery,
        policy: DuplicatePolicy,
        now: Instant,
    ) -> Result<Option<PendingQuery>, PendingError> {
        let id = query.transaction_id;

        let live_holder = match self.h_map.get(&id) {
            Some(existing) => !self.is_expired(existing, now),
            None => false,
        };

        if live_holder && policy == DuplicatePolicy::Reject {
            return Err(PendingError::DuplicateTransaction { transaction_id: id });
        }

        let previous = self.h_map.insert(id, query);
        if live_holder {
            Ok(previous)
        } else {
            Ok(None)
        }
    }

    /// Removes and returns the entry for `transaction_id` if it is live and,
    /// when `question` is given, was registered for that name. A mismatching
    /// name leaves the entry in place.
    pub fn resolve(
        &mut self,
        transaction_id: u16,
        question: Option<&DomainName>,
        now: Instant,
    ) -> Option<PendingQuery> {
        let entry = self.h_map.get(&transaction_id)?;

        if self.is_expired(entry, now) {
            self.h_map.remove(&transaction_id);
            return None;
        }

        if let Some(name) = question {
            if *name != entry.question {
                return None;
            }
        }

        self.h_map.remove(&transaction_id)
    }

    /// Removes `query` only if it still holds its transaction id. An entry
    /// that replaced it since registration is left alone.
    pub fn withdraw(&mut self, query: &PendingQuery) -> bool {
        match self.h_map.get(&query.transaction_id) {
            Some(current) if current == query => {
                self.h_map.remove(&query.transaction_id);
                true
            }
            _ => false,
        }
    }

    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.h_map.len();
        self.h_map
            .retain(|_, q| now.saturating_duration_since(q.created_at) < timeout);

        before - self.h_map.len()
    }

    pub fn len(&self) -> usize {
        self.h_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h_map.is_empty()
    }
}
