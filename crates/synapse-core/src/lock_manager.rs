//! Per-neuron leveled lock manager for concurrent processors.
//!
//! [`LockManager`] grants exclusive locks on four levels of a neuron: the
//! whole neuron, its incoming links, its outgoing links, or its value. A
//! whole-neuron lock conflicts with every level; the other levels only
//! conflict with themselves. Locks are re-entrant per processor.
//!
//! A batch ([`LockRequestList`]) is normalized before acquisition: requests
//! are sorted by `(neuron, level)`, duplicates are removed and a whole-neuron
//! request absorbs the other levels of the same neuron. The normalized batch
//! is then granted all-or-nothing under the table mutex, so two processors
//! asking for the same neurons in different orders cannot deadlock on each
//! other's partial grants.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{NeuronId, ProcessorId};

/// Which part of a neuron a lock covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockLevel {
    All,
    LinksIn,
    LinksOut,
    Value,
}

impl LockLevel {
    pub fn conflicts_with(self, other: LockLevel) -> bool {
        self == LockLevel::All || other == LockLevel::All || self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockRequest {
    pub neuron: NeuronId,
    pub level: LockLevel,
}

/// A batch of lock requests acquired together.
#[derive(Debug, Clone, Default)]
pub struct LockRequestList {
    requests: SmallVec<[LockRequest; 8]>,
}

impl LockRequestList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, neuron: NeuronId, level: LockLevel) {
        self.requests.push(LockRequest { neuron, level });
    }

    /// Requests full access to a neuron.
    pub fn lock_neuron(&mut self, neuron: NeuronId) {
        self.push(neuron, LockLevel::All);
    }

    /// Requests one endpoint of a link. Endpoints come in `(from, to)` pairs:
    /// even positions lock the source's outgoing links, odd positions the
    /// target's incoming links.
    pub fn lock_link_endpoint(&mut self, position: usize, neuron: NeuronId) {
        let level = if position % 2 == 0 {
            LockLevel::LinksOut
        } else {
            LockLevel::LinksIn
        };
        self.push(neuron, level);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockRequest> {
        self.requests.iter()
    }

    /// The requests in acquisition order: sorted by `(neuron, level)`,
    /// deduplicated, with whole-neuron requests absorbing finer ones.
    pub fn normalized(&self) -> Vec<LockRequest> {
        let mut sorted: Vec<LockRequest> = self.requests.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut result: Vec<LockRequest> = Vec::with_capacity(sorted.len());
        for request in sorted {
            // `All` sorts first for a neuron, so it is already in `result`.
            let absorbed = result
                .last()
                .is_some_and(|prev| prev.neuron == request.neuron && prev.level == LockLevel::All);
            if !absorbed {
                result.push(request);
            }
        }
        result
    }
}

/// A request that could not be granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockDenial {
    pub neuron: NeuronId,
    pub level: LockLevel,
    pub holder: ProcessorId,
}

/// Errors from lock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// A conflicting lock is held by another processor.
    #[error("neuron {} ({:?}) is locked by processor {}", .0.neuron, .0.level, .0.holder)]
    AlreadyHeld(LockDenial),

    /// Waited longer than the configured timeout.
    #[error("timed out waiting for neuron {} ({:?}) held by processor {}", .0.neuron, .0.level, .0.holder)]
    Timeout(LockDenial),

    /// The processor does not hold the lock it tried to release.
    #[error("lock not held: neuron {neuron} ({level:?}) by processor {owner}")]
    NotHeld {
        neuron: NeuronId,
        level: LockLevel,
        owner: ProcessorId,
    },
}

/// Status entry for one held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatusEntry {
    pub neuron: NeuronId,
    pub level: LockLevel,
    pub holder: ProcessorId,
    /// Re-entrant acquisition count.
    pub count: usize,
}

#[derive(Debug)]
struct Hold {
    owner: ProcessorId,
    level: LockLevel,
    count: usize,
}

type LockTable = HashMap<NeuronId, SmallVec<[Hold; 2]>>;

pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Option<Duration>,
}

impl LockManager {
    /// Creates a lock manager that waits indefinitely for conflicting locks.
    pub fn new() -> Self {
        LockManager {
            table: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            timeout: None,
        }
    }

    /// Creates a lock manager whose blocking acquisitions give up after
    /// `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        LockManager {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tries to grant the whole batch without waiting.
    pub fn try_acquire(
        self: &Arc<Self>,
        owner: ProcessorId,
        list: &LockRequestList,
    ) -> Result<HeldLocks, LockError> {
        let requests = list.normalized();
        let mut table = self.table();
        if let Some(denial) = first_conflict(&table, owner, &requests) {
            return Err(LockError::AlreadyHeld(denial));
        }
        grant(&mut table, owner, &requests);
        Ok(HeldLocks::new(Arc::clone(self), owner, requests))
    }

    /// Grants the whole batch, blocking until no other processor holds a
    /// conflicting lock (or until the timeout expires).
    pub fn acquire(
        self: &Arc<Self>,
        owner: ProcessorId,
        list: &LockRequestList,
    ) -> Result<HeldLocks, LockError> {
        let requests = list.normalized();
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut table = self.table();
        loop {
            let Some(denial) = first_conflict(&table, owner, &requests) else {
                grant(&mut table, owner, &requests);
                tracing::debug!(processor = %owner, count = requests.len(), "locks granted");
                return Ok(HeldLocks::new(Arc::clone(self), owner, requests));
            };
            table = match deadline {
                None => self
                    .released
                    .wait(table)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(processor = %owner, neuron = %denial.neuron, "lock wait timed out");
                        return Err(LockError::Timeout(denial));
                    }
                    self.released
                        .wait_timeout(table, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    /// Releases one acquisition of each request.
    pub fn release(&self, owner: ProcessorId, requests: &[LockRequest]) -> Result<(), LockError> {
        let mut table = self.table();
        let mut result = Ok(());
        for request in requests {
            let missing = LockError::NotHeld {
                neuron: request.neuron,
                level: request.level,
                owner,
            };
            let Some(holds) = table.get_mut(&request.neuron) else {
                result = Err(missing);
                continue;
            };
            match holds
                .iter()
                .position(|h| h.owner == owner && h.level == request.level)
            {
                Some(pos) => {
                    holds[pos].count -= 1;
                    if holds[pos].count == 0 {
                        holds.remove(pos);
                    }
                    if holds.is_empty() {
                        table.remove(&request.neuron);
                    }
                }
                None => result = Err(missing),
            }
        }
        drop(table);
        self.released.notify_all();
        result
    }

    /// Releases every lock held by `owner`. Returns the released neurons.
    pub fn release_all(&self, owner: ProcessorId) -> Vec<NeuronId> {
        let mut table = self.table();
        let mut released = Vec::new();
        table.retain(|neuron, holds| {
            let before = holds.len();
            holds.retain(|h| h.owner != owner);
            if holds.len() != before {
                released.push(*neuron);
            }
            !holds.is_empty()
        });
        drop(table);
        self.released.notify_all();
        released.sort();
        released
    }

    /// Returns every held lock, sorted by neuron and level.
    pub fn status(&self) -> Vec<LockStatusEntry> {
        let table = self.table();
        let mut entries: Vec<LockStatusEntry> = table
            .iter()
            .flat_map(|(neuron, holds)| {
                holds.iter().map(move |h| LockStatusEntry {
                    neuron: *neuron,
                    level: h.level,
                    holder: h.owner,
                    count: h.count,
                })
            })
            .collect();
        entries.sort_by_key(|e| (e.neuron, e.level));
        entries
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn first_conflict(
    table: &LockTable,
    owner: ProcessorId,
    requests: &[LockRequest],
) -> Option<LockDenial> {
    requests.iter().find_map(|request| {
        table.get(&request.neuron)?.iter().find_map(|hold| {
            (hold.owner != owner && hold.level.conflicts_with(request.level)).then_some(
                LockDenial {
                    neuron: request.neuron,
                    level: request.level,
                    holder: hold.owner,
                },
            )
        })
    })
}

fn grant(table: &mut LockTable, owner: ProcessorId, requests: &[LockRequest]) {
    for request in requests {
        let holds = table.entry(request.neuron).or_default();
        match holds
            .iter_mut()
            .find(|h| h.owner == owner && h.level == request.level)
        {
            Some(hold) => hold.count += 1,
            None => holds.push(Hold {
                owner,
                level: request.level,
                count: 1,
            }),
        }
    }
}

/// A granted batch. Dropping it releases the locks, so they are freed on
/// every exit path of the code holding them.
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct HeldLocks {
    manager: Arc<LockManager>,
    owner: ProcessorId,
    requests: Vec<LockRequest>,
}

impl HeldLocks {
    fn new(manager: Arc<LockManager>, owner: ProcessorId, requests: Vec<LockRequest>) -> Self {
        HeldLocks {
            manager,
            owner,
            requests,
        }
    }

    pub fn owner(&self) -> ProcessorId {
        self.owner
    }

    pub fn requests(&self) -> &[LockRequest] {
        &self.requests
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        if let Err(error) = self.manager.release(self.owner, &self.requests) {
            tracing::error!(%error, "releasing held locks");
        }
    }
}

impl std::fmt::Debug for HeldLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldLocks")
            .field("owner", &self.owner)
            .field("requests", &self.requests)
            .finish()
    }
}
