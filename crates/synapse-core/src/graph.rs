//! NeuronGraph: the shared, by-ID registry of neurons and their links.
//!
//! [`NeuronGraph`] is the single entry point for creating, linking, mutating
//! and deleting neurons. It is shared by every processor (`&NeuronGraph` is
//! `Sync`); each mutation touches only the locks of the neurons involved.
//!
//! # Invariants
//!
//! - Every link is recorded twice: in the source's outgoing list and in the
//!   target's incoming list. Both sides are updated by the same call.
//! - A link mutation clears the source neuron's WorkData; the target's view
//!   is built from its own outgoing links and is unaffected.
//! - Reserved ([`Known`]) and pinned neurons are never deleted, and a neuron
//!   is only deleted while nothing references it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::{DashMap, DashSet};

use crate::error::CoreError;
use crate::id::NeuronId;
use crate::known::Known;
use crate::link::{Link, LinkInfo};
use crate::neuron::{read, write, Neuron, NeuronData, NeuronRef, Prototype};
use crate::value::Value;

/// Receives change notifications from the graph.
pub trait GraphObserver: Send + Sync {
    /// A value neuron's payload or a variable's stored values changed.
    fn value_changed(&self, _neuron: NeuronId) {}
    /// A neuron's outgoing links or a cluster's children changed.
    fn links_changed(&self, _neuron: NeuronId) {}
    /// A neuron was removed from the graph.
    fn deleted(&self, _neuron: NeuronId) {}
}

pub struct NeuronGraph {
    neurons: DashMap<NeuronId, NeuronRef>,
    next_id: AtomicU64,
    pinned: DashSet<NeuronId>,
    observer: RwLock<Option<Arc<dyn GraphObserver>>>,
}

impl NeuronGraph {
    /// Creates a graph holding only the reserved neurons.
    pub fn new() -> Self {
        let neurons = DashMap::new();
        for known in Known::ALL {
            neurons.insert(known.id(), Arc::new(Neuron::new(known.id(), Prototype::Neuron)));
        }
        NeuronGraph {
            neurons,
            next_id: AtomicU64::new(Known::FIRST_FREE_ID),
            pinned: DashSet::new(),
            observer: RwLock::new(None),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn GraphObserver>) {
        *write(&self.observer) = Some(observer);
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get(&self, id: NeuronId) -> Option<NeuronRef> {
        self.neurons.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`get`](Self::get), but a missing neuron is an error.
    pub fn by_id(&self, id: NeuronId) -> Result<NeuronRef, CoreError> {
        self.get(id).ok_or(CoreError::NeuronNotFound { id })
    }

    pub fn is_existing_id(&self, id: NeuronId) -> bool {
        self.neurons.contains_key(&id)
    }

    /// Number of neurons, reserved ones included.
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// Renders a neuron for diagnostics.
    pub fn describe(&self, id: NeuronId) -> String {
        match self.get(id) {
            Some(neuron) => neuron.to_string(),
            None => format!("<missing {id}>"),
        }
    }

    /// Outgoing link targets of `id` with the given meaning.
    pub fn targets(&self, id: NeuronId, meaning: NeuronId) -> Vec<NeuronId> {
        self.get(id)
            .map(|n| {
                n.links_out()
                    .iter()
                    .filter(|l| l.meaning == meaning)
                    .map(|l| l.to)
                    .collect()
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates a neuron and returns its new ID.
    pub fn add(&self, prototype: Prototype) -> NeuronId {
        let id = NeuronId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let children = match &prototype {
            Prototype::Cluster { children, .. } => children.clone(),
            _ => Vec::new(),
        };
        self.neurons.insert(id, Arc::new(Neuron::new(id, prototype)));
        for child in children {
            if let Some(neuron) = self.get(child) {
                neuron.clustered_by_mut().push(id);
            }
        }
        id
    }

    pub fn add_cluster(&self, meaning: NeuronId, children: Vec<NeuronId>) -> NeuronId {
        self.add(Prototype::Cluster { meaning, children })
    }

    /// Protects a neuron from deletion.
    pub fn pin(&self, id: NeuronId) {
        self.pinned.insert(id);
    }

    pub fn is_protected(&self, id: NeuronId) -> bool {
        Known::from_id(id).is_some() || self.pinned.contains(&id)
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Adds `from -> to` tagged with `meaning`. Adding an existing link is a
    /// no-op.
    pub fn add_link(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Result<(), CoreError> {
        self.add_link_with_info(from, to, meaning, LinkInfo::NONE)
    }

    pub fn add_link_with_info(
        &self,
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
        info: LinkInfo,
    ) -> Result<(), CoreError> {
        let source = self.by_id(from)?;
        let target = self.by_id(to)?;
        self.by_id(meaning)?;

        let link = Link {
            from,
            to,
            meaning,
            info,
        };
        {
            let mut out = source.links_out_mut();
            if out.iter().any(|l| l.same_edge(&link)) {
                return Ok(());
            }
            out.push(link);
        }
        target.links_in_mut().push(link);
        source.work().clear();
        self.notify(|o| o.links_changed(from));
        Ok(())
    }

    /// Removes the link `from -> to` with `meaning`. Returns `false` if it did
    /// not exist.
    pub fn remove_link(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> bool {
        let probe = Link::new(from, to, meaning);
        let Some(source) = self.get(from) else {
            return false;
        };
        let removed = {
            let mut out = source.links_out_mut();
            let before = out.len();
            out.retain(|l| !l.same_edge(&probe));
            out.len() != before
        };
        if !removed {
            return false;
        }
        if let Some(target) = self.get(to) {
            target.links_in_mut().retain(|l| !l.same_edge(&probe));
        }
        source.work().clear();
        self.notify(|o| o.links_changed(from));
        true
    }

    // -----------------------------------------------------------------------
    // Payload mutation
    // -----------------------------------------------------------------------

    pub fn set_int(&self, id: NeuronId, value: i64) -> Result<(), CoreError> {
        let neuron = self.by_id(id)?;
        match neuron.data() {
            NeuronData::Int(slot) => *write(slot) = value,
            _ => return Err(CoreError::WrongKind { id, expected: "int" }),
        }
        tracing::trace!(neuron = %id, value, "int changed");
        self.notify(|o| o.value_changed(id));
        Ok(())
    }

    pub fn set_double(&self, id: NeuronId, value: f64) -> Result<(), CoreError> {
        let neuron = self.by_id(id)?;
        match neuron.data() {
            NeuronData::Double(slot) => *write(slot) = value,
            _ => return Err(CoreError::WrongKind { id, expected: "double" }),
        }
        tracing::trace!(neuron = %id, value, "double changed");
        self.notify(|o| o.value_changed(id));
        Ok(())
    }

    pub fn set_text(&self, id: NeuronId, value: impl Into<String>) -> Result<(), CoreError> {
        let neuron = self.by_id(id)?;
        match neuron.data() {
            NeuronData::Text(slot) => *write(slot) = value.into(),
            _ => return Err(CoreError::WrongKind { id, expected: "text" }),
        }
        tracing::trace!(neuron = %id, "text changed");
        self.notify(|o| o.value_changed(id));
        Ok(())
    }

    /// Replaces a variable's stored values.
    pub fn set_values(&self, id: NeuronId, values: Vec<Value>) -> Result<(), CoreError> {
        let neuron = self.by_id(id)?;
        match neuron.data() {
            NeuronData::Variable { values: slot, .. } => *write(slot) = values,
            _ => return Err(CoreError::WrongKind { id, expected: "variable" }),
        }
        self.notify(|o| o.value_changed(id));
        Ok(())
    }

    /// Appends `child` to a cluster.
    pub fn add_child(&self, cluster: NeuronId, child: NeuronId) -> Result<(), CoreError> {
        let owner = self.by_id(cluster)?;
        let member = self.by_id(child)?;
        match owner.data() {
            NeuronData::Cluster { children, .. } => write(children).push(child),
            _ => return Err(CoreError::WrongKind { id: cluster, expected: "cluster" }),
        }
        member.clustered_by_mut().push(cluster);
        self.notify(|o| o.links_changed(cluster));
        Ok(())
    }

    /// Removes the first occurrence of `child` from a cluster.
    pub fn remove_child(&self, cluster: NeuronId, child: NeuronId) -> Result<bool, CoreError> {
        let owner = self.by_id(cluster)?;
        let removed = match owner.data() {
            NeuronData::Cluster { children, .. } => {
                let mut children = write(children);
                match children.iter().position(|c| *c == child) {
                    Some(pos) => {
                        children.remove(pos);
                        true
                    }
                    None => false,
                }
            }
            _ => return Err(CoreError::WrongKind { id: cluster, expected: "cluster" }),
        };
        if removed {
            if let Some(member) = self.get(child) {
                let mut parents = member.clustered_by_mut();
                if let Some(pos) = parents.iter().position(|c| *c == cluster) {
                    parents.remove(pos);
                }
            }
            self.notify(|o| o.links_changed(cluster));
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Deletes a neuron that nothing references. Returns `false` (and changes
    /// nothing) for missing, reserved, pinned or still-referenced neurons.
    pub fn delete(&self, id: NeuronId) -> bool {
        self.delete_unless_referenced_outside(id, &HashSet::new())
    }

    /// Deletes `id` if every link or cluster referencing it originates in
    /// `dying`. Those references are removed along with the neuron.
    pub(crate) fn delete_unless_referenced_outside(
        &self,
        id: NeuronId,
        dying: &HashSet<NeuronId>,
    ) -> bool {
        if self.is_protected(id) {
            return false;
        }
        let Some(neuron) = self.get(id) else {
            return false;
        };
        let external = neuron.links_in().iter().any(|l| !dying.contains(&l.from))
            || neuron.clustered_by().iter().any(|c| !dying.contains(c));
        if external {
            return false;
        }

        for link in neuron.links_in() {
            if let Some(source) = self.get(link.from) {
                source.links_out_mut().retain(|l| !l.same_edge(&link));
                source.work().clear();
            }
        }
        neuron.links_in_mut().clear();

        for parent in neuron.clustered_by() {
            if let Some(cluster) = self.get(parent) {
                if let NeuronData::Cluster { children, .. } = cluster.data() {
                    write(children).retain(|c| *c != id);
                }
            }
        }
        neuron.clustered_by_mut().clear();

        for link in neuron.links_out() {
            if let Some(target) = self.get(link.to) {
                target.links_in_mut().retain(|l| !l.same_edge(&link));
            }
        }
        neuron.links_out_mut().clear();

        if let NeuronData::Cluster { children, .. } = neuron.data() {
            for child in read(children).iter() {
                if let Some(member) = self.get(*child) {
                    member.clustered_by_mut().retain(|c| *c != id);
                }
            }
        }

        neuron.work().clear();
        self.neurons.remove(&id);
        tracing::debug!(neuron = %id, "deleted");
        self.notify(|o| o.deleted(id));
        true
    }

    fn notify(&self, f: impl FnOnce(&dyn GraphObserver)) {
        let observer = read(&self.observer).clone();
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }
}

impl Default for NeuronGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NeuronGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuronGraph")
            .field("neurons", &self.neurons.len())
            .field("pinned", &self.pinned.len())
            .finish()
    }
}
