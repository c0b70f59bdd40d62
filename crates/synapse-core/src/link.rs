//! Directed, meaning-tagged links between neurons.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NeuronId;

/// Auxiliary flags carried by a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LinkInfo(u8);

impl LinkInfo {
    pub const NONE: LinkInfo = LinkInfo(0);
    /// Marks the only link a loop path may take through its source.
    pub const UNIQUE: LinkInfo = LinkInfo(1);

    pub fn contains(self, other: LinkInfo) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: LinkInfo) -> LinkInfo {
        LinkInfo(self.0 | other.0)
    }
}

/// A directed edge `from -> to`, tagged by a meaning neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: NeuronId,
    pub to: NeuronId,
    pub meaning: NeuronId,
    #[serde(default)]
    pub info: LinkInfo,
}

impl Link {
    pub fn new(from: NeuronId, to: NeuronId, meaning: NeuronId) -> Self {
        Link {
            from,
            to,
            meaning,
            info: LinkInfo::NONE,
        }
    }

    /// Same endpoints and meaning, ignoring flags.
    pub fn same_edge(&self, other: &Link) -> bool {
        self.from == other.from && self.to == other.to && self.meaning == other.meaning
    }
}

/// Caller-owned snapshot of a link list. Expressions rarely have more than a
/// handful of operands, so the common case stays on the stack.
pub type LinkBuffer = SmallVec<[Link; 8]>;
