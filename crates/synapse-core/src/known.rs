//! Well-known neurons reserved by every graph.
//!
//! Link meanings, comparison operators, loop styles and the two boolean
//! literals are ordinary neurons with fixed IDs. The graph creates them at
//! construction and refuses to delete them, so producers and the executor can
//! refer to them without a lookup table.

use serde::{Deserialize, Serialize};

use crate::id::NeuronId;

/// A reserved neuron with a fixed ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum Known {
    // Literals
    True = 1,
    False,

    // Link meanings
    LeftPart,
    RightPart,
    Operator,
    Statements,
    Condition,
    Conditions,
    LoopStyle,
    LoopItem,
    CaseItem,
    Instruction,
    Arguments,
    Argument,
    NeuronsToLock,
    LinksToLock,

    // Operators
    Equal,
    Different,
    Bigger,
    BiggerOrEqual,
    Smaller,
    SmallerOrEqual,
    And,
    Or,
    Contains,
    NotContains,

    // Loop styles
    Normal,
    Case,
    Looped,
    CaseLooped,
    Until,
    ForEach,
    QueryLoop,
    QueryLoopIn,
    QueryLoopOut,
    QueryLoopClusters,
    QueryLoopChildren,
}

impl Known {
    /// Every reserved neuron, in ID order.
    pub const ALL: [Known; 37] = [
        Known::True,
        Known::False,
        Known::LeftPart,
        Known::RightPart,
        Known::Operator,
        Known::Statements,
        Known::Condition,
        Known::Conditions,
        Known::LoopStyle,
        Known::LoopItem,
        Known::CaseItem,
        Known::Instruction,
        Known::Arguments,
        Known::Argument,
        Known::NeuronsToLock,
        Known::LinksToLock,
        Known::Equal,
        Known::Different,
        Known::Bigger,
        Known::BiggerOrEqual,
        Known::Smaller,
        Known::SmallerOrEqual,
        Known::And,
        Known::Or,
        Known::Contains,
        Known::NotContains,
        Known::Normal,
        Known::Case,
        Known::Looped,
        Known::CaseLooped,
        Known::Until,
        Known::ForEach,
        Known::QueryLoop,
        Known::QueryLoopIn,
        Known::QueryLoopOut,
        Known::QueryLoopClusters,
        Known::QueryLoopChildren,
    ];

    /// First ID available to ordinary neurons.
    pub const FIRST_FREE_ID: u64 = Known::QueryLoopChildren as u64 + 1;

    /// The reserved ID of this neuron.
    pub const fn id(self) -> NeuronId {
        NeuronId(self as u64)
    }

    /// Maps an ID back to its reserved neuron, if it is one.
    pub fn from_id(id: NeuronId) -> Option<Known> {
        if id.0 == 0 || id.0 >= Self::FIRST_FREE_ID {
            return None;
        }
        Some(Self::ALL[(id.0 - 1) as usize])
    }

    /// Returns `true` if `id` is this reserved neuron.
    pub fn is(self, id: NeuronId) -> bool {
        self.id() == id
    }

    /// Returns `true` for comparison and logic operators.
    pub fn is_operator(self) -> bool {
        (Known::Equal as u64..=Known::NotContains as u64).contains(&(self as u64))
    }

    /// Returns `true` for conditional-statement loop styles.
    pub fn is_loop_style(self) -> bool {
        (Known::Normal as u64..=Known::QueryLoopChildren as u64).contains(&(self as u64))
    }

    /// Human readable name used when rendering neurons.
    pub fn name(self) -> &'static str {
        match self {
            Known::True => "True",
            Known::False => "False",
            Known::LeftPart => "LeftPart",
            Known::RightPart => "RightPart",
            Known::Operator => "Operator",
            Known::Statements => "Statements",
            Known::Condition => "Condition",
            Known::Conditions => "Conditions",
            Known::LoopStyle => "LoopStyle",
            Known::LoopItem => "LoopItem",
            Known::CaseItem => "CaseItem",
            Known::Instruction => "Instruction",
            Known::Arguments => "Arguments",
            Known::Argument => "Argument",
            Known::NeuronsToLock => "NeuronsToLock",
            Known::LinksToLock => "LinksToLock",
            Known::Equal => "Equal",
            Known::Different => "Different",
            Known::Bigger => "Bigger",
            Known::BiggerOrEqual => "BiggerOrEqual",
            Known::Smaller => "Smaller",
            Known::SmallerOrEqual => "SmallerOrEqual",
            Known::And => "And",
            Known::Or => "Or",
            Known::Contains => "Contains",
            Known::NotContains => "NotContains",
            Known::Normal => "Normal",
            Known::Case => "Case",
            Known::Looped => "Looped",
            Known::CaseLooped => "CaseLooped",
            Known::Until => "Until",
            Known::ForEach => "ForEach",
            Known::QueryLoop => "QueryLoop",
            Known::QueryLoopIn => "QueryLoopIn",
            Known::QueryLoopOut => "QueryLoopOut",
            Known::QueryLoopClusters => "QueryLoopClusters",
            Known::QueryLoopChildren => "QueryLoopChildren",
        }
    }
}

impl From<Known> for NeuronId {
    fn from(known: Known) -> Self {
        known.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_round_trip() {
        for (idx, known) in Known::ALL.iter().enumerate() {
            assert_eq!(known.id(), NeuronId(idx as u64 + 1));
            assert_eq!(Known::from_id(known.id()), Some(*known));
        }
    }

    #[test]
    fn from_id_rejects_ordinary_ids() {
        assert_eq!(Known::from_id(NeuronId(0)), None);
        assert_eq!(Known::from_id(NeuronId(Known::FIRST_FREE_ID)), None);
    }

    #[test]
    fn categories() {
        assert!(Known::Bigger.is_operator());
        assert!(!Known::Bigger.is_loop_style());
        assert!(Known::ForEach.is_loop_style());
        assert!(!Known::True.is_operator());
        assert!(!Known::Statements.is_loop_style());
    }
}
