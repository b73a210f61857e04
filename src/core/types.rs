//! Core data types for the ring collective engine.
//!
//! This module defines node roles, the group view a collective call runs
//! against, sub-group descriptions for broadcast, and reduction operators.

use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rank of a node within a communication group.
pub type Rank = u32;

/// Role a node plays in the parameter-server cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Training worker
    Worker,
    /// Parameter/aggregation server
    Server,
    /// Cluster scheduler, never part of a collective group
    Scheduler,
}

impl Default for NodeRole {
    fn default() -> Self {
        NodeRole::Server
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Worker => write!(f, "worker"),
            NodeRole::Server => write!(f, "server"),
            NodeRole::Scheduler => write!(f, "scheduler"),
        }
    }
}

/// This node's position in a communication group.
///
/// Captured when the engine is (re)initialized or at the start of a call,
/// and never mutated while a collective operation is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    rank_id: Rank,
    rank_size: u32,
    role: NodeRole,
    group_to_global: Option<BTreeMap<Rank, Rank>>,
}

impl GroupView {
    /// Create a view, checking `rank_size >= 1` and `rank_id < rank_size`.
    pub fn new(rank_id: Rank, rank_size: u32, role: NodeRole) -> Result<Self> {
        if rank_size == 0 {
            return Err(CollectiveError::invalid_argument(
                "Rank size should not be 0.",
            ));
        }
        if rank_id >= rank_size {
            return Err(CollectiveError::invalid_argument(format!(
                "Rank id {} is out of range for group size {}",
                rank_id, rank_size
            )));
        }

        Ok(GroupView {
            rank_id,
            rank_size,
            role,
            group_to_global: None,
        })
    }

    /// Attach a local-to-global rank mapping for sub-group operations.
    pub fn with_group_mapping(mut self, mapping: BTreeMap<Rank, Rank>) -> Self {
        self.group_to_global = Some(mapping);
        self
    }

    /// Rank of this node.
    pub fn rank_id(&self) -> Rank {
        self.rank_id
    }

    /// Number of nodes in the group.
    pub fn rank_size(&self) -> u32 {
        self.rank_size
    }

    /// Role whose channel the group communicates over.
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Local-to-global rank mapping, if this is a sub-group view.
    pub fn group_to_global(&self) -> Option<&BTreeMap<Rank, Rank>> {
        self.group_to_global.as_ref()
    }

    /// Ring successor, `(rank + 1) mod size`.
    pub fn successor(&self) -> Rank {
        (self.rank_id + 1) % self.rank_size
    }

    /// Ring predecessor, `(rank - 1) mod size`.
    pub fn predecessor(&self) -> Rank {
        (self.rank_id + self.rank_size - 1) % self.rank_size
    }

    /// Whether this group contains only the local node.
    pub fn is_single(&self) -> bool {
        self.rank_size == 1
    }
}

/// Description of a sub-group used by broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationGroupInfo {
    /// Number of members in the sub-group
    pub size: u32,
    /// Global ranks of the members, in group-local rank order
    pub group_ranks: Vec<Rank>,
    /// Group-local rank to global rank
    pub group_to_global_ranks: BTreeMap<Rank, Rank>,
    /// Global rank to group-local rank
    pub global_to_group_ranks: BTreeMap<Rank, Rank>,
}

impl CommunicationGroupInfo {
    /// Build a sub-group from global ranks listed in group-local order.
    pub fn from_global_ranks(group_ranks: Vec<Rank>) -> Self {
        let mut group_to_global_ranks = BTreeMap::new();
        let mut global_to_group_ranks = BTreeMap::new();
        for (local, &global) in group_ranks.iter().enumerate() {
            group_to_global_ranks.insert(local as Rank, global);
            global_to_group_ranks.insert(global, local as Rank);
        }

        CommunicationGroupInfo {
            size: group_ranks.len() as u32,
            group_ranks,
            group_to_global_ranks,
            global_to_group_ranks,
        }
    }
}

/// Elementwise reduction applied by AllReduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceOp {
    /// Sum of all inputs
    Sum,
    /// Product of all inputs
    Prod,
    /// Minimum of all inputs
    Min,
    /// Maximum of all inputs
    Max,
}

impl Default for ReduceOp {
    fn default() -> Self {
        ReduceOp::Sum
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceOp::Sum => write!(f, "sum"),
            ReduceOp::Prod => write!(f, "prod"),
            ReduceOp::Min => write!(f, "min"),
            ReduceOp::Max => write!(f, "max"),
        }
    }
}

impl ReduceOp {
    /// Fold `value` into `acc`. Integer sums and products wrap on overflow.
    #[inline]
    pub fn apply<T: CollectiveElement>(&self, acc: &mut T, value: T) {
        match self {
            ReduceOp::Sum => *acc = (*acc).reduce_add(value),
            ReduceOp::Prod => *acc = (*acc).reduce_mul(value),
            ReduceOp::Min => {
                if value < *acc {
                    *acc = value;
                }
            }
            ReduceOp::Max => {
                if value > *acc {
                    *acc = value;
                }
            }
        }
    }

    /// Fold `src` into `dst` elementwise. Both slices must have equal length.
    pub fn reduce_into<T: CollectiveElement>(&self, dst: &mut [T], src: &[T]) {
        debug_assert_eq!(dst.len(), src.len());
        for (acc, &value) in dst.iter_mut().zip(src) {
            self.apply(acc, value);
        }
    }
}
