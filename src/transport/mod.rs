//! Point-to-point transport and membership contracts.
//!
//! The collective algorithms never open connections themselves. They drive
//! an implementation of [`Channel`] (asynchronous send/receive plus a
//! blocking wait) and read rank/size information from [`Membership`].
//! [`local`] provides an in-process implementation used by tests and the
//! `simulate_ring` binary.

pub mod local;

pub use local::{LocalCluster, LocalNode};

use crate::core::types::{CommunicationGroupInfo, NodeRole, Rank};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Handle of an in-flight send or receive.
///
/// Deliberately neither `Clone` nor `Copy`: [`Channel::wait`] consumes it, so
/// each request is waited on at most once by the step that issued it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a transport-assigned request number.
    pub fn new(id: u64) -> Self {
        RequestId(id)
    }

    /// Raw request number, for logging.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Destination of an asynchronous receive.
///
/// The transport fills the slot when the payload arrives; the caller takes
/// the bytes out after a successful [`Channel::wait`].
#[derive(Debug, Clone, Default)]
pub struct ReceiveSlot {
    inner: Arc<Mutex<Option<Vec<u8>>>>,
}

impl ReceiveSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a received payload, replacing any previous one.
    pub fn fill(&self, payload: Vec<u8>) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(payload);
    }

    /// Take the payload out, leaving the slot empty.
    pub fn take(&self) -> Option<Vec<u8>> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.take()
    }

    /// Whether a payload is waiting.
    pub fn is_filled(&self) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.is_some()
    }
}

/// Asynchronous point-to-point channel between cluster nodes.
pub trait Channel: Send + Sync {
    /// Start sending `payload` to `dest` within the `role` group. The payload
    /// is copied before returning.
    fn send_async(&self, role: NodeRole, dest: Rank, payload: &[u8]) -> RequestId;

    /// Start receiving the next payload from `source` within the `role` group.
    fn receive_async(&self, role: NodeRole, source: Rank) -> (RequestId, ReceiveSlot);

    /// Block until `request` completes or `timeout` expires. Returns `false`
    /// on expiry or failure.
    fn wait(&self, request: RequestId, timeout: Duration) -> bool;
}

/// Cluster membership as seen by the local node.
pub trait Membership: Send + Sync {
    /// Global rank of the local node within its role.
    fn rank_id(&self) -> Rank;

    /// Role of the local node.
    fn role(&self) -> NodeRole;

    /// Current number of nodes with `role`.
    fn group_size(&self, role: NodeRole) -> u32;

    /// Resolve a sub-group's local-to-global rank mapping.
    fn group_to_global_mapping(&self, group: &CommunicationGroupInfo) -> BTreeMap<Rank, Rank> {
        group.group_to_global_ranks.clone()
    }
}

/// A cluster node that is both a channel endpoint and a membership handle.
pub trait CommNode: Channel + Membership {}

impl<N: Channel + Membership + ?Sized> CommNode for N {}
