//! In-process cluster transport.
//!
//! Every `(role, source, dest)` pair gets its own FIFO mailbox, created on
//! first use. Sends complete as soon as the payload is queued; a receive wait
//! blocks on the mailbox for at most the caller's timeout. Nodes can be
//! disconnected to simulate dead peers, and the cluster can be resized to
//! simulate scaling events.

use super::{Channel, Membership, ReceiveSlot, RequestId};
use crate::core::types::{NodeRole, Rank};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

type Mailbox = (Sender<Vec<u8>>, Receiver<Vec<u8>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MailboxKey {
    role: NodeRole,
    source: Rank,
    dest: Rank,
}

#[derive(Debug, Default)]
struct ClusterState {
    sizes: RwLock<HashMap<NodeRole, u32>>,
    mailboxes: Mutex<HashMap<MailboxKey, Mailbox>>,
    disconnected: RwLock<HashSet<(NodeRole, Rank)>>,
}

impl ClusterState {
    fn mailbox(&self, key: MailboxKey) -> Mailbox {
        let mut mailboxes = self.mailboxes.lock().unwrap_or_else(|e| e.into_inner());
        mailboxes.entry(key).or_insert_with(unbounded).clone()
    }

    fn size(&self, role: NodeRole) -> u32 {
        let sizes = self.sizes.read().unwrap_or_else(|e| e.into_inner());
        sizes.get(&role).copied().unwrap_or(0)
    }

    fn is_disconnected(&self, role: NodeRole, rank: Rank) -> bool {
        let disconnected = self.disconnected.read().unwrap_or_else(|e| e.into_inner());
        disconnected.contains(&(role, rank))
    }
}

/// A simulated cluster of workers and servers living in one process.
#[derive(Debug, Clone)]
pub struct LocalCluster {
    state: Arc<ClusterState>,
}

impl LocalCluster {
    /// Create a cluster with the given number of workers and servers.
    pub fn new(num_workers: u32, num_servers: u32) -> Self {
        let state = ClusterState::default();
        {
            let mut sizes = state.sizes.write().unwrap_or_else(|e| e.into_inner());
            sizes.insert(NodeRole::Worker, num_workers);
            sizes.insert(NodeRole::Server, num_servers);
            sizes.insert(NodeRole::Scheduler, 1);
        }
        LocalCluster {
            state: Arc::new(state),
        }
    }

    /// Endpoint for the node with `role` and `rank`.
    pub fn node(&self, role: NodeRole, rank: Rank) -> Arc<LocalNode> {
        Arc::new(LocalNode {
            role,
            rank: AtomicU32::new(rank),
            cluster: Arc::clone(&self.state),
            next_request: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Endpoints for every current member of `role`, in rank order.
    pub fn nodes(&self, role: NodeRole) -> Vec<Arc<LocalNode>> {
        (0..self.group_size(role)).map(|rank| self.node(role, rank)).collect()
    }

    /// Current number of nodes with `role`.
    pub fn group_size(&self, role: NodeRole) -> u32 {
        self.state.size(role)
    }

    /// Change the number of nodes with `role`, as a scaling event would.
    pub fn resize(&self, role: NodeRole, size: u32) {
        let mut sizes = self.state.sizes.write().unwrap_or_else(|e| e.into_inner());
        log::info!("Local cluster {} group resized to {}", role, size);
        sizes.insert(role, size);
    }

    /// Mark a node as dead: its sends and any sends addressed to it fail.
    pub fn disconnect(&self, role: NodeRole, rank: Rank) {
        let mut disconnected = self.state.disconnected.write().unwrap_or_else(|e| e.into_inner());
        disconnected.insert((role, rank));
    }

    /// Undo [`disconnect`](Self::disconnect).
    pub fn reconnect(&self, role: NodeRole, rank: Rank) {
        let mut disconnected = self.state.disconnected.write().unwrap_or_else(|e| e.into_inner());
        disconnected.remove(&(role, rank));
    }
}

#[derive(Debug)]
enum PendingOp {
    Send { delivered: bool },
    Receive {
        mailbox: Receiver<Vec<u8>>,
        slot: ReceiveSlot,
    },
}

/// One node's endpoint into a [`LocalCluster`].
#[derive(Debug)]
pub struct LocalNode {
    role: NodeRole,
    rank: AtomicU32,
    cluster: Arc<ClusterState>,
    next_request: AtomicU64,
    pending: Mutex<HashMap<u64, PendingOp>>,
}

impl LocalNode {
    /// Reassign this node's rank, as the scheduler does after scaling.
    pub fn set_rank(&self, rank: Rank) {
        self.rank.store(rank, Ordering::SeqCst);
    }

    /// Number of requests issued but not yet waited on.
    pub fn pending_requests(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.len()
    }

    fn register(&self, op: PendingOp) -> RequestId {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(id, op);
        RequestId::new(id)
    }
}

impl Channel for LocalNode {
    fn send_async(&self, role: NodeRole, dest: Rank, payload: &[u8]) -> RequestId {
        let source = self.rank_id();
        let reachable = dest < self.cluster.size(role)
            && !self.cluster.is_disconnected(role, dest)
            && !self.cluster.is_disconnected(self.role, source);

        let delivered = reachable && {
            let (sender, _) = self.cluster.mailbox(MailboxKey { role, source, dest });
            sender.send(payload.to_vec()).is_ok()
        };
        if !delivered {
            log::warn!(
                "Local {} {} could not deliver {} bytes to {} {}",
                self.role,
                source,
                payload.len(),
                role,
                dest
            );
        }

        self.register(PendingOp::Send { delivered })
    }

    fn receive_async(&self, role: NodeRole, source: Rank) -> (RequestId, ReceiveSlot) {
        let dest = self.rank_id();
        let (_, mailbox) = self.cluster.mailbox(MailboxKey { role, source, dest });
        let slot = ReceiveSlot::new();
        let request = self.register(PendingOp::Receive {
            mailbox,
            slot: slot.clone(),
        });
        (request, slot)
    }

    fn wait(&self, request: RequestId, timeout: Duration) -> bool {
        let op = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&request.id())
        };

        match op {
            None => {
                log::error!("Wait on unknown request {}", request.id());
                false
            }
            Some(PendingOp::Send { delivered }) => delivered,
            Some(PendingOp::Receive { mailbox, slot }) => {
                if self.cluster.is_disconnected(self.role, self.rank_id()) {
                    return false;
                }
                match mailbox.recv_timeout(timeout) {
                    Ok(payload) => {
                        slot.fill(payload);
                        true
                    }
                    Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
                }
            }
        }
    }
}

impl Membership for LocalNode {
    fn rank_id(&self) -> Rank {
        self.rank.load(Ordering::SeqCst)
    }

    fn role(&self) -> NodeRole {
        self.role
    }

    fn group_size(&self, role: NodeRole) -> u32 {
        self.cluster.size(role)
    }
}
