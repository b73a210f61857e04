//! The collective engine: public entry points for AllReduce, AllGather and
//! Broadcast, plus the scalar sync helpers built on top of them.
//!
//! Each node owns one [`CollectiveEngine`]. All entry points serialize on
//! a single lock, so at most one collective call runs at a time and the
//! server group view cannot change underneath a running call.

use super::{
    linear_broadcast, reduce_broadcast_all_reduce, ring_all_gather, ring_all_reduce,
    sub_group_view, CommContext,
};
use crate::config::CollectiveConfig;
use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;
use crate::core::types::{CommunicationGroupInfo, GroupView, NodeRole, Rank, ReduceOp};
use crate::transport::CommNode;
use ndarray::{ArrayBase, DataMut, Dimension};
use num_traits::{NumCast, Zero};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct EngineState {
    server_node: Option<Arc<dyn CommNode>>,
    server_view: Option<GroupView>,
}

/// Ring-topology collective communication engine.
///
/// AllReduce runs over the server group bound by [`initialize`]. AllGather
/// and Broadcast take the node to run on per call.
///
/// [`initialize`]: CollectiveEngine::initialize
pub struct CollectiveEngine {
    config: CollectiveConfig,
    state: Mutex<EngineState>,
}

static_assertions::assert_impl_all!(CollectiveEngine: Send, Sync);

impl fmt::Debug for CollectiveEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self
            .state
            .try_lock()
            .ok()
            .and_then(|state| state.server_view.clone());
        f.debug_struct("CollectiveEngine")
            .field("config", &self.config)
            .field("server_view", &view)
            .finish()
    }
}

impl Default for CollectiveEngine {
    fn default() -> Self {
        Self::new(CollectiveConfig::default())
    }
}

impl CollectiveEngine {
    /// Create an uninitialized engine.
    pub fn new(config: CollectiveConfig) -> Self {
        CollectiveEngine {
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &CollectiveConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|_| CollectiveError::threading("Collective engine lock poisoned"))
    }

    /// Bind the engine to the local server node.
    ///
    /// The group size is `initial_server_num` from the configuration when
    /// set, otherwise the current server count reported by `server_node`.
    pub fn initialize(&self, server_node: Arc<dyn CommNode>) -> Result<()> {
        let mut state = self.lock_state()?;

        let rank_id = server_node.rank_id();
        let rank_size = self
            .config
            .initial_server_num
            .unwrap_or_else(|| server_node.group_size(NodeRole::Server));
        let view = GroupView::new(rank_id, rank_size, NodeRole::Server).map_err(|e| {
            log::error!("Collective engine initialization failed: {}", e);
            e
        })?;

        log::info!(
            "Collective engine initialized: rank={}, server_num={}",
            rank_id,
            rank_size
        );
        state.server_node = Some(server_node);
        state.server_view = Some(view);
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.lock_state()
            .map(|state| state.server_view.is_some())
            .unwrap_or(false)
    }

    /// Current server group view, if initialized.
    pub fn group_view(&self) -> Option<GroupView> {
        self.lock_state()
            .ok()
            .and_then(|state| state.server_view.clone())
    }

    /// Refresh the server group view after a scaling event.
    ///
    /// Does nothing if the engine was never initialized. Waits for any
    /// in-flight collective call to finish first.
    pub fn reinit_for_scaling(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(node) = state.server_node.clone() else {
            log::debug!("Collective engine is not initialized, skip reinitialization.");
            return Ok(());
        };

        log::info!("Cluster scaling out completed. Reinitialize ring for collective communication.");
        let rank_id = node.rank_id();
        let rank_size = node.group_size(NodeRole::Server);
        let view = GroupView::new(rank_id, rank_size, NodeRole::Server).map_err(|e| {
            log::error!("Collective engine reinitialization failed: {}", e);
            e
        })?;
        log::info!(
            "After scheduler scaling out, this server's rank is {}, server number is {}",
            rank_id,
            rank_size
        );
        state.server_view = Some(view);
        Ok(())
    }

    /// Sum `send` across all servers into `recv`.
    pub fn all_reduce<T: CollectiveElement>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        self.all_reduce_with_op(send, recv, ReduceOp::Sum)
    }

    /// Reduce `send` across all servers into `recv` with `op`.
    ///
    /// `recv` must hold at least `send.len()` elements; only the first
    /// `send.len()` are written.
    pub fn all_reduce_with_op<T: CollectiveElement>(
        &self,
        send: &[T],
        recv: &mut [T],
        op: ReduceOp,
    ) -> Result<()> {
        let state = self.lock_state()?;
        Self::server_binding(&state)?;
        let count = send.len();
        if recv.len() < count {
            return Err(CollectiveError::buffer_size_mismatch(
                count * std::mem::size_of::<T>(),
                recv.len() * std::mem::size_of::<T>(),
            ));
        }

        let recv = &mut recv[..count];
        recv.copy_from_slice(send);
        self.all_reduce_locked(&state, recv, op)
    }

    /// Reduce `buffer` across all servers in place.
    pub fn all_reduce_in_place<T: CollectiveElement>(
        &self,
        buffer: &mut [T],
        op: ReduceOp,
    ) -> Result<()> {
        let state = self.lock_state()?;
        self.all_reduce_locked(&state, buffer, op)
    }

    /// Reduce an ndarray across all servers in place.
    ///
    /// The array must be contiguous; every server must pass the same shape
    /// and memory order.
    pub fn all_reduce_array<T, S, D>(&self, array: &mut ArrayBase<S, D>, op: ReduceOp) -> Result<()>
    where
        T: CollectiveElement,
        S: DataMut<Elem = T>,
        D: Dimension,
    {
        let buffer = array.as_slice_memory_order_mut().ok_or_else(|| {
            CollectiveError::invalid_argument("AllReduce requires a contiguous array")
        })?;
        self.all_reduce_in_place(buffer, op)
    }

    fn server_binding(state: &EngineState) -> Result<(&dyn CommNode, &GroupView)> {
        match (state.server_node.as_deref(), state.server_view.as_ref()) {
            (Some(node), Some(view)) => Ok((node, view)),
            _ => {
                log::error!("Collective engine is not initialized.");
                Err(CollectiveError::NotInitialized)
            }
        }
    }

    fn all_reduce_locked<T: CollectiveElement>(
        &self,
        state: &EngineState,
        buffer: &mut [T],
        op: ReduceOp,
    ) -> Result<()> {
        let (node, view) = Self::server_binding(state)?;

        if view.is_single() {
            log::debug!("Rank size is 1. Do nothing.");
            return Ok(());
        }

        let count = buffer.len();
        let ctx = CommContext::new(node, view, self.config.timeout());
        let result = if count >= view.rank_size() as usize {
            ring_all_reduce(&ctx, buffer, op)
        } else {
            reduce_broadcast_all_reduce(&ctx, buffer, op)
        };

        result.map_err(|e| {
            log::error!(
                "AllReduce {} of {} {} elements failed: {}",
                op,
                count,
                T::TYPE_NAME,
                e
            );
            e
        })
    }

    /// Gather every member's `send` into `recv`, ordered by rank.
    ///
    /// The group is all nodes sharing `node`'s role; the scheduler cannot
    /// take part.
    pub fn all_gather<T: CollectiveElement>(
        &self,
        send: &[T],
        recv: &mut [T],
        node: &dyn CommNode,
    ) -> Result<()> {
        let _state = self.lock_state()?;
        self.all_gather_locked(send, recv, node)
    }

    fn role_view(node: &dyn CommNode) -> Result<GroupView> {
        let role = node.role();
        let rank_size = match role {
            NodeRole::Worker | NodeRole::Server => node.group_size(role),
            NodeRole::Scheduler => {
                log::error!(
                    "The node role {} for collective communication is invalid.",
                    role
                );
                return Err(CollectiveError::invalid_argument(format!(
                    "The node role {} for collective communication is invalid.",
                    role
                )));
            }
        };
        GroupView::new(node.rank_id(), rank_size, role)
    }

    fn all_gather_locked<T: CollectiveElement>(
        &self,
        send: &[T],
        recv: &mut [T],
        node: &dyn CommNode,
    ) -> Result<()> {
        let view = Self::role_view(node)?;
        let ctx = CommContext::new(node, &view, self.config.timeout());
        ring_all_gather(&ctx, send, recv).map_err(|e| {
            log::error!(
                "AllGather of {} {} elements failed: {}",
                send.len(),
                T::TYPE_NAME,
                e
            );
            e
        })
    }

    /// Broadcast `send` from group-local rank `root` to every member of
    /// `group_info`.
    ///
    /// `node` must be a member of the group. Every member receives
    /// `send.len()` elements into `recv`, the root included.
    pub fn broadcast<T: CollectiveElement>(
        &self,
        send: &[T],
        recv: &mut [T],
        root: Rank,
        node: &dyn CommNode,
        group_info: &CommunicationGroupInfo,
    ) -> Result<()> {
        let _state = self.lock_state()?;

        let rank_size = group_info.size;
        if rank_size == 0 {
            log::error!("Rank size should not be 0.");
            return Err(CollectiveError::invalid_argument(
                "Rank size should not be 0.",
            ));
        }
        if root >= rank_size {
            return Err(CollectiveError::invalid_argument(format!(
                "Broadcast root {} is out of range for group size {}",
                root, rank_size
            )));
        }

        let count = send.len();
        if recv.len() < count {
            return Err(CollectiveError::buffer_size_mismatch(
                count * std::mem::size_of::<T>(),
                recv.len() * std::mem::size_of::<T>(),
            ));
        }
        if rank_size == 1 {
            recv[..count].copy_from_slice(send);
            return Ok(());
        }

        let mapping = node.group_to_global_mapping(group_info);
        let view = sub_group_view(node.rank_id(), node.role(), mapping)?;
        if view.rank_size() != rank_size {
            return Err(CollectiveError::invalid_argument(format!(
                "Group size {} does not match its rank mapping of {} members",
                rank_size,
                view.rank_size()
            )));
        }

        let ctx = CommContext::new(node, &view, self.config.timeout());
        linear_broadcast(&ctx, send, recv, root).map_err(|e| {
            log::error!("Broadcast from root {} failed: {}", root, e);
            e
        })
    }

    fn sync_up<T: CollectiveElement>(&self, local: T, op: ReduceOp) -> Result<T> {
        let mut value = [local];
        self.all_reduce_in_place(&mut value, op)?;
        Ok(value[0])
    }

    /// Sum of `local` over all servers.
    pub fn sync_up_by_sum<T: CollectiveElement>(&self, local: T) -> Result<T> {
        self.sync_up(local, ReduceOp::Sum)
    }

    /// Minimum of `local` over all servers.
    pub fn sync_up_by_min<T: CollectiveElement>(&self, local: T) -> Result<T> {
        self.sync_up(local, ReduceOp::Min)
    }

    /// Maximum of `local` over all servers.
    pub fn sync_up_by_max<T: CollectiveElement>(&self, local: T) -> Result<T> {
        self.sync_up(local, ReduceOp::Max)
    }

    /// Mean of `local` over all servers.
    ///
    /// Integer types use integer division.
    pub fn sync_up_by_mean<T: CollectiveElement + NumCast>(&self, local: T) -> Result<T> {
        let state = self.lock_state()?;
        let mut value = [local];
        self.all_reduce_locked(&state, &mut value, ReduceOp::Sum)?;

        let rank_size = state
            .server_view
            .as_ref()
            .map(|view| view.rank_size())
            .ok_or(CollectiveError::NotInitialized)?;
        let divisor = <T as NumCast>::from(rank_size).ok_or_else(|| {
            CollectiveError::invalid_argument(format!(
                "Server count {} is not representable as {}",
                rank_size,
                T::TYPE_NAME
            ))
        })?;
        Ok(value[0] / divisor)
    }

    /// Elementwise sum of `local` over all servers.
    pub fn global_sum<T: CollectiveElement>(&self, local: &[T]) -> Result<Vec<T>> {
        let mut global = local.to_vec();
        self.all_reduce_in_place(&mut global, ReduceOp::Sum)?;
        Ok(global)
    }

    /// One value from every member of `node`'s role group, ordered by rank.
    pub fn global_array<T: CollectiveElement>(&self, local: T, node: &dyn CommNode) -> Result<Vec<T>> {
        let _state = self.lock_state()?;
        let view = Self::role_view(node)?;
        let mut global = vec![T::zero(); view.rank_size() as usize];
        self.all_gather_locked(&[local], &mut global, node)?;
        Ok(global)
    }
}
