//! Ring-based collective operations.
//!
//! [`CollectiveEngine`] is the public entry point. The algorithm modules
//! below implement one collective each against a [`CommContext`], which
//! bundles the node's channel, the [`GroupView`] the call runs against, and
//! the wait timeout.
//!
//! Every algorithm follows the same step discipline: issue the send, block on
//! the matching receive, consume the received payload, then wait for the
//! send. The first failed wait aborts the call. A send still outstanding
//! at that point is waited on once more before the error is returned, so
//! the transport never holds an abandoned request.

pub mod allgather;
pub mod broadcast;
pub mod chunk;
pub mod engine;
pub mod reduce_broadcast;
pub mod ring_allreduce;

pub use allgather::ring_all_gather;
pub use broadcast::{linear_broadcast, sub_group_view};
pub use chunk::ChunkPlan;
pub use engine::CollectiveEngine;
pub use reduce_broadcast::reduce_broadcast_all_reduce;
pub use ring_allreduce::ring_all_reduce;

use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;
use crate::core::types::{GroupView, Rank};
use crate::transport::{CommNode, RequestId};
use std::time::Duration;

/// Everything a single collective call needs to talk to its peers.
pub struct CommContext<'a> {
    node: &'a dyn CommNode,
    view: &'a GroupView,
    timeout: Duration,
}

impl std::fmt::Debug for CommContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommContext")
            .field("view", self.view)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<'a> CommContext<'a> {
    /// Bundle a node, the view to run against, and the wait timeout.
    pub fn new(node: &'a dyn CommNode, view: &'a GroupView, timeout: Duration) -> Self {
        CommContext {
            node,
            view,
            timeout,
        }
    }

    /// The group view this call runs against.
    pub fn view(&self) -> &GroupView {
        self.view
    }

    /// Timeout applied to each wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis().min(u64::MAX as u128) as u64
    }

    pub(crate) fn send<T: CollectiveElement>(&self, dest: Rank, data: &[T]) -> RequestId {
        self.node
            .send_async(self.view.role(), dest, bytemuck::cast_slice(data))
    }

    pub(crate) fn wait_send(&self, request: RequestId) -> Result<()> {
        let id = request.id();
        if !self.node.wait(request, self.timeout) {
            log::error!("CollectiveWait {} failed.", id);
            return Err(CollectiveError::timeout("send", id, self.timeout_ms()));
        }
        Ok(())
    }

    /// Wait on a send whose step already failed. The outcome is only logged;
    /// the caller returns the original error.
    pub(crate) fn release_send(&self, request: RequestId) {
        let id = request.id();
        if !self.node.wait(request, self.timeout) {
            log::warn!("Abandoned send request {} did not complete.", id);
        }
    }

    /// Receive into `dst`, releasing `pending_send` if the receive fails.
    ///
    /// On success the send is handed back for the caller to wait on after
    /// consuming the payload.
    pub(crate) fn receive_into_after_send<T: CollectiveElement>(
        &self,
        source: Rank,
        dst: &mut [T],
        pending_send: RequestId,
    ) -> Result<RequestId> {
        match self.receive_into(source, dst) {
            Ok(()) => Ok(pending_send),
            Err(e) => {
                self.release_send(pending_send);
                Err(e)
            }
        }
    }

    pub(crate) fn receive(&self, source: Rank) -> Result<Vec<u8>> {
        let (request, slot) = self.node.receive_async(self.view.role(), source);
        let id = request.id();
        if !self.node.wait(request, self.timeout) {
            log::error!("CollectiveWait {} failed.", id);
            return Err(CollectiveError::timeout("receive", id, self.timeout_ms()));
        }
        slot.take().ok_or_else(|| {
            CollectiveError::transport(format!(
                "Receive request {} from rank {} completed without a payload",
                id, source
            ))
        })
    }

    pub(crate) fn receive_into<T: CollectiveElement>(
        &self,
        source: Rank,
        dst: &mut [T],
    ) -> Result<()> {
        let payload = self.receive(source)?;
        copy_payload(dst, &payload)
    }
}

/// Copy a received byte payload into a typed destination slice.
///
/// The payload must cover the destination exactly.
pub(crate) fn copy_payload<T: CollectiveElement>(dst: &mut [T], payload: &[u8]) -> Result<()> {
    let dst_bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
    if dst_bytes.len() != payload.len() {
        log::error!(
            "memcpy error: destination holds {} bytes, received {}",
            dst_bytes.len(),
            payload.len()
        );
        return Err(CollectiveError::buffer_size_mismatch(
            dst_bytes.len(),
            payload.len(),
        ));
    }
    dst_bytes.copy_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_payload_exact() {
        let mut dst = [0.0f32; 2];
        let payload: &[u8] = bytemuck::cast_slice(&[1.5f32, -2.0]);
        copy_payload(&mut dst, payload).unwrap();
        assert_eq!(dst, [1.5, -2.0]);
    }

    #[test]
    fn test_copy_payload_size_mismatch() {
        let mut dst = [0i32; 2];
        let payload: &[u8] = bytemuck::cast_slice(&[1i32, 2, 3]);
        let err = copy_payload(&mut dst, payload).unwrap_err();
        assert!(matches!(
            err,
            CollectiveError::BufferSizeMismatch {
                expected: 8,
                actual: 12
            }
        ));
        assert_eq!(dst, [0, 0]);
    }
}
