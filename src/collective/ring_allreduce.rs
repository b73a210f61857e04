//! Ring AllReduce: reduce-scatter followed by all-gather.
//!
//! The buffer is split into `rank_size` chunks by [`ChunkPlan`]. In round `i`
//! of the reduce-scatter phase rank `r` sends chunk `(r - i) mod n` to its
//! successor and folds chunk `(r - i - 1) mod n` received from its
//! predecessor into its own copy. After `n - 1` rounds rank `r` holds the
//! fully reduced chunk `(r + 1) mod n`. The all-gather phase then circulates
//! the reduced chunks for another `n - 1` rounds, sending chunk
//! `(r + 1 - i) mod n` and overwriting chunk `(r - i) mod n`.

use super::{ChunkPlan, CommContext};
use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;
use crate::core::types::ReduceOp;
use num_traits::Zero;

/// Reduce `buffer` across the ring in place.
///
/// Requires `buffer.len() >= rank_size` so that every chunk is non-empty;
/// smaller buffers go through
/// [`reduce_broadcast_all_reduce`](super::reduce_broadcast_all_reduce).
pub fn ring_all_reduce<T: CollectiveElement>(
    ctx: &CommContext<'_>,
    buffer: &mut [T],
    op: ReduceOp,
) -> Result<()> {
    let view = ctx.view();
    if view.is_single() {
        return Ok(());
    }

    let rank_size = view.rank_size() as usize;
    let rank_id = view.rank_id() as usize;
    let count = buffer.len();
    if count < rank_size {
        return Err(CollectiveError::invalid_argument(format!(
            "Ring AllReduce needs at least {} elements, got {}",
            rank_size, count
        )));
    }

    let plan = ChunkPlan::new(count, view.rank_size())?;
    let send_to_rank = view.successor();
    let recv_from_rank = view.predecessor();
    log::debug!(
        "AllReduce count:{}, rank_size:{}, rank_id:{}, chunk_sizes:{:?}, send_to_rank:{}, recv_from_rank:{}",
        count,
        rank_size,
        rank_id,
        plan.chunk_sizes(),
        send_to_rank,
        recv_from_rank
    );

    log::debug!("Start Ring ReduceScatter.");
    let mut staging = vec![T::zero(); plan.max_chunk_size()];
    for i in 0..rank_size - 1 {
        let send_chunk_index = (rank_id + rank_size - i) % rank_size;
        let recv_chunk_index = (rank_id + rank_size - i - 1) % rank_size;

        let send_req = ctx.send(send_to_rank, &buffer[plan.range(send_chunk_index)]);
        log::debug!(
            "Ring ReduceScatter send_to_rank:{}, chunk:{}, iteration:{}",
            send_to_rank,
            send_chunk_index,
            i
        );

        let received = &mut staging[..plan.chunk_sizes()[recv_chunk_index]];
        let send_req = ctx.receive_into_after_send(recv_from_rank, received, send_req)?;
        log::debug!(
            "Ring ReduceScatter recv_from_rank:{}, chunk:{}, iteration:{}",
            recv_from_rank,
            recv_chunk_index,
            i
        );

        op.reduce_into(&mut buffer[plan.range(recv_chunk_index)], received);
        ctx.wait_send(send_req)?;
    }
    log::debug!("End Ring ReduceScatter.");

    log::debug!("Start Ring AllGather.");
    for i in 0..rank_size - 1 {
        let send_chunk_index = (rank_id + rank_size + 1 - i) % rank_size;
        let recv_chunk_index = (rank_id + rank_size - i) % rank_size;

        let send_req = ctx.send(send_to_rank, &buffer[plan.range(send_chunk_index)]);
        log::debug!(
            "Ring AllGather send_to_rank:{}, chunk:{}, iteration:{}",
            send_to_rank,
            send_chunk_index,
            i
        );

        let send_req = ctx.receive_into_after_send(
            recv_from_rank,
            &mut buffer[plan.range(recv_chunk_index)],
            send_req,
        )?;
        log::debug!(
            "Ring AllGather recv_from_rank:{}, chunk:{}, iteration:{}",
            recv_from_rank,
            recv_chunk_index,
            i
        );

        ctx.wait_send(send_req)?;
    }
    log::debug!("End Ring AllGather.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{GroupView, NodeRole};
    use crate::transport::LocalCluster;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn run_ring(inputs: Vec<Vec<i64>>, op: ReduceOp) -> Vec<Vec<i64>> {
        let size = inputs.len() as u32;
        let cluster = LocalCluster::new(0, size);
        std::thread::scope(|scope| {
            let handles: Vec<_> = inputs
                .into_iter()
                .enumerate()
                .map(|(rank, mut buffer)| {
                    let node = cluster.node(NodeRole::Server, rank as u32);
                    scope.spawn(move || {
                        let view = GroupView::new(rank as u32, size, NodeRole::Server).unwrap();
                        let ctx = CommContext::new(&*node, &view, TIMEOUT);
                        ring_all_reduce(&ctx, &mut buffer, op).unwrap();
                        buffer
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_ring_sum_even_chunks() {
        let inputs: Vec<Vec<i64>> = (0..4)
            .map(|r| (0..8).map(|j| (r * 8 + j) as i64).collect())
            .collect();
        let expected: Vec<i64> = (0..8).map(|j| 48 + 4 * j).collect();
        for output in run_ring(inputs, ReduceOp::Sum) {
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn test_ring_max_uneven_chunks() {
        let inputs: Vec<Vec<i64>> = (0..3)
            .map(|r| (0..7).map(|j| ((r * 5 + j * 3) % 11) as i64).collect())
            .collect();
        let expected: Vec<i64> = (0..7)
            .map(|j| (0..3).map(|r| inputs[r][j]).max().unwrap())
            .collect();
        for output in run_ring(inputs, ReduceOp::Max) {
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn test_failed_round_leaves_no_pending_requests() {
        let cluster = LocalCluster::new(0, 2);
        let node = cluster.node(NodeRole::Server, 0);
        let view = GroupView::new(0, 2, NodeRole::Server).unwrap();
        let ctx = CommContext::new(&*node, &view, Duration::from_millis(20));

        for _ in 0..3 {
            let mut buffer = vec![1i64, 2, 3, 4];
            let err = ring_all_reduce(&ctx, &mut buffer, ReduceOp::Sum).unwrap_err();
            assert_eq!(err.category(), "timeout");
        }
        assert_eq!(node.pending_requests(), 0);
    }

    #[test]
    fn test_ring_rejects_short_buffer() {
        let cluster = LocalCluster::new(0, 4);
        let node = cluster.node(NodeRole::Server, 0);
        let view = GroupView::new(0, 4, NodeRole::Server).unwrap();
        let ctx = CommContext::new(&*node, &view, TIMEOUT);
        let mut buffer = vec![1i64, 2];
        assert!(matches!(
            ring_all_reduce(&ctx, &mut buffer, ReduceOp::Sum),
            Err(CollectiveError::InvalidArgument { .. })
        ));
    }
}
