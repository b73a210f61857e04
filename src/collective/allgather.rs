//! Ring AllGather.
//!
//! Every rank contributes `send.len()` elements. The local contribution is
//! copied into chunk `rank_id` of the receive buffer, then `n - 1` ring
//! rounds forward chunk `(r - i) mod n` to the successor and store chunk
//! `(r - i - 1) mod n` from the predecessor. No reduction takes place.

use super::{ChunkPlan, CommContext};
use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;

/// Gather every rank's `send` into `recv`, ordered by rank.
///
/// `recv` must hold at least `send.len() * rank_size` elements; anything past
/// that is left untouched.
pub fn ring_all_gather<T: CollectiveElement>(
    ctx: &CommContext<'_>,
    send: &[T],
    recv: &mut [T],
) -> Result<()> {
    let view = ctx.view();
    let rank_size = view.rank_size() as usize;
    let rank_id = view.rank_id() as usize;

    let plan = ChunkPlan::uniform(send.len(), view.rank_size())?;
    if recv.len() < plan.total() {
        log::error!(
            "AllGather receive buffer holds {} elements, {} required",
            recv.len(),
            plan.total()
        );
        return Err(CollectiveError::buffer_size_mismatch(
            plan.total() * std::mem::size_of::<T>(),
            recv.len() * std::mem::size_of::<T>(),
        ));
    }

    recv[plan.range(rank_id)].copy_from_slice(send);
    if view.is_single() {
        return Ok(());
    }

    let send_to_rank = view.successor();
    let recv_from_rank = view.predecessor();
    log::debug!(
        "AllGather send_count:{}, rank_size:{}, rank_id:{}, send_to_rank:{}, recv_from_rank:{}",
        send.len(),
        rank_size,
        rank_id,
        send_to_rank,
        recv_from_rank
    );

    for i in 0..rank_size - 1 {
        let send_chunk_index = (rank_id + rank_size - i) % rank_size;
        let recv_chunk_index = (rank_id + rank_size - i - 1) % rank_size;

        let send_req = ctx.send(send_to_rank, &recv[plan.range(send_chunk_index)]);
        log::debug!(
            "AllGather send_to_rank:{}, chunk:{}, iteration:{}",
            send_to_rank,
            send_chunk_index,
            i
        );

        let send_req = ctx.receive_into_after_send(
            recv_from_rank,
            &mut recv[plan.range(recv_chunk_index)],
            send_req,
        )?;
        log::debug!(
            "AllGather recv_from_rank:{}, chunk:{}, iteration:{}",
            recv_from_rank,
            recv_chunk_index,
            i
        );

        ctx.wait_send(send_req)?;
    }

    Ok(())
}
