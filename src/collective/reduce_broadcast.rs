//! Reduce-to-root then broadcast, for buffers too small to chunk.
//!
//! Rank 0 receives every other rank's buffer in rank order and folds it into
//! its own, then sends the result to ranks `1..n` in order. Every other rank
//! sends once and receives once. Used when `count < rank_size`, including
//! `count == 0`.

use super::CommContext;
use crate::core::error::Result;
use crate::core::traits::CollectiveElement;
use crate::core::types::{Rank, ReduceOp};
use num_traits::Zero;

const ROOT: Rank = 0;

/// Reduce `buffer` across the group in place via rank 0.
pub fn reduce_broadcast_all_reduce<T: CollectiveElement>(
    ctx: &CommContext<'_>,
    buffer: &mut [T],
    op: ReduceOp,
) -> Result<()> {
    let view = ctx.view();
    if view.is_single() {
        return Ok(());
    }

    let rank_size = view.rank_size();
    let rank_id = view.rank_id();
    log::debug!(
        "Start Reduce to rank 0 process, count:{}, rank_size:{}, rank_id:{}",
        buffer.len(),
        rank_size,
        rank_id
    );

    if rank_id == ROOT {
        let mut staging = vec![T::zero(); buffer.len()];
        for source in 1..rank_size {
            ctx.receive_into(source, &mut staging)?;
            log::debug!("Reduce rank 0 received from rank {}", source);
            op.reduce_into(buffer, &staging);
        }
    } else {
        let send_req = ctx.send(ROOT, buffer);
        ctx.wait_send(send_req)?;
        log::debug!("Reduce send data to rank 0 process.");
    }
    log::debug!("End Reduce to rank 0 process.");

    log::debug!("Start broadcast from rank 0 to other processes.");
    if rank_id == ROOT {
        for dest in 1..rank_size {
            let send_req = ctx.send(dest, buffer);
            ctx.wait_send(send_req)?;
            log::debug!("Broadcast send to rank {}", dest);
        }
    } else {
        ctx.receive_into(ROOT, buffer)?;
        log::debug!("Broadcast received from rank 0.");
    }
    log::debug!("End broadcast from rank 0 to other processes.");

    Ok(())
}
