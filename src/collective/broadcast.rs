//! Linear broadcast over a sub-group.
//!
//! The root sends its buffer to every other member one at a time, waiting
//! for each send before starting the next. Members address each other by
//! global rank through the group's local-to-global mapping.

use super::CommContext;
use crate::core::error::{CollectiveError, Result};
use crate::core::traits::CollectiveElement;
use crate::core::types::{GroupView, NodeRole, Rank};
use std::collections::BTreeMap;

/// Build the view of a sub-group for the node with `global_rank`.
///
/// The view's rank is the node's group-local rank and its size is the number
/// of members in `mapping`.
pub fn sub_group_view(
    global_rank: Rank,
    role: NodeRole,
    mapping: BTreeMap<Rank, Rank>,
) -> Result<GroupView> {
    if mapping.is_empty() {
        log::error!("The group is empty.");
        return Err(CollectiveError::invalid_argument("The group is empty."));
    }

    let local_rank = mapping
        .iter()
        .find_map(|(&local, &global)| (global == global_rank).then_some(local))
        .ok_or_else(|| {
            CollectiveError::invalid_argument(format!(
                "Global rank {} is not a member of the broadcast group",
                global_rank
            ))
        })?;

    let group_size = mapping.len() as u32;
    Ok(GroupView::new(local_rank, group_size, role)?.with_group_mapping(mapping))
}

/// Broadcast the root's `send` to every member's `recv`.
///
/// `root` is a group-local rank. The root also copies `send` into its own
/// `recv`. Non-root members ignore `send` apart from its length, which sets
/// how many elements they receive.
pub fn linear_broadcast<T: CollectiveElement>(
    ctx: &CommContext<'_>,
    send: &[T],
    recv: &mut [T],
    root: Rank,
) -> Result<()> {
    let view = ctx.view();
    let mapping = match view.group_to_global() {
        Some(mapping) if !mapping.is_empty() => mapping,
        _ => {
            log::error!("The group is empty.");
            return Err(CollectiveError::invalid_argument("The group is empty."));
        }
    };

    let global_root_rank = *mapping.get(&root).ok_or_else(|| {
        CollectiveError::invalid_argument(format!(
            "Root rank {} is not in the group of size {}",
            root,
            mapping.len()
        ))
    })?;

    let count = send.len();
    if recv.len() < count {
        return Err(CollectiveError::buffer_size_mismatch(
            count * std::mem::size_of::<T>(),
            recv.len() * std::mem::size_of::<T>(),
        ));
    }
    let recv = &mut recv[..count];

    if view.rank_id() == root {
        for (&local_rank, &global_rank) in mapping {
            if local_rank == root {
                continue;
            }
            let send_req = ctx.send(global_rank, send);
            ctx.wait_send(send_req)?;
            log::debug!("Broadcast send to global rank {}", global_rank);
        }
        recv.copy_from_slice(send);
    } else {
        ctx.receive_into(global_root_rank, recv)?;
        log::debug!("Broadcast received from global rank {}", global_root_rank);
    }

    Ok(())
}
