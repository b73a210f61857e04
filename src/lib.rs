//! # Ring Collective
//!
//! Ring-topology collective communication for a parameter-server cluster:
//! AllReduce, AllGather and Broadcast over an abstract point-to-point
//! channel.
//!
//! ## Features
//!
//! - **Ring AllReduce**: Bandwidth-optimal reduce-scatter followed by
//!   all-gather, with a reduce-to-root fallback for buffers smaller than the
//!   group.
//! - **Ring AllGather**: Rank-ordered concatenation over the worker or server
//!   group.
//! - **Linear Broadcast**: Root-to-all broadcast over an arbitrary sub-group.
//! - **Elastic Membership**: The server ring can be rebuilt after a scaling
//!   event without recreating the engine.
//! - **Pluggable Transport**: Algorithms only see the [`Channel`] and
//!   [`Membership`] traits; [`LocalCluster`] provides an in-process
//!   implementation.
//!
//! ## Quick Start
//!
//! ```rust
//! use ring_collective::{CollectiveEngine, LocalCluster, NodeRole};
//!
//! # fn main() -> ring_collective::Result<()> {
//! let cluster = LocalCluster::new(1, 2);
//! let nodes = cluster.nodes(NodeRole::Server);
//!
//! let results = std::thread::scope(|scope| -> ring_collective::Result<Vec<Vec<f32>>> {
//!     let handles: Vec<_> = nodes
//!         .into_iter()
//!         .enumerate()
//!         .map(|(rank, node)| {
//!             scope.spawn(move || -> ring_collective::Result<Vec<f32>> {
//!                 let engine = CollectiveEngine::default();
//!                 engine.initialize(node)?;
//!                 let send = vec![rank as f32 + 1.0; 4];
//!                 let mut recv = vec![0.0; 4];
//!                 engine.all_reduce(&send, &mut recv)?;
//!                 Ok(recv)
//!             })
//!         })
//!         .collect();
//!     handles.into_iter().map(|h| h.join().unwrap()).collect()
//! })?;
//!
//! assert!(results.iter().all(|r| r == &vec![3.0; 4]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Fundamental types, constants, error handling, and trait abstractions
//! - [`config`]: Engine configuration from code, files, or the environment
//! - [`transport`]: Channel and membership contracts plus the in-process cluster
//! - [`collective`]: Chunk planning, the collective algorithms, and the engine
//!
//! ## Failure Model
//!
//! Every send and receive wait is bounded by the configured timeout. The
//! first failed wait aborts the call with an error; output buffers may then
//! be partially updated and should be discarded. Nothing is retried
//! internally.

#![doc(html_root_url = "https://docs.rs/ring-collective/")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module - always available
pub mod core;

// Configuration management module
pub mod config;

// Point-to-point transport module
pub mod transport;

// Collective algorithms and engine
pub mod collective;

// Re-export core functionality for convenience
pub use crate::core::{
    constants::*,
    error::{CollectiveError, Result},
    traits::*,
    types::*,
    utils::log::{init_logging, LogLevel},
};

// Re-export configuration functionality
pub use config::{CollectiveConfig, ConfigBuilder, ConfigFormat};

// Re-export transport functionality
pub use transport::{
    Channel, CommNode, LocalCluster, LocalNode, Membership, ReceiveSlot, RequestId,
};

// Re-export collective functionality
pub use collective::{ChunkPlan, CollectiveEngine, CommContext};

// Version information
pub use crate::core::constants::RING_COLLECTIVE_VERSION as VERSION;
