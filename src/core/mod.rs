//! Core infrastructure module for the ring collective engine.
//!
//! This module provides the foundational components shared by the transport
//! contracts and the collective algorithms.
//!
//! # Organization
//!
//! - [`types`]: Node roles, group views, sub-group descriptions and reduce ops
//! - [`traits`]: The element-type bound for collective payloads
//! - [`constants`]: Timeouts and configuration defaults
//! - [`error`]: Error taxonomy and the crate `Result` alias
//! - [`utils`]: Logging setup
//!
//! ```rust
//! use ring_collective::core::{GroupView, NodeRole};
//!
//! let view = GroupView::new(2, 4, NodeRole::Server)?;
//! assert_eq!(view.successor(), 3);
//! assert_eq!(view.predecessor(), 1);
//! # Ok::<(), ring_collective::CollectiveError>(())
//! ```

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

pub use constants::*;
pub use error::{CollectiveError, Result};
pub use traits::CollectiveElement;
pub use types::*;
