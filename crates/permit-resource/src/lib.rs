//! The shared resource nodes compete for.
//!
//! A resource is an ordered list of candidate lines backed by a
//! [`LineStore`]. Inside a critical section a node searches it for the first
//! line accepted by [`is_target`] and claims it by rewriting the line to a
//! marker naming the node. A resource is claimed at most once.

pub mod error;
pub mod line;
pub mod predicate;
pub mod resource;
pub mod store;

pub use error::{ResourceError, Result};
pub use line::{parse_lines, render_lines, Line};
pub use predicate::{is_target, normalize};
pub use resource::{marker, Claim, SharedResource};
pub use store::{FileStore, LineStore, MemoryStore};
