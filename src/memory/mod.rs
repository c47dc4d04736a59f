//! # Memory Utilities
//!
//! Recycling allocators for records that are obtained and released at high
//! frequency, such as queued operations.

mod pool;

pub use pool::{Poolable, Recycler};
