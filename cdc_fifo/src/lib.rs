//! Cross-domain queue primitives.
//!
//! This crate provides:
//! - `gray`: binary/Gray pointer conversion
//! - `sync`: a single-writer register and the two-stage synchronizer that
//!   samples it from another clock domain
//! - `fifo`: a bounded SPSC queue whose producer and consumer advance on
//!   independent ticks and exchange only Gray-coded pointers

pub mod fifo;
pub mod gray;
pub mod sync;

mod serial;

pub use fifo::{channel, Consumer, EnqueueError, Producer, TryDequeueError, MAX_DEPTH_LOG2};
pub use gray::{from_gray, to_gray};
pub use serial::Serial;
pub use sync::{GrayRegister, Synchronizer, SETTLE_TICKS};
