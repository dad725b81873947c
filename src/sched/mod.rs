//! A small fixed-size thread pool used to run blocking fetches off the caller's
//! thread.
//!
//! Jobs are pushed into a shared FIFO queue and picked up by whichever worker
//! has nothing to do. A panicking job is caught and reported to the panic handler,
//! it never takes the worker thread down.

pub mod latch;
mod scheduler;
pub mod unwind;

pub use self::scheduler::{PanicHandler, Scheduler};

pub mod prelude {
    pub use super::latch::{CountLatch, Latch, LockLatch};
    pub use super::{PanicHandler, Scheduler};
}
