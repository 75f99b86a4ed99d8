pub mod fifo_drop_oldest_queue;
pub mod unbounded_queue;

pub use fifo_drop_oldest_queue::*;
pub use unbounded_queue::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Never drops. For work that must not be lost.
    Unbounded,
    FifoDropOldest { capacity: usize },
}
