//! In-process event bus that carries file submissions and pipeline outcomes
//! between workers.

pub mod bus;
pub mod bus_builder;
pub mod event;

pub use bus::*;
pub use bus_builder::*;
pub use event::*;
