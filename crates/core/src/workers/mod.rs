pub mod events;
pub mod report_sink;
pub mod run_pipeline;
pub mod wiring;
pub mod worker;
pub mod worker_inputs;

pub use events::*;
pub use report_sink::*;
pub use run_pipeline::*;
pub use wiring::*;
pub use worker::*;
pub use worker_inputs::*;
