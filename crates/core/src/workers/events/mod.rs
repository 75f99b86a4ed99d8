pub mod file_uploaded;
pub mod pipeline_completed;
pub mod pipeline_failed;

pub use file_uploaded::*;
pub use pipeline_completed::*;
pub use pipeline_failed::*;
