pub mod check_results;
pub mod checks;
pub mod config;
pub mod machines;
pub mod scheduled_jobs;
pub mod tasks;

pub use check_results::*;
pub use checks::*;
pub use machines::*;
pub use scheduled_jobs::*;
pub use tasks::*;
