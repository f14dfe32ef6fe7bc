pub mod audit;
pub mod dispatcher;
pub mod evaluate;
pub mod executor;
pub mod handlers;
pub mod models;
pub mod probe;
pub mod queries;
pub mod queue;
pub mod registry_path;
pub mod server;
pub mod store;
