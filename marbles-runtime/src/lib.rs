pub mod config;
pub mod runtime;

mod error;
mod server;

pub use crate::config::ServiceConfig;
pub use crate::error::RuntimeError;
pub use crate::runtime::{BatchJob, MarblesRuntime};
pub use crate::server::{router, ServerState};
