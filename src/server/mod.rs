mod client_id;
pub mod config;
pub mod error;
mod http_layers;
mod job_routes;
#[allow(clippy::module_inception)]
pub mod server;
pub mod state;
pub mod url_validation;

pub use client_id::ClientId;
pub use config::ServerConfig;
pub use http_layers::*;
pub use job_routes::StartJobResponse;
pub use server::{make_app, run_server};
