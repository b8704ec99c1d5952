pub mod config;
pub mod error;
pub(self) mod feedback;
pub(self) mod health;
mod http_layers;
pub mod metrics;
pub(self) mod recommend;
pub mod server;
pub mod state;
pub(self) mod stream_audio;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;
