//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, LIBRARY_SONG_ID};
//!
//! #[tokio::test]
//! async fn test_stream_song() {
//!     let server = TestServer::spawn().await;
//!     let response = reqwest::get(server.url(&format!("/api/audio/{}", LIBRARY_SONG_ID)))
//!         .await
//!         .unwrap();
//!     assert!(response.status().is_success());
//! }
//! ```

mod constants;
mod server;

pub use constants::*;
pub use server::TestServer;
