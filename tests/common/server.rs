//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own song library, upload
//! directory and fake inference interpreter.

use super::constants::*;
use music_recommender_server::config::InferenceSettings;
use music_recommender_server::inference::InferenceOrchestrator;
use music_recommender_server::server::{make_app, ServerConfig, ServerState};
use music_recommender_server::telemetry::TelemetryStore;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Telemetry for direct inspection in tests
    pub telemetry: Arc<TelemetryStore>,

    /// Where uploads are written while being analysed
    pub upload_dir: PathBuf,

    // Keeps the fixture files alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

fn write_executable(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write fake python");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake python executable");
    }
}

impl TestServer {
    /// Spawns a server whose inference prints [`RESULT_JSON`].
    pub async fn spawn() -> Self {
        Self::spawn_with_script(&format!("echo '{}'", RESULT_JSON)).await
    }

    /// Spawns a server whose fake interpreter runs the given shell `body`.
    pub async fn spawn_with_script(body: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        let python = root.join("python");
        write_executable(&python, body);
        let script = root.join("infer.py");
        let model = root.join("model.keras");
        std::fs::write(&script, "").expect("Failed to write script");
        std::fs::write(&model, "").expect("Failed to write model");

        let library = root.join("library");
        std::fs::create_dir_all(&library).expect("Failed to create library");
        std::fs::write(library.join(format!("{}.mp3", LIBRARY_SONG_ID)), SONG_BYTES)
            .expect("Failed to write song");
        std::fs::write(library.join(format!("{}.wav", SECOND_SONG_ID)), SONG_BYTES)
            .expect("Failed to write song");

        let upload_dir = root.join("uploads");
        let settings = InferenceSettings {
            python_exe: python,
            script_path: script,
            model_path: model,
            song_library_dir: Some(library),
            temp_dir: Some(upload_dir.clone()),
            timeout_secs: 10,
            ..Default::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().expect("No local address").port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            ..Default::default()
        };
        let telemetry = Arc::new(TelemetryStore::new());
        let orchestrator = Arc::new(InferenceOrchestrator::new(settings.clone()));
        let app = make_app(ServerState::new(
            config,
            settings,
            orchestrator,
            telemetry.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            telemetry,
            upload_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Path of `name` next to the fake interpreter, which scripts can reach
    /// as `$(dirname "$0")/<name>`.
    #[allow(dead_code)]
    pub fn fixture_path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Number of files currently left in the upload directory.
    #[allow(dead_code)]
    pub fn pending_uploads(&self) -> usize {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Waits for the server to become ready by polling the home route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(self.url("/")).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
