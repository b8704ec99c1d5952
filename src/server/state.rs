use axum::extract::FromRef;

use crate::config::InferenceSettings;
use crate::inference::InferenceRunner;
use crate::library::SongLibrary;
use crate::telemetry::TelemetryStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedInferenceRunner = Arc<dyn InferenceRunner>;
pub type GuardedTelemetryStore = Arc<TelemetryStore>;
pub type GuardedSongLibrary = Arc<SongLibrary>;
pub type GuardedInferenceSettings = Arc<InferenceSettings>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub inference: GuardedInferenceRunner,
    pub telemetry: GuardedTelemetryStore,
    pub library: GuardedSongLibrary,
    pub inference_settings: GuardedInferenceSettings,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        inference_settings: InferenceSettings,
        inference: GuardedInferenceRunner,
        telemetry: GuardedTelemetryStore,
    ) -> ServerState {
        let library = SongLibrary::new(inference_settings.song_library_dir.clone());
        ServerState {
            config,
            start_time: Instant::now(),
            inference,
            telemetry,
            library: Arc::new(library),
            inference_settings: Arc::new(inference_settings),
        }
    }
}

impl FromRef<ServerState> for GuardedInferenceRunner {
    fn from_ref(input: &ServerState) -> Self {
        input.inference.clone()
    }
}

impl FromRef<ServerState> for GuardedTelemetryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.telemetry.clone()
    }
}

impl FromRef<ServerState> for GuardedSongLibrary {
    fn from_ref(input: &ServerState) -> Self {
        input.library.clone()
    }
}

impl FromRef<ServerState> for GuardedInferenceSettings {
    fn from_ref(input: &ServerState) -> Self {
        input.inference_settings.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
