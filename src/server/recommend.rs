//! `POST /api/recomendar`: upload or library song in, recommendations out.

use super::error::ApiError;
use super::state::ServerState;
use crate::inference::InferenceResult;
use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument, Span};

/// Limit for the JSON variant of the request, which only carries a song id.
const MAX_JSON_BODY_BYTES: usize = 64 * 1024;
const UPLOAD_FIELD: &str = "file";

/// Audio handed to the inference process. Uploads are removed on drop.
enum AudioSource {
    Upload(NamedTempFile),
    Library(PathBuf),
}

impl AudioSource {
    fn path(&self) -> &Path {
        match self {
            AudioSource::Upload(file) => file.path(),
            AudioSource::Library(path) => path,
        }
    }
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::BadRequest(msg.into())
}

fn io_error(e: std::io::Error) -> ApiError {
    ApiError::Internal(format!("Failed to store upload: {}", e))
}

/// Keeps a short alphanumeric extension so the inference script can sniff
/// the container by name.
fn upload_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

async fn receive_upload(
    mut multipart: Multipart,
    dir: &Path,
    max_bytes: u64,
) -> Result<NamedTempFile, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        let temp = tempfile::Builder::new()
            .prefix(&uuid::Uuid::new_v4().simple().to_string())
            .suffix(&upload_suffix(field.file_name()))
            .rand_bytes(0)
            .tempfile_in(dir)
            .map_err(io_error)?;
        let mut file = tokio::fs::File::from_std(temp.reopen().map_err(io_error)?);

        let mut written: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
        {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(bad_request(format!(
                    "File exceeds {} MB.",
                    max_bytes / (1024 * 1024)
                )));
            }
            file.write_all(&chunk).await.map_err(io_error)?;
        }
        file.flush().await.map_err(io_error)?;

        if written == 0 {
            return Err(bad_request("Missing 'file'."));
        }
        debug!("Stored upload of {} bytes at {:?}", written, temp.path());
        return Ok(temp);
    }
    Err(bad_request("Missing 'file'."))
}

async fn library_song(state: &ServerState, body: Body) -> Result<PathBuf, ApiError> {
    let bytes = axum::body::to_bytes(body, MAX_JSON_BODY_BYTES)
        .await
        .map_err(|e| bad_request(format!("Invalid body: {}", e)))?;
    let root: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| bad_request("Invalid JSON body."))?;

    let song_id = root
        .get("songId")
        .ok_or_else(|| bad_request("Missing 'songId'."))?
        .as_str()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| bad_request("Empty 'songId'."))?;

    state
        .library
        .resolve(song_id)
        .ok_or_else(|| ApiError::NotFound("No audio found for songId.".to_string()))
}

async fn audio_source(state: &ServerState, request: Request) -> Result<AudioSource, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        let upload = receive_upload(
            multipart,
            &state.inference_settings.upload_dir(),
            state.config.max_upload_bytes,
        )
        .await?;
        Ok(AudioSource::Upload(upload))
    } else if content_type.contains("application/json") {
        let path = library_song(state, request.into_body()).await?;
        Ok(AudioSource::Library(path))
    } else {
        Err(bad_request("Use multipart/form-data or application/json."))
    }
}

pub async fn recommend(
    State(state): State<ServerState>,
    request: Request,
) -> Result<Json<InferenceResult>, ApiError> {
    let source = audio_source(&state, request).await?;

    // The process runs in its own task so that a dropped connection cancels
    // it (and kills the process) instead of abandoning it mid-run.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let runner = state.inference.clone();
    let task = tokio::spawn(
        async move {
            let result = runner.run(source.path(), &cancel).await;
            drop(source);
            result
        }
        .instrument(Span::current()),
    );

    let result = task
        .await
        .map_err(|e| ApiError::Internal(format!("Inference task failed: {}", e)));
    let _ = guard.disarm();

    let mut result = result??;
    result.attach_playback_urls();
    state.telemetry.record_prediction(Some(&result.genre));
    info!(
        "Recommended {} songs for genre {}",
        result.recommendations.len(),
        result.genre
    );

    Ok(Json(result))
}
