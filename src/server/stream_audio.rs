//! Audio streaming for library songs

use super::error::ApiError;
use super::state::ServerState;
use axum::{
    body::Body,
    extract::{OptionalFromRequestParts, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

const HEADER_BYTE_RANGE: &str = "Range";
const SNIFF_LENGTH: usize = 8192;
const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().trim();
        let v = v.strip_prefix("bytes=")?;

        let parts: Vec<&str> = v.split('-').collect();
        if parts.len() != 2 {
            return None;
        }

        Some(ByteRange {
            start_inclusive: parts[0].trim().parse::<u64>().ok(),
            end_inclusive: parts[1].trim().parse::<u64>().ok(),
        })
    }

    /// Inclusive `(start, end)` within a file of `len` bytes. `Ok(None)` means
    /// the whole file, `Err(())` an unsatisfiable range.
    fn resolve(&self, len: u64) -> Result<Option<(u64, u64)>, ()> {
        match (self.start_inclusive, self.end_inclusive) {
            (None, None) => Ok(None),
            (Some(start), end) => {
                if start >= len {
                    return Err(());
                }
                let end = end.unwrap_or(len - 1).min(len - 1);
                if end < start {
                    return Err(());
                }
                Ok(Some((start, end)))
            }
            // suffix range: the last `n` bytes
            (None, Some(n)) => {
                if n == 0 || len == 0 {
                    return Err(());
                }
                Ok(Some((len.saturating_sub(n), len - 1)))
            }
        }
    }
}

impl<S> OptionalFromRequestParts<S> for ByteRange
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

fn content_type_by_extension(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("wma") => "audio/x-ms-wma",
        Some("au") => "audio/basic",
        _ => "application/octet-stream",
    }
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(format!("Failed to stream audio: {}", e))
}

pub async fn stream_audio(
    State(state): State<ServerState>,
    Path(song_id): Path<String>,
    byte_range: Option<ByteRange>,
) -> Result<Response, ApiError> {
    state.telemetry.record_play(Some(&song_id));

    if !state.library.is_configured() {
        return Err(ApiError::Internal(
            "song_library_dir is not configured.".to_string(),
        ));
    }
    let path = state
        .library
        .resolve(&song_id)
        .ok_or_else(|| ApiError::NotFound("Audio not found.".to_string()))?;
    debug!("Streaming song {} from {}", song_id, path.display());

    let mut file = File::open(&path).await.map_err(internal)?;
    let file_length = file.metadata().await.map_err(internal)?.len();

    let mut head = vec![0u8; SNIFF_LENGTH];
    let read = file.read(&mut head).await.map_err(internal)?;
    let content_type = infer::get(&head[..read])
        .map(|kind| kind.mime_type())
        .unwrap_or_else(|| content_type_by_extension(&path));

    let range = match byte_range.map(|r| r.resolve(file_length)) {
        None => None,
        Some(Ok(range)) => range,
        Some(Err(())) => {
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", file_length))
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty())
                .map_err(internal)?
                .into_response());
        }
    };

    let (start, chunk_size) = match range {
        Some((start, end)) => (start, end - start + 1),
        None => (0, file_length),
    };
    file.seek(SeekFrom::Start(start)).await.map_err(internal)?;

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file.take(chunk_size));
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, chunk_size);
    builder = match range {
        Some((start, end)) => builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, file_length),
        ),
        None => builder.status(StatusCode::OK),
    };

    builder.body(Body::from_stream(stream)).map_err(internal)
}
