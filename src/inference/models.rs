use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Output of one successful inference run.
///
/// Wire names follow the inference script's output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InferenceResult {
    #[serde(rename = "genero", default, deserialize_with = "null_as_default")]
    pub genre: String,
    #[serde(rename = "recomendaciones", default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecommendationItem {
    #[serde(rename = "titulo", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "artista", default, deserialize_with = "null_as_default")]
    pub artist: String,
    #[serde(rename = "caratula", default, deserialize_with = "null_as_default")]
    pub cover_art: String,
    #[serde(
        rename = "songId",
        alias = "songid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub song_id: Option<String>,
    #[serde(
        rename = "audioUrl",
        alias = "audiourl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("inference produced no output")]
    Empty,
    #[error("inference output decoded to null")]
    Null,
    #[error("inference output is not a valid result: {0}")]
    Json(#[from] serde_json::Error),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Path the server streams a library song from.
pub fn playback_url(song_id: &str) -> String {
    format!("/api/audio/{}", urlencoding::encode(song_id))
}

impl InferenceResult {
    /// Decodes the trimmed standard output of the inference process.
    /// Field names are matched case-insensitively and unknown fields ignored.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DecodeError::Empty);
        }
        let parsed: Option<InferenceResult> = crate::json::from_str_ignore_case(trimmed)?;
        parsed.ok_or(DecodeError::Null)
    }

    /// Points every recommendation that names a library song at its stream.
    pub fn attach_playback_urls(&mut self) {
        for item in &mut self.recommendations {
            if let Some(id) = item.song_id.as_deref().filter(|id| !id.trim().is_empty()) {
                item.audio_url = Some(playback_url(id));
            }
        }
    }
}
