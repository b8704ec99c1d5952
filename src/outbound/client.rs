//! Typed client for a running recommender server.
//!
//! Every call goes through the [`OutboundPipeline`], so reads are retried and
//! all calls carry a correlation id.

use super::context::RequestContext;
use super::error::OutboundError;
use super::pipeline::OutboundPipeline;
use crate::config::OutboundSettings;
use crate::inference::{HealthReport, InferenceResult};
use crate::telemetry::{FeedbackPayload, TelemetrySnapshot};
use serde::de::DeserializeOwned;
use std::path::Path;

#[derive(Clone)]
pub struct RecommenderClient {
    pipeline: OutboundPipeline,
    builder: reqwest::Client,
    base_url: String,
}

async fn read_body(response: reqwest::Response) -> Result<String, OutboundError> {
    let status = response.status();
    let body = response.text().await.map_err(OutboundError::from)?;
    if !status.is_success() {
        return Err(OutboundError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, OutboundError> {
    let body = read_body(response).await?;
    crate::json::from_str_ignore_case(&body).map_err(|e| OutboundError::Decode(e.to_string()))
}

impl RecommenderClient {
    pub fn new(settings: &OutboundSettings) -> Result<Self, OutboundError> {
        Ok(Self::with_pipeline(
            &settings.base_url,
            OutboundPipeline::from_settings(settings)?,
        ))
    }

    pub fn with_pipeline(base_url: &str, pipeline: OutboundPipeline) -> Self {
        Self {
            pipeline,
            builder: reqwest::Client::new(),
            // Ensure base_url doesn't have trailing slash
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Uploads a local audio file for classification. Never retried.
    pub async fn recommend_file(
        &self,
        audio_path: &Path,
        ctx: &RequestContext,
    ) -> Result<InferenceResult, OutboundError> {
        let bytes = tokio::fs::read(audio_path).await.map_err(|e| {
            OutboundError::InvalidRequest(format!("Cannot read {:?}: {}", audio_path, e))
        })?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .builder
            .post(self.url("/api/recomendar"))
            .multipart(form)
            .build()?;
        let body = read_body(self.pipeline.send(request, ctx).await?).await?;
        InferenceResult::from_json(&body).map_err(|e| OutboundError::Decode(e.to_string()))
    }

    /// Classifies a song already present in the server's library. Never retried.
    pub async fn recommend_song(
        &self,
        song_id: &str,
        ctx: &RequestContext,
    ) -> Result<InferenceResult, OutboundError> {
        let request = self
            .builder
            .post(self.url("/api/recomendar"))
            .json(&serde_json::json!({ "songId": song_id }))
            .build()?;
        let body = read_body(self.pipeline.send(request, ctx).await?).await?;
        InferenceResult::from_json(&body).map_err(|e| OutboundError::Decode(e.to_string()))
    }

    pub async fn send_feedback(
        &self,
        feedback: &FeedbackPayload,
        ctx: &RequestContext,
    ) -> Result<(), OutboundError> {
        let request = self
            .builder
            .post(self.url("/api/feedback"))
            .json(feedback)
            .build()?;
        read_body(self.pipeline.send(request, ctx).await?).await?;
        Ok(())
    }

    pub async fn stats(&self, ctx: &RequestContext) -> Result<TelemetrySnapshot, OutboundError> {
        let request = self.builder.get(self.url("/api/stats")).build()?;
        read_json(self.pipeline.send(request, ctx).await?).await
    }

    pub async fn health(&self, ctx: &RequestContext) -> Result<HealthReport, OutboundError> {
        let request = self.builder.get(self.url("/api/health")).build()?;
        read_json(self.pipeline.send(request, ctx).await?).await
    }
}
