//! Client for the Veo long-running video generation endpoints of the Gemini API.

use crate::config::GenerationSettings;
use crate::reference::ReferenceImage;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

// --- Veo API Structures ---

#[derive(Serialize)]
struct VeoRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: Parameters<'a>,
}

#[derive(Serialize)]
struct Instance<'a> {
    prompt: &'a str,
    #[serde(rename = "referenceImages", skip_serializing_if = "Vec::is_empty")]
    reference_images: Vec<ReferenceImagePayload<'a>>,
}

#[derive(Serialize)]
struct ReferenceImagePayload<'a> {
    image: InlineImage<'a>,
    #[serde(rename = "referenceType")]
    reference_type: &'a str,
}

#[derive(Serialize)]
struct InlineImage<'a> {
    #[serde(rename = "inlineData")]
    inline_data: InlineData<'a>,
}

#[derive(Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct Parameters<'a> {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: &'a str,
    resolution: &'a str,
    #[serde(rename = "sampleCount")]
    sample_count: u32,
}

#[derive(Deserialize, Debug)]
struct LongRunningOperation {
    name: String,
}

#[derive(Deserialize, Debug)]
pub struct OperationStatus {
    pub done: Option<bool>,
    pub metadata: Option<serde_json::Value>,
    response: Option<VeoResponse>,
    error: Option<OperationError>,
}

#[derive(Deserialize, Debug)]
struct VeoResponse {
    #[serde(rename = "generateVideoResponse")]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize, Debug)]
struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples")]
    generated_samples: Option<Vec<GeneratedSample>>,
}

#[derive(Deserialize, Debug)]
struct GeneratedSample {
    video: Option<Video>,
}

#[derive(Deserialize, Debug)]
struct Video {
    uri: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OperationError {
    code: Option<i32>,
    message: Option<String>,
}

impl OperationStatus {
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }

    /// Resolves a finished operation into its first video URI.
    fn into_video_uri(self) -> Result<String, VeoError> {
        if let Some(error) = self.error {
            let message = error
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Video generation failed".to_string());
            return Err(VeoError::Operation {
                code: error.code,
                message,
            });
        }

        self.response
            .and_then(|response| response.generate_video_response)
            .and_then(|response| response.generated_samples)
            .and_then(|samples| samples.into_iter().next())
            .and_then(|sample| sample.video)
            .and_then(|video| video.uri)
            .ok_or(VeoError::MissingVideo)
    }
}

#[derive(Debug, Error)]
pub enum VeoError {
    #[error("Request to the video API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Video API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{message}")]
    Operation { code: Option<i32>, message: String },

    #[error("No video URI returned from API")]
    MissingVideo,

    #[error("Video generation did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Failed to write video to disk: {0}")]
    Io(#[from] std::io::Error),
}

impl VeoError {
    /// The provider answers 404 ("Requested entity was not found") for keys it does not accept.
    pub fn is_not_found(&self) -> bool {
        match self {
            VeoError::Status { status, .. } => *status == 404,
            VeoError::Operation { code, message } => {
                *code == Some(404) || message.contains("404")
            }
            VeoError::Http(err) => err.status().is_some_and(|status| status.as_u16() == 404),
            _ => false,
        }
    }
}

pub struct VeoClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl VeoClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Starts a generation job and returns the operation name to poll.
    pub async fn submit(
        &self,
        prompt: &str,
        references: &[&ReferenceImage],
        settings: &GenerationSettings,
    ) -> Result<String, VeoError> {
        let url = format!(
            "{}/models/{}:predictLongRunning",
            self.api_base, settings.model
        );

        let reference_images = references
            .iter()
            .map(|reference| ReferenceImagePayload {
                image: InlineImage {
                    inline_data: InlineData {
                        mime_type: &reference.mime_type,
                        data: base64::engine::general_purpose::STANDARD.encode(&reference.bytes),
                    },
                },
                // Character sheets are subject assets, not style references.
                reference_type: "asset",
            })
            .collect();

        let request_body = VeoRequest {
            instances: vec![Instance {
                prompt,
                reference_images,
            }],
            parameters: Parameters {
                aspect_ratio: &settings.aspect_ratio,
                resolution: &settings.resolution,
                sample_count: settings.sample_count,
            },
        };

        log::info!(
            "Submitting {} reference image(s) to {}",
            references.len(),
            settings.model
        );
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let operation: LongRunningOperation = check_status(response).await?.json().await?;
        log::info!("Job submitted. Operation name: {}", operation.name);
        Ok(operation.name)
    }

    pub async fn operation(&self, name: &str) -> Result<OperationStatus, VeoError> {
        let url = format!("{}/{}", self.api_base, name);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    /// Polls at a fixed interval until the operation is done, then returns the video URI.
    pub async fn poll_until_done(
        &self,
        name: &str,
        interval: Duration,
        timeout: Option<Duration>,
        mut on_tick: impl FnMut(Duration),
    ) -> Result<String, VeoError> {
        let started = Instant::now();
        loop {
            let status = self.operation(name).await?;
            if status.is_done() {
                log::info!("Operation {} finished after {:?}", name, started.elapsed());
                return status.into_video_uri();
            }

            log::debug!("Polling Veo operation... {:?}", status.metadata);
            let elapsed = started.elapsed();
            let mut wait = interval;
            if let Some(limit) = timeout {
                if elapsed >= limit {
                    return Err(VeoError::Timeout(limit));
                }
                wait = wait.min(limit - elapsed);
            }
            on_tick(elapsed);
            sleep(wait).await;
        }
    }

    /// Downloads the generated video and returns the number of bytes written.
    pub async fn download(&self, uri: &str, dest: &Path) -> Result<u64, VeoError> {
        let response = self
            .http
            .get(uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let video_bytes = check_status(response).await?.bytes().await?;

        if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &video_bytes).await?;

        log::info!("Downloaded {} bytes to {}", video_bytes.len(), dest.display());
        Ok(video_bytes.len() as u64)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, VeoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error body".to_string());
    Err(VeoError::Status {
        status: status.as_u16(),
        body,
    })
}
