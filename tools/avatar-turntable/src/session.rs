//! Application state for one generation run.

use crate::config::{GenerationSettings, API_KEY_ENV};
use crate::reference::{select_references, ReferenceImage, ViewType};
use crate::veo::{VeoClient, VeoError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed. Please select your API Key again.";
pub const NO_IMAGES_MESSAGE: &str = "Please upload at least one image.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    Uploading,
    Generating,
    Complete,
    Error,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppStatus::Idle => "IDLE",
            AppStatus::Uploading => "UPLOADING",
            AppStatus::Generating => "GENERATING",
            AppStatus::Complete => "COMPLETE",
            AppStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Session {
    images: BTreeMap<ViewType, ReferenceImage>,
    status: AppStatus,
    video_uri: Option<String>,
    error: Option<String>,
    api_key_set: bool,
}

impl Session {
    pub fn new(api_key_set: bool) -> Self {
        Self {
            images: BTreeMap::new(),
            status: AppStatus::Idle,
            video_uri: None,
            error: None,
            api_key_set,
        }
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn video_uri(&self) -> Option<&str> {
        self.video_uri.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn api_key_set(&self) -> bool {
        self.api_key_set
    }

    pub fn image(&self, view: ViewType) -> Option<&ReferenceImage> {
        self.images.get(&view)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn set_status(&mut self, status: AppStatus) {
        if self.status != status {
            log::debug!("Status {} -> {}", self.status, status);
            self.status = status;
        }
    }

    fn fail(&mut self, message: String) -> String {
        self.error = Some(message.clone());
        self.set_status(AppStatus::Error);
        message
    }

    /// Reads an image for `view`, replacing whatever was held for it.
    pub async fn upload(&mut self, view: ViewType, path: impl AsRef<Path>) -> Result<(), String> {
        let previous = self.status;
        self.set_status(AppStatus::Uploading);

        match ReferenceImage::load(view, path).await {
            Ok(image) => {
                if self.images.insert(view, image).is_some() {
                    log::info!("Replaced {} reference", view);
                }
                let next = match previous {
                    AppStatus::Uploading | AppStatus::Error => AppStatus::Idle,
                    other => other,
                };
                self.set_status(next);
                Ok(())
            }
            Err(err) => Err(self.fail(err.to_string())),
        }
    }

    pub fn remove(&mut self, view: ViewType) -> Option<ReferenceImage> {
        self.images.remove(&view)
    }

    pub fn can_generate(&self) -> bool {
        !self.images.is_empty() && self.status != AppStatus::Generating
    }

    /// Submits the held images and waits for the video.
    ///
    /// On failure the returned message is also stored in [`Session::error`].
    pub async fn generate(
        &mut self,
        client: &VeoClient,
        settings: &GenerationSettings,
        on_tick: impl FnMut(Duration),
    ) -> Result<String, String> {
        if !self.api_key_set {
            let message = format!(
                "No API key configured. Set {API_KEY_ENV} to a key from a paid Google Cloud project."
            );
            self.error = Some(message.clone());
            return Err(message);
        }

        if self.images.is_empty() {
            let message = NO_IMAGES_MESSAGE.to_string();
            self.error = Some(message.clone());
            return Err(message);
        }

        if self.status == AppStatus::Generating {
            return Err("A generation is already running.".to_string());
        }

        self.set_status(AppStatus::Generating);
        self.error = None;
        self.video_uri = None;

        match self.run(client, settings, on_tick).await {
            Ok(uri) => {
                self.video_uri = Some(uri.clone());
                self.set_status(AppStatus::Complete);
                Ok(uri)
            }
            Err(err) => {
                log::error!("Video generation error: {}", err);
                if err.is_not_found() || err.to_string().contains("404") {
                    self.api_key_set = false;
                    Err(self.fail(AUTH_FAILED_MESSAGE.to_string()))
                } else {
                    Err(self.fail(err.to_string()))
                }
            }
        }
    }

    async fn run(
        &self,
        client: &VeoClient,
        settings: &GenerationSettings,
        on_tick: impl FnMut(Duration),
    ) -> Result<String, VeoError> {
        let references = select_references(self.images.values(), settings.max_references);
        for reference in &references {
            log::info!(
                "Using {} ({}) from {}",
                reference.view.label(),
                reference.mime_type,
                reference.path.display()
            );
        }

        let operation = client
            .submit(&settings.prompt(), &references, settings)
            .await?;
        client
            .poll_until_done(&operation, settings.poll_interval, settings.timeout, on_tick)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

    fn image_file(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn png_file() -> tempfile::NamedTempFile {
        image_file(".png", PNG_MAGIC)
    }

    fn fast_settings() -> GenerationSettings {
        GenerationSettings {
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    async fn mount_submit(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path_regex(r":predictLongRunning$"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn upload_and_remove_track_views() {
        let file = png_file();
        let replacement = image_file(".jpg", JPEG_MAGIC);
        let mut session = Session::new(true);

        session.upload(ViewType::Front, file.path()).await.unwrap();
        session.upload(ViewType::Front, replacement.path()).await.unwrap();
        session.upload(ViewType::Back, file.path()).await.unwrap();

        let front = session.image(ViewType::Front).unwrap();
        assert_eq!(front.mime_type, "image/jpeg");
        assert_eq!(front.bytes, JPEG_MAGIC);
        assert_eq!(front.path, replacement.path());
        assert_eq!(session.image_count(), 2);
        assert_eq!(session.status(), AppStatus::Idle);
        assert!(session.can_generate());

        assert!(session.remove(ViewType::Front).is_some());
        assert!(session.image(ViewType::Front).is_none());
        assert_eq!(session.image_count(), 1);
    }

    #[tokio::test]
    async fn failed_upload_sets_error() {
        let mut session = Session::new(true);

        let message = session
            .upload(ViewType::Full, "/no/such/image.png")
            .await
            .unwrap_err();

        assert_eq!(session.status(), AppStatus::Error);
        assert_eq!(session.error(), Some(message.as_str()));
        assert!(!session.can_generate());
    }

    #[tokio::test]
    async fn generate_without_images_keeps_status() {
        let server = MockServer::start().await;
        let client = VeoClient::new("key", server.uri());
        let mut session = Session::new(true);

        let message = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(message, NO_IMAGES_MESSAGE);
        assert_eq!(session.status(), AppStatus::Idle);
    }

    #[tokio::test]
    async fn generate_without_key_submits_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let file = png_file();
        let client = VeoClient::new("", server.uri());
        let mut session = Session::new(false);
        session.upload(ViewType::Full, file.path()).await.unwrap();

        let message = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap_err();

        assert!(message.contains(API_KEY_ENV));
        assert_eq!(session.error(), Some(message.as_str()));
        assert_eq!(session.status(), AppStatus::Idle);
    }

    #[tokio::test]
    async fn generate_completes_with_video_uri() {
        let server = MockServer::start().await;
        mount_submit(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "name": "operations/op-9" })),
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/operations/op-9$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [{ "video": { "uri": "https://video/9" } }]
                    }
                }
            })))
            .mount(&server)
            .await;

        let file = png_file();
        let client = VeoClient::new("key", server.uri());
        let mut session = Session::new(true);
        session.upload(ViewType::Closeup, file.path()).await.unwrap();

        let uri = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap();

        assert_eq!(uri, "https://video/9");
        assert_eq!(session.video_uri(), Some("https://video/9"));
        assert_eq!(session.status(), AppStatus::Complete);
        assert_eq!(session.error(), None);
    }

    #[tokio::test]
    async fn not_found_asks_for_the_key_again() {
        let server = MockServer::start().await;
        mount_submit(
            &server,
            ResponseTemplate::new(404).set_body_string("Requested entity was not found."),
        )
        .await;

        let file = png_file();
        let client = VeoClient::new("stale", server.uri());
        let mut session = Session::new(true);
        session.upload(ViewType::Full, file.path()).await.unwrap();

        let message = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(message, AUTH_FAILED_MESSAGE);
        assert!(!session.api_key_set());
        assert_eq!(session.status(), AppStatus::Error);
        assert_eq!(session.video_uri(), None);
    }

    #[tokio::test]
    async fn not_found_mentioned_in_body_asks_for_the_key_again() {
        let server = MockServer::start().await;
        mount_submit(
            &server,
            ResponseTemplate::new(500).set_body_string("upstream 404 Requested entity was not found"),
        )
        .await;

        let file = png_file();
        let client = VeoClient::new("stale", server.uri());
        let mut session = Session::new(true);
        session.upload(ViewType::Front, file.path()).await.unwrap();

        let message = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(message, AUTH_FAILED_MESSAGE);
        assert!(!session.api_key_set());
        assert_eq!(session.status(), AppStatus::Error);
    }

    #[tokio::test]
    async fn other_failures_surface_their_message() {
        let server = MockServer::start().await;
        mount_submit(
            &server,
            ResponseTemplate::new(500).set_body_string("backend unavailable"),
        )
        .await;

        let file = png_file();
        let client = VeoClient::new("key", server.uri());
        let mut session = Session::new(true);
        session.upload(ViewType::Front, file.path()).await.unwrap();

        let message = session
            .generate(&client, &fast_settings(), |_| {})
            .await
            .unwrap_err();

        assert!(message.contains("500"));
        assert!(message.contains("backend unavailable"));
        assert!(session.api_key_set());
        assert_eq!(session.error(), Some(message.as_str()));
    }
}
