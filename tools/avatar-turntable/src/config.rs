use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Multiple reference images need the 3.1 preview model.
pub const DEFAULT_MODEL: &str = "veo-3.1-generate-preview";

pub const BASE_PROMPT: &str = "A high-quality 3D render turntable video of this character. \
The character is rotating 360 degrees. Solid studio lighting, neutral background. \
4k detail, seamless loop.";

/// Everything that shapes a single generation request.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    pub model: String,
    pub aspect_ratio: String,
    /// The reference-image feature only supports 720p.
    pub resolution: String,
    pub sample_count: u32,
    pub max_references: usize,
    pub poll_interval: Duration,
    /// `None` polls until the provider reports completion.
    pub timeout: Option<Duration>,
    pub base_prompt: String,
    pub prompt_suffix: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
            sample_count: 1,
            max_references: 3,
            poll_interval: Duration::from_secs(5),
            timeout: None,
            base_prompt: BASE_PROMPT.to_string(),
            prompt_suffix: None,
        }
    }
}

impl GenerationSettings {
    pub fn prompt(&self) -> String {
        match self.prompt_suffix.as_deref().map(str::trim) {
            Some(suffix) if !suffix.is_empty() => format!("{} {}", self.base_prompt, suffix),
            _ => self.base_prompt.clone(),
        }
    }
}
