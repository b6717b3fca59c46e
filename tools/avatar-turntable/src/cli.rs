use crate::config::{GenerationSettings, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::reference::ViewType;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Turns up to four character reference sheets into a 360° turntable video with Veo.
#[derive(Debug, Parser)]
#[command(name = "avatar-turntable", version)]
#[command(group(
    ArgGroup::new("views")
        .required(true)
        .multiple(true)
        .args(["full", "front", "back", "closeup"])
))]
pub struct Args {
    /// Full body reference image
    #[arg(long, value_name = "PATH")]
    pub full: Option<PathBuf>,

    /// Front view reference image
    #[arg(long, value_name = "PATH")]
    pub front: Option<PathBuf>,

    /// Back view reference image
    #[arg(long, value_name = "PATH")]
    pub back: Option<PathBuf>,

    /// Close-up reference image
    #[arg(long, value_name = "PATH")]
    pub closeup: Option<PathBuf>,

    /// Extra direction appended to the turntable prompt
    #[arg(long, value_name = "TEXT")]
    pub prompt: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "VEO_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Seconds between status checks
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub poll_interval: u64,

    /// Give up after this many seconds (waits indefinitely by default)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Where to save the generated video
    #[arg(short, long, value_name = "PATH", default_value = "turntable.mp4")]
    pub output: PathBuf,

    /// Only print the video URI
    #[arg(long)]
    pub no_download: bool,
}

impl Args {
    pub fn images(&self) -> Vec<(ViewType, PathBuf)> {
        ViewType::ALL
            .into_iter()
            .filter_map(|view| {
                let path = match view {
                    ViewType::Full => &self.full,
                    ViewType::Front => &self.front,
                    ViewType::Back => &self.back,
                    ViewType::Closeup => &self.closeup,
                };
                path.clone().map(|path| (view, path))
            })
            .collect()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.model.clone(),
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            timeout: self.timeout.map(Duration::from_secs),
            prompt_suffix: self.prompt.clone(),
            ..Default::default()
        }
    }
}
