//! Character reference images and how they are chosen for submission.

use image::ImageFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The camera view a reference image depicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewType {
    Full,
    Front,
    Back,
    Closeup,
}

impl ViewType {
    pub const ALL: [ViewType; 4] = [
        ViewType::Full,
        ViewType::Front,
        ViewType::Back,
        ViewType::Closeup,
    ];

    /// Lower is submitted first.
    pub fn priority(self) -> u8 {
        match self {
            ViewType::Full => 1,
            ViewType::Front => 2,
            ViewType::Back => 3,
            ViewType::Closeup => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewType::Full => "Full Body View",
            ViewType::Front => "Front View",
            ViewType::Back => "Back View",
            ViewType::Closeup => "Close-up View",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewType::Full => "full",
            ViewType::Front => "front",
            ViewType::Back => "back",
            ViewType::Closeup => "closeup",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is empty", .path.display())]
    Empty { path: PathBuf },

    #[error("{} is not a recognised image file", .path.display())]
    NotAnImage { path: PathBuf },
}

/// An image file held in memory, ready to be sent inline.
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    pub view: ViewType,
    pub path: PathBuf,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReferenceImage {
    pub async fn load(view: ViewType, path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ReferenceError::Read {
                path: path.clone(),
                source,
            })?;

        if bytes.is_empty() {
            return Err(ReferenceError::Empty { path });
        }

        let format = image::guess_format(&bytes)
            .or_else(|_| ImageFormat::from_path(&path))
            .map_err(|_| ReferenceError::NotAnImage { path: path.clone() })?;

        log::debug!(
            "Loaded {} reference from {} ({} bytes, {:?})",
            view,
            path.display(),
            bytes.len(),
            format
        );

        Ok(Self {
            view,
            path,
            mime_type: format.to_mime_type().to_string(),
            bytes,
        })
    }
}

/// Orders images full, front, back, closeup and keeps at most `max` of them.
pub fn select_references<'a, I>(images: I, max: usize) -> Vec<&'a ReferenceImage>
where
    I: IntoIterator<Item = &'a ReferenceImage>,
{
    let mut sorted: Vec<_> = images.into_iter().collect();
    sorted.sort_by_key(|image| image.view.priority());
    sorted.truncate(max);
    sorted
}
