//! Screenshot source.
//!
//! Capturing is the host client's job; this side only picks up the latest
//! image it wrote.

use std::future::Future;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::warn;

/// Supplies the image attached to a submission that requires visual proof.
pub trait ScreenshotProvider: Send + Sync + 'static {
    /// `None` when no image is available; the submission then goes out without one.
    fn capture(&self) -> impl Future<Output = Option<Bytes>> + Send;
}

/// Reads the capture file the host client keeps up to date.
#[derive(Debug, Clone)]
pub struct FileScreenshotProvider {
    path: PathBuf,
}

impl FileScreenshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScreenshotProvider for FileScreenshotProvider {
    async fn capture(&self) -> Option<Bytes> {
        match tokio::fs::read(&self.path).await {
            Ok(data) if !data.is_empty() => Some(Bytes::from(data)),
            Ok(_) => {
                warn!(path = %self.path.display(), "Screenshot file is empty");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read screenshot: {}", e);
                None
            }
        }
    }
}

/// Provider for setups without a capture path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScreenshots;

impl ScreenshotProvider for NoScreenshots {
    async fn capture(&self) -> Option<Bytes> {
        None
    }
}

/// Either provider, chosen from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredScreenshots {
    File(FileScreenshotProvider),
    Disabled(NoScreenshots),
}

impl ConfiguredScreenshots {
    pub fn from_path(path: Option<&str>) -> Self {
        match path {
            Some(path) => Self::File(FileScreenshotProvider::new(path)),
            None => Self::Disabled(NoScreenshots),
        }
    }
}

impl ScreenshotProvider for ConfiguredScreenshots {
    async fn capture(&self) -> Option<Bytes> {
        match self {
            Self::File(provider) => provider.capture().await,
            Self::Disabled(provider) => provider.capture().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_capture_file() {
        let path = std::env::temp_dir().join(format!("lootbridge-shot-{}.png", std::process::id()));
        tokio::fs::write(&path, b"\x89PNG fake").await.unwrap();

        let provider = ConfiguredScreenshots::from_path(path.to_str());
        let image = provider.capture().await;
        assert_eq!(image.as_deref(), Some(&b"\x89PNG fake"[..]));

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(provider.capture().await.is_none());
    }

    #[test]
    fn test_disabled_provider() {
        let provider = ConfiguredScreenshots::from_path(None);
        assert!(tokio_test::block_on(provider.capture()).is_none());
    }
}
