//! Camera capture for snapshot questions

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{Error, Result};

/// Default capture device
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Default capture resolution
pub const DEFAULT_CAMERA_RESOLUTION: &str = "1280x720";

/// Source of still pictures
#[async_trait]
pub trait Camera: Send + Sync {
    /// Take a picture and return where it was saved, or `None` if the camera
    /// did not produce one
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the camera cannot be driven at all
    async fn capture(&self) -> Result<Option<PathBuf>>;
}

/// Webcam driven through `fswebcam`
pub struct WebcamCamera {
    program: String,
    device: String,
    resolution: String,
    output_dir: PathBuf,
}

impl WebcamCamera {
    /// Create a camera for `device` at `resolution` writing PNGs to the temp dir
    #[must_use]
    pub fn new(device: impl Into<String>, resolution: impl Into<String>) -> Self {
        Self {
            program: "fswebcam".to_string(),
            device: device.into(),
            resolution: resolution.into(),
            output_dir: std::env::temp_dir(),
        }
    }

    /// Use a different capture program with fswebcam-compatible arguments
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Write pictures somewhere other than the temp dir
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

impl Default for WebcamCamera {
    fn default() -> Self {
        Self::new(DEFAULT_CAMERA_DEVICE, DEFAULT_CAMERA_RESOLUTION)
    }
}

#[async_trait]
impl Camera for WebcamCamera {
    async fn capture(&self) -> Result<Option<PathBuf>> {
        let path = self.output_dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        tracing::info!(device = %self.device, path = %path.display(), "taking picture");

        let output = tokio::process::Command::new(&self.program)
            .arg("--no-banner")
            .args(["--resolution", &self.resolution])
            .args(["-d", &self.device])
            .args(["--png", "1"])
            .arg("--save")
            .arg(&path)
            .output()
            .await
            .map_err(|e| Error::Capture(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            tracing::warn!(
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "camera capture failed"
            );
            return Ok(None);
        }

        Ok(Some(path))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_capture_yields_no_picture() {
        let camera = WebcamCamera::default().with_program("false");
        assert_eq!(camera.capture().await.unwrap(), None);
    }

    #[tokio::test]
    async fn successful_capture_returns_png_path() {
        let dir = tempfile::tempdir().unwrap();
        let camera = WebcamCamera::default()
            .with_program("true")
            .with_output_dir(dir.path());

        let path = camera.capture().await.unwrap().unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    }

    #[tokio::test]
    async fn missing_program_is_capture_error() {
        let camera = WebcamCamera::default().with_program("/nonexistent/fswebcam");
        assert!(matches!(camera.capture().await, Err(Error::Capture(_))));
    }
}
