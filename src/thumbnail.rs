//! Thumbnail rendering seam.
//!
//! Rendering is consumed as an interface only; the engine requests a raster
//! after each push and attaches the resulting URL once available. Entries
//! are valid with `thumbnail_url = None` in the interim, and render failures
//! are tolerated silently.

use async_trait::async_trait;
use thiserror::Error;

use crate::CanvasState;

/// Errors a renderer may report.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Rendering failed.
    #[error("Rendering error: {0}")]
    Render(String),
    /// Rendering did not complete in time.
    #[error("Rendering timed out")]
    Timeout,
}

/// Rasterizes a canvas state to a small preview image.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    /// Render `state` at the given pixel size, returning a URL (or data URI)
    /// for the raster.
    ///
    /// # Errors
    ///
    /// Returns a [`ThumbnailError`] on failure or timeout; the engine leaves
    /// `thumbnail_url` unset in that case.
    async fn render(
        &self,
        state: &CanvasState,
        width: u32,
        height: u32,
    ) -> Result<String, ThumbnailError>;
}
