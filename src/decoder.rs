// Decoder capability shared by every format adapter, plus the checks all
// adapters run the same way.

use alloc::string::String;

use crate::error::ImageError;
use crate::framebuffer::{HEIGHT, WIDTH};
use crate::limits::DimensionPolicy;
use crate::render::Renderer;
use crate::scale::Scale;
use crate::storage::Storage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Where and how one image is drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Top-left of the target box, in screen coordinates.
    pub x: i32,
    pub y: i32,
    /// Box the image is fitted into; images are never enlarged.
    pub max_width: u32,
    pub max_height: u32,
    pub use_dithering: bool,
    /// Write a pixel cache here after a successful decode.
    pub cache_path: Option<String>,
}

impl RenderConfig {
    pub fn new(x: i32, y: i32, max_width: u32, max_height: u32) -> Self {
        Self {
            x,
            y,
            max_width,
            max_height,
            use_dithering: false,
            cache_path: None,
        }
    }

    pub fn with_dithering(mut self, on: bool) -> Self {
        self.use_dithering = on;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<String>) -> Self {
        self.cache_path = Some(path.into());
        self
    }
}

impl Default for RenderConfig {
    /// Whole screen, dithered, no cache.
    fn default() -> Self {
        Self::new(0, 0, WIDTH as u32, HEIGHT as u32).with_dithering(true)
    }
}

/// Outcome of a successful decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeReport {
    pub source: ImageDimensions,
    pub dest_width: u32,
    pub dest_height: u32,
    pub scale: Scale,
    /// Destination rows drawn (at most `dest_height`).
    pub rows_written: u32,
    /// A cache file was written to `RenderConfig::cache_path`.
    pub cached: bool,
}

/// One image format. Adapters are shared by the registry across tasks, so
/// they hold no per-decode state.
pub trait ImageDecoder: Send + Sync {
    /// Short name for logs, e.g. "PNG".
    fn format_name(&self) -> &'static str;

    /// Lowercase extensions without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Case-insensitive; the leading dot is optional.
    fn supports_format(&self, extension: &str) -> bool {
        let ext = extension.strip_prefix('.').unwrap_or(extension);
        !ext.is_empty()
            && self
                .extensions()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
    }

    /// Read only the header of `path`.
    fn dimensions(&self, storage: &dyn Storage, path: &str) -> Result<ImageDimensions, ImageError>;

    /// Decode `path` into the renderer, fitted into the config's box.
    fn decode(
        &self,
        storage: &mut dyn Storage,
        path: &str,
        renderer: &mut dyn Renderer,
        config: &RenderConfig,
    ) -> Result<DecodeReport, ImageError>;

    /// [`decode`](Self::decode), reporting failure as `false` after logging it.
    fn decode_to_framebuffer(
        &self,
        storage: &mut dyn Storage,
        path: &str,
        renderer: &mut dyn Renderer,
        config: &RenderConfig,
    ) -> bool {
        match self.decode(storage, path, renderer, config) {
            Ok(_) => true,
            Err(e) => {
                log::error!("dec: {} decode of {} failed: {}", self.format_name(), path, e);
                false
            }
        }
    }
}

/// Apply `policy` to a source image, logging rejections.
pub fn validate_image_dimensions(
    policy: &DimensionPolicy,
    width: u32,
    height: u32,
    format: &str,
) -> bool {
    if policy.permits(width, height) {
        return true;
    }
    log::warn!(
        "img: image too large ({}x{} = {} pixels {}), limit: {}",
        width,
        height,
        u64::from(width) * u64::from(height),
        format,
        policy
    );
    false
}

/// Non-fatal notice that part of an image will not render faithfully.
pub fn warn_unsupported_feature(feature: &str, path: &str) {
    log::warn!(
        "img: unsupported feature '{}' in image '{}'; image may not display correctly",
        feature,
        path
    );
}
