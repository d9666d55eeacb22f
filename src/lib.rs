// pulp-image: streaming image decode onto the e-paper framebuffer.
//
// framebuffer: 1-bit packed raster writer (800x480, MSB-first, set = white)
// render:      renderer capability + render modes (BW / grayscale bit planes)
// grey:        source row -> 8-bit luma (BT.601, alpha over white paper)
// dither:      4x4 Bayer ordered dither to 4 levels
// scale:       fit-to-box scale, integer column stepper, row de-duplication
// cache:       2-bit quantized pixel cache + on-disk persistence
// storage:     file access seam (per-call read handles, atomic writes)
// limits:      source dimension policies
// decoder:     decoder capability trait + shared validation helpers
// png:         streaming PNG adapter over smol-png
// registry:    extension -> decoder dispatch

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod cache;
pub mod decoder;
pub mod dither;
pub mod error;
pub mod framebuffer;
pub mod grey;
pub mod limits;
pub mod png;
pub mod registry;
pub mod render;
pub mod scale;
pub mod storage;

pub use cache::PixelCache;
pub use decoder::{DecodeReport, ImageDecoder, ImageDimensions, RenderConfig};
pub use error::ImageError;
pub use framebuffer::FramebufferWriter;
pub use limits::DimensionPolicy;
pub use png::PngDecoder;
pub use registry::DecoderRegistry;
pub use render::{FramebufferRenderer, RenderMode, Renderer};
pub use scale::Scale;
pub use storage::{ImageFile, MemStorage, Storage, StorageError};

#[cfg(feature = "std")]
pub use storage::DirStorage;
