// PNG adapter: streams rows out of smol-png straight into the renderer.
//
// One call owns its file handle, line buffer and optional cache; nothing
// is shared between calls. The source is never held in memory as a whole:
// each row is converted to grey once, then sampled column by column into
// the fitted destination box.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::ControlFlow;

use smol_png::{ByteSource, PngStream, Row};

use crate::cache::PixelCache;
use crate::decoder::{
    DecodeReport, ImageDecoder, ImageDimensions, RenderConfig, validate_image_dimensions,
    warn_unsupported_feature,
};
use crate::dither::quantize;
use crate::error::ImageError;
use crate::grey::convert_line_to_grey;
use crate::limits::DimensionPolicy;
use crate::render::{Renderer, draw_pixel_with_render_mode};
use crate::scale::{ColumnStepper, RowTracker, Scale};
use crate::storage::{ImageFile, Storage};

// read-ahead over the file handle; chunk headers and CRCs are tiny
const SOURCE_BUF: usize = 512;

/// Buffered [`ByteSource`] over an open file. Dropping it closes the file.
struct FileSource<'a> {
    file: Box<dyn ImageFile + 'a>,
    buf: [u8; SOURCE_BUF],
    pos: usize,
    len: usize,
}

impl<'a> FileSource<'a> {
    fn new(file: Box<dyn ImageFile + 'a>) -> Self {
        Self {
            file,
            buf: [0u8; SOURCE_BUF],
            pos: 0,
            len: 0,
        }
    }
}

impl ByteSource for FileSource<'_> {
    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), &'static str> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.len {
                // large reads go straight to the file
                if out.len() - filled >= SOURCE_BUF {
                    return self
                        .file
                        .read_exact(&mut out[filled..])
                        .map_err(|_| "png: unexpected EOF");
                }
                self.len = self.file.read(&mut self.buf).map_err(|_| "png: read failed")?;
                self.pos = 0;
                if self.len == 0 {
                    return Err("png: unexpected EOF");
                }
            }
            let n = (self.len - self.pos).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), &'static str> {
        let buffered = self.len - self.pos;
        if n <= buffered {
            self.pos += n;
            return Ok(());
        }
        let target = self.file.position() + (n - buffered) as u64;
        if target > self.file.size() {
            return Err("png: unexpected EOF");
        }
        self.file.seek(target).map_err(|_| "png: seek failed")?;
        self.pos = 0;
        self.len = 0;
        Ok(())
    }
}

fn open_stream<'s>(
    storage: &'s dyn Storage,
    path: &str,
) -> Result<PngStream<FileSource<'s>>, ImageError> {
    let file = storage.open_read(path).map_err(|source| {
        log::warn!("png: failed to open {}: {}", path, source);
        ImageError::StreamOpen {
            path: String::from(path),
            source,
        }
    })?;
    PngStream::open(FileSource::new(file)).map_err(|e| {
        log::warn!("png: bad header in {}: {}", path, e);
        ImageError::HeaderInvalid(e)
    })
}

/// Per-call decode state, captured by the row callback.
struct DecodeContext<'r, R: Renderer + ?Sized> {
    renderer: &'r mut R,
    config: &'r RenderConfig,
    screen_width: i32,
    screen_height: i32,
    scale: Scale,
    src_width: u32,
    dst_width: u32,
    dst_height: u32,
    rows: RowTracker,
    grey: Vec<u8>,
    cache: Option<PixelCache>,
    rows_written: u32,
}

impl<'r, R: Renderer + ?Sized> DecodeContext<'r, R> {
    fn new(
        renderer: &'r mut R,
        config: &'r RenderConfig,
        src: ImageDimensions,
    ) -> Result<Self, ImageError> {
        let scale = Scale::fit(src.width, src.height, config.max_width, config.max_height);
        let dst_width = scale.apply(src.width);
        let dst_height = scale.apply(src.height);

        let mut grey = Vec::new();
        grey.try_reserve_exact(src.width as usize)
            .map_err(|_| ImageError::RowDecode("png: OOM for grey line"))?;
        grey.resize(src.width as usize, 0);

        let cache = if config.cache_path.is_some() {
            match PixelCache::allocate(dst_width, dst_height, config.x, config.y) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    log::warn!("png: {}, continuing without caching", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            screen_width: renderer.screen_width(),
            screen_height: renderer.screen_height(),
            renderer,
            config,
            scale,
            src_width: src.width,
            dst_width,
            dst_height,
            rows: RowTracker::new(),
            grey,
            cache,
            rows_written: 0,
        })
    }

    fn draw_row(&mut self, row: &Row<'_>) -> ControlFlow<()> {
        let dst_y = self.scale.apply(row.y);
        // several source rows can land on one destination row
        if !self.rows.first_visit(dst_y) || dst_y >= self.dst_height {
            return ControlFlow::Continue(());
        }
        let out_y = self.config.y.saturating_add(dst_y as i32);
        if out_y < 0 || out_y >= self.screen_height {
            return ControlFlow::Continue(());
        }

        let samples = self.src_width as usize * row.pixel_type.channels();
        if row.width != self.src_width || row.pixels.len() < samples {
            log::warn!(
                "png: row {} has {} samples, expected {}",
                row.y,
                row.pixels.len(),
                samples
            );
            return ControlFlow::Break(());
        }

        convert_line_to_grey(
            row.pixels,
            &mut self.grey,
            row.pixel_type,
            row.palette,
            row.has_alpha,
        );

        let dither = self.config.use_dithering;
        for (dst_x, src_x) in ColumnStepper::new(self.src_width, self.dst_width) {
            let out_x = self.config.x.saturating_add(dst_x as i32);
            if out_x < 0 {
                continue;
            }
            if out_x >= self.screen_width {
                break;
            }
            let level = quantize(self.grey[src_x as usize], out_x, out_y, dither);
            draw_pixel_with_render_mode(&mut *self.renderer, out_x, out_y, level);
            if let Some(cache) = self.cache.as_mut() {
                cache.set_pixel(out_x, out_y, level);
            }
        }
        self.rows_written += 1;
        ControlFlow::Continue(())
    }
}

/// Streaming PNG decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PngDecoder {
    policy: DimensionPolicy,
}

impl PngDecoder {
    pub const FORMAT: &'static str = "PNG";
    pub const EXTENSIONS: &'static [&'static str] = &["png"];

    pub fn new(policy: DimensionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DimensionPolicy {
        self.policy
    }
}

impl ImageDecoder for PngDecoder {
    fn format_name(&self) -> &'static str {
        Self::FORMAT
    }

    fn extensions(&self) -> &'static [&'static str] {
        Self::EXTENSIONS
    }

    fn dimensions(&self, storage: &dyn Storage, path: &str) -> Result<ImageDimensions, ImageError> {
        let stream = open_stream(storage, path)?;
        let hdr = stream.header();
        Ok(ImageDimensions {
            width: hdr.width,
            height: hdr.height,
        })
    }

    fn decode(
        &self,
        storage: &mut dyn Storage,
        path: &str,
        renderer: &mut dyn Renderer,
        config: &RenderConfig,
    ) -> Result<DecodeReport, ImageError> {
        log::info!("png: decoding {}", path);

        let mut stream = open_stream(&*storage, path)?;
        let hdr = *stream.header();
        if !validate_image_dimensions(&self.policy, hdr.width, hdr.height, Self::FORMAT) {
            return Err(ImageError::DimensionTooLarge {
                format: Self::FORMAT,
                width: hdr.width,
                height: hdr.height,
            });
        }
        stream.read_metadata().map_err(ImageError::HeaderInvalid)?;

        if hdr.bit_depth != 8 {
            warn_unsupported_feature(&format!("bit depth ({}bpp)", hdr.bit_depth), path);
        }
        if stream.has_colour_key() {
            warn_unsupported_feature("tRNS colour key", path);
        }

        let source = ImageDimensions {
            width: hdr.width,
            height: hdr.height,
        };
        let mut ctx = DecodeContext::new(renderer, config, source)?;
        log::info!(
            "png: {}x{} -> {}x{} (scale {:.2}), bit depth {}",
            hdr.width,
            hdr.height,
            ctx.dst_width,
            ctx.dst_height,
            ctx.scale.as_f32(),
            hdr.bit_depth
        );

        stream.decode_rows(|row| ctx.draw_row(row)).map_err(|e| {
            log::error!("png: decode of {} failed: {}", path, e);
            ImageError::RowDecode(e)
        })?;
        // closes the file before the cache is written through the same storage
        drop(stream);

        let cached = match (ctx.cache.take(), config.cache_path.as_deref()) {
            (Some(cache), Some(cache_path)) => match cache.write_to_file(storage, cache_path) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("png: {}", e);
                    false
                }
            },
            _ => false,
        };

        log::info!("png: {} done, {} rows", path, ctx.rows_written);
        Ok(DecodeReport {
            source,
            dest_width: ctx.dst_width,
            dest_height: ctx.dst_height,
            scale: ctx.scale,
            rows_written: ctx.rows_written,
            cached,
        })
    }
}
