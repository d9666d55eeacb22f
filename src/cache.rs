// 2-bit quantized pixel cache.
//
// Holds the already scaled and quantized raster of one decode so a redraw
// can skip the decoder. Coordinates are screen-absolute; storage is
// relative to the origin the cache was allocated at.
//
// File layout: [width: u16 LE][height: u16 LE][rows], each row
// ceil(width / 4) bytes, 4 px per byte, first pixel in the top bits.

use alloc::string::String;
use alloc::vec::Vec;

use embedded_graphics_core::{
    Pixel, draw_target::DrawTarget, geometry::Point, pixelcolor::Gray2,
};

use crate::error::ImageError;
use crate::render::{Renderer, draw_pixel_with_render_mode};
use crate::storage::Storage;

pub const HEADER_LEN: usize = 4;
const PIXELS_PER_BYTE: usize = 4;
const MAX_LEVEL: u8 = 3;

pub struct PixelCache {
    width: u16,
    height: u16,
    origin_x: i32,
    origin_y: i32,
    row_bytes: usize,
    buf: Vec<u8>,
}

impl PixelCache {
    /// Zeroed cache for a `width` x `height` raster whose top-left pixel is
    /// at (`origin_x`, `origin_y`) on screen.
    pub fn allocate(
        width: u32,
        height: u32,
        origin_x: i32,
        origin_y: i32,
    ) -> Result<Self, ImageError> {
        let too_big = || ImageError::CacheAlloc { width, height };
        if width == 0 || height == 0 {
            return Err(too_big());
        }
        let w = u16::try_from(width).map_err(|_| too_big())?;
        let h = u16::try_from(height).map_err(|_| too_big())?;

        let row_bytes = (w as usize).div_ceil(PIXELS_PER_BYTE);
        let len = row_bytes * h as usize;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| too_big())?;
        buf.resize(len, 0);

        Ok(Self {
            width: w,
            height: h,
            origin_x,
            origin_y,
            row_bytes,
            buf,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_y)
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Packed pixel rows, without the file header.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    // byte index + bit shift of a local pixel
    #[inline]
    fn slot(&self, screen_x: i32, screen_y: i32) -> Option<(usize, u32)> {
        let lx = screen_x.checked_sub(self.origin_x)?;
        let ly = screen_y.checked_sub(self.origin_y)?;
        if lx < 0 || ly < 0 || lx >= self.width as i32 || ly >= self.height as i32 {
            return None;
        }
        let (lx, ly) = (lx as usize, ly as usize);
        let idx = ly * self.row_bytes + lx / PIXELS_PER_BYTE;
        let shift = (3 - (lx % PIXELS_PER_BYTE) as u32) * 2;
        Some((idx, shift))
    }

    /// Store a 2-bit level at a screen coordinate. Out-of-range coordinates
    /// and levels above 3 are ignored.
    #[inline]
    pub fn set_pixel(&mut self, screen_x: i32, screen_y: i32, value: u8) {
        if value > MAX_LEVEL {
            return;
        }
        if let Some((idx, shift)) = self.slot(screen_x, screen_y) {
            self.buf[idx] = (self.buf[idx] & !(0b11 << shift)) | (value << shift);
        }
    }

    pub fn pixel(&self, screen_x: i32, screen_y: i32) -> Option<u8> {
        self.slot(screen_x, screen_y)
            .map(|(idx, shift)| (self.buf[idx] >> shift) & 0b11)
    }

    pub fn encode_header(&self) -> [u8; HEADER_LEN] {
        let mut hdr = [0u8; HEADER_LEN];
        hdr[0..2].copy_from_slice(&self.width.to_le_bytes());
        hdr[2..4].copy_from_slice(&self.height.to_le_bytes());
        hdr
    }

    /// Persist header and rows to `path` in one atomic write.
    pub fn write_to_file<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        path: &str,
    ) -> Result<(), ImageError> {
        let hdr = self.encode_header();
        storage
            .write_atomic(path, &[&hdr[..], &self.buf[..]])
            .map_err(ImageError::CacheWrite)?;
        log::info!(
            "cache: wrote {}x{} ({} bytes) to {}",
            self.width,
            self.height,
            HEADER_LEN + self.buf.len(),
            path
        );
        Ok(())
    }

    /// Read a cache file back, placing it at (`origin_x`, `origin_y`).
    pub fn load_from_file<S: Storage + ?Sized>(
        storage: &S,
        path: &str,
        origin_x: i32,
        origin_y: i32,
    ) -> Result<Self, ImageError> {
        let mut file = storage
            .open_read(path)
            .map_err(|source| ImageError::StreamOpen {
                path: String::from(path),
                source,
            })?;

        let mut hdr = [0u8; HEADER_LEN];
        file.read_exact(&mut hdr)
            .map_err(|_| ImageError::CacheFormat("cache: short header"))?;
        let (width, height) = parse_header(&hdr)?;

        let mut cache = Self::allocate(width as u32, height as u32, origin_x, origin_y)?;
        let expected = (HEADER_LEN + cache.buf.len()) as u64;
        if file.size() != expected {
            log::warn!(
                "cache: {} is {} bytes, expected {}",
                path,
                file.size(),
                expected
            );
            return Err(ImageError::CacheFormat("cache: payload length mismatch"));
        }
        file.read_exact(&mut cache.buf)
            .map_err(|_| ImageError::CacheFormat("cache: truncated payload"))?;
        Ok(cache)
    }

    /// Replay onto a `Gray2` draw target at the cache origin.
    pub fn draw_to<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Gray2>,
    {
        let (w, h) = (self.width as i32, self.height as i32);
        let (ox, oy) = (self.origin_x, self.origin_y);
        let pixels = (0..h).flat_map(move |y| {
            (0..w).filter_map(move |x| {
                let (sx, sy) = (ox + x, oy + y);
                self.pixel(sx, sy)
                    .map(|level| Pixel(Point::new(sx, sy), Gray2::new(level)))
            })
        });
        target.draw_iter(pixels)
    }

    /// Replay through a renderer, honouring its render mode.
    pub fn draw_with_render_mode<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let (sx, sy) = (self.origin_x + x, self.origin_y + y);
                if let Some(level) = self.pixel(sx, sy) {
                    draw_pixel_with_render_mode(renderer, sx, sy, level);
                }
            }
        }
    }
}

/// Width and height from a cache file header.
pub fn parse_header(hdr: &[u8]) -> Result<(u16, u16), ImageError> {
    if hdr.len() < HEADER_LEN {
        return Err(ImageError::CacheFormat("cache: short header"));
    }
    let width = u16::from_le_bytes([hdr[0], hdr[1]]);
    let height = u16::from_le_bytes([hdr[2], hdr[3]]);
    if width == 0 || height == 0 {
        return Err(ImageError::CacheFormat("cache: zero dimension"));
    }
    Ok((width, height))
}
