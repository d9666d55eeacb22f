// Bit-packed e-paper framebuffer writer.
// 1 bit per pixel, MSB-first within each byte, row-major; set bit = white
// (paper), clear bit = black (ink), matching the SSD1677 RAM polarity.
// The buffer belongs to the display driver; the writer only borrows it.
// Out-of-range coordinates are clipped silently.

use embedded_graphics_core::{
    Pixel,
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Size},
    pixelcolor::{Gray2, GrayColor},
};

pub const WIDTH: u16 = 800;
pub const HEIGHT: u16 = 480;
pub const ROW_BYTES: usize = WIDTH as usize / 8; // 100
pub const FRAMEBUFFER_SIZE: usize = ROW_BYTES * HEIGHT as usize; // 48000

// highest 2-bit level; levels 0-1 pack as ink, 2-3 as paper
const MAX_LEVEL: u8 = 3;

pub struct FramebufferWriter<'a> {
    buf: &'a mut [u8],
    width: u16,
    height: u16,
    row_bytes: usize,
}

impl<'a> FramebufferWriter<'a> {
    /// Writer over the physical 800x480 raster; `None` if `buf` is shorter
    /// than [`FRAMEBUFFER_SIZE`].
    pub fn new(buf: &'a mut [u8]) -> Option<Self> {
        Self::with_dimensions(buf, WIDTH, HEIGHT)
    }

    /// Writer over an arbitrary packed raster (partial windows, tests).
    pub fn with_dimensions(buf: &'a mut [u8], width: u16, height: u16) -> Option<Self> {
        let row_bytes = (width as usize).div_ceil(8);
        if buf.len() < row_bytes * height as usize {
            return None;
        }
        Some(Self {
            buf,
            width,
            height,
            row_bytes,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.row_bytes * self.height as usize]
    }

    // byte index + bit mask, or None when clipped
    #[inline]
    fn locate(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        let idx = y * self.row_bytes + x / 8;
        let bit = 7 - (x % 8);
        Some((idx, 1 << bit))
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, black: bool) {
        let Some((idx, mask)) = self.locate(x, y) else {
            return;
        };
        if black {
            self.buf[idx] &= !mask;
        } else {
            self.buf[idx] |= mask;
        }
    }

    /// 2-bit level entry point for grayscale callers on the 1-bit raster;
    /// levels below 2 become ink. Levels above 3 are ignored.
    #[inline]
    pub fn set_pixel_2bit(&mut self, x: i32, y: i32, value: u8) {
        if value > MAX_LEVEL {
            return;
        }
        self.set_pixel(x, y, value < 2);
    }

    /// `Some(true)` for ink, `None` outside the raster.
    pub fn is_black(&self, x: i32, y: i32) -> Option<bool> {
        self.locate(x, y)
            .map(|(idx, mask)| self.buf[idx] & mask == 0)
    }
}

impl OriginDimensions for FramebufferWriter<'_> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for FramebufferWriter<'_> {
    type Color = Gray2;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            self.set_pixel_2bit(coord.x, coord.y, color.luma());
        }
        Ok(())
    }
}
