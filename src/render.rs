// Renderer capability handed to decoders, and the mapping from 2-bit
// quantization levels to single-bit-plane draws. Grayscale on the 1-bit
// panel is composed in passes: BW lays down everything darker than white,
// then the MSB and LSB passes each write one plane of the grey LUT.

use crate::framebuffer::FramebufferWriter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Single pass; levels 0-2 are inked, level 3 stays paper.
    #[default]
    Bw,
    /// Low plane: only level 1 is marked.
    GrayscaleLsb,
    /// High plane: levels 1 and 2 are marked.
    GrayscaleMsb,
}

pub trait Renderer {
    fn screen_width(&self) -> i32;
    fn screen_height(&self) -> i32;
    fn render_mode(&self) -> RenderMode;
    /// `ink = true` draws black. Grayscale passes mark their plane with
    /// `ink = false` on a raster cleared to ink beforehand.
    fn draw_pixel(&mut self, x: i32, y: i32, ink: bool);
}

/// Draw a quantized level (0 = black .. 3 = white) under the renderer's
/// current mode. Levels the mode does not draw are left untouched.
#[inline]
pub fn draw_pixel_with_render_mode<R: Renderer + ?Sized>(
    renderer: &mut R,
    x: i32,
    y: i32,
    level: u8,
) {
    match (renderer.render_mode(), level) {
        (RenderMode::Bw, 0..=2) => renderer.draw_pixel(x, y, true),
        (RenderMode::GrayscaleMsb, 1 | 2) => renderer.draw_pixel(x, y, false),
        (RenderMode::GrayscaleLsb, 1) => renderer.draw_pixel(x, y, false),
        _ => {}
    }
}

/// [`Renderer`] over a borrowed framebuffer.
pub struct FramebufferRenderer<'a> {
    fb: FramebufferWriter<'a>,
    mode: RenderMode,
}

impl<'a> FramebufferRenderer<'a> {
    pub fn new(fb: FramebufferWriter<'a>, mode: RenderMode) -> Self {
        Self { fb, mode }
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }

    pub fn framebuffer(&self) -> &FramebufferWriter<'a> {
        &self.fb
    }

    pub fn into_inner(self) -> FramebufferWriter<'a> {
        self.fb
    }
}

impl Renderer for FramebufferRenderer<'_> {
    fn screen_width(&self) -> i32 {
        self.fb.width() as i32
    }

    fn screen_height(&self) -> i32 {
        self.fb.height() as i32
    }

    fn render_mode(&self) -> RenderMode {
        self.mode
    }

    fn draw_pixel(&mut self, x: i32, y: i32, ink: bool) {
        self.fb.set_pixel(x, y, ink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    struct Recorder {
        mode: RenderMode,
        calls: Vec<(i32, i32, bool)>,
    }

    impl Renderer for Recorder {
        fn screen_width(&self) -> i32 {
            16
        }
        fn screen_height(&self) -> i32 {
            16
        }
        fn render_mode(&self) -> RenderMode {
            self.mode
        }
        fn draw_pixel(&mut self, x: i32, y: i32, ink: bool) {
            self.calls.push((x, y, ink));
        }
    }

    fn drawn_levels(mode: RenderMode) -> Vec<(u8, bool)> {
        let mut r = Recorder {
            mode,
            calls: Vec::new(),
        };
        for level in 0..=4u8 {
            draw_pixel_with_render_mode(&mut r, level as i32, 0, level);
        }
        r.calls
            .iter()
            .map(|&(x, _, ink)| (x as u8, ink))
            .collect()
    }

    #[test]
    fn bw_inks_everything_but_white() {
        assert_eq!(
            drawn_levels(RenderMode::Bw),
            [(0, true), (1, true), (2, true)]
        );
    }

    #[test]
    fn grayscale_planes() {
        assert_eq!(
            drawn_levels(RenderMode::GrayscaleMsb),
            [(1, false), (2, false)]
        );
        assert_eq!(drawn_levels(RenderMode::GrayscaleLsb), [(1, false)]);
    }

    #[test]
    fn framebuffer_renderer_writes_through() {
        let mut buf = [0xFFu8; 2];
        let fb = FramebufferWriter::with_dimensions(&mut buf, 8, 2).unwrap();
        let mut r = FramebufferRenderer::new(fb, RenderMode::Bw);
        assert_eq!((r.screen_width(), r.screen_height()), (8, 2));
        draw_pixel_with_render_mode(&mut r, 0, 1, 0);
        draw_pixel_with_render_mode(&mut r, 1, 1, 3);
        assert_eq!(r.framebuffer().is_black(0, 1), Some(true));
        assert_eq!(r.framebuffer().is_black(1, 1), Some(false));

        // LSB plane: black is skipped, light grey lifts the bit
        r.set_render_mode(RenderMode::GrayscaleLsb);
        draw_pixel_with_render_mode(&mut r, 2, 0, 0);
        draw_pixel_with_render_mode(&mut r, 0, 1, 1);
        assert_eq!(r.framebuffer().is_black(2, 0), Some(false));
        assert_eq!(r.framebuffer().is_black(0, 1), Some(false));
        assert_eq!(buf, [0xFF, 0xFF]);
    }
}
