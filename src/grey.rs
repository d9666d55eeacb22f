// Row -> 8-bit luma. BT.601 weights in 8.8 fixed point; alpha is
// composited over white paper so transparent regions disappear.

use smol_png::{PALETTE_ALPHA_OFFSET, PixelType};

/// Mid grey, used for layouts the converter does not know.
const UNKNOWN_GREY: u8 = 128;

/// `(77 r + 150 g + 29 b) >> 8`; white maps to 255, black to 0.
#[inline]
pub fn rgb_to_grey(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Composite `grey` at coverage `alpha` over a white background.
#[inline]
pub fn blend_white(grey: u8, alpha: u8) -> u8 {
    let (g, a) = (grey as u32, alpha as u32);
    ((g * a + 255 * (255 - a)) / 255) as u8
}

/// Convert one normalized source row into luma, one byte per pixel.
///
/// `pixels` holds one byte per sample (see `smol_png::Row`). `palette` is
/// the 1024-byte RGB + alpha table for indexed images; without one the
/// index is taken as the grey value. Output length is `out.len()`; missing
/// input samples leave the tail untouched.
pub fn convert_line_to_grey(
    pixels: &[u8],
    out: &mut [u8],
    pixel_type: PixelType,
    palette: Option<&[u8]>,
    has_alpha: bool,
) {
    match pixel_type {
        PixelType::Greyscale => {
            let n = out.len().min(pixels.len());
            out[..n].copy_from_slice(&pixels[..n]);
        }
        PixelType::GreyAlpha => {
            for (o, px) in out.iter_mut().zip(pixels.chunks_exact(2)) {
                *o = blend_white(px[0], px[1]);
            }
        }
        PixelType::Truecolor => {
            for (o, px) in out.iter_mut().zip(pixels.chunks_exact(3)) {
                *o = rgb_to_grey(px[0], px[1], px[2]);
            }
        }
        PixelType::TruecolorAlpha => {
            for (o, px) in out.iter_mut().zip(pixels.chunks_exact(4)) {
                *o = blend_white(rgb_to_grey(px[0], px[1], px[2]), px[3]);
            }
        }
        PixelType::Indexed => match palette {
            Some(pal) if pal.len() >= PALETTE_ALPHA_OFFSET => {
                let alpha = if has_alpha {
                    pal.get(PALETTE_ALPHA_OFFSET..PALETTE_ALPHA_OFFSET + 256)
                } else {
                    None
                };
                for (o, &idx) in out.iter_mut().zip(pixels) {
                    let i = idx as usize * 3;
                    let grey = rgb_to_grey(pal[i], pal[i + 1], pal[i + 2]);
                    *o = match alpha {
                        Some(a) => blend_white(grey, a[idx as usize]),
                        None => grey,
                    };
                }
            }
            _ => {
                let n = out.len().min(pixels.len());
                out[..n].copy_from_slice(&pixels[..n]);
            }
        },
        _ => out.fill(UNKNOWN_GREY),
    }
}
