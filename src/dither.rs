// 4x4 ordered (Bayer) dither to the panel's four grey levels.
// Position-only: the same (grey, x, y) always yields the same level, so
// rows can be produced in any order and cached output stays stable.

pub const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Map luma to a 2-bit level (0 = black .. 3 = white) with an ordered
/// threshold offset from [`BAYER_4X4`].
#[inline]
pub fn bayer_dither_4level(grey: u8, x: i32, y: i32) -> u8 {
    let threshold = BAYER_4X4[(y & 3) as usize][(x & 3) as usize] as i32;
    let adjusted = (grey as i32 + (threshold - 8) * 5).clamp(0, 255);
    match adjusted {
        0..=63 => 0,
        64..=127 => 1,
        128..=191 => 2,
        _ => 3,
    }
}

/// Plain 4-level quantization, no dithering.
#[inline]
pub fn quantize_4level(grey: u8) -> u8 {
    (grey / 85).min(3)
}

#[inline]
pub fn quantize(grey: u8, x: i32, y: i32, dither: bool) -> u8 {
    if dither {
        bayer_dither_4level(grey, x, y)
    } else {
        quantize_4level(grey)
    }
}
