#![allow(dead_code)]

use std::collections::BTreeSet;

use pulp_image::{RenderMode, Renderer};

pub const GREY: u8 = 0;
pub const RGB: u8 = 2;
pub const INDEXED: u8 = 3;
pub const GREY_ALPHA: u8 = 4;
pub const RGBA: u8 = 6;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in data {
        crc ^= b as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn chunk(out: &mut Vec<u8>, ctype: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(ctype);
    out.extend_from_slice(data);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

fn channels(color_type: u8) -> usize {
    match color_type {
        RGB => 3,
        GREY_ALPHA => 2,
        RGBA => 4,
        _ => 1,
    }
}

/// Encode a non-interlaced PNG. `raw` holds the packed, unfiltered rows
/// back to back; every row is emitted with filter type 0.
pub fn encode_png(
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    extra: &[(&[u8; 4], &[u8])],
    raw: &[u8],
) -> Vec<u8> {
    let row_len = (width as usize * channels(color_type) * bit_depth as usize).div_ceil(8);
    assert_eq!(raw.len(), row_len * height as usize, "raw row data size");

    let mut scanlines = Vec::with_capacity((row_len + 1) * height as usize);
    for row in raw.chunks(row_len.max(1)) {
        scanlines.push(0);
        scanlines.extend_from_slice(row);
    }

    let mut out = vec![137, 80, 78, 71, 13, 10, 26, 10];
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
    chunk(&mut out, b"IHDR", &ihdr);
    for (ctype, data) in extra {
        chunk(&mut out, ctype, data);
    }
    let z = miniz_oxide::deflate::compress_to_vec_zlib(&scanlines, 6);
    let mid = z.len() / 2;
    chunk(&mut out, b"IDAT", &z[..mid]);
    chunk(&mut out, b"IDAT", &z[mid..]);
    chunk(&mut out, b"IEND", &[]);
    out
}

/// 8-bit greyscale image of one flat value.
pub fn flat_grey_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode_png(
        width,
        height,
        8,
        GREY,
        &[],
        &vec![value; (width * height) as usize],
    )
}

/// Image whose IHDR claims `width` x `height` but whose data is a stub;
/// enough for anything that stops after the header.
pub fn header_only_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = encode_png(1, 1, 8, GREY, &[], &[0]);
    out[16..20].copy_from_slice(&width.to_be_bytes());
    out[20..24].copy_from_slice(&height.to_be_bytes());
    out
}

/// Renderer that records every draw call.
pub struct RecordingRenderer {
    pub width: i32,
    pub height: i32,
    pub mode: RenderMode,
    pub draws: Vec<(i32, i32, bool)>,
}

impl RecordingRenderer {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            mode: RenderMode::Bw,
            draws: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn rows(&self) -> BTreeSet<i32> {
        self.draws.iter().map(|&(_, y, _)| y).collect()
    }

    pub fn inked(&self) -> BTreeSet<(i32, i32)> {
        self.draws
            .iter()
            .filter(|&&(_, _, ink)| ink)
            .map(|&(x, y, _)| (x, y))
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn screen_width(&self) -> i32 {
        self.width
    }

    fn screen_height(&self) -> i32 {
        self.height
    }

    fn render_mode(&self) -> RenderMode {
        self.mode
    }

    fn draw_pixel(&mut self, x: i32, y: i32, ink: bool) {
        self.draws.push((x, y, ink));
    }
}
