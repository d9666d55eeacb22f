// Streaming PNG decoder for monochrome e-ink pipelines.
// Reads chunks sequentially from a ByteSource, feeds IDAT into miniz_oxide
// row-by-row and hands each unfiltered scanline to a callback; peak RAM
// ~50KB (32KB dict + 11KB decomp + 4KB input + two scanlines).
// Colour types: 0=greyscale, 2=RGB, 3=palette, 4=grey+alpha, 6=RGBA.
// Interlaced (Adam7) rejected; passes arrive out of row order.
// Row samples are normalized to 8 bits per channel: 16-bit keeps the high
// byte, sub-byte greyscale is rescaled to 0-255, sub-byte palette indices
// are unpacked one per byte.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::ControlFlow;

use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::inflate::core::{DecompressorOxide, decompress, inflate_flags};

// PNG constants

const PNG_SIG: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const CHUNK_IHDR: [u8; 4] = *b"IHDR";
const CHUNK_PLTE: [u8; 4] = *b"PLTE";
const CHUNK_TRNS: [u8; 4] = *b"tRNS";
const CHUNK_IDAT: [u8; 4] = *b"IDAT";
const CHUNK_IEND: [u8; 4] = *b"IEND";

const COLOR_GREYSCALE: u8 = 0;
const COLOR_RGB: u8 = 2;
const COLOR_PALETTE: u8 = 3;
const COLOR_GREY_ALPHA: u8 = 4;
const COLOR_RGBA: u8 = 6;

const FILTER_NONE: u8 = 0;
const FILTER_SUB: u8 = 1;
const FILTER_UP: u8 = 2;
const FILTER_AVERAGE: u8 = 3;
const FILTER_PAETH: u8 = 4;

// miniz_oxide LZ dictionary size; must be a power of two >= 32768
const DICT_SIZE: usize = 32_768;

// IDAT staging buffer between the byte source and the inflater
const READ_BUF: usize = 4096;

/// Offset of the alpha table inside the palette slice handed to row callbacks.
pub const PALETTE_ALPHA_OFFSET: usize = 768;

/// Palette slice layout: 256 RGB triples followed by 256 alpha bytes.
/// Entries without a tRNS value are opaque (255).
pub const PALETTE_LEN: usize = PALETTE_ALPHA_OFFSET + 256;

/// Pixel layout of a decoded row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PixelType {
    Greyscale,
    Truecolor,
    Indexed,
    GreyAlpha,
    TruecolorAlpha,
}

impl PixelType {
    fn from_color_type(color_type: u8) -> Option<Self> {
        match color_type {
            COLOR_GREYSCALE => Some(Self::Greyscale),
            COLOR_RGB => Some(Self::Truecolor),
            COLOR_PALETTE => Some(Self::Indexed),
            COLOR_GREY_ALPHA => Some(Self::GreyAlpha),
            COLOR_RGBA => Some(Self::TruecolorAlpha),
            _ => None,
        }
    }

    /// Samples per pixel in a normalized row.
    pub const fn channels(self) -> usize {
        match self {
            Self::Greyscale | Self::Indexed => 1,
            Self::GreyAlpha => 2,
            Self::Truecolor => 3,
            Self::TruecolorAlpha => 4,
        }
    }

    pub const fn has_alpha_channel(self) -> bool {
        matches!(self, Self::GreyAlpha | Self::TruecolorAlpha)
    }
}

/// IHDR contents that matter for decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub pixel_type: PixelType,
}

impl PngHeader {
    // bytes per complete pixel; filter stride for Sub/Paeth; 1 for sub-byte depths
    fn bytes_per_pixel(&self) -> usize {
        let channels = self.pixel_type.channels();
        if self.bit_depth >= 8 {
            channels * (self.bit_depth as usize / 8)
        } else {
            1 // sub-byte packed
        }
    }

    // byte length of one unfiltered row (without the leading filter byte)
    fn scanline_bytes(&self) -> usize {
        let bits_per_pixel = self.pixel_type.channels() * self.bit_depth as usize;
        (self.width as usize)
            .saturating_mul(bits_per_pixel)
            .saturating_add(7)
            / 8
    }

    /// Length of a normalized row handed to callbacks: one byte per sample.
    pub fn samples_per_row(&self) -> usize {
        (self.width as usize).saturating_mul(self.pixel_type.channels())
    }
}

/// One decoded source row.
pub struct Row<'a> {
    /// Source row index, strictly increasing across callbacks.
    pub y: u32,
    pub width: u32,
    pub pixel_type: PixelType,
    /// `width * channels` samples, 8 bits each.
    pub pixels: &'a [u8],
    /// Present when the image carried a PLTE chunk; see [`PALETTE_LEN`].
    pub palette: Option<&'a [u8]>,
    /// Alpha channel present, or indexed image with a tRNS table.
    pub has_alpha: bool,
}

/// Sequential byte source for the streaming decoder.
pub trait ByteSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), &'static str>;

    fn skip(&mut self, mut n: usize) -> Result<(), &'static str> {
        let mut trash = [0u8; 64];
        while n > 0 {
            let chunk = n.min(64);
            self.read_exact(&mut trash[..chunk])?;
            n -= chunk;
        }
        Ok(())
    }
}

/// Byte source over an in-memory PNG.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn advance(&mut self, n: usize) -> Result<usize, &'static str> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or("png: unexpected EOF")?;
        let start = self.pos;
        self.pos = end;
        Ok(start)
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), &'static str> {
        let start = self.advance(buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), &'static str> {
        self.advance(n).map(|_| ())
    }
}

/// Read the signature and IHDR only; leaves the source positioned at the
/// second chunk.
pub fn read_header<R: ByteSource>(src: &mut R) -> Result<PngHeader, &'static str> {
    let mut sig = [0u8; 8];
    src.read_exact(&mut sig)?;
    if sig != PNG_SIG {
        return Err("png: invalid signature");
    }

    // IHDR (must be first chunk)
    let mut chunk_hdr = [0u8; 8]; // 4-byte length + 4-byte type
    src.read_exact(&mut chunk_hdr)?;
    let ihdr_len = be_u32(&chunk_hdr, 0) as usize;
    if chunk_type(&chunk_hdr) != CHUNK_IHDR || ihdr_len < 13 {
        return Err("png: missing or invalid IHDR");
    }
    let mut ihdr_raw = [0u8; 13];
    src.read_exact(&mut ihdr_raw)?;
    if ihdr_len > 13 {
        src.skip(ihdr_len - 13)?;
    }
    src.skip(4)?; // skip CRC

    let width = be_u32(&ihdr_raw, 0);
    let height = be_u32(&ihdr_raw, 4);
    let bit_depth = ihdr_raw[8];
    let color_type = ihdr_raw[9];

    if width == 0 || height == 0 {
        return Err("png: zero dimensions");
    }
    if ihdr_raw[12] != 0 {
        return Err("png: interlaced PNGs not supported");
    }
    match (color_type, bit_depth) {
        (COLOR_GREYSCALE, 1 | 2 | 4 | 8 | 16) => {}
        (COLOR_RGB, 8 | 16) => {}
        (COLOR_PALETTE, 1 | 2 | 4 | 8) => {}
        (COLOR_GREY_ALPHA, 8 | 16) => {}
        (COLOR_RGBA, 8 | 16) => {}
        _ => return Err("png: unsupported colour type / bit depth"),
    }
    let pixel_type =
        PixelType::from_color_type(color_type).ok_or("png: unsupported colour type")?;

    Ok(PngHeader {
        width,
        height,
        bit_depth,
        pixel_type,
    })
}

/// An opened PNG stream: header parsed, image data not yet touched.
///
/// Dropping the stream drops the byte source, which is how callers close the
/// underlying file.
pub struct PngStream<R> {
    src: R,
    header: PngHeader,
    palette: [u8; PALETTE_LEN],
    has_plte: bool,
    has_trns: bool,
    // length of the first IDAT chunk, once ancillary chunks are consumed
    first_idat: Option<usize>,
}

impl<R: ByteSource> PngStream<R> {
    pub fn open(mut src: R) -> Result<Self, &'static str> {
        let header = read_header(&mut src)?;
        let mut palette = [0u8; PALETTE_LEN];
        palette[PALETTE_ALPHA_OFFSET..].fill(0xFF);
        Ok(Self {
            src,
            header,
            palette,
            has_plte: false,
            has_trns: false,
            first_idat: None,
        })
    }

    pub fn header(&self) -> &PngHeader {
        &self.header
    }

    /// Indexed image with a tRNS alpha table.
    pub fn has_palette_alpha(&self) -> bool {
        self.has_trns && self.header.pixel_type == PixelType::Indexed
    }

    /// tRNS colour key on a greyscale/truecolor image; rows do not apply it.
    pub fn has_colour_key(&self) -> bool {
        self.has_trns && self.header.pixel_type != PixelType::Indexed
    }

    /// Consume chunks up to the first IDAT, collecting PLTE and tRNS.
    /// Idempotent; `decode_rows` calls it if the caller has not.
    pub fn read_metadata(&mut self) -> Result<(), &'static str> {
        if self.first_idat.is_some() {
            return Ok(());
        }

        let mut chunk_hdr = [0u8; 8];
        loop {
            self.src.read_exact(&mut chunk_hdr)?;
            let clen = be_u32(&chunk_hdr, 0) as usize;
            match chunk_type(&chunk_hdr) {
                CHUNK_IDAT => {
                    self.first_idat = Some(clen);
                    return Ok(());
                }
                CHUNK_IEND => return Err("png: no IDAT data"),
                CHUNK_PLTE if clen <= PALETTE_ALPHA_OFFSET && clen.is_multiple_of(3) => {
                    self.src.read_exact(&mut self.palette[..clen])?;
                    self.src.skip(4)?; // CRC
                    self.has_plte = true;
                }
                CHUNK_TRNS
                    if self.header.pixel_type == PixelType::Indexed && clen <= 256 =>
                {
                    let alpha =
                        &mut self.palette[PALETTE_ALPHA_OFFSET..PALETTE_ALPHA_OFFSET + clen];
                    self.src.read_exact(alpha)?;
                    self.src.skip(4)?;
                    self.has_trns = true;
                }
                CHUNK_TRNS => {
                    self.has_trns = true;
                    self.src.skip(clen + 4)?;
                }
                _ => self.src.skip(clen + 4)?, // skip data + CRC
            }
        }
    }

    /// Inflate and unfilter the image, calling `on_row` once per source row
    /// in increasing row order. `ControlFlow::Break` aborts the decode.
    /// Returns the number of rows delivered.
    pub fn decode_rows<F>(&mut self, mut on_row: F) -> Result<u32, &'static str>
    where
        F: FnMut(&Row<'_>) -> ControlFlow<()>,
    {
        self.read_metadata()?;
        let Some(first_idat_len) = self.first_idat else {
            return Err("png: no IDAT data");
        };

        let header = self.header;
        let scanline_bytes = header.scanline_bytes();
        let samples = header.samples_per_row();
        let bpp = header.bytes_per_pixel();
        let src_h = header.height;
        let needs_normalize = header.bit_depth != 8;
        let has_alpha = header.pixel_type.has_alpha_channel() || self.has_palette_alpha();
        let palette = if self.has_plte {
            Some(&self.palette[..])
        } else {
            None
        };

        // allocate working buffers
        let mut prev_row = zeroed(scanline_bytes, "png: OOM for scanline")?;
        let mut curr_row = zeroed(scanline_bytes, "png: OOM for scanline")?;
        let row_total = 1 + scanline_bytes;
        let mut row_buf = zeroed(row_total, "png: OOM for row buffer")?;
        let mut row_pos: usize = 0;
        let mut norm = if needs_normalize {
            zeroed(samples, "png: OOM for sample row")?
        } else {
            Vec::new()
        };

        // streaming zlib decompressor for IDAT data
        let mut decomp = new_decompressor()?;
        let mut dict = zeroed(DICT_SIZE, "png: OOM for inflate window")?;
        let mut dict_pos: usize = 0;
        let mut src_y: u32 = 0;

        // feed IDAT chunks into zlib row-by-row
        let mut idat_buf = [0u8; READ_BUF];
        let mut in_avail: usize = 0;
        let mut idat_chunk_left = first_idat_len;
        let mut more_idat = true;
        let mut chunk_hdr = [0u8; 8];

        loop {
            // top up input buffer from the IDAT stream
            while in_avail < READ_BUF {
                if idat_chunk_left > 0 {
                    let space = READ_BUF - in_avail;
                    let want = idat_chunk_left.min(space);
                    self.src
                        .read_exact(&mut idat_buf[in_avail..in_avail + want])?;
                    in_avail += want;
                    idat_chunk_left -= want;
                } else if more_idat {
                    self.src.skip(4)?; // CRC
                    self.src.read_exact(&mut chunk_hdr)?;
                    if chunk_type(&chunk_hdr) == CHUNK_IDAT {
                        idat_chunk_left = be_u32(&chunk_hdr, 0) as usize;
                    } else {
                        more_idat = false;
                        break;
                    }
                } else {
                    break;
                }
            }

            let has_more = idat_chunk_left > 0 || more_idat;
            let flags = inflate_flags::TINFL_FLAG_PARSE_ZLIB_HEADER
                | if has_more {
                    inflate_flags::TINFL_FLAG_HAS_MORE_INPUT
                } else {
                    0
                };

            let write_pos = dict_pos & (DICT_SIZE - 1);
            let (status, consumed, produced) =
                decompress(&mut decomp, &idat_buf[..in_avail], &mut dict, write_pos, flags);

            if consumed > 0 && consumed < in_avail {
                idat_buf.copy_within(consumed..in_avail, 0);
            }
            in_avail -= consumed;

            // feed decompressed bytes into the scanline accumulator
            for i in 0..produced {
                row_buf[row_pos] = dict[(write_pos + i) & (DICT_SIZE - 1)];
                row_pos += 1;

                if row_pos == row_total {
                    let filter = row_buf[0];
                    curr_row.copy_from_slice(&row_buf[1..]);

                    unfilter_row(filter, &mut curr_row, &prev_row, bpp);

                    // trailing garbage past the last row is ignored
                    if src_y < src_h {
                        let pixels: &[u8] = if needs_normalize {
                            normalize_row(&curr_row, &header, &mut norm);
                            &norm
                        } else {
                            &curr_row[..samples]
                        };
                        let row = Row {
                            y: src_y,
                            width: header.width,
                            pixel_type: header.pixel_type,
                            pixels,
                            palette,
                            has_alpha,
                        };
                        if on_row(&row).is_break() {
                            return Err("png: decode aborted by row callback");
                        }
                    }

                    core::mem::swap(&mut prev_row, &mut curr_row);
                    row_pos = 0;
                    src_y = src_y.saturating_add(1);
                }
            }

            dict_pos += produced;

            match status {
                TINFLStatus::Done => break,
                TINFLStatus::NeedsMoreInput => {
                    if !has_more && in_avail == 0 {
                        return Err("png: truncated IDAT stream");
                    }
                    if consumed == 0 && produced == 0 && in_avail >= READ_BUF {
                        return Err("png: IDAT decompression stuck");
                    }
                }
                TINFLStatus::HasMoreOutput => {
                    if produced == 0 && consumed == 0 {
                        return Err("png: decompression stalled (output)");
                    }
                }
                _ => return Err("png: IDAT decompression error"),
            }
        }

        if src_y < src_h {
            log::warn!("png: expected {} rows, got {}", src_h, src_y);
            return Err("png: image data ended early");
        }

        Ok(src_h)
    }
}

// allocation helpers

fn zeroed(len: usize, oom: &'static str) -> Result<Vec<u8>, &'static str> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| oom)?;
    v.resize(len, 0u8);
    Ok(v)
}

// ~11KB DecompressorOxide; alloc zeroed directly since Box::new() overflows
// the stack on small targets
fn new_decompressor() -> Result<Box<DecompressorOxide>, &'static str> {
    let layout = core::alloc::Layout::new::<DecompressorOxide>();
    let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err("png: OOM for decompressor");
    }
    // SAFETY: non-null, allocated with DecompressorOxide's layout; the
    // all-zero bit pattern is the decompressor's initial state
    Ok(unsafe { Box::from_raw(ptr as *mut DecompressorOxide) })
}

// chunk helpers

// big-endian u32 (PNG uses network byte order)
#[inline]
fn be_u32(d: &[u8], o: usize) -> u32 {
    u32::from_be_bytes([d[o], d[o + 1], d[o + 2], d[o + 3]])
}

#[inline]
fn chunk_type(hdr: &[u8; 8]) -> [u8; 4] {
    [hdr[4], hdr[5], hdr[6], hdr[7]]
}

// unfiltering

// reconstruct one scanline in-place given the previous unfiltered row; bpp = byte stride
fn unfilter_row(filter: u8, row: &mut [u8], prev: &[u8], bpp: usize) {
    let len = row.len();
    match filter {
        FILTER_NONE => {}
        FILTER_SUB => {
            for i in bpp..len {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        FILTER_UP => {
            for i in 0..len {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        FILTER_AVERAGE => {
            for i in 0..len {
                let a = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                let b = prev[i] as u16;
                row[i] = row[i].wrapping_add(((a + b) / 2) as u8);
            }
        }
        FILTER_PAETH => {
            for i in 0..len {
                let a = if i >= bpp { row[i - bpp] } else { 0 };
                let b = prev[i];
                let c = if i >= bpp { prev[i - bpp] } else { 0 };
                row[i] = row[i].wrapping_add(paeth(a, b, c));
            }
        }
        _ => {} // unknown filter; treat as None (best-effort)
    }
}

#[inline]
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;
    let p = a + b - c;
    let pa = (p - a).unsigned_abs();
    let pb = (p - b).unsigned_abs();
    let pc = (p - c).unsigned_abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

// sample normalization

// widen or narrow an unfiltered scanline to one byte per sample
fn normalize_row(raw: &[u8], hdr: &PngHeader, out: &mut [u8]) {
    match hdr.bit_depth {
        16 => {
            // high byte only
            for (o, pair) in out.iter_mut().zip(raw.chunks_exact(2)) {
                *o = pair[0];
            }
        }
        bit_depth => {
            let rescale = hdr.pixel_type == PixelType::Greyscale;
            for (x, o) in out.iter_mut().enumerate() {
                *o = if rescale {
                    unpack_sub_byte(raw, x, bit_depth)
                } else {
                    unpack_sub_byte_raw(raw, x, bit_depth)
                };
            }
        }
    }
}

// unpack a sub-byte greyscale sample (1/2/4 bit) and scale to 0-255
#[inline]
fn unpack_sub_byte(row: &[u8], x: usize, bit_depth: u8) -> u8 {
    let raw = unpack_sub_byte_raw(row, x, bit_depth);
    let max = (1u16 << bit_depth) - 1;
    (raw as u16 * 255 / max) as u8
}

// unpack a sub-byte sample without rescaling (for palette index)
#[inline]
fn unpack_sub_byte_raw(row: &[u8], x: usize, bit_depth: u8) -> u8 {
    let bpp = bit_depth as usize;
    let ppb = 8 / bpp; // pixels per byte
    let byte_idx = x / ppb;
    let bit_offset = (ppb - 1 - x % ppb) * bpp;
    let mask = (1u8 << bpp) - 1;
    (row[byte_idx] >> bit_offset) & mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    // CRCs are never verified by the decoder, so the builder writes zeros
    fn chunk(out: &mut Vec<u8>, ctype: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(ctype);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    fn build_png(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: u8,
        extra: &[(&[u8; 4], &[u8])],
        scanlines: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PNG_SIG);
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, 0]);
        chunk(&mut out, b"IHDR", &ihdr);
        for (ctype, data) in extra {
            chunk(&mut out, ctype, data);
        }
        let z = miniz_oxide::deflate::compress_to_vec_zlib(scanlines, 6);
        // split IDAT to exercise the chunk hand-over
        let mid = z.len() / 2;
        chunk(&mut out, b"IDAT", &z[..mid]);
        chunk(&mut out, b"IDAT", &z[mid..]);
        chunk(&mut out, b"IEND", &[]);
        out
    }

    fn collect_rows(png: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, &'static str> {
        let mut stream = PngStream::open(SliceSource::new(png))?;
        let mut rows = Vec::new();
        stream.decode_rows(|row| {
            rows.push((row.y, row.pixels.to_vec()));
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    #[test]
    fn header_only_read() {
        let png = build_png(7, 3, 8, COLOR_RGB, &[], &[0u8; 3 * (1 + 21)]);
        let mut src = SliceSource::new(&png);
        let hdr = read_header(&mut src).unwrap();
        assert_eq!(hdr.width, 7);
        assert_eq!(hdr.height, 3);
        assert_eq!(hdr.pixel_type, PixelType::Truecolor);
        assert_eq!(hdr.samples_per_row(), 21);
    }

    #[test]
    fn rejects_bad_signature_and_interlace() {
        let mut png = build_png(1, 1, 8, COLOR_GREYSCALE, &[], &[0, 0]);
        png[0] = 0;
        assert_eq!(
            PngStream::open(SliceSource::new(&png)).err(),
            Some("png: invalid signature")
        );

        let mut png = build_png(1, 1, 8, COLOR_GREYSCALE, &[], &[0, 0]);
        png[8 + 8 + 12] = 1; // interlace byte of IHDR
        assert_eq!(
            PngStream::open(SliceSource::new(&png)).err(),
            Some("png: interlaced PNGs not supported")
        );
    }

    #[test]
    fn greyscale_rows_in_order() {
        let scan = [0, 10, 20, 30, 0, 40, 50, 60];
        let png = build_png(3, 2, 8, COLOR_GREYSCALE, &[], &scan);
        let rows = collect_rows(&png).unwrap();
        assert_eq!(rows, vec![(0, vec![10, 20, 30]), (1, vec![40, 50, 60])]);
    }

    #[test]
    fn sub_and_up_filters() {
        // row 0: Sub  [10, +5, +5] -> 10 15 20
        // row 1: Up   [1, 1, 1]    -> 11 16 21
        let scan = [FILTER_SUB, 10, 5, 5, FILTER_UP, 1, 1, 1];
        let png = build_png(3, 2, 8, COLOR_GREYSCALE, &[], &scan);
        let rows = collect_rows(&png).unwrap();
        assert_eq!(rows[0].1, vec![10, 15, 20]);
        assert_eq!(rows[1].1, vec![11, 16, 21]);
    }

    #[test]
    fn paeth_predictor() {
        assert_eq!(paeth(10, 20, 10), 20);
        assert_eq!(paeth(20, 10, 10), 20);
        assert_eq!(paeth(0, 0, 0), 0);
    }

    #[test]
    fn sixteen_bit_keeps_high_byte() {
        let scan = [0, 0xAB, 0xCD, 0x12, 0x34];
        let png = build_png(2, 1, 16, COLOR_GREYSCALE, &[], &scan);
        let rows = collect_rows(&png).unwrap();
        assert_eq!(rows[0].1, vec![0xAB, 0x12]);
    }

    #[test]
    fn sub_byte_grey_rescaled_and_palette_unpacked() {
        // 1-bit grey: 1010 0000 -> 255 0 255 0
        let png = build_png(4, 1, 1, COLOR_GREYSCALE, &[], &[0, 0b1010_0000]);
        assert_eq!(collect_rows(&png).unwrap()[0].1, vec![255, 0, 255, 0]);

        // 2-bit palette: indices 3 2 1 0
        let plte = [0u8; 12];
        let png = build_png(
            4,
            1,
            2,
            COLOR_PALETTE,
            &[(b"PLTE", &plte[..])],
            &[0, 0b11_10_01_00],
        );
        assert_eq!(collect_rows(&png).unwrap()[0].1, vec![3, 2, 1, 0]);
    }

    #[test]
    fn palette_and_trns_exposed_to_rows() {
        let plte = [255, 0, 0, 0, 0, 255];
        let trns = [128u8];
        let png = build_png(
            2,
            1,
            8,
            COLOR_PALETTE,
            &[(b"PLTE", &plte[..]), (b"tRNS", &trns[..])],
            &[0, 0, 1],
        );
        let mut stream = PngStream::open(SliceSource::new(&png)).unwrap();
        stream.read_metadata().unwrap();
        assert!(stream.has_palette_alpha());
        assert!(!stream.has_colour_key());
        stream
            .decode_rows(|row| {
                let pal = row.palette.unwrap();
                assert_eq!(pal.len(), PALETTE_LEN);
                assert_eq!(&pal[..6], &plte);
                assert_eq!(pal[PALETTE_ALPHA_OFFSET], 128);
                assert_eq!(pal[PALETTE_ALPHA_OFFSET + 1], 255);
                assert!(row.has_alpha);
                ControlFlow::Continue(())
            })
            .unwrap();
    }

    #[test]
    fn colour_key_flagged_for_truecolor() {
        let trns = [0u8, 0, 0, 0, 0, 0];
        let png = build_png(1, 1, 8, COLOR_RGB, &[(b"tRNS", &trns[..])], &[0, 1, 2, 3]);
        let mut stream = PngStream::open(SliceSource::new(&png)).unwrap();
        stream.read_metadata().unwrap();
        assert!(stream.has_colour_key());
    }

    #[test]
    fn callback_break_aborts() {
        let scan = vec![0u8; 4 * (1 + 2)];
        let png = build_png(2, 4, 8, COLOR_GREYSCALE, &[], &scan);
        let mut stream = PngStream::open(SliceSource::new(&png)).unwrap();
        let mut seen = 0;
        let res = stream.decode_rows(|_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(res, Err("png: decode aborted by row callback"));
        assert_eq!(seen, 2);
    }

    #[test]
    fn missing_rows_is_an_error() {
        // header claims 3 rows, data holds 2
        let scan = [0u8, 1, 0, 2];
        let png = build_png(1, 3, 8, COLOR_GREYSCALE, &[], &scan);
        assert_eq!(collect_rows(&png).err(), Some("png: image data ended early"));
    }

    #[test]
    fn truncated_file_is_an_error() {
        let scan = vec![0u8; 16 * (1 + 16)];
        let png = build_png(16, 16, 8, COLOR_GREYSCALE, &[], &scan);
        let cut = &png[..png.len() - 20];
        assert!(collect_rows(cut).is_err());
    }
}
