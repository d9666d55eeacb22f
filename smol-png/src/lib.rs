// smol-png: minimal no_std streaming PNG decoder for e-paper pipelines.
// png: signature/IHDR parsing, PLTE/tRNS collection, IDAT inflate through
//      miniz_oxide, scanline unfiltering; hands each row to a callback with
//      samples normalized to 8 bits per channel. Never holds the full image.

#![no_std]

extern crate alloc;

pub mod png;

pub use png::{
    ByteSource, PALETTE_ALPHA_OFFSET, PALETTE_LEN, PixelType, PngHeader, PngStream, Row,
    SliceSource, read_header,
};
