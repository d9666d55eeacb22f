use core::fmt;

/// Default pixel budget: 2048 x 1536.
pub const MAX_SOURCE_PIXELS: u64 = 2048 * 1536;
/// Default per-side limit.
pub const MAX_SOURCE_SIDE: u32 = 2048;

/// Source-dimension limit applied before any row is decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimensionPolicy {
    /// Reject when `width * height` exceeds the budget.
    MaxPixels(u64),
    /// Reject when either side exceeds its bound.
    MaxSide { width: u32, height: u32 },
}

impl DimensionPolicy {
    /// [`DimensionPolicy::MaxSide`] at 2048 x 2048.
    pub const fn max_side_default() -> Self {
        Self::MaxSide {
            width: MAX_SOURCE_SIDE,
            height: MAX_SOURCE_SIDE,
        }
    }

    pub fn permits(&self, width: u32, height: u32) -> bool {
        match *self {
            Self::MaxPixels(max) => u64::from(width) * u64::from(height) <= max,
            Self::MaxSide {
                width: max_w,
                height: max_h,
            } => width <= max_w && height <= max_h,
        }
    }
}

impl Default for DimensionPolicy {
    fn default() -> Self {
        Self::MaxPixels(MAX_SOURCE_PIXELS)
    }
}

impl fmt::Display for DimensionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxPixels(max) => write!(f, "max {max} pixels"),
            Self::MaxSide { width, height } => write!(f, "max {width}x{height}"),
        }
    }
}
