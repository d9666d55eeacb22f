// Fit-to-box scaling without floats: the factor is kept as a fraction so
// destination extents and row mapping are exact floors.

use core::fmt;

/// Downscale factor `num / den` in `(0, 1]`; zero only for an empty target box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scale {
    num: u32,
    den: u32,
}

impl Scale {
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// Largest factor that fits `src` inside `max`, never above 1.
    ///
    /// A zero-sized source yields [`Scale::ONE`]; a zero-sized box yields
    /// a zero factor (nothing is drawn).
    pub fn fit(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> Self {
        if src_w == 0 || src_h == 0 {
            return Self::ONE;
        }
        // min(max_w/src_w, max_h/src_h), compared by cross-multiplying
        let width_bound = max_w as u64 * src_h as u64 <= max_h as u64 * src_w as u64;
        let (num, den) = if width_bound {
            (max_w, src_w)
        } else {
            (max_h, src_h)
        };
        if num >= den {
            Self::ONE
        } else {
            Self { num, den }
        }
    }

    /// `floor(v * self)`.
    #[inline]
    pub fn apply(&self, v: u32) -> u32 {
        (v as u64 * self.num as u64 / self.den as u64) as u32
    }

    /// Approximate value, for logs.
    pub fn as_f32(&self) -> f32 {
        self.num as f32 / self.den as f32
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Walks destination columns and yields `(dst_x, src_x)` pairs using an
/// error accumulator instead of a per-pixel division. `src_x` is
/// non-decreasing and stays below `src_w`.
#[derive(Clone, Debug)]
pub struct ColumnStepper {
    src_w: u32,
    dst_w: u32,
    dst_x: u32,
    src_x: u32,
    error: u64,
}

impl ColumnStepper {
    pub fn new(src_w: u32, dst_w: u32) -> Self {
        Self {
            src_w,
            dst_w,
            dst_x: 0,
            src_x: 0,
            error: 0,
        }
    }
}

impl Iterator for ColumnStepper {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.dst_x >= self.dst_w || self.src_w == 0 {
            return None;
        }
        let item = (self.dst_x, self.src_x.min(self.src_w - 1));

        self.dst_x += 1;
        self.error += self.src_w as u64;
        while self.error >= self.dst_w as u64 {
            self.error -= self.dst_w as u64;
            self.src_x += 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.src_w == 0 {
            0
        } else {
            self.dst_w.saturating_sub(self.dst_x) as usize
        };
        (left, Some(left))
    }
}

impl ExactSizeIterator for ColumnStepper {}

/// Remembers the last destination row written so source rows that collapse
/// onto it are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowTracker {
    last: Option<u32>,
}

impl RowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `dst_y` is seen in a run of equal rows.
    #[inline]
    pub fn first_visit(&mut self, dst_y: u32) -> bool {
        if self.last == Some(dst_y) {
            return false;
        }
        self.last = Some(dst_y);
        true
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    #[test]
    fn never_upscales() {
        assert_eq!(Scale::fit(10, 10, 800, 480), Scale::ONE);
        assert_eq!(Scale::fit(800, 480, 800, 480), Scale::ONE);
        assert_eq!(Scale::fit(0, 10, 800, 480), Scale::ONE);
    }

    #[test]
    fn fits_tighter_axis() {
        let s = Scale::fit(100, 100, 50, 80);
        assert_eq!((s.num, s.den), (50, 100));
        assert_eq!((s.apply(100), s.apply(100)), (50, 50));

        let s = Scale::fit(1600, 480, 800, 480);
        assert_eq!((s.apply(1600), s.apply(480)), (800, 240));

        let s = Scale::fit(300, 1000, 800, 480);
        assert_eq!((s.apply(300), s.apply(1000)), (144, 480));
        assert!(s.as_f32() <= 1.0);
    }

    #[test]
    fn zero_box_scales_to_nothing() {
        let s = Scale::fit(100, 100, 0, 50);
        assert_eq!((s.apply(100), s.apply(100)), (0, 0));
    }

    #[test]
    fn columns_cover_destination_once() {
        for (src_w, dst_w) in [(10u32, 4u32), (7, 7), (1000, 3), (3, 1), (801, 800)] {
            let cols: Vec<(u32, u32)> = ColumnStepper::new(src_w, dst_w).collect();
            assert_eq!(cols.len(), dst_w as usize);
            for (i, &(dst_x, src_x)) in cols.iter().enumerate() {
                assert_eq!(dst_x, i as u32);
                assert!(src_x < src_w);
            }
            assert!(cols.windows(2).all(|w| w[0].1 <= w[1].1));
        }
    }

    #[test]
    fn stepper_matches_floor_mapping() {
        let cols: Vec<u32> = ColumnStepper::new(10, 4).map(|(_, s)| s).collect();
        assert_eq!(cols, [0, 2, 5, 7]);
        assert_eq!(ColumnStepper::new(10, 4).len(), 4);
        assert_eq!(ColumnStepper::new(0, 4).count(), 0);
    }

    #[test]
    fn duplicate_rows_collapse() {
        let scale = Scale::fit(10, 10, 4, 4);
        let mut tracker = RowTracker::new();
        let kept: Vec<u32> = (0..10)
            .map(|y| scale.apply(y))
            .filter(|&d| tracker.first_visit(d))
            .collect();
        assert_eq!(kept, [0, 1, 2, 3]);
        assert_eq!(tracker.last, Some(3));
        assert!(!tracker.first_visit(3));
    }
}
