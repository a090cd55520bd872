// THEORY:
// A `Roi` is a rectangular region of interest described by fractional coordinates
// (0..1) relative to an image's dimensions. It is purely descriptive: the same
// `Roi` resolves to different pixel rectangles for different image sizes, and it
// is recomputed every time it is applied.
//
// Resolution to pixels (`Roi::resolve`) truncates toward zero and then clamps so
// the result always holds at least one row and one column. A region that would
// collapse to nothing degenerates into a single-pixel rectangle instead of
// failing.

/// A fractional region of interest: rows `y0..y1`, columns `x0..x1`, each in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub y0: f64,
    pub y1: f64,
    pub x0: f64,
    pub x1: f64,
}

/// A resolved pixel rectangle, half-open: rows `row0..row1`, columns `col0..col1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub row0: usize,
    pub row1: usize,
    pub col0: usize,
    pub col1: usize,
}

impl PixelRect {
    pub fn width(&self) -> usize {
        self.col1 - self.col0
    }

    pub fn height(&self) -> usize {
        self.row1 - self.row0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

impl Roi {
    pub const FULL: Roi = Roi::new(0.0, 1.0, 0.0, 1.0);

    pub const fn new(y0: f64, y1: f64, x0: f64, x1: f64) -> Self {
        Self { y0, y1, x0, x1 }
    }

    /// Resolves the fractional region against a `width` x `height` image.
    pub fn resolve(&self, width: usize, height: usize) -> PixelRect {
        let (row0, row1) = clamp_span(self.y0, self.y1, height);
        let (col0, col1) = clamp_span(self.x0, self.x1, width);
        PixelRect {
            row0,
            row1,
            col0,
            col1,
        }
    }
}

fn clamp_span(start: f64, end: f64, extent: usize) -> (usize, usize) {
    let extent = extent.max(1);
    let lo = ((extent as f64 * start) as isize).clamp(0, extent as isize - 1) as usize;
    let hi = ((extent as f64 * end) as isize).clamp(lo as isize + 1, extent as isize) as usize;
    (lo, hi)
}
