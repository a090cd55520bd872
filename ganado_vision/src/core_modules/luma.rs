// THEORY:
// The `luma` module turns an RGB image into the single-channel plane every other
// stage reads, plus the first-difference gradients built on it.
//
// - `LumaPlane` stores row-major 0..1 luminance.
// - `Gradients` holds central differences `gx[r][c] = L[r][c+1] - L[r][c-1]`
//   and `gy[r][c] = L[r+1][c] - L[r-1][c]`, zero on the border rows/columns, and
//   their Euclidean magnitude.
//
// A plane is never empty: an empty source image yields a 1x1 black plane.

use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::roi::PixelRect;
use image::RgbImage;

#[derive(Debug, Clone, PartialEq)]
pub struct LumaPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl LumaPlane {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Rec. 601 luminance in 0..1 for every pixel.
    pub fn from_rgb(image: &RgbImage) -> Self {
        Self::from_rgb_with(image, Pixel::luminance_normalized)
    }

    /// Unweighted channel mean on the 0..255 scale.
    pub fn channel_mean_from_rgb(image: &RgbImage) -> Self {
        Self::from_rgb_with(image, |pixel| pixel.channel_mean())
    }

    fn from_rgb_with(image: &RgbImage, value: impl Fn(&Pixel) -> f32) -> Self {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Self::new(1, 1);
        }
        let data = image.pixels().map(|rgb| value(&Pixel::from(rgb))).collect();
        Self {
            width: width as usize,
            height: height as usize,
            data,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// Copies the values inside `rect` into a new plane.
    pub fn crop(&self, rect: &PixelRect) -> LumaPlane {
        let mut data = Vec::with_capacity(rect.area());
        for row in rect.row0..rect.row1 {
            data.extend_from_slice(&self.row(row)[rect.col0..rect.col1]);
        }
        LumaPlane {
            width: rect.width(),
            height: rect.height(),
            data,
        }
    }

    pub fn mean(&self) -> f64 {
        mean(self.data.iter().copied())
    }

    pub fn std_dev(&self) -> f64 {
        variance(self.data.iter().copied()).sqrt()
    }

    /// Fraction of values strictly above `threshold`.
    pub fn fraction_above(&self, threshold: f32) -> f64 {
        self.data.iter().filter(|v| **v > threshold).count() as f64 / self.data.len() as f64
    }

    /// Fraction of values strictly below `threshold`.
    pub fn fraction_below(&self, threshold: f32) -> f64 {
        self.data.iter().filter(|v| **v < threshold).count() as f64 / self.data.len() as f64
    }

    /// Mean of each row, top to bottom.
    pub fn row_means(&self) -> Vec<f64> {
        (0..self.height)
            .map(|row| mean(self.row(row).iter().copied()))
            .collect()
    }

    pub fn gradients(&self) -> Gradients {
        let (w, h) = (self.width, self.height);
        let mut gx = vec![0.0f32; w * h];
        let mut gy = vec![0.0f32; w * h];
        for row in 0..h {
            for col in 0..w {
                let idx = row * w + col;
                if col > 0 && col + 1 < w {
                    gx[idx] = self.get(row, col + 1) - self.get(row, col - 1);
                }
                if row > 0 && row + 1 < h {
                    gy[idx] = self.get(row + 1, col) - self.get(row - 1, col);
                }
            }
        }
        let mag = gx
            .iter()
            .zip(&gy)
            .map(|(x, y)| (x * x + y * y).sqrt())
            .collect();
        Gradients {
            gx: LumaPlane { width: w, height: h, data: gx },
            gy: LumaPlane { width: w, height: h, data: gy },
            mag: LumaPlane { width: w, height: h, data: mag },
        }
    }
}

/// First-difference gradient planes of a `LumaPlane`.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub gx: LumaPlane,
    pub gy: LumaPlane,
    pub mag: LumaPlane,
}

impl Gradients {
    /// Sharpness proxy: `var(gx) + var(gy)`. Low values mean a blurry image.
    pub fn sharpness(&self) -> f64 {
        variance(self.gx.data.iter().copied()) + variance(self.gy.data.iter().copied())
    }

    /// Edge energy: `mean|gx| + mean|gy|`.
    pub fn edge_energy(&self) -> f64 {
        mean(self.gx.data.iter().map(|v| v.abs())) + mean(self.gy.data.iter().map(|v| v.abs()))
    }
}

/// Arithmetic mean; 0 for an empty sequence.
pub fn mean(values: impl Iterator<Item = f32>) -> f64 {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, c), v| (s + v as f64, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Population variance; 0 for an empty sequence.
pub fn variance(values: impl Iterator<Item = f32> + Clone) -> f64 {
    let m = mean(values.clone());
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, c), v| {
        (s + (v as f64 - m).powi(2), c + 1)
    });
    if count == 0 { 0.0 } else { sum / count as f64 }
}
