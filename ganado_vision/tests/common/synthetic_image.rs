use image::{Rgb, RgbImage};

pub const LESION_RED: Rgb<u8> = Rgb([230, 20, 20]);

/// A flat single-colour image.
pub fn uniform(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

/// A left-to-right grey ramp from black to white.
pub fn horizontal_ramp(width: u32, height: u32) -> RgbImage {
    assert!(width > 1, "ramp needs at least two columns");
    RgbImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / (width - 1)) as u8;
        Rgb([v, v, v])
    })
}

/// Vertical stripes `period` pixels wide alternating between `dark` and `light`.
pub fn vertical_stripes(width: u32, height: u32, period: u32, dark: u8, light: u8) -> RgbImage {
    assert!(period > 0, "stripe period must be positive");
    RgbImage::from_fn(width, height, |x, _| {
        let v = if (x / period) % 2 == 0 { dark } else { light };
        Rgb([v, v, v])
    })
}

/// A square anomalous-red patch at (`x0`, `y0`) on a black background.
pub fn red_patch(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
            LESION_RED
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Deterministic pseudo-random texture (xorshift), so tests see a busy photo.
pub fn noise(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.max(1);
    RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}
