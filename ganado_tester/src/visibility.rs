// THEORY:
// The visibility ratio handed to the evaluator is estimated from the downscaled
// luminance plane. A row "bears animal" when its variance exceeds a floor: sky,
// bare walls and flat ground are near-uniform while a body in the frame is not.
// The ratio is the share of such rows.

use ganado_vision::core_modules::feature_extractor::downscale;
use ganado_vision::core_modules::luma::{LumaPlane, variance};
use image::RgbImage;

const WORKING_DIMENSION: u32 = 512;
const ROW_VARIANCE_FLOOR: f64 = 0.0015;

pub fn estimate(image: &RgbImage) -> f64 {
    let luma = LumaPlane::from_rgb(&downscale(image, WORKING_DIMENSION));
    let busy = (0..luma.height)
        .filter(|row| variance(luma.row(*row).iter().copied()) > ROW_VARIANCE_FLOOR)
        .count();
    (busy as f64 / luma.height as f64).clamp(0.0, 1.0)
}
