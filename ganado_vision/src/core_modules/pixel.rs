// THEORY (single-pixel color heuristics):
// The `Pixel` module is the smallest unit of the evaluation engine. It wraps one
// RGB sample and answers questions that need no neighbors: how bright is it, how
// saturated is it, and does it look like inflamed or bloody tissue.
//
// Heuristic families (all single-pixel):
// - Brightness:   luminance (Rec. 601) on the 0..255 scale, plus a 0..1 form
// - Color strength: chroma (max−min) and HSV saturation (chroma / max)
// - Red anomaly:  red channel above an absolute floor, above green and blue by a
//                 margin, and saturated enough to rule out pinkish-gray coats
//
// Gradients, regions and shapes live in higher modules (`luma`,
// `region_segmenter`). Nothing here reads a neighbor.

pub mod pixel {
    use image::Rgb;

    pub type Channel = u8;
    pub type NormalizedChannel = f32;
    pub type Luminance = f64;
    pub type Saturation = f32;
    pub type Chroma = f32;

    /// Red channel must exceed this absolute value (0..255).
    pub const RED_FLOOR: f32 = 140.0;
    /// Red must exceed both green and blue by at least this margin (0..255).
    pub const RED_MARGIN: f32 = 20.0;
    /// HSV saturation the pixel must exceed to count as anomalous red.
    pub const RED_SATURATION_MIN: Saturation = 0.35;

    /// A "dumb" data container for a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Self { red, green, blue }
        }

        /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
        pub fn luminance(&self) -> Luminance {
            0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
        }

        /// Luminance scaled to 0..1.
        pub fn luminance_normalized(&self) -> f32 {
            (self.luminance() / 255.0) as f32
        }

        /// Unweighted channel mean on the 0..255 scale.
        pub fn channel_mean(&self) -> f32 {
            (self.red as f32 + self.green as f32 + self.blue as f32) / 3.0
        }

        fn normalized(&self) -> (NormalizedChannel, NormalizedChannel, NormalizedChannel) {
            (
                self.red as NormalizedChannel / 255.0,
                self.green as NormalizedChannel / 255.0,
                self.blue as NormalizedChannel / 255.0,
            )
        }

        /// Chroma (C): max(R,G,B) - min(R,G,B) on normalized channels.
        pub fn chroma(&self) -> Chroma {
            let (r, g, b) = self.normalized();
            r.max(g.max(b)) - r.min(g.min(b))
        }

        /// Saturation (HSV): chroma / value, 0 for (near) black pixels.
        pub fn saturation_hsv(&self) -> Saturation {
            let (r, g, b) = self.normalized();
            let maximum_channel = r.max(g.max(b));
            if maximum_channel <= 1e-6 {
                return 0.0;
            }
            self.chroma() / maximum_channel
        }

        /// True when the pixel reads as anomalous red (blood, inflamed tissue,
        /// prolapsed mucosa).
        pub fn is_anomalous_red(&self) -> bool {
            let red = self.red as f32;
            red > RED_FLOOR
                && red > self.green as f32 + RED_MARGIN
                && red > self.blue as f32 + RED_MARGIN
                && self.saturation_hsv() > RED_SATURATION_MIN
        }
    }

    impl From<&Rgb<u8>> for Pixel {
        fn from(rgb: &Rgb<u8>) -> Self {
            let [red, green, blue] = rgb.0;
            Pixel::new(red, green, blue)
        }
    }

    impl From<Pixel> for Rgb<u8> {
        fn from(pixel: Pixel) -> Self {
            Rgb([pixel.red, pixel.green, pixel.blue])
        }
    }
}
