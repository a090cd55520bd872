// THEORY:
// The `RegionSegmenter` is the spatial grouping layer of lesion screening. It
// turns a rectangle of RGB pixels into a binary "anomalous-red" mask and groups
// the mask into connected components, then nominates the one component that
// looks most like a lesion.
//
// Algorithm steps:
// 1.  **Mask**: each pixel is tested with `Pixel::is_anomalous_red` (absolute red
//     floor, red dominance over green and blue, HSV saturation floor).
// 2.  **Labeling**: a row-major scan seeds a depth-first flood fill at every
//     unvisited mask pixel. Growth follows the 4 direct neighbors only (no
//     diagonals). Each component keeps a running pixel count and bounding box;
//     the visited grid is the only per-pixel state.
// 3.  **Nomination**: components whose area lies inside the configured window
//     (a fraction of the analysed area) are ranked by
//     `area × (0.5 + 0.5·oval) × (0.5 + 0.5·extent)`. The highest rank wins; on a
//     tie the earlier-discovered component is kept.
// 4.  **Stateless Utility**: nothing is remembered between calls.

use crate::config::ShapeConfig;
use crate::core_modules::component::{BoundingBox, ConnectedComponent, Point, ShapeDescriptor};
use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::roi::PixelRect;
use image::RgbImage;

/// Boolean mask over an analysed rectangle, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyMask {
    pub width: usize,
    pub height: usize,
    pub bits: Vec<bool>,
}

impl AnomalyMask {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.bits[row * self.width + col]
    }

    /// Fraction of set pixels; 0 for an empty mask.
    pub fn ratio(&self) -> f64 {
        if self.bits.is_empty() {
            return 0.0;
        }
        self.bits.iter().filter(|b| **b).count() as f64 / self.bits.len() as f64
    }
}

/// The nominated component and its shape test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestComponent {
    pub component: ConnectedComponent,
    pub shape: ShapeDescriptor,
    pub score: f64,
}

/// Output of one segmentation call.
#[derive(Debug, Clone)]
pub struct RegionAnalysis {
    pub mask: AnomalyMask,
    pub components: Vec<ConnectedComponent>,
    pub best: Option<BestComponent>,
}

impl RegionAnalysis {
    /// Fraction of anomalous-red pixels in the analysed rectangle.
    pub fn red_ratio(&self) -> f64 {
        self.mask.ratio()
    }

    /// Pixel count of the nominated component, 0 when none qualified.
    pub fn best_area(&self) -> usize {
        self.best.map_or(0, |b| b.component.area)
    }

    pub fn best_shape(&self) -> ShapeDescriptor {
        self.best.map(|b| b.shape).unwrap_or_default()
    }

    /// Analysed area in pixels.
    pub fn area(&self) -> usize {
        self.mask.width * self.mask.height
    }
}

pub mod region_segmenter {
    use super::*;

    /// Segments the whole image.
    pub fn segment(image: &RgbImage, shape: &ShapeConfig) -> RegionAnalysis {
        let (w, h) = image.dimensions();
        let rect = PixelRect {
            row0: 0,
            row1: h as usize,
            col0: 0,
            col1: w as usize,
        };
        segment_rect(image, &rect, shape)
    }

    /// Segments only the pixels inside `rect`. Component coordinates are local
    /// to `rect`.
    pub fn segment_rect(image: &RgbImage, rect: &PixelRect, shape: &ShapeConfig) -> RegionAnalysis {
        let mask = build_mask(image, rect);
        let components = label_components(&mask);

        let analysed_area = (mask.width * mask.height) as f64;
        let min_area = shape.min_area_ratio * analysed_area;
        let max_area = shape.max_area_ratio * analysed_area;

        let mut best: Option<BestComponent> = None;
        for component in &components {
            let area = component.area as f64;
            if area < min_area || area > max_area {
                continue;
            }
            let descriptor = ShapeDescriptor::describe(component, shape);
            let score = area * descriptor.rank_weight();
            if best.is_none_or(|current| score > current.score) {
                best = Some(BestComponent {
                    component: *component,
                    shape: descriptor,
                    score,
                });
            }
        }

        RegionAnalysis {
            mask,
            components,
            best,
        }
    }

    /// Builds the anomalous-red mask for `rect`, clipped to the image.
    pub fn build_mask(image: &RgbImage, rect: &PixelRect) -> AnomalyMask {
        let (w, h) = image.dimensions();
        let row1 = rect.row1.min(h as usize);
        let col1 = rect.col1.min(w as usize);
        let row0 = rect.row0.min(row1);
        let col0 = rect.col0.min(col1);
        let width = col1 - col0;
        let height = row1 - row0;

        let mut bits = Vec::with_capacity(width * height);
        for row in row0..row1 {
            for col in col0..col1 {
                let pixel = Pixel::from(image.get_pixel(col as u32, row as u32));
                bits.push(pixel.is_anomalous_red());
            }
        }
        AnomalyMask {
            width,
            height,
            bits,
        }
    }

    /// Labels 4-connected components with an explicit-stack flood fill.
    pub fn label_components(mask: &AnomalyMask) -> Vec<ConnectedComponent> {
        let (w, h) = (mask.width, mask.height);
        let mut visited = vec![false; w * h];
        let mut components = Vec::new();
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for row in 0..h {
            for col in 0..w {
                let idx = row * w + col;
                if !mask.bits[idx] || visited[idx] {
                    continue;
                }

                visited[idx] = true;
                stack.push((row, col));
                let (mut min_r, mut min_c, mut max_r, mut max_c) = (row, col, row, col);
                let mut area = 0usize;

                while let Some((r, c)) = stack.pop() {
                    area += 1;
                    min_r = min_r.min(r);
                    max_r = max_r.max(r);
                    min_c = min_c.min(c);
                    max_c = max_c.max(c);

                    // 4 direct neighbors, no diagonals.
                    let neighbors = [
                        (r + 1 < h).then(|| (r + 1, c)),
                        (r > 0).then(|| (r - 1, c)),
                        (c + 1 < w).then(|| (r, c + 1)),
                        (c > 0).then(|| (r, c - 1)),
                    ];
                    for (nr, nc) in neighbors.into_iter().flatten() {
                        let nidx = nr * w + nc;
                        if mask.bits[nidx] && !visited[nidx] {
                            visited[nidx] = true;
                            stack.push((nr, nc));
                        }
                    }
                }

                components.push(ConnectedComponent {
                    id: components.len() as u32,
                    area,
                    bounding_box: BoundingBox {
                        min: Point {
                            x: min_c as u32,
                            y: min_r as u32,
                        },
                        max: Point {
                            x: max_c as u32,
                            y: max_r as u32,
                        },
                    },
                });
            }
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::region_segmenter::*;
    use super::*;
    use image::Rgb;

    const RED: Rgb<u8> = Rgb([220, 30, 30]);
    const COAT: Rgb<u8> = Rgb([120, 100, 90]);

    fn paint(image: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, RED);
            }
        }
    }

    #[test]
    fn uniform_image_has_no_components() {
        let image = RgbImage::from_pixel(50, 40, COAT);
        let analysis = segment(&image, &ShapeConfig::default());
        assert!(analysis.components.is_empty());
        assert_eq!(analysis.best_area(), 0);
        assert_eq!(analysis.red_ratio(), 0.0);
        assert!(!analysis.best_shape().oval);
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mut image = RgbImage::from_pixel(4, 4, COAT);
        image.put_pixel(0, 0, RED);
        image.put_pixel(1, 1, RED);
        image.put_pixel(2, 2, RED);
        let mask = build_mask(&image, &PixelRect { row0: 0, row1: 4, col0: 0, col1: 4 });
        let components = label_components(&mask);
        assert_eq!(components.len(), 3);
        assert!(components.iter().all(|c| c.area == 1));
    }

    #[test]
    fn components_track_area_and_bounding_box() {
        let mut image = RgbImage::from_pixel(30, 20, COAT);
        paint(&mut image, 2, 3, 5, 4);
        paint(&mut image, 20, 10, 3, 3);
        let analysis = segment(&image, &ShapeConfig::default());
        assert_eq!(analysis.components.len(), 2);

        let first = analysis.components[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.area, 20);
        assert_eq!(first.bounding_box.min, Point { x: 2, y: 3 });
        assert_eq!(first.bounding_box.max, Point { x: 6, y: 6 });

        let second = analysis.components[1];
        assert_eq!(second.area, 9);
        assert_eq!(second.bounding_box.width(), 3);
    }

    #[test]
    fn larger_oval_component_is_nominated() {
        let mut image = RgbImage::from_pixel(100, 100, COAT);
        paint(&mut image, 5, 5, 4, 4); // 16 px
        paint(&mut image, 50, 50, 8, 8); // 64 px
        let analysis = segment(&image, &ShapeConfig::default());
        let best = analysis.best.expect("a component qualifies");
        assert_eq!(best.component.area, 64);
        assert!(best.shape.oval);
    }

    #[test]
    fn ties_keep_first_discovered() {
        let mut image = RgbImage::from_pixel(100, 100, COAT);
        paint(&mut image, 60, 10, 5, 5);
        paint(&mut image, 10, 60, 5, 5);
        let analysis = segment(&image, &ShapeConfig::default());
        let best = analysis.best.expect("a component qualifies");
        assert_eq!(best.component.id, 0);
        assert_eq!(best.component.bounding_box.min, Point { x: 60, y: 10 });
    }

    #[test]
    fn oversized_region_is_not_nominated() {
        // A red blanket covering a quarter of the frame exceeds the area window.
        let mut image = RgbImage::from_pixel(40, 40, COAT);
        paint(&mut image, 0, 0, 20, 20);
        let analysis = segment(&image, &ShapeConfig::default());
        assert_eq!(analysis.components.len(), 1);
        assert!(analysis.best.is_none());
        assert!((analysis.red_ratio() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rect_segmentation_uses_local_coordinates() {
        let mut image = RgbImage::from_pixel(40, 40, COAT);
        paint(&mut image, 30, 32, 2, 2);
        let rect = PixelRect { row0: 20, row1: 40, col0: 20, col1: 40 };
        let analysis = segment_rect(&image, &rect, &ShapeConfig::default());
        assert_eq!(analysis.area(), 400);
        assert_eq!(analysis.components[0].bounding_box.min, Point { x: 10, y: 12 });
    }
}
