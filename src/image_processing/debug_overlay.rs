//! Detection visualization for `--debug` runs.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::detector::FaceCandidate;
use super::geometry::FaceBox;

const REJECTED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ACCEPTED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Draw every candidate on a copy of the detection image. The candidate at
/// `accepted` (if any) gets a green box, all others red.
pub fn draw_candidates(
    detection_image: &RgbImage,
    candidates: &[FaceCandidate],
    accepted: Option<usize>,
) -> RgbImage {
    let mut canvas = detection_image.clone();
    let (img_w, img_h) = canvas.dimensions();
    if img_w == 0 || img_h == 0 {
        return canvas;
    }

    for (idx, candidate) in candidates.iter().enumerate() {
        let color = if Some(idx) == accepted {
            ACCEPTED_COLOR
        } else {
            REJECTED_COLOR
        };

        if let Some(rect) = rect_from_box(&candidate.bounding_box, img_w, img_h) {
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }

        for point in candidate.keypoints.iter() {
            let cx = clamp_to_i32(point.x, img_w);
            let cy = clamp_to_i32(point.y, img_h);
            draw_filled_circle_mut(&mut canvas, (cx, cy), 2, KEYPOINT_COLOR);
        }
    }

    canvas
}

/// Convert a face box into an `imageproc` rect clipped to the image
fn rect_from_box(face: &FaceBox, img_w: u32, img_h: u32) -> Option<Rect> {
    // extents come straight from the detector, sum them in i64
    let max_x = img_w as i64 - 1;
    let max_y = img_h as i64 - 1;
    let x1 = (face.x as i64).clamp(0, max_x);
    let y1 = (face.y as i64).clamp(0, max_y);
    let x2 = (face.x as i64 + face.width as i64).clamp(0, max_x);
    let y2 = (face.y as i64 + face.height as i64).clamp(0, max_y);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Rect::at(x1 as i32, y1 as i32).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

#[inline]
fn clamp_to_i32(value: f32, max_extent: u32) -> i32 {
    let max = (max_extent - 1) as f32;
    value.clamp(0.0, max).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::geometry::{Keypoints, Point};

    fn candidate(x: i32, y: i32, size: i32) -> FaceCandidate {
        FaceCandidate {
            bounding_box: FaceBox::new(x, y, size, size),
            keypoints: Keypoints::new(
                Point::new((x + size / 3) as f32, (y + size / 3) as f32),
                Point::new((x + 2 * size / 3) as f32, (y + size / 3) as f32),
                Point::new((x + size / 2) as f32, (y + size / 2) as f32),
            ),
            confidence: Some(0.99),
        }
    }

    #[test]
    fn test_draw_marks_accepted_and_rejected() {
        let img = RgbImage::new(100, 100);
        let candidates = vec![candidate(5, 5, 30), candidate(50, 50, 30)];

        let canvas = draw_candidates(&img, &candidates, Some(1));
        assert_eq!(canvas.dimensions(), (100, 100));
        assert_eq!(*canvas.get_pixel(5, 5), REJECTED_COLOR);
        assert_eq!(*canvas.get_pixel(50, 50), ACCEPTED_COLOR);
        // source image untouched
        assert_eq!(*img.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_ignores_boxes_outside_frame() {
        let img = RgbImage::new(20, 20);
        let canvas = draw_candidates(&img, &[candidate(40, 40, 10)], None);
        assert_eq!(canvas.dimensions(), (20, 20));
    }

    #[test]
    fn test_draw_survives_huge_boxes() {
        let img = RgbImage::new(50, 40);
        let mut huge = candidate(0, 0, 10);
        huge.bounding_box = FaceBox::new(i32::MAX, 0, i32::MAX, 10);
        let mut wide = candidate(0, 0, 10);
        wide.bounding_box = FaceBox::new(10, 5, i32::MAX, i32::MAX);

        let canvas = draw_candidates(&img, &[huge, wide], Some(1));
        assert_eq!(canvas.dimensions(), (50, 40));
        // clipped to the frame, top-left corner still drawn
        assert_eq!(*canvas.get_pixel(10, 5), ACCEPTED_COLOR);
    }
}
