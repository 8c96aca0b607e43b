use serde::{Deserialize, Serialize};

/// Ratio between the original image and the image handed to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    pub const IDENTITY: ScaleFactors = ScaleFactors { x: 1.0, y: 1.0 };

    /// Scale factors mapping `detection` dimensions back onto `original` dimensions
    pub fn between(original: (u32, u32), detection: (u32, u32)) -> Self {
        Self {
            x: original.0 as f64 / detection.0.max(1) as f64,
            y: original.1 as f64 / detection.1.max(1) as f64,
        }
    }
}

/// Axis-aligned face box in pixels. Origins may be negative: detectors
/// happily report faces that start outside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Map this box into another coordinate space.
    ///
    /// x and width follow `scale.x`, y and height follow `scale.y`; the two
    /// axes are never assumed equal. Nothing is clamped here, the cropper
    /// owns bounds handling.
    pub fn rescale(&self, scale: ScaleFactors) -> FaceBox {
        FaceBox {
            x: scale_coord(self.x, scale.x),
            y: scale_coord(self.y, scale.y),
            width: scale_coord(self.width, scale.x),
            height: scale_coord(self.height, scale.y),
        }
    }
}

fn scale_coord(value: i32, factor: f64) -> i32 {
    (value as f64 * factor).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn rescale(&self, scale: ScaleFactors) -> Point {
        Point {
            x: (self.x as f64 * scale.x) as f32,
            y: (self.y as f64 * scale.y) as f32,
        }
    }
}

/// Named facial landmarks. "left" and "right" are image-relative: the left
/// eye is the one with the smaller x coordinate on a frontal face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoints {
    pub left_eye: Point,
    pub right_eye: Point,
    pub nose: Point,
    #[serde(default)]
    pub mouth_left: Option<Point>,
    #[serde(default)]
    pub mouth_right: Option<Point>,
}

impl Keypoints {
    pub fn new(left_eye: Point, right_eye: Point, nose: Point) -> Self {
        Self {
            left_eye,
            right_eye,
            nose,
            mouth_left: None,
            mouth_right: None,
        }
    }

    pub fn rescale(&self, scale: ScaleFactors) -> Keypoints {
        Keypoints {
            left_eye: self.left_eye.rescale(scale),
            right_eye: self.right_eye.rescale(scale),
            nose: self.nose.rescale(scale),
            mouth_left: self.mouth_left.map(|p| p.rescale(scale)),
            mouth_right: self.mouth_right.map(|p| p.rescale(scale)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        [self.left_eye, self.right_eye, self.nose]
            .into_iter()
            .chain(self.mouth_left)
            .chain(self.mouth_right)
    }
}
