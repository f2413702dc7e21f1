use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Integer pixel position (detector boxes are truncated to whole pixels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn to_point(self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Axis-aligned box with corners `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Truncate detector output towards zero.
    pub fn from_f32(coords: [f32; 4]) -> Self {
        Self::new(
            coords[0] as i32,
            coords[1] as i32,
            coords[2] as i32,
            coords[3] as i32,
        )
    }

    /// Floor-divided midpoint of the corners.
    pub fn center(&self) -> PixelPoint {
        PixelPoint {
            x: midpoint(self.x1, self.x2),
            y: midpoint(self.y1, self.y2),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }
}

// The floored mean of two i32 values always fits back into i32.
fn midpoint(a: i32, b: i32) -> i32 {
    (i64::from(a) + i64::from(b)).div_euclid(2) as i32
}

/// Detector output for one object, before class labelling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub class_id: u32,
    #[serde(default)]
    pub confidence: f32,
    /// Stable id when the upstream detector tracks objects itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

/// One labelled detection in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Identity used to correlate across frames. This is the upstream track
    /// id when every row of the frame carries a distinct one, otherwise the
    /// frame-local row index.
    pub id: u64,
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub label: Option<String>,
    pub confidence: f32,
}

impl Detection {
    pub fn new(id: u64, bbox: BoundingBox, label: &str) -> Self {
        Self {
            id,
            bbox,
            class_id: 0,
            label: Some(label.to_string()),
            confidence: 1.0,
        }
    }

    pub fn center(&self) -> PixelPoint {
        self.bbox.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_floors_like_integer_division() {
        assert_eq!(BoundingBox::new(10, 20, 31, 41).center(), PixelPoint { x: 20, y: 30 });
        assert_eq!(BoundingBox::new(-3, -3, 0, 0).center(), PixelPoint { x: -2, y: -2 });
    }

    #[test]
    fn saturated_coordinates_do_not_overflow() {
        let bbox = BoundingBox::from_f32([3.0e9, 0.0, 3.0e9, 10.0]);
        assert_eq!(bbox.x1, i32::MAX);
        assert_eq!(bbox.center(), PixelPoint { x: i32::MAX, y: 5 });
        assert_eq!(bbox.width(), 0);

        let wide = BoundingBox::from_f32([-3.0e9, -3.0e9, 3.0e9, 3.0e9]);
        assert_eq!(wide.center(), PixelPoint { x: -1, y: -1 });
        assert_eq!(wide.width(), i32::MAX);
    }

    #[test]
    fn detector_floats_truncate() {
        let bbox = BoundingBox::from_f32([10.9, 20.2, 30.99, 40.5]);
        assert_eq!(bbox, BoundingBox::new(10, 20, 30, 40));
        assert_eq!(bbox.width(), 20);
        assert_eq!(bbox.height(), 20);
    }

    #[test]
    fn raw_detection_parses_replay_json() {
        let raw: RawDetection =
            serde_json::from_str(r#"{"box":[1.0,2.0,3.0,4.0],"class_id":2}"#).unwrap();
        assert_eq!(raw.class_id, 2);
        assert_eq!(raw.confidence, 0.0);
        assert_eq!(raw.track_id, None);
    }
}
