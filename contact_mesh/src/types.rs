//! Core value types shared by the hierarchy and its consumers.

use serde::{Deserialize, Serialize};

/// A 3D point with named fields for clarity.
///
/// Serialized as a plain `[x, y, z]` array so hierarchy files stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Point3 {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Point3 {
    /// Create a new Point3.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Convert to an array.
    #[inline]
    pub const fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Point3 {
    #[inline]
    fn from(arr: [f32; 3]) -> Self {
        Self {
            x: arr[0],
            y: arr[1],
            z: arr[2],
        }
    }
}

impl From<Point3> for [f32; 3] {
    #[inline]
    fn from(p: Point3) -> Self {
        p.as_array()
    }
}

/// Pack points into a row-major `n x 3` feature block.
pub fn points_to_rows(points: &[Point3]) -> Vec<f32> {
    points.iter().flat_map(|p| p.as_array()).collect()
}

/// Unpack a row-major `n x 3` feature block into points.
///
/// Trailing values that do not fill a whole row are ignored.
pub fn rows_to_points(rows: &[f32]) -> Vec<Point3> {
    rows.chunks_exact(3)
        .map(|row| Point3::new(row[0], row[1], row[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_array_conversion() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(p.as_array(), [1.0, 2.0, 3.0]);
        assert_eq!(Point3::from([1.0, 2.0, 3.0]), p);
        assert_eq!(<[f32; 3]>::from(p), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_point_serde_as_array() {
        let p = Point3::new(0.5, -1.0, 2.0);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[0.5,-1.0,2.0]");

        let back: Point3 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_rows_packing() {
        let points = vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)];
        let rows = points_to_rows(&points);
        assert_eq!(rows, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(rows_to_points(&rows), points);
    }
}
