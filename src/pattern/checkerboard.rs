use crate::geometry::Point3;
use serde::{Deserialize, Serialize};

/// Chessboard target described by its inner corner grid.
///
/// Model points are laid out row-major: `y` in the outer loop, `x` in the
/// inner loop, at `(x * L, y * L, 0)` for square length `L`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckerBoardConfig", into = "CheckerBoardConfig")]
pub struct CheckerBoardPattern {
    corners_x: usize,
    corners_y: usize,
    square_length: f64,
    model_points: Vec<Point3>,
}

/// Serializable shape parameters of a [`CheckerBoardPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckerBoardConfig {
    pub corners_x: usize,
    pub corners_y: usize,
    pub square_length: f64,
}

impl CheckerBoardPattern {
    /// `corners_x` inner corners per row, `corners_y` per column, squares of `square_length`.
    pub fn new(corners_x: usize, corners_y: usize, square_length: f64) -> Self {
        let mut pattern = CheckerBoardPattern {
            corners_x,
            corners_y,
            square_length,
            model_points: Vec::new(),
        };
        pattern.update_model_points();
        pattern
    }

    pub fn corners_x(&self) -> usize {
        self.corners_x
    }

    pub fn corners_y(&self) -> usize {
        self.corners_y
    }

    /// Number of inner corners, `corners_x * corners_y`.
    pub fn corner_count(&self) -> usize {
        self.corners_x * self.corners_y
    }

    pub fn square_length(&self) -> f64 {
        self.square_length
    }

    pub fn set_corner_count(&mut self, corners_x: usize, corners_y: usize) {
        self.corners_x = corners_x;
        self.corners_y = corners_y;
        self.update_model_points();
    }

    pub fn set_square_length(&mut self, square_length: f64) {
        self.square_length = square_length;
        self.update_model_points();
    }

    pub fn model_points(&self) -> &[Point3] {
        &self.model_points
    }

    fn update_model_points(&mut self) {
        let length = self.square_length;
        self.model_points = (0..self.corners_y)
            .flat_map(|y| {
                (0..self.corners_x)
                    .map(move |x| Point3::new(x as f64 * length, y as f64 * length, 0.0))
            })
            .collect();
    }
}

impl Default for CheckerBoardPattern {
    fn default() -> Self {
        CheckerBoardPattern::new(9, 6, 15.0)
    }
}

impl From<CheckerBoardConfig> for CheckerBoardPattern {
    fn from(config: CheckerBoardConfig) -> Self {
        CheckerBoardPattern::new(config.corners_x, config.corners_y, config.square_length)
    }
}

impl From<CheckerBoardPattern> for CheckerBoardConfig {
    fn from(pattern: CheckerBoardPattern) -> Self {
        CheckerBoardConfig {
            corners_x: pattern.corners_x,
            corners_y: pattern.corners_y,
            square_length: pattern.square_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_model_points_row_major() {
        let pattern = CheckerBoardPattern::new(3, 2, 10.0);
        let expected = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(20.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(20.0, 10.0, 0.0),
        ];
        assert_eq!(pattern.model_points(), expected.as_slice());
    }

    #[test]
    fn test_checkerboard_default() {
        let pattern = CheckerBoardPattern::default();
        assert_eq!(pattern.corners_x(), 9);
        assert_eq!(pattern.corners_y(), 6);
        assert_eq!(pattern.square_length(), 15.0);
        assert_eq!(pattern.corner_count(), 54);
        assert_eq!(pattern.model_points()[53], Point3::new(120.0, 75.0, 0.0));
    }

    #[test]
    fn test_checkerboard_setters_regenerate() {
        let mut pattern = CheckerBoardPattern::new(3, 2, 10.0);
        pattern.set_square_length(5.0);
        assert_eq!(pattern.model_points()[5], Point3::new(10.0, 5.0, 0.0));

        pattern.set_corner_count(4, 4);
        assert_eq!(pattern.model_points().len(), 16);
        assert_eq!(pattern.model_points()[15], Point3::new(15.0, 15.0, 0.0));
    }

    #[test]
    fn test_checkerboard_serde() {
        let pattern: CheckerBoardPattern =
            serde_yaml::from_str("corners_x: 4\ncorners_y: 3\nsquare_length: 25.0\n").unwrap();
        assert_eq!(pattern.model_points().len(), 12);
        assert_eq!(pattern.model_points()[11], Point3::new(75.0, 50.0, 0.0));
    }
}
