//! Separating axis collision tests for convex polygons
//!
//! Every shape in the arena is a rectangle, so every polygon handed to
//! [`overlaps`] is convex. Non-convex input gives meaningless answers.

/// A 2D point (or vector) in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    fn dot(self, other: Point) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Corners of an axis-aligned rectangle centered on (`x`, `y`), in winding order
///
/// `margin` grows the rectangle by that many units on every side.
pub fn rectangle(x: f32, y: f32, width: f32, height: f32, margin: f32) -> [Point; 4] {
    let half_width = width / 2.0 + margin;
    let half_height = height / 2.0 + margin;
    [
        Point::new(x - half_width, y - half_height),
        Point::new(x - half_width, y + half_height),
        Point::new(x + half_width, y + half_height),
        Point::new(x + half_width, y - half_height),
    ]
}

/// Largest corner-to-corner distance two rectangles can have while touching
///
/// This is the sum of their diagonals, usable as the `max_dist` bound of
/// [`overlaps`] for any pair of shapes with these sizes.
pub fn max_dist(width_a: f32, height_a: f32, width_b: f32, height_b: f32) -> f32 {
    width_a.hypot(height_a) + width_b.hypot(height_b)
}

/// Check whether two convex polygons overlap (touching counts as overlap)
///
/// When `max_dist` is given and the first vertices of the two polygons are
/// farther apart than it, the polygons cannot be touching and the full test is
/// skipped.
pub fn overlaps(poly_a: &[Point], poly_b: &[Point], max_dist: Option<f32>) -> bool {
    if poly_a.is_empty() || poly_b.is_empty() {
        return false;
    }

    if let Some(bound) = max_dist {
        if poly_a[0].distance_sq(poly_b[0]) > bound * bound {
            return false;
        }
    }

    separating_axes(poly_a)
        .chain(separating_axes(poly_b))
        .all(|axis| projections_overlap(project(poly_a, axis), project(poly_b, axis)))
}

/// Edge normals of a polygon, one per edge (wrapping back to the first vertex)
fn separating_axes(poly: &[Point]) -> impl Iterator<Item = Point> + '_ {
    (0..poly.len()).map(move |i| {
        let start = poly[i];
        let end = poly[(i + 1) % poly.len()];
        // Rotate the edge by 90 degrees
        Point::new(end.y - start.y, start.x - end.x)
    })
}

/// Min and max of the polygon's vertices projected onto `axis`
fn project(poly: &[Point], axis: Point) -> (f32, f32) {
    poly.iter()
        .map(|point| point.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), dot| {
            (min.min(dot), max.max(dot))
        })
}

#[inline]
fn projections_overlap((min_a, max_a): (f32, f32), (min_b, max_b): (f32, f32)) -> bool {
    min_a <= max_b && min_b <= max_a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated_rectangle(x: f32, y: f32, width: f32, height: f32, angle: f32) -> Vec<Point> {
        let (sin, cos) = angle.sin_cos();
        rectangle(0.0, 0.0, width, height, 0.0)
            .iter()
            .map(|p| Point::new(x + p.x * cos - p.y * sin, y + p.x * sin + p.y * cos))
            .collect()
    }

    #[test]
    fn test_identical_rectangles_collide() {
        let a = rectangle(50.0, 50.0, 10.0, 20.0, 0.0);
        assert!(overlaps(&a, &a, None));
        assert!(overlaps(&a, &a, Some(max_dist(10.0, 20.0, 10.0, 20.0))));
    }

    #[test]
    fn test_far_rectangles_never_collide() {
        let a = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rectangle(30.0, 0.0, 10.0, 10.0, 0.0);
        assert!(!overlaps(&a, &b, None));
        assert!(!overlaps(&b, &a, None));
    }

    #[test]
    fn test_touching_edges_count_as_overlap() {
        let a = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rectangle(10.0, 0.0, 10.0, 10.0, 0.0);
        assert!(overlaps(&a, &b, None));
    }

    #[test]
    fn test_margin_expands_rectangle() {
        let a = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rectangle(20.0, 0.0, 10.0, 10.0, 0.0);
        assert!(!overlaps(&a, &b, None));
        // The gap is 10 units; a 10 unit margin closes it exactly
        assert!(!overlaps(&a, &rectangle(20.0, 0.0, 10.0, 10.0, 4.0), None));
        assert!(overlaps(&a, &rectangle(20.0, 0.0, 10.0, 10.0, 10.0), None));
    }

    #[test]
    fn test_rotated_rectangles_use_all_axes() {
        // Bounding boxes overlap but the diamond's slanted edge separates them
        let square = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        let diamond = rotated_rectangle(11.5, 11.5, 10.0, 10.0, std::f32::consts::FRAC_PI_4);
        assert!(!overlaps(&square, &diamond, None));

        let closer = rotated_rectangle(9.0, 0.0, 10.0, 10.0, std::f32::consts::FRAC_PI_4);
        assert!(overlaps(&square, &closer, None));
    }

    #[test]
    fn test_symmetry_over_grid() {
        let probe = rotated_rectangle(0.0, 0.0, 12.0, 4.0, 0.6);
        for i in -12..=12 {
            for j in -12..=12 {
                let other = rotated_rectangle(i as f32 * 1.5, j as f32 * 1.5, 6.0, 9.0, 1.1);
                assert_eq!(
                    overlaps(&probe, &other, None),
                    overlaps(&other, &probe, None),
                    "asymmetric at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_distance_filter_never_changes_result() {
        let bound = max_dist(10.0, 10.0, 1.0, 1.0);
        let tank = rectangle(200.0, 100.0, 10.0, 10.0, 0.0);
        for step in 0..400 {
            let x = 100.0 + step as f32 * 0.5;
            for dy in [-6.0, -5.5, -3.0, 0.0, 4.0, 5.5, 6.0] {
                let shell = rectangle(x, 100.0 + dy, 1.0, 1.0, 0.0);
                assert_eq!(
                    overlaps(&tank, &shell, Some(bound)),
                    overlaps(&tank, &shell, None),
                    "filter disagrees at x={} dy={}",
                    x,
                    dy
                );
            }
        }
    }

    #[test]
    fn test_distance_filter_rejects_far_pairs() {
        let a = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rectangle(100.0, 100.0, 10.0, 10.0, 0.0);
        assert!(!overlaps(&a, &b, Some(max_dist(10.0, 10.0, 10.0, 10.0))));
    }

    #[test]
    fn test_shell_enters_tank_at_its_edge() {
        let tank = rectangle(200.0, 100.0, 10.0, 10.0, 0.0);
        let bound = max_dist(10.0, 10.0, 1.0, 1.0);

        let mut x = 100.0;
        while !overlaps(&tank, &rectangle(x, 100.0, 1.0, 1.0, 0.0), Some(bound)) {
            x += 1.0;
            assert!(x <= 200.0, "shell passed through the tank");
        }
        // Shell's right edge (x + 0.5) first reaches the tank's left edge (195)
        assert_eq!(x, 195.0);
    }

    #[test]
    fn test_empty_polygon_never_collides() {
        let a = rectangle(0.0, 0.0, 10.0, 10.0, 0.0);
        assert!(!overlaps(&a, &[], None));
    }
}
