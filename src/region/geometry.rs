//! Region geometry: control points, rotation and containment.
//!
//! Control-point conventions follow the wire protocol: a rectangle is
//! `[center, (width, height)]`, an ellipse `[center, (semi_x, semi_y)]`,
//! a polygon its vertex list and a point a single coordinate. Rotation is
//! degrees counter-clockwise about the shape center; polygons ignore it.

use crate::image::{ImageShape, PixelBounds};
use crate::proto::RegionType;

#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub kind: RegionType,
    pub control_points: Vec<(f64, f64)>,
    pub rotation_deg: f32,
}

impl RegionGeometry {
    pub fn new(kind: RegionType) -> Self {
        Self {
            kind,
            control_points: Vec::new(),
            rotation_deg: 0.0,
        }
    }

    pub fn whole_image() -> Self {
        Self::new(RegionType::WholeImage)
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self {
            kind: RegionType::Point,
            control_points: vec![(x, y)],
            rotation_deg: 0.0,
        }
    }

    /// First control point, used as the cursor position for point regions.
    pub fn origin(&self) -> Option<(f64, f64)> {
        self.control_points.first().copied()
    }

    /// Smallest pixel window covering the region, clipped to the image.
    ///
    /// Returns `None` when the region lies entirely outside the image or
    /// its control points are incomplete.
    pub fn bounding_box(&self, shape: &ImageShape) -> Option<PixelBounds> {
        let (min_x, min_y, max_x, max_y) = match self.kind {
            RegionType::WholeImage => return Some(shape.full_bounds()),
            RegionType::Point => {
                let (x, y) = self.origin()?;
                (x, y, x, y)
            }
            RegionType::Rectangle => {
                let (&(cx, cy), &(w, h)) = two_points(&self.control_points)?;
                // a rotated rectangle fits inside the circle through its corners
                let r = ((w / 2.0).powi(2) + (h / 2.0).powi(2)).sqrt();
                if self.rotation_deg == 0.0 {
                    (cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
                } else {
                    (cx - r, cy - r, cx + r, cy + r)
                }
            }
            RegionType::Ellipse => {
                let (&(cx, cy), &(a, b)) = two_points(&self.control_points)?;
                let r = a.max(b);
                (cx - r, cy - r, cx + r, cy + r)
            }
            RegionType::Polygon => {
                let first = self.control_points.first()?;
                self.control_points.iter().fold(
                    (first.0, first.1, first.0, first.1),
                    |(lx, ly, hx, hy), &(x, y)| (lx.min(x), ly.min(y), hx.max(x), hy.max(y)),
                )
            }
        };

        let x_min = (min_x.floor().max(0.0)) as usize;
        let y_min = (min_y.floor().max(0.0)) as usize;
        let x_max = ((max_x.floor() + 1.0).min(shape.width as f64)) as usize;
        let y_max = ((max_y.floor() + 1.0).min(shape.height as f64)) as usize;
        if min_x >= shape.width as f64 || min_y >= shape.height as f64 || max_x < 0.0 || max_y < 0.0
        {
            return None;
        }
        let bounds = PixelBounds {
            x_min,
            y_min,
            x_max,
            y_max,
        };
        (!bounds.is_empty()).then_some(bounds)
    }

    /// Whether pixel `(x, y)` belongs to the region.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self.kind {
            RegionType::WholeImage => true,
            RegionType::Point => self
                .origin()
                .map(|(px, py)| px.floor() == x.floor() && py.floor() == y.floor())
                .unwrap_or(false),
            RegionType::Rectangle => {
                let Some((&(cx, cy), &(w, h))) = two_points(&self.control_points) else {
                    return false;
                };
                let (dx, dy) = rotate_into(x - cx, y - cy, self.rotation_deg);
                dx.abs() <= w / 2.0 && dy.abs() <= h / 2.0
            }
            RegionType::Ellipse => {
                let Some((&(cx, cy), &(a, b))) = two_points(&self.control_points) else {
                    return false;
                };
                if a <= 0.0 || b <= 0.0 {
                    return false;
                }
                let (dx, dy) = rotate_into(x - cx, y - cy, self.rotation_deg);
                (dx / a).powi(2) + (dy / b).powi(2) <= 1.0
            }
            RegionType::Polygon => polygon_contains(&self.control_points, x, y),
        }
    }
}

fn two_points(points: &[(f64, f64)]) -> Option<(&(f64, f64), &(f64, f64))> {
    match points {
        [center, size, ..] => Some((center, size)),
        _ => None,
    }
}

/// Rotate an offset into the shape's own axes (inverse of the region's
/// counter-clockwise rotation).
fn rotate_into(dx: f64, dy: f64, rotation_deg: f32) -> (f64, f64) {
    if rotation_deg == 0.0 {
        return (dx, dy);
    }
    let theta = -(rotation_deg as f64).to_radians();
    (
        dx * theta.cos() - dy * theta.sin(),
        dx * theta.sin() + dy * theta.cos(),
    )
}

/// Even-odd ray casting over the vertex list.
fn polygon_contains(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

// =============================================================================
// Tests
// =============================================================================
