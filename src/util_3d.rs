use cgmath::{prelude::*, Rad};
use std::f32::consts::PI;

pub type Vector2 = cgmath::Vector2<f32>;
pub type Vector3 = cgmath::Vector3<f32>;
pub type Point2 = cgmath::Point2<f32>;
pub type Matrix2 = cgmath::Matrix2<f32>;
pub type Matrix3 = cgmath::Matrix3<f32>;

/// Distances below this, in paper millimetres, are considered touching, not overlapping.
pub const EPSILON_2D: f32 = 1e-3;

/// An orthonormal 2D frame laid on the plane of a face.
///
/// The origin is the first vertex of the face and the X axis follows its first edge.
/// The Y axis is chosen so that a face seen from outside the model keeps its
/// orientation on a y-down page, so `project` never mirrors anything.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    origin: Vector3,
    base_x: Vector3,
    base_y: Vector3,
    normal: Vector3,
}

impl Plane {
    /// Returns `None` if the polygon is degenerate (no area or zero-length first edge).
    pub fn from_polygon(ps: &[Vector3]) -> Option<Plane> {
        if ps.len() < 3 {
            return None;
        }
        let normal = newell_normal(ps);
        let len = normal.magnitude();
        if len <= f32::EPSILON {
            return None;
        }
        let normal = normal / len;
        let first = ps[1] - ps[0];
        if first.magnitude2() <= f32::EPSILON {
            return None;
        }
        let base_x = first.normalize();
        let base_y = base_x.cross(normal);
        Some(Plane {
            origin: ps[0],
            base_x,
            base_y,
            normal,
        })
    }
    pub fn normal(&self) -> Vector3 {
        self.normal
    }
    pub fn project(&self, p: &Vector3, scale: f32) -> Vector2 {
        let d = p - self.origin;
        Vector2::new(d.dot(self.base_x), d.dot(self.base_y)) * scale
    }
    pub fn distance(&self, p: &Vector3) -> f32 {
        (p - self.origin).dot(self.normal)
    }
}

// Newell's method: the length of the result is twice the polygon area
pub fn newell_normal(ps: &[Vector3]) -> Vector3 {
    let mut normal = Vector3::zero();
    for (i, a) in ps.iter().enumerate() {
        let b = ps[(i + 1) % ps.len()];
        normal += a.cross(b);
    }
    normal
}

pub fn polygon_area_3d(ps: &[Vector3]) -> f32 {
    newell_normal(ps).magnitude() / 2.0
}

// Each returned triangle has indices into the original slice
pub fn tessellate(ps: &[Vector2]) -> Vec<[usize; 3]> {
    if ps.len() < 3 {
        return Vec::new();
    }
    if ps.len() == 3 {
        return vec![[0, 1, 2]];
    }

    let winding = signed_area(ps).signum();
    let mut res = Vec::with_capacity(ps.len() - 2);
    let mut ps: Vec<(usize, Vector2)> = ps.iter().copied().enumerate().collect();

    // Tessellate the 2D polygon using the "ear" method
    while ps.len() >= 3 {
        let mut min_angle = None;

        for i in 0 .. ps.len() {
            let (_, a) = ps[i];
            let (_, b) = ps[(i + 1) % ps.len()];
            let (_, c) = ps[(i + 2) % ps.len()];
            // Reflex vertices are never ears
            if winding * (b - a).perp_dot(c - b) < 0.0 {
                continue;
            }
            // Find the vertex with the minimum inner angle
            let inner_angle = Rad(PI - (c - b).angle(b - a).0.abs());

            if min_angle.map(|(_, a)| inner_angle < a).unwrap_or(true) {
                // If this point is not an ear, discard it
                if !ps.iter().enumerate().any(|(i_other, (_, p_other))| {
                    i_other != i &&
                    i_other != (i + 1) % ps.len() &&
                    i_other != (i + 2) % ps.len() &&
                    point_in_triangle(*p_other, a, b, c)
                }) {
                    min_angle = Some((i, inner_angle));
                }
            }
        }
        // min_angle should never be None, but just in case
        let i = min_angle.map(|(i, _)| i).unwrap_or(0);

        let tri = (i, (i + 1) % ps.len(), (i + 2) % ps.len());
        res.push([ps[tri.0].0, ps[tri.1].0, ps[tri.2].0]);
        ps.remove(tri.1);
    }

    res
}

fn point_in_triangle(p: Vector2, p0: Vector2, p1: Vector2, p2: Vector2) -> bool {
    let s = (p0.x - p2.x) * (p.y - p2.y) - (p0.y - p2.y) * (p.x - p2.x);
    let t = (p1.x - p0.x) * (p.y - p0.y) - (p1.y - p0.y) * (p.x - p0.x);

    if (s < 0.0) != (t < 0.0) && s != 0.0 && t != 0.0 {
        false
    } else {
        let d = (p2.x - p1.x) * (p.y - p1.y) - (p2.y - p1.y) * (p.x - p1.x);
        d == 0.0 || (d < 0.0) == (s + t <= 0.0)
    }
}

/// Shoelace formula. Positive for counter-clockwise polygons in a y-up frame.
pub fn signed_area(ps: &[Vector2]) -> f32 {
    let mut area = 0.0;
    for (i, a) in ps.iter().enumerate() {
        let b = ps[(i + 1) % ps.len()];
        area += a.perp_dot(b);
    }
    area / 2.0
}

pub fn bounding_box_2d(vs: impl IntoIterator<Item=Vector2>) -> (Vector2, Vector2) {
    let mut vs = vs.into_iter();
    let (mut a, mut b) = match vs.next() {
        Some(v) => (v, v),
        None => return (Vector2::zero(), Vector2::zero()),
    };
    for v in vs {
        a.x = a.x.min(v.x);
        a.y = a.y.min(v.y);
        b.x = b.x.max(v.x);
        b.y = b.y.max(v.y);
    }
    (a, b)
}

pub fn bounding_box_3d(vs: impl IntoIterator<Item=Vector3>) -> (Vector3, Vector3) {
    let mut vs = vs.into_iter();
    let (mut a, mut b) = match vs.next() {
        Some(v) => (v, v),
        None => return (Vector3::zero(), Vector3::zero()),
    };
    for v in vs {
        a.x = a.x.min(v.x);
        a.y = a.y.min(v.y);
        a.z = a.z.min(v.z);
        b.x = b.x.max(v.x);
        b.y = b.y.max(v.y);
        b.z = b.z.max(v.z);
    }
    (a, b)
}

pub fn boxes_overlap(a: (Vector2, Vector2), b: (Vector2, Vector2), eps: f32) -> bool {
    a.0.x < b.1.x - eps && b.0.x < a.1.x - eps &&
    a.0.y < b.1.y - eps && b.0.y < a.1.y - eps
}

/// Separating axis test for two convex polygons, any winding.
///
/// Polygons that only touch, or overlap by less than `eps` along some axis, do not overlap.
pub fn convex_overlap(a: &[Vector2], b: &[Vector2], eps: f32) -> bool {
    !separating_axis(a, b, eps) && !separating_axis(b, a, eps)
}

fn separating_axis(edges_of: &[Vector2], other: &[Vector2], eps: f32) -> bool {
    for (i, p0) in edges_of.iter().enumerate() {
        let p1 = edges_of[(i + 1) % edges_of.len()];
        let e = p1 - p0;
        let len = e.magnitude();
        if len <= f32::EPSILON {
            continue;
        }
        let axis = Vector2::new(-e.y, e.x) / len;
        let (min_a, max_a) = project_on_axis(edges_of, axis);
        let (min_b, max_b) = project_on_axis(other, axis);
        if max_a.min(max_b) - min_a.max(min_b) <= eps {
            return true;
        }
    }
    false
}

fn project_on_axis(ps: &[Vector2], axis: Vector2) -> (f32, f32) {
    ps.iter()
        .map(|p| p.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
}

/// Rotation around the origin, as a homogeneous 2D matrix.
pub fn rotation_matrix(angle: Rad<f32>) -> Matrix3 {
    Matrix3::from(Matrix2::from_angle(angle))
}

pub fn transform_point(mx: &Matrix3, p: Vector2) -> Vector2 {
    mx.transform_point(Point2::from_vec(p)).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, side: f32) -> Vec<Vector2> {
        vec![
            Vector2::new(x, y),
            Vector2::new(x + side, y),
            Vector2::new(x + side, y + side),
            Vector2::new(x, y + side),
        ]
    }

    #[test]
    fn plane_projection_keeps_lengths() {
        let ps = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(3.0, 0.0, 5.0),
            Vector3::new(0.0, 2.0, 1.0),
        ];
        let plane = Plane::from_polygon(&ps).unwrap();
        let p: Vec<_> = ps.iter().map(|v| plane.project(v, 2.0)).collect();
        assert!(p[0].magnitude() < 1e-6);
        assert!(p[1].y.abs() < 1e-5, "first edge is not on the X axis");
        for i in 0 .. 3 {
            let j = (i + 1) % 3;
            let d3 = (ps[j] - ps[i]).magnitude() * 2.0;
            let d2 = (p[j] - p[i]).magnitude();
            assert!((d3 - d2).abs() < 1e-4);
        }
        for v in &ps {
            assert!(plane.distance(v).abs() < 1e-5);
        }
    }

    #[test]
    fn projected_faces_are_clockwise_in_math_frame() {
        // Counter-clockwise seen from +Z, so the normal points to +Z
        let ps = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let plane = Plane::from_polygon(&ps).unwrap();
        assert!(plane.normal().z > 0.99);
        let p: Vec<_> = ps.iter().map(|v| plane.project(v, 1.0)).collect();
        assert!(signed_area(&p) < 0.0);
    }

    #[test]
    fn degenerate_plane() {
        let ps = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
        ];
        assert!(Plane::from_polygon(&ps).is_none());
    }

    #[test]
    fn tessellate_concave() {
        // An L shape
        let ps = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(2.0, 0.0),
            Vector2::new(2.0, 1.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(1.0, 2.0),
            Vector2::new(0.0, 2.0),
        ];
        for poly in [ps.clone(), ps.into_iter().rev().collect()] {
            let tris = tessellate(&poly);
            assert_eq!(tris.len(), 4);
            let area: f32 = tris
                .iter()
                .map(|t| signed_area(&[poly[t[0]], poly[t[1]], poly[t[2]]]).abs())
                .sum();
            assert!((area - 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn convex_overlap_cases() {
        let a = square(0.0, 0.0, 1.0);
        // Sharing an edge
        assert!(!convex_overlap(&a, &square(1.0, 0.0, 1.0), EPSILON_2D));
        // Sharing a corner
        assert!(!convex_overlap(&a, &square(1.0, 1.0, 1.0), EPSILON_2D));
        // Half overlapped, with collinear edges
        assert!(convex_overlap(&a, &square(0.5, 0.0, 1.0), EPSILON_2D));
        // Identical
        assert!(convex_overlap(&a, &a, EPSILON_2D));
        // Contained
        assert!(convex_overlap(&a, &square(0.25, 0.25, 0.5), EPSILON_2D));
        // Apart
        assert!(!convex_overlap(&a, &square(3.0, 0.0, 1.0), EPSILON_2D));
        // Winding does not matter
        let rev: Vec<_> = square(0.5, 0.5, 1.0).into_iter().rev().collect();
        assert!(convex_overlap(&a, &rev, EPSILON_2D));
    }

    #[test]
    fn bounding_boxes() {
        let bb = bounding_box_2d(square(-1.0, 2.0, 3.0));
        assert_eq!(bb, (Vector2::new(-1.0, 2.0), Vector2::new(2.0, 5.0)));
        let other = bounding_box_2d(square(2.0, 2.0, 1.0));
        assert!(!boxes_overlap(bb, other, EPSILON_2D));
        let inside = bounding_box_2d(square(0.0, 3.0, 1.0));
        assert!(boxes_overlap(bb, inside, EPSILON_2D));
    }

    #[test]
    fn rotations() {
        let m = rotation_matrix(Rad(PI / 2.0));
        let p = transform_point(&m, Vector2::new(1.0, 0.0));
        assert!((p - Vector2::new(0.0, 1.0)).magnitude() < 1e-6);
    }
}
