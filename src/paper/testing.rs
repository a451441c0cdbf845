//! Small meshes shared by the tests.

use std::f32::consts::PI;

use crate::util_3d::{Vector2, Vector3};
use super::Model;

#[derive(Default)]
pub struct MeshBuilder {
    positions: Vec<Vector3>,
    faces: Vec<Vec<u32>>,
}

impl MeshBuilder {
    pub fn new() -> MeshBuilder {
        MeshBuilder::default()
    }

    /// Extrudes a counter-clockwise outline along +Z, closed at both ends.
    pub fn prism(mut self, origin: Vector3, outline: &[Vector2], height: f32) -> MeshBuilder {
        let base = self.positions.len() as u32;
        let n = outline.len() as u32;
        for z in [0.0, height] {
            self.positions.extend(outline.iter().map(|p| origin + Vector3::new(p.x, p.y, z)));
        }
        self.faces.push((0 .. n).rev().map(|i| base + i).collect());
        self.faces.push((0 .. n).map(|i| base + n + i).collect());
        for i in 0 .. n {
            let j = (i + 1) % n;
            self.faces.push(vec![base + i, base + j, base + n + j, base + n + i]);
        }
        self
    }

    /// Like `prism`, but with the side faces before the caps.
    pub fn prism_caps_last(mut self, origin: Vector3, outline: &[Vector2], height: f32) -> MeshBuilder {
        let first = self.faces.len();
        self = self.prism(origin, outline, height);
        self.faces[first ..].rotate_left(2);
        self
    }

    pub fn cube(self, origin: Vector3, side: f32) -> MeshBuilder {
        let outline = [
            Vector2::new(0.0, 0.0),
            Vector2::new(side, 0.0),
            Vector2::new(side, side),
            Vector2::new(0.0, side),
        ];
        self.prism(origin, &outline, side)
    }

    /// A single open face, on the XY plane.
    pub fn square(mut self, origin: Vector3, side: f32) -> MeshBuilder {
        let base = self.positions.len() as u32;
        self.positions.extend([
            origin,
            origin + Vector3::new(side, 0.0, 0.0),
            origin + Vector3::new(side, side, 0.0),
            origin + Vector3::new(0.0, side, 0.0),
        ]);
        self.faces.push(vec![base, base + 1, base + 2, base + 3]);
        self
    }

    /// A flat `n` by `n` sheet of unit squares, on the XY plane.
    pub fn grid(mut self, n: u32) -> MeshBuilder {
        let base = self.positions.len() as u32;
        for y in 0 ..= n {
            for x in 0 ..= n {
                self.positions.push(Vector3::new(x as f32, y as f32, 0.0));
            }
        }
        let at = |x: u32, y: u32| base + y * (n + 1) + x;
        for y in 0 .. n {
            for x in 0 .. n {
                self.faces.push(vec![at(x, y), at(x + 1, y), at(x + 1, y + 1), at(x, y + 1)]);
            }
        }
        self
    }

    pub fn build(self) -> Model {
        Model::from_polygons(self.positions, &self.faces).unwrap()
    }
}

pub fn cube(side: f32) -> Model {
    MeshBuilder::new().cube(Vector3::new(0.0, 0.0, 0.0), side).build()
}

pub fn square(origin: Vector3, side: f32) -> Model {
    MeshBuilder::new().square(origin, side).build()
}

/// An L-shaped prism: one concave vertical edge, a non-convex top and bottom.
pub fn notched_prism() -> Model {
    let outline = [
        Vector2::new(0.0, 0.0),
        Vector2::new(2.0, 0.0),
        Vector2::new(2.0, 1.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(1.0, 2.0),
        Vector2::new(0.0, 2.0),
    ];
    MeshBuilder::new().prism(Vector3::new(0.0, 0.0, 0.0), &outline, 1.0).build()
}

/// A thin L whose caps have their centroids beyond some of their own edges.
pub fn thin_l_prism() -> Model {
    let outline = [
        Vector2::new(0.0, 0.0),
        Vector2::new(10.0, 0.0),
        Vector2::new(10.0, 10.0),
        Vector2::new(1.0, 10.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(0.0, 1.0),
    ];
    MeshBuilder::new().prism_caps_last(Vector3::new(0.0, 0.0, 0.0), &outline, 1.0).build()
}

/// Eight equilateral triangles around a vertex, with a zig-zag rim.
///
/// The angles around the center add up to 480 degrees, so any unfolding that
/// keeps them all together overlaps itself.
pub fn saddle() -> Model {
    // |p| = 1 and |p_k - p_k+1| = 1
    let r = 0.937_379;
    let z = 0.348_311;
    let mut positions = vec![Vector3::new(0.0, 0.0, 0.0)];
    for k in 0 .. 8 {
        let a = k as f32 * PI / 4.0;
        let zk = if k % 2 == 0 { z } else { -z };
        positions.push(Vector3::new(r * a.cos(), r * a.sin(), zk));
    }
    let faces: Vec<Vec<u32>> = (0 .. 8).map(|k| vec![0, 1 + k, 1 + (k + 1) % 8]).collect();
    Model::from_polygons(positions, &faces).unwrap()
}
