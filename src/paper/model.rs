use cgmath::{prelude::*, Rad};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::util_3d::{self, Matrix2, Matrix3, Plane, Vector2, Vector3};
use super::error::InvalidMeshError;

// Relative to the size of the face
const PLANARITY_TOLERANCE: f32 = 1e-3;
const AREA_TOLERANCE: f32 = 1e-6;

// We use u32 where usize should be use to save some memory in 64-bit systems.
// 32-bit indices should be enough for everybody ;-)
macro_rules! index_type {
    ($vis:vis $name:ident : $inner:ty) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
        #[repr(transparent)]
        #[serde(transparent)]
        $vis struct $name($inner);

        impl From<$name> for usize {
            fn from(idx: $name) -> usize {
                idx.0 as usize
            }
        }

        impl From<usize> for $name {
            fn from(idx: usize) -> $name {
                $name(idx as $inner)
            }
        }
    }
}

index_type!(pub VertexIndex: u32);
index_type!(pub EdgeIndex: u32);
index_type!(pub FaceIndex: u32);

#[derive(Debug)]
pub struct Model {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
}

#[derive(Debug)]
pub struct Vertex {
    pos: Vector3,
}

#[derive(Debug)]
pub struct Face {
    vertices: Vec<VertexIndex>,
    // edges[i] joins vertices[i] and vertices[i + 1]
    edges: Vec<EdgeIndex>,
    // result of tessellation, indices in self.vertices
    tris: Vec<[u32; 3]>,
    plane: Plane,
    area: f32,
}

// (v0, v1) is the direction in which `f0` walks the edge, `f1` walks it backwards.
#[derive(Debug)]
pub struct Edge {
    v0: VertexIndex,
    v1: VertexIndex,
    f0: FaceIndex,
    f1: Option<FaceIndex>,
    angle: Rad<f32>,
}

impl Model {
    /// Builds the adjacency of a polygon mesh, rejecting anything that cannot be unfolded.
    ///
    /// Every face is a list of indices into `positions`, walked counter-clockwise when seen
    /// from outside the model.
    pub fn from_polygons(positions: Vec<Vector3>, polygons: &[Vec<u32>]) -> Result<Model, InvalidMeshError> {
        if polygons.is_empty() {
            return Err(InvalidMeshError::Empty);
        }
        let vertices: Vec<Vertex> = positions.into_iter().map(|pos| Vertex { pos }).collect();

        let mut faces = Vec::with_capacity(polygons.len());
        let mut edges: Vec<Edge> = Vec::with_capacity(polygons.len() * 3 / 2);
        let mut edge_map: FxHashMap<(VertexIndex, VertexIndex), EdgeIndex> = FxHashMap::default();
        let mut vertex_faces: Vec<Vec<FaceIndex>> = vec![Vec::new(); vertices.len()];

        for (i_face, polygon) in polygons.iter().enumerate() {
            let face_verts = check_polygon(i_face, polygon, vertices.len())?;
            let to_plane: Vec<Vector3> = face_verts.iter().map(|&v| vertices[usize::from(v)].pos).collect();
            let (plane, area) = check_planar(i_face, &to_plane)?;

            let flat: Vec<Vector2> = to_plane.iter().map(|p| plane.project(p, 1.0)).collect();
            let tris = util_3d::tessellate(&flat)
                .into_iter()
                .map(|tri| tri.map(|x| x as u32))
                .collect();

            let i_face = FaceIndex::from(i_face);
            let mut face_edges = Vec::with_capacity(face_verts.len());
            for (i, &v0) in face_verts.iter().enumerate() {
                let v1 = face_verts[(i + 1) % face_verts.len()];
                let key = if v0 < v1 { (v0, v1) } else { (v1, v0) };
                let i_edge = match edge_map.get(&key) {
                    Some(&i_edge) => {
                        let edge = &mut edges[usize::from(i_edge)];
                        if edge.f1.is_some() {
                            return Err(InvalidMeshError::NonManifoldEdge { v0: usize::from(key.0), v1: usize::from(key.1) });
                        }
                        if edge.v0 == v0 {
                            return Err(InvalidMeshError::InconsistentOrientation { f0: usize::from(edge.f0), f1: usize::from(i_face) });
                        }
                        edge.f1 = Some(i_face);
                        i_edge
                    }
                    None => {
                        let i_edge = EdgeIndex::from(edges.len());
                        edges.push(Edge {
                            v0,
                            v1,
                            f0: i_face,
                            f1: None,
                            angle: Rad(PI),
                        });
                        edge_map.insert(key, i_edge);
                        i_edge
                    }
                };
                face_edges.push(i_edge);
                vertex_faces[usize::from(v0)].push(i_face);
            }

            faces.push(Face {
                vertices: face_verts,
                edges: face_edges,
                tris,
                plane,
                area,
            });
        }

        let mut model = Model {
            vertices,
            edges,
            faces,
        };
        model.check_vertices(&vertex_faces)?;

        for i_edge in 0 .. model.edges.len() {
            let angle = model.compute_edge_angle(&model.edges[i_edge]);
            model.edges[i_edge].angle = angle;
        }
        Ok(model)
    }

    // Every vertex must be used, and the faces around it must be a single fan.
    fn check_vertices(&self, vertex_faces: &[Vec<FaceIndex>]) -> Result<(), InvalidMeshError> {
        for (i_v, faces) in vertex_faces.iter().enumerate() {
            if faces.is_empty() {
                return Err(InvalidMeshError::DanglingVertex { vertex: i_v });
            }
            let i_v = VertexIndex::from(i_v);
            // Tiny union-find local to the fan, faces around a vertex are usually a handful
            let mut parent: Vec<usize> = (0 .. faces.len()).collect();
            fn root(parent: &mut [usize], mut i: usize) -> usize {
                while parent[i] != i {
                    parent[i] = parent[parent[i]];
                    i = parent[i];
                }
                i
            }
            for (i, &i_face) in faces.iter().enumerate() {
                for &i_edge in &self[i_face].edges {
                    let edge = &self[i_edge];
                    if edge.v0 != i_v && edge.v1 != i_v {
                        continue;
                    }
                    let Some(i_other) = edge.other_face(i_face) else { continue };
                    let Some(j) = faces.iter().position(|&f| f == i_other) else { continue };
                    let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                    parent[ri] = rj;
                }
            }
            let r0 = root(&mut parent, 0);
            if (1 .. faces.len()).any(|i| root(&mut parent, i) != r0) {
                return Err(InvalidMeshError::NonManifoldVertex { vertex: usize::from(i_v) });
            }
        }
        Ok(())
    }

    // Negative for convex edges (valleys, seen from outside), positive for concave ones.
    fn compute_edge_angle(&self, edge: &Edge) -> Rad<f32> {
        match edge.faces() {
            (fa, Some(fb)) => {
                let fa = &self[fa];
                let fb = &self[fb];
                let na = fa.plane.normal();
                let nb = fb.plane.normal();
                // The edge as `fa` walks it: the normals turn against it on a convex join
                let (p0, p1) = self.edge_pos(edge);
                let sign = -na.cross(nb).dot(p1 - p0).signum();
                Rad(sign * nb.angle(na).0)
            }
            _ => Rad::turn_div_2(), //180 degrees
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexIndex, &Vertex)> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexIndex::from(i), v))
    }
    pub fn faces(&self) -> impl Iterator<Item = (FaceIndex, &Face)> + '_ {
        self.faces
            .iter()
            .enumerate()
            .map(|(i, f)| (FaceIndex::from(i), f))
    }
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeIndex::from(i), e))
    }
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
    pub fn edge_pos(&self, edge: &Edge) -> (Vector3, Vector3) {
        (self[edge.v0].pos, self[edge.v1].pos)
    }
    pub fn edge_length(&self, edge: &Edge) -> f32 {
        let (p0, p1) = self.edge_pos(edge);
        p0.distance(p1)
    }
    pub fn face_positions(&self, face: &Face) -> Vec<Vector3> {
        face.vertices.iter().map(|&v| self[v].pos).collect()
    }
    /// The face in its own plane frame, scaled to paper units.
    pub fn face_polygon(&self, face: &Face, scale: f32) -> Vec<Vector2> {
        face.vertices
            .iter()
            .map(|&v| face.plane.project(&self[v].pos, scale))
            .collect()
    }
    pub fn face_area(&self, i_face: FaceIndex) -> f32 {
        self[i_face].area
    }

    /// Matrix that moves `face_b` from its plane frame into the plane frame of `face_a`,
    /// so that their common edge lands on the same place.
    pub fn face_to_face_edge_matrix(&self, scale: f32, edge: &Edge, face_a: &Face, face_b: &Face) -> Matrix3 {
        let (v0, v1) = self.edge_pos(edge);
        let a0 = face_a.plane.project(&v0, scale);
        let b0 = face_b.plane.project(&v0, scale);
        let a1 = face_a.plane.project(&v1, scale);
        let b1 = face_b.plane.project(&v1, scale);
        let mabt0 = Matrix3::from_translation(-b0);
        let mabr = Matrix3::from(Matrix2::from_angle((b1 - b0).angle(a1 - a0)));
        let mabt1 = Matrix3::from_translation(a0);
        mabt1 * mabr * mabt0
    }

    /// Inner angles of the face at both ends of the edge, as (at `v0`, at `v1`) of the edge.
    pub fn face_corner_angles(&self, i_face: FaceIndex, i_edge: EdgeIndex) -> (Rad<f32>, Rad<f32>) {
        let face = &self[i_face];
        let edge = &self[i_edge];
        let n = face.vertices.len();
        let corner = |i: usize| {
            let prev = self[face.vertices[(i + n - 1) % n]].pos;
            let this = self[face.vertices[i]].pos;
            let next = self[face.vertices[(i + 1) % n]].pos;
            let a = (prev - this).angle(next - this);
            // Reflex corners do not limit anything
            if face.plane.normal().dot((next - this).cross(prev - this)) < 0.0 {
                Rad::turn_div_2()
            } else {
                a
            }
        };
        let i0 = face.vertices.iter().position(|&v| v == edge.v0).unwrap_or(0);
        let i1 = face.vertices.iter().position(|&v| v == edge.v1).unwrap_or(0);
        (corner(i0), corner(i1))
    }
}

fn check_polygon(i_face: usize, polygon: &[u32], num_vertices: usize) -> Result<Vec<VertexIndex>, InvalidMeshError> {
    if polygon.len() < 3 {
        return Err(InvalidMeshError::TooFewVertices { face: i_face });
    }
    for (i, &v) in polygon.iter().enumerate() {
        if v as usize >= num_vertices {
            return Err(InvalidMeshError::VertexOutOfRange { face: i_face, vertex: v as usize, count: num_vertices });
        }
        if polygon[.. i].contains(&v) {
            return Err(InvalidMeshError::RepeatedVertex { face: i_face, vertex: v as usize });
        }
    }
    Ok(polygon.iter().map(|&v| VertexIndex(v)).collect())
}

fn check_planar(i_face: usize, ps: &[Vector3]) -> Result<(Plane, f32), InvalidMeshError> {
    let (bb_min, bb_max) = util_3d::bounding_box_3d(ps.iter().copied());
    let size = (bb_max - bb_min).magnitude();
    let area = util_3d::polygon_area_3d(ps);
    if size <= 0.0 || area <= AREA_TOLERANCE * size * size {
        return Err(InvalidMeshError::DegenerateFace { face: i_face });
    }
    let plane = Plane::from_polygon(ps).ok_or(InvalidMeshError::DegenerateFace { face: i_face })?;
    if ps.iter().any(|p| plane.distance(p).abs() > PLANARITY_TOLERANCE * size) {
        return Err(InvalidMeshError::NonPlanarFace { face: i_face });
    }
    Ok((plane, area))
}

impl std::ops::Index<VertexIndex> for Model {
    type Output = Vertex;

    fn index(&self, index: VertexIndex) -> &Vertex {
        &self.vertices[index.0 as usize]
    }
}

impl std::ops::Index<FaceIndex> for Model {
    type Output = Face;

    fn index(&self, index: FaceIndex) -> &Face {
        &self.faces[index.0 as usize]
    }
}

impl std::ops::Index<EdgeIndex> for Model {
    type Output = Edge;

    fn index(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index.0 as usize]
    }
}

impl Face {
    pub fn index_vertices(&self) -> &[VertexIndex] {
        &self.vertices
    }
    pub fn index_edges(&self) -> &[EdgeIndex] {
        &self.edges
    }
    pub fn vertices_with_edges(&self) -> impl Iterator<Item = (VertexIndex, VertexIndex, EdgeIndex)> + '_ {
        self.edges
            .iter()
            .copied()
            .enumerate()
            .map(|(i, e)| {
                let v0 = self.vertices[i];
                let v1 = self.vertices[(i + 1) % self.vertices.len()];
                (v0, v1, e)
            })
    }
    /// Positions in `self.vertices` of the ends of the edge, in the order this face walks them.
    pub fn edge_position(&self, i_edge: EdgeIndex) -> Option<(usize, usize)> {
        let i = self.edges.iter().position(|&e| e == i_edge)?;
        Some((i, (i + 1) % self.vertices.len()))
    }
    /// Triangles as indices into `self.vertices`.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.tris.iter().map(|tri| tri.map(|x| x as usize))
    }
}

impl Vertex {
    pub fn pos(&self) -> Vector3 {
        self.pos
    }
}

impl Edge {
    pub fn faces(&self) -> (FaceIndex, Option<FaceIndex>) {
        (self.f0, self.f1)
    }
    pub fn vertices(&self) -> (VertexIndex, VertexIndex) {
        (self.v0, self.v1)
    }
    pub fn angle(&self) -> Rad<f32> {
        self.angle
    }
    pub fn is_boundary(&self) -> bool {
        self.f1.is_none()
    }
    // false for f0, true for f1
    pub fn face_sign(&self, i_face: FaceIndex) -> bool {
        self.f1 == Some(i_face)
    }
    pub fn face_by_sign(&self, sign: bool) -> Option<FaceIndex> {
        if sign { self.f1 } else { Some(self.f0) }
    }
    pub fn other_face(&self, i_face: FaceIndex) -> Option<FaceIndex> {
        if self.f0 == i_face {
            self.f1
        } else if self.f1 == Some(i_face) {
            Some(self.f0)
        } else {
            None
        }
    }
}
