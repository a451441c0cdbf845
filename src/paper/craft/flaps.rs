use cgmath::Deg;
use slotmap::SecondaryMap;

use super::*;
use crate::util_3d::EPSILON_2D;

// Each retry makes the flap this much narrower
const SHRINK_FACTOR: f32 = 0.75;

/// A glue flap attached to one side of a cut edge.
#[derive(Debug, Clone)]
pub struct Flap {
    edge: EdgeIndex,
    face: FaceIndex,
    // Island frame. Starts and ends at the ends of the edge.
    polygon: Vec<Vector2>,
    width: f32,
    // Placed even though it overlaps something
    collision: bool,
}

impl Flap {
    pub fn edge(&self) -> EdgeIndex {
        self.edge
    }
    /// The face the flap hangs from. It is glued under the other face of the edge.
    pub fn face(&self) -> FaceIndex {
        self.face
    }
    pub fn polygon(&self) -> &[Vector2] {
        &self.polygon
    }
    pub fn width(&self) -> f32 {
        self.width
    }
    pub fn has_collision(&self) -> bool {
        self.collision
    }
}

// Something a flap must not touch, a face triangle or another flap
#[derive(Debug, Clone)]
struct Obstacle {
    bbox: (Vector2, Vector2),
    polygon: Vec<Vector2>,
}

impl Obstacle {
    fn new(polygon: Vec<Vector2>) -> Obstacle {
        let bbox = util_3d::bounding_box_2d(polygon.iter().copied());
        Obstacle { bbox, polygon }
    }
    fn overlaps(&self, bbox: (Vector2, Vector2), polygon: &[Vector2]) -> bool {
        util_3d::boxes_overlap(self.bbox, bbox, EPSILON_2D) && util_3d::convex_overlap(polygon, &self.polygon, EPSILON_2D)
    }
}

// The edge a flap grows from, as seen in the island of the face that carries it
#[derive(Debug, Clone)]
struct FlapBase {
    face: FaceIndex,
    island: IslandKey,
    p0: Vector2,
    p1: Vector2,
    normal: Vector2,
    angle0: Rad<f32>,
    angle1: Rad<f32>,
}

impl FlapBase {
    fn polygon(&self, width: f32) -> Vec<Vector2> {
        let d = self.p1 - self.p0;
        let len = d.magnitude();
        let u = d / len;
        let n = self.normal;
        let cot0 = 1.0 / self.angle0.0.tan();
        let cot1 = 1.0 / self.angle1.0.tan();
        if width * (cot0 + cot1) >= len {
            // Too short for a trapezoid
            let h = len / (cot0 + cot1);
            vec![self.p0, self.p0 + u * (h * cot0) + n * h, self.p1]
        } else {
            vec![
                self.p0,
                self.p0 + u * (width * cot0) + n * width,
                self.p1 - u * (width * cot1) + n * width,
                self.p1,
            ]
        }
    }

    /// The widest flap, shrinking from `width` down to `min_width`, that does not touch any obstacle.
    fn fit(&self, width: f32, min_width: f32, obstacles: &[Obstacle]) -> Option<(Vec<Vector2>, f32)> {
        let min_width = min_width.max(EPSILON_2D);
        let mut w = width;
        while w >= min_width {
            let polygon = self.polygon(w);
            let bbox = util_3d::bounding_box_2d(polygon.iter().copied());
            if !obstacles.iter().any(|o| o.overlaps(bbox, &polygon)) {
                return Some((polygon, w));
            }
            w *= SHRINK_FACTOR;
        }
        None
    }
}

impl Papercraft {
    /// Adds a glue flap to every cut edge that joins two faces, and records its side.
    pub(super) fn generate_flaps(&mut self) {
        // Face triangles of every island, and its flaps as they are placed
        let mut obstacles: SecondaryMap<IslandKey, Vec<Obstacle>> = self.islands
            .iter()
            .map(|(i_island, island)| {
                let tris = island.faces
                    .iter()
                    .flat_map(|f| f.triangles(&self.model).map(|t| Obstacle::new(t.to_vec())))
                    .collect();
                (i_island, tris)
            })
            .collect();

        for i_edge in 0 .. self.model.num_edges() {
            let i_edge = EdgeIndex::from(i_edge);
            if self.edge_status(i_edge).is_fold() || self.model[i_edge].is_boundary() {
                continue;
            }
            let Some((flap, side, warning)) = self.place_flap(i_edge, &obstacles) else { continue };
            self.edges[usize::from(i_edge)] = EdgeStatus::Cut(side);
            let i_island = self.island_by_face(flap.face());
            if let Some(obs) = obstacles.get_mut(i_island) {
                obs.push(Obstacle::new(flap.polygon.clone()));
            }
            self.islands[i_island].flaps.push(flap);
            if let Some(warning) = warning {
                self.push_warning(warning);
            }
        }
    }

    fn place_flap(&self, i_edge: EdgeIndex, obstacles: &SecondaryMap<IslandKey, Vec<Obstacle>>) -> Option<(Flap, FlapSide, Option<Warning>)> {
        let opts = &self.options;
        for sign in [false, true] {
            let Some(base) = self.flap_base(i_edge, sign) else { continue };
            let obstacles = obstacles.get(base.island).map(Vec::as_slice).unwrap_or(&[]);
            if let Some((polygon, width)) = base.fit(opts.flap_width, opts.flap_min_width, obstacles) {
                let warning = (width < opts.flap_width).then_some(Warning::FlapShrunk {
                    edge: usize::from(i_edge),
                    width,
                });
                let flap = Flap {
                    edge: i_edge,
                    face: base.face,
                    polygon,
                    width,
                    collision: false,
                };
                return Some((flap, FlapSide::from_sign(sign), warning));
            }
        }

        // Nothing fits, put it where it should be and let the user decide
        let base = self.flap_base(i_edge, false)?;
        let flap = Flap {
            edge: i_edge,
            face: base.face,
            polygon: base.polygon(opts.flap_width),
            width: opts.flap_width,
            collision: true,
        };
        Some((flap, FlapSide::False, Some(Warning::FlapCollision { edge: usize::from(i_edge) })))
    }

    fn flap_base(&self, i_edge: EdgeIndex, sign: bool) -> Option<FlapBase> {
        let model = &self.model;
        let edge = &model[i_edge];
        let i_face = edge.face_by_sign(sign)?;
        let i_partner = edge.other_face(i_face)?;
        let i_island = self.face_island[usize::from(i_face)];
        let unfolded = self.islands.get(i_island)?.unfolded_face(i_face)?;
        let (i0, i1) = model[i_face].edge_position(i_edge)?;
        let p0 = unfolded.polygon[i0];
        let p1 = unfolded.polygon[i1];

        // The flap goes under the partner face, so it must not stick out of its corners
        let max_angle = Rad::from(Deg(self.options.flap_angle));
        let (c_v0, c_v1) = model.face_corner_angles(i_partner, i_edge);
        let (c0, c1) = if model[i_face].index_vertices()[i0] == edge.vertices().0 {
            (c_v0, c_v1)
        } else {
            (c_v1, c_v0)
        };
        Some(FlapBase {
            face: i_face,
            island: i_island,
            p0,
            p1,
            normal: outward_normal(&unfolded.polygon, p0, p1),
            angle0: Rad(max_angle.0.min(c0.0)),
            angle1: Rad(max_angle.0.min(c1.0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use super::super::tests::options;
    use crate::paper::testing;

    fn base(len: f32) -> FlapBase {
        FlapBase {
            face: FaceIndex::from(0),
            island: IslandKey::default(),
            p0: Vector2::new(0.0, 0.0),
            p1: Vector2::new(len, 0.0),
            normal: Vector2::new(0.0, -1.0),
            angle0: Rad(PI / 4.0),
            angle1: Rad(PI / 4.0),
        }
    }

    #[test]
    fn trapezoid_and_triangle() {
        let p = base(20.0).polygon(5.0);
        assert_eq!(p.len(), 4);
        assert!((p[1] - Vector2::new(5.0, -5.0)).magnitude() < 1e-5);
        assert!((p[2] - Vector2::new(15.0, -5.0)).magnitude() < 1e-5);

        let p = base(2.0).polygon(5.0);
        assert_eq!(p.len(), 3);
        assert!((p[1] - Vector2::new(1.0, -1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn shrinks_until_it_fits() {
        // Something 3 mm away from the edge
        let wall = vec![
            Vector2::new(-10.0, -3.0),
            Vector2::new(30.0, -3.0),
            Vector2::new(30.0, -10.0),
            Vector2::new(-10.0, -10.0),
        ];
        let (p, w) = base(20.0).fit(5.0, 1.5, &[Obstacle::new(wall.clone())]).unwrap();
        // 5 -> 3.75 -> 2.8125
        assert!((w - 2.8125).abs() < 1e-5);
        assert_eq!(p.len(), 4);

        // Closer than the minimum width
        let wall: Vec<_> = wall.iter().map(|p| p + Vector2::new(0.0, 2.0)).collect();
        assert!(base(20.0).fit(5.0, 1.5, &[Obstacle::new(wall)]).is_none());
    }

    #[test]
    fn cube_flaps() {
        let pc = Papercraft::unfold(testing::cube(1.0), options(30.0)).unwrap();
        let model = pc.model();
        let (_, island) = pc.islands().next().unwrap();
        assert_eq!(island.flaps().len(), 7);
        assert!(pc.warnings().is_empty(), "{:?}", pc.warnings());

        for flap in island.flaps() {
            let EdgeStatus::Cut(side) = pc.edge_status(flap.edge()) else { panic!("flap on a fold") };
            assert_eq!(model[flap.edge()].face_by_sign(side.sign().unwrap()), Some(flap.face()));
            // Full size, on the outside of its face
            assert_eq!(flap.width(), 5.0);
            assert!(!flap.has_collision());
            for f in island.faces() {
                for tri in f.triangles(model) {
                    assert!(!util_3d::convex_overlap(flap.polygon(), &tri, EPSILON_2D));
                }
            }
            // The base is the edge of the face
            let face = island.unfolded_face(flap.face()).unwrap();
            let p = flap.polygon();
            assert!(face.polygon().iter().any(|v| (v - p[0]).magnitude() < 1e-4));
            assert!(face.polygon().iter().any(|v| (v - p[p.len() - 1]).magnitude() < 1e-4));
        }
        // Flaps placed earlier are obstacles for the later ones
        let flaps = island.flaps();
        for (i, a) in flaps.iter().enumerate() {
            for b in &flaps[i + 1 ..] {
                assert!(!util_3d::convex_overlap(a.polygon(), b.polygon(), EPSILON_2D), "{:?} {:?}", a.edge(), b.edge());
            }
        }
    }

    #[test]
    fn no_flaps_on_rims() {
        let pc = Papercraft::unfold(testing::square(crate::util_3d::Vector3::new(0.0, 0.0, 0.0), 1.0), options(10.0)).unwrap();
        let (_, island) = pc.islands().next().unwrap();
        assert!(island.flaps().is_empty());
        for (i_edge, _) in pc.model().edges() {
            assert_eq!(pc.edge_status(i_edge), EdgeStatus::Cut(FlapSide::Hidden));
        }
    }
}
