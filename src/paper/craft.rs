use std::num::NonZeroU32;

use cgmath::{prelude::*, Rad};
use fxhash::FxHashMap;
use serde::{Serialize, Serializer};
use slotmap::{new_key_type, SlotMap};

use crate::util_3d::{self, Matrix3, Vector2};
use super::*;

mod flaps;
mod overlap;
mod pack;
mod spanning;
mod unfold;

pub use flaps::Flap;
pub use pack::Page;
pub use spanning::SpanningForest;

/// Which face of a cut edge carries the glue flap, by `Edge::face_sign`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FlapSide {
    False,
    True,
    Hidden,
}

impl FlapSide {
    pub fn from_sign(sign: bool) -> FlapSide {
        if sign { FlapSide::True } else { FlapSide::False }
    }
    pub fn sign(self) -> Option<bool> {
        match self {
            FlapSide::False => Some(false),
            FlapSide::True => Some(true),
            FlapSide::Hidden => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum EdgeStatus {
    Fold,
    Cut(FlapSide),
}

impl EdgeStatus {
    pub fn is_fold(self) -> bool {
        matches!(self, EdgeStatus::Fold)
    }
}

/// The number printed on both sides of a cut edge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeId(NonZeroU32);

impl EdgeId {
    fn new(id: u32) -> Option<EdgeId> {
        NonZeroU32::new(id).map(EdgeId)
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for EdgeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0.get())
    }
}

new_key_type! {
    pub struct IslandKey;
}

/// A face placed in the frame of its island.
#[derive(Debug, Clone)]
pub struct UnfoldedFace {
    face: FaceIndex,
    // The fold edge that reached this face, and the position of the parent in `Island::faces`
    parent: Option<(EdgeIndex, usize)>,
    polygon: Vec<Vector2>,
}

impl UnfoldedFace {
    pub fn face(&self) -> FaceIndex {
        self.face
    }
    pub fn parent(&self) -> Option<(EdgeIndex, usize)> {
        self.parent
    }
    /// Vertices in the island frame, in the same order as `Face::index_vertices`.
    pub fn polygon(&self) -> &[Vector2] {
        &self.polygon
    }
    pub fn triangles<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = [Vector2; 3]> + 'a {
        model[self.face]
            .triangles()
            .map(|tri| tri.map(|i| self.polygon[i]))
    }
}

#[derive(Debug, Clone)]
pub struct Island {
    root: FaceIndex,
    // In traversal order, the root first
    faces: Vec<UnfoldedFace>,
    // Position of every face in `faces`
    positions: FxHashMap<FaceIndex, usize>,
    flaps: Vec<Flap>,
    // From the island frame to the page frame
    mx: Matrix3,
    page: Option<usize>,
}

impl Island {
    pub fn root_face(&self) -> FaceIndex {
        self.root
    }
    pub fn faces(&self) -> &[UnfoldedFace] {
        &self.faces
    }
    pub fn flaps(&self) -> &[Flap] {
        &self.flaps
    }
    pub fn matrix(&self) -> Matrix3 {
        self.mx
    }
    pub fn page(&self) -> Option<usize> {
        self.page
    }
    pub fn unfolded_face(&self, i_face: FaceIndex) -> Option<&UnfoldedFace> {
        let &i = self.positions.get(&i_face)?;
        self.faces.get(i)
    }
    /// Every point of the island outline, faces and flaps, through `mx`.
    pub fn points(&self, mx: &Matrix3) -> impl Iterator<Item = Vector2> + '_ {
        let mx = *mx;
        self.faces
            .iter()
            .flat_map(|f| f.polygon.iter())
            .chain(self.flaps.iter().flat_map(|f| f.polygon().iter()))
            .map(move |p| util_3d::transform_point(&mx, *p))
    }
    pub fn bounding_box(&self, mx: &Matrix3) -> (Vector2, Vector2) {
        util_3d::bounding_box_2d(self.points(mx))
    }
    pub fn translate(&mut self, delta: Vector2) {
        self.mx = Matrix3::from_translation(delta) * self.mx;
    }
    pub fn rotate(&mut self, angle: impl Into<Rad<f32>>) {
        self.mx = util_3d::rotation_matrix(angle.into()) * self.mx;
    }
}

/// Direction pointing out of a face from one of its edges, for a polygon of the given winding.
pub fn outward_normal(polygon: &[Vector2], p0: Vector2, p1: Vector2) -> Vector2 {
    let d = (p1 - p0).normalize();
    if util_3d::signed_area(polygon) < 0.0 {
        Vector2::new(-d.y, d.x)
    } else {
        Vector2::new(d.y, -d.x)
    }
}

pub struct Papercraft {
    model: Model,
    options: PaperOptions,
    edges: Vec<EdgeStatus>, //parallel to EdgeIndex
    fold_rank: Vec<u32>,    //parallel to EdgeIndex, u32::MAX for cuts
    edge_ids: Vec<Option<EdgeId>>,
    islands: SlotMap<IslandKey, Island>,
    face_island: Vec<IslandKey>, //parallel to FaceIndex
    pages: Vec<Page>,
    warnings: Vec<Warning>,
}

impl Papercraft {
    /// Runs the whole unfolding pipeline: spanning forest, unfolding, overlap
    /// resolution, glue flaps and page packing.
    pub fn unfold(model: Model, options: PaperOptions) -> Result<Papercraft, UnfoldError> {
        options.validate()?;
        let SpanningForest { edges, fold_rank } = spanning::spanning_forest(&model, options.fold_weights());
        log::debug!(
            "spanning forest: {} folds, {} cuts",
            edges.iter().filter(|e| e.is_fold()).count(),
            edges.iter().filter(|e| !e.is_fold()).count(),
        );
        let num_edges = model.num_edges();
        let num_faces = model.num_faces();
        let mut pc = Papercraft {
            model,
            options,
            edges,
            fold_rank,
            edge_ids: vec![None; num_edges],
            islands: SlotMap::with_key(),
            face_island: vec![IslandKey::default(); num_faces],
            pages: Vec::new(),
            warnings: Vec::new(),
        };
        pc.build_islands();
        log::debug!("{} island(s) before resolving overlaps", pc.islands.len());
        pc.resolve_overlaps()?;
        pc.rebuild_face_map();
        pc.recompute_edge_ids();
        pc.generate_flaps();
        pc.pack_islands();
        log::debug!("{} island(s) in {} page(s)", pc.islands.len(), pc.pages.len());
        Ok(pc)
    }

    // One island per connected component under fold edges, rooted at its lowest face
    fn build_islands(&mut self) {
        let mut done = vec![false; self.model.num_faces()];
        for i_root in 0 .. self.model.num_faces() {
            if done[i_root] {
                continue;
            }
            let island = self.unfold_island(FaceIndex::from(i_root));
            for f in &island.faces {
                done[usize::from(f.face)] = true;
            }
            self.islands.insert(island);
        }
        self.rebuild_face_map();
    }

    fn rebuild_face_map(&mut self) {
        for (i_island, island) in &self.islands {
            for f in &island.faces {
                self.face_island[usize::from(f.face)] = i_island;
            }
        }
    }

    fn recompute_edge_ids(&mut self) {
        let mut next_edge_id = 0;
        let mut edge_ids: Vec<Option<EdgeId>> = vec![None; self.model.num_edges()];

        let mut edge_collection: Vec<_> = self.model.edges()
            .zip(&self.edges)
            .zip(&mut edge_ids)
            .map(|(((_, edge), edge_status), edge_id)| {
                let (p0, p1) = self.model.edge_pos(edge);
                let c = (p0 + p1) / 2.0;
                (c, edge, edge_status, edge_id)
            })
            .collect();

        // sort_by is stable, so equal midpoints keep the edge order
        edge_collection.sort_by(|(ca, _, _, _), (cb, _, _, _)| {
            ca.y.total_cmp(&cb.y).then_with(|| ca.z.total_cmp(&cb.z)).then_with(|| ca.x.total_cmp(&cb.x))
        });

        for (_, edge, edge_status, edge_id) in edge_collection {
            match (edge.faces(), edge_status) {
                // folds and rims don't have ids
                (_, EdgeStatus::Fold) | ((_, None), _) => {}
                _ => {
                    next_edge_id += 1;
                    *edge_id = EdgeId::new(next_edge_id);
                }
            }
        }
        self.edge_ids = edge_ids;
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
    pub fn options(&self) -> &PaperOptions {
        &self.options
    }
    pub fn islands(&self) -> impl Iterator<Item = (IslandKey, &Island)> + '_ {
        self.islands.iter()
    }
    pub fn num_islands(&self) -> usize {
        self.islands.len()
    }
    pub fn island_by_key(&self, key: IslandKey) -> Option<&Island> {
        self.islands.get(key)
    }
    pub fn island_by_face(&self, i_face: FaceIndex) -> IslandKey {
        self.face_island[usize::from(i_face)]
    }
    pub fn edge_status(&self, i_edge: EdgeIndex) -> EdgeStatus {
        self.edges[usize::from(i_edge)]
    }
    pub fn edge_id(&self, i_edge: EdgeIndex) -> Option<EdgeId> {
        self.edge_ids[usize::from(i_edge)]
    }
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
    fn push_warning(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
}
