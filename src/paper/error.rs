use serde::Serialize;
use thiserror::Error;

/// Structural problems in the input mesh. Fatal for that mesh.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidMeshError {
    #[error("the mesh has no faces")]
    Empty,
    #[error("face #{face} references vertex #{vertex}, but there are only {count} vertices")]
    VertexOutOfRange { face: usize, vertex: usize, count: usize },
    #[error("face #{face} has fewer than 3 vertices")]
    TooFewVertices { face: usize },
    #[error("face #{face} uses vertex #{vertex} more than once")]
    RepeatedVertex { face: usize, vertex: usize },
    #[error("face #{face} has no area")]
    DegenerateFace { face: usize },
    #[error("face #{face} is not planar")]
    NonPlanarFace { face: usize },
    #[error("edge {v0}-{v1} borders three or more faces")]
    NonManifoldEdge { v0: usize, v1: usize },
    #[error("faces #{f0} and #{f1} have inconsistent orientation")]
    InconsistentOrientation { f0: usize, f1: usize },
    #[error("vertex #{vertex} is not used by any face")]
    DanglingVertex { vertex: usize },
    #[error("vertex #{vertex} is non-manifold")]
    NonManifoldVertex { vertex: usize },
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("overlaps still unresolved after {iterations} re-cuts, {pending} island(s) pending")]
pub struct UnresolvableOverlapError {
    pub iterations: u32,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("island of {faces} face(s) rooted at face #{root} measures {width:.1}x{height:.1} mm and does not fit in a page")]
pub struct OversizedIslandError {
    pub root: usize,
    pub faces: usize,
    pub width: f32,
    pub height: f32,
}

/// An option value the pipeline cannot work with.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("invalid option `{option}`: {reason}")]
pub struct InvalidOptionsError {
    pub option: &'static str,
    pub reason: &'static str,
}

/// Errors that abort the unfolding of one model.
#[derive(Debug, Error)]
pub enum UnfoldError {
    #[error(transparent)]
    InvalidOptions(#[from] InvalidOptionsError),
    #[error(transparent)]
    InvalidMesh(#[from] InvalidMeshError),
    #[error(transparent)]
    UnresolvableOverlap(#[from] UnresolvableOverlapError),
}

/// Recoverable problems, reported next to the output.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error(transparent)]
    OversizedIsland(OversizedIslandError),
    #[error("flap of edge #{edge} shrunk to {width:.2} mm")]
    FlapShrunk { edge: usize, width: f32 },
    #[error("flap of edge #{edge} collides with its neighbors")]
    FlapCollision { edge: usize },
}
