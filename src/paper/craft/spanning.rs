use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::PI;

use cgmath::prelude::*;

use super::*;

pub struct SpanningForest {
    pub edges: Vec<EdgeStatus>,
    /// Order in which every fold edge was accepted, `u32::MAX` for cuts.
    pub fold_rank: Vec<u32>,
}

/// How bad it is to keep this edge as a fold. Lower is better.
pub fn edge_cost(model: &Model, i_edge: EdgeIndex, weights: FoldWeights) -> f32 {
    let edge = &model[i_edge];
    let (f0, Some(f1)) = edge.faces() else {
        return f32::INFINITY;
    };
    let len = model.edge_length(edge);
    let h = face_extent(model, f0, edge) + face_extent(model, f1, edge);
    let risk = if h + len > 0.0 { h / (h + len) } else { 0.0 };
    weights.flatness * edge.angle().0.abs() / PI + weights.overlap * risk
}

// How far the face reaches from the line of the edge
fn face_extent(model: &Model, i_face: FaceIndex, edge: &Edge) -> f32 {
    let (p0, p1) = model.edge_pos(edge);
    let dir = (p1 - p0).normalize();
    model[i_face]
        .index_vertices()
        .iter()
        .map(|&v| (model[v].pos() - p0).cross(dir).magnitude())
        .fold(0.0, f32::max)
}

#[derive(Debug, Copy, Clone)]
struct Candidate {
    cost: f32,
    face: FaceIndex,
    edge: EdgeIndex,
}

// Reversed, so that the BinaryHeap pops the cheapest first
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
            .then_with(|| other.face.cmp(&self.face))
            .then_with(|| other.edge.cmp(&self.edge))
    }
}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Candidate {}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0 .. n).collect(),
            rank: vec![0; n],
        }
    }
    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }
    // Returns false if they were already joined
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        match self.rank[a].cmp(&self.rank[b]) {
            Ordering::Less => self.parent[a] = b,
            Ordering::Greater => self.parent[b] = a,
            Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
        true
    }
}

/// One minimum-cost spanning tree of the dual graph per connected component.
pub fn spanning_forest(model: &Model, weights: FoldWeights) -> SpanningForest {
    let costs: Vec<f32> = (0 .. model.num_edges())
        .map(|i| edge_cost(model, EdgeIndex::from(i), weights))
        .collect();

    let mut edges: Vec<EdgeStatus> = model.edges()
        .map(|(_, edge)| if edge.is_boundary() { EdgeStatus::Cut(FlapSide::Hidden) } else { EdgeStatus::Cut(FlapSide::False) })
        .collect();
    let mut fold_rank = vec![u32::MAX; model.num_edges()];
    let mut next_rank = 0;

    let mut sets = UnionFind::new(model.num_faces());
    let mut visited = vec![false; model.num_faces()];
    let mut frontier = BinaryHeap::new();

    let push_face = |frontier: &mut BinaryHeap<Candidate>, i_face: FaceIndex| {
        for &i_edge in model[i_face].index_edges() {
            let edge = &model[i_edge];
            if let (f0, Some(f1)) = edge.faces() {
                frontier.push(Candidate {
                    cost: costs[usize::from(i_edge)],
                    face: f0.min(f1),
                    edge: i_edge,
                });
            }
        }
    };

    for i_start in 0 .. model.num_faces() {
        if visited[i_start] {
            continue;
        }
        visited[i_start] = true;
        push_face(&mut frontier, FaceIndex::from(i_start));

        while let Some(Candidate { edge: i_edge, .. }) = frontier.pop() {
            let (f0, Some(f1)) = model[i_edge].faces() else { continue };
            if !sets.union(usize::from(f0), usize::from(f1)) {
                continue;
            }
            edges[usize::from(i_edge)] = EdgeStatus::Fold;
            fold_rank[usize::from(i_edge)] = next_rank;
            next_rank += 1;
            for f in [f0, f1] {
                if !visited[usize::from(f)] {
                    visited[usize::from(f)] = true;
                    push_face(&mut frontier, f);
                }
            }
        }
    }

    SpanningForest { edges, fold_rank }
}
