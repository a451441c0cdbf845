use std::collections::VecDeque;

use super::*;
use crate::util_3d::EPSILON_2D;

impl Papercraft {
    /// Re-cuts fold edges until no island overlaps itself.
    ///
    /// Every island starts in the worklist. An island with an overlapping pair
    /// of faces loses the sharpest fold between them and both halves go back
    /// to the worklist.
    pub(super) fn resolve_overlaps(&mut self) -> Result<(), UnresolvableOverlapError> {
        let max_iterations = self.options.max_iterations;
        let mut iterations = 0;
        let mut pending: VecDeque<IslandKey> = self.islands.keys().collect();

        while let Some(i_island) = pending.pop_front() {
            let island = &self.islands[i_island];
            let Some((a, b)) = find_overlap(&self.model, island) else { continue };
            if iterations >= max_iterations {
                return Err(UnresolvableOverlapError {
                    iterations,
                    pending: pending.len() + 1,
                });
            }
            iterations += 1;
            let (i_edge, new_root) = demotion_candidate(&self.model, island, a, b);
            log::debug!(
                "faces {:?} and {:?} overlap, cutting edge {:?}",
                island.faces[a].face, island.faces[b].face, i_edge
            );
            pending.extend(self.split_island(i_island, i_edge, new_root));
        }
        log::debug!("overlaps resolved with {iterations} re-cut(s)");
        Ok(())
    }

    // The part hanging from `i_edge` becomes a new island rooted at `new_root`
    fn split_island(&mut self, i_island: IslandKey, i_edge: EdgeIndex, new_root: FaceIndex) -> [IslandKey; 2] {
        self.edges[usize::from(i_edge)] = EdgeStatus::Cut(FlapSide::False);
        self.fold_rank[usize::from(i_edge)] = u32::MAX;

        let root = self.islands[i_island].root_face();
        let old_part = self.unfold_island(root);
        let new_part = self.unfold_island(new_root);
        self.islands[i_island] = old_part;
        let i_new = self.islands.insert(new_part);
        [i_island, i_new]
    }
}

fn fold_adjacent(island: &Island, a: usize, b: usize) -> bool {
    let parent_of = |i: usize| island.faces[i].parent().map(|(_, p)| p);
    parent_of(a) == Some(b) || parent_of(b) == Some(a)
}

/// Returns the first pair of faces, by position in the island, that overlap.
pub fn find_overlap(model: &Model, island: &Island) -> Option<(usize, usize)> {
    let faces = &island.faces;
    let tris: Vec<Vec<[Vector2; 3]>> = faces.iter().map(|f| f.triangles(model).collect()).collect();
    let bboxes: Vec<_> = faces.iter().map(|f| util_3d::bounding_box_2d(f.polygon.iter().copied())).collect();

    // Sweep along X: once a box starts after the end of this one, no further box can touch it
    let mut order: Vec<usize> = (0 .. faces.len()).collect();
    order.sort_by(|&a, &b| bboxes[a].0.x.total_cmp(&bboxes[b].0.x).then(a.cmp(&b)));

    let mut found: Option<(usize, usize)> = None;
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1 ..] {
            if bboxes[j].0.x >= bboxes[i].1.x - EPSILON_2D {
                break;
            }
            if !util_3d::boxes_overlap(bboxes[i], bboxes[j], EPSILON_2D) || fold_adjacent(island, i, j) {
                continue;
            }
            let overlap = tris[i]
                .iter()
                .any(|ta| tris[j].iter().any(|tb| util_3d::convex_overlap(ta, tb, EPSILON_2D)));
            if overlap {
                let pair = (i.min(j), i.max(j));
                if found.map(|f| pair < f).unwrap_or(true) {
                    found = Some(pair);
                }
            }
        }
    }
    found
}

/// The fold with the sharpest dihedral on the tree path between two faces,
/// and the face that hangs from it.
fn demotion_candidate(model: &Model, island: &Island, a: usize, b: usize) -> (EdgeIndex, FaceIndex) {
    let to_root = |mut i: usize| {
        let mut path = vec![i];
        while let Some((_, p)) = island.faces[i].parent() {
            i = p;
            path.push(i);
        }
        path
    };
    let path_a = to_root(a);
    let path_b = to_root(b);
    // The root is in both paths
    let lca = path_a.iter().copied().find(|i| path_b.contains(i)).unwrap_or(0);

    path_a.iter()
        .take_while(|&&i| i != lca)
        .chain(path_b.iter().take_while(|&&i| i != lca))
        .filter_map(|&i| {
            let f = &island.faces[i];
            f.parent().map(|(i_edge, _)| (i_edge, f.face()))
        })
        .max_by(|(ea, _), (eb, _)| {
            let aa = model[*ea].angle().0.abs();
            let ab = model[*eb].angle().0.abs();
            // On ties the lowest index wins, so it must compare as greater
            aa.total_cmp(&ab).then_with(|| eb.cmp(ea))
        })
        .unwrap_or_else(|| {
            // Two faces of one island always have a fold between them
            let f = &island.faces[a.max(b)];
            (f.parent().map(|(e, _)| e).unwrap_or_default(), f.face())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::tests::options;
    use crate::paper::testing;

    #[test]
    fn saddle_gets_split() {
        let pc = Papercraft::unfold(testing::saddle(), options(30.0)).unwrap();
        assert!(pc.num_islands() >= 2);
        let total: usize = pc.islands().map(|(_, island)| island.faces().len()).sum();
        assert_eq!(total, 8);
        for (_, island) in pc.islands() {
            assert_eq!(find_overlap(pc.model(), island), None);
        }
    }

    #[test]
    fn budget_exhausted() {
        let opts = PaperOptions {
            max_iterations: 0,
            ..options(30.0)
        };
        match Papercraft::unfold(testing::saddle(), opts) {
            Err(UnfoldError::UnresolvableOverlap(e)) => {
                assert_eq!(e.iterations, 0);
                assert!(e.pending >= 1);
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("the saddle cannot be unfolded without re-cuts"),
        }
    }

    #[test]
    fn cube_needs_no_cuts() {
        let pc = Papercraft::unfold(testing::cube(1.0), options(10.0)).unwrap();
        let (_, island) = pc.islands().next().unwrap();
        assert_eq!(find_overlap(pc.model(), island), None);
    }

    #[test]
    fn demotes_a_fold_on_the_path() {
        let mut pc = Papercraft::unfold(testing::saddle(), options(30.0)).unwrap();
        // Fold everything but the spoke to rim vertex 1: a strip of 480 degrees
        let spoke = (VertexIndex::from(0), VertexIndex::from(1));
        for (i_edge, edge) in pc.model.edges() {
            let i = usize::from(i_edge);
            if edge.is_boundary() || edge.vertices() == spoke || edge.vertices() == (spoke.1, spoke.0) {
                continue;
            }
            pc.edges[i] = EdgeStatus::Fold;
            pc.fold_rank[i] = i as u32;
        }
        let island = pc.unfold_island(FaceIndex::from(0));
        assert_eq!(island.faces().len(), 8);
        let (a, b) = find_overlap(pc.model(), &island).expect("the strip overlaps");
        assert!(a < b);

        let (i_edge, hanging) = demotion_candidate(pc.model(), &island, a, b);
        assert!(pc.edge_status(i_edge).is_fold());
        let f = island.unfolded_face(hanging).unwrap();
        assert_eq!(f.parent().map(|(e, _)| e), Some(i_edge));
    }
}
