use std::collections::VecDeque;

use super::*;

impl Papercraft {
    /// Lays flat every face reachable from `root` through fold edges.
    ///
    /// The root keeps the frame of its own plane. Every other face is hinged on
    /// the fold edge that reaches it first, breadth first, visiting the fold
    /// edges of each face in the order the spanning forest accepted them.
    pub(super) fn unfold_island(&self, root: FaceIndex) -> Island {
        let model = &self.model;
        let scale = self.options.scale;

        let mut visited = vec![false; model.num_faces()];
        let mut faces: Vec<UnfoldedFace> = Vec::new();
        let mut queue = VecDeque::new();
        visited[usize::from(root)] = true;
        queue.push_back((root, None, Matrix3::one()));

        while let Some((i_face, parent, mx)) = queue.pop_front() {
            let face = &model[i_face];
            let polygon = model
                .face_polygon(face, scale)
                .into_iter()
                .map(|p| util_3d::transform_point(&mx, p))
                .collect();
            let i_this = faces.len();
            faces.push(UnfoldedFace {
                face: i_face,
                parent,
                polygon,
            });

            let mut folds: Vec<EdgeIndex> = face
                .index_edges()
                .iter()
                .copied()
                .filter(|&i_edge| self.edge_status(i_edge).is_fold())
                .collect();
            folds.sort_by_key(|&i_edge| self.fold_rank[usize::from(i_edge)]);

            for i_edge in folds {
                let edge = &model[i_edge];
                let Some(i_next) = edge.other_face(i_face) else { continue };
                if visited[usize::from(i_next)] {
                    continue;
                }
                visited[usize::from(i_next)] = true;
                let medge = model.face_to_face_edge_matrix(scale, edge, face, &model[i_next]);
                queue.push_back((i_next, Some((i_edge, i_this)), mx * medge));
            }
        }

        let positions = faces.iter().enumerate().map(|(i, f)| (f.face, i)).collect();
        Island {
            root,
            faces,
            positions,
            flaps: Vec::new(),
            mx: Matrix3::one(),
            page: None,
        }
    }
}
