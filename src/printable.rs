//! Draw commands for the printed pages.
//!
//! Everything here is a pure function of the finished `Papercraft`: the writers in
//! `vector_export` only serialize these primitives.

use cgmath::{prelude::*, Deg, Rad};
use serde::Serialize;

use crate::paper::{outward_normal, EdgeIndex, EdgeStatus, FaceIndex, Island, Papercraft};
use crate::util_3d::{self, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Cut,
    FoldMountain,
    FoldValley,
    FlapOutline,
    /// A flap that overlaps something, drawn anyway.
    FlapCollision,
}

impl LineStyle {
    // Convex edges fold away from the printed side
    fn fold(angle: Rad<f32>) -> LineStyle {
        if angle.0.is_sign_negative() {
            LineStyle::FoldValley
        } else {
            LineStyle::FoldMountain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    EdgeLabel,
    PageNumber,
}

/// A text element. `pos` is on the baseline, `angle` turns it clockwise on the page.
#[derive(Debug, Clone, Serialize)]
pub struct PrintableText {
    pub kind: TextKind,
    pub size: f32,
    pub pos: Vector2,
    pub angle: Rad<f32>,
    pub align: TextAlign,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    PageBoundary { size: Vector2 },
    Face { face: FaceIndex, points: Vec<Vector2> },
    /// An open polyline.
    Line { style: LineStyle, edge: EdgeIndex, points: Vec<Vector2> },
    Text(PrintableText),
}

/// One page, in millimetres, with the origin at the top-left corner and Y down.
#[derive(Debug, Clone, Serialize)]
pub struct PrintablePage {
    pub page: usize,
    pub size: Vector2,
    pub primitives: Vec<Primitive>,
}

impl PrintablePage {
    pub fn texts(&self) -> impl Iterator<Item = &PrintableText> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text(t) => Some(t),
            _ => None,
        })
    }
    pub fn lines(&self, style: LineStyle) -> impl Iterator<Item = &[Vector2]> {
        self.primitives.iter().filter_map(move |p| match p {
            Primitive::Line { style: s, points, .. } if *s == style => Some(points.as_slice()),
            _ => None,
        })
    }
}

// Primitives of one page, kept apart by kind so that they come out in layer order
#[derive(Default)]
struct PageBuilder {
    faces: Vec<Primitive>,
    flaps: Vec<Primitive>,
    folds: Vec<Primitive>,
    cuts: Vec<Primitive>,
    texts: Vec<Primitive>,
}

pub fn export_pages(papercraft: &Papercraft) -> Vec<PrintablePage> {
    let options = papercraft.options();
    let page_size = options.page_size();
    let page_count = papercraft.pages().len();

    let mut res = Vec::with_capacity(page_count);
    for (i_page, page) in papercraft.pages().iter().enumerate() {
        let mut builder = PageBuilder::default();
        for &i_island in page.islands() {
            if let Some(island) = papercraft.island_by_key(i_island) {
                add_island(papercraft, island, &mut builder);
            }
        }
        if options.show_page_number {
            let size = options.label_font_size * 1.2;
            builder.texts.push(Primitive::Text(PrintableText {
                kind: TextKind::PageNumber,
                size,
                pos: Vector2::new(page_size.x / 2.0, (page_size.y - options.margin + size).min(page_size.y - size)),
                angle: Rad(0.0),
                align: TextAlign::Center,
                text: format!("{}/{}", i_page + 1, page_count),
            }));
        }

        let PageBuilder { faces, flaps, folds, cuts, texts } = builder;
        let mut primitives = vec![Primitive::PageBoundary { size: page_size }];
        primitives.extend(faces);
        primitives.extend(flaps);
        primitives.extend(folds);
        primitives.extend(cuts);
        primitives.extend(texts);
        log::debug!("page {} has {} primitives", i_page + 1, primitives.len());
        res.push(PrintablePage {
            page: i_page,
            size: page_size,
            primitives,
        });
    }
    res
}

fn add_island(papercraft: &Papercraft, island: &Island, builder: &mut PageBuilder) {
    let model = papercraft.model();
    let options = papercraft.options();
    let hidden_angle = Rad::from(Deg(options.hidden_line_angle));
    let mx = island.matrix();

    for uf in island.faces() {
        let i_face = uf.face();
        let face = &model[i_face];
        let points: Vec<Vector2> = uf.polygon().iter().map(|p| util_3d::transform_point(&mx, *p)).collect();

        for (i, (_, _, i_edge)) in face.vertices_with_edges().enumerate() {
            let edge = &model[i_edge];
            let p0 = points[i];
            let p1 = points[(i + 1) % points.len()];
            let this_side = edge.face_sign(i_face);
            let line = |style| Primitive::Line { style, edge: i_edge, points: vec![p0, p1] };

            match papercraft.edge_status(i_edge) {
                EdgeStatus::Fold => {
                    // Both faces are here, draw it once
                    if this_side || edge.angle().0.abs() < hidden_angle.0 {
                        continue;
                    }
                    builder.folds.push(line(LineStyle::fold(edge.angle())));
                }
                EdgeStatus::Cut(side) => {
                    // The base of a flap is folded, not cut
                    if side.sign() == Some(this_side) {
                        builder.folds.push(line(LineStyle::fold(edge.angle())));
                    } else {
                        builder.cuts.push(line(LineStyle::Cut));
                    }
                    if let Some(id) = papercraft.edge_id(i_edge) {
                        builder.texts.push(Primitive::Text(edge_label(&points, p0, p1, options.label_font_size, id.to_string())));
                    }
                }
            }
        }

        builder.faces.push(Primitive::Face { face: i_face, points });
    }

    for flap in island.flaps() {
        let points = flap.polygon().iter().map(|p| util_3d::transform_point(&mx, *p)).collect();
        let style = if flap.has_collision() { LineStyle::FlapCollision } else { LineStyle::FlapOutline };
        builder.flaps.push(Primitive::Line {
            style,
            edge: flap.edge(),
            points,
        });
    }
}

// Centered on the edge, just inside the face, readable from the inside
fn edge_label(face: &[Vector2], p0: Vector2, p1: Vector2, size: f32, text: String) -> PrintableText {
    let d = p1 - p0;
    let inward = -outward_normal(face, p0, p1);
    let mut angle = Rad(d.y.atan2(d.x));
    // Text must have the inside of the face above its baseline
    let up = Vector2::new(angle.0.sin(), -angle.0.cos());
    if up.dot(inward) < 0.0 {
        angle += Rad::turn_div_2();
    }
    PrintableText {
        kind: TextKind::EdgeLabel,
        size,
        pos: (p0 + p1) / 2.0 + inward * (size * 0.3),
        angle,
        align: TextAlign::Center,
        text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::paper::{testing, PaperOptions};

    fn cube_pages(scale: f32, hidden_line_angle: f32) -> Vec<PrintablePage> {
        let options = PaperOptions {
            scale,
            hidden_line_angle,
            ..PaperOptions::default()
        };
        let pc = Papercraft::unfold(testing::cube(1.0), options).unwrap();
        export_pages(&pc)
    }

    #[test]
    fn labels_come_in_pairs() {
        let pages = cube_pages(30.0, 0.0);
        assert_eq!(pages.len(), 1);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for t in pages[0].texts().filter(|t| t.kind == TextKind::EdgeLabel) {
            *counts.entry(t.text.clone()).or_default() += 1;
        }
        assert_eq!(counts.len(), 7);
        assert!(counts.values().all(|&n| n == 2), "{counts:?}");
        let page_numbers: Vec<_> = pages[0].texts().filter(|t| t.kind == TextKind::PageNumber).collect();
        assert_eq!(page_numbers.len(), 1);
        assert_eq!(page_numbers[0].text, "1/1");
    }

    #[test]
    fn cube_lines() {
        let pages = cube_pages(30.0, 0.0);
        let page = &pages[0];
        // 5 folds plus the bases of 7 flaps
        assert_eq!(page.lines(LineStyle::FoldValley).count(), 12);
        assert_eq!(page.lines(LineStyle::FoldMountain).count(), 0);
        assert_eq!(page.lines(LineStyle::Cut).count(), 7);
        assert_eq!(page.lines(LineStyle::FlapOutline).count(), 7);
        assert!(matches!(page.primitives[0], Primitive::PageBoundary { .. }));

        // Flat enough folds are not drawn, flap bases are
        let pages = cube_pages(30.0, 100.0);
        assert_eq!(pages[0].lines(LineStyle::FoldValley).count(), 7);
    }

    #[test]
    fn unit_cube_area() {
        let pages = cube_pages(1.0, 0.0);
        let area: f32 = pages
            .iter()
            .flat_map(|p| p.primitives.iter())
            .filter_map(|p| match p {
                Primitive::Face { points, .. } => Some(util_3d::signed_area(points).abs()),
                _ => None,
            })
            .sum();
        assert!((area - 6.0).abs() < 1e-3, "{area}");
    }

    #[test]
    fn everything_inside_the_page() {
        let pages = cube_pages(30.0, 0.0);
        for page in &pages {
            for p in &page.primitives {
                let points = match p {
                    Primitive::Face { points, .. } | Primitive::Line { points, .. } => points,
                    _ => continue,
                };
                for v in points {
                    assert!(v.x >= 0.0 && v.x <= page.size.x && v.y >= 0.0 && v.y <= page.size.y);
                }
            }
        }
    }

    #[test]
    fn deterministic_output() {
        let a = serde_json::to_string(&cube_pages(30.0, 0.0)).unwrap();
        let b = serde_json::to_string(&cube_pages(30.0, 0.0)).unwrap();
        assert_eq!(a, b);
        assert!(a.contains(r#""type":"page_boundary""#));
        assert!(a.contains(r#""style":"flap_outline""#));
    }

    #[test]
    fn label_reads_from_inside() {
        let square = [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 10.0),
            Vector2::new(10.0, 10.0),
            Vector2::new(10.0, 0.0),
        ];
        let t = edge_label(&square, square[3], square[0], 2.0, "1".into());
        // Inside is +Y, so the label is upside down on the page
        assert!(t.pos.y > 0.0);
        let up = Vector2::new(t.angle.0.sin(), -t.angle.0.cos());
        assert!(up.y > 0.99);
    }
}
