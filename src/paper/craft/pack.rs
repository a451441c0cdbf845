use std::f32::consts::FRAC_PI_2;

use super::*;

// Float slack when checking that something fits, in mm
const FIT_EPSILON: f32 = 1e-4;

/// A printed page, with its islands in placement order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    islands: Vec<IslandKey>,
}

impl Page {
    pub fn islands(&self) -> &[IslandKey] {
        &self.islands
    }
}

#[derive(Debug, Clone)]
struct Shelf {
    y: f32,
    height: f32,
    // Where the next island goes
    x: f32,
}

#[derive(Debug, Clone, Default)]
struct PageShelves {
    shelves: Vec<Shelf>,
}

impl PageShelves {
    fn next_y(&self, spacing: f32) -> f32 {
        self.shelves.last().map(|s| s.y + s.height + spacing).unwrap_or(0.0)
    }
}

struct Placement {
    page: usize,
    shelf: usize,
    rotated: bool,
}

/// Rotation that minimizes the bounding box of the island, among the directions of its edges.
fn best_orientation(island: &Island) -> Rad<f32> {
    // Many edges share a direction, each one is tried once
    let mut angles: Vec<f32> = island.faces
        .iter()
        .flat_map(|f| {
            let p = &f.polygon;
            (0 .. p.len()).map(move |i| {
                let d = p[(i + 1) % p.len()] - p[i];
                // The box repeats every quarter turn
                let angle = (-d.y.atan2(d.x)).rem_euclid(FRAC_PI_2);
                if FRAC_PI_2 - angle < 1e-6 { 0.0 } else { angle }
            })
        })
        .collect();
    angles.sort_by(f32::total_cmp);
    angles.dedup_by(|a, b| *a - *b < 1e-6);

    let mut best: Option<(f32, Rad<f32>)> = None;
    for angle in angles {
        let (a, b) = island.bounding_box(&util_3d::rotation_matrix(Rad(angle)));
        let area = (b.x - a.x) * (b.y - a.y);
        let better = match best {
            None => true,
            Some((best_area, best_angle)) => {
                let tol = best_area * 1e-4;
                area < best_area - tol || (area <= best_area + tol && angle < best_angle.0)
            }
        };
        if better {
            best = Some((area, Rad(angle)));
        }
    }
    best.map(|(_, a)| a).unwrap_or(Rad(0.0))
}

impl Papercraft {
    /// Places every island on a page, opening new pages as needed.
    ///
    /// Islands too big for a page are left out and reported.
    pub(super) fn pack_islands(&mut self) {
        let spacing = self.options.spacing;
        let margin = self.options.margin;
        let usable = self.options.usable_size();

        for island in self.islands.values_mut() {
            let angle = best_orientation(island);
            island.mx = util_3d::rotation_matrix(angle);
            island.page = None;
        }

        let mut order: Vec<(IslandKey, f32, FaceIndex)> = self.islands
            .iter()
            .map(|(key, island)| {
                let (a, b) = island.bounding_box(&island.mx);
                (key, (b.x - a.x) * (b.y - a.y), island.root_face())
            })
            .collect();
        order.sort_by(|(_, area_a, root_a), (_, area_b, root_b)| {
            area_b.total_cmp(area_a).then_with(|| root_a.cmp(root_b))
        });

        let mut layout: Vec<PageShelves> = Vec::new();
        let mut pages: Vec<Page> = Vec::new();

        for (i_island, _, _) in order {
            let island = &self.islands[i_island];
            let (a, b) = island.bounding_box(&island.mx);
            let size = b - a;
            let fits_page = |w: f32, h: f32| w <= usable.x + FIT_EPSILON && h <= usable.y + FIT_EPSILON;
            if !fits_page(size.x, size.y) && !fits_page(size.y, size.x) {
                let error = OversizedIslandError {
                    root: usize::from(island.root_face()),
                    faces: island.faces.len(),
                    width: size.x,
                    height: size.y,
                };
                self.push_warning(Warning::OversizedIsland(error));
                continue;
            }

            let placement = (0 .. layout.len())
                .find_map(|i_page| place_in_page(&mut layout[i_page], i_page, size, usable, spacing))
                .unwrap_or_else(|| {
                    layout.push(PageShelves::default());
                    pages.push(Page::default());
                    let i_page = layout.len() - 1;
                    // It fits in an empty page, that was checked above
                    place_in_page(&mut layout[i_page], i_page, size, usable, spacing)
                        .unwrap_or(Placement { page: i_page, shelf: 0, rotated: false })
                });

            let shelf = &mut layout[placement.page].shelves[placement.shelf];
            let island = &mut self.islands[i_island];
            if placement.rotated {
                island.rotate(Rad(FRAC_PI_2));
            }
            let (a, b) = island.bounding_box(&island.mx);
            island.translate(Vector2::new(margin + shelf.x, margin + shelf.y) - a);
            island.page = Some(placement.page);
            shelf.x += b.x - a.x + spacing;
            pages[placement.page].islands.push(i_island);
        }

        self.pages = pages;
    }
}

// Picks the shelf that wastes the least height, or opens a new one.
fn place_in_page(page: &mut PageShelves, i_page: usize, size: Vector2, usable: Vector2, spacing: f32) -> Option<Placement> {
    let orientations = [(false, size), (true, Vector2::new(size.y, size.x))];

    let mut best: Option<(f32, usize, bool)> = None;
    for (i_shelf, shelf) in page.shelves.iter().enumerate() {
        for &(rotated, sz) in &orientations {
            if shelf.x + sz.x > usable.x + FIT_EPSILON || sz.y > shelf.height + FIT_EPSILON {
                continue;
            }
            let waste = shelf.height - sz.y;
            if best.map(|(w, _, _)| waste < w).unwrap_or(true) {
                best = Some((waste, i_shelf, rotated));
            }
        }
    }
    if let Some((_, shelf, rotated)) = best {
        return Some(Placement { page: i_page, shelf, rotated });
    }

    let y = page.next_y(spacing);
    let (rotated, sz) = orientations
        .iter()
        .copied()
        .filter(|(_, sz)| sz.x <= usable.x + FIT_EPSILON && y + sz.y <= usable.y + FIT_EPSILON)
        .min_by(|(_, a), (_, b)| a.y.total_cmp(&b.y))?;
    page.shelves.push(Shelf { y, height: sz.y, x: 0.0 });
    Some(Placement { page: i_page, shelf: page.shelves.len() - 1, rotated })
}
