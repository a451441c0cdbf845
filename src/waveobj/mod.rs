use std::{io::BufRead, path::Path};
use anyhow::{anyhow, bail, Context, Result};

use crate::paper::{InvalidMeshError, Model};
use crate::util_3d::Vector3;

/// The geometry of a Wavefront OBJ file. Texture coordinates and normals are only counted,
/// so that faces can refer to them.
#[derive(Clone, Debug, Default)]
pub struct Obj {
    vs: Vec<Vector3>,
    num_ts: usize,
    num_ns: usize,
    faces: Vec<Vec<u32>>,
}

// OBJ indices are 1-based, negative ones count back from the last element seen
fn resolve_index(word: &str, count: usize, what: &str) -> Result<u32> {
    let idx: i64 = word.parse().with_context(|| format!("invalid {what} index '{word}'"))?;
    let resolved = match idx {
        0 => bail!("{what} index cannot be 0"),
        i if i > 0 => i - 1,
        i => count as i64 + i,
    };
    if resolved < 0 || resolved >= count as i64 {
        bail!("{what} index {idx} out of range");
    }
    Ok(resolved as u32)
}

fn parse_coords<'a, const N: usize>(words: &mut impl Iterator<Item = &'a str>) -> Result<[f32; N]> {
    let syn_error = || anyhow!("invalid obj syntax");
    let mut res = [0.0; N];
    for x in &mut res {
        *x = words.next().ok_or_else(syn_error)?.parse()?;
    }
    Ok(res)
}

impl Obj {
    pub fn from_reader<R: BufRead>(r: R) -> Result<Obj> {
        let mut data = Obj::default();
        for (n, line) in r.lines().enumerate() {
            let line = line?;
            data.parse_line(&line).with_context(|| format!("line {}", n + 1))?;
        }
        Ok(data)
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        //skip empty and comments
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else { return Ok(()) };
        match first {
            "v" => {
                // An optional W is ignored
                let [x, y, z] = parse_coords(&mut words)?;
                self.vs.push(Vector3::new(x, y, z));
            }
            "vt" => {
                let [_u] = parse_coords(&mut words)?;
                self.num_ts += 1;
            }
            "vn" => {
                let [_x, _y, _z] = parse_coords(&mut words)?;
                self.num_ns += 1;
            }
            "f" => {
                let mut verts = Vec::new();
                for fv in words {
                    let mut vals = fv.split('/');
                    let v = vals.next().unwrap_or_default();
                    verts.push(resolve_index(v, self.vs.len(), "vertex")?);
                    if let Some(t) = vals.next().filter(|t| !t.is_empty()) {
                        resolve_index(t, self.num_ts, "texture")?;
                    }
                    if let Some(n) = vals.next().filter(|n| !n.is_empty()) {
                        resolve_index(n, self.num_ns, "normal")?;
                    }
                    if vals.next().is_some() {
                        bail!("invalid face vertex '{fv}'");
                    }
                }
                self.faces.push(verts);
            }
            // All the objects and groups are combined into one mesh.
            // Fortunately the numbering of vertices is global to the file, so nothing to do here.
            "o" | "g" | "s" | "usemtl" | "mtllib" | "l" | "p" => {}
            p => {
                log::debug!("unknown obj statement '{p}'");
            }
        }
        Ok(())
    }

    pub fn num_vertices(&self) -> usize {
        self.vs.len()
    }
    pub fn faces(&self) -> &[Vec<u32>] {
        &self.faces
    }
    pub fn into_model(self) -> Result<Model, InvalidMeshError> {
        Model::from_polygons(self.vs, &self.faces)
    }
}

/// Reads and validates a mesh from an OBJ file.
pub fn load_model(file_name: &Path) -> Result<Model> {
    let f = std::fs::File::open(file_name)
        .with_context(|| format!("cannot open {}", file_name.display()))?;
    let f = std::io::BufReader::new(f);
    let obj = Obj::from_reader(f).with_context(|| format!("reading {}", file_name.display()))?;
    log::debug!("{}: {} vertices, {} faces", file_name.display(), obj.num_vertices(), obj.faces().len());
    let model = obj.into_model()?;
    Ok(model)
}
