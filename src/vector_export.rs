//! SVG, PDF and JSON writers for the printable pages.

use std::io::Write;

use anyhow::Result;
use lopdf::{
    content::{Content, Operation},
    dictionary,
    xref::XrefType,
    Document, Object, StringFormat,
};

use crate::printable::{LineStyle, Primitive, PrintablePage, PrintableText, TextAlign};
use crate::util_3d::Vector2;

const FACE_COLOR: &str = "#FFFFFF";
const FLAP_COLOR: &str = "#E0E0E0";
const FLAP_COLLISION_COLOR: &str = "#FFC0C0";
const LINE_COLOR: &str = "#000000";

// Helvetica digits are all 556/1000 of an em wide
const HELVETICA_DIGIT_WIDTH: f32 = 0.556;

pub fn signature() -> String {
    format!("Created with {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Generate a single-page SVG.
pub fn generate_svg(page: &PrintablePage) -> Result<String> {
    let mut output = Vec::new();
    write_svg_page(page, &mut output)?;
    Ok(String::from_utf8(output)?)
}

/// Write a single SVG page to the given writer, one Inkscape layer per kind of primitive.
pub fn write_svg_page(page: &PrintablePage, w: &mut impl Write) -> Result<()> {
    writeln!(w, r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#)?;
    writeln!(
        w,
        r#"<svg width="{0}mm" height="{1}mm" viewBox="0 0 {0} {1}" version="1.1" xmlns="http://www.w3.org/2000/svg" xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape">"#,
        page.size.x, page.size.y
    )?;
    writeln!(w, "<!-- {} -->", signature())?;

    layer(w, "Faces", |w| {
        for p in &page.primitives {
            if let Primitive::Face { face, points } = p {
                write!(w, r#"<polygon id="face_{}" fill="{}" stroke="none" points=""#, usize::from(*face), FACE_COLOR)?;
                write_points(w, points)?;
                writeln!(w, r#""/>"#)?;
            }
        }
        Ok(())
    })?;

    layer(w, "Flaps", |w| {
        let flaps = page.lines(LineStyle::FlapOutline).map(|ps| (ps, FLAP_COLOR))
            .chain(page.lines(LineStyle::FlapCollision).map(|ps| (ps, FLAP_COLLISION_COLOR)));
        for (idx, (points, color)) in flaps.enumerate() {
            write!(
                w,
                r#"<polygon id="flap_{}" fill="{}" stroke="{}" stroke-width="0.2" points=""#,
                idx, color, LINE_COLOR
            )?;
            write_points(w, points)?;
            writeln!(w, r#""/>"#)?;
        }
        Ok(())
    })?;

    layer(w, "Fold", |w| {
        layer(w, "Mountain", |w| {
            for (idx, points) in page.lines(LineStyle::FoldMountain).enumerate() {
                write_line(w, &format!("mountain_{idx}"), points, r#"stroke-width="0.2" stroke-dasharray="3,1,0.5,1""#)?;
            }
            Ok(())
        })?;
        layer(w, "Valley", |w| {
            for (idx, points) in page.lines(LineStyle::FoldValley).enumerate() {
                write_line(w, &format!("valley_{idx}"), points, r#"stroke-width="0.2" stroke-dasharray="1,1""#)?;
            }
            Ok(())
        })
    })?;

    layer(w, "Cut", |w| {
        for (idx, points) in page.lines(LineStyle::Cut).enumerate() {
            write_line(w, &format!("cut_{idx}"), points, r#"stroke-width="0.3""#)?;
        }
        Ok(())
    })?;

    layer(w, "Text", |w| {
        for text in page.texts() {
            write_svg_text(w, text)?;
        }
        Ok(())
    })?;

    writeln!(w, r#"</svg>"#)?;
    Ok(())
}

fn layer<W: Write>(w: &mut W, name: &str, f: impl FnOnce(&mut W) -> Result<()>) -> Result<()> {
    writeln!(w, r#"<g inkscape:label="{0}" inkscape:groupmode="layer" id="{0}">"#, name)?;
    f(w)?;
    writeln!(w, r#"</g>"#)?;
    Ok(())
}

fn write_points(w: &mut impl Write, points: &[Vector2]) -> Result<()> {
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            write!(w, " ")?;
        }
        write!(w, "{},{}", p.x, p.y)?;
    }
    Ok(())
}

fn write_line(w: &mut impl Write, id: &str, points: &[Vector2], style: &str) -> Result<()> {
    write!(w, r#"<path id="{}" fill="none" stroke="{}" {} d="M "#, id, LINE_COLOR, style)?;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            write!(w, " L ")?;
        }
        write!(w, "{},{}", p.x, p.y)?;
    }
    writeln!(w, r#""/>"#)?;
    Ok(())
}

fn write_svg_text(w: &mut impl Write, text: &PrintableText) -> Result<()> {
    let anchor = match text.align {
        TextAlign::Center => "text-anchor:middle;",
    };
    let angle_deg = text.angle.0.to_degrees();
    if angle_deg.abs() < 0.01 {
        writeln!(
            w,
            r#"<text x="{}" y="{}" style="{}font-size:{}px;font-family:sans-serif;fill:#000000">{}</text>"#,
            text.pos.x, text.pos.y, anchor, text.size, html_escape(&text.text)
        )?;
    } else {
        writeln!(
            w,
            r#"<text x="{}" y="{}" style="{}font-size:{}px;font-family:sans-serif;fill:#000000" transform="rotate({} {} {})">{}</text>"#,
            text.pos.x, text.pos.y, anchor, text.size, angle_deg, text.pos.x, text.pos.y, html_escape(&text.text)
        )?;
    }
    Ok(())
}

/// Simple HTML escaping for text content.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The primitives themselves, pretty printed.
pub fn generate_json(pages: &[PrintablePage]) -> Result<String> {
    Ok(serde_json::to_string_pretty(pages)?)
}

/// Generate a PDF document, one PDF page per printable page.
pub fn generate_pdf(pages: &[PrintablePage], title: &str) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.4");
    doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;

    let id_pages = doc.new_object_id();

    let id_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = vec![];
    for page in pages {
        let ops = generate_pdf_page_ops(page);
        let content = Content { operations: ops };
        let id_content = doc.add_object(lopdf::Stream::new(dictionary! {}, content.encode()?));
        let id_resources = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => id_font,
            },
        });
        let id_page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => id_pages,
            "Contents" => id_content,
            "Resources" => id_resources,
            "MediaBox" => vec![
                0.into(), 0.into(),
                mm_to_pt(page.size.x).into(), mm_to_pt(page.size.y).into()
            ],
        });
        kids.push(id_page.into());
    }

    let pdf_pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i32,
        "Kids" => kids,
    };
    doc.set_object(id_pages, pdf_pages);

    let id_catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => id_pages,
    });
    doc.trailer.set("Root", id_catalog);

    let date = time::OffsetDateTime::now_utc();
    let s_date = format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}Z",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
    );

    let id_info = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Creator" => Object::string_literal(signature()),
        "CreationDate" => Object::string_literal(s_date.clone()),
        "ModDate" => Object::string_literal(s_date),
    });
    doc.trailer.set("Info", id_info);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    log::debug!("PDF with {} page(s), {} bytes", pages.len(), buffer.len());
    Ok(buffer)
}

fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

fn generate_pdf_page_ops(page: &PrintablePage) -> Vec<Operation> {
    // PDF Y-coordinate is from bottom
    let page_height = page.size.y;
    let pdf_pt = |p: Vector2| -> Vec<Object> { vec![mm_to_pt(p.x).into(), mm_to_pt(page_height - p.y).into()] };
    let path = |ops: &mut Vec<Operation>, points: &[Vector2]| {
        for (i, p) in points.iter().enumerate() {
            ops.push(Operation::new(if i == 0 { "m" } else { "l" }, pdf_pt(*p)));
        }
    };

    let mut ops: Vec<Operation> = Vec::new();

    ops.push(Operation::new("rg", vec![1.into(), 1.into(), 1.into()]));
    for p in &page.primitives {
        if let Primitive::Face { points, .. } = p {
            path(&mut ops, points);
            ops.push(Operation::new("f", vec![]));
        }
    }

    ops.push(Operation::new("RG", vec![0.into(), 0.into(), 0.into()]));
    ops.push(Operation::new("w", vec![mm_to_pt(0.2).into()]));
    for (style, color) in [(LineStyle::FlapOutline, [0.88f32, 0.88, 0.88]), (LineStyle::FlapCollision, [1.0, 0.75, 0.75])] {
        ops.push(Operation::new("rg", color.into_iter().map(Object::from).collect()));
        for points in page.lines(style) {
            path(&mut ops, points);
            // Close, fill and stroke
            ops.push(Operation::new("b", vec![]));
        }
    }

    for (style, dash) in [
        (LineStyle::FoldMountain, vec![3, 1, 1, 1]),
        (LineStyle::FoldValley, vec![1, 1]),
        (LineStyle::Cut, vec![]),
    ] {
        let dash: Vec<Object> = dash.into_iter().map(|d| mm_to_pt(d as f32).into()).collect();
        ops.push(Operation::new("d", vec![dash.into(), 0.into()]));
        let width = if style == LineStyle::Cut { 0.3 } else { 0.2 };
        ops.push(Operation::new("w", vec![mm_to_pt(width).into()]));
        for points in page.lines(style) {
            path(&mut ops, points);
            ops.push(Operation::new("S", vec![]));
        }
    }
    ops.push(Operation::new("d", vec![Vec::<Object>::new().into(), 0.into()]));

    let texts: Vec<_> = page.texts().collect();
    if !texts.is_empty() {
        ops.push(Operation::new("rg", vec![0.into(), 0.into(), 0.into()]));
        ops.push(Operation::new("BT", Vec::new()));
        for text in texts {
            let size = mm_to_pt(text.size);
            ops.push(Operation::new("Tf", vec!["F1".into(), size.into()]));

            // The page is upside down in PDF, so is the angle
            let (s, c) = (-text.angle.0).sin_cos();
            let width = text.text.chars().count() as f32 * text.size * HELVETICA_DIGIT_WIDTH;
            let shift = match text.align {
                TextAlign::Center => width / 2.0,
            };
            let origin = text.pos - Vector2::new(text.angle.0.cos(), text.angle.0.sin()) * shift;
            let mut m = vec![c.into(), s.into(), (-s).into(), c.into()];
            m.extend(pdf_pt(origin));
            ops.push(Operation::new("Tm", m));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(text.text.clone().into_bytes(), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", Vec::new()));
    }
    ops
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::paper::{testing, PaperOptions, Papercraft};
    use crate::printable::export_pages;

    fn cube_pages() -> Vec<PrintablePage> {
        let options = PaperOptions {
            scale: 30.0,
            ..PaperOptions::default()
        };
        let pc = Papercraft::unfold(testing::cube(1.0), options).unwrap();
        export_pages(&pc)
    }

    #[test]
    fn svg_layers() {
        let pages = cube_pages();
        let svg = generate_svg(&pages[0]).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(r#"width="210mm" height="297mm" viewBox="0 0 210 297""#));

        let re_layer = Regex::new(r#"<g inkscape:label="([A-Za-z]+)" inkscape:groupmode="layer""#).unwrap();
        let layers: Vec<_> = re_layer.captures_iter(&svg).map(|c| c[1].to_owned()).collect();
        assert_eq!(layers, ["Faces", "Flaps", "Fold", "Mountain", "Valley", "Cut", "Text"]);
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());

        assert_eq!(Regex::new(r#"<polygon id="face_\d+""#).unwrap().find_iter(&svg).count(), 6);
        assert_eq!(Regex::new(r#"<polygon id="flap_\d+""#).unwrap().find_iter(&svg).count(), 7);
        assert_eq!(Regex::new(r#"<path id="valley_\d+""#).unwrap().find_iter(&svg).count(), 12);
        assert_eq!(Regex::new(r#"<path id="cut_\d+""#).unwrap().find_iter(&svg).count(), 7);
    }

    #[test]
    fn svg_points_inside_page() {
        let pages = cube_pages();
        let svg = generate_svg(&pages[0]).unwrap();
        let re_poly = Regex::new(r#"points="([^"]+)""#).unwrap();
        for cap in re_poly.captures_iter(&svg) {
            for pair in cap[1].split(' ') {
                let coords: Vec<f32> = pair.split(',').map(|c| c.parse().unwrap()).collect();
                assert_eq!(coords.len(), 2);
                assert!(coords[0] >= 0.0 && coords[0] <= 210.0, "{pair}");
                assert!(coords[1] >= 0.0 && coords[1] <= 297.0, "{pair}");
            }
        }
    }

    #[test]
    fn svg_text_is_escaped() {
        assert_eq!(html_escape(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
        let re_text = Regex::new(r#"<text [^>]*transform="rotate\(([-0-9.e]+) "#).unwrap();
        let svg = generate_svg(&cube_pages()[0]).unwrap();
        // Labels follow their edges, some of them are turned
        assert!(re_text.captures_iter(&svg).count() > 0);
    }

    #[test]
    fn pdf_is_well_formed() {
        let pages = cube_pages();
        let pdf = generate_pdf(&pages, "cube").unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4"));
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), pages.len());
    }

    #[test]
    fn json_has_every_page() {
        let pages = cube_pages();
        let json = generate_json(&pages).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), pages.len());
    }
}
