//! Signature image embedding.
//!
//! Finds the first paragraph containing a token (table cells first, then the
//! body), empties it and drops in an inline picture.

use crate::docx::DocxPackage;
use crate::document::{Block, Cell, Document, Paragraph, Run, Table};
use crate::error::{GenerateError, Result};
use crate::xml::{self, Node};
use regex::Regex;
use std::io::Cursor;
use std::path::Path;

pub const SIGNATURE_TOKEN: &str = "<<Signature>>";

const EMUS_PER_INCH: f64 = 914_400.0;

/// Picture size inside a table cell, in inches.
pub const CELL_SIZE: (f64, f64) = (2.0, 0.8);
/// Picture size in a body paragraph, in inches.
pub const BODY_SIZE: (f64, f64) = (1.2, 0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Validated image bytes ready for embedding.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    bytes: Vec<u8>,
    format: ImageFormat,
    /// Pixel dimensions, known for PNG only.
    dimensions: Option<(u32, u32)>,
}

impl ImageAsset {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            let decoder = png::Decoder::new(Cursor::new(bytes.as_slice()));
            let reader = decoder
                .read_info()
                .map_err(|e| GenerateError::invalid(format!("unreadable PNG: {}", e)))?;
            let info = reader.info();
            let dimensions = Some((info.width, info.height));
            return Ok(Self {
                bytes,
                format: ImageFormat::Png,
                dimensions,
            });
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Ok(Self {
                bytes,
                format: ImageFormat::Jpeg,
                dimensions: None,
            });
        }
        Err(GenerateError::invalid("image must be PNG or JPEG"))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GenerateError::invalid(format!("cannot read image {}: {}", path.display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Cell,
    Body,
}

fn table_has(table: &Table, token: &str) -> bool {
    table.rows().flat_map(|r| r.cells()).any(|c| cell_has(c, token))
}

fn cell_has(cell: &Cell, token: &str) -> bool {
    cell.paragraphs().any(|p| p.text().contains(token))
        || cell_tables(cell).any(|t| table_has(t, token))
}

fn cell_tables(cell: &Cell) -> impl Iterator<Item = &Table> {
    cell.blocks().iter().filter_map(|b| match b {
        Block::Table(t) => Some(t),
        _ => None,
    })
}

fn find_in_table<'a>(table: &'a mut Table, token: &str) -> Option<&'a mut Paragraph> {
    table
        .rows_mut()
        .flat_map(|r| r.cells_mut())
        .find_map(|c| find_in_cell(c, token))
}

fn find_in_cell<'a>(cell: &'a mut Cell, token: &str) -> Option<&'a mut Paragraph> {
    if cell.paragraphs().any(|p| p.text().contains(token)) {
        return cell.paragraphs_mut().find(|p| p.text().contains(token));
    }
    cell.blocks_mut().iter_mut().find_map(|b| match b {
        Block::Table(t) => find_in_table(t, token),
        _ => None,
    })
}

/// First paragraph holding `token`: table cells depth first, then body paragraphs.
fn locate<'a>(doc: &'a mut Document, token: &str) -> Option<(&'a mut Paragraph, Placement)> {
    if doc.tables().any(|t| table_has(t, token)) {
        return doc
            .tables_mut()
            .find_map(|t| find_in_table(t, token))
            .map(|p| (p, Placement::Cell));
    }
    doc.paragraphs_mut()
        .find(|p| p.text().contains(token))
        .map(|p| (p, Placement::Body))
}

fn next_drawing_id(doc: &Document) -> u32 {
    lazy_static::lazy_static! {
        static ref DOC_PR_ID: Regex = Regex::new(r#"<wp:docPr\b[^>]*?\sid="(\d+)""#).unwrap();
    }
    DOC_PR_ID
        .captures_iter(&doc.to_xml())
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

fn emu(inches: f64) -> i64 {
    (inches * EMUS_PER_INCH).round() as i64
}

fn drawing_xml(rel_id: &str, id: u32, (width, height): (f64, f64)) -> String {
    let (cx, cy) = (emu(width), emu(height));
    format!(
        concat!(
            r#"<w:drawing xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Signature {id}"/>"#,
            r#"<wp:cNvGraphicFramePr/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Signature {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
        ),
        cx = cx,
        cy = cy,
        id = id,
        rel = rel_id,
    )
}

/// Replace the first paragraph containing `token` with the image.
///
/// Nothing in `doc` or `package` is touched when the token is absent.
pub fn embed_image(
    doc: &mut Document,
    package: &mut DocxPackage,
    token: &str,
    asset: &ImageAsset,
) -> Result<()> {
    let drawing_id = next_drawing_id(doc);
    let Some((paragraph, placement)) = locate(doc, token) else {
        return Err(GenerateError::PlaceholderNotFound(token.to_string()));
    };

    let size = match placement {
        Placement::Cell => CELL_SIZE,
        Placement::Body => BODY_SIZE,
    };
    let rel_id = package
        .add_image(
            asset.bytes.clone(),
            asset.format.extension(),
            asset.format.content_type(),
        )
        .map_err(GenerateError::edit)?;
    let drawing =
        xml::parse_fragment(&drawing_xml(&rel_id, drawing_id, size)).map_err(GenerateError::edit)?;

    paragraph.clear();
    let mut run = Run::new("");
    run.push(Node::Element(drawing));
    paragraph.push_run(run);

    log::debug!(
        "Embedded {} image for {} as {} ({:?})",
        asset.format.extension(),
        token,
        rel_id,
        placement
    );
    Ok(())
}
