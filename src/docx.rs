//! DOCX package I/O.
//!
//! A package is kept as the ordered list of zip entries so everything we do
//! not touch is written back byte-for-byte. Helpers cover the parts the
//! generator edits: the main document, its relationships, and content types.

use crate::document::Document;
use crate::xml::{self, Element, Node, XmlError};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// MIME type of generated documents.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a valid DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("{part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },
    #[error("missing part {0}")]
    MissingPart(String),
}

/// An opened `.docx` archive.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Read every zip entry in archive order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        Ok(Self { entries })
    }

    /// Smallest valid package around `doc`.
    pub fn minimal(doc: &Document) -> Self {
        let content_types = format!(
            "{}\r\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
</Types>",
            xml::XML_DECLARATION
        );
        let root_rels = format!(
            "{}\r\n<Relationships xmlns=\"{}\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
</Relationships>",
            xml::XML_DECLARATION,
            RELS_NS
        );
        let doc_rels = format!(
            "{}\r\n<Relationships xmlns=\"{}\"/>",
            xml::XML_DECLARATION,
            RELS_NS
        );
        Self {
            entries: vec![
                (CONTENT_TYPES_PART.to_string(), content_types.into_bytes()),
                ("_rels/.rels".to_string(), root_rels.into_bytes()),
                (DOCUMENT_PART.to_string(), doc.to_xml().into_bytes()),
                (DOCUMENT_RELS_PART.to_string(), doc_rels.into_bytes()),
            ],
        }
    }

    /// Serialize back to a zip. Media entries are STORED, everything else
    /// DEFLATED, matching the layout Word writes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)?;
            zip.write_all(data)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    fn part_xml(&self, name: &str) -> Result<xml::XmlDocument, PackageError> {
        let data = self
            .part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;
        xml::parse(&String::from_utf8_lossy(data)).map_err(|source| PackageError::Xml {
            part: name.to_string(),
            source,
        })
    }

    /// Replace a part, or append it if new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }

    pub fn document(&self) -> Result<Document, PackageError> {
        let data = self
            .part(DOCUMENT_PART)
            .ok_or_else(|| PackageError::MissingPart(DOCUMENT_PART.to_string()))?;
        Document::parse(&String::from_utf8_lossy(data)).map_err(|source| PackageError::Xml {
            part: DOCUMENT_PART.to_string(),
            source,
        })
    }

    pub fn set_document(&mut self, doc: &Document) {
        self.set_part(DOCUMENT_PART, doc.to_xml().into_bytes());
    }

    /// `(id, type, target)` for each relationship of the main document.
    pub fn relationships(&self) -> Result<Vec<(String, String, String)>, PackageError> {
        if self.part(DOCUMENT_RELS_PART).is_none() {
            return Ok(Vec::new());
        }
        let rels = self.part_xml(DOCUMENT_RELS_PART)?;
        Ok(rels
            .root
            .elements()
            .filter(|e| e.name == "Relationship")
            .filter_map(|e| {
                Some((
                    e.attr("Id")?.to_string(),
                    e.attr("Type")?.to_string(),
                    e.attr("Target")?.to_string(),
                ))
            })
            .collect())
    }

    /// Store an image under `word/media/`, relate it to the main document and
    /// register its content type. Returns the new relationship id.
    pub fn add_image(
        &mut self,
        data: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> Result<String, PackageError> {
        let mut rels = if self.part(DOCUMENT_RELS_PART).is_some() {
            self.part_xml(DOCUMENT_RELS_PART)?
        } else {
            xml::XmlDocument {
                declaration: true,
                root: Element::new("Relationships").with_attr("xmlns", RELS_NS),
            }
        };

        let next_id = rels
            .root
            .elements()
            .filter_map(|e| e.attr("Id"))
            .filter_map(|id| id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let rel_id = format!("rId{}", next_id);

        let mut index = 1;
        let media_name = loop {
            let candidate = format!("media/image{}.{}", index, extension);
            if self.part(&format!("word/{}", candidate)).is_none() {
                break candidate;
            }
            index += 1;
        };

        rels.root.children.push(Node::Element(
            Element::new("Relationship")
                .with_attr("Id", rel_id.as_str())
                .with_attr("Type", IMAGE_REL_TYPE)
                .with_attr("Target", media_name.as_str()),
        ));
        self.set_part(DOCUMENT_RELS_PART, rels.to_xml().into_bytes());

        let mut types = self.part_xml(CONTENT_TYPES_PART)?;
        let registered = types.root.elements().any(|e| {
            e.name == "Default"
                && e.attr("Extension")
                    .is_some_and(|x| x.eq_ignore_ascii_case(extension))
        });
        if !registered {
            types.root.children.insert(
                0,
                Node::Element(
                    Element::new("Default")
                        .with_attr("Extension", extension)
                        .with_attr("ContentType", content_type),
                ),
            );
            self.set_part(CONTENT_TYPES_PART, types.to_xml().into_bytes());
        }

        self.set_part(&format!("word/{}", media_name), data);
        log::debug!("Added {} as {} ({})", media_name, rel_id, content_type);
        Ok(rel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Paragraph};

    fn sample() -> DocxPackage {
        let mut doc = Document::new();
        doc.push(Block::Paragraph(Paragraph::from_runs(["Hello <<Client Name>>"])));
        DocxPackage::minimal(&doc)
    }

    #[test]
    fn test_zip_round_trip() {
        let pkg = sample();
        let bytes = pkg.to_bytes().unwrap();
        let reopened = DocxPackage::from_bytes(&bytes).unwrap();
        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(names, pkg.part_names().collect::<Vec<_>>());
        assert_eq!(reopened.part(DOCUMENT_PART), pkg.part(DOCUMENT_PART));

        let doc = reopened.document().unwrap();
        assert_eq!(doc.paragraphs().next().unwrap().text(), "Hello <<Client Name>>");
    }

    #[test]
    fn test_add_image_registers_parts() {
        let mut pkg = sample();
        let first = pkg.add_image(vec![1, 2, 3], "png", "image/png").unwrap();
        let second = pkg.add_image(vec![4, 5], "png", "image/png").unwrap();
        assert_eq!(first, "rId1");
        assert_eq!(second, "rId2");
        assert_eq!(pkg.part("word/media/image1.png"), Some(&[1u8, 2, 3][..]));
        assert_eq!(pkg.part("word/media/image2.png"), Some(&[4u8, 5][..]));

        let rels = pkg.relationships().unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[1].2, "media/image2.png");
        assert!(rels[0].1.ends_with("/image"));

        let types = String::from_utf8(pkg.part(CONTENT_TYPES_PART).unwrap().to_vec()).unwrap();
        assert_eq!(types.matches("Extension=\"png\"").count(), 1);
    }

    #[test]
    fn test_garbage_is_not_a_package() {
        assert!(matches!(
            DocxPackage::from_bytes(b"definitely not a zip"),
            Err(PackageError::Zip(_))
        ));
        let empty = DocxPackage::default();
        assert!(matches!(empty.document(), Err(PackageError::MissingPart(_))));
    }
}
