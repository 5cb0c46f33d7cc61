//! Zip package I/O and relationship resolution.
//!
//! The package keeps every entry's bytes and compression method in archive
//! order. Writing substitutes new bytes only for the parts the caller
//! supplies, so parts the reconciler never touched are copied verbatim.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{TailorError, TailorResult};
use crate::util::atomic::atomic_write;

const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// One zip entry.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: zip::CompressionMethod,
    is_dir: bool,
}

/// A resolved relationship from one part to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Relationship type URI.
    pub kind: String,
    /// Target part name, resolved against the source part's directory.
    pub target: String,
}

/// In-memory copy of a zip-packaged document.
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    /// Read the whole package at `path` into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a zip archive.
    pub fn open(path: &Path) -> TailorResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| TailorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    /// Read a package from raw archive bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a readable zip archive.
    pub fn from_bytes(bytes: Vec<u8>) -> TailorResult<Self> {
        Self::read_archive(Cursor::new(bytes))
    }

    fn read_archive<R: Read + Seek>(reader: R) -> TailorResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)
                .map_err(|source| TailorError::Io {
                    path: file.name().into(),
                    source,
                })?;
            entries.push(Entry {
                name: file.name().to_owned(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }
        debug!(entries = entries.len(), "package read");
        Ok(Self { entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn part_bytes(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Part contents decoded as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`TailorError::MissingPart`] if the part is absent.
    pub fn part_text(&self, name: &str) -> TailorResult<String> {
        let bytes = self.part_bytes(name).ok_or_else(|| TailorError::MissingPart {
            name: name.to_owned(),
        })?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Name of the main document part, from the package relationships.
    ///
    /// # Errors
    ///
    /// Returns an error if the package relationships are malformed.
    pub fn main_part_name(&self) -> TailorResult<String> {
        let main = self
            .relationships_of(PACKAGE_RELS, "")?
            .into_iter()
            .find(|r| r.kind.ends_with(OFFICE_DOCUMENT_REL))
            .map(|r| r.target);
        Ok(main.unwrap_or_else(|| DEFAULT_MAIN_PART.to_owned()))
    }

    /// Relationships declared by `part` (e.g. `word/document.xml`).
    ///
    /// A part with no relationships part yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the relationships part is malformed.
    pub fn relationships(&self, part: &str) -> TailorResult<Vec<Relationship>> {
        let (dir, file) = match part.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", part),
        };
        let rels = if dir.is_empty() {
            format!("_rels/{file}.rels")
        } else {
            format!("{dir}/_rels/{file}.rels")
        };
        self.relationships_of(&rels, dir)
    }

    fn relationships_of(&self, rels_part: &str, base_dir: &str) -> TailorResult<Vec<Relationship>> {
        let Some(bytes) = self.part_bytes(rels_part) else {
            return Ok(Vec::new());
        };
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let doc = roxmltree::Document::parse(text).map_err(|source| TailorError::Xml {
            part: rels_part.to_owned(),
            source,
        })?;

        let rels = doc
            .root_element()
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
            .filter(|n| n.attribute("TargetMode") != Some("External"))
            .filter_map(|n| {
                Some(Relationship {
                    id: n.attribute("Id")?.to_owned(),
                    kind: n.attribute("Type").unwrap_or_default().to_owned(),
                    target: resolve_target(base_dir, n.attribute("Target")?),
                })
            })
            .collect();
        Ok(rels)
    }

    /// Atomically write the package to `path`, replacing the listed parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be written or persisted.
    pub fn write_to(&self, path: &Path, replaced: &HashMap<String, Vec<u8>>) -> TailorResult<()> {
        atomic_write(path, |file| {
            let mut zip = zip::ZipWriter::new(file);
            for entry in &self.entries {
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(writable_method(entry.compression));
                if entry.is_dir {
                    zip.add_directory(entry.name.as_str(), options)?;
                    continue;
                }
                let data = replaced.get(&entry.name).unwrap_or(&entry.data);
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(data).map_err(|source| TailorError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            zip.finish()?;
            Ok(())
        })?;
        debug!(path = %path.display(), replaced = replaced.len(), "package written");
        Ok(())
    }
}

/// Only stored and deflated are guaranteed writable; everything else is recompressed.
fn writable_method(method: zip::CompressionMethod) -> zip::CompressionMethod {
    match method {
        zip::CompressionMethod::Stored => zip::CompressionMethod::Stored,
        _ => zip::CompressionMethod::Deflated,
    }
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_owned();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn archive(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (name, body) in parts {
                zip.start_file(*name, options).expect("should start zip entry");
                zip.write_all(body.as_bytes()).expect("should write zip entry");
            }
            zip.finish().expect("should finish zip");
        }
        buf.into_inner()
    }

    /// A minimal `.docx` with `document` as its main part plus `extra` entries.
    pub(crate) fn docx_bytes(document: &str, extra: &[(&str, &str)]) -> Vec<u8> {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;
        let mut parts = vec![("_rels/.rels", rels), ("word/document.xml", document)];
        parts.extend_from_slice(extra);
        archive(&parts)
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("word", "header1.xml"), "word/header1.xml");
        assert_eq!(resolve_target("word", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(resolve_target("word", "/word/footer1.xml"), "word/footer1.xml");
    }

    #[test]
    fn test_main_part_from_package_rels() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/main.xml"/></Relationships>"#;
        let pkg = Package::from_bytes(archive(&[("_rels/.rels", rels)])).expect("should read package");
        assert_eq!(pkg.main_part_name().expect("should find main part"), "word/main.xml");
    }

    #[test]
    fn test_main_part_defaults_without_rels() {
        let pkg = Package::from_bytes(archive(&[("word/document.xml", "<x/>")])).expect("should read package");
        assert_eq!(pkg.main_part_name().expect("should find main part"), "word/document.xml");
    }

    #[test]
    fn test_part_relationships_skip_external() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#;
        let pkg = Package::from_bytes(archive(&[("word/_rels/document.xml.rels", rels)])).expect("should read package");
        let found = pkg.relationships("word/document.xml").expect("should read relationships");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "rId7");
        assert_eq!(found[0].target, "word/header1.xml");
    }

    #[test]
    fn test_write_replaces_only_listed_parts() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let out = dir.path().join("copy.docx");
        let pkg = Package::from_bytes(archive(&[("a.xml", "<a/>"), ("b.xml", "<b/>")])).expect("should read package");
        let mut replaced = HashMap::new();
        replaced.insert("b.xml".to_owned(), b"<b>new</b>".to_vec());
        pkg.write_to(&out, &replaced).expect("should write package");

        let reread = Package::open(&out).expect("should open saved package");
        assert_eq!(reread.part_bytes("a.xml").expect("should read part bytes"), b"<a/>");
        assert_eq!(reread.part_bytes("b.xml").expect("should read part bytes"), b"<b>new</b>");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::from_bytes(b"plain text".to_vec()),
            Err(TailorError::Zip(_))
        ));
    }
}
