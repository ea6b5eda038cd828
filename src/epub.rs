//! EPUB container reading.
//!
//! Opens the zip archive, follows `META-INF/container.xml` to the package
//! document, and loads every spine document into memory together with the
//! navigation document (EPUB 3 nav, or the EPUB 2 NCX as a fallback).

use crate::corpus::{id_candidates, Corpus, Document};
use crate::extract::html_to_text;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid EPUB: {0}")]
    InvalidEpub(String),
    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: String },
}

/// An EPUB loaded fully into memory.
#[derive(Debug)]
pub struct EpubBook {
    documents: Vec<Document>,
    index: HashMap<String, usize>,
    navigation: String,
}

impl EpubBook {
    /// Read an EPUB file from disk
    pub fn open(path: &Path) -> Result<Self, CorpusError> {
        info!(path = %path.display(), "Reading EPUB");
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read an EPUB from any [`Read`] + [`Seek`] source
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, CorpusError> {
        let mut archive = ZipArchive::new(reader)?;

        let opf_path = find_opf_path(&mut archive)?;
        let opf_dir = Path::new(&opf_path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        let opf_content = read_archive_file(&mut archive, &opf_path)?;
        let package = parse_opf(&opf_content)?;

        let mut documents = Vec::with_capacity(package.spine_ids.len());
        let mut index = HashMap::new();
        for idref in &package.spine_ids {
            let item = package.manifest.get(idref).ok_or_else(|| {
                CorpusError::InvalidEpub(format!("spine references unknown manifest item {idref}"))
            })?;
            let content = read_archive_file(&mut archive, &resolve_path(&opf_dir, &item.href))?;
            let position = documents.len();
            index.entry(item.href.clone()).or_insert(position);
            documents.push(Document {
                id: item.href.clone(),
                position,
                content,
            });
        }

        let navigation = match package.navigation_href() {
            Some(href) => read_archive_file(&mut archive, &resolve_path(&opf_dir, href))?,
            None => {
                warn!("EPUB has no navigation document");
                String::new()
            }
        };

        debug!(
            documents = documents.len(),
            navigation_chars = navigation.len(),
            "Loaded EPUB"
        );
        Ok(Self {
            documents,
            index,
            navigation,
        })
    }

    /// Spine documents in reading order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Look up a document by id, tolerating fragments and percent-encoding
    pub fn document(&self, id: &str) -> Option<&Document> {
        id_candidates(id)
            .iter()
            .find_map(|candidate| self.index.get(&**candidate))
            .map(|&position| &self.documents[position])
    }
}

impl Corpus for EpubBook {
    fn reading_order(&self) -> Vec<&str> {
        self.documents.iter().map(|doc| doc.id.as_str()).collect()
    }

    fn navigation(&self) -> &str {
        &self.navigation
    }

    fn text(&self, id: &str) -> Option<String> {
        self.document(id).map(|doc| html_to_text(&doc.content))
    }
}

struct ManifestItem {
    href: String,
    media_type: String,
    properties: Option<String>,
}

struct PackageData {
    manifest: HashMap<String, ManifestItem>,
    spine_ids: Vec<String>,
    toc_id: Option<String>,
}

impl PackageData {
    /// The EPUB 3 nav document, else the NCX named by the spine, else any NCX
    fn navigation_href(&self) -> Option<&str> {
        let nav = self.manifest.values().find(|item| {
            item.properties
                .as_deref()
                .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == "nav"))
        });
        let ncx = || {
            self.toc_id
                .as_ref()
                .and_then(|id| self.manifest.get(id))
                .or_else(|| {
                    self.manifest
                        .values()
                        .find(|item| item.media_type == "application/x-dtbncx+xml")
                })
        };
        nav.or_else(ncx).map(|item| item.href.as_str())
    }
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, CorpusError> {
    let container = read_archive_file(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(CorpusError::InvalidEpub(
        "no rootfile found in container.xml".into(),
    ))
}

fn parse_opf(content: &str) -> Result<PackageData, CorpusError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut manifest = HashMap::new();
    let mut spine_ids = Vec::new();
    let mut toc_id = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"item" => {
                    let mut id = String::new();
                    let mut item = ManifestItem {
                        href: String::new(),
                        media_type: String::new(),
                        properties: None,
                    };
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).into_owned();
                        match attr.key.as_ref() {
                            b"id" => id = value,
                            b"href" => item.href = value,
                            b"media-type" => item.media_type = value,
                            b"properties" => item.properties = Some(value),
                            _ => {}
                        }
                    }
                    if !id.is_empty() {
                        manifest.insert(id, item);
                    }
                }
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"idref" {
                            spine_ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
                b"spine" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"toc" {
                            toc_id = Some(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(PackageData {
        manifest,
        spine_ids,
        toc_id,
    })
}

fn read_archive_file<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String, CorpusError> {
    let bytes = read_archive_file_bytes(archive, path)?;
    let bytes = strip_bom(&bytes);
    String::from_utf8(bytes.to_vec()).map_err(|_| CorpusError::NotUtf8 {
        path: path.to_string(),
    })
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>, CorpusError> {
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Manifest hrefs are URLs; the archive stores decoded names
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| CorpusError::InvalidEpub(format!("invalid UTF-8 in path: {path}")))?;

    let mut file = archive
        .by_name(&decoded)
        .map_err(|_| CorpusError::InvalidEpub(format!("missing archive entry: {path}")))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Join an href onto the package document's directory, resolving `..`
fn resolve_path(base: &str, href: &str) -> String {
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
