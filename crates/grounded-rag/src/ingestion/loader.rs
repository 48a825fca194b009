//! Directory document loader for text, markdown and PDF files

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::Document;

/// Anything that can produce the document set for an index build
pub trait DocumentSource: Send + Sync {
    /// Load all documents in a deterministic order
    fn load_documents(&self) -> Result<Vec<Document>>;
}

/// Supported source file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Text,
    Pdf,
}

impl SourceKind {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "text" | "md" | "markdown" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Walks a data directory recursively in sorted order.
///
/// Text files become one document each, PDFs one document per page.
/// Unreadable files and files without text are skipped with a warning.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn load_file(&self, path: &Path, kind: SourceKind) -> Result<Vec<Document>> {
        let name = self.relative_name(path);
        match kind {
            SourceKind::Text => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8_lossy(&bytes).replace('\0', "");
                if text.trim().is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![Document::new(name, None, text)])
            }
            SourceKind::Pdf => {
                let bytes = std::fs::read(path)?;
                let pages = extract_pdf_pages(&bytes)?;
                Ok(pages
                    .into_iter()
                    .filter(|(_, text)| !text.trim().is_empty())
                    .map(|(page, text)| Document::new(name.clone(), Some(page), text))
                    .collect())
            }
        }
    }
}

impl DocumentSource for DirectoryLoader {
    fn load_documents(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(Error::invalid_config(format!(
                "Data directory not found: {}",
                self.root.display()
            )));
        }

        let mut documents = Vec::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(kind) = SourceKind::from_path(entry.path()) else {
                continue;
            };

            match self.load_file(entry.path(), kind) {
                Ok(docs) if docs.is_empty() => {
                    tracing::warn!("No text extracted from {}", entry.path().display());
                    skipped += 1;
                }
                Ok(docs) => {
                    tracing::debug!("Loaded {} document(s) from {}", docs.len(), entry.path().display());
                    documents.extend(docs);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} documents from {} ({} files skipped)",
            documents.len(),
            self.root.display(),
            skipped
        );

        Ok(documents)
    }
}

/// Extract text per page. Falls back to a single whole-file page when the
/// page-level extraction yields nothing.
#[cfg(feature = "pdf")]
fn extract_pdf_pages(data: &[u8]) -> Result<Vec<(u32, String)>> {
    let mut pages = Vec::new();

    match lopdf::Document::load_mem(data) {
        Ok(doc) => {
            for page_num in doc.get_pages().keys() {
                match doc.extract_text(&[*page_num]) {
                    Ok(text) => pages.push((*page_num, clean_pdf_text(&text))),
                    Err(e) => tracing::debug!("Could not extract page {}: {}", page_num, e),
                }
            }
        }
        Err(e) => tracing::debug!("lopdf could not parse PDF: {}", e),
    }

    if pages.iter().all(|(_, text)| text.trim().is_empty()) {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::internal(format!("PDF extraction failed: {}", e)))?;
        pages = vec![(1, clean_pdf_text(&text))];
    }

    Ok(pages)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_pages(_data: &[u8]) -> Result<Vec<(u32, String)>> {
    Err(Error::invalid_config("PDF support is disabled (enable the `pdf` feature)"))
}

/// Drop null bytes, trim lines and remove blank lines
#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn clean_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
