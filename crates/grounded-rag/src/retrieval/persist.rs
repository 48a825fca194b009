//! Versioned on-disk index format
//!
//! Layout (little-endian):
//!
//! ```text
//! magic "GRIX" | version u16 | metric u8 | reserved u8 | dimension u32 |
//! entry_count u64 | payload_len u64 | sha256(payload) [32] | payload
//! ```
//!
//! The payload is the bincode (serde, standard config) encoding of the
//! embedder name, build time and entries. Index files are untrusted input:
//! the header is checked against the file size before the payload is read,
//! the checksum before it is decoded, and every entry after.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::index::{IndexEntry, VectorIndex};
use super::metric::SimilarityMetric;

/// File magic
pub const MAGIC: [u8; 4] = *b"GRIX";
/// Current format version
pub const FORMAT_VERSION: u16 = 1;
/// Fixed header size in bytes
pub const HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + 8 + 8 + 32;
/// Largest payload accepted on load
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 31;

const DECODE_LIMIT: usize = 1 << 31;

/// Decoded index file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u16,
    pub metric: SimilarityMetric,
    pub dimension: u32,
    pub entry_count: u64,
    pub payload_len: u64,
    pub checksum: [u8; 32],
}

impl IndexHeader {
    fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.metric.id();
        buf[7] = 0;
        buf[8..12].copy_from_slice(&self.dimension.to_le_bytes());
        buf[12..20].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[28..60].copy_from_slice(&self.checksum);
        buf
    }

    fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self> {
        if buf[0..4] != MAGIC {
            return Err(Error::index_load("not an index file (bad magic)"));
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::index_load(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }
        let metric = SimilarityMetric::from_id(buf[6])?;
        let dimension = u32::from_le_bytes(le_array(&buf[8..12]));
        if dimension == 0 {
            return Err(Error::index_load("dimension is zero"));
        }
        let entry_count = u64::from_le_bytes(le_array(&buf[12..20]));
        let payload_len = u64::from_le_bytes(le_array(&buf[20..28]));
        let checksum = le_array(&buf[28..60]);

        Ok(Self {
            version,
            metric,
            dimension,
            entry_count,
            payload_len,
            checksum,
        })
    }

    /// Read and validate only the header of an index file
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = open(path)?;
        let header = read_header(&mut file)?;
        check_payload_len(&file, &header)?;
        Ok(header)
    }

    /// Checksum as lowercase hex
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Serialized body of an index file
#[derive(Debug, Serialize, Deserialize)]
struct IndexPayload {
    embedder: String,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

#[derive(Serialize)]
struct IndexPayloadRef<'a> {
    embedder: &'a str,
    built_at: DateTime<Utc>,
    entries: &'a [IndexEntry],
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::index_load(format!("index file not found: {}", path.display()))
        } else {
            Error::index_load(format!("cannot open {}: {}", path.display(), e))
        }
    })
}

fn read_header(file: &mut File) -> Result<IndexHeader> {
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact(&mut buf)
        .map_err(|_| Error::index_load("file too short for header"))?;
    IndexHeader::decode(&buf)
}

fn check_payload_len(file: &File, header: &IndexHeader) -> Result<()> {
    let file_len = file
        .metadata()
        .map_err(|e| Error::index_load(format!("cannot stat index file: {}", e)))?
        .len();
    let actual = file_len.saturating_sub(HEADER_LEN as u64);
    if header.payload_len != actual {
        return Err(Error::index_load(format!(
            "payload length {} does not match file ({} bytes after header)",
            header.payload_len, actual
        )));
    }
    if header.payload_len > MAX_PAYLOAD_BYTES {
        return Err(Error::index_load(format!(
            "payload of {} bytes exceeds limit",
            header.payload_len
        )));
    }
    Ok(())
}

fn validate_chunk(chunk: &Chunk) -> std::result::Result<(), String> {
    if chunk.end_offset < chunk.start_offset {
        return Err(format!(
            "chunk {}#{} has end before start",
            chunk.document_id, chunk.chunk_index
        ));
    }
    if chunk.text.chars().count() != chunk.end_offset - chunk.start_offset {
        return Err(format!(
            "chunk {}#{} text does not match its offsets",
            chunk.document_id, chunk.chunk_index
        ));
    }
    Ok(())
}

impl VectorIndex {
    /// Write the index atomically: a temp file in the target directory is
    /// synced and then renamed over `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = bincode::serde::encode_to_vec(
            IndexPayloadRef {
                embedder: &self.embedder,
                built_at: self.built_at,
                entries: &self.entries,
            },
            bincode::config::standard(),
        )
        .map_err(|e| Error::internal(format!("index encoding failed: {}", e)))?;

        let dimension = u32::try_from(self.dimension)
            .map_err(|_| Error::internal("dimension does not fit the index format"))?;

        let header = IndexHeader {
            version: FORMAT_VERSION,
            metric: self.metric,
            dimension,
            entry_count: self.entries.len() as u64,
            payload_len: payload.len() as u64,
            checksum: Sha256::digest(&payload).into(),
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&header.encode())?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            "Saved index ({} entries, {} bytes) to {}",
            self.entries.len(),
            HEADER_LEN + payload.len(),
            path.display()
        );
        Ok(())
    }

    /// Load and fully validate an index file
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = open(path)?;
        let header = read_header(&mut file)?;
        check_payload_len(&file, &header)?;

        let mut payload = Vec::with_capacity(header.payload_len as usize);
        file.read_to_end(&mut payload)
            .map_err(|e| Error::index_load(format!("cannot read payload: {}", e)))?;
        if payload.len() as u64 != header.payload_len {
            return Err(Error::index_load("payload truncated"));
        }

        let digest: [u8; 32] = Sha256::digest(&payload).into();
        if digest != header.checksum {
            return Err(Error::index_load("checksum mismatch"));
        }

        let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
        let (decoded, read): (IndexPayload, usize) =
            bincode::serde::decode_from_slice(&payload, config)
                .map_err(|e| Error::index_load(format!("payload decoding failed: {}", e)))?;
        if read != payload.len() {
            return Err(Error::index_load("trailing bytes after payload"));
        }

        if decoded.entries.len() as u64 != header.entry_count {
            return Err(Error::index_load(format!(
                "header declares {} entries, payload has {}",
                header.entry_count,
                decoded.entries.len()
            )));
        }

        let dimension = header.dimension as usize;
        for (i, entry) in decoded.entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(Error::index_load(format!(
                    "entry {} has {} components, expected {}",
                    i,
                    entry.vector.len(),
                    dimension
                )));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::index_load(format!("entry {} has non-finite components", i)));
            }
            validate_chunk(&entry.chunk).map_err(Error::index_load)?;
        }

        tracing::info!(
            "Loaded index ({} entries, {} dims, {}) from {}",
            decoded.entries.len(),
            dimension,
            header.metric,
            path.display()
        );

        Ok(Self {
            metric: header.metric,
            dimension,
            entries: decoded.entries,
            embedder: decoded.embedder,
            built_at: decoded.built_at,
        })
    }

    /// Load and require the dimension of the current embedder
    pub fn load_expecting(path: &Path, dimension: usize) -> Result<Self> {
        let index = Self::load(path)?;
        if index.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: index.dimension,
            });
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> VectorIndex {
        let entries = ["The sky is blue.", "Water is wet."]
            .iter()
            .enumerate()
            .map(|(i, text)| IndexEntry {
                chunk: Chunk {
                    document_id: "facts.txt".to_string(),
                    source_path: "facts.txt".to_string(),
                    page: None,
                    chunk_index: i,
                    start_offset: 0,
                    end_offset: text.chars().count(),
                    text: text.to_string(),
                },
                vector: vec![i as f32, 1.0, 0.5],
            })
            .collect();
        VectorIndex::from_entries(entries, SimilarityMetric::Euclidean, 3).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = IndexHeader {
            version: FORMAT_VERSION,
            metric: SimilarityMetric::DotProduct,
            dimension: 768,
            entry_count: 5,
            payload_len: 99,
            checksum: [7u8; 32],
        };
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], b"GRIX");
        assert_eq!(bytes[6], 1);
        assert_eq!(IndexHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.grix");
        let index = sample_index();

        index.save(&path).unwrap();
        let loaded = VectorIndex::load(&path).unwrap();

        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.metric(), SimilarityMetric::Euclidean);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.built_at(), index.built_at());

        let header = IndexHeader::read(&path).unwrap();
        assert_eq!(header.entry_count, 2);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.grix");
        std::fs::write(&path, b"old junk").unwrap();

        sample_index().save(&path).unwrap();
        assert_eq!(VectorIndex::load(&path).unwrap().len(), 2);
        // Only the index file remains; the temp file was renamed
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_expecting_rejects_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.grix");
        sample_index().save(&path).unwrap();

        assert!(VectorIndex::load_expecting(&path, 3).is_ok());
        assert!(matches!(
            VectorIndex::load_expecting(&path, 768),
            Err(Error::DimensionMismatch { expected: 768, actual: 3 })
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent.grix")).unwrap_err();
        assert!(matches!(err, Error::IndexLoad(ref m) if m.contains("not found")));
    }
}
