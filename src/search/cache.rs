//! Persisted embedding cache.
//!
//! Two paired artifacts in the data directory:
//!
//! ```text
//! file_ids.json        JSON array of file identifiers, in row order
//! file_embeddings.bin  "FEMB" | u32 version | u32 rows | u32 dims
//!                      | u32 model name length | model name (UTF-8) | rows*dims f32
//! ```
//!
//! All integers and floats are little-endian. Row `i` of the matrix belongs to
//! identifier `i` of the list. A cache written by a different model, or at a
//! different dimension, is unusable and gets rebuilt. Both files are written to `.tmp` siblings and
//! renamed into place; a reader that finds them out of step treats the cache
//! as absent and the next sync rebuilds it.

use std::{
    collections::HashSet,
    fs,
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::db::models::FileRecord;
use crate::search::embedder::{check_dimension, EmbedError, Embedder};
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

pub const IDS_FILE: &str = "file_ids.json";
pub const VECTORS_FILE: &str = "file_embeddings.bin";

const MAGIC: &[u8; 4] = b"FEMB";
const FORMAT_VERSION: u32 = 2;
/// Fixed part of the header, before the model name.
const HEADER_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("identifier list: {0}")]
    Ids(#[from] serde_json::Error),
    #[error("corrupt cache: {0}")]
    Corrupt(String),
}

/// Parallel identifier list and vector matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheArtifacts {
    pub ids: Vec<i64>,
    pub vectors: Vec<Vec<f32>>,
}

impl CacheArtifacts {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub artifacts: CacheArtifacts,
    /// Texts sent to the embedder by this call.
    pub embedded: usize,
    /// True when no usable cache existed and everything was embedded.
    pub rebuilt: bool,
    /// False when the cache already covered the input and nothing was written.
    pub written: bool,
}

/// Decoded `file_embeddings.bin`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    pub model: String,
    pub dims: usize,
    pub vectors: Vec<Vec<f32>>,
}

pub fn encode_vectors(
    vectors: &[Vec<f32>],
    dims: usize,
    model: &str,
) -> Result<Vec<u8>, CacheError> {
    let rows = u32::try_from(vectors.len())
        .map_err(|_| CacheError::Corrupt(format!("{} rows exceed format limit", vectors.len())))?;
    let dims_u32 = u32::try_from(dims)
        .map_err(|_| CacheError::Corrupt(format!("dimension {dims} exceeds format limit")))?;
    let name_len = u32::try_from(model.len())
        .map_err(|_| CacheError::Corrupt("model name exceeds format limit".into()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + model.len() + vectors.len() * dims * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&rows.to_le_bytes());
    buf.extend_from_slice(&dims_u32.to_le_bytes());
    buf.extend_from_slice(&name_len.to_le_bytes());
    buf.extend_from_slice(model.as_bytes());

    for (row, vector) in vectors.iter().enumerate() {
        if vector.len() != dims {
            return Err(CacheError::Corrupt(format!(
                "row {row} has {} values, expected {dims}",
                vector.len()
            )));
        }
        for value in vector {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    Ok(buf)
}

pub fn decode_vectors(bytes: &[u8]) -> Result<VectorMatrix, CacheError> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(CacheError::Corrupt("missing FEMB header".into()));
    }

    let read_u32 = |offset: usize| {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    };

    let version = read_u32(4);
    if version != FORMAT_VERSION {
        return Err(CacheError::Corrupt(format!("unsupported format version {version}")));
    }
    let rows = read_u32(8) as usize;
    let dims = read_u32(12) as usize;
    let name_len = read_u32(16) as usize;

    let rest = &bytes[HEADER_LEN..];
    if rest.len() < name_len {
        return Err(CacheError::Corrupt("truncated model name".into()));
    }
    let (name, body) = rest.split_at(name_len);
    let model = std::str::from_utf8(name)
        .map_err(|_| CacheError::Corrupt("model name is not UTF-8".into()))?
        .to_string();

    let expected = rows
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| CacheError::Corrupt("matrix size overflows".into()))?;
    if body.len() != expected {
        return Err(CacheError::Corrupt(format!(
            "expected {expected} bytes of vectors, found {}",
            body.len()
        )));
    }

    let vectors = if dims == 0 {
        vec![Vec::new(); rows]
    } else {
        body.chunks_exact(dims * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect()
    };

    Ok(VectorMatrix {
        model,
        dims,
        vectors,
    })
}

/// Owner of the on-disk artifact pair. Not safe for concurrent writers;
/// `SemanticIndex` serialises access.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    ids_path: PathBuf,
    vectors_path: PathBuf,
}

impl EmbeddingCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            ids_path: dir.join(IDS_FILE),
            vectors_path: dir.join(VECTORS_FILE),
        }
    }

    pub fn ids_path(&self) -> &Path {
        &self.ids_path
    }

    pub fn vectors_path(&self) -> &Path {
        &self.vectors_path
    }

    /// Artifacts usable with `embedder`. `Ok(None)` when either file is missing.
    pub fn load(&self, embedder: &dyn Embedder) -> Result<Option<CacheArtifacts>, CacheError> {
        if !self.ids_path.exists() || !self.vectors_path.exists() {
            return Ok(None);
        }

        let ids: Vec<i64> = serde_json::from_slice(&fs::read(&self.ids_path)?)?;
        let VectorMatrix {
            model,
            dims,
            vectors,
        } = decode_vectors(&fs::read(&self.vectors_path)?)?;

        if ids.len() != vectors.len() {
            return Err(CacheError::Corrupt(format!(
                "{} identifiers but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if model != embedder.name() {
            return Err(CacheError::Corrupt(format!(
                "cache was built by {model}, active embedder is {}",
                embedder.name()
            )));
        }
        if dims != embedder.dimension() {
            return Err(CacheError::Corrupt(format!(
                "cached dimension {dims} does not match embedder dimension {}",
                embedder.dimension()
            )));
        }

        Ok(Some(CacheArtifacts { ids, vectors }))
    }

    /// Like `load`, but any unreadable cache is logged and reported as absent.
    pub fn load_usable(&self, embedder: &dyn Embedder) -> Option<CacheArtifacts> {
        match self.load(embedder) {
            Ok(artifacts) => artifacts,
            Err(err) => {
                log_warn!(
                    "Ignoring embedding cache at {}: {err}; it will be rebuilt",
                    self.vectors_path.display()
                );
                None
            }
        }
    }

    pub fn save(
        &self,
        artifacts: &CacheArtifacts,
        embedder: &dyn Embedder,
    ) -> Result<(), CacheError> {
        if artifacts.ids.len() != artifacts.vectors.len() {
            return Err(CacheError::Corrupt(format!(
                "refusing to write {} identifiers with {} vectors",
                artifacts.ids.len(),
                artifacts.vectors.len()
            )));
        }

        let vectors = encode_vectors(&artifacts.vectors, embedder.dimension(), embedder.name())?;
        let ids = serde_json::to_vec(&artifacts.ids)?;

        if let Some(parent) = self.vectors_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let vectors_tmp = self.vectors_path.with_extension("bin.tmp");
        let ids_tmp = self.ids_path.with_extension("json.tmp");
        fs::write(&vectors_tmp, vectors)?;
        fs::write(&ids_tmp, ids)?;
        fs::rename(&vectors_tmp, &self.vectors_path)?;
        fs::rename(&ids_tmp, &self.ids_path)?;
        Ok(())
    }

    /// Bring the cache up to date with `files`.
    ///
    /// Only identifiers missing from the cache are embedded; cached vectors
    /// are never recomputed, even if a file's text changed since. Nothing is
    /// written unless every new text embedded successfully.
    pub fn sync(&self, files: &[FileRecord], embedder: &dyn Embedder) -> Result<SyncOutcome> {
        let cached = self.load_usable(embedder);
        let rebuilt = cached.is_none();
        let mut artifacts = cached.unwrap_or_default();

        let mut known: HashSet<i64> = artifacts.ids.iter().copied().collect();
        let mut new_ids = Vec::new();
        let mut new_texts = Vec::new();
        for file in files {
            if !file.has_searchable_text() || !known.insert(file.id) {
                continue;
            }
            new_ids.push(file.id);
            new_texts.push(file.searchable_text.clone().unwrap_or_default());
        }

        if new_ids.is_empty() && !rebuilt {
            return Ok(SyncOutcome {
                artifacts,
                embedded: 0,
                rebuilt: false,
                written: false,
            });
        }

        let new_vectors = embed_checked(embedder, &new_texts)
            .with_context(|| format!("failed to embed {} files", new_texts.len()))?;

        artifacts.ids.extend(new_ids);
        artifacts.vectors.extend(new_vectors);

        self.save(&artifacts, embedder).with_context(|| {
            format!(
                "failed to write embedding cache to {}",
                self.vectors_path.display()
            )
        })?;

        log_info!(
            "Embedding cache {}: embedded {} files, {} cached in total",
            if rebuilt { "rebuilt" } else { "extended" },
            new_texts.len(),
            artifacts.len()
        );

        Ok(SyncOutcome {
            embedded: new_texts.len(),
            artifacts,
            rebuilt,
            written: true,
        })
    }
}

fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = embedder.embed_batch(texts)?;
    if vectors.len() != texts.len() {
        return Err(EmbedError::Unavailable(format!(
            "{} returned {} vectors for {} texts",
            embedder.name(),
            vectors.len(),
            texts.len()
        )));
    }
    for vector in &vectors {
        check_dimension(embedder.dimension(), vector)?;
    }
    Ok(vectors)
}
