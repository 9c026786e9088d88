//! On-disk form of the vector index: a little-endian binary vector file
//! paired with a JSON metadata manifest.
//!
//! Binary layout:
//!
//! Header (34 bytes):
//!   Magic: "MGLX" (4 bytes)
//!   Version: u16
//!   Dimension: u32
//!   Count: u32
//!   PairStamp: [u8; 16] (UUID shared with the manifest)
//!   HeaderCRC32: u32 (CRC32 of the header bytes before this field)
//!
//! Vector slab:
//!   Count x Dimension f32 values, contiguous.
//!
//! The pair stamp is written into both artifacts at save time and compared
//! at load time, so a binary from one build can never be served with the
//! metadata of another.


use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::FlatIndex;
use crate::corpus::SectionDocument;
use crate::{AssistError, Result};

pub const INDEX_MAGIC: [u8; 4] = *b"MGLX";
pub const INDEX_VERSION: u16 = 1;

// magic + version + dimension + count + stamp, before the CRC field
const HEADER_PREFIX_LEN: usize = 30;
const HEADER_LEN: usize = HEADER_PREFIX_LEN + 4;

/// Everything the chat side needs to interpret the binary index, plus the
/// per-position citation records. Serialized as pretty JSON next to the
/// binary artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub pair_stamp: Uuid,
    pub built_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub sections: Vec<SectionDocument>,
}

impl Manifest {
    #[inline]
    pub fn new(embedding_model: String, dimension: usize, sections: Vec<SectionDocument>) -> Self {
        Self {
            pair_stamp: Uuid::new_v4(),
            built_at: Utc::now(),
            embedding_model,
            dimension,
            sections,
        }
    }
}

/// Writes both artifacts, each through a temp file, fsync, and rename, so
/// a crash mid-save leaves either the old pair or the new pair but never a
/// half-written file. The target directory is created if it does not
/// exist yet.
#[inline]
pub fn save_pair(
    index: &FlatIndex,
    manifest: &Manifest,
    index_path: &Path,
    metadata_path: &Path,
) -> Result<()> {
    if manifest.sections.len() != index.len() {
        return Err(AssistError::Index(format!(
            "Manifest lists {} sections but the index holds {} vectors",
            manifest.sections.len(),
            index.len()
        )));
    }
    if manifest.dimension != index.dimension() {
        return Err(AssistError::Index(format!(
            "Manifest dimension {} does not match index dimension {}",
            manifest.dimension,
            index.dimension()
        )));
    }

    let index_bytes = encode_index(index, &manifest.pair_stamp)?;
    let manifest_json = serde_json::to_string_pretty(manifest)
        .map_err(|e| AssistError::Index(format!("Failed to serialize metadata manifest: {e}")))?;

    write_atomically(index_path, &index_bytes)?;
    write_atomically(metadata_path, manifest_json.as_bytes())?;

    debug!(
        "Saved index pair {} ({} vectors, dimension {})",
        manifest.pair_stamp,
        index.len(),
        index.dimension()
    );
    Ok(())
}

/// Loads and cross-checks both artifacts. Either file missing is the
/// "build it first" error; anything structurally wrong with a present file
/// is corruption and reported as such.
#[inline]
pub fn load_pair(index_path: &Path, metadata_path: &Path) -> Result<(FlatIndex, Manifest)> {
    if !index_path.exists() || !metadata_path.exists() {
        let directory = index_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        return Err(AssistError::MissingArtifacts(
            directory.display().to_string(),
        ));
    }

    let index_bytes = fs::read(index_path)?;
    let (index, stamp) = decode_index(&index_bytes)?;

    let manifest_json = fs::read_to_string(metadata_path)?;
    let manifest: Manifest = serde_json::from_str(&manifest_json)
        .map_err(|e| AssistError::Index(format!("Failed to parse metadata manifest: {e}")))?;

    if manifest.pair_stamp != stamp {
        return Err(AssistError::Index(format!(
            "Index stamp {stamp} does not match manifest stamp {}; the artifacts come from different builds",
            manifest.pair_stamp
        )));
    }
    if manifest.dimension != index.dimension() {
        return Err(AssistError::Index(format!(
            "Manifest dimension {} does not match index dimension {}",
            manifest.dimension,
            index.dimension()
        )));
    }
    if manifest.sections.len() != index.len() {
        return Err(AssistError::Index(format!(
            "Manifest lists {} sections but the index holds {} vectors",
            manifest.sections.len(),
            index.len()
        )));
    }

    debug!(
        "Loaded index pair {} ({} vectors, dimension {})",
        stamp,
        index.len(),
        index.dimension()
    );
    Ok((index, manifest))
}

fn encode_index(index: &FlatIndex, stamp: &Uuid) -> Result<Vec<u8>> {
    let dimension = u32::try_from(index.dimension())
        .map_err(|_| AssistError::Index("Index dimension out of range".to_string()))?;
    let count = u32::try_from(index.len())
        .map_err(|_| AssistError::Index("Index count out of range".to_string()))?;

    let slab = index.as_slab();
    let mut bytes = Vec::with_capacity(HEADER_LEN + slab.len() * 4);

    bytes.extend_from_slice(&INDEX_MAGIC);
    bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    bytes.extend_from_slice(&dimension.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(stamp.as_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes);
    bytes.extend_from_slice(&hasher.finalize().to_le_bytes());

    for value in slab {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    Ok(bytes)
}

fn decode_index(bytes: &[u8]) -> Result<(FlatIndex, Uuid)> {
    if bytes.len() < HEADER_LEN {
        return Err(AssistError::Index(format!(
            "Index file is truncated: {} bytes is smaller than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }

    if bytes[0..4] != INDEX_MAGIC {
        return Err(AssistError::Index(
            "Index file does not start with the MGLX magic".to_string(),
        ));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != INDEX_VERSION {
        return Err(AssistError::Index(format!(
            "Unsupported index version {version}"
        )));
    }

    let dimension = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let count = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;

    let mut stamp_bytes = [0_u8; 16];
    stamp_bytes.copy_from_slice(&bytes[14..30]);
    let stamp = Uuid::from_bytes(stamp_bytes);

    let crc_expected = u32::from_le_bytes([bytes[30], bytes[31], bytes[32], bytes[33]]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[0..HEADER_PREFIX_LEN]);
    let crc_actual = hasher.finalize();
    if crc_actual != crc_expected {
        return Err(AssistError::Index(format!(
            "Index header CRC mismatch (expected {crc_expected:#010x}, got {crc_actual:#010x})"
        )));
    }

    let slab_len = count
        .checked_mul(dimension)
        .and_then(|floats| floats.checked_mul(4))
        .ok_or_else(|| AssistError::Index("Index slab size overflow".to_string()))?;
    let expected_len = HEADER_LEN + slab_len;
    if bytes.len() != expected_len {
        return Err(AssistError::Index(format!(
            "Index file size mismatch (expected {expected_len} bytes, got {})",
            bytes.len()
        )));
    }

    let slab: Vec<f32> = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let index = FlatIndex::from_parts(dimension, slab)?;
    if index.len() != count {
        return Err(AssistError::Index(format!(
            "Index holds {} vectors but the header declares {count}",
            index.len()
        )));
    }

    Ok((index, stamp))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
        AssistError::Index(format!("Artifact path {} has no file name", path.display()))
    })?;
    let temp_path = parent.join(format!("{file_name}.tmp"));

    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    sync_dir(parent)?;
    fs::rename(&temp_path, path)?;
    sync_dir(parent)?;
    Ok(())
}

// Directory handles cannot be opened for syncing on Windows.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}
