//! Persistence layer for the discovery vector index.
//!
//! A snapshot stores the index vectors together with a fingerprint of the
//! catalog they were computed from, so a later process start can reuse them
//! only while the catalog (and embedding model) are unchanged.

use crate::error::{GatewayError, Result};
use crate::search::FlatL2Index;
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Snapshot file format version. Increment when format changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Magic bytes to identify valid snapshot files.
const SNAPSHOT_MAGIC: &[u8; 8] = b"TOOLGATE";

/// magic + version + fingerprint + rows + dim
const HEADER_LEN: u64 = 8 + 4 + 32 + 8 + 8;

/// Result of reading a snapshot file.
#[derive(Debug)]
pub enum SnapshotLoad {
    /// No file on disk.
    Missing,
    /// The file is readable but was built for a different catalog or format.
    Stale,
    Loaded(FlatL2Index),
}

/// Fingerprint of everything the index vectors depend on: the embedding model
/// and, per catalog position, the tool name and embedded text.
pub fn catalog_fingerprint<'a>(
    model_id: &str,
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"\n");

    for (name, text) in entries {
        hasher.update(name.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        hasher.update(b"\n");
    }

    hasher.finalize().into()
}

/// Save an index snapshot to a binary file.
///
/// File format:
/// - 8 bytes: magic "TOOLGATE"
/// - 4 bytes: version (u32 LE)
/// - 32 bytes: catalog fingerprint
/// - 8 bytes: rows (u64 LE)
/// - 8 bytes: dim (u64 LE)
/// - N bytes: vector data (f32 LE, row-major)
pub fn save_snapshot(path: &Path, index: &FlatL2Index, fingerprint: &[u8; 32]) -> Result<()> {
    let io_err = |what: &str, e: std::io::Error| GatewayError::Index(format!("{what}: {e}"));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err("Failed to create index directory", e))?;
    }

    let file = File::create(path).map_err(|e| io_err("Failed to create index file", e))?;
    let mut writer = BufWriter::new(file);

    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    header.extend_from_slice(SNAPSHOT_MAGIC);
    header.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    header.extend_from_slice(fingerprint);
    header.extend_from_slice(&(index.len() as u64).to_le_bytes());
    header.extend_from_slice(&(index.dim() as u64).to_le_bytes());
    writer
        .write_all(&header)
        .map_err(|e| io_err("Failed to write index header", e))?;

    for &val in index.vectors().iter() {
        writer
            .write_all(&val.to_le_bytes())
            .map_err(|e| io_err("Failed to write index data", e))?;
    }

    writer
        .flush()
        .map_err(|e| io_err("Failed to flush index file", e))?;

    tracing::info!(
        path = %path.display(),
        rows = index.len(),
        dim = index.dim(),
        size_bytes = HEADER_LEN as usize + index.len() * index.dim() * 4,
        "Search index saved"
    );

    Ok(())
}

/// Load an index snapshot, checking it against the expected fingerprint.
///
/// Returns `Err` only when the file is corrupt (truncated, wrong size,
/// unreadable); callers discard such files and rebuild.
pub fn load_snapshot(path: &Path, expected_fingerprint: &[u8; 32]) -> Result<SnapshotLoad> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Index file does not exist");
        return Ok(SnapshotLoad::Missing);
    }

    let corrupt = |what: &str| GatewayError::Index(format!("Corrupt index file: {what}"));

    let file = File::open(path)
        .map_err(|e| GatewayError::Index(format!("Failed to open index file: {e}")))?;
    let file_len = file
        .metadata()
        .map_err(|e| GatewayError::Index(format!("Failed to stat index file: {e}")))?
        .len();
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|_| corrupt("truncated header"))?;
    if &magic != SNAPSHOT_MAGIC {
        return Err(corrupt("bad magic"));
    }

    let version = u32::from_le_bytes(read_array(&mut reader).map_err(|_| corrupt("truncated header"))?);
    if version != SNAPSHOT_VERSION {
        tracing::warn!(
            path = %path.display(),
            file_version = version,
            expected_version = SNAPSHOT_VERSION,
            "Index version mismatch, ignoring"
        );
        return Ok(SnapshotLoad::Stale);
    }

    let fingerprint: [u8; 32] = read_array(&mut reader).map_err(|_| corrupt("truncated header"))?;
    let rows = u64::from_le_bytes(read_array(&mut reader).map_err(|_| corrupt("truncated header"))?);
    let dim = u64::from_le_bytes(read_array(&mut reader).map_err(|_| corrupt("truncated header"))?);

    // Size check before allocating anything based on header values
    let expected_len = rows
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| corrupt("header dimensions overflow"))?;
    if expected_len != file_len {
        return Err(corrupt("file size does not match header"));
    }

    if &fingerprint != expected_fingerprint {
        tracing::info!(path = %path.display(), "Index built for a different catalog, ignoring");
        return Ok(SnapshotLoad::Stale);
    }

    let (rows, dim) = (rows as usize, dim as usize);
    let mut data = vec![0f32; rows * dim];
    for val in &mut data {
        *val = f32::from_le_bytes(read_array(&mut reader).map_err(|_| corrupt("truncated data"))?);
    }

    let vectors = Array2::from_shape_vec((rows, dim), data)
        .map_err(|e| GatewayError::Index(format!("Failed to reshape index data: {e}")))?;

    tracing::info!(path = %path.display(), rows, dim, "Search index loaded");

    Ok(SnapshotLoad::Loaded(FlatL2Index::new(vectors)))
}

fn read_array<const N: usize>(reader: &mut impl Read) -> std::io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}
