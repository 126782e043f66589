//! Evidence bundle packaging.
//!
//! A bundle is a zip archive with exactly three entries:
//!
//! | entry | content |
//! |---|---|
//! | `evidence.png` | watermarked image |
//! | `metadata.json` | [`EvidenceMetadata`] |
//! | `evidence.ots` | serialized [`TimestampProof`] |
//!
//! Every entry carries the capture time as its modification time, so
//! identical inputs produce byte-identical archives.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{EvidenceError, Result};
use crate::frame::EncodedImage;
use crate::metadata::EvidenceMetadata;
use crate::timestamp::TimestampProof;

pub const IMAGE_ENTRY: &str = "evidence.png";
pub const METADATA_ENTRY: &str = "metadata.json";
pub const PROOF_ENTRY: &str = "evidence.ots";

/// Entry names in archive order.
pub const ENTRIES: [&str; 3] = [IMAGE_ENTRY, METADATA_ENTRY, PROOF_ENTRY];

/// Largest entry accepted when unpacking.
const MAX_ENTRY_SIZE: u64 = 256 * 1024 * 1024;

/// A packed archive and the file name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceBundle {
    file_name: String,
    bytes: Vec<u8>,
}

impl EvidenceBundle {
    /// `evidence_<timestamp>.zip` with `:` replaced so the name is portable.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the archive into `dir`, returning the final path.
    ///
    /// Bytes go to a uniquely named temporary file first and are linked into
    /// place only if no file has the final name yet, so an existing bundle is
    /// never replaced and the final name never refers to a partial archive.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let final_path = dir.join(&self.file_name);
        let temp = stage(dir, &self.bytes)?;

        temp.persist_noclobber(&final_path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                EvidenceError::PackagingFailure(format!(
                    "{} already exists",
                    final_path.display()
                ))
            } else {
                EvidenceError::Io(e.error)
            }
        })?;

        info!(path = %final_path.display(), bytes = self.bytes.len(), "Bundle written");
        Ok(final_path)
    }
}

/// Replace `path` with `bytes` via a temporary sibling and a rename.
///
/// Used for rewriting an existing bundle in place (proof upgrades).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = stage(dir, bytes)?;
    temp.persist(path).map_err(|e| EvidenceError::Io(e.error))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Bundle replaced");
    Ok(())
}

/// Write `bytes` to a fresh temporary file in `dir` and flush it to disk.
/// The file is removed again if it is dropped without being persisted.
fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// Collects the three parts of a bundle.
///
/// ## Example
///
/// ```no_run
/// # use evidence_core::{BundleBuilder, EncodedImage, EvidenceMetadata, TimestampProof};
/// # fn example(image: EncodedImage, metadata: EvidenceMetadata, proof: TimestampProof)
/// #     -> evidence_core::Result<()> {
/// let bundle = BundleBuilder::new()
///     .image(image)
///     .metadata(metadata)
///     .proof(proof)
///     .build()?;
/// bundle.write_to_dir(std::path::Path::new("."))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct BundleBuilder {
    image: Option<EncodedImage>,
    metadata: Option<EvidenceMetadata>,
    proof: Option<TimestampProof>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: EncodedImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn metadata(mut self, metadata: EvidenceMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn proof(mut self, proof: TimestampProof) -> Self {
        self.proof = Some(proof);
        self
    }

    pub fn build(self) -> Result<EvidenceBundle> {
        let image = self
            .image
            .filter(|i| !i.is_empty())
            .ok_or_else(|| missing("image"))?;
        let metadata = self.metadata.ok_or_else(|| missing("metadata"))?;
        let proof = self.proof.ok_or_else(|| missing("timestamp proof"))?;
        pack(&image, &metadata, &proof)
    }
}

fn missing(part: &str) -> EvidenceError {
    EvidenceError::PackagingFailure(format!("bundle is missing its {part}"))
}

/// Pack image, metadata and proof into a zip archive.
pub fn pack(
    image: &EncodedImage,
    metadata: &EvidenceMetadata,
    proof: &TimestampProof,
) -> Result<EvidenceBundle> {
    if image.is_empty() {
        return Err(missing("image"));
    }

    let captured_at = DateTime::parse_from_rfc3339(metadata.timestamp_utc())
        .map_err(|e| {
            EvidenceError::PackagingFailure(format!("invalid capture timestamp: {e}"))
        })?
        .with_timezone(&Utc);
    let modified = zip_time(captured_at)?;

    let metadata_json = metadata.to_json()?;
    let proof_bytes = proof.serialize()?;

    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(modified);
    let deflated = stored.compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, options, bytes) in [
        (IMAGE_ENTRY, stored, image.as_bytes()),
        (METADATA_ENTRY, deflated, metadata_json.as_slice()),
        (PROOF_ENTRY, deflated, proof_bytes.as_slice()),
    ] {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(bytes)?;
    }
    let bytes = zip.finish().map_err(zip_error)?.into_inner();

    let file_name = format!(
        "evidence_{}.zip",
        metadata.timestamp_utc().replace(':', "-")
    );
    debug!(file_name = %file_name, bytes = bytes.len(), "Bundle packed");

    Ok(EvidenceBundle { file_name, bytes })
}

/// The three parts read back from a bundle.
#[derive(Debug, Clone)]
pub struct UnpackedBundle {
    pub image: EncodedImage,
    pub metadata: EvidenceMetadata,
    pub proof: TimestampProof,
}

/// Read a bundle produced by [`pack`].
///
/// Archives with missing, renamed or extra entries are rejected.
pub fn unpack(bytes: &[u8]) -> Result<UnpackedBundle> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

    if archive.len() != ENTRIES.len() {
        return Err(EvidenceError::PackagingFailure(format!(
            "bundle must contain {} entries, found {}",
            ENTRIES.len(),
            archive.len()
        )));
    }

    let image = read_entry(&mut archive, IMAGE_ENTRY)?;
    let metadata = read_entry(&mut archive, METADATA_ENTRY)?;
    let proof = read_entry(&mut archive, PROOF_ENTRY)?;

    Ok(UnpackedBundle {
        image: EncodedImage::from_png(image)?,
        metadata: EvidenceMetadata::from_json(&metadata)?,
        proof: TimestampProof::deserialize(&proof)?,
    })
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(|e| {
        EvidenceError::PackagingFailure(format!("bundle entry {name}: {e}"))
    })?;

    if entry.size() > MAX_ENTRY_SIZE {
        return Err(EvidenceError::PackagingFailure(format!(
            "bundle entry {name} is too large ({} bytes)",
            entry.size()
        )));
    }

    let mut out = Vec::with_capacity(entry.size() as usize);
    entry.take(MAX_ENTRY_SIZE).read_to_end(&mut out)?;
    Ok(out)
}

/// Fail unless `at` can be stored as a zip entry time (1980 to 2107).
pub fn check_capture_time(at: DateTime<Utc>) -> Result<()> {
    zip_time(at).map(|_| ())
}

fn zip_time(at: DateTime<Utc>) -> Result<zip::DateTime> {
    let year = u16::try_from(at.year())
        .map_err(|_| EvidenceError::PackagingFailure(format!("year {} out of range", at.year())))?;
    zip::DateTime::from_date_and_time(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .map_err(|_| {
        EvidenceError::PackagingFailure(format!("capture time {at} cannot be stored in a zip entry"))
    })
}

fn zip_error(e: zip::result::ZipError) -> EvidenceError {
    EvidenceError::PackagingFailure(e.to_string())
}
