//! On-disk snapshot of the registry.
//!
//! Layout: a big-endian `u32` magic number, a big-endian `u32` format
//! version, then one entry per record: a tag byte (`M` or `T`), a big-endian
//! `u32` payload length and the record as JSON.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::domain::{Metar, Taf, WeatherRecord};

/// Magic number opening every snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x31415;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const TAG_METAR: u8 = b'M';
const TAG_TAF: u8 = b'T';

/// Upper bound for one entry, to reject garbage lengths early.
const MAX_ENTRY_LEN: u32 = 1 << 20;

/// Errors reading or writing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not a weather snapshot (magic {0:#x})")]
    BadMagic(u32),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown record tag {0:#04x}")]
    UnknownTag(u8),

    #[error("snapshot entry too large ({0} bytes)")]
    EntryTooLarge(usize),
}

/// Write records in snapshot format.
pub fn write_snapshot<'a, W: Write>(
    mut out: W,
    records: impl IntoIterator<Item = &'a WeatherRecord>,
) -> Result<(), PersistError> {
    out.write_all(&SNAPSHOT_MAGIC.to_be_bytes())?;
    out.write_all(&SNAPSHOT_VERSION.to_be_bytes())?;

    for record in records {
        let (tag, payload) = match record {
            WeatherRecord::Metar(m) => (TAG_METAR, serde_json::to_vec(m)?),
            WeatherRecord::Taf(t) => (TAG_TAF, serde_json::to_vec(t)?),
        };
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len <= MAX_ENTRY_LEN)
            .ok_or(PersistError::EntryTooLarge(payload.len()))?;
        out.write_all(&[tag])?;
        out.write_all(&len.to_be_bytes())?;
        out.write_all(&payload)?;
    }

    out.flush()?;
    Ok(())
}

/// Read every record from a snapshot.
pub fn read_snapshot<R: Read>(mut input: R) -> Result<Vec<WeatherRecord>, PersistError> {
    let magic = read_u32(&mut input)?;
    if magic != SNAPSHOT_MAGIC {
        return Err(PersistError::BadMagic(magic));
    }
    let version = read_u32(&mut input)?;
    if version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }

    let mut records = Vec::new();
    loop {
        let mut tag = [0u8; 1];
        match input.read_exact(&mut tag) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = read_u32(&mut input)?;
        if len > MAX_ENTRY_LEN {
            return Err(PersistError::EntryTooLarge(len as usize));
        }
        let mut payload = vec![0u8; len as usize];
        input.read_exact(&mut payload)?;

        let record = match tag[0] {
            TAG_METAR => WeatherRecord::Metar(serde_json::from_slice::<Metar>(&payload)?),
            TAG_TAF => WeatherRecord::Taf(serde_json::from_slice::<Taf>(&payload)?),
            other => return Err(PersistError::UnknownTag(other)),
        };
        records.push(record);
    }

    Ok(records)
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32, PersistError> {
    let mut bytes = [0u8; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_be_bytes(bytes))
}

/// A snapshot stored at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. Returns `None` if the file does not exist.
    pub fn load(&self) -> Result<Option<Vec<WeatherRecord>>, PersistError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        read_snapshot(io::BufReader::new(file)).map(Some)
    }

    /// Save records, creating parent directories if needed.
    ///
    /// The snapshot is written to a sibling temporary file first and then
    /// renamed over the target.
    pub fn save(&self, records: &[WeatherRecord]) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        {
            let file = std::fs::File::create(&tmp)?;
            write_snapshot(io::BufWriter::new(file), records)?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
