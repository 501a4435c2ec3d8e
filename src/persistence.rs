//! Durable record of a tracking run.
//!
//! The record is a bincode payload followed by a little-endian CRC32 of that
//! payload. The payload starts with a magic number and a format version so
//! later editing sessions can reject files they do not understand.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{TrackError, TrackResult};
use crate::record::{BoundingBox, TrackRecord, TrackedData};

/// Magic number for track record files.
const RECORD_MAGIC: u32 = 0x5452_414B; // "TRAK" in ASCII

/// Current version of the record format. Readers accept anything up to it.
const RECORD_VERSION: u16 = 1;

const CHECKSUM_LEN: usize = 4;

#[derive(Serialize, Deserialize)]
struct RecordFile {
    magic: u32,
    version: u16,
    frames: Vec<FrameEntry>,
}

#[derive(Serialize, Deserialize)]
struct FrameEntry {
    frame_id: u64,
    rotation: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl From<&TrackRecord> for FrameEntry {
    fn from(record: &TrackRecord) -> Self {
        let b = record.bounding_box;
        Self {
            frame_id: record.frame_id,
            rotation: record.rotation,
            x1: b.x1,
            y1: b.y1,
            x2: b.x2,
            y2: b.y2,
        }
    }
}

impl From<FrameEntry> for TrackRecord {
    fn from(entry: FrameEntry) -> Self {
        TrackRecord::new(
            entry.frame_id,
            entry.rotation,
            BoundingBox::new(entry.x1, entry.y1, entry.x2, entry.y2),
        )
    }
}

/// Reads and writes the durable record at one path.
///
/// Callers must not run two saves against the same path concurrently.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `data` to the store's path, replacing any existing record.
    ///
    /// The record is written to a temporary file next to the destination and
    /// renamed over it, so a failed save leaves the previous record intact.
    /// Saving the same data twice produces identical bytes.
    pub fn save(&self, data: &TrackedData) -> TrackResult<()> {
        let bytes = encode(data)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| TrackError::Io(e.error))?;

        info!(
            path = %self.path.display(),
            frames = data.len(),
            bytes = bytes.len(),
            "saved track record"
        );
        Ok(())
    }

    /// Read the record at the store's path.
    pub fn load(&self) -> TrackResult<TrackedData> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TrackError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(TrackError::Io(e)),
        };

        let data = decode(&bytes)?;
        debug!(path = %self.path.display(), frames = data.len(), "loaded track record");
        Ok(data)
    }
}

/// Encode a collection into the durable byte layout.
pub fn encode(data: &TrackedData) -> TrackResult<Vec<u8>> {
    let file = RecordFile {
        magic: RECORD_MAGIC,
        version: RECORD_VERSION,
        frames: data.iter().map(FrameEntry::from).collect(),
    };

    let mut bytes = bincode::serialize(&file)?;
    let checksum = crc32fast::hash(&bytes);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    Ok(bytes)
}

/// Decode the durable byte layout back into a collection.
pub fn decode(bytes: &[u8]) -> TrackResult<TrackedData> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(TrackError::corrupt("record too small"));
    }

    let (payload, checksum_bytes) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(checksum_bytes);
    let stored = u32::from_le_bytes(stored);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(TrackError::corrupt(format!(
            "checksum mismatch: expected {stored:08x}, got {computed:08x}"
        )));
    }

    let file: RecordFile =
        bincode::deserialize(payload).map_err(|e| TrackError::corrupt(e.to_string()))?;

    if file.magic != RECORD_MAGIC {
        return Err(TrackError::corrupt(format!(
            "invalid magic number: {:08x}",
            file.magic
        )));
    }
    if file.version > RECORD_VERSION {
        return Err(TrackError::corrupt(format!(
            "unsupported version: {} (newest known {})",
            file.version, RECORD_VERSION
        )));
    }

    Ok(file.frames.into_iter().map(TrackRecord::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> TrackedData {
        [
            TrackRecord::new(0, 0.0, BoundingBox::new(10.0, 10.0, 50.0, 50.0)),
            TrackRecord::new(1, 12.5, BoundingBox::new(11.0, 10.5, 51.0, 50.5)),
            TrackRecord::sentinel(2),
            TrackRecord::new(4, -3.0, BoundingBox::new(14.0, 12.0, 54.0, 52.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("track.data"));
        let data = sample();

        store.save(&data).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, data);
        assert!(loaded.get_tracked_data(2).unwrap().is_sentinel());
        assert!(matches!(
            loaded.get_tracked_data(3),
            Err(TrackError::FrameNotTracked(3))
        ));
    }

    #[test]
    fn test_save_is_deterministic_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("track.data");
        let store = RecordStore::new(&path);

        store.save(&sample()).unwrap();
        let first = fs::read(&path).unwrap();
        store.save(&sample()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);

        let smaller: TrackedData = [TrackRecord::sentinel(9)].into_iter().collect();
        store.save(&smaller).unwrap();
        assert_eq!(store.load().unwrap(), smaller);
    }

    #[test]
    fn test_empty_collection() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("empty.data"));
        store.save(&TrackedData::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_missing_record() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("absent.data"));
        assert!(matches!(store.load(), Err(TrackError::NotFound(_))));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("no/such/dir/track.data"));
        assert!(matches!(store.save(&sample()), Err(TrackError::Io(_))));
    }

    #[test]
    fn test_failed_save_keeps_previous_record() {
        let dir = tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("track.data"));
        store.save(&sample()).unwrap();

        // A directory squatting on the destination makes the rename fail.
        let blocked = RecordStore::new(dir.path().join("blocked"));
        fs::create_dir(blocked.path()).unwrap();
        assert!(blocked.save(&sample()).is_err());

        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_corrupt_records() {
        let bytes = encode(&sample()).unwrap();

        let mut flipped = bytes.clone();
        flipped[10] ^= 0xFF;
        assert!(matches!(decode(&flipped), Err(TrackError::CorruptRecord(_))));

        assert!(matches!(decode(&bytes[..2]), Err(TrackError::CorruptRecord(_))));

        let garbage = b"definitely not a track record";
        assert!(matches!(decode(garbage), Err(TrackError::CorruptRecord(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let file = RecordFile {
            magic: RECORD_MAGIC,
            version: RECORD_VERSION + 1,
            frames: vec![],
        };
        let mut bytes = bincode::serialize(&file).unwrap();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());

        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }

    #[test]
    fn test_corrupt_file_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("track.data");
        fs::write(&path, b"\x00\x01\x02\x03\x04\x05").unwrap();
        assert!(matches!(
            RecordStore::new(&path).load(),
            Err(TrackError::CorruptRecord(_))
        ));
    }
}
