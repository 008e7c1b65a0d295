//! # File Store
//!
//! Single append-only file. Writing a chunk again appends a new record; the
//! latest record for a coordinate wins. An in-memory index maps each
//! coordinate to its latest record and is rebuilt by scanning the file on
//! open.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "VXCS"]
//! [4 bytes: version]
//!
//! Record format:
//! [1 byte: record kind (SEED/INSERT/UPDATE)]
//! [12 bytes: chunk x, y, z as i32]
//! [4 bytes: payload length]
//! [N bytes: payload]
//! [4 bytes: CRC32 of above]
//! ```
//!
//! Chunk payloads are LZ4 compressed. The seed payload is the seed in
//! decimal text. A record that is cut short or fails its checksum ends the
//! scan, and the file is truncated back to the last good record.
//!
//! Superseded records are dead space. Once it passes
//! [`COMPACT_MIN_DEAD_BYTES`] and outweighs the live records, the live
//! records are copied to a fresh file that replaces the old one.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use voxstream_procedural::ChunkCoord;

use super::ChunkStorage;
use crate::error::{StoreError, StoreResult};

/// Magic bytes identifying a store file.
const STORE_MAGIC: &[u8; 4] = b"VXCS";

/// Current store format version.
const STORE_VERSION: u32 = 1;

const FILE_HEADER_LEN: u64 = 8;
const RECORD_HEADER_LEN: usize = 1 + 12 + 4;
const CRC_LEN: usize = 4;

/// Dead bytes tolerated before a compaction is considered.
pub const COMPACT_MIN_DEAD_BYTES: u64 = 16 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordKind {
    Seed = 1,
    Insert = 2,
    Update = 3,
}

impl RecordKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Seed),
            2 => Some(Self::Insert),
            3 => Some(Self::Update),
            _ => None,
        }
    }
}

/// Where the latest record for a coordinate lives.
#[derive(Clone, Copy, Debug)]
struct RecordLoc {
    offset: u64,
    payload_len: usize,
}

impl RecordLoc {
    fn record_len(self) -> usize {
        RECORD_HEADER_LEN + self.payload_len + CRC_LEN
    }
}

struct Record {
    kind: RecordKind,
    coord: ChunkCoord,
    payload: Vec<u8>,
}

enum Scanned {
    Record(Record, RecordLoc),
    End,
    Torn(String),
}

struct FileState {
    file: File,
    index: HashMap<ChunkCoord, RecordLoc>,
    seed: Option<u64>,
    /// Offset one past the last good record.
    end: u64,
    /// Bytes held by superseded records.
    dead: u64,
}

impl FileState {
    fn live_bytes(&self) -> u64 {
        self.end - FILE_HEADER_LEN - self.dead
    }

    fn is_wasteful(&self) -> bool {
        self.dead >= COMPACT_MIN_DEAD_BYTES && self.dead >= self.live_bytes()
    }
}

/// Durable [`ChunkStorage`] backed by one file.
pub struct FileStore {
    path: PathBuf,
    sync_writes: bool,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Opens or creates a store file. Writes are synced on [`flush`].
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is not a store file.
    ///
    /// [`flush`]: ChunkStorage::flush
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, false)
    }

    /// Opens or creates a store file, syncing after every write if
    /// `sync_writes` is set.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or is not a store file.
    pub fn open_with(path: impl AsRef<Path>, sync_writes: bool) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 {
            file.write_all(STORE_MAGIC)?;
            file.write_all(&STORE_VERSION.to_le_bytes())?;
            file.sync_all()?;
        } else {
            Self::check_header(&mut file, file_len)?;
        }

        let mut index = HashMap::new();
        let mut seed = None;
        let mut dead = 0;
        let end = Self::scan(
            &mut file,
            file_len.max(FILE_HEADER_LEN),
            &mut index,
            &mut seed,
            &mut dead,
        )?;

        if end < file_len {
            warn!(
                path = %path.display(),
                dropped_bytes = file_len - end,
                "truncating damaged tail of chunk store"
            );
            file.set_len(end)?;
            file.sync_all()?;
        }

        info!(path = %path.display(), chunks = index.len(), seed = ?seed, "opened chunk store");

        let mut state = FileState {
            file,
            index,
            seed,
            end,
            dead,
        };
        Self::compact_if_wasteful(&path, &mut state);

        Ok(Self {
            path,
            sync_writes,
            state: Mutex::new(state),
        })
    }

    fn check_header(file: &mut File, file_len: u64) -> StoreResult<()> {
        if file_len < FILE_HEADER_LEN {
            return Err(StoreError::BadHeader(format!("file is only {file_len} bytes")));
        }

        let mut header = [0u8; 8];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        if &header[..4] != STORE_MAGIC {
            return Err(StoreError::BadHeader("not a chunk store file".into()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != STORE_VERSION {
            return Err(StoreError::BadHeader(format!("unsupported version {version}")));
        }
        Ok(())
    }

    /// Replays every record into `index` and `seed`.
    ///
    /// Returns the offset one past the last good record.
    fn scan(
        file: &mut File,
        file_len: u64,
        index: &mut HashMap<ChunkCoord, RecordLoc>,
        seed: &mut Option<u64>,
        dead: &mut u64,
    ) -> StoreResult<u64> {
        file.seek(SeekFrom::Start(FILE_HEADER_LEN))?;
        let mut reader = BufReader::new(file);
        let mut offset = FILE_HEADER_LEN;

        loop {
            match Self::read_record(&mut reader, offset, file_len)? {
                Scanned::End => break,
                Scanned::Torn(reason) => {
                    warn!(offset, reason = %reason, "chunk store record rejected");
                    break;
                }
                Scanned::Record(record, loc) => {
                    match record.kind {
                        RecordKind::Seed => {
                            let text = String::from_utf8_lossy(&record.payload);
                            let value = text
                                .trim()
                                .parse::<u64>()
                                .map_err(|_| StoreError::InvalidSeed(text.to_string()))?;
                            // First seed wins; later ones are dead.
                            if seed.is_some() {
                                *dead += loc.record_len() as u64;
                            } else {
                                *seed = Some(value);
                            }
                        }
                        RecordKind::Insert | RecordKind::Update => {
                            if let Some(old) = index.insert(record.coord, loc) {
                                *dead += old.record_len() as u64;
                            }
                        }
                    }
                    offset += loc.record_len() as u64;
                }
            }
        }

        Ok(offset)
    }

    fn read_record(
        reader: &mut impl Read,
        offset: u64,
        file_len: u64,
    ) -> StoreResult<Scanned> {
        let remaining = file_len.saturating_sub(offset);
        if remaining == 0 {
            return Ok(Scanned::End);
        }
        if remaining < (RECORD_HEADER_LEN + CRC_LEN) as u64 {
            return Ok(Scanned::Torn(format!("{remaining} trailing bytes")));
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        reader.read_exact(&mut header)?;
        let (kind_byte, coord, payload_len) = decode_header(&header);

        let record_len = (RECORD_HEADER_LEN + payload_len + CRC_LEN) as u64;
        if record_len > remaining {
            return Ok(Scanned::Torn(format!(
                "record needs {record_len} bytes, {remaining} left"
            )));
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;
        let mut crc_bytes = [0u8; CRC_LEN];
        reader.read_exact(&mut crc_bytes)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(&payload);
        if hasher.finalize() != u32::from_le_bytes(crc_bytes) {
            return Ok(Scanned::Torn("CRC mismatch".into()));
        }

        let Some(kind) = RecordKind::from_u8(kind_byte) else {
            return Ok(Scanned::Torn(format!("unknown record kind {kind_byte}")));
        };

        Ok(Scanned::Record(
            Record {
                kind,
                coord,
                payload,
            },
            RecordLoc {
                offset,
                payload_len,
            },
        ))
    }

    /// Appends one record at the end of the file.
    fn append(
        &self,
        state: &mut FileState,
        kind: RecordKind,
        coord: ChunkCoord,
        payload: &[u8],
    ) -> StoreResult<RecordLoc> {
        let record = encode_record(kind, coord, payload)?;
        let offset = state.end;

        state.file.seek(SeekFrom::Start(offset))?;
        if let Err(e) = state.file.write_all(&record) {
            // Drop the partial record so the next append starts clean.
            state.file.set_len(offset).ok();
            return Err(e.into());
        }
        if self.sync_writes {
            state.file.sync_data()?;
        }

        state.end += record.len() as u64;
        Ok(RecordLoc {
            offset,
            payload_len: payload.len(),
        })
    }

    fn write_chunk(&self, state: &mut FileState, kind: RecordKind, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()> {
        let compressed = lz4_flex::compress_prepend_size(bytes);
        let loc = self.append(state, kind, coord, &compressed)?;
        if let Some(old) = state.index.insert(coord, loc) {
            state.dead += old.record_len() as u64;
        }
        debug!(%coord, bytes = compressed.len(), "chunk record written");

        Self::compact_if_wasteful(&self.path, state);
        Ok(())
    }

    /// Compacts when dead space dominates. A failed compaction leaves the
    /// store as it was.
    fn compact_if_wasteful(path: &Path, state: &mut FileState) {
        if !state.is_wasteful() {
            return;
        }
        if let Err(e) = Self::compact(path, state) {
            warn!(path = %path.display(), error = %e, "chunk store compaction failed");
        }
    }

    /// Rewrites the live records into a fresh file and swaps it in.
    fn compact(path: &Path, state: &mut FileState) -> StoreResult<()> {
        let temp_path = path.with_extension("compacting");
        let (file, index, end) = match Self::write_live_records(&temp_path, state) {
            Ok(written) => written,
            Err(e) => {
                fs::remove_file(&temp_path).ok();
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&temp_path, path) {
            fs::remove_file(&temp_path).ok();
            return Err(e.into());
        }

        let reclaimed = state.dead;
        state.file = file;
        state.index = index;
        state.end = end;
        state.dead = 0;
        info!(path = %path.display(), reclaimed, size = end, "compacted chunk store");
        Ok(())
    }

    fn write_live_records(
        temp_path: &Path,
        state: &mut FileState,
    ) -> StoreResult<(File, HashMap<ChunkCoord, RecordLoc>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(temp_path)?;

        let mut live: Vec<(ChunkCoord, RecordLoc)> =
            state.index.iter().map(|(coord, loc)| (*coord, *loc)).collect();
        live.sort_by_key(|(_, loc)| loc.offset);

        let mut index = HashMap::with_capacity(live.len());
        let mut offset = FILE_HEADER_LEN;
        {
            let mut writer = BufWriter::new(&file);
            writer.write_all(STORE_MAGIC)?;
            writer.write_all(&STORE_VERSION.to_le_bytes())?;

            if let Some(seed) = state.seed {
                let record = encode_record(RecordKind::Seed, ChunkCoord::default(), seed.to_string().as_bytes())?;
                writer.write_all(&record)?;
                offset += record.len() as u64;
            }

            let mut record = Vec::new();
            for (coord, loc) in live {
                record.resize(loc.record_len(), 0);
                state.file.seek(SeekFrom::Start(loc.offset))?;
                state.file.read_exact(&mut record)?;
                writer.write_all(&record)?;

                index.insert(coord, RecordLoc { offset, ..loc });
                offset += record.len() as u64;
            }
            writer.flush()?;
        }
        file.sync_all()?;

        Ok((file, index, offset))
    }
}

impl ChunkStorage for FileStore {
    fn resolve_seed(&self, requested: u64) -> StoreResult<u64> {
        let mut state = self.state.lock();
        if let Some(seed) = state.seed {
            return Ok(seed);
        }

        let text = requested.to_string();
        self.append(&mut state, RecordKind::Seed, ChunkCoord::default(), text.as_bytes())?;
        state.file.sync_all()?;
        state.seed = Some(requested);
        info!(seed = requested, "persisted world seed");
        Ok(requested)
    }

    fn get(&self, coord: ChunkCoord) -> StoreResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let Some(loc) = state.index.get(&coord).copied() else {
            return Ok(None);
        };

        let mut record = vec![0u8; loc.record_len()];
        state.file.seek(SeekFrom::Start(loc.offset))?;
        state.file.read_exact(&mut record)?;
        drop(state);

        let (body, crc) = record.split_at(record.len() - CRC_LEN);
        if crc32fast::hash(body) != u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) {
            return Err(StoreError::Corrupt {
                offset: loc.offset,
                reason: "CRC mismatch".into(),
            });
        }

        let mut header = [0u8; RECORD_HEADER_LEN];
        header.copy_from_slice(&body[..RECORD_HEADER_LEN]);
        let (_, stored_coord, _) = decode_header(&header);
        if stored_coord != coord {
            return Err(StoreError::Corrupt {
                offset: loc.offset,
                reason: format!("record holds {stored_coord}, expected {coord}"),
            });
        }

        lz4_flex::decompress_size_prepended(&body[RECORD_HEADER_LEN..])
            .map(Some)
            .map_err(|e| StoreError::Decompress(e.to_string()))
    }

    fn put(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.index.contains_key(&coord) {
            return Err(StoreError::ChunkExists(coord));
        }
        self.write_chunk(&mut state, RecordKind::Insert, coord, bytes)
    }

    fn update(&self, coord: ChunkCoord, bytes: &[u8]) -> StoreResult<()> {
        let mut state = self.state.lock();
        if !state.index.contains_key(&coord) {
            return Err(StoreError::ChunkMissing(coord));
        }
        self.write_chunk(&mut state, RecordKind::Update, coord, bytes)
    }

    fn contains(&self, coord: ChunkCoord) -> bool {
        self.state.lock().index.contains_key(&coord)
    }

    fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    fn flush(&self) -> StoreResult<()> {
        let state = self.state.lock();
        state.file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

fn encode_record(kind: RecordKind, coord: ChunkCoord, payload: &[u8]) -> StoreResult<Vec<u8>> {
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record payload too large"))?;

    let mut record = Vec::with_capacity(RECORD_HEADER_LEN + payload.len() + CRC_LEN);
    record.push(kind as u8);
    record.extend_from_slice(&coord.x.to_le_bytes());
    record.extend_from_slice(&coord.y.to_le_bytes());
    record.extend_from_slice(&coord.z.to_le_bytes());
    record.extend_from_slice(&payload_len.to_le_bytes());
    record.extend_from_slice(payload);

    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

fn decode_header(header: &[u8; RECORD_HEADER_LEN]) -> (u8, ChunkCoord, usize) {
    let word = |at: usize| [header[at], header[at + 1], header[at + 2], header[at + 3]];
    let coord = ChunkCoord::new(
        i32::from_le_bytes(word(1)),
        i32::from_le_bytes(word(5)),
        i32::from_le_bytes(word(9)),
    );
    let payload_len = u32::from_le_bytes(word(13)) as usize;
    (header[0], coord, payload_len)
}
