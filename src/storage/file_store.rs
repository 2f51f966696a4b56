//! File-backed table store
//!
//! One file per table under a directory, written by `FileTableSink`.
//! `verify` re-reads the whole file and checks it against its summary.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PrismError, Result};

use super::{TableSink, TableStore};

// =============================================================================
// Format Constants
// =============================================================================

/// Magic bytes identifying a PrismKV table file
const MAGIC: &[u8; 4] = b"PRKV";

/// Current table format version
const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
const HEADER_SIZE: usize = 14;

/// Offset of the entry count inside the header
const COUNT_OFFSET: u64 = 6;

/// Trailing summary length field
const SUMMARY_LEN_SIZE: usize = 4;

/// Written after the data block; describes and checksums it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub entry_count: u64,
    pub data_len: u64,
    pub data_crc: u32,
    pub smallest: Vec<u8>,
    pub largest: Vec<u8>,
}

// =============================================================================
// Store
// =============================================================================

/// Tables stored as `sstable_NNNNNN.sst` files in one directory
#[derive(Debug, Clone)]
pub struct FileTableStore {
    dir: PathBuf,
}

impl FileTableStore {
    /// Use `dir`, creating it if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn table_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("sstable_{:06}.sst", number))
    }

    /// Parse and checksum table `number`, returning its summary
    pub fn read_summary(&self, number: u64) -> Result<TableSummary> {
        let bytes = fs::read(self.table_path(number))?;
        check_table(&bytes)
    }
}

impl TableStore for FileTableStore {
    type Sink = FileTableSink;

    fn create(&self, number: u64) -> Result<FileTableSink> {
        FileTableSink::new(&self.table_path(number))
    }

    fn remove(&self, number: u64) -> Result<()> {
        match fs::remove_file(self.table_path(number)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn verify(&self, number: u64, file_size: u64) -> Result<()> {
        let bytes = fs::read(self.table_path(number))?;
        if bytes.len() as u64 != file_size {
            return Err(PrismError::Storage(format!(
                "table {} is {} bytes, expected {}",
                number,
                bytes.len(),
                file_size
            )));
        }
        check_table(&bytes).map(|_| ())
    }

    fn dump_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("sstable_{:06}.txt", number))
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn check_table(bytes: &[u8]) -> Result<TableSummary> {
    if bytes.len() < HEADER_SIZE + SUMMARY_LEN_SIZE {
        return Err(PrismError::Corruption("table file too short".to_string()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(PrismError::Corruption(format!(
            "invalid table magic: expected PRKV, got {:?}",
            &bytes[0..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(PrismError::Storage(format!(
            "Unsupported table version: {}",
            version
        )));
    }
    let entry_count = read_u64(bytes, COUNT_OFFSET as usize);

    let summary_len = read_u32(bytes, bytes.len() - SUMMARY_LEN_SIZE) as usize;
    let summary_end = bytes.len() - SUMMARY_LEN_SIZE;
    if summary_len > summary_end - HEADER_SIZE {
        return Err(PrismError::Corruption(format!(
            "table summary length {} overruns file",
            summary_len
        )));
    }
    let summary_start = summary_end - summary_len;
    let summary: TableSummary = bincode::deserialize(&bytes[summary_start..summary_end])?;

    let data = &bytes[HEADER_SIZE..summary_start];
    if summary.data_len != data.len() as u64 {
        return Err(PrismError::Corruption(format!(
            "data block is {} bytes, summary says {}",
            data.len(),
            summary.data_len
        )));
    }
    if summary.entry_count != entry_count {
        return Err(PrismError::Corruption(format!(
            "header counts {} entries, summary {}",
            entry_count, summary.entry_count
        )));
    }
    if crc32fast::hash(data) != summary.data_crc {
        return Err(PrismError::Corruption(
            "table data checksum mismatch".to_string(),
        ));
    }

    Ok(summary)
}

// =============================================================================
// Sink
// =============================================================================

/// Writes one table file; entries must arrive in sorted order
pub struct FileTableSink {
    path: PathBuf,
    /// `None` once finished
    writer: Option<BufWriter<File>>,
    entry_count: u64,
    data_len: u64,
    smallest: Option<Vec<u8>>,
    largest: Option<Vec<u8>>,
    data_hasher: crc32fast::Hasher,
}

impl FileTableSink {
    /// Create the file and write its header (entry count patched in `finish`)
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            entry_count: 0,
            data_len: 0,
            smallest: None,
            largest: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| PrismError::Storage("table already finished".to_string()))
    }
}

impl TableSink for FileTableSink {
    fn add(&mut self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        let key_len_bytes = (internal_key.len() as u32).to_le_bytes();
        let val_len_bytes = (value.len() as u32).to_le_bytes();

        let writer = self.writer()?;
        writer.write_all(&key_len_bytes)?;
        writer.write_all(&val_len_bytes)?;
        writer.write_all(internal_key)?;
        writer.write_all(value)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(internal_key);
        self.data_hasher.update(value);

        if self.smallest.is_none() {
            self.smallest = Some(internal_key.to_vec());
        }
        self.largest = Some(internal_key.to_vec());
        self.data_len += 8 + internal_key.len() as u64 + value.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<u64> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| PrismError::Storage("table already finished".to_string()))?;

        let summary = TableSummary {
            entry_count: self.entry_count,
            data_len: self.data_len,
            data_crc: self.data_hasher.clone().finalize(),
            smallest: self.smallest.clone().unwrap_or_default(),
            largest: self.largest.clone().unwrap_or_default(),
        };
        let encoded = bincode::serialize(&summary)?;
        writer.write_all(&encoded)?;
        writer.write_all(&(encoded.len() as u32).to_le_bytes())?;
        writer.flush()?;

        let mut file = writer
            .into_inner()
            .map_err(|e| PrismError::Storage(format!("Failed to flush table: {}", e)))?;
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        Ok(file.metadata()?.len())
    }
}
