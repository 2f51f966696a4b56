//! Table builder driver
//!
//! Streams an iterator into a new table and writes the optional dump.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::keys::{describe_entry, InternalKey};

use super::{FileMetaData, TableSink, TableStore};

/// Build table `number` from every entry of `iter`.
///
/// `iter` yields internal keys in order (a raw memtable iterator). An empty
/// iterator produces no table and `file_size == 0`. On any error, including
/// one reported by `iter.status()`, the table is removed and the error
/// returned. With `dump`, a plaintext rendering is written to
/// `store.dump_path(number)`.
pub fn build_table<S, I>(store: &S, iter: &mut I, number: u64, dump: bool) -> Result<FileMetaData>
where
    S: TableStore,
    I: StorageIterator + ?Sized,
{
    let mut meta = FileMetaData::new(number);
    iter.seek_to_first();

    let mut result = if iter.valid() {
        write_table(store, iter, &mut meta, dump)
    } else {
        Ok(())
    };

    // Input errors take precedence
    if let Err(e) = iter.status() {
        result = Err(e);
    }

    match result {
        Ok(()) if meta.file_size > 0 => {
            info!(
                number,
                file_size = meta.file_size,
                "Built table"
            );
            Ok(meta)
        }
        Ok(()) => {
            debug!(number, "Nothing to build");
            store.remove(number)?;
            Ok(meta)
        }
        Err(e) => {
            warn!(number, error = %e, "Table build failed, removing output");
            if let Err(remove_err) = store.remove(number) {
                warn!(number, error = %remove_err, "Failed to remove partial table");
            }
            Err(e)
        }
    }
}

fn write_table<S, I>(store: &S, iter: &mut I, meta: &mut FileMetaData, dump: bool) -> Result<()>
where
    S: TableStore,
    I: StorageIterator + ?Sized,
{
    let mut sink = store.create(meta.number)?;
    let mut lines = Vec::new();

    meta.smallest = InternalKey::decode_from(iter.key())?;
    while iter.valid() {
        let key = iter.key();
        let value = iter.value();
        meta.largest = InternalKey::decode_from(key)?;
        sink.add(key, value)?;
        if dump {
            lines.push(describe_entry(key, value)?);
        }
        iter.next();
    }

    meta.file_size = sink.finish()?;
    drop(sink);

    if dump {
        let path = store.dump_path(meta.number);
        write_dump(&path, meta, &lines)?;
        debug!(path = %path.display(), entries = lines.len(), "Wrote table dump");
    }

    store.verify(meta.number, meta.file_size)
}

/// `number`, `file_size`, `smallest`, `largest` header lines, then one line
/// per entry
fn write_dump(path: &Path, meta: &FileMetaData, lines: &[String]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "number: {}", meta.number)?;
    writeln!(out, "file_size: {}", meta.file_size)?;
    writeln!(
        out,
        "smallest: {}",
        String::from_utf8_lossy(meta.smallest.user_key())
    )?;
    writeln!(
        out,
        "largest: {}",
        String::from_utf8_lossy(meta.largest.user_key())
    )?;
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}
