//! Append-only JSON-lines log

use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tracing::warn;
use votebatch_runtime::{Result, VoteBatchError};

/// Durable log of `T` records, one JSON document per line.
///
/// Every append is flushed with `sync_data` before it returns. An append that
/// fails is cut back off the file, so a later append never lands behind a
/// partial line. A trailing line cut short by a crash is dropped when the log
/// is reopened; a corrupt line anywhere else is an error.
pub struct AppendLog<T> {
    file: Option<File>,
    path: Option<PathBuf>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> AppendLog<T> {
    /// A log that keeps nothing, for tests and throwaway state.
    pub fn in_memory() -> Self {
        Self { file: None, path: None, _record: PhantomData }
    }

    /// Open (or create) the log at `path` and return the records it holds.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<T>)> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).append(true).create(true).open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut records = Vec::new();
        let mut valid_len = 0usize;
        let mut lines = contents.split_inclusive('\n').peekable();
        while let Some(line) = lines.next() {
            let is_last = lines.peek().is_none();
            let complete = line.ends_with('\n');
            match serde_json::from_str::<T>(line.trim_end()) {
                Ok(record) if complete => {
                    records.push(record);
                    valid_len += line.len();
                }
                Err(e) if !is_last => {
                    return Err(VoteBatchError::serialization_error(format!(
                        "corrupt record in {}: {}",
                        path.display(),
                        e
                    )))
                }
                _ => {
                    warn!(path = %path.display(), "dropping truncated trailing log line");
                }
            }
        }
        if valid_len < contents.len() {
            file.set_len(valid_len as u64)?;
        }

        Ok((Self { file: Some(file), path: Some(path), _record: PhantomData }, records))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_durable(&self) -> bool {
        self.file.is_some()
    }

    pub fn append(&mut self, record: &T) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        append_line(file, &line).map_err(|e| {
            warn!(path = ?self.path, error = %e, "append failed");
            e.into()
        })
    }
}

/// Storage a log line can be appended to and cut back from.
trait LineSink: Write {
    fn end(&self) -> io::Result<u64>;
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LineSink for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write and sync `line`, or leave the sink at its previous length.
fn append_line<S: LineSink>(sink: &mut S, line: &[u8]) -> io::Result<()> {
    let len = sink.end()?;
    if let Err(e) = sink.write_all(line).and_then(|_| sink.sync()) {
        sink.truncate(len)?;
        return Err(e);
    }
    Ok(())
}
