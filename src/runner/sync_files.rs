//! Process-wide registry of shared append-only output files.
//!
//! Symbol-table outputs are keyed by the file a declaration lives in, so two
//! workers can need the same output file at once. The registry hands out
//! scoped handles: the first open of a path truncates, every later open
//! appends, and writing requires taking the per-file lock, so lines from
//! different workers never interleave.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct StreamSlot {
    writer: Option<BufWriter<File>>,
    opened_before: bool,
}

struct FileEntry {
    users: AtomicUsize,
    stream: Mutex<StreamSlot>,
}

impl FileEntry {
    fn new() -> Self {
        Self {
            users: AtomicUsize::new(0),
            stream: Mutex::new(StreamSlot {
                writer: None,
                opened_before: false,
            }),
        }
    }
}

/// Registry of shared output files. One per process; workers share it by
/// reference (`Arc`).
#[derive(Default)]
pub struct SynchronisedFiles {
    entries: Mutex<HashMap<PathBuf, Arc<FileEntry>>>,
}

impl SynchronisedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a handle on the output file at `path`, creating (truncating)
    /// it on first acquisition and reopening in append mode when all earlier
    /// handles have been dropped in between.
    pub fn open(&self, path: impl AsRef<Path>) -> io::Result<SynchronisedFile<'_>> {
        let path = path.as_ref();
        // The open happens under the registry lock, so a concurrent close
        // (handle drop) cannot race the reopen.
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(FileEntry::new()))
            .clone();

        if entry.users.fetch_add(1, Ordering::SeqCst) == 0 {
            let mut slot = entry.stream.lock().unwrap();
            if slot.writer.is_none() {
                let open_result = if slot.opened_before {
                    OpenOptions::new().append(true).create(true).open(path)
                } else {
                    File::create(path)
                };
                let file = match open_result {
                    Ok(file) => file,
                    Err(err) => {
                        entry.users.fetch_sub(1, Ordering::SeqCst);
                        return Err(err);
                    }
                };
                slot.writer = Some(BufWriter::new(file));
                slot.opened_before = true;
            }
        }

        Ok(SynchronisedFile {
            registry: self,
            entry,
        })
    }
}

/// Scoped acquisition of one shared file. Dropping the last handle for a
/// path flushes and closes the underlying file.
pub struct SynchronisedFile<'a> {
    registry: &'a SynchronisedFiles,
    entry: Arc<FileEntry>,
}

impl SynchronisedFile<'_> {
    /// Take the per-file write lock. Blocks while another worker holds it.
    pub fn stream(&self) -> LockedStream<'_> {
        LockedStream {
            guard: self.entry.stream.lock().unwrap(),
        }
    }
}

impl Drop for SynchronisedFile<'_> {
    fn drop(&mut self) {
        // Serialise the close against concurrent reopens.
        let _entries = self.registry.entries.lock().unwrap();
        if self.entry.users.fetch_sub(1, Ordering::SeqCst) == 1 {
            let mut slot = self.entry.stream.lock().unwrap();
            if let Some(mut writer) = slot.writer.take() {
                let _ = writer.flush();
            }
        }
    }
}

/// Exclusive, flushed-on-release access to a shared file's stream.
pub struct LockedStream<'a> {
    guard: MutexGuard<'a, StreamSlot>,
}

impl Write for LockedStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer().flush()
    }
}

impl LockedStream<'_> {
    fn writer(&mut self) -> &mut BufWriter<File> {
        self.guard
            .writer
            .as_mut()
            .expect("stream closed while a handle is alive")
    }
}

impl Drop for LockedStream<'_> {
    fn drop(&mut self) {
        if let Some(writer) = self.guard.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}
