//! A flat, in-memory file system standing in for the host directory the
//! kernel reads executables from.
//!
//! Removing a name does not destroy the data of files that are still open:
//! every handle keeps its own reference to the file body, which goes away
//! with the last handle.
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A file as seen through one open handle. Reads and writes move the
/// handle's own position.
pub trait OpenFile: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Read up to `buf.len()` bytes; `0` at end of file, `-1` on failure.
    fn read(&self, buf: &mut [u8]) -> i32;

    /// Write all of `data`; returns the count written or `-1`.
    fn write(&self, data: &[u8]) -> i32;

    fn length(&self) -> i64 {
        -1
    }

    fn close(&self) {}
}

#[derive(Debug, Default)]
struct FileBody {
    bytes: RwLock<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct StubFileSystem {
    files: DashMap<String, Arc<FileBody>>,
}

impl StubFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `name`. With `create`, a missing file is created empty; an
    /// existing one is opened untouched.
    pub fn open(&self, name: &str, create: bool) -> Option<Box<dyn OpenFile>> {
        if name.is_empty() {
            return None;
        }
        let body = if create {
            self.files
                .entry(name.to_string())
                .or_insert_with(|| {
                    debug!(target: "machine", file = name, "created file");
                    Arc::new(FileBody::default())
                })
                .clone()
        } else {
            self.files.get(name)?.clone()
        };
        Some(Box::new(StubFile {
            name: name.to_string(),
            body,
            position: Mutex::new(0),
        }))
    }

    /// Remove a name from the namespace. Returns false when it was absent.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.files.remove(name).is_some();
        if removed {
            debug!(target: "machine", file = name, "removed file");
        }
        removed
    }

    pub fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Place a complete file, replacing any previous one of that name.
    pub fn install(&self, name: &str, contents: Vec<u8>) {
        self.files.insert(
            name.to_string(),
            Arc::new(FileBody {
                bytes: RwLock::new(contents),
            }),
        );
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).map(|body| body.bytes.read().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[derive(Debug)]
struct StubFile {
    name: String,
    body: Arc<FileBody>,
    position: Mutex<usize>,
}

impl OpenFile for StubFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> i32 {
        let mut pos = self.position.lock();
        let bytes = self.body.bytes.read();
        if *pos >= bytes.len() {
            return 0;
        }
        let amount = buf.len().min(bytes.len() - *pos);
        buf[..amount].copy_from_slice(&bytes[*pos..*pos + amount]);
        *pos += amount;
        amount as i32
    }

    fn write(&self, data: &[u8]) -> i32 {
        let mut pos = self.position.lock();
        let mut bytes = self.body.bytes.write();
        let end = *pos + data.len();
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[*pos..end].copy_from_slice(data);
        *pos = end;
        data.len() as i32
    }

    fn length(&self) -> i64 {
        self.body.bytes.read().len() as i64
    }
}
