//! Backing stores for the resource lines.
//!
//! The format is newline-delimited, one candidate per line. A store is
//! always rewritten in full: every line, in order, each terminated by `\n`.
//! Files are handled as bytes, so a line that is not UTF-8 does not stop the
//! others from being searched.

use crate::error::{ResourceError, Result};
use crate::line::{parse_lines, render_lines, Line};
use parking_lot::Mutex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Where the resource lines live between critical sections.
pub trait LineStore: Send + Sync + 'static {
    /// Read every line.
    fn load(&self) -> Result<Vec<Line>>;

    /// Replace the stored content with `lines`.
    fn persist(&self, lines: &[Line]) -> Result<()>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// A store backed by a text file on disk.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineStore for FileStore {
    fn load(&self) -> Result<Vec<Line>> {
        let mut file = File::open(&self.path).map_err(|source| ResourceError::Open {
            path: self.path.clone(),
            source,
        })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| ResourceError::Read {
                path: self.path.clone(),
                source,
            })?;

        Ok(parse_lines(&bytes))
    }

    fn persist(&self, lines: &[Line]) -> Result<()> {
        std::fs::write(&self.path, render_lines(lines)).map_err(|source| ResourceError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory store with switchable failures, for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lines: Mutex<Vec<Line>>,
    fail_loads: AtomicBool,
    fail_persists: AtomicBool,
}

impl MemoryStore {
    pub fn from_lines<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Line>,
    {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
            fail_loads: AtomicBool::new(false),
            fail_persists: AtomicBool::new(false),
        }
    }

    /// Parse newline-delimited bytes the way a file would be read.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_lines(parse_lines(bytes))
    }

    /// Make every subsequent `load` fail.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `persist` fail.
    pub fn fail_persists(&self, fail: bool) {
        self.fail_persists.store(fail, Ordering::SeqCst);
    }

    /// Current content.
    pub fn snapshot(&self) -> Vec<Line> {
        self.lines.lock().clone()
    }

    /// Current content in the on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        render_lines(&self.lines.lock())
    }
}

impl LineStore for MemoryStore {
    fn load(&self) -> Result<Vec<Line>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(ResourceError::Unavailable("load rejected".to_string()));
        }
        Ok(self.lines.lock().clone())
    }

    fn persist(&self, lines: &[Line]) -> Result<()> {
        if self.fail_persists.load(Ordering::SeqCst) {
            return Err(ResourceError::Unavailable("persist rejected".to_string()));
        }
        *self.lines.lock() = lines.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl<S: LineStore> LineStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Vec<Line>> {
        (**self).load()
    }

    fn persist(&self, lines: &[Line]) -> Result<()> {
        (**self).persist(lines)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::from_lines(["abc", "aba"]);
        let mut lines = store.load().unwrap();
        lines[1] = Line::from("1 1 1 ");
        store.persist(&lines).unwrap();

        assert_eq!(store.snapshot(), vec!["abc", "1 1 1 "]);
        assert_eq!(store.to_bytes(), b"abc\n1 1 1 \n");
    }

    #[test]
    fn memory_store_failures_are_switchable() {
        let store = MemoryStore::from_lines(["x"]);
        store.fail_loads(true);
        assert!(matches!(store.load(), Err(ResourceError::Unavailable(_))));
        store.fail_loads(false);
        assert!(store.load().is_ok());

        store.fail_persists(true);
        assert!(store.persist(&[]).is_err());
        assert_eq!(store.snapshot(), vec!["x"]);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let store = FileStore::new("/definitely/not/here/permit-lines.txt");
        match store.load() {
            Err(ResourceError::Open { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here/permit-lines.txt"));
            }
            other => panic!("expected open error, got {:?}", other),
        }
    }
}
