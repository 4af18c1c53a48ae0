//! Depth-first traversal of a directory tree

use std::iter::FusedIterator;
use std::sync::Arc;
use std::vec;

use super::entry::FileEntry;
use crate::disc::reader::{ImageError, ImageResult};

/// Options for [`Enumerator`]
#[derive(Debug, Clone, Copy)]
pub struct EnumerationOptions {
    /// Yield entries with the hidden flag set (and descend into hidden directories)
    pub show_hidden: bool,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        Self { show_hidden: true }
    }
}

/// One step of an enumeration
#[derive(Debug, Clone)]
pub struct EnumeratedEntry {
    /// Path relative to the directory the enumeration started from
    pub path: String,
    /// Depth below the starting directory; its direct children are level 1
    pub level: usize,
    pub entry: Arc<FileEntry>,
}

/// Lazy depth-first iterator over everything below a directory.
///
/// Each directory is listed when the enumeration first reaches it. A
/// directory whose extent is already open further up the tree is a cycle and
/// ends the walk with [`ImageError::MalformedRecord`]. Once an error has been
/// yielded the iterator is exhausted.
#[derive(Debug)]
pub struct Enumerator {
    base: String,
    options: EnumerationOptions,
    stack: Vec<vec::IntoIter<Arc<FileEntry>>>,
    /// Extent start of the directory behind each `stack` level
    ancestors: Vec<u64>,
    pending: Option<Arc<FileEntry>>,
    level: usize,
    failed: bool,
}

impl Enumerator {
    pub fn new(start: Arc<FileEntry>, options: EnumerationOptions) -> ImageResult<Self> {
        if !start.is_directory() {
            return Err(ImageError::NotADirectory(start.path().to_string()));
        }

        Ok(Self {
            base: start.path().trim_end_matches('/').to_string(),
            options,
            stack: Vec::new(),
            ancestors: Vec::new(),
            pending: Some(start),
            level: 0,
            failed: false,
        })
    }

    /// Don't descend into the directory that was yielded last
    pub fn skip_descendants(&mut self) {
        if self.level > 0 {
            self.pending = None;
        }
    }

    /// Level of the entry yielded last
    pub fn level(&self) -> usize {
        self.level
    }

    fn fail(&mut self, error: ImageError) -> Option<ImageResult<EnumeratedEntry>> {
        self.failed = true;
        self.stack.clear();
        self.ancestors.clear();
        Some(Err(error))
    }

    fn relative_path(&self, entry: &FileEntry) -> String {
        let path = entry.path();
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .trim_start_matches('/')
            .to_string()
    }
}

impl Iterator for Enumerator {
    type Item = ImageResult<EnumeratedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some(dir) = self.pending.take() {
            let start = dir.data_range().start;
            if self.ancestors.contains(&start) {
                return self.fail(ImageError::MalformedRecord {
                    offset: start,
                    reason: format!("directory cycle at {}", dir.path()),
                });
            }
            match dir.subentries() {
                Ok(children) => {
                    self.stack.push(children.to_vec().into_iter());
                    self.ancestors.push(start);
                }
                Err(e) => return self.fail(e),
            }
        }

        loop {
            let entry = match self.stack.last_mut()?.next() {
                Some(entry) => entry,
                None => {
                    self.stack.pop();
                    self.ancestors.pop();
                    continue;
                }
            };

            if !self.options.show_hidden && entry.is_hidden() {
                continue;
            }

            self.level = self.stack.len();
            if entry.is_directory() {
                self.pending = Some(Arc::clone(&entry));
            }
            return Some(Ok(EnumeratedEntry {
                path: self.relative_path(&entry),
                level: self.level,
                entry,
            }));
        }
    }
}

impl FusedIterator for Enumerator {}
