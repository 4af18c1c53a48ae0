//! Path resolution with a per-image lookup cache

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::entry::FileEntry;
use crate::disc::reader::{ImageError, ImageResult};

/// Split a slash-separated path into components, resolving "." and "..".
/// ".." at the root stays at the root.
pub fn path_components(path: &str) -> Vec<&str> {
    let mut components = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            name => components.push(name),
        }
    }
    components
}

/// Canonical form of a path: leading slash, no empty or dot components
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path_components(path).join("/"))
}

fn cache_key(components: &[&str]) -> String {
    format!("/{}", components.join("/")).to_lowercase()
}

/// Memoized path lookups. Keys are case-folded, so `/readme.txt` and
/// `/README.TXT` share an entry.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: Mutex<HashMap<String, Option<Arc<FileEntry>>>>,
    cache_missing: bool,
    walks: AtomicUsize,
}

impl PathCache {
    /// With `cache_missing`, failed lookups are remembered too
    pub fn new(cache_missing: bool) -> Self {
        Self {
            cache_missing,
            ..Self::default()
        }
    }

    /// Number of lookups that were not answered straight from the cache
    pub fn walk_count(&self) -> usize {
        self.walks.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Option<Arc<FileEntry>>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn insert(&self, key: String, entry: Option<Arc<FileEntry>>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Resolve `path` below `root`, comparing names case-insensitively.
    ///
    /// Every directory walked through is cached on the way, so later lookups
    /// of siblings start from the deepest known prefix. The lock is not held
    /// while directories are parsed.
    pub fn resolve(&self, root: &Arc<FileEntry>, path: &str) -> ImageResult<Arc<FileEntry>> {
        let components = path_components(path);
        let key = cache_key(&components);

        match self.lookup(&key) {
            Some(Some(entry)) => return Ok(entry),
            Some(None) => return Err(ImageError::NotFound(path.to_string())),
            None => {}
        }

        self.walks.fetch_add(1, Ordering::Relaxed);
        log::debug!("Path cache miss for {}", path);

        let mut current = Arc::clone(root);
        for depth in 0..components.len() {
            let prefix = cache_key(&components[..=depth]);
            match self.lookup(&prefix) {
                Some(Some(entry)) => {
                    current = entry;
                    continue;
                }
                Some(None) => return Err(ImageError::NotFound(path.to_string())),
                None => {}
            }

            let name = components[depth];
            let found = current
                .subentries()?
                .iter()
                .find(|child| child.matches_name(name))
                .cloned();

            match found {
                Some(next) => {
                    self.insert(prefix, Some(Arc::clone(&next)));
                    current = next;
                }
                None => {
                    if self.cache_missing {
                        self.insert(prefix, None);
                    }
                    return Err(ImageError::NotFound(path.to_string()));
                }
            }
        }

        if components.is_empty() {
            self.insert(key, Some(Arc::clone(&current)));
        }
        Ok(current)
    }
}
