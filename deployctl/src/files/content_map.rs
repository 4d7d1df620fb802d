//! Content-addressed view of a local file tree.
//!
//! Every regular file under the root is hashed (SHA-256 over its bytes only)
//! and grouped by hash, so paths sharing identical content collapse into a
//! single entry that is uploaded at most once.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use deploy_api::ManifestFile;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::errors::ClientError;

/// Per-tree ignore file, gitignore syntax.
pub const IGNORE_FILE: &str = ".deployignore";

/// Always excluded from the walk.
const DEFAULT_EXCLUDES: &[&str] = &[".git", ".hg", ".svn", "node_modules", ".deployctl", ".DS_Store"];

/// One distinct content of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the first file (in walk order) holding this content
    pub path: PathBuf,

    /// Byte length
    pub size: u64,

    /// Lowercase hex SHA-256 of the bytes
    pub hash: String,

    /// Relative names (always `/`-separated) sharing this content
    pub names: BTreeSet<String>,
}

/// Mapping from content hash to file entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMap {
    entries: BTreeMap<String, FileEntry>,
}

impl ContentMap {
    /// Walk `root` and hash every file selected by the include/exclude rules.
    ///
    /// Include patterns whitelist files (directories are still descended);
    /// exclude patterns and `.deployignore` files remove paths. Fails with
    /// [`ClientError::FileSystem`] when the root or anything below it cannot
    /// be read.
    pub fn build(root: &Path, include: &[String], exclude: &[String]) -> Result<Self, ClientError> {
        let meta = fs::metadata(root).map_err(|e| ClientError::file_system(root, e))?;
        if !meta.is_dir() {
            return Err(ClientError::file_system(
                root,
                io::Error::new(io::ErrorKind::NotADirectory, "deployment root is not a directory"),
            ));
        }
        fs::read_dir(root).map_err(|e| ClientError::file_system(root, e))?;

        let mut overrides = OverrideBuilder::new(root);
        for pattern in include {
            overrides
                .add(pattern)
                .map_err(|e| ClientError::ConfigError(format!("include {}: {}", pattern, e)))?;
        }
        for pattern in exclude.iter().map(String::as_str).chain(DEFAULT_EXCLUDES.iter().copied()) {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| ClientError::ConfigError(format!("exclude {}: {}", pattern, e)))?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| ClientError::ConfigError(e.to_string()))?;

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .add_custom_ignore_filename(IGNORE_FILE)
            .follow_links(false)
            .overrides(overrides)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut map = ContentMap::default();
        for entry in walker {
            let entry = entry.map_err(|e| ClientError::file_system(root, io::Error::other(e)))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let name = relative_name(root, path)?;
            let (hash, size) = hash_file(path)?;
            debug!(name = %name, hash = %hash, size, "hashed file");
            map.insert(path.to_path_buf(), name, hash, size);
        }

        info!(
            "Hashed {} files into {} distinct contents ({} bytes)",
            map.file_count(),
            map.len(),
            map.total_size()
        );
        Ok(map)
    }

    /// Same as [`ContentMap::build`], off the async executor
    pub async fn build_async(
        root: PathBuf,
        include: Vec<String>,
        exclude: Vec<String>,
    ) -> Result<Self, ClientError> {
        tokio::task::spawn_blocking(move || Self::build(&root, &include, &exclude)).await?
    }

    /// Register `name` under `hash`; the first path seen for a hash is kept.
    pub fn insert(&mut self, path: PathBuf, name: String, hash: String, size: u64) {
        match self.entries.entry(hash) {
            btree_map::Entry::Occupied(mut slot) => {
                slot.get_mut().names.insert(name);
            }
            btree_map::Entry::Vacant(slot) => {
                let hash = slot.key().clone();
                slot.insert(FileEntry {
                    path,
                    size,
                    hash,
                    names: BTreeSet::from([name]),
                });
            }
        }
    }

    pub fn get(&self, hash: &str) -> Option<&FileEntry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    /// Number of distinct contents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of relative paths across all contents
    pub fn file_count(&self) -> usize {
        self.entries.values().map(|e| e.names.len()).sum()
    }

    /// Bytes to transfer if every content were missing
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every relative name in the tree, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .values()
            .flat_map(|e| e.names.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names
    }

    /// Manifest sent with the creation request, ordered by hash
    pub fn manifest(&self) -> Vec<ManifestFile> {
        self.entries
            .values()
            .map(|e| ManifestFile {
                sha: e.hash.clone(),
                size: e.size,
                names: e.names.iter().cloned().collect(),
            })
            .collect()
    }
}

/// Lowercase hex SHA-256 of `data`
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hash_file(path: &Path) -> Result<(String, u64), ClientError> {
    let mut file = fs::File::open(path).map_err(|e| ClientError::file_system(path, e))?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher).map_err(|e| ClientError::file_system(path, e))?;
    Ok((hex::encode(hasher.finalize()), size))
}

fn relative_name(root: &Path, path: &Path) -> Result<String, ClientError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| ClientError::file_system(path, io::Error::other(e)))?;

    // Normalize to forward slashes.
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
