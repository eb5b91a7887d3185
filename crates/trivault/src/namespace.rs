//! Hierarchical namespace over the replica bases.
//!
//! Modules are plain directories mirrored under every base.  Enumeration
//! walks each base with an explicit work queue (bounded stack, no
//! recursion) and reconciles the three views with two different policies:
//!
//! - **Keys** follow a quorum rule: the base that knows the *most* records
//!   wins, ties preferring the lower index.  A replica that fell behind in
//!   writes must not hide keys from the caller.
//! - **Modules** follow a union rule: a module appears as long as *any*
//!   replica still remembers it, because modules represent namespace intent
//!   rather than data.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::replica::key_from_file_name;

/// File names skipped during enumeration.
const IGNORED_FILES: &[&str] = &[".DS_Store"];

// ---------------------------------------------------------------------------
// Module paths
// ---------------------------------------------------------------------------

/// A validated module path, relative to each replica base.
///
/// Stored in normalized form: no leading or trailing separators, components
/// joined with `/`.  The empty path is the root (the base directory itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath(String);

impl ModulePath {
    /// The root module (the base directory itself).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalize a caller-supplied module path.
    ///
    /// `""` and `"*"` both name the root.  Redundant separators collapse;
    /// `.`/`..` components and backslashes are rejected so a module can
    /// never escape its replica base.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw == "*" {
            return Ok(Self::root());
        }

        let mut components = Vec::new();
        for component in raw.split('/') {
            if component.is_empty() {
                continue;
            }
            if component == "." || component == ".." {
                return Err(StoreError::InvalidModulePath {
                    reason: format!("component `{component}` is not allowed"),
                });
            }
            if component.contains('\\') {
                return Err(StoreError::InvalidModulePath {
                    reason: "backslashes are not allowed in module paths".into(),
                });
            }
            components.push(component);
        }

        Ok(Self(components.join("/")))
    }

    /// Whether this is the root module.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized path (empty for the root).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path as a relative filesystem path.
    pub(crate) fn as_rel_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_empty() { "/" } else { &self.0 })
    }
}

/// One enumerated record: the module directory it lives in and its key.
///
/// `module` is the directory path relative to the replica base with a
/// leading `/` (the root is the empty string), e.g. a record stored in
/// module `cfg` reports `module == "/cfg"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub module: String,
    pub key: String,
}

// ---------------------------------------------------------------------------
// Namespace manager
// ---------------------------------------------------------------------------

/// Directory-tree operations and enumeration across the three bases.
pub struct Namespace {
    bases: [PathBuf; 3],
}

impl Namespace {
    /// Create a namespace manager over three base directories.
    pub fn new(bases: [PathBuf; 3]) -> Self {
        Self { bases }
    }

    // -- Mutation -----------------------------------------------------------

    /// Create `parent/name` under every base, including intermediate
    /// directories.  `parent` may be `""` or `"*"` for the root.  Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReplicasFailed`] when no base could be mutated.
    pub fn create_module(&self, parent: &str, name: &str) -> Result<ModulePath> {
        if name.is_empty() {
            return Err(StoreError::InvalidModulePath {
                reason: "module name must not be empty".into(),
            });
        }
        let parent = ModulePath::parse(parent)?;
        let path = ModulePath::parse(&format!("{}/{name}", parent.as_str()))?;

        let mut created = 0;
        for base in &self.bases {
            let dir = base.join(path.as_rel_path());
            match fs::create_dir_all(&dir) {
                Ok(()) => created += 1,
                Err(e) => warn!(path = %dir.display(), error = %e, "module create failed"),
            }
        }
        if created == 0 {
            return Err(StoreError::ReplicasFailed {
                operation: "create_module",
            });
        }

        info!(module = %path, "module created");
        Ok(path)
    }

    /// Recursively delete a module tree under every base.  Absent trees
    /// count as success (removal is idempotent).
    pub fn remove_module(&self, path: &ModulePath) -> Result<()> {
        if path.is_root() {
            return Err(StoreError::InvalidModulePath {
                reason: "cannot remove the root module".into(),
            });
        }

        let mut removed = 0;
        for base in &self.bases {
            let dir = base.join(path.as_rel_path());
            match fs::remove_dir_all(&dir) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => removed += 1,
                Err(e) => warn!(path = %dir.display(), error = %e, "module remove failed"),
            }
        }
        if removed == 0 {
            return Err(StoreError::ReplicasFailed {
                operation: "remove_module",
            });
        }

        info!(module = %path, "module removed");
        Ok(())
    }

    /// Delete every record file under a module tree on every base, keeping
    /// the directory structure in place.  Best-effort.
    pub fn purge_module_records(&self, path: &ModulePath) {
        for base in &self.bases {
            let root = base.join(path.as_rel_path());
            for (dir, file_name) in walk_files(&root) {
                if key_from_file_name(&file_name).is_some() {
                    let record = dir.join(&file_name);
                    if let Err(e) = fs::remove_file(&record) {
                        warn!(path = %record.display(), error = %e, "record purge failed");
                    }
                }
            }
        }
        info!(module = %path, "module records purged");
    }

    /// Remove all three base trees, records and modules alike.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] with the underlying error when no base
    /// could be removed.
    pub fn delete_all(&self) -> Result<()> {
        let mut removed = 0;
        let mut last_error = None;
        for base in &self.bases {
            match fs::remove_dir_all(base) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => removed += 1,
                Err(e) => {
                    warn!(path = %base.display(), error = %e, "base remove failed");
                    last_error = Some(e);
                }
            }
        }
        if removed == 0 {
            // Total failure is established; surface the underlying cause.
            return Err(match last_error {
                Some(e) => StoreError::Io(e),
                None => StoreError::ReplicasFailed {
                    operation: "delete_all",
                },
            });
        }
        info!("all stored data deleted");
        Ok(())
    }

    // -- Enumeration --------------------------------------------------------

    /// Every record known to the best-informed replica.
    pub fn list_all_keys(&self) -> Vec<KeyEntry> {
        self.quorum_keys(|_| true)
    }

    /// Records whose module path contains `module` as a slash-bounded
    /// component sequence (the module and all its submodules).
    pub fn list_keys_in_module(&self, module: &ModulePath) -> Vec<KeyEntry> {
        self.quorum_keys(|entry| contains_component(&entry.module, module.as_str()))
    }

    /// Records whose module path ends with `module` (direct children only).
    pub fn list_direct_keys_in_module(&self, module: &ModulePath) -> Vec<KeyEntry> {
        self.quorum_keys(|entry| entry.module.ends_with(module.as_str()))
    }

    /// Every module directory remembered by any base, sorted and
    /// deduplicated.
    pub fn list_all_modules(&self) -> Vec<String> {
        self.union_modules(|_| true)
    }

    /// Module directories whose relative path contains `prefix` as a
    /// substring, sorted and deduplicated.
    ///
    /// Substring matching is part of the established behavior: `"foo"`
    /// also matches `"barfoo"`.  Callers needing exact scoping should
    /// filter the result.
    pub fn list_submodules(&self, prefix: &str) -> Vec<String> {
        self.union_modules(|module| module.contains(prefix))
    }

    /// Whether any record anywhere carries this data key.
    pub fn contains(&self, data_key: &str) -> bool {
        self.list_all_keys().iter().any(|entry| entry.key == data_key)
    }

    // -- Internal helpers ---------------------------------------------------

    /// Collect records per base, filter, and pick the largest result set
    /// (ties prefer the lower-indexed base).
    fn quorum_keys(&self, keep: impl Fn(&KeyEntry) -> bool) -> Vec<KeyEntry> {
        let mut sets: [Vec<KeyEntry>; 3] = Default::default();
        for (i, base) in self.bases.iter().enumerate() {
            for (dir, file_name) in walk_files(base) {
                if IGNORED_FILES.contains(&file_name.as_str()) {
                    continue;
                }
                let Some(key) = key_from_file_name(&file_name) else {
                    continue;
                };
                let entry = KeyEntry {
                    module: rel_dir(base, &dir),
                    key: key.to_string(),
                };
                if keep(&entry) {
                    sets[i].push(entry);
                }
            }
        }

        let mut best = 0;
        for i in 1..sets.len() {
            if sets[i].len() > sets[best].len() {
                best = i;
            }
        }
        debug!(
            r0 = sets[0].len(),
            r1 = sets[1].len(),
            r2 = sets[2].len(),
            chosen = best,
            "key enumeration quorum"
        );
        std::mem::take(&mut sets[best])
    }

    /// Collect directories across every base, filter, sort, deduplicate.
    fn union_modules(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut modules = Vec::new();
        for base in &self.bases {
            for dir in walk_dirs(base) {
                let rel = rel_dir(base, &dir);
                // Module listings use base-relative paths without the
                // leading separator.
                let rel = rel.trim_start_matches('/').to_string();
                if !rel.is_empty() && keep(&rel) {
                    modules.push(rel);
                }
            }
        }
        modules.sort();
        modules.dedup();
        modules
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Breadth-first walk yielding `(directory, file_name)` for every regular
/// file under `root`.  Unreadable directories are skipped.
fn walk_files(root: &Path) -> Vec<(PathBuf, String)> {
    let mut files = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                queue.push_back(entry.path());
            } else if file_type.is_file() {
                files.push((dir.clone(), entry.file_name().to_string_lossy().into_owned()));
            }
        }
    }
    files
}

/// Breadth-first walk yielding every directory strictly under `root`.
fn walk_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                dirs.push(entry.path());
                queue.push_back(entry.path());
            }
        }
    }
    dirs
}

/// Directory path relative to `base`, with a leading `/`; the base itself
/// is the empty string.
fn rel_dir(base: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(base).unwrap_or(dir);
    let mut out = String::new();
    for component in rel.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Whether `module_dir` (leading-slash relative form) contains `needle` as
/// a slash-bounded component sequence.
fn contains_component(module_dir: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let components: Vec<&str> = module_dir
        .trim_start_matches('/')
        .split('/')
        .filter(|c| !c.is_empty())
        .collect();
    let needle_components: Vec<&str> = needle.split('/').collect();
    components
        .windows(needle_components.len())
        .any(|window| window == needle_components.as_slice())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
