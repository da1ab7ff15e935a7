// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File-backed scope trees shared between handles.
//!
//! A [`SavedDataRegistry`] remembers, per file, the tree that is currently
//! loaded. Every [`SavedData`] opened on the same file while that tree is alive
//! shares it, so edits made through one handle are visible through the others
//! and the file is read only once. When the last handle goes away the entry
//! expires and the next open reads the file again.

use crate::bitstream::BitStream;
use crate::error::DataError;
use crate::scope::{ScopeId, ScopeMut, ScopeRef, ScopeTree};
use crate::variable::Variable;
use garrison_core::Format;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use std::rc::{Rc, Weak};

/// Tracks the trees currently loaded from disk, keyed by absolute file path.
///
/// Keys are canonical, so `a.txt` and `sub/../a.txt` share one tree.
///
/// The registry is single-threaded; it is meant to be owned by whatever owns
/// the frame loop and passed down by reference.
#[derive(Debug)]
pub struct SavedDataRegistry {
    data_root: PathBuf,
    in_memory: RefCell<HashMap<PathBuf, Weak<RefCell<ScopeTree>>>>,
}

impl SavedDataRegistry {
    /// Creates a registry resolving relative paths against `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            in_memory: RefCell::new(HashMap::new()),
        }
    }

    /// The directory relative save paths are resolved against.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Prefixes `path` with the data root unless it already starts with it.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.starts_with(&self.data_root) {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }

    /// Returns the absolute path `path` is cached under.
    ///
    /// Symlinks and `..` are resolved through the file system when the file
    /// exists. Otherwise the path is normalized lexically and only its parent
    /// directory is canonicalized.
    pub fn cache_key(&self, path: impl AsRef<Path>) -> PathBuf {
        let full = self.resolve(path);
        if let Ok(canonical) = fs::canonicalize(&full) {
            return canonical;
        }

        let absolute = std::path::absolute(&full).unwrap_or(full);
        let lexical = normalize_lexically(&absolute);
        if let (Some(parent), Some(name)) = (lexical.parent(), lexical.file_name()) {
            if let Ok(parent) = fs::canonicalize(parent) {
                return parent.join(name);
            }
        }
        lexical
    }

    /// Returns `true` if a tree for `path` is currently loaded.
    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        self.live(&self.cache_key(path)).is_some()
    }

    /// Creates `path` or truncates it, and empties its tree if one is loaded.
    pub fn make_empty(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let full = self.resolve(&path);
        File::create(&full).map_err(|e| DataError::io(&full, e))?;
        self.clear_live(&self.cache_key(path));
        Ok(())
    }

    /// Removes `path` from disk, and empties its tree if one is loaded.
    pub fn delete(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let full = self.resolve(&path);
        let key = self.cache_key(path);
        fs::remove_file(&full).map_err(|e| DataError::io(&full, e))?;
        self.clear_live(&key);
        Ok(())
    }

    fn live(&self, key: &Path) -> Option<Rc<RefCell<ScopeTree>>> {
        let mut in_memory = self.in_memory.borrow_mut();
        let tree = in_memory.get(key)?.upgrade();
        if tree.is_none() {
            in_memory.remove(key);
        }
        tree
    }

    fn register(&self, key: PathBuf, tree: &Rc<RefCell<ScopeTree>>) {
        self.in_memory
            .borrow_mut()
            .insert(key, Rc::downgrade(tree));
    }

    fn clear_live(&self, key: &Path) {
        if let Some(tree) = self.live(key) {
            tree.borrow_mut().root_mut().clear();
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// A handle on a save file, optionally focused on one scope inside it.
///
/// Relative lookups through the handle start at the focused scope. Saving
/// always writes the whole tree.
#[derive(Debug)]
pub struct SavedData {
    tree: Rc<RefCell<ScopeTree>>,
    file_path: PathBuf,
    scope_path: String,
    format: Format,
}

impl SavedData {
    /// Opens `path` (relative to the registry's data root) focused on the dotted
    /// `scope_path`, an empty string meaning the root.
    ///
    /// The format follows the extension: `txt` is readable and `dat` binary.
    /// A tree already loaded for the same file is shared instead of re-read.
    pub fn open(
        registry: &SavedDataRegistry,
        path: impl AsRef<Path>,
        scope_path: impl Into<String>,
    ) -> Result<Self, DataError> {
        let file_path = registry.resolve(&path);
        let format = Format::from_path(&file_path).ok_or_else(|| DataError::UnsupportedExtension {
            path: file_path.clone(),
        })?;

        let key = registry.cache_key(&path);
        let tree = match registry.live(&key) {
            Some(tree) => {
                log::trace!("Sharing loaded tree for '{}'", file_path.display());
                tree
            }
            None => {
                let tree = Rc::new(RefCell::new(load(&file_path, format)?));
                registry.register(key, &tree);
                log::debug!("Loaded '{}'", file_path.display());
                tree
            }
        };

        Ok(Self {
            tree,
            file_path,
            scope_path: scope_path.into(),
            format,
        })
    }

    /// The resolved path of the backing file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// The format chosen from the file extension.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The dotted path of the focused scope.
    pub fn scope_path(&self) -> &str {
        &self.scope_path
    }

    /// Borrows the whole shared tree.
    pub fn tree(&self) -> Ref<'_, ScopeTree> {
        self.tree.borrow()
    }

    /// Mutably borrows the whole shared tree.
    pub fn tree_mut(&self) -> RefMut<'_, ScopeTree> {
        self.tree.borrow_mut()
    }

    fn focused_path(&self, path: &str) -> String {
        match (self.scope_path.is_empty(), path.is_empty()) {
            (true, _) => path.to_owned(),
            (false, true) => self.scope_path.clone(),
            (false, false) => format!("{}.{path}", self.scope_path),
        }
    }

    /// Runs `f` with a view of the focused scope.
    ///
    /// # Panics
    /// Panics if the focused scope does not exist.
    pub fn read<R>(&self, f: impl FnOnce(ScopeRef<'_>) -> R) -> R {
        let tree = self.tree.borrow();
        f(tree.get_scope(&self.scope_path))
    }

    /// Runs `f` with a mutable view of the focused scope.
    ///
    /// # Panics
    /// Panics if the focused scope does not exist.
    pub fn write<R>(&self, f: impl FnOnce(ScopeMut<'_>) -> R) -> R {
        let mut tree = self.tree.borrow_mut();
        let scope = tree
            .try_get_scope_mut(&self.scope_path)
            .unwrap_or_else(|| panic!("focused scope '{}' does not exist", self.scope_path));
        f(scope)
    }

    /// Resolves a path below the focused scope.
    pub fn try_get_scope(&self, path: &str) -> Option<ScopeId> {
        self.tree
            .borrow()
            .try_get_scope(&self.focused_path(path))
            .map(|scope| scope.id())
    }

    /// Resolves a path below the focused scope.
    ///
    /// # Panics
    /// Panics if the scope does not exist.
    pub fn get_scope(&self, path: &str) -> ScopeId {
        self.tree.borrow().get_scope(&self.focused_path(path)).id()
    }

    /// Returns a copy of the variable at a path below the focused scope.
    pub fn try_get_variable(&self, path: &str) -> Option<Variable> {
        self.tree
            .borrow()
            .try_get_variable(&self.focused_path(path))
            .cloned()
    }

    /// Returns a copy of the variable at a path below the focused scope.
    ///
    /// # Panics
    /// Panics if the variable does not exist.
    pub fn get_variable(&self, path: &str) -> Variable {
        self.tree
            .borrow()
            .get_variable(&self.focused_path(path))
            .clone()
    }

    /// Writes the whole tree back to the file.
    ///
    /// A readable file that cannot be opened for writing is skipped with a
    /// warning. Any failure while writing a binary file is returned.
    pub fn save(&self) -> Result<(), DataError> {
        let tree = self.tree.borrow();
        assert_eq!(
            tree.format(),
            self.format,
            "tree format does not match the file extension"
        );

        match self.format {
            Format::Readable => {
                let file = match File::create(&self.file_path) {
                    Ok(file) => file,
                    Err(e) => {
                        log::warn!(
                            "Could not save to '{}', it might be read only: {e}",
                            self.file_path.display()
                        );
                        return Ok(());
                    }
                };
                tree.write_readable(BufWriter::new(file))
                    .map_err(|e| DataError::io(&self.file_path, e))
            }
            Format::Binary => tree
                .to_bit_stream()
                .serialize(&self.file_path)
                .map_err(|e| DataError::io(&self.file_path, e)),
        }
    }

    /// Truncates the backing file and empties the shared tree.
    pub fn clear(&self) -> Result<(), DataError> {
        File::create(&self.file_path).map_err(|e| DataError::io(&self.file_path, e))?;
        self.tree.borrow_mut().root_mut().clear();
        Ok(())
    }
}

fn load(path: &Path, format: Format) -> Result<ScopeTree, DataError> {
    match format {
        Format::Readable => {
            let file = File::open(path).map_err(|e| DataError::io(path, e))?;
            ScopeTree::parse_readable(BufReader::new(file)).map_err(|e| DataError::io(path, e))
        }
        Format::Binary => {
            let stream = BitStream::deserialize(path).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => DataError::Corrupt {
                    reason: format!("'{}': {e}", path.display()),
                },
                _ => DataError::io(path, e),
            })?;
            Ok(ScopeTree::from_bit_stream(&stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, SavedDataRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = SavedDataRegistry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn test_handles_on_same_file_share_one_tree() {
        // --- 1. ARRANGE ---
        let (_dir, registry) = registry();
        registry.make_empty("settings.txt").unwrap();
        let first = SavedData::open(&registry, "settings.txt", "").unwrap();
        first.write(|mut root| {
            root.add_child("Input").add_variable("sensitivity").write(&0.5f32);
        });

        // --- 2. ACT ---
        let focused = SavedData::open(&registry, "settings.txt", "Input").unwrap();

        // --- 3. ASSERT ---
        assert_eq!(focused.get_variable("sensitivity").read::<f32>().unwrap(), 0.5);
        assert!(focused.try_get_variable("Input.sensitivity").is_none());
        assert_eq!(focused.read(|scope| scope.name().to_owned()), "Input");
        assert_eq!(focused.try_get_scope(""), first.try_get_scope("Input"));
    }

    #[test]
    fn test_aliased_paths_share_one_tree() {
        // --- 1. ARRANGE ---
        let (dir, registry) = registry();
        fs::create_dir(dir.path().join("sub")).unwrap();
        registry.make_empty("roster.txt").unwrap();
        let direct = SavedData::open(&registry, "roster.txt", "").unwrap();

        // --- 2. ACT ---
        let aliased = SavedData::open(&registry, "sub/../roster.txt", "").unwrap();
        direct.write(|mut root| {
            root.add_variable("x").write(&7i32);
        });

        // --- 3. ASSERT ---
        assert_eq!(aliased.get_variable("x").read::<i32>().unwrap(), 7);
        assert!(registry.is_loaded("./sub/../roster.txt"));
        assert_eq!(
            registry.cache_key("roster.txt"),
            registry.cache_key(dir.path().join("sub").join("..").join("roster.txt"))
        );
    }

    #[test]
    fn test_cache_key_of_missing_file_is_normalized() {
        let (dir, registry) = registry();
        let key = registry.cache_key("sub/../later.dat");
        assert!(key.is_absolute());
        assert_eq!(key, fs::canonicalize(dir.path()).unwrap().join("later.dat"));
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }

    #[test]
    fn test_expired_entry_reloads_from_disk() {
        let (_dir, registry) = registry();
        registry.make_empty("army.dat").unwrap();

        let data = SavedData::open(&registry, "army.dat", "").unwrap();
        data.write(|mut root| {
            root.add_variable("saved").write(&true);
        });
        data.save().unwrap();
        data.write(|mut root| {
            root.add_variable("unsaved").write(&true);
        });
        drop(data);
        assert!(!registry.is_loaded("army.dat"));

        let reopened = SavedData::open(&registry, "army.dat", "").unwrap();
        assert!(reopened.get_variable("saved").read::<bool>().unwrap());
        assert!(reopened.try_get_variable("unsaved").is_none());
    }

    #[test]
    fn test_make_empty_clears_live_tree() {
        let (dir, registry) = registry();
        registry.make_empty("scene.txt").unwrap();
        let data = SavedData::open(&registry, "scene.txt", "").unwrap();
        data.write(|mut root| {
            root.add_child("Camera");
        });
        data.save().unwrap();
        assert!(!fs::read_to_string(dir.path().join("scene.txt")).unwrap().is_empty());

        registry.make_empty(dir.path().join("scene.txt")).unwrap();

        assert!(data.tree().root().is_empty());
        assert!(fs::read(dir.path().join("scene.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_file_and_clears_tree() {
        let (dir, registry) = registry();
        registry.make_empty("tmp.dat").unwrap();
        let data = SavedData::open(&registry, "tmp.dat", "").unwrap();
        data.write(|mut root| {
            root.add_variable("x").write(&1u8);
        });

        registry.delete("tmp.dat").unwrap();

        assert!(!dir.path().join("tmp.dat").exists());
        assert!(data.tree().root().is_empty());
        assert!(matches!(registry.delete("tmp.dat"), Err(DataError::Io { .. })));
    }

    #[test]
    fn test_open_errors() {
        let (_dir, registry) = registry();
        assert!(matches!(
            SavedData::open(&registry, "notes.json", ""),
            Err(DataError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            SavedData::open(&registry, "missing.txt", ""),
            Err(DataError::Io { .. })
        ));

        fs::write(registry.resolve("broken.dat"), [12u8, 0]).unwrap();
        assert!(matches!(
            SavedData::open(&registry, "broken.dat", ""),
            Err(DataError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_failed_readable_save_is_not_an_error() {
        let (dir, registry) = registry();
        registry.make_empty("ok.txt").unwrap();
        let data = SavedData::open(&registry, "ok.txt", "").unwrap();
        // Point the handle at a directory that does not exist.
        let orphan = SavedData {
            file_path: dir.path().join("no_such_dir").join("ok.txt"),
            ..data
        };
        assert!(orphan.save().is_ok());

        let binary = SavedData {
            file_path: dir.path().join("no_such_dir").join("ok.dat"),
            format: Format::Binary,
            tree: Rc::new(RefCell::new(ScopeTree::new(Format::Binary))),
            scope_path: String::new(),
        };
        assert!(matches!(binary.save(), Err(DataError::Io { .. })));
    }
}
