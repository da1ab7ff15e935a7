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

//! Hierarchical, schema-less key-value trees.
//!
//! A [`ScopeTree`] owns every node in an arena and addresses them by
//! [`ScopeId`]. Nodes hold their parent's id rather than a pointer, so the tree
//! stays valid however its storage grows. Read access goes through the
//! [`ScopeRef`] view, mutation through [`ScopeMut`].

mod binary;
mod store;
mod text;

use crate::variable::Variable;
use garrison_core::Format;
use std::fmt;
use store::ScopeStore;

/// A handle to a node inside one [`ScopeTree`].
///
/// The handle goes stale once its node is removed; stale handles resolve to
/// `None` rather than to whatever node reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct ScopeNode {
    pub(crate) name: String,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) variables: Vec<Variable>,
}

impl ScopeNode {
    pub(crate) fn new(name: String, parent: Option<ScopeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            variables: Vec::new(),
        }
    }
}

/// A tree of named scopes, each holding child scopes and variables.
///
/// Every node shares the tree's [`Format`]. Child names need not be unique;
/// path lookups take the first match.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    format: Format,
    store: ScopeStore,
    root: ScopeId,
}

impl ScopeTree {
    /// The name given to the root of every loaded or newly created tree.
    pub const ROOT_NAME: &'static str = "GlobalScope";

    /// Creates a tree holding only an empty root named [`ScopeTree::ROOT_NAME`].
    pub fn new(format: Format) -> Self {
        Self::with_root_name(format, Self::ROOT_NAME)
    }

    /// Creates a tree holding only an empty root named `name`.
    pub fn with_root_name(format: Format, name: impl Into<String>) -> Self {
        let mut store = ScopeStore::new();
        let root = store.insert(ScopeNode::new(name.into(), None));
        Self {
            format,
            store,
            root,
        }
    }

    /// The encoding shared by every node and variable of the tree.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The id of the root scope.
    pub fn root_id(&self) -> ScopeId {
        self.root
    }

    /// Returns a read view of the root.
    pub fn root(&self) -> ScopeRef<'_> {
        ScopeRef {
            tree: self,
            id: self.root,
        }
    }

    /// Returns a mutable view of the root.
    pub fn root_mut(&mut self) -> ScopeMut<'_> {
        let id = self.root;
        ScopeMut { tree: self, id }
    }

    /// Returns a read view of `id`, or `None` if it is stale.
    pub fn scope(&self, id: ScopeId) -> Option<ScopeRef<'_>> {
        self.store.get(id).map(|_| ScopeRef { tree: self, id })
    }

    /// Returns a mutable view of `id`, or `None` if it is stale.
    pub fn scope_mut(&mut self, id: ScopeId) -> Option<ScopeMut<'_>> {
        self.store.get(id)?;
        Some(ScopeMut { tree: self, id })
    }

    /// Returns the number of live scopes, the root included.
    pub fn scope_count(&self) -> usize {
        self.store.live_count()
    }

    /// Resolves a dotted path from the root.
    pub fn try_get_scope(&self, path: &str) -> Option<ScopeRef<'_>> {
        self.root().try_get_scope(path)
    }

    /// Resolves a dotted path from the root for mutation.
    pub fn try_get_scope_mut(&mut self, path: &str) -> Option<ScopeMut<'_>> {
        self.root_mut().into_scope(path)
    }

    /// Resolves a dotted path from the root.
    ///
    /// # Panics
    /// Panics if any segment of the path is missing.
    pub fn get_scope(&self, path: &str) -> ScopeRef<'_> {
        self.root().get_scope(path)
    }

    /// Resolves a dotted variable path from the root.
    pub fn try_get_variable(&self, path: &str) -> Option<&Variable> {
        self.root().try_get_variable(path)
    }

    /// Resolves a dotted variable path from the root for mutation.
    pub fn try_get_variable_mut(&mut self, path: &str) -> Option<&mut Variable> {
        self.root_mut().into_variable(path)
    }

    /// Resolves a dotted variable path from the root.
    ///
    /// # Panics
    /// Panics if the variable does not exist.
    pub fn get_variable(&self, path: &str) -> &Variable {
        self.root().get_variable(path)
    }

    /// Replaces the children and variables of `target` with deep copies of
    /// those of `source`. `target` keeps its own name and parent.
    ///
    /// # Panics
    /// Panics if the formats differ or `target` is stale.
    pub fn assign(&mut self, target: ScopeId, source: ScopeRef<'_>) {
        assert_eq!(
            self.format,
            source.format(),
            "cannot assign a scope across formats"
        );
        self.clear_scope(target);
        self.copy_contents(target, source);
    }

    fn node(&self, id: ScopeId) -> &ScopeNode {
        self.store
            .get(id)
            .unwrap_or_else(|| panic!("stale scope id {id:?}"))
    }

    fn node_mut(&mut self, id: ScopeId) -> &mut ScopeNode {
        self.store
            .get_mut(id)
            .unwrap_or_else(|| panic!("stale scope id {id:?}"))
    }

    fn add_child(&mut self, parent: ScopeId, name: String) -> ScopeId {
        let child = self.store.insert(ScopeNode::new(name, Some(parent)));
        self.node_mut(parent).children.push(child);
        child
    }

    fn find_child(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).name == name)
    }

    /// Follows a dotted path down from `from`. An empty path resolves to `from`.
    fn resolve(&self, from: ScopeId, path: &str) -> Option<ScopeId> {
        if path.is_empty() {
            return Some(from);
        }
        path.split('.')
            .try_fold(from, |current, segment| self.find_child(current, segment))
    }

    /// Splits `path` at its last dot and resolves the scope part.
    fn resolve_variable(&self, from: ScopeId, path: &str) -> Option<(ScopeId, usize)> {
        let (scope_path, name) = path.rsplit_once('.').unwrap_or(("", path));
        let scope = self.resolve(from, scope_path)?;
        let index = self
            .node(scope)
            .variables
            .iter()
            .position(|v| v.name() == name)?;
        Some((scope, index))
    }

    /// Frees `id` and all of its descendants, detaching it from its parent.
    fn remove_subtree(&mut self, id: ScopeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&child| child != id);
        }
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.store.remove(current) {
                pending.extend(node.children);
            }
        }
    }

    fn clear_scope(&mut self, id: ScopeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.node_mut(child).parent = None;
            self.remove_subtree(child);
        }
        self.node_mut(id).variables.clear();
    }

    /// Appends deep copies of `source`'s variables and children to `target`.
    fn copy_contents(&mut self, target: ScopeId, source: ScopeRef<'_>) {
        let mut pending = vec![(target, source)];
        while let Some((dst, src)) = pending.pop() {
            self.node_mut(dst)
                .variables
                .extend(src.variables().iter().cloned());
            for child in src.children() {
                let copy = self.add_child(dst, child.name().to_owned());
                pending.push((copy, child));
            }
        }
    }
}

impl PartialEq for ScopeTree {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && self.root() == other.root()
    }
}

/// A read-only view of one scope.
#[derive(Clone, Copy)]
pub struct ScopeRef<'a> {
    tree: &'a ScopeTree,
    id: ScopeId,
}

impl<'a> ScopeRef<'a> {
    fn node(&self) -> &'a ScopeNode {
        self.tree.node(self.id)
    }

    /// The id of this scope within its tree.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The scope's name.
    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    /// The tree's format.
    pub fn format(&self) -> Format {
        self.tree.format
    }

    /// The parent scope, or `None` for the root.
    pub fn parent(&self) -> Option<ScopeRef<'a>> {
        let tree = self.tree;
        self.node().parent.map(|id| ScopeRef { tree, id })
    }

    /// Iterates over the child scopes in insertion order.
    pub fn children(&self) -> impl Iterator<Item = ScopeRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&id| ScopeRef { tree, id })
    }

    /// Returns the number of direct children.
    pub fn child_count(&self) -> usize {
        self.node().children.len()
    }

    /// The variables in insertion order.
    pub fn variables(&self) -> &'a [Variable] {
        &self.node().variables
    }

    /// Returns `true` if the scope has no children and no variables.
    pub fn is_empty(&self) -> bool {
        let node = self.node();
        node.children.is_empty() && node.variables.is_empty()
    }

    /// Resolves a dotted path of child names. An empty path resolves to `self`.
    pub fn try_get_scope(&self, path: &str) -> Option<ScopeRef<'a>> {
        let tree = self.tree;
        tree.resolve(self.id, path).map(|id| ScopeRef { tree, id })
    }

    /// Resolves a dotted path of child names.
    ///
    /// # Panics
    /// Panics if any segment of the path is missing.
    pub fn get_scope(&self, path: &str) -> ScopeRef<'a> {
        self.try_get_scope(path)
            .unwrap_or_else(|| panic!("scope '{path}' not found under '{}'", self.path()))
    }

    /// Resolves `scope.path.variable`; a path without dots names a variable of `self`.
    pub fn try_get_variable(&self, path: &str) -> Option<&'a Variable> {
        let tree = self.tree;
        let (scope, index) = tree.resolve_variable(self.id, path)?;
        Some(&tree.node(scope).variables[index])
    }

    /// Resolves a dotted variable path.
    ///
    /// # Panics
    /// Panics if the variable does not exist.
    pub fn get_variable(&self, path: &str) -> &'a Variable {
        self.try_get_variable(path)
            .unwrap_or_else(|| panic!("variable '{path}' not found under '{}'", self.path()))
    }

    /// The dotted path from the root to this scope, root name included.
    pub fn path(&self) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(scope) = current {
            names.push(scope.name());
            current = scope.parent();
        }
        names.reverse();
        names.join(".")
    }

    /// Copies this scope and its descendants into a standalone tree whose root
    /// carries this scope's name.
    pub fn to_tree(&self) -> ScopeTree {
        let mut tree = ScopeTree::with_root_name(self.format(), self.name());
        let root = tree.root;
        tree.copy_contents(root, *self);
        tree
    }
}

/// Structural equality: names, variables, and children, recursively.
impl PartialEq for ScopeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.variables() == other.variables()
            && self.child_count() == other.child_count()
            && self.children().zip(other.children()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for ScopeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name())
            .field("variables", &self.variables())
            .field("children", &self.children().collect::<Vec<_>>())
            .finish()
    }
}

/// A mutable view of one scope.
pub struct ScopeMut<'a> {
    tree: &'a mut ScopeTree,
    id: ScopeId,
}

impl<'a> ScopeMut<'a> {
    /// The id of this scope within its tree.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns a read view of this scope.
    pub fn view(&self) -> ScopeRef<'_> {
        ScopeRef {
            tree: &*self.tree,
            id: self.id,
        }
    }

    /// Converts into a read view with the full borrow lifetime.
    pub fn into_ref(self) -> ScopeRef<'a> {
        ScopeRef {
            tree: self.tree,
            id: self.id,
        }
    }

    /// The scope's name.
    pub fn name(&self) -> &str {
        &self.tree.node(self.id).name
    }

    /// Renames the scope.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.tree.node_mut(self.id).name = name.into();
    }

    /// The tree's format.
    pub fn format(&self) -> Format {
        self.tree.format
    }

    /// Appends an empty child scope and returns a view of it.
    pub fn add_child(&mut self, name: impl Into<String>) -> ScopeMut<'_> {
        let id = self.tree.add_child(self.id, name.into());
        ScopeMut {
            tree: &mut *self.tree,
            id,
        }
    }

    /// Appends an empty child scope and moves the view onto it.
    pub fn into_child(self, name: impl Into<String>) -> ScopeMut<'a> {
        let id = self.tree.add_child(self.id, name.into());
        ScopeMut {
            tree: self.tree,
            id,
        }
    }

    /// Appends an empty variable and returns it for writing.
    pub fn add_variable(&mut self, name: impl Into<String>) -> &mut Variable {
        let format = self.tree.format;
        let variables = &mut self.tree.node_mut(self.id).variables;
        variables.push(Variable::new(name, format));
        let last = variables.len() - 1;
        &mut variables[last]
    }

    /// Removes the first child named `name` and its whole subtree.
    ///
    /// Returns `false` if there is no such child.
    pub fn remove_scope(&mut self, name: &str) -> bool {
        match self.tree.find_child(self.id, name) {
            Some(child) => {
                self.tree.remove_subtree(child);
                true
            }
            None => false,
        }
    }

    /// Removes the direct child `child` and its whole subtree.
    ///
    /// Returns `false` if `child` is not a live child of this scope.
    pub fn remove_child(&mut self, child: ScopeId) -> bool {
        let is_child = self.tree.node(self.id).children.contains(&child);
        if is_child {
            self.tree.remove_subtree(child);
        }
        is_child
    }

    /// Removes every child and variable.
    pub fn clear(&mut self) {
        self.tree.clear_scope(self.id);
    }

    /// Replaces this scope's contents with a deep copy of `source`'s.
    ///
    /// # Panics
    /// Panics if the formats differ.
    pub fn assign(&mut self, source: ScopeRef<'_>) {
        self.tree.assign(self.id, source);
    }

    /// Resolves a dotted path below this scope for mutation.
    pub fn try_get_scope_mut(&mut self, path: &str) -> Option<ScopeMut<'_>> {
        let id = self.tree.resolve(self.id, path)?;
        Some(ScopeMut {
            tree: &mut *self.tree,
            id,
        })
    }

    /// Resolves a dotted path below this scope and moves the view onto it.
    pub fn into_scope(self, path: &str) -> Option<ScopeMut<'a>> {
        let id = self.tree.resolve(self.id, path)?;
        Some(ScopeMut {
            tree: self.tree,
            id,
        })
    }

    /// Resolves a dotted path below this scope for mutation.
    ///
    /// # Panics
    /// Panics if any segment of the path is missing.
    pub fn get_scope_mut(&mut self, path: &str) -> ScopeMut<'_> {
        let id = self.id;
        self.try_get_scope_mut(path)
            .unwrap_or_else(|| panic!("scope '{path}' not found under {id:?}"))
    }

    /// Resolves a dotted variable path for mutation.
    pub fn try_get_variable_mut(&mut self, path: &str) -> Option<&mut Variable> {
        let (scope, index) = self.tree.resolve_variable(self.id, path)?;
        Some(&mut self.tree.node_mut(scope).variables[index])
    }

    /// Resolves a dotted variable path and keeps the full borrow lifetime.
    pub fn into_variable(self, path: &str) -> Option<&'a mut Variable> {
        let (scope, index) = self.tree.resolve_variable(self.id, path)?;
        Some(&mut self.tree.node_mut(scope).variables[index])
    }

    /// Resolves a dotted variable path for mutation.
    ///
    /// # Panics
    /// Panics if the variable does not exist.
    pub fn get_variable_mut(&mut self, path: &str) -> &mut Variable {
        let id = self.id;
        self.try_get_variable_mut(path)
            .unwrap_or_else(|| panic!("variable '{path}' not found under {id:?}"))
    }
}

impl fmt::Debug for ScopeMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.view(), f)
    }
}
