use std::collections::HashMap;

use crate::descriptor::{Descriptors, VarDescriptor};

/// Stacked name → descriptor scopes. The bottom scope holds the template's
/// top-level descriptor set; entering an iteration pushes its `list_desc`,
/// and the matching close pops it again.
pub struct SymbolTable<R: 'static> {
    scopes: Vec<HashMap<&'static str, &'static VarDescriptor<R>>>,
}

impl<R: 'static> SymbolTable<R> {
    pub fn new() -> SymbolTable<R> {
        SymbolTable { scopes: vec![] }
    }

    /// Opens a scope exposing `descriptors`. Inner names shadow outer ones.
    pub fn push_scope(&mut self, descriptors: Descriptors<R>) {
        let mut scope = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            scope.insert(descriptor.name, descriptor);
        }
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Resolves `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&'static VarDescriptor<R>> {
        for scope in self.scopes.iter().rev() {
            if let Some(&descriptor) = scope.get(name) {
                return Some(descriptor);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
