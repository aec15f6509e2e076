//! Lexical scopes for script-declared variables

use std::collections::HashMap;

use crate::parser::ast::Span;
use crate::types::TypeInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub type_info: TypeInfo,
    pub span: Span,
}

/// Stack of scopes, innermost last. The bottom scope holds variables
/// declared at the top level of other nodes and is never popped.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, VarInfo>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn with_globals<I>(globals: I) -> Self
    where
        I: IntoIterator<Item = VarInfo>,
    {
        let mut stack = Self::new();
        for info in globals {
            stack.scopes[0].entry(info.name.to_lowercase()).or_insert(info);
        }
        stack
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare in the innermost scope; on conflict the existing entry is
    /// returned and nothing changes
    pub fn declare(&mut self, info: VarInfo) -> Result<(), VarInfo> {
        let key = info.name.to_lowercase();
        if let Some(existing) = self.scopes.last().and_then(|scope| scope.get(&key)) {
            return Err(existing.clone());
        }
        if let Some(current) = self.scopes.last_mut() {
            current.insert(key, info);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&VarInfo> {
        let key = name.to_lowercase();
        self.scopes.iter().rev().find_map(|scope| scope.get(&key))
    }

    /// Forget what is known about a variable's type
    pub fn widen(&mut self, name: &str) {
        let key = name.to_lowercase();
        if let Some(info) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(&key))
        {
            info.type_info = TypeInfo::Any;
        }
    }

    /// Every visible name, innermost first
    pub fn names(&self) -> Vec<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.values().map(|info| info.name.as_str()))
            .collect()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
