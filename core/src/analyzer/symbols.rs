//! Snapshot of what the host has registered, as the analyzer sees it

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::runtime::host::MemberInfo;
use crate::runtime::registry::FunctionSignature;
use crate::runtime::stdlib;
use crate::types::TypeInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSymbol {
    pub name: String,
    pub type_info: TypeInfo,
    pub writable: bool,
}

/// Host variables, functions, object types and nodes known before analysis.
///
/// Keys are lowercased names, except `nodes` which keeps exact names
/// because jump targets are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSymbols {
    pub variables: BTreeMap<String, VariableSymbol>,
    pub functions: BTreeMap<String, FunctionSignature>,
    pub types: BTreeMap<String, Vec<MemberInfo>>,
    pub nodes: BTreeSet<String>,
}

impl HostSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the built-in function library
    pub fn builtins() -> Self {
        let mut symbols = Self::new();
        for signature in stdlib::signatures() {
            symbols = symbols.function(signature);
        }
        symbols
    }

    pub fn variable(mut self, name: &str, type_info: TypeInfo, writable: bool) -> Self {
        self.variables.insert(
            name.to_lowercase(),
            VariableSymbol {
                name: name.to_string(),
                type_info,
                writable,
            },
        );
        self
    }

    pub fn function(mut self, signature: FunctionSignature) -> Self {
        self.functions.insert(signature.name.to_lowercase(), signature);
        self
    }

    pub fn object_type(mut self, type_name: &str, members: Vec<MemberInfo>) -> Self {
        self.types.insert(type_name.to_lowercase(), members);
        self
    }

    pub fn node(mut self, name: &str) -> Self {
        self.nodes.insert(name.to_string());
        self
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&VariableSymbol> {
        self.variables.get(&name.to_lowercase())
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(&name.to_lowercase())
    }

    /// Members of a host type, if the type was declared
    pub fn members_of(&self, type_name: &str) -> Option<&[MemberInfo]> {
        self.types.get(&type_name.to_lowercase()).map(Vec::as_slice)
    }
}
