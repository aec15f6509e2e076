//! Dialogue context: everything one running dialogue shares
//!
//! A context owns the variable table, function table, member cache, node
//! registry, visit counters and the semantic analyzer. Hosts register
//! into it before running; the interpreter reads and writes through it.
//!
//! A context is `Send + Sync` and is normally held in an `Arc`. Advancing
//! the same context from two tasks at once is not supported; independent
//! contexts may run concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::host::{HostFn, HostObject, MemberKind};
use super::registry::{FunctionSignature, FunctionTable, HostBinding, MemberCache, VariableTable};
use super::stdlib;
use super::value::{PersistedValue, RuntimeValue};
use crate::analyzer::{HostSymbols, SemanticAnalyzer};
use crate::config::AnalyzerConfig;
use crate::diagnostics::SemanticReport;
use crate::errors::{RegistryError, RuntimeResult};
use crate::parser::ast::{NodeDefinition, Script};
use crate::types::TypeInfo;

// ============================================================================
// Visit counters
// ============================================================================

/// Per-node entry counts, shared with the `visited` built-ins
#[derive(Debug, Clone, Default)]
pub struct VisitCounter {
    counts: Arc<RwLock<BTreeMap<String, u64>>>,
}

impl VisitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries into `node`. Falls back to a case-insensitive match so
    /// `visited("start")` agrees with how jumps resolve.
    pub fn count(&self, node: &str) -> u64 {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = counts.get(node) {
            return *count;
        }
        counts
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(node))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn increment(&self, node: &str) -> u64 {
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(node.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn restore(&self, visits: &BTreeMap<String, u64>) {
        *self.counts.write().unwrap_or_else(PoisonError::into_inner) = visits.clone();
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Persistable dialogue state: script variables and visit counts.
/// Host variables are excluded; the host owns their storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub variables: BTreeMap<String, PersistedValue>,
    pub visits: BTreeMap<String, u64>,
}

// ============================================================================
// DialogueContext
// ============================================================================

pub struct DialogueContext {
    variables: VariableTable,
    functions: FunctionTable,
    members: MemberCache,
    nodes: RwLock<HashMap<String, Arc<NodeDefinition>>>,
    visits: VisitCounter,
    analyzer: SemanticAnalyzer,
}

impl DialogueContext {
    /// Empty context: no functions, not even the built-ins
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            variables: VariableTable::new(),
            functions: FunctionTable::new(),
            members: MemberCache::new(),
            nodes: RwLock::new(HashMap::new()),
            visits: VisitCounter::new(),
            analyzer: SemanticAnalyzer::new(config),
        }
    }

    /// Context with the built-in function library installed
    pub fn with_builtins() -> Self {
        let ctx = Self::new();
        if let Err(err) = ctx.install_builtins() {
            warn!(error = %err, "Failed to install built-in functions");
        }
        ctx
    }

    pub fn install_builtins(&self) -> Result<(), RegistryError> {
        stdlib::register(&self.functions, &self.visits)
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn members(&self) -> &MemberCache {
        &self.members
    }

    pub fn visits(&self) -> &VisitCounter {
        &self.visits
    }

    pub fn analyzer(&self) -> &SemanticAnalyzer {
        &self.analyzer
    }

    /* ===================== Host registration ===================== */

    pub fn register_variable(&self, binding: HostBinding) -> Result<(), RegistryError> {
        self.variables.register_host(binding)
    }

    /// Read-only host variable with a fixed value. Object values also
    /// declare their type so member access can be checked.
    pub fn register_value(&self, name: &str, value: RuntimeValue) -> Result<(), RegistryError> {
        if let RuntimeValue::Object(handle) = &value {
            self.members.members_of(handle.object());
        }
        self.variables.register_host(HostBinding::constant(name, value))
    }

    pub fn register_function(&self, signature: FunctionSignature, func: HostFn) -> Result<(), RegistryError> {
        self.functions.register(signature, func)
    }

    pub fn register_sync<F>(&self, signature: FunctionSignature, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<RuntimeValue>) -> RuntimeResult<RuntimeValue> + Send + Sync + 'static,
    {
        self.functions.register_sync(signature, f)
    }

    pub fn register_async<F, Fut>(&self, signature: FunctionSignature, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<RuntimeValue>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RuntimeResult<RuntimeValue>> + Send + 'static,
    {
        self.functions.register_async(signature, f)
    }

    /// Register every field of `object` as a variable (writable fields get a
    /// setter) and every method as a function.
    ///
    /// Stops at the first conflicting name; members registered before the
    /// conflict stay registered.
    pub fn register_object(&self, object: Arc<dyn HostObject>) -> Result<(), RegistryError> {
        let members = self.members.members_of(object.as_ref());
        debug!(
            type_name = %members.type_name,
            members = members.members().len(),
            "Registering host object"
        );

        for member in members.members() {
            match &member.kind {
                MemberKind::Field { writable } => {
                    let name = member.name.clone();
                    let reader = Arc::clone(&object);
                    let mut binding = HostBinding::new(
                        member.name.clone(),
                        member.type_name.clone(),
                        move || reader.get(&name),
                    );
                    if *writable {
                        let name = member.name.clone();
                        let writer = Arc::clone(&object);
                        binding = binding.with_setter(move |value| writer.set(&name, value));
                    }
                    self.variables.register_host(binding)?;
                }
                MemberKind::Method => {
                    let Some(signature) = member.signature.clone() else {
                        continue;
                    };
                    let method = member.name.clone();
                    let target = Arc::clone(&object);
                    let func: HostFn = Arc::new(move |args| target.call(&method, args));
                    self.functions.register(signature, func)?;
                }
            }
        }
        Ok(())
    }

    /// Declare a host type's members ahead of any instance
    pub fn register_type(&self, type_name: &str, members: Vec<super::host::MemberInfo>) {
        self.members.register_type(type_name, members);
    }

    /* ===================== Nodes ===================== */

    pub fn register_node(&self, node: NodeDefinition) -> Result<(), RegistryError> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.contains_key(&node.name) {
            let err = RegistryError::DuplicateNode {
                name: node.name.clone(),
            };
            warn!(error = %err, "Rejected node registration");
            return Err(err);
        }
        debug!(node = %node.name, "Registered node");
        nodes.insert(node.name.clone(), Arc::new(node));
        Ok(())
    }

    /// Register every node of a parsed script; returns how many were added
    pub fn load_script(&self, script: &Script) -> Result<usize, RegistryError> {
        for node in &script.nodes {
            self.register_node(node.clone())?;
        }
        Ok(script.nodes.len())
    }

    /// Node by exact name, else the one node matching ignoring case
    pub fn node(&self, name: &str) -> Option<Arc<NodeDefinition>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(node) = nodes.get(name) {
            return Some(Arc::clone(node));
        }
        let mut matches = nodes
            .values()
            .filter(|node| node.name.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(node), None) => Some(Arc::clone(node)),
            _ => None,
        }
    }

    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn mark_visited(&self, node: &str) -> u64 {
        self.visits.increment(node)
    }

    pub fn visit_count(&self, node: &str) -> u64 {
        self.visits.count(node)
    }

    /* ===================== Analysis ===================== */

    /// What the analyzer should assume about this host
    pub fn symbols(&self) -> HostSymbols {
        let mut symbols = HostSymbols::new();
        for binding in self.variables.host_bindings() {
            symbols = symbols.variable(
                &binding.name,
                TypeInfo::from_name(&binding.type_name),
                binding.writable,
            );
        }
        for signature in self.functions.signatures() {
            symbols = symbols.function(signature);
        }
        for members in self.members.all() {
            symbols = symbols.object_type(&members.type_name, members.members().to_vec());
        }
        for name in self.node_names() {
            symbols = symbols.node(&name);
        }
        symbols
    }

    pub fn analyze(&self, script: &Script) -> SemanticReport {
        self.analyzer.analyze(script, Some(&self.symbols()))
    }

    /* ===================== Persistence ===================== */

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            variables: self.variables.script_snapshot(),
            visits: self.visits.snapshot(),
        }
    }

    pub fn restore(&self, snapshot: &Snapshot) {
        self.variables.restore(&snapshot.variables);
        self.visits.restore(&snapshot.visits);
        debug!(
            variables = snapshot.variables.len(),
            nodes = snapshot.visits.len(),
            "Restored dialogue state"
        );
    }
}

impl Default for DialogueContext {
    fn default() -> Self {
        Self::new()
    }
}
