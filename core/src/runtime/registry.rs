//! Variable table, function table and member cache
//!
//! Names are case-insensitive everywhere. Registration never overwrites:
//! a second registration under an existing name fails with a
//! [`RegistryError`] naming what is already there.
//!
//! The tables sit behind reader/writer locks; they hold plain data, so a
//! poisoned lock is recovered rather than propagated.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::host::{HostFn, HostObject, MemberInfo};
use super::value::{PersistedValue, RuntimeValue};
use crate::errors::{ErrorKind, RegistryError, RuntimeError, RuntimeResult};
use crate::suggest::{did_you_mean, SuggestionSearch};
use crate::types::TypeInfo;

fn key(name: &str) -> String {
    name.to_lowercase()
}

// ============================================================================
// Function Signatures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub type_name: String,
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PersistedValue>,
}

/// Declared shape of a host function. Built once at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: String,
    pub params: Vec<ParamInfo>,
    pub min_required: usize,
    /// `None` for variadic functions
    pub max: Option<usize>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: "Any".to_string(),
            params: Vec::new(),
            min_required: 0,
            max: Some(0),
        }
    }

    /// Signature for a function registered without type information:
    /// any number of arguments, result unknown
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name).variadic()
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = type_name.into();
        self
    }

    pub fn param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.params.push(ParamInfo {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            default: None,
        });
        self.recount();
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        default: Option<PersistedValue>,
    ) -> Self {
        self.params.push(ParamInfo {
            name: name.into(),
            type_name: type_name.into(),
            optional: true,
            default,
        });
        self.recount();
        self
    }

    pub fn variadic(mut self) -> Self {
        self.max = None;
        self
    }

    fn recount(&mut self) {
        self.min_required = self.params.iter().filter(|p| !p.optional).count();
        if self.max.is_some() {
            self.max = Some(self.params.len());
        }
    }

    /// Reject signatures whose required parameters follow optional ones
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidSignature {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        let mut seen_optional = false;
        for param in &self.params {
            if param.optional {
                seen_optional = true;
            } else if seen_optional {
                return Err(RegistryError::InvalidSignature {
                    name: self.name.clone(),
                    reason: format!(
                        "required parameter '{}' follows an optional one",
                        param.name
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_required && self.max.map_or(true, |max| count <= max)
    }

    /// Human-readable arity: `1`, `1 to 2`, `at least 1`
    pub fn expected_arity(&self) -> String {
        match self.max {
            None => format!("at least {}", self.min_required),
            Some(max) if max == self.min_required => max.to_string(),
            Some(max) => format!("{} to {}", self.min_required, max),
        }
    }

    pub fn return_type_info(&self) -> TypeInfo {
        TypeInfo::from_name(&self.return_type)
    }

    pub fn param_type(&self, position: usize) -> TypeInfo {
        self.params
            .get(position)
            .map(|p| TypeInfo::from_name(&p.type_name))
            .unwrap_or(TypeInfo::Any)
    }

    /// Check the argument count and fill in declared defaults
    pub fn prepare_args(&self, mut args: Vec<RuntimeValue>) -> RuntimeResult<Vec<RuntimeValue>> {
        if !self.accepts(args.len()) {
            return Err(ErrorKind::ArityMismatch {
                name: self.name.clone(),
                expected: self.expected_arity(),
                got: args.len(),
            }
            .into());
        }
        for param in self.params.iter().skip(args.len()) {
            match &param.default {
                Some(default) => args.push(default.clone().into()),
                None => args.push(RuntimeValue::Null),
            }
        }
        Ok(args)
    }
}

impl std::fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let marker = if p.optional { "?" } else { "" };
                format!("{}{}: {}", p.name, marker, p.type_name)
            })
            .collect();
        let rest = if self.max.is_none() { ", ..." } else { "" };
        write!(
            f,
            "{}({}{}) -> {}",
            self.name,
            params.join(", "),
            rest,
            self.return_type
        )
    }
}

// ============================================================================
// Function Table
// ============================================================================

#[derive(Clone)]
pub struct FunctionEntry {
    pub signature: FunctionSignature,
    func: HostFn,
}

impl FunctionEntry {
    /// Check arity, fill defaults and start the call
    pub fn invoke(&self, args: Vec<RuntimeValue>) -> RuntimeResult<super::host::HostFuture> {
        let args = self.signature.prepare_args(args)?;
        Ok((self.func)(args))
    }

    /// The function as a first-class value
    pub fn to_value(&self) -> RuntimeValue {
        super::host::HostFunction::new(self.signature.clone(), Arc::clone(&self.func)).into_value()
    }
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FunctionEntry({})", self.signature)
    }
}

#[derive(Default)]
pub struct FunctionTable {
    entries: RwLock<HashMap<String, FunctionEntry>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, signature: FunctionSignature, func: HostFn) -> Result<(), RegistryError> {
        signature.validate()?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key(&signature.name);
        if let Some(existing) = entries.get(&slot) {
            let err = RegistryError::DuplicateFunction {
                name: signature.name.clone(),
                existing: existing.signature.to_string(),
            };
            warn!(error = %err, "Rejected function registration");
            return Err(err);
        }
        debug!(function = %signature, "Registered function");
        entries.insert(slot, FunctionEntry { signature, func });
        Ok(())
    }

    pub fn register_sync<F>(&self, signature: FunctionSignature, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<RuntimeValue>) -> RuntimeResult<RuntimeValue> + Send + Sync + 'static,
    {
        self.register(signature, super::host::sync_fn(f))
    }

    pub fn register_async<F, Fut>(&self, signature: FunctionSignature, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<RuntimeValue>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = RuntimeResult<RuntimeValue>> + Send + 'static,
    {
        self.register(signature, super::host::async_fn(f))
    }

    pub fn get(&self, name: &str) -> Option<FunctionEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key(name))
    }

    /// Registered names as declared, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.signature.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn signatures(&self) -> Vec<FunctionSignature> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.signature.clone())
            .collect()
    }

    /// Lookup that reports an unknown name with the nearest known one
    pub fn resolve(&self, name: &str) -> RuntimeResult<FunctionEntry> {
        self.get(name).ok_or_else(|| {
            let names = self.names();
            RuntimeError::new(ErrorKind::UnknownFunction(name.to_string())).with_suggestion(
                did_you_mean(name, names.iter().map(String::as_str), SuggestionSearch::default()),
            )
        })
    }
}

// ============================================================================
// Variable Table
// ============================================================================

pub type Getter = Arc<dyn Fn() -> RuntimeResult<RuntimeValue> + Send + Sync>;
pub type Setter = Arc<dyn Fn(RuntimeValue) -> RuntimeResult<()> + Send + Sync>;

/// Variable whose storage belongs to the host
#[derive(Clone)]
pub struct HostBinding {
    pub name: String,
    pub type_name: String,
    getter: Getter,
    setter: Option<Setter>,
}

impl HostBinding {
    pub fn new<G>(name: impl Into<String>, type_name: impl Into<String>, getter: G) -> Self
    where
        G: Fn() -> RuntimeResult<RuntimeValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            getter: Arc::new(getter),
            setter: None,
        }
    }

    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(RuntimeValue) -> RuntimeResult<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Read-only binding to a fixed value
    pub fn constant(name: impl Into<String>, value: RuntimeValue) -> Self {
        let type_name = value.type_info().to_string();
        Self::new(name, type_name, move || Ok(value.clone()))
    }

    /// Writable binding backed by a shared cell the host keeps a handle to
    pub fn cell(name: impl Into<String>, cell: Arc<RwLock<RuntimeValue>>) -> Self {
        let type_name = {
            let value = cell.read().unwrap_or_else(PoisonError::into_inner);
            match &*value {
                RuntimeValue::Null => "Any".to_string(),
                other => other.type_info().to_string(),
            }
        };
        let reader = Arc::clone(&cell);
        Self::new(name, type_name, move || {
            Ok(reader.read().unwrap_or_else(PoisonError::into_inner).clone())
        })
        .with_setter(move |value| {
            *cell.write().unwrap_or_else(PoisonError::into_inner) = value;
            Ok(())
        })
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

enum Slot {
    Host(HostBinding),
    Script { name: String, value: RuntimeValue },
}

/// Flat, case-insensitive variable storage shared by every node
#[derive(Default)]
pub struct VariableTable {
    slots: RwLock<HashMap<String, Slot>>,
}

/// Static view of a host binding, for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct BindingInfo {
    pub name: String,
    pub type_name: String,
    pub writable: bool,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_host(&self, binding: HostBinding) -> Result<(), RegistryError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key(&binding.name);
        if slots.contains_key(&slot) {
            let err = RegistryError::DuplicateVariable {
                name: binding.name.clone(),
            };
            warn!(error = %err, "Rejected variable registration");
            return Err(err);
        }
        debug!(variable = %binding.name, "Registered host variable");
        slots.insert(slot, Slot::Host(binding));
        Ok(())
    }

    /// Declare a script variable. Returns `false` (and changes nothing)
    /// when the name already exists.
    pub fn declare(&self, name: &str, value: RuntimeValue) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key(name);
        if slots.contains_key(&slot) {
            return false;
        }
        slots.insert(
            slot,
            Slot::Script {
                name: name.to_string(),
                value,
            },
        );
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key(name))
    }

    pub fn is_host(&self, name: &str) -> bool {
        matches!(
            self.slots
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key(name)),
            Some(Slot::Host(_))
        )
    }

    pub fn get(&self, name: &str) -> RuntimeResult<RuntimeValue> {
        // Host getters run outside the lock so they may re-enter the table
        let getter = {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            match slots.get(&key(name)) {
                Some(Slot::Script { value, .. }) => return Ok(value.clone()),
                Some(Slot::Host(binding)) => Arc::clone(&binding.getter),
                None => return Err(self.undefined(name, &slots)),
            }
        };
        getter()
    }

    pub fn set(&self, name: &str, value: RuntimeValue) -> RuntimeResult<()> {
        let setter = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            match slots.get_mut(&key(name)) {
                Some(Slot::Script { value: current, .. }) => {
                    *current = value;
                    return Ok(());
                }
                Some(Slot::Host(binding)) => match &binding.setter {
                    Some(setter) => Arc::clone(setter),
                    None => {
                        return Err(ErrorKind::ReadOnlyVariable(binding.name.clone()).into())
                    }
                },
                None => return Err(self.undefined(name, &slots)),
            }
        };
        setter(value)
    }

    fn undefined(&self, name: &str, slots: &HashMap<String, Slot>) -> RuntimeError {
        let names: Vec<&str> = slots.values().map(slot_name).collect();
        RuntimeError::new(ErrorKind::UndefinedVariable(name.to_string())).with_suggestion(
            did_you_mean(name, names, SuggestionSearch::default()),
        )
    }

    /// All names as declared, sorted
    pub fn names(&self) -> Vec<String> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = slots.values().map(|s| slot_name(s).to_string()).collect();
        names.sort();
        names
    }

    pub fn host_bindings(&self) -> Vec<BindingInfo> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Host(binding) => Some(BindingInfo {
                    name: binding.name.clone(),
                    type_name: binding.type_name.clone(),
                    writable: binding.is_writable(),
                }),
                Slot::Script { .. } => None,
            })
            .collect()
    }

    /// Script-declared variables only; host storage is the host's business.
    /// Object values cannot be persisted and are skipped.
    pub fn script_snapshot(&self) -> BTreeMap<String, PersistedValue> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Script { name, value } => {
                    PersistedValue::from_runtime(value).map(|v| (name.clone(), v))
                }
                Slot::Host(_) => None,
            })
            .collect()
    }

    /// Replace every script variable with the given set. Names that collide
    /// with host bindings are ignored.
    pub fn restore(&self, variables: &BTreeMap<String, PersistedValue>) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| matches!(slot, Slot::Host(_)));
        for (name, value) in variables {
            let slot = key(name);
            if slots.contains_key(&slot) {
                warn!(variable = %name, "Skipping restored value shadowing a host variable");
                continue;
            }
            slots.insert(
                slot,
                Slot::Script {
                    name: name.clone(),
                    value: value.clone().into(),
                },
            );
        }
    }
}

fn slot_name(slot: &Slot) -> &str {
    match slot {
        Slot::Host(binding) => &binding.name,
        Slot::Script { name, .. } => name,
    }
}

// ============================================================================
// Member Cache
// ============================================================================

/// Member set of one host type, derived once
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMembers {
    pub type_name: String,
    members: Vec<MemberInfo>,
}

impl TypeMembers {
    /// Build from a descriptor list. On overloads the first declaration
    /// wins; the dropped names are returned for reporting.
    fn build(type_name: &str, declared: Vec<MemberInfo>) -> (Self, Vec<String>) {
        let mut members: Vec<MemberInfo> = Vec::with_capacity(declared.len());
        let mut ambiguous = Vec::new();
        for member in declared {
            if members.iter().any(|m| m.name.eq_ignore_ascii_case(&member.name)) {
                if !ambiguous.contains(&member.name) {
                    ambiguous.push(member.name.clone());
                }
                continue;
            }
            members.push(member);
        }
        (
            Self {
                type_name: type_name.to_string(),
                members,
            },
            ambiguous,
        )
    }

    pub fn get(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// Lookup that reports an unknown member with the nearest known one
    pub fn resolve(&self, name: &str) -> RuntimeResult<&MemberInfo> {
        self.get(name).ok_or_else(|| {
            RuntimeError::new(ErrorKind::UnknownMember {
                type_name: self.type_name.clone(),
                member: name.to_string(),
            })
            .with_suggestion(did_you_mean(name, self.names(), SuggestionSearch::default()))
        })
    }
}

/// Per-type member sets, filled lazily and only ever grown.
///
/// Owned by a [`DialogueContext`](super::DialogueContext); `clear` is the
/// only way entries go away.
#[derive(Default)]
pub struct MemberCache {
    types: RwLock<HashMap<String, Arc<TypeMembers>>>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of the object's type, derived on first use
    pub fn members_of(&self, object: &dyn HostObject) -> Arc<TypeMembers> {
        let type_name = object.type_name();
        if let Some(found) = self.lookup(type_name) {
            return found;
        }
        self.insert_if_absent(type_name, object.members())
    }

    /// Declare a type's members without an instance
    pub fn register_type(&self, type_name: &str, members: Vec<MemberInfo>) -> Arc<TypeMembers> {
        self.insert_if_absent(type_name, members)
    }

    fn insert_if_absent(&self, type_name: &str, declared: Vec<MemberInfo>) -> Arc<TypeMembers> {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = types.get(&key(type_name)) {
            return Arc::clone(found);
        }
        let (members, ambiguous) = TypeMembers::build(type_name, declared);
        if !ambiguous.is_empty() {
            warn!(
                type_name,
                members = ?ambiguous,
                "Overloaded members are not supported; keeping the first declaration"
            );
        }
        let members = Arc::new(members);
        types.insert(key(type_name), Arc::clone(&members));
        members
    }

    pub fn lookup(&self, type_name: &str) -> Option<Arc<TypeMembers>> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(type_name))
            .cloned()
    }

    pub fn all(&self) -> Vec<Arc<TypeMembers>> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::host::{HostRecord, MemberKind};
    use maplit::btreemap;

    #[test]
    fn test_signature_arity() {
        let sig = FunctionSignature::new("clamp")
            .param("x", "Number")
            .optional("lo", "Number", Some(PersistedValue::Number(0.0)))
            .optional("hi", "Number", None)
            .returns("Number");
        assert_eq!(sig.min_required, 1);
        assert_eq!(sig.max, Some(3));
        assert!(sig.accepts(1) && sig.accepts(3));
        assert!(!sig.accepts(0) && !sig.accepts(4));
        assert_eq!(sig.expected_arity(), "1 to 3");
        assert_eq!(sig.to_string(), "clamp(x: Number, lo?: Number, hi?: Number) -> Number");

        let args = sig.prepare_args(vec![RuntimeValue::Number(5.0)]).unwrap();
        assert_eq!(
            args,
            vec![RuntimeValue::Number(5.0), RuntimeValue::Number(0.0), RuntimeValue::Null]
        );
    }

    #[test]
    fn test_signature_rejects_required_after_optional() {
        let sig = FunctionSignature::new("bad")
            .optional("a", "Number", None)
            .param("b", "Number");
        assert!(matches!(sig.validate(), Err(RegistryError::InvalidSignature { .. })));
    }

    #[test]
    fn test_duplicate_function_is_rejected() {
        let table = FunctionTable::new();
        table
            .register_sync(FunctionSignature::new("Roll").returns("Number"), |_| {
                Ok(RuntimeValue::Number(4.0))
            })
            .unwrap();

        let err = table
            .register_sync(FunctionSignature::untyped("roll"), |_| Ok(RuntimeValue::Null))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateFunction {
                name: "roll".to_string(),
                existing: "Roll() -> Number".to_string(),
            }
        );
        assert!(table.contains("ROLL"));
    }

    #[test]
    fn test_unknown_function_suggests() {
        let table = FunctionTable::new();
        table
            .register_sync(FunctionSignature::untyped("visited"), |_| Ok(RuntimeValue::Null))
            .unwrap();
        let err = table.resolve("visted").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownFunction("visted".to_string()));
        assert_eq!(err.suggestion.as_deref(), Some("did you mean 'visited'?"));
    }

    #[test]
    fn test_variables_are_case_insensitive() {
        let table = VariableTable::new();
        assert!(table.declare("Gold", RuntimeValue::Number(1.0)));
        assert!(!table.declare("gold", RuntimeValue::Number(9.0)));
        assert_eq!(table.get("GOLD").unwrap(), RuntimeValue::Number(1.0));
        table.set("gold", RuntimeValue::Number(2.0)).unwrap();
        assert_eq!(table.get("Gold").unwrap(), RuntimeValue::Number(2.0));
    }

    #[test]
    fn test_undefined_variable_suggests_nearest() {
        let table = VariableTable::new();
        table.declare("gold", RuntimeValue::Number(1.0));
        let err = table.get("gld").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedVariable("gld".to_string()));
        assert_eq!(err.suggestion.as_deref(), Some("did you mean 'gold'?"));
        assert!(table.set("gld", RuntimeValue::Null).is_err());
    }

    #[test]
    fn test_host_binding_read_only_and_cell() {
        let table = VariableTable::new();
        table
            .register_host(HostBinding::constant("version", RuntimeValue::Number(3.0)))
            .unwrap();
        let err = table.set("version", RuntimeValue::Number(4.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReadOnlyVariable("version".to_string()));

        let cell = Arc::new(RwLock::new(RuntimeValue::Number(10.0)));
        table
            .register_host(HostBinding::cell("health", Arc::clone(&cell)))
            .unwrap();
        table.set("health", RuntimeValue::Number(7.0)).unwrap();
        assert_eq!(*cell.read().unwrap(), RuntimeValue::Number(7.0));
        assert!(table.is_host("HEALTH"));

        let err = table
            .register_host(HostBinding::constant("Health", RuntimeValue::Null))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateVariable { name: "Health".to_string() });
    }

    #[test]
    fn test_snapshot_excludes_host_variables() {
        let table = VariableTable::new();
        table
            .register_host(HostBinding::constant("version", RuntimeValue::Number(3.0)))
            .unwrap();
        table.declare("met_guard", RuntimeValue::Boolean(true));

        let snapshot = table.script_snapshot();
        assert_eq!(snapshot, btreemap! { "met_guard".to_string() => PersistedValue::Boolean(true) });

        table.declare("temp", RuntimeValue::Number(1.0));
        table.restore(&btreemap! {
            "met_guard".to_string() => PersistedValue::Boolean(false),
            "version".to_string() => PersistedValue::Number(99.0),
        });
        assert!(!table.contains("temp"));
        assert_eq!(table.get("met_guard").unwrap(), RuntimeValue::Boolean(false));
        assert_eq!(table.get("version").unwrap(), RuntimeValue::Number(3.0));
    }

    #[test]
    fn test_member_cache_builds_once_and_keeps_first_overload() {
        let cache = MemberCache::new();
        let record = HostRecord::new("Door").field("open", false);
        let first = cache.members_of(&record);
        let second = cache.members_of(&record);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let members = cache.register_type(
            "Lever",
            vec![
                MemberInfo::field("pull", "Boolean", false),
                MemberInfo::method(FunctionSignature::new("Pull")),
            ],
        );
        assert_eq!(members.members().len(), 1);
        assert_eq!(
            members.get("PULL").map(|m| m.kind),
            Some(MemberKind::Field { writable: false })
        );

        let err = members.resolve("pul").unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("did you mean 'pull'?"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
