//! Host object capability interface
//!
//! A host type exposes its readable, writable and callable members through
//! [`HostObject::members`]. The core never inspects host types any other
//! way; the descriptor list is read once per type and cached by
//! [`MemberCache`](super::registry::MemberCache).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::registry::FunctionSignature;
use super::value::RuntimeValue;
use crate::errors::{ErrorKind, RuntimeError, RuntimeResult};

/// Pending result of a host call
pub type HostFuture = Pin<Box<dyn Future<Output = RuntimeResult<RuntimeValue>> + Send>>;

/// Callable registered by the host
pub type HostFn = Arc<dyn Fn(Vec<RuntimeValue>) -> HostFuture + Send + Sync>;

/// Wrap an already computed result as a [`HostFuture`]
pub fn ready(result: RuntimeResult<RuntimeValue>) -> HostFuture {
    Box::pin(std::future::ready(result))
}

/// Adapt a synchronous closure into a [`HostFn`]
pub fn sync_fn<F>(f: F) -> HostFn
where
    F: Fn(Vec<RuntimeValue>) -> RuntimeResult<RuntimeValue> + Send + Sync + 'static,
{
    Arc::new(move |args| ready(f(args)))
}

/// Adapt an async closure into a [`HostFn`]
pub fn async_fn<F, Fut>(f: F) -> HostFn
where
    F: Fn(Vec<RuntimeValue>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RuntimeResult<RuntimeValue>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/* ===================== Member descriptors ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemberKind {
    Field { writable: bool },
    Method,
}

/// One member of a host type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    /// Field type, or the method's return type
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<FunctionSignature>,
}

impl MemberInfo {
    pub fn field(name: impl Into<String>, type_name: impl Into<String>, writable: bool) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field { writable },
            type_name: type_name.into(),
            signature: None,
        }
    }

    pub fn method(signature: FunctionSignature) -> Self {
        Self {
            name: signature.name.clone(),
            kind: MemberKind::Method,
            type_name: signature.return_type.clone(),
            signature: Some(signature),
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, MemberKind::Method)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.kind, MemberKind::Field { writable: true })
    }
}

/* ===================== HostObject ===================== */

/// Capability set implemented by every host-provided value.
///
/// Member names are matched case-insensitively. Only `type_name`,
/// `members` and `get` are mandatory; the rest default to "unsupported".
pub trait HostObject: Send + Sync {
    /// Registered type name; also the key of the member cache
    fn type_name(&self) -> &str;

    fn members(&self) -> Vec<MemberInfo>;

    fn get(&self, member: &str) -> RuntimeResult<RuntimeValue>;

    fn set(&self, member: &str, _value: RuntimeValue) -> RuntimeResult<()> {
        Err(ErrorKind::ReadOnlyMember {
            type_name: self.type_name().to_string(),
            member: member.to_string(),
        }
        .into())
    }

    fn call(&self, method: &str, _args: Vec<RuntimeValue>) -> HostFuture {
        ready(Err(ErrorKind::UnknownMember {
            type_name: self.type_name().to_string(),
            member: method.to_string(),
        }
        .into()))
    }

    /// Invoke the object itself, for callable values
    fn invoke(&self, _args: Vec<RuntimeValue>) -> HostFuture {
        ready(Err(ErrorKind::NotCallable(self.type_name().to_string()).into()))
    }

    fn is_callable(&self) -> bool {
        false
    }

    /// Sequence or keyed lookup
    fn index(&self, _key: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
        Err(ErrorKind::NotIndexable(self.type_name().to_string()).into())
    }

    /// Element count for collections
    fn len(&self) -> Option<usize> {
        None
    }

    /// Display form used by text interpolation
    fn describe(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

fn unknown_member(type_name: &str, member: &str) -> RuntimeError {
    ErrorKind::UnknownMember {
        type_name: type_name.to_string(),
        member: member.to_string(),
    }
    .into()
}

/* ===================== HostRecord ===================== */

struct RecordField {
    name: String,
    type_name: String,
    writable: bool,
    value: RwLock<RuntimeValue>,
}

struct RecordMethod {
    signature: FunctionSignature,
    func: HostFn,
}

/// Host object assembled from named fields and methods.
///
/// ```ignore
/// let player = HostRecord::new("Player")
///     .field("name", "Alice")
///     .field_mut("gold", 10)
///     .method(FunctionSignature::new("greet").returns("String"), |_| Ok("hi".into()))
///     .into_value();
/// ```
pub struct HostRecord {
    type_name: String,
    fields: Vec<RecordField>,
    methods: Vec<RecordMethod>,
}

impl HostRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn push_field(mut self, name: &str, value: RuntimeValue, writable: bool) -> Self {
        let type_name = match &value {
            RuntimeValue::Null => "Any".to_string(),
            other => other.type_info().to_string(),
        };
        self.fields.push(RecordField {
            name: name.to_string(),
            type_name,
            writable,
            value: RwLock::new(value),
        });
        self
    }

    /// Read-only field
    pub fn field(self, name: &str, value: impl Into<RuntimeValue>) -> Self {
        self.push_field(name, value.into(), false)
    }

    /// Writable field
    pub fn field_mut(self, name: &str, value: impl Into<RuntimeValue>) -> Self {
        self.push_field(name, value.into(), true)
    }

    /// Synchronous method
    pub fn method<F>(self, signature: FunctionSignature, f: F) -> Self
    where
        F: Fn(Vec<RuntimeValue>) -> RuntimeResult<RuntimeValue> + Send + Sync + 'static,
    {
        self.method_fn(signature, sync_fn(f))
    }

    pub fn method_fn(mut self, signature: FunctionSignature, func: HostFn) -> Self {
        self.methods.push(RecordMethod { signature, func });
        self
    }

    pub fn into_value(self) -> RuntimeValue {
        RuntimeValue::object(Arc::new(self))
    }

    fn find_field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    fn find_method(&self, name: &str) -> Option<&RecordMethod> {
        self.methods
            .iter()
            .find(|m| m.signature.name.eq_ignore_ascii_case(name))
    }
}

impl HostObject for HostRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<MemberInfo> {
        let fields = self
            .fields
            .iter()
            .map(|f| MemberInfo::field(f.name.clone(), f.type_name.clone(), f.writable));
        let methods = self
            .methods
            .iter()
            .map(|m| MemberInfo::method(m.signature.clone()));
        fields.chain(methods).collect()
    }

    fn get(&self, member: &str) -> RuntimeResult<RuntimeValue> {
        let field = self
            .find_field(member)
            .ok_or_else(|| unknown_member(&self.type_name, member))?;
        let value = field.value.read().unwrap_or_else(PoisonError::into_inner);
        Ok(value.clone())
    }

    fn set(&self, member: &str, value: RuntimeValue) -> RuntimeResult<()> {
        let field = self
            .find_field(member)
            .ok_or_else(|| unknown_member(&self.type_name, member))?;
        if !field.writable {
            return Err(ErrorKind::ReadOnlyMember {
                type_name: self.type_name.clone(),
                member: field.name.clone(),
            }
            .into());
        }
        *field.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }

    fn call(&self, method: &str, args: Vec<RuntimeValue>) -> HostFuture {
        match self.find_method(method) {
            Some(m) => match m.signature.prepare_args(args) {
                Ok(args) => (m.func)(args),
                Err(err) => ready(Err(err)),
            },
            None => ready(Err(unknown_member(&self.type_name, method))),
        }
    }
}

/* ===================== HostFunction ===================== */

/// A function passed around as a value
pub struct HostFunction {
    signature: FunctionSignature,
    func: HostFn,
}

impl HostFunction {
    pub fn new(signature: FunctionSignature, func: HostFn) -> Self {
        Self { signature, func }
    }

    pub fn into_value(self) -> RuntimeValue {
        RuntimeValue::object(Arc::new(self))
    }
}

impl HostObject for HostFunction {
    fn type_name(&self) -> &str {
        "Function"
    }

    fn members(&self) -> Vec<MemberInfo> {
        Vec::new()
    }

    fn get(&self, member: &str) -> RuntimeResult<RuntimeValue> {
        Err(unknown_member("Function", member))
    }

    fn invoke(&self, args: Vec<RuntimeValue>) -> HostFuture {
        match self.signature.prepare_args(args) {
            Ok(args) => (self.func)(args),
            Err(err) => ready(Err(err)),
        }
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("<function {}>", self.signature.name)
    }
}

/* ===================== Collections ===================== */

fn count_member() -> MemberInfo {
    MemberInfo::field("count", "Number", false)
}

fn integral_index(key: &RuntimeValue, len: usize) -> RuntimeResult<usize> {
    let n = key.as_number().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("index must be a Number, got {}", key.type_name()))
    })?;
    if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
        return Err(ErrorKind::IndexOutOfBounds {
            index: n as i64,
            len,
        }
        .into());
    }
    Ok(n as usize)
}

/// Ordered sequence indexed by position
pub struct HostList {
    type_name: String,
    items: RwLock<Vec<RuntimeValue>>,
}

impl HostList {
    pub fn new(element_type: &str, items: Vec<RuntimeValue>) -> Self {
        Self {
            type_name: format!("List<{}>", element_type),
            items: RwLock::new(items),
        }
    }

    pub fn into_value(self) -> RuntimeValue {
        RuntimeValue::object(Arc::new(self))
    }

    pub fn push(&self, value: RuntimeValue) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }
}

impl HostObject for HostList {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<MemberInfo> {
        vec![
            count_member(),
            MemberInfo::method(
                FunctionSignature::new("contains")
                    .param("value", "Any")
                    .returns("Boolean"),
            ),
        ]
    }

    fn get(&self, member: &str) -> RuntimeResult<RuntimeValue> {
        if member.eq_ignore_ascii_case("count") {
            return Ok(RuntimeValue::Number(self.len().unwrap_or(0) as f64));
        }
        Err(unknown_member(&self.type_name, member))
    }

    fn call(&self, method: &str, args: Vec<RuntimeValue>) -> HostFuture {
        if !method.eq_ignore_ascii_case("contains") {
            return ready(Err(unknown_member(&self.type_name, method)));
        }
        let Some(needle) = args.first() else {
            return ready(Err(ErrorKind::ArityMismatch {
                name: "contains".to_string(),
                expected: "1".to_string(),
                got: 0,
            }
            .into()));
        };
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        ready(Ok(RuntimeValue::Boolean(items.contains(needle))))
    }

    fn index(&self, key: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let i = integral_index(key, items.len())?;
        Ok(items[i].clone())
    }

    fn len(&self) -> Option<usize> {
        Some(self.items.read().unwrap_or_else(PoisonError::into_inner).len())
    }

    fn describe(&self) -> String {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Keyed collection with a declared key type
pub struct HostMap {
    type_name: String,
    key_type: String,
    entries: RwLock<HashMap<RuntimeValue, RuntimeValue>>,
}

impl HostMap {
    pub fn new(key_type: &str, value_type: &str) -> Self {
        Self {
            type_name: format!("Dict<{}, {}>", key_type, value_type),
            key_type: key_type.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_entries<I>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = (RuntimeValue, RuntimeValue)>,
    {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(entries);
        self
    }

    pub fn insert(&self, key: RuntimeValue, value: RuntimeValue) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    pub fn into_value(self) -> RuntimeValue {
        RuntimeValue::object(Arc::new(self))
    }
}

impl HostObject for HostMap {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<MemberInfo> {
        vec![
            count_member(),
            MemberInfo::method(
                FunctionSignature::new("contains_key")
                    .param("key", &self.key_type)
                    .returns("Boolean"),
            ),
        ]
    }

    fn get(&self, member: &str) -> RuntimeResult<RuntimeValue> {
        if member.eq_ignore_ascii_case("count") {
            return Ok(RuntimeValue::Number(self.len().unwrap_or(0) as f64));
        }
        Err(unknown_member(&self.type_name, member))
    }

    fn call(&self, method: &str, args: Vec<RuntimeValue>) -> HostFuture {
        if !method.eq_ignore_ascii_case("contains_key") {
            return ready(Err(unknown_member(&self.type_name, method)));
        }
        let found = args.first().map(|key| {
            self.entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(key)
        });
        ready(Ok(RuntimeValue::Boolean(found.unwrap_or(false))))
    }

    fn index(&self, key: &RuntimeValue) -> RuntimeResult<RuntimeValue> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned().ok_or_else(|| {
            ErrorKind::KeyNotFound {
                key: format!("{:?}", key),
                key_type: self.key_type.clone(),
            }
            .into()
        })
    }

    fn len(&self) -> Option<usize> {
        Some(self.entries.read().unwrap_or_else(PoisonError::into_inner).len())
    }
}
