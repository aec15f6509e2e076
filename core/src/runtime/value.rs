//! Runtime value types

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::host::HostObject;
use crate::types::TypeInfo;

/// Fixed multiplier mixing the type tag into a value's hash
const HASH_MULTIPLIER: u64 = 31;

/// Every value the evaluator can produce or store
#[derive(Clone)]
pub enum RuntimeValue {
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
    /// Opaque host object; compares by identity
    Object(HostHandle),
}

/// Shared handle to a host object
#[derive(Clone)]
pub struct HostHandle(pub Arc<dyn HostObject>);

impl HostHandle {
    pub fn new(object: Arc<dyn HostObject>) -> Self {
        Self(object)
    }

    pub fn object(&self) -> &dyn HostObject {
        self.0.as_ref()
    }

    pub fn ptr_eq(&self, other: &HostHandle) -> bool {
        // Compare data pointers only; vtables may differ across codegen units
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const u8,
            Arc::as_ptr(&other.0) as *const u8,
        )
    }

    fn address(&self) -> u64 {
        Arc::as_ptr(&self.0) as *const u8 as usize as u64
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.describe())
    }
}

impl RuntimeValue {
    fn tag(&self) -> u64 {
        match self {
            RuntimeValue::Null => 0,
            RuntimeValue::Number(_) => 1,
            RuntimeValue::Boolean(_) => 2,
            RuntimeValue::String(_) => 3,
            RuntimeValue::Object(_) => 4,
        }
    }

    pub fn object(object: Arc<dyn HostObject>) -> Self {
        RuntimeValue::Object(HostHandle(object))
    }

    /// Name of the runtime kind, used in error messages
    pub fn type_name(&self) -> String {
        match self {
            RuntimeValue::Null => "Null".to_string(),
            RuntimeValue::Number(_) => "Number".to_string(),
            RuntimeValue::Boolean(_) => "Boolean".to_string(),
            RuntimeValue::String(_) => "String".to_string(),
            RuntimeValue::Object(handle) => handle.object().type_name().to_string(),
        }
    }

    /// Static type corresponding to this value
    pub fn type_info(&self) -> TypeInfo {
        match self {
            RuntimeValue::Null => TypeInfo::Null,
            RuntimeValue::Number(_) => TypeInfo::Number,
            RuntimeValue::Boolean(_) => TypeInfo::Boolean,
            RuntimeValue::String(_) => TypeInfo::String,
            RuntimeValue::Object(handle) => TypeInfo::from_name(handle.object().type_name()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RuntimeValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuntimeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RuntimeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostHandle> {
        match self {
            RuntimeValue::Object(handle) => Some(handle),
            _ => None,
        }
    }

    fn value_hash(&self) -> u64 {
        match self {
            RuntimeValue::Null => 0,
            RuntimeValue::Number(n) => canonical_bits(*n),
            RuntimeValue::Boolean(b) => *b as u64,
            RuntimeValue::String(s) => fnv1a(s.as_bytes()),
            RuntimeValue::Object(handle) => handle.address(),
        }
    }
}

/// Bits that are equal whenever the numbers compare equal here:
/// `-0.0` folds into `0.0` and every NaN into one pattern.
fn canonical_bits(n: f64) -> u64 {
    if n == 0.0 {
        0.0f64.to_bits()
    } else if n.is_nan() {
        f64::NAN.to_bits()
    } else {
        n.to_bits()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

impl PartialEq for RuntimeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RuntimeValue::Null, RuntimeValue::Null) => true,
            (RuntimeValue::Number(a), RuntimeValue::Number(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (RuntimeValue::Boolean(a), RuntimeValue::Boolean(b)) => a == b,
            (RuntimeValue::String(a), RuntimeValue::String(b)) => a == b,
            (RuntimeValue::Object(a), RuntimeValue::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for RuntimeValue {}

impl Hash for RuntimeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mixed = self
            .tag()
            .wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(self.value_hash());
        state.write_u64(mixed);
    }
}

impl std::fmt::Debug for RuntimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeValue::Null => write!(f, "Null"),
            RuntimeValue::Number(n) => write!(f, "Number({})", n),
            RuntimeValue::Boolean(b) => write!(f, "Boolean({})", b),
            RuntimeValue::String(s) => write!(f, "String({:?})", s),
            RuntimeValue::Object(handle) => write!(f, "Object({:?})", handle),
        }
    }
}

/// Display form used by text interpolation
impl std::fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeValue::Null => write!(f, "null"),
            RuntimeValue::Number(n) => write!(f, "{}", format_number(*n)),
            RuntimeValue::Boolean(b) => write!(f, "{}", b),
            RuntimeValue::String(s) => write!(f, "{}", s),
            RuntimeValue::Object(handle) => write!(f, "{}", handle.object().describe()),
        }
    }
}

/// `14.0` → `14`, `0.5` → `0.5`, `-0.0` → `0`
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{}", n)
}

impl From<f64> for RuntimeValue {
    fn from(n: f64) -> Self {
        RuntimeValue::Number(n)
    }
}

impl From<i32> for RuntimeValue {
    fn from(n: i32) -> Self {
        RuntimeValue::Number(n as f64)
    }
}

impl From<bool> for RuntimeValue {
    fn from(b: bool) -> Self {
        RuntimeValue::Boolean(b)
    }
}

impl From<&str> for RuntimeValue {
    fn from(s: &str) -> Self {
        RuntimeValue::String(s.to_string())
    }
}

impl From<String> for RuntimeValue {
    fn from(s: String) -> Self {
        RuntimeValue::String(s)
    }
}

/* ===================== Persisted values ===================== */

/// Serializable subset of [`RuntimeValue`]; host objects are never saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum PersistedValue {
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
}

impl PersistedValue {
    pub fn from_runtime(value: &RuntimeValue) -> Option<Self> {
        match value {
            RuntimeValue::Null => Some(PersistedValue::Null),
            RuntimeValue::Number(n) => Some(PersistedValue::Number(*n)),
            RuntimeValue::Boolean(b) => Some(PersistedValue::Boolean(*b)),
            RuntimeValue::String(s) => Some(PersistedValue::String(s.clone())),
            RuntimeValue::Object(_) => None,
        }
    }

    /// Parse a command-line style literal: numbers, `true`/`false`, `null`,
    /// anything else is a string.
    pub fn parse_literal(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            return PersistedValue::Number(n);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => PersistedValue::Boolean(true),
            "false" => PersistedValue::Boolean(false),
            "null" => PersistedValue::Null,
            _ => PersistedValue::String(text.to_string()),
        }
    }
}

impl From<PersistedValue> for RuntimeValue {
    fn from(value: PersistedValue) -> Self {
        match value {
            PersistedValue::Null => RuntimeValue::Null,
            PersistedValue::Number(n) => RuntimeValue::Number(n),
            PersistedValue::Boolean(b) => RuntimeValue::Boolean(b),
            PersistedValue::String(s) => RuntimeValue::String(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &RuntimeValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_requires_matching_tags() {
        assert_ne!(RuntimeValue::Number(1.0), RuntimeValue::from("1"));
        assert_ne!(RuntimeValue::Boolean(false), RuntimeValue::Number(0.0));
        assert_ne!(RuntimeValue::Null, RuntimeValue::from(""));
        assert_eq!(RuntimeValue::Null, RuntimeValue::Null);
    }

    #[test]
    fn test_numbers_compare_exactly() {
        assert_eq!(RuntimeValue::Number(0.1 + 0.2), RuntimeValue::Number(0.1 + 0.2));
        assert_ne!(RuntimeValue::Number(0.1 + 0.2), RuntimeValue::Number(0.3));
    }

    #[test]
    fn test_strings_compare_ordinally() {
        assert_ne!(RuntimeValue::from("Gold"), RuntimeValue::from("gold"));
    }

    #[test]
    fn test_zero_and_nan_hash_consistently() {
        let pos = RuntimeValue::Number(0.0);
        let neg = RuntimeValue::Number(-0.0);
        assert_eq!(pos, neg);
        assert_eq!(hash_of(&pos), hash_of(&neg));

        let nan = RuntimeValue::Number(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(hash_of(&nan), hash_of(&RuntimeValue::Number(-f64::NAN)));
    }

    #[test]
    fn test_display() {
        assert_eq!(RuntimeValue::Number(14.0).to_string(), "14");
        assert_eq!(RuntimeValue::Number(2.5).to_string(), "2.5");
        assert_eq!(RuntimeValue::Number(-0.0).to_string(), "0");
        assert_eq!(RuntimeValue::Null.to_string(), "null");
        assert_eq!(RuntimeValue::Boolean(true).to_string(), "true");
        assert_eq!(RuntimeValue::from("hi").to_string(), "hi");
    }

    #[test]
    fn test_persisted_round_trip_through_json() {
        let value = PersistedValue::Number(3.0);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"t":"Number","v":3.0}"#);
        let back: PersistedValue = serde_json::from_str(&json).unwrap();
        assert_eq!(RuntimeValue::from(back), RuntimeValue::Number(3.0));
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(PersistedValue::parse_literal("10"), PersistedValue::Number(10.0));
        assert_eq!(PersistedValue::parse_literal("TRUE"), PersistedValue::Boolean(true));
        assert_eq!(
            PersistedValue::parse_literal("Alice"),
            PersistedValue::String("Alice".into())
        );
    }
}
