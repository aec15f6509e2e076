//! Static type lattice used by the semantic analyzer
//!
//! `Any` is compatible with everything and is what inference falls back to
//! when a host type is unknown. `Error` is a poison value: it marks an
//! expression that already produced a diagnostic so that follow-on checks
//! stay quiet. It never reaches the evaluator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum TypeInfo {
    Number,
    String,
    Boolean,
    Null,
    /// Host type, identified by its registered type name
    Object(String),
    Array(Box<TypeInfo>),
    Dictionary(Box<TypeInfo>, Box<TypeInfo>),
    Function,
    Any,
    Error,
}

impl TypeInfo {
    /// Resolve a declared type name.
    ///
    /// Built-in names are case-insensitive. `list<T>`, `array<T>` and `T[]`
    /// describe arrays; `dict<K, V>` and `map<K, V>` describe dictionaries.
    /// Anything else names a host object type.
    pub fn from_name(name: &str) -> TypeInfo {
        let name = name.trim();
        if name.is_empty() {
            return TypeInfo::Any;
        }

        if let Some(element) = name.strip_suffix("[]") {
            return TypeInfo::Array(Box::new(TypeInfo::from_name(element)));
        }

        if let Some((head, args)) = split_generic(name) {
            match head.to_ascii_lowercase().as_str() {
                "list" | "array" => {
                    return TypeInfo::Array(Box::new(TypeInfo::from_name(args)));
                }
                "dict" | "dictionary" | "map" => {
                    if let Some((key, value)) = split_top_level_comma(args) {
                        return TypeInfo::Dictionary(
                            Box::new(TypeInfo::from_name(key)),
                            Box::new(TypeInfo::from_name(value)),
                        );
                    }
                }
                _ => {}
            }
        }

        match name.to_ascii_lowercase().as_str() {
            "number" | "float" | "double" | "int" | "integer" | "f64" | "i64" => TypeInfo::Number,
            "string" | "str" | "text" => TypeInfo::String,
            "bool" | "boolean" => TypeInfo::Boolean,
            "null" | "void" | "unit" => TypeInfo::Null,
            "function" | "fn" => TypeInfo::Function,
            "any" | "object" => TypeInfo::Any,
            _ => TypeInfo::Object(name.to_string()),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeInfo::Any)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeInfo::Error)
    }

    /// Neither `Any` nor `Error`: the type is actually known
    pub fn is_concrete(&self) -> bool {
        !matches!(self, TypeInfo::Any | TypeInfo::Error)
    }

    /// Number, or something that could be one at runtime
    pub fn may_be_number(&self) -> bool {
        matches!(self, TypeInfo::Number | TypeInfo::Any | TypeInfo::Error)
    }

    pub fn may_be_boolean(&self) -> bool {
        matches!(self, TypeInfo::Boolean | TypeInfo::Any | TypeInfo::Error)
    }

    /// Whether a value of type `self` can be used where `other` is expected
    pub fn is_compatible_with(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Any | TypeInfo::Error, _) | (_, TypeInfo::Any | TypeInfo::Error) => true,
            (TypeInfo::Array(a), TypeInfo::Array(b)) => a.is_compatible_with(b),
            (TypeInfo::Dictionary(ka, va), TypeInfo::Dictionary(kb, vb)) => {
                ka.is_compatible_with(kb) && va.is_compatible_with(vb)
            }
            (TypeInfo::Object(a), TypeInfo::Object(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    /// Both sides are known and can never compare equal.
    ///
    /// Comparing against `null` is a presence check and never counts.
    pub fn definitely_differs(&self, other: &TypeInfo) -> bool {
        if matches!(self, TypeInfo::Null) || matches!(other, TypeInfo::Null) {
            return false;
        }
        self.is_concrete() && other.is_concrete() && !self.is_compatible_with(other)
    }

    /// Result of indexing a value of this type, if it is indexable
    pub fn element_type(&self) -> Option<TypeInfo> {
        match self {
            TypeInfo::Array(element) => Some((**element).clone()),
            TypeInfo::Dictionary(_, value) => Some((**value).clone()),
            TypeInfo::String => Some(TypeInfo::String),
            TypeInfo::Any | TypeInfo::Error => Some(self.clone()),
            // Host objects may expose indexing; checked at runtime
            TypeInfo::Object(_) => Some(TypeInfo::Any),
            _ => None,
        }
    }

    /// Expected index type for this collection
    pub fn key_type(&self) -> Option<TypeInfo> {
        match self {
            TypeInfo::Array(_) | TypeInfo::String => Some(TypeInfo::Number),
            TypeInfo::Dictionary(key, _) => Some((**key).clone()),
            TypeInfo::Any | TypeInfo::Error | TypeInfo::Object(_) => Some(TypeInfo::Any),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInfo::Number => write!(f, "Number"),
            TypeInfo::String => write!(f, "String"),
            TypeInfo::Boolean => write!(f, "Boolean"),
            TypeInfo::Null => write!(f, "Null"),
            TypeInfo::Object(name) => write!(f, "{}", name),
            TypeInfo::Array(element) => write!(f, "List<{}>", element),
            TypeInfo::Dictionary(key, value) => write!(f, "Dict<{}, {}>", key, value),
            TypeInfo::Function => write!(f, "Function"),
            TypeInfo::Any => write!(f, "Any"),
            TypeInfo::Error => write!(f, "<error>"),
        }
    }
}

/// `head<args>` → (`head`, `args`)
fn split_generic(name: &str) -> Option<(&str, &str)> {
    let open = name.find('<')?;
    let inner = name.strip_suffix('>')?;
    Some((&name[..open], &inner[open + 1..]))
}

/// Split `K, V` at the first comma outside angle brackets
fn split_top_level_comma(args: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&args[..i], &args[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(TypeInfo::from_name("Number"), TypeInfo::Number);
        assert_eq!(TypeInfo::from_name("bool"), TypeInfo::Boolean);
        assert_eq!(TypeInfo::from_name(""), TypeInfo::Any);
        assert_eq!(
            TypeInfo::from_name("Player"),
            TypeInfo::Object("Player".to_string())
        );
        assert_eq!(
            TypeInfo::from_name("list<string>"),
            TypeInfo::Array(Box::new(TypeInfo::String))
        );
        assert_eq!(
            TypeInfo::from_name("number[]"),
            TypeInfo::Array(Box::new(TypeInfo::Number))
        );
        assert_eq!(
            TypeInfo::from_name("dict<string, list<number>>"),
            TypeInfo::Dictionary(
                Box::new(TypeInfo::String),
                Box::new(TypeInfo::Array(Box::new(TypeInfo::Number)))
            )
        );
    }

    #[test]
    fn test_any_is_compatible_with_everything() {
        let all = [
            TypeInfo::Number,
            TypeInfo::String,
            TypeInfo::Boolean,
            TypeInfo::Null,
            TypeInfo::Object("Player".into()),
            TypeInfo::Function,
        ];
        for ty in &all {
            assert!(TypeInfo::Any.is_compatible_with(ty));
            assert!(ty.is_compatible_with(&TypeInfo::Any));
        }
        assert!(!TypeInfo::Number.is_compatible_with(&TypeInfo::String));
    }

    #[test]
    fn test_definitely_differs() {
        assert!(TypeInfo::Number.definitely_differs(&TypeInfo::String));
        assert!(!TypeInfo::Number.definitely_differs(&TypeInfo::Any));
        assert!(!TypeInfo::Null.definitely_differs(&TypeInfo::String));
        assert!(!TypeInfo::Number.definitely_differs(&TypeInfo::Number));
    }

    #[test]
    fn test_element_types() {
        assert_eq!(TypeInfo::String.element_type(), Some(TypeInfo::String));
        assert_eq!(TypeInfo::Number.element_type(), None);
        assert_eq!(
            TypeInfo::from_name("map<string, bool>").element_type(),
            Some(TypeInfo::Boolean)
        );
    }
}
