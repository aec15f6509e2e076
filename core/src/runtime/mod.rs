//! Runtime values and the host registry
//!
//! - `value.rs` - [`RuntimeValue`] and its persisted form
//! - `host.rs` - the [`HostObject`] capability trait and ready-made host types
//! - `registry.rs` - variable table, function table, member cache
//! - `context.rs` - [`DialogueContext`], which owns all of the above
//! - `stdlib.rs` - built-in functions

pub mod context;
pub mod host;
pub mod registry;
pub mod stdlib;
pub mod value;

pub use context::{DialogueContext, Snapshot, VisitCounter};
pub use host::{async_fn, sync_fn, HostFn, HostFunction, HostList, HostMap, HostObject, HostRecord, MemberInfo, MemberKind};
pub use registry::{FunctionSignature, FunctionTable, HostBinding, MemberCache, VariableTable};
pub use value::{HostHandle, PersistedValue, RuntimeValue};
