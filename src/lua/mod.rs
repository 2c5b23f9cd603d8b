//! Embedded Lua runtime.
//!
//! Owns the execution context hooks marshal into, the sandbox applied before
//! any script runs, script discovery and the registration API scripts call.

pub mod api;
pub mod context;
pub mod sandbox;
pub mod script;

pub use context::{CallFrame, ContextStats, ExecutionContext, Invocation};
pub use script::{Script, ScriptSet};
