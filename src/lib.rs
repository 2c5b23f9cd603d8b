//! Hookline library - script hooks for a game server engine.
//!
//! This crate lets Lua scripts register callbacks for engine events, marshals
//! each event's arguments into the shared script context, runs every matching
//! callback in order and folds their answers into one decision for the engine.

pub mod binding;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod hooks;
pub mod lua;
pub mod world;

pub use binding::{BindingCounts, BindingFamily, BindingHandle, BindingId};
pub use config::HookConfig;
pub use error::{HookError, Result};
pub use event::{PacketEvent, ResultContract, ServerEvent, VehicleEvent};
pub use hooks::{AggregateDecision, CallbackFault, FaultReporter, HookEngine, LoadReport};
