//! The shared script execution context.
//!
//! `mlua` does not expose the Lua stack, so the context keeps its own slot
//! stack of marshalled values. Hook dispatch pushes its arguments there,
//! invokes callbacks against the top slots, reads typed results out of the
//! result slots and pops everything again before it returns.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use mlua::{AnyUserData, Function, IntoLua, Lua, MultiValue, UserData, Value};
use serde::Serialize;

use crate::world::{Handle, Lease, ScriptObject};

/// Running totals of stack traffic, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub pushed: u64,
    pub popped: u64,
    pub invocations: u64,
}

/// Outcome of invoking one callback.
#[derive(Debug)]
pub struct Invocation {
    /// `Err` when the callback raised; its result slots are then all nil.
    pub status: mlua::Result<()>,
    /// Slot index of the first result.
    pub base: usize,
}

pub struct ExecutionContext {
    lua: Lua,
    stack: RefCell<Vec<Value>>,
    stats: Cell<ContextStats>,
    event_level: Cell<u32>,
}

impl ExecutionContext {
    pub fn new(lua: Lua) -> Self {
        Self {
            lua,
            stack: RefCell::new(Vec::new()),
            stats: Cell::new(ContextStats::default()),
            event_level: Cell::new(0),
        }
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn stats(&self) -> ContextStats {
        self.stats.get()
    }

    /// Number of dispatches currently on the call chain.
    pub fn event_level(&self) -> u32 {
        self.event_level.get()
    }

    fn record(&self, f: impl FnOnce(&mut ContextStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    pub fn push_value(&self, value: Value) {
        self.stack.borrow_mut().push(value);
        self.record(|s| s.pushed += 1);
    }

    /// Push a scalar, string or guid.
    pub fn push(&self, value: impl IntoLua) -> mlua::Result<()> {
        let value = value.into_lua(&self.lua)?;
        self.push_value(value);
        Ok(())
    }

    /// Push an owned copy the script may keep or mutate freely.
    pub fn push_copy<T>(&self, value: &T) -> mlua::Result<()>
    where
        T: UserData + Clone + Send + 'static,
    {
        let userdata = self.lua.create_userdata(value.clone())?;
        self.push_value(Value::UserData(userdata));
        Ok(())
    }

    /// Push a live engine object as a handle bounded by `lease`.
    pub fn push_object<T: ScriptObject>(&self, object: &Arc<T>, lease: &Lease) -> mlua::Result<()> {
        let userdata = self.lua.create_userdata(Handle::new(object, lease))?;
        self.push_value(Value::UserData(userdata));
        Ok(())
    }

    /// As [`push_object`](Self::push_object), pushing nil for `None`.
    pub fn push_optional_object<T: ScriptObject>(
        &self,
        object: Option<&Arc<T>>,
        lease: &Lease,
    ) -> mlua::Result<()> {
        match object {
            Some(object) => self.push_object(object, lease),
            None => {
                self.push_value(Value::Nil);
                Ok(())
            }
        }
    }

    /// Call `function` with the top `arg_count` slots as arguments.
    ///
    /// Exactly `expected_results` slots are pushed afterwards whatever the
    /// callback did: short returns are padded with nil, extra values are
    /// dropped, and a callback error leaves nil in every slot.
    pub fn invoke(&self, function: &Function, arg_count: usize, expected_results: usize) -> Invocation {
        let args = {
            let stack = self.stack.borrow();
            debug_assert!(arg_count <= stack.len(), "invoke past the bottom of the frame");
            let first = stack.len().saturating_sub(arg_count);
            MultiValue::from_vec(stack[first..].to_vec())
        };
        self.record(|s| s.invocations += 1);

        // No stack borrow is held here: the callback may dispatch again.
        let (status, returned) = match function.call::<MultiValue>(args) {
            Ok(values) => (Ok(()), values.into_iter().collect::<Vec<_>>()),
            Err(err) => (Err(err), Vec::new()),
        };

        let mut results = returned;
        results.resize(expected_results, Value::Nil);

        let mut stack = self.stack.borrow_mut();
        let base = stack.len();
        stack.extend(results);
        drop(stack);
        self.record(|s| s.pushed += expected_results as u64);

        Invocation { status, base }
    }

    /// Boolean at `slot`; anything else is "no opinion".
    pub fn read_bool(&self, slot: usize) -> Option<bool> {
        match self.stack.borrow().get(slot) {
            Some(Value::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Copy of the userdata at `slot` if it holds a `T`.
    pub fn read_object<T>(&self, slot: usize) -> Option<T>
    where
        T: UserData + Clone + 'static,
    {
        let stack = self.stack.borrow();
        let userdata: &AnyUserData = match stack.get(slot) {
            Some(Value::UserData(ud)) => ud,
            _ => return None,
        };
        let value = userdata.borrow::<T>().ok()?;
        Some(T::clone(&value))
    }

    /// Pop exactly `n` slots.
    pub fn clear_frame(&self, n: usize) {
        let mut stack = self.stack.borrow_mut();
        debug_assert!(n <= stack.len(), "popping more slots than were pushed");
        let keep = stack.len().saturating_sub(n);
        let popped = stack.len() - keep;
        stack.truncate(keep);
        drop(stack);
        self.record(|s| s.popped += popped as u64);
    }

    /// Start a dispatch frame at the current stack top.
    pub fn open_frame(&self) -> CallFrame<'_> {
        self.event_level.set(self.event_level.get() + 1);
        CallFrame {
            context: self,
            base: self.depth(),
            lease: Lease::new(),
        }
    }
}

/// The argument slots and object lease of one dispatch.
///
/// Dropping the frame pops whatever it still owns and revokes every handle
/// created under its lease, on normal and early exits alike.
pub struct CallFrame<'a> {
    context: &'a ExecutionContext,
    base: usize,
    lease: Lease,
}

impl CallFrame<'_> {
    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Slots pushed since the frame opened.
    pub fn len(&self) -> usize {
        self.context.depth().saturating_sub(self.base)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        let leftover = self.len();
        if leftover > 0 {
            self.context.clear_frame(leftover);
        }
        self.lease.revoke();
        self.context
            .event_level
            .set(self.context.event_level.get().saturating_sub(1));
    }
}
