//! Non-owning, dispatch-scoped handles to live engine objects.
//!
//! A script receives a [`Handle`] instead of a copy of the object. The handle
//! holds a weak reference and a [`Lease`] shared by every handle created for
//! one dispatch; when the dispatch returns the lease is revoked and any handle
//! the script kept around stops resolving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use mlua::{UserData, UserDataMethods};

/// Validity window for the handles of one dispatch.
#[derive(Debug, Clone)]
pub struct Lease(Arc<AtomicBool>);

impl Lease {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::new()
    }
}

/// An engine object type that scripts can call into.
pub trait ScriptObject: Send + Sync + Sized + 'static {
    /// Name used in script-facing error messages.
    const TYPE_NAME: &'static str;

    fn add_methods<M: UserDataMethods<Handle<Self>>>(methods: &mut M);
}

/// Script-side reference to an engine object.
pub struct Handle<T> {
    target: Weak<T>,
    lease: Lease,
}

impl<T: ScriptObject> Handle<T> {
    pub fn new(target: &Arc<T>, lease: &Lease) -> Self {
        Self {
            target: Arc::downgrade(target),
            lease: lease.clone(),
        }
    }

    /// Run `f` against the object, failing if the handle outlived its dispatch.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> mlua::Result<R> {
        if !self.lease.is_active() {
            return Err(mlua::Error::runtime(format!(
                "{} handle used outside of the event that produced it",
                T::TYPE_NAME
            )));
        }
        let target = self.target.upgrade().ok_or_else(|| {
            mlua::Error::runtime(format!("{} no longer exists", T::TYPE_NAME))
        })?;
        Ok(f(&target))
    }
}

impl<T: ScriptObject> UserData for Handle<T> {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("IsValid", |_, this, ()| {
            Ok(this.lease.is_active() && this.target.strong_count() > 0)
        });
        T::add_methods(methods);
    }
}
