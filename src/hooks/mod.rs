//! The hook engine: one shared script context, the binding registry and the
//! lock that serializes every dispatch, registration and reload.
//!
//! The engine is cheap to clone and safe to call from any thread. Dispatch is
//! synchronous; a callback that triggers another engine event re-enters the
//! same reentrant lock on the same thread.

mod dispatch;
mod fault;
mod packet;
mod vehicle;

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mlua::{FromLuaMulti, Function, Lua};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;

use crate::binding::{Binding, BindingCounts, BindingHandle, Bindings};
use crate::config::HookConfig;
use crate::error::{HookError, Result};
use crate::event::{EntryKey, GlobalKey, PacketEvent, ServerEvent, VehicleEvent};
use crate::lua::{api, sandbox, ContextStats, ExecutionContext, Script, ScriptSet};
use crate::world::NUM_MSG_TYPES;

pub use dispatch::{AggregateDecision, Payload};
pub use fault::{CallbackFault, FaultReporter, LogReporter};

pub(crate) use dispatch::DispatchPlan;

/// Everything guarded by the dispatch lock.
pub(crate) struct EngineState {
    pub(crate) context: ExecutionContext,
    bindings: RefCell<Bindings>,
    reporter: RefCell<Arc<dyn FaultReporter>>,
    faults: Cell<u64>,
    fingerprint: RefCell<Option<String>>,
}

impl EngineState {
    fn report_fault(&self, fault: CallbackFault) {
        self.faults.set(self.faults.get() + 1);
        // Not borrowed while it runs: the reporter may replace itself.
        let reporter = self.reporter.borrow().clone();
        reporter.report(&fault);
    }
}

/// One key a dispatch consults.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IndexKey {
    Server(ServerEvent),
    Packet(PacketEvent, u32),
    Vehicle(VehicleEvent),
}

fn server_slot(event: ServerEvent) -> usize {
    match event {
        ServerEvent::PacketReceive => 0,
        ServerEvent::PacketSend => 1,
    }
}

fn packet_slot(event: PacketEvent, opcode: u32) -> Option<usize> {
    let row = match event {
        PacketEvent::Receive => 0,
        PacketEvent::Send => 1,
    };
    let opcodes = usize::from(NUM_MSG_TYPES);
    let opcode = usize::try_from(opcode).ok().filter(|&o| o < opcodes)?;
    Some(row * opcodes + opcode)
}

fn vehicle_slot(event: VehicleEvent) -> usize {
    match event {
        VehicleEvent::Install => 0,
        VehicleEvent::Uninstall => 1,
        VehicleEvent::InstallAccessory => 2,
        VehicleEvent::AddPassenger => 3,
        VehicleEvent::RemovePassenger => 4,
    }
}

/// Lock-free mirror of how many bindings each key holds, so a dispatch for
/// an unhooked key returns without touching the lock.
struct KeyIndex {
    server: [AtomicUsize; 2],
    packet: Box<[AtomicUsize]>,
    vehicle: [AtomicUsize; 5],
}

impl KeyIndex {
    fn new() -> Self {
        Self {
            server: Default::default(),
            packet: (0..2 * usize::from(NUM_MSG_TYPES))
                .map(|_| AtomicUsize::new(0))
                .collect(),
            vehicle: Default::default(),
        }
    }

    fn slot(&self, key: IndexKey) -> Option<&AtomicUsize> {
        match key {
            IndexKey::Server(event) => Some(&self.server[server_slot(event)]),
            IndexKey::Packet(event, opcode) => packet_slot(event, opcode).map(|i| &self.packet[i]),
            IndexKey::Vehicle(event) => Some(&self.vehicle[vehicle_slot(event)]),
        }
    }

    fn is_hooked(&self, keys: &[IndexKey]) -> bool {
        keys.iter()
            .filter_map(|key| self.slot(*key))
            .any(|slot| slot.load(Ordering::Acquire) > 0)
    }

    /// Rebuild from the registry. Called under the lock after every change.
    fn refresh(&self, bindings: &Bindings) {
        let mut server = [0usize; 2];
        for (key, len) in bindings.server.key_lens() {
            server[server_slot(key.event)] = len;
        }
        let mut vehicle = [0usize; 5];
        for (key, len) in bindings.vehicle.key_lens() {
            vehicle[vehicle_slot(key.event)] = len;
        }
        let mut packet = vec![0usize; self.packet.len()];
        for (key, len) in bindings.packet.key_lens() {
            if let Some(slot) = packet_slot(key.event, key.entry) {
                packet[slot] = len;
            }
        }

        let pairs = self
            .server
            .iter()
            .zip(server)
            .chain(self.vehicle.iter().zip(vehicle))
            .chain(self.packet.iter().zip(packet));
        for (slot, len) in pairs {
            slot.store(len, Ordering::Release);
        }
    }
}

pub(crate) struct Shared {
    enabled: AtomicBool,
    index: KeyIndex,
    state: ReentrantMutex<EngineState>,
    config: HookConfig,
}

/// Result of loading a script directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<ScriptFailure>,
    pub bindings: BindingCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptFailure {
    pub script: String,
    pub error: String,
}

impl Shared {
    fn lock(&self) -> ReentrantMutexGuard<'_, EngineState> {
        self.state.lock()
    }

    /// Mutate the registry under the lock and refresh the fast-path counts.
    pub(crate) fn with_bindings<R>(&self, f: impl FnOnce(&mut Bindings) -> R) -> R {
        let state = self.lock();
        let mut bindings = state.bindings.borrow_mut();
        let result = f(&mut bindings);
        self.index.refresh(&bindings);
        result
    }

    pub(crate) fn register_server(&self, event: ServerEvent, function: Function, shots: u32) -> Result<BindingHandle> {
        let handle = self.with_bindings(|b| b.register_server(GlobalKey::new(event), function, shots))?;
        tracing::debug!(target: "hooks", ?event, id = %handle.id, shots, "registered server binding");
        Ok(handle)
    }

    pub(crate) fn register_packet(
        &self,
        opcode: u32,
        event: PacketEvent,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        let handle = self.with_bindings(|b| b.register_packet(EntryKey::new(event, opcode), function, shots))?;
        tracing::debug!(target: "hooks", ?event, opcode, id = %handle.id, shots, "registered packet binding");
        Ok(handle)
    }

    pub(crate) fn register_vehicle(&self, event: VehicleEvent, function: Function, shots: u32) -> Result<BindingHandle> {
        let handle = self.with_bindings(|b| b.register_vehicle(GlobalKey::new(event), function, shots))?;
        tracing::debug!(target: "hooks", ?event, id = %handle.id, shots, "registered vehicle binding");
        Ok(handle)
    }

    pub(crate) fn unregister(&self, handle: BindingHandle) -> bool {
        self.with_bindings(|b| b.unregister(handle))
    }

    pub(crate) fn clear_server(&self, event: Option<ServerEvent>) -> usize {
        self.with_bindings(|b| b.server.clear_where(|k| event.map_or(true, |e| k.event == e)))
    }

    pub(crate) fn clear_packet(&self, opcode: Option<u32>, event: Option<PacketEvent>) -> usize {
        self.with_bindings(|b| {
            b.packet.clear_where(|k| {
                opcode.map_or(true, |o| k.entry == o) && event.map_or(true, |e| k.event == e)
            })
        })
    }

    pub(crate) fn clear_vehicle(&self, event: Option<VehicleEvent>) -> usize {
        self.with_bindings(|b| b.vehicle.clear_where(|k| event.map_or(true, |e| k.event == e)))
    }

    /// Fast path, lock, snapshot, run. Nothing is marshalled and the lock is
    /// not taken unless one of `keys` has a binding.
    pub(crate) fn dispatch<P, S, F>(
        &self,
        plan: DispatchPlan,
        keys: &[IndexKey],
        select: S,
        push_args: F,
    ) -> AggregateDecision<P>
    where
        P: Payload,
        S: FnOnce(&mut Bindings) -> Vec<Vec<Binding>>,
        F: Fn(&ExecutionContext, &crate::world::Lease) -> mlua::Result<()>,
    {
        if !self.enabled.load(Ordering::Acquire) || !self.index.is_hooked(keys) {
            return AggregateDecision::default();
        }

        let state = self.lock();
        let mut sequences = self.with_bindings(select);
        sequences.retain(|sequence| !sequence.is_empty());
        if sequences.is_empty() {
            return AggregateDecision::default();
        }

        tracing::trace!(
            target: "hooks",
            event = plan.event_id,
            bindings = sequences.iter().map(Vec::len).sum::<usize>(),
            level = state.context.event_level(),
            "dispatching"
        );
        state.run(&plan, &sequences, push_args)
    }

    fn load_scripts(&self, state: &EngineState) -> Result<LoadReport> {
        let set = ScriptSet::discover(&self.config.script_path, &self.config.script_pattern)?;
        let mut report = LoadReport::default();

        for script in set.scripts() {
            match script.run(state.context.lua()) {
                Ok(()) => report.loaded.push(script.name().to_string()),
                Err(err) => {
                    tracing::error!(target: "scripts", script = script.name(), "{}", err);
                    report.failed.push(ScriptFailure {
                        script: script.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        *state.fingerprint.borrow_mut() = Some(set.fingerprint());
        report.bindings = state.bindings.borrow().counts();
        tracing::info!(
            target: "scripts",
            root = %set.root().display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            bindings = report.bindings.total(),
            "loaded scripts"
        );
        Ok(report)
    }

    fn reload(&self, only_if_changed: bool) -> Result<Option<LoadReport>> {
        let state = self.lock();
        if state.context.event_level() > 0 {
            return Err(HookError::ReloadInDispatch);
        }

        if only_if_changed {
            let current = ScriptSet::discover(&self.config.script_path, &self.config.script_pattern)?;
            if state.fingerprint.borrow().as_deref() == Some(current.fingerprint().as_str()) {
                tracing::debug!(target: "scripts", "scripts unchanged, skipping reload");
                return Ok(None);
            }
        }

        let removed = self.with_bindings(Bindings::clear);
        sandbox::reset_module_cache(state.context.lua())?;
        tracing::info!(target: "scripts", removed, "tearing down bindings for reload");
        self.load_scripts(&state).map(Some)
    }
}

/// Handle to the process-wide hook engine.
#[derive(Clone)]
pub struct HookEngine {
    shared: Arc<Shared>,
}

impl HookEngine {
    /// Create the script context, apply the sandbox and install the
    /// registration API. No scripts are loaded yet.
    pub fn new(config: &HookConfig) -> Result<Self> {
        let lua = Lua::new();
        if config.sandbox {
            sandbox::apply_sandbox(&lua, Some(config.script_path.as_path()))?;
        }

        let state = EngineState {
            context: ExecutionContext::new(lua),
            bindings: RefCell::new(Bindings::new()),
            reporter: RefCell::new(Arc::new(LogReporter)),
            faults: Cell::new(0),
            fingerprint: RefCell::new(None),
        };
        let shared = Arc::new(Shared {
            enabled: AtomicBool::new(config.enabled),
            index: KeyIndex::new(),
            state: ReentrantMutex::new(state),
            config: config.clone(),
        });

        {
            let state = shared.lock();
            api::register_api(state.context.lua(), Arc::downgrade(&shared))?;
        }

        Ok(Self { shared })
    }

    pub fn config(&self) -> &HookConfig {
        &self.shared.config
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Flip the process-wide switch. Bindings stay registered while disabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Release);
        tracing::info!(target: "hooks", enabled, "hook dispatch switched");
    }

    pub fn set_fault_reporter(&self, reporter: impl FaultReporter + 'static) {
        let state = self.shared.lock();
        *state.reporter.borrow_mut() = Arc::new(reporter);
    }

    pub fn register_server_event(&self, event: ServerEvent, function: Function, shots: u32) -> Result<BindingHandle> {
        self.shared.register_server(event, function, shots)
    }

    pub fn register_packet_event(
        &self,
        opcode: u32,
        event: PacketEvent,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        self.shared.register_packet(opcode, event, function, shots)
    }

    pub fn register_vehicle_event(&self, event: VehicleEvent, function: Function, shots: u32) -> Result<BindingHandle> {
        self.shared.register_vehicle(event, function, shots)
    }

    /// Returns `false` if the binding was already gone.
    pub fn unregister(&self, handle: BindingHandle) -> bool {
        self.shared.unregister(handle)
    }

    /// Remove every binding in every family.
    pub fn clear_bindings(&self) -> usize {
        self.shared.with_bindings(Bindings::clear)
    }

    pub fn binding_counts(&self) -> BindingCounts {
        self.shared.lock().bindings.borrow().counts()
    }

    /// Run a script chunk, e.g. one supplied by the embedding server.
    pub fn load_source(&self, name: &str, source: &str) -> Result<()> {
        let state = self.shared.lock();
        Script::from_source(name, source).run(state.context.lua())
    }

    /// Evaluate a chunk and convert its results.
    pub fn eval<T: FromLuaMulti>(&self, code: &str) -> Result<T> {
        let state = self.shared.lock();
        Ok(state.context.lua().load(code).eval()?)
    }

    /// Access the Lua state under the dispatch lock.
    pub fn with_lua<R>(&self, f: impl FnOnce(&Lua) -> R) -> R {
        let state = self.shared.lock();
        f(state.context.lua())
    }

    /// Load every script under the configured directory.
    pub fn load_scripts(&self) -> Result<LoadReport> {
        let state = self.shared.lock();
        self.shared.load_scripts(&state)
    }

    /// Tear down all bindings and run every script again.
    pub fn reload(&self) -> Result<LoadReport> {
        self.shared
            .reload(false)
            .map(|report| report.unwrap_or_default())
    }

    /// Reload only when a script was added, removed or edited.
    pub fn reload_if_changed(&self) -> Result<Option<LoadReport>> {
        self.shared.reload(true)
    }

    pub fn stats(&self) -> ContextStats {
        self.shared.lock().context.stats()
    }

    /// Slots currently on the context stack; zero between dispatches.
    pub fn stack_depth(&self) -> usize {
        self.shared.lock().context.depth()
    }

    pub fn fault_count(&self) -> u64 {
        self.shared.lock().faults.get()
    }

    /// Load `path` as the script directory with otherwise default settings.
    pub fn with_script_dir(path: &Path) -> Result<Self> {
        let config = HookConfig {
            script_path: path.to_path_buf(),
            ..HookConfig::default()
        };
        Self::new(&config)
    }
}
