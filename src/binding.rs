//! Ordered registry of script callbacks.
//!
//! Each key space keeps its bindings in registration order, which is also the
//! order they are invoked in. Dispatch works on a snapshot, so removing a
//! binding only affects later dispatches.

use std::collections::HashMap;
use std::fmt;

use mlua::Function;
use serde::Serialize;

use crate::error::Result;
use crate::event::{BindingKey, EntryKey, GlobalKey, PacketEvent, ServerEvent, VehicleEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which key space a binding lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingFamily {
    Server,
    Packet,
    Vehicle,
}

/// Returned by registration; the only way to unregister one binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle {
    pub family: BindingFamily,
    pub id: BindingId,
}

/// One registered callback.
#[derive(Clone)]
pub struct Binding {
    id: BindingId,
    function: Function,
    /// Dispatches left before removal; `None` runs forever.
    shots: Option<u32>,
}

impl Binding {
    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn shots_left(&self) -> Option<u32> {
        self.shots
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("shots", &self.shots)
            .finish_non_exhaustive()
    }
}

/// Bindings of one key space.
pub struct BindingMap<K> {
    sequences: HashMap<K, Vec<Binding>>,
    owners: HashMap<BindingId, K>,
}

impl<K: BindingKey> BindingMap<K> {
    pub fn new() -> Self {
        Self {
            sequences: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    pub fn has_bindings_for(&self, key: &K) -> bool {
        self.sequences.get(key).is_some_and(|s| !s.is_empty())
    }

    /// Bindings for `key` in registration order.
    pub fn bindings_for(&self, key: &K) -> &[Binding] {
        self.sequences.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn insert(&mut self, key: K, id: BindingId, function: Function, shots: u32) {
        let binding = Binding {
            id,
            function,
            shots: (shots > 0).then_some(shots),
        };
        self.sequences.entry(key).or_default().push(binding);
        self.owners.insert(id, key);
    }

    pub fn remove(&mut self, id: BindingId) -> bool {
        let Some(key) = self.owners.remove(&id) else {
            return false;
        };
        if let Some(sequence) = self.sequences.get_mut(&key) {
            sequence.retain(|b| b.id != id);
            if sequence.is_empty() {
                self.sequences.remove(&key);
            }
        }
        true
    }

    /// Remove every binding whose key matches; returns how many went.
    pub fn clear_where(&mut self, mut matches: impl FnMut(&K) -> bool) -> usize {
        let keys: Vec<K> = self.sequences.keys().filter(|k| matches(k)).copied().collect();
        let mut removed = 0;
        for key in keys {
            if let Some(sequence) = self.sequences.remove(&key) {
                removed += sequence.len();
                for binding in sequence {
                    self.owners.remove(&binding.id);
                }
            }
        }
        removed
    }

    pub fn clear(&mut self) -> usize {
        self.clear_where(|_| true)
    }

    /// Every populated key with the number of bindings under it.
    pub fn key_lens(&self) -> impl Iterator<Item = (&K, usize)> + '_ {
        self.sequences.iter().map(|(key, sequence)| (key, sequence.len()))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Snapshot the sequence for one dispatch, spending a shot from each
    /// limited binding and dropping the ones that ran out.
    pub fn take_for_dispatch(&mut self, key: &K) -> Vec<Binding> {
        let Some(sequence) = self.sequences.get_mut(key) else {
            return Vec::new();
        };
        let snapshot = sequence.clone();

        let mut expired = Vec::new();
        for binding in sequence.iter_mut() {
            if let Some(shots) = binding.shots.as_mut() {
                *shots -= 1;
                if *shots == 0 {
                    expired.push(binding.id);
                }
            }
        }
        for id in expired {
            self.remove(id);
        }
        snapshot
    }
}

impl<K: BindingKey> Default for BindingMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-family binding totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BindingCounts {
    pub server: usize,
    pub packet: usize,
    pub vehicle: usize,
}

impl BindingCounts {
    pub fn total(&self) -> usize {
        self.server + self.packet + self.vehicle
    }

    pub fn of(&self, family: BindingFamily) -> usize {
        match family {
            BindingFamily::Server => self.server,
            BindingFamily::Packet => self.packet,
            BindingFamily::Vehicle => self.vehicle,
        }
    }
}

/// Every key space the engine dispatches from.
#[derive(Default)]
pub struct Bindings {
    pub server: BindingMap<GlobalKey<ServerEvent>>,
    pub packet: BindingMap<EntryKey<PacketEvent>>,
    pub vehicle: BindingMap<GlobalKey<VehicleEvent>>,
    next_id: u64,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue<K: BindingKey>(
        next_id: &mut u64,
        map: &mut BindingMap<K>,
        family: BindingFamily,
        key: K,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        key.validate()?;
        *next_id += 1;
        let id = BindingId(*next_id);
        map.insert(key, id, function, shots);
        Ok(BindingHandle { family, id })
    }

    pub fn register_server(
        &mut self,
        key: GlobalKey<ServerEvent>,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        Self::issue(&mut self.next_id, &mut self.server, BindingFamily::Server, key, function, shots)
    }

    pub fn register_packet(
        &mut self,
        key: EntryKey<PacketEvent>,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        Self::issue(&mut self.next_id, &mut self.packet, BindingFamily::Packet, key, function, shots)
    }

    pub fn register_vehicle(
        &mut self,
        key: GlobalKey<VehicleEvent>,
        function: Function,
        shots: u32,
    ) -> Result<BindingHandle> {
        Self::issue(&mut self.next_id, &mut self.vehicle, BindingFamily::Vehicle, key, function, shots)
    }

    pub fn unregister(&mut self, handle: BindingHandle) -> bool {
        match handle.family {
            BindingFamily::Server => self.server.remove(handle.id),
            BindingFamily::Packet => self.packet.remove(handle.id),
            BindingFamily::Vehicle => self.vehicle.remove(handle.id),
        }
    }

    /// Full teardown; ids keep increasing so stale handles never match.
    pub fn clear(&mut self) -> usize {
        self.server.clear() + self.packet.clear() + self.vehicle.clear()
    }

    pub fn counts(&self) -> BindingCounts {
        BindingCounts {
            server: self.server.len(),
            packet: self.packet.len(),
            vehicle: self.vehicle.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use mlua::Lua;

    fn callback(lua: &Lua) -> Function {
        lua.create_function(|_, ()| Ok(())).unwrap()
    }

    fn ids(bindings: &[Binding]) -> Vec<BindingId> {
        bindings.iter().map(Binding::id).collect()
    }

    #[test]
    fn test_registration_order_is_kept() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let key = GlobalKey::new(ServerEvent::PacketSend);

        let a = bindings.register_server(key, callback(&lua), 0).unwrap();
        let b = bindings.register_server(key, callback(&lua), 0).unwrap();
        let c = bindings.register_server(key, callback(&lua), 0).unwrap();

        assert_eq!(ids(bindings.server.bindings_for(&key)), vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_empty_key_is_cheap_and_empty() {
        let bindings = Bindings::new();
        let key = EntryKey::new(PacketEvent::Receive, 0x1F6);
        assert!(!bindings.packet.has_bindings_for(&key));
        assert!(bindings.packet.bindings_for(&key).is_empty());
    }

    #[test]
    fn test_invalid_key_leaves_registry_unchanged() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let key = EntryKey::new(PacketEvent::Send, 0xFFFF);

        let err = bindings.register_packet(key, callback(&lua), 0).unwrap_err();
        assert!(matches!(err, HookError::InvalidKey { family: "packet", .. }));
        assert_eq!(bindings.counts().total(), 0);
    }

    #[test]
    fn test_unregister_only_touches_its_binding() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let send = GlobalKey::new(ServerEvent::PacketSend);
        let install = GlobalKey::new(VehicleEvent::Install);

        let a = bindings.register_server(send, callback(&lua), 0).unwrap();
        let b = bindings.register_vehicle(install, callback(&lua), 0).unwrap();

        assert!(bindings.unregister(a));
        assert!(!bindings.unregister(a));
        assert!(!bindings.server.has_bindings_for(&send));
        assert_eq!(ids(bindings.vehicle.bindings_for(&install)), vec![b.id]);
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let key = GlobalKey::new(VehicleEvent::AddPassenger);
        let a = bindings.register_vehicle(key, callback(&lua), 0).unwrap();

        let snapshot = bindings.vehicle.take_for_dispatch(&key);
        bindings.unregister(a);

        assert_eq!(ids(&snapshot), vec![a.id]);
        assert!(!bindings.vehicle.has_bindings_for(&key));
    }

    #[test]
    fn test_shots_expire_after_dispatches() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let key = EntryKey::new(PacketEvent::Send, 0x12);
        let once = bindings.register_packet(key, callback(&lua), 1).unwrap();
        let twice = bindings.register_packet(key, callback(&lua), 2).unwrap();
        let forever = bindings.register_packet(key, callback(&lua), 0).unwrap();

        assert_eq!(
            ids(&bindings.packet.take_for_dispatch(&key)),
            vec![once.id, twice.id, forever.id]
        );
        assert_eq!(
            ids(&bindings.packet.take_for_dispatch(&key)),
            vec![twice.id, forever.id]
        );
        assert_eq!(ids(&bindings.packet.take_for_dispatch(&key)), vec![forever.id]);
        assert_eq!(bindings.packet.bindings_for(&key)[0].shots_left(), None);
    }

    #[test]
    fn test_clear_where_by_opcode() {
        let lua = Lua::new();
        let mut bindings = Bindings::new();
        let f = |op| EntryKey::new(PacketEvent::Receive, op);
        bindings.register_packet(f(1), callback(&lua), 0).unwrap();
        bindings.register_packet(f(1), callback(&lua), 0).unwrap();
        bindings.register_packet(f(2), callback(&lua), 0).unwrap();

        assert_eq!(bindings.packet.clear_where(|k| k.entry == 1), 2);
        assert_eq!(bindings.counts().packet, 1);
        assert_eq!(bindings.clear(), 1);
    }
}
