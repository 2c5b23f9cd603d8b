//! Recorded engine events for `hookline replay`.
//!
//! A replay file is a YAML list; each entry names the hook and carries the
//! objects the engine would hand it:
//!
//! ```yaml
//! - kind: packet_receive
//!   opcode: 149
//!   data: [1, 0, 0, 0]
//!   player: { guid: 42, name: Arthas, account_id: 1, level: 80 }
//! - kind: add_passenger
//!   vehicle: { entry: 28781, base: 9000, seats: 2 }
//!   passenger: { creature: { guid: 501, entry: 28670, name: Drake } }
//!   seat: 1
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hooks::HookEngine;
use crate::world::{Creature, ObjectGuid, Player, Unit, Vehicle, WorldPacket};

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSpec {
    pub guid: u64,
    pub name: String,
    #[serde(default)]
    pub account_id: u32,
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_level() -> u8 {
    1
}

impl PlayerSpec {
    fn build(&self) -> Player {
        Player {
            guid: ObjectGuid::from(self.guid),
            name: self.name.clone(),
            account_id: self.account_id,
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatureSpec {
    pub guid: u64,
    pub entry: u32,
    #[serde(default)]
    pub name: String,
}

impl CreatureSpec {
    fn build(&self) -> Creature {
        Creature {
            guid: ObjectGuid::from(self.guid),
            entry: self.entry,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSpec {
    Player(PlayerSpec),
    Creature(CreatureSpec),
}

impl UnitSpec {
    fn build(&self) -> Unit {
        match self {
            UnitSpec::Player(p) => Unit::Player(p.build()),
            UnitSpec::Creature(c) => Unit::Creature(c.build()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleSpec {
    pub entry: u32,
    #[serde(default)]
    pub base: u64,
    #[serde(default)]
    pub seats: u8,
}

impl VehicleSpec {
    fn build(&self) -> Vehicle {
        Vehicle {
            entry: self.entry,
            base: ObjectGuid::from(self.base),
            seat_count: self.seats,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacketSpec {
    pub opcode: u16,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub player: Option<PlayerSpec>,
}

/// One recorded engine event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayEvent {
    PacketSend(PacketSpec),
    PacketReceive(PacketSpec),
    Install {
        vehicle: VehicleSpec,
    },
    Uninstall {
        vehicle: VehicleSpec,
    },
    InstallAccessory {
        vehicle: VehicleSpec,
        accessory: CreatureSpec,
    },
    AddPassenger {
        vehicle: VehicleSpec,
        passenger: UnitSpec,
        seat: i8,
    },
    RemovePassenger {
        vehicle: VehicleSpec,
        passenger: UnitSpec,
    },
}

impl ReplayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayEvent::PacketSend(_) => "packet_send",
            ReplayEvent::PacketReceive(_) => "packet_receive",
            ReplayEvent::Install { .. } => "install",
            ReplayEvent::Uninstall { .. } => "uninstall",
            ReplayEvent::InstallAccessory { .. } => "install_accessory",
            ReplayEvent::AddPassenger { .. } => "add_passenger",
            ReplayEvent::RemovePassenger { .. } => "remove_passenger",
        }
    }
}

/// A packet handed back by a receive hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketOutcome {
    pub opcode: u16,
    pub data: Vec<u8>,
}

/// What the hooks decided for one event; printed as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    pub index: usize,
    pub event: &'static str,
    /// Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PacketOutcome>,
}

pub fn parse_events(text: &str) -> Result<Vec<ReplayEvent>> {
    serde_yaml::from_str(text).context("invalid replay file")
}

pub fn load_events(path: &Path) -> Result<Vec<ReplayEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_events(&text)
}

/// Dispatch one event through the engine's entry points.
pub fn replay_event(engine: &HookEngine, index: usize, event: &ReplayEvent) -> ReplayOutcome {
    let mut outcome = ReplayOutcome {
        index,
        event: event.name(),
        allowed: None,
        payload: None,
    };

    match event {
        ReplayEvent::PacketSend(spec) => {
            let player = spec.player.as_ref().map(|p| Arc::new(p.build()));
            let packet = WorldPacket::from_bytes(spec.opcode, spec.data.clone());
            let decision = engine.dispatch_packet_send(player.as_ref(), &packet);
            outcome.allowed = Some(decision.allowed());
        }
        ReplayEvent::PacketReceive(spec) => {
            let player = spec.player.as_ref().map(|p| Arc::new(p.build()));
            let packet = WorldPacket::from_bytes(spec.opcode, spec.data.clone());
            let decision = engine.dispatch_packet_receive(player.as_ref(), &packet);
            outcome.allowed = Some(decision.allowed());
            outcome.payload = decision.into_payload().map(|p| PacketOutcome {
                opcode: p.opcode(),
                data: p.contents().to_vec(),
            });
        }
        ReplayEvent::Install { vehicle } => engine.on_install(&Arc::new(vehicle.build())),
        ReplayEvent::Uninstall { vehicle } => engine.on_uninstall(&Arc::new(vehicle.build())),
        ReplayEvent::InstallAccessory { vehicle, accessory } => {
            engine.on_install_accessory(&Arc::new(vehicle.build()), &Arc::new(accessory.build()))
        }
        ReplayEvent::AddPassenger {
            vehicle,
            passenger,
            seat,
        } => engine.on_add_passenger(
            &Arc::new(vehicle.build()),
            &Arc::new(passenger.build()),
            *seat,
        ),
        ReplayEvent::RemovePassenger { vehicle, passenger } => {
            engine.on_remove_passenger(&Arc::new(vehicle.build()), &Arc::new(passenger.build()))
        }
    }

    outcome
}

pub fn replay_all(engine: &HookEngine, events: &[ReplayEvent]) -> Vec<ReplayOutcome> {
    events
        .iter()
        .enumerate()
        .map(|(index, event)| replay_event(engine, index, event))
        .collect()
}
