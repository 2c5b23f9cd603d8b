//! Script-facing registration API.
//!
//! Installs the globals scripts use to hook into engine events:
//!
//! - `RegisterServerEvent(event, fn [, shots])`
//! - `RegisterPacketEvent(opcode, event, fn [, shots])`
//! - `RegisterVehicleEvent(event, fn [, shots])`
//! - `ClearServerEvents([event])`, `ClearPacketEvents([opcode [, event]])`,
//!   `ClearVehicleEvents([event])`
//! - `CreatePacket(opcode, size)`
//! - `log(level, message)`
//!
//! Every `Register*` call returns a function that cancels the binding.

use std::sync::{Arc, Weak};

use mlua::{Function, Lua};

use crate::binding::BindingHandle;
use crate::error::{HookError, Result};
use crate::event::{EventKind, PacketEvent, ServerEvent, VehicleEvent};
use crate::hooks::Shared;
use crate::world::packet::checked_opcode;
use crate::world::WorldPacket;

/// Register the hook API in the Lua global namespace.
pub(crate) fn register_api(lua: &Lua, engine: Weak<Shared>) -> Result<()> {
    let globals = lua.globals();

    globals.set("RegisterServerEvent", create_register_server_event(lua, engine.clone())?)?;
    globals.set("RegisterPacketEvent", create_register_packet_event(lua, engine.clone())?)?;
    globals.set("RegisterVehicleEvent", create_register_vehicle_event(lua, engine.clone())?)?;
    globals.set("ClearServerEvents", create_clear_server_events(lua, engine.clone())?)?;
    globals.set("ClearPacketEvents", create_clear_packet_events(lua, engine.clone())?)?;
    globals.set("ClearVehicleEvents", create_clear_vehicle_events(lua, engine)?)?;
    globals.set("CreatePacket", create_create_packet(lua)?)?;
    globals.set("log", create_log(lua)?)?;

    Ok(())
}

fn upgrade(engine: &Weak<Shared>) -> mlua::Result<Arc<Shared>> {
    engine
        .upgrade()
        .ok_or_else(|| mlua::Error::runtime("hook engine has shut down"))
}

fn to_lua_err(err: HookError) -> mlua::Error {
    mlua::Error::external(err)
}

fn event_from<E: EventKind>(id: u32) -> mlua::Result<E> {
    E::from_id(id).map_err(to_lua_err)
}

/// Build the cancel function handed back by every `Register*` call.
fn cancel_function(lua: &Lua, engine: Weak<Shared>, handle: BindingHandle) -> mlua::Result<Function> {
    lua.create_function(move |_, ()| {
        if let Some(engine) = engine.upgrade() {
            engine.unregister(handle);
        }
        Ok(())
    })
}

fn create_register_server_event(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(
        move |lua, (event, function, shots): (u32, Function, Option<u32>)| {
            let shared = upgrade(&engine)?;
            let event: ServerEvent = event_from(event)?;
            let handle = shared
                .register_server(event, function, shots.unwrap_or(0))
                .map_err(to_lua_err)?;
            cancel_function(lua, engine.clone(), handle)
        },
    )?;
    Ok(func)
}

fn create_register_packet_event(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(
        move |lua, (opcode, event, function, shots): (u32, u32, Function, Option<u32>)| {
            let shared = upgrade(&engine)?;
            let event: PacketEvent = event_from(event)?;
            let handle = shared
                .register_packet(opcode, event, function, shots.unwrap_or(0))
                .map_err(to_lua_err)?;
            cancel_function(lua, engine.clone(), handle)
        },
    )?;
    Ok(func)
}

fn create_register_vehicle_event(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(
        move |lua, (event, function, shots): (u32, Function, Option<u32>)| {
            let shared = upgrade(&engine)?;
            let event: VehicleEvent = event_from(event)?;
            let handle = shared
                .register_vehicle(event, function, shots.unwrap_or(0))
                .map_err(to_lua_err)?;
            cancel_function(lua, engine.clone(), handle)
        },
    )?;
    Ok(func)
}

fn create_clear_server_events(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(move |_, event: Option<u32>| {
        let shared = upgrade(&engine)?;
        let event = event.map(event_from::<ServerEvent>).transpose()?;
        Ok(shared.clear_server(event))
    })?;
    Ok(func)
}

fn create_clear_packet_events(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(move |_, (opcode, event): (Option<u32>, Option<u32>)| {
        let shared = upgrade(&engine)?;
        let event = event.map(event_from::<PacketEvent>).transpose()?;
        Ok(shared.clear_packet(opcode, event))
    })?;
    Ok(func)
}

fn create_clear_vehicle_events(lua: &Lua, engine: Weak<Shared>) -> Result<Function> {
    let func = lua.create_function(move |_, event: Option<u32>| {
        let shared = upgrade(&engine)?;
        let event = event.map(event_from::<VehicleEvent>).transpose()?;
        Ok(shared.clear_vehicle(event))
    })?;
    Ok(func)
}

fn create_create_packet(lua: &Lua) -> Result<Function> {
    let func = lua.create_function(|_, (opcode, size): (u32, Option<usize>)| {
        let opcode = checked_opcode(opcode).map_err(to_lua_err)?;
        Ok(WorldPacket::with_capacity(opcode, size.unwrap_or(0)))
    })?;
    Ok(func)
}

fn create_log(lua: &Lua) -> Result<Function> {
    let func = lua.create_function(|_, (level, message): (String, String)| {
        log_message(&level, &message);
        Ok(())
    })?;
    Ok(func)
}

/// Log a script message at the specified level.
fn log_message(level: &str, message: &str) {
    match level.to_lowercase().as_str() {
        "trace" => tracing::trace!(target: "scripts", "{}", message),
        "debug" => tracing::debug!(target: "scripts", "{}", message),
        "warn" | "warning" => tracing::warn!(target: "scripts", "{}", message),
        "error" => tracing::error!(target: "scripts", "{}", message),
        _ => tracing::info!(target: "scripts", "{}", message),
    }
}
