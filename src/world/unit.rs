//! Players, creatures and the units that can be either.

use std::sync::Arc;

use mlua::UserDataMethods;

use super::guid::ObjectGuid;
use super::handle::{Handle, ScriptObject};

/// A logged-in character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub guid: ObjectGuid,
    pub name: String,
    pub account_id: u32,
    pub level: u8,
}

/// A server-controlled unit spawned from a creature template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub guid: ObjectGuid,
    pub entry: u32,
    pub name: String,
}

/// Anything that can sit in a vehicle seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Player(Player),
    Creature(Creature),
}

impl Unit {
    pub fn guid(&self) -> ObjectGuid {
        match self {
            Unit::Player(p) => p.guid,
            Unit::Creature(c) => c.guid,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Unit::Player(p) => &p.name,
            Unit::Creature(c) => &c.name,
        }
    }

    /// Template entry; players have none and report 0.
    pub fn entry(&self) -> u32 {
        match self {
            Unit::Player(_) => 0,
            Unit::Creature(c) => c.entry,
        }
    }
}

/// The network session a packet travels through.
#[derive(Debug, Clone, Default)]
pub struct WorldSession {
    pub account_id: u32,
    player: Option<Arc<Player>>,
}

impl WorldSession {
    pub fn new(account_id: u32) -> Self {
        Self {
            account_id,
            player: None,
        }
    }

    pub fn with_player(account_id: u32, player: Arc<Player>) -> Self {
        Self {
            account_id,
            player: Some(player),
        }
    }

    /// The character in world, if the session has one yet.
    pub fn player(&self) -> Option<&Arc<Player>> {
        self.player.as_ref()
    }
}

impl ScriptObject for Player {
    const TYPE_NAME: &'static str = "Player";

    fn add_methods<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetGUID", |_, this, ()| this.with(|p| p.guid));
        methods.add_method("GetName", |_, this, ()| this.with(|p| p.name.clone()));
        methods.add_method("GetAccountId", |_, this, ()| this.with(|p| p.account_id));
        methods.add_method("GetLevel", |_, this, ()| this.with(|p| p.level));
        methods.add_method("IsPlayer", |_, _, ()| Ok(true));
    }
}

impl ScriptObject for Creature {
    const TYPE_NAME: &'static str = "Creature";

    fn add_methods<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetGUID", |_, this, ()| this.with(|c| c.guid));
        methods.add_method("GetName", |_, this, ()| this.with(|c| c.name.clone()));
        methods.add_method("GetEntry", |_, this, ()| this.with(|c| c.entry));
        methods.add_method("IsCreature", |_, _, ()| Ok(true));
    }
}

impl ScriptObject for Unit {
    const TYPE_NAME: &'static str = "Unit";

    fn add_methods<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetGUID", |_, this, ()| this.with(Unit::guid));
        methods.add_method("GetName", |_, this, ()| this.with(|u| u.name().to_string()));
        methods.add_method("GetEntry", |_, this, ()| this.with(Unit::entry));
        methods.add_method("IsPlayer", |_, this, ()| {
            this.with(|u| matches!(u, Unit::Player(_)))
        });
        methods.add_method("IsCreature", |_, this, ()| {
            this.with(|u| matches!(u, Unit::Creature(_)))
        });
    }
}
