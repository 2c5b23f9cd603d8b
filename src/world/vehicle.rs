//! Vehicles: units with passenger seats.

use mlua::UserDataMethods;

use super::guid::ObjectGuid;
use super::handle::{Handle, ScriptObject};

/// The vehicle kit installed on a base unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    /// Vehicle template id.
    pub entry: u32,
    /// Guid of the unit the kit is installed on.
    pub base: ObjectGuid,
    pub seat_count: u8,
}

impl ScriptObject for Vehicle {
    const TYPE_NAME: &'static str = "Vehicle";

    fn add_methods<M: UserDataMethods<Handle<Self>>>(methods: &mut M) {
        methods.add_method("GetEntry", |_, this, ()| this.with(|v| v.entry));
        methods.add_method("GetBaseGUID", |_, this, ()| this.with(|v| v.base));
        methods.add_method("GetSeatCount", |_, this, ()| this.with(|v| v.seat_count));
        methods.add_method("HasSeat", |_, this, seat: i8| {
            this.with(|v| seat >= 0 && (seat as u8) < v.seat_count)
        });
    }
}
