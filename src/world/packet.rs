//! Network messages exchanged between the server and a client.
//!
//! A packet is an opcode plus a little-endian byte buffer with a read cursor.
//! Scripts always receive their own copy; the in-flight packet only changes
//! when a receive hook hands a replacement back.

use std::fmt;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use mlua::{MetaMethod, UserData, UserDataMethods};

use super::guid::ObjectGuid;
use crate::error::{HookError, Result};

/// Number of known message types; every valid opcode is below this.
pub const NUM_MSG_TYPES: u16 = 0x51F;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPacket {
    opcode: u16,
    data: Vec<u8>,
    rpos: usize,
}

impl WorldPacket {
    pub fn new(opcode: u16) -> Self {
        Self::from_bytes(opcode, Vec::new())
    }

    pub fn with_capacity(opcode: u16, capacity: usize) -> Self {
        Self::from_bytes(opcode, Vec::with_capacity(capacity))
    }

    pub fn from_bytes(opcode: u16, data: Vec<u8>) -> Self {
        Self {
            opcode,
            data,
            rpos: 0,
        }
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn set_opcode(&mut self, opcode: u32) -> Result<()> {
        self.opcode = checked_opcode(opcode)?;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn read_pos(&self) -> usize {
        self.rpos
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.rpos.min(self.data.len())..]
    }

    fn read_with<T>(
        &mut self,
        width: usize,
        read: impl FnOnce(&mut &[u8]) -> std::io::Result<T>,
    ) -> Result<T> {
        let mut cursor = self.remaining();
        let value = read(&mut cursor).map_err(|_| HookError::PacketUnderflow {
            opcode: self.opcode,
            needed: width,
            offset: self.rpos,
            size: self.data.len(),
        })?;
        self.rpos += width;
        Ok(value)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_with(1, |c| c.read_i8())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_with(1, |c| c.read_u8())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_with(2, |c| c.read_i16::<LittleEndian>())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_with(2, |c| c.read_u16::<LittleEndian>())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_with(4, |c| c.read_i32::<LittleEndian>())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_with(4, |c| c.read_u32::<LittleEndian>())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_with(4, |c| c.read_f32::<LittleEndian>())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_with(8, |c| c.read_f64::<LittleEndian>())
    }

    pub fn read_guid(&mut self) -> Result<ObjectGuid> {
        self.read_with(16, |c| c.read_u128::<LittleEndian>())
            .map(ObjectGuid::new)
    }

    /// Read a NUL-terminated string. A missing terminator consumes the rest.
    pub fn read_string(&mut self) -> String {
        let rest = self.remaining();
        let (text, consumed) = match rest.iter().position(|b| *b == 0) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        let text = String::from_utf8_lossy(text).into_owned();
        self.rpos += consumed;
        text
    }

    pub fn write_i8(&mut self, value: i8) {
        self.data.push(value as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_with(|d| d.write_i16::<LittleEndian>(value))
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_with(|d| d.write_u16::<LittleEndian>(value))
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_with(|d| d.write_i32::<LittleEndian>(value))
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_with(|d| d.write_u32::<LittleEndian>(value))
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_with(|d| d.write_f32::<LittleEndian>(value))
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_with(|d| d.write_f64::<LittleEndian>(value))
    }

    pub fn write_guid(&mut self, guid: ObjectGuid) -> Result<()> {
        self.write_with(|d| d.write_u128::<LittleEndian>(guid.raw()))
    }

    pub fn write_string(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }

    fn write_with(&mut self, write: impl FnOnce(&mut Vec<u8>) -> std::io::Result<()>) -> Result<()> {
        write(&mut self.data).map_err(HookError::PacketWrite)
    }
}

impl fmt::Display for WorldPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorldPacket(0x{:03X}, {} bytes)", self.opcode, self.data.len())
    }
}

/// Validate a script- or config-supplied opcode.
pub fn checked_opcode(opcode: u32) -> Result<u16> {
    if opcode >= u32::from(NUM_MSG_TYPES) {
        return Err(HookError::InvalidOpcode(opcode));
    }
    Ok(opcode as u16)
}

fn lua_err(err: HookError) -> mlua::Error {
    mlua::Error::external(err)
}

impl UserData for WorldPacket {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetOpcode", |_, this, ()| Ok(this.opcode));
        methods.add_method("GetSize", |_, this, ()| Ok(this.data.len()));
        methods.add_method_mut("SetOpcode", |_, this, opcode: u32| {
            this.set_opcode(opcode)
                .map_err(|_| mlua::Error::runtime("valid opcode expected"))
        });

        methods.add_method_mut("ReadByte", |_, this, ()| this.read_i8().map_err(lua_err));
        methods.add_method_mut("ReadUByte", |_, this, ()| this.read_u8().map_err(lua_err));
        methods.add_method_mut("ReadShort", |_, this, ()| this.read_i16().map_err(lua_err));
        methods.add_method_mut("ReadUShort", |_, this, ()| this.read_u16().map_err(lua_err));
        methods.add_method_mut("ReadLong", |_, this, ()| this.read_i32().map_err(lua_err));
        methods.add_method_mut("ReadULong", |_, this, ()| this.read_u32().map_err(lua_err));
        methods.add_method_mut("ReadFloat", |_, this, ()| this.read_f32().map_err(lua_err));
        methods.add_method_mut("ReadDouble", |_, this, ()| this.read_f64().map_err(lua_err));
        methods.add_method_mut("ReadGUID", |_, this, ()| this.read_guid().map_err(lua_err));
        methods.add_method_mut("ReadString", |_, this, ()| Ok(this.read_string()));

        methods.add_method_mut("WriteByte", |_, this, value: i8| {
            this.write_i8(value);
            Ok(())
        });
        methods.add_method_mut("WriteUByte", |_, this, value: u8| {
            this.write_u8(value);
            Ok(())
        });
        methods.add_method_mut("WriteShort", |_, this, value: i16| {
            this.write_i16(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteUShort", |_, this, value: u16| {
            this.write_u16(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteLong", |_, this, value: i32| {
            this.write_i32(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteULong", |_, this, value: u32| {
            this.write_u32(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteFloat", |_, this, value: f32| {
            this.write_f32(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteDouble", |_, this, value: f64| {
            this.write_f64(value).map_err(lua_err)
        });
        methods.add_method_mut("WriteGUID", |_, this, guid: ObjectGuid| {
            this.write_guid(guid).map_err(lua_err)
        });
        methods.add_method_mut("WriteString", |_, this, value: String| {
            this.write_string(&value);
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::{AnyUserData, Lua};

    #[test]
    fn test_mixed_fields_in_order() {
        let mut packet = WorldPacket::new(0x1F);
        packet.write_u8(3);
        packet.write_i16(-2).unwrap();
        packet.write_u32(70_000).unwrap();
        packet.write_string("Thrall");
        packet.write_f32(1.5).unwrap();

        assert_eq!(packet.size(), 1 + 2 + 4 + 7 + 4);
        assert_eq!(packet.read_u8().unwrap(), 3);
        assert_eq!(packet.read_i16().unwrap(), -2);
        assert_eq!(packet.read_u32().unwrap(), 70_000);
        assert_eq!(packet.read_string(), "Thrall");
        assert_eq!(packet.read_f32().unwrap(), 1.5);
    }

    #[test]
    fn test_read_past_end_fails_without_moving_cursor() {
        let mut packet = WorldPacket::from_bytes(0x10, vec![1, 2]);
        let err = packet.read_u32().unwrap_err();
        assert!(matches!(err, HookError::PacketUnderflow { needed: 4, .. }));
        assert_eq!(packet.read_pos(), 0);
        assert_eq!(packet.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_guid_round_trips_through_buffer() {
        let guid = ObjectGuid::new(0x0102_0304_0506_0708_090A_0B0C_0D0E_0F10);
        let mut packet = WorldPacket::new(0x20);
        packet.write_guid(guid).unwrap();
        assert_eq!(packet.size(), 16);
        assert_eq!(packet.read_guid().unwrap(), guid);
    }

    #[test]
    fn test_set_opcode_rejects_unknown() {
        let mut packet = WorldPacket::new(1);
        assert!(packet.set_opcode(u32::from(NUM_MSG_TYPES)).is_err());
        packet.set_opcode(0x4A).unwrap();
        assert_eq!(packet.opcode(), 0x4A);
    }

    #[test]
    fn test_script_reads_and_writes() {
        let lua = Lua::new();
        let mut packet = WorldPacket::new(0x95);
        packet.write_string("hello");
        lua.globals()
            .set("pkt", lua.create_userdata(packet).unwrap())
            .unwrap();

        lua.load(
            r#"
                assert(pkt:GetOpcode() == 0x95)
                text = pkt:ReadString()
                pkt:WriteULong(12)
                pkt:SetOpcode(0x96)
            "#,
        )
        .exec()
        .unwrap();

        let text: String = lua.globals().get("text").unwrap();
        assert_eq!(text, "hello");

        let ud: AnyUserData = lua.globals().get("pkt").unwrap();
        let packet = ud.borrow::<WorldPacket>().unwrap();
        assert_eq!(packet.opcode(), 0x96);
        assert_eq!(packet.size(), 6 + 4);
    }

    #[test]
    fn test_script_read_underflow_is_lua_error() {
        let lua = Lua::new();
        lua.globals()
            .set("pkt", lua.create_userdata(WorldPacket::new(1)).unwrap())
            .unwrap();
        assert!(lua.load("return pkt:ReadLong()").exec().is_err());
    }
}
