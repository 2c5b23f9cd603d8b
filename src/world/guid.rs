//! Opaque 128-bit object identifiers.

use std::fmt;
use std::str::FromStr;

use mlua::{FromLua, IntoLua, Lua, Value};

/// Identity of an engine object.
///
/// Scripts see a guid as a decimal string, since it does not fit a Lua integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectGuid(u128);

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid(0);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ObjectGuid {
    fn from(raw: u64) -> Self {
        Self(u128::from(raw))
    }
}

impl From<u128> for ObjectGuid {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectGuid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Self)
    }
}

impl IntoLua for ObjectGuid {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        lua.create_string(self.to_string()).map(Value::String)
    }
}

impl FromLua for ObjectGuid {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::String(s) => s
                .to_str()?
                .parse()
                .map_err(|e| mlua::Error::runtime(format!("invalid guid: {}", e))),
            Value::Integer(i) if i >= 0 => Ok(Self(i as u128)),
            Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => {
                Ok(Self(n as u128))
            }
            other => Err(mlua::Error::runtime(format!(
                "guid expected, got {}",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_is_a_string_in_lua() {
        let lua = Lua::new();
        let guid = ObjectGuid::new(u128::from(u64::MAX) + 7);
        lua.globals().set("g", guid).unwrap();

        let kind: String = lua.load("return type(g)").eval().unwrap();
        assert_eq!(kind, "string");

        let back: ObjectGuid = lua.globals().get("g").unwrap();
        assert_eq!(back, guid);
    }

    #[test]
    fn test_guid_from_small_integer() {
        let lua = Lua::new();
        let guid: ObjectGuid = lua.load("return 42").eval().unwrap();
        assert_eq!(guid, ObjectGuid::from(42u64));
    }

    #[test]
    fn test_guid_from_integral_float() {
        let lua = Lua::new();
        let guid: ObjectGuid = lua.load("return 21 * 2.0").eval().unwrap();
        assert_eq!(guid, ObjectGuid::from(42u64));

        let result: mlua::Result<ObjectGuid> = lua.load("return 4.5").eval();
        assert!(result.is_err());
        let result: mlua::Result<ObjectGuid> = lua.load("return -1.0").eval();
        assert!(result.is_err());
    }

    #[test]
    fn test_guid_rejects_tables() {
        let lua = Lua::new();
        let result: mlua::Result<ObjectGuid> = lua.load("return {}").eval();
        assert!(result.is_err());
    }
}
