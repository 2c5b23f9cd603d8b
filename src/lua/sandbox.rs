//! Lua sandbox configuration.
//!
//! Restricts what loaded scripts can reach: no process, file or debug access,
//! and `require` only resolves modules inside the script directory.

use std::path::{Path, PathBuf};

use mlua::{Lua, Table, Value};

use crate::error::Result;

/// List of globals to remove for security.
const BLOCKED_GLOBALS: &[&str] = &[
    "os",
    "io",
    "debug",
    "loadfile",
    "dofile",
    "load",
    "loadstring",
    "rawget",
    "rawset",
    "rawequal",
    "collectgarbage",
    "package",
];

/// Registry slot caching modules loaded through the sandboxed `require`.
const LOADED_MODULES: &str = "hookline.loaded_modules";

/// Apply sandbox restrictions to a Lua state.
pub fn apply_sandbox(lua: &Lua, script_root: Option<&Path>) -> Result<()> {
    let globals = lua.globals();

    for name in BLOCKED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }

    lua.set_named_registry_value(LOADED_MODULES, lua.create_table()?)?;

    let root = script_root.map(Path::to_path_buf);
    let require = lua.create_function(move |lua, module: String| {
        let loaded: Table = lua.named_registry_value(LOADED_MODULES)?;
        let cached: Value = loaded.get(module.as_str())?;
        if !cached.is_nil() {
            return Ok(cached);
        }

        let path = resolve_module(root.as_deref(), &module).ok_or_else(|| {
            mlua::Error::runtime(format!("require '{}' is not allowed in sandbox", module))
        })?;
        let source = std::fs::read_to_string(&path).map_err(mlua::Error::external)?;
        let value: Value = lua.load(source).set_name(module.as_str()).eval()?;
        let value = if value.is_nil() { Value::Boolean(true) } else { value };

        loaded.set(module.as_str(), value.clone())?;
        Ok(value)
    })?;
    globals.set("require", require)?;

    Ok(())
}

/// Forget modules loaded so far, so a reload re-reads them.
pub fn reset_module_cache(lua: &Lua) -> Result<()> {
    if lua.named_registry_value::<Option<Table>>(LOADED_MODULES)?.is_some() {
        lua.set_named_registry_value(LOADED_MODULES, lua.create_table()?)?;
    }
    Ok(())
}

/// Map `a.b.c` to `<root>/a/b/c.lua`, refusing anything that could escape.
fn resolve_module(root: Option<&Path>, module: &str) -> Option<PathBuf> {
    let root = root?;
    let well_formed = !module.is_empty()
        && module
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !well_formed {
        return None;
    }

    let mut path = root.to_path_buf();
    for part in module.split('.') {
        path.push(part);
    }
    path.set_extension("lua");
    path.is_file().then_some(path)
}

/// Check if a Lua state has sandbox applied.
pub fn is_sandboxed(lua: &Lua) -> bool {
    let globals = lua.globals();

    for name in BLOCKED_GLOBALS {
        match globals.get::<Value>(*name) {
            Ok(Value::Nil) => continue,
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandboxed(root: Option<&Path>) -> Lua {
        let lua = Lua::new();
        apply_sandbox(&lua, root).unwrap();
        lua
    }

    #[test]
    fn test_sandbox_blocks_os() {
        let lua = sandboxed(None);
        let result: Value = lua.globals().get("os").unwrap();
        assert!(matches!(result, Value::Nil));
    }

    #[test]
    fn test_sandbox_blocks_io() {
        let lua = sandboxed(None);
        let result: Value = lua.globals().get("io").unwrap();
        assert!(matches!(result, Value::Nil));
    }

    #[test]
    fn test_sandbox_allows_string_and_math() {
        let lua = sandboxed(None);
        let result: String = lua.load("return string.upper('hello')").eval().unwrap();
        assert_eq!(result, "HELLO");
        let root: f64 = lua.load("return math.sqrt(16)").eval().unwrap();
        assert_eq!(root, 4.0);
    }

    #[test]
    fn test_require_blocked_without_root() {
        let lua = sandboxed(None);
        assert!(lua.load("require('socket')").exec().is_err());
    }

    #[test]
    fn test_require_resolves_inside_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("lib")).unwrap();
        std::fs::write(
            temp.path().join("lib").join("util.lua"),
            "loads = (loads or 0) + 1\nreturn { answer = 42 }",
        )
        .unwrap();

        let lua = sandboxed(Some(temp.path()));
        let answer: i64 = lua
            .load("require('lib.util'); return require('lib.util').answer")
            .eval()
            .unwrap();
        assert_eq!(answer, 42);
        let loads: i64 = lua.globals().get("loads").unwrap();
        assert_eq!(loads, 1);

        reset_module_cache(&lua).unwrap();
        lua.load("require('lib.util')").exec().unwrap();
        let loads: i64 = lua.globals().get("loads").unwrap();
        assert_eq!(loads, 2);
    }

    #[test]
    fn test_require_rejects_path_escape() {
        let temp = TempDir::new().unwrap();
        let lua = sandboxed(Some(temp.path()));
        assert!(lua.load("require('../secret')").exec().is_err());
        assert!(lua.load("require('missing')").exec().is_err());
    }

    #[test]
    fn test_is_sandboxed() {
        let lua = Lua::new();
        assert!(!is_sandboxed(&lua));

        apply_sandbox(&lua, None).unwrap();
        assert!(is_sandboxed(&lua));
    }
}
