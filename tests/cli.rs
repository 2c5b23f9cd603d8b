//! End-to-end tests that invoke the `hookline` binary.
//!
//! Every run gets its own config file inside a temp directory so the user's
//! real configuration is never read.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn hookline(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hookline").unwrap();
    cmd.arg("--config").arg(dir.child("hookline.yaml").path());
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();

    hookline(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    dir.child("hookline.yaml")
        .assert(predicate::str::contains("enabled: true").and(predicate::str::contains("script_pattern:")));

    hookline(&dir)
        .args(["init", "--if-needed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already initialized"));
}

#[test]
fn check_reports_bindings() {
    let dir = TempDir::new().unwrap();
    let scripts = dir.child("scripts");
    scripts
        .child("packets.lua")
        .write_str("RegisterServerEvent(7, function() return true end)\nRegisterPacketEvent(149, 5, function() end)\n")
        .unwrap();
    scripts
        .child("nested/vehicles.lua")
        .write_str("RegisterVehicleEvent(5, function() end)\n")
        .unwrap();

    hookline(&dir)
        .args(["check", "--scripts"])
        .arg(scripts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ok      packets.lua"))
        .stdout(predicate::str::contains("bindings: server=1 packet=1 vehicle=1"));
}

#[test]
fn check_fails_on_broken_script() {
    let dir = TempDir::new().unwrap();
    let scripts = dir.child("scripts");
    scripts.child("broken.lua").write_str("RegisterServerEvent(99, function() end)\n").unwrap();

    hookline(&dir)
        .args(["check", "--scripts"])
        .arg(scripts.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed  broken.lua"))
        .stderr(predicate::str::contains("1 script(s) failed to load"));
}

const EVENTS: &str = r#"
- kind: packet_send
  opcode: 181
- kind: packet_receive
  opcode: 149
  data: [3]
- kind: install
  vehicle: { entry: 28781 }
"#;

const SCRIPT: &str = r#"
RegisterServerEvent(7, function() return false end)
RegisterPacketEvent(149, 5, function(event, packet)
    local out = CreatePacket(149, 1)
    out:WriteUByte(packet:ReadUByte() + 1)
    return true, out
end)
"#;

#[test]
fn replay_prints_one_decision_per_event() {
    let dir = TempDir::new().unwrap();
    let scripts = dir.child("scripts");
    scripts.child("hooks.lua").write_str(SCRIPT).unwrap();
    let events = dir.child("events.yaml");
    events.write_str(EVENTS).unwrap();

    hookline(&dir)
        .arg("replay")
        .arg(events.path())
        .arg("--scripts")
        .arg(scripts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"index":0,"event":"packet_send","allowed":false}"#,
        ))
        .stdout(predicate::str::contains(
            r#"{"index":1,"event":"packet_receive","allowed":true,"payload":{"opcode":149,"data":[4]}}"#,
        ))
        .stdout(predicate::str::contains(r#"{"index":2,"event":"install"}"#));
}

#[test]
fn replay_disabled_allows_everything() {
    let dir = TempDir::new().unwrap();
    let scripts = dir.child("scripts");
    scripts.child("hooks.lua").write_str(SCRIPT).unwrap();
    let events = dir.child("events.yaml");
    events.write_str(EVENTS).unwrap();

    hookline(&dir)
        .arg("replay")
        .arg(events.path())
        .arg("--scripts")
        .arg(scripts.path())
        .arg("--disabled")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""event":"packet_send","allowed":true"#))
        .stdout(predicate::str::contains("payload").not());
}

#[test]
fn replay_rejects_bad_file() {
    let dir = TempDir::new().unwrap();
    let events = dir.child("events.yaml");
    events.write_str("- kind: spell_cast\n").unwrap();

    hookline(&dir)
        .arg("replay")
        .arg(events.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid replay file"));
}
