//! End-to-end runs of the `autopacker` binary against a scratch game tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use zip::ZipArchive;

fn autopacker() -> Command {
    let mut cmd = Command::cargo_bin("autopacker").expect("autopacker binary");
    cmd.env("RUST_LOG", "warn").timeout(Duration::from_secs(30));
    cmd
}

/// `<tmp>/Game/Mods/alpha` with one unpacked folder and a manifest.
fn game_tree(tmp: &TempDir) -> PathBuf {
    let mods = tmp.path().join("Game").join("Mods");
    let data = mods.join("alpha").join("Data");
    fs::create_dir_all(data.join("Tables.unpacked").join("Libs")).expect("mkdir");
    fs::write(data.join("Tables.unpacked").join("Libs").join("weapon.xml"), "<w/>")
        .expect("write");
    fs::write(mods.join("alpha").join("mod.manifest"), "<kcd_mod/>").expect("write");
    mods
}

fn release_zips(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "zip"))
        .collect()
}

#[test]
fn sync_packs_every_unpacked_folder() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);

    autopacker()
        .arg("sync")
        .arg(&mods)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tables.unpacked"))
        .stdout(predicate::str::contains("Libs/weapon.xml"));

    let archive = mods.join("alpha").join("Data").join("Tables.pak");
    let zip = ZipArchive::new(fs::File::open(&archive).expect("open")).expect("zip");
    assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["Libs/weapon.xml"]);
}

#[test]
fn second_sync_has_nothing_to_do() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);
    autopacker().arg("sync").arg(&mods).assert().success();

    autopacker()
        .arg("sync")
        .arg(&mods)
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn working_dir_outside_mods_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");

    autopacker()
        .arg("sync")
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--any-folder"));
}

#[test]
fn release_json_reports_published_mod() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);
    let release_dir = tmp.path().join("Release");

    let output = autopacker()
        .arg("release")
        .arg(&mods)
        .arg("--release-dir")
        .arg(&release_dir)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).expect("json summary");
    assert_eq!(summary["found"], 1);
    assert_eq!(summary["published"], 1);
    assert_eq!(summary["failed"], 0);
    assert_eq!(release_zips(&release_dir.join("alpha")).len(), 1);
}

#[test]
fn release_defaults_next_to_the_mod_root() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);

    autopacker()
        .arg("release")
        .arg(&mods)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 mod published"));

    let default_dir = tmp
        .path()
        .join("Game")
        .join("Mods-Dev")
        .join("Release")
        .join("alpha");
    assert_eq!(release_zips(&default_dir).len(), 1);
}

#[test]
fn release_inside_a_mod_folder_is_refused() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);
    let release_dir = tmp.path().join("Release");

    autopacker()
        .arg("release")
        .arg(mods.join("alpha"))
        .arg("--release-dir")
        .arg(&release_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("release refused"));
    assert!(!release_dir.exists());
}

#[test]
fn watch_exits_when_input_ends() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);

    autopacker().arg(&mods).write_stdin("").assert().success();
}

#[test]
fn watch_release_command_publishes_after_confirmation() {
    let tmp = TempDir::new().expect("tempdir");
    let mods = game_tree(&tmp);
    let release_dir = tmp.path().join("Release");

    autopacker()
        .arg("watch")
        .arg(&mods)
        .arg("--release-dir")
        .arg(&release_dir)
        .write_stdin("r\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 mod published"));

    assert_eq!(release_zips(&release_dir.join("alpha")).len(), 1);
}
