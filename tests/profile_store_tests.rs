//! Integration tests for the on-disk profile store.

use gz_git_config::config::{BranchList, Manager, Profile, Settings};
use gz_git_config::error::ErrorCode;
use gz_git_config::paths::ConfigPaths;
use std::fs;
use tempfile::TempDir;

fn manager(temp: &TempDir) -> Manager {
    let manager = Manager::new(ConfigPaths::with_root(temp.path().join("gz-git")));
    manager.initialize().expect("Failed to initialize config home");
    manager
}

#[test]
fn test_round_trip_preserves_every_group() {
    let temp = TempDir::new().unwrap();
    let mgr = manager(&temp);

    let mut settings = Settings {
        provider: "gitea".into(),
        base_url: "https://gitea.example.com".into(),
        clone_proto: "https".into(),
        ssh_port: 2222,
        parallel: 4,
        include_subgroups: Some(false),
        subgroup_mode: "nested".into(),
        ..Settings::default()
    };
    settings.commands.sync.strategy = "reset".into();
    settings.commands.sync.timeout = "2m".into();
    settings.commands.branch.protected_branches = BranchList::parse("main,develop");
    settings.commands.fetch.prune = Some(true);
    settings.commands.pull.ff_only = Some(false);
    settings.commands.push.set_upstream = Some(true);

    let profile = Profile::new("full").with_settings(settings);
    mgr.create_profile(&profile).unwrap();

    let loaded = mgr.load_profile("full").unwrap().value;
    assert_eq!(loaded, profile);

    let on_disk = fs::read_to_string(mgr.paths().profile_file("full")).unwrap();
    assert!(on_disk.contains("protectedBranches: main,develop"));
    assert!(on_disk.contains("includeSubgroups: false"));
}

#[test]
fn test_hand_written_branch_list_forms() {
    let temp = TempDir::new().unwrap();
    let mgr = manager(&temp);

    fs::write(
        mgr.paths().profile_file("listed"),
        "branch:\n  protectedBranches:\n    - main\n    - release\n",
    )
    .unwrap();
    fs::write(
        mgr.paths().profile_file("single"),
        "branch:\n  protectedBranches: main\n",
    )
    .unwrap();

    let listed = mgr.load_profile("listed").unwrap().value;
    assert_eq!(listed.name, "listed");
    assert_eq!(
        listed.settings.commands.branch.protected_branches.as_slice(),
        &["main".to_string(), "release".to_string()]
    );

    let single = mgr.load_profile("single").unwrap().value;
    assert_eq!(
        single.settings.commands.branch.protected_branches.to_string(),
        "main"
    );

    // Saving normalizes to the comma-joined form.
    mgr.save_profile(&listed).unwrap();
    let on_disk = fs::read_to_string(mgr.paths().profile_file("listed")).unwrap();
    assert!(on_disk.contains("protectedBranches: main,release"));
}

#[test]
fn test_invalid_stored_profile_fails_validation() {
    let temp = TempDir::new().unwrap();
    let mgr = manager(&temp);
    fs::write(mgr.paths().profile_file("broken"), "cloneProto: ftp\n").unwrap();

    let err = mgr.load_profile("broken").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);

    // The raw view still loads.
    let raw = mgr.load_profile_raw("broken").unwrap();
    assert_eq!(raw.settings.clone_proto, "ftp");
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let mgr = manager(&temp);
    fs::write(mgr.paths().profile_file("bad"), "parallel: [1, 2\n").unwrap();

    let err = mgr.load_profile("bad").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParseError);
}

#[test]
fn test_profile_lifecycle() {
    let temp = TempDir::new().unwrap();
    let mgr = manager(&temp);

    mgr.create_profile(&Profile::new("work")).unwrap();
    mgr.create_profile(&Profile::new("oss")).unwrap();
    assert_eq!(mgr.list_profiles().unwrap(), vec!["default", "oss", "work"]);

    mgr.set_active_profile("oss").unwrap();
    assert_eq!(mgr.active_profile().unwrap(), "oss");
    let marker = fs::read_to_string(mgr.paths().active_profile_file()).unwrap();
    assert_eq!(marker.trim(), "oss");

    mgr.delete_profile("work").unwrap();
    assert_eq!(mgr.active_profile().unwrap(), "oss");

    let err = mgr.delete_profile("work").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ProfileNotFound);
}
