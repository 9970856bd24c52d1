//! Filesystem mount tests: `mount_filesystem` and the `/axolotl` file calls.

mod common;

use zina_hostapi::StatusCode;
use zina_sandbox::{MountState, SandboxError};

use common::*;

/// Mounts, writes `secret` to `/axolotl/abc_key`, reads it back into
/// `HANDLE_SLOT`/`LEN_SLOT`, then stores the write status at `STATUS_SLOT`.
fn file_guest() -> String {
    guest(&format!(
        r#"
        (data (i32.const 1024) "/axolotl/abc_key\00")
        (data (i32.const 2048) "secret")
        (func (export "zina_main") (result i32)
            (call $mount)
            (i32.store (i32.const {STATUS_SLOT})
                (call $fs_write (i32.const 1024) (i32.const 2048) (i32.const 6)))
            (i32.store (i32.const {HANDLE_SLOT})
                (call $fs_read (i32.const 1024) (i32.const {LEN_SLOT})))
            (i32.const 0))
        (func (export "unlink_key") (result i32)
            (call $fs_unlink (i32.const 1024)))
        (func (export "remount") (result i32)
            (call $mount)
            (i32.const 0))
        "#
    ))
}

#[test]
fn test_restricted_environment_skips_mount() {
    let wat = guest(
        r#"
        (func (export "zina_main") (result i32)
            (call $mount)
            (call $mount)
            (i32.const 0))
        "#,
    );
    let outcome = load_sandbox(&wat).run(restricted(&no_network())).unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.mount_state, MountState::Skipped);
}

#[test]
fn test_files_round_trip_through_mount() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = load_sandbox(&file_guest())
        .instantiate(native(&no_network(), dir.path()))
        .unwrap();
    session.call("zina_main").unwrap();

    assert!(matches!(
        session.host_state().mount_state(),
        MountState::Mounted(_)
    ));
    assert_eq!(session.read_i32(STATUS_SLOT).unwrap(), 0);
    assert_eq!(std::fs::read(dir.path().join("abc_key")).unwrap(), b"secret");

    assert_eq!(session.read_i32(LEN_SLOT).unwrap(), 6);
    let handle = session.read_i32(HANDLE_SLOT).unwrap();
    assert_eq!(session.read_buffer(handle).unwrap(), b"secret\0");

    assert_eq!(session.call("unlink_key").unwrap(), 0);
    assert!(!dir.path().join("abc_key").exists());
    assert_eq!(
        session.call("unlink_key").unwrap(),
        StatusCode::NotFound.as_i32()
    );
}

#[test]
fn test_mount_twice_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = load_sandbox(&file_guest())
        .instantiate(native(&no_network(), dir.path()))
        .unwrap();
    session.call("zina_main").unwrap();
    session.call("remount").unwrap();

    let expected = dir.path().canonicalize().unwrap();
    match session.host_state().mount_state() {
        MountState::Mounted(desc) => {
            assert_eq!(desc.host_root, expected);
            assert_eq!(desc.mount_point, "/axolotl");
        }
        other => panic!("expected mounted, got {:?}", other),
    }
}

#[test]
fn test_missing_root_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_sandbox(&file_guest()).run(native(&no_network(), &dir.path().join("gone")));
    assert!(
        matches!(result, Err(SandboxError::MountFailed(_))),
        "{:?}",
        result
    );
}

#[test]
fn test_file_calls_before_mount_report_not_mounted() {
    let dir = tempfile::tempdir().unwrap();
    let wat = guest(&format!(
        r#"
        (data (i32.const 1024) "/axolotl/abc_key\00")
        (func (export "zina_main") (result i32)
            (i32.store (i32.const {HANDLE_SLOT})
                (call $fs_read (i32.const 1024) (i32.const {LEN_SLOT})))
            (call $fs_unlink (i32.const 1024)))
        "#
    ));
    let mut session = load_sandbox(&wat)
        .instantiate(native(&no_network(), dir.path()))
        .unwrap();

    let not_mounted = StatusCode::NotMounted.as_i32();
    assert_eq!(session.call("zina_main").unwrap(), not_mounted);
    assert_eq!(session.read_i32(HANDLE_SLOT).unwrap(), 0);
    assert_eq!(session.read_i32(LEN_SLOT).unwrap(), not_mounted);
}

#[test]
fn test_paths_outside_mount_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let wat = guest(
        r#"
        (data (i32.const 1024) "/axolotl/../../etc/passwd\00")
        (data (i32.const 1100) "/tmp/elsewhere\00")
        (func (export "zina_main") (result i32)
            (call $mount)
            (call $fs_unlink (i32.const 1024)))
        (func (export "outside") (result i32)
            (call $fs_unlink (i32.const 1100)))
        "#,
    );
    let mut session = load_sandbox(&wat)
        .instantiate(native(&no_network(), dir.path()))
        .unwrap();

    let invalid_path = StatusCode::InvalidPath.as_i32();
    assert_eq!(session.call("zina_main").unwrap(), invalid_path);
    assert_eq!(session.call("outside").unwrap(), invalid_path);
}
