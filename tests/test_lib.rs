use clap::Parser;
use sed_opal::args::Cli;
use sed_opal::ioctl::*;
use sed_opal::{run, Completion, MockBackend, Outcome, Request, SedError};
use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

fn outcome(mock: &MockBackend, argv: &[&str]) -> Result<Outcome, SedError> {
    let cli = Cli::try_parse_from(std::iter::once("sed-opal").chain(argv.iter().copied()))
        .expect("test command line should parse");
    run(mock, &cli.command)
}

fn invoke(mock: &MockBackend, argv: &[&str]) -> Result<Completion, SedError> {
    outcome(mock, argv).map(|o| o.completion)
}

fn key_bytes(key: &opal_key) -> &[u8] {
    &key.key[..key.key_len as usize]
}

#[test]
fn lock_unlock_populates_session() {
    let mock = MockBackend::new();
    let c = invoke(&mock, &["lock-unlock", "/dev/nvme0n1", "-l", "1", "-u", "User3", "-t", "ro", "-p", "pw"]).unwrap();
    assert!(c.is_success());

    let reqs = mock.requests();
    assert_eq!(reqs.len(), 1);
    match &reqs[0] {
        Request::LockUnlock(op) => {
            assert_eq!(op.session.sum, 0);
            assert_eq!(op.session.who, 3);
            assert_eq!(op.session.opal_key.lr, 1);
            assert_eq!(key_bytes(&op.session.opal_key), b"pw");
            assert_eq!(op.l_state, OPAL_RO);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn save_uses_its_own_request() {
    let mock = MockBackend::new();
    invoke(&mock, &["save", "/dev/nvme0n1", "-u", "admin1", "-t", "LK", "-p", "pw"]).unwrap();
    assert!(matches!(mock.requests()[0], Request::Save(ref op) if op.l_state == OPAL_LK));
}

#[test]
fn sum_mode_does_not_need_a_user() {
    let mock = MockBackend::new();
    invoke(&mock, &["lock-unlock", "/dev/nvme0n1", "-s", "-t", "rw", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::LockUnlock(op) => {
            assert_eq!(op.session.sum, 1);
            assert_eq!(op.session.who, OPAL_ADMIN1);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn malformed_user_issues_no_request() {
    for user in ["usr1", "user0", "user00", "USER000", "user10", "guest", "userX"] {
        let mock = MockBackend::new();
        let err = invoke(&mock, &["lock-unlock", "/dev/nvme0n1", "-u", user, "-t", "rw", "-p", "pw"]).unwrap_err();
        assert!(matches!(err, SedError::InvalidUser(_)), "{user}: {err}");
        assert_eq!(err.exit_code(), libc::EINVAL);
        assert!(mock.requests().is_empty());
    }
}

#[test]
fn malformed_lock_type_issues_no_request() {
    for lt in ["rx", "W", "RWX", "unlock"] {
        let mock = MockBackend::new();
        let err = invoke(&mock, &["lock-unlock", "/dev/nvme0n1", "-u", "user1", "-t", lt, "-p", "pw"]).unwrap_err();
        assert!(matches!(err, SedError::InvalidLockState(_)));
        assert_eq!(err.exit_code(), libc::EINVAL);
        assert!(mock.requests().is_empty());
    }
}

#[test]
fn missing_password_is_prompted_for() {
    let mock = MockBackend::new().with_prompted_password("typed");
    invoke(&mock, &["take-ownership", "/dev/nvme0n1"]).unwrap();
    assert_eq!(mock.prompts(), 1);
    match &mock.requests()[0] {
        Request::TakeOwnership(key) => assert_eq!(key_bytes(key), b"typed"),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn prompt_end_of_input_is_invalid_argument() {
    let mock = MockBackend::new();
    let err = invoke(&mock, &["revert-tper", "/dev/nvme0n1"]).unwrap_err();
    assert!(matches!(err, SedError::MissingArguments(_)));
    assert_eq!(err.exit_code(), libc::EINVAL);
    assert!(mock.requests().is_empty());
}

#[test]
fn prompt_is_skipped_when_other_fields_are_missing() {
    let mock = MockBackend::new().with_prompted_password("typed");
    let err = invoke(&mock, &["lock-unlock", "/dev/nvme0n1", "-u", "user1"]).unwrap_err();
    assert!(matches!(err, SedError::MissingArguments(_)));
    assert_eq!(mock.prompts(), 0);
}

#[test]
fn empty_password_is_sent_as_one_nul_byte() {
    let mock = MockBackend::new();
    invoke(&mock, &["erase-lr", "/dev/nvme0n1", "-u", "user1", "-p", ""]).unwrap();
    match &mock.requests()[0] {
        Request::EraseLr(sess) => {
            assert_eq!(sess.opal_key.key_len, 1);
            assert_eq!(sess.opal_key.key[0], 0);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn activate_lsp_in_sum_lists_ranges() {
    let mock = MockBackend::new();
    invoke(&mock, &["activate-lsp", "/dev/nvme0n1", "-s", "-l", "1,2,3", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::ActivateLsp(act) => {
            assert_eq!(act.sum, 1);
            assert_eq!(act.num_lrs, 3);
            assert_eq!(&act.lr[..3], &[1, 2, 3]);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn activate_lsp_skips_malformed_ranges() {
    let mock = MockBackend::new();
    invoke(&mock, &["activate-lsp", "/dev/nvme0n1", "-s", "-l", "1,two,3", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::ActivateLsp(act) => {
            assert_eq!(act.num_lrs, 2);
            assert_eq!(&act.lr[..2], &[1, 3]);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn activate_lsp_without_list_covers_global_range() {
    let mock = MockBackend::new();
    invoke(&mock, &["activate-lsp", "/dev/nvme0n1", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::ActivateLsp(act) => {
            assert_eq!(act.sum, 0);
            assert_eq!(act.num_lrs, 1);
            assert_eq!(act.lr[0], 0);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn activate_lsp_sum_requires_list() {
    let mock = MockBackend::new().with_prompted_password("pw");
    let err = invoke(&mock, &["activate-lsp", "/dev/nvme0n1", "-s"]).unwrap_err();
    assert!(matches!(err, SedError::MissingArguments(_)));
    assert_eq!(mock.prompts(), 0);
    assert!(mock.requests().is_empty());
}

#[test]
fn setup_lr_copies_geometry() {
    let mock = MockBackend::new();
    invoke(
        &mock,
        &["setup-lr", "/dev/nvme0n1", "-l", "1", "-u", "admin1", "-p", "pw", "-r", "-z", "2048", "-y", "1024"],
    )
    .unwrap();
    match &mock.requests()[0] {
        Request::LrSetup(setup) => {
            assert_eq!(setup.range_start, 2048);
            assert_eq!(setup.range_length, 1024);
            assert_eq!(setup.RLE, 1);
            assert_eq!(setup.WLE, 0);
            assert_eq!(setup.session.opal_key.lr, 1);
            assert_eq!(setup.session.who, OPAL_ADMIN1);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn add_user_to_lr_targets_user() {
    let mock = MockBackend::new();
    invoke(&mock, &["add-user-to-lr", "/dev/nvme0n1", "-l", "4", "-u", "user2", "-t", "rw", "-p", "admin"]).unwrap();
    match &mock.requests()[0] {
        Request::AddUserToLr(op) => {
            assert_eq!(op.session.who, 2);
            assert_eq!(op.session.sum, 0);
            assert_eq!(op.session.opal_key.lr, 4);
            assert_eq!(op.l_state, OPAL_RW);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn shadow_mbr_defaults_to_disable() {
    let mock = MockBackend::new();
    invoke(&mock, &["shadow-mbr", "/dev/nvme0n1", "-p", "pw"]).unwrap();
    invoke(&mock, &["shadow-mbr", "/dev/nvme0n1", "-p", "pw", "-e"]).unwrap();
    let reqs = mock.requests();
    assert!(matches!(reqs[0], Request::EnableDisableMbr(ref m) if m.enable_disable == OPAL_MBR_DISABLE));
    assert!(matches!(reqs[1], Request::EnableDisableMbr(ref m) if m.enable_disable == OPAL_MBR_ENABLE));
}

#[test]
fn mbr_done_sets_flag() {
    let mock = MockBackend::new();
    invoke(&mock, &["mbr-done", "/dev/nvme0n1", "-p", "pw", "-d"]).unwrap();
    assert!(matches!(mock.requests()[0], Request::MbrDone(ref m) if m.done_flag == OPAL_MBR_DONE));
}

#[test]
fn set_pw_requires_every_field_without_prompting() {
    let mock = MockBackend::new().with_prompted_password("pw");
    let err = invoke(&mock, &["set-pw", "/dev/nvme0n1", "-u", "user1", "-p", "admin1", "-a", "old"]).unwrap_err();
    assert!(matches!(err, SedError::MissingArguments(_)));
    assert_eq!(mock.prompts(), 0);
    assert!(mock.requests().is_empty());
}

#[test]
fn set_pw_builds_both_sessions() {
    let mock = MockBackend::new();
    invoke(
        &mock,
        &["set-pw", "/dev/nvme0n1", "-u", "user2", "-n", "newpw", "-p", "user2", "-a", "", "-s"],
    )
    .unwrap();
    match &mock.requests()[0] {
        Request::SetPw(pw) => {
            assert_eq!(pw.session.sum, 1);
            assert_eq!(pw.session.who, 2);
            assert_eq!(pw.session.opal_key.lr, 1);
            assert_eq!(pw.session.opal_key.key_len, 1);
            assert_eq!(pw.new_user_pw.who, 2);
            assert_eq!(pw.new_user_pw.opal_key.lr, 1);
            assert_eq!(key_bytes(&pw.new_user_pw.opal_key), b"newpw");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn enable_user_rejects_admin() {
    let mock = MockBackend::new();
    let err = invoke(&mock, &["enable-user", "/dev/nvme0n1", "-u", "Admin1", "-p", "pw"]).unwrap_err();
    assert!(matches!(err, SedError::AdminAlreadyActive));
    assert!(mock.requests().is_empty());
}

#[test]
fn enable_user_activates_user() {
    let mock = MockBackend::new();
    invoke(&mock, &["enable-user", "/dev/nvme0n1", "-u", "user5", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::ActivateUser(sess) => {
            assert_eq!(sess.who, 5);
            assert_eq!(sess.opal_key.lr, 0);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn secure_erase_honours_range_and_sum() {
    let mock = MockBackend::new();
    invoke(&mock, &["secure-erase-lr", "/dev/nvme0n1", "-s", "-l", "3", "-p", "pw"]).unwrap();
    match &mock.requests()[0] {
        Request::SecureEraseLr(sess) => {
            assert_eq!(sess.sum, 1);
            assert_eq!(sess.opal_key.lr, 3);
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn psid_revert_sends_psid_as_key() {
    let mock = MockBackend::new();
    invoke(&mock, &["psid-revert-tper", "/dev/nvme0n1", "-p", "0123456789ABCDEF"]).unwrap();
    match &mock.requests()[0] {
        Request::PsidRevertTper(key) => assert_eq!(key_bytes(key), b"0123456789ABCDEF"),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn device_status_is_passed_through() {
    let mock = MockBackend::new().with_status(1);
    let c = invoke(&mock, &["revert-tper", "/dev/nvme0n1", "-p", "wrong"]).unwrap();
    assert_eq!(c, Completion::Status(1));
    assert_eq!(c.to_string(), "Not Authorized");
    assert_eq!(c.exit_code(), 1);
}

#[test]
fn generic_failure_status_reads_failed() {
    let mock = MockBackend::new().with_status(0x3f);
    let c = invoke(&mock, &["take-ownership", "/dev/nvme0n1", "-p", "pw"]).unwrap();
    assert_eq!(c.to_string(), "Failed");
}

#[test]
fn status_outside_table_takes_unknown_path() {
    let mock = MockBackend::new().with_status(24);
    let c = invoke(&mock, &["enable-user", "/dev/nvme0n1", "-u", "user1", "-p", "pw"]).unwrap();
    assert!(matches!(c, Completion::Unknown { code: 24, .. }));
    assert!(c.to_string().starts_with("Unknown Error"));
    assert_eq!(c.exit_code(), 24);
}

#[test]
fn non_device_path_is_rejected_before_any_request() {
    let mock = MockBackend::new();
    let err = invoke(&mock, &["take-ownership", "/tmp/disk.img", "-p", "pw"]).unwrap_err();
    assert!(matches!(err, SedError::NotBlockDevice(_)));
    assert!(mock.requests().is_empty());
}

#[test]
fn status_reports_locking_features() {
    let mock = MockBackend::new().with_locking_features(0x07);
    let out = outcome(&mock, &["status", "/dev/nvme0n1"]).unwrap();
    assert!(out.completion.is_success());
    assert!(mock.requests().is_empty());

    let report = out.report.expect("status should produce a report");
    assert!(report.contains("Locking Supported : yes"), "{report}");
    assert!(report.contains("Locked            : yes"), "{report}");
    assert!(report.contains("MBR Enabled       : no"), "{report}");
    assert!(report.ends_with("/dev/nvme0n1 is currently LOCKED"), "{report}");
}

#[test]
fn status_reports_unlocked_drive() {
    let mock = MockBackend::new().with_locking_features(0x03);
    let report = outcome(&mock, &["status", "/dev/nvme0n1"]).unwrap().report.unwrap();
    assert!(report.contains("Locked            : no"));
    assert!(report.ends_with("is currently UNLOCKED"));
}

#[test]
fn other_commands_have_no_report() {
    let mock = MockBackend::new();
    let out = outcome(&mock, &["take-ownership", "/dev/nvme0n1", "-p", "pw"]).unwrap();
    assert_eq!(out.report, None);
}

#[test]
fn non_utf8_password_is_sent_verbatim() {
    let args = ["sed-opal", "lock-unlock", "/dev/nvme0n1", "-u", "user1", "-t", "rw", "-p"]
        .into_iter()
        .map(OsString::from)
        .chain([OsString::from_vec(b"p\xe4sswort".to_vec())]);
    let cli = Cli::try_parse_from(args).unwrap();
    let mock = MockBackend::new();
    run(&mock, &cli.command).unwrap();

    match &mock.requests()[0] {
        Request::LockUnlock(op) => assert_eq!(key_bytes(&op.session.opal_key), b"p\xe4sswort"),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
fn non_utf8_prompted_password_is_sent_verbatim() {
    let mock = MockBackend::new().with_prompted_password(b"\xe4\xf6\xfc");
    invoke(&mock, &["revert-tper", "/dev/nvme0n1"]).unwrap();
    match &mock.requests()[0] {
        Request::RevertTper(key) => assert_eq!(key_bytes(key), b"\xe4\xf6\xfc"),
        other => panic!("unexpected request {:?}", other),
    }
}
