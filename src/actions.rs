//! One handler per command: open the device, validate the options, fetch a
//! password if needed, populate the payload and submit it.

use crate::args::*;
use crate::backend::{OpalBackend, OpalDevice, Request};
use crate::error::{Result, SedError};
use crate::Outcome;
use crate::ioctl::*;
use crate::opal::{
    build_session, describe_locking_features, fill_key, parse_locking_feature, parse_lr_list,
    Completion, LockState, OpalUser, DISCOVERY_BUF_SIZE, OPAL_FEATURE_LOCKED,
};
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Use the password given on the command line, or prompt for one.
///
/// Passwords are raw bytes; nothing assumes they are UTF-8.
fn password_or_prompt(
    backend: &dyn OpalBackend,
    given: Option<&OsString>,
    missing: &'static str,
) -> Result<Zeroizing<Vec<u8>>> {
    if let Some(pw) = given {
        return Ok(Zeroizing::new(pw.as_bytes().to_vec()));
    }
    backend
        .read_password()?
        .ok_or(SedError::MissingArguments(missing))
}

/// Resolve the session identity: `None` in single user mode, else the named user.
fn session_user(sum: bool, user: Option<&String>, missing: &'static str) -> Result<Option<OpalUser>> {
    if sum {
        return Ok(None);
    }
    let user = user.ok_or(SedError::MissingArguments(missing))?;
    OpalUser::parse(user).map(Some)
}

fn submit(dev: &mut dyn OpalDevice, request: Request) -> Completion {
    info!("submitting {}", request.name());
    let completion = dev.submit(&request);
    debug!("{} completed with {:?}", request.name(), completion);
    completion
}

fn lock_unlock_payload(backend: &dyn OpalBackend, args: &LockUnlockArgs) -> Result<opal_lock_unlock> {
    const MISSING: &str = "Need to supply user, lock type and password!";
    let who = session_user(args.sum, args.user.as_ref(), MISSING)?;
    let state = LockState::parse(args.locktype.as_deref().ok_or(SedError::MissingArguments(MISSING))?)?;
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;

    let mut op = opal_lock_unlock::default();
    op.session = build_session(who, &password, args.lr);
    op.l_state = state.l_state();
    Ok(op)
}

/// Save unlock credentials in the kernel for resume from suspend.
pub fn save(backend: &dyn OpalBackend, args: &LockUnlockArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let op = lock_unlock_payload(backend, args)?;
    Ok(submit(dev.as_mut(), Request::Save(op)))
}

pub fn lock_unlock(backend: &dyn OpalBackend, args: &LockUnlockArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let op = lock_unlock_payload(backend, args)?;
    Ok(submit(dev.as_mut(), Request::LockUnlock(op)))
}

pub fn add_user_to_lr(backend: &dyn OpalBackend, args: &AddUserArgs) -> Result<Completion> {
    const MISSING: &str = "Need to supply user, lock type and password!";
    let mut dev = backend.open(&args.device)?;
    let who = session_user(false, args.user.as_ref(), MISSING)?;
    let state = LockState::parse(args.locktype.as_deref().ok_or(SedError::MissingArguments(MISSING))?)?;
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;

    let mut op = opal_lock_unlock::default();
    op.session = build_session(who, &password, args.lr);
    op.l_state = state.l_state();
    Ok(submit(dev.as_mut(), Request::AddUserToLr(op)))
}

fn key_payload(backend: &dyn OpalBackend, password: Option<&OsString>, lr: u8) -> Result<opal_key> {
    let password = password_or_prompt(backend, password, "Must Provide a password for this command")?;
    let mut key = opal_key::default();
    fill_key(&mut key, &password, lr);
    Ok(key)
}

pub fn take_ownership(backend: &dyn OpalBackend, args: &KeyArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let key = key_payload(backend, args.password.as_ref(), args.lr)?;
    Ok(submit(dev.as_mut(), Request::TakeOwnership(key)))
}

pub fn revert_tper(backend: &dyn OpalBackend, args: &KeyArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let key = key_payload(backend, args.password.as_ref(), args.lr)?;
    Ok(submit(dev.as_mut(), Request::RevertTper(key)))
}

pub fn psid_revert_tper(backend: &dyn OpalBackend, args: &PsidArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let key = key_payload(backend, args.password.as_ref(), 0)?;
    Ok(submit(dev.as_mut(), Request::PsidRevertTper(key)))
}

pub fn activate_lsp(backend: &dyn OpalBackend, args: &ActivateLspArgs) -> Result<Completion> {
    const MISSING: &str = "Must Provide a password, and a LR string if SUM";
    let mut dev = backend.open(&args.device)?;
    if args.sum && args.lr_str.is_none() {
        return Err(SedError::MissingArguments(MISSING));
    }
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;

    let mut act = opal_lr_act::default();
    act.sum = u32::from(args.sum);
    debug!("sum is {}", args.sum);
    match args.lr_str.as_deref() {
        // Global range only.
        None => act.num_lrs = 1,
        Some(list) => {
            let lrs = parse_lr_list(list);
            act.lr[..lrs.len()].copy_from_slice(&lrs);
            act.num_lrs = lrs.len() as u8;
        }
    }
    fill_key(&mut act.key, &password, 0);
    Ok(submit(dev.as_mut(), Request::ActivateLsp(act)))
}

pub fn setup_lr(backend: &dyn OpalBackend, args: &SetupLrArgs) -> Result<Completion> {
    const MISSING: &str = "Incorrect parameters, please try again";
    let mut dev = backend.open(&args.device)?;
    let who = session_user(args.sum, args.user.as_ref(), MISSING)?;
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;

    let mut setup = opal_user_lr_setup::default();
    setup.session = build_session(who, &password, args.lr);
    setup.RLE = u32::from(args.read_lock_enabled);
    setup.WLE = u32::from(args.write_lock_enabled);
    setup.range_start = args.range_start;
    setup.range_length = args.range_length;
    Ok(submit(dev.as_mut(), Request::LrSetup(setup)))
}

pub fn shadow_mbr(backend: &dyn OpalBackend, args: &ShadowMbrArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let password = password_or_prompt(
        backend,
        args.password.as_ref(),
        "Need ADMIN1 password for mbr shadow enable/disable",
    )?;

    let mut mbr = opal_mbr_data::default();
    mbr.enable_disable = if args.enable_mbr {
        OPAL_MBR_ENABLE
    } else {
        OPAL_MBR_DISABLE
    };
    fill_key(&mut mbr.key, &password, 0);
    Ok(submit(dev.as_mut(), Request::EnableDisableMbr(mbr)))
}

pub fn mbr_done(backend: &dyn OpalBackend, args: &MbrDoneArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let password = password_or_prompt(
        backend,
        args.password.as_ref(),
        "Need ADMIN1 password to set MBR done",
    )?;

    let mut done = opal_mbr_done::default();
    done.done_flag = if args.done {
        OPAL_MBR_DONE
    } else {
        OPAL_MBR_NOT_DONE
    };
    fill_key(&mut done.key, &password, 0);
    Ok(submit(dev.as_mut(), Request::MbrDone(done)))
}

/// Change a password. Every field is mandatory; there is no prompt.
pub fn set_pw(backend: &dyn OpalBackend, args: &SetPwArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let (Some(user), Some(authority), Some(new_pw), Some(authority_pw)) = (
        args.user.as_deref(),
        args.lsp_authority.as_deref(),
        args.new_user_pw.as_deref().map(|pw| pw.as_bytes()),
        args.authority_pw.as_deref().map(|pw| pw.as_bytes()),
    ) else {
        return Err(SedError::MissingArguments("Invalid arguments, please try again"));
    };
    let user = OpalUser::parse(user)?;
    let authority = OpalUser::parse(authority)?;

    let mut pw = opal_new_pw::default();
    pw.session = build_session(Some(authority), authority_pw, authority.sum_lr());
    pw.session.sum = u32::from(args.sum);
    pw.new_user_pw = build_session(Some(user), new_pw, user.sum_lr());
    Ok(submit(dev.as_mut(), Request::SetPw(pw)))
}

pub fn enable_user(backend: &dyn OpalBackend, args: &EnableUserArgs) -> Result<Completion> {
    const MISSING: &str = "Invalid arguments for enable-user";
    let mut dev = backend.open(&args.device)?;
    let user = session_user(false, args.user.as_ref(), MISSING)?;
    if user == Some(OpalUser::Admin1) {
        return Err(SedError::AdminAlreadyActive);
    }
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;

    let usr = build_session(user, &password, 0);
    Ok(submit(dev.as_mut(), Request::ActivateUser(usr)))
}

fn erase_payload(backend: &dyn OpalBackend, args: &EraseArgs) -> Result<opal_session_info> {
    const MISSING: &str = "Need to supply user and password!";
    let who = session_user(args.sum, args.user.as_ref(), MISSING)?;
    let password = password_or_prompt(backend, args.password.as_ref(), MISSING)?;
    Ok(build_session(who, &password, args.lr))
}

pub fn erase_lr(backend: &dyn OpalBackend, args: &EraseArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let session = erase_payload(backend, args)?;
    Ok(submit(dev.as_mut(), Request::EraseLr(session)))
}

pub fn secure_erase_lr(backend: &dyn OpalBackend, args: &EraseArgs) -> Result<Completion> {
    let mut dev = backend.open(&args.device)?;
    let session = erase_payload(backend, args)?;
    Ok(submit(dev.as_mut(), Request::SecureEraseLr(session)))
}

/// Read the Locking feature from Level 0 discovery and report whether the drive is locked.
pub fn status(backend: &dyn OpalBackend, args: &StatusArgs) -> Result<Outcome> {
    let mut dev = backend.open(&args.device)?;
    let mut page = vec![0u8; DISCOVERY_BUF_SIZE];
    let completion = dev.discover(&mut page);
    if !completion.is_success() {
        return Ok(Outcome::from(completion));
    }
    let features = parse_locking_feature(&page)?;
    debug!("locking feature flags={:#04x}", features);
    let report = format!(
        "{}\n{} is currently {}",
        describe_locking_features(features),
        args.device.display(),
        if features & OPAL_FEATURE_LOCKED != 0 {
            "LOCKED"
        } else {
            "UNLOCKED"
        }
    );
    Ok(Outcome {
        completion,
        report: Some(report),
    })
}
