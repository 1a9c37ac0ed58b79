//! sed-opal library entry point.
//!
//! Marshals command-line options into `<linux/sed-opal.h>` payloads and
//! hands them to the kernel driver, which runs the actual Opal sessions.

pub mod actions;
pub mod args;
pub mod backend;
pub mod device;
pub mod error;
pub mod ioctl;
pub mod logging;
pub mod opal;
mod prompt;

pub use backend::{MockBackend, OpalBackend, OpalDevice, Request};
pub use device::SystemBackend;
pub use error::{Result, SedError};
pub use opal::Completion;

use args::Command;
use tracing::info;

/// What a command produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    /// The drive's answer, which may itself be a failure status.
    pub completion: Completion,
    /// Text for the user, printed before the completion. Only `status` has one.
    pub report: Option<String>,
}

impl From<Completion> for Outcome {
    fn from(completion: Completion) -> Self {
        Outcome {
            completion,
            report: None,
        }
    }
}

/// Run one command against `backend`.
///
/// `Err` means the command stopped before reaching the drive (or could not
/// interpret its answer).
pub fn run(backend: &dyn OpalBackend, command: &Command) -> Result<Outcome> {
    info!("{}: {}", command.device().display(), command_name(command));
    let completion = match command {
        Command::Save(a) => actions::save(backend, a),
        Command::LockUnlock(a) => actions::lock_unlock(backend, a),
        Command::TakeOwnership(a) => actions::take_ownership(backend, a),
        Command::ActivateLsp(a) => actions::activate_lsp(backend, a),
        Command::RevertTper(a) => actions::revert_tper(backend, a),
        Command::SetupLr(a) => actions::setup_lr(backend, a),
        Command::AddUserToLr(a) => actions::add_user_to_lr(backend, a),
        Command::ShadowMbr(a) => actions::shadow_mbr(backend, a),
        Command::SetPw(a) => actions::set_pw(backend, a),
        Command::EnableUser(a) => actions::enable_user(backend, a),
        Command::EraseLr(a) => actions::erase_lr(backend, a),
        Command::SecureEraseLr(a) => actions::secure_erase_lr(backend, a),
        Command::PsidRevertTper(a) => actions::psid_revert_tper(backend, a),
        Command::MbrDone(a) => actions::mbr_done(backend, a),
        Command::Status(a) => return actions::status(backend, a),
    }?;
    Ok(Outcome::from(completion))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Save(_) => "save",
        Command::LockUnlock(_) => "lock-unlock",
        Command::TakeOwnership(_) => "take-ownership",
        Command::ActivateLsp(_) => "activate-lsp",
        Command::RevertTper(_) => "revert-tper",
        Command::SetupLr(_) => "setup-lr",
        Command::AddUserToLr(_) => "add-user-to-lr",
        Command::ShadowMbr(_) => "shadow-mbr",
        Command::SetPw(_) => "set-pw",
        Command::EnableUser(_) => "enable-user",
        Command::EraseLr(_) => "erase-lr",
        Command::SecureEraseLr(_) => "secure-erase-lr",
        Command::PsidRevertTper(_) => "psid-revert-tper",
        Command::MbrDone(_) => "mbr-done",
        Command::Status(_) => "status",
    }
}
