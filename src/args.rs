use clap::{ArgAction, Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Administer TCG Opal self-encrypting drives.
///
/// The device must be a block device (ex: /dev/nvme0n1). Password flags
/// that are left out are prompted for with echo turned off.
#[derive(Parser, Debug)]
#[command(name = "sed-opal", author, version, about)]
pub struct Cli {
    /// Log more detail to stderr (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save the unlock credentials in the kernel so the range is unlocked again after suspend-to-RAM
    Save(LockUnlockArgs),

    /// Lock or unlock a locking range
    LockUnlock(LockUnlockArgs),

    /// Bring a drive out of the factory inactive state by setting the Admin CPIN password
    TakeOwnership(KeyArgs),

    /// Activate the Locking SP, optionally in single user mode for a list of ranges
    #[command(alias = "activate-locking-sp")]
    ActivateLsp(ActivateLspArgs),

    /// Revert the TPer to factory state. *THIS WILL ERASE ALL YOUR DATA*
    RevertTper(KeyArgs),

    /// Set up the geometry and lock policy of a locking range
    #[command(alias = "setup-locking-range")]
    SetupLr(SetupLrArgs),

    /// Give a user access to a locking range (not available in single user mode)
    #[command(alias = "add-user-to-range")]
    AddUserToLr(AddUserArgs),

    /// Enable or disable the shadow MBR
    #[command(alias = "mbr-shadow")]
    ShadowMbr(ShadowMbrArgs),

    /// Set the password of a user or admin through an authenticated Locking SP session
    #[command(alias = "set-password")]
    SetPw(SetPwArgs),

    /// Enable a user in the Locking SP (Admin1 is enabled by default)
    EnableUser(EnableUserArgs),

    /// Erase a locking range. *THIS ERASES YOUR DATA*
    #[command(alias = "erase-range")]
    EraseLr(EraseArgs),

    /// Secure erase a locking range, regenerating its key. *THIS DELETES YOUR DATA*
    #[command(alias = "secure-erase-range")]
    SecureEraseLr(EraseArgs),

    /// Revert the TPer using the PSID printed on the drive. *THIS WILL ERASE ALL YOUR DATA*
    PsidRevertTper(PsidArgs),

    /// Mark the shadow MBR as done (or not done) so the real media is exposed
    MbrDone(MbrDoneArgs),

    /// Show the Locking feature reported by Level 0 discovery
    Status(StatusArgs),
}

impl Command {
    /// Device the command operates on.
    pub fn device(&self) -> &PathBuf {
        match self {
            Command::Save(a) | Command::LockUnlock(a) => &a.device,
            Command::TakeOwnership(a) | Command::RevertTper(a) => &a.device,
            Command::ActivateLsp(a) => &a.device,
            Command::SetupLr(a) => &a.device,
            Command::AddUserToLr(a) => &a.device,
            Command::ShadowMbr(a) => &a.device,
            Command::SetPw(a) => &a.device,
            Command::EnableUser(a) => &a.device,
            Command::EraseLr(a) | Command::SecureEraseLr(a) => &a.device,
            Command::PsidRevertTper(a) => &a.device,
            Command::MbrDone(a) => &a.device,
            Command::Status(a) => &a.device,
        }
    }
}

#[derive(Args, Debug)]
pub struct LockUnlockArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The locking range to act on
    #[arg(short, long, default_value_t = 0)]
    pub lr: u8,
    /// User authority to act as: User[1..9] or Admin1
    #[arg(short, long)]
    pub user: Option<String>,
    /// How to lock/unlock: RW, RO or LK
    #[arg(short = 't', long, alias = "lock-type")]
    pub locktype: Option<String>,
    /// The password, up to 254 characters
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Act in single user mode instead of Opal SSC mode
    #[arg(short, long)]
    pub sum: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The locking range the key belongs to
    #[arg(short, long, default_value_t = 0)]
    pub lr: u8,
    /// The Admin1 password, up to 254 characters
    #[arg(short, long)]
    pub password: Option<OsString>,
}

#[derive(Args, Debug)]
pub struct PsidArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The PSID printed on the drive label
    #[arg(short, long)]
    pub password: Option<OsString>,
}

#[derive(Args, Debug)]
pub struct ActivateLspArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The Admin1 password, up to 254 characters
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Comma-separated locking ranges to activate in single user mode, e.g. 1,2,3
    #[arg(short = 'l', long, alias = "lr_str")]
    pub lr_str: Option<String>,
    /// Activate in single user mode (requires --lr-str)
    #[arg(short, long)]
    pub sum: bool,
}

#[derive(Args, Debug)]
pub struct SetupLrArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The locking range to set up
    #[arg(short, long, default_value_t = 0)]
    pub lr: u8,
    /// User authority to act as: User[1..9] or Admin1
    #[arg(short, long)]
    pub user: Option<String>,
    /// The password, up to 254 characters
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Act in single user mode instead of Opal SSC mode
    #[arg(short, long)]
    pub sum: bool,
    /// Enable read locking on this range
    #[arg(short = 'r', long, alias = "readLockEnabled")]
    pub read_lock_enabled: bool,
    /// Enable write locking on this range
    #[arg(short = 'w', long, alias = "writeLockEnabled")]
    pub write_lock_enabled: bool,
    /// First logical block of the range
    #[arg(short = 'z', long, alias = "rangeStart", default_value_t = 0)]
    pub range_start: u64,
    /// Length of the range in logical blocks
    #[arg(short = 'y', long, alias = "rangeLength", default_value_t = 0)]
    pub range_length: u64,
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The locking range to grant access to
    #[arg(short, long, default_value_t = 0)]
    pub lr: u8,
    /// User to add to the locking range: User[1..9]
    #[arg(short, long)]
    pub user: Option<String>,
    /// Access to grant: RW or RO
    #[arg(short = 't', long, alias = "lock-type")]
    pub locktype: Option<String>,
    /// The Admin1 password
    #[arg(short, long)]
    pub password: Option<OsString>,
}

#[derive(Args, Debug)]
pub struct ShadowMbrArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The Admin1 password
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Enable the shadow MBR; without it the shadow MBR is disabled
    #[arg(short, long, alias = "enable_mbr")]
    pub enable_mbr: bool,
}

#[derive(Args, Debug)]
pub struct MbrDoneArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The Admin1 password
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Set MBR done; without it MBR done is cleared
    #[arg(short, long)]
    pub done: bool,
}

#[derive(Args, Debug)]
pub struct SetPwArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The user whose password changes. In single user mode LR N belongs to User N+1
    #[arg(short, long)]
    pub user: Option<String>,
    /// The new password
    #[arg(short, long = "new-user-pw", alias = "newUserPW")]
    pub new_user_pw: Option<OsString>,
    /// The authority to start the Locking SP session as
    #[arg(short = 'p', long, alias = "lspAuthority")]
    pub lsp_authority: Option<String>,
    /// The password of that authority
    #[arg(short, long, alias = "authorityPW")]
    pub authority_pw: Option<OsString>,
    /// Set the password of a single user mode user
    #[arg(short, long)]
    pub sum: bool,
}

#[derive(Args, Debug)]
pub struct EnableUserArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// User to enable: User[1..9]
    #[arg(short, long)]
    pub user: Option<String>,
    /// The Admin1 password
    #[arg(short, long)]
    pub password: Option<OsString>,
}

#[derive(Args, Debug)]
pub struct EraseArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
    /// The locking range to erase
    #[arg(short, long, default_value_t = 0)]
    pub lr: u8,
    /// Authority to start the session as: User[1..9] or Admin1
    #[arg(short, long)]
    pub user: Option<String>,
    /// The authority password
    #[arg(short, long)]
    pub password: Option<OsString>,
    /// Act in single user mode instead of Opal SSC mode
    #[arg(short, long)]
    pub sum: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Block device, e.g. /dev/nvme0n1
    pub device: PathBuf,
}
