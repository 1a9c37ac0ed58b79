use crate::error::{Result, SedError};
use crate::ioctl::*;
use nix::errno::Errno;
use std::fmt;
use std::os::raw::c_int;
use thiserror::Error;
use tracing::debug;

// ───── Identities and lock states ────────────────────────────────────────────

#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OpalUser {
    Admin1 = OPAL_ADMIN1,
    User1 = 1,
    User2 = 2,
    User3 = 3,
    User4 = 4,
    User5 = 5,
    User6 = 6,
    User7 = 7,
    User8 = 8,
    User9 = OPAL_USER9,
}

impl OpalUser {
    /// Resolve `admin`/`admin1` or `user1`..`user9`, ignoring case.
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || SedError::InvalidUser(token.to_string());
        if token.len() < 5 {
            return Err(invalid());
        }
        let lower = token.to_ascii_lowercase();
        if lower == "admin" || lower == "admin1" {
            return Ok(OpalUser::Admin1);
        }
        let digits = lower.strip_prefix("user").ok_or_else(invalid)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let n: u32 = digits.parse().map_err(|_| invalid())?;
        // `from_index(0)` is Admin1, which `userN` must never name.
        if !(OPAL_USER1..=OPAL_USER9).contains(&n) {
            return Err(invalid());
        }
        Self::from_index(n).ok_or_else(invalid)
    }

    pub fn from_index(n: u32) -> Option<Self> {
        Some(match n {
            OPAL_ADMIN1 => OpalUser::Admin1,
            1 => OpalUser::User1,
            2 => OpalUser::User2,
            3 => OpalUser::User3,
            4 => OpalUser::User4,
            5 => OpalUser::User5,
            6 => OpalUser::User6,
            7 => OpalUser::User7,
            8 => OpalUser::User8,
            OPAL_USER9 => OpalUser::User9,
            _ => return None,
        })
    }

    /// Value of the `who` field in `opal_session_info`.
    pub fn who(self) -> u32 {
        self as u32
    }

    /// Range index the driver pairs with this identity in single-user mode:
    /// LR N belongs to User N+1. Admin1 wraps to 255, as the driver expects
    /// for a non-user authority.
    pub fn sum_lr(self) -> u8 {
        (self.who() as u8).wrapping_sub(1)
    }
}

impl fmt::Display for OpalUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpalUser::Admin1 => write!(f, "Admin1"),
            user => write!(f, "User{}", user.who()),
        }
    }
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockState {
    Ro = OPAL_RO,
    Rw = OPAL_RW,
    Lk = OPAL_LK,
}

impl LockState {
    /// Resolve `RW`, `RO` or `LK`, ignoring case.
    pub fn parse(token: &str) -> Result<Self> {
        if token.eq_ignore_ascii_case("RW") {
            Ok(LockState::Rw)
        } else if token.eq_ignore_ascii_case("RO") {
            Ok(LockState::Ro)
        } else if token.eq_ignore_ascii_case("LK") {
            Ok(LockState::Lk)
        } else {
            Err(SedError::InvalidLockState(token.to_string()))
        }
    }

    pub fn l_state(self) -> u32 {
        self as u32
    }
}

// ───── Key encoding ──────────────────────────────────────────────────────────

/// Longest password, in bytes, that is copied into a key buffer.
pub const KEY_CAPACITY: usize = OPAL_KEY_MAX - 2;

/// Copy `password` into `key`, truncated to [`KEY_CAPACITY`] bytes.
///
/// An empty password becomes a single NUL byte with length 1. The drive
/// expects exactly that for users that have no password yet, and a
/// zero-length key is never sent.
pub fn fill_key(key: &mut opal_key, password: &[u8], lr: u8) {
    let n = password.len().min(KEY_CAPACITY);
    key.key.fill(0);
    key.key[..n].copy_from_slice(&password[..n]);
    key.key_len = n.max(1) as u8;
    key.key_type = OPAL_INCLUDED;
    key.lr = lr;
}

/// Build a session for `who` (or SUM when `who` is `None`) carrying `password`.
pub fn build_session(who: Option<OpalUser>, password: &[u8], lr: u8) -> opal_session_info {
    let mut sess = opal_session_info::default();
    match who {
        Some(user) => sess.who = user.who(),
        None => sess.sum = 1,
    }
    fill_key(&mut sess.opal_key, password, lr);
    sess
}

// ───── Range lists ───────────────────────────────────────────────────────────

/// Parse a comma-separated list of locking ranges such as `1,2,3`.
///
/// Empty or malformed entries are skipped without taking a slot. At most
/// [`OPAL_MAX_LRS`] ranges are kept.
pub fn parse_lr_list(text: &str) -> Vec<u8> {
    let mut lrs = Vec::with_capacity(OPAL_MAX_LRS);
    for token in text.split(',') {
        if lrs.len() == OPAL_MAX_LRS {
            break;
        }
        match token.trim().parse::<u8>() {
            Ok(lr) => {
                debug!("added {} to lr at index {}", lr, lrs.len());
                lrs.push(lr);
            }
            Err(_) => debug!("skipping malformed locking range {:?}", token),
        }
    }
    lrs
}

// ───── Status codes ──────────────────────────────────────────────────────────

pub const OPAL_STATUS_FAILED: i32 = 0x3f;

const OPAL_STATUS: [&str; 19] = [
    "Success",
    "Not Authorized",
    "Unknown Error",
    "SP Busy",
    "SP Failed",
    "SP Disabled",
    "SP Frozen",
    "No Sessions Available",
    "Uniqueness Conflict",
    "Insufficient Space",
    "Insufficient Rows",
    "Invalid Function",
    "Invalid Parameter",
    "Invalid Reference",
    "Unknown Error",
    "TPER Malfunction",
    "Transaction Failure",
    "Response Overflow",
    "Authority Locked Out",
];

/// Text for a status code, or `None` when the code is not a known Opal status.
pub fn status_message(code: i32) -> Option<&'static str> {
    if code == OPAL_STATUS_FAILED {
        return Some("Failed");
    }
    usize::try_from(code)
        .ok()
        .and_then(|i| OPAL_STATUS.get(i).copied())
}

/// Result of a control call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Completion {
    /// A status the drive or driver reported.
    Status(i32),
    /// A status outside the table, or a failed call (`code < 0`).
    Unknown { code: i32, errno: Errno },
}

impl Completion {
    pub const SUCCESS: Completion = Completion::Status(0);

    /// Classify a raw status code, capturing `errno` for unknown codes.
    pub fn from_code(code: i32) -> Self {
        match status_message(code) {
            Some(_) => Completion::Status(code),
            None => Completion::Unknown {
                code,
                errno: Errno::last(),
            },
        }
    }

    pub fn from_ioctl(res: nix::Result<c_int>) -> Self {
        match res {
            Ok(code) => Self::from_code(code),
            Err(errno) => Completion::Unknown { code: -1, errno },
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Process exit status: the Opal status, or the errno of a failed call.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Completion::Status(code) => code,
            Completion::Unknown { code, errno } if code < 0 => errno as i32,
            Completion::Unknown { code, .. } => code,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Completion::Status(code) => {
                write!(f, "{}", status_message(code).unwrap_or("Unknown Error"))
            }
            Completion::Unknown { code, errno } if code < 0 => {
                write!(f, "Unknown Error: errno {}", errno.desc())
            }
            Completion::Unknown { code, errno } => {
                write!(f, "Unknown Error {:#x}: errno {}", code, errno.desc())
            }
        }
    }
}

// ───── Level 0 discovery ─────────────────────────────────────────────────────

pub const DISCOVERY_BUF_SIZE: usize = 4096;
pub const DISCOVERY_HEADER_LEN: usize = 48;

pub const OPAL_FEATURE_CODE_LOCKING: u16 = 0x0002;
pub const OPAL_FEATURE_LOCKING_SUPPORTED: u8 = 0x01;
pub const OPAL_FEATURE_LOCKING_ENABLED: u8 = 0x02;
pub const OPAL_FEATURE_LOCKED: u8 = 0x04;
pub const OPAL_FEATURE_MEDIA_ENCRYPT: u8 = 0x08;
pub const OPAL_FEATURE_MBR_ENABLED: u8 = 0x10;
pub const OPAL_FEATURE_MBR_DONE: u8 = 0x20;

/// Why a discovery page could not be interpreted.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DiscoveryError {
    #[error("Discovery buffer too small: {0}")]
    TooShort(usize),
    #[error("Locking feature present but payload is empty")]
    EmptyLockingFeature,
    #[error("Locking feature not found in discovery page")]
    NoLockingFeature,
}

/// Walk a Level 0 discovery page and return the Locking feature flags byte.
///
/// The first header dword is the length of everything after itself; feature
/// descriptors (`code:u16be, version:u8, len:u8, payload`) start after the
/// 48-byte header.
pub fn parse_locking_feature(buf: &[u8]) -> std::result::Result<u8, DiscoveryError> {
    if buf.len() < DISCOVERY_HEADER_LEN {
        return Err(DiscoveryError::TooShort(buf.len()));
    }

    let total_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let end = total_len.saturating_add(4).min(buf.len());

    let mut off = DISCOVERY_HEADER_LEN;
    while off + 4 <= end {
        let code = u16::from_be_bytes([buf[off], buf[off + 1]]);
        let length = buf[off + 3] as usize;
        let payload = off + 4;

        debug!("feature code={:#06x} len={}", code, length);

        if payload + length > end {
            break;
        }
        if code == OPAL_FEATURE_CODE_LOCKING {
            if length == 0 {
                return Err(DiscoveryError::EmptyLockingFeature);
            }
            return Ok(buf[payload]);
        }
        off = payload + length;
    }
    Err(DiscoveryError::NoLockingFeature)
}

/// Render the Locking feature bits the way `nvme-cli` shows SED status.
pub fn describe_locking_features(features: u8) -> String {
    let yes_no = |bit: u8| if features & bit != 0 { "yes" } else { "no" };
    format!(
        "Locking Features:\n\
         \tLocking Supported : {}\n\
         \tLocking Enabled   : {}\n\
         \tLocked            : {}\n\
         \tMedia Encryption  : {}\n\
         \tMBR Enabled       : {}\n\
         \tMBR Done          : {}",
        yes_no(OPAL_FEATURE_LOCKING_SUPPORTED),
        yes_no(OPAL_FEATURE_LOCKING_ENABLED),
        yes_no(OPAL_FEATURE_LOCKED),
        yes_no(OPAL_FEATURE_MEDIA_ENCRYPT),
        yes_no(OPAL_FEATURE_MBR_ENABLED),
        yes_no(OPAL_FEATURE_MBR_DONE),
    )
}

/// Write a minimal, well-formed discovery page holding one Locking feature
/// descriptor with `flags` as its payload.
pub fn fill_discovery_page(buf: &mut [u8], flags: u8) {
    buf.fill(0);
    if buf.len() < DISCOVERY_HEADER_LEN + 5 {
        return;
    }
    // header remainder (44) + descriptor header (4) + 1 byte payload
    let total_len: u32 = (DISCOVERY_HEADER_LEN - 4 + 4 + 1) as u32;
    buf[..4].copy_from_slice(&total_len.to_be_bytes());
    let off = DISCOVERY_HEADER_LEN;
    buf[off..off + 2].copy_from_slice(&OPAL_FEATURE_CODE_LOCKING.to_be_bytes());
    buf[off + 2] = 0x10;
    buf[off + 3] = 0x01;
    buf[off + 4] = flags;
}
