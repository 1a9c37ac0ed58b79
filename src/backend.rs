//! The seam between command handlers and the outside world.
//!
//! Handlers only talk to an [`OpalBackend`]: it opens devices and reads
//! passwords. [`crate::device::SystemBackend`] goes to the kernel and the
//! terminal, [`MockBackend`] records requests so handlers can be exercised
//! without hardware or blocking on stdin.

use crate::error::{Result, SedError};
use crate::ioctl::*;
use crate::opal::{fill_discovery_page, Completion};
use crate::opal::{OPAL_FEATURE_LOCKING_ENABLED, OPAL_FEATURE_LOCKING_SUPPORTED};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zeroize::Zeroizing;

/// One populated control request, tagged with the operation it is for.
#[derive(Clone, Debug)]
pub enum Request {
    Save(opal_lock_unlock),
    LockUnlock(opal_lock_unlock),
    TakeOwnership(opal_key),
    ActivateLsp(opal_lr_act),
    SetPw(opal_new_pw),
    ActivateUser(opal_session_info),
    RevertTper(opal_key),
    LrSetup(opal_user_lr_setup),
    AddUserToLr(opal_lock_unlock),
    EnableDisableMbr(opal_mbr_data),
    EraseLr(opal_session_info),
    SecureEraseLr(opal_session_info),
    PsidRevertTper(opal_key),
    MbrDone(opal_mbr_done),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Save(_) => "IOC_OPAL_SAVE",
            Request::LockUnlock(_) => "IOC_OPAL_LOCK_UNLOCK",
            Request::TakeOwnership(_) => "IOC_OPAL_TAKE_OWNERSHIP",
            Request::ActivateLsp(_) => "IOC_OPAL_ACTIVATE_LSP",
            Request::SetPw(_) => "IOC_OPAL_SET_PW",
            Request::ActivateUser(_) => "IOC_OPAL_ACTIVATE_USR",
            Request::RevertTper(_) => "IOC_OPAL_REVERT_TPR",
            Request::LrSetup(_) => "IOC_OPAL_LR_SETUP",
            Request::AddUserToLr(_) => "IOC_OPAL_ADD_USR_TO_LR",
            Request::EnableDisableMbr(_) => "IOC_OPAL_ENABLE_DISABLE_MBR",
            Request::EraseLr(_) => "IOC_OPAL_ERASE_LR",
            Request::SecureEraseLr(_) => "IOC_OPAL_SECURE_ERASE_LR",
            Request::PsidRevertTper(_) => "IOC_OPAL_PSID_REVERT_TPR",
            Request::MbrDone(_) => "IOC_OPAL_MBR_DONE",
        }
    }
}

/// An opened Opal-capable device.
pub trait OpalDevice {
    /// Issue one control request and report its result.
    fn submit(&mut self, request: &Request) -> Completion;

    /// Fill `page` with the Level 0 discovery data.
    fn discover(&mut self, page: &mut [u8]) -> Completion;
}

pub trait OpalBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn OpalDevice>>;

    /// Ask for a password interactively. `Ok(None)` means input ended first.
    fn read_password(&self) -> Result<Option<Zeroizing<Vec<u8>>>>;
}

//
// ─── MOCK BACKEND ────────────────────────────────────────────────────────────
//

#[derive(Debug)]
struct MockState {
    requests: Vec<Request>,
    status: i32,
    password: Option<Vec<u8>>,
    prompts: usize,
    features: u8,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            requests: Vec::new(),
            status: 0,
            password: None,
            prompts: 0,
            features: OPAL_FEATURE_LOCKING_SUPPORTED | OPAL_FEATURE_LOCKING_ENABLED,
        }
    }
}

/// Records every request instead of issuing it.
///
/// Only paths under `/dev/` open successfully. Clones share state, so a test
/// can keep one handle and pass another to the handler.
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status code every submitted request completes with.
    pub fn with_status(self, code: i32) -> Self {
        self.lock().status = code;
        self
    }

    /// Answer password prompts with `password`. Without this, prompts see end of input.
    pub fn with_prompted_password(self, password: impl AsRef<[u8]>) -> Self {
        self.lock().password = Some(password.as_ref().to_vec());
        self
    }

    /// Locking feature flags reported by discovery.
    pub fn with_locking_features(self, features: u8) -> Self {
        self.lock().features = features;
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Number of times a password prompt was shown.
    pub fn prompts(&self) -> usize {
        self.lock().prompts
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OpalBackend for MockBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn OpalDevice>> {
        if !path.starts_with("/dev") {
            return Err(SedError::NotBlockDevice(path.to_path_buf()));
        }
        Ok(Box::new(MockDevice {
            backend: self.clone(),
        }))
    }

    fn read_password(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let mut state = self.lock();
        state.prompts += 1;
        Ok(state.password.clone().map(Zeroizing::new))
    }
}

struct MockDevice {
    backend: MockBackend,
}

impl OpalDevice for MockDevice {
    fn submit(&mut self, request: &Request) -> Completion {
        let mut state = self.backend.lock();
        state.requests.push(request.clone());
        Completion::from_code(state.status)
    }

    fn discover(&mut self, page: &mut [u8]) -> Completion {
        let state = self.backend.lock();
        fill_discovery_page(page, state.features);
        Completion::from_code(state.status)
    }
}
