use crate::backend::{OpalBackend, OpalDevice, Request};
use crate::error::{Result, SedError};
use crate::ioctl::*;
use crate::opal::Completion;
use crate::prompt;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Open `path` read-only and make sure it is a block device.
pub fn open_block_device(path: &Path) -> Result<File> {
    let open_err = |source| SedError::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(open_err)?;
    let meta = file.metadata().map_err(open_err)?;
    if !meta.file_type().is_block_device() {
        return Err(SedError::NotBlockDevice(path.to_path_buf()));
    }
    Ok(file)
}

/// Talks to the kernel sed-opal driver and the controlling terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBackend;

impl OpalBackend for SystemBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn OpalDevice>> {
        let file = open_block_device(path)?;
        debug!("opened {}", path.display());
        Ok(Box::new(SystemDevice {
            file,
            path: path.to_path_buf(),
        }))
    }

    fn read_password(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        prompt::read_password()
    }
}

/// A block device node held open for the duration of one command.
pub struct SystemDevice {
    file: File,
    path: PathBuf,
}

impl OpalDevice for SystemDevice {
    fn submit(&mut self, request: &Request) -> Completion {
        let fd = self.file.as_raw_fd();
        debug!("{}: issuing {}", self.path.display(), request.name());
        // Safety: `fd` stays open for the call and every payload is the
        // struct its request code was declared with.
        let res = unsafe {
            match request {
                Request::Save(p) => ioc_opal_save(fd, p),
                Request::LockUnlock(p) => ioc_opal_lock_unlock(fd, p),
                Request::TakeOwnership(p) => ioc_opal_take_ownership(fd, p),
                Request::ActivateLsp(p) => ioc_opal_activate_lsp(fd, p),
                Request::SetPw(p) => ioc_opal_set_pw(fd, p),
                Request::ActivateUser(p) => ioc_opal_activate_usr(fd, p),
                Request::RevertTper(p) => ioc_opal_revert_tpr(fd, p),
                Request::LrSetup(p) => ioc_opal_lr_setup(fd, p),
                Request::AddUserToLr(p) => ioc_opal_add_usr_to_lr(fd, p),
                Request::EnableDisableMbr(p) => ioc_opal_enable_disable_mbr(fd, p),
                Request::EraseLr(p) => ioc_opal_erase_lr(fd, p),
                Request::SecureEraseLr(p) => ioc_opal_secure_erase_lr(fd, p),
                Request::PsidRevertTper(p) => ioc_opal_psid_revert_tpr(fd, p),
                Request::MbrDone(p) => ioc_opal_mbr_done(fd, p),
            }
        };
        Completion::from_ioctl(res)
    }

    fn discover(&mut self, page: &mut [u8]) -> Completion {
        let fd = self.file.as_raw_fd();
        let disc = opal_discovery {
            data: page.as_mut_ptr() as u64,
            size: page.len() as u64,
        };
        // Safety: `page` outlives the call and `size` bounds what the kernel writes.
        match unsafe { ioc_opal_discovery(fd, &disc) } {
            // A non-negative return is the number of bytes written.
            Ok(_) => Completion::SUCCESS,
            Err(errno) => Completion::from_ioctl(Err(errno)),
        }
    }
}
