//! Payload layouts and request codes from `<linux/sed-opal.h>`.
//!
//! Every struct here is handed to the kernel by pointer, so field order,
//! widths and padding must match the uAPI header byte for byte.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use core::fmt;
use core::mem::{size_of, zeroed};
use nix::ioctl_write_ptr;
use zeroize::Zeroize;

pub const OPAL_KEY_MAX: usize = 256;
pub const OPAL_MAX_LRS: usize = 9;

pub const OPAL_ADMIN1: u32 = 0x0;
pub const OPAL_USER1: u32 = 0x01;
pub const OPAL_USER9: u32 = 0x09;

pub const OPAL_RO: u32 = 0x01;
pub const OPAL_RW: u32 = 0x02;
pub const OPAL_LK: u32 = 0x04;

pub const OPAL_MBR_ENABLE: u8 = 0x0;
pub const OPAL_MBR_DISABLE: u8 = 0x01;

pub const OPAL_MBR_NOT_DONE: u8 = 0x0;
pub const OPAL_MBR_DONE: u8 = 0x01;

pub const OPAL_INCLUDED: u8 = 0; // key_type: key bytes included in opal_key.key

#[repr(C)]
#[derive(Clone)]
pub struct opal_key {
    pub lr: u8,
    pub key_len: u8,
    pub key_type: u8,
    pub __align: [u8; 5],
    pub key: [u8; OPAL_KEY_MAX],
}

// Key material never reaches logs or panic messages.
impl fmt::Debug for opal_key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("opal_key")
            .field("lr", &self.lr)
            .field("key_len", &self.key_len)
            .field("key_type", &self.key_type)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Drop for opal_key {
    fn drop(&mut self) {
        self.key.zeroize();
        self.key_len.zeroize();
    }
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_session_info {
    pub sum: u32,
    pub who: u32,
    pub opal_key: opal_key,
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_lock_unlock {
    pub session: opal_session_info,
    pub l_state: u32,
    pub flags: u16,
    pub __align: [u8; 2],
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_lr_act {
    pub key: opal_key,
    pub sum: u32,
    pub num_lrs: u8,
    pub lr: [u8; OPAL_MAX_LRS],
    pub align: [u8; 2],
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_user_lr_setup {
    pub range_start: u64,
    pub range_length: u64,
    pub RLE: u32,
    pub WLE: u32,
    pub session: opal_session_info,
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_new_pw {
    pub session: opal_session_info,
    pub new_user_pw: opal_session_info,
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_mbr_data {
    pub key: opal_key,
    pub enable_disable: u8,
    pub __align: [u8; 7],
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_mbr_done {
    pub key: opal_key,
    pub done_flag: u8,
    pub __align: [u8; 7],
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct opal_discovery {
    pub data: u64,
    pub size: u64,
}

const _: () = assert!(size_of::<opal_key>() == 264);
const _: () = assert!(size_of::<opal_session_info>() == 272);
const _: () = assert!(size_of::<opal_lock_unlock>() == 280);
const _: () = assert!(size_of::<opal_lr_act>() == 280);
const _: () = assert!(size_of::<opal_user_lr_setup>() == 296);
const _: () = assert!(size_of::<opal_new_pw>() == 544);
const _: () = assert!(size_of::<opal_mbr_data>() == 272);
const _: () = assert!(size_of::<opal_mbr_done>() == 272);
const _: () = assert!(size_of::<opal_discovery>() == 16);

ioctl_write_ptr!(ioc_opal_save, b'p', 220, opal_lock_unlock);
ioctl_write_ptr!(ioc_opal_lock_unlock, b'p', 221, opal_lock_unlock);
ioctl_write_ptr!(ioc_opal_take_ownership, b'p', 222, opal_key);
ioctl_write_ptr!(ioc_opal_activate_lsp, b'p', 223, opal_lr_act);
ioctl_write_ptr!(ioc_opal_set_pw, b'p', 224, opal_new_pw);
ioctl_write_ptr!(ioc_opal_activate_usr, b'p', 225, opal_session_info);
ioctl_write_ptr!(ioc_opal_revert_tpr, b'p', 226, opal_key);
ioctl_write_ptr!(ioc_opal_lr_setup, b'p', 227, opal_user_lr_setup);
ioctl_write_ptr!(ioc_opal_add_usr_to_lr, b'p', 228, opal_lock_unlock);
ioctl_write_ptr!(ioc_opal_enable_disable_mbr, b'p', 229, opal_mbr_data);
ioctl_write_ptr!(ioc_opal_erase_lr, b'p', 230, opal_session_info);
ioctl_write_ptr!(ioc_opal_secure_erase_lr, b'p', 231, opal_session_info);
ioctl_write_ptr!(ioc_opal_psid_revert_tpr, b'p', 232, opal_key);
ioctl_write_ptr!(ioc_opal_mbr_done, b'p', 233, opal_mbr_done);
// Encoded as a write even though the kernel fills the page behind `data`.
ioctl_write_ptr!(ioc_opal_discovery, b'p', 239, opal_discovery);

macro_rules! impl_default_zeroed {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Default for $t {
                // All-zero is a valid bit pattern for these plain integer structs.
                fn default() -> Self { unsafe { zeroed() } }
            }
        )+
    };
}

impl_default_zeroed!(
    opal_key,
    opal_session_info,
    opal_lock_unlock,
    opal_new_pw,
    opal_user_lr_setup,
    opal_lr_act,
    opal_mbr_data,
    opal_mbr_done,
    opal_discovery,
);
