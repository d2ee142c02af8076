//! Native engine boundary
//!
//! The Voicemeeter Remote API is a flat C export surface. It is modelled as
//! two traits so the callback subsystem only depends on the four callback
//! entry points, while the [`Connector`](crate::connector::Connector) uses the
//! full surface. [`RemoteLibrary`] binds the real DLL.

pub mod library;

#[cfg(test)]
pub(crate) mod scripted;

use std::ffi::{c_void, CStr};
use std::path::PathBuf;

pub use library::RemoteLibrary;

/// Signature of the function the engine calls for every callback event.
///
/// `(user context, command, event record, sequence) -> status`
pub type AudioCallbackFn =
    unsafe extern "system" fn(lp_user: *mut c_void, command: i32, data: *mut c_void, nnn: i32) -> i32;

/// Client name buffer handed to `VBVMR_AudioCallbackRegister`
pub const CLIENT_NAME_LEN: usize = 64;

/// Device name / hardware id buffers
pub const DEVICE_STRING_LEN: usize = 256;

/// String parameter buffer
pub const PARAMETER_STRING_LEN: usize = 512;

/// Audio callback entry points of the remote API
pub trait AudioCallbackApi: Send + Sync {
    /// Register `callback` for `mode`. The engine may overwrite `client_name`
    /// with the name of a client already holding the mode.
    fn audio_callback_register(
        &self,
        mode: i32,
        callback: AudioCallbackFn,
        user: *mut c_void,
        client_name: &mut [u8; CLIENT_NAME_LEN],
    ) -> i32;

    fn audio_callback_start(&self) -> i32;

    fn audio_callback_stop(&self) -> i32;

    fn audio_callback_unregister(&self, callback: AudioCallbackFn) -> i32;
}

/// Full remote API surface
pub trait RemoteApi: AudioCallbackApi {
    fn login(&self) -> i32;
    fn logout(&self) -> i32;
    fn run_voicemeeter(&self, kind: i32) -> i32;

    fn is_parameters_dirty(&self) -> i32;
    fn get_parameter_float(&self, name: &CStr, value: &mut f32) -> i32;
    fn get_parameter_string(&self, name: &CStr, value: &mut [u8; PARAMETER_STRING_LEN]) -> i32;
    fn set_parameters(&self, script: &CStr) -> i32;
    fn get_level(&self, kind: i32, channel: i32, value: &mut f32) -> i32;

    fn output_device_count(&self) -> i32;
    fn output_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32;
    fn input_device_count(&self) -> i32;
    fn input_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32;

    fn voicemeeter_type(&self, kind: &mut i32) -> i32;
    fn voicemeeter_version(&self, version: &mut i32) -> i32;

    fn macro_button_is_dirty(&self) -> i32;
    fn macro_button_get_status(&self, index: i32, value: &mut f32, mode: i32) -> i32;
    fn macro_button_set_status(&self, index: i32, value: f32, mode: i32) -> i32;
}

/// Decode a NUL-terminated byte buffer filled by the engine
pub fn c_buffer_to_string(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

/// Library location recorded by the Voicemeeter installer, if any
#[cfg(windows)]
pub fn installed_library_path() -> Option<PathBuf> {
    use windows::core::w;
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};

    let mut buffer = [0u16; 1024];
    let mut size = (buffer.len() * std::mem::size_of::<u16>()) as u32;
    // SAFETY: `buffer` is writable for `size` bytes and outlives the call.
    let status = unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            w!("SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\VB:Voicemeeter {17359A74-1236-5467}"),
            w!("UninstallString"),
            RRF_RT_REG_SZ,
            None,
            Some(buffer.as_mut_ptr().cast()),
            Some(&mut size),
        )
    };
    if status != ERROR_SUCCESS {
        tracing::debug!("Voicemeeter uninstall key not found ({status:?})");
        return None;
    }

    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    let uninstaller = PathBuf::from(String::from_utf16_lossy(&buffer[..len]));
    Some(uninstaller.parent()?.join("VoicemeeterRemote64.dll"))
}

#[cfg(not(windows))]
pub fn installed_library_path() -> Option<PathBuf> {
    None
}
