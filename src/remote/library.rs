//! `VoicemeeterRemote64.dll` binding via `libloading`

use libloading::Library;
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};

use super::{
    AudioCallbackApi, AudioCallbackFn, RemoteApi, CLIENT_NAME_LEN, DEVICE_STRING_LEN,
    PARAMETER_STRING_LEN,
};
use crate::error::ConnectorError;

type LongFn = unsafe extern "system" fn() -> i32;
type RunFn = unsafe extern "system" fn(i32) -> i32;
type OutLongFn = unsafe extern "system" fn(*mut i32) -> i32;
type GetLevelFn = unsafe extern "system" fn(i32, i32, *mut f32) -> i32;
type GetFloatFn = unsafe extern "system" fn(*const c_char, *mut f32) -> i32;
type GetStringFn = unsafe extern "system" fn(*const c_char, *mut c_char) -> i32;
type SetParametersFn = unsafe extern "system" fn(*const c_char) -> i32;
type DeviceDescFn = unsafe extern "system" fn(i32, *mut i32, *mut c_char, *mut c_char) -> i32;
type MacroGetFn = unsafe extern "system" fn(i32, *mut f32, i32) -> i32;
type MacroSetFn = unsafe extern "system" fn(i32, f32, i32) -> i32;
type RegisterFn = unsafe extern "system" fn(i32, AudioCallbackFn, *mut c_void, *mut c_char) -> i32;
type UnregisterFn = unsafe extern "system" fn(AudioCallbackFn) -> i32;

/// Look up an export and copy the function pointer out of the symbol.
macro_rules! bind {
    ($lib:expr, $name:literal, $ty:ty) => {{
        // SAFETY: the declared type matches the prototype in VoicemeeterRemote.h.
        let symbol = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }
            .map_err(|_| ConnectorError::MissingSymbol($name))?;
        *symbol
    }};
}

/// Loaded remote library. The function pointers stay valid for as long as
/// `_lib` is alive, which is the lifetime of this struct.
pub struct RemoteLibrary {
    path: PathBuf,
    login: LongFn,
    logout: LongFn,
    run_voicemeeter: RunFn,
    is_parameters_dirty: LongFn,
    get_level: GetLevelFn,
    get_parameter_float: GetFloatFn,
    get_parameter_string: GetStringFn,
    set_parameters: SetParametersFn,
    output_device_count: LongFn,
    output_device_desc: DeviceDescFn,
    input_device_count: LongFn,
    input_device_desc: DeviceDescFn,
    voicemeeter_type: OutLongFn,
    voicemeeter_version: OutLongFn,
    macro_button_is_dirty: LongFn,
    macro_button_get_status: MacroGetFn,
    macro_button_set_status: MacroSetFn,
    audio_callback_register: RegisterFn,
    audio_callback_start: LongFn,
    audio_callback_stop: LongFn,
    audio_callback_unregister: UnregisterFn,
    _lib: Library,
}

impl RemoteLibrary {
    /// Load the library and bind every export
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConnectorError> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: loading runs the library's initialisers; the remote DLL has no
        // initialisation requirements beyond being loaded once per process.
        let lib = unsafe { Library::new(&path) }.map_err(|e| ConnectorError::LibraryLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let login = bind!(lib, "VBVMR_Login", LongFn);
        let logout = bind!(lib, "VBVMR_Logout", LongFn);
        let run_voicemeeter = bind!(lib, "VBVMR_RunVoicemeeter", RunFn);
        let is_parameters_dirty = bind!(lib, "VBVMR_IsParametersDirty", LongFn);
        let get_level = bind!(lib, "VBVMR_GetLevel", GetLevelFn);
        let get_parameter_float = bind!(lib, "VBVMR_GetParameterFloat", GetFloatFn);
        let get_parameter_string = bind!(lib, "VBVMR_GetParameterStringA", GetStringFn);
        let set_parameters = bind!(lib, "VBVMR_SetParameters", SetParametersFn);
        let output_device_count = bind!(lib, "VBVMR_Output_GetDeviceNumber", LongFn);
        let output_device_desc = bind!(lib, "VBVMR_Output_GetDeviceDescA", DeviceDescFn);
        let input_device_count = bind!(lib, "VBVMR_Input_GetDeviceNumber", LongFn);
        let input_device_desc = bind!(lib, "VBVMR_Input_GetDeviceDescA", DeviceDescFn);
        let voicemeeter_type = bind!(lib, "VBVMR_GetVoicemeeterType", OutLongFn);
        let voicemeeter_version = bind!(lib, "VBVMR_GetVoicemeeterVersion", OutLongFn);
        let macro_button_is_dirty = bind!(lib, "VBVMR_MacroButton_IsDirty", LongFn);
        let macro_button_get_status = bind!(lib, "VBVMR_MacroButton_GetStatus", MacroGetFn);
        let macro_button_set_status = bind!(lib, "VBVMR_MacroButton_SetStatus", MacroSetFn);
        let audio_callback_register = bind!(lib, "VBVMR_AudioCallbackRegister", RegisterFn);
        let audio_callback_start = bind!(lib, "VBVMR_AudioCallbackStart", LongFn);
        let audio_callback_stop = bind!(lib, "VBVMR_AudioCallbackStop", LongFn);
        let audio_callback_unregister = bind!(lib, "VBVMR_AudioCallbackUnregister", UnregisterFn);

        tracing::debug!("Loaded remote library {}", path.display());

        Ok(Self {
            path,
            login,
            logout,
            run_voicemeeter,
            is_parameters_dirty,
            get_level,
            get_parameter_float,
            get_parameter_string,
            set_parameters,
            output_device_count,
            output_device_desc,
            input_device_count,
            input_device_desc,
            voicemeeter_type,
            voicemeeter_version,
            macro_button_is_dirty,
            macro_button_get_status,
            macro_button_set_status,
            audio_callback_register,
            audio_callback_start,
            audio_callback_stop,
            audio_callback_unregister,
            _lib: lib,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// SAFETY (all calls below): each pointer was bound with its documented
// prototype, and every out-pointer refers to a live buffer of the size the
// remote API writes into.
impl AudioCallbackApi for RemoteLibrary {
    fn audio_callback_register(
        &self,
        mode: i32,
        callback: AudioCallbackFn,
        user: *mut c_void,
        client_name: &mut [u8; CLIENT_NAME_LEN],
    ) -> i32 {
        unsafe {
            (self.audio_callback_register)(mode, callback, user, client_name.as_mut_ptr().cast())
        }
    }

    fn audio_callback_start(&self) -> i32 {
        unsafe { (self.audio_callback_start)() }
    }

    fn audio_callback_stop(&self) -> i32 {
        unsafe { (self.audio_callback_stop)() }
    }

    fn audio_callback_unregister(&self, callback: AudioCallbackFn) -> i32 {
        unsafe { (self.audio_callback_unregister)(callback) }
    }
}

impl RemoteApi for RemoteLibrary {
    fn login(&self) -> i32 {
        unsafe { (self.login)() }
    }

    fn logout(&self) -> i32 {
        unsafe { (self.logout)() }
    }

    fn run_voicemeeter(&self, kind: i32) -> i32 {
        unsafe { (self.run_voicemeeter)(kind) }
    }

    fn is_parameters_dirty(&self) -> i32 {
        unsafe { (self.is_parameters_dirty)() }
    }

    fn get_parameter_float(&self, name: &CStr, value: &mut f32) -> i32 {
        unsafe { (self.get_parameter_float)(name.as_ptr(), value) }
    }

    fn get_parameter_string(&self, name: &CStr, value: &mut [u8; PARAMETER_STRING_LEN]) -> i32 {
        unsafe { (self.get_parameter_string)(name.as_ptr(), value.as_mut_ptr().cast()) }
    }

    fn set_parameters(&self, script: &CStr) -> i32 {
        unsafe { (self.set_parameters)(script.as_ptr()) }
    }

    fn get_level(&self, kind: i32, channel: i32, value: &mut f32) -> i32 {
        unsafe { (self.get_level)(kind, channel, value) }
    }

    fn output_device_count(&self) -> i32 {
        unsafe { (self.output_device_count)() }
    }

    fn output_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32 {
        unsafe {
            (self.output_device_desc)(
                index,
                kind,
                name.as_mut_ptr().cast(),
                hardware_id.as_mut_ptr().cast(),
            )
        }
    }

    fn input_device_count(&self) -> i32 {
        unsafe { (self.input_device_count)() }
    }

    fn input_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32 {
        unsafe {
            (self.input_device_desc)(
                index,
                kind,
                name.as_mut_ptr().cast(),
                hardware_id.as_mut_ptr().cast(),
            )
        }
    }

    fn voicemeeter_type(&self, kind: &mut i32) -> i32 {
        unsafe { (self.voicemeeter_type)(kind) }
    }

    fn voicemeeter_version(&self, version: &mut i32) -> i32 {
        unsafe { (self.voicemeeter_version)(version) }
    }

    fn macro_button_is_dirty(&self) -> i32 {
        unsafe { (self.macro_button_is_dirty)() }
    }

    fn macro_button_get_status(&self, index: i32, value: &mut f32, mode: i32) -> i32 {
        unsafe { (self.macro_button_get_status)(index, value, mode) }
    }

    fn macro_button_set_status(&self, index: i32, value: f32, mode: i32) -> i32 {
        unsafe { (self.macro_button_set_status)(index, value, mode) }
    }
}
