//! In-memory engine for tests
//!
//! Every result code can be scripted, and `fire` plays the engine's role of
//! calling a registered callback on demand.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use super::{
    AudioCallbackApi, AudioCallbackFn, RemoteApi, CLIENT_NAME_LEN, DEVICE_STRING_LEN,
    PARAMETER_STRING_LEN,
};
use crate::callback::Mode;

#[derive(Clone, Copy)]
struct Slot {
    callback: AudioCallbackFn,
    user: usize,
    active: bool,
}

#[derive(Clone)]
pub struct ScriptedDevice {
    pub kind: i32,
    pub name: String,
    pub hardware_id: String,
}

pub struct ScriptedEngine {
    slots: Mutex<HashMap<i32, Slot>>,
    register_code: Mutex<Option<i32>>,
    busy_client: Mutex<Option<String>>,
    start_code: AtomicI32,
    stop_code: AtomicI32,
    unregister_code: Mutex<Option<i32>>,
    register_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    unregister_threads: Mutex<Vec<Option<String>>>,

    pub login_code: AtomicI32,
    pub logout_code: AtomicI32,
    pub engine_kind: AtomicI32,
    pub engine_version: AtomicI32,
    pub parameters_dirty: AtomicI32,
    pub macro_dirty: AtomicI32,
    pub floats: Mutex<HashMap<String, f32>>,
    pub strings: Mutex<HashMap<String, String>>,
    pub scripts: Mutex<Vec<String>>,
    pub levels: Mutex<HashMap<(i32, i32), f32>>,
    pub buttons: Mutex<HashMap<(i32, i32), f32>>,
    pub inputs: Mutex<Vec<ScriptedDevice>>,
    pub outputs: Mutex<Vec<ScriptedDevice>>,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            register_code: Mutex::new(None),
            busy_client: Mutex::new(None),
            start_code: AtomicI32::new(0),
            stop_code: AtomicI32::new(0),
            unregister_code: Mutex::new(None),
            register_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
            unregister_threads: Mutex::new(Vec::new()),
            login_code: AtomicI32::new(0),
            logout_code: AtomicI32::new(0),
            engine_kind: AtomicI32::new(2),
            // 2.1.0.8
            engine_version: AtomicI32::new(0x0201_0008),
            parameters_dirty: AtomicI32::new(0),
            macro_dirty: AtomicI32::new(0),
            floats: Mutex::new(HashMap::new()),
            strings: Mutex::new(HashMap::new()),
            scripts: Mutex::new(Vec::new()),
            levels: Mutex::new(HashMap::new()),
            buttons: Mutex::new(HashMap::new()),
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    /// Reject the next registrations with `code`, reporting `client` as the
    /// current holder when given.
    pub fn reject_register(&self, code: i32, client: Option<&str>) {
        *self.register_code.lock() = Some(code);
        *self.busy_client.lock() = client.map(str::to_string);
    }

    pub fn set_start_code(&self, code: i32) {
        self.start_code.store(code, Ordering::SeqCst);
    }

    pub fn set_stop_code(&self, code: i32) {
        self.stop_code.store(code, Ordering::SeqCst);
    }

    /// Force the unregister result instead of tracking registrations
    pub fn set_unregister_code(&self, code: Option<i32>) {
        *self.unregister_code.lock() = code;
    }

    /// Name of the calling thread for each unregister, in call order
    pub fn unregister_threads(&self) -> Vec<Option<String>> {
        self.unregister_threads.lock().clone()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn is_active(&self, mode: Mode) -> bool {
        self.slots
            .lock()
            .get(&mode.as_raw())
            .map_or(false, |slot| slot.active)
    }

    /// Deliver one event to the callback last registered for `mode`. The
    /// engine keeps calling an unregistered callback until its ENDING.
    pub fn fire(&self, mode: Mode, command: i32, data: *mut c_void, nnn: i32) -> i32 {
        let slot = self.slots.lock().get(&mode.as_raw()).copied();
        let slot = slot.expect("no callback was ever registered for this mode");
        unsafe { (slot.callback)(slot.user as *mut c_void, command, data, nnn) }
    }
}

fn write_c_string(target: &mut [u8], value: &str) {
    let len = value.len().min(target.len() - 1);
    target[..len].copy_from_slice(&value.as_bytes()[..len]);
    target[len] = 0;
}

impl AudioCallbackApi for ScriptedEngine {
    fn audio_callback_register(
        &self,
        mode: i32,
        callback: AudioCallbackFn,
        user: *mut c_void,
        client_name: &mut [u8; CLIENT_NAME_LEN],
    ) -> i32 {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = *self.register_code.lock() {
            if let Some(client) = self.busy_client.lock().as_deref() {
                write_c_string(client_name, client);
            }
            return code;
        }
        self.slots.lock().insert(
            mode,
            Slot {
                callback,
                user: user as usize,
                active: true,
            },
        );
        0
    }

    fn audio_callback_start(&self) -> i32 {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_code.load(Ordering::SeqCst)
    }

    fn audio_callback_stop(&self) -> i32 {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop_code.load(Ordering::SeqCst)
    }

    fn audio_callback_unregister(&self, callback: AudioCallbackFn) -> i32 {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.unregister_threads
            .lock()
            .push(std::thread::current().name().map(str::to_string));
        if let Some(code) = *self.unregister_code.lock() {
            return code;
        }
        let mut slots = self.slots.lock();
        let found = slots
            .values_mut()
            .find(|slot| slot.active && slot.callback as usize == callback as usize);
        match found {
            Some(slot) => {
                slot.active = false;
                0
            }
            None => -2,
        }
    }
}

fn describe(devices: &[ScriptedDevice], index: i32, kind: &mut i32, name: &mut [u8], hardware_id: &mut [u8]) -> i32 {
    match usize::try_from(index).ok().and_then(|i| devices.get(i)) {
        Some(device) => {
            *kind = device.kind;
            write_c_string(name, &device.name);
            write_c_string(hardware_id, &device.hardware_id);
            0
        }
        None => -1,
    }
}

impl RemoteApi for ScriptedEngine {
    fn login(&self) -> i32 {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_code.load(Ordering::SeqCst)
    }

    fn logout(&self) -> i32 {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_code.load(Ordering::SeqCst)
    }

    fn run_voicemeeter(&self, kind: i32) -> i32 {
        self.engine_kind.store(kind, Ordering::SeqCst);
        0
    }

    fn is_parameters_dirty(&self) -> i32 {
        self.parameters_dirty.swap(0, Ordering::SeqCst)
    }

    fn get_parameter_float(&self, name: &CStr, value: &mut f32) -> i32 {
        match self.floats.lock().get(&*name.to_string_lossy()) {
            Some(stored) => {
                *value = *stored;
                0
            }
            None => -3,
        }
    }

    fn get_parameter_string(&self, name: &CStr, value: &mut [u8; PARAMETER_STRING_LEN]) -> i32 {
        match self.strings.lock().get(&*name.to_string_lossy()) {
            Some(stored) => {
                write_c_string(value, stored);
                0
            }
            None => -3,
        }
    }

    fn set_parameters(&self, script: &CStr) -> i32 {
        self.scripts.lock().push(script.to_string_lossy().into_owned());
        0
    }

    fn get_level(&self, kind: i32, channel: i32, value: &mut f32) -> i32 {
        match self.levels.lock().get(&(kind, channel)) {
            Some(level) => {
                *value = *level;
                0
            }
            None => -3,
        }
    }

    fn output_device_count(&self) -> i32 {
        self.outputs.lock().len() as i32
    }

    fn output_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32 {
        describe(&self.outputs.lock(), index, kind, name, hardware_id)
    }

    fn input_device_count(&self) -> i32 {
        self.inputs.lock().len() as i32
    }

    fn input_device_desc(
        &self,
        index: i32,
        kind: &mut i32,
        name: &mut [u8; DEVICE_STRING_LEN],
        hardware_id: &mut [u8; DEVICE_STRING_LEN],
    ) -> i32 {
        describe(&self.inputs.lock(), index, kind, name, hardware_id)
    }

    fn voicemeeter_type(&self, kind: &mut i32) -> i32 {
        *kind = self.engine_kind.load(Ordering::SeqCst);
        0
    }

    fn voicemeeter_version(&self, version: &mut i32) -> i32 {
        *version = self.engine_version.load(Ordering::SeqCst);
        0
    }

    fn macro_button_is_dirty(&self) -> i32 {
        self.macro_dirty.swap(0, Ordering::SeqCst)
    }

    fn macro_button_get_status(&self, index: i32, value: &mut f32, mode: i32) -> i32 {
        match self.buttons.lock().get(&(index, mode)) {
            Some(state) => {
                *value = *state;
                0
            }
            None => -3,
        }
    }

    fn macro_button_set_status(&self, index: i32, value: f32, mode: i32) -> i32 {
        if index < 0 {
            return -3;
        }
        self.buttons.lock().insert((index, mode), value);
        0
    }
}
