//! Connection to the Voicemeeter engine
//!
//! A [`Connector`] owns the loaded remote library, the login session, the
//! change watcher and the [`AudioCallbacks`] bound to the same library.
//! Everything except [`Connector::connect`] requires an active login.

pub mod device;
pub mod engine;
pub mod watcher;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::ffi::CString;
use std::sync::Arc;

pub use device::{Device, DeviceDriver, Direction};
pub use engine::{EngineKind, LevelKind, LoginStatus, MacroButtonMode, ParameterValue, Version};
pub use watcher::{ChangeSubscribers, ChangeWatcher};

use crate::callback::AudioCallbacks;
use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::remote::{c_buffer_to_string, RemoteApi, RemoteLibrary, PARAMETER_STRING_LEN};

#[derive(Default)]
struct Session {
    connected: bool,
    engine: Option<EngineKind>,
    version: Option<Version>,
    watcher: Option<ChangeWatcher>,
    inputs: Vec<Device>,
    outputs: Vec<Device>,
}

/// Owned connection to the engine
pub struct Connector {
    remote: Arc<dyn RemoteApi>,
    callbacks: AudioCallbacks,
    config: ConnectorConfig,
    session: Mutex<Session>,
    subscribers: ChangeSubscribers,
}

impl Connector {
    /// Load the remote library named by `config` and wrap it
    pub fn load(config: ConnectorConfig) -> Result<Self, ConnectorError> {
        let library = Arc::new(RemoteLibrary::load(config.library_path())?);
        Ok(Self::with_remote(library, config))
    }

    /// Wrap an already bound remote API
    pub fn with_remote<R: RemoteApi + 'static>(remote: Arc<R>, config: ConnectorConfig) -> Self {
        let callbacks = AudioCallbacks::with_config(remote.clone(), &config);
        Self {
            remote,
            callbacks,
            config,
            session: Mutex::new(Session::default()),
            subscribers: ChangeSubscribers::default(),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Audio callbacks bound to this connector's library
    pub fn callbacks(&self) -> &AudioCallbacks {
        &self.callbacks
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().connected
    }

    /// Log in and start watching for changes
    pub fn connect(&self) -> Result<LoginStatus, ConnectorError> {
        let mut session = self.session.lock();
        if session.connected {
            return Ok(LoginStatus::AlreadyConnected);
        }

        let status = match self.remote.login() {
            0 => LoginStatus::Running,
            1 => LoginStatus::AppNotRunning,
            -1 => {
                return Err(ConnectorError::LoginFailed {
                    code: -1,
                    reason: "unable to get client",
                })
            }
            -2 => {
                return Err(ConnectorError::LoginFailed {
                    code: -2,
                    reason: "unexpected login, logout expected first",
                })
            }
            code => {
                return Err(ConnectorError::LoginFailed {
                    code,
                    reason: "unknown result",
                })
            }
        };

        let watcher = match ChangeWatcher::start(
            self.remote.clone(),
            self.subscribers.clone(),
            self.config.poll_interval(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.remote.logout();
                return Err(e);
            }
        };

        session.connected = true;
        session.watcher = Some(watcher);
        if status == LoginStatus::Running {
            session.engine = self.query_engine_kind().map_err(log_query_failure).ok();
            session.version = self.query_version().map_err(log_query_failure).ok();
        }

        tracing::info!(?status, engine = ?session.engine, version = ?session.version, "Connected to Voicemeeter");
        Ok(status)
    }

    /// Unregister all callbacks, stop the watcher and log out
    pub async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.ensure_connected()?;

        if let Err(e) = self.callbacks.unregister_all_audio_callbacks().await {
            tracing::warn!("Disconnecting with callbacks left: {e}");
        }

        // Joined outside the session lock
        let watcher = self.session.lock().watcher.take();
        drop(watcher);

        match self.remote.logout() {
            0 => {
                let mut session = self.session.lock();
                session.connected = false;
                session.engine = None;
                session.version = None;
                tracing::info!("Disconnected from Voicemeeter");
                Ok(())
            }
            code => Err(ConnectorError::LogoutFailed(code)),
        }
    }

    /// Receiver woken whenever a parameter or macro button changes
    pub fn subscribe_changes(&self) -> Receiver<()> {
        self.subscribers.subscribe()
    }

    /// Installed engine edition; queried again if it was unknown at login
    pub fn engine_kind(&self) -> Result<EngineKind, ConnectorError> {
        self.ensure_connected()?;
        if let Some(kind) = self.session.lock().engine {
            return Ok(kind);
        }
        let kind = self.query_engine_kind()?;
        self.session.lock().engine = Some(kind);
        Ok(kind)
    }

    pub fn version(&self) -> Result<Version, ConnectorError> {
        self.ensure_connected()?;
        if let Some(version) = self.session.lock().version {
            return Ok(version);
        }
        let version = self.query_version()?;
        self.session.lock().version = Some(version);
        Ok(version)
    }

    /// Launch the engine application of the given edition
    pub fn launch(&self, kind: EngineKind) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        check("VBVMR_RunVoicemeeter", self.remote.run_voicemeeter(kind.as_raw()))
    }

    /// Re-read the input and output device lists
    pub fn update_device_list(&self) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        let inputs = device::list_devices(self.remote.as_ref(), Direction::Input);
        let outputs = device::list_devices(self.remote.as_ref(), Direction::Output);

        let mut session = self.session.lock();
        session.inputs = inputs;
        session.outputs = outputs;
        Ok(())
    }

    /// Devices from the last [`update_device_list`](Self::update_device_list)
    pub fn input_devices(&self) -> Vec<Device> {
        self.session.lock().inputs.clone()
    }

    pub fn output_devices(&self) -> Vec<Device> {
        self.session.lock().outputs.clone()
    }

    /// Read a parameter such as `Strip[0].Gain` or `Bus[1].Label`
    pub fn get_parameter(&self, name: &str) -> Result<ParameterValue, ConnectorError> {
        self.ensure_connected()?;
        let c_name = c_string(name)?;

        if engine::is_string_parameter(name) {
            let mut value = [0u8; PARAMETER_STRING_LEN];
            check(
                "VBVMR_GetParameterStringA",
                self.remote.get_parameter_string(&c_name, &mut value),
            )?;
            Ok(ParameterValue::Text(c_buffer_to_string(&value)))
        } else {
            let mut value = 0.0;
            check(
                "VBVMR_GetParameterFloat",
                self.remote.get_parameter_float(&c_name, &mut value),
            )?;
            Ok(ParameterValue::Float(value))
        }
    }

    /// Send a parameter script (e.g. `Strip[0].Mute=1;`) and wait for the
    /// engine to apply it
    pub async fn set_parameters(&self, script: &str) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        let c_script = c_string(script)?;
        check("VBVMR_SetParameters", self.remote.set_parameters(&c_script))?;
        tokio::time::sleep(self.config.parameter_settle()).await;
        Ok(())
    }

    /// Current level of `channel` at the given tap point
    pub fn level(&self, kind: LevelKind, channel: usize) -> Result<f32, ConnectorError> {
        self.ensure_connected()?;
        let channel = i32::try_from(channel)
            .map_err(|_| ConnectorError::InvalidParameter(format!("channel {channel}")))?;
        let mut value = 0.0;
        check("VBVMR_GetLevel", self.remote.get_level(kind as i32, channel, &mut value))?;
        Ok(value)
    }

    pub fn macro_button_status(&self, index: i32, mode: MacroButtonMode) -> Result<f32, ConnectorError> {
        self.ensure_connected()?;
        let mut value = 0.0;
        match self.remote.macro_button_get_status(index, &mut value, mode as i32) {
            0 => Ok(value),
            code => Err(ConnectorError::MacroButtonGetFailed { index, code }),
        }
    }

    pub fn set_macro_button_status(
        &self,
        index: i32,
        value: f32,
        mode: MacroButtonMode,
    ) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        match self.remote.macro_button_set_status(index, value, mode as i32) {
            0 => Ok(()),
            code => Err(ConnectorError::MacroButtonSetFailed { index, code }),
        }
    }

    fn ensure_connected(&self) -> Result<(), ConnectorError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectorError::NotConnected)
        }
    }

    fn query_engine_kind(&self) -> Result<EngineKind, ConnectorError> {
        let mut raw = 0;
        check("VBVMR_GetVoicemeeterType", self.remote.voicemeeter_type(&mut raw))?;
        EngineKind::from_raw(raw)
    }

    fn query_version(&self) -> Result<Version, ConnectorError> {
        let mut packed = 0;
        check("VBVMR_GetVoicemeeterVersion", self.remote.voicemeeter_version(&mut packed))?;
        Ok(Version::from_packed(packed))
    }
}

fn check(call: &'static str, code: i32) -> Result<(), ConnectorError> {
    match code {
        0 => Ok(()),
        code => Err(ConnectorError::CallFailed { call, code }),
    }
}

fn c_string(text: &str) -> Result<CString, ConnectorError> {
    CString::new(text).map_err(|_| ConnectorError::InvalidParameter(text.to_string()))
}

fn log_query_failure(e: ConnectorError) -> ConnectorError {
    tracing::warn!("Engine query after login failed: {e}");
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{AudioEvent, Mode};
    use crate::error::CallbackError;
    use crate::remote::scripted::ScriptedEngine;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn connector() -> (Arc<ScriptedEngine>, Connector) {
        let engine = Arc::new(ScriptedEngine::new());
        let config = ConnectorConfig {
            poll_interval_ms: 1,
            parameter_settle_ms: 0,
            ..Default::default()
        };
        (engine.clone(), Connector::with_remote(engine, config))
    }

    #[test]
    fn test_operations_require_login() {
        let (_engine, connector) = connector();
        assert!(matches!(connector.engine_kind(), Err(ConnectorError::NotConnected)));
        assert!(matches!(connector.get_parameter("Strip[0].Gain"), Err(ConnectorError::NotConnected)));
        assert!(matches!(connector.update_device_list(), Err(ConnectorError::NotConnected)));
        assert!(matches!(
            connector.macro_button_status(0, MacroButtonMode::Default),
            Err(ConnectorError::NotConnected)
        ));
    }

    #[test]
    fn test_connect_reads_engine_identity() {
        let (engine, connector) = connector();
        engine.engine_kind.store(3, Ordering::SeqCst);

        assert_eq!(connector.connect().unwrap(), LoginStatus::Running);
        assert_eq!(connector.engine_kind().unwrap(), EngineKind::Potato);
        assert_eq!(connector.version().unwrap().to_string(), "2.1.0.8");

        assert_eq!(connector.connect().unwrap(), LoginStatus::AlreadyConnected);
        assert_eq!(engine.login_calls(), 1);
    }

    #[test]
    fn test_connect_without_running_app() {
        let (engine, connector) = connector();
        engine.login_code.store(1, Ordering::SeqCst);
        assert_eq!(connector.connect().unwrap(), LoginStatus::AppNotRunning);
        assert!(connector.is_connected());
    }

    #[test]
    fn test_login_failures() {
        for code in [-1, -2, 7] {
            let (engine, connector) = connector();
            engine.login_code.store(code, Ordering::SeqCst);
            let err = connector.connect().unwrap_err();
            assert!(matches!(err, ConnectorError::LoginFailed { code: c, .. } if c == code));
            assert!(!connector.is_connected());
        }
    }

    #[test]
    fn test_parameters_by_type() {
        let (engine, connector) = connector();
        connector.connect().unwrap();
        engine.floats.lock().insert("Strip[0].Gain".into(), -6.5);
        engine.strings.lock().insert("Bus[1].Label".into(), "Stream".into());

        assert_eq!(
            connector.get_parameter("Strip[0].Gain").unwrap(),
            ParameterValue::Float(-6.5)
        );
        assert_eq!(
            connector.get_parameter("Bus[1].Label").unwrap().as_text(),
            Some("Stream")
        );
        assert!(matches!(
            connector.get_parameter("Strip[9].Gain"),
            Err(ConnectorError::CallFailed { code: -3, .. })
        ));
        assert!(matches!(
            connector.get_parameter("bad\0name"),
            Err(ConnectorError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_set_parameters_forwards_script() {
        let (engine, connector) = connector();
        connector.connect().unwrap();
        connector.set_parameters("Strip[0].Mute=1;").await.unwrap();
        assert_eq!(*engine.scripts.lock(), vec!["Strip[0].Mute=1;".to_string()]);
    }

    #[test]
    fn test_macro_buttons_and_levels() {
        let (engine, connector) = connector();
        connector.connect().unwrap();

        connector
            .set_macro_button_status(4, 1.0, MacroButtonMode::StateOnly)
            .unwrap();
        assert_eq!(
            connector.macro_button_status(4, MacroButtonMode::StateOnly).unwrap(),
            1.0
        );
        assert!(matches!(
            connector.set_macro_button_status(-1, 1.0, MacroButtonMode::Default),
            Err(ConnectorError::MacroButtonSetFailed { index: -1, .. })
        ));

        engine.levels.lock().insert((3, 2), 0.25);
        assert_eq!(connector.level(LevelKind::Output, 2).unwrap(), 0.25);
    }

    #[test]
    fn test_change_subscription() {
        let (engine, connector) = connector();
        let changes = connector.subscribe_changes();
        connector.connect().unwrap();
        engine.parameters_dirty.store(1, Ordering::SeqCst);
        assert!(changes.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_and_logs_out() {
        let (engine, connector) = connector();
        assert!(matches!(connector.disconnect().await, Err(ConnectorError::NotConnected)));

        connector.connect().unwrap();
        connector
            .callbacks()
            .register_audio_callback(
                Mode::Input,
                "connector-test",
                |_: Option<CallbackError>, _: Option<&mut AudioEvent<'_>>| {},
            )
            .unwrap();

        connector.disconnect().await.unwrap();
        assert!(!connector.is_connected());
        assert!(!connector.callbacks().is_registered(Mode::Input));
        assert_eq!(engine.logout_calls(), 1);
    }

    #[tokio::test]
    async fn test_logout_failure() {
        let (engine, connector) = connector();
        connector.connect().unwrap();
        engine.logout_code.store(-1, Ordering::SeqCst);
        assert!(matches!(
            connector.disconnect().await,
            Err(ConnectorError::LogoutFailed(-1))
        ));
    }
}
