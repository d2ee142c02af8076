//! Engine identity and remote value types

use std::fmt;

use crate::error::ConnectorError;

/// Installed engine edition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Voicemeeter,
    Banana,
    Potato,
}

impl EngineKind {
    pub fn from_raw(raw: i32) -> Result<Self, ConnectorError> {
        match raw {
            1 => Ok(EngineKind::Voicemeeter),
            2 => Ok(EngineKind::Banana),
            3 => Ok(EngineKind::Potato),
            other => Err(ConnectorError::UnknownEngineKind(other)),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            EngineKind::Voicemeeter => 1,
            EngineKind::Banana => 2,
            EngineKind::Potato => 3,
        }
    }

    /// Channels delivered to an input-mode callback
    pub fn input_channels(self) -> usize {
        match self {
            EngineKind::Voicemeeter => 12,
            EngineKind::Banana => 22,
            EngineKind::Potato => 34,
        }
    }

    /// Channels delivered to an output-mode callback
    pub fn output_channels(self) -> usize {
        match self {
            EngineKind::Voicemeeter => 16,
            EngineKind::Banana => 40,
            EngineKind::Potato => 64,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Voicemeeter => "Voicemeeter",
            EngineKind::Banana => "Voicemeeter Banana",
            EngineKind::Potato => "Voicemeeter Potato",
        })
    }
}

/// Engine version, packed by the remote API one byte per component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u8,
}

impl Version {
    pub fn from_packed(packed: i32) -> Self {
        let [major, minor, patch, build] = (packed as u32).to_be_bytes();
        Self {
            major,
            minor,
            patch,
            build,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// Outcome of a successful login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    /// Logged in and the engine application is running
    Running,
    /// Logged in, but the engine application is not running yet
    AppNotRunning,
    /// An earlier login is still active
    AlreadyConnected,
}

/// Value read by [`Connector::get_parameter`](super::Connector::get_parameter)
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Float(f32),
    Text(String),
}

impl ParameterValue {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParameterValue::Float(value) => Some(*value),
            ParameterValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(value) => Some(value),
            ParameterValue::Float(_) => None,
        }
    }
}

/// Properties read as strings. Matched against the last dotted segment of a
/// parameter name, ignoring any `[n]` index.
pub const STRING_PARAMETERS: [&str; 7] = ["Label", "FadeTo", "FadeBy", "AppGain", "AppMute", "name", "ip"];

pub fn is_string_parameter(name: &str) -> bool {
    let property = name.rsplit('.').next().unwrap_or(name);
    let property = property.split('[').next().unwrap_or(property);
    STRING_PARAMETERS.contains(&property)
}

/// Tap point for [`Connector::level`](super::Connector::level)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LevelKind {
    PreFaderInput = 0,
    PostFaderInput = 1,
    PostMuteInput = 2,
    Output = 3,
}

/// Which part of a macro button's state is read or written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum MacroButtonMode {
    #[default]
    Default = 0,
    StateOnly = 2,
    Trigger = 3,
    Color = 4,
}
