//! Audio callback modes, commands and decoded events

use std::fmt;

/// One of the three independently registerable audio streams.
///
/// The discriminants are the bit values the remote API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Mode {
    /// Strip inputs, before processing
    Input = 1,
    /// Bus outputs, after processing
    Output = 2,
    /// The full master mix (all inputs and outputs)
    Main = 4,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Input, Mode::Output, Mode::Main];

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Dense index for per-mode tables
    pub(crate) fn index(self) -> usize {
        match self {
            Mode::Input => 0,
            Mode::Output => 1,
            Mode::Main => 2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Input => "input",
            Mode::Output => "output",
            Mode::Main => "main",
        })
    }
}

/// Command code passed to the callback by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Command {
    Starting = 1,
    Ending = 2,
    Change = 3,
    BufferIn = 10,
    BufferOut = 11,
    BufferMain = 20,
}

impl Command {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Command::Starting),
            2 => Some(Command::Ending),
            3 => Some(Command::Change),
            10 => Some(Command::BufferIn),
            11 => Some(Command::BufferOut),
            20 => Some(Command::BufferMain),
            _ => None,
        }
    }

    pub fn is_buffer(self) -> bool {
        matches!(self, Command::BufferIn | Command::BufferOut | Command::BufferMain)
    }
}

/// Which stream a buffer event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    In,
    Out,
    Main,
}

impl BufferKind {
    pub fn command(self) -> Command {
        match self {
            BufferKind::In => Command::BufferIn,
            BufferKind::Out => Command::BufferOut,
            BufferKind::Main => Command::BufferMain,
        }
    }
}

/// Stream format carried by STARTING, ENDING and CHANGE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub samples_per_frame: usize,
}

/// One block of audio, borrowed from the engine for a single callback.
///
/// Input views are read-only. Output views must be written by the handler;
/// positions it does not write keep whatever the engine left there.
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub sample_rate: u32,
    pub samples_per_frame: usize,
    pub inputs: Vec<&'a [f32]>,
    pub outputs: Vec<&'a mut [f32]>,
}

impl<'a> AudioBuffer<'a> {
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Copy every input channel to the output channel with the same index
    pub fn pass_through(&mut self) {
        for (output, input) in self.outputs.iter_mut().zip(self.inputs.iter()) {
            output.copy_from_slice(input);
        }
    }

    /// Zero every output channel
    pub fn silence(&mut self) {
        for output in self.outputs.iter_mut() {
            output.fill(0.0);
        }
    }
}

/// Payload of an [`AudioEvent`]
#[derive(Debug)]
pub enum EventKind<'a> {
    Starting(AudioInfo),
    Ending(AudioInfo),
    Change(AudioInfo),
    Buffer {
        kind: BufferKind,
        buffer: AudioBuffer<'a>,
    },
}

/// Decoded callback event, valid only for the duration of the handler call
#[derive(Debug)]
pub struct AudioEvent<'a> {
    /// Value from [`CallbackOptions::user_context`]
    pub user_context: usize,
    /// Per-call counter supplied by the engine
    pub sequence: i32,
    pub kind: EventKind<'a>,
}

impl<'a> AudioEvent<'a> {
    pub fn command(&self) -> Command {
        match &self.kind {
            EventKind::Starting(_) => Command::Starting,
            EventKind::Ending(_) => Command::Ending,
            EventKind::Change(_) => Command::Change,
            EventKind::Buffer { kind, .. } => kind.command(),
        }
    }

    /// Stream format of the event, whatever its kind
    pub fn info(&self) -> AudioInfo {
        match &self.kind {
            EventKind::Starting(info) | EventKind::Ending(info) | EventKind::Change(info) => *info,
            EventKind::Buffer { buffer, .. } => AudioInfo {
                sample_rate: buffer.sample_rate,
                samples_per_frame: buffer.samples_per_frame,
            },
        }
    }

    pub fn buffer(&self) -> Option<&AudioBuffer<'a>> {
        match &self.kind {
            EventKind::Buffer { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut AudioBuffer<'a>> {
        match &mut self.kind {
            EventKind::Buffer { buffer, .. } => Some(buffer),
            _ => None,
        }
    }
}

/// Per-registration options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackOptions {
    /// Restart the callback automatically after a CHANGE event
    pub restart_on_changed_stream: bool,
    /// Opaque value echoed in every event
    pub user_context: usize,
}

impl Default for CallbackOptions {
    fn default() -> Self {
        Self {
            restart_on_changed_stream: true,
            user_context: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        for command in [
            Command::Starting,
            Command::Ending,
            Command::Change,
            Command::BufferIn,
            Command::BufferOut,
            Command::BufferMain,
        ] {
            assert_eq!(Command::from_raw(command as i32), Some(command));
        }
        assert_eq!(Command::from_raw(0), None);
        assert_eq!(Command::from_raw(12), None);
    }

    #[test]
    fn test_mode_bits() {
        assert_eq!(Mode::Input.as_raw(), 1);
        assert_eq!(Mode::Output.as_raw(), 2);
        assert_eq!(Mode::Main.as_raw(), 4);
        assert_eq!(Mode::Main.to_string(), "main");
    }

    #[test]
    fn test_pass_through_copies_matching_channels() {
        let input = [0.5f32; 4];
        let mut out_a = [0.0f32; 4];
        let mut out_b = [9.0f32; 4];
        let mut buffer = AudioBuffer {
            sample_rate: 48_000,
            samples_per_frame: 4,
            inputs: vec![&input[..]],
            outputs: vec![&mut out_a[..], &mut out_b[..]],
        };

        buffer.pass_through();
        assert_eq!(*buffer.outputs[0], [0.5; 4]);
        // No input 1, so output 1 is untouched
        assert_eq!(*buffer.outputs[1], [9.0; 4]);

        buffer.silence();
        assert!(buffer.outputs.iter().all(|ch| ch.iter().all(|&s| s == 0.0)));
    }
}
