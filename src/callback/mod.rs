//! Real-time audio callbacks
//!
//! Register a handler for the engine's input, output or main stream and
//! process audio blocks in place:
//!
//! ```text
//!  engine audio thread                      control side
//!  ───────────────────                      ────────────
//!  trampoline::<MODE> ──► decode ──► handler    AudioCallbacks
//!        │                                       │  register / start / stop
//!        └── STARTING / ENDING ──► CallbackRegistry ◄─┘  unregister
//! ```

mod bridge;
mod coordinator;
pub(crate) mod decode;
mod registry;
mod types;

pub use bridge::{trampoline, trampoline_for, AudioHandler, CallbackHandle, CALLBACK_HANDLED};
pub use coordinator::AudioCallbacks;
pub use decode::{decode_buffer, decode_info, RawAudioBuffer, RawAudioInfo, MAX_CHANNELS};
pub use registry::{resolve_all, CallbackRegistry, Completion, Release};
pub use types::{
    AudioBuffer, AudioEvent, AudioInfo, BufferKind, CallbackOptions, Command, EventKind, Mode,
};
