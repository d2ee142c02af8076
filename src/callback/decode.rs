//! Raw callback record decoding
//!
//! The engine hands the callback a pointer to one of two fixed C layouts.
//! Decoding reads the declared sizes from the record and builds borrowed
//! slices over the engine's channel memory; no sample data is copied.

use std::ffi::c_void;
use std::slice;

use super::types::{AudioBuffer, AudioInfo};
use crate::error::CallbackError;

/// Capacity of the channel pointer tables in [`RawAudioBuffer`]
pub const MAX_CHANNELS: usize = 128;

/// `VBVMR_T_AUDIOINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAudioInfo {
    pub sample_rate: i32,
    pub samples_per_frame: i32,
}

/// `VBVMR_T_AUDIOBUFFER`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAudioBuffer {
    pub sample_rate: i32,
    pub samples_per_frame: i32,
    pub input_count: i32,
    pub output_count: i32,
    pub inputs: [*const f32; MAX_CHANNELS],
    pub outputs: [*mut f32; MAX_CHANNELS],
}

fn non_negative(value: i32, what: &str) -> Result<usize, CallbackError> {
    usize::try_from(value).map_err(|_| CallbackError::DecodeFailed(format!("negative {what}: {value}")))
}

fn channel_count(value: i32, what: &str) -> Result<usize, CallbackError> {
    let count = non_negative(value, what)?;
    if count > MAX_CHANNELS {
        return Err(CallbackError::DecodeFailed(format!(
            "{what} {count} exceeds table capacity {MAX_CHANNELS}"
        )));
    }
    Ok(count)
}

fn format(sample_rate: i32, samples_per_frame: i32) -> Result<AudioInfo, CallbackError> {
    Ok(AudioInfo {
        sample_rate: non_negative(sample_rate, "sample rate")? as u32,
        samples_per_frame: non_negative(samples_per_frame, "frame length")?,
    })
}

/// Decode an info record (STARTING, ENDING, CHANGE).
///
/// # Safety
///
/// `data` must be null or point to a readable [`RawAudioInfo`].
pub unsafe fn decode_info(data: *const c_void) -> Result<AudioInfo, CallbackError> {
    if data.is_null() {
        return Err(CallbackError::DecodeFailed("null info record".into()));
    }
    // SAFETY: non-null and, per the caller contract, a valid record.
    let raw = unsafe { std::ptr::read_unaligned(data.cast::<RawAudioInfo>()) };
    format(raw.sample_rate, raw.samples_per_frame)
}

/// Decode a buffer record into per-channel views.
///
/// Only the first `input_count` / `output_count` table entries are read;
/// the remaining slots of the 128-entry tables are never touched.
///
/// # Safety
///
/// `data` must be null or point to a [`RawAudioBuffer`] whose first
/// `input_count` input pointers are readable and first `output_count` output
/// pointers are writable for `samples_per_frame` floats, for the whole of
/// `'a`. Output channels must not overlap any other channel.
pub unsafe fn decode_buffer<'a>(data: *mut c_void) -> Result<AudioBuffer<'a>, CallbackError> {
    if data.is_null() {
        return Err(CallbackError::DecodeFailed("null buffer record".into()));
    }
    // SAFETY: non-null and, per the caller contract, a valid record. The
    // record is only read through this reference.
    let raw = unsafe { &*data.cast::<RawAudioBuffer>() };

    let info = format(raw.sample_rate, raw.samples_per_frame)?;
    let frames = info.samples_per_frame;
    let input_count = channel_count(raw.input_count, "input channel count")?;
    let output_count = channel_count(raw.output_count, "output channel count")?;

    let mut inputs = Vec::with_capacity(input_count);
    for (index, &ptr) in raw.inputs[..input_count].iter().enumerate() {
        if ptr.is_null() && frames > 0 {
            return Err(CallbackError::DecodeFailed(format!("input channel {index} is null")));
        }
        // SAFETY: readable for `frames` floats per the caller contract.
        inputs.push(if frames == 0 {
            Default::default()
        } else {
            unsafe { slice::from_raw_parts(ptr, frames) }
        });
    }

    let mut outputs = Vec::with_capacity(output_count);
    for (index, &ptr) in raw.outputs[..output_count].iter().enumerate() {
        if ptr.is_null() && frames > 0 {
            return Err(CallbackError::DecodeFailed(format!("output channel {index} is null")));
        }
        // SAFETY: writable for `frames` floats and unaliased per the caller contract.
        outputs.push(if frames == 0 {
            Default::default()
        } else {
            unsafe { slice::from_raw_parts_mut(ptr, frames) }
        });
    }

    Ok(AudioBuffer {
        sample_rate: info.sample_rate,
        samples_per_frame: frames,
        inputs,
        outputs,
    })
}
