//! Gain stage.
//!
//! The channel fader and the output (mix) fader are two independent stages in
//! Wave Link. Each is mapped through the fader curve on its own and the two
//! linear gains are multiplied. The result is computed once per buffer.

use super::curve::db_for;
use super::utils::{db_to_gain, scale_interleaved, scale_planar};
use crate::filter::FilterBinding;
use crate::mixer::MixerStore;

const FULL_SCALE_PERCENT: f32 = 100.0;

/// Fader percent contributed by the bound channel.
pub fn channel_percent(store: &MixerStore, binding: &FilterBinding) -> f32 {
    let Some(identifier) = binding.channel.identifier() else {
        return FULL_SCALE_PERCENT;
    };

    match store.channel_level(identifier, binding.output) {
        Some(level) if binding.follow_channel_mute && level.muted => 0.0,
        Some(level) => f32::from(level.volume),
        // Unknown channel or no valid output
        None => FULL_SCALE_PERCENT,
    }
}

/// Fader percent contributed by the bound output mix.
pub fn output_percent(store: &MixerStore, binding: &FilterBinding) -> f32 {
    if !binding.apply_output_volume {
        return FULL_SCALE_PERCENT;
    }

    // Invalid resolves to the neutral level here
    let level = store.get_or_create_output(binding.output);
    if binding.follow_output_mute && level.muted {
        0.0
    } else {
        f32::from(level.volume)
    }
}

/// Linear gain for one buffer. Always in `[0, 1]`.
pub fn compute_gain(store: &MixerStore, binding: &FilterBinding) -> f32 {
    let channel_db = db_for(channel_percent(store, binding));
    let output_db = db_for(output_percent(store, binding));
    db_to_gain(channel_db) * db_to_gain(output_db)
}

/// Applies `gain` to planar audio in place.
#[inline]
pub fn apply_gain(channels: &mut [&mut [f32]], frames: usize, gain: f32) {
    scale_planar(channels, frames, gain);
}

/// Applies `gain` to interleaved audio in place.
#[inline]
pub fn apply_gain_interleaved(samples: &mut [f32], gain: f32) {
    scale_interleaved(samples, gain);
}
