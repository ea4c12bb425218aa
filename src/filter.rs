//! Filter binding and the host-agnostic filter instance.
//!
//! A filter follows one Wave Link channel on one output mix. The host hands
//! over its settings through [`FilterInstance::update`] and audio through
//! [`FilterInstance::process`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dsp::gain::{apply_gain, apply_gain_interleaved, compute_gain};
use crate::mixer::{MixerStore, OutputId};

/// Channel setting value meaning "do not follow any channel".
pub const NO_CHANNEL: &str = "None";

pub const DEFAULT_CHANNEL: &str = "Wave Link Music";
pub const DEFAULT_MIXER_TYPE: i64 = 1;

/// Which channel a filter follows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelSelection {
    #[default]
    None,
    Channel(String),
}

impl ChannelSelection {
    /// Empty strings and `None` (any case) select no channel.
    pub fn parse(value: &str) -> Self {
        if is_no_channel(value) {
            ChannelSelection::None
        } else {
            ChannelSelection::Channel(value.to_string())
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            ChannelSelection::None => None,
            ChannelSelection::Channel(identifier) => Some(identifier),
        }
    }

    /// True if `parse(value)` would produce this selection. Never allocates.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            ChannelSelection::None => is_no_channel(value),
            ChannelSelection::Channel(identifier) => identifier == value,
        }
    }
}

fn is_no_channel(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case(NO_CHANNEL)
}

/// What a filter instance reads from the mixer store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBinding {
    pub channel: ChannelSelection,
    pub output: OutputId,
    pub follow_channel_mute: bool,
    pub apply_output_volume: bool,
    pub follow_output_mute: bool,
}

impl Default for FilterBinding {
    fn default() -> Self {
        Self::from(&FilterSettings::default())
    }
}

impl From<&FilterSettings> for FilterBinding {
    fn from(settings: &FilterSettings) -> Self {
        Self {
            channel: ChannelSelection::parse(&settings.channel),
            output: OutputId::from_selector(settings.mixer_type),
            follow_channel_mute: settings.follow_channel_mute.unwrap_or(true),
            apply_output_volume: settings.apply_output_volume.unwrap_or(false),
            follow_output_mute: settings.follow_output_mute.unwrap_or(true),
        }
    }
}

/// Settings object as stored by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub channel: String,
    /// 1 = Local (monitor mix), 2 = Stream mix.
    pub mixer_type: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_channel_mute: Option<bool>,
    #[serde(rename = "apply_mixer_volume", skip_serializing_if = "Option::is_none")]
    pub apply_output_volume: Option<bool>,
    #[serde(rename = "follow_mixer_mute", skip_serializing_if = "Option::is_none")]
    pub follow_output_mute: Option<bool>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            mixer_type: DEFAULT_MIXER_TYPE,
            follow_channel_mute: None,
            apply_output_volume: None,
            follow_output_mute: None,
        }
    }
}

/// One audio-processing slot following a Wave Link channel.
pub struct FilterInstance {
    store: Arc<MixerStore>,
    binding: FilterBinding,
}

impl FilterInstance {
    pub fn new(store: Arc<MixerStore>, settings: &FilterSettings) -> Self {
        Self {
            store,
            binding: FilterBinding::from(settings),
        }
    }

    /// Rebinds the filter to new host settings.
    pub fn update(&mut self, settings: &FilterSettings) {
        self.binding = FilterBinding::from(settings);
        log::debug!(
            "filter bound to channel {:?} on {} output",
            self.binding.channel,
            self.binding.output.name()
        );
    }

    pub fn binding(&self) -> &FilterBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut FilterBinding {
        &mut self.binding
    }

    /// Gain the next buffer will be scaled by.
    #[inline]
    pub fn gain(&self) -> f32 {
        compute_gain(&self.store, &self.binding)
    }

    /// Scales planar audio in place and hands the buffer back.
    pub fn process<'a, 'b>(
        &self,
        channels: &'a mut [&'b mut [f32]],
        frames: usize,
    ) -> &'a mut [&'b mut [f32]] {
        apply_gain(channels, frames, self.gain());
        channels
    }

    /// Scales interleaved audio in place.
    pub fn process_interleaved<'a>(&self, samples: &'a mut [f32]) -> &'a mut [f32] {
        apply_gain_interleaved(samples, self.gain());
        samples
    }
}
