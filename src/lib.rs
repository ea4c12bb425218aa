pub mod config;
pub mod dsp;
pub mod filter;
pub mod mixer;
pub mod wavelink;

pub use config::SyncConfig;
pub use filter::{ChannelSelection, FilterBinding, FilterInstance, FilterSettings};
pub use mixer::{ChannelState, LevelState, MixerStore, OutputId, OutputState};
pub use wavelink::{ConnectionState, SyncContext, WaveLinkClient};

use assert_no_alloc::permit_alloc;
use nih_plug::prelude::*;
use std::sync::{Arc, RwLock};

use crate::filter::{DEFAULT_MIXER_TYPE, NO_CHANNEL};

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum OutputSelector {
    #[name = "Monitor Mix"]
    Monitor,

    #[name = "Stream Mix"]
    Stream,
}

impl OutputSelector {
    /// Settings value of this selector: 1 = Monitor, 2 = Stream.
    pub fn mixer_type(self) -> i64 {
        match self {
            OutputSelector::Monitor => 1,
            OutputSelector::Stream => 2,
        }
    }

    pub fn output(self) -> OutputId {
        OutputId::from_selector(self.mixer_type())
    }

    fn from_mixer_type(mixer_type: i64) -> Self {
        if mixer_type == OutputSelector::Stream.mixer_type() {
            OutputSelector::Stream
        } else {
            OutputSelector::Monitor
        }
    }
}

/// The channels every Wave Link install provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum ChannelChoice {
    #[name = "None"]
    None,

    #[name = "Game"]
    Game,

    #[name = "Music"]
    Music,

    #[name = "Browser"]
    Browser,

    #[name = "Voice Chat"]
    VoiceChat,

    #[name = "System"]
    System,

    #[name = "SFX"]
    Sfx,

    #[name = "Aux 1"]
    Aux1,

    #[name = "Aux 2"]
    Aux2,
}

impl ChannelChoice {
    /// Wave Link channel identifier, or the no-channel sentinel.
    pub fn identifier(self) -> &'static str {
        match self {
            ChannelChoice::None => NO_CHANNEL,
            ChannelChoice::Game => "Wave Link Game",
            ChannelChoice::Music => "Wave Link Music",
            ChannelChoice::Browser => "Wave Link Browser",
            ChannelChoice::VoiceChat => "Wave Link Voice Chat",
            ChannelChoice::System => "Wave Link System",
            ChannelChoice::Sfx => "Wave Link SFX",
            ChannelChoice::Aux1 => "Wave Link Aux 1",
            ChannelChoice::Aux2 => "Wave Link Aux 2",
        }
    }
}

/// Channel a filter follows: a non-empty override wins over the selector.
fn effective_channel(choice: ChannelChoice, channel_override: &str) -> &str {
    if channel_override.is_empty() {
        choice.identifier()
    } else {
        channel_override
    }
}

#[derive(Params)]
pub struct WaveLinkParams {
    #[id = "channel"]
    pub channel: EnumParam<ChannelChoice>,

    #[id = "mixer_type"]
    pub mixer_type: EnumParam<OutputSelector>,

    #[id = "follow_channel_mute"]
    pub follow_channel_mute: BoolParam,

    #[id = "apply_mixer_volume"]
    pub apply_mixer_volume: BoolParam,

    #[id = "follow_mixer_mute"]
    pub follow_mixer_mute: BoolParam,

    /// Identifier of a channel outside the fixed list, such as a renamed or
    /// added input. Empty to use `channel`. Travels with the plugin state.
    #[persist = "channel_override"]
    pub channel_override: Arc<RwLock<String>>,
}

impl Default for WaveLinkParams {
    fn default() -> Self {
        let binding = FilterBinding::default();
        Self {
            channel: EnumParam::new("Channel", ChannelChoice::Music),
            mixer_type: EnumParam::new(
                "Mixer",
                OutputSelector::from_mixer_type(DEFAULT_MIXER_TYPE),
            ),
            follow_channel_mute: BoolParam::new("Follow Channel Mute", binding.follow_channel_mute),
            apply_mixer_volume: BoolParam::new("Apply Mixer Volume", binding.apply_output_volume),
            follow_mixer_mute: BoolParam::new("Follow Mixer Mute", binding.follow_output_mute),
            channel_override: Arc::new(RwLock::new(String::new())),
        }
    }
}

impl WaveLinkParams {
    /// Host-agnostic view of the current parameter values.
    pub fn settings(&self) -> FilterSettings {
        let choice = self.channel.value();
        let channel = match self.channel_override.read() {
            Ok(channel_override) => effective_channel(choice, &channel_override).to_string(),
            Err(poisoned) => effective_channel(choice, &poisoned.into_inner()).to_string(),
        };
        FilterSettings {
            channel,
            mixer_type: self.mixer_type.value().mixer_type(),
            follow_channel_mute: Some(self.follow_channel_mute.value()),
            apply_output_volume: Some(self.apply_mixer_volume.value()),
            follow_output_mute: Some(self.follow_mixer_mute.value()),
        }
    }
}

/// Copies parameter values into `binding`. Only allocates when the selected
/// channel no longer matches the bound one.
fn sync_binding(params: &WaveLinkParams, binding: &mut FilterBinding) {
    binding.output = params.mixer_type.value().output();
    binding.follow_channel_mute = params.follow_channel_mute.value();
    binding.apply_output_volume = params.apply_mixer_volume.value();
    binding.follow_output_mute = params.follow_mixer_mute.value();

    // A writer holding the lock just means the change lands next buffer
    if let Ok(channel_override) = params.channel_override.try_read() {
        let channel = effective_channel(params.channel.value(), &channel_override);
        if !binding.channel.matches(channel) {
            permit_alloc(|| binding.channel = ChannelSelection::parse(channel));
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN
// -----------------------------------------------------------------------------
pub struct WaveLinkSyncPlugin {
    params: Arc<WaveLinkParams>,
    context: Option<Arc<SyncContext>>,
    filter: Option<FilterInstance>,
}

impl Default for WaveLinkSyncPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(WaveLinkParams::default()),
            context: None,
            filter: None,
        }
    }
}

impl Plugin for WaveLinkSyncPlugin {
    const NAME: &'static str = "Wave Link Sync";
    const VENDOR: &'static str = "Wave Link Sync contributors";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        _buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        if self.context.is_none() {
            match SyncContext::shared() {
                Ok(context) => self.context = Some(context),
                // Audio still passes through untouched
                Err(err) => log::error!("Wave Link sync unavailable: {:#}", err),
            }
        }

        self.filter = self.context.as_ref().map(|context| {
            FilterInstance::new(Arc::clone(context.store()), &self.params.settings())
        });
        true
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let Some(filter) = self.filter.as_mut() else {
            return ProcessStatus::Normal;
        };

        sync_binding(&self.params, filter.binding_mut());
        let frames = buffer.samples();
        filter.process(buffer.as_slice(), frames);
        ProcessStatus::Normal
    }
}

impl ClapPlugin for WaveLinkSyncPlugin {
    const CLAP_ID: &'static str = "io.github.wavelink-sync";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Follows an Elgato Wave Link channel's volume and mute");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Utility,
        ClapFeature::Mono,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for WaveLinkSyncPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"WaveLinkSyncFlt1";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Tools];
}

nih_export_clap!(WaveLinkSyncPlugin);
nih_export_vst3!(WaveLinkSyncPlugin);
