pub const LOCAL_MIXER_ID: &str = "com.elgato.mix.local";
pub const STREAM_MIXER_ID: &str = "com.elgato.mix.stream";
/// Microphone effects bus. Wave Link reports it like a mix, but it never
/// carries a filter's signal so its events are ignored.
pub const MICROPHONE_FX_MIXER_ID: &str = "com.elgato.mix.microphoneFX";

/// A Wave Link output bus.
///
/// `Invalid` stands for "no bus" and is never used as a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputId {
    #[default]
    Invalid,
    Local,
    Stream,
}

impl OutputId {
    pub const VALID: [OutputId; 2] = [OutputId::Local, OutputId::Stream];

    /// Resolves a `mixerID` route string.
    pub fn from_mixer_id(mixer_id: &str) -> Self {
        match mixer_id {
            LOCAL_MIXER_ID => OutputId::Local,
            STREAM_MIXER_ID => OutputId::Stream,
            // MICROPHONE_FX_MIXER_ID and anything unknown
            _ => OutputId::Invalid,
        }
    }

    /// Resolves the host's integer output selector (1 = Local, 2 = Stream).
    pub fn from_selector(selector: i64) -> Self {
        match selector {
            1 => OutputId::Local,
            2 => OutputId::Stream,
            _ => OutputId::Invalid,
        }
    }

    /// Slot in per-output storage, `None` for `Invalid`.
    #[inline]
    pub fn index(self) -> Option<usize> {
        match self {
            OutputId::Invalid => None,
            OutputId::Local => Some(0),
            OutputId::Stream => Some(1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputId::Invalid => "invalid",
            OutputId::Local => "local",
            OutputId::Stream => "stream",
        }
    }
}
