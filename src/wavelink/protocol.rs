//! Wave Link JSON-RPC wire format.
//!
//! Wave Link speaks a JSON-RPC 2.0 dialect over a websocket. Only the two
//! configuration queries and the handful of notifications that affect volume
//! or mute are modelled. Anything that does not decode is dropped by the
//! caller.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::mixer::{ChannelState, LevelState, OutputId};

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_GET_INPUT_CONFIGS: &str = "getInputConfigs";
pub const METHOD_GET_OUTPUT_CONFIG: &str = "getOutputConfig";

pub const NOTIFY_INPUTS_CHANGED: &str = "inputsChanged";
pub const NOTIFY_OUTPUT_VOLUME_CHANGED: &str = "outputVolumeChanged";
pub const NOTIFY_OUTPUT_MUTE_CHANGED: &str = "outputMuteChanged";
pub const NOTIFY_INPUT_VOLUME_CHANGED: &str = "inputVolumeChanged";
pub const NOTIFY_INPUT_MUTE_CHANGED: &str = "inputMuteChanged";
pub const NOTIFY_INPUT_NAME_CHANGED: &str = "inputNameChanged";

/// Outgoing request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub id: i64,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, id: i64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            id,
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// `[muted, volume]` pair as sent by Wave Link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MixerLevel(pub bool, #[serde(deserialize_with = "volume")] pub i64);

/// Volumes are integer percents on the wire, but fractional ones are rounded
/// rather than rejected.
fn volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    f64::deserialize(deserializer).map(round_volume)
}

fn round_volume(value: f64) -> i64 {
    // Saturating; NaN becomes 0
    value.round() as i64
}

impl From<MixerLevel> for LevelState {
    fn from(level: MixerLevel) -> Self {
        LevelState::new(level.0, level.1)
    }
}

/// One entry of a `getInputConfigs` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    pub identifier: String,
    pub name: String,
    pub local_mixer: MixerLevel,
    pub stream_mixer: MixerLevel,
}

impl From<InputConfig> for ChannelState {
    fn from(input: InputConfig) -> Self {
        ChannelState::new(
            input.identifier,
            input.name,
            input.local_mixer.into(),
            input.stream_mixer.into(),
        )
    }
}

/// Result of `getOutputConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub local_mixer: MixerLevel,
    pub stream_mixer: MixerLevel,
}

impl OutputConfig {
    pub fn levels(&self) -> [(OutputId, LevelState); 2] {
        [
            (OutputId::Local, self.local_mixer.into()),
            (OutputId::Stream, self.stream_mixer.into()),
        ]
    }
}

/// Decodes a `getInputConfigs` result. Entries missing any field are skipped
/// on their own; a result that is not an array yields `None`.
pub fn decode_input_configs(result: &Value) -> Option<Vec<InputConfig>> {
    let entries = result.as_array()?;
    let configs = entries
        .iter()
        .filter_map(|entry| match InputConfig::deserialize(entry) {
            Ok(config) => Some(config),
            Err(err) => {
                log::trace!("skipping incomplete input config: {}", err);
                None
            }
        })
        .collect();
    Some(configs)
}

pub fn decode_output_config(result: &Value) -> Option<OutputConfig> {
    OutputConfig::deserialize(result).ok()
}

#[derive(Deserialize)]
struct OutputParams<T> {
    #[serde(rename = "mixerID")]
    mixer_id: String,
    value: T,
}

#[derive(Deserialize)]
struct InputParams<T> {
    #[serde(rename = "mixerID")]
    mixer_id: String,
    identifier: String,
    value: T,
}

#[derive(Deserialize)]
struct InputNameParams {
    identifier: String,
    value: String,
}

/// Push notification from Wave Link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    InputsChanged,
    OutputVolumeChanged {
        output: OutputId,
        volume: i64,
    },
    OutputMuteChanged {
        output: OutputId,
        muted: bool,
    },
    InputVolumeChanged {
        identifier: String,
        output: OutputId,
        volume: i64,
    },
    InputMuteChanged {
        identifier: String,
        output: OutputId,
        muted: bool,
    },
    InputNameChanged {
        identifier: String,
        name: String,
    },
}

impl Notification {
    /// Decodes a notification. Returns `None` for methods this crate does not
    /// track and for parameters that are missing or of the wrong type.
    ///
    /// Routes are resolved but not filtered here; an `Invalid` output is left
    /// for the caller to drop.
    pub fn decode(method: &str, params: Option<&Value>) -> Option<Self> {
        if method == NOTIFY_INPUTS_CHANGED {
            return Some(Notification::InputsChanged);
        }

        let params = params?;
        let notification = match method {
            NOTIFY_OUTPUT_VOLUME_CHANGED => {
                let p = OutputParams::<f64>::deserialize(params).ok()?;
                Notification::OutputVolumeChanged {
                    output: OutputId::from_mixer_id(&p.mixer_id),
                    volume: round_volume(p.value),
                }
            }
            NOTIFY_OUTPUT_MUTE_CHANGED => {
                let p = OutputParams::<bool>::deserialize(params).ok()?;
                Notification::OutputMuteChanged {
                    output: OutputId::from_mixer_id(&p.mixer_id),
                    muted: p.value,
                }
            }
            NOTIFY_INPUT_VOLUME_CHANGED => {
                let p = InputParams::<f64>::deserialize(params).ok()?;
                Notification::InputVolumeChanged {
                    identifier: p.identifier,
                    output: OutputId::from_mixer_id(&p.mixer_id),
                    volume: round_volume(p.value),
                }
            }
            NOTIFY_INPUT_MUTE_CHANGED => {
                let p = InputParams::<bool>::deserialize(params).ok()?;
                Notification::InputMuteChanged {
                    identifier: p.identifier,
                    output: OutputId::from_mixer_id(&p.mixer_id),
                    muted: p.value,
                }
            }
            NOTIFY_INPUT_NAME_CHANGED => {
                let p = InputNameParams::deserialize(params).ok()?;
                Notification::InputNameChanged {
                    identifier: p.identifier,
                    name: p.value,
                }
            }
            _ => return None,
        };
        Some(notification)
    }

    /// Output the notification is scoped to, if any.
    pub fn output(&self) -> Option<OutputId> {
        match self {
            Notification::OutputVolumeChanged { output, .. }
            | Notification::OutputMuteChanged { output, .. }
            | Notification::InputVolumeChanged { output, .. }
            | Notification::InputMuteChanged { output, .. } => Some(*output),
            Notification::InputsChanged | Notification::InputNameChanged { .. } => None,
        }
    }
}

/// Shape of an incoming frame, before its payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Incoming<'a> {
    Response { id: i64, result: &'a Value },
    Notification { method: &'a str, params: Option<&'a Value> },
}

impl<'a> Incoming<'a> {
    /// Classifies a frame. A `null` id counts as absent. Frames that are
    /// neither a response nor a notification yield `None`.
    pub fn classify(frame: &'a Value) -> Option<Self> {
        let id = frame.get("id").filter(|id| !id.is_null());
        let result = frame.get("result");

        if let (Some(id), Some(result)) = (id, result) {
            return Some(Incoming::Response {
                id: id.as_i64()?,
                result,
            });
        }

        if id.is_none() {
            let method = frame.get("method")?.as_str()?;
            return Some(Incoming::Notification {
                method,
                params: frame.get("params"),
            });
        }

        None
    }
}
