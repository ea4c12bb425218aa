//! Routing of Wave Link frames into the mixer store.
//!
//! The dispatcher remembers the correlation id of the latest query of each
//! kind and routes responses by id. It performs no I/O; any follow-up query
//! it decides on is returned to the connection loop for sending.

use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::protocol::{
    decode_input_configs, decode_output_config, Incoming, Notification, RpcRequest,
    METHOD_GET_INPUT_CONFIGS, METHOD_GET_OUTPUT_CONFIG,
};
use crate::mixer::{ChannelState, MixerStore, OutputId};

/// Source of request correlation ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> i64;
}

/// Process-local counter.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    pub const DEFAULT_FIRST_ID: i64 = 1000;

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(Self::DEFAULT_FIRST_ID)
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    ListChannels,
    GetOutputs,
}

impl QueryKind {
    pub fn method(self) -> &'static str {
        match self {
            QueryKind::ListChannels => METHOD_GET_INPUT_CONFIGS,
            QueryKind::GetOutputs => METHOD_GET_OUTPUT_CONFIG,
        }
    }
}

/// A query that has been assigned an id and must be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub kind: QueryKind,
    pub id: i64,
}

impl Query {
    pub fn request(&self) -> RpcRequest<'static> {
        RpcRequest::new(self.kind.method(), self.id)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        self.request().encode()
    }
}

pub struct Dispatcher {
    store: Arc<MixerStore>,
    ids: Arc<dyn IdSource>,
    list_channels_id: Option<i64>,
    get_outputs_id: Option<i64>,
}

impl Dispatcher {
    pub fn new(store: Arc<MixerStore>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            store,
            ids,
            list_channels_id: None,
            get_outputs_id: None,
        }
    }

    /// Issues a query of `kind` with a fresh id, superseding any earlier one.
    pub fn query(&mut self, kind: QueryKind) -> Query {
        let id = self.ids.next_id();
        match kind {
            QueryKind::ListChannels => self.list_channels_id = Some(id),
            QueryKind::GetOutputs => self.get_outputs_id = Some(id),
        }
        Query { kind, id }
    }

    /// Queries sent as soon as the connection opens.
    pub fn bootstrap(&mut self) -> [Query; 2] {
        [
            self.query(QueryKind::ListChannels),
            self.query(QueryKind::GetOutputs),
        ]
    }

    /// Handles one text frame. Returns a query to send, if the frame calls for
    /// one. Frames that do not parse are dropped.
    pub fn handle_text(&mut self, text: &str) -> Option<Query> {
        match serde_json::from_str::<Value>(text) {
            Ok(frame) => self.handle_frame(&frame),
            Err(err) => {
                log::debug!("dropping non-JSON frame: {}", err);
                None
            }
        }
    }

    pub fn handle_frame(&mut self, frame: &Value) -> Option<Query> {
        match Incoming::classify(frame)? {
            Incoming::Response { id, result } => {
                self.handle_response(id, result);
                None
            }
            Incoming::Notification { method, params } => {
                let Some(notification) = Notification::decode(method, params) else {
                    log::trace!("ignoring notification {}", method);
                    return None;
                };
                self.handle_notification(notification)
            }
        }
    }

    fn handle_response(&mut self, id: i64, result: &Value) {
        if Some(id) == self.list_channels_id {
            let Some(configs) = decode_input_configs(result) else {
                log::debug!("getInputConfigs result is not a list");
                return;
            };
            let count = self
                .store
                .replace_channels(configs.into_iter().map(ChannelState::from));
            log::info!("Wave Link reported {} channels", count);
        } else if Some(id) == self.get_outputs_id {
            let Some(config) = decode_output_config(result) else {
                log::debug!("incomplete getOutputConfig result");
                return;
            };
            for (output, level) in config.levels() {
                self.store.set_output_level(output, level);
                log::debug!(
                    "{} output: volume {}, {}",
                    output.name(),
                    level.volume,
                    if level.muted { "muted" } else { "unmuted" }
                );
            }
        } else {
            log::trace!("ignoring response to unknown request {}", id);
        }
    }

    fn handle_notification(&mut self, notification: Notification) -> Option<Query> {
        if notification.output() == Some(OutputId::Invalid) {
            return None;
        }

        match notification {
            Notification::InputsChanged => {
                log::debug!("channel list changed, requesting a new snapshot");
                return Some(self.query(QueryKind::ListChannels));
            }
            Notification::OutputVolumeChanged { output, volume } => {
                self.store.set_output_volume(output, volume);
                log::debug!("{} output volume {}", output.name(), volume);
            }
            Notification::OutputMuteChanged { output, muted } => {
                self.store.set_output_muted(output, muted);
                log::debug!("{} output muted: {}", output.name(), muted);
            }
            Notification::InputVolumeChanged {
                identifier,
                output,
                volume,
            } => {
                if self.store.set_channel_volume(&identifier, output, volume) {
                    log::debug!("{} on {}: volume {}", identifier, output.name(), volume);
                }
            }
            Notification::InputMuteChanged {
                identifier,
                output,
                muted,
            } => {
                if self.store.set_channel_muted(&identifier, output, muted) {
                    log::debug!("{} on {}: muted {}", identifier, output.name(), muted);
                }
            }
            Notification::InputNameChanged { identifier, name } => {
                if self.store.set_channel_name(&identifier, &name) {
                    log::debug!("{} renamed to {}", identifier, name);
                }
            }
        }
        None
    }
}
