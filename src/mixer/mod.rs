pub mod output;
pub mod store;

pub use output::OutputId;
pub use store::{ChannelState, LevelState, MixerStore, OutputState};
