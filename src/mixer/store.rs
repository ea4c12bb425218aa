//! Local mirror of Wave Link channel and output levels.
//!
//! The connection task is the only writer. The audio thread reads on every
//! buffer, so reads never allocate and never wait on anything longer than a
//! pointer swap. Each `(muted, volume)` pair is packed into a single
//! `AtomicU32`, which keeps the two fields consistent with each other.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::output::OutputId;

const MUTED_BIT: u32 = 1 << 31;
const VOLUME_MASK: u32 = 0xff;

/// Mute flag and fader percent of one channel or output on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelState {
    pub muted: bool,
    pub volume: u8,
}

/// State of a Wave Link output bus.
pub type OutputState = LevelState;

impl LevelState {
    /// Contribution that leaves the signal untouched.
    pub const NEUTRAL: LevelState = LevelState {
        muted: false,
        volume: 100,
    };

    pub fn new(muted: bool, volume: i64) -> Self {
        Self {
            muted,
            volume: clamp_volume(volume),
        }
    }

    fn pack(self) -> u32 {
        let muted = if self.muted { MUTED_BIT } else { 0 };
        muted | u32::from(self.volume)
    }

    fn unpack(bits: u32) -> Self {
        Self {
            muted: bits & MUTED_BIT != 0,
            volume: (bits & VOLUME_MASK) as u8,
        }
    }
}

/// Wave Link volumes are percentages; anything outside 0..=100 is clamped.
pub fn clamp_volume(volume: i64) -> u8 {
    volume.clamp(0, 100) as u8
}

#[derive(Debug, Default)]
struct AtomicLevel(AtomicU32);

impl AtomicLevel {
    fn new(level: LevelState) -> Self {
        Self(AtomicU32::new(level.pack()))
    }

    #[inline]
    fn load(&self) -> LevelState {
        LevelState::unpack(self.0.load(Ordering::Acquire))
    }

    /// Applies `f` atomically. Returns false if the value did not change.
    fn update(&self, f: impl Fn(LevelState) -> LevelState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let next = f(LevelState::unpack(bits)).pack();
                (next != bits).then_some(next)
            })
            .is_ok()
    }
}

/// A Wave Link input channel as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub identifier: String,
    pub name: String,
    /// Indexed by `OutputId::index()`.
    pub levels: [LevelState; 2],
}

impl ChannelState {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        local: LevelState,
        stream: LevelState,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            levels: [local, stream],
        }
    }

    /// Level on `output`; `Invalid` yields the neutral level.
    pub fn level(&self, output: OutputId) -> LevelState {
        output
            .index()
            .map_or(LevelState::NEUTRAL, |slot| self.levels[slot])
    }
}

struct ChannelEntry {
    name: RwLock<String>,
    levels: [AtomicLevel; 2],
}

impl ChannelEntry {
    fn from_state(state: &ChannelState) -> Self {
        Self {
            name: RwLock::new(state.name.clone()),
            levels: [
                AtomicLevel::new(state.levels[0]),
                AtomicLevel::new(state.levels[1]),
            ],
        }
    }

    fn to_state(&self, identifier: &str) -> ChannelState {
        ChannelState {
            identifier: identifier.to_string(),
            name: self.name.read().clone(),
            levels: [self.levels[0].load(), self.levels[1].load()],
        }
    }
}

type ChannelTable = HashMap<String, ChannelEntry>;

/// Mirrored Wave Link state shared between the connection task and the
/// filters.
pub struct MixerStore {
    /// Replaced wholesale by snapshots; entries are updated in place.
    channels: RwLock<Arc<ChannelTable>>,
    outputs: [AtomicLevel; 2],
}

impl Default for MixerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerStore {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(Arc::new(HashMap::new())),
            outputs: [AtomicLevel::default(), AtomicLevel::default()],
        }
    }

    // -------------------------------------------------------------------------
    // Channels
    // -------------------------------------------------------------------------

    /// Discards every known channel and installs `snapshot` in its place.
    ///
    /// The new table is built before the lock is taken, so readers see either
    /// the complete old set or the complete new one. Returns the number of
    /// channels installed.
    pub fn replace_channels<I>(&self, snapshot: I) -> usize
    where
        I: IntoIterator<Item = ChannelState>,
    {
        let table: ChannelTable = snapshot
            .into_iter()
            .map(|state| {
                let entry = ChannelEntry::from_state(&state);
                (state.identifier, entry)
            })
            .collect();
        let count = table.len();

        let previous = std::mem::replace(&mut *self.channels.write(), Arc::new(table));
        // Free the old table outside the lock.
        drop(previous);
        count
    }

    pub fn set_channel_volume(&self, identifier: &str, output: OutputId, volume: i64) -> bool {
        let volume = clamp_volume(volume);
        self.update_channel_level(identifier, output, |level| LevelState { volume, ..level })
    }

    pub fn set_channel_muted(&self, identifier: &str, output: OutputId, muted: bool) -> bool {
        self.update_channel_level(identifier, output, |level| LevelState { muted, ..level })
    }

    pub fn set_channel_name(&self, identifier: &str, name: &str) -> bool {
        let table = self.channels.read();
        let Some(entry) = table.get(identifier) else {
            return false;
        };
        let mut current = entry.name.write();
        if *current == name {
            return false;
        }
        *current = name.to_string();
        true
    }

    fn update_channel_level(
        &self,
        identifier: &str,
        output: OutputId,
        f: impl Fn(LevelState) -> LevelState,
    ) -> bool {
        let Some(slot) = output.index() else {
            return false;
        };
        let table = self.channels.read();
        match table.get(identifier) {
            Some(entry) => entry.levels[slot].update(f),
            None => false,
        }
    }

    /// Level of a known channel on a valid output. Never allocates.
    #[inline]
    pub fn channel_level(&self, identifier: &str, output: OutputId) -> Option<LevelState> {
        let slot = output.index()?;
        let table = self.channels.read();
        table.get(identifier).map(|entry| entry.levels[slot].load())
    }

    pub fn get_channel(&self, identifier: &str) -> Option<ChannelState> {
        let table = self.channels.read();
        table.get(identifier).map(|entry| entry.to_state(identifier))
    }

    /// All known channels, in no particular order.
    pub fn list_channels(&self) -> Vec<ChannelState> {
        let table = self.channels.read().clone();
        table
            .iter()
            .map(|(identifier, entry)| entry.to_state(identifier))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    // -------------------------------------------------------------------------
    // Outputs
    // -------------------------------------------------------------------------

    /// Current state of an output bus.
    ///
    /// Both buses exist from construction with the default level, so this
    /// never inserts. `Invalid` yields the neutral level.
    #[inline]
    pub fn get_or_create_output(&self, output: OutputId) -> OutputState {
        output
            .index()
            .map_or(LevelState::NEUTRAL, |slot| self.outputs[slot].load())
    }

    pub fn set_output_volume(&self, output: OutputId, volume: i64) -> bool {
        let volume = clamp_volume(volume);
        self.update_output(output, |level| LevelState { volume, ..level })
    }

    pub fn set_output_muted(&self, output: OutputId, muted: bool) -> bool {
        self.update_output(output, |level| LevelState { muted, ..level })
    }

    /// Replaces mute and volume of an output in one atomic store.
    pub fn set_output_level(&self, output: OutputId, level: LevelState) -> bool {
        self.update_output(output, |_| level)
    }

    fn update_output(&self, output: OutputId, f: impl Fn(LevelState) -> LevelState) -> bool {
        match output.index() {
            Some(slot) => self.outputs[slot].update(f),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> ChannelState {
        ChannelState::new(
            "ch1",
            "Game",
            LevelState::new(false, 60),
            LevelState::new(true, 30),
        )
    }

    fn music() -> ChannelState {
        ChannelState::new(
            "ch2",
            "Music",
            LevelState::new(false, 80),
            LevelState::new(false, 40),
        )
    }

    #[test]
    fn test_level_packing_keeps_both_fields() {
        let level = LevelState::new(true, 73);
        assert_eq!(LevelState::unpack(level.pack()), level);
        let level = LevelState::new(false, 0);
        assert_eq!(LevelState::unpack(level.pack()), level);
    }

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(LevelState::new(false, 250).volume, 100);
        assert_eq!(LevelState::new(false, -4).volume, 0);
    }

    #[test]
    fn test_replace_channels_installs_snapshot() {
        let store = MixerStore::new();
        assert_eq!(store.replace_channels([game(), music()]), 2);

        let ch = store.get_channel("ch1").unwrap();
        assert_eq!(ch.name, "Game");
        assert_eq!(ch.level(OutputId::Local), LevelState::new(false, 60));
        assert_eq!(ch.level(OutputId::Stream), LevelState::new(true, 30));
        assert_eq!(store.channel_count(), 2);
    }

    #[test]
    fn test_replace_channels_drops_missing_channels() {
        let store = MixerStore::new();
        store.replace_channels([game(), music()]);
        store.replace_channels([music()]);

        assert!(store.get_channel("ch1").is_none());
        assert!(store.get_channel("ch2").is_some());
        assert_eq!(store.list_channels().len(), 1);
    }

    #[test]
    fn test_point_updates_on_known_channel() {
        let store = MixerStore::new();
        store.replace_channels([game()]);

        assert!(store.set_channel_volume("ch1", OutputId::Local, 25));
        assert!(store.set_channel_muted("ch1", OutputId::Local, true));
        assert_eq!(
            store.channel_level("ch1", OutputId::Local),
            Some(LevelState::new(true, 25))
        );
        // Stream level untouched
        assert_eq!(
            store.channel_level("ch1", OutputId::Stream),
            Some(LevelState::new(true, 30))
        );
    }

    #[test]
    fn test_repeated_update_reports_no_change() {
        let store = MixerStore::new();
        store.replace_channels([game()]);
        assert!(!store.set_channel_volume("ch1", OutputId::Local, 60));
        assert!(!store.set_channel_name("ch1", "Game"));
    }

    #[test]
    fn test_unknown_channel_updates_are_dropped() {
        let store = MixerStore::new();
        store.replace_channels([game()]);
        let before = store.list_channels();

        assert!(!store.set_channel_volume("nope", OutputId::Local, 10));
        assert!(!store.set_channel_muted("nope", OutputId::Stream, true));
        assert!(!store.set_channel_name("nope", "Ghost"));

        assert_eq!(store.list_channels(), before);
        assert!(store.get_channel("nope").is_none());
    }

    #[test]
    fn test_invalid_output_is_never_stored() {
        let store = MixerStore::new();
        store.replace_channels([game()]);

        assert!(!store.set_channel_volume("ch1", OutputId::Invalid, 5));
        assert!(!store.set_output_volume(OutputId::Invalid, 5));
        assert!(!store.set_output_muted(OutputId::Invalid, true));

        assert_eq!(store.channel_level("ch1", OutputId::Invalid), None);
        assert_eq!(
            store.get_or_create_output(OutputId::Invalid),
            LevelState::NEUTRAL
        );
        assert_eq!(store.get_channel("ch1").unwrap(), game());
    }

    #[test]
    fn test_outputs_start_at_default() {
        let store = MixerStore::new();
        for output in OutputId::VALID {
            assert_eq!(store.get_or_create_output(output), LevelState::default());
        }
    }

    #[test]
    fn test_output_updates() {
        let store = MixerStore::new();
        assert!(store.set_output_volume(OutputId::Stream, 45));
        assert!(store.set_output_muted(OutputId::Stream, true));
        assert_eq!(
            store.get_or_create_output(OutputId::Stream),
            LevelState::new(true, 45)
        );
        assert_eq!(
            store.get_or_create_output(OutputId::Local),
            LevelState::default()
        );
    }

    #[test]
    fn test_rename_channel() {
        let store = MixerStore::new();
        store.replace_channels([game()]);
        assert!(store.set_channel_name("ch1", "Games"));
        assert_eq!(store.get_channel("ch1").unwrap().name, "Games");
    }

    #[test]
    fn test_replace_is_atomic_for_readers() {
        let store = MixerStore::new();
        let old: Vec<ChannelState> = (0..16)
            .map(|i| {
                ChannelState::new(
                    format!("old{i}"),
                    "old",
                    LevelState::default(),
                    LevelState::default(),
                )
            })
            .collect();
        let new: Vec<ChannelState> = (0..16)
            .map(|i| {
                ChannelState::new(
                    format!("new{i}"),
                    "new",
                    LevelState::default(),
                    LevelState::default(),
                )
            })
            .collect();
        store.replace_channels(old.clone());

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..500 {
                    if i % 2 == 0 {
                        store.replace_channels(new.clone());
                    } else {
                        store.replace_channels(old.clone());
                    }
                }
            });
            s.spawn(|| {
                for _ in 0..500 {
                    let listed = store.list_channels();
                    assert_eq!(listed.len(), 16);
                    let olds = listed.iter().filter(|c| c.name == "old").count();
                    assert!(olds == 0 || olds == 16, "observed a mixed channel set");
                }
            });
        });
    }

    #[test]
    fn test_output_level_is_written_as_one_unit() {
        let store = MixerStore::new();
        let loud = LevelState::new(true, 80);
        let quiet = LevelState::new(false, 20);
        assert!(store.set_output_level(OutputId::Local, loud));
        assert!(!store.set_output_level(OutputId::Local, loud));
        assert!(!store.set_output_level(OutputId::Invalid, quiet));

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..20_000 {
                    let level = if i % 2 == 0 { quiet } else { loud };
                    store.set_output_level(OutputId::Local, level);
                }
            });
            s.spawn(|| {
                for _ in 0..20_000 {
                    let seen = store.get_or_create_output(OutputId::Local);
                    assert!(seen == loud || seen == quiet, "torn output level {seen:?}");
                }
            });
        });
    }
}
