//! One-way upgrades of profile configuration written by older versions
//!
//! Each rule inspects the store and returns the edits it wants to make, or
//! `None` when there is nothing to migrate. Rules never fail: a legacy value
//! that cannot be parsed simply means the rule does not fire.

use tracing::{debug, info};

use super::LegacyFlags;
use super::store::{ConfigStore, ConfigValue, parse_bool};
use crate::subsystems::video::ScaleType;

/// A single change requested by a rule
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Set {
        section: &'static str,
        key: &'static str,
        value: ConfigValue,
    },
    Remove {
        section: &'static str,
        key: &'static str,
    },
}

impl Edit {
    fn set(section: &'static str, key: &'static str, value: impl Into<ConfigValue>) -> Self {
        Edit::Set {
            section,
            key,
            value: value.into(),
        }
    }

    fn apply(self, store: &mut ConfigStore) {
        match self {
            Edit::Set {
                section,
                key,
                value,
            } => store.set(section, key, value),
            Edit::Remove { section, key } => {
                store.remove(section, key);
            }
        }
    }
}

/// Computes edits from the current store state. Must be a pure function.
pub type RulePlan = fn(&ConfigStore, &LegacyFlags) -> Option<Vec<Edit>>;

#[derive(Clone, Copy)]
pub struct MigrationRule {
    pub name: &'static str,
    pub plan: RulePlan,
}

/// Applies the declared rules in order against a store
pub struct MigrationEngine {
    rules: Vec<MigrationRule>,
    legacy: LegacyFlags,
}

impl MigrationEngine {
    pub fn new(legacy: LegacyFlags) -> Self {
        Self::with_rules(builtin_rules(), legacy)
    }

    pub fn with_rules(rules: Vec<MigrationRule>, legacy: LegacyFlags) -> Self {
        Self { rules, legacy }
    }

    /// Run every rule once, in order. Later rules see earlier rules' edits.
    /// Returns true when any rule fired; the caller is responsible for saving.
    pub fn migrate(&self, store: &mut ConfigStore) -> bool {
        let mut changed = false;
        for rule in &self.rules {
            match (rule.plan)(store, &self.legacy) {
                Some(edits) if !edits.is_empty() => {
                    info!(rule = rule.name, edits = edits.len(), "Applied config migration");
                    for edit in edits {
                        edit.apply(store);
                    }
                    changed = true;
                }
                _ => debug!(rule = rule.name, "Migration not applicable"),
            }
        }
        changed
    }
}

/// The rule list in its fixed order
pub fn builtin_rules() -> Vec<MigrationRule> {
    vec![
        MigrationRule {
            name: "ffmpeg-audio-track-to-mixes",
            plan: ffmpeg_audio_track,
        },
        MigrationRule {
            name: "rec-track-index-to-tracks",
            plan: rec_track_index,
        },
        MigrationRule {
            name: "twitch-addon-choice",
            plan: twitch_addon_choice,
        },
        MigrationRule {
            name: "enforce-bitrate-to-ignore-recommended",
            plan: enforce_bitrate,
        },
        MigrationRule {
            name: "retry-delay-floor",
            plan: retry_delay_floor,
        },
        MigrationRule {
            name: "adv-out-rec-format",
            plan: |store, _| rec_format(store, "AdvOut"),
        },
        MigrationRule {
            name: "simple-output-rec-format",
            plan: |store, _| rec_format(store, "SimpleOutput"),
        },
        MigrationRule {
            name: "stream-rescale-filter",
            plan: |store, _| rescale_filter(store, "Rescale", "RescaleFilter"),
        },
        MigrationRule {
            name: "rec-rescale-filter",
            plan: |store, _| rescale_filter(store, "RecRescale", "RecRescaleFilter"),
        },
    ]
}

/// 1-based track number to a single-bit mask; anything outside 1..=64 is malformed
fn track_mask(raw: &str) -> Option<u64> {
    let track: u32 = raw.trim().parse().ok()?;
    (1..=64).contains(&track).then(|| 1u64 << (track - 1))
}

fn ffmpeg_audio_track(store: &ConfigStore, _: &LegacyFlags) -> Option<Vec<Edit>> {
    if store.has_user_value("AdvOut", "Pre22.1Settings") {
        return None;
    }
    let mask = track_mask(store.user_value("AdvOut", "FFAudioTrack")?)?;
    Some(vec![
        Edit::set("AdvOut", "FFAudioMixes", mask),
        Edit::set("AdvOut", "Pre22.1Settings", true),
    ])
}

fn rec_track_index(store: &ConfigStore, _: &LegacyFlags) -> Option<Vec<Edit>> {
    if store.has_user_value("AdvOut", "RecTracks") {
        return None;
    }
    let mask = track_mask(store.user_value("AdvOut", "RecTrackIndex")?)?;
    Some(vec![
        Edit::set("AdvOut", "RecTracks", mask),
        Edit::Remove {
            section: "AdvOut",
            key: "RecTrackIndex",
        },
    ])
}

fn twitch_addon_choice(store: &ConfigStore, legacy: &LegacyFlags) -> Option<Vec<Edit>> {
    if !legacy.pre24_1_defaults || store.has_user_value("Twitch", "AddonChoice") {
        return None;
    }
    // 3 = both chat extensions
    Some(vec![Edit::set("Twitch", "AddonChoice", 3i64)])
}

fn enforce_bitrate(store: &ConfigStore, _: &LegacyFlags) -> Option<Vec<Edit>> {
    if store.has_user_value("Stream1", "IgnoreRecommended")
        || store.has_user_value("Stream1", "MovedOldEnforce")
    {
        return None;
    }
    let enforce = parse_bool(store.user_value("SimpleOutput", "EnforceBitrate")?)?;
    Some(vec![
        Edit::set("Stream1", "IgnoreRecommended", !enforce),
        Edit::set("Stream1", "MovedOldEnforce", true),
    ])
}

fn retry_delay_floor(store: &ConfigStore, _: &LegacyFlags) -> Option<Vec<Edit>> {
    let delay: i64 = store.user_value("Output", "RetryDelay")?.trim().parse().ok()?;
    (delay < 1).then(|| vec![Edit::set("Output", "RetryDelay", 1u64)])
}

fn canonical_format(token: &str) -> &str {
    match token {
        "ts" => "mpegts",
        "m3u8" => "hls",
        "fmp4" => "fragmented_mp4",
        "fmov" => "fragmented_mov",
        other => other,
    }
}

fn rec_format(store: &ConfigStore, section: &'static str) -> Option<Vec<Edit>> {
    let has_new = store.has_user_value(section, "RecFormat2");
    let key = if has_new { "RecFormat2" } else { "RecFormat" };
    let current = store.user_value(section, key)?.trim();
    if current.is_empty() {
        return None;
    }

    let canonical = canonical_format(current);
    (canonical != current || !has_new)
        .then(|| vec![Edit::set(section, "RecFormat2", canonical)])
}

fn rescale_filter(
    store: &ConfigStore,
    flag_key: &'static str,
    filter_key: &'static str,
) -> Option<Vec<Edit>> {
    if store.has_user_value("AdvOut", filter_key) {
        return None;
    }
    let enabled = parse_bool(store.user_value("AdvOut", flag_key)?)?;
    enabled.then(|| vec![Edit::set("AdvOut", filter_key, ScaleType::Bilinear as i64)])
}
