use tracing::{info, warn};

use crate::config::ConfigStore;
use crate::constants::audio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerLayout {
    Stereo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub samples_per_sec: u32,
    pub speakers: SpeakerLayout,
}

impl AudioInfo {
    /// Sample rate from the profile; the channel layout is always stereo
    pub fn from_config(profile: &ConfigStore) -> Self {
        Self {
            samples_per_sec: profile
                .get_uint("Audio", "SampleRate")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            speakers: SpeakerLayout::Stereo,
        }
    }
}

pub trait AudioPipeline {
    fn reset_audio(&mut self, info: &AudioInfo) -> bool;

    fn monitoring_available(&self) -> bool {
        false
    }

    fn set_monitoring_device(&mut self, _name: &str, _id: &str) -> bool {
        false
    }
}

/// Apply the profile's audio settings. Either fully succeeds or fails.
pub fn reset_audio(profile: &ConfigStore, pipeline: &mut dyn AudioPipeline) -> bool {
    let info = AudioInfo::from_config(profile);
    let ok = pipeline.reset_audio(&info);
    if ok {
        info!(sample_rate = info.samples_per_sec, speakers = ?info.speakers, "Audio reset");
    } else {
        warn!(sample_rate = info.samples_per_sec, "Audio reset failed");
    }
    ok
}

/// Point audio monitoring at the profile's device, when the backend supports it
pub fn apply_monitoring_device(profile: &ConfigStore, pipeline: &mut dyn AudioPipeline) {
    if !pipeline.monitoring_available() {
        return;
    }
    let name = profile.get_str("Audio", "MonitoringDeviceName").unwrap_or("Default");
    let id = profile.get_str("Audio", "MonitoringDeviceId").unwrap_or("default");
    if pipeline.set_monitoring_device(name, id) {
        info!("Audio monitoring device:\n\tname: {name}\n\tid: {id}");
    } else {
        warn!(device = id, "Failed to set audio monitoring device");
    }
}

/// Audio backend that validates parameters without opening a device
#[derive(Debug, Default)]
pub struct HeadlessAudio {
    pub current: Option<AudioInfo>,
    pub monitoring_device: Option<(String, String)>,
}

impl HeadlessAudio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPipeline for HeadlessAudio {
    fn reset_audio(&mut self, info: &AudioInfo) -> bool {
        if !audio::SUPPORTED_SAMPLE_RATES.contains(&info.samples_per_sec) {
            return false;
        }
        self.current = Some(*info);
        true
    }

    fn monitoring_available(&self) -> bool {
        true
    }

    fn set_monitoring_device(&mut self, name: &str, id: &str) -> bool {
        self.monitoring_device = Some((name.to_string(), id.to_string()));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_audio_uses_profile_rate_and_stereo() {
        let profile = ConfigStore::parse("[Audio]\nSampleRate=44100\nChannelSetup=Mono\n");
        let mut pipeline = HeadlessAudio::new();

        assert!(reset_audio(&profile, &mut pipeline));
        assert_eq!(
            pipeline.current,
            Some(AudioInfo {
                samples_per_sec: 44100,
                speakers: SpeakerLayout::Stereo,
            })
        );
    }

    #[test]
    fn test_reset_audio_rejects_unsupported_rate() {
        let profile = ConfigStore::parse("[Audio]\nSampleRate=12345\n");
        let mut pipeline = HeadlessAudio::new();

        assert!(!reset_audio(&profile, &mut pipeline));
        assert!(pipeline.current.is_none());
    }

    #[test]
    fn test_reset_audio_missing_rate_fails() {
        let mut pipeline = HeadlessAudio::new();
        assert!(!reset_audio(&ConfigStore::new(), &mut pipeline));
    }

    #[test]
    fn test_monitoring_device_applied() {
        let profile =
            ConfigStore::parse("[Audio]\nMonitoringDeviceName=Headset\nMonitoringDeviceId=hw:1\n");
        let mut pipeline = HeadlessAudio::new();

        apply_monitoring_device(&profile, &mut pipeline);

        assert_eq!(
            pipeline.monitoring_device,
            Some(("Headset".to_string(), "hw:1".to_string()))
        );
    }
}
