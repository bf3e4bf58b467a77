//! Startup sequencer
//!
//! Runs every stage once, in order, from "process started" to "UI visible":
//!
//! ConfigLoaded → DefaultsInstalled → AudioReady → VideoReady → ModulesLoaded
//! → ProfileActive → CollectionActive → UiVisible
//!
//! The first fatal failure aborts the pass; nothing is rolled back and the
//! process is expected to exit. Module load failures are collected and
//! reported instead.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigStore, DefaultsInstaller, LegacyFlags, MigrationEngine};
use crate::constants::config::USER_FILENAME;
use crate::constants::log::STARTUP_SEPARATOR;
use crate::events::{EventBus, LifecycleEvent};
use crate::modules::{
    ModuleClassification, ModuleLoadReport, ModuleLoader, ModuleSearchPath,
    extra_module_paths_from_env,
};
use crate::paths::AppPaths;
use crate::probe::{CapabilityProbe, log_encoders};
use crate::registry::{
    ActiveProfile, CreationNotifications, ProfileRegistry, RegistryError,
    SceneCollectionRegistry, announce_activation, resolve,
};
use crate::service::{ServiceConfig, init_service};
use crate::session::SessionState;
use crate::subsystems::{
    AudioPipeline, InitResult, VideoPipeline, apply_monitoring_device, reset_audio, reset_video,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    ConfigLoaded,
    DefaultsInstalled,
    AudioReady,
    VideoReady,
    ModulesLoaded,
    ProfileActive,
    CollectionActive,
    UiVisible,
}

impl Stage {
    pub const FIRST: Stage = Stage::ConfigLoaded;

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::ConfigLoaded => Some(Stage::DefaultsInstalled),
            Stage::DefaultsInstalled => Some(Stage::AudioReady),
            Stage::AudioReady => Some(Stage::VideoReady),
            Stage::VideoReady => Some(Stage::ModulesLoaded),
            Stage::ModulesLoaded => Some(Stage::ProfileActive),
            Stage::ProfileActive => Some(Stage::CollectionActive),
            Stage::CollectionActive => Some(Stage::UiVisible),
            Stage::UiVisible => None,
        }
    }
}

/// Fatal startup failures. Each carries the message shown to the user.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Core module list is missing or empty: {0}")]
    ModuleClassification(String),

    #[error("Failed to load basic.ini: {0}")]
    ConfigLoad(String),

    #[error("There appears to be no monitors.  Er, this technically shouldn't be possible.")]
    NoDisplay,

    #[error("Failed to initialize audio")]
    AudioReset,

    #[error("Failed to initialize video:  Graphics module not found")]
    VideoModuleNotFound,

    #[error(
        "Failed to initialize video:\n\nRequired graphics API functionality not found.  Your GPU may not be supported."
    )]
    VideoNotSupported,

    #[error("Failed to initialize video:  Invalid parameters")]
    VideoInvalidParam,

    #[error(
        "Failed to initialize video.  Your GPU may not be supported, or your graphics drivers may need to be updated. ({0:?})"
    )]
    VideoUnknown(InitResult),

    #[error("Failed to initialize service: {0}")]
    ServiceInit(String),

    #[error("Failed to open scene collections: {0}")]
    CollectionStorage(#[source] RegistryError),
}

impl BootstrapError {
    /// Process exit status, distinct per failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::ModuleClassification(_) => 2,
            BootstrapError::ConfigLoad(_) => 3,
            BootstrapError::NoDisplay => 4,
            BootstrapError::AudioReset => 5,
            BootstrapError::VideoModuleNotFound
            | BootstrapError::VideoNotSupported
            | BootstrapError::VideoInvalidParam
            | BootstrapError::VideoUnknown(_) => 6,
            BootstrapError::ServiceInit(_) => 7,
            BootstrapError::CollectionStorage(_) => 8,
        }
    }

    fn from_video_result(result: InitResult) -> Option<Self> {
        match result {
            InitResult::Success => None,
            InitResult::ModuleNotFound => Some(BootstrapError::VideoModuleNotFound),
            InitResult::NotSupported => Some(BootstrapError::VideoNotSupported),
            InitResult::InvalidParam => Some(BootstrapError::VideoInvalidParam),
            other => Some(BootstrapError::VideoUnknown(other)),
        }
    }
}

fn config_load_err(e: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::ConfigLoad(e.to_string())
}

/// Command-line overrides consumed by bootstrap
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub profile: Option<String>,
    pub collection: Option<String>,
    pub safe_mode: bool,
    pub disable_third_party: bool,
    pub creation_notifications: CreationNotifications,
}

/// External systems bootstrap drives
pub struct Collaborators<'a> {
    pub probe: &'a dyn CapabilityProbe,
    pub video: &'a mut dyn VideoPipeline,
    pub audio: &'a mut dyn AudioPipeline,
    pub loader: &'a mut dyn ModuleLoader,
    pub events: &'a mut EventBus,
}

#[derive(Debug)]
pub struct BootstrapOutcome {
    pub session: SessionState,
    pub modules: ModuleLoadReport,
    pub service: ServiceConfig,
    /// First launch with no previous version: offer the auto-configuration wizard
    pub should_run_auto_config: bool,
}

impl BootstrapOutcome {
    pub fn failed_modules(&self) -> &[String] {
        &self.session.failed_modules
    }
}

/// Profile resolved during config load, waiting for its activation stage
struct PendingProfile {
    profile: ActiveProfile,
    created: bool,
}

pub struct Bootstrap<'a> {
    paths: &'a AppPaths,
    options: StartupOptions,
    classification: ModuleClassification,
}

impl<'a> Bootstrap<'a> {
    /// Checks the build-time module classification once, up front
    pub fn new(paths: &'a AppPaths, options: StartupOptions) -> Result<Self, BootstrapError> {
        let classification = ModuleClassification::from_build_config()?;
        Ok(Self::with_classification(paths, options, classification))
    }

    pub fn with_classification(
        paths: &'a AppPaths,
        options: StartupOptions,
        classification: ModuleClassification,
    ) -> Self {
        Self {
            paths,
            options,
            classification,
        }
    }

    pub fn run(&self, c: Collaborators<'_>) -> Result<BootstrapOutcome, BootstrapError> {
        let mut reached = None;
        let result = self.run_stages(c, &mut reached);
        if let Err(e) = &result {
            error!(error = %e, last_stage = ?reached, exit_code = e.exit_code(), "Bootstrap failed");
        }
        result
    }

    fn run_stages(
        &self,
        c: Collaborators<'_>,
        stage: &mut Option<Stage>,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let (mut session, mut pending, legacy) = self.load_config()?;
        enter(stage, Stage::ConfigLoaded);

        self.install_defaults(&mut pending.profile, legacy, c.probe)?;
        enter(stage, Stage::DefaultsInstalled);

        if !reset_audio(&pending.profile.config, c.audio) {
            return Err(BootstrapError::AudioReset);
        }
        enter(stage, Stage::AudioReady);

        let result = reset_video(&pending.profile.config, &session.user_config, c.video, c.events);
        if let Some(e) = BootstrapError::from_video_result(result) {
            return Err(e);
        }
        apply_monitoring_device(&pending.profile.config, c.audio);
        enter(stage, Stage::VideoReady);

        let modules = self.load_modules(c.loader);
        session.failed_modules = modules.failed.clone();
        log_encoders(c.probe);
        info!("{STARTUP_SEPARATOR}");
        enter(stage, Stage::ModulesLoaded);

        let service = self.activate_profile(&mut session, pending, &modules, c.events)?;
        enter(stage, Stage::ProfileActive);

        self.activate_collection(&mut session, c.events)?;
        enter(stage, Stage::CollectionActive);

        let should_run_auto_config = finish_loading(&mut session, c.video, c.events);
        enter(stage, Stage::UiVisible);

        Ok(BootstrapOutcome {
            session,
            modules,
            service,
            should_run_auto_config,
        })
    }

    /// Load the user config, resolve the profile and bring its config up to date
    fn load_config(&self) -> Result<(SessionState, PendingProfile, LegacyFlags), BootstrapError> {
        let user_path = self.paths.config_root.join(USER_FILENAME);
        let user_config = ConfigStore::load(&user_path).map_err(|e| config_load_err(format!("{e:#}")))?;
        let session = SessionState::new(user_config);
        let legacy = LegacyFlags::from_user_config(&session.user_config);

        let mut registry =
            ProfileRegistry::open(&self.paths.config_root).map_err(config_load_err)?;
        let resolved = resolve(
            &mut registry,
            self.options.profile.as_deref(),
            &session.persisted_profile(),
        )
        .map_err(config_load_err)?;
        let mut profile = registry
            .activate(&resolved.entry)
            .map_err(config_load_err)?;

        if MigrationEngine::new(legacy).migrate(&mut profile.config) {
            profile
                .config
                .save_safe()
                .map_err(|e| config_load_err(format!("{e:#}")))?;
        }

        Ok((
            session,
            PendingProfile {
                profile,
                created: resolved.created,
            },
            legacy,
        ))
    }

    fn install_defaults(
        &self,
        profile: &mut ActiveProfile,
        legacy: LegacyFlags,
        probe: &dyn CapabilityProbe,
    ) -> Result<(), BootstrapError> {
        let installer = DefaultsInstaller::new(
            legacy,
            self.paths.recording_path.to_string_lossy(),
        );
        let report = installer.install(&mut profile.config, probe).map_err(|e| {
            warn!(error = %e, "Defaults installation failed");
            BootstrapError::NoDisplay
        })?;

        if report.pinned {
            profile
                .config
                .save_safe()
                .map_err(|e| config_load_err(format!("{e:#}")))?;
        }
        Ok(())
    }

    fn load_modules(&self, loader: &mut dyn ModuleLoader) -> ModuleLoadReport {
        let allow = self
            .classification
            .allow_list(self.options.safe_mode, self.options.disable_third_party);

        let mut paths = vec![ModuleSearchPath::bundled(&self.paths.module_dir)];
        // Restricted modes never look outside the installation
        if !allow.is_restricted() {
            paths.extend(extra_module_paths_from_env(
                &self.paths.config_root,
                self.paths.portable,
            ));
        }

        let report = loader.load_all(&allow, &paths);
        for id in &report.failed {
            warn!(module = %id, "Module failed to load");
        }
        report
    }

    fn activate_profile(
        &self,
        session: &mut SessionState,
        pending: PendingProfile,
        modules: &ModuleLoadReport,
        events: &mut EventBus,
    ) -> Result<ServiceConfig, BootstrapError> {
        let sequence = ProfileRegistry::activation_events(&pending.profile.entry);
        let profile_dir = pending.profile.dir().to_path_buf();
        session.set_profile(pending.profile);

        announce_activation(
            events,
            sequence,
            pending.created,
            self.options.creation_notifications,
        );

        init_service(&profile_dir, modules)
            .map_err(|e| BootstrapError::ServiceInit(format!("{e:#}")))
    }

    fn activate_collection(
        &self,
        session: &mut SessionState,
        events: &mut EventBus,
    ) -> Result<(), BootstrapError> {
        let mut registry = SceneCollectionRegistry::open(&self.paths.config_root)
            .map_err(BootstrapError::CollectionStorage)?;
        let resolved = resolve(
            &mut registry,
            self.options.collection.as_deref(),
            &session.persisted_collection(),
        )
        .map_err(BootstrapError::CollectionStorage)?;
        let collection = registry
            .activate(&resolved.entry)
            .map_err(BootstrapError::CollectionStorage)?;

        let sequence = SceneCollectionRegistry::activation_events(&collection);
        session.set_collection(collection);
        announce_activation(
            events,
            sequence,
            resolved.created,
            self.options.creation_notifications,
        );
        Ok(())
    }
}

fn enter(stage: &mut Option<Stage>, reached: Stage) {
    let expected = stage.map_or(Some(Stage::FIRST), Stage::next);
    if expected != Some(reached) {
        warn!(expected = ?expected, reached = ?reached, "Bootstrap stage out of order");
    }
    *stage = Some(reached);
    info!(stage = ?reached, "Bootstrap stage complete");
}

/// Open the session for saving and do first-run bookkeeping.
/// Returns whether the auto-configuration wizard should be offered.
fn finish_loading(
    session: &mut SessionState,
    video: &dyn VideoPipeline,
    events: &mut EventBus,
) -> bool {
    session.mark_loaded();
    events.publish(LifecycleEvent::FinishedLoading);

    let has_last_version = session.user_config.has_user_value("General", "LastVersion");
    let first_run = session
        .user_config
        .get_bool("General", "FirstRun")
        .unwrap_or(false);
    if !first_run {
        session.user_config.set("General", "FirstRun", true);
    }
    // Also persists the resolved profile and collection names
    if let Err(e) = session.user_config.save_safe() {
        warn!(error = %format!("{e:#}"), "Failed to save user config");
    }

    !first_run && !has_last_version && !video.output_active()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::config::{PROFILE_FILENAME, PROFILES_DIR, SCENES_DIR};
    use crate::constants::modules::UNSAFE_MODULES;
    use crate::modules::{AllowList, LoadedModule, ModuleManifest};
    use crate::probe::{DisplayGeometry, HostProbe};
    use crate::subsystems::video::VideoInfo;
    use crate::subsystems::{HeadlessAudio, HeadlessVideo};
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc::Receiver;
    use tempfile::TempDir;

    /// Loader that "loads" a fixed set of modules and remembers what it was asked
    struct FakeLoader {
        report: ModuleLoadReport,
        seen_allow: Option<AllowList>,
        seen_paths: Vec<ModuleSearchPath>,
    }

    impl FakeLoader {
        fn new(services: &[&str], failed: &[&str]) -> Self {
            Self {
                report: ModuleLoadReport {
                    loaded: vec![LoadedModule {
                        id: "rtmp-services".to_string(),
                        data_dir: PathBuf::from("/data/rtmp-services"),
                        manifest: ModuleManifest {
                            description: "RTMP services".to_string(),
                            services: services.iter().map(|s| s.to_string()).collect(),
                        },
                    }],
                    failed: failed.iter().map(|s| s.to_string()).collect(),
                },
                seen_allow: None,
                seen_paths: Vec::new(),
            }
        }
    }

    impl ModuleLoader for FakeLoader {
        fn load_all(&mut self, allow: &AllowList, paths: &[ModuleSearchPath]) -> ModuleLoadReport {
            self.seen_allow = Some(allow.clone());
            self.seen_paths = paths.to_vec();
            self.report.clone()
        }
    }

    /// Video backend that answers every reset with the same code
    struct FixedVideo(InitResult);

    impl VideoPipeline for FixedVideo {
        fn output_active(&self) -> bool {
            false
        }

        fn reset_video(&mut self, _info: &VideoInfo) -> InitResult {
            self.0
        }
    }

    fn classification() -> ModuleClassification {
        ModuleClassification::parse(
            "obs-ffmpeg|rtmp-services|frontend-tools|obs-websocket",
            UNSAFE_MODULES,
        )
        .unwrap()
    }

    fn ids(ids: &[&str]) -> std::collections::BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    struct Harness {
        root: TempDir,
        paths: AppPaths,
        probe: HostProbe,
        video: HeadlessVideo,
        audio: HeadlessAudio,
        loader: FakeLoader,
        events: EventBus,
        rx: Receiver<LifecycleEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let paths = AppPaths {
                config_root: root.path().to_path_buf(),
                module_dir: root.path().join("modules"),
                recording_path: root.path().join("videos"),
                portable: false,
            };
            let encoders: HashSet<String> =
                ["ffmpeg_aac", "obs_x264"].iter().map(|s| s.to_string()).collect();
            let mut events = EventBus::new();
            let rx = events.subscribe();
            Self {
                root,
                paths,
                probe: HostProbe::new(Some(DisplayGeometry::new(1920, 1080)), encoders),
                video: HeadlessVideo::new(),
                audio: HeadlessAudio::new(),
                loader: FakeLoader::new(&["rtmp_common", "rtmp_custom"], &["broken-plugin"]),
                events,
                rx,
            }
        }

        fn root(&self) -> &Path {
            self.root.path()
        }

        fn write_user_config(&self, text: &str) {
            fs::write(self.root().join(USER_FILENAME), text).unwrap();
        }

        fn write_profile(&self, dir: &str, body: &str) -> PathBuf {
            let path = self.root().join(PROFILES_DIR).join(dir);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join(PROFILE_FILENAME), body).unwrap();
            path
        }

        fn write_collection(&self, file: &str, body: &str) {
            let dir = self.root().join(SCENES_DIR);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(file), body).unwrap();
        }

        fn run(&mut self, options: StartupOptions) -> Result<BootstrapOutcome, BootstrapError> {
            let bootstrap = Bootstrap::with_classification(&self.paths, options, classification());
            bootstrap.run(Collaborators {
                probe: &self.probe,
                video: &mut self.video,
                audio: &mut self.audio,
                loader: &mut self.loader,
                events: &mut self.events,
            })
        }

        fn run_with_video(
            &mut self,
            options: StartupOptions,
            video: &mut dyn VideoPipeline,
        ) -> Result<BootstrapOutcome, BootstrapError> {
            let bootstrap = Bootstrap::with_classification(&self.paths, options, classification());
            bootstrap.run(Collaborators {
                probe: &self.probe,
                video,
                audio: &mut self.audio,
                loader: &mut self.loader,
                events: &mut self.events,
            })
        }

        fn profile_dirs(&self) -> usize {
            fs::read_dir(self.root().join(PROFILES_DIR)).unwrap().count()
        }

        fn events(&self) -> Vec<LifecycleEvent> {
            self.rx.try_iter().collect()
        }
    }

    fn is_announcement(event: &LifecycleEvent) -> bool {
        !matches!(
            event,
            LifecycleEvent::CanvasResized { .. }
                | LifecycleEvent::OutputResized { .. }
                | LifecycleEvent::FinishedLoading
        )
    }

    #[test]
    fn test_stage_order_is_linear() {
        let mut stages = vec![Stage::FIRST];
        while let Some(next) = stages.last().and_then(|s| s.next()) {
            stages.push(next);
        }
        assert_eq!(stages.len(), 8);
        assert_eq!(stages.last(), Some(&Stage::UiVisible));
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_fresh_install_creates_everything_quietly() {
        let mut h = Harness::new();

        let outcome = h.run(StartupOptions::default()).unwrap();

        let profile = outcome.session.profile.as_ref().unwrap();
        let collection = outcome.session.collection.as_ref().unwrap();
        assert_eq!(profile.name(), "Untitled");
        assert_eq!(collection.name(), "Untitled");
        assert!(outcome.session.loaded);
        assert_eq!(outcome.failed_modules(), ["broken-plugin".to_string()]);
        assert_eq!(outcome.service.kind, "rtmp_common");
        assert!(outcome.should_run_auto_config);

        let events = h.events();
        assert!(!events.iter().any(is_announcement));
        assert_eq!(events.last(), Some(&LifecycleEvent::FinishedLoading));

        let user = ConfigStore::load(h.root().join(USER_FILENAME)).unwrap();
        assert_eq!(user.get_str("Basic", "Profile"), Some("Untitled"));
        assert_eq!(user.get_str("Basic", "SceneCollection"), Some("Untitled"));
        assert_eq!(user.get_bool("General", "FirstRun"), Some(true));

        let saved = ConfigStore::load(profile.entry.config_path()).unwrap();
        assert_eq!(saved.user_value("Video", "BaseCX"), Some("1920"));
        assert_eq!(saved.user_value("Video", "OutputCX"), Some("1280"));
    }

    #[test]
    fn test_existing_entities_announce_in_order() {
        let mut h = Harness::new();
        h.write_user_config(
            "[Basic]\nProfile=Gaming\nSceneCollection=Show\n[General]\nFirstRun=true\nLastVersion=1\n",
        );
        h.write_profile("Gaming", "[General]\nName=Gaming\n");
        h.write_collection(
            "show.json",
            r#"{"name":"Show","current_scene":"Intro","current_program_scene":"Live","scene_order":[{"name":"Intro"},{"name":"Live"}]}"#,
        );

        let outcome = h.run(StartupOptions::default()).unwrap();
        assert!(!outcome.should_run_auto_config);

        let announcements: Vec<_> = h.events().into_iter().filter(is_announcement).collect();
        assert_eq!(
            announcements,
            vec![
                LifecycleEvent::ProfileListChanged,
                LifecycleEvent::ProfileChanged {
                    name: "Gaming".to_string()
                },
                LifecycleEvent::SceneCollectionListChanged,
                LifecycleEvent::SceneCollectionChanged {
                    name: "Show".to_string()
                },
                LifecycleEvent::SceneChanged {
                    scene: "Live".to_string()
                },
                LifecycleEvent::PreviewSceneChanged {
                    scene: "Intro".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_requested_profile_overrides_persisted() {
        let mut h = Harness::new();
        h.write_user_config("[Basic]\nProfile=Gaming\n");
        h.write_profile("Gaming", "[General]\nName=Gaming\n");
        h.write_profile("Podcast", "[General]\nName=Podcast\n");

        let outcome = h
            .run(StartupOptions {
                profile: Some("Podcast".to_string()),
                ..StartupOptions::default()
            })
            .unwrap();

        assert_eq!(outcome.session.profile.as_ref().unwrap().name(), "Podcast");
        let user = ConfigStore::load(h.root().join(USER_FILENAME)).unwrap();
        assert_eq!(user.get_str("Basic", "Profile"), Some("Podcast"));
    }

    #[test]
    fn test_creation_notifications_can_be_enabled() {
        let mut h = Harness::new();

        h.run(StartupOptions {
            creation_notifications: CreationNotifications::Emit,
            ..StartupOptions::default()
        })
        .unwrap();

        let events = h.events();
        assert!(events.contains(&LifecycleEvent::ProfileChanged {
            name: "Untitled".to_string()
        }));
        assert!(events.contains(&LifecycleEvent::SceneChanged {
            scene: "Scene".to_string()
        }));
    }

    #[test]
    fn test_legacy_profile_is_migrated_and_saved() {
        let mut h = Harness::new();
        h.write_user_config("[Basic]\nProfile=Old\n");
        let dir = h.write_profile(
            "Old",
            "[General]\nName=Old\n[AdvOut]\nRecTrackIndex=2\n[Output]\nRetryDelay=0\n",
        );

        h.run(StartupOptions::default()).unwrap();

        let saved = ConfigStore::load(dir.join(PROFILE_FILENAME)).unwrap();
        assert_eq!(saved.get_uint("AdvOut", "RecTracks"), Some(2));
        assert!(!saved.has_user_value("AdvOut", "RecTrackIndex"));
        assert_eq!(saved.get_int("Output", "RetryDelay"), Some(1));
    }

    #[test]
    fn test_no_display_is_fatal() {
        let mut h = Harness::new();
        h.probe = HostProbe::new(None, HashSet::new());

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::NoDisplay));
        assert!(h.audio.current.is_none());
    }

    #[test]
    fn test_audio_failure_stops_before_video() {
        let mut h = Harness::new();
        h.write_user_config("[Basic]\nProfile=P\n");
        h.write_profile("P", "[General]\nName=P\n[Audio]\nSampleRate=12345\n");

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::AudioReset));
        assert_eq!(err.to_string(), "Failed to initialize audio");
        assert!(h.video.current.is_none());
        assert!(h.loader.seen_allow.is_none());
    }

    #[test]
    fn test_missing_graphics_module_is_fatal() {
        let mut h = Harness::new();
        h.write_user_config("[Video]\nRenderer=vulkan\n");

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::VideoModuleNotFound));
        assert_eq!(
            err.to_string(),
            "Failed to initialize video:  Graphics module not found"
        );
    }

    #[test]
    fn test_invalid_video_parameters_are_fatal() {
        let mut h = Harness::new();
        h.write_user_config("[Basic]\nProfile=P\n");
        h.write_profile(
            "P",
            "[General]\nName=P\n[Video]\nBaseCX=0\nBaseCY=0\nOutputCX=0\nOutputCY=0\n",
        );

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::VideoInvalidParam));
        assert!(h.loader.seen_allow.is_none());
    }

    #[test]
    fn test_active_output_reports_unknown_video_failure() {
        let mut h = Harness::new();
        h.video.outputs_active = true;

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::VideoUnknown(InitResult::CurrentlyActive)
        ));
        assert!(h.video.current.is_none());
    }

    #[test]
    fn test_unsupported_gpu_reports_its_own_message() {
        let mut h = Harness::new();

        let err = h
            .run_with_video(StartupOptions::default(), &mut FixedVideo(InitResult::NotSupported))
            .unwrap_err();

        assert!(matches!(err, BootstrapError::VideoNotSupported));
        assert_eq!(
            err.to_string(),
            "Failed to initialize video:\n\nRequired graphics API functionality not found.  Your GPU may not be supported."
        );
        assert_eq!(err.exit_code(), 6);
        assert!(h.loader.seen_allow.is_none());
    }

    #[test]
    fn test_generic_video_failure_is_unknown() {
        let mut h = Harness::new();

        let err = h
            .run_with_video(StartupOptions::default(), &mut FixedVideo(InitResult::Fail))
            .unwrap_err();

        assert!(matches!(err, BootstrapError::VideoUnknown(InitResult::Fail)));
        assert!(err.to_string().starts_with("Failed to initialize video.  Your GPU may not be supported"));
        assert!(err.to_string().ends_with("(Fail)"));
    }

    #[test]
    fn test_failed_launches_reuse_the_default_profile() {
        let mut h = Harness::new();
        h.video.outputs_active = true;

        assert!(h.run(StartupOptions::default()).is_err());
        assert!(h.run(StartupOptions::default()).is_err());
        assert_eq!(h.profile_dirs(), 1);

        h.video.outputs_active = false;
        let outcome = h.run(StartupOptions::default()).unwrap();

        assert_eq!(outcome.session.profile.as_ref().unwrap().name(), "Untitled");
        assert_eq!(h.profile_dirs(), 1);
    }

    #[test]
    fn test_missing_default_service_is_fatal() {
        let mut h = Harness::new();
        h.loader = FakeLoader::new(&[], &[]);

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::ServiceInit(_)));
    }

    #[test]
    fn test_safe_mode_restricts_modules_and_paths() {
        let mut h = Harness::new();

        h.run(StartupOptions {
            safe_mode: true,
            ..StartupOptions::default()
        })
        .unwrap();

        assert_eq!(
            h.loader.seen_allow,
            Some(AllowList::Only(ids(&["obs-ffmpeg", "rtmp-services"])))
        );
        assert_eq!(h.loader.seen_paths.len(), 1);
    }

    #[test]
    fn test_third_party_ban_loads_every_bundled_module() {
        let bundled = ids(&["frontend-tools", "obs-ffmpeg", "obs-websocket", "rtmp-services"]);

        for safe_mode in [false, true] {
            let mut h = Harness::new();

            let outcome = h
                .run(StartupOptions {
                    safe_mode,
                    disable_third_party: true,
                    ..StartupOptions::default()
                })
                .unwrap();

            assert_eq!(h.loader.seen_allow, Some(AllowList::Only(bundled.clone())));
            assert_eq!(h.loader.seen_paths.len(), 1);
            assert_eq!(outcome.service.kind, "rtmp_common");
        }
    }

    #[test]
    fn test_unrestricted_mode_adds_user_plugin_path() {
        let mut h = Harness::new();

        h.run(StartupOptions::default()).unwrap();

        assert_eq!(h.loader.seen_allow, Some(AllowList::Unrestricted));
        assert!(h.loader.seen_paths.len() >= 2);
    }

    #[test]
    fn test_unreadable_collection_storage_is_fatal() {
        let mut h = Harness::new();
        fs::create_dir_all(h.root().join("basic")).unwrap();
        fs::write(h.root().join(SCENES_DIR), "not a directory").unwrap();

        let err = h.run(StartupOptions::default()).unwrap_err();

        assert!(matches!(err, BootstrapError::CollectionStorage(_)));
    }

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let codes = [
            BootstrapError::ModuleClassification(String::new()).exit_code(),
            BootstrapError::ConfigLoad(String::new()).exit_code(),
            BootstrapError::NoDisplay.exit_code(),
            BootstrapError::AudioReset.exit_code(),
            BootstrapError::VideoInvalidParam.exit_code(),
            BootstrapError::ServiceInit(String::new()).exit_code(),
            BootstrapError::CollectionStorage(RegistryError::Load {
                kind: "scene collection",
                name: String::new(),
                reason: String::new(),
            })
            .exit_code(),
        ];
        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0));

        let video = [
            BootstrapError::VideoModuleNotFound,
            BootstrapError::VideoNotSupported,
            BootstrapError::VideoInvalidParam,
            BootstrapError::VideoUnknown(InitResult::Fail),
            BootstrapError::VideoUnknown(InitResult::CurrentlyActive),
        ];
        assert!(video.iter().all(|e| e.exit_code() == 6));
    }
}
