//! Host-independent handling of user actions.
//!
//! Both the tray and the console host own one [`Session`]. It routes actions
//! to the orchestrator, persists UI choices and applies config reloads; the
//! host only decides how the result is presented.

use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::config::{Config, load_and_validate_config};
use crate::model::{AppState, Feedback, MenuAction, Mode};
use crate::orchestrator::{
    EventSink, HelperProfile, Orchestrator, ProcessServices, ToggleControl, TransitionRequest,
};
use crate::settings::{KEY_DARK_THEME, KEY_MODE, KEY_VARIANT, SettingsStore};
use crate::ui::icon::Theme;

/// What the host should do after an action was handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Effect {
    Nothing,
    /// Mode, variant, theme or config changed; redraw menus and icons.
    Refresh,
    ShowStatus,
    OpenConfig,
    Quit,
}

pub struct Session<S: EventSink> {
    pub orch: Orchestrator<S>,
    pub state: AppState,
    settings: SettingsStore,
    shared_config: Arc<RwLock<Config>>,
}

impl<S: EventSink> Session<S> {
    pub fn new(
        config: Config,
        shared_config: Arc<RwLock<Config>>,
        settings: SettingsStore,
        services: ProcessServices,
        sink: S,
    ) -> Self {
        let mut orch = Orchestrator::new(services, HelperProfile::from_config(&config), sink);
        let mode = settings
            .get_string(KEY_MODE)
            .and_then(|raw| Mode::parse(&raw))
            .unwrap_or_default();
        let variant = settings.get_string(KEY_VARIANT);
        orch.restore_selection(mode, variant);

        let state = AppState {
            theme: Theme::from_dark(settings.get_bool(KEY_DARK_THEME).unwrap_or(false)),
            config,
            live: false,
            last_feedback: None,
        };

        Self {
            orch,
            state,
            settings,
            shared_config,
        }
    }

    /// Scripts offered in the alternate selector.
    pub fn variants(&self) -> Vec<String> {
        self.orch.profile().catalog.variants()
    }

    pub fn handle_action(&mut self, action: MenuAction, ui: &mut dyn ToggleControl) -> Effect {
        match action {
            MenuAction::Toggle(on) => {
                if self.orch.request_transition(on, ui) == TransitionRequest::Rejected {
                    self.state.last_feedback =
                        Some(Feedback::warning("Busy, try again".into()));
                }
                Effect::Refresh
            }
            MenuAction::SelectMain => {
                self.orch.select_main(ui);
                self.remember_selection();
                Effect::Refresh
            }
            MenuAction::SelectAlternate(variant) => {
                self.orch.select_alternate(variant, ui);
                self.remember_selection();
                Effect::Refresh
            }
            MenuAction::SelectVariant(variant) => {
                self.orch.set_variant(variant);
                self.remember_selection();
                Effect::Refresh
            }
            MenuAction::ToggleTheme => {
                self.state.theme = self.state.theme.toggled();
                if let Err(e) = self.settings.set_bool(KEY_DARK_THEME, self.state.theme.is_dark())
                {
                    warn!("Failed to save theme: {:#}", e);
                }
                Effect::Refresh
            }
            MenuAction::ReloadConfig => {
                match load_and_validate_config() {
                    Ok(config) => self.apply_config(config),
                    Err(e) => {
                        self.state.last_feedback =
                            Some(Feedback::error(format!("Reload failed: {:#}", e)));
                    }
                }
                Effect::Refresh
            }
            MenuAction::EditConfig => Effect::OpenConfig,
            MenuAction::Status => Effect::ShowStatus,
            MenuAction::Quit => Effect::Quit,
        }
    }

    /// Install a freshly loaded config everywhere it is read.
    pub fn apply_config(&mut self, config: Config) {
        if let Ok(mut shared) = self.shared_config.write() {
            *shared = config.clone();
        }
        self.orch.apply_profile(HelperProfile::from_config(&config));
        self.state.config = config;
        self.state.last_feedback = Some(Feedback::info("Configuration reloaded".into()));
    }

    pub fn shutdown(&mut self) {
        info!("Shutting down, stopping helper");
        self.orch.shutdown();
    }

    fn remember_selection(&mut self) {
        let mode = self.orch.mode().as_str();
        if let Err(e) = self.settings.set_string(KEY_MODE, mode) {
            warn!("Failed to save mode: {:#}", e);
        }
        if let Some(variant) = self.orch.variant().map(str::to_string)
            && let Err(e) = self.settings.set_string(KEY_VARIANT, &variant)
        {
            warn!("Failed to save variant: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use crate::model::{CoreEvent, FeedbackSeverity, KillReport, LaunchStamp};
    use crate::registry::ProcessRegistry;
    use crate::terminator::ProcessTerminator;
    use crate::launcher::ProcessSpawner;
    use crossbeam_channel::Sender;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Nothing;

    impl ProcessRegistry for Nothing {
        fn pids_by_name(&self, _name: &str) -> Vec<u32> {
            Vec::new()
        }

        fn descendants(&self, _pid: u32) -> Vec<u32> {
            Vec::new()
        }
    }

    impl ProcessTerminator for Nothing {
        fn kill_by_name(&self, _name: &str) -> KillReport {
            KillReport::absent()
        }

        fn kill_by_pid(&self, _target: LaunchStamp) -> KillReport {
            KillReport::absent()
        }
    }

    impl ProcessSpawner for Nothing {
        fn spawn(&self, _script: &Path, _working_dir: &Path) -> io::Result<u32> {
            Err(io::Error::other("not in tests"))
        }
    }

    #[derive(Default)]
    struct Silent;

    impl ToggleControl for Silent {
        fn set_enabled(&mut self, _enabled: bool) {}
        fn force_position(&mut self, _on: bool) {}
        fn set_live_indicator(&mut self, _live: bool) {}
        fn show_error(&mut self, _error: &LifecycleError) {}
    }

    fn settings_path() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        std::env::temp_dir().join(format!(
            "aether-session-{}-{}/settings.json",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ))
    }

    fn session(path: PathBuf) -> Session<Sender<CoreEvent>> {
        let config = Config::default();
        let shared = Arc::new(RwLock::new(config.clone()));
        let services = ProcessServices {
            registry: Arc::new(Nothing),
            terminator: Arc::new(Nothing),
            spawner: Arc::new(Nothing),
        };
        let (tx, _rx) = crossbeam_channel::unbounded::<CoreEvent>();
        Session::new(
            config,
            shared,
            SettingsStore::open(path).unwrap(),
            services,
            tx,
        )
    }

    #[test]
    fn selection_and_theme_are_restored() {
        let path = settings_path();
        let mut first = session(path.clone());
        assert_eq!(first.state.theme, Theme::Light);
        assert_eq!(
            first.handle_action(MenuAction::SelectVariant("alt.bat".into()), &mut Silent),
            Effect::Refresh
        );
        first.handle_action(MenuAction::SelectAlternate(None), &mut Silent);
        first.handle_action(MenuAction::ToggleTheme, &mut Silent);

        let second = session(path);
        assert_eq!(second.state.theme, Theme::Dark);
        assert_eq!(second.orch.mode(), Mode::Alternate);
        assert_eq!(second.orch.variant(), Some("alt.bat"));
    }

    #[test]
    fn host_only_actions_pass_through() {
        let mut s = session(settings_path());
        assert_eq!(s.handle_action(MenuAction::Quit, &mut Silent), Effect::Quit);
        assert_eq!(
            s.handle_action(MenuAction::EditConfig, &mut Silent),
            Effect::OpenConfig
        );
        assert_eq!(
            s.handle_action(MenuAction::Status, &mut Silent),
            Effect::ShowStatus
        );
    }

    #[test]
    fn rejected_toggle_leaves_feedback() {
        let mut s = session(settings_path());
        s.handle_action(MenuAction::Toggle(false), &mut Silent);
        assert!(s.state.last_feedback.is_none());
        s.handle_action(MenuAction::Toggle(true), &mut Silent);
        let feedback = s.state.last_feedback.expect("feedback for a rejected toggle");
        assert_eq!(feedback.severity, FeedbackSeverity::Warning);
    }

    #[test]
    fn applied_config_reaches_the_shared_copy() {
        let mut s = session(settings_path());
        let mut config = Config::default();
        config.helper.process_name = "other.exe".into();
        s.apply_config(config);
        assert_eq!(s.orch.profile().process_name, "other.exe");
        assert_eq!(
            s.shared_config.read().unwrap().helper.process_name,
            "other.exe"
        );
    }
}
