//! System tray host.

#[cfg(target_os = "macos")]
use std::process::Command;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{error, warn};
use tray_icon::menu::{CheckMenuItem, MenuEvent};
use tray_icon::{TrayIcon, TrayIconBuilder};
use winit::event::{Event, StartCause};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopProxy};

use crate::config::{Config, get_config_path};
use crate::error::LifecycleError;
use crate::model::{CoreEvent, Feedback, UserEvent};
use crate::orchestrator::{ProcessServices, ToggleControl};
use crate::poller::spawn_poller;
use crate::session::{Effect, Session};
use crate::settings::SettingsStore;
use crate::ui::icon::{Theme, create_icon};
use crate::ui::menu::{HelperStatus, build_menu, build_tooltip, parse_menu_action, status_lines};
#[cfg(target_os = "windows")]
use crate::utils::hidden_command;
use crate::watcher::spawn_config_watcher;

const MENU_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

type TraySession = Session<EventLoopProxy<UserEvent>>;

/// Tray icon plus the toggle item; implements the toggle control for the orchestrator.
struct TrayUi {
    tray: TrayIcon,
    toggle: CheckMenuItem,
    theme: Theme,
    live: bool,
    /// Error raised by the orchestrator, moved into the session's feedback
    /// after the current event.
    last_error: Option<Feedback>,
    last_status: Option<HelperStatus>,
}

impl ToggleControl for TrayUi {
    fn set_enabled(&mut self, enabled: bool) {
        self.toggle.set_enabled(enabled);
    }

    fn force_position(&mut self, on: bool) {
        self.toggle.set_checked(on);
    }

    fn set_live_indicator(&mut self, live: bool) {
        if self.live != live {
            self.live = live;
            self.redraw_icon();
        }
    }

    fn show_error(&mut self, error: &LifecycleError) {
        // Failures are always surfaced, whatever the notification setting
        crate::notify::show_notice(error.title(), &error.to_string());
        self.last_error = Some(Feedback::error(error.to_string()));
    }
}

impl TrayUi {
    fn redraw_icon(&self) {
        match create_icon(self.theme, self.live) {
            Ok(icon) => {
                if let Err(err) = self.tray.set_icon(Some(icon)) {
                    error!("Failed to update tray icon: {}", err);
                }
            }
            Err(err) => error!("Failed to draw tray icon: {}", err),
        }
    }

    fn rebuild_menu(&mut self, session: &TraySession) {
        match build_menu(&session.state, &session.orch, &session.variants()) {
            Ok(tray_menu) => {
                self.tray.set_menu(Some(Box::new(tray_menu.menu)));
                self.toggle = tray_menu.toggle;
            }
            Err(err) => error!("Failed to rebuild menu: {}", err),
        }
    }

    /// Bring icon, menu and tooltip in line with the session after an event.
    fn sync(&mut self, session: &mut TraySession, force_menu: bool) {
        if let Some(feedback) = self.last_error.take() {
            session.state.last_feedback = Some(feedback);
        }
        session.state.live = self.live;

        if self.theme != session.state.theme {
            self.theme = session.state.theme;
            self.redraw_icon();
        }

        let mut status = HelperStatus::of(&session.orch);
        let tooltip = build_tooltip(&status, session.state.last_feedback.as_ref());
        if let Err(err) = self.tray.set_tooltip(Some(tooltip.as_str())) {
            error!("Failed to update tooltip: {}", err);
        }

        status.uptime = None;
        if force_menu || self.last_status.as_ref() != Some(&status) {
            self.rebuild_menu(session);
            self.last_status = Some(status);
        }
    }
}

pub fn run(config: Config) -> Result<()> {
    let shared_config = Arc::new(RwLock::new(config.clone()));
    let settings = SettingsStore::load().context("failed to load settings")?;

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let proxy = event_loop.create_proxy();
    let services = ProcessServices::system();

    let mut session = Session::new(
        config,
        shared_config.clone(),
        settings,
        services.clone(),
        proxy.clone(),
    );

    let mut poller = Some(spawn_poller(
        services.registry.clone(),
        shared_config.clone(),
        proxy.clone(),
    ));
    let watcher_proxy = proxy.clone();
    let _config_watcher = spawn_config_watcher(shared_config, move |event| {
        watcher_proxy.send_event(event).is_ok()
    });
    let menu_receiver = MenuEvent::receiver().clone();

    let theme = session.state.theme;
    let icon = create_icon(theme, false).context("failed to create tray icon image")?;
    let tray_menu = build_menu(&session.state, &session.orch, &session.variants())
        .context("failed to build initial menu")?;
    let tray = TrayIconBuilder::new()
        .with_icon(icon)
        .with_menu(Box::new(tray_menu.menu))
        .with_tooltip("Aether")
        .build()
        .context("failed to create tray icon")?;
    tray.set_visible(true).context("failed to show tray icon")?;

    let mut ui = TrayUi {
        tray,
        toggle: tray_menu.toggle,
        theme,
        live: false,
        last_error: None,
        last_status: None,
    };
    ui.sync(&mut session, false);

    #[allow(deprecated)]
    let run_result = event_loop.run(move |event, event_loop| match event {
        Event::NewEvents(StartCause::Init) => {
            event_loop
                .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
            while let Ok(event) = menu_receiver.try_recv() {
                if let Some(action) = parse_menu_action(event.id().as_ref(), ui.toggle.is_checked())
                {
                    let _ = proxy.send_event(UserEvent::MenuAction(action));
                }
            }
            event_loop
                .set_control_flow(ControlFlow::WaitUntil(Instant::now() + MENU_POLL_INTERVAL));
        }
        Event::UserEvent(user_event) => match user_event {
            UserEvent::Core(core) => {
                let routine = matches!(core, CoreEvent::LivenessSampled(_));
                session.orch.handle_event(core, &mut ui);
                ui.sync(&mut session, !routine);
            }
            UserEvent::MenuAction(action) => {
                match session.handle_action(action, &mut ui) {
                    Effect::Quit => event_loop.exit(),
                    Effect::OpenConfig => open_config_in_editor(&mut session),
                    Effect::ShowStatus => {
                        let lines = status_lines(&HelperStatus::of(&session.orch));
                        crate::notify::show_notice("Aether", &lines.join("\n"));
                    }
                    Effect::Refresh | Effect::Nothing => {}
                }
                ui.sync(&mut session, true);
            }
            UserEvent::ConfigReloaded(new_config) => {
                session.apply_config(new_config);
                ui.sync(&mut session, true);
            }
            UserEvent::ConfigReloadFailed(message) => {
                warn!("{}", message);
                session.state.last_feedback = Some(Feedback::error(message));
                ui.sync(&mut session, false);
            }
        },
        Event::LoopExiting => {
            if let Some(poller) = poller.take() {
                poller.stop();
            }
            session.shutdown();
        }
        _ => {}
    });

    run_result.context("event loop terminated with error")?;
    Ok(())
}

fn open_config_in_editor(session: &mut TraySession) {
    let config_path = get_config_path();
    let path_str = config_path.to_string_lossy().to_string();

    #[cfg(target_os = "macos")]
    let spawned = Command::new("open").arg("-t").arg(&path_str).spawn();

    #[cfg(target_os = "windows")]
    let spawned = hidden_command("notepad").arg(&path_str).spawn();

    session.state.last_feedback = Some(match spawned {
        Ok(_) => Feedback::info(format!("Opened config file: {}", path_str)),
        Err(e) => Feedback::error(format!("Failed to open {}: {}", path_str, e)),
    });
}
