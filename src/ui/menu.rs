use std::time::Duration;

#[cfg(any(target_os = "windows", target_os = "macos"))]
use anyhow::Result;
#[cfg(any(target_os = "windows", target_os = "macos"))]
use tray_icon::menu::{CheckMenuItem, Menu, MenuItem, PredefinedMenuItem, Submenu};

use crate::model::{Feedback, FeedbackSeverity, MenuAction, Mode, ToggleIntent};
use crate::orchestrator::{EventSink, Orchestrator};
#[cfg(any(target_os = "windows", target_os = "macos"))]
use crate::model::AppState;
use crate::utils::truncate;

pub const MENU_ID_TOGGLE: &str = "toggle";
const MENU_ID_MODE_MAIN: &str = "mode_main";
const MENU_ID_MODE_ALTERNATE: &str = "mode_alternate";
const MENU_ID_VARIANT_PREFIX: &str = "variant:";
const MENU_ID_DARK_THEME: &str = "dark_theme";
const MENU_ID_EDIT_CONFIG: &str = "edit_config";
const MENU_ID_RELOAD_CONFIG: &str = "reload_config";
const MENU_ID_STATUS: &str = "status";
const MENU_ID_QUIT: &str = "quit";
const MAX_LABEL_CHARS: usize = 40;

/// Snapshot of what the tooltip and the console `status` command show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperStatus {
    pub intent: ToggleIntent,
    pub live: bool,
    pub locked: bool,
    pub mode: Mode,
    pub variant: Option<String>,
    pub helper: String,
    pub uptime: Option<Duration>,
}

impl HelperStatus {
    pub fn of<S: EventSink>(orch: &Orchestrator<S>) -> Self {
        Self {
            intent: orch.intent(),
            live: orch.liveness(),
            locked: orch.is_locked() || orch.is_busy(),
            mode: orch.mode(),
            variant: orch.variant().map(str::to_string),
            helper: orch.profile().process_name.clone(),
            uptime: orch.handle().map(|h| h.uptime()),
        }
    }
}

pub fn variant_menu_id(variant: &str) -> String {
    format!("{}{}", MENU_ID_VARIANT_PREFIX, variant)
}

/// Map a clicked menu id to an action. Check items flip themselves before the
/// event arrives, so the toggle's new position is passed in.
pub fn parse_menu_action(id: &str, toggle_checked: bool) -> Option<MenuAction> {
    match id {
        MENU_ID_TOGGLE => Some(MenuAction::Toggle(toggle_checked)),
        MENU_ID_MODE_MAIN => Some(MenuAction::SelectMain),
        MENU_ID_MODE_ALTERNATE => Some(MenuAction::SelectAlternate(None)),
        MENU_ID_DARK_THEME => Some(MenuAction::ToggleTheme),
        MENU_ID_EDIT_CONFIG => Some(MenuAction::EditConfig),
        MENU_ID_RELOAD_CONFIG => Some(MenuAction::ReloadConfig),
        MENU_ID_STATUS => Some(MenuAction::Status),
        MENU_ID_QUIT => Some(MenuAction::Quit),
        _ => id
            .strip_prefix(MENU_ID_VARIANT_PREFIX)
            .filter(|name| !name.is_empty())
            .map(|name| MenuAction::SelectVariant(name.to_string())),
    }
}

pub fn status_lines(status: &HelperStatus) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "Helper: {} ({})",
        if status.intent.is_on() { "on" } else { "off" },
        if status.live { "running" } else { "not running" }
    ));
    let mode = match (status.mode, status.variant.as_deref()) {
        (Mode::Alternate, Some(variant)) => format!("alternate · {}", truncate(variant, MAX_LABEL_CHARS)),
        (mode, _) => mode.as_str().to_string(),
    };
    lines.push(format!("Mode: {}", mode));
    if let Some(uptime) = status.uptime {
        lines.push(format!("Up for {}s", uptime.as_secs()));
    }
    if status.locked {
        lines.push("Busy…".to_string());
    }
    lines
}

pub fn build_tooltip(status: &HelperStatus, feedback: Option<&Feedback>) -> String {
    let mut lines = vec![format!("Aether · {}", status.helper)];
    lines.extend(status_lines(status));

    if let Some(feedback) = feedback {
        let prefix = match feedback.severity {
            FeedbackSeverity::Info => "",
            FeedbackSeverity::Warning => "⚠️ ",
            FeedbackSeverity::Error => "⛔ ",
        };
        lines.push(format!("Last action: {}{}", prefix, feedback.message));
    }

    lines.join("\n")
}

/// The built menu plus the handle of the toggle, which the host drives directly.
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub struct TrayMenu {
    pub menu: Menu,
    pub toggle: CheckMenuItem,
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
pub fn build_menu<S: EventSink>(
    state: &AppState,
    orch: &Orchestrator<S>,
    variants: &[String],
) -> Result<TrayMenu> {
    let menu = Menu::new();
    let status = HelperStatus::of(orch);

    let toggle = CheckMenuItem::with_id(
        MENU_ID_TOGGLE,
        "Enabled",
        !status.locked,
        status.intent.is_on(),
        None,
    );
    menu.append(&toggle)?;

    let status_item = MenuItem::with_id(
        MENU_ID_STATUS,
        status_lines(&status).join(" · "),
        true,
        None,
    );
    menu.append(&status_item)?;
    menu.append(&PredefinedMenuItem::separator())?;

    let mode_menu = Submenu::new("Mode", true);
    mode_menu.append(&CheckMenuItem::with_id(
        MENU_ID_MODE_MAIN,
        "Main",
        true,
        status.mode == Mode::Primary,
        None,
    ))?;
    mode_menu.append(&CheckMenuItem::with_id(
        MENU_ID_MODE_ALTERNATE,
        "Alternate",
        true,
        status.mode == Mode::Alternate,
        None,
    ))?;
    menu.append(&mode_menu)?;

    let variant_menu = Submenu::new("Alternate Script", !variants.is_empty());
    for variant in variants {
        let selected = status.variant.as_deref() == Some(variant.as_str());
        variant_menu.append(&CheckMenuItem::with_id(
            variant_menu_id(variant),
            truncate(variant, MAX_LABEL_CHARS),
            true,
            selected,
            None,
        ))?;
    }
    menu.append(&variant_menu)?;
    menu.append(&PredefinedMenuItem::separator())?;

    menu.append(&CheckMenuItem::with_id(
        MENU_ID_DARK_THEME,
        "Dark Theme",
        true,
        state.theme.is_dark(),
        None,
    ))?;
    menu.append(&MenuItem::with_id(
        MENU_ID_EDIT_CONFIG,
        "Edit Configuration...",
        true,
        None,
    ))?;
    menu.append(&MenuItem::with_id(
        MENU_ID_RELOAD_CONFIG,
        "Reload Configuration",
        true,
        None,
    ))?;
    menu.append(&PredefinedMenuItem::separator())?;
    menu.append(&MenuItem::with_id(MENU_ID_QUIT, "Quit", true, None))?;

    Ok(TrayMenu { menu, toggle })
}
