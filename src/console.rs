//! Line-oriented host for machines without a system tray.
//!
//! Commands are read from stdin. End of input, Ctrl+C and termination signals
//! all quit and stop the helper.

use std::io::{self, BufRead};
use std::sync::{Arc, RwLock};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::config::{Config, get_config_path};
use crate::error::LifecycleError;
use crate::model::{MenuAction, UserEvent};
use crate::orchestrator::{ProcessServices, ToggleControl};
use crate::poller::spawn_poller;
use crate::session::{Effect, Session};
use crate::settings::SettingsStore;
use crate::ui::menu::{HelperStatus, status_lines};
use crate::watcher::spawn_config_watcher;

const HELP: &str = "\
commands:
  on | off            start or stop the helper
  main                use the primary script
  alt [script]        use an alternate script
  variant <script>    pick the alternate script without stopping
  theme               switch light/dark theme
  reload              reload the configuration file
  config              show the configuration file path
  status | variants   show helper state and alternate scripts
  quit                stop the helper and exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Action(MenuAction),
    Help,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    let command = match word.to_ascii_lowercase().as_str() {
        "on" | "start" => ConsoleCommand::Action(MenuAction::Toggle(true)),
        "off" | "stop" => ConsoleCommand::Action(MenuAction::Toggle(false)),
        "main" | "primary" => ConsoleCommand::Action(MenuAction::SelectMain),
        "alt" | "alternate" => ConsoleCommand::Action(MenuAction::SelectAlternate(argument)),
        "variant" => match argument {
            Some(name) => ConsoleCommand::Action(MenuAction::SelectVariant(name)),
            None => return Err("usage: variant <script>".to_string()),
        },
        "theme" => ConsoleCommand::Action(MenuAction::ToggleTheme),
        "reload" => ConsoleCommand::Action(MenuAction::ReloadConfig),
        "config" => ConsoleCommand::Action(MenuAction::EditConfig),
        "status" | "variants" => ConsoleCommand::Action(MenuAction::Status),
        "quit" | "exit" => ConsoleCommand::Action(MenuAction::Quit),
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

#[derive(Default)]
struct ConsoleUi {
    live: Option<bool>,
    notifications: bool,
}

impl ToggleControl for ConsoleUi {
    fn set_enabled(&mut self, enabled: bool) {
        debug!("Toggle {}", if enabled { "enabled" } else { "disabled" });
    }

    fn force_position(&mut self, on: bool) {
        println!("helper: {}", if on { "on" } else { "off" });
    }

    fn set_live_indicator(&mut self, live: bool) {
        if self.live != Some(live) {
            println!("helper process {}", if live { "running" } else { "not running" });
        }
        self.live = Some(live);
    }

    fn show_error(&mut self, error: &LifecycleError) {
        eprintln!("{}: {}", error.title(), error);
        if self.notifications {
            crate::notify::show_notice(error.title(), &error.to_string());
        }
    }
}

type ConsoleSession = Session<Sender<UserEvent>>;

pub fn run(config: Config) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded::<UserEvent>();
    // Before any thread is spawned, so none of them takes the signals
    if let Err(e) = crate::signals::forward_termination(quit_on_signal(tx.clone())) {
        warn!("Termination signals will not stop the helper: {:#}", e);
    }

    let shared_config = Arc::new(RwLock::new(config.clone()));
    let settings = SettingsStore::load().context("failed to load settings")?;
    let services = ProcessServices::system();

    let mut ui = ConsoleUi {
        live: None,
        notifications: config.notifications.enabled,
    };
    let mut session = Session::new(
        config,
        shared_config.clone(),
        settings,
        services.clone(),
        tx.clone(),
    );

    let poller = spawn_poller(services.registry.clone(), shared_config.clone(), tx.clone());
    let watcher_tx = tx.clone();
    let _config_watcher = spawn_config_watcher(shared_config, move |event| {
        watcher_tx.send(event).is_ok()
    });
    spawn_stdin_reader(tx);

    println!("{}", HELP);
    print_status(&session);

    serve(&mut session, &mut ui, &rx);

    poller.stop();
    session.shutdown();
    Ok(())
}

/// Turn a termination signal into the same quit the `quit` command sends.
fn quit_on_signal(tx: Sender<UserEvent>) -> impl Fn() -> bool + Send + Sync + 'static {
    move || {
        info!("Termination requested, stopping the helper");
        tx.send(UserEvent::MenuAction(MenuAction::Quit)).is_ok()
    }
}

/// Apply events until a quit arrives.
fn serve(session: &mut ConsoleSession, ui: &mut ConsoleUi, rx: &Receiver<UserEvent>) {
    for event in rx.iter() {
        match event {
            UserEvent::Core(core) => session.orch.handle_event(core, ui),
            UserEvent::MenuAction(action) => match session.handle_action(action, ui) {
                Effect::Quit => break,
                Effect::ShowStatus => print_status(session),
                Effect::OpenConfig => println!("config: {}", get_config_path().display()),
                Effect::Refresh | Effect::Nothing => {
                    if let Some(feedback) = session.state.last_feedback.take() {
                        println!("{}", feedback.message);
                    }
                }
            },
            UserEvent::ConfigReloaded(new_config) => {
                ui.notifications = new_config.notifications.enabled;
                session.apply_config(new_config);
                println!("configuration reloaded");
            }
            UserEvent::ConfigReloadFailed(message) => {
                warn!("{}", message);
                eprintln!("{}", message);
            }
        }
    }
}

fn print_status(session: &ConsoleSession) {
    for line in status_lines(&HelperStatus::of(&session.orch)) {
        println!("{}", line);
    }
    let variants = session.variants();
    if variants.is_empty() {
        println!("No alternate scripts found");
    } else {
        println!("Alternate scripts: {}", variants.join(", "));
    }
}

fn spawn_stdin_reader(tx: Sender<UserEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            let action = match parse_command(&line) {
                Ok(Some(ConsoleCommand::Action(action))) => action,
                Ok(Some(ConsoleCommand::Help)) => {
                    println!("{}", HELP);
                    continue;
                }
                Ok(None) => continue,
                Err(message) => {
                    eprintln!("{}", message);
                    continue;
                }
            };
            if tx.send(UserEvent::MenuAction(action)).is_err() {
                return;
            }
        }
        let _ = tx.send(UserEvent::MenuAction(MenuAction::Quit));
    });
}
