#[cfg(any(target_os = "windows", target_os = "macos"))]
pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod launcher;
pub mod model;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod session;
pub mod settings;
pub mod sweeper;
pub mod terminator;
pub mod utils;
pub mod watcher;

#[cfg(test)]
mod testing;

// Platform abstraction layer
pub mod platform;

pub mod ui {
    pub mod icon;
    pub mod menu;
}

// Re-export platform-specific implementations through unified interface
pub mod process {
    pub mod kill {
        pub use crate::platform::current::kill::*;
    }
    pub mod spawn {
        pub use crate::platform::current::spawn::*;
    }
}

pub mod notify {
    pub use crate::platform::current::notify::*;
}

pub mod privileges {
    pub use crate::platform::current::privileges::*;
}

pub mod signals {
    pub use crate::platform::current::signals::*;
}

use anyhow::{Context, Result};
use log::{info, warn};

/// Set to run the console host even where a tray is available.
pub const HEADLESS_ENV: &str = "AETHER_HEADLESS";

pub fn run() -> Result<()> {
    let config = config::load_or_create_config().context("failed to load configuration")?;
    info!(
        "Helper {} from {}",
        config.helper.process_name,
        config.helper.resolved_scripts_dir().display()
    );

    if !privileges::is_elevated() {
        warn!("Not running elevated; the helper may fail to start or be killed");
        if config.notifications.enabled {
            notify::show_notice(
                "Aether",
                "Not running as administrator. Starting and stopping the helper may fail.",
            );
        }
    }

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    if std::env::var_os(HEADLESS_ENV).is_none_or(|v| v.is_empty() || v == "0") {
        return app::run(config);
    }

    console::run(config)
}
