//! Desktop notices: terminal-notifier on macOS, notify-send elsewhere

use std::path::Path;
use std::process::Command;

#[cfg(target_os = "macos")]
const BUNDLE_ID: &str = "com.aether.app";

#[cfg(target_os = "macos")]
const HOMEBREW_PATHS: &[&str] = &[
    "/opt/homebrew/bin", // Apple Silicon
    "/usr/local/bin",    // Intel Mac
];

#[cfg(target_os = "macos")]
pub fn show_notice(title: &str, body: &str) {
    // No osascript fallback: script names end up in the body and must never be evaluated
    let Some(cmd) = find_in_paths("terminal-notifier", HOMEBREW_PATHS) else {
        log::debug!("terminal-notifier not installed, notice dropped: {}", title);
        return;
    };
    if let Err(e) = Command::new(cmd)
        .args(["-title", title, "-message", body, "-sender", BUNDLE_ID])
        .spawn()
    {
        log::debug!("Failed to run terminal-notifier: {}", e);
    }
}

#[cfg(not(target_os = "macos"))]
pub fn show_notice(title: &str, body: &str) {
    let cmd = find_in_paths("notify-send", &["/usr/bin", "/usr/local/bin"])
        .unwrap_or_else(|| "notify-send".to_string());
    if let Err(e) = Command::new(cmd)
        .args(["--app-name", "Aether", title, body])
        .spawn()
    {
        log::debug!("Failed to run notify-send: {}", e);
    }
}

fn find_in_paths(name: &str, prefix_paths: &[&str]) -> Option<String> {
    prefix_paths
        .iter()
        .map(|prefix| format!("{}/{}", prefix, name))
        .find(|full_path| Path::new(full_path).exists())
}
