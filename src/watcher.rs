//! Hot reload of the JSON config file.

use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::{Config, get_config_path, load_and_validate_config};
use crate::model::UserEvent;

const CONFIG_DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Watch the config file and hand every reload result to `post`.
///
/// Stops when `post` returns false. A successful reload is written to
/// `shared_config` before it is posted, so the poller sees it on its next tick.
pub fn spawn_config_watcher<F>(
    shared_config: Arc<RwLock<Config>>,
    post: F,
) -> thread::JoinHandle<()>
where
    F: Fn(UserEvent) -> bool + Send + 'static,
{
    thread::spawn(move || {
        let config_path = get_config_path();
        let (tx, rx) = std::sync::mpsc::channel();

        let mut watcher: RecommendedWatcher = match Watcher::new(
            move |res: Result<NotifyEvent, notify::Error>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create config watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
            log::error!("Failed to watch config file: {}", e);
            return;
        }

        log::debug!("Config watcher started for {:?}", config_path);

        let mut last_reload = Instant::now() - CONFIG_DEBOUNCE_DURATION;

        for result in rx {
            match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        continue;
                    }
                    // Editors often save in several writes
                    if last_reload.elapsed() < CONFIG_DEBOUNCE_DURATION {
                        continue;
                    }
                    last_reload = Instant::now();

                    log::debug!("Config file changed, attempting reload");

                    let event = match load_and_validate_config() {
                        Ok(new_config) => {
                            if let Ok(mut cfg) = shared_config.write() {
                                *cfg = new_config.clone();
                            }
                            UserEvent::ConfigReloaded(new_config)
                        }
                        Err(e) => {
                            let msg = format!("Config reload failed: {:#}", e);
                            log::warn!("{}", msg);
                            UserEvent::ConfigReloadFailed(msg)
                        }
                    };
                    if !post(event) {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Config watch error: {}", e);
                }
            }
        }
    })
}
