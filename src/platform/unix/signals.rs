//! Termination signals delivered to a callback instead of the default action

use std::thread;

use anyhow::{Context, Result};
use log::{debug, warn};
use nix::sys::signal::{SigSet, Signal};

const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP];

/// Call `on_signal` for every SIGINT, SIGTERM or SIGHUP until it returns false.
///
/// The signals are blocked on the calling thread and picked up by a dedicated
/// thread. Threads inherit the mask, so install this before spawning any.
/// Children started through `std::process::Command` get an empty mask.
pub fn forward_termination<F>(on_signal: F) -> Result<()>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let mut set = SigSet::empty();
    for signal in TERMINATION_SIGNALS {
        set.add(signal);
    }
    set.thread_block()
        .context("failed to block termination signals")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            loop {
                match set.wait() {
                    Ok(signal) => {
                        debug!("Received {:?}", signal);
                        if !on_signal() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Waiting for termination signals failed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("failed to start signal thread")?;
    Ok(())
}
