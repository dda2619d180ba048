//! Console control events (Ctrl+C, closing the window, logoff) delivered to a callback

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use windows::Win32::Foundation::BOOL;
use windows::Win32::System::Console::{
    CTRL_CLOSE_EVENT, CTRL_LOGOFF_EVENT, CTRL_SHUTDOWN_EVENT, SetConsoleCtrlHandler,
};

type Callback = Box<dyn Fn() -> bool + Send + Sync>;

static ON_SIGNAL: OnceLock<Callback> = OnceLock::new();

/// Windows ends the process once the handler returns from these events.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

unsafe extern "system" fn console_ctrl_handler(ctrl_type: u32) -> BOOL {
    let Some(on_signal) = ON_SIGNAL.get() else {
        return BOOL(0);
    };
    if !on_signal() {
        return BOOL(0);
    }
    if matches!(
        ctrl_type,
        CTRL_CLOSE_EVENT | CTRL_LOGOFF_EVENT | CTRL_SHUTDOWN_EVENT
    ) {
        thread::sleep(CLOSE_GRACE);
    }
    BOOL(1)
}

/// Call `on_signal` for every console control event. Can be installed once.
pub fn forward_termination<F>(on_signal: F) -> Result<()>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    ON_SIGNAL
        .set(Box::new(on_signal))
        .map_err(|_| anyhow!("termination handler already installed"))?;
    // SAFETY: the handler only reads a static that is set before installation
    unsafe { SetConsoleCtrlHandler(Some(console_ctrl_handler), true) }
        .context("failed to install console control handler")?;
    Ok(())
}
