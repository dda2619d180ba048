//! Detached script launch through `sh`

use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub fn spawn_hidden(script: &Path, working_dir: &Path) -> io::Result<Child> {
    Command::new("sh")
        .arg(script)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        // Own process group: terminal signals aimed at us never reach the helper
        .process_group(0)
        .spawn()
}
