//! Hidden, detached script launch through `cmd /c`

use std::io;
use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::utils::CREATE_NO_WINDOW;

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

pub fn spawn_hidden(script: &Path, working_dir: &Path) -> io::Result<Child> {
    Command::new("cmd")
        .arg("/c")
        .arg(script)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP)
        .spawn()
}
