use nix::unistd::geteuid;

/// True when running with an effective uid of root.
pub fn is_elevated() -> bool {
    geteuid().is_root()
}
