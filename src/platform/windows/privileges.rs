use windows::Win32::UI::Shell::IsUserAnAdmin;

/// True when the current process token belongs to an administrator.
pub fn is_elevated() -> bool {
    // SAFETY: IsUserAnAdmin takes no arguments and only inspects our token
    unsafe { IsUserAnAdmin().as_bool() }
}
