//! Windows toast notices using PowerShell

use crate::utils::hidden_command;

const APP_ID: &str = "Aether.App";

pub fn show_notice(title: &str, body: &str) {
    // Escape single quotes for PowerShell
    let title = title.replace('\'', "''").replace('`', "``");
    let body = body.replace('\'', "''").replace('`', "``");

    let script = format!(
        r#"
$ErrorActionPreference = 'SilentlyContinue'

if (Get-Module -ListAvailable -Name BurntToast) {{
    Import-Module BurntToast
    New-BurntToastNotification -Text '{title}', '{body}'
}} else {{
    [Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
    [Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null

    $template = @'
<toast>
    <visual>
        <binding template="ToastGeneric">
            <text>{title}</text>
            <text>{body}</text>
        </binding>
    </visual>
</toast>
'@

    $xml = New-Object Windows.Data.Xml.Dom.XmlDocument
    $xml.LoadXml($template)
    $toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
    [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{app_id}').Show($toast)
}}
"#,
        title = title,
        body = body,
        app_id = APP_ID,
    );

    // Fire and forget; a missing toast is not worth blocking the event loop for
    if let Err(e) = hidden_command("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-WindowStyle",
            "Hidden",
            "-Command",
            &script,
        ])
        .spawn()
    {
        log::debug!("Failed to show toast: {}", e);
    }
}
