fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    // The helper needs administrator rights, so ask for elevation at launch
    let mut res = winres::WindowsResource::new();
    res.set("ProductName", "Aether")
        .set("FileDescription", "Aether helper control panel")
        .set_manifest(
            r#"<assembly xmlns="urn:schemas-microsoft-com:asm.v1" manifestVersion="1.0">
<trustInfo xmlns="urn:schemas-microsoft-com:asm.v3">
    <security>
        <requestedPrivileges>
            <requestedExecutionLevel level="requireAdministrator" uiAccess="false" />
        </requestedPrivileges>
    </security>
</trustInfo>
</assembly>"#,
        );
    if let Err(e) = res.compile() {
        println!("cargo:warning=failed to embed Windows resources: {}", e);
    }
}
