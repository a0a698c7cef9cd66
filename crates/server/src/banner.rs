pub fn print_banner(version: &str) {
    let banner = format!(
        r#"
 ┌─┐┌─┐┌┬┐┌─┐┌─┐┌─┐┌┬┐   ┌─┐┬─┐┌─┐─┐ ┬┬ ┬
 ├─┘│ │ ││├─ ├─┤└─┐ │ ───├─┘├┬┘│ │┌┴┬┘└┬┘   podcast-proxy
 ┴  └─┘─┴┘└─┘┴ ┴└─┘ ┴    ┴  ┴└─└─┘┴ └─ ┴    v{}
"#,
        version
    );

    tracing::info!("{}", banner);
}
