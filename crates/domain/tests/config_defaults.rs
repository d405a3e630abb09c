use gb_domain::BridgeConfig;

#[test]
fn default_host_is_localhost() {
    let config = BridgeConfig::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4444);
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 4445
"#;
    let config: BridgeConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 4445);
}

#[test]
fn checkpoint_section_roundtrips() {
    let toml_str = r#"
[checkpoint]
url = "http://localhost:9000/hook"
session_id = "sess-1"
secret = "shh"
"#;
    let config: BridgeConfig = toml::from_str(toml_str).unwrap();
    let checkpoint = config.checkpoint.expect("checkpoint section");
    assert_eq!(checkpoint.url, "http://localhost:9000/hook");
    assert_eq!(checkpoint.session_id.as_deref(), Some("sess-1"));
    assert_eq!(checkpoint.secret.as_deref(), Some("shh"));
}
