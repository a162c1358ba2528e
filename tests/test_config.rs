use hearth::config::{Config, UpstreamConfig};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.upstream.url, "http://httpbin.org");
    assert_eq!(cfg.upstream.connect_timeout_ms, 2_000);
    assert_eq!(cfg.upstream.request_timeout_ms, 10_000);
}

#[test]
fn test_config_parses_yaml() {
    let yaml = r#"
listen_addr: "0.0.0.0:9000"
upstream:
  url: "http://localhost:3000"
  connect_timeout_ms: 500
  request_timeout_ms: 5000
"#;

    let cfg: Config = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.upstream.url, "http://localhost:3000");
    assert_eq!(cfg.upstream.connect_timeout_ms, 500);
    assert_eq!(cfg.upstream.request_timeout_ms, 5_000);
}

#[test]
fn test_config_partial_yaml_falls_back_to_defaults() {
    let yaml = "listen_addr: \"127.0.0.1:4000\"\n";

    let cfg: Config = serde_yaml::from_str(yaml).unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
    assert_eq!(cfg.upstream.url, UpstreamConfig::default().url);
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();

    assert_eq!(cfg1.listen_addr, cfg2.listen_addr);
    assert_eq!(cfg1.upstream.url, cfg2.upstream.url);
}
