use ro_domain::config::Config;

#[test]
fn empty_toml_document_parses_to_all_defaults() {
    let cfg: Config = toml::from_str("").expect("empty config should use all defaults");
    assert_eq!(cfg.server.http_port, 8080);
    assert_eq!(cfg.provider.max_tool_depth, 8);
    assert_eq!(cfg.queue.background_worker_count, 4);
    assert_eq!(cfg.webhook.webhook_retry_delay_secs, 2);
    assert_eq!(cfg.context.context_safety_margin_ratio, 0.80);
}

#[test]
fn partial_override_preserves_other_defaults() {
    let toml_src = r#"
        [server]
        http_port = 9000

        [provider]
        max_tool_depth = 12
    "#;
    let cfg: Config = toml::from_str(toml_src).unwrap();
    assert_eq!(cfg.server.http_port, 9000);
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.provider.max_tool_depth, 12);
    assert_eq!(cfg.provider.tool_timeout_secs, 45);
}
