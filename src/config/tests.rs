use super::AppConfig;
use clap::Parser;

fn parse(args: &[&str]) -> AppConfig {
    let mut full = vec!["voicechat"];
    full.extend_from_slice(args);
    AppConfig::parse_from(full)
}

#[test]
fn defaults_pass_validation() {
    let mut cfg = parse(&[]);
    cfg.validate().expect("defaults should be valid");
    assert_eq!(cfg.silence_window_ms, 900);
    assert_eq!(cfg.hard_cap_ms, 18_000);
    assert_eq!(cfg.sample_rate, 16_000);
}

#[test]
fn server_url_trailing_slash_is_normalized() {
    let mut cfg = parse(&["--server-url", "http://localhost:8000/"]);
    cfg.validate().unwrap();
    assert_eq!(cfg.server_url, "http://localhost:8000");
}

#[test]
fn server_url_without_scheme_is_rejected() {
    let mut cfg = parse(&["--server-url", "localhost:8000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn silence_window_cannot_exceed_hard_cap() {
    let mut cfg = parse(&["--silence-window-ms", "20000", "--hard-cap-ms", "18000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn silence_window_below_floor_is_rejected() {
    let mut cfg = parse(&["--silence-window-ms", "100"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn zero_hard_cap_is_rejected() {
    let mut cfg = parse(&["--hard-cap-ms", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn frame_size_bounds_are_enforced() {
    let mut cfg = parse(&["--frame-ms", "2"]);
    assert!(cfg.validate().is_err());
    let mut cfg = parse(&["--frame-ms", "200"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn session_config_reflects_flags() {
    let mut cfg = parse(&["--no-enhancement", "--silence-window-ms", "700"]);
    cfg.validate().unwrap();
    let session = cfg.session_config();
    assert!(!session.enhancement);
    assert_eq!(session.silence_window_ms, 700);
    assert_eq!(session.hard_cap_ms, 18_000);
}

#[test]
fn custom_endpointing_values_survive_validation() {
    let mut cfg = parse(&["--silence-window-ms", "1200", "--hard-cap-ms", "30000"]);
    cfg.validate().unwrap();
    assert_eq!(cfg.session_config().silence_window_ms, 1200);
    assert_eq!(cfg.session_config().hard_cap_ms, 30_000);
}
