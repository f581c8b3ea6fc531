use std::{collections::HashMap, path::Path};

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_file_yields_defaults_without_vendors() {
    let settings = parse_settings("").expect("parse");
    assert_eq!(settings, Settings::default());
    assert!(settings.bridge.is_none());
    assert!(settings.local_bulb.is_none());
    assert!(settings.cloud.is_none());
    assert_eq!(settings.cycle.cycle_time_secs, 15.0);
    assert_eq!(settings.cycle.alternate_hues, [39_780, 56_227]);
}

#[test]
fn parses_every_section() {
    let raw = r#"
        [cycle]
        cycle_time_secs = 30
        transition_ms = 500
        jitter = true
        mode = "alternating"
        alternate_every_ticks = 4

        [bridge]
        ip = "192.168.1.2"
        username = "abc123"

        [local_bulb]
        rapid = false
        ack_timeout_ms = 250
        bulbs = [{ addr = "192.168.1.40:56700", target = "d0:73:d5:01:02:03" }]

        [cloud]
        api_key = "secret"
        push_every_ticks = 3
    "#;
    let settings = parse_settings(raw).expect("parse");

    assert_eq!(settings.cycle.cycle_time_secs, 30.0);
    assert_eq!(settings.cycle.mode, CycleMode::Alternating);
    assert!(settings.cycle.jitter);
    assert_eq!(settings.cycle.call_timeout_ms, 3000);

    let bridge = settings.bridge.as_ref().expect("bridge");
    let bridge_config = bridge.to_config(&settings.cycle).expect("bridge config");
    assert_eq!(bridge_config.ip, "192.168.1.2");
    assert_eq!(bridge_config.transition, Duration::from_millis(500));

    let lan = settings
        .local_bulb
        .as_ref()
        .expect("lan")
        .to_config(&settings.cycle)
        .expect("lan config");
    assert!(!lan.rapid);
    assert_eq!(lan.ack_timeout, Duration::from_millis(250));
    assert_eq!(lan.bulbs[0].target, [0xd0, 0x73, 0xd5, 0x01, 0x02, 0x03]);
    assert_eq!(lan.broadcast_addr.port(), 56_700);

    let cloud = settings.cloud.as_ref().expect("cloud");
    assert_eq!(cloud.push_every_ticks, 3);
    let cloud_config = cloud.to_config().expect("cloud config");
    assert_eq!(cloud_config.base_url.as_str(), "https://developer-api.govee.com/");
    assert_eq!(cloud_config.requests_per_minute, 100);
}

#[test]
fn alternating_mode_builds_two_hue_progression() {
    let cycle = CycleSection {
        mode: CycleMode::Alternating,
        alternate_every_ticks: 2,
        ..CycleSection::default()
    };
    let settings = cycle.controller_settings();
    assert_eq!(settings.progression.hue_at(1), HueValue::new(39_780));
    assert_eq!(settings.progression.hue_at(3), HueValue::new(56_227));
    assert_eq!(settings.transition, Duration::from_secs(1));
}

#[test]
fn bridge_transition_override_wins() {
    let section = BridgeSection {
        ip: "10.0.0.2".into(),
        username: "user".into(),
        transition_ms: Some(2500),
    };
    let config = section.to_config(&CycleSection::default()).expect("config");
    assert_eq!(config.transition, Duration::from_millis(2500));
}

#[test]
fn env_credentials_enable_vendors() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env(&[
            ("LIGHTSYNC__BRIDGE__IP", "10.0.0.9"),
            ("LIGHTSYNC__BRIDGE__USERNAME", "token"),
            ("LIGHTSYNC__CLOUD__API_KEY", "key"),
            ("LIGHTSYNC__CYCLE__CYCLE_TIME_SECS", "20"),
        ]),
    )
    .expect("overrides");

    let bridge = settings.bridge.expect("bridge enabled");
    assert_eq!(bridge.ip, "10.0.0.9");
    assert_eq!(bridge.username, "token");
    assert_eq!(settings.cloud.expect("cloud enabled").api_key, "key");
    assert_eq!(settings.cycle.cycle_time_secs, 20.0);
    assert!(settings.local_bulb.is_none());
}

#[test]
fn env_override_keeps_file_values_it_does_not_name() {
    let mut settings = parse_settings(
        r#"
        [bridge]
        ip = "192.168.1.2"
        username = "from-file"
        transition_ms = 700
    "#,
    )
    .expect("parse");
    apply_env_overrides(&mut settings, env(&[("LIGHTSYNC__BRIDGE__USERNAME", "from-env")]))
        .expect("overrides");

    let bridge = settings.bridge.expect("bridge");
    assert_eq!(bridge.ip, "192.168.1.2");
    assert_eq!(bridge.username, "from-env");
    assert_eq!(bridge.transition_ms, Some(700));
}

#[test]
fn malformed_env_cycle_time_is_rejected() {
    let mut settings = Settings::default();
    let err = apply_env_overrides(
        &mut settings,
        env(&[("LIGHTSYNC__CYCLE__CYCLE_TIME_SECS", "fast")]),
    )
    .expect_err("not a number");
    assert!(err.to_string().contains("CYCLE_TIME_SECS"));
}

#[test]
fn incomplete_sections_fail_with_a_hint() {
    let err = BridgeSection::default()
        .to_config(&CycleSection::default())
        .expect_err("no ip");
    assert!(err.to_string().contains("LIGHTSYNC__BRIDGE__IP"));

    let err = CloudSection::default().to_config().expect_err("no key");
    assert!(err.to_string().contains("api_key"));

    let lan = LocalBulbSection {
        bulbs: vec![BulbEntry {
            addr: "192.168.1.40:56700".parse().expect("addr"),
            target: "not-a-mac".into(),
        }],
        ..LocalBulbSection::default()
    };
    assert!(lan.to_config(&CycleSection::default()).is_err());
}

#[test]
fn unknown_mode_is_a_parse_error() {
    assert!(parse_settings("[cycle]\nmode = \"strobe\"\n").is_err());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = load_settings(Some(Path::new("/nonexistent/lightctl.toml"))).expect_err("missing");
    assert!(format!("{err:#}").contains("failed to read config"));
}
