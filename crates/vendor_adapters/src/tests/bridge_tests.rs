use super::*;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct BridgeState {
    writes: Arc<Mutex<Vec<(String, Value)>>>,
    failing_lamp: Option<String>,
}

async fn handle_lights(Path(user): Path<String>) -> Json<Value> {
    if user == "stranger" {
        return Json(json!([
            {"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}
        ]));
    }
    Json(json!({
        "1": {"name": "Desk", "state": {"on": false}},
        "2": {"name": "Shelf", "state": {"on": true}}
    }))
}

async fn handle_state(
    State(state): State<BridgeState>,
    Path((_user, lamp)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state
        .writes
        .lock()
        .expect("writes lock")
        .push((lamp.clone(), body));
    if state.failing_lamp.as_deref() == Some(lamp.as_str()) {
        return Json(json!([
            {"error": {"type": 201, "address": "/lights/2/state/hue", "description": "device is set to off"}}
        ]));
    }
    Json(json!([{"success": {"/lights/state": "ok"}}]))
}

async fn spawn_bridge(state: BridgeState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/:user/lights", get(handle_lights))
        .route("/api/:user/lights/:lamp/state", put(handle_state))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn writes(state: &BridgeState) -> Vec<(String, Value)> {
    state.writes.lock().expect("writes lock").clone()
}

#[tokio::test]
async fn connect_enumerates_lamps() {
    let base = spawn_bridge(BridgeState::default()).await;
    let adapter = BridgeLampAdapter::connect(BridgeConfig::new(base, "linked"))
        .await
        .expect("connect");

    assert_eq!(adapter.device_count(), 2);
    assert_eq!(
        adapter.lamps()[0],
        LampHandle {
            id: "1".into(),
            name: "Desk".into()
        }
    );
}

#[tokio::test]
async fn connect_with_unknown_user_is_unauthorized() {
    let base = spawn_bridge(BridgeState::default()).await;
    let err = BridgeLampAdapter::connect(BridgeConfig::new(base, "stranger"))
        .await
        .err()
        .expect("must fail");
    assert!(matches!(err, AdapterError::Unauthorized(_)), "{err}");
}

#[tokio::test]
async fn apply_all_sends_one_combined_write_per_lamp() {
    let state = BridgeState::default();
    let base = spawn_bridge(state.clone()).await;
    let adapter = BridgeLampAdapter::connect(BridgeConfig::new(base, "linked"))
        .await
        .expect("connect");

    adapter
        .apply_all(
            &LightState::new()
                .with_power(true)
                .with_brightness(999)
                .with_saturation(Saturation::FULL)
                .with_color(ColorTarget::Hue(HueValue::new(4369))),
        )
        .await
        .expect("apply");

    let writes = writes(&state);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].0, "1");
    assert_eq!(writes[1].0, "2");
    assert_eq!(
        writes[0].1,
        json!({"on": true, "bri": 254, "sat": 254, "hue": 4369, "transitiontime": 10})
    );
}

#[tokio::test]
async fn rgb_targets_are_sent_as_hue_and_saturation() {
    let state = BridgeState::default();
    let base = spawn_bridge(state.clone()).await;
    let adapter = BridgeLampAdapter::with_lamps(
        BridgeConfig::new(base, "linked"),
        vec![LampHandle {
            id: "7".into(),
            name: "Porch".into(),
        }],
    )
    .expect("adapter");

    adapter
        .set_color_all(RgbColor::new(0, 0, 255))
        .await
        .expect("color");
    adapter.set_color_all(RgbColor::WHITE).await.expect("white");

    let writes = writes(&state);
    assert_eq!(writes[0].1["hue"], 43691);
    assert_eq!(writes[0].1["sat"], 254);
    assert_eq!(writes[1].1["sat"], 0);
}

#[tokio::test]
async fn failing_lamp_does_not_skip_the_rest() {
    let state = BridgeState {
        failing_lamp: Some("1".into()),
        ..BridgeState::default()
    };
    let base = spawn_bridge(state.clone()).await;
    let adapter = BridgeLampAdapter::connect(BridgeConfig::new(base, "linked"))
        .await
        .expect("connect");

    let err = adapter.power_all(false).await.expect_err("lamp 1 fails");
    assert!(matches!(err, AdapterError::InvalidResponse(_)), "{err}");
    assert_eq!(writes(&state).len(), 2);
}

#[tokio::test]
async fn unreachable_bridge_maps_to_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = BridgeLampAdapter::connect(BridgeConfig::new(format!("http://{addr}"), "linked"))
        .await
        .err()
        .expect("must fail");
    assert!(matches!(err, AdapterError::Unreachable(_)), "{err}");
}

#[test]
fn error_reply_parsing() {
    assert!(parse_reply(&json!([{"success": {}}])).is_ok());
    assert!(matches!(
        parse_reply(&json!({"not": "a list"})),
        Err(AdapterError::InvalidResponse(_))
    ));
    assert!(matches!(
        parse_reply(&json!([{"error": {"type": 1, "description": "unauthorized user"}}])),
        Err(AdapterError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn configured_transition_applies_to_every_write() {
    let state = BridgeState::default();
    let base = spawn_bridge(state.clone()).await;
    let mut config = BridgeConfig::new(base, "linked");
    config.transition = Duration::from_secs(5);
    let adapter = BridgeLampAdapter::with_lamps(
        config,
        vec![LampHandle {
            id: "3".into(),
            name: "Hall".into(),
        }],
    )
    .expect("adapter");

    // the state a cycle tick sends
    adapter
        .apply_all(&LightState::new().with_color(ColorTarget::Hue(HueValue::new(4369))))
        .await
        .expect("tick");
    adapter.set_brightness_all(100).await.expect("brightness");

    let writes = writes(&state);
    assert_eq!(writes[0].1, json!({"hue": 4369, "transitiontime": 50}));
    assert_eq!(writes[1].1["transitiontime"], 50);
}
