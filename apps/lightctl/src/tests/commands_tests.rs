use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::{
    domain::{BrightnessScale, HueValue, RgbColor, Saturation, Vendor},
    error::AdapterError,
};
use sync_core::ControllerSettings;
use vendor_adapters::DeviceAdapter;

use super::*;

#[derive(Default)]
struct Log {
    power: Vec<bool>,
    brightness: Vec<u16>,
    colors: Vec<RgbColor>,
}

struct ScriptedAdapter {
    vendor: Vendor,
    log: Arc<Mutex<Log>>,
    fail: bool,
}

impl ScriptedAdapter {
    fn new(vendor: Vendor, fail: bool) -> (Arc<dyn DeviceAdapter>, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let adapter = Self {
            vendor,
            log: log.clone(),
            fail,
        };
        (Arc::new(adapter), log)
    }

    fn record(&self, apply: impl FnOnce(&mut Log)) -> Result<(), AdapterError> {
        apply(&mut self.log.lock().expect("log lock"));
        if self.fail {
            Err(AdapterError::unauthorized("bad key"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceAdapter for ScriptedAdapter {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn name(&self) -> &str {
        self.vendor.as_str()
    }

    fn brightness_scale(&self) -> BrightnessScale {
        BrightnessScale::new(1, 254)
    }

    fn device_count(&self) -> usize {
        2
    }

    async fn power_all(&self, on: bool) -> Result<(), AdapterError> {
        self.record(|log| log.power.push(on))
    }

    async fn set_brightness_all(&self, level: u16) -> Result<(), AdapterError> {
        self.record(|log| log.brightness.push(level))
    }

    async fn set_saturation_all(&self, _saturation: Saturation) -> Result<(), AdapterError> {
        self.record(|_| {})
    }

    async fn set_hue_all(&self, _hue: HueValue) -> Result<(), AdapterError> {
        self.record(|_| {})
    }

    async fn set_color_all(&self, color: RgbColor) -> Result<(), AdapterError> {
        self.record(|log| log.colors.push(color))
    }
}

fn controller_with(adapters: Vec<Arc<dyn DeviceAdapter>>) -> LightController {
    adapters
        .into_iter()
        .fold(LightController::builder(ControllerSettings::default()), |b, a| b.adapter(a))
        .build()
}

#[test]
fn parses_actions_case_insensitively() {
    assert_eq!("START".parse::<Action>(), Ok(Action::Start));
    assert_eq!(" jitter ".parse::<Action>(), Ok(Action::Jitter));
    assert_eq!("exit".parse::<Action>(), Ok(Action::Quit));
    let err = "strobe".parse::<Action>().expect_err("unknown");
    assert!(err.contains("unknown action 'strobe'"));
}

#[tokio::test]
async fn once_actions_map_to_controller_operations() {
    let (bridge, log) = ScriptedAdapter::new(Vendor::Bridge, false);
    let controller = controller_with(vec![bridge]);

    apply_once(&controller, OnceAction::Max).await.expect("max");
    apply_once(&controller, OnceAction::Dim).await.expect("dim");
    apply_once(&controller, OnceAction::White).await.expect("white");
    apply_once(&controller, OnceAction::Off).await.expect("off");

    let log = log.lock().expect("log lock");
    assert_eq!(log.power, vec![true, false]);
    assert_eq!(log.brightness, vec![254, 1, 254]);
    assert_eq!(log.colors, vec![RgbColor::WHITE, RgbColor::WHITE]);
    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn jitter_action_reports_new_state() {
    let (bridge, _) = ScriptedAdapter::new(Vendor::Bridge, false);
    let controller = controller_with(vec![bridge]);

    let on = execute(&controller, Action::Jitter).await.expect("toggle");
    assert_eq!(on, "brightness jitter on");
    let off = execute(&controller, Action::Jitter).await.expect("toggle");
    assert_eq!(off, "brightness jitter off");
}

#[tokio::test]
async fn status_lists_adapters() {
    let (bridge, _) = ScriptedAdapter::new(Vendor::Bridge, false);
    let (cloud, _) = ScriptedAdapter::new(Vendor::Cloud, false);
    let controller = controller_with(vec![bridge, cloud]);

    let status = execute(&controller, Action::Status).await.expect("status");
    assert!(status.starts_with("running=false tick=0 hue=0 jitter=off"));
    assert!(status.contains("bridge (bridge) every 1 tick(s)"));
    assert!(status.contains("cloud (cloud) every 1 tick(s)"));
}

#[tokio::test]
async fn start_without_adapters_surfaces_the_error() {
    let controller = controller_with(Vec::new());
    let err = execute(&controller, Action::Start).await.expect_err("no adapters");
    assert_eq!(err, ControllerError::NoAdapters);
}

#[tokio::test]
async fn interactive_session_reports_errors_and_keeps_going() {
    let (bridge, log) = ScriptedAdapter::new(Vendor::Bridge, false);
    let (cloud, _) = ScriptedAdapter::new(Vendor::Cloud, true);
    let controller = controller_with(vec![bridge, cloud]);

    let input: &[u8] = b"strobe\n\nmax\nquit\nstart\n";
    let mut output = Vec::new();
    interactive(&controller, input, &mut output)
        .await
        .expect("session");

    let transcript = String::from_utf8(output).expect("utf8");
    assert!(transcript.contains("error: unknown action 'strobe'"));
    assert!(transcript.contains("error: 1 adapter(s) failed"));
    assert!(transcript.contains("cloud adapter 'cloud' failed: unauthorized: bad key"));
    assert!(transcript.trim_end().ends_with("bye"));

    // quit ends the session before the trailing start
    assert!(!controller.is_running().await);
    assert_eq!(log.lock().expect("log lock").brightness, vec![254]);
}
