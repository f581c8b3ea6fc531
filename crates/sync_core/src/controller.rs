use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use futures::future::join_all;
use shared::{
    domain::{BrightnessScale, ColorTarget, CycleState, LightState, Saturation, Vendor},
    error::{AdapterError, ControllerError, VendorFailure},
};
use tokio::{
    sync::{Mutex, Notify},
    task::JoinHandle,
};
use tracing::{error, info, warn};
use vendor_adapters::DeviceAdapter;

use crate::{
    jitter::{JitterSource, RandomJitter},
    progression::HueProgression,
    scheduler::CycleScheduler,
    ticker::{IntervalTicker, Ticker},
};

pub const DEFAULT_MAX_JITTER: f32 = 0.3;
/// Native level used by [`LightController::dim`] on every vendor.
pub const DIM_LEVEL: u16 = 1;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub progression: HueProgression,
    /// Pause between ticks. Fades are configured per adapter.
    pub transition: Duration,
    /// Upper bound on any single adapter call.
    pub call_timeout: Duration,
    pub max_jitter: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            progression: HueProgression::default(),
            transition: Duration::from_secs(1),
            call_timeout: Duration::from_secs(3),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

pub(crate) struct RegisteredAdapter {
    pub(crate) adapter: Arc<dyn DeviceAdapter>,
    /// The adapter receives cycle updates on every Nth tick only.
    pub(crate) push_every_ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub vendor: Vendor,
    pub name: String,
    pub push_every_ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub cycle: CycleState,
    pub adapters: Vec<AdapterSummary>,
}

struct ActiveCycle {
    handle: JoinHandle<()>,
    stop: Arc<Notify>,
}

pub(crate) struct Shared {
    pub(crate) adapters: Vec<RegisteredAdapter>,
    pub(crate) settings: ControllerSettings,
    pub(crate) cycle: Mutex<CycleState>,
    /// Last native brightness successfully pushed, per adapter index.
    pub(crate) last_brightness: Mutex<HashMap<usize, u16>>,
    pub(crate) jitter: Mutex<Box<dyn JitterSource>>,
    active: Mutex<Option<ActiveCycle>>,
}

pub struct ControllerBuilder {
    settings: ControllerSettings,
    adapters: Vec<RegisteredAdapter>,
    jitter: Box<dyn JitterSource>,
    jitter_enabled: bool,
}

impl ControllerBuilder {
    pub fn adapter(self, adapter: Arc<dyn DeviceAdapter>) -> Self {
        self.throttled_adapter(adapter, 1)
    }

    /// Registers an adapter that only receives every `push_every_ticks`-th
    /// cycle update. User actions and start/stop always reach it.
    pub fn throttled_adapter(mut self, adapter: Arc<dyn DeviceAdapter>, push_every_ticks: u64) -> Self {
        self.adapters.push(RegisteredAdapter {
            adapter,
            push_every_ticks: push_every_ticks.max(1),
        });
        self
    }

    pub fn jitter_source(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    pub fn jitter_enabled(mut self, enabled: bool) -> Self {
        self.jitter_enabled = enabled;
        self
    }

    pub fn build(self) -> LightController {
        LightController {
            inner: Arc::new(Shared {
                adapters: self.adapters,
                settings: self.settings,
                cycle: Mutex::new(CycleState {
                    brightness_jitter_enabled: self.jitter_enabled,
                    ..CycleState::default()
                }),
                last_brightness: Mutex::new(HashMap::new()),
                jitter: Mutex::new(self.jitter),
                active: Mutex::new(None),
            }),
        }
    }
}

/// Drives every registered adapter from one synchronized cycle state.
///
/// Cheap to clone; clones share the same adapters and cycle. Every fan-out
/// reaches all adapters even if some of them fail, and failures are
/// aggregated into [`ControllerError::PartialFailure`].
#[derive(Clone)]
pub struct LightController {
    pub(crate) inner: Arc<Shared>,
}

impl LightController {
    pub fn builder(settings: ControllerSettings) -> ControllerBuilder {
        ControllerBuilder {
            settings,
            adapters: Vec::new(),
            jitter: Box::new(RandomJitter::new()),
            jitter_enabled: false,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    pub async fn is_running(&self) -> bool {
        self.inner.cycle.lock().await.running
    }

    pub async fn status(&self) -> ControllerStatus {
        ControllerStatus {
            cycle: self.inner.cycle.lock().await.clone(),
            adapters: self
                .inner
                .adapters
                .iter()
                .map(|registered| AdapterSummary {
                    vendor: registered.adapter.vendor(),
                    name: registered.adapter.name().to_string(),
                    push_every_ticks: registered.push_every_ticks,
                })
                .collect(),
        }
    }

    /// Powers everything on at full brightness and starts the cycle loop on
    /// a wall-clock ticker.
    pub async fn start(&self) -> Result<(), ControllerError> {
        let ticker = IntervalTicker::new(self.inner.settings.transition);
        self.start_with_ticker(ticker).await
    }

    pub async fn start_with_ticker<T: Ticker + 'static>(&self, ticker: T) -> Result<(), ControllerError> {
        let mut active = self.inner.active.lock().await;
        if active.is_some() && self.is_running().await {
            info!("cycle: start ignored, already running");
            return Ok(());
        }

        let failures = self.activate().await?;
        let stop = Arc::new(Notify::new());
        let scheduler = CycleScheduler::new(self.clone());
        let handle = tokio::spawn(scheduler.run(ticker, stop.clone()));
        *active = Some(ActiveCycle { handle, stop });

        report(failures)
    }

    /// Moves Stopped -> Running without spawning the loop, for callers that
    /// drive [`CycleScheduler::tick`] themselves.
    ///
    /// Returns the per-adapter failures of the power-on fan-out. The cycle
    /// still enters Running when some adapters fail.
    pub async fn activate(&self) -> Result<Vec<VendorFailure>, ControllerError> {
        if self.inner.adapters.is_empty() {
            error!("cycle: cannot start without any registered adapters");
            return Err(ControllerError::NoAdapters);
        }
        if self.is_running().await {
            return Ok(Vec::new());
        }

        let calls = self.inner.adapters.iter().enumerate().map(|(index, registered)| async move {
            let adapter = &registered.adapter;
            let max = adapter.brightness_scale().max;
            let mut failures = Vec::new();

            if let Err(failure) = self.guarded(registered, adapter.power_all(true)).await {
                failures.push(failure);
            }
            match self.guarded(registered, adapter.set_brightness_all(max)).await {
                Ok(()) => {
                    self.inner.last_brightness.lock().await.insert(index, max);
                }
                Err(failure) => failures.push(failure),
            }
            if let Err(failure) = self
                .guarded(registered, adapter.set_saturation_all(Saturation::FULL))
                .await
            {
                failures.push(failure);
            }
            failures
        });
        let failures: Vec<_> = join_all(calls).await.into_iter().flatten().collect();

        let mut cycle = self.inner.cycle.lock().await;
        cycle.reset();
        cycle.running = true;
        info!(
            adapters = self.inner.adapters.len(),
            failed = failures.len(),
            "cycle: running"
        );
        Ok(failures)
    }

    /// Stops the cycle after its in-flight tick, then powers everything off.
    /// A no-op when already stopped.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let mut active = self.inner.active.lock().await;
        let was_running = {
            let mut cycle = self.inner.cycle.lock().await;
            let was_running = cycle.running;
            cycle.reset();
            was_running
        };

        if let Some(ActiveCycle { handle, stop }) = active.take() {
            stop.notify_one();
            if let Err(err) = handle.await {
                warn!(error = %err, "cycle: scheduler task ended abnormally");
            }
        }
        if !was_running {
            return Ok(());
        }

        let failures = self
            .fan_out(|_| LightState::new().with_power(false))
            .await;
        info!(failed = failures.len(), "cycle: stopped");
        report(failures)
    }

    /// Powers every adapter off without touching the cycle.
    pub async fn power_off(&self) -> Result<(), ControllerError> {
        report(
            self.fan_out(|_| LightState::new().with_power(false))
                .await,
        )
    }

    /// Minimum brightness, no saturation.
    pub async fn dim(&self) -> Result<(), ControllerError> {
        report(
            self.fan_out(|scale| {
                LightState::new()
                    .with_brightness(scale.clamp(DIM_LEVEL))
                    .with_saturation(Saturation::NONE)
                    .with_color(ColorTarget::White)
            })
            .await,
        )
    }

    /// Full brightness and full saturation.
    pub async fn set_max(&self) -> Result<(), ControllerError> {
        report(
            self.fan_out(|scale| {
                LightState::new()
                    .with_power(true)
                    .with_brightness(scale.max)
                    .with_saturation(Saturation::FULL)
            })
            .await,
        )
    }

    /// Full-brightness white.
    pub async fn set_white(&self) -> Result<(), ControllerError> {
        report(
            self.fan_out(|scale| {
                LightState::new()
                    .with_brightness(scale.max)
                    .with_saturation(Saturation::NONE)
                    .with_color(ColorTarget::White)
            })
            .await,
        )
    }

    /// Flips brightness jitter and returns the new setting.
    pub async fn toggle_jitter(&self) -> bool {
        let mut cycle = self.inner.cycle.lock().await;
        cycle.brightness_jitter_enabled = !cycle.brightness_jitter_enabled;
        info!(enabled = cycle.brightness_jitter_enabled, "cycle: jitter toggled");
        cycle.brightness_jitter_enabled
    }

    pub async fn set_jitter(&self, enabled: bool) {
        self.inner.cycle.lock().await.brightness_jitter_enabled = enabled;
    }

    /// Applies a state built from each adapter's scale to every adapter
    /// concurrently, refreshing the brightness cache on success.
    async fn fan_out(&self, build: impl Fn(BrightnessScale) -> LightState) -> Vec<VendorFailure> {
        let calls = self.inner.adapters.iter().enumerate().map(|(index, registered)| {
            let state = build(registered.adapter.brightness_scale());
            async move {
                let result = self
                    .guarded(registered, registered.adapter.apply_all(&state))
                    .await;
                (index, state.brightness, result)
            }
        });
        self.settle(join_all(calls).await).await
    }

    /// Records cached brightness for successful calls and collects failures.
    pub(crate) async fn settle(
        &self,
        results: Vec<(usize, Option<u16>, Result<(), VendorFailure>)>,
    ) -> Vec<VendorFailure> {
        let mut cache = self.inner.last_brightness.lock().await;
        let mut failures = Vec::new();
        for (index, brightness, result) in results {
            match result {
                Ok(()) => {
                    if let Some(level) = brightness {
                        cache.insert(index, level);
                    }
                }
                Err(failure) => {
                    // the device may or may not have applied it
                    cache.remove(&index);
                    failures.push(failure);
                }
            }
        }
        failures
    }

    /// Bounds one adapter call by the call timeout and tags its failure.
    pub(crate) async fn guarded(
        &self,
        registered: &RegisteredAdapter,
        call: impl Future<Output = Result<(), AdapterError>>,
    ) -> Result<(), VendorFailure> {
        let timeout = self.inner.settings.call_timeout;
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::unreachable(format!(
                "no reply within {}ms",
                timeout.as_millis()
            ))),
        };

        result.map_err(|error| {
            let adapter = &registered.adapter;
            warn!(
                vendor = %adapter.vendor(),
                adapter = adapter.name(),
                error = %error,
                "adapter call failed"
            );
            VendorFailure {
                vendor: adapter.vendor(),
                adapter: adapter.name().to_string(),
                error,
            }
        })
    }
}

fn report(failures: Vec<VendorFailure>) -> Result<(), ControllerError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ControllerError::PartialFailure(failures))
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
