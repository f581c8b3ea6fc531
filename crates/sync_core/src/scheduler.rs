use std::sync::Arc;

use futures::future::join_all;
use shared::{
    domain::{ColorTarget, HueValue, LightState, Saturation, Vendor},
    error::VendorFailure,
};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::{controller::LightController, ticker::Ticker};

/// Outcome of one cycle tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 1-based tick number since the cycle started.
    pub tick: u64,
    pub hue: HueValue,
    /// Fraction of full brightness pushed this tick (`1.0` without jitter).
    pub brightness_fraction: f32,
    /// Adapters that received this tick's update, failed or not.
    pub pushed: Vec<Vendor>,
    /// Adapters skipped by their throttle.
    pub skipped: Vec<Vendor>,
    pub failures: Vec<VendorFailure>,
}

/// Advances the hue each tick and broadcasts it to every adapter.
pub struct CycleScheduler {
    controller: LightController,
}

impl CycleScheduler {
    pub fn new(controller: LightController) -> Self {
        Self { controller }
    }

    /// Runs until the controller leaves Running.
    ///
    /// `running` is checked only between ticks; an in-flight tick always
    /// completes. `stop` cuts the wait for the next boundary short.
    pub async fn run<T: Ticker>(mut self, mut ticker: T, stop: Arc<Notify>) {
        info!("cycle: scheduler started");
        while self.tick().await.is_some() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.notified() => {}
            }
        }
        info!("cycle: scheduler exited");
    }

    /// Performs one tick, or returns `None` when the controller is stopped.
    pub async fn tick(&mut self) -> Option<TickReport> {
        let shared = &self.controller.inner;
        let settings = &shared.settings;

        let (tick, hue, jitter_enabled) = {
            let mut cycle = shared.cycle.lock().await;
            if !cycle.running {
                return None;
            }
            cycle.tick += 1;
            cycle.current_hue = settings.progression.hue_at(cycle.tick);
            (cycle.tick, cycle.current_hue, cycle.brightness_jitter_enabled)
        };

        let delta = if jitter_enabled {
            shared.jitter.lock().await.next_delta(settings.max_jitter)
        } else {
            0.0
        };
        let brightness_fraction = 1.0 - delta;

        let cached = shared.last_brightness.lock().await.clone();
        let mut pushed = Vec::new();
        let mut skipped = Vec::new();
        let mut calls = Vec::new();

        for (index, registered) in shared.adapters.iter().enumerate() {
            let vendor = registered.adapter.vendor();
            if tick % registered.push_every_ticks != 0 {
                skipped.push(vendor);
                continue;
            }
            pushed.push(vendor);

            let level = registered
                .adapter
                .brightness_scale()
                .from_fraction(brightness_fraction);
            // full saturation every tick, so an earlier dim or white does not
            // leave the cycle desaturated
            let mut state = LightState::new()
                .with_saturation(Saturation::FULL)
                .with_color(ColorTarget::Hue(hue));
            if cached.get(&index) != Some(&level) {
                state.brightness = Some(level);
            }

            let controller = &self.controller;
            calls.push(async move {
                let result = controller
                    .guarded(registered, registered.adapter.apply_all(&state))
                    .await;
                (index, state.brightness, result)
            });
        }

        let failures = self.controller.settle(join_all(calls).await).await;
        debug!(
            tick,
            hue = hue.get(),
            brightness = brightness_fraction,
            pushed = pushed.len(),
            failed = failures.len(),
            "cycle: tick"
        );

        Some(TickReport {
            tick,
            hue,
            brightness_fraction,
            pushed,
            skipped,
            failures,
        })
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
