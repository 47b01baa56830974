//! Frame pacing and the authoritative tick loop

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::session::RegistryEvent;

use super::snapshot::Broadcaster;
use super::world::{World, WorldError};

/// Frame deltas averaged when adjusting the sleep
const PACER_SAMPLES: usize = 15;
/// Sleep never drops below this, whatever the target rate
const MIN_FRAME_DELAY: f64 = 1.0 / 250.0;

/// Keeps the loop close to its target frame rate
///
/// Sleep overhead makes the real frame longer than the requested delay, so
/// the delay is nudged by 1% of the nominal frame time whenever the recent
/// average strays more than 5% from the target.
#[derive(Debug)]
pub struct FramePacer {
    frames_per_second: f64,
    base_delay: f64,
    delay: f64,
    samples: VecDeque<f64>,
}

impl FramePacer {
    pub fn new(frames_per_second: u32) -> Self {
        let frames_per_second = f64::from(frames_per_second.max(1));
        let base_delay = 1.0 / frames_per_second;
        Self {
            frames_per_second,
            base_delay,
            delay: base_delay.max(MIN_FRAME_DELAY),
            samples: VecDeque::with_capacity(PACER_SAMPLES),
        }
    }

    /// Sleep requested before the next frame
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }

    /// Feed the measured length of the last frame in seconds
    pub fn record(&mut self, delta: f64) {
        if self.samples.len() == PACER_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(delta);

        let average = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let ratio = average * self.frames_per_second;
        if ratio < 0.95 {
            self.delay += self.base_delay * 0.01;
        } else if ratio > 1.05 {
            self.delay -= self.base_delay * 0.01;
        }
        self.delay = self.delay.max(MIN_FRAME_DELAY);
    }
}

/// Owns the world and drives it one frame at a time
pub struct FrameClock {
    world: World,
    broadcaster: Broadcaster,
    events: mpsc::UnboundedReceiver<RegistryEvent>,
    pacer: FramePacer,
    min_players: usize,
    fps_log_interval: Duration,
}

impl FrameClock {
    pub fn new(
        world: World,
        events: mpsc::UnboundedReceiver<RegistryEvent>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            world,
            broadcaster: Broadcaster::new(config.updates_per_second),
            events,
            pacer: FramePacer::new(config.frames_per_second),
            min_players: config.min_players,
            fps_log_interval: Duration::from_secs(config.fps_log_secs.max(1)),
        }
    }

    /// One frame: seat arrivals, maybe start a round, simulate, maybe publish
    pub fn on_frame(&mut self, dt: f32) -> Result<(), WorldError> {
        while let Ok(event) = self.events.try_recv() {
            self.world.apply_event(event);
        }

        if !self.world.is_ongoing() && self.world.player_count() >= self.min_players {
            // Clients see the final state of the last round, then the new layout
            self.broadcaster.publish(&self.world);
            self.world.start_round()?;
            self.broadcaster.publish(&self.world);
        }

        if self.world.is_ongoing() {
            self.world.tick(dt);
        } else {
            self.world.discard_idle_commands();
        }

        if self.broadcaster.due(dt) {
            self.broadcaster.publish(&self.world);
        }
        Ok(())
    }

    /// Run the authoritative loop until round setup fails
    pub async fn run(mut self) -> Result<(), WorldError> {
        info!(
            fps = self.pacer.frames_per_second,
            min_players = self.min_players,
            "Tick loop started"
        );

        let mut last_frame = Instant::now();
        let mut last_log = last_frame;
        let mut frames: u32 = 0;
        let mut slowest = Duration::ZERO;

        loop {
            tokio::time::sleep(self.pacer.delay()).await;

            let now = Instant::now();
            let delta = now.duration_since(last_frame);
            last_frame = now;

            self.pacer.record(delta.as_secs_f64());
            self.on_frame(delta.as_secs_f32())?;

            frames += 1;
            slowest = slowest.max(delta);
            let since_log = now.duration_since(last_log);
            if since_log >= self.fps_log_interval {
                info!(
                    fps = %format!("{:.1}", f64::from(frames) / since_log.as_secs_f64()),
                    min_fps = %format!("{:.1}", 1.0 / slowest.as_secs_f64().max(f64::EPSILON)),
                    players = self.world.player_count(),
                    alive = self.world.alive_count(),
                    "Frame rate"
                );
                debug!(delay_ms = self.pacer.delay().as_secs_f64() * 1000.0, "Pacer delay");
                frames = 0;
                slowest = Duration::ZERO;
                last_log = now;
            }
        }
    }
}
