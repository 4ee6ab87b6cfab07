use std::time::{Duration, Instant};

/// Per-tick work counters. The loop resets one instance before every tick
/// and passes it by reference into update and render; nothing is global.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickDiagnostics {
    pub solids_tested: u32,
    pub collision_responses: u32,
    pub enemies_updated: u32,
    /// Cross-entity overlaps that produced a response.
    pub contacts: u32,
    pub draw_commands: u32,
}

impl TickDiagnostics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Peak collision responses seen in a single tick during the interval.
    pub peak_collision_responses: u32,
    /// Draw commands of the most recent frame.
    pub draw_commands: u32,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
    peak_collision_responses: u32,
    draw_commands: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            peak_collision_responses: 0,
            draw_commands: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, diagnostics: &TickDiagnostics) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.draw_commands = diagnostics.draw_commands;
    }

    pub(crate) fn record_tick(&mut self, diagnostics: &TickDiagnostics) {
        self.ticks = self.ticks.saturating_add(1);
        self.peak_collision_responses = self
            .peak_collision_responses
            .max(diagnostics.collision_responses);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            peak_collision_responses: self.peak_collision_responses,
            draw_commands: self.draw_commands,
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.frame_time_sum = Duration::ZERO;
        self.peak_collision_responses = 0;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_every_counter() {
        let mut diagnostics = TickDiagnostics {
            solids_tested: 4,
            collision_responses: 1,
            enemies_updated: 2,
            contacts: 1,
            draw_commands: 30,
        };
        diagnostics.reset();
        assert_eq!(diagnostics, TickDiagnostics::default());
    }

    #[test]
    fn snapshot_computes_expected_values() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        let idle = TickDiagnostics::default();
        let busy = TickDiagnostics {
            collision_responses: 2,
            draw_commands: 12,
            ..TickDiagnostics::default()
        };

        accumulator.record_frame(Duration::from_millis(16), &idle);
        accumulator.record_frame(Duration::from_millis(16), &busy);
        accumulator.record_tick(&idle);
        accumulator.record_tick(&busy);
        accumulator.record_tick(&idle);
        accumulator.record_tick(&idle);

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert_eq!(snapshot.peak_collision_responses, 2);
        assert_eq!(snapshot.draw_commands, 12);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        accumulator.record_frame(Duration::from_millis(16), &TickDiagnostics::default());

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn peak_resets_between_intervals() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        accumulator.record_tick(&TickDiagnostics {
            collision_responses: 3,
            ..TickDiagnostics::default()
        });
        accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first");
        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(3))
            .expect("second");
        assert_eq!(second.peak_collision_responses, 0);
    }
}
