use std::time::{Duration, Instant};
use crate::drivers::buffer::{lock_store, SharedStore};
use crate::types::{PlotPoint, PlotSink, SeriesFrame};
/// Outcome of one render tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub elapsed: Duration,
    pub synthesized: usize,
    pub rendered: bool,
}
/// Periodic consumer of the shared store: fills gaps, then hands a fresh
/// snapshot to the plot sink only when something changed since the last render.
pub struct RenderDriver {
    store: SharedStore,
    interval: Duration,
    started_at: Instant,
}
impl RenderDriver {
    pub fn new(store: SharedStore, interval: Duration, started_at: Instant) -> Self {
        Self {
            store,
            interval,
            started_at,
        }
    }
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
    pub fn tick(&mut self, now: Instant, sink: &mut dyn PlotSink) -> TickReport {
        let elapsed = self.elapsed(now);
        // Synthesis and snapshot share one lock so the frame matches the write count.
        let (synthesized, pending) = {
            let mut store = lock_store(&self.store);
            let synthesized = store.synthesize_gaps(self.interval, now);
            if synthesized > 0 {
                log::debug!("held last reading for {synthesized} missed interval(s)");
            }
            let pending = store
                .is_dirty()
                .then(|| (store.write_count(), store.snapshot()));
            (synthesized, pending)
        };
        let mut report = TickReport {
            elapsed,
            synthesized,
            rendered: false,
        };
        let Some((write_count, points)) = pending else {
            return report;
        };
        let Some(frame) = build_frame(&points, self.interval) else {
            return report;
        };
        match sink.on_snapshot_ready(&frame) {
            Ok(()) => {
                lock_store(&self.store).mark_rendered(write_count);
                report.rendered = true;
            }
            Err(err) => log::warn!("render tick failed: {err}"),
        }
        report
    }
}
/// Split points into plot series; the x range ends two intervals past the newest point.
pub fn build_frame(points: &[PlotPoint], interval: Duration) -> Option<SeriesFrame> {
    let first = points.first()?;
    let last = points.last()?;
    Some(SeriesFrame {
        times: points.iter().map(|p| p.relative_time).collect(),
        pressures: points.iter().map(|p| p.pressure).collect(),
        temperatures: points.iter().map(|p| p.temperature).collect(),
        x_min: first.relative_time,
        x_max: last.relative_time + 2.0 * interval.as_secs_f64(),
    })
}
/// Fixed-period gate for the UI frame loop, independent of how often frames run.
pub struct TickClock {
    period: Duration,
    next_due: Instant,
}
impl TickClock {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next_due: start,
        }
    }
    /// True at most once per period. After a long stall the schedule restarts
    /// from `now` instead of firing a burst of catch-up ticks.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.period;
        if self.next_due <= now {
            self.next_due = now + self.period;
        }
        true
    }
    pub fn until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }
}
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::buffer::SampleStore;
    use crate::drivers::MonitorError;
    use crate::types::Reading;
    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<SeriesFrame>,
        fail_next: bool,
    }
    impl PlotSink for RecordingSink {
        fn on_snapshot_ready(&mut self, frame: &SeriesFrame) -> Result<(), MonitorError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(MonitorError::Render("canvas gone".into()));
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }
    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }
    fn reading(p: f64, t: f64) -> Reading {
        Reading {
            pressure: p,
            temperature: t,
        }
    }
    #[test]
    fn no_data_means_no_render() {
        let t0 = Instant::now();
        let store = SampleStore::shared(10).unwrap();
        let mut driver = RenderDriver::new(store, ms(100), t0);
        let mut sink = RecordingSink::default();
        let report = driver.tick(t0 + ms(1500), &mut sink);
        assert_eq!(report.elapsed, ms(1500));
        assert!(!report.rendered);
        assert!(sink.frames.is_empty());
    }
    #[test]
    fn renders_only_when_dirty() {
        let t0 = Instant::now();
        let store = SampleStore::shared(10).unwrap();
        let mut driver = RenderDriver::new(store.clone(), ms(100), t0);
        let mut sink = RecordingSink::default();
        lock_store(&store).insert_real(reading(300.5, 150.2), t0);
        assert!(driver.tick(t0 + ms(50), &mut sink).rendered);
        assert!(!lock_store(&store).is_dirty());
        // Still inside the first interval: nothing new to draw.
        assert!(!driver.tick(t0 + ms(90), &mut sink).rendered);
        assert_eq!(sink.frames.len(), 1);
        let frame = &sink.frames[0];
        assert_eq!(frame.times, vec![0.0]);
        assert_eq!(frame.pressures, vec![300.5]);
        assert_eq!(frame.temperatures, vec![150.2]);
        assert_eq!(frame.x_min, 0.0);
        assert!((frame.x_max - 0.2).abs() < 1e-9);
    }
    #[test]
    fn silence_is_filled_and_redrawn() {
        let t0 = Instant::now();
        let store = SampleStore::shared(10).unwrap();
        let mut driver = RenderDriver::new(store.clone(), ms(100), t0);
        let mut sink = RecordingSink::default();
        lock_store(&store).insert_real(reading(1.0, 2.0), t0);
        driver.tick(t0, &mut sink);
        let report = driver.tick(t0 + ms(350), &mut sink);
        assert_eq!(report.synthesized, 3);
        assert!(report.rendered);
        let frame = sink.frames.last().unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.pressures, vec![1.0; 4]);
        assert!((frame.x_max - 0.5).abs() < 1e-9);
    }
    #[test]
    fn failed_render_keeps_store_dirty_for_retry() {
        let t0 = Instant::now();
        let store = SampleStore::shared(10).unwrap();
        let mut driver = RenderDriver::new(store.clone(), ms(100), t0);
        let mut sink = RecordingSink {
            fail_next: true,
            ..Default::default()
        };
        lock_store(&store).insert_real(reading(1.0, 2.0), t0);
        assert!(!driver.tick(t0 + ms(10), &mut sink).rendered);
        assert!(lock_store(&store).is_dirty());
        assert!(driver.tick(t0 + ms(20), &mut sink).rendered);
        assert_eq!(sink.frames.len(), 1);
    }
    #[test]
    fn wrapped_frame_bounds_follow_oldest_point() {
        let t0 = Instant::now();
        let store = SampleStore::shared(3).unwrap();
        let mut driver = RenderDriver::new(store.clone(), ms(100), t0);
        let mut sink = RecordingSink::default();
        for i in 0..5u64 {
            lock_store(&store).insert_real(reading(i as f64, 0.0), t0 + ms(i * 100));
        }
        driver.tick(t0 + ms(450), &mut sink);
        let frame = &sink.frames[0];
        assert_eq!(frame.pressures, vec![2.0, 3.0, 4.0]);
        assert!((frame.x_min - 0.2).abs() < 1e-9);
        assert!((frame.x_max - 0.6).abs() < 1e-9);
    }
    #[test]
    fn tick_clock_fires_once_per_period() {
        let t0 = Instant::now();
        let mut clock = TickClock::new(ms(50), t0);
        assert!(clock.poll(t0));
        assert!(!clock.poll(t0 + ms(10)));
        assert!(clock.poll(t0 + ms(50)));
        assert!(!clock.poll(t0 + ms(99)));
        assert_eq!(clock.until_next(t0 + ms(99)), ms(1));
        // Long stall: one tick, then back on a regular schedule.
        assert!(clock.poll(t0 + ms(1000)));
        assert!(!clock.poll(t0 + ms(1020)));
        assert!(clock.poll(t0 + ms(1050)));
    }
    #[test]
    fn elapsed_is_formatted_as_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(61_900)), "01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "60:00");
    }
}
