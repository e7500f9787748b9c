use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use crate::drivers::MonitorError;
use crate::types::{PlotPoint, Reading};
/// Smallest step used to keep real timestamps strictly after the previous entry.
const MIN_TIME_STEP: Duration = Duration::from_micros(1);
/// Fixed-capacity ring of plotted points shared by the reader thread and the UI tick.
///
/// Slots are addressed by `write_count % capacity`; the counter never resets, so
/// `min(write_count, capacity)` is the number of live points.
pub struct SampleStore {
    slots: Vec<PlotPoint>,
    write_count: u64,
    last_reading: Option<Reading>,
    first_sample: Option<Instant>,
    last_update: Option<Instant>,
    dirty: bool,
}
pub type SharedStore = Arc<Mutex<SampleStore>>;
impl SampleStore {
    pub fn with_capacity(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "sample store capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            slots: vec![PlotPoint::default(); capacity],
            write_count: 0,
            last_reading: None,
            first_sample: None,
            last_update: None,
            dirty: false,
        })
    }
    pub fn shared(capacity: usize) -> Result<SharedStore, MonitorError> {
        Ok(Arc::new(Mutex::new(Self::with_capacity(capacity)?)))
    }
    pub fn write_count(&self) -> u64 {
        self.write_count
    }
    pub fn len(&self) -> usize {
        self.write_count.min(self.slots.len() as u64) as usize
    }
    pub fn is_empty(&self) -> bool {
        self.write_count == 0
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    /// Record a decoded sample that arrived at `now`.
    ///
    /// The first call anchors relative time at zero. If `now` does not fall after
    /// the latest entry (a tick may have synthesized one in between), the stamp is
    /// moved just past it.
    pub fn insert_real(&mut self, reading: Reading, now: Instant) -> PlotPoint {
        let first = *self.first_sample.get_or_insert(now);
        let stamp = match self.last_update {
            Some(last) if now <= last => last + MIN_TIME_STEP,
            _ => now,
        };
        let point = PlotPoint {
            relative_time: stamp.duration_since(first).as_secs_f64(),
            pressure: reading.pressure,
            temperature: reading.temperature,
            synthetic: false,
        };
        self.write_slot(point);
        self.last_reading = Some(reading);
        self.last_update = Some(stamp);
        point
    }
    /// Hold the last real values across silence: one point per whole `interval`
    /// elapsed since the latest entry. Returns how many points were added.
    pub fn synthesize_gaps(&mut self, interval: Duration, now: Instant) -> usize {
        let (Some(reading), Some(first), Some(mut last)) =
            (self.last_reading, self.first_sample, self.last_update)
        else {
            return 0;
        };
        if interval.is_zero() {
            return 0;
        }
        let mut added = 0;
        while last + interval <= now {
            last += interval;
            self.write_slot(PlotPoint {
                relative_time: last.duration_since(first).as_secs_f64(),
                pressure: reading.pressure,
                temperature: reading.temperature,
                synthetic: true,
            });
            added += 1;
        }
        self.last_update = Some(last);
        added
    }
    /// Live points, oldest first.
    pub fn snapshot(&self) -> Vec<PlotPoint> {
        let capacity = self.slots.len();
        let count = self.len();
        if count < capacity {
            return self.slots[..count].to_vec();
        }
        let start = (self.write_count % capacity as u64) as usize;
        let mut ordered = Vec::with_capacity(capacity);
        ordered.extend_from_slice(&self.slots[start..]);
        ordered.extend_from_slice(&self.slots[..start]);
        ordered
    }
    /// Clear the dirty flag, unless something was written after the snapshot
    /// taken at `rendered_write_count`.
    pub fn mark_rendered(&mut self, rendered_write_count: u64) {
        if self.write_count == rendered_write_count {
            self.dirty = false;
        }
    }
    fn write_slot(&mut self, point: PlotPoint) {
        let idx = (self.write_count % self.slots.len() as u64) as usize;
        self.slots[idx] = point;
        self.write_count += 1;
        self.dirty = true;
    }
}
/// Lock the shared store, recovering the data if a writer panicked mid-update.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, SampleStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}
