// src/engine.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use eframe::egui;
use crate::drivers::buffer::{lock_store, SharedStore};
use crate::drivers::protocol::parse_line;
use crate::drivers::source::LineSource;
use crate::types::{SampleFields, SampleListener, TelemetryEvent};

/// Why the read loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    LinkFailed(String),
}

/// Blocking read loop. Stops on request or on the first link error; there is no
/// reconnect. The source is dropped (port closed) when this returns.
pub fn run_read_loop<S: LineSource>(
    mut source: S,
    store: &SharedStore,
    listener: &dyn SampleListener,
    stop: &AtomicBool,
) -> LoopExit {
    let mut accepted: u64 = 0;
    let mut dropped: u64 = 0;
    while !stop.load(Ordering::Acquire) {
        let raw = match source.next_line() {
            Ok(Some(raw)) => raw,
            // 超时：回到循环顶部检查停止标志
            Ok(None) => continue,
            Err(err) => {
                log::error!("telemetry link lost after {accepted} sample(s): {err}");
                listener.on_link_lost(&err.to_string());
                return LoopExit::LinkFailed(err.to_string());
            }
        };
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some(fields) = parse_line(line) else {
            dropped += 1;
            log::debug!("dropped malformed line ({dropped} so far): {line:?}");
            continue;
        };
        lock_store(store).insert_real(fields.reading, Instant::now());
        accepted += 1;
        listener.on_sample(&fields);
    }
    log::info!("telemetry reader stopped ({accepted} accepted, {dropped} dropped)");
    LoopExit::Stopped
}

/// Owns the reader thread.
pub struct TelemetrySource {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<LoopExit>>,
}

impl TelemetrySource {
    pub fn spawn<S, L>(source: S, store: SharedStore, listener: L) -> std::io::Result<Self>
    where
        S: LineSource + 'static,
        L: SampleListener + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("telemetry-reader".into())
            .spawn(move || run_read_loop(source, &store, &listener, &flag))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the reader to quit and wait for it; returns within one read timeout.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) -> Option<LoopExit> {
        self.stop.store(true, Ordering::Release);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                log::error!("telemetry reader thread panicked");
                None
            }
        }
    }
}

impl Drop for TelemetrySource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Forwards reader events to the UI thread and wakes it up.
pub struct UiListener {
    tx: Sender<TelemetryEvent>,
    ctx: egui::Context,
}

impl UiListener {
    pub fn new(tx: Sender<TelemetryEvent>, ctx: egui::Context) -> Self {
        Self { tx, ctx }
    }
}

impl SampleListener for UiListener {
    fn on_sample(&self, fields: &SampleFields) {
        self.tx.send(TelemetryEvent::Sample(fields.clone())).ok();
        self.ctx.request_repaint();
    }

    fn on_link_lost(&self, reason: &str) {
        self.tx.send(TelemetryEvent::LinkLost(reason.to_owned())).ok();
        self.ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::buffer::SampleStore;
    use crate::drivers::source::ManualSource;
    use std::sync::Mutex;
    use std::time::Duration;

    const LINE: &str = "P:300.5,T:150.2,MV:45.0,SH:10.0,F:A,M:AUTO,ESD:Normal,ESTADO:Operando Normal,RELIEF:Cerrada,PURGE:Cerrada";

    #[derive(Default)]
    struct RecordingListener {
        samples: Mutex<Vec<SampleFields>>,
        lost: Mutex<Vec<String>>,
    }

    impl SampleListener for RecordingListener {
        fn on_sample(&self, fields: &SampleFields) {
            self.samples.lock().unwrap().push(fields.clone());
        }
        fn on_link_lost(&self, reason: &str) {
            self.lost.lock().unwrap().push(reason.to_owned());
        }
    }

    impl SampleListener for Arc<RecordingListener> {
        fn on_sample(&self, fields: &SampleFields) {
            self.as_ref().on_sample(fields)
        }
        fn on_link_lost(&self, reason: &str) {
            self.as_ref().on_link_lost(reason)
        }
    }

    /// Never yields data; only times out, like an idle port.
    struct IdleSource;

    impl LineSource for IdleSource {
        fn next_line(&mut self) -> Result<Option<String>, crate::drivers::MonitorError> {
            thread::sleep(Duration::from_millis(5));
            Ok(None)
        }
    }

    #[test]
    fn valid_lines_reach_store_and_listener() {
        let store = SampleStore::shared(16).unwrap();
        let listener = RecordingListener::default();
        let mut source = ManualSource::new([LINE, "", "   ", "garbage", "P:x,T:1"]);
        source.push_timeout();
        source.push_line(format!("  {LINE}\r\n"));
        let exit = run_read_loop(source, &store, &listener, &AtomicBool::new(false));
        assert!(matches!(exit, LoopExit::LinkFailed(_)));
        let guard = lock_store(&store);
        assert_eq!(guard.write_count(), 2);
        assert!(guard.snapshot().iter().all(|p| !p.synthetic));
        let samples = listener.samples.lock().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].system_state, "Operando Normal");
        assert_eq!(listener.lost.lock().unwrap().len(), 1);
    }

    #[test]
    fn stop_flag_ends_loop_without_reading() {
        let store = SampleStore::shared(4).unwrap();
        let listener = RecordingListener::default();
        let exit = run_read_loop(
            ManualSource::new([LINE]),
            &store,
            &listener,
            &AtomicBool::new(true),
        );
        assert_eq!(exit, LoopExit::Stopped);
        assert!(lock_store(&store).is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_bounded_by_timeout() {
        let store = SampleStore::shared(4).unwrap();
        let listener = Arc::new(RecordingListener::default());
        let mut reader = TelemetrySource::spawn(IdleSource, store, Arc::clone(&listener)).unwrap();
        assert!(reader.is_running());
        assert_eq!(reader.stop(), Some(LoopExit::Stopped));
        assert_eq!(reader.stop(), None);
        assert!(!reader.is_running());
        assert!(listener.lost.lock().unwrap().is_empty());
    }

    #[test]
    fn reader_thread_fails_stop_on_link_error() {
        let store = SampleStore::shared(4).unwrap();
        let listener = Arc::new(RecordingListener::default());
        let mut reader =
            TelemetrySource::spawn(ManualSource::new([LINE]), store.clone(), Arc::clone(&listener))
                .unwrap();
        let exit = reader.stop();
        // The stop request may land before or after the single line is read.
        match exit {
            Some(LoopExit::LinkFailed(_)) => {
                assert_eq!(lock_store(&store).write_count(), 1);
                assert_eq!(listener.lost.lock().unwrap().len(), 1);
            }
            Some(LoopExit::Stopped) => assert!(listener.lost.lock().unwrap().is_empty()),
            None => panic!("reader thread panicked"),
        }
    }
}
