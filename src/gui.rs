// src/gui.rs
use std::ops::RangeInclusive;
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};
use eframe::egui;
use egui::{Color32, RichText};
use egui_plot::{HLine, Legend, Line, LineStyle, Plot, PlotBounds, PlotPoints, PlotUi, Polygon};
use crate::config::{MonitorConfig, Thresholds};
use crate::drivers::{
    classify_state, format_elapsed, LineSource, MonitorError, RenderDriver, SampleStore,
    Severity, TickClock,
};
use crate::engine::{TelemetrySource, UiListener};
use crate::types::*;

const COLOR_FLOW_A: Color32 = Color32::from_rgb(0x4A, 0x90, 0xE2);
const COLOR_FLOW_B: Color32 = Color32::from_rgb(0x90, 0x13, 0xFE);
const COLOR_PRESSURE: Color32 = Color32::from_rgb(0x2E, 0x86, 0xAB);
const COLOR_TEMPERATURE: Color32 = Color32::from_rgb(0xF2, 0x42, 0x36);
const COLOR_ORANGE: Color32 = Color32::from_rgb(255, 165, 0);

// 绘图协作者：保存最近一次快照，每帧重画
#[derive(Default)]
struct PlotView {
    frame: SeriesFrame,
}

impl PlotSink for PlotView {
    fn on_snapshot_ready(&mut self, frame: &SeriesFrame) -> Result<(), MonitorError> {
        if frame.pressures.len() != frame.len() || frame.temperatures.len() != frame.len() {
            return Err(MonitorError::Render(format!(
                "series length mismatch: {} times, {} pressures, {} temperatures",
                frame.len(),
                frame.pressures.len(),
                frame.temperatures.len()
            )));
        }
        self.frame.clone_from(frame);
        Ok(())
    }
}

impl PlotView {
    fn x_range(&self) -> (f64, f64) {
        if self.frame.is_empty() {
            (0.0, 1.0)
        } else {
            (self.frame.x_min, self.frame.x_max)
        }
    }

    fn series(&self, values: &[f64]) -> PlotPoints {
        PlotPoints::new(
            self.frame
                .times
                .iter()
                .zip(values)
                .map(|(t, v)| [*t, *v])
                .collect(),
        )
    }
}

pub struct MonitorApp {
    // 数据管线
    driver: RenderDriver,
    clock: TickClock,
    reader: Option<TelemetrySource>,
    plot: PlotView,
    thresholds: Thresholds,

    // 状态标签 (只随真实样本更新)
    latest: Option<SampleFields>,
    elapsed_text: String,
    link_lost: Option<String>,

    // 界面日志
    log_messages: Vec<String>,

    // 通讯管道
    rx: Receiver<TelemetryEvent>,
}

impl MonitorApp {
    pub fn new(
        ctx: &egui::Context,
        config: &MonitorConfig,
        source: Box<dyn LineSource>,
    ) -> Result<Self, MonitorError> {
        let started_at = Instant::now();
        let store = SampleStore::shared(config.capacity)?;
        let (tx, rx) = channel();
        let listener = UiListener::new(tx, ctx.clone());
        // 启动后台读取线程
        let reader = TelemetrySource::spawn(source, store.clone(), listener)
            .map_err(MonitorError::ReaderSpawn)?;
        let mut app = Self {
            driver: RenderDriver::new(store, config.interval(), started_at),
            clock: TickClock::new(config.tick(), started_at),
            reader: Some(reader),
            plot: PlotView::default(),
            thresholds: config.thresholds.clone(),
            latest: None,
            elapsed_text: format_elapsed(Default::default()),
            link_lost: None,
            log_messages: Vec::new(),
            rx,
        };
        app.log(&format!(
            "Window {:.0} s, tick {} ms, interval {} ms",
            config.window_secs(),
            config.tick_ms,
            config.interval_ms
        ));
        Ok(app)
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                TelemetryEvent::Sample(fields) => self.latest = Some(fields),
                TelemetryEvent::LinkLost(reason) => {
                    self.log(&format!("Serial link lost: {reason}"));
                    self.link_lost = Some(reason);
                }
            }
        }
    }

    fn run_tick(&mut self, now: Instant) {
        let report = self.driver.tick(now, &mut self.plot);
        self.elapsed_text = format_elapsed(report.elapsed);
    }

    fn draw_labels(&self, ui: &mut egui::Ui) {
        let Some(s) = &self.latest else {
            badge(ui, "System state: starting...", Color32::from_gray(60), Color32::WHITE);
            ui.label("ESD: --");
            ui.label("Mode: --");
            ui.label("Flow: --");
            ui.label("Relief valve: --");
            ui.label("Purge valve: --");
            ui.label("P: -- kPa | T: -- °C | MV: --% | SH: --%");
            return;
        };
        let (fill, text) = match classify_state(&s.system_state) {
            Severity::Critical => (Color32::RED, Color32::WHITE),
            Severity::Warning => (COLOR_ORANGE, Color32::BLACK),
            Severity::Nominal => (Color32::LIGHT_GREEN, Color32::BLACK),
        };
        badge(ui, &format!("System state: {}", s.system_state), fill, text);
        let esd_fill = if s.esd_active() {
            Color32::RED
        } else {
            Color32::DARK_GREEN
        };
        badge(ui, &format!("ESD: {}", s.emergency_shutdown), esd_fill, Color32::WHITE);
        ui.label(format!("Mode: {}", s.control_mode));
        ui.label(format!("Flow: {}", s.flow_mode));
        ui.label(format!("Relief valve: {}", s.relief_valve));
        ui.label(format!("Purge valve: {}", s.purge_valve));
        ui.label(format!(
            "P: {:.1} kPa | T: {:.1} °C | MV: {:.1}% | SH: {:.1}%",
            s.reading.pressure, s.reading.temperature, s.valve_opening, s.superheat
        ));
    }

    fn draw_pressure(&self, plot_ui: &mut PlotUi) {
        let th = &self.thresholds;
        let (x_min, x_max) = self.plot.x_range();
        plot_ui.polygon(band(x_min, x_max, th.flow_a_pressure, "Flow A range", COLOR_FLOW_A));
        plot_ui.polygon(band(x_min, x_max, th.flow_b_pressure, "Flow B range", COLOR_FLOW_B));
        plot_ui.hline(reference(th.pressure_emergency_high, "P emergency", Color32::RED, LineStyle::Solid));
        plot_ui.hline(reference(th.pressure_warn_high, "P warning", COLOR_ORANGE, LineStyle::dashed_loose()));
        plot_ui.hline(reference(th.pressure_recovery, "P recovery", Color32::BLUE, LineStyle::dotted_dense()));
        if !self.plot.frame.is_empty() {
            plot_ui.line(
                Line::new(self.plot.series(&self.plot.frame.pressures))
                    .name("Pressure")
                    .color(COLOR_PRESSURE)
                    .width(2.0),
            );
        }
        let [y_min, y_max] = th.pressure_axis;
        plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, y_min], [x_max, y_max]));
    }

    fn draw_temperature(&self, plot_ui: &mut PlotUi) {
        let th = &self.thresholds;
        let (x_min, x_max) = self.plot.x_range();
        plot_ui.polygon(band(x_min, x_max, th.flow_a_temperature, "Flow A range", COLOR_FLOW_A));
        plot_ui.polygon(band(x_min, x_max, th.flow_b_temperature, "Flow B range", COLOR_FLOW_B));
        plot_ui.hline(reference(th.temperature_emergency_high, "T emergency", Color32::RED, LineStyle::Solid));
        plot_ui.hline(reference(th.temperature_warn_high, "T warning", COLOR_ORANGE, LineStyle::dashed_loose()));
        plot_ui.hline(reference(th.temperature_preheat, "T preheat", Color32::BLUE, LineStyle::dotted_dense()));
        if !self.plot.frame.is_empty() {
            plot_ui.line(
                Line::new(self.plot.series(&self.plot.frame.temperatures))
                    .name("Temperature")
                    .color(COLOR_TEMPERATURE)
                    .width(2.0),
            );
        }
        let [y_min, y_max] = th.temperature_axis;
        plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, y_min], [x_max, y_max]));
    }

    fn shutdown(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            log::info!("closing application, stopping reader");
            reader.stop();
        }
    }
}

fn badge(ui: &mut egui::Ui, text: &str, fill: Color32, color: Color32) {
    egui::Frame::none()
        .fill(fill)
        .rounding(5.0)
        .inner_margin(5.0)
        .show(ui, |ui| {
            ui.label(RichText::new(text).strong().color(color));
        });
}

fn band(x_min: f64, x_max: f64, [lo, hi]: [f64; 2], name: &str, color: Color32) -> Polygon {
    Polygon::new(PlotPoints::new(vec![
        [x_min, lo],
        [x_max, lo],
        [x_max, hi],
        [x_min, hi],
    ]))
    .name(name)
    .fill_color(color.gamma_multiply(0.2))
    .stroke(egui::Stroke::NONE)
}

fn reference(y: f64, name: &str, color: Color32, style: LineStyle) -> HLine {
    HLine::new(y).name(name).color(color).style(style)
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 标签立即更新 (后台线程推来的真实样本)
        self.drain_events();

        // 2. 固定周期 tick：补点 + 按需重画
        let now = Instant::now();
        if self.clock.poll(now) {
            self.run_tick(now);
        }
        ctx.request_repaint_after(self.clock.until_next(Instant::now()));

        // 3. UI 绘制
        egui::SidePanel::right("status").min_width(280.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("Process monitor");
            ui.separator();
            self.draw_labels(ui);
            ui.label(format!("Elapsed: {}", self.elapsed_text));
            let reader_alive = self.reader.as_ref().is_some_and(TelemetrySource::is_running);
            if self.link_lost.is_some() || !reader_alive {
                ui.label(RichText::new("Serial reader stopped").color(Color32::YELLOW).small());
            }
            ui.add_space(10.0);
            ui.separator();
            egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let height = (ui.available_height() - 30.0).max(200.0) / 2.0;
            ui.label("Pressure (kPa)");
            Plot::new("pressure_plot")
                .height(height)
                .x_axis_formatter(axis_time_label)
                .legend(Legend::default())
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .show(ui, |plot_ui| self.draw_pressure(plot_ui));
            ui.label("Temperature (°C)");
            Plot::new("temperature_plot")
                .height(height)
                .x_axis_formatter(axis_time_label)
                .legend(Legend::default())
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .show(ui, |plot_ui| self.draw_temperature(plot_ui));
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}

impl Drop for MonitorApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// 横轴刻度显示为 mm:ss
fn axis_time_label(secs: f64, _max_chars: usize, _range: &RangeInclusive<f64>) -> String {
    format_elapsed(Duration::from_secs_f64(secs.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_view_keeps_latest_frame() {
        let mut view = PlotView::default();
        assert_eq!(view.x_range(), (0.0, 1.0));
        let frame = SeriesFrame {
            times: vec![0.0, 0.1],
            pressures: vec![300.0, 301.0],
            temperatures: vec![150.0, 151.0],
            x_min: 0.0,
            x_max: 0.3,
        };
        view.on_snapshot_ready(&frame).unwrap();
        assert_eq!(view.frame, frame);
        assert_eq!(view.x_range(), (0.0, 0.3));
    }

    #[test]
    fn plot_view_rejects_ragged_series() {
        let mut view = PlotView::default();
        let frame = SeriesFrame {
            times: vec![0.0, 0.1],
            pressures: vec![300.0],
            temperatures: vec![150.0, 151.0],
            x_min: 0.0,
            x_max: 0.3,
        };
        assert!(matches!(
            view.on_snapshot_ready(&frame),
            Err(MonitorError::Render(_))
        ));
        assert!(view.frame.is_empty());
    }

    #[test]
    fn axis_ticks_read_as_minutes_and_seconds() {
        assert_eq!(axis_time_label(75.4, 5, &(0.0..=100.0)), "01:15");
        assert_eq!(axis_time_label(-0.2, 5, &(-1.0..=1.0)), "00:00");
    }

    #[test]
    fn reader_spawn_failure_is_not_a_link_error() {
        let err = MonitorError::ReaderSpawn(std::io::Error::new(std::io::ErrorKind::Other, "no threads"));
        assert!(err.to_string().starts_with("failed to start telemetry reader thread"));
    }
}
