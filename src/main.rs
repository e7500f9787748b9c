// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod types;
use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use eframe::egui;
use config::MonitorConfig;
use drivers::{LineSource, SerialLineSource, SimulatedSource};

#[derive(Parser, Debug)]
#[command(name = "vapor-monitor", version, about = "Live pressure/temperature monitor for the process controller")]
struct Cli {
    /// Serial port the controller is attached to (e.g. /dev/ttyUSB0, COM4)
    #[arg(long)]
    port: Option<String>,
    /// Override the configured baud rate
    #[arg(long)]
    baud: Option<u32>,
    /// JSON config file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Feed the display from a built-in simulated controller
    #[arg(long)]
    simulate: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

// 打开数据源；失败即致命
fn open_source(cli: &Cli, config: &MonitorConfig) -> anyhow::Result<Box<dyn LineSource>> {
    if cli.simulate {
        log::info!("using simulated controller");
        return Ok(Box::new(SimulatedSource::new(config.interval())));
    }
    let settings = config
        .serial_settings()
        .context("pass --port or set \"port\" in the config file")?;
    let source = SerialLineSource::open(&settings)?;
    Ok(Box::new(source))
}

fn fatal(err: anyhow::Error) -> ! {
    log::error!("{err:#}");
    eprintln!("error: {err:#}");
    std::process::exit(1);
}

// 入口函数
fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli).unwrap_or_else(|err| fatal(err));
    log::info!(
        "tick {} ms, interval {} ms, window {:.1} s",
        config.tick_ms,
        config.interval_ms,
        config.window_secs()
    );
    let source = open_source(&cli, &config).unwrap_or_else(|err| fatal(err));
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1200.0, 800.0])
        .with_min_inner_size([900.0, 600.0])
        .with_title("Process monitor");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "vapor-monitor",
        options,
        Box::new(move |cc| {
            let app = gui::MonitorApp::new(&cc.egui_ctx, &config, source)
                .unwrap_or_else(|err| fatal(err.into()));
            Box::new(app)
        }),
    )
}
