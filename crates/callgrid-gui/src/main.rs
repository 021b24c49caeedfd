#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;

mod app;
mod file_watcher;
mod input_map;
mod notifications;
mod painter;
mod panels;
mod runner;
mod settings;

use app::{CallgridApp, LaunchOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Function dependency canvas with live call tracing")]
struct Args {
    /// Rust source file to open
    file: Option<PathBuf>,

    /// Port for live trace events
    #[arg(long)]
    port: Option<u16>,

    /// Do not listen for trace events on startup
    #[arg(long)]
    no_trace: bool,

    /// Shell command started from the Run menu; its exit status clears or keeps compiler errors
    #[arg(long)]
    run: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 720.0]),
        ..Default::default()
    };
    let launch = LaunchOptions {
        file: args.file,
        port: args.port,
        no_trace: args.no_trace,
        run: args.run,
    };

    eframe::run_native(
        "Callgrid",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(CallgridApp::new(cc, launch)))
        }),
    )
}
