//! Strata headless editor
//!
//! Loads the engine core through the interop runtime, keeps it hot-reloaded
//! while it is being rebuilt, and writes every published transaction and
//! asset registration to stdout as one JSON object per line.
//!
//! Run with: cargo run -p strata_editor -- [config.toml] [--no-hot-reload]

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use strata_host::prelude::*;

/// One line of editor output
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EditorEvent<'a> {
    Transaction(&'a PublishedTransaction),
    Asset(&'a AssetRegistrationEvent),
    Reloaded { module: String, state: RuntimeState },
}

struct Options {
    config_path: Option<PathBuf>,
    hot_reload: bool,
}

impl Options {
    fn from_env() -> Self {
        let mut options = Self {
            config_path: std::env::var_os("STRATA_CONFIG").map(PathBuf::from),
            hot_reload: true,
        };

        for arg in std::env::args().skip(1) {
            if arg == "--no-hot-reload" {
                options.hot_reload = false;
            } else if arg.starts_with("--") {
                log::warn!("Ignoring unknown flag {}", arg);
            } else {
                options.config_path = Some(PathBuf::from(arg));
            }
        }
        options
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::from_env();
    let config = match EditorConfig::load_or_default(options.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(2);
        }
    };
    config.print_summary();

    let runtime = match InteropRuntime::new(&config) {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Cannot reserve editor memory: {}", e);
            std::process::exit(1);
        }
    };

    let transactions = runtime.subscribe_transactions();
    let assets = runtime.subscribe_assets();

    if !runtime.reload_blocking(&config.module.path, &config.module.shadow_path) {
        log::error!("Engine core never became loadable, giving up");
        std::process::exit(1);
    }
    if let Some(info) = runtime.module_info() {
        log::info!(
            "Engine core '{}' (api v{}) loaded with {} entry points",
            info.name,
            info.api_version,
            info.entry_points.len()
        );
    }

    let mut reloader = if options.hot_reload {
        HotReloader::from_config(&config)
    } else {
        log::info!("Hot reload disabled");
        HotReloader::disabled()
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    let stdout = std::io::stdout();
    let mut last_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        let mut out = stdout.lock();

        for module in reloader.poll(&runtime) {
            emit(
                &mut out,
                &EditorEvent::Reloaded {
                    module: module.display().to_string(),
                    state: runtime.state(),
                },
            );
        }

        let now = Instant::now();
        runtime.tick(now.duration_since(last_tick).as_secs_f32());
        last_tick = now;

        for published in transactions.try_iter() {
            emit(&mut out, &EditorEvent::Transaction(&published));
        }
        for event in assets.try_iter() {
            emit(&mut out, &EditorEvent::Asset(&event));
        }
        drop(out);

        std::thread::sleep(config.tick_interval());
    }

    for stats in runtime.perf_report() {
        log::info!(
            "perf {}: {} calls, {:?} total, {:?} last",
            stats.name,
            stats.count,
            stats.total,
            stats.last
        );
    }
    runtime.shutdown();
}

fn emit(out: &mut impl Write, event: &EditorEvent<'_>) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(e) => {
            log::warn!("Could not encode editor event: {}", e);
            return;
        }
    };
    if let Err(e) = writeln!(out, "{}", line) {
        log::warn!("Could not write editor event: {}", e);
    }
}
