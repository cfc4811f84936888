//! `rdk` – magic-window demo runner.
//!
//! 1. Loads `~/.rdk/config.toml`, writing the defaults on first run.
//! 2. Registers the magic-window backend against simulated camera, window and
//!    permission doubles, and drives frames while a synthetic sensor task
//!    sweeps the device orientation.
//! 3. Prints an orientation HUD once a second.
//! 4. Intercepts **Ctrl-C** to dispose every backend and exit cleanly.

mod config;
mod demo;
mod hud;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

fn main() {
    // RUST_LOG, RDK_LOG_FORMAT=json and OTEL_EXPORTER_OTLP_ENDPOINT are
    // honoured here.  User-facing output still goes through println!.
    let _telemetry = rdk_runtime::init_tracing("rdk-demo");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – disposing backends …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the demo must be stopped by duration_secs");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => first_run(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    print_config(&cfg);

    // ── Session ───────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(demo::run(
        &cfg,
        demo::DemoTiming::default(),
        shutdown,
        |line| println!("{line}"),
    ));

    match result {
        Ok(summary) => {
            println!();
            println!(
                "  {} {} frames, {} sensor readings",
                "✓".green().bold(),
                summary.frames,
                summary.readings
            );
            if let Some(state) = summary.final_state {
                println!(
                    "  Final phase: {}  initial orientation: α {:.1}° β {:.1}° γ {:.1}°",
                    hud::phase_label(state.phase).bold(),
                    state.initial.alpha,
                    state.initial.beta,
                    state.initial.gamma
                );
            }
            println!("{}", "  ✓ Exiting rdk.".green());
        }
        Err(e) => {
            println!("{}: {}", "Session failed".red().bold(), e);
            std::process::exit(1);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First run
// ─────────────────────────────────────────────────────────────────────────────

fn first_run() -> config::Config {
    let cfg = config::Config::default();
    println!("  No configuration found; writing defaults.");
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

fn print_config(cfg: &config::Config) {
    println!();
    println!("{}", "Session".bold().underline());
    println!(
        "  Frame rate     : {} Hz   Sensor rate : {} Hz",
        cfg.frame_rate.to_string().yellow(),
        cfg.sensor_rate.to_string().yellow()
    );
    println!(
        "  Smoothing      : {}   Dead zone : {}°",
        cfg.magic.smoothing_factor.to_string().yellow(),
        cfg.magic.dead_zone.to_string().yellow()
    );
    println!(
        "  Anchors        : {}   Permission prompt : {}",
        cfg.anchors.len().to_string().yellow(),
        if cfg.simulate_permission_prompt { "simulated".yellow() } else { "none".dimmed() }
    );
    if cfg.duration_secs > 0 {
        println!("  Duration       : {}s", cfg.duration_secs.to_string().yellow());
    } else {
        println!("  Duration       : {}", "until Ctrl-C".dimmed());
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____  ____  __ __"#.bold().cyan());
    println!("{}", r#"  / __ \/ __ \/ //_/"#.bold().cyan());
    println!("{}", r#" / /_/ / / / / ,<   "#.bold().cyan());
    println!("{}", r#"/_/ |_/_____/_/|_|  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "rdk".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Magic-window session demo");
    println!();
}
