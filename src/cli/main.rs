use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use ev_shift::actions::Action;
use ev_shift::host::SidecarHost;
use ev_shift::{config, params, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "ev-shift",
    version,
    about = "Shift or equalize the exposure of darktable edits across a batch of images"
)]
struct Cli {
    /// Image files or directories to process (the first image is the equalize reference)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Action to run on the images
    #[arg(short, long, value_enum, conflicts_with = "ev")]
    action: Option<Action>,

    /// Shift exposure by a custom number of stops
    #[arg(long, value_name = "STOPS", allow_hyphen_values = true)]
    ev: Option<f32>,

    /// Display current exposure settings and EV, then exit
    #[arg(long, conflicts_with_all = ["action", "ev"])]
    show: bool,

    /// Preview changes without writing to sidecars
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // Override dry_run from CLI flag
    if cli.dry_run {
        config.output.dry_run = true;
    }

    // Collect images
    let paths = pipeline::collect_images(&cli.paths);
    if paths.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    let images = pipeline::load_images(&paths, &config);
    log::info!("Found {} image(s)", images.len());

    // Handle --show
    if cli.show {
        let results = pipeline::inspect(&images);
        if cli.json {
            print_inspect_json(&results)?;
        } else {
            for result in &results {
                print_inspect(result);
            }
        }
        return Ok(());
    }

    if config.output.dry_run {
        log::info!("DRY RUN — no sidecars will be modified");
    }

    let mut host = SidecarHost::new(config.output.dry_run, config.output.backup_sidecars);
    let results = match (cli.action, cli.ev) {
        (Some(action), _) => action.run(&images, &mut host, &config)?,
        (None, Some(delta)) => {
            if !delta.is_finite() {
                anyhow::bail!("--ev must be a finite number of stops");
            }
            pipeline::adjust_by(&images, delta, &mut host, &config)
        }
        (None, None) => {
            anyhow::bail!("Nothing to do: pass --action, --ev or --show. Use --help for usage.")
        }
    };

    // JSON output
    if cli.json {
        let json_results: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path.display().to_string(),
                    "reference": r.reference,
                    "ev": r.ev,
                    "previous_exposure": r.previous_exposure,
                    "new_exposure": r.new_exposure,
                    "style_name": r.style_name,
                    "error": r.error.as_ref().map(|e| e.to_string()),
                    "error_kind": r.error.as_ref().map(|e| e.kind()),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    // Summary
    let total = results.len();
    let success = results.iter().filter(|r| r.is_ok()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the current exposure settings of one image.
fn print_inspect(result: &pipeline::InspectResult) {
    println!();
    println!("{BOLD}File:{RESET} {}", result.path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));
    print_row("Sidecar", &result.sidecar_path.display().to_string());

    match result.capture_ev {
        Some(ev) => print_row("Capture EV", &format!("{ev:.3}")),
        None => print_row("Capture EV", "(incomplete EXIF)"),
    }

    if let Some(ref p) = result.params {
        let mode = if p.is_deflicker() { "deflicker" } else { "manual" };
        print_row("Mode", mode);
        print_row("Exposure", &format!("{:+.3} EV", p.exposure));
        print_row("Black level", &format!("{:.6}", p.black));
        if p.is_deflicker() {
            print_row("Percentile", &format!("{:.1}", p.deflicker_percentile));
            print_row("Target level", &format!("{:.2} EV", p.deflicker_target_level));
        }
        print_row(
            "Compensate bias",
            if p.compensate_exposure_bias != 0 { "yes" } else { "no" },
        );
        print_row("Params", &params::encode(p));
        if let Some(ev) = result.capture_ev {
            print_row("Effective EV", &format!("{:.3}", ev + f64::from(p.exposure)));
        }
    }

    if let Some(ref err) = result.error {
        println!("  {RED}{:<22} : {err}{RESET}", "Error");
    }
    println!();
}

fn print_inspect_json(results: &[pipeline::InspectResult]) -> Result<()> {
    let json_results: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "path": r.path.display().to_string(),
                "sidecar_path": r.sidecar_path.display().to_string(),
                "capture_ev": r.capture_ev,
                "params": r.params,
                "params_hex": r.params.as_ref().map(params::encode),
                "error": r.error.as_ref().map(|e| e.to_string()),
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json_results)?);
    Ok(())
}

/// Print a `tag : value` row, continuing long values on indented lines.
fn print_row(tag: &str, val: &str) {
    let mut lines = wrap_text(val, VAL_WIDTH).into_iter();
    println!("  {tag:<22} : {}", lines.next().unwrap_or_default());
    for line in lines {
        println!("  {INDENT}{line}");
    }
}

/// Wrap text at word boundaries to fit within `max_width` characters.
/// Words longer than a line (hex payloads, paths) are split across lines.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in s.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(max_width) {
            let piece: String = chunk.iter().collect();
            if current.is_empty() {
                current = piece;
            } else if current.chars().count() + 1 + chunk.len() <= max_width {
                current.push(' ');
                current.push_str(&piece);
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
