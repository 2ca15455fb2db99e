//! # ev-shift
//!
//! Batch exposure adjustment for darktable edits: shift the exposure of a
//! selection of images by a fixed number of stops, or equalize a bracketed
//! series to the brightness of its first image using EV math.
//!
//! ## Quick Start
//!
//! The pipeline module drives the full read → compute → preset → apply flow.
//! [`host::SidecarHost`] applies presets by appending to the darktable XMP
//! sidecars next to the images:
//!
//! ```rust,no_run
//! use ev_shift::actions::Action;
//! use ev_shift::config::Config;
//! use ev_shift::host::SidecarHost;
//! use ev_shift::pipeline::{collect_images, load_images};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     // Collect supported image files from paths (files or directories)
//!     let paths = collect_images(&[PathBuf::from("./bracket")]);
//!     let images = load_images(&paths, &config);
//!
//!     let mut host = SidecarHost::new(config.output.dry_run, config.output.backup_sidecars);
//!     for result in Action::Equalize.run(&images, &mut host, &config)? {
//!         match result.error {
//!             Some(err) => eprintln!("{}: {err}", result.path.display()),
//!             None => println!("{}: {:?}", result.path.display(), result.new_exposure),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use ev_shift::{ev, params, preset, xmp};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Latest exposure entry of the edit history
//!     let current = xmp::read_latest_exposure(Path::new("IMG_0001.CR2.xmp"))?
//!         .unwrap_or_default();
//!
//!     // 2. Light level of the capture
//!     let ev = ev::compute_ev(2.8, 1.0 / 200.0, 400.0)?;
//!     println!("EV {ev:.2}, exposure {:+.2}", current.exposure);
//!
//!     // 3. Encode adjusted parameters into a style document
//!     let hex = params::encode(&current.with_exposure(current.exposure + 1.0));
//!     println!("{}", preset::render("brighter", &hex));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`actions`] — The five user actions
//! - [`capture`] — Image handles and EXIF capture settings
//! - [`config`] — Configuration types and loading/saving
//! - [`error`] — Error kinds
//! - [`ev`] — Exposure value calculation
//! - [`host`] — Preset host seam and the sidecar-writing host
//! - [`params`] — Binary exposure parameter codec
//! - [`pipeline`] — Image collection, flat shifts and equalization
//! - [`preset`] — darktable style documents
//! - [`xmp`] — Sidecar history reading and writing

pub mod actions;
pub mod capture;
pub mod config;
pub mod error;
pub mod ev;
pub mod host;
pub mod params;
pub mod pipeline;
pub mod preset;
pub mod xmp;

pub use error::{AdjustError, Result};
pub use params::ExposureParams;
