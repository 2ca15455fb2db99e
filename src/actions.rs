//! The user-facing actions: four fixed exposure shifts and equalization.

use serde::{Deserialize, Serialize};

use crate::capture::Image;
use crate::config::Config;
use crate::error::Result;
use crate::host::PresetHost;
use crate::pipeline::{self, AdjustResult};

/// One user-triggered batch operation over the selected images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Action {
    MinusOne,
    MinusThird,
    PlusThird,
    PlusOne,
    Equalize,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::MinusOne,
        Action::MinusThird,
        Action::PlusThird,
        Action::PlusOne,
        Action::Equalize,
    ];

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            Action::MinusOne => "−1 EV",
            Action::MinusThird => "−1/3 EV",
            Action::PlusThird => "+1/3 EV",
            Action::PlusOne => "+1 EV",
            Action::Equalize => "Equalize exposure",
        }
    }

    /// The EV offset of a shift action, `None` for equalization.
    pub fn delta(&self, config: &Config) -> Option<f32> {
        match self {
            Action::MinusOne => Some(config.steps.minus_one),
            Action::MinusThird => Some(config.steps.minus_third),
            Action::PlusThird => Some(config.steps.plus_third),
            Action::PlusOne => Some(config.steps.plus_one),
            Action::Equalize => None,
        }
    }

    /// Run this action over `images`.
    ///
    /// Only equalization can fail as a whole (too few images); shift actions
    /// report failures per image.
    pub fn run(
        &self,
        images: &[Image],
        host: &mut dyn PresetHost,
        config: &Config,
    ) -> Result<Vec<AdjustResult>> {
        log::info!("Action: {}", self.label());
        match self.delta(config) {
            Some(delta) => Ok(pipeline::adjust_by(images, delta, host, config)),
            None => pipeline::equalize(images, host, config),
        }
    }
}
