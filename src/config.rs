//! Command line configuration.
//!
//! Everything is validated here, the encoder itself only ever sees resolved
//! pins and a non-zero timeout.
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use regex::Regex;
use std::time::Duration;

use crate::{
    output::Format,
    rotary::{ButtonPolarity, ChannelOrder},
};

#[derive(Debug, Parser)]
#[command(name = "rotary-encoder", version, about = "Print rotary encoder turns and button presses")]
pub struct Args {
    /// Pin of the A channel, e.g. 17 or GPIO17
    #[arg(long = "pin-a", env = "ROTARY_PIN_A")]
    pub pin_a: String,

    /// Pin of the B channel
    #[arg(long = "pin-b", env = "ROTARY_PIN_B")]
    pub pin_b: String,

    /// Pin of the push button, if the encoder has one
    #[arg(long, env = "ROTARY_BUTTON")]
    pub button: Option<String>,

    /// Seconds to wait for an edge before checking for shutdown
    #[arg(long, env = "ROTARY_TIMEOUT", default_value_t = 2)]
    pub timeout: u64,

    /// Use B as the high bit of a sample, reversing the direction
    #[arg(long)]
    pub swap_channels: bool,

    /// The button reads high while pressed
    #[arg(long)]
    pub button_active_high: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Exit after the first action
    #[arg(long)]
    pub once: bool,

    /// More logging, repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub pin_a: u64,
    pub pin_b: u64,
    pub button: Option<u64>,
    pub timeout: Duration,
    pub order: ChannelOrder,
    pub polarity: ButtonPolarity,
    pub format: Format,
    pub once: bool,
    pub log_level: LevelFilter,
}

impl Args {
    pub fn resolve(self) -> Result<Config> {
        let pin_a = parse_pin(&self.pin_a).context("invalid pin for the A channel")?;
        let pin_b = parse_pin(&self.pin_b).context("invalid pin for the B channel")?;
        let button = self
            .button
            .as_deref()
            .map(parse_pin)
            .transpose()
            .context("invalid pin for the button")?;

        if pin_a == pin_b || button == Some(pin_a) || button == Some(pin_b) {
            bail!("every channel needs its own pin");
        }
        if self.timeout == 0 {
            bail!("timeout must be at least one second");
        }

        Ok(Config {
            pin_a,
            pin_b,
            button,
            timeout: Duration::from_secs(self.timeout),
            order: if self.swap_channels {
                ChannelOrder::BHigh
            } else {
                ChannelOrder::AHigh
            },
            polarity: if self.button_active_high {
                ButtonPolarity::ActiveHigh
            } else {
                ButtonPolarity::ActiveLow
            },
            format: self.format,
            once: self.once,
            log_level: log_level(self.verbose),
        })
    }
}

/// Resolve a pin name to its sysfs line number.
///
/// Accepts `17`, `gpio17` and `GPIO17`.
pub fn parse_pin(name: &str) -> Result<u64> {
    let re = Regex::new(r"^(?i:gpio)?([0-9]+)$")?;
    let caps = re
        .captures(name.trim())
        .with_context(|| format!("unknown pin name {:?}", name))?;
    Ok(caps
        .get(1)
        .context("could not read pin number")?
        .as_str()
        .parse::<u64>()?)
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
