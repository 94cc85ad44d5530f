//! Quadrature rotary encoder decoding on Linux GPIO.
//!
//! One watcher thread per pin blocks on edges. The two channel watchers feed
//! a shared decoder under a single lock and forward every completed detent
//! as an [`Action`]. An optional third watcher reports button presses.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rotary_encoder::{CancelToken, RotaryEncoder, SysfsPin};
//!
//! let encoder = RotaryEncoder::new(Arc::new(SysfsPin::new(17)), Arc::new(SysfsPin::new(27)));
//! let cancel = CancelToken::new();
//! let (tx, rx) = crossbeam_channel::bounded(0);
//!
//! std::thread::spawn(move || {
//!     for action in rx {
//!         println!("{}", action);
//!     }
//! });
//! encoder.run(&cancel, tx)?;
//! # Ok::<(), rotary_encoder::Error>(())
//! ```

pub mod cancel;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gpio;
pub mod mock;
pub mod output;
pub mod rotary;
pub mod watcher;

pub use cancel::CancelToken;
pub use encoder::{RotaryEncoder, DEFAULT_TIMEOUT};
pub use error::Error;
pub use gpio::{Edge, InputPin, Level, Pull, SysfsPin};
pub use rotary::{Action, ButtonPolarity, ChannelOrder, Rotary};
