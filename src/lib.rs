pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod output;
pub mod position;
pub mod pulse;
pub mod readout;
pub mod spectral;

#[cfg(feature = "simulation")]
pub mod simulation;

pub use channel::{EventSummary, PhotonDetectionEvent, ReadoutChannel};
pub use config::ReadoutConfig;
pub use constants::SENTINEL;
pub use error::{ReadoutError, Result};
