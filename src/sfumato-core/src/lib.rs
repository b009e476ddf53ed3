// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Signal-processing core of the sfumato FM-stereo broadcast simulator.
//!
//! `audio -> Transmitter -> NoiseChannel -> Receiver -> carrier recovery ->
//! StereoDecoder -> audio`, all in `f64`, every stage stateful across calls.

pub mod buffer;
pub mod carrier;
pub mod chain;
pub mod channel;
pub mod config;
pub mod demod;
pub mod emphasis;
pub mod error;
pub mod filter;
pub mod measure;
pub mod pll;
pub mod resample;
pub mod rx;
pub mod spectrum;
pub mod stereo;
pub mod tx;

pub type DynResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use buffer::{IqSignal, RealSignal, Signal, StereoBuffer};
pub use carrier::{build_carrier_recovery, CarrierRecovery, PllRecovery, SquaringRecovery};
pub use chain::{ChainOutput, FmChain};
pub use channel::NoiseChannel;
pub use config::{CarrierStrategy, EmphasisPolicy, FmConfig};
pub use emphasis::EmphasisFilter;
pub use error::{Error, Result};
pub use pll::PilotPll;
pub use rx::Receiver;
pub use stereo::StereoDecoder;
pub use tx::Transmitter;
