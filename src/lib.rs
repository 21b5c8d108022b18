// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

//! Device agnostic driver for the ADcmXL3021 triaxial vibration sensor.
//! The driver depends on embedded-hal, so as long as the HAL you use implements those traits, then
//! this driver should be compatible. On Linux that means a spidev `SpiDevice` plus two GPIO lines.
//!
//! The sensor is driven over a 2 byte SPI exchange with a paged register map. Every exchange
//! waits for the busy line, and every exchange is followed by a short busy-work pause that keeps
//! chip select high long enough for the device. The pause is a spin, not a sleep: see
//! [`adcmxl3021::BusTiming`].
//!
//! The driver is split into three layers:
//! - [`adcmxl3021::protocol`]: word frames, busy synchronization, paged register reads and writes.
//! - [`adcmxl3021::spi`]: reset, identity check and recording mode activation.
//! - [`adcmxl3021::sampling`]: draining the sample buffers of the active mode into a
//!   [`adcmxl3021::sampling::SampleBatch`].
//!
//! Supported recording modes are manual time capture (MTC), manual and automatic FFT
//! (MFFT, AFFT) and real time streaming (RTS).
//!
//! You can instantiate multiple objects if you have multiple sensors. Each one owns its bus and
//! lines, there is no shared state between them.
//!
//! Logging goes through defmt when the `defmt` feature is enabled.

#![deny(missing_docs)]
#![no_std]

extern crate alloc;

#[macro_use]
mod fmt;

/// Main module that holds the protocol, sequencer and sampling sub modules.
/// Also holds the enums and constants shared between them.
pub mod adcmxl3021;

pub use crate::adcmxl3021::protocol::{RegisterBus, WordFrame};
pub use crate::adcmxl3021::sampling::{SampleBatch, SampleRow};
pub use crate::adcmxl3021::spi::VibrationSensor;
pub use crate::adcmxl3021::{
    AdcmError, BusTiming, Decimation, FirFilter, RecordingConfig, RecordingMode, SessionState,
    WindowSetting,
};
