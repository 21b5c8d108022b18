// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

/// Bitfield views of the configuration and status registers.
pub mod bits;

/// Register catalog: page, address and access flags of every register the driver touches.
pub mod registers;

/// Word framing, busy-line synchronization and paged register access.
pub mod protocol;

/// Sample buffer draining and conversion into engineering units.
pub mod sampling;

/// The SPI module holds the device configuration sequencer.
pub mod spi;

use embedded_hal::digital;
use strum::{AsRefStr, EnumIter, FromRepr};

use self::registers::RegisterAddress;

/// Value of PROD_ID for an ADcmXL3021.
pub const PROD_ID_VALUE: u16 = 0x0BCD;

/// Base sample rate of the device in samples per second.
pub const BASE_SAMPLE_RATE: f32 = 220_000.0;

/// Number of words the device sends per real time streaming block.
pub const RTS_BLOCK_WORDS: usize = 100;

/// Samples per axis in one real time streaming block.
pub const RTS_SAMPLES_PER_BLOCK: usize = 32;

/// Blocks read per streaming capture.
pub const RTS_BLOCKS_PER_CAPTURE: usize = 10;

/// Samples per axis in a manual time capture.
pub const MTC_SAMPLES: usize = 4096;

/// Frequency bins per axis in a spectrum capture.
pub const FFT_BINS: usize = 2048;

/// Number of taps in a FIR filter bank.
pub const FIR_TAPS: usize = 32;

pub(crate) const POWER_UP_DELAY_MS: u32 = 200;
pub(crate) const RESET_RECOVERY_MS: u32 = 500;
pub(crate) const RECORD_SETTLE_MS: u32 = 12;

/// Recording modes as encoded in REC_CTRL[1:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, AsRefStr, EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RecordingMode {
    /// Manual FFT, averaged spectrum
    #[strum(serialize = "MFFT")]
    Mfft = 0,
    /// Automatic FFT, raw spectrum
    #[strum(serialize = "AFFT")]
    Afft = 1,
    /// Manual time capture
    #[strum(serialize = "MTC")]
    Mtc = 2,
    /// Real time streaming
    #[strum(serialize = "RTS")]
    Rts = 3,
}

impl RecordingMode {
    /// True for the two FFT modes.
    pub fn is_spectrum(self) -> bool {
        matches!(self, RecordingMode::Mfft | RecordingMode::Afft)
    }

    /// CSV style header a storage collaborator can write above [`sampling::SampleBatch::rows`].
    pub fn column_header(self) -> &'static str {
        match self {
            RecordingMode::Mtc => "Time [s],x-axis [g],y-axis [g],z-axis [g]",
            RecordingMode::Mfft | RecordingMode::Afft => {
                "Frequency Bin [Hz],x-axis [mg],y-axis [mg],z-axis [mg]"
            }
            RecordingMode::Rts => {
                "Time [s],x-axis [LSB],y-axis [LSB],z-axis [LSB],temp,status,crc,sequence number"
            }
        }
    }
}

/// FFT window applied by the device, REC_CTRL[13:12].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WindowSetting {
    /// Rectangular window
    Rectangular = 0,
    /// Hanning window, the power-on default
    #[default]
    Hanning = 1,
    /// Flat top window
    FlatTop = 2,
}

/// Decimation of the base sample rate. The discriminant is the exponent stored in AVG_CNT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromRepr, EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Decimation {
    /// 220 kSPS
    #[default]
    X1 = 0,
    /// 110 kSPS
    X2 = 1,
    /// 55 kSPS
    X4 = 2,
    /// 27.5 kSPS
    X8 = 3,
    /// 13.75 kSPS
    X16 = 4,
    /// 6.875 kSPS
    X32 = 5,
    /// 3.4375 kSPS
    X64 = 6,
    /// 1.71875 kSPS
    X128 = 7,
}

impl Decimation {
    /// The 3 bit exponent written to the device.
    pub fn exponent(self) -> u8 {
        self as u8
    }

    /// Divisor applied to [`BASE_SAMPLE_RATE`].
    pub fn factor(self) -> u32 {
        1 << self.exponent()
    }

    /// Decode the 3 bit field reported by REC_INFO2.
    pub fn from_field(field: u16) -> Self {
        // masked to 3 bits, every value has a variant
        Decimation::from_repr((field & 0x7) as u8).unwrap_or_default()
    }
}

/// FIR filter selection applied to all three axes.
///
/// Banks A to F hold the factory filters. `Custom` overwrites bank F with the given taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirFilter {
    /// Filtering disabled
    #[default]
    NoFilter,
    /// Bank A, low pass 1 kHz
    LowPass1kHz,
    /// Bank B, low pass 5 kHz
    LowPass5kHz,
    /// Bank C, low pass 10 kHz
    LowPass10kHz,
    /// Bank D, high pass 1 kHz
    HighPass1kHz,
    /// Bank E, band pass 1 kHz to 5 kHz
    BandPass1kHz5kHz,
    /// Bank F, high pass 10 kHz
    HighPass10kHz,
    /// User taps loaded into bank F
    Custom([i16; FIR_TAPS]),
}

impl FirFilter {
    /// Bank number written to FILT_CTRL for each axis.
    pub fn bank(&self) -> u16 {
        match self {
            FirFilter::NoFilter => 0,
            FirFilter::LowPass1kHz => 1,
            FirFilter::LowPass5kHz => 2,
            FirFilter::LowPass10kHz => 3,
            FirFilter::HighPass1kHz => 4,
            FirFilter::BandPass1kHz5kHz => 5,
            FirFilter::HighPass10kHz | FirFilter::Custom(_) => 6,
        }
    }
}

/// Parameters consumed once by [`spi::VibrationSensor::activate_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecordingConfig {
    /// Decimation of the base sample rate. Ignored in RTS mode.
    pub decimation: Decimation,
    /// FIR filter. Ignored in RTS mode.
    pub fir_filter: FirFilter,
    /// Number of spectra averaged per FFT record, 1 to 255. Only used by the FFT modes.
    pub spectral_avg_count: u8,
    /// FFT window.
    pub window: WindowSetting,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        RecordingConfig {
            decimation: Decimation::X1,
            fir_filter: FirFilter::NoFilter,
            spectral_avg_count: 1,
            window: WindowSetting::Hanning,
        }
    }
}

impl RecordingConfig {
    /// Set the decimation.
    pub fn with_decimation(mut self, decimation: Decimation) -> Self {
        self.decimation = decimation;
        self
    }

    /// Set the FIR filter.
    pub fn with_fir_filter(mut self, fir_filter: FirFilter) -> Self {
        self.fir_filter = fir_filter;
        self
    }

    /// Set the spectral average count.
    pub fn with_spectral_avg_count(mut self, count: u8) -> Self {
        self.spectral_avg_count = count;
        self
    }

    /// Set the FFT window.
    pub fn with_window(mut self, window: WindowSetting) -> Self {
        self.window = window;
        self
    }
}

/// Timing of the low level bus exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusTiming {
    /// Busy-work iterations after every exchange. They keep chip select
    /// deasserted for roughly 40us; shorter gaps shift MISO by one byte.
    pub settle_spins: u32,
    /// Give up after this many busy polls. `None` polls forever.
    pub busy_poll_limit: Option<u32>,
}

/// Minimum time between two exchanges.
pub const SETTLE_TIME_US: u32 = 40;

const DEFAULT_SETTLE_SPINS: u32 = 2_000;

impl Default for BusTiming {
    fn default() -> Self {
        BusTiming {
            settle_spins: DEFAULT_SETTLE_SPINS,
            busy_poll_limit: None,
        }
    }
}

impl BusTiming {
    /// Derive the settle spin count from a measured spins-per-microsecond rate.
    pub const fn calibrated(spins_per_us: u32) -> Self {
        BusTiming {
            settle_spins: SETTLE_TIME_US * spins_per_us,
            busy_poll_limit: None,
        }
    }

    /// Bound the busy wait.
    pub fn with_busy_poll_limit(mut self, polls: u32) -> Self {
        self.busy_poll_limit = Some(polls);
        self
    }
}

/// Lifecycle of one sensor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Nothing sent yet
    Uninitialized,
    /// Reset released, identity not yet read
    Reset,
    /// PROD_ID matched, no mode active
    IdentityVerified,
    /// The device latched this recording mode
    ModeActive(RecordingMode),
}

/// The possible errors that the driver can return.
///
/// `Bus` wraps a failed SPI transfer and `Gpio` a failed busy or reset line access.
/// Both are treated as fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcmError<E> {
    /// An error occurred when using the bus
    Bus(E),
    /// Reading the busy line or driving the reset line failed
    Gpio(digital::ErrorKind),
    /// PROD_ID did not match after reset
    IdentityMismatch {
        /// Expected product id
        expected: u16,
        /// Value read from the device
        actual: u16,
    },
    /// REC_CTRL latched a different mode than requested
    ModeMismatch {
        /// Requested mode
        requested: RecordingMode,
        /// Raw mode bits read back
        latched: u8,
    },
    /// A streaming block did not have exactly 100 words
    MalformedBlock {
        /// Number of words received
        len: usize,
    },
    /// The busy line stayed low for the configured number of polls
    BusyTimeout {
        /// Number of polls performed
        polls: u32,
        /// Register the stalled exchange was addressing, if any
        register: Option<RegisterAddress>,
    },
    /// An invalid input was passed to the function
    InvalidConfig,
    /// The operation is not allowed in the current session state
    InvalidState(SessionState),
}

impl<E> AdcmError<E> {
    /// Attach the register being accessed to errors that carry one.
    pub(crate) fn at_register(self, reg: RegisterAddress) -> Self {
        match self {
            AdcmError::BusyTimeout { polls, .. } => AdcmError::BusyTimeout {
                polls,
                register: Some(reg),
            },
            other => other,
        }
    }
}

impl<E> From<E> for AdcmError<E> {
    fn from(error: E) -> Self {
        AdcmError::Bus(error)
    }
}
