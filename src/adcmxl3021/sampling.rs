// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::protocol::{register_failure, RegisterBus, WordFrame};
use super::registers::{self, RegisterAddress};
use super::spi::VibrationSensor;
use super::{
    AdcmError, Decimation, RecordingMode, SessionState, BASE_SAMPLE_RATE, FFT_BINS, MTC_SAMPLES,
    RTS_BLOCKS_PER_CAPTURE, RTS_BLOCK_WORDS, RTS_SAMPLES_PER_BLOCK,
};

/// LSB weight of a time capture sample in g.
const MTC_SCALE: f32 = 0.001907349;

/// Scale of a spectrum bin in mg.
const FFT_SCALE: f32 = 0.9535;

/// Exponent divisor of the logarithmic spectrum encoding.
const FFT_LOG_DIVISOR: f32 = 2048.0;

/// Raw word to engineering unit conversion, picked once per capture.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Conversion {
    /// Real time streaming, raw LSB passed through unscaled.
    Streaming,
    /// Time capture, signed LSB to g.
    Capture,
    /// FFT bin to mg. A raw 0 always maps to 0.
    Spectrum {
        /// Spectral averages the device accumulated per record
        averages: u8,
    },
}

impl Conversion {
    /// Convert one raw word.
    pub fn apply(self, raw: u16) -> f32 {
        match self {
            Conversion::Streaming => raw as f32,
            Conversion::Capture => (raw as i16) as f32 * MTC_SCALE,
            Conversion::Spectrum { averages } => {
                let value = raw as i16;
                if value == 0 {
                    return 0.0;
                }
                libm::powf(2.0, value as f32 / FFT_LOG_DIVISOR) / averages as f32 * FFT_SCALE
            }
        }
    }
}

/// Sample count, step size and conversion of one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapturePlan {
    /// Samples per axis
    pub sample_count: usize,
    /// Distance between two points of the step axis, seconds or Hz
    pub step_size: f32,
    /// Conversion applied to every sample
    pub conversion: Conversion,
}

impl CapturePlan {
    /// Ten 32 sample streaming blocks at the base rate.
    pub fn streaming() -> Self {
        CapturePlan {
            sample_count: RTS_BLOCKS_PER_CAPTURE * RTS_SAMPLES_PER_BLOCK,
            step_size: 1.0 / BASE_SAMPLE_RATE,
            conversion: Conversion::Streaming,
        }
    }

    /// 4096 samples at the decimated rate.
    pub fn time_capture(decimation: Decimation) -> Self {
        CapturePlan {
            sample_count: MTC_SAMPLES,
            step_size: 1.0 / (BASE_SAMPLE_RATE / decimation.factor() as f32),
            conversion: Conversion::Capture,
        }
    }

    /// 2048 bins up to the Nyquist frequency of the decimated rate.
    pub fn spectrum(decimation: Decimation, averages: u8) -> Self {
        let averages = if averages == 0 {
            warn!("Device reports 0 spectral averages, assuming 1");
            1
        } else {
            averages
        };

        CapturePlan {
            sample_count: FFT_BINS,
            step_size: BASE_SAMPLE_RATE / 2.0 / decimation.factor() as f32 / FFT_BINS as f32,
            conversion: Conversion::Spectrum { averages },
        }
    }
}

/// `count` points spaced `step_size` apart, starting at 0.
pub fn generate_steps(step_size: f32, count: usize) -> Vec<f32> {
    (0..count).map(|i| step_size * i as f32).collect()
}

/// One real time streaming block, decoded by word position.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtsBlock {
    /// Word 0
    pub sequence_number: u16,
    /// Words 1 to 32
    pub x: [u16; RTS_SAMPLES_PER_BLOCK],
    /// Words 33 to 64
    pub y: [u16; RTS_SAMPLES_PER_BLOCK],
    /// Words 65 to 96
    pub z: [u16; RTS_SAMPLES_PER_BLOCK],
    /// Word 97
    pub temperature: u16,
    /// Word 98
    pub status: u16,
    /// Word 99
    pub crc: u16,
}

/// A streaming block that was not exactly [`RTS_BLOCK_WORDS`] long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MalformedBlock {
    /// Words received
    pub len: usize,
}

/// Split a 100 word streaming block into its fields.
pub fn parse_rts_block(words: &[u16]) -> Result<RtsBlock, MalformedBlock> {
    if words.len() != RTS_BLOCK_WORDS {
        error!("RTS data parsing error, got {=usize} words", words.len());
        return Err(MalformedBlock { len: words.len() });
    }

    let axis = |first: usize| {
        let mut samples = [0u16; RTS_SAMPLES_PER_BLOCK];
        samples.copy_from_slice(&words[first..first + RTS_SAMPLES_PER_BLOCK]);
        samples
    };

    Ok(RtsBlock {
        sequence_number: words[0],
        x: axis(1),
        y: axis(33),
        z: axis(65),
        temperature: words[97],
        status: words[98],
        crc: words[99],
    })
}

/// Per block metadata of a streaming capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockMetadata {
    /// Raw temperature word
    pub temperature: u16,
    /// Raw status word
    pub status: u16,
    /// Block CRC
    pub crc: u16,
    /// Block sequence number
    pub sequence_number: u16,
}

/// One row of a batch, as a storage collaborator would write it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleRow {
    /// Time in s or frequency in Hz
    pub step: f32,
    /// x axis value
    pub x: f32,
    /// y axis value
    pub y: f32,
    /// z axis value
    pub z: f32,
    /// Metadata of the enclosing block, RTS only
    pub block: Option<BlockMetadata>,
}

/// Result of one capture.
///
/// The three axes and `step_axis` always have the same length. The per block
/// vectors are only filled in RTS mode and hold one entry per 32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    /// Mode the batch was recorded in
    pub recording_mode: RecordingMode,
    /// Time axis in s, or frequency axis in Hz for the FFT modes
    pub step_axis: Vec<f32>,
    /// x axis samples
    pub x_axis: Vec<f32>,
    /// y axis samples
    pub y_axis: Vec<f32>,
    /// z axis samples
    pub z_axis: Vec<f32>,
    /// Temperature word per block
    pub temperature: Vec<u16>,
    /// Status word per block
    pub status: Vec<u16>,
    /// CRC per block
    pub crc: Vec<u16>,
    /// Sequence number per block
    pub sequence_number: Vec<u16>,
}

impl SampleBatch {
    /// Empty batch for `recording_mode`.
    pub fn new(recording_mode: RecordingMode) -> Self {
        SampleBatch {
            recording_mode,
            step_axis: Vec::new(),
            x_axis: Vec::new(),
            y_axis: Vec::new(),
            z_axis: Vec::new(),
            temperature: Vec::new(),
            status: Vec::new(),
            crc: Vec::new(),
            sequence_number: Vec::new(),
        }
    }

    /// Samples per axis.
    pub fn len(&self) -> usize {
        self.x_axis.len()
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.x_axis.is_empty()
    }

    /// Append a parsed streaming block.
    pub fn push_rts_block(&mut self, block: &RtsBlock) {
        fn convert(samples: &[u16; RTS_SAMPLES_PER_BLOCK]) -> impl Iterator<Item = f32> + '_ {
            samples.iter().map(|&raw| Conversion::Streaming.apply(raw))
        }

        self.x_axis.extend(convert(&block.x));
        self.y_axis.extend(convert(&block.y));
        self.z_axis.extend(convert(&block.z));
        self.sequence_number.push(block.sequence_number);
        self.temperature.push(block.temperature);
        self.status.push(block.status);
        self.crc.push(block.crc);
    }

    /// Metadata of streaming block `index`.
    pub fn block_metadata(&self, index: usize) -> Option<BlockMetadata> {
        Some(BlockMetadata {
            temperature: *self.temperature.get(index)?,
            status: *self.status.get(index)?,
            crc: *self.crc.get(index)?,
            sequence_number: *self.sequence_number.get(index)?,
        })
    }

    /// Iterate row by row.
    pub fn rows(&self) -> impl Iterator<Item = SampleRow> + '_ {
        let streaming = self.recording_mode == RecordingMode::Rts;

        self.step_axis
            .iter()
            .zip(&self.x_axis)
            .zip(&self.y_axis)
            .zip(&self.z_axis)
            .enumerate()
            .map(move |(i, (((&step, &x), &y), &z))| SampleRow {
                step,
                x,
                y,
                z,
                block: if streaming {
                    self.block_metadata(i / RTS_SAMPLES_PER_BLOCK)
                } else {
                    None
                },
            })
    }
}

impl<SPI, BUSY, E> RegisterBus<SPI, BUSY>
where
    SPI: SpiDevice<u8, Error = E>,
    BUSY: InputPin,
{
    /// Drain `count` words from an axis buffer.
    ///
    /// The last word is clocked out with a null frame and no busy check, which
    /// closes the read sequence.
    pub fn drain_axis_buffer(
        &mut self,
        reg: RegisterAddress,
        count: usize,
        conversion: Conversion,
    ) -> Result<Vec<f32>, AdcmError<E>> {
        self.drain_frames(reg, count, conversion)
            .map_err(|e| register_failure(reg, e))
    }

    fn drain_frames(
        &mut self,
        reg: RegisterAddress,
        count: usize,
        conversion: Conversion,
    ) -> Result<Vec<f32>, AdcmError<E>> {
        let mut samples = Vec::with_capacity(count);
        if count == 0 {
            return Ok(samples);
        }

        self.exchange_blocking(WordFrame::page_select(reg.page_id))?;
        self.exchange_blocking(WordFrame::read_request(reg.address))?;

        for _ in 0..count - 1 {
            let raw = self
                .exchange_blocking(WordFrame::read_request(reg.address))?
                .standard();
            samples.push(conversion.apply(raw));
        }

        let raw = self.exchange(WordFrame::NULL)?.standard();
        samples.push(conversion.apply(raw));

        Ok(samples)
    }

    /// Clock out one streaming block in RTS byte order, without busy checks.
    pub fn read_rts_block(
        &mut self,
    ) -> Result<heapless::Vec<u16, RTS_BLOCK_WORDS>, AdcmError<E>> {
        (0..RTS_BLOCK_WORDS)
            .map(|_| self.exchange(WordFrame::NULL).map(WordFrame::rts))
            .collect()
    }
}

impl<SPI, BUSY, RST, D, E> VibrationSensor<SPI, BUSY, RST, D>
where
    SPI: SpiDevice<u8, Error = E>,
    BUSY: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    /// Read the samples of the last recording in the active mode.
    ///
    /// Call after [`trigger_recording`](Self::trigger_recording) or an external
    /// trigger pulse. Nothing is retried; a failed transfer fails the capture.
    pub fn retrieve_vibration_data(&mut self) -> Result<SampleBatch, AdcmError<E>> {
        let mode = match self.state() {
            SessionState::ModeActive(mode) => mode,
            state => return Err(AdcmError::InvalidState(state)),
        };

        let plan = match mode {
            RecordingMode::Rts => CapturePlan::streaming(),
            RecordingMode::Mtc => CapturePlan::time_capture(self.read_decimation_factor()?),
            RecordingMode::Mfft | RecordingMode::Afft => {
                let decimation = self.read_decimation_factor()?;
                let averages = self.read_fft_average_count()?;
                CapturePlan::spectrum(decimation, averages)
            }
        };

        let mut batch = SampleBatch::new(mode);

        if mode == RecordingMode::Rts {
            for _ in 0..RTS_BLOCKS_PER_CAPTURE {
                let words = self.bus.read_rts_block()?;
                let block = parse_rts_block(&words)
                    .map_err(|malformed| AdcmError::MalformedBlock { len: malformed.len })?;
                batch.push_rts_block(&block);
            }
        } else {
            self.bus.write_register(registers::BUF_PNTR, 0)?;
            batch.x_axis =
                self.bus
                    .drain_axis_buffer(registers::X_BUF, plan.sample_count, plan.conversion)?;
            batch.y_axis =
                self.bus
                    .drain_axis_buffer(registers::Y_BUF, plan.sample_count, plan.conversion)?;
            batch.z_axis =
                self.bus
                    .drain_axis_buffer(registers::Z_BUF, plan.sample_count, plan.conversion)?;
        }

        batch.step_axis = generate_steps(plan.step_size, plan.sample_count);

        debug!(
            "{=str}: retrieved {=usize} samples per axis",
            self.name(),
            batch.len()
        );
        Ok(batch)
    }
}
