// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use alloc::string::String;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::bits::{
    AvgCnt, FftAvg1, FiltCtrl, RecCtrl, GLOB_CMD_FACTORY_RESTORE, GLOB_CMD_RECORD,
    MISC_CTRL_EXT_TRIGGER, REC_CTRL_AUTONULL,
};
use super::protocol::RegisterBus;
use super::registers;
use super::{
    AdcmError, BusTiming, Decimation, FirFilter, RecordingConfig, RecordingMode, SessionState,
    FIR_TAPS, POWER_UP_DELAY_MS, PROD_ID_VALUE, RECORD_SETTLE_MS, RESET_RECOVERY_MS,
};

const AUTONULL_SETTLE_MS: u32 = 10;
const AUTONULL_RECORD_MS: u32 = 500;

/// Offsets measured and stored by [`VibrationSensor::trigger_autonull`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutonullOffsets {
    /// X_STATISTIC copied to X_ANULL
    pub x: u16,
    /// Y_STATISTIC copied to Y_ANULL
    pub y: u16,
    /// Z_STATISTIC copied to Z_ANULL
    pub z: u16,
}

/// One ADcmXL3021 on its own SPI device, busy line and reset line.
///
/// Every instance owns its bus and pins. Drive several sensors by holding
/// several instances and calling them one after the other.
pub struct VibrationSensor<SPI, BUSY, RST, D> {
    name: String,
    pub(crate) bus: RegisterBus<SPI, BUSY>,
    reset: RST,
    delay: D,
    state: SessionState,
}

impl<SPI, BUSY, RST, D, E> VibrationSensor<SPI, BUSY, RST, D>
where
    SPI: SpiDevice<u8, Error = E>,
    BUSY: InputPin,
    RST: OutputPin,
    D: DelayNs,
{
    /// Take ownership of the opened bus and lines. Nothing is sent until [`init`](Self::init).
    ///
    /// The SPI device should run in mode 3, MSB first, with 8 bit words.
    pub fn new(
        name: impl Into<String>,
        spi: SPI,
        busy: BUSY,
        reset: RST,
        delay: D,
        timing: BusTiming,
    ) -> Self {
        VibrationSensor {
            name: name.into(),
            bus: RegisterBus::new(spi, busy, timing),
            reset,
            delay,
            state: SessionState::Uninitialized,
        }
    }

    /// Name used in log messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Direct access to the register protocol layer.
    pub fn bus(&mut self) -> &mut RegisterBus<SPI, BUSY> {
        &mut self.bus
    }

    /// Hardware reset followed by the PROD_ID check.
    ///
    /// Holds reset low for the 200ms power up time, releases it and then waits 500ms
    /// for the busy line to stop toggling. Fails if the device is not an ADcmXL3021.
    pub fn init(&mut self) -> Result<(), AdcmError<E>> {
        self.reset.set_low().map_err(|e| AdcmError::Gpio(e.kind()))?;
        self.delay.delay_ms(POWER_UP_DELAY_MS);

        self.reset.set_high().map_err(|e| AdcmError::Gpio(e.kind()))?;
        self.delay.delay_ms(RESET_RECOVERY_MS);
        self.state = SessionState::Reset;

        let prod_id = self.product_id()?;
        if prod_id != PROD_ID_VALUE {
            error!(
                "{=str}: not getting the right PROD_ID, expected {=u16:#06x}, got {=u16:#06x}",
                self.name.as_str(),
                PROD_ID_VALUE,
                prod_id
            );
            return Err(AdcmError::IdentityMismatch {
                expected: PROD_ID_VALUE,
                actual: prod_id,
            });
        }

        self.state = SessionState::IdentityVerified;
        info!("{=str}: setup done", self.name.as_str());
        Ok(())
    }

    /// Read PROD_ID.
    pub fn product_id(&mut self) -> Result<u16, AdcmError<E>> {
        self.bus.read_register(registers::PROD_ID)
    }

    /// Configure and start `mode`.
    ///
    /// The FFT modes write the spectral average count first. Every mode except RTS then writes
    /// the decimation and the FIR filter; a custom filter is loaded into bank F before bank F is
    /// selected. Finally REC_CTRL is written and read back. If the device latched a different
    /// mode the call fails with [`AdcmError::ModeMismatch`] and no mode is active. A failed
    /// transfer part way through also leaves no mode active.
    pub fn activate_mode(
        &mut self,
        mode: RecordingMode,
        config: &RecordingConfig,
    ) -> Result<(), AdcmError<E>> {
        self.require_verified()?;

        if mode.is_spectrum() && config.spectral_avg_count == 0 {
            error!("{=str}: spectral average count must be at least 1", self.name.as_str());
            return Err(AdcmError::InvalidConfig);
        }

        // no mode is active until REC_CTRL reads back
        self.state = SessionState::IdentityVerified;

        if mode.is_spectrum() {
            let fft_avg = FftAvg1::with_sr0(config.spectral_avg_count);
            self.bus.write_register(registers::FFT_AVG1, fft_avg.0)?;
        }

        // RTS bypasses decimation and the FIR filters
        if mode != RecordingMode::Rts {
            let avg_cnt = AvgCnt::with_sr0(config.decimation.exponent());
            self.bus.write_register(registers::AVG_CNT, avg_cnt.0)?;

            if let FirFilter::Custom(taps) = config.fir_filter {
                self.write_custom_fir_filter_taps(&taps)?;
            }
            self.write_fir_filter(&config.fir_filter)?;
        }

        self.write_recording_control(mode, config)
    }

    fn write_recording_control(
        &mut self,
        mode: RecordingMode,
        config: &RecordingConfig,
    ) -> Result<(), AdcmError<E>> {
        let rec_ctrl = RecCtrl::for_mode(mode as u8, config.window as u8);
        self.bus.write_register(registers::REC_CTRL, rec_ctrl.0)?;

        let latched = RecCtrl(self.bus.read_register(registers::REC_CTRL)?).mode();
        match RecordingMode::from_repr(latched) {
            Some(active) if active == mode => {
                self.state = SessionState::ModeActive(mode);
                info!("{=str}: {=str} mode active", self.name.as_str(), mode.as_ref());
                Ok(())
            }
            _ => {
                error!(
                    "{=str}: requested {=str} but the device latched mode bits {=u8}",
                    self.name.as_str(),
                    mode.as_ref(),
                    latched
                );
                self.state = SessionState::IdentityVerified;
                Err(AdcmError::ModeMismatch {
                    requested: mode,
                    latched,
                })
            }
        }
    }

    fn write_fir_filter(&mut self, fir_filter: &FirFilter) -> Result<(), AdcmError<E>> {
        let filt_ctrl = FiltCtrl::all_axes(fir_filter.bank());
        self.bus.write_register(registers::FILT_CTRL, filt_ctrl.0)
    }

    fn write_custom_fir_filter_taps(&mut self, taps: &[i16; FIR_TAPS]) -> Result<(), AdcmError<E>> {
        for (reg, &tap) in registers::FIR_COEFFS_F.iter().zip(taps) {
            self.bus.write_register(*reg, tap as u16)?;
        }
        debug!("{=str}: custom FIR taps stored in bank F", self.name.as_str());
        Ok(())
    }

    /// Arm the external trigger input. The write is not read back.
    pub fn activate_external_trigger(&mut self) -> Result<(), AdcmError<E>> {
        self.require_verified()?;
        self.bus
            .write_register(registers::MISC_CTRL, MISC_CTRL_EXT_TRIGGER)
    }

    /// Start a recording and wait until the buffers can be read.
    pub fn trigger_recording(&mut self) -> Result<(), AdcmError<E>> {
        self.require_verified()?;
        self.bus.write_register(registers::GLOB_CMD, GLOB_CMD_RECORD)?;
        self.delay.delay_ms(RECORD_SETTLE_MS);
        Ok(())
    }

    /// Measure the resting offset of each axis and store it as the autonull correction.
    ///
    /// Overwrites REC_CTRL, so a mode has to be activated again afterwards.
    pub fn trigger_autonull(&mut self) -> Result<AutonullOffsets, AdcmError<E>> {
        self.require_verified()?;
        self.state = SessionState::IdentityVerified;

        info!("{=str}: autonull, setting statistic mode", self.name.as_str());
        self.bus
            .write_register(registers::REC_CTRL, REC_CTRL_AUTONULL)?;
        self.delay.delay_ms(AUTONULL_SETTLE_MS);

        info!("{=str}: autonull, start record", self.name.as_str());
        self.bus.write_register(registers::GLOB_CMD, GLOB_CMD_RECORD)?;
        self.delay.delay_ms(AUTONULL_RECORD_MS);

        info!("{=str}: autonull, stop record", self.name.as_str());
        self.bus.write_register(registers::GLOB_CMD, GLOB_CMD_RECORD)?;
        self.delay.delay_ms(AUTONULL_SETTLE_MS);

        let offsets = AutonullOffsets {
            x: self.bus.read_register(registers::X_STATISTIC)?,
            y: self.bus.read_register(registers::Y_STATISTIC)?,
            z: self.bus.read_register(registers::Z_STATISTIC)?,
        };
        info!(
            "{=str}: autonull, x_stat: {=u16}, y_stat: {=u16}, z_stat: {=u16}",
            self.name.as_str(),
            offsets.x,
            offsets.y,
            offsets.z
        );

        self.bus.write_register(registers::X_ANULL, offsets.x)?;
        self.bus.write_register(registers::Y_ANULL, offsets.y)?;
        self.bus.write_register(registers::Z_ANULL, offsets.z)?;
        self.delay.delay_ms(AUTONULL_SETTLE_MS);

        Ok(offsets)
    }

    /// Restore the factory configuration. A mode has to be activated again afterwards.
    pub fn restore_factory_settings(&mut self) -> Result<(), AdcmError<E>> {
        self.require_verified()?;
        self.bus
            .write_register(registers::GLOB_CMD, GLOB_CMD_FACTORY_RESTORE)?;
        self.state = SessionState::IdentityVerified;
        Ok(())
    }

    /// Decimation reported by REC_INFO2[2:0].
    pub fn read_decimation_factor(&mut self) -> Result<Decimation, AdcmError<E>> {
        let rec_info = self.bus.read_register(registers::REC_INFO2)?;
        Ok(Decimation::from_field(rec_info))
    }

    /// Spectral averages reported by REC_INFO1[7:0].
    pub fn read_fft_average_count(&mut self) -> Result<u8, AdcmError<E>> {
        let rec_info = self.bus.read_register(registers::REC_INFO1)?;
        Ok((rec_info & 0xFF) as u8)
    }

    /// Give back the bus, the busy line, the reset line and the delay.
    pub fn release(self) -> (SPI, BUSY, RST, D) {
        let (spi, busy) = self.bus.release();
        (spi, busy, self.reset, self.delay)
    }

    fn require_verified(&self) -> Result<(), AdcmError<E>> {
        match self.state {
            SessionState::IdentityVerified | SessionState::ModeActive(_) => Ok(()),
            state => Err(AdcmError::InvalidState(state)),
        }
    }
}
