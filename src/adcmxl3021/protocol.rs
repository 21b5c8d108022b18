// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use embedded_hal::digital::{Error as _, InputPin};
use embedded_hal::spi::SpiDevice;

use super::registers::RegisterAddress;
use super::{AdcmError, BusTiming};

const WRITE_BIT: u8 = 0x80;

/// The two bytes exchanged in one SPI transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WordFrame(pub [u8; 2]);

impl WordFrame {
    /// Frame of two zero bytes, clocks out the pending response.
    pub const NULL: WordFrame = WordFrame([0, 0]);

    /// Select the page all following register accesses refer to.
    pub fn page_select(page_id: u8) -> Self {
        WordFrame([WRITE_BIT, page_id])
    }

    /// Request the register at `address`; the value arrives with the next frame.
    pub fn read_request(address: u8) -> Self {
        WordFrame([address, 0])
    }

    /// Write one byte to `address` of the selected page.
    pub fn write_byte(address: u8, value: u8) -> Self {
        WordFrame([address | WRITE_BIT, value])
    }

    /// Standard order, first byte is the high byte.
    pub fn standard(self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Real time streaming order, first byte is the low byte.
    pub fn rts(self) -> u16 {
        u16::from_le_bytes(self.0)
    }
}

/// Paged register access over a 2 byte SPI exchange, gated by the busy line.
pub struct RegisterBus<SPI, BUSY> {
    spi: SPI,
    busy: BUSY,
    timing: BusTiming,
}

impl<SPI, BUSY, E> RegisterBus<SPI, BUSY>
where
    SPI: SpiDevice<u8, Error = E>,
    BUSY: InputPin,
{
    /// Take ownership of the bus and the busy line.
    pub fn new(spi: SPI, busy: BUSY, timing: BusTiming) -> Self {
        RegisterBus { spi, busy, timing }
    }

    /// Give back the bus and the busy line.
    pub fn release(self) -> (SPI, BUSY) {
        (self.spi, self.busy)
    }

    /// Timing this bus was built with.
    pub fn timing(&self) -> BusTiming {
        self.timing
    }

    /// One transfer, followed by the settle busy-work. Does not look at the busy line.
    pub fn exchange(&mut self, frame: WordFrame) -> Result<WordFrame, AdcmError<E>> {
        let mut response = WordFrame::default();
        self.spi.transfer(&mut response.0, &frame.0)?;
        self.settle();

        Ok(response)
    }

    /// Wait until the busy line reads high, then [`exchange`](Self::exchange).
    pub fn exchange_blocking(&mut self, frame: WordFrame) -> Result<WordFrame, AdcmError<E>> {
        let mut polls: u32 = 0;

        loop {
            let ready = self
                .busy
                .is_high()
                .map_err(|e| AdcmError::Gpio(e.kind()))?;

            if ready {
                return self.exchange(frame);
            }

            polls = polls.saturating_add(1);
            if let Some(limit) = self.timing.busy_poll_limit {
                if polls >= limit {
                    error!("Busy line stuck low after {=u32} polls", polls);
                    return Err(AdcmError::BusyTimeout {
                        polls,
                        register: None,
                    });
                }
            }
        }
    }

    /// Read a 16 bit register. Returns 0 without touching the bus if the register is write only.
    pub fn read_register(&mut self, reg: RegisterAddress) -> Result<u16, AdcmError<E>> {
        if !reg.read_flag {
            error!(
                "Cannot read register (page: {=u8}, address: {=u8:#04x}), read flag not set",
                reg.page_id,
                reg.address
            );
            return Ok(0);
        }

        let value = self
            .read_frames(reg)
            .map_err(|e| register_failure(reg, e))?;
        trace!(
            "read page {=u8} address {=u8:#04x}: {=u16:#06x}",
            reg.page_id,
            reg.address,
            value
        );
        Ok(value)
    }

    /// Write a 16 bit register, low byte first. No-op if the register is read only.
    pub fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), AdcmError<E>> {
        if !reg.write_flag {
            error!(
                "Cannot write register (page: {=u8}, address: {=u8:#04x}), write flag not set",
                reg.page_id,
                reg.address
            );
            return Ok(());
        }

        self.write_frames(reg, value)
            .map_err(|e| register_failure(reg, e))?;

        trace!(
            "wrote page {=u8} address {=u8:#04x}: {=u16:#06x}",
            reg.page_id,
            reg.address,
            value
        );
        Ok(())
    }

    fn read_frames(&mut self, reg: RegisterAddress) -> Result<u16, AdcmError<E>> {
        self.exchange_blocking(WordFrame::page_select(reg.page_id))?;
        self.exchange_blocking(WordFrame::read_request(reg.address))?;
        let response = self.exchange_blocking(WordFrame::NULL)?;

        Ok(response.standard())
    }

    fn write_frames(&mut self, reg: RegisterAddress, value: u16) -> Result<(), AdcmError<E>> {
        let [high, low] = value.to_be_bytes();

        self.exchange_blocking(WordFrame::page_select(reg.page_id))?;
        self.exchange_blocking(WordFrame::write_byte(reg.address, low))?;
        self.exchange_blocking(WordFrame::write_byte(reg.address + 1, high))?;

        Ok(())
    }

    fn settle(&self) {
        for _ in 0..self.timing.settle_spins {
            core::hint::spin_loop();
        }
    }
}

/// Log the register a failed exchange sequence was addressing and attach it to the error.
pub(crate) fn register_failure<E>(reg: RegisterAddress, error: AdcmError<E>) -> AdcmError<E> {
    error!(
        "Exchange failed at page {=u8} address {=u8:#04x}",
        reg.page_id,
        reg.address
    );
    error.at_register(reg)
}
