//! Mock ADcmXL3021 for testing the driver
//!
//! Models the paged register file, the pipelined SPI read response, the axis buffers with
//! auto-increment, real time streaming and the busy line. Every exchanged frame is logged.

use adcmxl3021_driver::{BusTiming, VibrationSensor};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

const WRITE_BIT: u8 = 0x80;
const PAGE_0: u8 = 0x00;
const BUF_PNTR: u8 = 0x0A;
const AXIS_BUFFERS: [u8; 3] = [0x0E, 0x10, 0x12];
const FFT_AVG1: u8 = 0x06;
const REC_CTRL: u8 = 0x1A;
const AVG_CNT: u8 = 0x3A;
const GLOB_CMD: u8 = 0x3E;
const REC_INFO1: u8 = 0x66;
const REC_INFO2: u8 = 0x68;
const PROD_ID: u8 = 0x7E;

/// Error returned when a transfer failure was injected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBusError;

impl spi::Error for MockBusError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// Shared state of the mock device (uses interior mutability)
#[derive(Debug, Default)]
struct MockState {
    /// Selected page
    page: u8,
    /// Register bytes, (page, address) -> value
    registers: HashMap<(u8, u8), u8>,
    /// Response clocked out with the next frame
    pending: [u8; 2],
    /// Contents of X_BUF, Y_BUF and Z_BUF
    buffers: [Vec<u16>; 3],
    buffer_index: [usize; 3],
    /// Words sent in RTS byte order while streaming
    rts_words: VecDeque<u16>,
    streaming: bool,
    /// Mode bits REC_CTRL latches regardless of what is written
    forced_mode: Option<u8>,
    /// Number of upcoming busy polls that report busy
    busy_for: u32,
    always_busy: bool,
    /// Busy line stays low once this many frames were exchanged
    busy_after_frames: Option<usize>,
    busy_polls: u32,
    fail_next_transfer: bool,
    /// Every frame sent by the driver
    frames: Vec<[u8; 2]>,
    reset_levels: Vec<bool>,
    delay_ns: u64,
    recordings: u32,
}

impl MockState {
    fn exchange(&mut self, frame: [u8; 2]) -> [u8; 2] {
        self.frames.push(frame);

        if self.streaming {
            let word = self.rts_words.pop_front().unwrap_or(0);
            if self.rts_words.is_empty() {
                self.streaming = false;
            }
            return word.to_le_bytes();
        }

        let response = self.pending;
        self.pending = [0, 0];

        let [command, data] = frame;
        if command & WRITE_BIT != 0 {
            self.write_byte(command & !WRITE_BIT, data);
        } else {
            self.pending = self.read_word(command).to_be_bytes();
        }

        response
    }

    fn write_byte(&mut self, address: u8, data: u8) {
        if address == 0 {
            self.page = data;
            return;
        }

        self.registers.insert((self.page, address), data);

        // a completed 16 bit write ends on the odd address
        if address % 2 == 1 && self.page == PAGE_0 {
            let base = address - 1;
            let value = self.word(PAGE_0, base);
            self.on_register_written(base, value);
        }
    }

    fn on_register_written(&mut self, address: u8, value: u16) {
        match address {
            REC_CTRL => {
                if let Some(mode) = self.forced_mode {
                    self.set_word(PAGE_0, REC_CTRL, (value & !0x3) | mode as u16);
                }
            }
            AVG_CNT => self.set_word(PAGE_0, REC_INFO2, value & 0x7),
            FFT_AVG1 => self.set_word(PAGE_0, REC_INFO1, value & 0xFF),
            BUF_PNTR => self.buffer_index = [0; 3],
            GLOB_CMD if value & 0x0800 != 0 => {
                self.recordings += 1;
                if self.word(PAGE_0, REC_CTRL) & 0x3 == 0x3 && !self.rts_words.is_empty() {
                    self.streaming = true;
                }
            }
            _ => {}
        }
    }

    fn read_word(&mut self, address: u8) -> u16 {
        if self.page == PAGE_0 {
            if let Some(axis) = AXIS_BUFFERS.iter().position(|&a| a == address) {
                let index = self.buffer_index[axis];
                self.buffer_index[axis] += 1;
                return self.buffers[axis].get(index).copied().unwrap_or(0);
            }
        }
        if address == 0 {
            return self.page as u16;
        }
        self.word(self.page, address)
    }

    fn word(&self, page: u8, address: u8) -> u16 {
        let low = self.registers.get(&(page, address)).copied().unwrap_or(0);
        let high = self.registers.get(&(page, address + 1)).copied().unwrap_or(0);
        u16::from_le_bytes([low, high])
    }

    fn set_word(&mut self, page: u8, address: u8, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.registers.insert((page, address), low);
        self.registers.insert((page, address + 1), high);
    }
}

/// Handle to the mock device, cloned into every bus and pin mock
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    /// Device reporting the ADcmXL3021 product id
    pub fn new() -> Self {
        let device = Self {
            state: Rc::new(RefCell::new(MockState::default())),
        };
        device.set_register(PAGE_0, PROD_ID, 0x0BCD);
        device
    }

    /// Bus, busy line, reset line and delay sharing this device
    pub fn parts(&self) -> (MockSpi, MockBusy, MockReset, MockDelay) {
        (
            MockSpi(self.clone()),
            MockBusy(self.clone()),
            MockReset(self.clone()),
            MockDelay(self.clone()),
        )
    }

    /// Sensor wired to this device with no settle spinning and no busy limit
    pub fn sensor(&self) -> MockSensor {
        self.sensor_with_timing(BusTiming {
            settle_spins: 0,
            busy_poll_limit: None,
        })
    }

    /// Sensor wired to this device with custom timing
    pub fn sensor_with_timing(&self, timing: BusTiming) -> MockSensor {
        let (spi, busy, reset, delay) = self.parts();
        VibrationSensor::new("mock", spi, busy, reset, delay, timing)
    }

    /// Sensor that already passed `init`
    pub fn initialized_sensor(&self) -> MockSensor {
        let mut sensor = self.sensor();
        sensor.init().unwrap();
        self.clear_frames();
        sensor
    }

    pub fn set_register(&self, page: u8, address: u8, value: u16) {
        self.state.borrow_mut().set_word(page, address, value);
    }

    pub fn register(&self, page: u8, address: u8) -> u16 {
        self.state.borrow().word(page, address)
    }

    /// Fill X_BUF, Y_BUF and Z_BUF
    pub fn load_buffers(&self, x: Vec<u16>, y: Vec<u16>, z: Vec<u16>) {
        self.state.borrow_mut().buffers = [x, y, z];
    }

    /// Queue words sent once an RTS recording starts
    pub fn queue_rts_words(&self, words: &[u16]) {
        self.state.borrow_mut().rts_words.extend(words);
    }

    pub fn force_mode(&self, mode: u8) {
        self.state.borrow_mut().forced_mode = Some(mode);
    }

    pub fn hold_busy(&self, polls: u32) {
        self.state.borrow_mut().busy_for = polls;
    }

    pub fn busy_after_frames(&self, frames: usize) {
        self.state.borrow_mut().busy_after_frames = Some(frames);
    }

    pub fn always_busy(&self) {
        self.state.borrow_mut().always_busy = true;
    }

    pub fn fail_next_transfer(&self) {
        self.state.borrow_mut().fail_next_transfer = true;
    }

    pub fn frames(&self) -> Vec<[u8; 2]> {
        self.state.borrow().frames.clone()
    }

    pub fn clear_frames(&self) {
        let mut state = self.state.borrow_mut();
        state.frames.clear();
        state.busy_polls = 0;
    }

    pub fn busy_polls(&self) -> u32 {
        self.state.borrow().busy_polls
    }

    pub fn reset_levels(&self) -> Vec<bool> {
        self.state.borrow().reset_levels.clone()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.borrow().delay_ns / 1_000_000
    }

    pub fn recordings(&self) -> u32 {
        self.state.borrow().recordings
    }
}

/// SPI device side of the mock
#[derive(Debug)]
pub struct MockSpi(MockDevice);

impl spi::ErrorType for MockSpi {
    type Error = MockBusError;
}

impl SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut state = self.0.state.borrow_mut();

        for operation in operations.iter_mut() {
            if state.fail_next_transfer {
                state.fail_next_transfer = false;
                return Err(MockBusError);
            }

            match operation {
                Operation::Transfer(read, write) => {
                    let response = state.exchange([write[0], write[1]]);
                    read[..2].copy_from_slice(&response);
                }
                Operation::TransferInPlace(buffer) => {
                    let response = state.exchange([buffer[0], buffer[1]]);
                    buffer[..2].copy_from_slice(&response);
                }
                Operation::Write(buffer) => {
                    state.exchange([buffer[0], buffer[1]]);
                }
                Operation::Read(buffer) => {
                    let response = state.exchange([0, 0]);
                    buffer[..2].copy_from_slice(&response);
                }
                Operation::DelayNs(ns) => state.delay_ns += *ns as u64,
            }
        }

        Ok(())
    }
}

/// Busy line of the mock, high means ready
#[derive(Debug)]
pub struct MockBusy(MockDevice);

impl digital::ErrorType for MockBusy {
    type Error = Infallible;
}

impl InputPin for MockBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.0.state.borrow_mut();
        state.busy_polls += 1;

        if state.always_busy {
            return Ok(false);
        }
        if matches!(state.busy_after_frames, Some(limit) if state.frames.len() >= limit) {
            return Ok(false);
        }
        if state.busy_for > 0 {
            state.busy_for -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Reset line of the mock
#[derive(Debug)]
pub struct MockReset(MockDevice);

impl digital::ErrorType for MockReset {
    type Error = Infallible;
}

impl OutputPin for MockReset {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.state.borrow_mut().reset_levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.state.borrow_mut().reset_levels.push(true);
        Ok(())
    }
}

/// Delay of the mock, only accumulates the requested time
#[derive(Debug)]
pub struct MockDelay(MockDevice);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.state.borrow_mut().delay_ns += ns as u64;
    }
}

/// Sensor type wired to the mock
pub type MockSensor = VibrationSensor<MockSpi, MockBusy, MockReset, MockDelay>;
