//! Unit tests for the register protocol layer

use crate::common::{page_select, MockBusError, MockDevice, PAGE_0, PAGE_10};
use adcmxl3021_driver::adcmxl3021::registers::{self, RegisterAddress};
use adcmxl3021_driver::{AdcmError, BusTiming, WordFrame};

#[test]
fn test_read_register_framing() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();

    let value = sensor.bus().read_register(registers::PROD_ID).unwrap();

    assert_eq!(value, 0x0BCD);
    assert_eq!(
        device.frames(),
        vec![page_select(PAGE_0), [0x7E, 0x00], [0x00, 0x00]],
        "page select, address frame, null frame"
    );
}

#[test]
fn test_write_register_framing() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();

    sensor
        .bus()
        .write_register(registers::REC_PRD, 0xA1B2)
        .unwrap();

    assert_eq!(
        device.frames(),
        vec![page_select(PAGE_0), [0x9E, 0xB2], [0x9F, 0xA1]],
        "low byte first, high byte at address + 1"
    );
}

#[test]
fn test_write_read_only_register_is_noop() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();

    let read_only = [
        registers::PROD_ID,
        registers::TEMP_OUT,
        registers::X_BUF,
        registers::REC_INFO2,
        registers::DIAG_STAT,
    ];
    for reg in read_only {
        assert!(sensor.bus().write_register(reg, 0xFFFF).is_ok());
    }

    assert!(device.frames().is_empty(), "no exchange may occur");
    assert_eq!(device.busy_polls(), 0);
    assert_eq!(device.register(PAGE_0, 0x7E), 0x0BCD);
}

#[test]
fn test_read_write_only_register_returns_zero() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();

    let write_only = RegisterAddress {
        page_id: 2,
        address: 0x10,
        read_flag: false,
        write_flag: true,
    };

    assert_eq!(sensor.bus().read_register(registers::GLOB_CMD).unwrap(), 0);
    assert_eq!(sensor.bus().read_register(write_only).unwrap(), 0);
    assert!(device.frames().is_empty());
}

#[test]
fn test_write_then_read_round_trip() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();

    for value in [0x0000, 0x0001, 0x7FFF, 0x8000, 0xFFFF, 0x1234] {
        sensor.bus().write_register(registers::X_ANULL, value).unwrap();
        assert_eq!(sensor.bus().read_register(registers::X_ANULL).unwrap(), value);
    }
}

#[test]
fn test_paged_round_trip() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();
    let tap = registers::FIR_COEFFS_F[7];

    sensor.bus().write_register(tap, 0xFF9C).unwrap();
    sensor.bus().write_register(registers::REC_PRD, 0x0042).unwrap();

    assert_eq!(device.register(PAGE_10, tap.address), 0xFF9C);
    assert_eq!(device.register(PAGE_0, tap.address), 0x0000, "page 0 untouched");
    assert_eq!(sensor.bus().read_register(tap).unwrap(), 0xFF9C);
    assert_eq!(sensor.bus().read_register(registers::REC_PRD).unwrap(), 0x0042);
}

#[test]
fn test_exchange_waits_for_busy_line() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();
    device.hold_busy(25);

    sensor.bus().exchange_blocking(WordFrame::NULL).unwrap();

    assert_eq!(device.busy_polls(), 26);
    assert_eq!(device.frames().len(), 1, "exchange happens once the line is ready");
}

#[test]
fn test_raw_exchange_ignores_busy_line() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();
    device.always_busy();

    sensor.bus().exchange(WordFrame::NULL).unwrap();

    assert_eq!(device.busy_polls(), 0);
    assert_eq!(device.frames().len(), 1);
}

#[test]
fn test_busy_timeout() {
    let device = MockDevice::new();
    let mut sensor = device.sensor_with_timing(BusTiming {
        settle_spins: 0,
        busy_poll_limit: Some(10),
    });
    device.always_busy();

    let result = sensor.bus().read_register(registers::PROD_ID);

    assert_eq!(
        result,
        Err(AdcmError::BusyTimeout {
            polls: 10,
            register: Some(registers::PROD_ID)
        })
    );
    assert!(device.frames().is_empty(), "never exchange while busy");
}

#[test]
fn test_busy_timeout_names_register() {
    let device = MockDevice::new();
    let mut sensor = device.sensor_with_timing(BusTiming::calibrated(0).with_busy_poll_limit(4));
    let tap = registers::FIR_COEFFS_F[3];

    // page select and low byte go through, the high byte stalls
    device.busy_after_frames(2);
    let result = sensor.bus().write_register(tap, 0x1234);

    match result {
        Err(AdcmError::BusyTimeout {
            polls: 4,
            register: Some(reg),
        }) => {
            assert_eq!(reg.page_id, PAGE_10);
            assert_eq!(reg.address, tap.address);
        }
        other => panic!("expected a busy timeout at the tap register, got {other:?}"),
    }
    assert_eq!(device.frames().len(), 2);
}

#[test]
fn test_bare_exchange_timeout_has_no_register() {
    let device = MockDevice::new();
    let mut sensor = device.sensor_with_timing(BusTiming::calibrated(0).with_busy_poll_limit(3));
    device.always_busy();

    let result = sensor.bus().exchange_blocking(WordFrame::NULL);

    assert_eq!(
        result,
        Err(AdcmError::BusyTimeout {
            polls: 3,
            register: None
        })
    );
}

#[test]
fn test_busy_limit_not_hit() {
    let device = MockDevice::new();
    let mut sensor = device.sensor_with_timing(BusTiming::calibrated(0).with_busy_poll_limit(10));
    device.hold_busy(9);

    assert_eq!(sensor.bus().read_register(registers::PROD_ID), Ok(0x0BCD));
}

#[test]
fn test_transport_error_propagates() {
    let device = MockDevice::new();
    let mut sensor = device.sensor();
    device.fail_next_transfer();

    let result = sensor.bus().read_register(registers::PROD_ID);

    assert_eq!(result, Err(AdcmError::Bus(MockBusError)));
    assert!(device.frames().is_empty());
}

#[test]
fn test_rts_block_uses_reversed_byte_order() {
    let device = MockDevice::new();
    let mut sensor = device.initialized_sensor();
    let words: Vec<u16> = (0..100).map(|i| 0x0100 * i + 0x0A).collect();
    device.queue_rts_words(&words);

    sensor
        .activate_mode(
            adcmxl3021_driver::RecordingMode::Rts,
            &Default::default(),
        )
        .unwrap();
    sensor.trigger_recording().unwrap();
    device.clear_frames();

    let block = sensor.bus().read_rts_block().unwrap();

    assert_eq!(block.as_slice(), words.as_slice());
    assert_eq!(device.busy_polls(), 0, "streaming reads skip the busy check");
    assert!(device.frames().iter().all(|frame| *frame == [0, 0]));
}
