// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

// Register names follow the data sheet.
#![allow(missing_docs)]

use super::FIR_TAPS;

/// One 16 bit register, addressed by page and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAddress {
    /// Page the register lives on
    pub page_id: u8,
    /// Byte offset of the low byte within the page
    pub address: u8,
    /// Register may be read
    pub read_flag: bool,
    /// Register may be written
    pub write_flag: bool,
}

impl RegisterAddress {
    const fn read_only(page_id: u8, address: u8) -> Self {
        RegisterAddress {
            page_id,
            address,
            read_flag: true,
            write_flag: false,
        }
    }

    const fn write_only(page_id: u8, address: u8) -> Self {
        RegisterAddress {
            page_id,
            address,
            read_flag: false,
            write_flag: true,
        }
    }

    const fn read_write(page_id: u8, address: u8) -> Self {
        RegisterAddress {
            page_id,
            address,
            read_flag: true,
            write_flag: true,
        }
    }
}

const PAGE_0: u8 = 0x00;
// FIR banks A to F sit on pages 5 to 10, one bank per page.
const FIR_BANK_A_PAGE: u8 = 0x05;
const FIR_BANK_F_PAGE: u8 = FIR_BANK_A_PAGE + 5;

pub const PAGE_ID: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x00);
pub const TEMP_OUT: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x02);
pub const SUPPLY_OUT: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x04);
pub const FFT_AVG1: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x06);
pub const FFT_AVG2: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x08);
pub const BUF_PNTR: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x0A);
pub const REC_PNTR: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x0C);
pub const X_BUF: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x0E);
pub const Y_BUF: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x10);
pub const Z_BUF: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x12);
pub const X_ANULL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x14);
pub const Y_ANULL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x16);
pub const Z_ANULL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x18);
pub const REC_CTRL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x1A);
pub const REC_PRD: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x1E);
pub const FILT_CTRL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x38);
pub const AVG_CNT: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x3A);
pub const DIAG_STAT: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x3C);
pub const GLOB_CMD: RegisterAddress = RegisterAddress::write_only(PAGE_0, 0x3E);
pub const X_STATISTIC: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x40);
pub const Y_STATISTIC: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x42);
pub const Z_STATISTIC: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x44);
pub const MISC_CTRL: RegisterAddress = RegisterAddress::read_write(PAGE_0, 0x64);
pub const REC_INFO1: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x66);
pub const REC_INFO2: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x68);
pub const REC_CNTR: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x6A);
pub const FIRM_REV: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x6E);
pub const SERIAL_NUM: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x74);
pub const PROD_ID: RegisterAddress = RegisterAddress::read_only(PAGE_0, 0x7E);

const FIR_BANK_BASE: u8 = 0x08;

/// Coefficient slots of FIR filter bank F, tap 0 first.
///
/// Page 10, 0x08 to 0x46, following the one-bank-per-page layout of the register map.
/// This location has not been confirmed on hardware; check it against the data sheet of
/// your silicon revision before loading custom taps, a wrong page overwrites other registers.
pub const FIR_COEFFS_F: [RegisterAddress; FIR_TAPS] = fir_bank(FIR_BANK_F_PAGE, FIR_BANK_BASE);

const fn fir_bank(page_id: u8, base: u8) -> [RegisterAddress; FIR_TAPS] {
    let mut bank = [RegisterAddress::read_write(page_id, base); FIR_TAPS];
    let mut tap = 0;
    while tap < FIR_TAPS {
        bank[tap] = RegisterAddress::read_write(page_id, base + 2 * tap as u8);
        tap += 1;
    }
    bank
}
