use bitfield::bitfield;

bitfield! {
    /// bitfields of REC_CTRL register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RecCtrl(u16);
    impl Debug;
    /// FFT window, see `WindowSetting`
    pub u8, window, set_window: 13, 12;
    /// enable sample rate option 3
    pub sr3, set_sr3: 11;
    /// enable sample rate option 2
    pub sr2, set_sr2: 10;
    /// enable sample rate option 1
    pub sr1, set_sr1: 9;
    /// enable sample rate option 0
    pub sr0, set_sr0: 8;
    /// recording mode, see `RecordingMode`
    pub u8, mode, set_mode: 1, 0;
}

bitfield! {
    /// bitfields of FILT_CTRL register
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FiltCtrl(u16);
    impl Debug;
    /// FIR bank applied to the z axis
    pub u16, z_bank, set_z_bank: 8, 6;
    /// FIR bank applied to the y axis
    pub u16, y_bank, set_y_bank: 5, 3;
    /// FIR bank applied to the x axis
    pub u16, x_bank, set_x_bank: 2, 0;
}

bitfield! {
    /// bitfields of AVG_CNT register, one decimation exponent per sample rate option
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct AvgCnt(u16);
    impl Debug;
    /// decimation exponent for sample rate option 3
    pub u8, sr3, set_sr3: 15, 12;
    /// decimation exponent for sample rate option 2
    pub u8, sr2, set_sr2: 11, 8;
    /// decimation exponent for sample rate option 1
    pub u8, sr1, set_sr1: 7, 4;
    /// decimation exponent for sample rate option 0
    pub u8, sr0, set_sr0: 3, 0;
}

bitfield! {
    /// bitfields of FFT_AVG1 register, spectral averages per sample rate option
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FftAvg1(u16);
    impl Debug;
    /// spectral averages for sample rate option 1
    pub u8, sr1, set_sr1: 15, 8;
    /// spectral averages for sample rate option 0
    pub u8, sr0, set_sr0: 7, 0;
}

/// REC_CTRL value used for the autonull statistic capture.
pub const REC_CTRL_AUTONULL: u16 = 0x1142;

/// GLOB_CMD bit starting or stopping a recording.
pub const GLOB_CMD_RECORD: u16 = 1 << 11;

/// GLOB_CMD bit restoring the factory configuration.
pub const GLOB_CMD_FACTORY_RESTORE: u16 = 1 << 3;

/// MISC_CTRL bit arming the external trigger input.
pub const MISC_CTRL_EXT_TRIGGER: u16 = 1 << 12;

// SR1..SR3 keep their factory exponents, only SR0 is used.
const AVG_CNT_SR1: u8 = 2;
const AVG_CNT_SR2: u8 = 4;
const AVG_CNT_SR3: u8 = 7;

const FFT_AVG1_SR1: u8 = 1;

impl RecCtrl {
    /// Recording control word for sample rate option 0.
    pub fn for_mode(mode: u8, window: u8) -> Self {
        let mut rec_ctrl = RecCtrl(0);
        rec_ctrl.set_sr0(true);
        rec_ctrl.set_window(window);
        rec_ctrl.set_mode(mode);
        rec_ctrl
    }
}

impl FiltCtrl {
    /// Same FIR bank on every axis.
    pub fn all_axes(bank: u16) -> Self {
        let mut filt_ctrl = FiltCtrl(0);
        filt_ctrl.set_x_bank(bank);
        filt_ctrl.set_y_bank(bank);
        filt_ctrl.set_z_bank(bank);
        filt_ctrl
    }
}

impl AvgCnt {
    /// AVG_CNT with the given SR0 exponent.
    pub fn with_sr0(exponent: u8) -> Self {
        let mut avg_cnt = AvgCnt(0);
        avg_cnt.set_sr3(AVG_CNT_SR3);
        avg_cnt.set_sr2(AVG_CNT_SR2);
        avg_cnt.set_sr1(AVG_CNT_SR1);
        avg_cnt.set_sr0(exponent);
        avg_cnt
    }
}

impl FftAvg1 {
    /// FFT_AVG1 with the given SR0 average count.
    pub fn with_sr0(count: u8) -> Self {
        let mut fft_avg = FftAvg1(0);
        fft_avg.set_sr1(FFT_AVG1_SR1);
        fft_avg.set_sr0(count);
        fft_avg
    }
}
