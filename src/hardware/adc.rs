///! Internal ADC3 management interface
///!
///! # Design
///!
///! ADC3 runs from the asynchronous kernel clock and converts a regular sequence of up to 16
///! channels on every rising edge of the sampling timer's TRGO. Each (oversampled) result is
///! requested to DMA in circular mode, the converter itself never waits on software once started.
///!
///! The bring up order is dictated by the peripheral: leave deep power down, enable the voltage
///! regulator and wait for it to settle, calibrate while disabled, enable and wait for ADRDY, then
///! restore the calibration factor (CALFACT is only writable while ADEN is set) and program the
///! channels. The sequencing itself lives in [acquisition::AcquisitionController], this module only
///! provides the register level steps.
use arbitrary_int::{u10, u2, u3, u4, u5};
use bitbybit::{bitenum, bitfield};

use acquisition::{
    CalibrationFactor, ConfigError, Converter, SampleTime, TriggerEdge,
};

use super::hal;

/// The highest channel number of the converter. 18 and 19 are the internal temperature sensor
/// and reference.
pub const MAX_CHANNEL: u8 = 19;

/// Conversions in the regular sequence.
pub const SEQUENCE_LENGTH: usize = 16;

/// ADC_CR
#[bitfield(u32, default = 0x2000_0000)]
#[derive(Debug, PartialEq)]
pub struct Control {
    #[bit(0, rw)]
    pub aden: bool,
    #[bit(1, rw)]
    pub addis: bool,
    #[bit(2, rw)]
    pub adstart: bool,
    #[bits(8..=9, rw)]
    pub boost: u2,
    #[bit(16, rw)]
    pub adcallin: bool,
    #[bit(28, rw)]
    pub advregen: bool,
    #[bit(29, rw)]
    pub deeppwd: bool,
    #[bit(30, rw)]
    pub adcaldif: bool,
    #[bit(31, rw)]
    pub adcal: bool,
}

impl Control {
    /// Bits that start an action when written as 1 and must be written as 0 otherwise:
    /// ADCAL, JADSTP, ADSTP, JADSTART, ADSTART, ADDIS and ADEN.
    const ACTIONS: u32 = 0x8000_003f;

    /// The register value to write back, without repeating pending actions.
    fn settings(raw: u32) -> Self {
        Self::new_with_raw_value(raw & !Self::ACTIONS)
    }
}

/// How conversion results are handed over.
#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum DataManagement {
    Register = 0b00,
    DmaOneShot = 0b01,
    Dfsdm = 0b10,
    DmaCircular = 0b11,
}

/// ADC_CFGR
#[bitfield(u32, default = 0x8000_0000)]
#[derive(Debug, PartialEq)]
pub struct Configuration {
    #[bits(0..=1, rw)]
    pub dmngt: DataManagement,
    #[bits(2..=4, rw)]
    pub res: u3,
    #[bits(5..=9, rw)]
    pub extsel: u5,
    #[bits(10..=11, rw)]
    pub exten: TriggerEdge,
    /// Overwrite the data register on overrun instead of stopping.
    #[bit(12, rw)]
    pub ovrmod: bool,
    #[bit(13, rw)]
    pub cont: bool,
    #[bit(31, rw)]
    pub jqdis: bool,
}

/// ADC_CFGR2
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Oversampler {
    /// Regular oversampling enable
    #[bit(0, rw)]
    pub rovse: bool,
    #[bits(5..=8, rw)]
    pub ovss: u4,
    /// Ratio minus one
    #[bits(16..=25, rw)]
    pub ovsr: u10,
}

/// ADC3_COMMON CCR
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct CommonControl {
    #[bits(16..=17, rw)]
    pub ckmode: u2,
    #[bits(18..=21, rw)]
    pub presc: u4,
    #[bit(22, rw)]
    pub vrefen: bool,
    #[bit(23, rw)]
    pub tsen: bool,
}

/// ADC_ISR.ADRDY, write 1 to clear.
const ADRDY: u32 = 1 << 0;

/// RES encoding for `bits` of resolution.
pub fn resolution_code(bits: u8) -> Result<u3, ConfigError> {
    let code = match bits {
        16 => 0b000,
        14 => 0b101,
        12 => 0b110,
        10 => 0b011,
        8 => 0b111,
        _ => return Err(ConfigError::UnsupportedResolution(bits)),
    };
    Ok(u3::new(code))
}

/// EXTSEL encoding of external trigger `line`.
pub fn trigger_select(line: u8) -> Result<u5, ConfigError> {
    u5::try_new(line).map_err(|_| ConfigError::InvalidTriggerLine(line))
}

/// The sample time register (0: SMPR1, 1: SMPR2) and bit offset of `channel`.
pub fn sample_time_slot(channel: u8) -> Result<(usize, u32), ConfigError> {
    if channel > MAX_CHANNEL {
        return Err(ConfigError::InvalidChannel(channel));
    }
    Ok(((channel / 10) as usize, 3 * (channel % 10) as u32))
}

/// SQR1 to SQR4 values for a regular sequence.
///
/// SQR1 starts with the sequence length minus one, followed by the channel numbers in 6 bit
/// fields, five per register.
pub fn sequence_registers(channels: &[u8]) -> Result<[u32; 4], ConfigError> {
    if channels.is_empty() {
        return Err(ConfigError::EmptySequence);
    }
    if channels.len() > SEQUENCE_LENGTH {
        return Err(ConfigError::SequenceTooLong(channels.len()));
    }

    let mut sqr = [0u32; 4];
    sqr[0] = channels.len() as u32 - 1;
    for (rank, &channel) in channels.iter().enumerate() {
        if channel > MAX_CHANNEL {
            return Err(ConfigError::InvalidChannel(channel));
        }
        let slot = rank + 1;
        sqr[slot / 5] |= (channel as u32) << (6 * (slot % 5));
    }
    Ok(sqr)
}

/// ADC3 with its common registers.
pub struct InternalAdc {
    adc: hal::stm32::ADC3,
    common: hal::stm32::ADC3_COMMON,
}

impl InternalAdc {
    /// Take ownership of the converter. The kernel clock must be enabled.
    ///
    /// # Args
    /// * `adc` - The converter.
    /// * `common` - The common registers, clock mode and internal channels.
    pub fn new(adc: hal::stm32::ADC3, common: hal::stm32::ADC3_COMMON) -> Self {
        // Asynchronous kernel clock (64 MHz per_ck) divided by 2. The clock mode can only be
        // changed while the converter is disabled.
        let ccr = CommonControl::DEFAULT
            .with_ckmode(u2::new(0b00))
            .with_presc(u4::new(0b0001));
        common.ccr.write(|w| unsafe { w.bits(ccr.raw_value()) });

        Self { adc, common }
    }

    /// The address of the data register, the DMA source.
    pub fn data_register_address(&self) -> u32 {
        &self.adc.dr as *const _ as u32
    }

    fn modify_control(&mut self, f: impl FnOnce(Control) -> Control) {
        self.adc.cr.modify(|r, w| {
            let cr = f(Control::settings(r.bits()));
            unsafe { w.bits(cr.raw_value()) }
        });
    }

    fn modify_configuration(
        &mut self,
        f: impl FnOnce(Configuration) -> Configuration,
    ) {
        self.adc.cfgr.modify(|r, w| {
            let cfgr = f(Configuration::new_with_raw_value(r.bits()));
            unsafe { w.bits(cfgr.raw_value()) }
        });
    }
}

impl Converter for InternalAdc {
    fn power_up(&mut self) {
        // BOOST for an ADC clock of up to 50 MHz.
        self.modify_control(|cr| {
            cr.with_deeppwd(false)
                .with_advregen(true)
                .with_boost(u2::new(0b11))
        });
    }

    fn start_calibration(&mut self) {
        self.modify_control(|cr| {
            cr.with_adcaldif(false).with_adcallin(true).with_adcal(true)
        });
    }

    fn is_calibrating(&mut self) -> bool {
        Control::new_with_raw_value(self.adc.cr.read().bits()).adcal()
    }

    fn calibration_factor(&mut self) -> CalibrationFactor {
        CalibrationFactor(self.adc.calfact.read().bits())
    }

    fn load_calibration_factor(&mut self, factor: CalibrationFactor) {
        self.adc.calfact.write(|w| unsafe { w.bits(factor.0) });
    }

    fn clear_ready(&mut self) {
        self.adc.isr.write(|w| unsafe { w.bits(ADRDY) });
    }

    fn enable(&mut self) {
        self.modify_control(|cr| cr.with_aden(true));
    }

    fn is_ready(&mut self) -> bool {
        self.adc.isr.read().bits() & ADRDY != 0
    }

    fn enable_internal_channels(&mut self, temperature: bool, reference: bool) {
        self.common.ccr.modify(|r, w| {
            let ccr = CommonControl::new_with_raw_value(r.bits())
                .with_tsen(temperature)
                .with_vrefen(reference);
            unsafe { w.bits(ccr.raw_value()) }
        });
    }

    fn set_sample_time(
        &mut self,
        channel: u8,
        time: SampleTime,
    ) -> Result<(), ConfigError> {
        let (bank, offset) = sample_time_slot(channel)?;
        let update = |smpr: u32| {
            smpr & !(0b111 << offset) | ((time.0 as u32 & 0b111) << offset)
        };
        match bank {
            0 => self
                .adc
                .smpr1
                .modify(|r, w| unsafe { w.bits(update(r.bits())) }),
            _ => self
                .adc
                .smpr2
                .modify(|r, w| unsafe { w.bits(update(r.bits())) }),
        }

        // Connect the channel to the converter input.
        self.adc
            .pcsel
            .modify(|r, w| unsafe { w.bits(r.bits() | 1 << channel) });
        Ok(())
    }

    fn set_resolution(&mut self, bits: u8) -> Result<(), ConfigError> {
        let res = resolution_code(bits)?;
        self.modify_configuration(|cfgr| cfgr.with_res(res));
        Ok(())
    }

    fn set_oversampling(
        &mut self,
        ratio: u16,
        shift: u8,
    ) -> Result<(), ConfigError> {
        if !(1..=1024).contains(&ratio) || shift > 11 {
            return Err(ConfigError::InvalidOversampling { ratio, shift });
        }
        let cfgr2 = Oversampler::DEFAULT
            .with_rovse(ratio > 1)
            .with_ovss(u4::new(shift))
            .with_ovsr(u10::new(ratio - 1));
        self.adc.cfgr2.write(|w| unsafe { w.bits(cfgr2.raw_value()) });
        Ok(())
    }

    fn set_external_trigger(
        &mut self,
        line: u8,
        edge: TriggerEdge,
    ) -> Result<(), ConfigError> {
        let extsel = trigger_select(line)?;
        self.modify_configuration(|cfgr| {
            cfgr.with_dmngt(DataManagement::DmaCircular)
                .with_extsel(extsel)
                .with_exten(edge)
                .with_ovrmod(true)
                .with_cont(false)
        });
        Ok(())
    }

    fn set_sequence(&mut self, channels: &[u8]) -> Result<(), ConfigError> {
        let [sqr1, sqr2, sqr3, sqr4] = sequence_registers(channels)?;
        self.adc.sqr1.write(|w| unsafe { w.bits(sqr1) });
        self.adc.sqr2.write(|w| unsafe { w.bits(sqr2) });
        self.adc.sqr3.write(|w| unsafe { w.bits(sqr3) });
        self.adc.sqr4.write(|w| unsafe { w.bits(sqr4) });
        Ok(())
    }

    fn start(&mut self) {
        self.modify_control(|cr| cr.with_adstart(true));
    }
}
