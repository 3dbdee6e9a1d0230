use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

/// Analog input channel of a DPO2000/MSO2000 series scope.
///
/// The four-channel models expose CH1..CH4; two-channel models only answer
/// for CH1/CH2 and report an execution error for the others, which shows up
/// through the error queue rather than at encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl Channel {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Channel::Ch1 => "CH1",
            Channel::Ch2 => "CH2",
            Channel::Ch3 => "CH3",
            Channel::Ch4 => "CH4",
        }
    }

    pub fn from_number(n: u8) -> Result<Self, ScopeError> {
        match n {
            1 => Ok(Channel::Ch1),
            2 => Ok(Channel::Ch2),
            3 => Ok(Channel::Ch3),
            4 => Ok(Channel::Ch4),
            other => Err(ScopeError::InvalidParameter {
                mnemonic: "channel".to_string(),
                reason: format!("channel number must be 1-4, got {other}"),
            }),
        }
    }

    /// Subsystem key used by the command encoder ("ch1".."ch4").
    pub(crate) fn subsystem(&self) -> &'static str {
        match self {
            Channel::Ch1 => "ch1",
            Channel::Ch2 => "ch2",
            Channel::Ch3 => "ch3",
            Channel::Ch4 => "ch4",
        }
    }
}

/// Source selectable for a waveform transfer (`DATA:SOURCE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveformSource {
    Channel(Channel),
    Math,
    Ref1,
    Ref2,
}

impl WaveformSource {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            WaveformSource::Channel(ch) => ch.mnemonic(),
            WaveformSource::Math => "MATH",
            WaveformSource::Ref1 => "REF1",
            WaveformSource::Ref2 => "REF2",
        }
    }
}

impl From<Channel> for WaveformSource {
    fn from(ch: Channel) -> Self {
        WaveformSource::Channel(ch)
    }
}

/// Vertical input coupling (`CHx:COUPLING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coupling {
    Ac,
    Dc,
    Ground,
}

impl Coupling {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Coupling::Ac => "AC",
            Coupling::Dc => "DC",
            Coupling::Ground => "GND",
        }
    }

    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AC" => Ok(Coupling::Ac),
            "DC" => Ok(Coupling::Dc),
            "GND" => Ok(Coupling::Ground),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown coupling token: {other}"
            ))),
        }
    }
}

/// Edge trigger source (`TRIGGER:A:EDGE:SOURCE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    Channel(Channel),
    Ext,
    Line,
    Aux,
}

impl TriggerSource {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            TriggerSource::Channel(ch) => ch.mnemonic(),
            TriggerSource::Ext => "EXT",
            TriggerSource::Line => "LINE",
            TriggerSource::Aux => "AUX",
        }
    }

    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "CH1" => Ok(TriggerSource::Channel(Channel::Ch1)),
            "CH2" => Ok(TriggerSource::Channel(Channel::Ch2)),
            "CH3" => Ok(TriggerSource::Channel(Channel::Ch3)),
            "CH4" => Ok(TriggerSource::Channel(Channel::Ch4)),
            "EXT" => Ok(TriggerSource::Ext),
            "LINE" => Ok(TriggerSource::Line),
            "AUX" => Ok(TriggerSource::Aux),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown trigger source token: {other}"
            ))),
        }
    }
}

/// Edge trigger slope (`TRIGGER:A:EDGE:SLOPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSlope {
    Rise,
    Fall,
}

impl TriggerSlope {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            TriggerSlope::Rise => "RISE",
            TriggerSlope::Fall => "FALL",
        }
    }

    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "RIS" | "RISE" => Ok(TriggerSlope::Rise),
            "FALL" => Ok(TriggerSlope::Fall),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown trigger slope token: {other}"
            ))),
        }
    }
}

/// A-trigger mode (`TRIGGER:A:MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode {
    Auto,
    Normal,
}

impl TriggerMode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            TriggerMode::Auto => "AUTO",
            TriggerMode::Normal => "NORMAL",
        }
    }

    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(TriggerMode::Auto),
            "NORM" | "NORMAL" => Ok(TriggerMode::Normal),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown trigger mode token: {other}"
            ))),
        }
    }
}

/// Acquisition mode (`ACQUIRE:MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionMode {
    Sample,
    PeakDetect,
    HiRes,
    Average,
    Envelope,
}

impl AcquisitionMode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            AcquisitionMode::Sample => "SAMPLE",
            AcquisitionMode::PeakDetect => "PEAKDETECT",
            AcquisitionMode::HiRes => "HIRES",
            AcquisitionMode::Average => "AVERAGE",
            AcquisitionMode::Envelope => "ENVELOPE",
        }
    }

    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "SAM" | "SAMPLE" => Ok(AcquisitionMode::Sample),
            "PEAK" | "PEAKDETECT" => Ok(AcquisitionMode::PeakDetect),
            "HIR" | "HIRES" => Ok(AcquisitionMode::HiRes),
            "AVE" | "AVERAGE" => Ok(AcquisitionMode::Average),
            "ENV" | "ENVELOPE" => Ok(AcquisitionMode::Envelope),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown acquisition mode token: {other}"
            ))),
        }
    }
}

/// Sample byte order reported in the waveform preamble (`BYT_OR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    MsbFirst,
    LsbFirst,
}

impl ByteOrder {
    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "MSB" => Ok(ByteOrder::MsbFirst),
            "LSB" => Ok(ByteOrder::LsbFirst),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown byte order token: {other}"
            ))),
        }
    }
}

/// Sample integer format reported in the preamble (`BN_FMT`): RI is signed
/// two's complement, RP is unsigned (right-justified positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryFormat {
    Signed,
    Unsigned,
}

impl BinaryFormat {
    pub fn from_response(token: &str) -> Result<Self, ScopeError> {
        match token.trim().to_ascii_uppercase().as_str() {
            "RI" => Ok(BinaryFormat::Signed),
            "RP" => Ok(BinaryFormat::Unsigned),
            other => Err(ScopeError::UnexpectedResponseShape(format!(
                "unknown binary format token: {other}"
            ))),
        }
    }
}

/// One entry popped from the instrument's event queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentError {
    pub code: i32,
    pub message: String,
}

/// Requested binary transfer encoding, passed explicitly into the waveform
/// transfer session so the decoder never depends on implicit session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEncoding {
    pub byte_width: u8,
    pub format: BinaryFormat,
    pub order: ByteOrder,
}

impl TransferEncoding {
    /// `DATA:ENCDG` mnemonic selecting this combination.
    pub fn encdg_mnemonic(&self) -> &'static str {
        match (self.format, self.order) {
            (BinaryFormat::Signed, ByteOrder::MsbFirst) => "RIBINARY",
            (BinaryFormat::Signed, ByteOrder::LsbFirst) => "SRIBINARY",
            (BinaryFormat::Unsigned, ByteOrder::MsbFirst) => "RPBINARY",
            (BinaryFormat::Unsigned, ByteOrder::LsbFirst) => "SRPBINARY",
        }
    }
}

impl Default for TransferEncoding {
    /// Big-endian signed 16-bit, the encoding the DPO2000 calls RIBinary.
    fn default() -> Self {
        Self {
            byte_width: 2,
            format: BinaryFormat::Signed,
            order: ByteOrder::MsbFirst,
        }
    }
}
