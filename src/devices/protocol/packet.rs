//! Simple Bootloader Protocol framing.
//!
//! ```text
//! | SOF | TYPE | LEN | PAYLOAD | CRC32 |
//! |  1  |  1   |  2  |   LEN   |   4   |
//! ```
//!
//! `LEN` and the CRC are little endian, and the CRC covers the payload
//! only. START and STOP carry no payload, but are followed by a fixed
//! block of eight bytes.
use crate::{devices::crc::crc32_from_memory, error::Error};

pub const SOF: u8 = 0x5A;
pub const HEADER_SIZE: usize = 4;
pub const CRC_SIZE: usize = 4;
pub const CONFIG_PAYLOAD_SIZE: usize = 12;
pub const MAX_DATA_SIZE: usize = 1024;
/// Bytes following the header of a START or STOP packet.
pub const NO_DATA_FRAME_SIZE: usize = 8;
/// LEN declared by hosts for START and STOP. The receiver ignores it.
pub const NO_DATA_LENGTH: u16 = 4;
pub const RESPONSE_SIZE: usize = 12;
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_DATA_SIZE + CRC_SIZE;

const RESPONSE_LENGTH: u8 = 4;
const RESPONSE_CODE_OFFSET: usize = 3;
const RESPONSE_CRC_OFFSET: usize = 7;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum PacketType {
    Start,
    Stop,
    Config,
    Data,
    /// Only ever sent by the bootloader.
    Response,
    Unknown(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
#[repr(u8)]
pub enum Response {
    Ack = 0x15,
    Nack = 0x16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Header {
    pub packet_type: PacketType,
    pub length: u16,
}

/// Description of the image about to be streamed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct ImageConfig {
    pub version: u32,
    pub size: u32,
    pub crc32: u32,
}

impl From<u8> for PacketType {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => PacketType::Start,
            0x23 => PacketType::Stop,
            0x67 => PacketType::Config,
            0x89 => PacketType::Data,
            0x45 => PacketType::Response,
            other => PacketType::Unknown(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Start => 0x01,
            PacketType::Stop => 0x23,
            PacketType::Config => 0x67,
            PacketType::Data => 0x89,
            PacketType::Response => 0x45,
            PacketType::Unknown(other) => other,
        }
    }
}

impl Header {
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self, Error> {
        if bytes[0] != SOF {
            return Err(Error::FrameInvalid);
        }
        Ok(Header { packet_type: bytes[1].into(), length: u16::from_le_bytes([bytes[2], bytes[3]]) })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [low, high] = self.length.to_le_bytes();
        [SOF, self.packet_type.into(), low, high]
    }
}

impl ImageConfig {
    pub fn from_bytes(bytes: &[u8; CONFIG_PAYLOAD_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        ImageConfig { version: word(0), size: word(4), crc32: word(8) }
    }

    pub fn to_bytes(&self) -> [u8; CONFIG_PAYLOAD_SIZE] {
        let mut bytes = [0u8; CONFIG_PAYLOAD_SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.size.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.crc32.to_le_bytes());
        bytes
    }
}

/// Checks a received payload against its trailing CRC bytes.
pub fn payload_crc_matches(payload: &[u8], crc: &[u8; CRC_SIZE]) -> bool {
    crc32_from_memory(payload) == u32::from_le_bytes(*crc)
}

/// Builds a RESP frame. The code sits right after the type byte, in the
/// slot a regular packet uses for the high byte of LEN, and its CRC
/// follows three padding bytes later.
pub fn encode_response(response: Response) -> [u8; RESPONSE_SIZE] {
    let code = response as u8;
    let mut frame = [0u8; RESPONSE_SIZE];
    frame[0] = SOF;
    frame[1] = PacketType::Response.into();
    frame[2] = RESPONSE_LENGTH;
    frame[RESPONSE_CODE_OFFSET] = code;
    frame[RESPONSE_CRC_OFFSET..RESPONSE_CRC_OFFSET + CRC_SIZE]
        .copy_from_slice(&crc32_from_memory(&[code]).to_le_bytes());
    frame
}

pub fn parse_response(frame: &[u8; RESPONSE_SIZE]) -> Result<Response, Error> {
    if frame[0] != SOF || PacketType::from(frame[1]) != PacketType::Response {
        return Err(Error::ResponseInvalid);
    }
    let code = frame[RESPONSE_CODE_OFFSET];
    let crc = [
        frame[RESPONSE_CRC_OFFSET],
        frame[RESPONSE_CRC_OFFSET + 1],
        frame[RESPONSE_CRC_OFFSET + 2],
        frame[RESPONSE_CRC_OFFSET + 3],
    ];
    if !payload_crc_matches(&[code], &crc) {
        return Err(Error::PacketCrcInvalid);
    }
    match code {
        0x15 => Ok(Response::Ack),
        0x16 => Ok(Response::Nack),
        _ => Err(Error::ResponseInvalid),
    }
}

/// Builds a START or STOP packet.
pub fn encode_no_data(packet_type: PacketType) -> [u8; HEADER_SIZE + NO_DATA_FRAME_SIZE] {
    let mut frame = [0u8; HEADER_SIZE + NO_DATA_FRAME_SIZE];
    frame[..HEADER_SIZE]
        .copy_from_slice(&Header { packet_type, length: NO_DATA_LENGTH }.to_bytes());
    frame
}

pub fn encode_config(config: &ImageConfig) -> [u8; HEADER_SIZE + CONFIG_PAYLOAD_SIZE + CRC_SIZE] {
    let payload = config.to_bytes();
    let header = Header { packet_type: PacketType::Config, length: CONFIG_PAYLOAD_SIZE as u16 };
    let mut frame = [0u8; HEADER_SIZE + CONFIG_PAYLOAD_SIZE + CRC_SIZE];
    frame[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    frame[HEADER_SIZE..HEADER_SIZE + CONFIG_PAYLOAD_SIZE].copy_from_slice(&payload);
    frame[HEADER_SIZE + CONFIG_PAYLOAD_SIZE..]
        .copy_from_slice(&crc32_from_memory(&payload).to_le_bytes());
    frame
}

/// Builds a DATA packet into `frame`, returning the packet length.
pub fn encode_data(chunk: &[u8], frame: &mut [u8; MAX_PACKET_SIZE]) -> Result<usize, Error> {
    if chunk.len() > MAX_DATA_SIZE {
        return Err(Error::PacketLengthInvalid(chunk.len().min(u16::MAX as usize) as u16));
    }
    let header = Header { packet_type: PacketType::Data, length: chunk.len() as u16 };
    let crc_offset = HEADER_SIZE + chunk.len();
    frame[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    frame[HEADER_SIZE..crc_offset].copy_from_slice(chunk);
    frame[crc_offset..crc_offset + CRC_SIZE].copy_from_slice(&crc32_from_memory(chunk).to_le_bytes());
    Ok(crc_offset + CRC_SIZE)
}
