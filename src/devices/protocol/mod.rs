//! Receiving side of the Simple Bootloader Protocol.
//!
//! Each call to [`Protocol::receive_packet`] is one self contained cycle:
//! the session is cleared, one packet is framed and checked, and exactly
//! one response is sent back unless the header itself was unusable.
//! There is no sequencing across cycles; CONF, DATA and STOP are accepted
//! in any order and it's up to the caller to act on them.
use crate::{
    devices::traits::Serial,
    error::{Convertible, Error},
    hal::serial::Transport,
};
use packet::{
    encode_response, payload_crc_matches, Header, ImageConfig, PacketType, Response,
    CONFIG_PAYLOAD_SIZE, CRC_SIZE, HEADER_SIZE, MAX_DATA_SIZE, NO_DATA_FRAME_SIZE,
};

pub mod packet;

/// Outcome of the last receive cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum SessionState {
    Reset,
    DownloadStart,
    ConfigReceived,
    DataReceived,
    DownloadComplete,
}

/// Everything one receive cycle produced. Owned by the caller and cleared
/// at the start of every cycle, so nothing carries over between packets.
pub struct ReceiveSession {
    config: ImageConfig,
    data: [u8; MAX_DATA_SIZE],
    data_length: usize,
    config_received: bool,
    data_received: bool,
    transfer_complete: bool,
    state: SessionState,
}

impl Default for ReceiveSession {
    fn default() -> Self { Self::new() }
}

impl ReceiveSession {
    pub const fn new() -> Self {
        Self {
            config: ImageConfig { version: 0, size: 0, crc32: 0 },
            data: [0u8; MAX_DATA_SIZE],
            data_length: 0,
            config_received: false,
            data_received: false,
            transfer_complete: false,
            state: SessionState::Reset,
        }
    }

    pub fn clear(&mut self) { *self = Self::new() }

    pub fn state(&self) -> SessionState { self.state }

    /// Image description, if this cycle received a CONF packet.
    pub fn config(&self) -> Option<&ImageConfig> { self.config_received.then_some(&self.config) }

    /// Image chunk, if this cycle received a DATA packet.
    pub fn data(&self) -> Option<&[u8]> {
        self.data_received.then_some(&self.data[..self.data_length])
    }

    pub fn is_transfer_complete(&self) -> bool { self.transfer_complete }

    fn accept(&mut self, state: SessionState) {
        self.state = state;
        match state {
            SessionState::ConfigReceived => self.config_received = true,
            SessionState::DataReceived => self.data_received = true,
            SessionState::DownloadComplete => self.transfer_complete = true,
            SessionState::Reset | SessionState::DownloadStart => (),
        }
    }
}

pub struct Protocol<S: Serial> {
    serial: S,
}

impl<S: Serial> Protocol<S> {
    pub fn new(serial: S) -> Self { Self { serial } }

    pub fn serial(&self) -> &S { &self.serial }

    pub fn serial_mut(&mut self) -> &mut S { &mut self.serial }

    /// Runs one receive cycle into `session`.
    ///
    /// Session flags are only raised once the ACK has gone out. On any
    /// failure after the header, including a failed ACK, one NACK is
    /// attempted and the error returned; a bad or unreadable header is
    /// dropped without a response.
    pub fn receive_packet(&mut self, session: &mut ReceiveSession) -> Result<SessionState, Error> {
        session.clear();
        let header = self.receive_header()?;

        match self.receive_payload(header, session) {
            Ok(state) => match self.respond(Response::Ack) {
                Ok(()) => {
                    session.accept(state);
                    Ok(state)
                }
                Err(error) => {
                    warn!("Failed to acknowledge {:?} packet", header.packet_type);
                    self.try_nack();
                    Err(error)
                }
            },
            Err(error) => {
                warn!("Rejecting {:?} packet", header.packet_type);
                self.try_nack();
                Err(error)
            }
        }
    }

    /// Sends a single NACK, only logging if that fails too.
    fn try_nack(&mut self) {
        if let Err(nack_error) = self.respond(Response::Nack) {
            nack_error.report();
        }
    }

    fn receive_header(&mut self) -> Result<Header, Error> {
        let mut bytes = [0u8; HEADER_SIZE];
        self.receive(&mut bytes)?;
        Header::parse(&bytes).map_err(|error| {
            debug!("Dropping packet with invalid start of frame");
            error
        })
    }

    fn receive_payload(
        &mut self,
        header: Header,
        session: &mut ReceiveSession,
    ) -> Result<SessionState, Error> {
        match header.packet_type {
            PacketType::Start => {
                self.drain_no_data_frame()?;
                Ok(SessionState::DownloadStart)
            }
            PacketType::Stop => {
                self.drain_no_data_frame()?;
                Ok(SessionState::DownloadComplete)
            }
            PacketType::Config => {
                if header.length as usize != CONFIG_PAYLOAD_SIZE {
                    return Err(Error::PacketLengthInvalid(header.length));
                }
                let mut payload = [0u8; CONFIG_PAYLOAD_SIZE];
                self.receive(&mut payload)?;
                self.check_crc(&payload)?;
                session.config = ImageConfig::from_bytes(&payload);
                Ok(SessionState::ConfigReceived)
            }
            PacketType::Data => {
                let length = header.length as usize;
                if length > MAX_DATA_SIZE {
                    return Err(Error::PacketLengthInvalid(header.length));
                }
                self.receive(&mut session.data[..length])?;
                self.check_crc(&session.data[..length])?;
                session.data_length = length;
                Ok(SessionState::DataReceived)
            }
            PacketType::Response | PacketType::Unknown(_) => {
                Err(Error::PacketTypeUnknown(header.packet_type.into()))
            }
        }
    }

    fn drain_no_data_frame(&mut self) -> Result<(), Error> {
        let mut frame = [0u8; NO_DATA_FRAME_SIZE];
        self.receive(&mut frame)
    }

    fn check_crc(&mut self, payload: &[u8]) -> Result<(), Error> {
        let mut crc = [0u8; CRC_SIZE];
        self.receive(&mut crc)?;
        if payload_crc_matches(payload, &crc) {
            Ok(())
        } else {
            Err(Error::PacketCrcInvalid)
        }
    }

    fn respond(&mut self, response: Response) -> Result<(), Error> {
        self.serial.transmit(&encode_response(response)).map_err(Convertible::into)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.serial.receive(buffer).map_err(Convertible::into)
    }
}
