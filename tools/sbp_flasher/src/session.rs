//! Host side of a single update session: one packet out, one response back.

use anyhow::{anyhow, bail, Context, Result};
use sbpboot_lib::devices::{
    crc::crc32_from_memory,
    protocol::packet::{
        encode_config, encode_data, encode_no_data, parse_response, ImageConfig, PacketType,
        Response, MAX_DATA_SIZE, MAX_PACKET_SIZE, RESPONSE_SIZE,
    },
};
use std::{
    io::{Read, Write},
    thread,
    time::Duration,
};

/// Parses an `a.b.c` version string into the word the bootloader stores,
/// one byte per component starting from the least significant.
pub fn parse_version(text: &str) -> Result<u32> {
    let mut bytes = [0u8; 4];
    let components: Vec<&str> = text.split('.').collect();
    if components.is_empty() || components.len() > bytes.len() {
        bail!("version '{}' must have between one and four components", text);
    }
    for (byte, component) in bytes.iter_mut().zip(&components) {
        *byte = component
            .trim()
            .parse()
            .with_context(|| format!("version component '{}' is not a byte", component))?;
    }
    Ok(u32::from_le_bytes(bytes))
}

/// Pauses after acknowledged packets. The bootloader acknowledges before
/// touching flash and can't receive while it erases or programs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// After START and CONF. CONF is followed by a sector erase.
    pub after_setup: Duration,
    /// After each DATA packet, while the chunk is programmed.
    pub after_data: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing { after_setup: Duration::from_millis(2000), after_data: Duration::from_millis(200) }
    }
}

pub struct Session<P: Read + Write, W: FnMut(Duration) = fn(Duration)> {
    port: P,
    pacing: Pacing,
    wait: W,
}

impl<P: Read + Write> Session<P> {
    pub fn new(port: P, pacing: Pacing) -> Self {
        Session::with_wait(port, pacing, thread::sleep as fn(Duration))
    }
}

impl<P: Read + Write, W: FnMut(Duration)> Session<P, W> {
    /// Like `new`, with `wait` called in place of sleeping.
    pub fn with_wait(port: P, pacing: Pacing, wait: W) -> Self { Self { port, pacing, wait } }

    pub fn into_port(self) -> P { self.port }

    /// Streams `image` to the bootloader. Stops at the first packet that is
    /// not acknowledged.
    pub fn flash(&mut self, image: &[u8], version: u32, max_size: usize) -> Result<()> {
        if image.is_empty() {
            bail!("refusing to send an empty image");
        }
        if image.len() > max_size {
            bail!("image is {} bytes but the staging slot only holds {}", image.len(), max_size);
        }

        let config = ImageConfig {
            version,
            size: image.len() as u32,
            crc32: crc32_from_memory(image),
        };
        println!("Image: {} bytes, crc 0x{:08X}, version 0x{:08X}", config.size, config.crc32, version);

        let Pacing { after_setup, after_data } = self.pacing;
        self.exchange(&encode_no_data(PacketType::Start), "START", after_setup)?;
        self.exchange(&encode_config(&config), "CONF", after_setup)?;

        let mut frame = [0u8; MAX_PACKET_SIZE];
        let chunk_count = (image.len() + MAX_DATA_SIZE - 1) / MAX_DATA_SIZE;
        for (index, chunk) in image.chunks(MAX_DATA_SIZE).enumerate() {
            let length = encode_data(chunk, &mut frame)
                .map_err(|e| anyhow!("failed to encode chunk {}: {}", index, e))?;
            self.exchange(&frame[..length], "DATA", after_data)
                .with_context(|| format!("chunk {}/{}", index + 1, chunk_count))?;
        }
        println!("Sent {} data packets", chunk_count);

        self.exchange(&encode_no_data(PacketType::Stop), "STOP", Duration::ZERO)?;
        println!("Transfer complete, bootloader is installing the image");
        Ok(())
    }

    fn exchange(&mut self, frame: &[u8], name: &str, pause: Duration) -> Result<()> {
        self.port.write_all(frame).with_context(|| format!("failed to send {}", name))?;
        self.port.flush()?;

        let mut response = [0u8; RESPONSE_SIZE];
        self.port
            .read_exact(&mut response)
            .with_context(|| format!("no response to {}", name))?;
        match parse_response(&response) {
            Ok(Response::Ack) => {}
            Ok(Response::Nack) => bail!("bootloader rejected {}", name),
            Err(e) => bail!("malformed response to {}: {}", name, e),
        }

        if !pause.is_zero() {
            (self.wait)(pause);
        }
        Ok(())
    }
}
