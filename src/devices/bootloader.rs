//! Top level bootloader logic.
//!
//! Decides between booting the installed application and serving an
//! update, and turns each received packet into its flash side effect.
use crate::{
    devices::{
        partition::{PartitionMap, StagingSlot},
        protocol::{Protocol, ReceiveSession, SessionState},
        slots::{Image, ImageMetadata, SlotManager},
        traits::{Flash, Serial},
        update_signal::{ReadUpdateSignal, UpdatePlan},
    },
    error::Error,
    hal::boot::Jump,
};
use core::convert::Infallible;

/// What the orchestrator must do after a packet has been processed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Cycle {
    /// Wait for the next packet.
    Continue,
    /// The transfer is over, install and run the staged image.
    Install,
}

pub struct Bootloader<F: Flash, S: Serial, J: Jump> {
    slots: SlotManager<F>,
    protocol: Protocol<S>,
    jump: J,
    session: ReceiveSession,
    staging_slot: StagingSlot,
}

impl<F: Flash, S: Serial, J: Jump> Bootloader<F, S, J> {
    /// Fails if the partition map doesn't fit the flash.
    pub fn new(flash: F, serial: S, jump: J, partitions: PartitionMap) -> Result<Self, Error> {
        Ok(Self {
            slots: SlotManager::new(flash, partitions)?,
            protocol: Protocol::new(serial),
            jump,
            session: ReceiveSession::new(),
            staging_slot: StagingSlot::One,
        })
    }

    /// Validates the installed application and jumps to it. Only returns
    /// if the application can't be trusted.
    pub fn boot(&mut self) -> Result<Infallible, Error> {
        info!("Attempting normal boot");
        let image = self.slots.validate_app()?;
        self.slots.jump_to_app(&image, &mut self.jump)
    }

    /// Prepares the staging slot for a new download.
    pub fn enter_update_mode(&mut self) -> Result<(), Error> {
        info!("Entering update mode");
        self.slots.erase_staging_slot(self.staging_slot)
    }

    /// Receives one packet and applies it to flash.
    ///
    /// Flash side effects happen after the packet was acknowledged, so a
    /// failed chunk write only shows up once the staged image is validated.
    pub fn process_packet(&mut self) -> Result<Cycle, Error> {
        match self.protocol.receive_packet(&mut self.session)? {
            SessionState::ConfigReceived => {
                if let Some(config) = self.session.config() {
                    info!("Receiving image version {:?}, {} bytes", config.version, config.size);
                    let metadata = ImageMetadata::new(
                        config.version,
                        config.size,
                        config.crc32,
                        self.staging_slot,
                    );
                    self.slots.write_metadata(&metadata)?;
                }
                Ok(Cycle::Continue)
            }
            SessionState::DataReceived => {
                if let Some(chunk) = self.session.data() {
                    self.slots.append_to_staging(self.staging_slot, chunk)?;
                }
                Ok(Cycle::Continue)
            }
            SessionState::DownloadComplete => Ok(Cycle::Install),
            SessionState::Reset | SessionState::DownloadStart => Ok(Cycle::Continue),
        }
    }

    /// Validates the staged image, promotes it and validates the result.
    pub fn install_staged_image(&mut self) -> Result<Image, Error> {
        let staged = self.slots.validate_staging(self.staging_slot)?;
        self.slots.promote_staging_to_app(&staged)?;
        self.slots.validate_app()
    }

    /// Serves packets until a complete image has been received, then
    /// installs and runs it. Only returns on a fatal error.
    pub fn serve_update(&mut self) -> Result<Infallible, Error> {
        self.enter_update_mode()?;
        loop {
            match self.process_packet() {
                Ok(Cycle::Continue) => (),
                Ok(Cycle::Install) => {
                    let image = self.install_staged_image()?;
                    return self.slots.jump_to_app(&image, &mut self.jump);
                }
                Err(error) => error.report(),
            }
        }
    }
}

/// Bootloader entry point. Never returns: control either passes to a
/// validated application or the bootloader halts.
pub fn run<F, S, J, U>(
    flash: F,
    serial: S,
    jump: J,
    signal: &U,
    partitions: PartitionMap,
) -> !
where
    F: Flash,
    S: Serial,
    J: Jump,
    U: ReadUpdateSignal,
{
    let mut bootloader = match Bootloader::new(flash, serial, jump, partitions) {
        Ok(bootloader) => bootloader,
        Err(error) => halt(error),
    };

    let outcome = match signal.read_update_plan() {
        UpdatePlan::Boot => bootloader.boot(),
        UpdatePlan::Update => bootloader.serve_update(),
    };

    match outcome {
        Ok(never) => match never {},
        Err(error) => halt(error),
    }
}

/// Reports the error and parks the core for good.
pub fn halt(error: Error) -> ! {
    error.report();
    error!("Bootloader halted");
    park(error)
}

#[cfg(target_arch = "arm")]
fn park(_error: Error) -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

/// Host builds panic instead, so the halt can be observed.
#[cfg(not(target_arch = "arm"))]
fn park(error: Error) -> ! { panic!("halted: {}", error) }
