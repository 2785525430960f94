//! Flash slot lifecycle: staging, validation, promotion and activation.
//!
//! The slot manager never decides *when* an image is safe to run. Every
//! activating operation takes an [`Image`], which can only be produced
//! by a successful validation, so callers are forced to validate first.
use crate::{
    devices::{
        crc::crc32_from_flash,
        partition::{PartitionMap, PartitionRegion, StagingSlot, BOOTLOADER_REGION},
        traits::Flash,
    },
    error::Error,
    hal::{
        boot::{Jump, VectorTable},
        flash::Address,
    },
    utilities::memory::chunks,
};
use core::{convert::Infallible, mem::size_of};
use nb::block;

/// Bytes moved per step when copying between partitions.
const COPY_CHUNK_SIZE: usize = 256;
const WORD: usize = size_of::<u32>();

/// Installed image description, persisted in the config partition as
/// four little endian words in field order.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct ImageMetadata {
    pub version: u32,
    pub size: u32,
    pub crc32: u32,
    /// Staging slot the image came from, one based.
    pub active_slot: u32,
}

pub const METADATA_SIZE: usize = size_of::<ImageMetadata>();

/// Proof that `size` bytes at `location` matched their CRC when last checked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Image {
    location: Address,
    size: usize,
    crc: u32,
}

impl Image {
    pub fn location(&self) -> Address { self.location }
    pub fn size(&self) -> usize { self.size }
    pub fn crc(&self) -> u32 { self.crc }
}

impl ImageMetadata {
    pub fn new(version: u32, size: u32, crc32: u32, slot: StagingSlot) -> Self {
        Self { version, size, crc32, active_slot: slot.index() as u32 + 1 }
    }

    /// Decodes the one based slot tag, if it names a slot.
    pub fn slot(&self) -> Option<StagingSlot> {
        (self.active_slot as usize).checked_sub(1).and_then(StagingSlot::from_index)
    }

    fn words(&self) -> [u32; 4] { [self.version, self.size, self.crc32, self.active_slot] }

    fn from_bytes(bytes: &[u8; METADATA_SIZE]) -> Self {
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i * WORD], bytes[i * WORD + 1], bytes[i * WORD + 2], bytes[i * WORD + 3]])
        };
        Self { version: word(0), size: word(1), crc32: word(2), active_slot: word(3) }
    }
}

pub struct SlotManager<F: Flash> {
    flash: F,
    partitions: PartitionMap,
    /// Next write offset into each staging slot.
    cursors: [usize; 2],
}

impl<F: Flash> SlotManager<F> {
    /// Validates the partition map against the flash range. This is the only
    /// way to obtain a slot manager, so no flash operation can run on an
    /// invalid map.
    pub fn new(flash: F, partitions: PartitionMap) -> Result<Self, Error> {
        partitions.validate(flash.range(), BOOTLOADER_REGION)?;
        Ok(Self { flash, partitions, cursors: [0; 2] })
    }

    pub fn partitions(&self) -> &PartitionMap { &self.partitions }

    pub fn flash(&self) -> &F { &self.flash }

    pub fn cursor(&self, slot: StagingSlot) -> usize { self.cursors[slot.index()] }

    /// Checks that the first `expected_size` bytes of `region` match `expected_crc`.
    pub fn validate_region(
        &mut self,
        region: PartitionRegion,
        expected_size: usize,
        expected_crc: u32,
    ) -> Result<Image, Error> {
        if expected_size == 0 || expected_size > region.size {
            warn!("{} can't hold an image of {} bytes", region.name, expected_size);
            return Err(Error::ImageSizeInvalid);
        }
        let crc = crc32_from_flash(&mut self.flash, region.location, expected_size)?;
        if crc != expected_crc {
            warn!("{} CRC mismatch: expected {:?}, found {:?}", region.name, expected_crc, crc);
            return Err(Error::CrcInvalid);
        }
        Ok(Image { location: region.location, size: expected_size, crc })
    }

    /// Validates the application partition against the stored metadata.
    pub fn validate_app(&mut self) -> Result<Image, Error> {
        let metadata = self.read_metadata();
        let app = self.partitions.app;
        self.validate_region(app, metadata.size as usize, metadata.crc32)
    }

    /// Validates a staging slot against the stored metadata.
    pub fn validate_staging(&mut self, slot: StagingSlot) -> Result<Image, Error> {
        let metadata = self.read_metadata();
        let region = *self.partitions.staging(slot);
        self.validate_region(region, metadata.size as usize, metadata.crc32)
    }

    /// Erases the whole staging slot and rewinds its write cursor.
    pub fn erase_staging_slot(&mut self, slot: StagingSlot) -> Result<(), Error> {
        let region = *self.partitions.staging(slot);
        info!("Erasing {}", region.name);
        self.erase(&region)?;
        self.cursors[slot.index()] = 0;
        Ok(())
    }

    /// Programs `bytes` at the slot's write cursor. The cursor only moves
    /// when every byte has been programmed.
    pub fn append_to_staging(&mut self, slot: StagingSlot, bytes: &[u8]) -> Result<(), Error> {
        let region = *self.partitions.staging(slot);
        let cursor = self.cursors[slot.index()];
        match cursor.checked_add(bytes.len()) {
            Some(end) if end <= region.size => (),
            _ => return Err(Error::StagingOverflow),
        }
        self.program(region.location + cursor, bytes)?;
        self.cursors[slot.index()] = cursor + bytes.len();
        Ok(())
    }

    /// Replaces the application partition with a validated staged image.
    ///
    /// The application partition is erased first. A failure mid copy leaves
    /// it partially written, which the next boot time validation rejects.
    pub fn promote_staging_to_app(&mut self, image: &Image) -> Result<(), Error> {
        if !self.partitions.temp_slots.iter().any(|r| r.location == image.location) {
            return Err(Error::ImageLocationInvalid);
        }
        let app = self.partitions.app;
        if image.size > app.size {
            return Err(Error::ImageSizeInvalid);
        }

        info!("Promoting {} bytes into {}", image.size, app.name);
        self.erase(&app)?;
        let mut buffer = [0u8; COPY_CHUNK_SIZE];
        for (offset, size) in chunks(image.size, COPY_CHUNK_SIZE) {
            let chunk = &mut buffer[..size];
            block!(self.flash.read(image.location + offset, chunk))?;
            self.program(app.location + offset, chunk)?;
        }
        Ok(())
    }

    /// Replaces the stored metadata. The config sector is erased and the
    /// four words are programmed one at a time, so an interrupted write
    /// leaves metadata that fails validation.
    pub fn write_metadata(&mut self, metadata: &ImageMetadata) -> Result<(), Error> {
        let config = self.partitions.config;
        self.erase(&config)?;
        for (index, word) in metadata.words().iter().enumerate() {
            block!(self.flash.program_word(config.location + index * WORD, *word))?;
        }
        Ok(())
    }

    /// Reads the stored metadata. Erased flash comes back as all ones, and
    /// a failed read as all zeros; neither describes a valid image.
    pub fn read_metadata(&mut self) -> ImageMetadata {
        let mut bytes = [0u8; METADATA_SIZE];
        match block!(self.flash.read(self.partitions.config.location, &mut bytes)) {
            Ok(()) => ImageMetadata::from_bytes(&bytes),
            Err(_) => {
                warn!("Failed to read image metadata");
                ImageMetadata::default()
            }
        }
    }

    /// Initial stack pointer and reset handler of the application.
    pub fn app_vector_table(&mut self) -> Result<VectorTable, Error> {
        let mut bytes = [0u8; 2 * WORD];
        block!(self.flash.read(self.partitions.app.location, &mut bytes))?;
        Ok(VectorTable {
            initial_stack_pointer: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            reset_handler: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Transfers control to a validated application. Only returns on error,
    /// before anything has been handed over.
    pub fn jump_to_app<J: Jump>(&mut self, image: &Image, jump: &mut J) -> Result<Infallible, Error> {
        if image.location != self.partitions.app.location {
            return Err(Error::ImageLocationInvalid);
        }
        let vectors = self.app_vector_table()?;
        info!("Jumping to application, reset handler at {:?}", vectors.reset_handler);
        // NOTE(Safety): The image token proves the application partition
        // passed validation, and promotion (the only operation that could
        // change it since) needs exclusive access to this manager.
        unsafe { jump.jump(image.location, vectors) }
    }

    fn erase(&mut self, region: &PartitionRegion) -> Result<(), Error> {
        block!(self.flash.erase_sectors(region.first_sector, region.sector_count))?;
        Ok(())
    }

    /// Programs bytes in place, using word programs for the aligned middle.
    fn program(&mut self, location: Address, bytes: &[u8]) -> Result<(), Error> {
        let lead = (WORD - location.0 as usize % WORD) % WORD;
        let (head, rest) = bytes.split_at(lead.min(bytes.len()));
        for (index, byte) in head.iter().enumerate() {
            block!(self.flash.program_byte(location + index, *byte))?;
        }

        let words_location = location + head.len();
        let mut words = rest.chunks_exact(WORD);
        for (index, word) in words.by_ref().enumerate() {
            let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            block!(self.flash.program_word(words_location + index * WORD, word))?;
        }

        let tail = words.remainder();
        let tail_location = words_location + (rest.len() - tail.len());
        for (index, byte) in tail.iter().enumerate() {
            block!(self.flash.program_byte(tail_location + index, *byte))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        devices::{crc::crc32_from_memory, partition::PARTITION_MAP},
        hal::doubles::{boot::FakeJump, flash::FakeFlash},
    };

    fn manager() -> SlotManager<FakeFlash> {
        SlotManager::new(FakeFlash::default(), PARTITION_MAP).unwrap()
    }

    fn pattern(length: usize) -> Vec<u8> { (0..length).map(|i| (i % 251) as u8).collect() }

    fn stage(manager: &mut SlotManager<FakeFlash>, image: &[u8]) -> Image {
        manager.erase_staging_slot(StagingSlot::One).unwrap();
        manager.append_to_staging(StagingSlot::One, image).unwrap();
        let region = PARTITION_MAP.temp_slots[0];
        manager.validate_region(region, image.len(), crc32_from_memory(image)).unwrap()
    }

    #[test]
    fn manager_refuses_an_app_partition_past_flash_end() {
        // Given
        let mut map = PARTITION_MAP;
        map.app.location = Address(0x081F_8000);

        // When
        let result = SlotManager::new(FakeFlash::default(), map);

        // Then
        assert!(matches!(result, Err(Error::PartitionOutOfBounds("APP"))));
    }

    #[test]
    fn validation_rejects_empty_and_oversized_images() {
        let mut manager = manager();
        let app = PARTITION_MAP.app;
        assert_eq!(manager.validate_region(app, 0, 0xFFFF_FFFF), Err(Error::ImageSizeInvalid));
        assert_eq!(manager.validate_region(app, app.size + 1, 0), Err(Error::ImageSizeInvalid));
    }

    #[test]
    fn staged_chunks_validate_as_one_image() {
        // Given
        let mut manager = manager();
        let image = pattern(1024 + 333);
        manager.erase_staging_slot(StagingSlot::One).unwrap();

        // When
        for chunk in [&image[..100], &image[100..433], &image[433..]] {
            manager.append_to_staging(StagingSlot::One, chunk).unwrap();
        }

        // Then
        let region = PARTITION_MAP.temp_slots[0];
        assert_eq!(manager.cursor(StagingSlot::One), image.len());
        assert_eq!(manager.flash().contents(region.location, image.len()), &image[..]);
        let validated = manager.validate_region(region, image.len(), crc32_from_memory(&image));
        assert_eq!(validated.map(|i| i.size()), Ok(image.len()));
    }

    #[test]
    fn any_single_byte_change_fails_validation() {
        // Given
        let mut manager = manager();
        let image = pattern(512);
        stage(&mut manager, &image);
        let mut tampered = image.clone();
        tampered[200] ^= 0x01;

        // When
        let region = PARTITION_MAP.temp_slots[0];
        let result = manager.validate_region(region, image.len(), crc32_from_memory(&tampered));

        // Then
        assert_eq!(result, Err(Error::CrcInvalid));
    }

    #[test]
    fn overflowing_append_writes_nothing() {
        // Given
        let mut manager = manager();
        let capacity = PARTITION_MAP.temp_slots[0].size;
        manager.erase_staging_slot(StagingSlot::One).unwrap();
        manager.append_to_staging(StagingSlot::One, &vec![0xAA; capacity - 10]).unwrap();
        let programs = manager.flash().program_count();

        // When
        let result = manager.append_to_staging(StagingSlot::One, &[0x55; 11]);

        // Then
        assert_eq!(result, Err(Error::StagingOverflow));
        assert_eq!(manager.flash().program_count(), programs);
        assert_eq!(manager.cursor(StagingSlot::One), capacity - 10);

        // A chunk that fits exactly is still accepted.
        assert!(manager.append_to_staging(StagingSlot::One, &[0x55; 10]).is_ok());
    }

    #[test]
    fn failed_program_leaves_cursor_in_place() {
        // Given
        let mut flash = FakeFlash::default();
        flash.fail_programs_after(1);
        let mut manager = SlotManager::new(flash, PARTITION_MAP).unwrap();

        // When
        let result = manager.append_to_staging(StagingSlot::One, &[1, 2, 3, 4, 5, 6, 7, 8]);

        // Then
        assert!(matches!(result, Err(Error::ProgramError(_))));
        assert_eq!(manager.cursor(StagingSlot::One), 0);
    }

    #[test]
    fn erasing_rewinds_the_cursor_and_clears_the_slot() {
        let mut manager = manager();
        let region = PARTITION_MAP.temp_slots[1];
        manager.append_to_staging(StagingSlot::Two, &[0u8; 64]).unwrap();

        manager.erase_staging_slot(StagingSlot::Two).unwrap();

        assert_eq!(manager.cursor(StagingSlot::Two), 0);
        assert_eq!(manager.flash().contents(region.location, 64), &[0xFF; 64][..]);
    }

    #[test]
    fn promotion_copies_exactly_the_image_and_leaves_the_rest_erased() {
        // Given
        let mut manager = manager();
        let image = pattern(1023);
        let staged = stage(&mut manager, &image);
        let app = PARTITION_MAP.app;
        manager.flash.load(app.location + 2000, &[0u8; 16]);

        // When
        manager.promote_staging_to_app(&staged).unwrap();

        // Then
        assert_eq!(manager.flash().contents(app.location, image.len()), &image[..]);
        assert_eq!(manager.flash().contents(app.location + image.len(), 2000), &[0xFF; 2000][..]);
        assert!(manager.validate_region(app, image.len(), staged.crc()).is_ok());
    }

    #[test]
    fn failed_staging_erase_is_reported() {
        let mut flash = FakeFlash::default();
        flash.fail_erases();
        let mut manager = SlotManager::new(flash, PARTITION_MAP).unwrap();

        let result = manager.erase_staging_slot(StagingSlot::One);

        assert!(matches!(result, Err(Error::ProgramError(_))));
        assert!(manager.flash().erased_sectors().is_empty());
    }

    #[test]
    fn failed_app_erase_leaves_the_installed_application_untouched() {
        // Given
        let mut manager = manager();
        let installed = pattern(512);
        manager.flash.load(PARTITION_MAP.app.location, &installed);
        let staged = stage(&mut manager, &pattern(1024));
        let programs_before = manager.flash().program_count();
        manager.flash.fail_erases();

        // When
        let result = manager.promote_staging_to_app(&staged);

        // Then
        assert!(matches!(result, Err(Error::ProgramError(_))));
        assert_eq!(manager.flash().program_count(), programs_before);
        assert_eq!(manager.flash().contents(PARTITION_MAP.app.location, 512), &installed[..]);
    }

    #[test]
    fn failed_copy_leaves_a_partial_application_that_fails_validation() {
        // Given
        let mut manager = manager();
        let image = pattern(1024);
        let staged = stage(&mut manager, &image);
        let metadata = ImageMetadata::new(1, image.len() as u32, staged.crc(), StagingSlot::One);
        manager.write_metadata(&metadata).unwrap();
        manager.flash.fail_programs_after(10);

        // When
        let result = manager.promote_staging_to_app(&staged);

        // Then
        assert!(matches!(result, Err(Error::ProgramError(_))));
        let app = manager.flash().contents(PARTITION_MAP.app.location, image.len());
        assert_eq!(&app[..40], &image[..40]);
        assert!(app[40..].iter().all(|b| *b == 0xFF));
        assert!(matches!(manager.validate_app(), Err(Error::CrcInvalid)));
    }

    #[test]
    fn promotion_refuses_images_outside_the_staging_slots() {
        let mut manager = manager();
        let image = pattern(64);
        manager.flash.load(PARTITION_MAP.app.location, &image);
        let app_image =
            manager.validate_region(PARTITION_MAP.app, 64, crc32_from_memory(&image)).unwrap();

        assert_eq!(manager.promote_staging_to_app(&app_image), Err(Error::ImageLocationInvalid));
    }

    #[test]
    fn metadata_is_stored_as_four_words_with_one_based_slot() {
        // Given
        let mut manager = manager();
        let metadata = ImageMetadata::new(0x0001_0203, 1024, 0xDEAD_BEEF, StagingSlot::One);

        // When
        manager.write_metadata(&metadata).unwrap();

        // Then
        let stored = manager.flash().contents(PARTITION_MAP.config.location, METADATA_SIZE);
        assert_eq!(stored, &[
            0x03, 0x02, 0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0xEF, 0xBE, 0xAD, 0xDE, 0x01, 0x00,
            0x00, 0x00
        ]);
        assert_eq!(manager.read_metadata(), metadata);
        assert_eq!(manager.read_metadata().slot(), Some(StagingSlot::One));
    }

    #[test]
    fn rewriting_metadata_keeps_only_the_latest() {
        let mut manager = manager();
        manager.write_metadata(&ImageMetadata::new(1, 0x10, 0x0F0F_0F0F, StagingSlot::One)).unwrap();
        let latest = ImageMetadata::new(2, 0x20, 0xF0F0_F0F0, StagingSlot::Two);

        manager.write_metadata(&latest).unwrap();

        assert_eq!(manager.read_metadata(), latest);
    }

    #[test]
    fn erased_metadata_fails_app_validation() {
        let mut manager = manager();

        let metadata = manager.read_metadata();

        assert_eq!(metadata.size, 0xFFFF_FFFF);
        assert_eq!(metadata.slot(), None);
        assert_eq!(manager.validate_app(), Err(Error::ImageSizeInvalid));
    }

    #[test]
    fn torn_metadata_write_fails_closed() {
        // Given
        let mut flash = FakeFlash::default();
        let image = pattern(256);
        flash.load(PARTITION_MAP.app.location, &image);
        flash.fail_programs_after(2);
        let mut manager = SlotManager::new(flash, PARTITION_MAP).unwrap();
        let metadata = ImageMetadata::new(1, 256, crc32_from_memory(&image), StagingSlot::One);

        // When
        let result = manager.write_metadata(&metadata);

        // Then
        assert!(result.is_err());
        assert!(matches!(manager.validate_app(), Err(Error::CrcInvalid)));
    }

    #[test]
    fn vector_table_is_read_from_the_app_base() {
        let mut manager = manager();
        manager.flash.load(PARTITION_MAP.app.location, &[0x00, 0x00, 0x03, 0x20, 0xC1, 0x01, 0x02, 0x08]);

        let vectors = manager.app_vector_table().unwrap();

        assert_eq!(vectors, VectorTable { initial_stack_pointer: 0x2003_0000, reset_handler: 0x0802_01C1 });
    }

    #[test]
    #[should_panic(expected = "jump: location=0x08020000 sp=0x20030000 reset=0x080201C1")]
    fn jumping_hands_the_vector_table_to_the_jump_collaborator() {
        // Given
        let mut manager = manager();
        let mut image = pattern(64);
        image[..8].copy_from_slice(&[0x00, 0x00, 0x03, 0x20, 0xC1, 0x01, 0x02, 0x08]);
        manager.flash.load(PARTITION_MAP.app.location, &image);
        let app = manager.validate_region(PARTITION_MAP.app, 64, crc32_from_memory(&image)).unwrap();

        // When
        let _ = manager.jump_to_app(&app, &mut FakeJump);
    }

    #[test]
    fn jumping_into_a_staged_image_is_refused() {
        let mut manager = manager();
        let staged = stage(&mut manager, &pattern(64));

        let result = manager.jump_to_app(&staged, &mut FakeJump);

        assert!(matches!(result, Err(Error::ImageLocationInvalid)));
    }
}
