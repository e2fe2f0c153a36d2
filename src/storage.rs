//! `embedded-storage` adapter for [`SerialFlash`], so the chip can back
//! generic NOR flash consumers (key-value stores, bootloaders).
use crate::comms::SerialFlash;
use crate::error::Error;
use crate::geometry::{CAPACITY, PAGE_SIZE, SECTOR_SIZE};
use embedded_hal::spi::SpiDevice;
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, ReadNorFlash,
};

impl<SPI: SpiDevice> ErrorType for SerialFlash<SPI> {
    type Error = Error<SPI>;
}

impl<SPI: SpiDevice> ReadNorFlash for SerialFlash<SPI> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error<SPI>> {
        check_read(&*self, offset, bytes.len())?;
        SerialFlash::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }
}

impl<SPI: SpiDevice> NorFlash for SerialFlash<SPI> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Error<SPI>> {
        check_erase(&*self, from, to)?;
        for addr in (from..to).step_by(SECTOR_SIZE) {
            self.erase_sector_at(addr)?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error<SPI>> {
        check_write(&*self, offset, bytes.len())?;
        let mut addr = offset;
        let mut rest = bytes;
        while !rest.is_empty() {
            // A page program wraps at the page end, so split there
            let room = PAGE_SIZE - addr as usize % PAGE_SIZE;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.program_at(addr, chunk)?;
            addr += chunk.len() as u32;
            rest = tail;
        }
        Ok(())
    }
}
