//! Blocking driver. Command set of the 25-series 1 MiB parts with 64 KiB
//! sectors (M25P80 datasheet, section 6 "Instructions").
use crate::error::Error;
use crate::geometry::{address_bytes, page_address, sector_address, PAGE_SIZE};
use crate::identification::Identification;
use crate::traits::FlashDevice;
use core::fmt::Debug;
use embedded_hal::spi::{Operation, SpiDevice};

pub struct SerialFlash<SPI> {
    spi: SPI,
}

impl<SPI> Debug for SerialFlash<SPI> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SerialFlash")
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Opcode {
    /// Set the write enable latch.
    WriteEnable = 0x06,
    /// Clear the write enable latch.
    WriteDisable = 0x04,
    /// Read 8-bit manufacturer, memory type and capacity codes.
    ReadIdentification = 0x9F,
    /// Read the 8-bit status register.
    ReadStatus = 0x05,
    Read = 0x03,
    PageProgram = 0x02,
    SectorErase = 0xD8,
    BulkErase = 0xC7,
    DeepPowerDown = 0xB9,
    /// Release from deep power-down and read the electronic signature.
    ReleasePowerDown = 0xAB,
}

bitflags::bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Erase or write in progress.
        const BUSY = 1 << 0;
        /// Status of the **W**rite **E**nable **L**atch.
        const WEL = 1 << 1;
        /// The 3 block protection bits.
        const PROT = 0b0001_1100;
        /// **S**tatus **R**egister **W**rite **D**isable bit.
        const SRWD = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#010b})", self.bits())
    }
}

/// Builds the opcode plus 24-bit address header of an addressed command.
pub(crate) fn addressed(opcode: Opcode, addr: u32) -> [u8; 4] {
    let [a2, a1, a0] = address_bytes(addr);
    [opcode as u8, a2, a1, a0]
}

impl<SPI> FlashDevice for SerialFlash<SPI>
where
    SPI: SpiDevice,
{
    type Error = Error<SPI>;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        SerialFlash::read(self, addr, buf)
    }

    fn erase_sector(&mut self, sector: u8) -> Result<(), Error<SPI>> {
        self.erase_sector_at(sector_address(sector))
    }

    fn page_program(&mut self, page: u16, data: &[u8]) -> Result<(), Error<SPI>> {
        let len = data.len().min(PAGE_SIZE);
        self.program_at(page_address(page), &data[..len])
    }

    fn chip_erase(&mut self) -> Result<(), Error<SPI>> {
        SerialFlash::chip_erase(self)
    }

    fn id(&mut self) -> Result<u32, Error<SPI>> {
        Ok(self.read_jedec_id()?.id())
    }
}

impl<SPI> SerialFlash<SPI>
where
    SPI: SpiDevice,
{
    /// Takes ownership of the bus and waits until the chip is idle.
    pub fn init(spi: SPI) -> Result<Self, Error<SPI>> {
        let mut this = Self { spi };
        let status = loop {
            let status = this.read_status()?;
            if !status.contains(Status::BUSY) {
                break status;
            }
            warn!("Flash is not ready: {:?}", status);
        };
        debug!("Initial status: {:?}", status);
        Ok(this)
    }

    /// Gives the bus back.
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Read Data Bytes (03h).
    /// Reads flash contents into `buf`, starting at `addr`.
    ///
    /// Note that `addr` is not fully decoded: the chip only looks at the
    /// lowest 20 bits, which means that the contents are "mirrored" to
    /// addresses that are a multiple of the flash size. Only 24 bits of
    /// `addr` are transferred to the device in any case. The address
    /// auto-increments, so a single command can read the whole array.
    ///
    /// # Parameters
    ///
    /// * `addr`: 24-bit address to start reading at.
    /// * `buf`: Destination buffer to fill.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        if buf.is_empty() {
            return Ok(());
        }
        self.wait_done()?;
        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::Read, addr)),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    /// Sector Erase (D8h).
    /// Sets all memory within the 64 KiB sector containing `addr` to the
    /// erased state of all 1s (FFh). A Write Enable instruction must be
    /// executed before the device will accept it (WEL must equal 1).
    pub fn erase_sector_at(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        trace!("sector erase @{:#x}", addr);
        self.wait_done()?;
        self.set_write_enable()?;
        self.command(&addressed(Opcode::SectorErase, addr))
    }

    /// Page Program (02h).
    /// Programs from one byte up to a page of data at previously erased (FFh)
    /// locations. Bytes that run past the end of the page wrap around to its
    /// start, so callers keep `addr + data.len()` within one page.
    /// A Write Enable instruction must be executed first (WEL = 1).
    pub fn program_at(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI>> {
        if data.is_empty() {
            return Ok(());
        }
        trace!("page program @{:#x} len {}", addr, data.len());
        self.wait_done()?;
        self.set_write_enable()?;
        let status = self.read_status()?;
        if !status.contains(Status::WEL) {
            warn!("WEL should be set: {:?}", status);
        }

        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::PageProgram, addr)),
                Operation::Write(data),
            ])
            .map_err(Error::Spi)
    }

    /// Bulk Erase (C7h).
    /// Sets all memory within the device to the erased state of all 1s (FFh).
    /// A Write Enable instruction must be executed first (WEL = 1).
    pub fn chip_erase(&mut self) -> Result<(), Error<SPI>> {
        trace!("bulk erase");
        self.wait_done()?;
        self.set_write_enable()?;
        self.command(&[Opcode::BulkErase as u8])
    }

    /// Deep Power-down (B9h). Every instruction except Release from Deep
    /// Power-down is ignored until [`Self::release_power_down`] is called.
    pub fn power_down(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done()?;
        self.command(&[Opcode::DeepPowerDown as u8])
    }

    /// Release from Deep Power-down and Read Electronic Signature (ABh).
    /// Returns the 8-bit electronic signature. Status is not polled first,
    /// since a powered-down chip does not answer Read Status.
    pub fn release_power_down(&mut self) -> Result<u8, Error<SPI>> {
        let mut signature = [0u8; 1];
        self.command_with_response(
            &[Opcode::ReleasePowerDown as u8, 0, 0, 0],
            &mut signature,
        )?;
        Ok(signature[0])
    }

    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.read_status()?.contains(Status::BUSY))
    }

    pub fn is_wel(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.read_status()?.contains(Status::WEL))
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, Error<SPI>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)?;
        Ok(Status::from_bits_truncate(response[0]))
    }

    /// Reads the JEDEC manufacturer/device identification.
    pub fn read_jedec_id(&mut self) -> Result<Identification, Error<SPI>> {
        // Room for a few continuation codes ahead of the 3 ID bytes
        let mut buf = [0u8; 8];
        self.wait_done()?;
        self.command_with_response(&[Opcode::ReadIdentification as u8], &mut buf)?;
        Ok(Identification::from_jedec_id(&buf))
    }

    /// Write Enable (06h).
    /// Sets the Write Enable Latch (WEL) bit. The WEL bit must be set prior
    /// to every Page Program, Sector Erase, Bulk Erase and Write Status
    /// Register instruction, and the chip clears it when each of them completes.
    pub fn write_enable(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done()?;
        self.set_write_enable()
    }

    /// Write Disable (04h). Clears the Write Enable Latch.
    pub fn write_disable(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done()?;
        self.command(&[Opcode::WriteDisable as u8])
    }

    /// Issues 06h without polling; callers have already waited for BUSY to clear
    fn set_write_enable(&mut self) -> Result<(), Error<SPI>> {
        self.command(&[Opcode::WriteEnable as u8])
    }

    /// Writes a command to the SPI bus
    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .map_err(Error::Spi)
    }

    /// Writes a command to the SPI bus and reads the response into `response`
    fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .map_err(Error::Spi)
    }

    /// Block until the status of the device is not busy
    fn wait_done(&mut self) -> Result<(), Error<SPI>> {
        while self.is_busy()? {}
        Ok(())
    }
}
