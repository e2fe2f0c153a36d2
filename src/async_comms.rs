use core::fmt::Debug;

use crate::comms::{addressed, Opcode, Status};
use crate::error::Error;
use crate::geometry::{page_address, sector_address, PAGE_SIZE};
use crate::identification::Identification;
use crate::traits::AsyncFlashDevice;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{Operation, SpiDevice};

/// Sleep between status polls while a page program or sector erase runs.
pub const BUSY_POLL_MS: u32 = 1;
/// Sleep between status polls while a bulk erase runs (several seconds in total).
pub const CHIP_ERASE_POLL_MS: u32 = 100;
/// Sleep between status polls while waiting for the chip in [`AsyncSerialFlash::init`].
pub const INIT_POLL_MS: u32 = 10;

pub struct AsyncSerialFlash<SPI, D> {
    spi: SPI,
    delay: D,
}

impl<SPI, D> Debug for AsyncSerialFlash<SPI, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncSerialFlash").finish()
    }
}

impl<SPI, D> AsyncFlashDevice for AsyncSerialFlash<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    type Error = Error<SPI>;

    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        AsyncSerialFlash::read(self, addr, buf).await
    }

    async fn erase_sector(&mut self, sector: u8) -> Result<(), Error<SPI>> {
        self.erase_sector_at(sector_address(sector)).await
    }

    async fn page_program(&mut self, page: u16, data: &[u8]) -> Result<(), Error<SPI>> {
        let len = data.len().min(PAGE_SIZE);
        self.program_at(page_address(page), &data[..len]).await
    }

    async fn chip_erase(&mut self) -> Result<(), Error<SPI>> {
        AsyncSerialFlash::chip_erase(self).await
    }

    async fn id(&mut self) -> Result<u32, Error<SPI>> {
        Ok(self.read_jedec_id().await?.id())
    }
}

impl<SPI, D> AsyncSerialFlash<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub async fn init(spi: SPI, delay: D) -> Result<Self, Error<SPI>> {
        let mut this = Self { spi, delay };
        let status = loop {
            let status = this.read_status().await?;
            if !status.contains(Status::BUSY) {
                break status;
            }
            warn!("Flash is not ready: {:?}. Waiting for {}ms...", status, INIT_POLL_MS);
            this.delay.delay_ms(INIT_POLL_MS).await;
        };
        debug!("Initial status: {:?}", status);
        Ok(this)
    }

    /// Gives the bus and the delay back.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    /// Read Data Bytes (03h), see [`crate::SerialFlash::read`].
    pub async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        if buf.is_empty() {
            return Ok(());
        }
        self.wait_done(BUSY_POLL_MS).await?;
        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::Read, addr)),
                Operation::Read(buf),
            ])
            .await
            .map_err(Error::Spi)
    }

    /// Sector Erase (D8h) of the 64 KiB sector containing `addr`.
    pub async fn erase_sector_at(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        trace!("sector erase @{:#x}", addr);
        self.wait_done(BUSY_POLL_MS).await?;
        self.set_write_enable().await?;
        self.command(&addressed(Opcode::SectorErase, addr)).await
    }

    /// Page Program (02h), see [`crate::SerialFlash::program_at`].
    pub async fn program_at(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI>> {
        if data.is_empty() {
            return Ok(());
        }
        trace!("page program @{:#x} len {}", addr, data.len());
        self.wait_done(BUSY_POLL_MS).await?;
        self.set_write_enable().await?;
        let status = self.read_status().await?;
        if !status.contains(Status::WEL) {
            warn!("WEL should be set: {:?}", status);
        }

        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::PageProgram, addr)),
                Operation::Write(data),
            ])
            .await
            .map_err(Error::Spi)
    }

    /// Bulk Erase (C7h). Waits for the erase to finish before returning,
    /// polling at the slower [`CHIP_ERASE_POLL_MS`] rate.
    pub async fn chip_erase(&mut self) -> Result<(), Error<SPI>> {
        trace!("bulk erase");
        self.wait_done(CHIP_ERASE_POLL_MS).await?;
        self.set_write_enable().await?;
        self.command(&[Opcode::BulkErase as u8]).await?;
        self.wait_done(CHIP_ERASE_POLL_MS).await
    }

    /// Deep Power-down (B9h).
    pub async fn power_down(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done(BUSY_POLL_MS).await?;
        self.command(&[Opcode::DeepPowerDown as u8]).await
    }

    /// Release from Deep Power-down (ABh), returning the electronic signature.
    pub async fn release_power_down(&mut self) -> Result<u8, Error<SPI>> {
        let mut signature = [0u8; 1];
        self.command_with_response(&[Opcode::ReleasePowerDown as u8, 0, 0, 0], &mut signature)
            .await?;
        Ok(signature[0])
    }

    pub async fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.read_status().await?.contains(Status::BUSY))
    }

    pub async fn is_wel(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.read_status().await?.contains(Status::WEL))
    }

    /// Reads the status register.
    pub async fn read_status(&mut self) -> Result<Status, Error<SPI>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)
            .await?;
        Ok(Status::from_bits_truncate(response[0]))
    }

    /// Reads the JEDEC manufacturer/device identification.
    pub async fn read_jedec_id(&mut self) -> Result<Identification, Error<SPI>> {
        let mut buf = [0u8; 8];
        self.wait_done(BUSY_POLL_MS).await?;
        self.command_with_response(&[Opcode::ReadIdentification as u8], &mut buf)
            .await?;
        Ok(Identification::from_jedec_id(&buf))
    }

    /// Write Enable (06h), see [`crate::SerialFlash::write_enable`].
    pub async fn write_enable(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done(BUSY_POLL_MS).await?;
        self.set_write_enable().await
    }

    /// Write Disable (04h).
    pub async fn write_disable(&mut self) -> Result<(), Error<SPI>> {
        self.wait_done(BUSY_POLL_MS).await?;
        self.command(&[Opcode::WriteDisable as u8]).await
    }

    /// Issues 06h without polling; callers have already waited for BUSY to clear
    async fn set_write_enable(&mut self) -> Result<(), Error<SPI>> {
        self.command(&[Opcode::WriteEnable as u8]).await
    }

    /// Writes a command to the SPI bus
    async fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .await
            .map_err(Error::Spi)
    }

    /// Writes a command to the SPI bus and reads the response into `response`
    async fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .await
            .map_err(Error::Spi)
    }

    /// Sleeps `poll_ms` between status reads until the device is not busy
    async fn wait_done(&mut self, poll_ms: u32) -> Result<(), Error<SPI>> {
        while self.is_busy().await? {
            self.delay.delay_ms(poll_ms).await;
        }
        Ok(())
    }
}
