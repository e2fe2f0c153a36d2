use crate::geometry::{range_len, CAPACITY, ERASED_BYTE, PAGE_COUNT, PAGE_SIZE};

/// Size of the scratch buffer used to scan the array in [`FlashDevice::is_empty`].
const SCAN_CHUNK: usize = PAGE_SIZE;

/// Operations on the serial flash array.
///
/// None of the operations validate their arguments. Indices and offsets past
/// the end of the array are sent to the chip as-is, and reads never copy more
/// bytes than the destination buffer holds.
pub trait FlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Sets every byte of one sector to the erased state of all 1s (FFh).
    fn erase_sector(&mut self, sector: u8) -> Result<(), Self::Error>;

    /// Programs one page with the first [`PAGE_SIZE`] bytes of `data`.
    /// Only previously erased (FFh) bytes take the new value.
    fn page_program(&mut self, page: u16, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets every byte of the array to the erased state of all 1s (FFh).
    fn chip_erase(&mut self) -> Result<(), Self::Error>;

    /// Reads the chip identification, see [`crate::Identification::id`].
    fn id(&mut self) -> Result<u32, Self::Error>;

    /// Erases sectors `first..=last`. Does nothing when `first > last`.
    fn sector_erase(&mut self, first: u8, last: u8) -> Result<(), Self::Error> {
        for sector in first..=last {
            self.erase_sector(sector)?;
        }
        Ok(())
    }

    /// Returns `true` when every byte of the array reads as erased.
    fn is_empty(&mut self) -> Result<bool, Self::Error> {
        let mut chunk = [0u8; SCAN_CHUNK];
        for addr in (0..CAPACITY).step_by(SCAN_CHUNK) {
            self.read(addr as u32, &mut chunk)?;
            if chunk.iter().any(|&b| b != ERASED_BYTE) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Programs the array page by page from `data`, which is expected to
    /// cover the whole capacity. A shorter `data` programs only the pages it
    /// covers; the last of them may be partial.
    fn program(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for (page, chunk) in data.chunks(PAGE_SIZE).take(PAGE_COUNT).enumerate() {
            self.page_program(page as u16, chunk)?;
        }
        Ok(())
    }

    /// Reads the inclusive byte range `start..=end` into `buf`.
    fn read_range(&mut self, start: u32, end: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_sized(start, range_len(start, end), buf)
    }

    /// Reads `size` bytes starting at `start` into `buf`.
    fn read_sized(&mut self, start: u32, size: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let len = size.min(buf.len());
        if len == 0 {
            return Ok(());
        }
        self.read(start, &mut buf[..len])
    }

    /// Reads the entire array into `buf`, which is expected to hold [`CAPACITY`] bytes.
    fn dump(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_sized(0, CAPACITY, buf)
    }
}

/// Async twin of [`FlashDevice`].
#[allow(async_fn_in_trait)]
pub trait AsyncFlashDevice {
    type Error;

    /// Reads flash contents into `buf`, starting at `addr`.
    async fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Sets every byte of one sector to the erased state of all 1s (FFh).
    async fn erase_sector(&mut self, sector: u8) -> Result<(), Self::Error>;

    /// Programs one page with the first [`PAGE_SIZE`] bytes of `data`.
    async fn page_program(&mut self, page: u16, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets every byte of the array to the erased state of all 1s (FFh).
    async fn chip_erase(&mut self) -> Result<(), Self::Error>;

    /// Reads the chip identification, see [`crate::Identification::id`].
    async fn id(&mut self) -> Result<u32, Self::Error>;

    /// Erases sectors `first..=last`. Does nothing when `first > last`.
    async fn sector_erase(&mut self, first: u8, last: u8) -> Result<(), Self::Error> {
        for sector in first..=last {
            self.erase_sector(sector).await?;
        }
        Ok(())
    }

    /// Returns `true` when every byte of the array reads as erased.
    async fn is_empty(&mut self) -> Result<bool, Self::Error> {
        let mut chunk = [0u8; SCAN_CHUNK];
        for addr in (0..CAPACITY).step_by(SCAN_CHUNK) {
            self.read(addr as u32, &mut chunk).await?;
            if chunk.iter().any(|&b| b != ERASED_BYTE) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Programs the array page by page from `data`, see [`FlashDevice::program`].
    async fn program(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for (page, chunk) in data.chunks(PAGE_SIZE).take(PAGE_COUNT).enumerate() {
            self.page_program(page as u16, chunk).await?;
        }
        Ok(())
    }

    /// Reads the inclusive byte range `start..=end` into `buf`.
    async fn read_range(
        &mut self,
        start: u32,
        end: u32,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.read_sized(start, range_len(start, end), buf).await
    }

    /// Reads `size` bytes starting at `start` into `buf`.
    async fn read_sized(
        &mut self,
        start: u32,
        size: usize,
        buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        let len = size.min(buf.len());
        if len == 0 {
            return Ok(());
        }
        self.read(start, &mut buf[..len]).await
    }

    /// Reads the entire array into `buf`, which is expected to hold [`CAPACITY`] bytes.
    async fn dump(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_sized(0, CAPACITY, buf).await
    }
}
