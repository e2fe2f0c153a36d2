#![allow(dead_code)]

// In-memory model of the chip behind an SPI bus, decoding the 25-series
// command set into a 1 MiB array.
use embedded_hal::spi::{ErrorKind, ErrorType, Operation};
use serial_flash_rs::geometry::{CAPACITY, ERASED_BYTE, PAGE_SIZE, SECTOR_SIZE};

pub const JEDEC_ID: [u8; 3] = [0x20, 0x20, 0x14];
pub const SIGNATURE: u8 = 0x13;
/// Status reads that report BUSY after each program or erase.
pub const BUSY_POLLS: usize = 2;

const STATUS_BUSY: u8 = 1 << 0;
const STATUS_WEL: u8 = 1 << 1;

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    ReadStatus,
    ReadId,
    Read { addr: u32, len: usize },
    WriteEnable,
    WriteDisable,
    PageProgram { addr: u32, len: usize },
    SectorErase { addr: u32 },
    BulkErase,
    PowerDown,
    ReleasePowerDown,
    Unknown(u8),
}

pub struct SimulatedFlash {
    pub memory: Vec<u8>,
    pub wel: bool,
    pub busy_polls: usize,
    pub powered_down: bool,
    pub commands: Vec<Command>,
    /// Commands other than Read Status that arrived while the chip was busy.
    pub busy_violations: usize,
    pub fail_after_transaction: usize,
    transactions: usize,
}

impl Default for SimulatedFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFlash {
    pub fn new() -> Self {
        Self {
            memory: vec![ERASED_BYTE; CAPACITY],
            wel: false,
            busy_polls: 0,
            powered_down: false,
            commands: Vec::new(),
            busy_violations: 0,
            fail_after_transaction: usize::MAX,
            transactions: 0,
        }
    }

    pub fn new_with_fault(fail_after_transaction: usize) -> Self {
        Self {
            fail_after_transaction,
            ..Self::new()
        }
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn page_programs(&self) -> usize {
        self.count(|c| matches!(c, Command::PageProgram { .. }))
    }

    pub fn sector_erases(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SectorErase { addr } => Some(*addr),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> usize {
        self.count(|c| matches!(c, Command::Read { .. }))
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.busy_polls > 0 {
            status |= STATUS_BUSY;
        }
        if self.wel {
            status |= STATUS_WEL;
        }
        status
    }

    fn address(out: &[u8]) -> u32 {
        let byte = |i: usize| out.get(i).copied().unwrap_or(0) as u32;
        (byte(1) << 16 | byte(2) << 8 | byte(3)) % CAPACITY as u32
    }

    /// Bytes clocked out by the chip for the `index`-th response byte of the
    /// command in `out`.
    fn response(&self, out: &[u8], index: usize) -> u8 {
        let opcode = out.first().copied();
        if self.powered_down && opcode != Some(0xAB) {
            return 0xFF;
        }
        match opcode {
            Some(0x05) => self.status(),
            Some(0x9F) => JEDEC_ID.get(index).copied().unwrap_or(0),
            Some(0x03) => {
                let addr = (Self::address(out) as usize + index) % CAPACITY;
                self.memory[addr]
            }
            Some(0xAB) => SIGNATURE,
            _ => 0xFF,
        }
    }

    pub fn process(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        if self.transactions >= self.fail_after_transaction {
            return Err(ErrorKind::Other);
        }
        self.transactions += 1;

        let mut out: Vec<u8> = Vec::new();
        let mut read = 0usize;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => out.extend_from_slice(bytes),
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.response(&out, read);
                        read += 1;
                    }
                }
                Operation::Transfer(rx, tx) => {
                    out.extend_from_slice(tx);
                    for b in rx.iter_mut() {
                        *b = self.response(&out, read);
                        read += 1;
                    }
                }
                Operation::TransferInPlace(buf) => out.extend_from_slice(buf),
                Operation::DelayNs(_) => {}
            }
        }

        let Some(&opcode) = out.first() else {
            return Ok(());
        };
        if self.powered_down && opcode != 0xAB {
            return Ok(());
        }
        if opcode == 0x05 {
            self.busy_polls = self.busy_polls.saturating_sub(1);
            self.commands.push(Command::ReadStatus);
            return Ok(());
        }
        if self.busy_polls > 0 {
            self.busy_violations += 1;
        }

        let addr = Self::address(&out);
        let command = match opcode {
            0x9F => Command::ReadId,
            0x03 => Command::Read { addr, len: read },
            0x06 => {
                self.wel = true;
                Command::WriteEnable
            }
            0x04 => {
                self.wel = false;
                Command::WriteDisable
            }
            0x02 => {
                let data = out.get(4..).unwrap_or(&[]);
                if self.wel {
                    let page = addr as usize - addr as usize % PAGE_SIZE;
                    for (i, &b) in data.iter().enumerate() {
                        let offset = (addr as usize + i) % PAGE_SIZE;
                        self.memory[page + offset] &= b;
                    }
                    self.finish_write();
                }
                Command::PageProgram {
                    addr,
                    len: data.len(),
                }
            }
            0xD8 => {
                if self.wel {
                    let start = addr as usize - addr as usize % SECTOR_SIZE;
                    self.memory[start..start + SECTOR_SIZE].fill(ERASED_BYTE);
                    self.finish_write();
                }
                Command::SectorErase { addr }
            }
            0xC7 => {
                if self.wel {
                    self.memory.fill(ERASED_BYTE);
                    self.finish_write();
                }
                Command::BulkErase
            }
            0xB9 => {
                self.powered_down = true;
                Command::PowerDown
            }
            0xAB => {
                self.powered_down = false;
                Command::ReleasePowerDown
            }
            other => Command::Unknown(other),
        };
        self.commands.push(command);
        Ok(())
    }

    fn finish_write(&mut self) {
        self.wel = false;
        self.busy_polls = BUSY_POLLS;
    }
}

impl ErrorType for SimulatedFlash {
    type Error = ErrorKind;
}

impl embedded_hal::spi::SpiDevice for SimulatedFlash {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.process(operations)
    }
}

impl embedded_hal_async::spi::SpiDevice for SimulatedFlash {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        self.process(operations)
    }
}

/// Delay that returns immediately and records how long it was asked to sleep.
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Deterministic non-trivial fill pattern.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
        .collect()
}
