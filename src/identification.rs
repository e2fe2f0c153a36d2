/// JEDEC manufacturer and device identification, as returned by the
/// Read Identification (9Fh) command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    /// Number of `0x7F` continuation codes before the manufacturer code.
    continuations: u8,
    manufacturer: u8,
    memory_type: u8,
    capacity: u8,
}

const CONTINUATION_CODE: u8 = 0x7F;

impl Identification {
    /// Builds an identification from the raw bytes clocked out after 9Fh.
    ///
    /// Leading continuation codes are counted and skipped. Missing trailing
    /// bytes read as `0`.
    pub fn from_jedec_id(buf: &[u8]) -> Self {
        let continuations = buf
            .iter()
            .take_while(|&&b| b == CONTINUATION_CODE)
            .count();
        let rest = &buf[continuations..];
        let byte = |i: usize| rest.get(i).copied().unwrap_or(0);

        Self {
            continuations: continuations as u8,
            manufacturer: byte(0),
            memory_type: byte(1),
            capacity: byte(2),
        }
    }

    /// JEDEC manufacturer code, without continuation codes.
    pub fn manufacturer(&self) -> u8 {
        self.manufacturer
    }

    /// Bank the manufacturer code lives in (number of continuation codes).
    pub fn bank(&self) -> u8 {
        self.continuations
    }

    pub fn memory_type(&self) -> u8 {
        self.memory_type
    }

    /// Capacity code; for 25-series parts the array holds `1 << capacity` bytes.
    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    /// Packs manufacturer, memory type and capacity into the low 24 bits.
    pub fn id(&self) -> u32 {
        u32::from(self.manufacturer) << 16
            | u32::from(self.memory_type) << 8
            | u32::from(self.capacity)
    }

    /// Whether the bytes look like a chip was actually there. A floating or
    /// shorted MISO line reads back all ones or all zeros.
    pub fn is_valid(&self) -> bool {
        !matches!(self.manufacturer, 0x00 | 0xFF)
    }
}

impl From<Identification> for u32 {
    fn from(ident: Identification) -> u32 {
        ident.id()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Identification {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Identification {{ bank: {=u8}, manufacturer: {=u8:#x}, type: {=u8:#x}, capacity: {=u8:#x} }}",
            self.continuations,
            self.manufacturer,
            self.memory_type,
            self.capacity
        )
    }
}
