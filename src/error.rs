use core::fmt::{self, Debug};
use embedded_hal::spi::ErrorType;
use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// The error type used by this library.
///
/// The driver surface never validates its arguments, so the only error it
/// reports is a failed SPI transfer. The bounds variants are produced by the
/// `embedded-storage` adapter alone.
///
/// Generic over the transport's [`ErrorType`], which covers both the blocking
/// and the async `SpiDevice`.
pub enum Error<SPI: ErrorType> {
    /// An SPI transfer failed.
    Spi(SPI::Error),
    /// The offset or length runs past the end of the array.
    OutOfBounds,
    /// The offset or length is not a multiple of the erase size.
    NotAligned,
}

impl<SPI: ErrorType> From<NorFlashErrorKind> for Error<SPI> {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => Error::NotAligned,
            NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
            // The check_* helpers only report the two kinds above
            _ => Error::OutOfBounds,
        }
    }
}

impl<SPI: ErrorType> NorFlashError for Error<SPI>
where
    SPI::Error: Debug,
{
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::Spi(_) => NorFlashErrorKind::Other,
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI: ErrorType> defmt::Format for Error<SPI>
where
    SPI::Error: Debug,
{
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Spi(_spi) => defmt::write!(fmt, "Error::Spi"),
            Error::OutOfBounds => defmt::write!(fmt, "Error::OutOfBounds"),
            Error::NotAligned => defmt::write!(fmt, "Error::NotAligned"),
        }
    }
}

impl<SPI: ErrorType> Debug for Error<SPI>
where
    SPI::Error: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "Error::Spi({:?})", spi),
            Error::OutOfBounds => write!(f, "Error::OutOfBounds"),
            Error::NotAligned => write!(f, "Error::NotAligned"),
        }
    }
}

impl<SPI: ErrorType> fmt::Display for Error<SPI>
where
    SPI::Error: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "SPI transfer failed: {:?}", spi),
            Error::OutOfBounds => write!(f, "access outside the flash array"),
            Error::NotAligned => write!(f, "access not aligned to a sector"),
        }
    }
}
