/// Errors that can occur when talking to the chip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError<SPIError, PinError> {
    /// SPI transaction error reported by the bus implementation.
    Spi(SPIError),
    /// Chip-enable pin error reported by the GPIO implementation.
    Pin(PinError),
    /// The chip's register contents disagree with what was just written,
    /// carrying the byte that was read back. Usually means no chip is wired up.
    ConfigMismatch(u8),
    /// A transmission exhausted the configured auto-retransmit limit.
    MaximumRetries,
}
