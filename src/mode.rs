//! Operating-mode state machine of the chip.
//!
//! The chip has no mode register: its state is implied by the PWR_UP and PRIM_RX bits of
//! CONFIG together with the level of the chip-enable line. [`OperatingMode`] makes that
//! derived state explicit.

use crate::config::ConfigRegister;

/// The chip's role while powered up: primary transmitter or primary receiver.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrimaryMode {
    /// PRIM_RX cleared; standby leads into transmission when chip-enable rises.
    Tx,
    /// PRIM_RX set; standby leads into continuous listening when chip-enable rises.
    Rx,
}

/// Logical state implied by (PWR_UP, PRIM_RX, chip-enable level).
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// PWR_UP cleared. Registers remain accessible, the radio is off.
    PowerDown,
    /// Powered, TX role, chip-enable low.
    StandbyTx,
    /// Powered, RX role, chip-enable low.
    StandbyRx,
    /// Powered, TX role, chip-enable high: transmitting the TX FIFO contents. The
    /// hardware falls back to standby on its own once the FIFO drains.
    ActiveTx,
    /// Powered, RX role, chip-enable high: listening until chip-enable drops.
    ActiveRx,
}

impl OperatingMode {
    /// Derives the mode from the cached CONFIG soft bits and the driven chip-enable level.
    pub(crate) fn derive(config: &ConfigRegister, ce_high: bool) -> Self {
        match (config.power_up, config.primary_rx, ce_high) {
            (false, _, _) => OperatingMode::PowerDown,
            (true, false, false) => OperatingMode::StandbyTx,
            (true, true, false) => OperatingMode::StandbyRx,
            (true, false, true) => OperatingMode::ActiveTx,
            (true, true, true) => OperatingMode::ActiveRx,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_derivation_table() {
        let mut config = ConfigRegister::default();
        assert_eq!(OperatingMode::derive(&config, false), OperatingMode::PowerDown);
        // chip-enable has no say while powered down
        assert_eq!(OperatingMode::derive(&config, true), OperatingMode::PowerDown);

        config.power_up = true;
        assert_eq!(OperatingMode::derive(&config, false), OperatingMode::StandbyTx);
        assert_eq!(OperatingMode::derive(&config, true), OperatingMode::ActiveTx);

        config.primary_rx = true;
        assert_eq!(OperatingMode::derive(&config, false), OperatingMode::StandbyRx);
        assert_eq!(OperatingMode::derive(&config, true), OperatingMode::ActiveRx);
    }
}
