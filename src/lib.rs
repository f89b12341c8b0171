//! This crate provides a platform agnostic Rust driver for nRF24L01-class single chip 2.4 GHz
//! transceivers by Nordic Semiconductor, built on the [`embedded-hal`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! The driver covers the chip's SPI register protocol, the operating-mode state machine
//! (power-down / standby / TX / RX) and the typed configuration setters. Timing (power-on
//! stabilization, CE pulse widths) is always supplied by the caller through a
//! [`DelayNs`](embedded_hal::delay::DelayNs) implementation; the driver never owns a timer.
//!
//! # Usage
//!
//! Add `xnrf24` to your dependencies in your project's `Cargo.toml`.
//!
//! ```toml
//! [dependencies]
//! xnrf24 = "0.1"
//! ```
//!
//! Construct the driver from an [`SpiDevice`](embedded_hal::spi::SpiDevice) (which owns the
//! chip-select line) and an [`OutputPin`](embedded_hal::digital::OutputPin) for chip-enable,
//! then bring the chip up:
//!
//! ```ignore
//! use xnrf24::{Nrf24l01, PrimaryMode, config::RadioConfig};
//!
//! let config = RadioConfig::default().channel(76).payload_width(4);
//! let mut radio = Nrf24l01::new(spi, ce, config);
//! radio.init(&mut delay)?;
//! radio.set_tx_address(b"node1")?;
//! radio.power_up(PrimaryMode::Tx, &mut delay)?;
//! radio.send(&mut delay, &data)?;
//! ```
//!
//! # Interrupt-driven reception
//!
//! The chip signals RX_DR on its IRQ pin when a payload arrives (see
//! [`set_interrupt_mask`](Nrf24l01::set_interrupt_mask)). An interrupt handler that owns the
//! driver calls [`read_payload`](Nrf24l01::read_payload), which drains one payload *before*
//! clearing the pending-data flag, and forwards the bytes to the main line over whatever
//! channel the target runtime provides. The `&mut self` receiver on every operation is what
//! guarantees a single bus owner per transaction; the driver itself takes no locks.
//!
//! # Feature-flags
//!
//! - **defmt:** derives `defmt::Format` for the public configuration and status types.
#![warn(
    missing_docs,
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![no_std]
extern crate embedded_hal as hal;
use hal::spi;

pub mod config;
mod error;
pub mod mode;
mod nrf24;
mod registers;
pub mod status;

pub use crate::error::TransferError;
pub use crate::mode::{OperatingMode, PrimaryMode};
pub use crate::nrf24::Nrf24l01;

/// SPI mode. Use this when initializing the SPI instance.
pub const SPI_MODE: spi::Mode = spi::MODE_0;
/// Max size in bytes of a single payload to be sent or received.
pub const MAX_PAYLOAD_SIZE: u8 = 32;

#[cfg(test)]
mod test {
    use crate::config::RadioConfig;
    use crate::nrf24::Nrf24l01;
    use embedded_hal_mock::eh1::{
        digital::{Mock as PinMock, Transaction as PinTransaction},
        spi::{Mock as SpiMock, Transaction as SpiTransaction},
    };

    /// Takes a repetition of `(expected_data, response_data)` vector tuples and generates the
    /// array of [`SpiTransaction`]s for one chip-select-framed exchange each.
    #[macro_export]
    macro_rules! spi_test_expects {
        ($( ($expected:expr , $response:expr $(,)? ) , ) + ) => {
            [
                $(
                    SpiTransaction::transaction_start(),
                    SpiTransaction::transfer_in_place($expected, $response),
                    SpiTransaction::transaction_end(),
                )*
            ]
        }
    }

    /// Mock objects used to drive [`Nrf24l01`] in unit tests.
    pub struct MockRadio(
        pub Nrf24l01<SpiMock<u8>, PinMock>,
        pub SpiMock<u8>,
        pub PinMock,
    );

    /// Builds a driver over mock SPI/CE with the given expectations and a default
    /// [`RadioConfig`]. Construction itself performs no bus traffic, so tests only
    /// declare the transactions of the operations under test.
    pub fn mk_radio(
        ce_expectations: &[PinTransaction],
        spi_expectations: &[SpiTransaction<u8>],
    ) -> MockRadio {
        let spi = SpiMock::new(spi_expectations);
        let ce_pin = PinMock::new(ce_expectations);
        let radio = Nrf24l01::new(spi.clone(), ce_pin.clone(), RadioConfig::default());
        MockRadio(radio, spi, ce_pin)
    }
}
