//! Driver implementation: register access layer, mode control and configuration setters.

use crate::config::{
    AddressWidth, AutoRetransmission, ConfigRegister, CrcLength, DataPipe, DataRate,
    InterruptMask, PALevel, RadioConfig, RF_DR_MASK, RF_PWR_MASK,
};
use crate::error::TransferError;
use crate::hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};
use crate::mode::{OperatingMode, PrimaryMode};
use crate::registers::{Command, Register};
use crate::status::{FifoStatus, Status};
use crate::MAX_PAYLOAD_SIZE;
use core::fmt;

/// The driver handle for one attached transceiver. This struct encapsulates all functionality.
///
/// The handle owns the SPI device (which owns the chip-select line) and the chip-enable pin,
/// and caches the CONFIG register's soft bits, the address width and the payload width so
/// that address and payload transactions are sized without asking the chip first.
///
/// Construction performs no bus traffic; call [`init()`](Nrf24l01::init) once at startup to
/// program the chip from the stored [`RadioConfig`]. A freshly initialized chip sits in
/// power-down; move it with [`power_up()`](Nrf24l01::power_up).
///
/// Every operation takes `&mut self`, so exactly one context can touch the bus at a time.
/// When an interrupt handler owns the driver, the main line gets payloads through whatever
/// channel or flag the target runtime provides, not through this struct.
///
/// # Examples
/// ```ignore
/// use xnrf24::{Nrf24l01, PrimaryMode, config::RadioConfig};
///
/// let mut radio = Nrf24l01::new(spi, ce, RadioConfig::default());
/// radio.init(&mut delay)?;
/// radio.set_rx_address(DataPipe::DP1, b"node1")?;
/// radio.power_up(PrimaryMode::Rx, &mut delay)?;
/// radio.enable()?; // start listening
/// ```
pub struct Nrf24l01<SPI, CE> {
    spi: SPI,
    // Chip Enable pin, drives RX listening / TX bursts
    ce: CE,
    // Startup configuration applied by init()
    startup: RadioConfig,
    // Cached CONFIG soft bits, written back on every mode/config change
    config_reg: ConfigRegister,
    addr_width: AddressWidth,
    payload_width: u8,
    // Last level driven onto CE; OutputPin has no read-back
    ce_high: bool,
    // Scratch buffer: opcode byte plus up to one payload
    buf: [u8; MAX_PAYLOAD_SIZE as usize + 1],
}

impl<SPI, CE, SPIErr, PinErr> Nrf24l01<SPI, CE>
where
    SPI: SpiDevice<u8, Error = SPIErr>,
    CE: OutputPin<Error = PinErr>,
{
    // Write-1-to-clear bits of the STATUS register
    const STATUS_RX_DR: u8 = 1 << 6;
    const STATUS_TX_DS: u8 = 1 << 5;
    const STATUS_MAX_RT: u8 = 1 << 4;
    const STATUS_RESET: u8 = Self::STATUS_RX_DR | Self::STATUS_TX_DS | Self::STATUS_MAX_RT;

    /// Creates a driver handle without touching the bus.
    ///
    /// The given configuration is stored and applied by [`init()`](Nrf24l01::init).
    pub fn new(spi: SPI, ce: CE, config: RadioConfig) -> Self {
        Nrf24l01 {
            spi,
            ce,
            startup: config,
            config_reg: ConfigRegister {
                mask: config.irq_mask,
                crc: config.crc,
                power_up: false,
                primary_rx: false,
            },
            addr_width: config.addr_width,
            payload_width: config.payload_width,
            ce_high: false,
            buf: [0; MAX_PAYLOAD_SIZE as usize + 1],
        }
    }

    /// Programs the chip from the stored [`RadioConfig`] and verifies it answered.
    ///
    /// The chip needs settling time after power-on before configuration bits stick;
    /// `delay` supplies the worst-case 5 ms wait. After `init` the chip is configured
    /// but still in power-down.
    ///
    /// Returns [`TransferError::ConfigMismatch`] when the CONFIG read-back disagrees with
    /// what was written, which in practice means no chip is present on the bus.
    pub fn init<D>(&mut self, delay: &mut D) -> Result<(), TransferError<SPIErr, PinErr>>
    where
        D: DelayNs,
    {
        self.disable()?;
        delay.delay_ms(5);

        self.set_retries(self.startup.auto_retry)?;
        // Rate and PA level share RF_SETUP; one write covers both.
        self.write_register(
            Register::RF_SETUP,
            self.startup.data_rate.rate_bits() | self.startup.pa_level.level_bits(),
        )?;
        self.set_payload_width(self.startup.payload_width)?;
        self.set_address_width(self.startup.addr_width)?;
        self.set_auto_ack(self.startup.auto_ack)?;
        self.reset_status()?;
        self.set_channel(self.startup.channel)?;
        self.flush_rx()?;
        self.flush_tx()?;

        self.config_reg = ConfigRegister {
            mask: self.startup.irq_mask,
            crc: self.startup.crc,
            power_up: false,
            primary_rx: false,
        };
        self.write_config()?;

        let seen = self.read_register(Register::CONFIG)?;
        if seen != self.config_reg.into_bits() {
            return Err(TransferError::ConfigMismatch(seen));
        }
        Ok(())
    }

    /// Checks whether a chip answers on the bus by reading back the address width
    /// register, whose legal encodings are 1 to 3.
    pub fn is_connected(&mut self) -> Result<bool, TransferError<SPIErr, PinErr>> {
        let setup = self.read_register(Register::SETUP_AW)?;
        Ok((1..=3).contains(&setup))
    }

    // ------------------------------------------------------------------
    // Mode control
    // ------------------------------------------------------------------

    /// Powers the chip up into standby in the given role.
    ///
    /// Sets PWR_UP, assigns PRIM_RX from `mode` and writes CONFIG. When the chip leaves
    /// power-down, `delay` supplies the power-on stabilization wait (5 ms worst case)
    /// before the chip-enable line may rise; switching roles while already powered
    /// costs only the register write.
    ///
    /// This is the only operation that assigns PRIM_RX; [`power_down()`](Nrf24l01::power_down)
    /// preserves it, so a sleep/wake cycle returns to the previous role.
    pub fn power_up<D>(
        &mut self,
        mode: PrimaryMode,
        delay: &mut D,
    ) -> Result<(), TransferError<SPIErr, PinErr>>
    where
        D: DelayNs,
    {
        let was_down = !self.config_reg.power_up;
        self.config_reg.power_up = true;
        self.config_reg.primary_rx = mode == PrimaryMode::Rx;
        self.write_config()?;
        if was_down {
            delay.delay_us(5000);
        }
        Ok(())
    }

    /// Powers the chip down to its sleep state (about 900 nA).
    ///
    /// Drops the chip-enable line, clears PWR_UP and writes CONFIG. PRIM_RX is left
    /// untouched.
    pub fn power_down(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.disable()?;
        self.config_reg.power_up = false;
        self.write_config()
    }

    /// Raises the chip-enable line.
    ///
    /// From TX standby this starts transmission of whatever sits in the TX FIFO (the
    /// hardware returns to standby on its own once the FIFO drains); from RX standby it
    /// starts continuous listening until [`disable()`](Nrf24l01::disable).
    pub fn enable(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.ce.set_high().map_err(TransferError::Pin)?;
        self.ce_high = true;
        Ok(())
    }

    /// Lowers the chip-enable line, returning an active chip to standby.
    pub fn disable(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.ce.set_low().map_err(TransferError::Pin)?;
        self.ce_high = false;
        Ok(())
    }

    /// The operating mode implied by the cached PWR_UP/PRIM_RX bits and the driven
    /// chip-enable level.
    pub fn mode(&self) -> OperatingMode {
        OperatingMode::derive(&self.config_reg, self.ce_high)
    }

    /// Enters continuous listening: RX role, interrupt flags cleared, chip-enable high.
    ///
    /// The chip must already be powered (see [`power_up()`](Nrf24l01::power_up)).
    ///
    /// # Examples
    /// ```ignore
    /// radio.set_rx_address(DataPipe::DP0, b"node1")?;
    /// radio.power_up(PrimaryMode::Rx, &mut delay)?;
    /// radio.start_listening()?;
    /// while !radio.data_available()? {}
    /// ```
    pub fn start_listening(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.config_reg.primary_rx = true;
        self.write_config()?;
        self.reset_status()?;
        self.enable()
    }

    /// Leaves listening mode: chip-enable low, back to the TX role.
    pub fn stop_listening(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.disable()?;
        self.config_reg.primary_rx = false;
        self.write_config()
    }

    // ------------------------------------------------------------------
    // Payload and status operations
    // ------------------------------------------------------------------

    /// Reads the STATUS register via a no-op command.
    pub fn status(&mut self) -> Result<Status, TransferError<SPIErr, PinErr>> {
        self.command(Command::Nop)
    }

    /// Reads the FIFO_STATUS register.
    pub fn fifo_status(&mut self) -> Result<FifoStatus, TransferError<SPIErr, PinErr>> {
        self.read_register(Register::FIFO_STATUS).map(FifoStatus::from)
    }

    /// Clears the RX_DR, TX_DS and MAX_RT interrupt flags.
    pub fn reset_status(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::STATUS, Self::STATUS_RESET)
    }

    /// Discards the RX FIFO contents. Returns the STATUS byte the chip shifted back
    /// during the opcode.
    pub fn flush_rx(&mut self) -> Result<Status, TransferError<SPIErr, PinErr>> {
        self.command(Command::FlushRx)
    }

    /// Discards the TX FIFO contents. Returns the STATUS byte the chip shifted back
    /// during the opcode.
    pub fn flush_tx(&mut self) -> Result<Status, TransferError<SPIErr, PinErr>> {
        self.command(Command::FlushTx)
    }

    /// Checks if a received payload is waiting in the RX FIFO.
    pub fn data_available(&mut self) -> Result<bool, TransferError<SPIErr, PinErr>> {
        Ok(self.data_available_on_pipe()?.is_some())
    }

    /// Returns the pipe holding the payload at the head of the RX FIFO, `None` when empty.
    pub fn data_available_on_pipe(
        &mut self,
    ) -> Result<Option<DataPipe>, TransferError<SPIErr, PinErr>> {
        Ok(self.status()?.data_pipe())
    }

    /// Queues one payload into the TX FIFO without starting a transmission.
    ///
    /// The payload is padded with zeroes (or truncated) to the configured payload width,
    /// which is what the receiving side expects with static payload sizes. Transmission
    /// starts when chip-enable rises, see [`enable()`](Nrf24l01::enable) or
    /// [`send()`](Nrf24l01::send).
    pub fn queue_payload(&mut self, buf: &[u8]) -> Result<Status, TransferError<SPIErr, PinErr>> {
        let width = self.payload_width as usize;
        let len = buf.len().min(width);
        self.buf[0] = Command::WriteTxPayload.opcode();
        self.buf[1..=len].copy_from_slice(&buf[..len]);
        self.buf[len + 1..=width].fill(0);
        self.transfer(width + 1)?;
        Ok(Status::from(self.buf[0]))
    }

    /// Reads one payload out of the RX FIFO, then clears the RX_DR flag.
    ///
    /// Reads `payload_width` bytes (capped by `buf.len()`) and returns the count. The
    /// payload is drained *before* the pending-data flag is cleared, so a second packet
    /// arriving back-to-back re-asserts the flag instead of being lost; interrupt
    /// handlers can call this as their whole body.
    ///
    /// # Examples
    /// ```ignore
    /// let mut payload = [0u8; 4];
    /// while radio.data_available()? {
    ///     let n = radio.read_payload(&mut payload)?;
    ///     handle(&payload[..n]);
    /// }
    /// ```
    pub fn read_payload(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, TransferError<SPIErr, PinErr>> {
        let len = buf.len().min(self.payload_width as usize);
        self.buf[0] = Command::ReadRxPayload.opcode();
        self.buf[1..=len].fill(0);
        self.transfer(len + 1)?;
        buf[..len].copy_from_slice(&self.buf[1..=len]);

        self.write_register(Register::STATUS, Self::STATUS_RX_DR)?;
        Ok(len)
    }

    /// Queues a payload and pulses chip-enable to transmit it from TX standby.
    ///
    /// Clears the TX_DS and MAX_RT flags afterwards. When the chip reports that the
    /// auto-retransmit limit was already hit, the TX FIFO is flushed and
    /// [`TransferError::MaximumRetries`] is returned.
    ///
    /// # Examples
    /// ```ignore
    /// radio.set_tx_address(b"node1")?;
    /// radio.power_up(PrimaryMode::Tx, &mut delay)?;
    /// radio.send(&mut delay, &reading.to_le_bytes())?;
    /// ```
    pub fn send<D>(
        &mut self,
        delay: &mut D,
        buf: &[u8],
    ) -> Result<(), TransferError<SPIErr, PinErr>>
    where
        D: DelayNs,
    {
        let status = self.queue_payload(buf)?;

        // Minimum CE pulse width to start a transmission is 10 us.
        self.enable()?;
        delay.delay_us(10);
        self.disable()?;

        self.write_register(
            Register::STATUS,
            Self::STATUS_TX_DS | Self::STATUS_MAX_RT,
        )?;

        if status.reached_max_retries() {
            self.flush_tx()?;
            return Err(TransferError::MaximumRetries);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Configuration setters
    // ------------------------------------------------------------------

    /// Sets the RF channel (frequency is 2400 MHz + channel).
    ///
    /// The value is written as-is; which channels are usable is a regulatory question
    /// the driver does not answer.
    pub fn set_channel(&mut self, channel: u8) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::RF_CH, channel)
    }

    /// Returns the RF channel the chip operates on.
    pub fn channel(&mut self) -> Result<u8, TransferError<SPIErr, PinErr>> {
        self.read_register(Register::RF_CH)
    }

    /// Sets the air data rate by rewriting only the two rate bits of RF_SETUP.
    ///
    /// The reserved both-bits-set pattern is never produced, and re-applying a rate is
    /// idempotent.
    pub fn set_data_rate(&mut self, rate: DataRate) -> Result<(), TransferError<SPIErr, PinErr>> {
        let setup = self.read_register(Register::RF_SETUP)?;
        self.write_register(Register::RF_SETUP, (setup & !RF_DR_MASK) | rate.rate_bits())
    }

    /// Returns the current air data rate.
    ///
    /// The reserved rate-bit pattern reads back as [`TransferError::ConfigMismatch`].
    pub fn data_rate(&mut self) -> Result<DataRate, TransferError<SPIErr, PinErr>> {
        let setup = self.read_register(Register::RF_SETUP)?;
        DataRate::from_bits(setup).ok_or(TransferError::ConfigMismatch(setup))
    }

    /// Sets the power amplifier level by rewriting only the RF_PWR bits of RF_SETUP.
    pub fn set_pa_level(&mut self, level: PALevel) -> Result<(), TransferError<SPIErr, PinErr>> {
        let setup = self.read_register(Register::RF_SETUP)?;
        self.write_register(Register::RF_SETUP, (setup & !RF_PWR_MASK) | level.level_bits())
    }

    /// Returns the current power amplifier level.
    pub fn pa_level(&mut self) -> Result<PALevel, TransferError<SPIErr, PinErr>> {
        self.read_register(Register::RF_SETUP).map(PALevel::from_bits)
    }

    /// Sets the address width and remembers it for subsequent address writes.
    pub fn set_address_width(
        &mut self,
        width: AddressWidth,
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::SETUP_AW, width.encoded())?;
        self.addr_width = width;
        Ok(())
    }

    /// The address width used for TX and full-width RX addresses.
    pub fn address_width(&self) -> AddressWidth {
        self.addr_width
    }

    /// Sets the static payload width (bytes per packet) on all six pipes.
    pub fn set_payload_width(&mut self, width: u8) -> Result<(), TransferError<SPIErr, PinErr>> {
        let width = width.min(MAX_PAYLOAD_SIZE);
        for reg in [
            Register::RX_PW_P0,
            Register::RX_PW_P1,
            Register::RX_PW_P2,
            Register::RX_PW_P3,
            Register::RX_PW_P4,
            Register::RX_PW_P5,
        ] {
            self.write_register(reg, width)?;
        }
        self.payload_width = width;
        Ok(())
    }

    /// The configured static payload width.
    pub fn payload_width(&self) -> u8 {
        self.payload_width
    }

    /// Sets the transmit address.
    ///
    /// Writes exactly the configured address width, least significant byte first; longer
    /// input is truncated. With hardware auto-acknowledge the caller must also open RX
    /// pipe 0 on the same address to hear the acknowledgements.
    ///
    /// # Examples
    /// ```ignore
    /// radio.set_address_width(AddressWidth::FiveBytes)?;
    /// radio.set_tx_address(b"node1")?;
    /// ```
    pub fn set_tx_address(&mut self, addr: &[u8]) -> Result<(), TransferError<SPIErr, PinErr>> {
        let len = addr.len().min(self.addr_width.bytes());
        self.write_register_buf(Register::TX_ADDR, &addr[..len])
    }

    /// Reads the transmit address back into `buf`, returning the address width.
    pub fn tx_address(&mut self, buf: &mut [u8]) -> Result<usize, TransferError<SPIErr, PinErr>> {
        let len = buf.len().min(self.addr_width.bytes());
        self.read_register_buf(Register::TX_ADDR, &mut buf[..len])?;
        Ok(len)
    }

    /// Sets the receive address of a pipe and enables the pipe.
    ///
    /// Pipes 0 and 1 take a full-width address. Pipes 2 to 5 share the upper bytes of
    /// pipe 1 and only their least significant byte is written, which is the first byte
    /// of `addr`.
    pub fn set_rx_address(
        &mut self,
        pipe: DataPipe,
        addr: &[u8],
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        let reg = match pipe {
            DataPipe::DP0 => Register::RX_ADDR_P0,
            DataPipe::DP1 => Register::RX_ADDR_P1,
            DataPipe::DP2 => Register::RX_ADDR_P2,
            DataPipe::DP3 => Register::RX_ADDR_P3,
            DataPipe::DP4 => Register::RX_ADDR_P4,
            DataPipe::DP5 => Register::RX_ADDR_P5,
        };
        match pipe {
            DataPipe::DP0 | DataPipe::DP1 => {
                let len = addr.len().min(self.addr_width.bytes());
                self.write_register_buf(reg, &addr[..len])?;
            }
            _ => self.write_register(reg, addr[0])?,
        }

        let enabled = self.read_register(Register::EN_RXADDR)?;
        self.write_register(Register::EN_RXADDR, enabled | (1 << pipe.pipe()))
    }

    /// Turns the hardware auto-acknowledge feature on or off for all pipes.
    pub fn set_auto_ack(&mut self, enabled: bool) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::EN_AA, if enabled { 0x3f } else { 0 })
    }

    /// Configures the automatic retransmission delay and count.
    pub fn set_retries(
        &mut self,
        retry: AutoRetransmission,
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::SETUP_RETR, retry.register_value())
    }

    /// Returns the automatic retransmission configuration.
    pub fn retries(&mut self) -> Result<AutoRetransmission, TransferError<SPIErr, PinErr>> {
        self.read_register(Register::SETUP_RETR)
            .map(AutoRetransmission::from_register)
    }

    /// Selects the CRC scheme (`None` disables hardware CRC) and rewrites CONFIG.
    pub fn set_crc(
        &mut self,
        crc: Option<CrcLength>,
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.config_reg.crc = crc;
        self.write_config()
    }

    /// Selects which interrupt sources are kept off the IRQ pin and rewrites CONFIG.
    ///
    /// # Examples
    /// ```ignore
    /// // IRQ pin fires only for received payloads
    /// radio.set_interrupt_mask(InterruptMask::only_data_ready())?;
    /// ```
    pub fn set_interrupt_mask(
        &mut self,
        mask: InterruptMask,
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.config_reg.mask = mask;
        self.write_config()
    }

    // ------------------------------------------------------------------
    // Register access layer
    // ------------------------------------------------------------------

    // Serializes the cached CONFIG soft bits onto the wire.
    fn write_config(&mut self) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.write_register(Register::CONFIG, self.config_reg.into_bits())
    }

    // One opcode-only exchange; the byte shifted back is STATUS.
    fn command(&mut self, command: Command) -> Result<Status, TransferError<SPIErr, PinErr>> {
        self.buf[0] = command.opcode();
        self.transfer(1)?;
        Ok(Status::from(self.buf[0]))
    }

    fn read_register(&mut self, register: Register) -> Result<u8, TransferError<SPIErr, PinErr>> {
        self.buf[0] = Command::ReadRegister.opcode() | register.addr();
        self.buf[1] = 0;
        self.transfer(2)?;
        Ok(self.buf[1])
    }

    fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.buf[0] = Command::WriteRegister.opcode() | register.addr();
        self.buf[1] = value;
        self.transfer(2)
    }

    // Multi-byte registers (addresses) travel least significant byte first.
    fn read_register_buf(
        &mut self,
        register: Register,
        out: &mut [u8],
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        let len = out.len();
        self.buf[0] = Command::ReadRegister.opcode() | register.addr();
        self.buf[1..=len].fill(0);
        self.transfer(len + 1)?;
        out.copy_from_slice(&self.buf[1..=len]);
        Ok(())
    }

    fn write_register_buf(
        &mut self,
        register: Register,
        values: &[u8],
    ) -> Result<(), TransferError<SPIErr, PinErr>> {
        let len = values.len();
        self.buf[0] = Command::WriteRegister.opcode() | register.addr();
        self.buf[1..=len].copy_from_slice(values);
        self.transfer(len + 1)
    }

    // One SPI transaction over the scratch buffer; the device implementation frames it
    // with chip-select assert/deassert.
    fn transfer(&mut self, len: usize) -> Result<(), TransferError<SPIErr, PinErr>> {
        self.spi
            .transfer_in_place(&mut self.buf[..len])
            .map_err(TransferError::Spi)
    }
}

impl<SPI, CE> fmt::Debug for Nrf24l01<SPI, CE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nrf24l01")
            .field("config_reg", &self.config_reg)
            .field("addr_width", &self.addr_width)
            .field("payload_width", &self.payload_width)
            .field("ce_high", &self.ce_high)
            .finish()
    }
}
