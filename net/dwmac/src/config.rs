//! Engine configuration: an immutable value built before `open` and held
//! for the engine's lifetime. The only runtime-mutable tuning knob, the
//! adaptive DMA threshold, lives in the recovery controller instead.

use log::warn;

use dwmac_hal::MacVariant;

/// Standard Ethernet payload MTU.
pub const ETH_DATA_LEN: usize = 1500;

const DEFAULT_RING_SIZE: usize = 256;
const DEFAULT_BUFFER_LEN: u16 = 1536;
const MAX_BUFFER_LEN: u16 = 16 * 1024;
const DEFAULT_POLL_BUDGET: usize = 64;
const DEFAULT_THRESHOLD: u32 = 64;
const DEFAULT_THRESHOLD_STEP: u32 = 64;
const DEFAULT_THRESHOLD_CEILING: u32 = 256;
const DEFAULT_WATCHDOG_MS: u64 = 5_000;
const DEFAULT_MAX_FRAGS: usize = 16;

#[derive(Clone, Copy, Debug)]
pub struct DwmacConfig {
    /// Number of transmit descriptors.
    pub tx_ring_size: usize,
    /// Number of receive descriptors.
    pub rx_ring_size: usize,
    /// Size of each receive buffer, in bytes.
    pub rx_buffer_len: u16,
    /// Largest number of extra fragments a single outbound frame may carry.
    pub max_frags: usize,
    /// A transmit completion interrupt is requested on every Nth frame.
    pub tx_coalesce: u32,
    /// Receive slots processed per scheduled poll pass.
    pub rx_poll_budget: usize,
    /// Initial store-and-forward trigger level.
    pub dma_threshold: u32,
    /// Threshold increment applied on each transmit underflow.
    pub threshold_step: u32,
    /// Upper bound for the adaptive threshold.
    pub threshold_ceiling: u32,
    /// Run the transmit DMA in pure store-and-forward mode; underflow
    /// recovery then skips the threshold bump.
    pub store_and_forward: bool,
    /// Transmit stall deadline for the watchdog.
    pub watchdog_ms: u64,
    /// Use the core's checksum engine where the variant has one.
    pub hw_checksum: bool,
}

impl Default for DwmacConfig {
    fn default() -> DwmacConfig {
        DwmacConfig {
            tx_ring_size: DEFAULT_RING_SIZE,
            rx_ring_size: DEFAULT_RING_SIZE,
            rx_buffer_len: DEFAULT_BUFFER_LEN,
            max_frags: DEFAULT_MAX_FRAGS,
            tx_coalesce: 1,
            rx_poll_budget: DEFAULT_POLL_BUDGET,
            dma_threshold: DEFAULT_THRESHOLD,
            threshold_step: DEFAULT_THRESHOLD_STEP,
            threshold_ceiling: DEFAULT_THRESHOLD_CEILING,
            store_and_forward: false,
            watchdog_ms: DEFAULT_WATCHDOG_MS,
            hw_checksum: false,
        }
    }
}

impl DwmacConfig {
    /// Defaults tuned per variant and MTU. The gigabit core tolerates more
    /// completion latency, so it coalesces harder; jumbo frames tie up many
    /// slots each, so coalescing is nearly off for them.
    pub fn for_variant(variant: MacVariant, mtu: usize) -> DwmacConfig {
        let tx_coalesce = match variant {
            MacVariant::Gmac if mtu > ETH_DATA_LEN => 4,
            MacVariant::Gmac => 64,
            MacVariant::Mac100 => 32,
        };
        let rx_buffer_len = if mtu <= ETH_DATA_LEN {
            DEFAULT_BUFFER_LEN
        } else if mtu <= 4000 {
            4096
        } else {
            8192
        };
        DwmacConfig {
            tx_coalesce,
            rx_buffer_len,
            hw_checksum: variant == MacVariant::Gmac,
            ..DwmacConfig::default()
        }
    }

    /// Replaces out-of-range values with the defaults instead of failing;
    /// a misconfigured engine still has to come up.
    pub fn validated(mut self) -> DwmacConfig {
        if self.tx_ring_size < 2 {
            warn!("dwmac: invalid tx ring size {}, using {}", self.tx_ring_size, DEFAULT_RING_SIZE);
            self.tx_ring_size = DEFAULT_RING_SIZE;
        }
        if self.rx_ring_size < 2 {
            warn!("dwmac: invalid rx ring size {}, using {}", self.rx_ring_size, DEFAULT_RING_SIZE);
            self.rx_ring_size = DEFAULT_RING_SIZE;
        }
        if self.rx_buffer_len == 0 || self.rx_buffer_len > MAX_BUFFER_LEN {
            self.rx_buffer_len = DEFAULT_BUFFER_LEN;
        }
        if self.tx_coalesce == 0 || self.tx_coalesce as usize >= self.tx_ring_size {
            // Coalescing beyond the ring would defer completions forever.
            self.tx_coalesce = 1;
        }
        if self.rx_poll_budget == 0 {
            self.rx_poll_budget = DEFAULT_POLL_BUDGET;
        }
        if self.max_frags + 2 > self.tx_ring_size {
            self.max_frags = self.tx_ring_size - 2;
        }
        if self.threshold_step == 0 {
            self.threshold_step = DEFAULT_THRESHOLD_STEP;
        }
        if self.threshold_ceiling < self.dma_threshold {
            self.threshold_ceiling = self.dma_threshold;
        }
        if self.watchdog_ms == 0 {
            self.watchdog_ms = DEFAULT_WATCHDOG_MS;
        }
        self
    }
}
