//! Values that cross the bridge.

use cdc_fifo::Serial;

/// Transfer direction of a bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// A captured request, travelling fast -> slow.
///
/// Built once by request capture, consumed once by the slow-side driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TransactionPacket {
    direction: Direction,
    address: u32,
    write_data: u32,
}

unsafe impl Serial for TransactionPacket {}

impl TransactionPacket {
    pub const fn new(direction: Direction, address: u32, write_data: u32) -> Self {
        Self {
            direction,
            address,
            write_data,
        }
    }

    pub const fn write(address: u32, data: u32) -> Self {
        Self::new(Direction::Write, address, data)
    }

    pub const fn read(address: u32) -> Self {
        Self::new(Direction::Read, address, 0)
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub const fn address(&self) -> u32 {
        self.address
    }

    pub const fn write_data(&self) -> u32 {
        self.write_data
    }

    pub const fn is_read(&self) -> bool {
        matches!(self.direction, Direction::Read)
    }
}

/// A completed result, travelling slow -> fast.
///
/// Carries read data. Under acknowledged write completion a write also
/// produces one, with zero data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ResponsePacket {
    read_data: u32,
}

unsafe impl Serial for ResponsePacket {}

impl ResponsePacket {
    pub const fn new(read_data: u32) -> Self {
        Self { read_data }
    }

    pub const fn read_data(&self) -> u32 {
        self.read_data
    }
}

/// Address and data bus widths, in bits (1..=32).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusWidth {
    address_mask: u32,
    data_mask: u32,
}

impl BusWidth {
    pub const FULL: Self = Self {
        address_mask: u32::MAX,
        data_mask: u32::MAX,
    };

    /// Callers validate the range; out-of-range widths saturate.
    pub fn new(address_bits: u32, data_bits: u32) -> Self {
        Self {
            address_mask: mask(address_bits),
            data_mask: mask(data_bits),
        }
    }

    #[inline]
    pub fn address(&self, address: u32) -> u32 {
        address & self.address_mask
    }

    #[inline]
    pub fn data(&self, data: u32) -> u32 {
        data & self.data_mask
    }
}

fn mask(bits: u32) -> u32 {
    match bits {
        0 => 0,
        b if b >= 32 => u32::MAX,
        b => (1u32 << b) - 1,
    }
}
