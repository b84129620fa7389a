//! The slow-domain peripheral collaborator and the signals it sees.

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::config::PeripheralConfig;
use crate::packet::Direction;

/// Signals driven towards the peripheral for one slow tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSignals {
    pub select: bool,
    pub enable: bool,
    pub address: u32,
    pub write_data: u32,
    pub direction: Direction,
}

impl BusSignals {
    pub const IDLE: Self = Self {
        select: false,
        enable: false,
        address: 0,
        write_data: 0,
        direction: Direction::Read,
    };

    /// True during the access phase, the only phase in which `ready` counts.
    #[inline]
    pub fn is_access(&self) -> bool {
        self.select && self.enable
    }
}

/// What the peripheral drives back for one slow tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralReply {
    /// Asserted for exactly the tick on which the access completes.
    pub ready: bool,
    /// Valid when `ready` is asserted on a read.
    pub read_data: u32,
}

impl PeripheralReply {
    pub const WAIT: Self = Self {
        ready: false,
        read_data: 0,
    };

    pub const fn ready(read_data: u32) -> Self {
        Self {
            ready: true,
            read_data,
        }
    }
}

/// A device on the slow side of the bridge.
///
/// `tick` is called once per slow tick with the signals the bridge is
/// driving. The peripheral may hold `ready` low for any number of access
/// ticks; the bridge waits without a timeout.
pub trait Peripheral {
    fn tick(&mut self, bus: &BusSignals) -> PeripheralReply;
}

impl<F> Peripheral for F
where
    F: FnMut(&BusSignals) -> PeripheralReply,
{
    fn tick(&mut self, bus: &BusSignals) -> PeripheralReply {
        self(bus)
    }
}

/// How many ticks a peripheral stalls each access before asserting `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStates {
    Fixed(u32),
    /// Uniform in `0..=max`, drawn per access.
    Random { max: u32 },
}

/// A sparse 32-bit register file with configurable wait states.
///
/// Unwritten registers read as zero.
pub struct RegisterFile {
    registers: HashMap<u32, u32>,
    wait_states: WaitStates,
    rng: SmallRng,
    /// Wait states left for the access in progress.
    remaining: Option<u32>,
    accesses: u64,
    wait_ticks: u64,
}

impl RegisterFile {
    pub fn new(wait_states: WaitStates) -> Self {
        Self::with_seed(wait_states, 0)
    }

    pub fn with_seed(wait_states: WaitStates, seed: u64) -> Self {
        Self {
            registers: HashMap::new(),
            wait_states,
            rng: SmallRng::seed_from_u64(seed),
            remaining: None,
            accesses: 0,
            wait_ticks: 0,
        }
    }

    pub fn from_config(config: &PeripheralConfig) -> Self {
        Self::with_seed(config.wait_states, config.seed)
    }

    /// Reads a register without going through the bus.
    pub fn peek(&self, address: u32) -> u32 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    /// Writes a register without going through the bus.
    pub fn poke(&mut self, address: u32, value: u32) {
        self.registers.insert(address, value);
    }

    /// Completed bus accesses.
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Access-phase ticks spent with `ready` low.
    pub fn wait_ticks(&self) -> u64 {
        self.wait_ticks
    }

    fn draw_wait_states(&mut self) -> u32 {
        match self.wait_states {
            WaitStates::Fixed(n) => n,
            WaitStates::Random { max } => self.rng.random_range(0..=max),
        }
    }
}

impl Peripheral for RegisterFile {
    fn tick(&mut self, bus: &BusSignals) -> PeripheralReply {
        if !bus.is_access() {
            self.remaining = None;
            return PeripheralReply::WAIT;
        }

        let remaining = match self.remaining {
            Some(n) => n,
            None => self.draw_wait_states(),
        };
        if remaining > 0 {
            self.remaining = Some(remaining - 1);
            self.wait_ticks += 1;
            return PeripheralReply::WAIT;
        }

        self.remaining = None;
        self.accesses += 1;
        match bus.direction {
            Direction::Write => {
                self.registers.insert(bus.address, bus.write_data);
                PeripheralReply::ready(0)
            }
            Direction::Read => PeripheralReply::ready(self.peek(bus.address)),
        }
    }
}
