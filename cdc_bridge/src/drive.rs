//! Slow-domain protocol engine.
//!
//! `Idle -> Setup -> Access -> Idle`, one transition per slow tick:
//! - `Idle`: dequeue a request if one is visible and latch it.
//! - `Setup`: drive select with address, data and direction for exactly one tick.
//! - `Access`: add enable and hold everything until the peripheral asserts
//!   `ready`. A read (or an acknowledged write) then pushes its response;
//!   if the response queue is full the engine stays in `Access` and retries
//!   each tick without consulting the peripheral again.

use cdc_fifo::{Consumer, EnqueueError, Producer};

use crate::config::WriteCompletion;
use crate::packet::{BusWidth, Direction, ResponsePacket, TransactionPacket};
use crate::peripheral::{BusSignals, Peripheral};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Idle,
    Setup(TransactionPacket),
    Access {
        packet: TransactionPacket,
        /// Access ticks spent with `ready` low so far.
        wait_ticks: u64,
        /// Response latched on `ready`, waiting for room in the response queue.
        /// The bus keeps showing select and enable meanwhile, but the
        /// peripheral is no longer ticked: its access is already over.
        pending: Option<ResponsePacket>,
    },
}

impl DriveState {
    /// Signals driven while in this state.
    pub fn bus(&self) -> BusSignals {
        match *self {
            DriveState::Idle => BusSignals::IDLE,
            DriveState::Setup(packet) => BusSignals {
                select: true,
                enable: false,
                address: packet.address(),
                write_data: packet.write_data(),
                direction: packet.direction(),
            },
            DriveState::Access { packet, .. } => BusSignals {
                select: true,
                enable: true,
                address: packet.address(),
                write_data: packet.write_data(),
                direction: packet.direction(),
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DriveState::Idle)
    }
}

pub struct ResponseDrive {
    rx: Consumer<TransactionPacket>,
    tx: Producer<ResponsePacket>,
    state: DriveState,
    width: BusWidth,
    write_completion: WriteCompletion,
}

impl ResponseDrive {
    pub(crate) fn new(
        rx: Consumer<TransactionPacket>,
        tx: Producer<ResponsePacket>,
        width: BusWidth,
        write_completion: WriteCompletion,
    ) -> Self {
        Self {
            rx,
            tx,
            state: DriveState::Idle,
            width,
            write_completion,
        }
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn bus(&self) -> BusSignals {
        self.state.bus()
    }

    /// One slow tick: clock both queue halves, present the bus to the
    /// peripheral, and take one state transition.
    pub fn tick<P: Peripheral + ?Sized>(&mut self, peripheral: &mut P) {
        self.rx.tick();
        self.tx.tick();

        let bus = self.state.bus();
        let next = match self.state {
            DriveState::Idle => {
                peripheral.tick(&bus);
                match self.rx.dequeue() {
                    Some(packet) => DriveState::Setup(packet),
                    None => DriveState::Idle,
                }
            }
            DriveState::Setup(packet) => {
                peripheral.tick(&bus);
                DriveState::Access {
                    packet,
                    wait_ticks: 0,
                    pending: None,
                }
            }
            DriveState::Access {
                packet,
                wait_ticks,
                pending: None,
            } => {
                let reply = peripheral.tick(&bus);
                if reply.ready {
                    let response = self.response_for(packet, reply.read_data);
                    self.complete(packet, wait_ticks, response)
                } else {
                    DriveState::Access {
                        packet,
                        wait_ticks: wait_ticks + 1,
                        pending: None,
                    }
                }
            }
            DriveState::Access {
                packet,
                wait_ticks,
                pending: Some(response),
            } => self.complete(packet, wait_ticks, Some(response)),
        };

        if next != self.state {
            tracing::trace!(from = ?self.state, to = ?next, "drive transition");
        }
        self.state = next;
    }

    fn response_for(&self, packet: TransactionPacket, read_data: u32) -> Option<ResponsePacket> {
        match packet.direction() {
            Direction::Read => Some(ResponsePacket::new(self.width.data(read_data))),
            Direction::Write => match self.write_completion {
                WriteCompletion::Acknowledged => Some(ResponsePacket::new(0)),
                WriteCompletion::Posted => None,
            },
        }
    }

    /// Finishes the access once its response, if any, is in the response queue.
    fn complete(
        &mut self,
        packet: TransactionPacket,
        wait_ticks: u64,
        response: Option<ResponsePacket>,
    ) -> DriveState {
        if let Some(response) = response {
            if let Err(EnqueueError::Rejected(response)) = self.tx.enqueue(response) {
                if self.tx.is_disconnected() {
                    tracing::warn!(?packet, ?response, "fast domain gone, dropping response");
                    return DriveState::Idle;
                }
                tracing::trace!(?packet, "response queue full, holding access");
                return DriveState::Access {
                    packet,
                    wait_ticks,
                    pending: Some(response),
                };
            }
        }
        tracing::debug!(?packet, ?response, wait_ticks, "transaction complete");
        DriveState::Idle
    }

    pub fn is_disconnected(&self) -> bool {
        self.rx.is_disconnected()
    }

    /// Idle with every published request taken, including any still settling.
    pub fn is_quiescent(&self) -> bool {
        self.state.is_idle() && self.rx.is_drained()
    }
}
