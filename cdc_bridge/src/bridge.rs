//! Wiring of the two domains around the request and response queues.

use cdc_fifo::channel;

use crate::capture::{RequestCapture, SubmitStatus};
use crate::config::BridgeConfig;
use crate::deliver::{Completion, CompletionHandler, ResponseDeliver};
use crate::drive::{DriveState, ResponseDrive};
use crate::packet::Direction;
use crate::peripheral::{BusSignals, Peripheral};

/// Everything that runs on the fast clock.
pub struct FastDomain {
    capture: RequestCapture,
    deliver: ResponseDeliver,
}

impl FastDomain {
    pub fn submit_write(&mut self, address: u32, data: u32) -> SubmitStatus {
        self.capture.submit(Direction::Write, address, data)
    }

    pub fn submit_read(&mut self, address: u32) -> SubmitStatus {
        self.capture.submit(Direction::Read, address, 0)
    }

    pub fn submit(&mut self, direction: Direction, address: u32, write_data: u32) -> SubmitStatus {
        self.capture.submit(direction, address, write_data)
    }

    /// One fast tick. Completions are reported to `handler` and returned.
    pub fn tick_with<H: CompletionHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Option<Completion> {
        self.capture.tick();
        self.deliver.tick(&mut self.capture, handler)
    }

    /// One fast tick, returning the completion if one was delivered.
    pub fn tick(&mut self) -> Option<Completion> {
        self.tick_with(&mut |_: Completion| {})
    }

    /// True while a transaction is outstanding; submissions stall until it completes.
    pub fn is_busy(&self) -> bool {
        self.capture.is_busy()
    }

    /// Requests the slow domain may not have taken yet. Never below the true count.
    pub fn queued_requests(&self) -> usize {
        self.capture.queued_hint()
    }

    /// True once the slow domain has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.capture.is_disconnected() || self.deliver.is_disconnected()
    }
}

/// Everything that runs on the slow clock, including the peripheral.
pub struct SlowDomain<P> {
    drive: ResponseDrive,
    peripheral: P,
}

impl<P: Peripheral> SlowDomain<P> {
    pub fn tick(&mut self) {
        self.drive.tick(&mut self.peripheral);
    }

    pub fn state(&self) -> DriveState {
        self.drive.state()
    }

    /// Signals currently driven towards the peripheral.
    pub fn bus(&self) -> BusSignals {
        self.drive.bus()
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    pub fn into_peripheral(self) -> P {
        self.peripheral
    }

    /// True once the fast domain has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.drive.is_disconnected()
    }

    /// Idle with every request the fast domain has published carried out.
    pub fn is_quiescent(&self) -> bool {
        self.drive.is_quiescent()
    }
}

/// Builds both domains, connected by a request queue and a response queue.
///
/// # Panics
/// Panics if a queue depth exceeds [`cdc_fifo::MAX_DEPTH_LOG2`]; use
/// [`BridgeConfig::validate`] first for untrusted input.
pub fn bridge<P: Peripheral>(config: &BridgeConfig, peripheral: P) -> (FastDomain, SlowDomain<P>) {
    let (req_tx, req_rx) = channel(config.request_depth_log2);
    let (resp_tx, resp_rx) = channel(config.response_depth_log2);
    let width = config.bus_width();

    let fast = FastDomain {
        capture: RequestCapture::new(req_tx, width, config.write_completion),
        deliver: ResponseDeliver::new(resp_rx),
    };
    let slow = SlowDomain {
        drive: ResponseDrive::new(req_rx, resp_tx, width, config.write_completion),
        peripheral,
    };

    (fast, slow)
}
