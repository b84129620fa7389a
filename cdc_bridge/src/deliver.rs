//! Fast-domain response delivery.
//!
//! Resolves the outstanding transaction once its completion is known and
//! clears the busy state request capture checks.

use cdc_fifo::Consumer;

use crate::capture::RequestCapture;
use crate::packet::{Direction, ResponsePacket};

/// A completion notification, one per accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    WriteDone,
    ReadDone(u32),
}

/// Receives completion notifications in submission order.
pub trait CompletionHandler {
    fn on_write_done(&mut self);
    fn on_read_done(&mut self, data: u32);
}

impl<F> CompletionHandler for F
where
    F: FnMut(Completion),
{
    fn on_write_done(&mut self) {
        self(Completion::WriteDone)
    }

    fn on_read_done(&mut self, data: u32) {
        self(Completion::ReadDone(data))
    }
}

pub struct ResponseDeliver {
    rx: Consumer<ResponsePacket>,
}

impl ResponseDeliver {
    pub(crate) fn new(rx: Consumer<ResponsePacket>) -> Self {
        Self { rx }
    }

    /// One fast tick of the response side.
    ///
    /// A posted write completes here without a response packet. Anything else
    /// completes when its response has settled through the response queue.
    pub fn tick<H: CompletionHandler + ?Sized>(
        &mut self,
        capture: &mut RequestCapture,
        handler: &mut H,
    ) -> Option<Completion> {
        self.rx.tick();

        if capture.outstanding().is_some_and(|o| o.posted) {
            capture.retire();
            handler.on_write_done();
            return Some(Completion::WriteDone);
        }

        let response = self.rx.dequeue()?;
        debug_assert!(
            capture.is_busy(),
            "response {response:?} with no outstanding transaction"
        );
        let Some(outstanding) = capture.retire() else {
            tracing::warn!(?response, "dropping response with no outstanding transaction");
            return None;
        };

        let completion = match outstanding.packet.direction() {
            Direction::Read => {
                handler.on_read_done(response.read_data());
                Completion::ReadDone(response.read_data())
            }
            Direction::Write => {
                handler.on_write_done();
                Completion::WriteDone
            }
        };
        tracing::debug!(packet = ?outstanding.packet, ?completion, "transaction delivered");
        Some(completion)
    }

    pub fn is_disconnected(&self) -> bool {
        self.rx.is_disconnected()
    }
}
