//! Fast-domain request capture.
//!
//! Packetizes a caller's transaction and hands it to the request queue. At
//! most one transaction is outstanding; anything submitted while one is in
//! flight, or while the queue reports full, is stalled with no side effect.

use cdc_fifo::{EnqueueError, Producer};

use crate::config::WriteCompletion;
use crate::packet::{BusWidth, Direction, TransactionPacket};

/// Result of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    /// Nothing was captured; the caller owns the retry.
    Stalled,
}

impl SubmitStatus {
    pub fn is_accepted(self) -> bool {
        matches!(self, SubmitStatus::Accepted)
    }
}

/// Fast-side bookkeeping for the transaction in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outstanding {
    pub packet: TransactionPacket,
    /// Completes without a response packet.
    pub posted: bool,
}

pub struct RequestCapture {
    tx: Producer<TransactionPacket>,
    width: BusWidth,
    write_completion: WriteCompletion,
    outstanding: Option<Outstanding>,
}

impl RequestCapture {
    pub(crate) fn new(
        tx: Producer<TransactionPacket>,
        width: BusWidth,
        write_completion: WriteCompletion,
    ) -> Self {
        Self {
            tx,
            width,
            write_completion,
            outstanding: None,
        }
    }

    /// Attempts to capture a transaction. Address and data are truncated to
    /// the configured bus widths.
    pub fn submit(&mut self, direction: Direction, address: u32, write_data: u32) -> SubmitStatus {
        if let Some(busy) = &self.outstanding {
            tracing::trace!(outstanding = ?busy.packet, "submit stalled: transaction outstanding");
            return SubmitStatus::Stalled;
        }

        let write_data = match direction {
            Direction::Write => self.width.data(write_data),
            Direction::Read => 0,
        };
        let packet = TransactionPacket::new(direction, self.width.address(address), write_data);

        match self.tx.enqueue(packet) {
            Ok(()) => {
                let posted = direction == Direction::Write
                    && self.write_completion == WriteCompletion::Posted;
                self.outstanding = Some(Outstanding { packet, posted });
                tracing::trace!(?packet, "request captured");
                SubmitStatus::Accepted
            }
            Err(EnqueueError::Rejected(_)) => {
                tracing::trace!(?packet, "submit stalled: request queue full");
                SubmitStatus::Stalled
            }
        }
    }

    /// Fast-domain clock for the request queue's producer half.
    pub(crate) fn tick(&mut self) {
        self.tx.tick();
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    pub(crate) fn queued_hint(&self) -> usize {
        self.tx.len_hint()
    }

    pub(crate) fn outstanding(&self) -> Option<&Outstanding> {
        self.outstanding.as_ref()
    }

    /// Clears the outstanding transaction, returning it.
    pub(crate) fn retire(&mut self) -> Option<Outstanding> {
        self.outstanding.take()
    }

    pub fn is_disconnected(&self) -> bool {
        self.tx.is_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_fifo::channel;

    #[test]
    fn test_single_outstanding() {
        let (tx, mut rx) = channel(2);
        let mut capture = RequestCapture::new(tx, BusWidth::FULL, WriteCompletion::Posted);

        assert_eq!(capture.submit(Direction::Read, 1, 0), SubmitStatus::Accepted);
        assert!(capture.is_busy());
        assert_eq!(capture.submit(Direction::Write, 2, 3), SubmitStatus::Stalled);
        assert_eq!(capture.submit(Direction::Read, 2, 0), SubmitStatus::Stalled);

        rx.tick();
        rx.tick();
        assert_eq!(rx.dequeue(), Some(TransactionPacket::read(1)));
        assert_eq!(rx.dequeue(), None);

        let retired = capture.retire().unwrap();
        assert!(!retired.posted);
        assert_eq!(capture.submit(Direction::Write, 2, 3), SubmitStatus::Accepted);
    }

    #[test]
    fn test_full_queue_stalls_without_capture() {
        let (tx, _rx) = channel(0);
        let mut capture = RequestCapture::new(tx, BusWidth::FULL, WriteCompletion::Posted);

        assert!(capture.submit(Direction::Write, 1, 1).is_accepted());
        capture.retire();
        // The consumer has not taken the first write, so the one-slot queue is full.
        assert_eq!(capture.submit(Direction::Write, 2, 2), SubmitStatus::Stalled);
        assert!(!capture.is_busy());
    }

    #[test]
    fn test_posted_flag_follows_policy() {
        let (tx, _rx) = channel(2);
        let mut posted = RequestCapture::new(tx, BusWidth::FULL, WriteCompletion::Posted);
        posted.submit(Direction::Write, 0, 0);
        assert!(posted.outstanding().unwrap().posted);

        let (tx, _rx) = channel(2);
        let mut acked = RequestCapture::new(tx, BusWidth::FULL, WriteCompletion::Acknowledged);
        acked.submit(Direction::Write, 0, 0);
        assert!(!acked.outstanding().unwrap().posted);
    }

    #[test]
    fn test_truncates_to_bus_width() {
        let (tx, mut rx) = channel(2);
        let mut capture = RequestCapture::new(tx, BusWidth::new(8, 16), WriteCompletion::Posted);

        capture.submit(Direction::Write, 0x1ff, 0xdead_beef);
        rx.tick();
        rx.tick();
        assert_eq!(rx.dequeue(), Some(TransactionPacket::write(0xff, 0xbeef)));
    }
}
