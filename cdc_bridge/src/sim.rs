//! Single-threaded co-simulation of both domains on a [`ClockSchedule`].
//!
//! The caller acts on the fast clock: each fast edge first ticks the fast
//! domain, then offers any pending submission. The slow domain is ticked on
//! slow edges. On coincident edges the fast domain goes first.

use thiserror::Error;

use crate::bridge::{bridge, FastDomain, SlowDomain};
use crate::capture::SubmitStatus;
use crate::clock::{ClockSchedule, Edge};
use crate::config::Config;
use crate::deliver::Completion;
use crate::packet::Direction;
use crate::peripheral::Peripheral;

/// A caller-level transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Write { address: u32, data: u32 },
    Read { address: u32 },
}

impl Op {
    pub(crate) fn submit(self, fast: &mut FastDomain) -> SubmitStatus {
        match self {
            Op::Write { address, data } => fast.submit(Direction::Write, address, data),
            Op::Read { address } => fast.submit(Direction::Read, address, 0),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("transaction {index} ({op:?}) did not complete within {edges} clock edges")]
    Timeout { index: usize, op: Op, edges: u64 },
    #[error("transaction {index} ({op:?}) lost its peer domain")]
    Disconnected { index: usize, op: Op },
}

pub struct CoSimulation<P> {
    fast: FastDomain,
    slow: SlowDomain<P>,
    clock: ClockSchedule,
    fast_ticks: u64,
    slow_ticks: u64,
}

impl<P: Peripheral> CoSimulation<P> {
    pub fn new(fast: FastDomain, slow: SlowDomain<P>, clock: ClockSchedule) -> Self {
        Self {
            fast,
            slow,
            clock,
            fast_ticks: 0,
            slow_ticks: 0,
        }
    }

    pub fn from_config(config: &Config, peripheral: P) -> Self {
        let (fast, slow) = bridge(&config.bridge, peripheral);
        Self::new(fast, slow, ClockSchedule::new(&config.clock))
    }

    pub fn fast(&self) -> &FastDomain {
        &self.fast
    }

    pub fn fast_mut(&mut self) -> &mut FastDomain {
        &mut self.fast
    }

    pub fn slow(&self) -> &SlowDomain<P> {
        &self.slow
    }

    pub fn fast_ticks(&self) -> u64 {
        self.fast_ticks
    }

    pub fn slow_ticks(&self) -> u64 {
        self.slow_ticks
    }

    /// Advances to the next clock edge. Returns the edge and any completion
    /// the fast domain delivered on it.
    pub fn step(&mut self) -> (Edge, Option<Completion>) {
        let edge = self.clock.next_edge();
        let mut completion = None;
        if edge.fast() {
            completion = self.fast.tick();
            self.fast_ticks += 1;
        }
        if edge.slow() {
            self.slow.tick();
            self.slow_ticks += 1;
        }
        (edge, completion)
    }

    /// Submits `op`, retrying on every fast edge while stalled, and runs until
    /// its completion is delivered.
    ///
    /// `max_edges` only bounds the simulation; the bridge itself never times out.
    pub fn transact(&mut self, op: Op, max_edges: u64) -> Result<Completion, SimError> {
        self.transact_indexed(0, op, max_edges)
    }

    /// Runs `ops` one after another, returning completions in submission order.
    pub fn run_script(
        &mut self,
        ops: &[Op],
        max_edges_per_op: u64,
    ) -> Result<Vec<Completion>, SimError> {
        ops.iter()
            .enumerate()
            .map(|(index, &op)| self.transact_indexed(index, op, max_edges_per_op))
            .collect()
    }

    fn transact_indexed(
        &mut self,
        index: usize,
        op: Op,
        max_edges: u64,
    ) -> Result<Completion, SimError> {
        let mut submitted = false;

        for _ in 0..max_edges {
            let (edge, completion) = self.step();
            if let Some(done) = completion {
                if submitted {
                    tracing::trace!(index, ?op, ?done, now = self.clock.now(), "completed");
                    return Ok(done);
                }
                tracing::warn!(index, ?done, "completion delivered before submission");
            }
            if edge.fast() && !submitted {
                submitted = op.submit(&mut self.fast).is_accepted();
            }
        }

        Err(SimError::Timeout {
            index,
            op,
            edges: max_edges,
        })
    }

    /// Ticks until nothing is outstanding, queued or on the bus, or until
    /// `max_edges` have elapsed. Returns true if quiescent.
    pub fn drain(&mut self, max_edges: u64) -> bool {
        for _ in 0..max_edges {
            if self.is_quiescent() {
                return true;
            }
            self.step();
        }
        self.is_quiescent()
    }

    fn is_quiescent(&self) -> bool {
        !self.fast.is_busy() && self.fast.queued_requests() == 0 && self.slow.state().is_idle()
    }

    pub fn into_parts(self) -> (FastDomain, SlowDomain<P>) {
        (self.fast, self.slow)
    }
}
