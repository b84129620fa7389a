//! Free-running mode: each domain on its own OS thread with no shared clock.
//!
//! The slow domain runs in a dedicated thread, optionally pinned to a core and
//! optionally throttled to a period. The fast domain is driven by the caller.
//! The only state the two threads share is the pair of queues.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bridge::{FastDomain, SlowDomain};
use crate::deliver::Completion;
use crate::peripheral::Peripheral;
use crate::sim::{Op, SimError};

pub struct SlowDomainHandle<P> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<SlowDomain<P>>,
}

impl<P> SlowDomainHandle<P> {
    /// Asks the slow thread to stop and waits for it.
    ///
    /// Every request published before this call, posted writes included, is
    /// carried out to the peripheral first.
    pub fn stop(self) -> thread::Result<SlowDomain<P>> {
        self.stop.store(true, Ordering::Release);
        self.handle.join()
    }

    /// Waits for the slow thread to exit on its own, which it does once the
    /// fast domain has been dropped and its last requests are carried out.
    pub fn join(self) -> thread::Result<SlowDomain<P>> {
        self.handle.join()
    }
}

/// Moves `slow` onto a new thread that ticks it until it is stopped or the
/// fast domain disconnects, and then until every request already published
/// has reached the peripheral.
///
/// `period` sleeps between ticks; `None` spins. `pin` selects a core id.
pub fn spawn_slow_domain<P>(
    mut slow: SlowDomain<P>,
    period: Option<Duration>,
    pin: Option<usize>,
) -> io::Result<SlowDomainHandle<P>>
where
    P: Peripheral + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = thread::Builder::new()
        .name("slow-domain".into())
        .spawn(move || {
            if let Some(id) = pin {
                if !core_affinity::set_for_current(core_affinity::CoreId { id }) {
                    tracing::warn!(core = id, "failed to pin slow domain");
                }
            }

            let mut ticks = 0u64;
            loop {
                // Exit conditions before the queue sample, so a request
                // published just before stop or disconnect is not missed.
                let closing = stop_flag.load(Ordering::Acquire) || slow.is_disconnected();
                if closing && slow.is_quiescent() {
                    break;
                }
                slow.tick();
                ticks += 1;
                match period {
                    Some(period) => thread::sleep(period),
                    None => std::hint::spin_loop(),
                }
            }
            tracing::debug!(ticks, disconnected = slow.is_disconnected(), "slow domain exiting");
            slow
        })?;

    Ok(SlowDomainHandle { stop, handle })
}

/// Runs `ops` through `fast` from the calling thread, one at a time.
///
/// Each op is retried on every fast tick while stalled. Fails if the slow
/// domain is dropped (for instance by a panicking peripheral) before the op
/// completes. A slow thread that is merely stopped is not detected.
pub fn drive_fast(
    fast: &mut FastDomain,
    ops: &[Op],
    period: Option<Duration>,
) -> Result<Vec<Completion>, SimError> {
    let mut completions = Vec::with_capacity(ops.len());

    for (index, &op) in ops.iter().enumerate() {
        let mut submitted = false;
        loop {
            if let Some(done) = fast.tick() {
                if submitted {
                    completions.push(done);
                    break;
                }
                tracing::warn!(index, ?done, "completion delivered before submission");
            }
            if fast.is_disconnected() {
                return Err(SimError::Disconnected { index, op });
            }
            if !submitted {
                submitted = op.submit(fast).is_accepted();
            }
            match period {
                Some(period) => thread::sleep(period),
                None => std::hint::spin_loop(),
            }
        }
    }

    Ok(completions)
}
