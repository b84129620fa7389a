//! Non-pipelined transaction bridge between two unrelated clock domains.
//!
//! A fast-domain caller issues single read or write transactions. They cross
//! into the slow domain through a Gray-coded queue, are driven onto a simple
//! two-phase peripheral bus (setup, then access with wait states), and their
//! completions return through a second queue. At most one transaction is in
//! flight at a time.
//!
//! ```
//! use cdc_bridge::{bridge, BridgeConfig, Completion, RegisterFile, WaitStates};
//!
//! let peripheral = RegisterFile::new(WaitStates::Fixed(1));
//! let (mut fast, mut slow) = bridge(&BridgeConfig::default(), peripheral);
//! assert!(fast.submit_read(0x10).is_accepted());
//! let done = loop {
//!     if let Some(done) = fast.tick() {
//!         break done;
//!     }
//!     slow.tick();
//! };
//! assert_eq!(done, Completion::ReadDone(0));
//! ```

pub mod bridge;
pub mod capture;
pub mod clock;
pub mod config;
pub mod deliver;
pub mod drive;
pub mod packet;
pub mod peripheral;
pub mod sim;
pub mod threaded;

pub use bridge::{bridge, FastDomain, SlowDomain};
pub use capture::{RequestCapture, SubmitStatus};
pub use clock::{ClockSchedule, Edge};
pub use config::{BridgeConfig, ClockConfig, Config, ConfigError, PeripheralConfig, WriteCompletion};
pub use deliver::{Completion, CompletionHandler, ResponseDeliver};
pub use drive::{DriveState, ResponseDrive};
pub use packet::{BusWidth, Direction, ResponsePacket, TransactionPacket};
pub use peripheral::{BusSignals, Peripheral, PeripheralReply, RegisterFile, WaitStates};
pub use sim::{CoSimulation, Op, SimError};
pub use threaded::{drive_fast, spawn_slow_domain, SlowDomainHandle};
