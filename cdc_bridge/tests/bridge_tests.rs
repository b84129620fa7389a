//! End-to-end behaviour of the bridge across clock ratios, wait states and
//! completion policies.

use std::collections::HashMap;

use cdc_bridge::{
    bridge, drive_fast, spawn_slow_domain, BridgeConfig, ClockConfig, CoSimulation, Completion,
    Config, Op, PeripheralConfig, RegisterFile, SubmitStatus, WaitStates, WriteCompletion,
};
use proptest::prelude::*;

const MAX_EDGES: u64 = 100_000;

fn config(
    clock: ClockConfig,
    wait_states: WaitStates,
    write_completion: WriteCompletion,
) -> Config {
    Config {
        bridge: BridgeConfig {
            write_completion,
            ..BridgeConfig::default()
        },
        clock,
        peripheral: PeripheralConfig {
            wait_states,
            seed: 3,
        },
    }
}

fn cosim(config: &Config) -> CoSimulation<RegisterFile> {
    CoSimulation::from_config(config, RegisterFile::from_config(&config.peripheral))
}

/// Expected completions for `ops` against an initially zeroed register file.
fn model(ops: &[Op]) -> Vec<Completion> {
    let mut regs = HashMap::new();
    ops.iter()
        .map(|op| match *op {
            Op::Write { address, data } => {
                regs.insert(address, data);
                Completion::WriteDone
            }
            Op::Read { address } => Completion::ReadDone(regs.get(&address).copied().unwrap_or(0)),
        })
        .collect()
}

fn mixed_script(len: u32) -> Vec<Op> {
    (0..len)
        .map(|i| match i % 3 {
            0 => Op::Write {
                address: (i % 7) * 4,
                data: i.wrapping_mul(0x9e37_79b9),
            },
            _ => Op::Read {
                address: (i % 5) * 4,
            },
        })
        .collect()
}

#[test]
fn round_trip_write_then_read() {
    let mut sim = cosim(&Config::default());
    assert_eq!(
        sim.transact(
            Op::Write {
                address: 0x10,
                data: 0xdead_beef
            },
            MAX_EDGES
        ),
        Ok(Completion::WriteDone)
    );
    assert_eq!(
        sim.transact(Op::Read { address: 0x10 }, MAX_EDGES),
        Ok(Completion::ReadDone(0xdead_beef))
    );
}

#[test]
fn arbitrary_wait_states_complete() {
    let ops = mixed_script(30);
    let expected = model(&ops);

    for wait in [0, 1, 5, 100] {
        for policy in [WriteCompletion::Posted, WriteCompletion::Acknowledged] {
            let config = config(ClockConfig::default(), WaitStates::Fixed(wait), policy);
            let mut sim = cosim(&config);
            let completions = sim.run_script(&ops, MAX_EDGES).unwrap();
            assert_eq!(completions, expected, "wait {wait}, {policy:?}");

            assert!(sim.drain(MAX_EDGES));
            let (_, slow) = sim.into_parts();
            assert_eq!(slow.peripheral().accesses(), ops.len() as u64);
        }
    }
}

#[test]
fn clock_ratio_independence() {
    let ops = mixed_script(40);
    let expected = model(&ops);

    // (fast period, slow period): fast 2:1, equal, slow three times faster.
    for (fast, slow) in [(1, 2), (1, 1), (3, 1), (2, 7), (5, 3)] {
        for wait in [0, 5] {
            let config = config(
                ClockConfig::ratio(fast, slow),
                WaitStates::Fixed(wait),
                WriteCompletion::Posted,
            );
            let completions = cosim(&config).run_script(&ops, MAX_EDGES).unwrap();
            assert_eq!(completions, expected, "ratio {fast}:{slow}, wait {wait}");
        }
    }
}

#[test]
fn jittered_slow_clock_and_random_waits() {
    let ops = mixed_script(60);
    let expected = model(&ops);

    for seed in 0..8 {
        let clock = ClockConfig {
            jitter: 4,
            slow_phase: seed % 3,
            seed,
            ..ClockConfig::ratio(1, 2)
        };
        let config = config(
            clock,
            WaitStates::Random { max: 6 },
            WriteCompletion::Acknowledged,
        );
        let completions = cosim(&config).run_script(&ops, MAX_EDGES).unwrap();
        assert_eq!(completions, expected, "seed {seed}");
    }
}

#[test]
fn second_submit_stalls_until_completion() {
    let first_ops = [
        Op::Write { address: 8, data: 1 },
        Op::Read { address: 8 },
    ];
    let second_ops = [
        Op::Write { address: 12, data: 2 },
        Op::Read { address: 12 },
    ];

    for policy in [WriteCompletion::Posted, WriteCompletion::Acknowledged] {
        for first in first_ops {
            for second in second_ops {
                let config = config(ClockConfig::ratio(1, 3), WaitStates::Fixed(4), policy);
                let mut sim = cosim(&config);

                let accepted = match first {
                    Op::Write { address, data } => sim.fast_mut().submit_write(address, data),
                    Op::Read { address } => sim.fast_mut().submit_read(address),
                };
                assert_eq!(accepted, SubmitStatus::Accepted);

                let mut delivered = None;
                for _ in 0..MAX_EDGES {
                    let stalled = match second {
                        Op::Write { address, data } => sim.fast_mut().submit_write(address, data),
                        Op::Read { address } => sim.fast_mut().submit_read(address),
                    };
                    assert_eq!(
                        stalled,
                        SubmitStatus::Stalled,
                        "{first:?} then {second:?} under {policy:?}"
                    );
                    if let (_, Some(done)) = sim.step() {
                        delivered = Some(done);
                        break;
                    }
                }
                assert!(delivered.is_some());
                assert!(!sim.fast().is_busy());
            }
        }
    }
}

#[test]
fn acknowledged_write_reaches_peripheral_before_completion() {
    let config = config(
        ClockConfig::ratio(1, 4),
        WaitStates::Fixed(3),
        WriteCompletion::Acknowledged,
    );
    let mut sim = cosim(&config);

    assert_eq!(
        sim.transact(Op::Write { address: 0x40, data: 77 }, MAX_EDGES),
        Ok(Completion::WriteDone)
    );
    let (_, slow) = sim.into_parts();
    assert_eq!(slow.peripheral().peek(0x40), 77);
}

#[test]
fn narrow_bus_truncates() {
    let config = Config {
        bridge: BridgeConfig {
            address_width: 8,
            data_width: 12,
            ..BridgeConfig::default()
        },
        ..Config::default()
    };
    let mut sim = cosim(&config);

    sim.transact(
        Op::Write {
            address: 0x1_23,
            data: 0xabcd,
        },
        MAX_EDGES,
    )
    .unwrap();
    // Aliases onto the same truncated address.
    assert_eq!(
        sim.transact(Op::Read { address: 0x23 }, MAX_EDGES),
        Ok(Completion::ReadDone(0xbcd))
    );
}

#[test]
fn minimal_queues() {
    let config = Config {
        bridge: BridgeConfig {
            request_depth_log2: 0,
            response_depth_log2: 0,
            write_completion: WriteCompletion::Acknowledged,
            ..BridgeConfig::default()
        },
        clock: ClockConfig::ratio(2, 1),
        ..Config::default()
    };
    let ops = mixed_script(25);
    let completions = cosim(&config).run_script(&ops, MAX_EDGES).unwrap();
    assert_eq!(completions, model(&ops));
}

#[test]
fn config_file_drives_cosimulation() {
    let config = Config::from_toml_str(
        r#"
        [bridge]
        write_completion = "acknowledged"

        [clock]
        fast_period = 1
        slow_period = 5
        jitter = 2
        seed = 11

        [peripheral]
        wait_states = { random = { max = 3 } }
        "#,
    )
    .unwrap();
    let ops = mixed_script(20);
    let completions = cosim(&config).run_script(&ops, MAX_EDGES).unwrap();
    assert_eq!(completions, model(&ops));
}

#[test]
fn threaded_domains() {
    let (mut fast, slow) = bridge(
        &BridgeConfig::default(),
        RegisterFile::new(WaitStates::Random { max: 3 }),
    );
    let handle = spawn_slow_domain(slow, None, None).unwrap();

    let ops = mixed_script(500);
    let completions = drive_fast(&mut fast, &ops, None).unwrap();
    assert_eq!(completions, model(&ops));

    drop(fast);
    let slow = handle.join().unwrap();
    assert!(slow.is_disconnected());
}

#[test]
fn threaded_shutdown_carries_out_trailing_writes() {
    let mut ops = mixed_script(200);
    ops.push(Op::Write {
        address: 0x100,
        data: 0xdead_beef,
    });
    let expected = model(&ops);

    for use_stop in [false, true] {
        let (mut fast, slow) = bridge(
            &BridgeConfig::default(),
            RegisterFile::new(WaitStates::Fixed(2)),
        );
        let handle = spawn_slow_domain(slow, None, None).unwrap();

        assert_eq!(drive_fast(&mut fast, &ops, None).unwrap(), expected);
        let slow = if use_stop {
            handle.stop().unwrap()
        } else {
            drop(fast);
            handle.join().unwrap()
        };

        let regs = slow.peripheral();
        assert_eq!(regs.accesses(), ops.len() as u64, "stop: {use_stop}");
        assert_eq!(regs.peek(0x100), 0xdead_beef);
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..8, any::<u32>()).prop_map(|(a, data)| Op::Write { address: a * 4, data }),
        (0u32..8).prop_map(|a| Op::Read { address: a * 4 }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn completions_match_register_model(
        ops in prop::collection::vec(arb_op(), 1..40),
        fast_period in 1u64..5,
        slow_period in 1u64..9,
        jitter in 0u64..4,
        max_wait in 0u32..8,
        acknowledged in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let clock = ClockConfig {
            jitter,
            seed,
            ..ClockConfig::ratio(fast_period, slow_period)
        };
        let policy = if acknowledged {
            WriteCompletion::Acknowledged
        } else {
            WriteCompletion::Posted
        };
        let config = config(clock, WaitStates::Random { max: max_wait }, policy);

        let completions = cosim(&config).run_script(&ops, MAX_EDGES).unwrap();
        prop_assert_eq!(completions, model(&ops));
    }
}
