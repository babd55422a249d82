//! Integration tests: whole sessions driven through the simulated SDK.
//!
//! Events enter exactly as they would from the vendor driver, as raw
//! bit-packed codes fired into the registered callback, and leave through
//! the event stream, the state cache, and the recorded LCD calls.

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::display::TickOutcome;
    use crate::error::DriverError;
    use crate::gkey::{DeviceKind, GkeyCode, ModeId};
    use crate::sdk::{LcdType, Rgb};
    use crate::session::DeviceSession;
    use crate::sim::{SdkCall, SimulatedSdk};
    use crate::test_support;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Open a session on a fresh simulated SDK with a hand-driven clock.
    fn open_sim(config: SessionConfig) -> (Arc<SimulatedSdk>, Arc<ManualClock>, DeviceSession) {
        let sdk = Arc::new(SimulatedSdk::new());
        sdk.set_connected(&[LcdType::Mono, LcdType::Color]);
        let clock = Arc::new(ManualClock::new());
        let session = DeviceSession::open_with_clock(
            config,
            Arc::clone(&sdk) as _,
            Arc::clone(&sdk) as _,
            Arc::clone(&clock) as _,
        )
        .unwrap();
        (sdk, clock, session)
    }

    fn fire_at(sdk: &SimulatedSdk, clock: &ManualClock, at: u64, code: GkeyCode) {
        clock.set(at);
        assert!(sdk.fire(code, None));
    }

    /// Debounce 50 ms: G6 down at t=0 and t=20 collapse, t=60 passes.
    #[test]
    fn debounced_g6_scenario() {
        let _guard = test_support::lock();
        let config = SessionConfig {
            debounce_millis: 50,
            ..SessionConfig::default()
        };
        let (sdk, clock, session) = open_sim(config);
        let mut events = session.event_stream();
        let g6_down = GkeyCode::pack(6, true, 1, false);

        fire_at(&sdk, &clock, 0, g6_down);
        fire_at(&sdk, &clock, 20, g6_down);

        let first = events.try_next().unwrap();
        assert_eq!(first.device, DeviceKind::Key);
        assert_eq!(first.index, 6);
        assert!(first.pressed);
        assert_eq!(first.mode, ModeId::M1);
        assert_eq!(events.try_next(), None);

        fire_at(&sdk, &clock, 60, g6_down);
        let second = events.try_next().unwrap();
        assert_eq!(second.timestamp_ms, 60);
        assert_eq!(events.try_next(), None);

        let stats = session.stats();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.suppressed, 1);
    }

    /// Two text lines, no bitmap: first tick pushes, second skips.
    #[test]
    fn two_lines_then_idle_tick() {
        let _guard = test_support::lock();
        let (sdk, _clock, mut session) = open_sim(SessionConfig::default());
        sdk.take_calls();

        let frame = session.frame().unwrap();
        frame.set_line(0, "F-16C").unwrap();
        frame.set_line(1, "ALT 12000").unwrap();

        assert_eq!(session.tick(), Ok(TickOutcome::Pushed));
        assert_eq!(session.tick(), Ok(TickOutcome::Skipped));
        assert_eq!(
            sdk.take_calls(),
            vec![
                SdkCall::MonoSetText(0, "F-16C".into()),
                SdkCall::MonoSetText(1, "ALT 12000".into()),
                SdkCall::Update,
            ]
        );
    }

    /// Closing twice: the second close makes no SDK calls.
    #[test]
    fn double_close_makes_no_calls() {
        let _guard = test_support::lock();
        let (sdk, _clock, mut session) = open_sim(SessionConfig::default());
        session.close();
        sdk.take_calls();
        session.close();
        assert!(sdk.take_calls().is_empty());
        assert!(session.is_closed());
    }

    #[test]
    fn callback_after_close_touches_nothing() {
        let _guard = test_support::lock();
        let (sdk, clock, mut session) = open_sim(SessionConfig::default());
        sdk.set_unregister_on_shutdown(false);
        let mut events = session.event_stream();

        fire_at(&sdk, &clock, 1, GkeyCode::pack(3, true, 1, false));
        session.close();
        fire_at(&sdk, &clock, 2, GkeyCode::pack(4, true, 2, false));

        assert_eq!(session.stats().stale, 1);
        assert!(!session.is_pressed(DeviceKind::Key, 4, ModeId::M2));
        assert_eq!(session.current_mode(), ModeId::M1);
        // queued before close, but never delivered after close returns
        assert_eq!(events.try_next(), None);
        assert_eq!(events.next(), None);
    }

    #[test]
    fn callback_after_drop_is_ignored() {
        let _guard = test_support::lock();
        let (sdk, clock, session) = open_sim(SessionConfig::default());
        sdk.set_unregister_on_shutdown(false);
        drop(session);
        fire_at(&sdk, &clock, 5, GkeyCode::pack(1, true, 1, false));
    }

    #[test]
    fn blocked_consumer_wakes_on_close() {
        let _guard = test_support::lock();
        let (_sdk, _clock, mut session) = open_sim(SessionConfig::default());
        let mut events = session.event_stream();
        let consumer = std::thread::spawn(move || events.next());
        std::thread::sleep(Duration::from_millis(20));
        session.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn events_cross_threads_in_order() {
        let _guard = test_support::lock();
        let (sdk, clock, session) = open_sim(SessionConfig::default());
        let mut events = session.event_stream();

        let driver = {
            let sdk = Arc::clone(&sdk);
            let clock = Arc::clone(&clock);
            std::thread::spawn(move || {
                for i in 1..=20u8 {
                    clock.set(i as u64);
                    sdk.fire(GkeyCode::pack(i, i % 2 == 1, 1, false), None);
                }
            })
        };

        let received: Vec<u8> = (0..20)
            .filter_map(|_| events.next_timeout(Duration::from_secs(2)))
            .map(|e| e.index)
            .collect();
        driver.join().unwrap();
        assert_eq!(received, (1..=20).collect::<Vec<u8>>());
        assert!(session.is_pressed(DeviceKind::Key, 19, ModeId::M1));
        assert!(!session.is_pressed(DeviceKind::Key, 20, ModeId::M1));
    }

    #[test]
    fn mode_switch_is_reflected_in_event_and_cache() {
        let _guard = test_support::lock();
        let (sdk, clock, session) = open_sim(SessionConfig::default());
        sdk.set_gkey_label(2, 3, "G2/M3");
        let mut events = session.event_stream();

        fire_at(&sdk, &clock, 0, GkeyCode::pack(1, true, 1, false));
        fire_at(&sdk, &clock, 5, GkeyCode::pack(2, true, 3, false));

        assert_eq!(events.try_next().unwrap().mode, ModeId::M1);
        let switched = events.try_next().unwrap();
        assert_eq!(switched.mode, ModeId::M3);
        assert_eq!(&*switched.label, "G2/M3");
        assert_eq!(session.current_mode(), ModeId::M3);
        assert!(session.is_pressed(DeviceKind::Key, 2, ModeId::M3));
        assert!(!session.is_pressed(DeviceKind::Key, 2, ModeId::M1));
    }

    #[test]
    fn mouse_events_use_mouse_labels() {
        let _guard = test_support::lock();
        let (sdk, clock, session) = open_sim(SessionConfig::default());
        sdk.set_mouse_label(8, "Mouse Btn 8");
        let mut events = session.event_stream();

        fire_at(&sdk, &clock, 0, GkeyCode::pack(8, true, 1, true));
        let evt = events.try_next().unwrap();
        assert_eq!(evt.device, DeviceKind::Mouse);
        assert_eq!(&*evt.label, "Mouse Btn 8");
        assert!(session.is_pressed(DeviceKind::Mouse, 8, ModeId::M1));
        assert!(!session.is_pressed(DeviceKind::Key, 8, ModeId::M1));
    }

    #[test]
    fn color_push_failure_is_retried() {
        let _guard = test_support::lock();
        let config = SessionConfig {
            lcd_type: LcdType::Color,
            ..SessionConfig::default()
        };
        let (sdk, _clock, mut session) = open_sim(config);
        sdk.take_calls();

        let frame = session.frame().unwrap();
        frame.set_title("Ka-50", Rgb(255, 128, 0)).unwrap();
        frame.set_line(0, "ROTOR 90%").unwrap();

        sdk.fail_next_push();
        assert_eq!(
            session.tick(),
            Err(DriverError::PushFailed {
                call: "LogiLcdColorSetTitle"
            })
        );
        assert!(session.frame().unwrap().diff());

        assert_eq!(session.tick(), Ok(TickOutcome::Pushed));
        assert_eq!(session.tick(), Ok(TickOutcome::Skipped));
        assert_eq!(
            session.frame().unwrap().committed().title.as_ref().map(|t| t.text.as_str()),
            Some("Ka-50")
        );
    }

    #[test]
    fn tick_after_close_is_skipped() {
        let _guard = test_support::lock();
        let (sdk, _clock, mut session) = open_sim(SessionConfig::default());
        session.frame().unwrap().set_line(0, "x").unwrap();
        session.close();
        sdk.take_calls();
        assert_eq!(session.tick(), Ok(TickOutcome::Skipped));
        assert!(sdk.take_calls().is_empty());
    }

    fn raw_event() -> impl Strategy<Value = (u8, bool, u8, bool, u64)> {
        (1u8..=30, any::<bool>(), 1u8..=3, any::<bool>(), 0u64..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_mode_follows_latest_event(
            debounce in 0u64..100,
            seq in proptest::collection::vec(raw_event(), 1..40),
        ) {
            let _guard = test_support::lock();
            let config = SessionConfig { debounce_millis: debounce, ..SessionConfig::default() };
            let (sdk, clock, session) = open_sim(config);
            let mut now = 0;
            for (index, down, mode, mouse, dt) in seq {
                now += dt;
                fire_at(&sdk, &clock, now, GkeyCode::pack(index, down, mode, mouse));
                prop_assert_eq!(session.current_mode(), ModeId::from_bits(mode).unwrap());
            }
        }

        #[test]
        fn prop_unseen_inputs_are_released(
            seq in proptest::collection::vec(raw_event(), 0..40),
            probe_index in 31u8..=255,
            probe_mode in 1u8..=3,
            probe_mouse in any::<bool>(),
        ) {
            let _guard = test_support::lock();
            let (sdk, clock, session) = open_sim(SessionConfig::default());
            for (i, (index, down, mode, mouse, _)) in seq.into_iter().enumerate() {
                fire_at(&sdk, &clock, i as u64, GkeyCode::pack(index, down, mode, mouse));
            }
            let device = if probe_mouse { DeviceKind::Mouse } else { DeviceKind::Key };
            prop_assert!(!session.is_pressed(device, probe_index, ModeId::from_bits(probe_mode).unwrap()));
        }

        #[test]
        fn prop_second_tick_is_always_skipped(
            lines in proptest::collection::vec((0usize..8, "[ -~]{0,20}"), 0..12),
        ) {
            let _guard = test_support::lock();
            let config = SessionConfig { lcd_type: LcdType::Color, ..SessionConfig::default() };
            let (_sdk, _clock, mut session) = open_sim(config);
            for (index, text) in lines {
                session.frame().unwrap().set_line(index, text).unwrap();
            }
            session.tick().unwrap();
            prop_assert!(!session.frame().unwrap().diff());
            prop_assert_eq!(session.tick(), Ok(TickOutcome::Skipped));
        }
    }
}
