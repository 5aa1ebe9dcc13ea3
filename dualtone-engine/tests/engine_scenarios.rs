//! End-to-end engine scenarios against the offline device.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use dualtone_core::dsp::{phase_increment, TAU};
use dualtone_engine::{
    ChannelObserver, DeviceError, DeviceEvent, Engine, EngineConfig, EngineError, EngineEvent, OfflineDevice,
    ParamError, RenderStrategy, ToneMode, VoiceParams, Waveform,
};

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_buffer_duration(Duration::from_millis(100))
        .with_sample_rate(8_000)
}

fn observe<R: dualtone_engine::Renderer>(engine: &mut Engine<R>) -> Receiver<EngineEvent> {
    let (tx, rx) = crossbeam_channel::unbounded();
    engine.subscribe(ChannelObserver(tx));
    rx
}

fn drain(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    rx.try_iter().collect()
}

fn wrapped_step(after: f64, before: f64) -> f64 {
    (after - before).rem_euclid(TAU)
}

#[test]
fn left_frequency_round_trip_and_rejection() {
    let mut e = Engine::buffered(config(), OfflineDevice::new()).unwrap();
    let rx = observe(&mut e);

    e.set_left_frequency(1000.0).unwrap();
    assert_eq!(e.left_frequency(), 1000.0);

    let err = e.set_left_frequency(5.0).unwrap_err();
    assert!(matches!(err, EngineError::Param(ParamError::InvalidFrequency { .. })));
    assert_eq!(e.left_frequency(), 1000.0);

    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::LeftFrequencyChanged(1000.0)));
    assert!(events.iter().any(|ev| matches!(ev, EngineEvent::ErrorOccurred(m) if m.contains("5 Hz"))));
}

#[test]
fn beat_is_always_right_minus_left() {
    let mut e = Engine::streaming(config(), OfflineDevice::new()).unwrap();
    let rx = observe(&mut e);

    e.set_left_frequency(200.0).unwrap();
    e.set_right_frequency(208.0).unwrap();
    assert_eq!(e.beat_frequency(), e.right_frequency() - e.left_frequency());
    assert_eq!(e.beat_frequency(), 8.0);

    e.set_left_frequency(205.0).unwrap();
    assert_eq!(e.beat_frequency(), 3.0);

    e.set_beat_frequency(10.0).unwrap();
    assert_eq!(e.right_frequency(), 215.0);
    assert_eq!(e.beat_frequency(), 10.0);

    assert!(e.set_beat_frequency(0.0).is_err());
    assert!(e.set_beat_frequency(150.0).is_err());
    assert_eq!(e.right_frequency(), 215.0);

    let beats: Vec<_> = drain(&rx)
        .into_iter()
        .filter_map(|ev| match ev {
            EngineEvent::BeatFrequencyChanged(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(beats.last(), Some(&10.0));
}

#[test]
fn carrier_sets_both_sides() {
    let mut e = Engine::streaming(config(), OfflineDevice::new()).unwrap();
    e.set_carrier_frequency(432.0).unwrap();
    assert_eq!((e.left_frequency(), e.right_frequency()), (432.0, 432.0));
    assert_eq!(e.beat_frequency(), 0.0);
    assert!(e.set_carrier_frequency(10.0).is_err());
    assert_eq!(e.left_frequency(), 432.0);
}

#[test]
fn start_and_stop_are_idempotent() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);

    e.start().unwrap();
    e.start().unwrap();
    assert!(e.is_playing());
    assert_eq!(dev.submissions(), 1);

    e.stop();
    e.stop();
    assert!(!e.is_playing());
    assert!(!dev.is_running());
    assert_eq!(e.current_phases(), (0.0, 0.0));

    let events = drain(&rx);
    assert_eq!(events.iter().filter(|ev| **ev == EngineEvent::PlaybackStarted).count(), 1);
    assert_eq!(events.iter().filter(|ev| **ev == EngineEvent::PlaybackStopped).count(), 1);
}

#[test]
fn streaming_frequency_change_is_phase_continuous() {
    let dev = OfflineDevice::new();
    let cfg = config().with_sample_rate(44_100);
    let mut e = Engine::streaming(cfg, dev.clone()).unwrap();
    e.start().unwrap();

    dev.pull(10);
    let before = e.current_phases().0;
    dev.pull(1);
    let step = wrapped_step(e.current_phases().0, before);
    assert!((step - phase_increment(360.0, 44_100.0)).abs() < 1e-9);

    e.set_left_frequency(1_000.0).unwrap();
    let before = e.current_phases().0;
    dev.pull(1);
    let step = wrapped_step(e.current_phases().0, before);
    assert!((step - phase_increment(1_000.0, 44_100.0)).abs() < 1e-9);
}

#[test]
fn binaural_one_second_at_44k1() {
    let dev = OfflineDevice::new();
    let voice = VoiceParams {
        left_hz: 200.0,
        right_hz: 208.0,
        waveform: Waveform::Sine,
        amplitude: 0.3,
        ..VoiceParams::default()
    };
    let cfg = EngineConfig::default()
        .with_sample_rate(44_100)
        .with_buffer_duration(Duration::from_secs(1))
        .with_voice(voice)
        .with_volume(1.0);
    let mut e = Engine::buffered(cfg, dev.clone()).unwrap();
    e.start().unwrap();

    let out = dev.pull(44_100);
    assert!(out.iter().all(|&s| s > i16::MIN && s < i16::MAX));
    assert!(out.iter().all(|&s| s.unsigned_abs() <= 9_830));
    let left: Vec<_> = out.iter().step_by(2).collect();
    let right: Vec<_> = out.iter().skip(1).step_by(2).collect();
    assert_ne!(left, right);
}

#[test]
fn isochronic_square_is_gated_binaural_square_is_bipolar() {
    let square = VoiceParams {
        left_hz: 200.0,
        right_hz: 200.0,
        pulse_hz: 10.0,
        waveform: Waveform::Square,
        amplitude: 1.0,
        ..VoiceParams::default()
    };
    let cfg = EngineConfig::streaming().with_sample_rate(44_100).with_volume(1.0);

    let iso_dev = OfflineDevice::new();
    let iso_cfg = cfg.clone().with_voice(VoiceParams { mode: ToneMode::Isochronic, ..square });
    let mut iso = Engine::streaming(iso_cfg, iso_dev.clone()).unwrap();
    iso.start().unwrap();
    let out = iso_dev.pull(4_410);
    assert!(out.chunks_exact(2).all(|f| f[0] == f[1]), "isochronic output is mono");
    assert!(out[2_300 * 2..4_300 * 2].iter().all(|&s| s == 0), "gate is closed for the second half");
    assert!(out[..2_200 * 2].iter().any(|&s| s != 0));
    assert!(out.iter().all(|&s| s >= 0), "isochronic square carrier is unipolar");

    let bin_dev = OfflineDevice::new();
    let mut bin = Engine::streaming(cfg.with_voice(square), bin_dev.clone()).unwrap();
    bin.start().unwrap();
    let out = bin_dev.pull(4_410);
    assert!(out.iter().any(|&s| s < 0), "bipolar square goes negative");
    assert!(out[2_300 * 2..4_300 * 2].iter().any(|&s| s != 0));
}

#[test]
fn buffered_block_loops_on_idle() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    let frames = e.renderer().block().map(|b| b.len() / 2).unwrap();
    assert_eq!(frames, 800);
    let first = dev.pull(frames);
    e.service();
    assert!(e.is_playing());
    assert_eq!(dev.submissions(), 2);

    let second = dev.pull(frames);
    assert_eq!(first, second, "the same content loops");
    assert!(!drain(&rx).contains(&EngineEvent::PlaybackStopped));
}

#[test]
fn buffered_live_change_resynthesizes_without_stopping() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    drain(&rx);

    e.set_left_frequency(440.0).unwrap();
    assert!(e.is_playing());
    assert_eq!(dev.submissions(), 2);
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::ParametersUpdated));
    assert!(!events.contains(&EngineEvent::PlaybackStopped));
    assert!(!events.contains(&EngineEvent::PlaybackStarted));
    assert_ne!(e.current_phases(), (0.0, 0.0), "restart keeps phase");
}

#[test]
fn idle_from_a_replaced_block_does_not_restart_the_new_one() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config().with_volume(1.0), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    dev.pull(800);
    dev.inject(DeviceEvent::Underrun);
    e.set_left_frequency(440.0).unwrap();
    assert_eq!(dev.submissions(), 2);
    let fresh = e.renderer().block().cloned().unwrap();

    let played = dev.pull(400);
    assert_eq!(&played[..], &fresh[..800]);
    e.service();
    assert_eq!(dev.submissions(), 2, "the fresh block keeps playing");
    assert_eq!(dev.pull(1), fresh[800..802].to_vec());

    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::BufferUnderrun), "other device events survive");
    assert!(e.is_playing());
}

#[test]
fn streaming_live_change_needs_no_restart() {
    let dev = OfflineDevice::new();
    let mut e = Engine::streaming(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    e.set_waveform(Waveform::Triangle).unwrap();
    e.set_amplitude(0.5).unwrap();
    assert_eq!(dev.submissions(), 1);
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::WaveformChanged(Waveform::Triangle)));
    assert!(!events.contains(&EngineEvent::ParametersUpdated));
}

#[test]
fn sample_rate_is_locked_while_playing() {
    let mut e = Engine::streaming(config(), OfflineDevice::new()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    let err = e.set_sample_rate(48_000).unwrap_err();
    assert_eq!(err, EngineError::Param(ParamError::SampleRateLocked));
    assert_eq!(e.sample_rate(), 8_000);
    assert!(drain(&rx).contains(&EngineEvent::ErrorOccurred("Cannot change sample rate while playing".into())));

    e.stop();
    e.set_sample_rate(48_000).unwrap();
    assert_eq!(e.sample_rate(), 48_000);
}

#[test]
fn mode_switch_stops_playback() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    e.set_mode(ToneMode::Isochronic);
    assert!(!e.is_playing());
    assert!(!dev.is_running());
    assert_eq!(e.mode(), ToneMode::Isochronic);
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::PlaybackStopped));
    assert!(events.contains(&EngineEvent::ModeChanged(ToneMode::Isochronic)));

    // The right tone is unused in isochronic mode.
    e.set_right_frequency(2.5).unwrap();
    e.apply_mode_defaults().unwrap();
    assert_eq!(e.right_frequency(), 360.0);
    assert_eq!(e.summary().to_string(), "ISO:7.8:Sine");
}

#[test]
fn session_ends_playback() {
    let mut e = Engine::streaming(config().with_session_minutes(Some(1)), OfflineDevice::new()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    assert!(e.session_remaining().is_some());

    e.service_at(Instant::now() + Duration::from_secs(30));
    assert!(e.is_playing());
    e.service_at(Instant::now() + Duration::from_secs(61));
    assert!(!e.is_playing());
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::SessionCompleted));
    assert!(events.contains(&EngineEvent::PlaybackStopped));

    assert!(e.set_session_minutes(Some(0)).is_err());
}

#[test]
fn missing_device_fails_start() {
    let mut e = Engine::buffered(config(), OfflineDevice::unavailable()).unwrap();
    let rx = observe(&mut e);
    assert_eq!(e.start().unwrap_err(), EngineError::Device(DeviceError::NoDevice));
    assert!(!e.is_playing());
    let events = drain(&rx);
    assert!(events
        .iter()
        .any(|ev| matches!(ev, EngineEvent::ErrorOccurred(m) if m.to_lowercase().contains("no device available"))));
}

#[test]
fn unsupported_format_fails_start() {
    let dev = OfflineDevice::new().with_max_sample_rate(48_000);
    let mut e = Engine::streaming(config().with_sample_rate(96_000), dev).unwrap();
    let rx = observe(&mut e);
    assert_eq!(e.start().unwrap_err(), EngineError::Device(DeviceError::FormatNotSupported));
    assert!(!e.is_playing());
    assert!(drain(&rx)
        .iter()
        .any(|ev| matches!(ev, EngineEvent::ErrorOccurred(m) if m.to_lowercase().contains("format not supported"))));
}

#[test]
fn empty_buffer_fails_start() {
    let mut e = Engine::buffered(config().with_buffer_duration(Duration::ZERO), OfflineDevice::new()).unwrap();
    let rx = observe(&mut e);
    assert_eq!(e.start().unwrap_err(), EngineError::EmptyBuffer);
    assert!(!e.is_playing());
    assert!(drain(&rx).contains(&EngineEvent::ErrorOccurred("Failed to generate audio buffer".into())));
}

#[test]
fn underrun_is_reported_and_playback_continues() {
    let dev = OfflineDevice::new();
    let mut e = Engine::streaming(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    dev.inject(DeviceEvent::Underrun);
    e.service();
    assert!(e.is_playing());
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::BufferUnderrun));
    assert!(events.contains(&EngineEvent::AudioDeviceError("Audio buffer underrun".into())));
}

#[test]
fn fatal_device_error_forces_stop() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();

    dev.inject(DeviceEvent::Error(DeviceError::Io("glitch".into())));
    e.service();
    assert!(e.is_playing(), "I/O errors are not fatal");

    dev.inject(DeviceEvent::Error(DeviceError::Fatal("unplugged".into())));
    e.service();
    assert!(!e.is_playing());
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::AudioDeviceError("Fatal audio error: unplugged".into())));
    assert!(events.contains(&EngineEvent::PlaybackStopped));
}

#[test]
fn device_stop_is_mirrored() {
    let dev = OfflineDevice::new();
    let mut e = Engine::streaming(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    dev.inject(DeviceEvent::Stopped);
    e.service();
    assert!(!e.is_playing());
    assert!(drain(&rx).contains(&EngineEvent::PlaybackStopped));
}

#[test]
fn output_level_is_reported() {
    let dev = OfflineDevice::new();
    let mut e = Engine::streaming(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    dev.pull(800);
    e.service();
    assert!(e.peak_level() > 0.25, "level is pre-gain: {}", e.peak_level());
    assert!(drain(&rx).iter().any(|ev| matches!(ev, EngineEvent::AudioLevelChanged(l) if *l > 0.25)));
}

#[test]
fn volume_clamps_and_reaches_the_device() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.set_volume(2.0).unwrap();
    assert_eq!(e.volume(), 1.0);
    assert!(e.set_volume(f64::NAN).is_err());
    e.start().unwrap();
    assert_eq!(dev.gain(), 1.0);
    e.set_volume(0.25).unwrap();
    assert_eq!(dev.gain(), 0.25);
    let events = drain(&rx);
    assert!(events.contains(&EngineEvent::VolumeChanged(1.0)));
    assert!(events.contains(&EngineEvent::VolumeChanged(0.25)));
}

#[test]
fn forced_regeneration_replaces_the_block() {
    let dev = OfflineDevice::new();
    let mut e = Engine::buffered(config(), dev.clone()).unwrap();
    let rx = observe(&mut e);
    e.start().unwrap();
    e.force_regeneration().unwrap();
    assert_eq!(dev.submissions(), 2);
    assert!(drain(&rx).contains(&EngineEvent::ParametersUpdated));
}

#[test]
fn runtime_strategy_engines_behave_alike() {
    for strategy in [RenderStrategy::Buffered, RenderStrategy::Streaming] {
        let dev = OfflineDevice::new();
        let mut e = Engine::with_strategy(config().with_strategy(strategy), Box::new(dev.clone())).unwrap();
        e.start().unwrap();
        let out = dev.pull(400);
        assert!(out.iter().any(|&s| s != 0), "{strategy} produced silence");
        e.stop();
        assert_eq!(e.current_phases(), (0.0, 0.0));
    }
}
