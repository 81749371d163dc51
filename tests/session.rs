//! Full control loop against an offline output: autoplay input, engine
//! feedback, both judging passes.

use std::sync::Arc;

use dotd::core::audio::{OfflineOutput, OutputSession};
use dotd::core::drum::{Drum, DrumMask};
use dotd::core::engine::{Engine, EngineSettings};
use dotd::core::track::{DecodedTrack, TrackDecoder};
use dotd::core::waveform::{Sample, WaveformStore};
use dotd::game::autoplay::Autoplay;
use dotd::game::chart::Chart;
use dotd::game::gameplay::Gameplay;
use dotd::game::judgment::{JudgeGrade, JudgeParams, JudgmentSource};

const RATE: u32 = 8_000;
const BLOCK: usize = 64;

fn store() -> Arc<WaveformStore> {
    let group = |v: f32| -> Vec<Sample> {
        (0..3)
            .map(|n| Sample::from_interleaved(vec![v + n as f32 * 0.01; 400 * 2]))
            .collect()
    };
    Arc::new(WaveformStore::from_variants([group(0.1), group(0.2), group(0.3), group(0.4)]).unwrap())
}

fn output(tracks: Vec<Box<dyn TrackDecoder>>, settings: EngineSettings) -> OfflineOutput {
    OfflineOutput::new(Engine::new(store(), tracks, RATE, &settings).unwrap())
}

fn settings() -> EngineSettings {
    EngineSettings {
        block_frames: BLOCK,
        rng_seed: 5,
        ..EngineSettings::default()
    }
}

fn groove(steps: usize) -> Chart {
    let pattern = [
        DrumMask::KICK | DrumMask::CLOSED_HAT,
        DrumMask::empty(),
        DrumMask::SNARE | DrumMask::CLOSED_HAT,
        DrumMask::OPEN_HAT,
    ];
    Chart::new(120.0, 4, 4, pattern.iter().copied().cycle().take(steps).collect()).unwrap()
}

#[test]
fn autoplay_keeps_the_gauge_full() {
    let chart = groove(32);
    let required: usize = chart.steps().iter().map(|m| m.drums().count()).sum();

    let mut out = output(Vec::new(), settings());
    let mut game = Gameplay::new(JudgeParams::default(), 0.0);
    let mut autoplay = Autoplay::new(0.0, 0);
    game.start_session(&mut out, chart.clone()).unwrap();

    let mut judged = Vec::new();
    while !game.is_finished(out.engine()) {
        let input = autoplay.poll(&chart, game.music_time(out.engine()));
        judged.extend(game.tick(out.engine(), input).iter().cloned());
        out.render(BLOCK);
    }

    let stats = game.stats();
    assert_eq!(stats.retroactive.good as usize, required, "every required drum was hit");
    assert_eq!(stats.retroactive.miss, 0);
    assert_eq!(stats.prospective.miss, 0);
    assert!(game.current_gauge() > 0.999, "gauge {}", game.current_gauge());
    for j in &judged {
        assert!(
            j.time_error_s.unwrap().abs() <= BLOCK as f64 / RATE as f64 + 1e-9,
            "{:?} {:?} off by {:?}",
            j.source,
            j.drum,
            j.time_error_s
        );
    }
    assert_eq!(out.engine().overwritten_feedback(), 0);
}

#[test]
fn silence_drains_the_gauge_to_zero() {
    let chart = groove(64);
    let mut out = output(Vec::new(), settings());
    let mut game = Gameplay::new(JudgeParams::default(), 0.0);
    game.start_session(&mut out, chart).unwrap();

    let mut last = game.current_gauge();
    while !game.is_finished(out.engine()) {
        for j in game.tick(out.engine(), DrumMask::empty()) {
            assert_eq!(j.source, JudgmentSource::Retroactive);
            assert_eq!(j.grade, JudgeGrade::Miss);
            assert!(j.gauge <= last);
            last = j.gauge;
        }
        out.render(BLOCK);
    }
    assert_eq!(game.current_gauge(), 0.0);
}

#[test]
fn open_hat_is_choked_across_blocks() {
    let mut out = output(Vec::new(), settings());
    out.start_session().unwrap();
    let engine = out.engine().clone();

    engine.submit_triggers(DrumMask::OPEN_HAT);
    let first = out.render(BLOCK).to_vec();
    assert!(first.iter().all(|&s| (0.39..0.43).contains(&s)));

    engine.submit_triggers(DrumMask::CLOSED_HAT);
    let second = out.render(BLOCK).to_vec();
    assert!(
        second.iter().all(|&s| (0.29..0.33).contains(&s)),
        "only the closed hat may sound after the choke"
    );

    let masks: Vec<DrumMask> = engine.poll_feedback().iter().map(|f| f.mask).collect();
    assert_eq!(masks, vec![Drum::OpenHat.mask(), Drum::ClosedHat.mask()]);
}

#[test]
fn tracks_end_the_session_and_restart_rewinds_them() {
    let bass: Box<dyn TrackDecoder> = Box::new(DecodedTrack::new("bass", vec![0.05; BLOCK * 3 * 2]));
    let mut out = output(vec![bass], settings());
    let chart = groove(512);
    let mut game = Gameplay::new(JudgeParams::default(), 0.0);
    game.start_session(&mut out, chart.clone()).unwrap();

    let mut blocks = 0;
    while !game.is_finished(out.engine()) {
        game.tick(out.engine(), DrumMask::empty());
        out.render(BLOCK);
        blocks += 1;
        assert!(blocks < 10, "track end must finish the session");
    }
    assert_eq!(out.engine().exhausted_tracks(), 1);

    game.start_session(&mut out, chart).unwrap();
    assert!(!game.is_finished(out.engine()));
    assert_eq!(out.render(BLOCK)[0], 0.05);
}

#[test]
fn channel_overflow_is_counted_not_fatal() {
    let small = EngineSettings {
        trigger_capacity: 2,
        feedback_capacity: 4,
        ..settings()
    };
    let mut out = output(Vec::new(), small);
    out.start_session().unwrap();
    let engine = out.engine().clone();

    assert!(engine.submit_triggers(DrumMask::KICK));
    assert!(engine.submit_triggers(DrumMask::SNARE));
    assert!(!engine.submit_triggers(DrumMask::OPEN_HAT));
    assert_eq!(engine.dropped_triggers(), 1);

    for _ in 0..6 {
        out.render(BLOCK);
    }
    let fb = engine.poll_feedback();
    assert_eq!(fb.len(), 4);
    assert_eq!(engine.overwritten_feedback(), 2);
    assert_eq!(fb[0].position, 2 * BLOCK as u64, "oldest records were overwritten");
    assert_eq!(engine.current_position(), 6 * BLOCK as u64);
}
