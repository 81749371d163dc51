use log::{debug, info, warn};

use crate::core::audio::OutputSession;
use crate::core::channel::Feedback;
use crate::core::drum::DrumMask;
use crate::core::engine::Engine;
use crate::core::error::AudioResult;
use crate::game::chart::Chart;
use crate::game::judgment::{JudgeParams, JudgeStats, Judge, Judgment};
use crate::game::life::GAUGE_FULL;

/// Control-thread side of a session: feeds input to the engine, turns
/// engine feedback into plays and keeps the judge up to date.
pub struct Gameplay {
    params: JudgeParams,
    global_offset_s: f64,
    judge: Option<Judge>,
    feedback: Vec<Feedback>,
    judgments: Vec<Judgment>,
}

impl Gameplay {
    pub fn new(params: JudgeParams, global_offset_s: f64) -> Self {
        Self {
            params,
            global_offset_s,
            judge: None,
            feedback: Vec::with_capacity(256),
            judgments: Vec::new(),
        }
    }

    /// Starts scoring `chart` from position 0. Resets the output's engine and
    /// starts it.
    pub fn start_session<O: OutputSession + ?Sized>(&mut self, output: &mut O, chart: Chart) -> AudioResult<()> {
        info!(
            "Starting session: {} steps, {:.3}s per step, offset {:+.3}s.",
            chart.len(),
            chart.subdivision_seconds(),
            self.global_offset_s
        );
        self.judge = Some(Judge::new(chart, self.params.clone()));
        self.feedback.clear();
        self.judgments.clear();
        output.start_session()
    }

    pub fn stop_session<O: OutputSession + ?Sized>(&mut self, output: &mut O) -> AudioResult<()> {
        output.stop_session()?;
        if let Some(judge) = &self.judge {
            let stats = judge.stats();
            info!(
                "Session over: gauge {:.3}, plays {}/{}/{} (good/off/miss), steps {}/{}/{}.",
                judge.gauge(),
                stats.prospective.good,
                stats.prospective.off,
                stats.prospective.miss,
                stats.retroactive.good,
                stats.retroactive.off,
                stats.retroactive.miss
            );
        }
        Ok(())
    }

    /// One game-loop tick: submit `input`, drain feedback, judge. Returns
    /// the judgments made during this tick.
    pub fn tick(&mut self, engine: &Engine, input: DrumMask) -> &[Judgment] {
        self.judgments.clear();
        let Some(judge) = self.judge.as_mut() else {
            return &self.judgments;
        };

        if !engine.submit_triggers(input) {
            warn!("Trigger ring full; dropped {:?}.", input);
        }

        // Position before draining: a block finishing in between is judged next tick.
        let now = engine.position_to_seconds(engine.current_position()) + self.global_offset_s;
        self.feedback.clear();
        engine.poll_feedback_into(&mut self.feedback);
        for record in self.feedback.iter().filter(|r| !r.mask.is_empty()) {
            let time = engine.position_to_seconds(record.position) + self.global_offset_s;
            for drum in record.mask.drums() {
                self.judgments.push(judge.register_play(time, drum));
            }
        }

        judge.update(now, &mut self.judgments);
        if !self.judgments.is_empty() {
            debug!("{} judgments at {:.3}s, gauge {:.4}.", self.judgments.len(), now, judge.gauge());
        }
        &self.judgments
    }

    /// Seconds since step 0, including the global offset.
    pub fn music_time(&self, engine: &Engine) -> f64 {
        engine.position_to_seconds(engine.current_position()) + self.global_offset_s
    }

    pub fn current_gauge(&self) -> f64 {
        self.judge.as_ref().map_or(GAUGE_FULL, Judge::gauge)
    }

    pub fn stats(&self) -> JudgeStats {
        self.judge.as_ref().map(Judge::stats).unwrap_or_default()
    }

    /// Every step has been scored, or every backing track has run out.
    pub fn is_finished(&self, engine: &Engine) -> bool {
        engine.tracks_finished() || self.judge.as_ref().is_some_and(Judge::is_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::Gameplay;
    use crate::core::audio::{OfflineOutput, OutputSession};
    use crate::core::drum::DrumMask;
    use crate::core::engine::{Engine, EngineSettings};
    use crate::core::waveform::{Sample, WaveformStore};
    use crate::game::chart::Chart;
    use crate::game::judgment::{JudgeGrade, JudgeParams, JudgmentSource};
    use std::sync::Arc;

    // 400 Hz with 10-frame blocks: one block is 25 ms.
    fn output() -> OfflineOutput {
        let group = |v: f32| vec![Sample::from_interleaved(vec![v; 8])];
        let store = WaveformStore::from_variants([group(0.1), group(0.2), group(0.3), group(0.4)]).unwrap();
        let settings = EngineSettings {
            block_frames: 10,
            ..EngineSettings::default()
        };
        OfflineOutput::new(Engine::new(Arc::new(store), Vec::new(), 400, &settings).unwrap())
    }

    #[test]
    fn tick_without_session_is_inert() {
        let out = output();
        let mut game = Gameplay::new(JudgeParams::default(), 0.0);
        assert!(game.tick(out.engine(), DrumMask::KICK).is_empty());
        assert_eq!(game.current_gauge(), 1.0);
    }

    #[test]
    fn plays_are_timestamped_by_their_feedback_block() {
        let mut out = output();
        let mut steps = vec![DrumMask::empty(); 8];
        steps[1] = DrumMask::KICK;
        let chart = Chart::new(120.0, 4, 4, steps).unwrap();
        let mut game = Gameplay::new(JudgeParams::default(), 0.0);
        game.start_session(&mut out, chart).unwrap();

        // Five blocks (0.125 s) of silence, then a kick in block 5.
        out.render(50);
        assert!(game.tick(out.engine(), DrumMask::KICK).is_empty());
        out.render(10);
        let judged = game.tick(out.engine(), DrumMask::empty()).to_vec();

        let play = judged
            .iter()
            .find(|j| j.source == JudgmentSource::Prospective)
            .unwrap();
        assert_eq!(play.step, Some(1));
        assert!(play.time_error_s.unwrap().abs() < 1e-9, "kick sounded at 0.125s");
        assert!((game.music_time(out.engine()) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn play_rendered_past_its_deadline_is_matched_in_the_same_tick() {
        let mut out = output();
        let mut steps = vec![DrumMask::empty(); 8];
        steps[1] = DrumMask::KICK;
        let chart = Chart::new(120.0, 4, 4, steps).unwrap();
        let mut game = Gameplay::new(JudgeParams::default(), 0.0);
        game.start_session(&mut out, chart).unwrap();

        out.render(50);
        game.tick(out.engine(), DrumMask::KICK);
        // The kick lands at 0.125 s and the same render crosses the 0.25 s deadline.
        out.render(60);
        let judged = game.tick(out.engine(), DrumMask::empty()).to_vec();

        let step = judged
            .iter()
            .find(|j| j.source == JudgmentSource::Retroactive && j.step == Some(1))
            .unwrap();
        assert_eq!(step.grade, JudgeGrade::Good, "{step:?}");
        assert!(step.time_error_s.unwrap().abs() < 1e-9);
    }

    #[test]
    fn restart_restores_full_gauge() {
        let mut out = output();
        let chart = Chart::new(120.0, 4, 4, vec![DrumMask::SNARE; 8]).unwrap();
        let mut game = Gameplay::new(JudgeParams::default(), 0.0);
        game.start_session(&mut out, chart.clone()).unwrap();
        out.render(400);
        game.tick(out.engine(), DrumMask::empty());
        assert!(game.current_gauge() < 1.0);
        assert!(game.is_finished(out.engine()));

        game.stop_session(&mut out).unwrap();
        game.start_session(&mut out, chart).unwrap();
        assert_eq!(game.current_gauge(), 1.0);
        assert_eq!(out.engine().current_position(), 0);
    }
}
