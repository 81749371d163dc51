use log::trace;

use crate::core::drum::Drum;
use crate::game::chart::Chart;
use crate::game::life::{Gauge, PENALTY_SCALE, PLAY_COST, penalty};
use crate::game::timing_windows::{
    GOOD_THRESHOLD, LOOKBACK_SUBDIVISIONS, SEARCH_RADIUS_SUBDIVISIONS, normalized_delta,
};

pub const PLAYED_NOTE_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct JudgeParams {
    /// Normalized delta below which a play counts as good.
    pub good_threshold: f64,
    pub penalty_scale: f64,
    pub play_cost: f64,
    pub played_note_capacity: usize,
}

impl Default for JudgeParams {
    fn default() -> Self {
        Self {
            good_threshold: GOOD_THRESHOLD,
            penalty_scale: PENALTY_SCALE,
            play_cost: PLAY_COST,
            played_note_capacity: PLAYED_NOTE_CAPACITY,
        }
    }
}

/// A drum that actually sounded, in music time (seconds from step 0).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlayedNote {
    pub time: f64,
    pub drum: Drum,
}

/// Fixed-capacity log of recent plays. A new play always evicts the entry
/// with the smallest timestamp; empty slots go first.
#[derive(Clone, Debug)]
pub struct PlayedNoteLog {
    slots: Box<[Option<PlayedNote>]>,
}

impl PlayedNoteLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)].into_boxed_slice(),
        }
    }

    pub fn insert(&mut self, note: PlayedNote) {
        let mut victim = 0;
        let mut oldest = f64::INFINITY;
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(n) = slot else {
                victim = i;
                break;
            };
            if n.time < oldest {
                oldest = n.time;
                victim = i;
            }
        }
        self.slots[victim] = Some(note);
    }

    /// The logged play of `drum` nearest to `time`, if any.
    pub fn closest(&self, drum: Drum, time: f64) -> Option<PlayedNote> {
        let mut best: Option<(PlayedNote, f64)> = None;
        for note in self.iter().filter(|n| n.drum == drum) {
            let err = (note.time - time).abs();
            match best {
                Some((_, best_err)) if err >= best_err => {}
                _ => best = Some((*note, err)),
            }
        }
        best.map(|(n, _)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayedNote> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum JudgmentSource {
    /// A chart step whose deadline passed, scored against the log.
    Retroactive,
    /// A play, scored against the nearby chart steps.
    Prospective,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JudgeGrade {
    Good,
    Off,
    Miss,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Judgment {
    pub source: JudgmentSource,
    pub drum: Drum,
    /// Chart step involved; `None` for a play with nothing to match.
    pub step: Option<usize>,
    /// Signed play time minus step time, in seconds.
    pub time_error_s: Option<f64>,
    pub normalized_delta: f64,
    pub grade: JudgeGrade,
    /// Change actually applied to the gauge, after clamping.
    pub gauge_delta: f64,
    pub gauge: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GradeCounts {
    pub good: u32,
    pub off: u32,
    pub miss: u32,
}

impl GradeCounts {
    fn record(&mut self, grade: JudgeGrade) {
        match grade {
            JudgeGrade::Good => self.good += 1,
            JudgeGrade::Off => self.off += 1,
            JudgeGrade::Miss => self.miss += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JudgeStats {
    pub retroactive: GradeCounts,
    pub prospective: GradeCounts,
}

/// Scores plays against a chart and keeps the gauge.
///
/// Every play is judged once when it arrives (prospective pass) and every
/// required drum of every step is judged once after the step's deadline
/// (retroactive pass). The two passes are independent; a good play near a
/// required step moves the gauge twice.
pub struct Judge {
    chart: Chart,
    params: JudgeParams,
    log: PlayedNoteLog,
    next_step: usize,
    gauge: Gauge,
    stats: JudgeStats,
}

impl Judge {
    pub fn new(chart: Chart, params: JudgeParams) -> Self {
        let log = PlayedNoteLog::with_capacity(params.played_note_capacity);
        Self {
            chart,
            params,
            log,
            next_step: 0,
            gauge: Gauge::default(),
            stats: JudgeStats::default(),
        }
    }

    pub fn reset(&mut self) {
        self.log.clear();
        self.next_step = 0;
        self.gauge.reset();
        self.stats = JudgeStats::default();
    }

    #[inline(always)]
    pub fn gauge(&self) -> f64 {
        self.gauge.value()
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn stats(&self) -> JudgeStats {
        self.stats
    }

    pub fn played_notes(&self) -> &PlayedNoteLog {
        &self.log
    }

    /// Index of the first step the retroactive pass has not scored yet.
    pub fn next_step(&self) -> usize {
        self.next_step
    }

    /// True once every step has been scored.
    pub fn is_complete(&self) -> bool {
        self.next_step >= self.chart.len()
    }

    fn grade(&self, matched: bool, d: f64) -> JudgeGrade {
        if !matched {
            JudgeGrade::Miss
        } else if d < self.params.good_threshold {
            JudgeGrade::Good
        } else {
            JudgeGrade::Off
        }
    }

    /// Logs a play and judges it against the chart steps within one
    /// subdivision. The nearest step requiring `drum` wins.
    pub fn register_play(&mut self, time: f64, drum: Drum) -> Judgment {
        let sub = self.chart.subdivision_seconds();
        let radius = SEARCH_RADIUS_SUBDIVISIONS * sub;

        let mut best: Option<(usize, f64)> = None;
        for step in self.chart.steps_near(time, radius) {
            if !self.chart.required(step).contains(drum.mask()) {
                continue;
            }
            let err = time - self.chart.step_time(step);
            if err.abs() > radius {
                continue;
            }
            match best {
                Some((_, best_err)) if err.abs() >= best_err.abs() => {}
                _ => best = Some((step, err)),
            }
        }

        let d = normalized_delta(best.map(|(_, e)| e), sub);
        let change = penalty(d, self.params.good_threshold, self.params.penalty_scale) - self.params.play_cost;
        let applied = self.gauge.apply(change);
        self.log.insert(PlayedNote { time, drum });

        let judgment = Judgment {
            source: JudgmentSource::Prospective,
            drum,
            step: best.map(|(s, _)| s),
            time_error_s: best.map(|(_, e)| e),
            normalized_delta: d,
            grade: self.grade(best.is_some(), d),
            gauge_delta: applied,
            gauge: self.gauge.value(),
        };
        self.stats.prospective.record(judgment.grade);
        trace!(
            "Play {:?} at {:.4}s: step {:?}, d={:.3}, gauge {:.4}",
            drum, time, judgment.step, d, judgment.gauge
        );
        judgment
    }

    /// Scores every step whose deadline (step time plus one subdivision) is
    /// at or before `now`. Steps are never revisited.
    pub fn update(&mut self, now: f64, out: &mut Vec<Judgment>) {
        let sub = self.chart.subdivision_seconds();
        let lookback = LOOKBACK_SUBDIVISIONS * sub;

        while self.next_step < self.chart.len() {
            let step = self.next_step;
            let step_time = self.chart.step_time(step);
            if step_time + lookback > now {
                break;
            }
            for drum in self.chart.required(step).drums() {
                let closest = self.log.closest(drum, step_time);
                let err = closest.map(|n| n.time - step_time);
                let d = normalized_delta(err, sub);
                let change = penalty(d, self.params.good_threshold, self.params.penalty_scale);
                let applied = self.gauge.apply(change);

                let judgment = Judgment {
                    source: JudgmentSource::Retroactive,
                    drum,
                    step: Some(step),
                    time_error_s: err,
                    normalized_delta: d,
                    grade: self.grade(err.is_some_and(|e| e.abs() <= sub), d),
                    gauge_delta: applied,
                    gauge: self.gauge.value(),
                };
                self.stats.retroactive.record(judgment.grade);
                trace!(
                    "Step {} {:?}: closest {:?}, d={:.3}, gauge {:.4}",
                    step, drum, err, d, judgment.gauge
                );
                out.push(judgment);
            }
            self.next_step += 1;
        }
    }
}
