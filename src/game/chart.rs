use std::fs;
use std::path::Path;

use log::info;

use crate::core::drum::DrumMask;
use crate::game::parsing::{ChartError, invalid, json, renoise};

/// An immutable drum chart: one mask of required drums per step, with the
/// tempo that places steps in time. Step `i` sits at `i * subdivision`
/// seconds from the start of the session.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    bpm: f64,
    lpb: u32,
    time_signature: u32,
    steps: Vec<DrumMask>,
}

impl Chart {
    pub fn new(bpm: f64, lpb: u32, time_signature: u32, steps: Vec<DrumMask>) -> Result<Self, ChartError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(invalid("bpm", bpm, "a positive number"));
        }
        if lpb == 0 {
            return Err(invalid("lpb", lpb, "a positive integer"));
        }
        if time_signature == 0 {
            return Err(invalid("time_signature", time_signature, "a positive integer"));
        }
        Ok(Self {
            bpm,
            lpb,
            time_signature,
            steps,
        })
    }

    /// Loads `.json`, `.xml` (a Renoise `Song.xml`) or `.xrns`.
    pub fn load(path: &Path) -> Result<Self, ChartError> {
        let io_err = |source| ChartError::Io {
            path: path.to_path_buf(),
            source,
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let chart = match ext.as_deref() {
            Some("json") => json::parse(&fs::read_to_string(path).map_err(io_err)?)?,
            Some("xml" | "xrns") => renoise::parse_bytes(&fs::read(path).map_err(io_err)?)?,
            _ => return Err(ChartError::UnsupportedFormat(path.to_path_buf())),
        };
        info!(
            "Loaded chart {:?}: {} steps at {} BPM / {} LPB ({:.1}s).",
            path,
            chart.len(),
            chart.bpm,
            chart.lpb,
            chart.duration_seconds()
        );
        Ok(chart)
    }

    #[inline(always)]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    #[inline(always)]
    pub fn lpb(&self) -> u32 {
        self.lpb
    }

    #[inline(always)]
    pub fn time_signature(&self) -> u32 {
        self.time_signature
    }

    #[inline(always)]
    pub fn steps(&self) -> &[DrumMask] {
        &self.steps
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Seconds per step (one line).
    #[inline(always)]
    pub fn subdivision_seconds(&self) -> f64 {
        60.0 / (self.bpm * self.lpb as f64)
    }

    #[inline(always)]
    pub fn step_time(&self, step: usize) -> f64 {
        step as f64 * self.subdivision_seconds()
    }

    /// Drums required at `step`; nothing past the end.
    #[inline(always)]
    pub fn required(&self, step: usize) -> DrumMask {
        self.steps.get(step).copied().unwrap_or_default()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.step_time(self.steps.len())
    }

    /// Steps whose time lies within `radius` seconds of `time`.
    pub fn steps_near(&self, time: f64, radius: f64) -> std::ops::Range<usize> {
        let sub = self.subdivision_seconds();
        let lo = ((time - radius) / sub).ceil().max(0.0) as usize;
        let hi = (((time + radius) / sub).floor() + 1.0).max(0.0) as usize;
        lo.min(self.steps.len())..hi.min(self.steps.len())
    }
}

#[cfg(test)]
mod tests {
    use super::Chart;
    use crate::core::drum::DrumMask;
    use crate::game::parsing::ChartError;
    use std::fs;

    fn chart(len: usize) -> Chart {
        Chart::new(120.0, 4, 4, vec![DrumMask::KICK; len]).unwrap()
    }

    #[test]
    fn step_times_follow_bpm_and_lpb() {
        let c = chart(16);
        assert!((c.subdivision_seconds() - 0.125).abs() < 1e-12);
        assert!((c.step_time(10) - 1.25).abs() < 1e-12);
        assert!((c.duration_seconds() - 2.0).abs() < 1e-12);
        assert_eq!(c.required(16), DrumMask::empty());
    }

    #[test]
    fn steps_near_covers_inclusive_radius() {
        let c = chart(16);
        assert_eq!(c.steps_near(1.33, 0.125), 10..12);
        assert_eq!(c.steps_near(1.25, 0.125), 9..12);
        assert_eq!(c.steps_near(0.0, 0.125), 0..2);
        assert_eq!(c.steps_near(-1.0, 0.125), 0..0);
        assert_eq!(c.steps_near(10.0, 0.125), 16..16);
    }

    #[test]
    fn rejects_nonsense_tempo() {
        assert!(Chart::new(0.0, 4, 4, Vec::new()).is_err());
        assert!(Chart::new(f64::NAN, 4, 4, Vec::new()).is_err());
        assert!(Chart::new(120.0, 4, 0, Vec::new()).is_err());
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.json");
        fs::write(&path, r#"{"bpm": 90, "lpb": 2, "steps": [1, 2]}"#).unwrap();
        let c = Chart::load(&path).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.bpm(), 90.0);

        let other = dir.path().join("beat.mid");
        fs::write(&other, b"MThd").unwrap();
        assert!(matches!(Chart::load(&other), Err(ChartError::UnsupportedFormat(_))));

        let missing = dir.path().join("gone.json");
        assert!(matches!(Chart::load(&missing), Err(ChartError::Io { .. })));
    }
}
