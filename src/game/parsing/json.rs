//! Plain JSON charts: `{ "bpm": 120, "lpb": 4, "time_signature": 4, "steps": [1, 0, 6, ...] }`.
//! Each step is a drum bitmask; unknown bits are dropped.

use serde::Deserialize;

use crate::core::drum::DrumMask;
use crate::game::chart::Chart;
use crate::game::parsing::ChartError;

#[derive(Deserialize, Debug)]
struct ChartFile {
    bpm: f64,
    lpb: u32,
    #[serde(default = "default_time_signature")]
    time_signature: u32,
    steps: Vec<u32>,
}

fn default_time_signature() -> u32 {
    4
}

pub fn parse(text: &str) -> Result<Chart, ChartError> {
    let file: ChartFile = serde_json::from_str(text)?;
    let steps = file.steps.into_iter().map(DrumMask::from_bits_truncate).collect();
    Chart::new(file.bpm, file.lpb, file.time_signature, steps)
}
