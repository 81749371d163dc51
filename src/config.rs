use crate::core::engine::EngineSettings;
use crate::game::judgment::JudgeParams;
use ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_PATH: &str = "dotd.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub asset_dir: PathBuf,
    /// Chart file; relative paths resolve against `asset_dir`.
    pub chart: PathBuf,
    /// Backing track asset names, mixed in this order.
    pub tracks: Vec<String>,
    pub global_offset_seconds: f64,

    pub block_frames: usize,
    /// `None` = device default.
    pub sample_rate_hz: Option<u32>,
    pub rng_seed: u64,
    pub trigger_capacity: usize,
    pub feedback_capacity: usize,

    pub good_threshold: f64,
    pub penalty_scale: f64,
    pub play_cost: f64,
    pub played_note_capacity: usize,
    pub autoplay_jitter_seconds: f64,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineSettings::default();
        let judge = JudgeParams::default();
        Self {
            log_level: LogLevel::Info,
            asset_dir: PathBuf::from("assets"),
            chart: PathBuf::from("song.xml"),
            tracks: Vec::new(),
            global_offset_seconds: 0.0,
            block_frames: engine.block_frames,
            sample_rate_hz: None,
            rng_seed: engine.rng_seed,
            trigger_capacity: engine.trigger_capacity,
            feedback_capacity: engine.feedback_capacity,
            good_threshold: judge.good_threshold,
            penalty_scale: judge.penalty_scale,
            play_cost: judge.play_cost,
            played_note_capacity: judge.played_note_capacity,
            autoplay_jitter_seconds: 0.0,
        }
    }
}

impl Config {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            block_frames: self.block_frames,
            rng_seed: self.rng_seed,
            trigger_capacity: self.trigger_capacity,
            feedback_capacity: self.feedback_capacity,
        }
    }

    pub fn judge_params(&self) -> JudgeParams {
        JudgeParams {
            good_threshold: self.good_threshold,
            penalty_scale: self.penalty_scale,
            play_cost: self.play_cost,
            played_note_capacity: self.played_note_capacity,
        }
    }

    pub fn chart_path(&self) -> PathBuf {
        if self.chart.is_absolute() {
            self.chart.clone()
        } else {
            self.asset_dir.join(&self.chart)
        }
    }
}

// --- File I/O ---

const OPTIONS: &str = "Options";
const AUDIO: &str = "Audio";
const JUDGE: &str = "Judge";

const KEYS: &[(&str, &str)] = &[
    (OPTIONS, "AssetDir"),
    (OPTIONS, "Chart"),
    (OPTIONS, "GlobalOffsetSeconds"),
    (OPTIONS, "LogLevel"),
    (OPTIONS, "Tracks"),
    (AUDIO, "BlockFrames"),
    (AUDIO, "FeedbackCapacity"),
    (AUDIO, "RngSeed"),
    (AUDIO, "SampleRateHz"),
    (AUDIO, "TriggerCapacity"),
    (JUDGE, "AutoplayJitterSeconds"),
    (JUDGE, "GoodThreshold"),
    (JUDGE, "PenaltyScale"),
    (JUDGE, "PlayCost"),
    (JUDGE, "PlayedNoteCapacity"),
];

fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    // Keys in alphabetical order within each section.
    conf.with_section(Some(OPTIONS))
        .set("AssetDir", cfg.asset_dir.to_string_lossy())
        .set("Chart", cfg.chart.to_string_lossy())
        .set("GlobalOffsetSeconds", cfg.global_offset_seconds.to_string())
        .set("LogLevel", cfg.log_level.as_str())
        .set("Tracks", cfg.tracks.join(","));
    conf.with_section(Some(AUDIO))
        .set("BlockFrames", cfg.block_frames.to_string())
        .set("FeedbackCapacity", cfg.feedback_capacity.to_string())
        .set("RngSeed", cfg.rng_seed.to_string())
        .set(
            "SampleRateHz",
            cfg.sample_rate_hz.map_or_else(|| "Auto".to_string(), |hz| hz.to_string()),
        )
        .set("TriggerCapacity", cfg.trigger_capacity.to_string());
    conf.with_section(Some(JUDGE))
        .set("AutoplayJitterSeconds", cfg.autoplay_jitter_seconds.to_string())
        .set("GoodThreshold", cfg.good_threshold.to_string())
        .set("PenaltyScale", cfg.penalty_scale.to_string())
        .set("PlayCost", cfg.play_cost.to_string())
        .set("PlayedNoteCapacity", cfg.played_note_capacity.to_string());
    conf
}

pub fn save(cfg: &Config, path: &Path) -> Result<(), std::io::Error> {
    to_ini(cfg).write_to_file(path)
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    save(&Config::default(), path)
}

/// Parses `section.key`, keeping `default` (with a warning) when the value
/// is present but unusable.
fn value<T: FromStr>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    let Some(raw) = conf.get_from(Some(section), key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("Invalid value '{raw}' for {section}.{key}; using default.");
        default
    })
}

fn positive(v: usize, key: &str, default: usize) -> usize {
    if v == 0 {
        warn!("{key} must be positive; using {default}.");
        default
    } else {
        v
    }
}

fn unit_interval(v: f64, key: &str, default: f64) -> f64 {
    if (0.0..=1.0).contains(&v) {
        v
    } else {
        warn!("{key}={v} is outside [0, 1]; using {default}.");
        default
    }
}

fn non_negative(v: f64, key: &str, default: f64) -> f64 {
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        warn!("{key}={v} must be a non-negative number; using {default}.");
        default
    }
}

fn from_ini(conf: &Ini) -> Config {
    let d = Config::default();

    let sample_rate_hz = conf
        .get_from(Some(AUDIO), "SampleRateHz")
        .map(str::trim)
        .and_then(|v| {
            if v.eq_ignore_ascii_case("auto") || v.is_empty() {
                None
            } else {
                v.parse::<u32>().ok().filter(|&hz| hz > 0)
            }
        })
        .or(d.sample_rate_hz);

    let tracks = conf
        .get_from(Some(OPTIONS), "Tracks")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let global_offset_seconds = value(conf, OPTIONS, "GlobalOffsetSeconds", d.global_offset_seconds);

    Config {
        log_level: value(conf, OPTIONS, "LogLevel", d.log_level),
        asset_dir: conf
            .get_from(Some(OPTIONS), "AssetDir")
            .map(|v| PathBuf::from(v.trim()))
            .unwrap_or(d.asset_dir),
        chart: conf
            .get_from(Some(OPTIONS), "Chart")
            .map(|v| PathBuf::from(v.trim()))
            .unwrap_or(d.chart),
        tracks,
        global_offset_seconds: if global_offset_seconds.is_finite() {
            global_offset_seconds
        } else {
            d.global_offset_seconds
        },
        block_frames: positive(value(conf, AUDIO, "BlockFrames", d.block_frames), "BlockFrames", d.block_frames),
        sample_rate_hz,
        rng_seed: value(conf, AUDIO, "RngSeed", d.rng_seed),
        trigger_capacity: positive(
            value(conf, AUDIO, "TriggerCapacity", d.trigger_capacity),
            "TriggerCapacity",
            d.trigger_capacity,
        ),
        feedback_capacity: positive(
            value(conf, AUDIO, "FeedbackCapacity", d.feedback_capacity),
            "FeedbackCapacity",
            d.feedback_capacity,
        ),
        good_threshold: unit_interval(
            value(conf, JUDGE, "GoodThreshold", d.good_threshold),
            "GoodThreshold",
            d.good_threshold,
        ),
        penalty_scale: non_negative(
            value(conf, JUDGE, "PenaltyScale", d.penalty_scale),
            "PenaltyScale",
            d.penalty_scale,
        ),
        play_cost: non_negative(value(conf, JUDGE, "PlayCost", d.play_cost), "PlayCost", d.play_cost),
        played_note_capacity: positive(
            value(conf, JUDGE, "PlayedNoteCapacity", d.played_note_capacity),
            "PlayedNoteCapacity",
            d.played_note_capacity,
        ),
        autoplay_jitter_seconds: non_negative(
            value(conf, JUDGE, "AutoplayJitterSeconds", d.autoplay_jitter_seconds),
            "AutoplayJitterSeconds",
            d.autoplay_jitter_seconds,
        ),
    }
}

/// Reads the config at `path`, creating it with defaults if it does not
/// exist. Missing keys are filled in and written back. Never fails: any
/// problem falls back to defaults with a warning.
pub fn load(path: &Path) -> Config {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    let conf = match Ini::load_from_file(path) {
        Ok(conf) => conf,
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using defaults.", path.display());
            return Config::default();
        }
    };

    let cfg = from_ini(&conf);
    info!("Configuration loaded from '{}'.", path.display());

    let missing = KEYS
        .iter()
        .any(|(section, key)| conf.get_from(Some(*section), key).is_none());
    if missing {
        info!("Adding missing keys to '{}'.", path.display());
        if let Err(e) = save(&cfg, path) {
            warn!("Failed to update config file: {e}");
        }
    }
    cfg
}
