use dotd::assets::AssetDir;
use dotd::config::{self, Config};
use dotd::core::audio::{AudioEngine, OutputDevice};
use dotd::core::engine::Engine;
use dotd::core::track::TrackProvider;
use dotd::core::waveform::WaveformStore;
use dotd::game::autoplay::Autoplay;
use dotd::game::chart::Chart;
use dotd::game::gameplay::Gameplay;
use dotd::game::judgment::JudgeGrade;
use log::{debug, error, info};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TICK: Duration = Duration::from_micros(4_167);

fn main() -> Result<(), Box<dyn Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let cfg = config::load(Path::new(config::CONFIG_PATH));
    log::set_max_level(cfg.log_level.as_level_filter());

    if let Err(e) = run(&cfg) {
        error!("{e}");
        std::process::exit(1);
    }
    Ok(())
}

/// Plays the configured chart with autoplay input until every step has been
/// scored or the backing tracks run out.
fn run(cfg: &Config) -> Result<(), Box<dyn Error>> {
    let chart = Chart::load(&cfg.chart_path())?;

    let device = OutputDevice::open_default(cfg.sample_rate_hz)?;
    let rate = device.sample_rate();

    let assets = AssetDir::new(&cfg.asset_dir);
    let waveforms = Arc::new(WaveformStore::load(&assets, rate)?);
    let tracks = cfg
        .tracks
        .iter()
        .map(|name| assets.open_track(name, rate))
        .collect::<Result<Vec<_>, _>>()?;

    let engine = Engine::new(waveforms, tracks, rate, &cfg.engine_settings())?;
    let mut output = AudioEngine::new(&device, engine.clone())?;
    let mut game = Gameplay::new(cfg.judge_params(), cfg.global_offset_seconds);
    let mut autoplay = Autoplay::new(cfg.autoplay_jitter_seconds, cfg.rng_seed);

    game.start_session(&mut output, chart.clone())?;
    loop {
        let input = autoplay.poll(&chart, game.music_time(&engine));
        for j in game.tick(&engine, input) {
            if j.grade == JudgeGrade::Miss {
                debug!("{:?} {:?} missed (step {:?}).", j.source, j.drum, j.step);
            }
        }
        if game.is_finished(&engine) {
            break;
        }
        thread::sleep(TICK);
    }
    game.stop_session(&mut output)?;

    info!("Final gauge: {:.3}", game.current_gauge());
    Ok(())
}
