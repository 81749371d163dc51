use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, OutputCallbackInfo, SampleFormat, SizedSample, StreamConfig};
use log::{error, info, warn};

use crate::core::engine::{Engine, Renderer};
use crate::core::error::{AudioError, AudioResult};

/* ============================== Public API ============================== */

/// Something that can run an [`Engine`] session: the real device, or an
/// offline driver that renders on demand.
pub trait OutputSession {
    fn engine(&self) -> &Engine;

    /// Pauses output, resets every piece of session state and starts
    /// output again from position 0.
    fn start_session(&mut self) -> AudioResult<()>;

    fn stop_session(&mut self) -> AudioResult<()>;

    fn is_playing(&self) -> bool;
}

/// The default output device and the stream config the engine will run at.
pub struct OutputDevice {
    device: cpal::Device,
    config: StreamConfig,
    format: SampleFormat,
    name: String,
}

impl OutputDevice {
    /// Opens the host's default output device. With `sample_rate` set, a
    /// supported config at that rate is preferred over the device default.
    pub fn open_default(sample_rate: Option<u32>) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let default = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        let mut supported = default.clone();

        if let Some(rate) = sample_rate.filter(|&r| r != default.sample_rate().0) {
            let matching = device
                .supported_output_configs()
                .map_err(|e| AudioError::Config(e.to_string()))?
                .filter(|range| range.min_sample_rate().0 <= rate && rate <= range.max_sample_rate().0)
                .min_by_key(|range| {
                    (
                        range.channels() != default.channels(),
                        range.sample_format() != default.sample_format(),
                    )
                });
            match matching {
                Some(range) => supported = range.with_sample_rate(cpal::SampleRate(rate)),
                None => warn!(
                    "Device '{}' does not support {} Hz; using {} Hz.",
                    name,
                    rate,
                    default.sample_rate().0
                ),
            }
        }

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        info!(
            "Opened output device '{}' ({} Hz, {} ch, {:?}).",
            name, config.sample_rate.0, config.channels, format
        );
        Ok(Self {
            device,
            config,
            format,
            name,
        })
    }

    #[inline(always)]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    #[inline(always)]
    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Engine bound to a live cpal stream.
pub struct AudioEngine {
    engine: Engine,
    stream: cpal::Stream,
    playing: bool,
}

impl AudioEngine {
    /// Builds the output stream around `engine`. The stream is left paused;
    /// nothing sounds until [`OutputSession::start_session`].
    pub fn new(device: &OutputDevice, engine: Engine) -> AudioResult<Self> {
        if engine.sample_rate() != device.sample_rate() {
            return Err(AudioError::Config(format!(
                "engine runs at {} Hz but device '{}' at {} Hz",
                engine.sample_rate(),
                device.name(),
                device.sample_rate()
            )));
        }

        let renderer = engine.renderer();
        let stream = match device.format {
            SampleFormat::F32 => build_stream::<f32>(device, renderer),
            SampleFormat::I16 => build_stream::<i16>(device, renderer),
            SampleFormat::U16 => build_stream::<u16>(device, renderer),
            other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        // Some backends start streams on creation.
        if let Err(e) = stream.pause() {
            warn!("Could not pause freshly built stream: {}", e);
        }

        Ok(Self {
            engine,
            stream,
            playing: false,
        })
    }
}

impl OutputSession for AudioEngine {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn start_session(&mut self) -> AudioResult<()> {
        if self.playing {
            self.stop_session()?;
        }
        self.engine.reset();
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        self.playing = true;
        info!("Session started.");
        Ok(())
    }

    fn stop_session(&mut self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPause(e.to_string()))?;
        if self.playing {
            info!(
                "Session stopped at frame {} ({} dropped triggers, {} overwritten feedback records).",
                self.engine.current_position(),
                self.engine.dropped_triggers(),
                self.engine.overwritten_feedback()
            );
        }
        self.engine.clear_channels();
        self.playing = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/// Drives the engine without a device: each [`OfflineOutput::render`] call
/// stands in for one device callback.
pub struct OfflineOutput {
    engine: Engine,
    renderer: Renderer,
    buffer: Vec<f32>,
    playing: bool,
}

impl OfflineOutput {
    pub fn new(engine: Engine) -> Self {
        let renderer = engine.renderer();
        Self {
            engine,
            renderer,
            buffer: Vec::new(),
            playing: false,
        }
    }

    /// Renders `frames` stereo frames if a session is running and returns
    /// them. Returns an empty slice while stopped, like a paused device.
    pub fn render(&mut self, frames: usize) -> &[f32] {
        if !self.playing {
            return &[];
        }
        self.buffer.resize(frames * 2, 0.0);
        self.renderer.render_stereo(&mut self.buffer);
        &self.buffer
    }
}

impl OutputSession for OfflineOutput {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn start_session(&mut self) -> AudioResult<()> {
        self.playing = false;
        self.engine.reset();
        self.playing = true;
        Ok(())
    }

    fn stop_session(&mut self) -> AudioResult<()> {
        self.playing = false;
        self.engine.clear_channels();
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

/* ============================ Engine internals ============================ */

fn build_stream<T>(device: &OutputDevice, mut renderer: Renderer) -> AudioResult<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = device.channels();
    device
        .device
        .build_output_stream(
            &device.config,
            move |out: &mut [T], _: &OutputCallbackInfo| renderer.render(out, channels),
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}
