use crate::core::error::{AudioError, AudioResult};
use crate::core::resample::{resample_stereo, to_stereo};
use crate::core::track::{DecodedTrack, TrackDecoder, TrackProvider, decode_ogg};
use crate::core::waveform::{Sample, WaveformProvider};
use log::{debug, info};
use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    time::Instant,
};

/// Resolves named assets below one directory: drum hits as WAV, backing
/// tracks as Ogg Vorbis. Everything is converted to stereo at the requested
/// rate before it is handed out.
#[derive(Clone, Debug)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn open(&self, name: &str) -> AudioResult<BufReader<File>> {
        let path = self.path(name);
        File::open(&path)
            .map(BufReader::new)
            .map_err(|source| AudioError::Io { path, source })
    }
}

// --- Decoding ---

/// Decodes 8/16/24/32-bit integer or 32-bit float WAV into interleaved
/// `f32`. Returns samples, channel count and sample rate.
fn decode_wav<R: std::io::Read>(reader: R, name: &str) -> AudioResult<(Vec<f32>, usize, u32)> {
    let malformed = |e: hound::Error| AudioError::Waveform {
        name: name.to_string(),
        reason: e.to_string(),
    };

    let reader = hound::WavReader::new(reader).map_err(malformed)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(malformed)?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(malformed)?,
    };
    Ok((samples, spec.channels as usize, spec.sample_rate))
}

fn convert(samples: &[f32], channels: usize, in_hz: u32, out_hz: u32) -> AudioResult<Vec<f32>> {
    let stereo = to_stereo(samples, channels);
    resample_stereo(&stereo, in_hz, out_hz)
}

impl WaveformProvider for AssetDir {
    fn load_waveform(&self, name: &str, sample_rate: u32) -> AudioResult<Sample> {
        let (samples, channels, in_hz) = decode_wav(self.open(name)?, name)?;
        if samples.is_empty() || channels == 0 {
            return Err(AudioError::Waveform {
                name: name.to_string(),
                reason: "no audio frames".to_string(),
            });
        }
        let stereo = convert(&samples, channels, in_hz, sample_rate)?;
        debug!(
            "Loaded waveform '{}' ({} ch, {} Hz -> {} Hz, {} frames).",
            name,
            channels,
            in_hz,
            sample_rate,
            stereo.len() / 2
        );
        Ok(Sample::from_interleaved(stereo))
    }
}

impl TrackProvider for AssetDir {
    fn open_track(&self, name: &str, sample_rate: u32) -> AudioResult<Box<dyn TrackDecoder>> {
        let started = Instant::now();
        let (samples, channels, in_hz) = decode_ogg(self.open(name)?, name)?;
        let stereo = convert(&samples, channels, in_hz, sample_rate)?;
        let track = DecodedTrack::new(name, stereo);
        info!(
            "Decoded track '{}' ({:.1}s at {} Hz) in {:?}.",
            name,
            track.frames() as f64 / sample_rate.max(1) as f64,
            sample_rate,
            started.elapsed()
        );
        Ok(Box::new(track))
    }
}
