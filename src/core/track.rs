//! Backing tracks (bass, guitar, ...) streamed block by block into the mix.

use std::io::{Read, Seek};
use std::sync::Arc;

use lewton::inside_ogg::OggStreamReader;

use crate::core::error::{AudioError, AudioResult};

/// A stereo block source driven from the audio callback.
///
/// `read` runs on the real-time thread: implementations must not block,
/// allocate or touch the filesystem.
pub trait TrackDecoder: Send {
    fn name(&self) -> &str;

    /// Fills `out` (interleaved stereo) from the current cursor and returns
    /// the number of frames written. `0` means the track is exhausted.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Moves the cursor back to the first frame.
    fn rewind(&mut self);
}

/// Opens backing tracks by asset name, already converted to `sample_rate`.
pub trait TrackProvider {
    fn open_track(&self, name: &str, sample_rate: u32) -> AudioResult<Box<dyn TrackDecoder>>;
}

/// Track decoded up front into device-rate PCM; the callback only copies.
pub struct DecodedTrack {
    name: String,
    pcm: Arc<[f32]>,
    cursor: usize,
}

impl DecodedTrack {
    pub fn new(name: impl Into<String>, interleaved_stereo: Vec<f32>) -> Self {
        let mut pcm = interleaved_stereo;
        pcm.truncate(pcm.len() & !1);
        Self {
            name: name.into(),
            pcm: pcm.into(),
            cursor: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.pcm.len() / 2
    }
}

impl TrackDecoder for DecodedTrack {
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn read(&mut self, out: &mut [f32]) -> usize {
        let start = self.cursor * 2;
        let n = (self.pcm.len() - start).min(out.len() & !1);
        out[..n].copy_from_slice(&self.pcm[start..start + n]);
        self.cursor += n / 2;
        n / 2
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// Decodes a whole Ogg Vorbis stream. Returns interleaved samples, the
/// channel count and the stream's sample rate.
pub fn decode_ogg<R: Read + Seek>(reader: R, name: &str) -> AudioResult<(Vec<f32>, usize, u32)> {
    let decoder_err = |e: lewton::VorbisError| AudioError::Decoder {
        name: name.to_string(),
        reason: e.to_string(),
    };

    let mut ogg = OggStreamReader::new(reader).map_err(decoder_err)?;
    let channels = ogg.ident_hdr.audio_channels as usize;
    let rate = ogg.ident_hdr.audio_sample_rate;
    if channels == 0 {
        return Err(AudioError::Decoder {
            name: name.to_string(),
            reason: "stream declares zero channels".to_string(),
        });
    }

    let mut samples = Vec::new();
    while let Some(packet) = ogg.read_dec_packet_itl().map_err(decoder_err)? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }
    Ok((samples, channels, rate))
}
