//! Callback-side state: voices, backing tracks and the variant generator.
//!
//! A `Mixer` is only ever touched from the audio callback while the device
//! plays, and from the control thread while it is paused.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::core::channel::Feedback;
use crate::core::drum::{Drum, DrumMask};
use crate::core::engine::Shared;
use crate::core::track::TrackDecoder;
use crate::core::waveform::{SampleId, WaveformStore};

#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    sample: Option<SampleId>,
    cursor: usize,
    active: bool,
}

struct TrackSlot {
    decoder: Box<dyn TrackDecoder>,
    exhausted: bool,
}

pub struct Mixer {
    waveforms: Arc<WaveformStore>,
    voices: [Voice; Drum::COUNT],
    tracks: Vec<TrackSlot>,
    rng: StdRng,
    seed: u64,
    track_scratch: Box<[f32]>,
}

impl Mixer {
    pub fn new(
        waveforms: Arc<WaveformStore>,
        tracks: Vec<Box<dyn TrackDecoder>>,
        seed: u64,
        block_frames: usize,
    ) -> Self {
        Self {
            waveforms,
            voices: [Voice::default(); Drum::COUNT],
            tracks: tracks
                .into_iter()
                .map(|decoder| TrackSlot {
                    decoder,
                    exhausted: false,
                })
                .collect(),
            rng: StdRng::seed_from_u64(seed),
            seed,
            track_scratch: vec![0.0; block_frames.max(1) * 2].into_boxed_slice(),
        }
    }

    /// Rewinds every track, silences every voice and reseeds the variant
    /// generator so a restarted session picks the same variants again.
    pub fn reset(&mut self) {
        for slot in &mut self.tracks {
            slot.decoder.rewind();
            slot.exhausted = false;
        }
        self.voices = [Voice::default(); Drum::COUNT];
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    pub fn voice_active(&self, drum: Drum) -> bool {
        self.voices[drum.index()].active
    }

    /// Renders one engine block into `out` (interleaved stereo, at most the
    /// configured block size) and publishes its feedback record.
    pub fn process_block(&mut self, shared: &Shared, out: &mut [f32]) {
        let frames = (out.len() / 2).min(self.track_scratch.len() / 2);
        let out = &mut out[..frames * 2];

        let fired = shared.triggers.drain();
        self.start_voices(fired);

        out.fill(0.0);
        self.mix_tracks(shared, out);
        self.mix_voices(out);

        let position = shared.position.load(Ordering::Relaxed);
        shared.feedback.publish(Feedback {
            position,
            mask: fired,
        });
        shared
            .position
            .store(position + frames as u64, Ordering::Release);
    }

    fn start_voices(&mut self, fired: DrumMask) {
        for drum in fired.drums() {
            let id = self.waveforms.pick(drum, &mut self.rng);
            self.voices[drum.index()] = Voice {
                sample: Some(id),
                cursor: 0,
                active: true,
            };
        }
        // Closed hat chokes the open hat, including one fired in this block.
        if fired.contains(DrumMask::CLOSED_HAT) {
            self.voices[Drum::OpenHat.index()].active = false;
        }
    }

    fn mix_tracks(&mut self, shared: &Shared, out: &mut [f32]) {
        let scratch = &mut self.track_scratch[..out.len()];
        for slot in self.tracks.iter_mut().filter(|s| !s.exhausted) {
            let read = slot.decoder.read(scratch);
            if read == 0 {
                slot.exhausted = true;
                shared.exhausted_tracks.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            for (o, s) in out.iter_mut().zip(&scratch[..read * 2]) {
                *o += *s;
            }
        }
    }

    fn mix_voices(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            let Some(id) = voice.sample else {
                voice.active = false;
                continue;
            };
            let sample = self.waveforms.sample(id);
            let n = sample.frames().saturating_sub(voice.cursor).min(frames);
            let src = &sample.data()[voice.cursor * 2..(voice.cursor + n) * 2];
            for (o, s) in out.iter_mut().zip(src) {
                *o += *s;
            }
            voice.cursor += n;
            if voice.cursor >= sample.frames() {
                voice.active = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Mixer;
    use crate::core::channel::Feedback;
    use crate::core::drum::{Drum, DrumMask};
    use crate::core::engine::{EngineSettings, Shared};
    use crate::core::track::{DecodedTrack, TrackDecoder};
    use crate::core::waveform::{Sample, WaveformStore};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const BLOCK: usize = 4;

    fn store(frames: usize) -> Arc<WaveformStore> {
        let group = |base: f32| -> Vec<Sample> {
            (0..3)
                .map(|v| Sample::from_interleaved(vec![base + v as f32 * 0.01; frames * 2]))
                .collect()
        };
        Arc::new(WaveformStore::from_variants([group(0.1), group(0.2), group(0.3), group(0.4)]).unwrap())
    }

    fn shared() -> Shared {
        Shared::new(&EngineSettings {
            block_frames: BLOCK,
            ..EngineSettings::default()
        })
    }

    fn drain(shared: &Shared) -> Vec<Feedback> {
        let mut out = Vec::new();
        shared.feedback.drain_into(&mut out);
        out
    }

    #[test]
    fn closed_hat_chokes_open_hat_fired_in_same_block() {
        let shared = shared();
        let mut mixer = Mixer::new(store(64), Vec::new(), 1, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        shared.triggers.push(DrumMask::OPEN_HAT);
        shared.triggers.push(DrumMask::CLOSED_HAT);
        mixer.process_block(&shared, &mut out);

        assert!(!mixer.voice_active(Drum::OpenHat), "open hat must be choked");
        assert!(mixer.voice_active(Drum::ClosedHat));
        assert_eq!(
            drain(&shared)[0].mask,
            DrumMask::OPEN_HAT | DrumMask::CLOSED_HAT,
            "feedback still reports both triggers"
        );
        for s in out {
            assert!((0.29..0.33).contains(&s), "only the closed hat should sound, got {s}");
        }
    }

    #[test]
    fn closed_hat_in_later_block_stops_ringing_open_hat() {
        let shared = shared();
        let mut mixer = Mixer::new(store(64), Vec::new(), 1, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        shared.triggers.push(DrumMask::OPEN_HAT);
        mixer.process_block(&shared, &mut out);
        assert!(mixer.voice_active(Drum::OpenHat));

        shared.triggers.push(DrumMask::CLOSED_HAT);
        mixer.process_block(&shared, &mut out);
        assert!(!mixer.voice_active(Drum::OpenHat));
    }

    #[test]
    fn voices_sum_without_clamping_and_end_with_their_sample() {
        let shared = shared();
        let mut mixer = Mixer::new(store(6), Vec::new(), 3, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        shared.triggers.push(DrumMask::all());
        mixer.process_block(&shared, &mut out);
        // Closed hat choked the open hat: kick + snare + closed hat.
        assert!(out[0] > 0.6 && out[0] < 0.7, "got {}", out[0]);

        mixer.process_block(&shared, &mut out);
        assert!(out[3] > 0.6, "frames 4..6 still carry the voices");
        assert_eq!(out[4], 0.0, "voices end after 6 frames");
        assert!(!mixer.voice_active(Drum::Kick));
    }

    #[test]
    fn feedback_positions_are_block_starts() {
        let shared = shared();
        let mut mixer = Mixer::new(store(8), Vec::new(), 0, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        mixer.process_block(&shared, &mut out);
        shared.triggers.push(DrumMask::KICK);
        mixer.process_block(&shared, &mut out[..2 * 2]);
        mixer.process_block(&shared, &mut out);

        let fb = drain(&shared);
        let positions: Vec<u64> = fb.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 4, 6]);
        assert_eq!(fb[0].mask, DrumMask::empty(), "idle blocks still publish");
        assert_eq!(fb[1].mask, DrumMask::KICK);
        assert_eq!(shared.position.load(Ordering::Acquire), 10);
    }

    #[test]
    fn exhausted_tracks_are_flagged_once_and_rewound_on_reset() {
        let shared = shared();
        let track: Box<dyn TrackDecoder> = Box::new(DecodedTrack::new("bass", vec![0.5; 6 * 2]));
        let mut mixer = Mixer::new(store(8), vec![track], 0, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        mixer.process_block(&shared, &mut out);
        assert_eq!(out, [0.5; BLOCK * 2]);
        mixer.process_block(&shared, &mut out);
        assert_eq!(&out[..4], &[0.5; 4]);
        assert_eq!(&out[4..], &[0.0; 4]);
        mixer.process_block(&shared, &mut out);
        mixer.process_block(&shared, &mut out);
        assert_eq!(shared.exhausted_tracks.load(Ordering::Relaxed), 1);

        mixer.reset();
        mixer.process_block(&shared, &mut out);
        assert_eq!(out[0], 0.5, "reset rewinds the track");
    }

    #[test]
    fn reset_replays_the_same_variant_sequence() {
        let shared = shared();
        let mut mixer = Mixer::new(store(1), Vec::new(), 42, BLOCK);
        let mut out = [0.0f32; BLOCK * 2];

        let mut run = |mixer: &mut Mixer| -> Vec<f32> {
            (0..16)
                .map(|_| {
                    shared.triggers.push(DrumMask::KICK);
                    mixer.process_block(&shared, &mut out);
                    out[0]
                })
                .collect()
        };
        let first = run(&mut mixer);
        mixer.reset();
        let second = run(&mut mixer);
        assert_eq!(first, second);
    }
}
