//! One-shot percussion samples.
//!
//! Every sample is interleaved stereo `f32` at the device rate, decoded once
//! at startup and never touched again except for reads from the callback.

use log::info;
use rand::Rng;

use crate::core::drum::Drum;
use crate::core::error::{AudioError, AudioResult};

/// Recorded variants per drum (`k0.wav` .. `k2.wav`).
pub const VARIANTS_PER_DRUM: usize = 3;

#[derive(Clone, Debug)]
pub struct Sample {
    data: Box<[f32]>,
}

impl Sample {
    /// Wraps interleaved stereo data. A trailing half frame is discarded.
    pub fn from_interleaved(mut data: Vec<f32>) -> Self {
        data.truncate(data.len() & !1);
        Self {
            data: data.into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub fn frames(&self) -> usize {
        self.data.len() / 2
    }

    #[inline(always)]
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Index of a sample inside a [`WaveformStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(usize);

/// Supplies decoded stereo waveforms by asset name.
pub trait WaveformProvider {
    fn load_waveform(&self, name: &str, sample_rate: u32) -> AudioResult<Sample>;
}

#[derive(Debug)]
pub struct WaveformStore {
    samples: Vec<Sample>,
    variants: [Vec<SampleId>; Drum::COUNT],
}

impl WaveformStore {
    /// Loads `VARIANTS_PER_DRUM` variants of every drum from `provider`.
    pub fn load<P: WaveformProvider + ?Sized>(provider: &P, sample_rate: u32) -> AudioResult<Self> {
        let mut variants: [Vec<Sample>; Drum::COUNT] = Default::default();
        for drum in Drum::ALL {
            for n in 0..VARIANTS_PER_DRUM {
                let name = format!("{}{n}.wav", drum.asset_prefix());
                let sample = provider.load_waveform(&name, sample_rate)?;
                variants[drum.index()].push(sample);
            }
        }
        let store = Self::from_variants(variants)?;
        info!(
            "Loaded {} drum samples ({} Hz).",
            store.samples.len(),
            sample_rate
        );
        Ok(store)
    }

    /// Builds a store from already decoded samples, grouped by drum index.
    /// Every drum needs at least one variant.
    pub fn from_variants(groups: [Vec<Sample>; Drum::COUNT]) -> AudioResult<Self> {
        let mut samples = Vec::new();
        let mut variants: [Vec<SampleId>; Drum::COUNT] = Default::default();
        for (drum, group) in Drum::ALL.into_iter().zip(groups) {
            if group.is_empty() {
                return Err(AudioError::MissingVariants(drum));
            }
            for sample in group {
                variants[drum.index()].push(SampleId(samples.len()));
                samples.push(sample);
            }
        }
        Ok(Self { samples, variants })
    }

    #[inline(always)]
    pub fn sample(&self, id: SampleId) -> &Sample {
        &self.samples[id.0]
    }

    pub fn variant_count(&self, drum: Drum) -> usize {
        self.variants[drum.index()].len()
    }

    pub fn variant(&self, drum: Drum, n: usize) -> Option<SampleId> {
        self.variants[drum.index()].get(n).copied()
    }

    /// Uniform pick among `drum`'s variants.
    #[inline]
    pub fn pick<R: Rng + ?Sized>(&self, drum: Drum, rng: &mut R) -> SampleId {
        let group = &self.variants[drum.index()];
        group[rng.random_range(0..group.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::{Sample, WaveformProvider, WaveformStore, VARIANTS_PER_DRUM};
    use crate::core::drum::Drum;
    use crate::core::error::{AudioError, AudioResult};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::RefCell;

    struct Recording {
        names: RefCell<Vec<String>>,
    }

    impl WaveformProvider for Recording {
        fn load_waveform(&self, name: &str, _sample_rate: u32) -> AudioResult<Sample> {
            self.names.borrow_mut().push(name.to_string());
            Ok(Sample::from_interleaved(vec![0.5; 8]))
        }
    }

    fn tiny(value: f32) -> Sample {
        Sample::from_interleaved(vec![value, value])
    }

    #[test]
    fn load_requests_every_variant_of_every_drum() {
        let provider = Recording {
            names: RefCell::new(Vec::new()),
        };
        let store = WaveformStore::load(&provider, 44_100).unwrap();
        let names = provider.names.borrow();
        assert_eq!(names.len(), Drum::COUNT * VARIANTS_PER_DRUM);
        for expected in ["k0.wav", "s2.wav", "h1.wav", "o0.wav"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        for drum in Drum::ALL {
            assert_eq!(store.variant_count(drum), VARIANTS_PER_DRUM);
        }
    }

    #[test]
    fn missing_variants_are_fatal() {
        let err = WaveformStore::from_variants([vec![tiny(0.1)], vec![], vec![tiny(0.3)], vec![tiny(0.4)]])
            .unwrap_err();
        assert!(matches!(err, AudioError::MissingVariants(Drum::Snare)));
    }

    #[test]
    fn pick_stays_inside_the_drum_and_is_seed_deterministic() {
        let store = WaveformStore::from_variants([
            vec![tiny(0.1), tiny(0.11), tiny(0.12)],
            vec![tiny(0.2)],
            vec![tiny(0.3), tiny(0.31)],
            vec![tiny(0.4)],
        ])
        .unwrap();

        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let id = store.pick(Drum::Kick, &mut a);
            assert_eq!(id, store.pick(Drum::Kick, &mut b));
            let v = store.sample(id).data()[0];
            assert!((0.1..0.13).contains(&v), "kick pick returned foreign sample {v}");
        }
        assert_eq!(store.variant(Drum::Snare, 0), store.variant(Drum::Snare, 0));
        assert_eq!(store.variant(Drum::Snare, 1), None);
    }

    #[test]
    fn sample_frames_ignore_odd_tail() {
        let s = Sample::from_interleaved(vec![0.0; 7]);
        assert_eq!(s.frames(), 3);
        assert_eq!(s.data().len(), 6);
    }
}
