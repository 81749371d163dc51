//! The engine handle shared between the control thread and the audio
//! callback.
//!
//! [`Engine`] is the control-side view: it submits triggers, drains feedback
//! and reads the position clock. [`Renderer`] is the callback-side view: it
//! owns the scratch buffers and turns device buffers into engine blocks.
//! Both point at the same [`Shared`] channels and the same [`Mixer`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cpal::{FromSample, SizedSample};
use log::info;

use crate::core::channel::{Feedback, FeedbackChannel, TriggerChannel};
use crate::core::drum::DrumMask;
use crate::core::error::{AudioError, AudioResult};
use crate::core::mixer::Mixer;
use crate::core::track::TrackDecoder;
use crate::core::waveform::WaveformStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound on frames per engine block; device buffers are split.
    pub block_frames: usize,
    pub rng_seed: u64,
    pub trigger_capacity: usize,
    pub feedback_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            block_frames: 256,
            rng_seed: 0,
            trigger_capacity: 64,
            feedback_capacity: 256,
        }
    }
}

/// Cross-thread state that lives outside the mixer lock.
pub struct Shared {
    pub(crate) triggers: TriggerChannel,
    pub(crate) feedback: FeedbackChannel,
    /// Absolute frame position. Stored only by the callback.
    pub(crate) position: AtomicU64,
    pub(crate) exhausted_tracks: AtomicUsize,
}

impl Shared {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            triggers: TriggerChannel::with_capacity(settings.trigger_capacity),
            feedback: FeedbackChannel::with_capacity(settings.feedback_capacity),
            position: AtomicU64::new(0),
            exhausted_tracks: AtomicUsize::new(0),
        }
    }

    fn reset(&self) {
        self.triggers.clear();
        self.feedback.clear();
        self.position.store(0, Ordering::Release);
        self.exhausted_tracks.store(0, Ordering::Relaxed);
    }
}

#[inline(always)]
fn lock_mixer(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    block_frames: usize,
    track_count: usize,
}

impl Engine {
    pub fn new(
        waveforms: Arc<WaveformStore>,
        tracks: Vec<Box<dyn TrackDecoder>>,
        sample_rate: u32,
        settings: &EngineSettings,
    ) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::Config("sample rate must be positive".to_string()));
        }
        let block_frames = settings.block_frames.max(1);
        let track_count = tracks.len();
        for track in &tracks {
            info!("Backing track '{}'.", track.name());
        }
        let mixer = Mixer::new(waveforms, tracks, settings.rng_seed, block_frames);
        let shared = Shared::new(settings);
        info!(
            "Engine ready ({} Hz, {} frame blocks, {} tracks, trigger ring {}, feedback ring {}).",
            sample_rate,
            block_frames,
            track_count,
            shared.triggers.capacity(),
            shared.feedback.capacity()
        );
        Ok(Self {
            shared: Arc::new(shared),
            mixer: Arc::new(Mutex::new(mixer)),
            sample_rate,
            block_frames,
            track_count,
        })
    }

    /// Returns every piece of session state to its initial value. Only call
    /// while the device is paused.
    pub fn reset(&self) {
        let mut mixer = lock_mixer(&self.mixer);
        mixer.reset();
        self.shared.reset();
    }

    /// Discards queued triggers and unread feedback. The position and the
    /// mixer are left alone.
    pub fn clear_channels(&self) {
        self.shared.triggers.clear();
        self.shared.feedback.clear();
    }

    /// Queues drums for the next callback block. Returns `false` if the
    /// trigger ring was full and the mask was dropped.
    pub fn submit_triggers(&self, mask: DrumMask) -> bool {
        self.shared.triggers.push(mask)
    }

    pub fn poll_feedback(&self) -> Vec<Feedback> {
        let mut out = Vec::new();
        self.shared.feedback.drain_into(&mut out);
        out
    }

    /// Like [`Engine::poll_feedback`] but reuses the caller's buffer.
    pub fn poll_feedback_into(&self, out: &mut Vec<Feedback>) -> usize {
        self.shared.feedback.drain_into(out)
    }

    #[inline(always)]
    pub fn current_position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn position_to_seconds(&self, position: u64) -> f64 {
        position as f64 / self.sample_rate as f64
    }

    #[inline(always)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline(always)]
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    pub fn dropped_triggers(&self) -> u64 {
        self.shared.triggers.dropped()
    }

    pub fn overwritten_feedback(&self) -> u64 {
        self.shared.feedback.overwritten()
    }

    pub fn exhausted_tracks(&self) -> usize {
        self.shared.exhausted_tracks.load(Ordering::Relaxed)
    }

    /// True once every backing track has run out. Always false without tracks.
    pub fn tracks_finished(&self) -> bool {
        self.track_count > 0 && self.exhausted_tracks() >= self.track_count
    }

    /// Builds the callback-side half. Scratch is allocated here, never in
    /// the callback.
    pub fn renderer(&self) -> Renderer {
        Renderer {
            shared: Arc::clone(&self.shared),
            mixer: Arc::clone(&self.mixer),
            block_frames: self.block_frames,
            scratch: vec![0.0; self.block_frames * 2].into_boxed_slice(),
        }
    }
}

pub struct Renderer {
    shared: Arc<Shared>,
    mixer: Arc<Mutex<Mixer>>,
    block_frames: usize,
    scratch: Box<[f32]>,
}

impl Renderer {
    /// Fills interleaved stereo `out`, one engine block at a time.
    pub fn render_stereo(&mut self, out: &mut [f32]) {
        let mut mixer = lock_mixer(&self.mixer);
        for chunk in out.chunks_mut(self.block_frames * 2) {
            mixer.process_block(&self.shared, chunk);
        }
    }

    /// Fills a device buffer of any channel count and sample format.
    /// Mono receives the average of both sides; wider layouts alternate
    /// left and right.
    pub fn render<T>(&mut self, out: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        if channels == 0 {
            return;
        }
        let mut mixer = lock_mixer(&self.mixer);
        for chunk in out.chunks_mut(self.block_frames * channels) {
            let frames = chunk.len() / channels;
            if frames == 0 {
                break;
            }
            let stereo = &mut self.scratch[..frames * 2];
            mixer.process_block(&self.shared, stereo);

            for (frame, lr) in chunk.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
                if channels == 1 {
                    frame[0] = T::from_sample((lr[0] + lr[1]) * 0.5);
                    continue;
                }
                for (c, slot) in frame.iter_mut().enumerate() {
                    *slot = T::from_sample(lr[c % 2]);
                }
            }
        }
    }
}
