pub mod audio;
pub mod channel;
pub mod drum;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod resample;
pub mod track;
pub mod waveform;
