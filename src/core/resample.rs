//! Load-time format conversion: channel layout to stereo and sample rate to
//! the device rate. Never used on the callback path.

use rubato::{
    Resampler, SincFixedOut, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::core::error::{AudioError, AudioResult};

const OUT_FRAMES_PER_CALL: usize = 512;

#[inline(always)]
fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Converts interleaved audio with `channels` channels to interleaved stereo.
/// Mono is duplicated; anything wider keeps its first two channels.
pub fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        2 => interleaved.to_vec(),
        _ => interleaved
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Resamples interleaved stereo from `in_hz` to `out_hz`. The resampler's
/// group delay is trimmed so sample onsets stay where they were recorded.
pub fn resample_stereo(samples: &[f32], in_hz: u32, out_hz: u32) -> AudioResult<Vec<f32>> {
    if in_hz == out_hz || samples.len() < 2 {
        return Ok(samples.to_vec());
    }
    if in_hz == 0 || out_hz == 0 {
        return Err(AudioError::Resample(format!(
            "invalid rate conversion {in_hz} Hz -> {out_hz} Hz"
        )));
    }

    let ratio = out_hz as f64 / in_hz as f64;
    let mut resampler = SincFixedOut::<f32>::new(ratio, 1.0, sinc_params(), OUT_FRAMES_PER_CALL, 2)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let in_frames = samples.len() / 2;
    let mut left = Vec::with_capacity(in_frames);
    let mut right = Vec::with_capacity(in_frames);
    for frame in samples.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }

    let expected = (in_frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut out_left: Vec<f32> = Vec::with_capacity(wanted + OUT_FRAMES_PER_CALL);
    let mut out_right: Vec<f32> = Vec::with_capacity(wanted + OUT_FRAMES_PER_CALL);

    let mut pos = 0;
    loop {
        let need = resampler.input_frames_next();
        if pos + need > in_frames {
            break;
        }
        let chunk = [&left[pos..pos + need], &right[pos..pos + need]];
        let out = resampler
            .process(&chunk[..], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        append(out, &mut out_left, &mut out_right);
        pos += need;
    }

    let rest = [&left[pos..], &right[pos..]];
    let out = resampler
        .process_partial(Some(&rest[..]), None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    append(out, &mut out_left, &mut out_right);

    // Flush the delayed tail.
    while out_left.len() < wanted {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if out.first().is_none_or(|ch| ch.is_empty()) {
            break;
        }
        append(out, &mut out_left, &mut out_right);
    }

    let end = wanted.min(out_left.len());
    let start = delay.min(end);
    let mut interleaved = Vec::with_capacity((end - start) * 2);
    for i in start..end {
        interleaved.push(out_left[i]);
        interleaved.push(out_right[i]);
    }
    Ok(interleaved)
}

#[inline(always)]
fn append(out: Vec<Vec<f32>>, left: &mut Vec<f32>, right: &mut Vec<f32>) {
    if let [l, r, ..] = out.as_slice() {
        left.extend_from_slice(l);
        right.extend_from_slice(r);
    }
}
