//! WAV container inspection
//!
//! Reads only the header to determine the duration a words-per-minute gate
//! needs; never decodes samples.

use std::path::Path;

pub fn wav_duration_seconds(path: impl AsRef<Path>) -> Option<f32> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f32 / spec.sample_rate as f32)
}
