use serde::{Deserialize, Serialize};

use super::SpectrumSnapshot;

/// Dominant (frequency, amplitude) pair of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Peak {
    pub frequency: f32,
    pub amplitude: f32,
}

/// Find the loudest bin whose frequency lies in `[min_freq, max_freq]`.
///
/// Either bound may be omitted. Ties go to the lower bin, and when nothing in the
/// window rises above zero the silent peak `{0, 0}` is returned.
pub fn find_peak(spectrum: &SpectrumSnapshot, min_freq: Option<f32>, max_freq: Option<f32>) -> Peak {
    let mut peak = Peak::default();

    for (bin, &magnitude) in spectrum.magnitudes.iter().enumerate() {
        let frequency = spectrum.frequency_of(bin);

        if min_freq.is_some_and(|min| frequency < min) {
            continue;
        }
        if max_freq.is_some_and(|max| frequency > max) {
            // Bins only get higher from here.
            break;
        }

        let amplitude = magnitude as f32;
        if amplitude > peak.amplitude {
            peak = Peak {
                frequency,
                amplitude,
            };
        }
    }

    peak
}
