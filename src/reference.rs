//! Re-referencing.
//!
//! Average reference matches `raw.set_eeg_reference('average', projection=False)`:
//! `data[c, t] -= mean(data[:, t])`.
//!
//! Single-channel reference: `data[c, t] -= data[r, t]` (the reference row
//! becomes zero).
use ndarray::{Array2, Axis};

use crate::config::ReferenceMode;
use crate::error::{Error, Result};
use crate::recording::RecordingMatrix;

pub fn average_reference_inplace(data: &mut Array2<f64>) {
    let Some(means) = data.mean_axis(Axis(0)) else {
        return;
    };
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

pub fn channel_reference_inplace(data: &mut Array2<f64>, ref_idx: usize) {
    let reference = data.row(ref_idx).to_owned();
    for mut row in data.rows_mut() {
        row -= &reference;
    }
}

/// Apply `mode` to a copy of `recording`'s samples.
pub fn apply_reference(recording: &RecordingMatrix, mode: &ReferenceMode) -> Result<Array2<f64>> {
    let mut data = recording.data().clone();
    match mode {
        ReferenceMode::Average => average_reference_inplace(&mut data),
        ReferenceMode::Channel(label) => {
            let idx = recording.channel_index(label).ok_or_else(|| {
                Error::Configuration(format!("reference channel '{label}' not in recording"))
            })?;
            channel_reference_inplace(&mut data, idx);
        }
        ReferenceMode::None => {}
    }
    Ok(data)
}
