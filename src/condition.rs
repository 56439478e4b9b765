//! Signal conditioning shared by both denoising pipelines.
//!
//! ```text
//! recording ─ pick EEG ─ reference ─ bandpass [low, high] ─ notch ─→ conditioned
//! ```
//!
//! Referencing happens before filtering. Channel count, order and sampling
//! rate of the EEG subset are preserved; the input is never modified.
use crate::config::{AnalysisConfig, Band};
use crate::error::Result;
use crate::filter::SignalFilter;
use crate::recording::RecordingMatrix;
use crate::reference::apply_reference;

pub fn condition(
    recording: &RecordingMatrix,
    cfg: &AnalysisConfig,
    filter: &dyn SignalFilter,
) -> Result<RecordingMatrix> {
    let sfreq = recording.sfreq();
    cfg.validate(sfreq)?;

    let eeg = recording.pick_eeg()?;
    log::info!(
        "[CONDITION] {} EEG channels of {}, {} samples ({:.1} s @ {sfreq} Hz)",
        eeg.n_channels(),
        recording.n_channels(),
        eeg.n_samples(),
        eeg.duration_secs()
    );

    let mut data = apply_reference(&eeg, &cfg.reference)?;
    log::debug!("[CONDITION] reference {:?} applied", cfg.reference);

    filter.band(&mut data, sfreq, Band::new(cfg.low_freq, cfg.high_freq));
    if let Some(freq) = cfg.notch_freq {
        filter.notch(&mut data, sfreq, freq);
    }

    eeg.with_data(data)
}
