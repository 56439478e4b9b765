//! The channels × samples matrix every stage consumes and produces.
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signal type of a channel. Only [`ChannelKind::Eeg`] survives conditioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Eeg,
    Eog,
    Ecg,
    Emg,
    Stim,
    Misc,
}

/// A multichannel recording: `data` is `[C, N]`, one row per channel label.
///
/// Invariants (checked on construction): at least one channel, at least two
/// samples, one label and one kind per row, a finite positive sampling rate,
/// and finite samples. Stages never mutate a recording in place; they build
/// a new one through [`RecordingMatrix::with_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMatrix {
    data: Array2<f64>,
    sfreq: f64,
    ch_names: Vec<String>,
    ch_kinds: Vec<ChannelKind>,
}

impl RecordingMatrix {
    /// Build a recording whose channels are all EEG.
    pub fn new(data: Array2<f64>, sfreq: f64, ch_names: Vec<String>) -> Result<Self> {
        let kinds = vec![ChannelKind::Eeg; data.nrows()];
        Self::with_kinds(data, sfreq, ch_names, kinds)
    }

    pub fn with_kinds(
        data: Array2<f64>,
        sfreq: f64,
        ch_names: Vec<String>,
        ch_kinds: Vec<ChannelKind>,
    ) -> Result<Self> {
        let (n_ch, n_t) = data.dim();
        if n_ch == 0 {
            return Err(Error::Data("recording has no channels".into()));
        }
        if n_t < 2 {
            return Err(Error::Data(format!("recording has {n_t} samples, need at least 2")));
        }
        if ch_names.len() != n_ch || ch_kinds.len() != n_ch {
            return Err(Error::Data(format!(
                "{n_ch} channels but {} labels and {} kinds",
                ch_names.len(),
                ch_kinds.len()
            )));
        }
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(Error::Data(format!("invalid sampling rate {sfreq}")));
        }
        if let Some(((c, t), v)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Data(format!(
                "non-finite sample {v} in channel '{}' at index {t}",
                ch_names[c]
            )));
        }
        Ok(Self { data, sfreq, ch_names, ch_kinds })
    }

    /// Same channels and sampling rate, new samples.
    ///
    /// The channel count must match; the sample count may differ only when
    /// the caller crops explicitly.
    pub fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        if data.nrows() != self.n_channels() {
            return Err(Error::Data(format!(
                "stage produced {} channels, expected {}",
                data.nrows(),
                self.n_channels()
            )));
        }
        Self::with_kinds(data, self.sfreq, self.ch_names.clone(), self.ch_kinds.clone())
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn ch_kinds(&self) -> &[ChannelKind] {
        &self.ch_kinds
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    /// Index of a channel by label (case-insensitive, spaces ignored).
    pub fn channel_index(&self, label: &str) -> Option<usize> {
        let norm = |s: &str| s.replace(' ', "").to_lowercase();
        let wanted = norm(label);
        self.ch_names.iter().position(|n| norm(n) == wanted)
    }

    /// Keep EEG channels only, preserving their order.
    pub fn pick_eeg(&self) -> Result<Self> {
        let keep: Vec<usize> = self
            .ch_kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == ChannelKind::Eeg)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(Error::Data("recording has no EEG channels".into()));
        }
        if keep.len() == self.n_channels() {
            return Ok(self.clone());
        }
        let data = self.data.select(ndarray::Axis(0), &keep);
        let names = keep.iter().map(|&i| self.ch_names[i].clone()).collect();
        Self::with_kinds(data, self.sfreq, names, vec![ChannelKind::Eeg; keep.len()])
    }

    /// Leading `secs` seconds (or the whole recording when shorter).
    pub fn head_secs(&self, secs: f64) -> ArrayView2<'_, f64> {
        let n = ((secs * self.sfreq).round() as usize).clamp(2, self.n_samples());
        self.data.slice(s![.., ..n])
    }
}
