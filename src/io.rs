//! Safetensors I/O for recordings and cleaned outputs.
//!
//! Layout read and written:
//!
//! | key        | dtype      | shape   | content                              |
//! |------------|------------|---------|--------------------------------------|
//! | `data`     | F32 / F64  | [C, N]  | samples                              |
//! | `sfreq`    | F32 / F64  | [1]     | sampling rate (Hz)                   |
//! | `ch_names` | U8         | [bytes] | newline-separated labels (optional)  |
//! | `ch_types` | U8         | [bytes] | newline-separated kinds (optional)   |
//!
//! Missing labels become `Ch1 … ChC`; missing kinds default to EEG.
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;

use crate::recording::{ChannelKind, RecordingMatrix};

// ── Low-level safetensors parser (raw bytes → ndarray, no tensor types) ───────

type Header = HashMap<String, serde_json::Value>;

fn parse_header(bytes: &[u8]) -> Result<(Header, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len()).context("header overruns file")?;
    let header: Header =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

fn tensor_bytes<'a>(bytes: &'a [u8], data_start: usize, entry: &serde_json::Value) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"].as_array().context("missing data_offsets")?;
    let (s, e) = match offsets.as_slice() {
        [s, e] => (
            s.as_u64().context("bad offset")? as usize,
            e.as_u64().context("bad offset")? as usize,
        ),
        _ => bail!("data_offsets must have two entries"),
    };
    bytes
        .get(data_start + s..data_start + e)
        .context("tensor data overruns file")
}

fn read_float_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f64>> {
    let raw = tensor_bytes(bytes, data_start, entry)?;
    match entry["dtype"].as_str() {
        Some("F32") => Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
            .collect()),
        Some("F64") => Ok(raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect()),
        other => bail!("unsupported dtype {other:?}, expected F32 or F64"),
    }
}

fn read_lines(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<String>> {
    let raw = std::str::from_utf8(tensor_bytes(bytes, data_start, entry)?)?;
    Ok(raw.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect()
}

fn parse_kind(s: &str) -> ChannelKind {
    match s.trim().to_ascii_lowercase().as_str() {
        "eeg" => ChannelKind::Eeg,
        "eog" => ChannelKind::Eog,
        "ecg" => ChannelKind::Ecg,
        "emg" => ChannelKind::Emg,
        "stim" => ChannelKind::Stim,
        _ => ChannelKind::Misc,
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Load a recording from a safetensors file.
pub fn load_recording(path: &Path) -> Result<RecordingMatrix> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let data_entry = header.get("data").context("missing 'data' key")?;
    let shape = shape_of(data_entry)?;
    let [n_ch, n_t] = shape[..] else {
        bail!("'data' must be 2-D, got shape {shape:?}");
    };
    let samples = read_float_tensor(&bytes, data_start, data_entry)?;
    let data = Array2::from_shape_vec((n_ch, n_t), samples)?;

    let sfreq_entry = header.get("sfreq").context("missing 'sfreq' key")?;
    let sfreq = *read_float_tensor(&bytes, data_start, sfreq_entry)?
        .first()
        .context("empty 'sfreq' tensor")?;

    let ch_names = match header.get("ch_names") {
        Some(e) => read_lines(&bytes, data_start, e)?,
        None => (1..=n_ch).map(|i| format!("Ch{i}")).collect(),
    };
    let ch_kinds = match header.get("ch_types") {
        Some(e) => read_lines(&bytes, data_start, e)?.iter().map(|s| parse_kind(s)).collect(),
        None => vec![ChannelKind::Eeg; n_ch],
    };

    log::info!("[IO] loaded {} ({n_ch} ch × {n_t} samples @ {sfreq} Hz)", path.display());
    Ok(RecordingMatrix::with_kinds(data, sfreq, ch_names, ch_kinds)?)
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Minimal safetensors writer for F64 and U8 tensors.
///
/// ```rust,no_run
/// use exgq::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.add_bytes("labels", b"Fz\nCz");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_bytes(&mut self, name: &str, data: &[u8]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> =
            hdr_bytes.into_iter().chain(std::iter::repeat(b' ').take(pad)).collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

fn kind_name(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Eeg => "eeg",
        ChannelKind::Eog => "eog",
        ChannelKind::Ecg => "ecg",
        ChannelKind::Emg => "emg",
        ChannelKind::Stim => "stim",
        ChannelKind::Misc => "misc",
    }
}

/// Write `recording` in the layout [`load_recording`] reads.
pub fn write_recording(recording: &RecordingMatrix, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", recording.data());
    w.add_f64("sfreq", &[recording.sfreq()], &[1]);
    w.add_bytes("ch_names", recording.ch_names().join("\n").as_bytes());
    let kinds: Vec<&str> = recording.ch_kinds().iter().map(|&k| kind_name(k)).collect();
    w.add_bytes("ch_types", kinds.join("\n").as_bytes());
    w.write(path)?;
    log::info!("[IO] wrote {}", path.display());
    Ok(())
}
