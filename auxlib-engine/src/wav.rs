//! WAV and plain-text data I/O.
//!
//! Writing is always 16-bit PCM, interleaved, at the signal's own rate.
//! Reading accepts integer PCM of any width and 32-bit float.

use std::fs;
use std::path::Path;

use auxlib_core::Signals;

use crate::error::EngineError;

/// Write every channel of `sig` to `path`.
pub fn write(path: &Path, sig: &Signals) -> Result<(), EngineError> {
    if sig.is_empty() {
        return Err(EngineError::NoSignal("nothing to write: the signal is empty"));
    }
    let (frames, channels) = sig.interleaved();
    let spec = hound::WavSpec {
        channels: u16::try_from(channels)
            .map_err(|_| EngineError::Config(format!("too many channels for a wave file: {channels}")))?,
        sample_rate: sig.fs(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wr = hound::WavWriter::create(path, spec)?;
    for &s in &frames {
        wr.write_sample((s.clamp(-1.0, 1.0) * f64::from(i16::MAX)) as i16)?;
    }
    wr.finalize()?;
    tracing::debug!(path = %path.display(), channels, frames = frames.len() / channels, "wrote wave file");
    Ok(())
}

/// Read a wave file into a linked signal, one link per file channel.
pub fn read(path: &Path) -> Result<Signals, String> {
    let mut rdr = hound::WavReader::open(path)
        .map_err(|e| format!("cannot open wave file {}: {e}", path.display()))?;
    let spec = rdr.spec();
    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = f64::from(1u32 << (spec.bits_per_sample - 1).min(31));
            rdr.samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / scale))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => rdr
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>(),
    }
    .map_err(|e| format!("cannot read wave file {}: {e}", path.display()))?;

    let ch = usize::from(spec.channels.max(1));
    let mut channels = vec![Vec::with_capacity(interleaved.len() / ch); ch];
    for frame in interleaved.chunks(ch) {
        for (c, s) in frame.iter().enumerate() {
            channels[c].push(*s);
        }
    }
    Ok(Signals::from_channels(spec.sample_rate, channels))
}

/// Read whitespace- or comma-separated numbers.
pub fn read_data(path: &Path) -> Result<Vec<f64>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot open data file {}: {e}", path.display()))?;
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| format!("data file {}: '{tok}' is not a number", path.display()))
        })
        .collect()
}
