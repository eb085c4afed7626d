//! The engine contract the C façade drives, and the Rhai-backed engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use auxlib_core::{dsp, Signals};
use parking_lot::RwLock;
use rhai::module_resolvers::FileModuleResolver;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::playback::{self, Playback};
use crate::script::{self, ScriptContext, SharedContext};
use crate::wav;

/// Directory categories an instance resolves file names against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathCategory {
    /// Wave files loaded by `wave(name)`.
    Wav,
    /// Script modules pulled in with `import`.
    Aux,
    /// Plain-text data loaded by `data(name)`.
    Data,
}

impl PathCategory {
    pub const ALL: [PathCategory; 3] = [PathCategory::Wav, PathCategory::Aux, PathCategory::Data];

    pub fn as_str(self) -> &'static str {
        match self {
            PathCategory::Wav => "wav",
            PathCategory::Aux => "aux",
            PathCategory::Data => "txt",
        }
    }
}

impl fmt::Display for PathCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngineError::Config(format!("unknown path category: {s}")))
    }
}

/// What the registry needs from an engine instance.
pub trait SignalEngine: Send + Sized {
    /// Build an instance at `sample_rate`, or the configured default when `None`.
    fn new(config: &EngineConfig, sample_rate: Option<u32>) -> Result<Self, EngineError>;

    fn sample_rate(&self) -> u32;

    fn set_path(&mut self, category: PathCategory, path: &str) -> Result<(), EngineError>;

    fn path(&self, category: PathCategory) -> &str;

    /// Compile and run `script`. The result also becomes the native signal.
    fn compute(&mut self, script: &str) -> Result<Signals, EngineError>;

    fn native_signal(&self) -> &Signals;

    /// Start rendering the native signal on output device `device` (< 0: default).
    fn play(&mut self, device: i32) -> Result<(), EngineError>;

    /// Write the native signal to a wave file.
    fn write_wav(&self, path: &Path) -> Result<(), EngineError>;
}

/// Rhai-scripted engine instance.
pub struct AuxEngine {
    rhai: rhai::Engine,
    ctx: SharedContext,
    paths: [String; 3],
    native: Signals,
    playback: Option<Playback>,
}

impl fmt::Debug for AuxEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxEngine")
            .field("fs", &self.sample_rate())
            .field("paths", &self.paths)
            .field("native_len", &self.native.len())
            .field("playing", &self.playback.as_ref().is_some_and(|p| !p.is_finished()))
            .finish()
    }
}

fn slot(category: PathCategory) -> usize {
    match category {
        PathCategory::Wav => 0,
        PathCategory::Aux => 1,
        PathCategory::Data => 2,
    }
}

impl SignalEngine for AuxEngine {
    fn new(config: &EngineConfig, sample_rate: Option<u32>) -> Result<Self, EngineError> {
        let fs = sample_rate.unwrap_or(config.default_sample_rate);
        if fs == 0 || fs > config.max_sample_rate {
            return Err(EngineError::Config(format!(
                "sample rate {fs} Hz is outside 1..={} Hz",
                config.max_sample_rate
            )));
        }
        let ctx = Arc::new(RwLock::new(ScriptContext {
            fs,
            wav_dir: PathBuf::new(),
            data_dir: PathBuf::new(),
            max_len: dsp::ms_to_samples(config.max_duration_ms, fs),
        }));
        let mut engine = Self {
            rhai: script::build_engine(&config.limits, &ctx),
            ctx,
            paths: Default::default(),
            native: Signals::empty(fs),
            playback: None,
        };
        let defaults = &config.paths;
        for (category, path) in PathCategory::ALL.into_iter().zip([&defaults.wav, &defaults.aux, &defaults.data]) {
            if !path.is_empty() {
                engine.set_path(category, path)?;
            }
        }
        tracing::debug!(fs, "engine created");
        Ok(engine)
    }

    #[inline]
    fn sample_rate(&self) -> u32 {
        self.ctx.read().fs
    }

    fn set_path(&mut self, category: PathCategory, path: &str) -> Result<(), EngineError> {
        let dir = PathBuf::from(path);
        if dir.is_file() {
            return Err(EngineError::Config(format!(
                "{category} path is a file, not a directory: {path}"
            )));
        }
        match category {
            PathCategory::Wav => self.ctx.write().wav_dir = dir,
            PathCategory::Data => self.ctx.write().data_dir = dir,
            PathCategory::Aux => {
                self.rhai.set_module_resolver(FileModuleResolver::new_with_path(dir));
            }
        }
        self.paths[slot(category)] = path.to_owned();
        Ok(())
    }

    fn path(&self, category: PathCategory) -> &str {
        &self.paths[slot(category)]
    }

    fn compute(&mut self, src: &str) -> Result<Signals, EngineError> {
        let fs = self.sample_rate();
        let value = script::run(&self.rhai, src)?;
        let sig = script::into_signal(&self.rhai, value, fs)?;
        let max_len = self.ctx.read().max_len;
        if sig.max_len() > max_len {
            return Err(EngineError::Script(format!(
                "signal too long: {:.0} ms exceeds the {:.0} ms limit",
                dsp::samples_to_ms(sig.max_len(), fs),
                dsp::samples_to_ms(max_len, fs)
            )));
        }
        self.native = sig.clone();
        tracing::debug!(channels = sig.nchan(), len = sig.len(), "script computed");
        Ok(sig)
    }

    #[inline]
    fn native_signal(&self) -> &Signals {
        &self.native
    }

    fn play(&mut self, device: i32) -> Result<(), EngineError> {
        // a new playback replaces (and stops) the previous one
        self.playback = None;
        self.playback = Some(playback::start(&self.native, device)?);
        Ok(())
    }

    fn write_wav(&self, path: &Path) -> Result<(), EngineError> {
        wav::write(path, &self.native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(fs: u32) -> AuxEngine {
        AuxEngine::new(&EngineConfig::default(), Some(fs)).unwrap()
    }

    #[test]
    fn rate_defaults_and_bounds() {
        let cfg = EngineConfig::default();
        assert_eq!(AuxEngine::new(&cfg, None).unwrap().sample_rate(), 22_050);
        assert_eq!(engine(44_100).sample_rate(), 44_100);
        assert!(matches!(AuxEngine::new(&cfg, Some(1_000_000)), Err(EngineError::Config(_))));
    }

    #[test]
    fn path_categories_parse_by_wire_name() {
        assert_eq!("txt".parse::<PathCategory>().unwrap(), PathCategory::Data);
        assert_eq!(PathCategory::Aux.to_string(), "aux");
        assert!("data".parse::<PathCategory>().is_err());
    }

    #[test]
    fn compute_sets_an_independent_native_signal() {
        let mut e = engine(1000);
        let mut out = e.compute("stereo(dc(1, 4), dc(2, 4))").unwrap();
        assert_eq!(e.native_signal().nchan(), 2);
        out.detach_next_chan();
        assert_eq!(e.native_signal().nchan(), 2);
    }

    #[test]
    fn failed_compute_keeps_previous_native_signal() {
        let mut e = engine(1000);
        e.compute("dc(1, 3)").unwrap();
        assert!(e.compute("oops(").is_err());
        assert_eq!(e.native_signal().len(), 3);
    }

    #[test]
    fn files_resolve_against_category_paths() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("ramp.txt"), "0 0.5 1").unwrap();
        std::fs::write(dir.path().join("lib.rhai"), "fn twice(s) { s * 2 }").unwrap();

        let mut e = engine(1000);
        e.set_path(PathCategory::Data, dir_str).unwrap();
        e.set_path(PathCategory::Aux, dir_str).unwrap();
        e.set_path(PathCategory::Wav, dir_str).unwrap();
        assert_eq!(e.path(PathCategory::Data), dir_str);

        let sig = e.compute("import \"lib\" as lib; lib::twice(data(\"ramp\"))").unwrap();
        assert_eq!(sig.first_channel(), vec![0.0, 1.0, 2.0]);

        e.write_wav(&dir.path().join("out.wav")).unwrap();
        let back = e.compute("wave(\"out\")").unwrap();
        assert_eq!(back.len(), 3);
        assert!((back.first_channel()[2] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn path_naming_a_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut e = engine(1000);
        assert!(e.set_path(PathCategory::Wav, file.path().to_str().unwrap()).is_err());
        assert_eq!(e.path(PathCategory::Wav), "");
    }

    #[test]
    fn wave_at_another_rate_is_a_script_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.wav");
        wav::write(&path, &Signals::from_samples(8000, vec![0.1; 4])).unwrap();
        let mut e = engine(1000);
        let err = e.compute(&format!("wave({:?})", path.to_str().unwrap())).unwrap_err();
        assert!(err.is_script(), "{err}");
    }

    #[test]
    fn writing_or_playing_nothing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut e = engine(1000);
        assert!(e.write_wav(&dir.path().join("x.wav")).is_err());
        assert!(matches!(e.play(-1), Err(EngineError::NoSignal(_))));
    }
}
