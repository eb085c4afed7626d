//! Registry plus last-error channel: the state behind every C entry point.
//!
//! Each operation returns a `Result`; failures are written to the error
//! channel before they are handed back, so the C layer only has to map them
//! to sentinels. Successful calls never touch the channel.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use auxlib_engine::{EngineConfig, PathCategory, SignalEngine};

use crate::error::AuxError;
use crate::error_channel::ErrorChannel;
use crate::registry::{Handle, Registry};

/// Outcome of a non-empty evaluation. Views of the samples go stale on the
/// next evaluation or destruction of the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    handle: Handle,
    generation: u64,
    pub channels: usize,
    /// Samples per channel.
    pub len: usize,
}

impl Evaluation {
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

/// Properties readable through `aux_get_info`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Property {
    WavePath,
    AuxPath,
    DataPath,
    Fs,
}

impl FromStr for Property {
    type Err = AuxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wavepath" => Ok(Property::WavePath),
            "auxpath" => Ok(Property::AuxPath),
            "datapath" => Ok(Property::DataPath),
            "fs" => Ok(Property::Fs),
            _ => Err(AuxError::UnknownProperty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    Path(String),
    Rate(u32),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Path(p) => f.write_str(p),
            InfoValue::Rate(r) => write!(f, "{r}"),
        }
    }
}

/// Optional path overrides applied at creation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Paths<'a> {
    pub wav: Option<&'a str>,
    pub aux: Option<&'a str>,
    pub data: Option<&'a str>,
}

pub struct Session<E> {
    config: EngineConfig,
    registry: Registry<E>,
    errors: ErrorChannel,
}

impl<E> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("last_error", &self.errors.message())
            .finish_non_exhaustive()
    }
}

impl<E: SignalEngine> Session<E> {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, registry: Registry::new(), errors: ErrorChannel::default() }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &Registry<E> {
        &self.registry
    }

    #[inline]
    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Write a failure to the error channel and pass it on.
    pub fn report<T>(&mut self, res: Result<T, AuxError>) -> Result<T, AuxError> {
        if let Err(e) = &res {
            tracing::warn!(code = e.code(), "{e}");
            self.errors.set(&e.to_string());
        }
        res
    }

    /// Build and register a new instance. Nothing is allocated unless every
    /// step succeeds.
    pub fn create(&mut self, sample_rate: i32, paths: Paths<'_>) -> Result<Handle, AuxError> {
        let res = self.try_create(sample_rate, paths);
        self.report(res)
    }

    fn try_create(&mut self, sample_rate: i32, paths: Paths<'_>) -> Result<Handle, AuxError> {
        let rate = u32::try_from(sample_rate).ok().filter(|&r| r > 1);
        let mut engine = E::new(&self.config, rate)?;
        for (category, path) in [
            (PathCategory::Wav, paths.wav),
            (PathCategory::Aux, paths.aux),
            (PathCategory::Data, paths.data),
        ] {
            if let Some(p) = path {
                engine.set_path(category, p)?;
            }
        }
        let fs = engine.sample_rate();
        let handle = self.registry.insert(engine)?;
        tracing::debug!(handle, fs, "instance created");
        Ok(handle)
    }

    /// Drop an instance. Never fails and never touches the error channel.
    pub fn destroy(&mut self, handle: Handle) {
        if self.registry.remove(handle) {
            tracing::debug!(handle, "instance destroyed");
        }
    }

    /// Run `script` on `handle` and fold the result for the host.
    /// `Ok(None)` is the empty outcome.
    pub fn evaluate(&mut self, handle: Handle, script: &str) -> Result<Option<Evaluation>, AuxError> {
        let res = self.try_evaluate(handle, script);
        self.report(res)
    }

    fn try_evaluate(&mut self, handle: Handle, script: &str) -> Result<Option<Evaluation>, AuxError> {
        let (engine, cache, generation) = self.registry.begin_evaluation(handle)?;
        cache.store(engine.compute(script)?);
        let (channels, len) = cache.fold();
        tracing::debug!(handle, channels, len, "evaluated");
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(Evaluation { handle, generation, channels, len }))
    }

    /// Planar samples behind `eval`, or `None` once it has gone stale.
    pub fn samples(&self, eval: &Evaluation) -> Option<&[f64]> {
        let buf = self.registry.cache_at(eval.handle, eval.generation)?.buffer()?;
        buf.get(..eval.channels * eval.len)
    }

    /// Start playing the native signal of `handle`.
    pub fn play(&mut self, handle: Handle, device: i32) -> Result<(), AuxError> {
        let res = self
            .registry
            .get_mut(handle)
            .and_then(|e| e.play(device).map_err(AuxError::from));
        self.report(res)
    }

    /// Write the native signal of `handle` to a wave file.
    pub fn persist(&mut self, handle: Handle, path: &Path) -> Result<(), AuxError> {
        let res = self
            .registry
            .get(handle)
            .and_then(|e| e.write_wav(path).map_err(AuxError::from));
        if res.is_ok() {
            tracing::debug!(handle, path = %path.display(), "native signal written");
        }
        self.report(res)
    }

    /// Read a property. The handle is checked before the name.
    pub fn get_info(&mut self, handle: Handle, name: &str) -> Result<InfoValue, AuxError> {
        let res = self.registry.get(handle).and_then(|e| {
            Ok(match name.parse::<Property>()? {
                Property::WavePath => InfoValue::Path(e.path(PathCategory::Wav).to_owned()),
                Property::AuxPath => InfoValue::Path(e.path(PathCategory::Aux).to_owned()),
                Property::DataPath => InfoValue::Path(e.path(PathCategory::Data).to_owned()),
                Property::Fs => InfoValue::Rate(e.sample_rate()),
            })
        });
        self.report(res)
    }
}
