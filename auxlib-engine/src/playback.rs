//! Device playback of a rendered signal.
//!
//! A `cpal::Stream` cannot cross threads, so each playback owns a small
//! thread that builds the stream, reports whether it started, then parks
//! until the signal runs out or the [`Playback`] handle is dropped.
//!
//! Output channel `i` takes signal channel `i % k`; when the device rate
//! differs from the signal rate the cursor steps through the signal with
//! linear interpolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use auxlib_core::{dsp, Signals};

use crate::error::EngineError;

/// Longest time `start` waits for the device to confirm the stream is running.
/// Callers holding a lock across `start` hold it this long at worst.
pub const START_TIMEOUT: Duration = Duration::from_millis(1500);

/// A running playback. Dropping it stops the stream.
#[derive(Debug)]
pub struct Playback {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Playback {
    /// True once every frame has been handed to the device.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Block until the signal has played out.
    pub fn wait(mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Read position over planar channels, resampling on the fly.
#[cfg_attr(not(feature = "realtime"), allow(dead_code))]
struct Cursor {
    chans: Vec<Vec<f64>>,
    len: usize,
    pos: f64,
    step: f64,
}

#[cfg_attr(not(feature = "realtime"), allow(dead_code))]
impl Cursor {
    fn new(sig: &Signals, device_rate: u32) -> Self {
        let chans: Vec<Vec<f64>> = sig.links().map(Signals::first_channel).collect();
        let len = chans.iter().map(Vec::len).max().unwrap_or(0);
        let step = f64::from(sig.fs()) / f64::from(device_rate.max(1));
        Self { chans, len, pos: 0.0, step }
    }

    #[inline]
    fn finished(&self) -> bool {
        self.pos >= self.len as f64
    }

    fn sample(&self, out_ch: usize) -> f64 {
        if self.chans.is_empty() {
            return 0.0;
        }
        let c = &self.chans[out_ch % self.chans.len()];
        let i = self.pos as usize;
        let a = c.get(i).copied().unwrap_or(0.0);
        let b = c.get(i + 1).copied().unwrap_or(0.0);
        dsp::lerp(a, b, self.pos - i as f64)
    }

    /// Fill one interleaved device frame and advance.
    fn fill(&mut self, frame: &mut [f64]) {
        if self.finished() {
            frame.fill(0.0);
            return;
        }
        for (ch, out) in frame.iter_mut().enumerate() {
            *out = self.sample(ch).clamp(-1.0, 1.0);
        }
        self.pos += self.step;
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        use std::sync::mpsc;

        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        const POLL: Duration = Duration::from_millis(20);

        /// Names of the host's output devices, in the order `device` ids use.
        pub fn output_devices() -> Result<Vec<String>, EngineError> {
            let host = cpal::default_host();
            let devices = host.output_devices().map_err(|e| EngineError::Playback(e.to_string()))?;
            Ok(devices.map(|d| d.name().unwrap_or_else(|_| "<unnamed>".into())).collect())
        }

        fn pick_device(device: i32) -> Result<cpal::Device, String> {
            let host = cpal::default_host();
            match usize::try_from(device) {
                Err(_) => host.default_output_device().ok_or_else(|| "no default output device".into()),
                Ok(n) => host
                    .output_devices()
                    .map_err(|e| e.to_string())?
                    .nth(n)
                    .ok_or_else(|| format!("no output device with id {n}")),
            }
        }

        fn build_stream<T>(
            device: &cpal::Device,
            cfg: &cpal::StreamConfig,
            mut cursor: Cursor,
            done: Arc<AtomicBool>,
        ) -> Result<cpal::Stream, String>
        where
            T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
        {
            let channels = usize::from(cfg.channels.max(1));
            let mut frame = vec![0.0; channels];
            let err_fn = |e: cpal::StreamError| tracing::warn!(%e, "output stream error");
            device
                .build_output_stream(
                    cfg,
                    move |output: &mut [T], _| {
                        for out in output.chunks_mut(channels) {
                            cursor.fill(&mut frame);
                            for (o, s) in out.iter_mut().zip(&frame) {
                                *o = T::from_sample(*s as f32);
                            }
                        }
                        if cursor.finished() {
                            done.store(true, Ordering::Release);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| e.to_string())
        }

        fn run(
            sig: Signals,
            device: i32,
            stop: &AtomicBool,
            done: Arc<AtomicBool>,
            started: &mpsc::Sender<Result<String, String>>,
        ) {
            let stream = pick_device(device).and_then(|dev| {
                let sup = dev.default_output_config().map_err(|e| e.to_string())?;
                let format = sup.sample_format();
                let cfg = sup.config();
                let cursor = Cursor::new(&sig, cfg.sample_rate.0);
                let stream = match format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(&dev, &cfg, cursor, done.clone())?,
                    cpal::SampleFormat::I16 => build_stream::<i16>(&dev, &cfg, cursor, done.clone())?,
                    cpal::SampleFormat::U16 => build_stream::<u16>(&dev, &cfg, cursor, done.clone())?,
                    other => return Err(format!("unsupported device sample format: {other:?}")),
                };
                stream.play().map_err(|e| e.to_string())?;
                Ok((stream, dev.name().unwrap_or_default()))
            });
            let stream = match stream {
                Ok((s, name)) => {
                    let _ = started.send(Ok(name));
                    s
                }
                Err(e) => {
                    let _ = started.send(Err(e));
                    return;
                }
            };
            while !stop.load(Ordering::Acquire) && !done.load(Ordering::Acquire) {
                std::thread::sleep(POLL);
            }
            // let the device drain its last buffer
            std::thread::sleep(POLL);
            drop(stream);
        }

        /// Start playing `sig` on output device `device` (< 0: default).
        pub fn start(sig: &Signals, device: i32) -> Result<Playback, EngineError> {
            if sig.is_empty() {
                return Err(EngineError::NoSignal("nothing to play: the signal is empty"));
            }
            let stop = Arc::new(AtomicBool::new(false));
            let done = Arc::new(AtomicBool::new(false));
            let (tx, rx) = mpsc::channel();
            let thread = {
                let sig = sig.clone();
                let stop = stop.clone();
                let done = done.clone();
                std::thread::Builder::new()
                    .name("auxlib-playback".into())
                    .spawn(move || run(sig, device, &stop, done, &tx))
                    .map_err(|e| EngineError::Playback(e.to_string()))?
            };
            let playback = Playback { stop, done, thread: Some(thread) };
            match rx.recv_timeout(START_TIMEOUT) {
                Ok(Ok(name)) => {
                    tracing::debug!(device = %name, len = sig.len(), "playback started");
                    Ok(playback)
                }
                Ok(Err(e)) => Err(EngineError::Playback(e)),
                Err(_) => Err(EngineError::Playback("output device did not start in time".into())),
            }
        }
    } else {
        pub fn output_devices() -> Result<Vec<String>, EngineError> {
            Ok(Vec::new())
        }

        pub fn start(sig: &Signals, _device: i32) -> Result<Playback, EngineError> {
            if sig.is_empty() {
                return Err(EngineError::NoSignal("nothing to play: the signal is empty"));
            }
            Err(EngineError::Playback("built without device playback support".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_channels_over_wider_devices() {
        let sig = Signals::from_channels(10, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        let mut c = Cursor::new(&sig, 10);
        let mut frame = [0.0; 3];
        c.fill(&mut frame);
        assert_eq!(frame, [0.1, 0.3, 0.1]);
        c.fill(&mut frame);
        assert_eq!(frame, [0.2, 0.4, 0.2]);
        assert!(c.finished());
        c.fill(&mut frame);
        assert_eq!(frame, [0.0; 3]);
    }

    #[test]
    fn cursor_interpolates_when_upsampling() {
        let sig = Signals::from_samples(10, vec![0.0, 1.0]);
        let mut c = Cursor::new(&sig, 20);
        let mut frame = [0.0; 1];
        c.fill(&mut frame);
        c.fill(&mut frame);
        assert!((frame[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn start_wait_stays_short() {
        assert!(START_TIMEOUT <= Duration::from_secs(2));
    }

    #[test]
    fn empty_signal_does_not_start() {
        let err = start(&Signals::empty(8000), -1).unwrap_err();
        assert!(matches!(err, EngineError::NoSignal(_)));
    }
}
