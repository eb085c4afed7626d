//! Rhai front end.
//!
//! A script is a Rhai program whose final value is the result. The built-ins
//! below build and transform [`Signals`]; durations are milliseconds and the
//! sample rate is the instance rate held in the shared [`ScriptContext`].
//!
//! Failures are split in two: anything the script author can fix (syntax,
//! unknown names, bad arguments, `throw`) is [`EngineError::Script`]; hitting
//! an interpreter limit is [`EngineError::Internal`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use auxlib_core::dsp;
use auxlib_core::envelopes::{self, AdsrLinear};
use auxlib_core::filters::{OnePoleHP, OnePoleLP, SvfMode, SvfTpt};
use auxlib_core::{SignalError, Signals};
use parking_lot::RwLock;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ParseErrorType, Scope, FLOAT, INT};

use crate::config::ScriptLimits;
use crate::error::EngineError;
use crate::nodes::{self, Osc, PanLaw, Wave};
use crate::wav;

type FnResult<T> = Result<T, Box<EvalAltResult>>;

/// Per-instance state the built-ins read.
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub fs: u32,
    pub wav_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Longest signal a built-in may create, in samples.
    pub max_len: usize,
}

pub type SharedContext = Arc<RwLock<ScriptContext>>;

impl ScriptContext {
    fn samples(&self, ms: &Dynamic) -> FnResult<usize> {
        let ms = num(ms, "duration")?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(format!("duration must be a non-negative number of milliseconds, got {ms}").into());
        }
        let n = dsp::ms_to_samples(ms, self.fs);
        self.check_len(n)?;
        Ok(n)
    }

    fn check_len(&self, n: usize) -> FnResult<()> {
        if n > self.max_len {
            return Err(format!(
                "signal too long: {:.0} ms exceeds the {:.0} ms limit",
                dsp::samples_to_ms(n, self.fs),
                dsp::samples_to_ms(self.max_len, self.fs)
            )
            .into());
        }
        Ok(())
    }
}

fn num(v: &Dynamic, what: &str) -> FnResult<FLOAT> {
    v.as_float()
        .or_else(|_| v.as_int().map(|i| i as FLOAT))
        .map_err(|t| format!("{what}: expected a number, got {t}").into())
}

fn resolve(dir: &Path, name: &str, ext: &str) -> PathBuf {
    let p = Path::new(name);
    let p = if p.is_relative() { dir.join(p) } else { p.to_path_buf() };
    if p.extension().is_none() { p.with_extension(ext) } else { p }
}

// --------------------------------- Signal math -----------------------------------

fn scale(mut a: Signals, k: FLOAT) -> Signals {
    a.map_segments(|seg| seg.iter_mut().for_each(|s| *s *= k));
    a
}

fn add_dc(mut a: Signals, x: FLOAT) -> Signals {
    a.map_channels(|v| v.into_iter().map(|s| s + x).collect());
    a
}

/// Channel-wise overlay; extra channels on either side are kept.
fn overlay(a: Signals, b: Signals) -> Signals {
    let fs = a.fs();
    let mut left = a.into_channels();
    for (i, r) in b.into_channels().into_iter().enumerate() {
        match left.get_mut(i) {
            Some(l) => l.overlay_first(&r),
            None => left.push(r),
        }
    }
    Signals::join(fs, left)
}

/// Pointwise product over the common extent. A mono side is broadcast.
fn modulate(a: &Signals, b: &Signals) -> FnResult<Signals> {
    let (na, nb) = (a.nchan(), b.nchan());
    if na != nb && na != 1 && nb != 1 {
        return Err(SignalError::ChannelMismatch { left: na, right: nb }.to_string().into());
    }
    let left: Vec<Vec<f64>> = a.links().map(Signals::first_channel).collect();
    let right: Vec<Vec<f64>> = b.links().map(Signals::first_channel).collect();
    let pick = |v: &[Vec<f64>], i: usize| if v.len() == 1 { 0 } else { i };
    let out = (0..na.max(nb))
        .map(|i| {
            let (l, r) = (&left[pick(&left, i)], &right[pick(&right, i)]);
            l.iter().zip(r).map(|(x, y)| x * y).collect()
        })
        .collect();
    Ok(Signals::from_channels(a.fs(), out))
}

fn then(a: Signals, mut b: Signals) -> Signals {
    b.delay(a.max_len());
    overlay(a, b)
}

fn peak_all(sig: &Signals) -> f64 {
    sig.links().map(|l| dsp::peak(&l.first_channel())).fold(0.0, f64::max)
}

fn first_link(sig: Signals) -> Signals {
    let fs = sig.fs();
    sig.into_channels().into_iter().next().unwrap_or_else(|| Signals::empty(fs))
}

// ----------------------------------- Engine -------------------------------------

/// Build a sandboxed interpreter with every built-in registered.
pub fn build_engine(limits: &ScriptLimits, ctx: &SharedContext) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);

    engine
        .on_print(|s| tracing::info!(target: "auxlib::script", "{s}"))
        .on_debug(|s, _, pos| tracing::debug!(target: "auxlib::script", %pos, "{s}"));

    engine.register_type_with_name::<Signals>("signal");

    register_generators(&mut engine, ctx);
    register_files(&mut engine, ctx);
    register_operators(&mut engine);
    register_time(&mut engine, ctx);
    register_shaping(&mut engine, ctx);
    register_channels(&mut engine);
    register_queries(&mut engine, ctx);

    engine
}

fn osc_fn(ctx: &SharedContext, wave: Wave) -> impl Fn(Dynamic, Dynamic) -> FnResult<Signals> + Send + Sync + 'static {
    let ctx = ctx.clone();
    move |freq, dur| {
        let c = ctx.read();
        let n = c.samples(&dur)?;
        let freq = num(&freq, "frequency")?;
        Ok(Signals::from_samples(c.fs, Osc::new(freq, wave).render(n, f64::from(c.fs))))
    }
}

fn register_generators(engine: &mut Engine, ctx: &SharedContext) {
    engine
        .register_fn("tone", osc_fn(ctx, Wave::Sine))
        .register_fn("sawtooth", osc_fn(ctx, Wave::Saw))
        .register_fn("triangle", osc_fn(ctx, Wave::Tri))
        .register_fn("square", osc_fn(ctx, Wave::Square));

    let c = ctx.clone();
    engine.register_fn("noise", move |dur: Dynamic| -> FnResult<Signals> {
        let c = c.read();
        Ok(Signals::from_samples(c.fs, nodes::white_noise(c.samples(&dur)?)))
    });
    let c = ctx.clone();
    engine.register_fn("silence", move |dur: Dynamic| -> FnResult<Signals> {
        let c = c.read();
        Ok(Signals::from_samples(c.fs, vec![0.0; c.samples(&dur)?]))
    });
    let c = ctx.clone();
    engine.register_fn("dc", move |value: Dynamic, dur: Dynamic| -> FnResult<Signals> {
        let c = c.read();
        let v = num(&value, "dc value")?;
        Ok(Signals::from_samples(c.fs, vec![v; c.samples(&dur)?]))
    });
}

fn register_files(engine: &mut Engine, ctx: &SharedContext) {
    let c = ctx.clone();
    engine.register_fn("wave", move |name: &str| -> FnResult<Signals> {
        let c = c.read();
        let path = resolve(&c.wav_dir, name, "wav");
        let sig = wav::read(&path)?;
        if sig.fs() != c.fs {
            return Err(SignalError::RateMismatch { left: sig.fs(), right: c.fs }.to_string().into());
        }
        c.check_len(sig.max_len())?;
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn("data", move |name: &str| -> FnResult<Signals> {
        let c = c.read();
        let values = wav::read_data(&resolve(&c.data_dir, name, "txt"))?;
        c.check_len(values.len())?;
        Ok(Signals::from_samples(c.fs, values))
    });
}

macro_rules! register_scalar_ops {
    ($engine:ident, $t:ty) => {
        $engine
            .register_fn("+", |a: Signals, x: $t| add_dc(a, x as FLOAT))
            .register_fn("+", |x: $t, a: Signals| add_dc(a, x as FLOAT))
            .register_fn("-", |a: Signals, x: $t| add_dc(a, -(x as FLOAT)))
            .register_fn("-", |x: $t, a: Signals| add_dc(scale(a, -1.0), x as FLOAT))
            .register_fn("*", |a: Signals, x: $t| scale(a, x as FLOAT))
            .register_fn("*", |x: $t, a: Signals| scale(a, x as FLOAT));
    };
}

#[allow(clippy::unnecessary_cast)]
fn register_operators(engine: &mut Engine) {
    engine
        .register_fn("+", overlay)
        .register_fn("-", |a: Signals, b: Signals| overlay(a, scale(b, -1.0)))
        .register_fn("-", |a: Signals| scale(a, -1.0))
        .register_fn("*", |a: Signals, b: Signals| modulate(&a, &b));
    register_scalar_ops!(engine, FLOAT);
    register_scalar_ops!(engine, INT);
}

fn register_time(engine: &mut Engine, ctx: &SharedContext) {
    let c = ctx.clone();
    engine.register_fn("delay", move |mut sig: Signals, ms: Dynamic| -> FnResult<Signals> {
        let c = c.read();
        let n = c.samples(&ms)?;
        c.check_len(sig.max_len() + n)?;
        sig.delay(n);
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn("then", move |a: Signals, b: Signals| -> FnResult<Signals> {
        c.read().check_len(a.max_len() + b.max_len())?;
        Ok(then(a, b))
    });
    engine.register_fn("reverse", |mut sig: Signals| {
        sig.map_channels(|mut v| {
            v.reverse();
            v
        });
        sig
    });
    let c = ctx.clone();
    engine.register_fn("extract", move |mut sig: Signals, from: Dynamic, to: Dynamic| -> FnResult<Signals> {
        let c = c.read();
        let (a, b) = (c.samples(&from)?, c.samples(&to)?);
        if b < a {
            return Err(format!("extract: end ({}) comes before start ({})", num(&to, "end")?, num(&from, "start")?).into());
        }
        sig.map_channels(|v| v[a.min(v.len())..b.min(v.len())].to_vec());
        Ok(sig)
    });
}

fn register_shaping(engine: &mut Engine, ctx: &SharedContext) {
    let c = ctx.clone();
    engine.register_fn("lpf", move |mut sig: Signals, hz: Dynamic| -> FnResult<Signals> {
        let (hz, sr) = (num(&hz, "cutoff")?, f64::from(c.read().fs));
        sig.map_channels(|mut v| {
            OnePoleLP::new(hz, sr).process_block(&mut v);
            v
        });
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn("hpf", move |mut sig: Signals, hz: Dynamic| -> FnResult<Signals> {
        let (hz, sr) = (num(&hz, "cutoff")?, f64::from(c.read().fs));
        sig.map_channels(|mut v| {
            OnePoleHP::new(hz, sr).process_block(&mut v);
            v
        });
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn("bpf", move |mut sig: Signals, hz: Dynamic, q: Dynamic| -> FnResult<Signals> {
        let (hz, q, sr) = (num(&hz, "center")?, num(&q, "q")?, f64::from(c.read().fs));
        sig.map_channels(|mut v| {
            SvfTpt::new(hz, q, sr).process_block(&mut v, SvfMode::Bandpass);
            v
        });
        Ok(sig)
    });
    engine.register_fn("gain_db", |sig: Signals, db: Dynamic| -> FnResult<Signals> {
        Ok(scale(sig, dsp::db_to_lin(num(&db, "gain")?)))
    });
    let c = ctx.clone();
    engine.register_fn("fade_in", move |mut sig: Signals, ms: Dynamic| -> FnResult<Signals> {
        let n = c.read().samples(&ms)?;
        sig.map_channels(|mut v| {
            envelopes::fade_in(&mut v, n);
            v
        });
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn("fade_out", move |mut sig: Signals, ms: Dynamic| -> FnResult<Signals> {
        let n = c.read().samples(&ms)?;
        sig.map_channels(|mut v| {
            envelopes::fade_out(&mut v, n);
            v
        });
        Ok(sig)
    });
    let c = ctx.clone();
    engine.register_fn(
        "adsr",
        move |mut sig: Signals, a: Dynamic, d: Dynamic, s: Dynamic, r: Dynamic| -> FnResult<Signals> {
            let c = c.read();
            let (a, d, s) = (num(&a, "attack")?, num(&d, "decay")?, num(&s, "sustain")?);
            let release = c.samples(&r)?;
            let env = AdsrLinear::new(a, d, s, dsp::samples_to_ms(release, c.fs), f64::from(c.fs));
            sig.map_channels(|mut v| {
                env.apply(&mut v, release);
                v
            });
            Ok(sig)
        },
    );
    engine.register_fn("normalize", |sig: Signals| {
        let p = peak_all(&sig);
        if p > 0.0 { scale(sig, 1.0 / p) } else { sig }
    });
    engine.register_fn("clip", |mut sig: Signals| {
        sig.map_channels(|v| v.into_iter().map(dsp::soft_clip).collect());
        sig
    });
}

fn register_channels(engine: &mut Engine) {
    engine.register_fn("stereo", |l: Signals, r: Signals| {
        let fs = l.fs();
        Signals::join(fs, vec![first_link(l), first_link(r)])
    });
    engine.register_fn("channels", |list: Array| -> FnResult<Signals> {
        let mut links = Vec::new();
        let mut fs = 0;
        for (i, item) in list.into_iter().enumerate() {
            let type_name = item.type_name();
            let sig = item
                .try_cast::<Signals>()
                .ok_or_else(|| format!("channels: element {i} is a {type_name}, not a signal"))?;
            fs = sig.fs();
            links.extend(sig.into_channels());
        }
        if links.is_empty() {
            return Err("channels: needs at least one signal".into());
        }
        Ok(Signals::join(fs, links))
    });
    engine.register_fn("chan", |sig: Signals, i: INT| -> FnResult<Signals> {
        let index = usize::try_from(i).map_err(|_| format!("chan: index must not be negative, got {i}"))?;
        sig.channel(index).map_err(|e| e.to_string().into())
    });
    engine.register_fn("nchan", |sig: Signals| sig.nchan() as INT);
    engine.register_fn("pan", |sig: Signals, pos: Dynamic| -> FnResult<Signals> {
        let (gl, gr) = PanLaw::gains(num(&pos, "pan position")?);
        let fs = sig.fs();
        let mono = first_link(sig);
        Ok(Signals::join(fs, vec![scale(mono.clone(), gl), scale(mono, gr)]))
    });
}

fn register_queries(engine: &mut Engine, ctx: &SharedContext) {
    engine.register_fn("len", |sig: Signals| sig.len() as INT);
    engine.register_fn("dur", |sig: Signals| dsp::samples_to_ms(sig.len(), sig.fs()));
    let c = ctx.clone();
    engine.register_fn("fs", move || INT::from(c.read().fs));
}

// --------------------------------- Evaluation -----------------------------------

fn hits_limit(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorInFunctionCall(.., inner, _) | EvalAltResult::ErrorInModule(.., inner, _) => {
            hits_limit(inner)
        }
        EvalAltResult::ErrorParsing(ParseErrorType::ExprTooDeep, _)
        | EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorDataTooLarge(..)
        | EvalAltResult::ErrorTooManyModules(..)
        | EvalAltResult::ErrorTerminated(..) => true,
        _ => false,
    }
}

fn classify(err: Box<EvalAltResult>) -> EngineError {
    if hits_limit(&err) {
        EngineError::Internal(format!("script stopped at an interpreter limit: {err}"))
    } else {
        EngineError::Script(err.to_string())
    }
}

/// Compile and run `script`, returning its final value.
pub fn run(engine: &Engine, script: &str) -> Result<Dynamic, EngineError> {
    let ast = engine.compile(script).map_err(|e| classify(e.into()))?;
    let mut scope = Scope::new();
    engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast).map_err(classify)
}

/// Turn a script's final value into a signal.
pub fn into_signal(engine: &Engine, value: Dynamic, fs: u32) -> Result<Signals, EngineError> {
    if value.is_unit() {
        return Ok(Signals::empty(fs));
    }
    if let Ok(x) = num(&value, "result") {
        return Ok(Signals::from_samples(fs, vec![x]));
    }
    if value.is_array() {
        let samples = value
            .cast::<Array>()
            .iter()
            .map(|v| num(v, "result array").map_err(|e| EngineError::Script(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Signals::from_samples(fs, samples));
    }
    let type_name = engine.map_type_name(value.type_name()).to_string();
    value.try_cast::<Signals>().ok_or_else(|| {
        EngineError::Script(format!(
            "a script must end in a signal, a number or an array of numbers, not {type_name}"
        ))
    })
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(fs: u32) -> (Engine, SharedContext) {
        let ctx = Arc::new(RwLock::new(ScriptContext {
            fs,
            wav_dir: PathBuf::new(),
            data_dir: PathBuf::new(),
            max_len: fs as usize * 10,
        }));
        (build_engine(&ScriptLimits::default(), &ctx), ctx)
    }

    fn eval(engine: &Engine, src: &str) -> Result<Signals, EngineError> {
        let v = run(engine, src)?;
        into_signal(engine, v, 1000)
    }

    #[test]
    fn generators_honor_duration_and_rate() {
        let (e, _) = setup(1000);
        let s = eval(&e, "tone(100, 50)").unwrap();
        assert_eq!(s.len(), 50);
        assert_eq!(s.fs(), 1000);
        assert_eq!(eval(&e, "silence(20.5)").unwrap().len(), 21);
        assert_eq!(eval(&e, "dc(0.5, 3)").unwrap().first_channel(), vec![0.5; 3]);
    }

    #[test]
    fn periodic_generators_and_noise() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "sawtooth(250, 4)").unwrap().first_channel(), vec![-1.0, -0.5, 0.0, 0.5]);
        assert_eq!(eval(&e, "triangle(250, 4)").unwrap().first_channel(), vec![-1.0, 0.0, 1.0, 0.0]);
        assert_eq!(eval(&e, "square(250.0, 4)").unwrap().first_channel(), vec![1.0, 1.0, -1.0, -1.0]);

        let n = eval(&e, "noise(50)").unwrap().first_channel();
        assert_eq!(n.len(), 50);
        assert!(n.iter().all(|s| s.abs() <= 1.0));
        assert!(n.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn reverse_and_extract_flatten_time_chains() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "reverse(delay(dc(1, 2), 1))").unwrap().first_channel(), vec![1.0, 1.0, 0.0]);
        let st = eval(&e, "reverse(stereo(then(dc(1, 1), dc(2, 1)), dc(3, 2)))").unwrap();
        assert_eq!(st.first_channel(), vec![2.0, 1.0]);
        assert_eq!(st.channel(1).unwrap().first_channel(), vec![3.0, 3.0]);

        assert_eq!(eval(&e, "extract(dc(1, 3), 2, 100)").unwrap().first_channel(), vec![1.0]);
        assert_eq!(eval(&e, "extract(then(dc(1, 1), dc(2, 2)), 1, 3)").unwrap().first_channel(), vec![2.0, 2.0]);
        assert!(eval(&e, "extract(dc(1, 3), 5, 100)").unwrap().is_empty());
        assert!(eval(&e, "extract(dc(1, 3), 4, 2)").unwrap_err().is_script());
    }

    #[test]
    fn filters_settle_on_a_constant_input() {
        let (e, _) = setup(1000);
        let lp = eval(&e, "lpf(dc(1, 1000), 10)").unwrap().first_channel();
        assert!(lp[0] > 0.0 && lp[0] < 0.5, "lp[0]={}", lp[0]);
        assert!(lp[999] > 0.99, "lp[999]={}", lp[999]);

        let hp = eval(&e, "hpf(dc(1, 1000), 20.0)").unwrap().first_channel();
        assert!((hp[0] - 1.0).abs() < 1e-12);
        assert!(hp[999].abs() < 1e-3, "hp[999]={}", hp[999]);

        let bp = eval(&e, "bpf(dc(1, 1000), 100, 0.707)").unwrap().first_channel();
        assert!(bp[999].abs() < 1e-2, "bp[999]={}", bp[999]);

        let delayed = eval(&e, "lpf(delay(dc(1, 5), 5), 10)").unwrap().first_channel();
        assert_eq!(delayed.len(), 10);
        assert!(delayed[..5].iter().all(|s| *s == 0.0));
        assert!(delayed[5] > 0.0);

        assert!(eval(&e, "lpf(dc(1, 2), \"low\")").unwrap_err().is_script());
    }

    #[test]
    fn gain_and_fades() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "gain_db(dc(0.5, 2), 0)").unwrap().first_channel(), vec![0.5; 2]);
        let g = eval(&e, "gain_db(delay(dc(1, 1), 1), -20)").unwrap().first_channel();
        assert_eq!(g.len(), 2);
        assert_eq!(g[0], 0.0);
        assert!((g[1] - 0.1).abs() < 1e-12, "g[1]={}", g[1]);

        let fi = eval(&e, "fade_in(dc(1, 5), 5)").unwrap().first_channel();
        let want = [0.0, 0.2, 0.4, 0.6, 0.8];
        assert!(fi.iter().zip(want).all(|(a, b)| (a - b).abs() < 1e-12), "{fi:?}");
        let fo = eval(&e, "fade_out(dc(1, 5), 5)").unwrap().first_channel();
        let want = [0.8, 0.6, 0.4, 0.2, 0.0];
        assert!(fo.iter().zip(want).all(|(a, b)| (a - b).abs() < 1e-12), "{fo:?}");
        let chained = eval(&e, "fade_in(delay(dc(1, 2), 2), 4)").unwrap().first_channel();
        assert_eq!(chained, vec![0.0, 0.0, 0.5, 0.75]);
    }

    #[test]
    fn adsr_normalize_and_clip() {
        let (e, _) = setup(1000);
        let env = eval(&e, "adsr(dc(1, 1000), 10, 10, 0.5, 100)").unwrap().first_channel();
        assert!(env[0] > 0.0 && env[0] < 0.2);
        assert!((env[500] - 0.5).abs() < 1e-9);
        assert!(env[999] < 0.01);

        let n = eval(&e, "normalize(dc(0.5, 2) + delay(dc(-1, 1), 1))").unwrap().first_channel();
        assert_eq!(n, vec![1.0, -1.0]);
        let st = eval(&e, "normalize(stereo(dc(0.25, 1), dc(-0.5, 1)))").unwrap();
        assert_eq!(st.first_channel(), vec![0.5]);
        assert_eq!(st.channel(1).unwrap().first_channel(), vec![-1.0]);
        assert_eq!(eval(&e, "normalize(silence(3))").unwrap().first_channel(), vec![0.0; 3]);

        let c = eval(&e, "clip(dc(10, 2))").unwrap().first_channel();
        assert!(c.iter().all(|s| *s < 1.0 && *s > 0.999));
        assert_eq!(eval(&e, "clip(dc(0, 1))").unwrap().first_channel(), vec![0.0]);
    }

    #[test]
    fn duration_query() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "dur(silence(250))").unwrap().first_channel(), vec![250.0]);
        assert_eq!(eval(&e, "dur(delay(dc(1, 10), 5))").unwrap().first_channel(), vec![15.0]);
    }

    #[test]
    fn overlay_sums_and_extends() {
        let (e, _) = setup(1000);
        let s = eval(&e, "dc(1, 2) + delay(dc(2, 2), 1)").unwrap();
        assert_eq!(s.first_channel(), vec![1.0, 3.0, 2.0]);
        let t = eval(&e, "then(dc(1, 1), dc(2, 2))").unwrap();
        assert_eq!(t.first_channel(), vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn scalar_operators_work_with_ints_and_floats() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "dc(1, 2) * 3").unwrap().first_channel(), vec![3.0; 2]);
        assert_eq!(eval(&e, "0.5 * dc(1, 2)").unwrap().first_channel(), vec![0.5; 2]);
        assert_eq!(eval(&e, "1 - dc(0.25, 1)").unwrap().first_channel(), vec![0.75]);
        assert_eq!(eval(&e, "-dc(1, 1)").unwrap().first_channel(), vec![-1.0]);
    }

    #[test]
    fn channel_builtins() {
        let (e, _) = setup(1000);
        let s = eval(&e, "channels([dc(1, 2), dc(2, 2), dc(3, 1)])").unwrap();
        assert_eq!(s.nchan(), 3);
        assert_eq!(eval(&e, "chan(stereo(dc(1, 1), dc(2, 1)), 1)").unwrap().first_channel(), vec![2.0]);
        let p = eval(&e, "pan(dc(1, 1), -1)").unwrap();
        assert_eq!(p.nchan(), 2);
        assert!((p.first_channel()[0] - 1.0).abs() < 1e-12);
        assert!(p.channel(1).unwrap().first_channel()[0].abs() < 1e-12);
    }

    #[test]
    fn result_conversion() {
        let (e, _) = setup(1000);
        assert_eq!(eval(&e, "42").unwrap().first_channel(), vec![42.0]);
        assert_eq!(eval(&e, "[1, 2.5]").unwrap().first_channel(), vec![1.0, 2.5]);
        assert!(eval(&e, "let x = 1;").unwrap().is_empty());
        assert!(eval(&e, "\"text\"").unwrap_err().is_script());
    }

    #[test]
    fn script_mistakes_are_script_errors() {
        let (e, _) = setup(1000);
        assert!(eval(&e, "tone(440,").unwrap_err().is_script());
        assert!(eval(&e, "no_such_builtin(1)").unwrap_err().is_script());
        assert!(eval(&e, "throw \"boom\"").unwrap_err().is_script());
        assert!(eval(&e, "chan(dc(1, 1), 3)").unwrap_err().is_script());
        assert!(eval(&e, "silence(-5)").unwrap_err().is_script());
        // longer than the 10 s limit
        assert!(eval(&e, "silence(20000)").unwrap_err().is_script());
    }

    #[test]
    fn runaway_scripts_hit_the_operation_limit() {
        let ctx = Arc::new(RwLock::new(ScriptContext {
            fs: 1000,
            wav_dir: PathBuf::new(),
            data_dir: PathBuf::new(),
            max_len: 1000,
        }));
        let limits = ScriptLimits { max_operations: 1000, ..ScriptLimits::default() };
        let e = build_engine(&limits, &ctx);
        let err = run(&e, "loop { }").unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)), "{err}");
    }

    #[test]
    fn rate_follows_context() {
        let (e, ctx) = setup(1000);
        ctx.write().fs = 2000;
        assert_eq!(eval(&e, "fs()").unwrap().first_channel(), vec![2000.0]);
        assert_eq!(eval(&e, "len(silence(10))").unwrap().first_channel(), vec![20.0]);
    }
}
