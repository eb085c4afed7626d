//! Multi-channel signal container.
//!
//! A [`Signals`] value is the first channel of a signal plus an optional chain
//! of further channels (`next`). Each channel is itself a *time chain*: a list
//! of [`Segment`]s placed at sample offsets, so delays and concatenations do
//! not have to materialize silence until someone asks for a flat buffer.
//!
//! Two shapes matter to callers:
//! - **linked**: what the engine produces. One channel per link, time chains
//!   allowed anywhere.
//! - **chainless**: what the host reads. A single segment at offset 0 holding
//!   `channels` planar blocks of `len()` samples each, and no links. Built with
//!   [`Signals::make_chainless`], [`Signals::detach_next_chan`] and
//!   [`Signals::append_channel`].

use core::iter;

use thiserror::Error;

/// Errors raised by structural operations on [`Signals`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("channel index {index} out of range (signal has {count} channels)")]
    ChannelOutOfRange { index: usize, count: usize },
    #[error("channel count mismatch: {left} vs {right}")]
    ChannelMismatch { left: usize, right: usize },
    #[error("sample rate mismatch: {left} Hz vs {right} Hz")]
    RateMismatch { left: u32, right: u32 },
}

/// A run of samples starting at `offset` on the channel's time axis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segment {
    pub offset: usize,
    pub samples: Vec<f64>,
}

impl Segment {
    #[inline]
    pub fn new(offset: usize, samples: Vec<f64>) -> Self {
        Self { offset, samples }
    }

    /// One past the last sample this segment covers.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.samples.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signals {
    fs: u32,
    /// Planar blocks stored in the single segment; 1 unless folded.
    channels: usize,
    segments: Vec<Segment>,
    next: Option<Box<Signals>>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::empty(0)
    }
}

impl Signals {
    /// Zero-length mono signal at `fs`.
    pub fn empty(fs: u32) -> Self {
        Self { fs, channels: 1, segments: Vec::new(), next: None }
    }

    /// Mono signal from contiguous samples starting at time zero.
    pub fn from_samples(fs: u32, samples: Vec<f64>) -> Self {
        let mut s = Self::empty(fs);
        if !samples.is_empty() {
            s.segments.push(Segment::new(0, samples));
        }
        s
    }

    /// Linked multi-channel signal, one link per entry.
    pub fn from_channels(fs: u32, channels: Vec<Vec<f64>>) -> Self {
        Self::join(fs, channels.into_iter().map(|c| Self::from_samples(fs, c)).collect())
    }

    /// Link standalone channels back into one signal. Each entry keeps its
    /// own time chain; any chain already hanging off an entry is kept too.
    pub fn join(fs: u32, links: Vec<Signals>) -> Self {
        let mut links = links.into_iter();
        let mut head = links.next().unwrap_or_else(|| Self::empty(fs));
        for link in links {
            head.push_channel(link);
        }
        head
    }

    /// Split into standalone channels, one per link.
    pub fn into_channels(self) -> Vec<Signals> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(mut link) = cur {
            cur = link.next.take().map(|b| *b);
            out.push(link);
        }
        out
    }

    /// Longest channel, in samples.
    pub fn max_len(&self) -> usize {
        self.links().map(Signals::len).max().unwrap_or(0)
    }

    #[inline] pub fn fs(&self) -> u32 { self.fs }
    #[inline] pub fn segments(&self) -> &[Segment] { &self.segments }

    /// Total length in samples of the first channel, time chain included.
    pub fn len(&self) -> usize {
        if self.channels > 1 {
            return self.segments.first().map_or(0, |s| s.samples.len() / self.channels);
        }
        self.segments.iter().map(Segment::end).max().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the first channel is one contiguous run starting at zero.
    pub fn is_chainless(&self) -> bool {
        match self.segments.as_slice() {
            [] => true,
            [only] => only.offset == 0,
            _ => false,
        }
    }

    /// Number of channels: folded blocks plus every linked channel.
    pub fn nchan(&self) -> usize {
        self.links().map(|l| l.channels).sum()
    }

    /// This signal and every linked channel after it, in order.
    pub fn links(&self) -> impl Iterator<Item = &Signals> {
        iter::successors(Some(self), |s| s.next.as_deref())
    }

    /// Apply `f` to this link and each linked channel.
    pub fn for_each_link_mut(&mut self, mut f: impl FnMut(&mut Signals)) {
        let mut cur = Some(self);
        while let Some(link) = cur {
            f(link);
            cur = link.next.as_deref_mut();
        }
    }

    #[inline] pub fn next_chan(&self) -> Option<&Signals> { self.next.as_deref() }

    /// Unhook the channel chain, leaving `self` as a single channel.
    #[inline]
    pub fn detach_next_chan(&mut self) -> Option<Box<Signals>> {
        self.next.take()
    }

    /// Append `link` (and its own chain) after the last channel.
    pub fn push_channel(&mut self, link: Signals) {
        if let Some(node) = self.next.as_deref_mut() {
            node.push_channel(link);
        } else {
            self.next = Some(Box::new(link));
        }
    }

    /// Flatten the first channel's time chain into one buffer at offset 0.
    /// Overlapping segments are summed; gaps become silence.
    pub fn make_chainless(&mut self) {
        if self.is_chainless() {
            return;
        }
        let flat = self.first_channel();
        self.segments.clear();
        if !flat.is_empty() {
            self.segments.push(Segment::new(0, flat));
        }
    }

    /// Flattened copy of the first channel.
    pub fn first_channel(&self) -> Vec<f64> {
        if self.channels > 1 {
            let len = self.len();
            return self.segments.first().map_or_else(Vec::new, |s| s.samples[..len].to_vec());
        }
        let mut out = vec![0.0; self.len()];
        for seg in &self.segments {
            for (o, s) in out[seg.offset..seg.end()].iter_mut().zip(&seg.samples) {
                *o += *s;
            }
        }
        out
    }

    /// Fold the first channel of `other` onto this chainless container as a
    /// new planar block. The block is fitted to `self.len()`: zero-padded when
    /// shorter, truncated when longer.
    pub fn append_channel(&mut self, other: &Signals) {
        self.make_chainless();
        let len = self.len();
        let mut block = other.first_channel();
        block.resize(len, 0.0);
        match self.segments.first_mut() {
            Some(seg) => seg.samples.extend_from_slice(&block),
            None => {
                if len > 0 {
                    self.segments.push(Segment::new(0, block));
                }
            }
        }
        self.channels += 1;
    }

    /// Contiguous planar samples, or `None` while a time chain is pending.
    pub fn buffer(&self) -> Option<&[f64]> {
        if !self.is_chainless() {
            return None;
        }
        Some(self.segments.first().map_or(&[][..], |s| s.samples.as_slice()))
    }

    /// Copy of linked channel `index` as a standalone mono signal.
    pub fn channel(&self, index: usize) -> Result<Signals, SignalError> {
        let count = self.nchan();
        let link = self
            .links()
            .nth(index)
            .ok_or(SignalError::ChannelOutOfRange { index, count })?;
        Ok(Signals { fs: link.fs, channels: 1, segments: link.segments.clone(), next: None })
    }

    /// Shift every channel later by `n` samples.
    pub fn delay(&mut self, n: usize) {
        self.for_each_link_mut(|link| {
            for seg in &mut link.segments {
                seg.offset += n;
            }
        });
    }

    /// Overlay the first channel of `other` onto the first channel of `self`
    /// by merging time chains.
    pub fn overlay_first(&mut self, other: &Signals) {
        self.segments.extend(other.segments.iter().filter(|s| !s.samples.is_empty()).cloned());
    }

    /// Run `f` over every segment of every channel.
    pub fn map_segments(&mut self, mut f: impl FnMut(&mut [f64])) {
        self.for_each_link_mut(|link| {
            for seg in &mut link.segments {
                f(&mut seg.samples);
            }
        });
    }

    /// Replace every channel by `f(flattened channel)`.
    pub fn map_channels(&mut self, mut f: impl FnMut(Vec<f64>) -> Vec<f64>) {
        self.for_each_link_mut(|link| {
            let flat = f(link.first_channel());
            link.channels = 1;
            link.segments.clear();
            if !flat.is_empty() {
                link.segments.push(Segment::new(0, flat));
            }
        });
    }

    /// Frames interleaved across all linked channels, padded to the longest.
    pub fn interleaved(&self) -> (Vec<f64>, usize) {
        let chans: Vec<Vec<f64>> = self.links().map(Signals::first_channel).collect();
        let frames = chans.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = Vec::with_capacity(frames * chans.len());
        for i in 0..frames {
            out.extend(chans.iter().map(|c| c.get(i).copied().unwrap_or(0.0)));
        }
        (out, chans.len())
    }
}

// ------------------------------------ Tests --------------------------------------
