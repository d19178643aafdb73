//! Media stream handles and the metadata tag carried on originated links.

use super::generate_id;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

// Enough history for the largest analysis window we accept.
const SAMPLE_RING_CAPACITY: usize = 8192;

/// What a peer link carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Voice,
    Screen,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Voice => write!(f, "voice"),
            StreamKind::Screen => write!(f, "screen"),
        }
    }
}

/// Metadata set by the caller when originating a link.
///
/// The callee cannot verify it; peers in a room trust each other's tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamTag {
    pub source_name: String,
    pub kind: StreamKind,
}

impl StreamTag {
    pub fn voice(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind: StreamKind::Voice,
        }
    }

    pub fn screen(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind: StreamKind::Screen,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

type EndListener = Box<dyn FnOnce() + Send>;

struct TrackState {
    id: String,
    kind: TrackKind,
    enabled: AtomicBool,
    ended: AtomicBool,
    samples: Mutex<VecDeque<f32>>,
    end_listeners: Mutex<Vec<EndListener>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One audio or video track. Clones share state.
///
/// Audio tracks keep a ring of the most recent samples written by whoever
/// produces the track (a capture device or a peer link's decoder). A disabled
/// track reads as silence; an ended track reads as silence and ignores writes.
#[derive(Clone)]
pub struct MediaTrack {
    state: Arc<TrackState>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            state: Arc::new(TrackState {
                id: generate_id("track"),
                kind,
                enabled: AtomicBool::new(true),
                ended: AtomicBool::new(false),
                samples: Mutex::new(VecDeque::with_capacity(SAMPLE_RING_CAPACITY)),
                end_listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn kind(&self) -> TrackKind {
        self.state.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended.load(Ordering::SeqCst)
    }

    /// Ends the track and runs its end listeners once.
    ///
    /// Covers both a local release and an external stop (for example the
    /// platform's own "stop sharing" control).
    pub fn stop(&self) {
        if self.state.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.state.samples).clear();
        let listeners: Vec<EndListener> = lock(&self.state.end_listeners).drain(..).collect();
        for listener in listeners {
            listener();
        }
    }

    /// Registers a callback for the end of the track. Runs immediately if the
    /// track already ended.
    pub fn on_ended(&self, listener: impl FnOnce() + Send + 'static) {
        let mut listeners = lock(&self.state.end_listeners);
        if self.is_ended() {
            drop(listeners);
            listener();
        } else {
            listeners.push(Box::new(listener));
        }
    }

    /// Appends samples to the ring, dropping the oldest beyond capacity.
    pub fn push_samples(&self, samples: &[f32]) {
        if self.state.kind != TrackKind::Audio || self.is_ended() {
            return;
        }
        let mut ring = lock(&self.state.samples);
        for &sample in samples {
            if ring.len() == SAMPLE_RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(sample);
        }
    }

    /// Fills `out` with the newest samples, right aligned and zero padded.
    pub fn read_window(&self, out: &mut [f32]) {
        out.fill(0.0);
        if !self.is_enabled() || self.is_ended() {
            return;
        }
        let ring = lock(&self.state.samples);
        let take = ring.len().min(out.len());
        let offset = out.len() - take;
        for (slot, sample) in out[offset..]
            .iter_mut()
            .zip(ring.iter().skip(ring.len() - take))
        {
            *slot = *sample;
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("enabled", &self.is_enabled())
            .field("ended", &self.is_ended())
            .finish()
    }
}

struct StreamInner {
    id: String,
    tracks: Vec<MediaTrack>,
}

/// A set of tracks handed between capture, links and analysis. Clones share
/// the same tracks.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: generate_id("stream"),
                tracks,
            }),
        }
    }

    /// A stream with a single audio track.
    pub fn audio() -> Self {
        Self::new(vec![MediaTrack::new(TrackKind::Audio)])
    }

    /// A stream with a single video track.
    pub fn video() -> Self {
        Self::new(vec![MediaTrack::new(TrackKind::Video)])
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.inner.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.inner
            .tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.inner
            .tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Video)
    }

    /// A stream is active while at least one track has not ended.
    pub fn is_active(&self) -> bool {
        self.inner.tracks.iter().any(|t| !t.is_ended())
    }

    pub fn stop(&self) {
        for track in &self.inner.tracks {
            track.stop();
        }
    }

    /// Whether both handles point at the same underlying stream.
    pub fn same_as(&self, other: &MediaStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("tracks", &self.inner.tracks)
            .finish()
    }
}
