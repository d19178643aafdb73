//! Per-stream speaking detector thread.

use super::VadSettings;
use super::analyser::SpectrumAnalyser;
use crate::models::{MediaStream, SpeakerKey};
use logging::Logger;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

static NEXT_DETECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Owns a running detector. Dropping the handle stops the thread and joins it.
pub struct DetectorHandle {
    id: u64,
    key: SpeakerKey,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DetectorHandle {
    /// Identifier stamped on every change the detector reports.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &SpeakerKey {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the thread and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts analysing `stream` on its own thread.
///
/// `report` is called with `(detector_id, speaking)` on every change. The
/// thread exits when the stream ends, when the handle is dropped, or when
/// `report` returns `false`. Ending with the speaker still flagged reports a
/// final `false`.
pub fn spawn_detector<F>(
    key: SpeakerKey,
    stream: MediaStream,
    settings: VadSettings,
    logger: &Logger,
    report: F,
) -> DetectorHandle
where
    F: Fn(u64, bool) -> bool + Send + 'static,
{
    let id = NEXT_DETECTOR_ID.fetch_add(1, Ordering::SeqCst);
    let stop = Arc::new(AtomicBool::new(false));
    let logger = logger.for_component("Vad");

    let thread = {
        let stop = stop.clone();
        let key = key.clone();
        thread::spawn(move || {
            logger.debug(&format!("Detector {} started for {}", id, key));
            run_detector(id, &stream, settings, &stop, &report);
            logger.debug(&format!("Detector {} stopped for {}", id, key));
        })
    };

    DetectorHandle {
        id,
        key,
        stop,
        thread: Some(thread),
    }
}

fn run_detector<F>(id: u64, stream: &MediaStream, settings: VadSettings, stop: &AtomicBool, report: &F)
where
    F: Fn(u64, bool) -> bool,
{
    let mut analyser = SpectrumAnalyser::new(settings.fft_size);
    let mut mixed = vec![0.0f32; settings.fft_size];
    let mut scratch = vec![0.0f32; settings.fft_size];
    let mut speaking = false;

    while !stop.load(Ordering::SeqCst) {
        let tick = Instant::now();

        if !stream.is_active() {
            if speaking {
                report(id, false);
            }
            return;
        }

        mixed.fill(0.0);
        for track in stream.audio_tracks() {
            track.read_window(&mut scratch);
            for (out, sample) in mixed.iter_mut().zip(scratch.iter()) {
                *out += *sample;
            }
        }

        let now_speaking = analyser.mean_level(&mixed) > settings.threshold;
        if now_speaking != speaking {
            speaking = now_speaking;
            if !report(id, speaking) {
                return;
            }
        }

        let elapsed = tick.elapsed();
        if elapsed < settings.interval {
            thread::sleep(settings.interval - elapsed);
        }
    }
}
