//! Recording session lifecycle.
//!
//! One `RecordingSession` per recording attempt. Stop triggers from the VAD,
//! the listener, the hard-cap timer, and the user all funnel through a single
//! transition function, so the race between simultaneous triggers reduces to
//! an explicit first-wins rule. Every path that closes a session runs the
//! same idempotent teardown first.

use crate::audio::{
    frame_to_target, AdaptiveRmsVad, ArtifactBuffer, CaptureHints, EnhancementGraph, Recorder,
    VadVerdict,
};
use crate::config::SessionConfig;
use crate::error::CaptureError;
use crate::listener::{self, SpeechListener};
use crate::log_debug;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Lifecycle of a recording attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopping,
    Closed,
}

/// Typed internal events fed into the session's transition function.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SpeechDetected,
    SilenceTimeout,
    ManualStop,
    HardCapExpired,
    ListenerPause,
}

/// Why the take ended, recorded once by the first accepted stop trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    SilenceTimeout,
    ManualStop,
    HardCap,
    ListenerPause,
    Error(String),
}

impl StopCause {
    pub fn label(&self) -> &'static str {
        match self {
            StopCause::SilenceTimeout => "silence_timeout",
            StopCause::ManualStop => "manual_stop",
            StopCause::HardCap => "hard_cap",
            StopCause::ListenerPause => "listener_pause",
            StopCause::Error(_) => "error",
        }
    }
}

/// Per-session transcript accumulator fed by the listener.
///
/// `final_text` is append-only and space-joined; `interim_text` is replaced
/// on every update. Read once by the arbiter after the session closes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TranscriptBuffer {
    final_text: String,
    interim_text: String,
}

impl TranscriptBuffer {
    pub fn append_final(&mut self, segment: &str) {
        let segment = segment.trim();
        if segment.is_empty() {
            return;
        }
        if !self.final_text.is_empty() {
            self.final_text.push(' ');
        }
        self.final_text.push_str(segment);
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim_text = text.trim().to_string();
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn interim_text(&self) -> &str {
        &self.interim_text
    }

    pub fn has_text(&self) -> bool {
        !self.final_text.is_empty() || !self.interim_text.is_empty()
    }
}

/// Observability numbers for one take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub capture_ms: u64,
    pub frames_processed: usize,
    pub frames_dropped: usize,
    pub had_speech: bool,
    pub stop: StopCause,
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self {
            capture_ms: 0,
            frames_processed: 0,
            frames_dropped: 0,
            had_speech: false,
            stop: StopCause::HardCap,
        }
    }
}

/// Outcome of `RecordingSession::apply`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The event was folded into the capturing session.
    Noted,
    /// A stop trigger was accepted; the session is now `Stopping`.
    StopAccepted,
    /// The event arrived outside `Capturing` and was dropped.
    Ignored,
}

/// State machine for one recording attempt.
pub struct RecordingSession {
    state: SessionState,
    had_speech: bool,
    stop_cause: Option<StopCause>,
    transcript: TranscriptBuffer,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            had_speech: false,
            stop_cause: None,
            transcript: TranscriptBuffer::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn had_speech(&self) -> bool {
        self.had_speech
    }

    pub fn stop_cause(&self) -> Option<&StopCause> {
        self.stop_cause.as_ref()
    }

    pub fn transcript_mut(&mut self) -> &mut TranscriptBuffer {
        &mut self.transcript
    }

    /// `Idle -> Capturing`. Returns false (no side effects) for any other
    /// starting state.
    pub fn begin(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::Capturing;
        true
    }

    /// The single transition function. Stop triggers are first-wins: once
    /// one moves the session to `Stopping`, later triggers are no-ops.
    pub fn apply(&mut self, event: SessionEvent) -> Applied {
        if self.state != SessionState::Capturing {
            return Applied::Ignored;
        }
        match event {
            SessionEvent::SpeechDetected => {
                self.had_speech = true;
                Applied::Noted
            }
            SessionEvent::SilenceTimeout => self.accept_stop(StopCause::SilenceTimeout),
            SessionEvent::ManualStop => self.accept_stop(StopCause::ManualStop),
            SessionEvent::HardCapExpired => self.accept_stop(StopCause::HardCap),
            SessionEvent::ListenerPause => self.accept_stop(StopCause::ListenerPause),
        }
    }

    /// Error path: treated like a stop trigger with a recorded message.
    pub fn fail(&mut self, message: &str) -> Applied {
        if self.state != SessionState::Capturing {
            return Applied::Ignored;
        }
        self.accept_stop(StopCause::Error(message.to_string()))
    }

    fn accept_stop(&mut self, cause: StopCause) -> Applied {
        self.state = SessionState::Stopping;
        self.stop_cause = Some(cause);
        Applied::StopAccepted
    }

    /// Run teardown and reach `Closed`. Every path to `Closed` goes through
    /// here; running it again is harmless because teardown is idempotent.
    pub fn close(&mut self, resources: &mut SessionResources) {
        resources.teardown();
        self.state = SessionState::Closed;
    }

    fn take_transcript(&mut self) -> TranscriptBuffer {
        std::mem::take(&mut self.transcript)
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot deadline armed at session start.
#[derive(Debug, Copy, Clone)]
pub struct HardCapTimer {
    deadline_ms: u64,
}

impl HardCapTimer {
    pub fn new(cap_ms: u64) -> Self {
        Self { deadline_ms: cap_ms }
    }

    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }
}

/// Hardware stream handle as the session sees it. Production code wraps the
/// CPAL stream; tests substitute a counting fake.
pub trait CaptureStream {
    fn shut_down(&mut self);
}

impl CaptureStream for crate::audio::LiveCapture {
    fn shut_down(&mut self) {
        crate::audio::LiveCapture::shut_down(self);
    }
}

/// Everything a capturing session holds that must be released exactly once.
pub struct SessionResources {
    pub hard_cap: Option<HardCapTimer>,
    pub vad: Option<AdaptiveRmsVad>,
    pub listener: Option<Box<dyn SpeechListener>>,
    pub graph: Option<EnhancementGraph>,
    pub stream: Option<Box<dyn CaptureStream>>,
}

impl SessionResources {
    /// Release everything, in order: timer, analysis loop, listener, signal
    /// graph, hardware stream. Each slot is taken at most once, so invoking
    /// this again on already-released resources is a no-op.
    pub fn teardown(&mut self) {
        self.hard_cap.take();
        self.vad.take();
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
        }
        self.graph.take();
        if let Some(mut stream) = self.stream.take() {
            stream.shut_down();
        }
    }
}

/// A closed session's artifacts, handed to the arbiter.
pub struct ClosedTake {
    pub transcript: TranscriptBuffer,
    pub audio: Vec<f32>,
    pub sample_rate: u32,
    pub metrics: CaptureMetrics,
}

/// Drives one session tick-by-tick. Shared between the live microphone loop
/// and the offline harness so endpointing behavior is testable without
/// hardware.
struct SessionDriver<'a> {
    cfg: &'a SessionConfig,
    session: RecordingSession,
    resources: SessionResources,
    artifact: ArtifactBuffer,
    frames_processed: usize,
    now_ms: u64,
    frame_ms: u64,
}

impl<'a> SessionDriver<'a> {
    fn new(
        cfg: &'a SessionConfig,
        listener: Option<Box<dyn SpeechListener>>,
        stream: Option<Box<dyn CaptureStream>>,
    ) -> Self {
        let mut session = RecordingSession::new();
        session.begin();
        let resources = SessionResources {
            hard_cap: Some(HardCapTimer::new(cfg.hard_cap_ms)),
            vad: Some(AdaptiveRmsVad::new(cfg.silence_window_ms)),
            listener,
            graph: cfg.enhancement.then(|| EnhancementGraph::new(cfg.sample_rate)),
            stream,
        };
        Self {
            cfg,
            session,
            resources,
            artifact: ArtifactBuffer::new(cfg.sample_rate, cfg.hard_cap_ms),
            frames_processed: 0,
            now_ms: 0,
            frame_ms: cfg.frame_ms.clamp(5, 120),
        }
    }

    fn capturing(&self) -> bool {
        self.session.state() == SessionState::Capturing
    }

    /// One analysis tick: advance the clock, classify the raw frame, then
    /// run it through the enhancement graph into the artifact. The VAD sees
    /// the raw samples; only the artifact sees the processed ones.
    fn on_frame(&mut self, raw: Vec<f32>) {
        self.now_ms = self.now_ms.saturating_add(self.frame_ms);
        self.frames_processed += 1;

        if let Some(vad) = self.resources.vad.as_mut() {
            match vad.observe(&raw, self.now_ms) {
                VadVerdict::Speech => {
                    self.session.apply(SessionEvent::SpeechDetected);
                }
                VadVerdict::EndOfSpeech => {
                    self.session.apply(SessionEvent::SilenceTimeout);
                }
                VadVerdict::Silence => {}
            }
        }

        let processed = match self.resources.graph.as_mut() {
            Some(graph) => graph.process(&raw),
            None => raw,
        };
        self.artifact.push_frame(&processed);
    }

    /// Clock tick with no frame delivered (receive timeout on the live path).
    fn on_idle_tick(&mut self) {
        self.now_ms = self.now_ms.saturating_add(self.frame_ms);
    }

    fn check_hard_cap(&mut self) {
        let expired = self
            .resources
            .hard_cap
            .map_or(false, |timer| timer.expired(self.now_ms));
        if expired {
            self.session.apply(SessionEvent::HardCapExpired);
        }
    }

    fn poll_listener(&mut self) {
        let Some(listener) = self.resources.listener.as_mut() else {
            return;
        };
        let events = listener.poll_events();
        for event in events {
            if let Some(session_event) = listener::apply_event(self.session.transcript_mut(), event)
            {
                self.session.apply(session_event);
            }
        }
    }

    /// Teardown, close, and package the take.
    fn finish(mut self, frames_dropped: usize) -> ClosedTake {
        self.session.close(&mut self.resources);
        let metrics = CaptureMetrics {
            capture_ms: self.now_ms,
            frames_processed: self.frames_processed,
            frames_dropped,
            had_speech: self.session.had_speech(),
            stop: self
                .session
                .stop_cause()
                .cloned()
                .unwrap_or(StopCause::ManualStop),
        };
        log_take_metrics(&metrics);
        ClosedTake {
            transcript: self.session.take_transcript(),
            audio: self.artifact.into_samples(),
            sample_rate: self.cfg.sample_rate,
            metrics,
        }
    }
}

/// Emit structured metrics for log scraping.
/// Format: `take_metrics|capture_ms=...|frames_processed=...|frames_dropped=...|had_speech=...|stop=...`
fn log_take_metrics(metrics: &CaptureMetrics) {
    log_debug(&format!(
        "take_metrics|capture_ms={}|frames_processed={}|frames_dropped={}|had_speech={}|stop={}",
        metrics.capture_ms,
        metrics.frames_processed,
        metrics.frames_dropped,
        metrics.had_speech,
        metrics.stop.label()
    ));
    tracing::info!(
        capture_ms = metrics.capture_ms,
        frames_processed = metrics.frames_processed,
        frames_dropped = metrics.frames_dropped,
        had_speech = metrics.had_speech,
        stop = metrics.stop.label(),
        "take_closed"
    );
}

/// Run one live recording attempt to completion on the current thread.
///
/// Opens the hardware stream, then loops: drain one frame, run the VAD on
/// the raw signal, fold in listener events, and check the manual stop flag
/// and the hard cap. The first accepted stop trigger ends the loop, after
/// which teardown runs exactly once.
pub fn run_live_session(
    cfg: &SessionConfig,
    recorder: &Recorder,
    listener: Option<Box<dyn SpeechListener>>,
    stop_flag: &AtomicBool,
) -> Result<ClosedTake, CaptureError> {
    let live = recorder.start(cfg)?;
    let frames: Receiver<Vec<f32>> = live.frames.clone();
    let dropped = live.dropped.clone();
    let device_rate = live.device_rate;

    let mut driver = SessionDriver::new(cfg, listener, Some(Box::new(live)));
    let wait = Duration::from_millis(driver.frame_ms);

    while driver.capturing() {
        if stop_flag.load(Ordering::Relaxed) {
            driver.session.apply(SessionEvent::ManualStop);
            break;
        }
        driver.check_hard_cap();
        if !driver.capturing() {
            break;
        }
        match frames.recv_timeout(wait) {
            Ok(frame) => {
                let raw = frame_to_target(frame, device_rate, cfg);
                if raw.is_empty() {
                    continue;
                }
                driver.on_frame(raw);
            }
            Err(RecvTimeoutError::Timeout) => {
                driver.on_idle_tick();
            }
            Err(RecvTimeoutError::Disconnected) => {
                driver.session.fail("audio stream disconnected");
                break;
            }
        }
        driver.poll_listener();
    }

    let frames_dropped = dropped.load(Ordering::Relaxed);
    Ok(driver.finish(frames_dropped))
}

/// Run the session machinery against synthetic PCM, one listener poll per
/// frame. No hardware involved; endpointing timing is fully deterministic.
pub fn offline_session_from_pcm(
    samples: &[f32],
    cfg: &SessionConfig,
    listener: Option<Box<dyn SpeechListener>>,
    stream: Option<Box<dyn CaptureStream>>,
) -> ClosedTake {
    let frame_samples =
        ((u64::from(cfg.sample_rate) * cfg.frame_ms.clamp(5, 120)) / 1000).max(1) as usize;
    let mut driver = SessionDriver::new(cfg, listener, stream);

    for chunk in samples.chunks(frame_samples) {
        if !driver.capturing() {
            break;
        }
        driver.check_hard_cap();
        if !driver.capturing() {
            break;
        }
        let mut frame = chunk.to_vec();
        frame.resize(frame_samples, 0.0);
        driver.on_frame(frame);
        driver.poll_listener();
    }

    // Samples exhausted without an endpoint: treat it as the user stopping.
    if driver.capturing() {
        driver.session.apply(SessionEvent::ManualStop);
    }
    driver.finish(0)
}

/// Messages sent from the session worker back to the caller.
pub enum SessionMessage {
    Closed(ClosedTake),
    /// The start gesture was aborted; no session was created.
    Rejected(CaptureError),
}

/// Handle the caller uses to poll the session worker thread.
pub struct SessionJob {
    pub receiver: mpsc::Receiver<SessionMessage>,
    pub handle: Option<thread::JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl SessionJob {
    /// Request a manual stop; the worker folds it in as a typed event.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

/// Spawn a worker thread that opens the microphone and runs one session.
/// The device is opened on the worker so the CPAL handles never cross
/// threads.
pub fn start_session_job(
    cfg: SessionConfig,
    input_device: Option<String>,
    hints: CaptureHints,
    listener: Option<Box<dyn SpeechListener>>,
) -> SessionJob {
    let (tx, rx) = mpsc::sync_channel(1);
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();

    let handle = thread::spawn(move || {
        let message = match Recorder::open(input_device.as_deref(), &hints) {
            Ok(recorder) => match run_live_session(&cfg, &recorder, listener, &stop_flag_clone) {
                Ok(take) => SessionMessage::Closed(take),
                Err(err) => SessionMessage::Rejected(err),
            },
            Err(err) => SessionMessage::Rejected(err),
        };
        let _ = tx.send(message);
    });

    SessionJob {
        receiver: rx,
        handle: Some(handle),
        stop_flag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ListenerEvent, ScriptedListener};
    use std::sync::atomic::AtomicUsize;

    struct CountingStream {
        shut_downs: Arc<AtomicUsize>,
    }

    impl CaptureStream for CountingStream {
        fn shut_down(&mut self) {
            self.shut_downs.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn test_cfg() -> SessionConfig {
        SessionConfig::default()
    }

    /// Speech-shaped test signal: a loud 20 ms burst at the start of every
    /// 200 ms block. Constant tones raise the adaptive floor until detection
    /// drops out; bursts keep the floor low the way real speech does.
    fn speech_samples(cfg: &SessionConfig, ms: u64) -> Vec<f32> {
        let count = (u64::from(cfg.sample_rate) * ms / 1000) as usize;
        (0..count)
            .map(|i| {
                let t_ms = i as u64 * 1000 / u64::from(cfg.sample_rate);
                if t_ms % 200 < 20 {
                    0.9 * (i as f32 * 0.3).sin()
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn silence_samples(cfg: &SessionConfig, ms: u64) -> Vec<f32> {
        let count = (u64::from(cfg.sample_rate) * ms / 1000) as usize;
        vec![0.0; count]
    }

    #[test]
    fn start_is_rejected_outside_idle() {
        let mut session = RecordingSession::new();
        assert!(session.begin());
        assert!(!session.begin());
        session.apply(SessionEvent::ManualStop);
        assert!(!session.begin());
    }

    #[test]
    fn first_stop_trigger_wins() {
        let mut session = RecordingSession::new();
        session.begin();
        assert_eq!(
            session.apply(SessionEvent::SilenceTimeout),
            Applied::StopAccepted
        );
        assert_eq!(session.apply(SessionEvent::HardCapExpired), Applied::Ignored);
        assert_eq!(session.apply(SessionEvent::ManualStop), Applied::Ignored);
        assert_eq!(session.stop_cause(), Some(&StopCause::SilenceTimeout));
    }

    #[test]
    fn speech_event_is_ignored_before_begin() {
        let mut session = RecordingSession::new();
        assert_eq!(session.apply(SessionEvent::SpeechDetected), Applied::Ignored);
        assert!(!session.had_speech());
    }

    #[test]
    fn teardown_is_idempotent() {
        let scripted = ScriptedListener::new(Vec::new());
        let listener_stops = scripted.stop_calls.clone();
        let stream_shut_downs = Arc::new(AtomicUsize::new(0));
        let mut resources = SessionResources {
            hard_cap: Some(HardCapTimer::new(18_000)),
            vad: Some(AdaptiveRmsVad::new(900)),
            listener: Some(Box::new(scripted)),
            graph: Some(EnhancementGraph::new(16_000)),
            stream: Some(Box::new(CountingStream {
                shut_downs: stream_shut_downs.clone(),
            })),
        };

        resources.teardown();
        resources.teardown();
        resources.teardown();

        assert_eq!(listener_stops.load(Ordering::Relaxed), 1);
        assert_eq!(stream_shut_downs.load(Ordering::Relaxed), 1);
        assert!(resources.hard_cap.is_none());
        assert!(resources.vad.is_none());
    }

    #[test]
    fn close_runs_teardown_and_reaches_closed() {
        let scripted = ScriptedListener::new(Vec::new());
        let listener_stops = scripted.stop_calls.clone();
        let mut resources = SessionResources {
            hard_cap: None,
            vad: None,
            listener: Some(Box::new(scripted)),
            graph: None,
            stream: None,
        };
        let mut session = RecordingSession::new();
        session.begin();
        session.apply(SessionEvent::ManualStop);
        session.close(&mut resources);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(listener_stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn speech_then_silence_stops_after_the_silence_window() {
        let cfg = test_cfg();
        let mut samples = speech_samples(&cfg, 2_000);
        samples.extend(silence_samples(&cfg, 1_000));

        let take = offline_session_from_pcm(&samples, &cfg, None, None);

        assert!(take.metrics.had_speech);
        assert_eq!(take.metrics.stop, StopCause::SilenceTimeout);
        // The last speech burst lands around 1.8 s; auto-stop fires once the
        // 900 ms window elapses after it, well before the samples run out.
        assert!(
            (2_600..=2_900).contains(&take.metrics.capture_ms),
            "capture ran {} ms",
            take.metrics.capture_ms
        );
    }

    #[test]
    fn ambient_silence_never_triggers_the_vad() {
        let cfg = test_cfg();
        let samples = silence_samples(&cfg, 19_000);

        let take = offline_session_from_pcm(&samples, &cfg, None, None);

        assert!(!take.metrics.had_speech);
        assert_eq!(take.metrics.stop, StopCause::HardCap);
        assert!(take.metrics.capture_ms >= cfg.hard_cap_ms);
    }

    #[test]
    fn listener_pause_with_text_ends_the_take() {
        let cfg = test_cfg();
        let samples = speech_samples(&cfg, 1_000);
        let listener = ScriptedListener::new(vec![
            vec![ListenerEvent::Results {
                finals: vec!["hello there".to_string()],
                interim: String::new(),
            }],
            vec![ListenerEvent::Pause],
        ]);

        let take = offline_session_from_pcm(&samples, &cfg, Some(Box::new(listener)), None);

        assert_eq!(take.metrics.stop, StopCause::ListenerPause);
        assert_eq!(take.transcript.final_text(), "hello there");
    }

    #[test]
    fn listener_pause_before_any_text_is_ignored() {
        let cfg = test_cfg();
        let samples = speech_samples(&cfg, 400);
        let listener = ScriptedListener::new(vec![vec![ListenerEvent::Pause]]);

        let take = offline_session_from_pcm(&samples, &cfg, Some(Box::new(listener)), None);

        // The pause fires on the first poll with no captured text; the take
        // then runs out of samples and falls back to a manual stop.
        assert_eq!(take.metrics.stop, StopCause::ManualStop);
    }

    #[test]
    fn recognition_errors_do_not_end_the_take() {
        let cfg = test_cfg();
        let mut samples = speech_samples(&cfg, 2_000);
        samples.extend(silence_samples(&cfg, 1_200));
        let listener = ScriptedListener::new(vec![vec![ListenerEvent::Error(
            "recognizer offline".to_string(),
        )]]);

        let take = offline_session_from_pcm(&samples, &cfg, Some(Box::new(listener)), None);

        assert_eq!(take.metrics.stop, StopCause::SilenceTimeout);
        assert!(!take.transcript.has_text());
    }

    #[test]
    fn artifact_contains_processed_audio() {
        let cfg = test_cfg();
        let mut samples = speech_samples(&cfg, 1_500);
        samples.extend(silence_samples(&cfg, 1_200));

        let take = offline_session_from_pcm(&samples, &cfg, None, None);

        assert!(!take.audio.is_empty());
        assert_eq!(take.sample_rate, cfg.sample_rate);
    }

    #[test]
    fn transcript_buffer_joins_segments_with_spaces() {
        let mut buffer = TranscriptBuffer::default();
        buffer.append_final("  hello ");
        buffer.append_final("there");
        buffer.append_final("   ");
        assert_eq!(buffer.final_text(), "hello there");
    }
}
