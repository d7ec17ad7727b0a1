use super::capture::ArtifactBuffer;
use super::dispatch::{downmix_into, FrameDispatcher};
use super::graph::EnhancementGraph;
use super::resample::{basic_resample, convert_frame_to_target, resample_linear};
use super::vad::{rms_amplitude, AdaptiveRmsVad, VadVerdict};
use super::wav::encode_wav;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn downmix_mono_passes_through() {
    let mut buf = Vec::new();
    downmix_into(&mut buf, &[0.1f32, 0.2, 0.3], 1, |s| s);
    assert_eq!(buf, vec![0.1, 0.2, 0.3]);
}

#[test]
fn downmix_averages_interleaved_stereo() {
    let mut buf = Vec::new();
    downmix_into(&mut buf, &[1.0f32, 0.0, 0.5, 0.5], 2, |s| s);
    assert_eq!(buf, vec![0.5, 0.5]);
}

#[test]
fn downmix_converts_integer_samples() {
    let mut buf = Vec::new();
    downmix_into(&mut buf, &[i16::MAX, i16::MIN], 1, |s| {
        s as f32 / 32_768.0
    });
    assert!(buf[0] > 0.99);
    assert!(buf[1] < -0.99);
}

#[test]
fn dispatcher_emits_fixed_size_frames() {
    let (tx, rx) = bounded(8);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(4, tx, dropped.clone());

    dispatcher.push(&[0.1f32; 10], 1, |s| s);

    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert!(rx.try_recv().is_err()); // two samples still pending
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatcher_counts_dropped_frames_when_the_channel_is_full() {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(2, tx, dropped.clone());

    dispatcher.push(&[0.1f32; 8], 1, |s| s);

    assert_eq!(rx.len(), 1);
    assert_eq!(dropped.load(Ordering::Relaxed), 3);
}

#[test]
fn rms_of_silence_is_zero() {
    assert_eq!(rms_amplitude(&[0.0; 64]), 0.0);
    assert_eq!(rms_amplitude(&[]), 0.0);
}

#[test]
fn rms_of_a_constant_signal_is_its_amplitude() {
    let rms = rms_amplitude(&[0.5; 64]);
    assert!((rms - 0.5).abs() < 1e-6);
}

#[test]
fn vad_never_ends_the_take_before_speech() {
    let mut vad = AdaptiveRmsVad::new(900);
    let silence = [0.0f32; 320];
    let mut now_ms = 0;
    for _ in 0..2_000 {
        now_ms += 20;
        assert_eq!(vad.observe(&silence, now_ms), VadVerdict::Silence);
    }
    assert!(!vad.had_speech());
}

#[test]
fn vad_flags_speech_and_then_end_of_speech_after_the_window() {
    let mut vad = AdaptiveRmsVad::new(900);
    let loud = [0.5f32; 320];
    let silence = [0.0f32; 320];

    assert_eq!(vad.observe(&loud, 20), VadVerdict::Speech);
    assert!(vad.had_speech());

    let mut now_ms = 20;
    let mut verdicts = Vec::new();
    for _ in 0..60 {
        now_ms += 20;
        verdicts.push(vad.observe(&silence, now_ms));
    }
    // Silence window starts at the first silent frame (40 ms); the endpoint
    // fires just past 900 ms of silence.
    let end_index = verdicts
        .iter()
        .position(|v| *v == VadVerdict::EndOfSpeech)
        .unwrap();
    let end_ms = 40 + end_index as u64 * 20;
    assert!((940..=980).contains(&end_ms), "ended at {end_ms} ms");
}

#[test]
fn vad_speech_resets_the_silence_window() {
    let mut vad = AdaptiveRmsVad::new(900);
    let loud = [0.5f32; 320];
    let silence = [0.0f32; 320];

    vad.observe(&loud, 20);
    let mut now_ms = 20;
    for _ in 0..40 {
        now_ms += 20;
        assert_ne!(vad.observe(&silence, now_ms), VadVerdict::EndOfSpeech);
    }
    // Speech again before the window elapses on this schedule.
    now_ms += 20;
    assert_eq!(vad.observe(&loud, now_ms), VadVerdict::Speech);
    // The window restarts: nothing fires for another 900 ms.
    for _ in 0..44 {
        now_ms += 20;
        assert_ne!(vad.observe(&silence, now_ms), VadVerdict::EndOfSpeech);
    }
}

#[test]
fn vad_threshold_never_collapses_below_the_floor() {
    let mut vad = AdaptiveRmsVad::new(900);
    let silence = [0.0f32; 320];
    for i in 0..500 {
        vad.observe(&silence, i * 20);
    }
    assert!(vad.threshold() >= 0.012);
}

#[test]
fn graph_reduces_loud_peaks_and_lifts_quiet_audio() {
    let mut graph = EnhancementGraph::new(16_000);
    // Long loud stretch so the envelope settles well above the threshold.
    let loud = vec![0.9f32; 16_000];
    let processed = graph.process(&loud);
    let tail = &processed[8_000..];
    let tail_peak = tail.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(tail_peak < 0.9, "loud audio was not compressed");

    let mut graph = EnhancementGraph::new(16_000);
    let quiet = vec![0.001f32; 1_600];
    let processed = graph.process(&quiet);
    // Below the threshold the chain is just the fixed gain stage.
    assert!((processed[800] - 0.001 * 1.18).abs() < 1e-4);
}

#[test]
fn graph_output_stays_in_range() {
    let mut graph = EnhancementGraph::new(16_000);
    let hot = vec![1.0f32; 4_800];
    for sample in graph.process(&hot) {
        assert!((-1.0..=1.0).contains(&sample));
    }
}

#[test]
fn frame_conversion_is_length_stable() {
    let frame = vec![0.1f32; 960]; // 20 ms at 48 kHz
    let converted = convert_frame_to_target(frame, 48_000, 16_000, 320);
    assert_eq!(converted.len(), 320);

    let short = vec![0.1f32; 100];
    let converted = convert_frame_to_target(short, 16_000, 16_000, 320);
    assert_eq!(converted.len(), 320);
}

#[test]
fn linear_resampling_scales_the_length_by_the_ratio() {
    let input: Vec<f32> = (0..1_000).map(|i| (i as f32 * 0.01).sin()).collect();
    let halved = resample_linear(&input, 0.5);
    assert_eq!(halved.len(), 500);
    let doubled = resample_linear(&input, 2.0);
    assert_eq!(doubled.len(), 2_000);
}

#[test]
fn downsampling_preserves_a_low_frequency_tone() {
    // 100 Hz tone at 48 kHz, downsampled to 16 kHz, should keep its energy.
    let input: Vec<f32> = (0..4_800)
        .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 48_000.0).sin())
        .collect();
    let output = basic_resample(&input, 48_000, 16_000);
    assert_eq!(output.len(), 1_600);
    let in_rms = rms_amplitude(&input);
    let out_rms = rms_amplitude(&output);
    assert!((in_rms - out_rms).abs() < 0.1, "{in_rms} vs {out_rms}");
}

#[test]
fn artifact_buffer_respects_its_budget() {
    // 100 ms budget at 16 kHz = 1600 samples.
    let mut buffer = ArtifactBuffer::new(16_000, 100);
    for _ in 0..10 {
        buffer.push_frame(&[0.1f32; 320]);
    }
    assert_eq!(buffer.len(), 1_600);
    assert!(!buffer.is_empty());
    assert_eq!(buffer.into_samples().len(), 1_600);
}

#[test]
fn wav_encoding_produces_a_riff_header_and_sized_payload() {
    let samples = vec![0.0f32; 160];
    let bytes = encode_wav(&samples, 16_000).unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    // 44-byte header + 2 bytes per 16-bit sample.
    assert_eq!(bytes.len(), 44 + samples.len() * 2);
}

#[test]
fn wav_encoding_clamps_out_of_range_samples() {
    let bytes = encode_wav(&[2.0, -2.0], 16_000).unwrap();
    let first = i16::from_le_bytes([bytes[44], bytes[45]]);
    let second = i16::from_le_bytes([bytes[46], bytes[47]]);
    assert_eq!(first, i16::MAX);
    assert_eq!(second, -i16::MAX);
}
