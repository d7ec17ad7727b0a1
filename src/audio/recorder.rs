//! Microphone access via CPAL.
//!
//! Opens the input device, normalizes the incoming format, and streams
//! fixed-size mono frames to the session loop. The hardware handle is owned
//! exclusively by the live capture until it is shut down.

use super::dispatch::FrameDispatcher;
use crate::config::SessionConfig;
use crate::error::CaptureError;
use crate::log_debug;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Capture-time enhancement hints. Best-effort: CPAL exposes no portable
/// switches for these, so they are recorded and logged; the pipeline must
/// work when the host honors none of them.
#[derive(Debug, Clone)]
pub struct CaptureHints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureHints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|err| classify_capture_error(err.to_string()))?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open the capture device, optionally forcing a specific input so users
    /// can pick the right microphone when a laptop exposes several.
    pub fn open(
        preferred_device: Option<&str>,
        hints: &CaptureHints,
    ) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|err| classify_capture_error(err.to_string()))?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        CaptureError::DeviceUnavailable(format!("input device '{name}' not found"))
                    })?
            }
            None => host.default_input_device().ok_or_else(|| {
                CaptureError::DeviceUnavailable("no default input device available".to_string())
            })?,
        };
        log_debug(&format!(
            "capture hints (best-effort): echo_cancellation={} noise_suppression={} auto_gain_control={}",
            hints.echo_cancellation, hints.noise_suppression, hints.auto_gain_control
        ));
        Ok(Self { device })
    }

    /// Get the name of the active recording device.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Start streaming mono device-rate frames into a bounded channel.
    ///
    /// The callback thread never blocks: frames that cannot be queued are
    /// dropped and counted. The returned handle owns the hardware stream.
    pub fn start(&self, cfg: &SessionConfig) -> Result<LiveCapture, CaptureError> {
        let default_config = self
            .device
            .default_input_config()
            .map_err(|err| classify_capture_error(err.to_string()))?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let frame_ms = cfg.frame_ms.clamp(5, 120);
        let device_frame_samples = ((u64::from(device_rate) * frame_ms) / 1000).max(1) as usize;

        log_debug(&format!(
            "capture config: format={format:?} sample_rate={device_rate}Hz channels={channels}"
        ));

        let (sender, receiver) = bounded::<Vec<f32>>(cfg.channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            device_frame_samples,
            sender,
            dropped.clone(),
        )));

        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| classify_capture_error(err.to_string()))?;

        stream
            .play()
            .map_err(|err| classify_capture_error(err.to_string()))?;

        Ok(LiveCapture {
            stream: Some(stream),
            frames: receiver,
            dropped,
            device_rate,
        })
    }
}

/// An open hardware stream plus the frame channel it feeds.
pub struct LiveCapture {
    stream: Option<cpal::Stream>,
    pub frames: Receiver<Vec<f32>>,
    pub dropped: Arc<AtomicUsize>,
    pub device_rate: u32,
}

impl LiveCapture {
    /// Stop and release the hardware handle. Safe to call more than once.
    pub fn shut_down(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                log_debug(&format!("failed to pause audio stream: {err}"));
            }
            drop(stream);
        }
    }
}

impl Drop for LiveCapture {
    fn drop(&mut self) {
        self.shut_down();
    }
}

/// Split device failures into the two caller-visible start errors.
fn classify_capture_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_classified() {
        match classify_capture_error("Access denied by the OS".to_string()) {
            CaptureError::PermissionDenied(_) => {}
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_map_to_device_unavailable() {
        match classify_capture_error("device disconnected".to_string()) {
            CaptureError::DeviceUnavailable(_) => {}
            other => panic!("expected DeviceUnavailable, got {other:?}"),
        }
    }
}
