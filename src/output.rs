// src/output.rs
//
// Where a context's renderer runs.
//
// `OfflineOutput` keeps the renderer in-process so callers pull blocks on
// demand (tests, WAV rendering). `DeviceOutput` hands it to a cpal stream
// running on the platform's audio thread.

use std::sync::{Arc, Mutex, PoisonError};

use crate::bridge::Renderer;
use crate::error::AudioError;

/// Accepts the audio-thread half of a freshly created context.
pub trait OutputBackend: Send {
    fn attach(&mut self, renderer: Renderer) -> Result<(), AudioError>;

    /// Stop pulling audio. Called once when the owning host releases.
    fn detach(&mut self) {}
}

// ═══════════════════════════════════════════════════════════════════
// Offline
// ═══════════════════════════════════════════════════════════════════

/// Pull-based output. Clones share the same renderer slot.
#[derive(Clone, Default)]
pub struct OfflineOutput {
    renderer: Arc<Mutex<Option<Renderer>>>,
}

impl OfflineOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Render `frames` stereo frames, interleaved. Silence if detached.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut [f32]) {
        let mut slot = self
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(renderer) => renderer.render(out),
            None => out.fill(0.0),
        }
    }
}

impl OutputBackend for OfflineOutput {
    fn attach(&mut self, renderer: Renderer) -> Result<(), AudioError> {
        *self
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(renderer);
        Ok(())
    }

    fn detach(&mut self) {
        // Drain the final Close so the engine drops its voices.
        let mut slot = self
            .renderer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mut renderer) = slot.take() {
            renderer.process_commands();
        }
    }
}

/// Backend for when audio is switched off: every context fails to open.
pub struct NoOutput;

impl OutputBackend for NoOutput {
    fn attach(&mut self, _renderer: Renderer) -> Result<(), AudioError> {
        Err(AudioError::Backend("audio output disabled".into()))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Device (cpal)
// ═══════════════════════════════════════════════════════════════════

#[cfg(feature = "device")]
pub use device::DeviceOutput;

#[cfg(feature = "device")]
mod device {
    use std::sync::mpsc;
    use std::thread::JoinHandle;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use log::{error, info};

    use super::OutputBackend;
    use crate::bridge::Renderer;
    use crate::error::AudioError;

    /// Real-time output on the default device.
    ///
    /// `cpal::Stream` is not `Send` everywhere, so the stream lives on its
    /// own thread and is dropped when the shutdown channel closes.
    #[derive(Default)]
    pub struct DeviceOutput {
        shutdown: Option<mpsc::Sender<()>>,
        thread: Option<JoinHandle<()>>,
    }

    impl DeviceOutput {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn backend(e: impl std::fmt::Display) -> AudioError {
        AudioError::Backend(e.to_string())
    }

    fn open_stream(renderer: Renderer) -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Backend("no audio output device found".into()))?;
        let supported = device.default_output_config().map_err(backend)?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::Backend(format!(
                "unsupported sample format {:?}",
                supported.sample_format()
            )));
        }

        let mut config: cpal::StreamConfig = supported.into();
        config.sample_rate = cpal::SampleRate(renderer.sample_rate() as u32);
        let channels = config.channels as usize;
        info!("audio device: {:?}, config: {:?}", device.name().ok(), config);

        let mut renderer = renderer;
        let mut stereo = Vec::new();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    stereo.resize(frames * 2, 0.0);
                    renderer.render(&mut stereo);
                    for (frame, out) in data.chunks_mut(channels.max(1)).enumerate() {
                        for (ch, sample) in out.iter_mut().enumerate() {
                            *sample = stereo[frame * 2 + ch.min(1)];
                        }
                    }
                },
                |err| error!("audio stream error: {}", err),
                None,
            )
            .map_err(backend)?;
        stream.play().map_err(backend)?;
        Ok(stream)
    }

    impl OutputBackend for DeviceOutput {
        fn attach(&mut self, renderer: Renderer) -> Result<(), AudioError> {
            let (ready_tx, ready_rx) = mpsc::channel();
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let thread = std::thread::Builder::new()
                .name("breathwork-audio".into())
                .spawn(move || match open_stream(renderer) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Block until the host releases.
                        let _ = shutdown_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                })
                .map_err(|e| AudioError::Backend(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    self.shutdown = Some(shutdown_tx);
                    self.thread = Some(thread);
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => Err(AudioError::Backend("audio thread exited".into())),
            }
        }

        fn detach(&mut self) {
            self.shutdown.take();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::create_context;

    #[test]
    fn detached_offline_output_renders_silence() {
        let output = OfflineOutput::new();
        assert!(!output.is_attached());
        assert!(output.render(64).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn offline_output_drives_the_renderer() {
        let mut output = OfflineOutput::new();
        let (context, renderer) = create_context(1_000.0, 32);
        output.attach(renderer).unwrap();
        context.resume();

        output.render(250);
        assert!((context.current_time() - 0.25).abs() < 1e-9);

        output.detach();
        assert!(!output.is_attached());
    }

    #[test]
    fn no_output_refuses_contexts() {
        let (_context, renderer) = create_context(1_000.0, 32);
        assert!(NoOutput.attach(renderer).is_err());
    }
}
