// src/coordinator.rs
//
// Glue between the phase timer and the audio layer.
//
// The coordinator owns the timer and every audio component, listens to the
// timer's events, and turns them into chimes and ambient fades. It also
// holds the host lease, so dropping it releases the audio context.
//
// Nothing here waits on asset I/O. Ambient loads are handed out through
// `take_ambient_load` for the owner to run; `settle_audio` runs them inline.

use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;

use tokio::time::Instant;

use crate::ambient::{AmbientMixer, AmbientState, LoadedSound, PendingLoad};
use crate::assets::{AssetSource, SoundId};
use crate::binaural::{BinauralGenerator, BinauralState, BrainwavePreset};
use crate::chime::ChimeScheduler;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::event::TimerEvent;
use crate::host::{AudioGraphHost, HostLease};
use crate::technique::Technique;
use crate::timer::{PhaseTimer, SessionState};

pub struct SessionCoordinator<A, C> {
    timer: PhaseTimer<C>,
    events: mpsc::UnboundedReceiver<TimerEvent>,
    ambient: AmbientMixer<A>,
    binaural: BinauralGenerator,
    chimes: ChimeScheduler,
    completion_fade: Duration,
    // Dropped last.
    lease: HostLease,
}

impl<A: AssetSource + 'static, C: Clock> SessionCoordinator<A, C> {
    pub fn new(
        technique: Technique,
        clock: C,
        host: AudioGraphHost,
        assets: A,
        config: &EngineConfig,
    ) -> Self {
        let mut timer = PhaseTimer::new(technique, clock);
        let events = timer.subscribe();

        let mut ambient = AmbientMixer::new(host.clone(), assets, &config.ambient);
        let mut binaural = BinauralGenerator::new(host.clone(), &config.binaural);
        let mut chimes = ChimeScheduler::new(host.clone(), &config.chimes);
        if !config.audio_enabled {
            ambient.set_enabled(false);
            binaural.set_enabled(false);
            chimes.set_enabled(false);
        }

        Self {
            timer,
            events,
            ambient,
            binaural,
            chimes,
            completion_fade: config.ambient.completion_fade(),
            lease: HostLease::new(host),
        }
    }

    pub fn host(&self) -> &AudioGraphHost {
        self.lease.host()
    }

    pub fn state(&self) -> &SessionState {
        self.timer.state()
    }

    pub fn technique(&self) -> &Technique {
        self.timer.technique()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Timer events, delivered after the coordinator has reacted to them.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TimerEvent> {
        self.timer.subscribe()
    }

    // ═══════════════════════════════════════════════════════════════
    // Session control
    // ═══════════════════════════════════════════════════════════════

    pub fn start(&mut self) {
        self.timer.start();
        self.pump();
        self.ambient.request_play();
    }

    pub fn pause(&mut self) {
        self.timer.pause();
        self.pump();
        self.ambient.stop();
    }

    pub fn resume(&mut self) {
        self.timer.resume();
        if self.timer.is_running() {
            self.ambient.request_play();
        }
    }

    pub fn stop(&mut self) {
        self.timer.stop();
        self.ambient.stop();
    }

    pub fn reset(&mut self) {
        self.timer.reset();
        self.ambient.stop();
    }

    pub fn tick(&mut self) {
        self.timer.tick();
        self.pump();
    }

    fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                TimerEvent::PhaseChanged {
                    phase,
                    initial: false,
                    ..
                } => self.chimes.play_chime(phase),
                TimerEvent::PhaseChanged { .. } => {}
                TimerEvent::Completed { cycles } => {
                    debug!("completed {} cycles, fading ambient", cycles);
                    self.ambient.fade_out(self.completion_fade);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Ambient
    // ═══════════════════════════════════════════════════════════════

    pub fn ambient_state(&self) -> AmbientState {
        self.ambient.state()
    }

    pub fn set_ambient_volume(&mut self, volume: f32) {
        self.ambient.set_volume(volume);
    }

    /// Takes effect immediately if the session is running.
    pub fn set_ambient_sound(&mut self, sound: SoundId) {
        self.ambient.set_sound(sound);
        if self.timer.is_running() && self.ambient.restart_at().is_none() {
            self.ambient.request_play();
        }
    }

    pub fn set_ambient_enabled(&mut self, enabled: bool) {
        self.ambient.set_enabled(enabled);
        if enabled && self.timer.is_running() {
            self.ambient.request_play();
        }
    }

    /// Fetch/decode work queued by the last call, to be run off-task.
    pub fn take_ambient_load(&mut self) -> Option<PendingLoad> {
        self.ambient.take_load()
    }

    pub fn finish_ambient_load(&mut self, loaded: LoadedSound) {
        self.ambient.finish_load(loaded);
    }

    /// Deadline of a pending ambient sound switch.
    pub fn ambient_restart_at(&self) -> Option<Instant> {
        self.ambient.restart_at()
    }

    pub fn restart_ambient_if_due(&mut self) {
        self.ambient.restart_if_due();
    }

    /// Run queued ambient work on the current task.
    pub async fn settle_audio(&mut self) {
        self.ambient.settle().await;
    }

    // ═══════════════════════════════════════════════════════════════
    // Binaural (not driven by phases)
    // ═══════════════════════════════════════════════════════════════

    pub fn binaural_state(&self) -> BinauralState {
        self.binaural.state()
    }

    pub fn start_binaural(&mut self) {
        self.binaural.start();
    }

    pub fn stop_binaural(&mut self) {
        self.binaural.stop();
    }

    pub fn fade_out_binaural(&mut self, duration: Duration) {
        self.binaural.fade_out(duration);
    }

    pub fn set_binaural_preset(&mut self, preset: BrainwavePreset) {
        self.binaural.set_frequency(preset);
    }

    pub fn set_binaural_volume(&mut self, volume: f32) {
        self.binaural.set_volume(volume);
    }

    // ═══════════════════════════════════════════════════════════════
    // Chimes
    // ═══════════════════════════════════════════════════════════════

    pub fn set_chimes_enabled(&mut self, enabled: bool) {
        self.chimes.set_enabled(enabled);
    }

    pub fn set_chime_volume(&mut self, volume: f32) {
        self.chimes.set_volume(volume);
    }
}
