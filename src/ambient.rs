// src/ambient.rs
//
// Looped ambient background with fades.
//
// Fetch and decode run off the caller's task: `request_play` queues a
// `PendingLoad` that the owner spawns, and `finish_load` attaches the voice
// once the buffer arrives. `play` does the same inline for callers that can
// afford to wait.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::assets::{self, AssetSource, SoundId};
use crate::command::VoiceId;
use crate::config::AmbientConfig;
use crate::error::AudioError;
use crate::graph::Voice;
use crate::host::AudioGraphHost;
use crate::nodes::{LoopPlayer, Pan, SharedAudioData};
use crate::param::{AudioParam, Automation, Curve};

/// Ramp used by `set_volume` so level changes never click.
const VOLUME_RAMP: Duration = Duration::from_millis(100);

/// Observable ambient settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientState {
    pub enabled: bool,
    pub volume: f32,
    pub sound: SoundId,
    /// Mirrors whether a voice is sounding; not authoritative.
    pub is_playing: bool,
}

/// Result of a background fetch and decode.
pub struct LoadedSound {
    sound: SoundId,
    result: Result<SharedAudioData, AudioError>,
}

impl LoadedSound {
    pub fn sound(&self) -> SoundId {
        self.sound
    }
}

/// Fetch and decode work for one sound. Owns everything it touches.
pub type PendingLoad = Pin<Box<dyn Future<Output = LoadedSound> + Send + 'static>>;

pub struct AmbientMixer<A> {
    host: AudioGraphHost,
    assets: Arc<A>,
    /// Decoded buffers, kept for the mixer's lifetime.
    cache: HashMap<SoundId, SharedAudioData>,
    state: AmbientState,
    /// The voice currently playing.
    voice: Option<VoiceId>,
    /// A voice fading out after `stop`; torn down before the next `play`.
    fading: Option<VoiceId>,
    /// Sound whose load is in flight and still wanted.
    pending: Option<SoundId>,
    /// Queued load not yet handed out by `take_load`.
    load: Option<PendingLoad>,
    /// When a sound switch may start the new sound.
    restart_at: Option<Instant>,
    headroom: f32,
    fade_in: Duration,
    fade_out: Duration,
}

impl<A: AssetSource + 'static> AmbientMixer<A> {
    pub fn new(host: AudioGraphHost, assets: A, config: &AmbientConfig) -> Self {
        Self {
            host,
            assets: Arc::new(assets),
            cache: HashMap::new(),
            state: AmbientState {
                enabled: config.enabled,
                volume: config.volume.clamp(0.0, 1.0),
                sound: config.sound,
                is_playing: false,
            },
            voice: None,
            fading: None,
            pending: None,
            load: None,
            restart_at: None,
            headroom: config.headroom.clamp(0.0, 1.0),
            fade_in: config.fade_in(),
            fade_out: config.fade_out(),
        }
    }

    pub fn state(&self) -> AmbientState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    /// True while a fetch or decode is outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn default_fade_out(&self) -> Duration {
        self.fade_out
    }

    #[inline]
    fn target_gain(&self) -> f32 {
        self.state.volume * self.headroom
    }

    /// Start the looped background with a fade-in, waiting for the load.
    ///
    /// No-op when disabled, when the sound is `none`, or when already
    /// playing. Fetch/decode failures are logged and leave the mixer idle.
    pub async fn play(&mut self) {
        self.request_play();
        self.settle().await;
    }

    /// Start the background without waiting.
    ///
    /// Cached sounds start at once. Otherwise a load is queued for
    /// `take_load` and the voice starts in `finish_load`.
    pub fn request_play(&mut self) {
        if !self.state.enabled || self.state.sound.is_none() || self.voice.is_some() {
            return;
        }
        self.restart_at = None;

        let sound = self.state.sound;
        if let Some(data) = self.cache.get(&sound).cloned() {
            self.pending = None;
            if let Err(e) = self.attach(sound, data) {
                warn!("ambient '{}' unavailable: {}", sound, e);
                self.state.is_playing = false;
            }
            return;
        }
        if self.pending == Some(sound) {
            return;
        }
        debug!("ambient '{}' loading", sound);
        self.pending = Some(sound);
        self.load = Some(self.load_task(sound));
    }

    fn load_task(&self, sound: SoundId) -> PendingLoad {
        let source = Arc::clone(&self.assets);
        Box::pin(async move {
            let result = match source.fetch(sound).await {
                Ok(bytes) => tokio::task::spawn_blocking(move || assets::decode(sound, bytes))
                    .await
                    .unwrap_or_else(|e| {
                        Err(AudioError::Decode {
                            sound,
                            reason: e.to_string(),
                        })
                    }),
                Err(e) => Err(e),
            };
            LoadedSound { sound, result }
        })
    }

    /// Hand out the queued load, if any. The caller drives it to completion
    /// and passes the result to `finish_load`.
    pub fn take_load(&mut self) -> Option<PendingLoad> {
        self.load.take()
    }

    /// Cache a finished load and start the voice if it is still wanted.
    pub fn finish_load(&mut self, loaded: LoadedSound) {
        let LoadedSound { sound, result } = loaded;
        let wanted = self.pending == Some(sound);
        match result {
            Ok(data) => {
                self.cache.insert(sound, data);
                if wanted {
                    self.pending = None;
                    self.request_play();
                }
            }
            Err(e) => {
                warn!("ambient '{}' unavailable: {}", sound, e);
                if wanted {
                    self.pending = None;
                    self.state.is_playing = false;
                }
            }
        }
    }

    /// Drive any scheduled restart and queued load inline.
    pub async fn settle(&mut self) {
        if let Some(at) = self.restart_at {
            tokio::time::sleep_until(at).await;
            self.restart_if_due();
        }
        while let Some(load) = self.take_load() {
            let loaded = load.await;
            self.finish_load(loaded);
        }
    }

    fn attach(&mut self, sound: SoundId, data: SharedAudioData) -> Result<(), AudioError> {
        let context = self.host.acquire()?;
        if let Some(old) = self.fading.take() {
            context.release(old);
        }

        let now = context.current_time();
        let mut gain = AudioParam::new(0.0);
        gain.linear_ramp_to(self.target_gain(), now, now + self.fade_in.as_secs_f64());

        let id = context.add_voice(Voice::new(Box::new(LoopPlayer::new(data)), gain, Pan::CENTER))?;
        debug!("ambient '{}' started as voice {}", sound, id);
        self.voice = Some(id);
        self.state.is_playing = true;
        Ok(())
    }

    /// Fade out over the default window, then release the voice.
    pub fn stop(&mut self) {
        self.fade_out(self.fade_out);
    }

    /// Fade out over `duration`, then release the voice. Also cancels a
    /// load or sound switch that has not started yet.
    pub fn fade_out(&mut self, duration: Duration) {
        self.pending = None;
        self.load = None;
        self.restart_at = None;

        let Some(id) = self.voice.take() else {
            return;
        };
        self.state.is_playing = false;

        let Some(context) = self.host.current() else {
            return;
        };
        let now = context.current_time();
        let end = now + duration.as_secs_f64();
        context.automate(
            id,
            Automation::RampFromCurrent {
                target: 0.0,
                start: now,
                end,
                curve: Curve::Linear,
            },
        );
        context.stop_at(id, end);

        if let Some(previous) = self.fading.replace(id) {
            context.release(previous);
        }
        debug!("ambient voice {} fading over {:?}", id, duration);
    }

    /// Clamp to [0, 1]; ramps the live voice to the new level.
    pub fn set_volume(&mut self, volume: f32) {
        self.state.volume = volume.clamp(0.0, 1.0);

        let (Some(id), Some(context)) = (self.voice, self.host.current()) else {
            return;
        };
        let now = context.current_time();
        context.automate(
            id,
            Automation::RampFromCurrent {
                target: self.target_gain(),
                start: now,
                end: now + VOLUME_RAMP.as_secs_f64(),
                curve: Curve::Linear,
            },
        );
    }

    /// Switch backgrounds. While playing this fades the old sound out and
    /// schedules the new one for when the fade ends; see `restart_at`.
    /// A load still in flight is redirected to the new sound.
    pub fn set_sound(&mut self, sound: SoundId) {
        if sound == self.state.sound {
            return;
        }
        self.state.sound = sound;

        if self.voice.is_none() {
            // A scheduled switch picks the new sound up when it fires.
            if self.pending.take().is_some() {
                self.load = None;
                self.request_play();
            }
            return;
        }
        self.stop();
        if !sound.is_none() {
            self.restart_at = Some(Instant::now() + self.fade_out);
        }
    }

    /// Deadline of a pending sound switch.
    pub fn restart_at(&self) -> Option<Instant> {
        self.restart_at
    }

    /// Start the switched-to sound once its deadline has passed.
    pub fn restart_if_due(&mut self) {
        match self.restart_at {
            Some(at) if Instant::now() >= at => {}
            _ => return,
        }
        self.restart_at = None;
        if let (Some(old), Some(context)) = (self.fading.take(), self.host.current()) {
            context.release(old);
        }
        self.request_play();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        if !enabled {
            self.stop();
        }
    }

    pub fn is_cached(&self, sound: SoundId) -> bool {
        self.cache.contains_key(&sound)
    }
}
