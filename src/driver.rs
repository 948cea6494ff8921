// src/driver.rs
//
// Runs a session on a tokio task.
//
// The task owns the coordinator outright, so every state change happens on
// one logical thread. Callers talk to it through `SessionHandle`: commands
// go in over an mpsc channel, snapshots come back over a watch channel.
// Ambient fetch/decode runs on child tasks in a `JoinSet`, so the tick
// branch never waits on asset I/O.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::ambient::AmbientState;
use crate::assets::{AssetSource, SoundId};
use crate::binaural::{BinauralState, BrainwavePreset};
use crate::clock::Clock;
use crate::coordinator::SessionCoordinator;
use crate::event::TimerEvent;
use crate::timer::SessionState;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    SetAmbientVolume(f32),
    SetAmbientSound(SoundId),
    SetAmbientEnabled(bool),
    StartBinaural,
    StopBinaural,
    FadeOutBinaural(Duration),
    SetBinauralPreset(BrainwavePreset),
    SetBinauralVolume(f32),
    SetChimesEnabled(bool),
    Shutdown,
}

/// Everything a UI needs to draw the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: SessionState,
    pub ambient: AmbientState,
    pub binaural: BinauralState,
}

impl SessionSnapshot {
    fn of<A: AssetSource + 'static, C: Clock>(coordinator: &SessionCoordinator<A, C>) -> Self {
        Self {
            session: *coordinator.state(),
            ambient: coordinator.ambient_state(),
            binaural: coordinator.binaural_state(),
        }
    }
}

/// Control handle for a spawned session. Dropping it ends the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
    events: Option<mpsc::UnboundedReceiver<TimerEvent>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Returns false if the session task has already ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(SessionCommand::Start)
    }

    pub fn pause(&self) -> bool {
        self.send(SessionCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(SessionCommand::Resume)
    }

    pub fn stop(&self) -> bool {
        self.send(SessionCommand::Stop)
    }

    pub fn reset(&self) -> bool {
        self.send(SessionCommand::Reset)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that wakes on every published change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Timer events. Only the first call gets the receiver.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TimerEvent>> {
        self.events.take()
    }

    /// Stop the task cleanly and wait for the audio host to be released.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Move `coordinator` onto its own task, ticking every `tick_interval`
/// while the timer runs.
pub fn spawn_session<A, C>(
    mut coordinator: SessionCoordinator<A, C>,
    tick_interval: Duration,
) -> SessionHandle
where
    A: AssetSource + 'static,
    C: Clock + 'static,
{
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::of(&coordinator));
    let events = coordinator.subscribe();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut loads = JoinSet::new();

        loop {
            let restart = coordinator.ambient_restart_at();
            tokio::select! {
                command = command_rx.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => apply(&mut coordinator, command),
                },
                _ = interval.tick(), if coordinator.is_running() => coordinator.tick(),
                Some(loaded) = loads.join_next(), if !loads.is_empty() => match loaded {
                    Ok(loaded) => coordinator.finish_ambient_load(loaded),
                    Err(e) => warn!("ambient load task failed: {}", e),
                },
                _ = tokio::time::sleep_until(restart.unwrap_or_else(Instant::now)), if restart.is_some() => {
                    coordinator.restart_ambient_if_due();
                }
            }
            while let Some(load) = coordinator.take_ambient_load() {
                loads.spawn(load);
            }
            snapshot_tx.send_if_modified(|current| {
                let next = SessionSnapshot::of(&coordinator);
                let changed = *current != next;
                *current = next;
                changed
            });
        }
        debug!("session driver stopped");
    });

    SessionHandle {
        commands: command_tx,
        snapshot: snapshot_rx,
        events: Some(events),
        task: Some(task),
    }
}

fn apply<A: AssetSource + 'static, C: Clock>(
    coordinator: &mut SessionCoordinator<A, C>,
    command: SessionCommand,
) {
    debug!("session command {:?}", command);
    match command {
        SessionCommand::Start => coordinator.start(),
        SessionCommand::Pause => coordinator.pause(),
        SessionCommand::Resume => coordinator.resume(),
        SessionCommand::Stop => coordinator.stop(),
        SessionCommand::Reset => coordinator.reset(),
        SessionCommand::SetAmbientVolume(volume) => coordinator.set_ambient_volume(volume),
        SessionCommand::SetAmbientSound(sound) => coordinator.set_ambient_sound(sound),
        SessionCommand::SetAmbientEnabled(enabled) => coordinator.set_ambient_enabled(enabled),
        SessionCommand::StartBinaural => coordinator.start_binaural(),
        SessionCommand::StopBinaural => coordinator.stop_binaural(),
        SessionCommand::FadeOutBinaural(duration) => coordinator.fade_out_binaural(duration),
        SessionCommand::SetBinauralPreset(preset) => coordinator.set_binaural_preset(preset),
        SessionCommand::SetBinauralVolume(volume) => coordinator.set_binaural_volume(volume),
        SessionCommand::SetChimesEnabled(enabled) => coordinator.set_chimes_enabled(enabled),
        SessionCommand::Shutdown => {}
    }
}
