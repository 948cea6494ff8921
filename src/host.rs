// src/host.rs
//
// One audio context per session, created on first need.
//
// Every audio component holds a clone of the same host and calls
// `acquire()` when it is about to make sound. The first call creates the
// context and attaches its renderer to the output backend; later calls
// return the same instance (resuming it if it was suspended).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::bridge::{AudioContext, ContextState, create_context};
use crate::error::AudioError;
use crate::output::OutputBackend;

struct HostState {
    context: Option<Arc<AudioContext>>,
    backend: Box<dyn OutputBackend>,
    released: bool,
}

/// Shared owner of the session's audio context.
#[derive(Clone)]
pub struct AudioGraphHost {
    inner: Arc<Mutex<HostState>>,
    sample_rate: f64,
    block_size: usize,
}

impl AudioGraphHost {
    pub fn new(backend: Box<dyn OutputBackend>, sample_rate: f64, block_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HostState {
                context: None,
                backend,
                released: false,
            })),
            sample_rate,
            block_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the running context, creating it on first use.
    ///
    /// Fails once the host has been released, or if the backend cannot
    /// open an output.
    pub fn acquire(&self) -> Result<Arc<AudioContext>, AudioError> {
        let mut state = self.lock();
        if state.released {
            return Err(AudioError::Closed);
        }

        if let Some(context) = &state.context {
            if context.state() == ContextState::Suspended {
                debug!("resuming suspended audio context");
                context.resume();
            }
            return Ok(Arc::clone(context));
        }

        let (context, renderer) = create_context(self.sample_rate, self.block_size);
        state.backend.attach(renderer)?;
        context.resume();
        info!(
            "audio context created ({} Hz, {} frame blocks)",
            self.sample_rate, self.block_size
        );

        let context = Arc::new(context);
        state.context = Some(Arc::clone(&context));
        Ok(context)
    }

    /// The context if one has been created, without creating it.
    pub fn current(&self) -> Option<Arc<AudioContext>> {
        let state = self.lock();
        if state.released {
            return None;
        }
        state.context.clone()
    }

    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Close the context and detach the backend. Only the first call acts.
    pub fn release(&self) {
        let mut state = self.lock();
        if state.released {
            return;
        }
        state.released = true;

        if let Some(context) = state.context.take() {
            context.close();
            state.backend.detach();
            info!("audio context released");
        }
    }
}

/// Releases the host when dropped.
///
/// Held by whoever owns the session so that every exit path, including
/// early returns and panics unwinding through the owner, closes the
/// context.
pub struct HostLease {
    host: AudioGraphHost,
}

impl HostLease {
    pub fn new(host: AudioGraphHost) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &AudioGraphHost {
        &self.host
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        self.host.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{NoOutput, OfflineOutput};

    fn offline_host() -> (AudioGraphHost, OfflineOutput) {
        let output = OfflineOutput::new();
        let host = AudioGraphHost::new(Box::new(output.clone()), 1_000.0, 64);
        (host, output)
    }

    #[test]
    fn context_is_created_lazily_and_shared() {
        let (host, output) = offline_host();
        assert!(host.current().is_none());
        assert!(!output.is_attached());

        let a = host.acquire().unwrap();
        let b = host.clone().acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(output.is_attached());
        assert_eq!(a.state(), ContextState::Running);
    }

    #[test]
    fn acquire_resumes_a_suspended_context() {
        let (host, _output) = offline_host();
        let context = host.acquire().unwrap();
        context.suspend();
        assert_eq!(context.state(), ContextState::Suspended);

        host.acquire().unwrap();
        assert_eq!(context.state(), ContextState::Running);
    }

    #[test]
    fn release_closes_exactly_once() {
        let (host, output) = offline_host();
        let context = host.acquire().unwrap();

        host.release();
        host.release();
        assert_eq!(context.state(), ContextState::Closed);
        assert!(!output.is_attached());
        assert!(matches!(host.acquire(), Err(AudioError::Closed)));
    }

    #[test]
    fn lease_releases_on_drop() {
        let (host, _output) = offline_host();
        let context = {
            let lease = HostLease::new(host.clone());
            lease.host().acquire().unwrap()
        };
        assert!(host.is_released());
        assert_eq!(context.state(), ContextState::Closed);
    }

    #[test]
    fn backend_failure_is_reported_not_cached() {
        let host = AudioGraphHost::new(Box::new(NoOutput), 1_000.0, 64);
        assert!(matches!(host.acquire(), Err(AudioError::Backend(_))));
        assert!(host.current().is_none());
    }
}
