//! Sliding-window monitor over sensitive-data reads. Escalates from a
//! per-actor throttle to disabling the actor's identity and, past a global
//! threshold of disabled actors, to disabling the endpoint itself. The
//! endpoint breaker reopens only by manual intervention, never by time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::config::SsnAccessConfig;

/// What the caller must do with one access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsnAccessCheck {
    Permit,
    /// Over the window limit: reject with a throttle, actor stays enabled.
    Throttle,
    /// The actor kept reading after being throttled: disable its identity.
    DisableActor,
    /// The global breaker is open: reject everyone.
    EndpointDisabled,
}

#[derive(Debug, Default)]
struct ActorWindow {
    reads: VecDeque<DateTime<Utc>>,
    throttled: bool,
    disabled: bool,
}

#[derive(Debug, Default)]
struct MonitorState {
    actors: HashMap<String, ActorWindow>,
    endpoint_disabled: bool,
}

#[derive(Debug)]
pub struct SsnAccessMonitor {
    window: Duration,
    max_reads: u32,
    disabled_actor_threshold: u32,
    state: Mutex<MonitorState>,
}

impl SsnAccessMonitor {
    pub fn new(window: Duration, max_reads: u32, disabled_actor_threshold: u32) -> Self {
        Self {
            window,
            max_reads,
            disabled_actor_threshold,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn from_config(config: &SsnAccessConfig) -> Self {
        Self::new(
            Duration::seconds(config.window_seconds as i64),
            config.max_reads_per_window,
            config.disabled_actor_threshold,
        )
    }

    /// Record one access attempt by `actor` and decide its fate.
    pub fn check(&self, actor: &str, now: DateTime<Utc>) -> SsnAccessCheck {
        let mut state = self.state.lock().expect("monitor mutex poisoned");
        if state.endpoint_disabled {
            return SsnAccessCheck::EndpointDisabled;
        }

        let window = state.actors.entry(actor.to_string()).or_default();
        if window.disabled {
            return SsnAccessCheck::DisableActor;
        }

        if window.throttled {
            window.disabled = true;
            let disabled_actors = state
                .actors
                .values()
                .filter(|window| window.disabled)
                .count() as u32;
            if disabled_actors > self.disabled_actor_threshold {
                state.endpoint_disabled = true;
            }
            return SsnAccessCheck::DisableActor;
        }

        let cutoff = now - self.window;
        while window
            .reads
            .front()
            .is_some_and(|read| *read < cutoff)
        {
            window.reads.pop_front();
        }

        if window.reads.len() as u32 >= self.max_reads {
            window.throttled = true;
            return SsnAccessCheck::Throttle;
        }

        window.reads.push_back(now);
        SsnAccessCheck::Permit
    }

    pub fn endpoint_disabled(&self) -> bool {
        self.state
            .lock()
            .expect("monitor mutex poisoned")
            .endpoint_disabled
    }

    /// Manual intervention: reopen the endpoint and forget actor history.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("monitor mutex poisoned");
        state.endpoint_disabled = false;
        state.actors.clear();
    }
}
