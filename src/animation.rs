//! Timed animation sessions
//!
//! An [AnimationDefinition] is asked for frame `n` and for how long that frame lasts, for
//! `n = 0, 1, 2, ...`, until it returns no frame. The [AnimationEngine] runs one session per
//! device: starting a session on a device ends the session already running on it first.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use crate::{
    color::Color,
    device::{DeviceError, Light, LightInfo},
    protocol::DeviceId,
};

pub use crate::device::Frame;

mod session;
use session::*;


#[derive(Debug, Error)]
pub enum StartAnimationError {
    #[error("animation not supported by {kind} devices: {reason}")]
    Unsupported { kind: &'static str, reason: String },
    #[error("invalid animation: {0}")]
    Invalid(String),
}

/// A sequence of frames
pub trait AnimationDefinition: Send + 'static {
    /// Frame `n`, or `None` once the sequence is over
    fn frame(&mut self, n: u64) -> Option<Frame>;

    /// How long frame `n` is displayed, also used as the device-side fade time
    ///
    /// Called right after [Self::frame] for the same `n`.
    fn duration(&mut self, n: u64) -> Duration;

    /// Check the animation can run on `light`, binding anything that depends on its geometry
    ///
    /// Called once before the session starts.
    fn prepare(&mut self, _light: &LightInfo) -> Result<(), StartAnimationError> {
        Ok(())
    }
}

impl AnimationDefinition for Box<dyn AnimationDefinition> {
    fn frame(&mut self, n: u64) -> Option<Frame> {
        (**self).frame(n)
    }

    fn duration(&mut self, n: u64) -> Duration {
        (**self).duration(n)
    }

    fn prepare(&mut self, light: &LightInfo) -> Result<(), StartAnimationError> {
        (**self).prepare(light)
    }
}

/// Animation defined by a pair of closures
pub struct FnAnimation<F, D> {
    frame: F,
    duration: D,
}

/// Build an animation from a frame function and a duration function
pub fn from_fn<F, D>(frame: F, duration: D) -> FnAnimation<F, D>
where
    F: FnMut(u64) -> Option<Frame> + Send + 'static,
    D: FnMut(u64) -> Duration + Send + 'static,
{
    FnAnimation { frame, duration }
}

impl<F, D> AnimationDefinition for FnAnimation<F, D>
where
    F: FnMut(u64) -> Option<Frame> + Send + 'static,
    D: FnMut(u64) -> Duration + Send + 'static,
{
    fn frame(&mut self, n: u64) -> Option<Frame> {
        (self.frame)(n)
    }

    fn duration(&mut self, n: u64) -> Duration {
        (self.duration)(n)
    }
}

/// How a session ended
#[derive(Debug)]
pub enum AnimationOutcome {
    /// The sequence ran out of frames
    Completed,
    /// The session was stopped, or replaced by another one
    Interrupted,
    /// A device command failed
    Failed(DeviceError),
}

impl AnimationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Callback receiving the outcome of a session
pub type CompletionCallback = Box<dyn FnOnce(AnimationOutcome) + Send>;

/// Per-session options
pub struct AnimationOptions {
    /// Color displayed when the sequence ends or is stopped gracefully
    pub end_color: Option<Color>,
    /// Fade time to the end color
    pub end_transition: Duration,
    /// Wait for the device to acknowledge every frame
    pub acknowledge: bool,
    pub on_complete: Option<CompletionCallback>,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            end_color: None,
            end_transition: Duration::ZERO,
            acknowledge: true,
            on_complete: None,
        }
    }
}

impl AnimationOptions {
    pub fn with_end_color(mut self, color: Color, transition: Duration) -> Self {
        self.end_color = Some(color);
        self.end_transition = transition;
        self
    }

    pub fn on_complete(mut self, callback: impl FnOnce(AnimationOutcome) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for AnimationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationOptions")
            .field("end_color", &self.end_color)
            .field("end_transition", &self.end_transition)
            .field("acknowledge", &self.acknowledge)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    /// Displaying the end color
    Ending,
    Ended,
}

struct SessionHandle {
    control: watch::Sender<Control>,
    state: watch::Receiver<SessionState>,
    join_handle: Option<JoinHandle<()>>,
}

impl SessionHandle {
    fn request(&self, control: Control) {
        self.control.send_if_modified(|current| {
            if control > *current {
                *current = control;
                true
            } else {
                false
            }
        });
    }

    async fn join(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(error) = join_handle.await {
                error!(error = %error, "animation session panicked");
            }
        }
    }
}

/// Registry of the animation sessions, one per device
#[derive(Clone, Default)]
pub struct AnimationEngine {
    sessions: Arc<Mutex<HashMap<DeviceId, SessionHandle>>>,
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start animating `light`, ending the session already running on it first
    ///
    /// The definition is checked against the device before anything is stopped or spawned.
    #[instrument(skip_all, fields(id = %light.id()))]
    pub async fn start(
        &self,
        light: Light,
        mut definition: impl AnimationDefinition,
        options: AnimationOptions,
    ) -> Result<(), StartAnimationError> {
        definition.prepare(light.info())?;

        let mut sessions = self.sessions.lock().await;
        let id = light.id();

        if let Some(mut previous) = sessions.remove(&id) {
            debug!("ending previous session");
            previous.request(Control::Abort);
            previous.join().await;
        }

        let (control_tx, control_rx) = watch::channel(Control::Run);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Session {
            light,
            definition: Box::new(definition),
            options,
            control: control_rx,
            state: state_tx,
        };

        let join_handle = tokio::spawn(session.run());

        sessions.insert(
            id,
            SessionHandle {
                control: control_tx,
                state: state_rx,
                join_handle: Some(join_handle),
            },
        );

        Ok(())
    }

    /// End the session running on device `id`
    ///
    /// An immediate stop interrupts the command being sent and skips the end color. Otherwise the
    /// current command completes and the end color is applied. Does nothing if no session is
    /// running, and does not wait for the session to end.
    pub async fn stop(&self, id: DeviceId, immediate: bool) {
        if let Some(session) = self.sessions.lock().await.get(&id) {
            debug!(%id, immediate, "stopping session");
            session.request(if immediate {
                Control::Abort
            } else {
                Control::Finish
            });
        }
    }

    /// Wait until the session on device `id` has ended
    pub async fn wait_for_end(&self, id: DeviceId) {
        let state = match self.sessions.lock().await.get(&id) {
            Some(session) => session.state.clone(),
            None => return,
        };

        wait_ended(state).await;
    }

    /// State of the latest session on device `id`
    pub async fn state(&self, id: DeviceId) -> SessionState {
        self.sessions
            .lock()
            .await
            .get(&id)
            .map(|session| *session.state.borrow())
            .unwrap_or(SessionState::Idle)
    }

    /// Devices with a session that has not ended yet
    pub async fn active_devices(&self) -> Vec<DeviceId> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(_, session)| *session.state.borrow() != SessionState::Ended)
            .map(|(id, _)| *id)
            .collect()
    }

    /// End every session and wait for them
    pub async fn shutdown(&self, immediate: bool) {
        let mut sessions = self.sessions.lock().await;

        for session in sessions.values() {
            session.request(if immediate {
                Control::Abort
            } else {
                Control::Finish
            });
        }

        for (_, mut session) in sessions.drain() {
            session.join().await;
        }
    }
}

async fn wait_ended(mut state: watch::Receiver<SessionState>) {
    // The sender is only dropped once the session has ended
    let _ = state.wait_for(|state| *state == SessionState::Ended).await;
}
