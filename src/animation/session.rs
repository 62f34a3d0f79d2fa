use futures::future::pending;
use tokio::{
    sync::watch,
    time::{sleep_until, Instant},
};

use super::*;

/// Requests sent to a running session, in increasing order of urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Control {
    Run,
    /// Stop after the current command, then apply the end color
    Finish,
    /// Stop now
    Abort,
}

/// Why the frame loop returned
enum LoopEnd {
    Exhausted,
    Stopped(Control),
    Failed(DeviceError),
}

pub(super) struct Session {
    pub light: Light,
    pub definition: Box<dyn AnimationDefinition>,
    pub options: AnimationOptions,
    pub control: watch::Receiver<Control>,
    pub state: watch::Sender<SessionState>,
}

/// Wait until the requested control is at least `threshold`
async fn wait_control(control: &mut watch::Receiver<Control>, threshold: Control) -> Control {
    loop {
        let current = *control.borrow_and_update();
        if current >= threshold {
            return current;
        }

        if control.changed().await.is_err() {
            // Nobody can stop this session anymore
            return pending().await;
        }
    }
}

impl Session {
    pub async fn run(mut self) {
        let id = self.light.id();

        self.state.send_replace(SessionState::Running);
        info!(%id, "animation started");

        let outcome = match self.frames().await {
            LoopEnd::Failed(error) => AnimationOutcome::Failed(error),
            LoopEnd::Stopped(Control::Abort) => AnimationOutcome::Interrupted,
            LoopEnd::Stopped(_) => self.end(AnimationOutcome::Interrupted).await,
            LoopEnd::Exhausted => self.end(AnimationOutcome::Completed).await,
        };

        match &outcome {
            AnimationOutcome::Failed(error) => {
                warn!(%id, error = %error, "animation failed");
            }
            outcome => {
                info!(%id, ?outcome, "animation ended");
            }
        }

        if let Some(on_complete) = self.options.on_complete.take() {
            on_complete(outcome);
        }

        self.state.send_replace(SessionState::Ended);
    }

    async fn frames(&mut self) -> LoopEnd {
        let mut n = 0u64;

        loop {
            let control = *self.control.borrow_and_update();
            if control != Control::Run {
                return LoopEnd::Stopped(control);
            }

            let frame_start = Instant::now();

            let frame = match self.definition.frame(n) {
                Some(frame) => frame,
                None => {
                    debug!(n, "sequence ended");
                    return LoopEnd::Exhausted;
                }
            };
            let duration = self.definition.duration(n);

            trace!(n, ?duration, "frame");

            let apply = self
                .light
                .apply_frame(&frame, duration, self.options.acknowledge);

            let result = tokio::select! {
                biased;
                control = wait_control(&mut self.control, Control::Abort) => {
                    return LoopEnd::Stopped(control);
                }
                result = apply => result,
            };

            if let Err(error) = result {
                return LoopEnd::Failed(error);
            }

            // Durations past the end of time hold the frame until stopped
            let next_frame = async {
                match frame_start.checked_add(duration) {
                    Some(deadline) => sleep_until(deadline).await,
                    None => pending().await,
                }
            };

            tokio::select! {
                biased;
                control = wait_control(&mut self.control, Control::Finish) => {
                    return LoopEnd::Stopped(control);
                }
                _ = next_frame => {}
            }

            n += 1;
        }
    }

    /// Display the end color, if any
    async fn end(&mut self, outcome: AnimationOutcome) -> AnimationOutcome {
        let color = match self.options.end_color {
            Some(color) => color,
            None => return outcome,
        };

        self.state.send_replace(SessionState::Ending);

        let frame = Frame::Color(color);
        let apply = self.light.apply_frame(
            &frame,
            self.options.end_transition,
            self.options.acknowledge,
        );

        tokio::select! {
            biased;
            _ = wait_control(&mut self.control, Control::Abort) => AnimationOutcome::Interrupted,
            result = apply => match result {
                Ok(()) => outcome,
                Err(error) => AnimationOutcome::Failed(error),
            },
        }
    }
}
