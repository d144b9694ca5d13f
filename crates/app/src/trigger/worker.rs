//! Trigger worker — the poll → evaluate → react loop of one applet.
//!
//! ```text
//!  Idle ──run()──▶ Running ──Stop / channel closed──▶ Stopped
//!                   │  ▲
//!        SetArmed(false) SetArmed(true)
//!                   ▼  │
//!                 Running, paused
//! ```
//!
//! Control messages are drained once per iteration, before the cycle. While
//! paused the loop only waits on the control channel. Stores survive a
//! pause; a reconfigure resets the store of the side it touches.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use areaflow_domain::applet::Side;
use areaflow_domain::execution::EventData;
use areaflow_domain::id::AppletId;
use areaflow_domain::store::{Namespace, Store};

use super::control::{Control, TriggerInfo, TriggerState, TriggerTiming};
use crate::capability::{BoundCapability, CapabilityContext};
use crate::ports::AppletLog;

pub struct TriggerWorker {
    applet_id: AppletId,
    action: BoundCapability,
    reaction: BoundCapability,
    action_store: Store,
    reaction_store: Store,
    armed: bool,
    log: Arc<dyn AppletLog>,
    timing: TriggerTiming,
    status: watch::Sender<TriggerInfo>,
}

impl TriggerWorker {
    /// Build an idle worker. Each store is seeded from its binding settings.
    #[must_use]
    pub fn new(
        applet_id: AppletId,
        action: BoundCapability,
        reaction: BoundCapability,
        log: Arc<dyn AppletLog>,
        timing: TriggerTiming,
        armed: bool,
    ) -> Self {
        let (status, _) = watch::channel(TriggerInfo {
            applet_id,
            state: TriggerState::Idle,
            armed,
        });
        Self {
            applet_id,
            action_store: Store::from_settings(&action.settings),
            reaction_store: Store::from_settings(&reaction.settings),
            action,
            reaction,
            armed,
            log,
            timing,
            status,
        }
    }

    #[must_use]
    pub fn applet_id(&self) -> AppletId {
        self.applet_id
    }

    #[must_use]
    pub fn action(&self) -> &BoundCapability {
        &self.action
    }

    /// Watch the worker's published status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TriggerInfo> {
        self.status.subscribe()
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.armed = armed;
        self.publish(self.state());
    }

    /// Replace the capability on `side`. Memoised `ctx:` values of that side
    /// are dropped and its `req:` values replaced; the other side is untouched.
    pub fn reconfigure(&mut self, side: Side, capability: BoundCapability) {
        let store = match side {
            Side::Action => &mut self.action_store,
            Side::Reaction => &mut self.reaction_store,
        };
        store.clear_namespace(Namespace::Context);
        store.replace_settings(&capability.settings);
        match side {
            Side::Action => self.action = capability,
            Side::Reaction => self.reaction = capability,
        }
    }

    /// Retire a worker that was never launched.
    pub fn halt(self) {
        self.log.flush();
        self.publish(TriggerState::Stopped);
    }

    /// Run until a [`Control::Stop`] arrives or every control sender is dropped.
    #[tracing::instrument(skip_all, fields(applet_id = %self.applet_id))]
    pub async fn run(mut self, mut control: mpsc::Receiver<Control>) {
        self.publish(TriggerState::Running);
        self.log.info("trigger started");
        tracing::debug!("trigger loop started");

        'run: loop {
            loop {
                match control.try_recv() {
                    Ok(message) => {
                        if !self.apply(message) {
                            break 'run;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'run,
                }
            }

            let next = if self.armed {
                let wait = self.cycle().await;
                if wait.is_zero() {
                    tokio::task::yield_now().await;
                    continue;
                }
                tokio::select! {
                    message = control.recv() => message,
                    () = tokio::time::sleep(wait) => continue,
                }
            } else {
                control.recv().await
            };

            let Some(message) = next else { break };
            if !self.apply(message) {
                break;
            }
        }

        self.log.info("trigger stopped");
        self.log.flush();
        self.publish(TriggerState::Stopped);
        tracing::debug!("trigger loop stopped");
    }

    /// Handle one control message. Returns `false` when the loop must end.
    fn apply(&mut self, message: Control) -> bool {
        match message {
            Control::SetArmed(armed) => {
                if armed != self.armed {
                    self.log
                        .info(if armed { "trigger resumed" } else { "trigger paused" });
                }
                self.set_armed(armed);
                true
            }
            Control::Reconfigure(side, capability) => {
                self.log.info(&format!(
                    "{side} reconfigured to {}",
                    capability.spec.area
                ));
                self.reconfigure(side, capability);
                true
            }
            Control::Stop => false,
        }
    }

    /// Run one action call and, on a detected event, the reaction. Returns
    /// how long to wait before the next cycle.
    async fn cycle(&mut self) -> Duration {
        let interval = self.action.spec.poll_interval(self.timing.poll_window);
        let nothing = EventData::new();

        let outcome = self
            .action
            .handle
            .evaluate(CapabilityContext {
                applet_id: self.applet_id,
                authorization: self.action.authorization.as_ref(),
                store: &mut self.action_store,
                data: &nothing,
                log: self.log.as_ref(),
            })
            .await;

        let action_area = &self.action.spec.area;
        if let Some(err) = outcome.error {
            self.log
                .error(&format!("{action_area} failed: {}", describe(&err)));
            return interval.max(self.timing.error_backoff);
        }
        if !outcome.success {
            self.log.info(&format!("{action_area}: no new event"));
            return interval;
        }
        self.log.info(&format!("{action_area} triggered"));

        let reaction = self
            .reaction
            .handle
            .evaluate(CapabilityContext {
                applet_id: self.applet_id,
                authorization: self.reaction.authorization.as_ref(),
                store: &mut self.reaction_store,
                data: &outcome.data,
                log: self.log.as_ref(),
            })
            .await;

        let reaction_area = &self.reaction.spec.area;
        match reaction.error {
            Some(err) => self
                .log
                .error(&format!("{reaction_area} failed: {}", describe(&err))),
            None => self.log.info(&format!("{reaction_area} done")),
        }
        interval
    }

    fn state(&self) -> TriggerState {
        self.status.borrow().state
    }

    fn publish(&self, state: TriggerState) {
        self.status.send_replace(TriggerInfo {
            applet_id: self.applet_id,
            state,
            armed: self.armed,
        });
    }
}

/// Render an error with its source chain on one line.
fn describe(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
