//! Trigger registry — the single authority over the worker population.
//!
//! The table holds at most one entry per applet. It is guarded by a plain
//! mutex that is never held across an `.await`: senders and join handles are
//! cloned or taken out of the entry before anything asynchronous happens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use areaflow_domain::applet::{Applet, AppletStatus, AreaBinding, Side};
use areaflow_domain::error::{AreaFlowError, ConflictError, NotFoundError};
use areaflow_domain::id::AppletId;
use areaflow_domain::webhook::WebhookMode;

use super::control::{Control, TriggerInfo, TriggerState, TriggerTiming};
use super::worker::TriggerWorker;
use crate::capability::{BoundCapability, CapabilityCatalog};
use crate::lock;
use crate::ports::{AppletLogFactory, AppletRepository, AuthorizationRepository};
use crate::webhook_broker::WebhookBroker;

struct TriggerEntry {
    /// Present until the worker is launched.
    idle: Option<TriggerWorker>,
    /// Present while the launched worker has not been asked to stop.
    control: Option<mpsc::Sender<Control>>,
    task: Option<JoinHandle<()>>,
    status: watch::Receiver<TriggerInfo>,
    /// Whether a broker slot was registered under the applet id.
    webhook: bool,
}

impl TriggerEntry {
    fn new(worker: TriggerWorker) -> Self {
        Self {
            status: worker.subscribe(),
            webhook: worker.action().spec.webhook.is_some(),
            idle: Some(worker),
            control: None,
            task: None,
        }
    }

    /// Launched, not yet reported `Stopped`, and the task has not ended.
    /// A task that panicked never reports `Stopped` but is finished.
    fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
            && self.status.borrow().state != TriggerState::Stopped
    }

    /// Published status, reporting a dead task as `Stopped`.
    fn info(&self) -> TriggerInfo {
        let mut info = self.status.borrow().clone();
        if info.state == TriggerState::Running && !self.is_live() {
            info.state = TriggerState::Stopped;
        }
        info
    }

    fn launch(&mut self, worker: TriggerWorker) {
        let (sender, receiver) = mpsc::channel(1);
        self.status = worker.subscribe();
        self.task = Some(tokio::spawn(worker.run(receiver)));
        self.control = Some(sender);
    }
}

fn trigger_not_found(id: AppletId) -> AreaFlowError {
    NotFoundError {
        entity: "Trigger",
        id: id.to_string(),
    }
    .into()
}

pub struct TriggerRegistry<R, C, L> {
    repo: R,
    catalog: C,
    logs: L,
    broker: Arc<WebhookBroker>,
    timing: TriggerTiming,
    table: Mutex<HashMap<AppletId, TriggerEntry>>,
}

impl<R, C, L> TriggerRegistry<R, C, L>
where
    R: AppletRepository + AuthorizationRepository,
    C: CapabilityCatalog,
    L: AppletLogFactory,
{
    pub fn new(
        repo: R,
        catalog: C,
        logs: L,
        broker: Arc<WebhookBroker>,
        timing: TriggerTiming,
    ) -> Self {
        Self {
            repo,
            catalog,
            logs,
            broker,
            timing,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn broker(&self) -> &Arc<WebhookBroker> {
        &self.broker
    }

    /// Build an idle worker for `applet` and record it.
    ///
    /// Registers a broker slot when the action is webhook-driven.
    ///
    /// # Errors
    ///
    /// - [`ConflictError::AlreadyExists`] if the applet already has a trigger;
    ///   the existing one is left untouched.
    /// - [`AreaFlowError::NotFound`] / [`AreaFlowError::Validation`] if a
    ///   binding does not resolve.
    /// - [`AreaFlowError::Log`] if the applet log cannot be opened.
    #[tracing::instrument(skip(self, applet), fields(applet_id = %applet.id))]
    pub async fn create(&self, applet: &Applet) -> Result<(), AreaFlowError> {
        self.ensure_absent(applet.id)?;
        let worker = self.build(applet).await?;

        let webhook = worker.action().spec.webhook;
        {
            let mut table = lock(&self.table);
            if table.contains_key(&applet.id) {
                return Err(already_exists(applet.id));
            }
            table.insert(applet.id, TriggerEntry::new(worker));
        }
        if webhook.is_some() {
            self.sync_webhook(applet.id, webhook);
        }
        tracing::info!("trigger created");
        Ok(())
    }

    /// Launch the idle worker of `id` when `auto_start` is set.
    ///
    /// Starting an already running worker is a no-op. Persists
    /// `status = running` on launch, best effort.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if no trigger exists, or
    /// [`ConflictError::NotRunning`] if the worker was stopped; use
    /// [`restart`](Self::restart) for those.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, id: AppletId, auto_start: bool) -> Result<(), AreaFlowError> {
        let launched = {
            let mut table = lock(&self.table);
            let entry = table.get_mut(&id).ok_or_else(|| trigger_not_found(id))?;
            if !auto_start {
                return Ok(());
            }
            match entry.idle.take() {
                Some(worker) => {
                    entry.launch(worker);
                    true
                }
                None if entry.is_live() => false,
                None => return Err(ConflictError::NotRunning(id.to_string()).into()),
            }
        };
        if launched {
            self.persist_status(id, AppletStatus::Running).await;
            tracing::info!("trigger started");
        }
        Ok(())
    }

    /// [`create`](Self::create) then [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// See both operations.
    pub async fn add(&self, applet: &Applet, auto_start: bool) -> Result<(), AreaFlowError> {
        self.create(applet).await?;
        self.start(applet.id, auto_start).await
    }

    /// Resume the worker of `id` and persist `active = true`.
    ///
    /// # Errors
    ///
    /// See [`close`](Self::close).
    pub async fn open(&self, id: AppletId) -> Result<(), AreaFlowError> {
        self.set_armed(id, true).await
    }

    /// Pause the worker of `id` and persist `active = false`.
    ///
    /// The in-memory toggle is kept even if persisting fails.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] if no trigger exists.
    /// - [`ConflictError::NotRunning`] if the worker was stopped.
    /// - The repository error if persisting the flag failed.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self, id: AppletId) -> Result<(), AreaFlowError> {
        self.set_armed(id, false).await
    }

    async fn set_armed(&self, id: AppletId, armed: bool) -> Result<(), AreaFlowError> {
        let sender = {
            let mut table = lock(&self.table);
            let entry = table.get_mut(&id).ok_or_else(|| trigger_not_found(id))?;
            if let Some(worker) = entry.idle.as_mut() {
                worker.set_armed(armed);
                None
            } else if let Some(sender) = &entry.control {
                Some(sender.clone())
            } else {
                return Err(ConflictError::NotRunning(id.to_string()).into());
            }
        };
        if let Some(sender) = sender {
            sender
                .send(Control::SetArmed(armed))
                .await
                .map_err(|_| ConflictError::NotRunning(id.to_string()))?;
        }
        self.repo.set_active(id, armed).await.inspect_err(|err| {
            tracing::error!(applet_id = %id, error = %err, "failed to persist active flag");
        })
    }

    /// Ask the worker of `id` to stop and persist `status = stopped`.
    ///
    /// Returns once the worker has been notified; it finishes its current
    /// cycle first. Stopping twice is not an error.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if no trigger exists.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, id: AppletId) -> Result<(), AreaFlowError> {
        let stopped = {
            let mut table = lock(&self.table);
            let entry = table.get_mut(&id).ok_or_else(|| trigger_not_found(id))?;
            if let Some(worker) = entry.idle.take() {
                worker.halt();
                true
            } else if let Some(sender) = entry.control.take() {
                // A full slot is fine: dropping the sender ends the loop too.
                let _ = sender.try_send(Control::Stop);
                true
            } else {
                false
            }
        };
        if stopped {
            self.persist_status(id, AppletStatus::Stopped).await;
            tracing::info!("trigger stop requested");
        }
        Ok(())
    }

    /// Delete the entry of `id` and its broker slot.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if no trigger exists, or
    /// [`ConflictError::StillRunning`] while the worker has not reached
    /// `Stopped`.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, id: AppletId) -> Result<(), AreaFlowError> {
        let entry = {
            let mut table = lock(&self.table);
            let entry = table.get(&id).ok_or_else(|| trigger_not_found(id))?;
            if entry.is_live() {
                return Err(ConflictError::StillRunning(id.to_string()).into());
            }
            table.remove(&id)
        };
        if entry.is_some_and(|entry| entry.webhook) {
            self.broker.remove(&id.to_string());
        }
        tracing::info!("trigger removed");
        Ok(())
    }

    /// Stop `id`, wait for its loop to finish, then remove it.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if no trigger exists.
    pub async fn retire(&self, id: AppletId) -> Result<(), AreaFlowError> {
        self.stop(id).await?;
        let task = lock(&self.table)
            .get_mut(&id)
            .and_then(|entry| entry.task.take());
        if let Some(task) = task
            && let Err(err) = task.await
        {
            tracing::error!(applet_id = %id, error = %err, "trigger task ended abnormally");
        }
        self.remove(id)
    }

    /// Snapshot of the worker status for `id`.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if no trigger exists.
    pub fn lookup(&self, id: AppletId) -> Result<TriggerInfo, AreaFlowError> {
        lock(&self.table)
            .get(&id)
            .map(TriggerEntry::info)
            .ok_or_else(|| trigger_not_found(id))
    }

    /// Snapshot of every registered trigger.
    pub fn list(&self) -> Vec<TriggerInfo> {
        lock(&self.table)
            .values()
            .map(TriggerEntry::info)
            .collect()
    }

    /// Run `id` again with a fresh worker built from the stored applet.
    ///
    /// An idle worker is simply launched.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] if no trigger or applet exists.
    /// - [`ConflictError::StillRunning`] if the current worker is running.
    /// - Any [`create`](Self::create) error while building the worker.
    #[tracing::instrument(skip(self))]
    pub async fn restart(&self, id: AppletId) -> Result<(), AreaFlowError> {
        let idle = {
            let table = lock(&self.table);
            let entry = table.get(&id).ok_or_else(|| trigger_not_found(id))?;
            if entry.is_live() {
                return Err(ConflictError::StillRunning(id.to_string()).into());
            }
            entry.idle.is_some()
        };
        if idle {
            return self.start(id, true).await;
        }

        let applet = self.load_applet(id).await?;
        let worker = self.build(&applet).await?;
        let webhook = worker.action().spec.webhook;
        {
            let mut table = lock(&self.table);
            let entry = table.get_mut(&id).ok_or_else(|| trigger_not_found(id))?;
            if entry.is_live() {
                return Err(ConflictError::StillRunning(id.to_string()).into());
            }
            entry.webhook = webhook.is_some();
            entry.launch(worker);
        }
        self.sync_webhook(id, webhook);
        self.persist_status(id, AppletStatus::Running).await;
        tracing::info!("trigger restarted");
        Ok(())
    }

    /// Bind `side` of `id` to a new capability.
    ///
    /// The binding is resolved and persisted first, then handed to the
    /// worker, which resets the store of that side. A stopped worker picks
    /// the new binding up on its next restart.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] for an unknown trigger, applet,
    ///   capability or authorization.
    /// - [`AreaFlowError::Validation`] if the binding misses a setting.
    /// - The repository error if persisting failed.
    #[tracing::instrument(skip(self, binding), fields(area = %binding.area))]
    pub async fn reconfigure(
        &self,
        id: AppletId,
        side: Side,
        binding: AreaBinding,
    ) -> Result<(), AreaFlowError> {
        if !lock(&self.table).contains_key(&id) {
            return Err(trigger_not_found(id));
        }
        let capability = self.bind(&binding, side).await?;
        let mut applet = self.load_applet(id).await?;
        applet.set_binding(side, binding);
        self.repo.update(applet).await?;

        let webhook = capability.spec.webhook;
        let pending = {
            let mut table = lock(&self.table);
            let entry = table.get_mut(&id).ok_or_else(|| trigger_not_found(id))?;
            if side == Side::Action {
                entry.webhook = webhook.is_some();
            }
            match (entry.idle.as_mut(), entry.control.clone()) {
                (Some(worker), _) => {
                    worker.reconfigure(side, capability);
                    None
                }
                (None, Some(sender)) => Some((sender, capability)),
                (None, None) => None,
            }
        };
        if side == Side::Action {
            self.sync_webhook(id, webhook);
        }
        if let Some((sender, capability)) = pending {
            sender
                .send(Control::Reconfigure(side, capability))
                .await
                .map_err(|_| ConflictError::NotRunning(id.to_string()))?;
        }
        tracing::info!("trigger reconfigured");
        Ok(())
    }

    /// Create a trigger for every runnable applet and launch those whose
    /// last known status is `running`. The initial armed flag is the stored
    /// `active` value.
    ///
    /// Applets that fail to load are logged and skipped. Returns how many
    /// workers were launched.
    ///
    /// # Errors
    ///
    /// Returns the repository error if the applets cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn load_runnable(&self) -> Result<usize, AreaFlowError> {
        let applets = self.repo.get_runnable().await?;
        let total = applets.len();
        let mut started = 0;
        for applet in applets {
            if let Err(err) = self.create(&applet).await {
                tracing::error!(applet_id = %applet.id, error = %err, "failed to load trigger");
                continue;
            }
            if applet.status != AppletStatus::Running {
                continue;
            }
            match self.start(applet.id, true).await {
                Ok(()) => started += 1,
                Err(err) => {
                    tracing::error!(applet_id = %applet.id, error = %err, "failed to start trigger");
                }
            }
        }
        tracing::info!(total, started, "triggers loaded");
        Ok(started)
    }

    /// Stop every worker and wait for all of them to finish. Persisted
    /// statuses are left as they are.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut table = lock(&self.table);
            table
                .values_mut()
                .filter_map(|entry| {
                    if let Some(worker) = entry.idle.take() {
                        worker.halt();
                    }
                    if let Some(sender) = entry.control.take() {
                        let _ = sender.try_send(Control::Stop);
                    }
                    entry.task.take()
                })
                .collect()
        };
        tracing::info!(count = tasks.len(), "waiting for triggers to stop");
        for task in tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "trigger task ended abnormally");
            }
        }
    }

    fn ensure_absent(&self, id: AppletId) -> Result<(), AreaFlowError> {
        if lock(&self.table).contains_key(&id) {
            Err(already_exists(id))
        } else {
            Ok(())
        }
    }

    async fn load_applet(&self, id: AppletId) -> Result<Applet, AreaFlowError> {
        AppletRepository::get_by_id(&self.repo, id)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Applet",
                    id: id.to_string(),
                }
                .into()
            })
    }

    async fn bind(&self, binding: &AreaBinding, side: Side) -> Result<BoundCapability, AreaFlowError> {
        let resolved = self.catalog.check_binding(binding, side)?;
        let authorization = match binding.authorization {
            Some(auth_id) => Some(
                AuthorizationRepository::get_by_id(&self.repo, auth_id)
                    .await?
                    .ok_or_else(|| NotFoundError {
                        entity: "Authorization",
                        id: auth_id.to_string(),
                    })?,
            ),
            None => None,
        };
        Ok(BoundCapability {
            spec: resolved.spec,
            handle: resolved.handle,
            settings: binding.settings.clone(),
            authorization,
        })
    }

    async fn build(&self, applet: &Applet) -> Result<TriggerWorker, AreaFlowError> {
        let action = self.bind(&applet.action, Side::Action).await?;
        let reaction = self.bind(&applet.reaction, Side::Reaction).await?;
        let log = self.logs.open(applet.id)?;
        Ok(TriggerWorker::new(
            applet.id,
            action,
            reaction,
            log,
            self.timing,
            applet.active,
        ))
    }

    /// Make the broker slot of `id` follow the action's webhook requirement.
    fn sync_webhook(&self, id: AppletId, mode: Option<WebhookMode>) {
        let name = id.to_string();
        match mode {
            Some(mode) => {
                if self.broker.mode(&name).is_some_and(|current| current != mode) {
                    self.broker.remove(&name);
                }
                self.broker.register(&name, mode);
            }
            None => {
                self.broker.remove(&name);
            }
        }
    }

    async fn persist_status(&self, id: AppletId, status: AppletStatus) {
        if let Err(err) = self.repo.set_status(id, status).await {
            tracing::warn!(applet_id = %id, error = %err, status = status.as_str(), "failed to persist trigger status");
        }
    }
}

fn already_exists(id: AppletId) -> AreaFlowError {
    ConflictError::AlreadyExists {
        entity: "Trigger",
        id: id.to_string(),
    }
    .into()
}
