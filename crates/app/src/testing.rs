//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use areaflow_domain::applet::{Applet, AppletStatus, Settings};
use areaflow_domain::authorization::Authorization;
use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::execution::{EventData, ExecutionResult};
use areaflow_domain::id::{AppletId, AuthorizationId};
use areaflow_domain::store::Store;

use crate::capability::{BoundCapability, Capability, CapabilityContext, CapabilitySpec};
use crate::ports::{
    AppletLog, AppletLogFactory, AppletRepository, AuthorizationRepository, LogLevel,
};

/// Log sink keeping every line in memory.
#[derive(Default)]
pub(crate) struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    pub(crate) fn messages(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl AppletLog for MemoryLog {
    fn write(&self, level: LogLevel, message: &str, _echo: bool) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }

    fn flush(&self) {}
}

/// Hands out one [`MemoryLog`] per applet, or fails every open.
#[derive(Default)]
pub(crate) struct MemoryLogs {
    logs: Mutex<HashMap<AppletId, Arc<MemoryLog>>>,
    pub(crate) broken: AtomicBool,
}

impl MemoryLogs {
    pub(crate) fn get(&self, id: AppletId) -> Arc<MemoryLog> {
        self.logs
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .clone()
    }
}

impl AppletLogFactory for MemoryLogs {
    fn open(&self, applet_id: AppletId) -> Result<Arc<dyn AppletLog>, AreaFlowError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(AreaFlowError::Log(Box::new(std::io::Error::other(
                "read-only file system",
            ))));
        }
        Ok(self.get(applet_id))
    }
}

/// Capability backed by a closure over the store and the incoming data.
pub(crate) struct FnCapability<F>(pub(crate) F);

#[async_trait::async_trait]
impl<F> Capability for FnCapability<F>
where
    F: Fn(&mut Store, &EventData) -> ExecutionResult + Send + Sync,
{
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        (self.0)(ctx.store, ctx.data)
    }
}

pub(crate) type Handler = fn(&mut Store, &EventData) -> ExecutionResult;

fn idle(_: &mut Store, _: &EventData) -> ExecutionResult {
    ExecutionResult::idle()
}

fn done(_: &mut Store, _: &EventData) -> ExecutionResult {
    ExecutionResult::done()
}

pub(crate) fn idle_action() -> FnCapability<Handler> {
    FnCapability(idle)
}

pub(crate) fn noop_reaction() -> FnCapability<Handler> {
    FnCapability(done)
}

pub(crate) fn bound(spec: CapabilitySpec, handle: impl Capability + 'static) -> BoundCapability {
    BoundCapability {
        spec,
        handle: Arc::new(handle),
        settings: Settings::new(),
        authorization: None,
    }
}

/// Increments `ctx:calls` and returns the value seen before the increment.
pub(crate) fn counting(store: &mut Store) -> i64 {
    let seen = store.get_i64("ctx:calls").unwrap_or(0);
    store.set("ctx:calls", seen + 1);
    seen
}

pub(crate) async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Applet and authorization store recording every scheduler write-back.
#[derive(Default)]
pub(crate) struct InMemoryRepo {
    applets: Mutex<HashMap<AppletId, Applet>>,
    authorizations: Mutex<HashMap<AuthorizationId, Authorization>>,
    pub(crate) active_writes: Mutex<Vec<(AppletId, bool)>>,
    pub(crate) status_writes: Mutex<Vec<(AppletId, AppletStatus)>>,
    pub(crate) fail_writes: AtomicBool,
}

impl InMemoryRepo {
    pub(crate) fn with(applets: impl IntoIterator<Item = Applet>) -> Self {
        let repo = Self::default();
        repo.applets
            .lock()
            .unwrap()
            .extend(applets.into_iter().map(|a| (a.id, a)));
        repo
    }

    pub(crate) fn applet(&self, id: AppletId) -> Option<Applet> {
        self.applets.lock().unwrap().get(&id).cloned()
    }

    fn write_failure(&self) -> Option<AreaFlowError> {
        self.fail_writes
            .load(Ordering::SeqCst)
            .then(|| AreaFlowError::Storage(Box::new(std::io::Error::other("database is locked"))))
    }
}

impl AppletRepository for InMemoryRepo {
    fn create(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send {
        self.applets
            .lock()
            .unwrap()
            .insert(applet.id, applet.clone());
        async { Ok(applet) }
    }

    fn get_by_id(
        &self,
        id: AppletId,
    ) -> impl Future<Output = Result<Option<Applet>, AreaFlowError>> + Send {
        let result = self.applet(id);
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send {
        let result: Vec<Applet> = self.applets.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }

    fn get_runnable(&self) -> impl Future<Output = Result<Vec<Applet>, AreaFlowError>> + Send {
        self.get_all()
    }

    fn update(&self, applet: Applet) -> impl Future<Output = Result<Applet, AreaFlowError>> + Send {
        let result = match self.applets.lock().unwrap().get_mut(&applet.id) {
            Some(existing) => {
                *existing = applet.clone();
                Ok(applet)
            }
            None => Err(NotFoundError {
                entity: "Applet",
                id: applet.id.to_string(),
            }
            .into()),
        };
        async { result }
    }

    fn delete(&self, id: AppletId) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        self.applets.lock().unwrap().remove(&id);
        async { Ok(()) }
    }

    fn set_active(
        &self,
        id: AppletId,
        active: bool,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        self.active_writes.lock().unwrap().push((id, active));
        let result = match self.write_failure() {
            Some(err) => Err(err),
            None => {
                if let Some(applet) = self.applets.lock().unwrap().get_mut(&id) {
                    applet.active = active;
                }
                Ok(())
            }
        };
        async { result }
    }

    fn set_status(
        &self,
        id: AppletId,
        status: AppletStatus,
    ) -> impl Future<Output = Result<(), AreaFlowError>> + Send {
        self.status_writes.lock().unwrap().push((id, status));
        if let Some(applet) = self.applets.lock().unwrap().get_mut(&id) {
            applet.status = status;
        }
        async { Ok(()) }
    }
}

impl AuthorizationRepository for InMemoryRepo {
    fn create(
        &self,
        authorization: Authorization,
    ) -> impl Future<Output = Result<Authorization, AreaFlowError>> + Send {
        self.authorizations
            .lock()
            .unwrap()
            .insert(authorization.id, authorization.clone());
        async { Ok(authorization) }
    }

    fn get_by_id(
        &self,
        id: AuthorizationId,
    ) -> impl Future<Output = Result<Option<Authorization>, AreaFlowError>> + Send {
        let result = self.authorizations.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }
}
