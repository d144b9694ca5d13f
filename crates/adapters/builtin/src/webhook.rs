//! `webhook` service: inbound deliveries as actions, outbound requests as a reaction.

use std::sync::Arc;
use std::time::Duration;

use areaflow_app::capability::{Capability, CapabilityContext, CapabilitySpec};
use areaflow_app::webhook_broker::WebhookBroker;
use areaflow_domain::applet::AreaRef;
use areaflow_domain::execution::{CapabilityError, EventData, ExecutionResult};
use areaflow_domain::webhook::WebhookMode;

use crate::template;

const SERVICE: &str = "webhook";

/// Fires with the raw body of each delivery pushed to the applet's webhook.
/// A body that is not UTF-8 is consumed and reported as an error.
///
/// The webhook is named after the applet id. Each call waits at most
/// `read_timeout` so the worker stays responsive to control messages.
pub struct AppletTriggered {
    broker: Arc<WebhookBroker>,
    read_timeout: Duration,
}

impl AppletTriggered {
    #[must_use]
    pub fn new(broker: Arc<WebhookBroker>, read_timeout: Duration) -> Self {
        Self {
            broker,
            read_timeout,
        }
    }

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::action(AreaRef::new(SERVICE, "applet_triggered"))
            .rate_limit(0)
            .webhook(WebhookMode::AppletTrigger)
    }
}

#[async_trait::async_trait]
impl Capability for AppletTriggered {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        let name = ctx.applet_id.to_string();
        let reader = match self.broker.receive(&name, WebhookMode::AppletTrigger) {
            Ok(reader) => reader,
            Err(err) => return ExecutionResult::failed(CapabilityError::external(err)),
        };
        match reader.recv_timeout(self.read_timeout).await {
            Some(payload) => match String::from_utf8(payload) {
                Ok(body) => ExecutionResult::triggered(EventData::new()).with("webhook:data", body),
                Err(err) => ExecutionResult::failed(err.into()),
            },
            None => ExecutionResult::idle(),
        }
    }
}

/// Fires when the shared delivery history grew since the previous call.
///
/// The first call only memoises the current length in `ctx:history:len`.
pub struct HistoryUpdated {
    broker: Arc<WebhookBroker>,
}

impl HistoryUpdated {
    const SEEN: &'static str = "ctx:history:len";

    #[must_use]
    pub fn new(broker: Arc<WebhookBroker>) -> Self {
        Self { broker }
    }

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::action(AreaRef::new(SERVICE, "history_updated")).rate_limit(10)
    }
}

#[async_trait::async_trait]
impl Capability for HistoryUpdated {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        let len = self.broker.history_len() as u64;
        let seen = ctx.store.get(Self::SEEN).and_then(serde_json::Value::as_u64);
        ctx.store.set(Self::SEEN, len);
        if seen.is_none_or(|seen| seen == len) {
            return ExecutionResult::idle();
        }
        match self.broker.latest() {
            Some(item) => ExecutionResult::triggered(EventData::new())
                .with("webhook:history:id", item.id)
                .with("webhook:author:name", item.author),
            None => ExecutionResult::idle(),
        }
    }
}

/// Sends an HTTP request to `req:webhook:url`.
///
/// Optional settings: `req:webhook:method` (default `POST`),
/// `req:webhook:body`, `req:webhook:content:type` (default
/// `application/json`) and `req:webhook:response:status`, the only status
/// accepted when set. `{{key}}` placeholders are filled from the action's
/// data, restricted to URL-like keys inside the URL.
pub struct TriggerWebhook {
    client: reqwest::Client,
}

impl TriggerWebhook {
    const URL: &'static str = "req:webhook:url";
    const METHOD: &'static str = "req:webhook:method";
    const BODY: &'static str = "req:webhook:body";
    const CONTENT_TYPE: &'static str = "req:webhook:content:type";
    const STATUS: &'static str = "req:webhook:response:status";

    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn spec() -> CapabilitySpec {
        CapabilitySpec::reaction(AreaRef::new(SERVICE, "trigger_webhook")).required(&[Self::URL])
    }

    async fn send(&self, ctx: &CapabilityContext<'_>) -> Result<ExecutionResult, CapabilityError> {
        let store = &*ctx.store;
        let url = template::fill(store.require_str(Self::URL)?, ctx.data, template::url_key);
        let body = store
            .get_str(Self::BODY)
            .map(|body| template::fill(body, ctx.data, |_| true))
            .unwrap_or_default();
        let content_type = store
            .get_str(Self::CONTENT_TYPE)
            .unwrap_or("application/json");
        let method = store.get_str(Self::METHOD).unwrap_or("POST");
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(
            |err| CapabilityError::InvalidSetting {
                key: Self::METHOD.to_string(),
                reason: err.to_string(),
            },
        )?;
        let expected = match store.get(Self::STATUS) {
            None => None,
            Some(_) => Some(
                store
                    .get_i64(Self::STATUS)
                    .and_then(|status| u16::try_from(status).ok())
                    .ok_or_else(|| CapabilityError::InvalidSetting {
                        key: Self::STATUS.to_string(),
                        reason: "not a status code".to_string(),
                    })?,
            ),
        };

        let mut request = self
            .client
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, content_type);
        if !body.is_empty() {
            request = request.body(body);
        }
        let response = request.send().await.map_err(CapabilityError::external)?;
        let actual = response.status().as_u16();
        tracing::debug!(applet_id = %ctx.applet_id, %url, status = actual, "webhook sent");

        match expected {
            Some(expected) if expected != actual => {
                Err(CapabilityError::UnexpectedStatus { expected, actual })
            }
            _ => Ok(ExecutionResult::done()),
        }
    }
}

#[async_trait::async_trait]
impl Capability for TriggerWebhook {
    async fn evaluate(&self, ctx: CapabilityContext<'_>) -> ExecutionResult {
        self.send(&ctx).await.into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::Router;
    use axum::http::{HeaderMap, Method, StatusCode};
    use axum::routing::any;

    use super::*;
    use crate::testing::NullLog;
    use areaflow_domain::applet::Settings;
    use areaflow_domain::id::AppletId;
    use areaflow_domain::store::Store;

    async fn evaluate(
        capability: &impl Capability,
        applet_id: AppletId,
        store: &mut Store,
        data: &EventData,
    ) -> ExecutionResult {
        capability
            .evaluate(CapabilityContext {
                applet_id,
                authorization: None,
                store,
                data,
                log: &NullLog,
            })
            .await
    }

    #[tokio::test]
    async fn should_emit_delivery_body_when_applet_webhook_receives_payload() {
        let broker = Arc::new(WebhookBroker::new(Duration::from_secs(2)));
        let applet_id = AppletId::new();
        broker.register(&applet_id.to_string(), WebhookMode::AppletTrigger);
        let sender = Arc::clone(&broker);
        let name = applet_id.to_string();
        let delivery =
            tokio::spawn(async move { sender.deliver("ci", &name, b"{\"ok\":true}".to_vec()).await });
        let action = AppletTriggered::new(Arc::clone(&broker), Duration::from_secs(2));

        let result = evaluate(&action, applet_id, &mut Store::new(), &EventData::new()).await;

        assert!(result.success);
        assert_eq!(result.data["webhook:data"], "{\"ok\":true}");
        assert!(delivery.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn should_reject_delivery_body_when_it_is_not_utf8() {
        let broker = Arc::new(WebhookBroker::new(Duration::from_secs(2)));
        let applet_id = AppletId::new();
        broker.register(&applet_id.to_string(), WebhookMode::AppletTrigger);
        let sender = Arc::clone(&broker);
        let name = applet_id.to_string();
        let delivery =
            tokio::spawn(async move { sender.deliver("ci", &name, vec![255, 254, 65]).await });
        let action = AppletTriggered::new(Arc::clone(&broker), Duration::from_secs(2));

        let result = evaluate(&action, applet_id, &mut Store::new(), &EventData::new()).await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(CapabilityError::InvalidPayload(_))));
        assert!(!result.data.contains_key("webhook:data"));
        assert!(delivery.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn should_emit_multibyte_body_unchanged() {
        let broker = Arc::new(WebhookBroker::new(Duration::from_secs(2)));
        let applet_id = AppletId::new();
        broker.register(&applet_id.to_string(), WebhookMode::AppletTrigger);
        let body = "héllo ✓ 🚀".as_bytes().to_vec();
        let sender = Arc::clone(&broker);
        let name = applet_id.to_string();
        let payload = body.clone();
        let delivery = tokio::spawn(async move { sender.deliver("ci", &name, payload).await });
        let action = AppletTriggered::new(Arc::clone(&broker), Duration::from_secs(2));

        let result = evaluate(&action, applet_id, &mut Store::new(), &EventData::new()).await;

        assert!(result.success);
        assert_eq!(result.data["webhook:data"].as_str().map(str::as_bytes), Some(&body[..]));
        assert!(delivery.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn should_stay_idle_when_no_delivery_arrives_in_time() {
        let broker = Arc::new(WebhookBroker::default());
        let applet_id = AppletId::new();
        broker.register(&applet_id.to_string(), WebhookMode::AppletTrigger);
        let action = AppletTriggered::new(broker, Duration::from_millis(20));

        let result = evaluate(&action, applet_id, &mut Store::new(), &EventData::new()).await;

        assert!(!result.success);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn should_fail_when_applet_webhook_is_not_registered() {
        let action = AppletTriggered::new(Arc::new(WebhookBroker::default()), Duration::from_millis(20));

        let result = evaluate(&action, AppletId::new(), &mut Store::new(), &EventData::new()).await;

        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn should_fire_history_updated_only_after_history_grows() {
        let broker = Arc::new(WebhookBroker::new(Duration::from_millis(10)));
        broker.register("shared", WebhookMode::ServiceInteraction);
        let action = HistoryUpdated::new(Arc::clone(&broker));
        let mut store = Store::new();
        let id = AppletId::new();

        let first = evaluate(&action, id, &mut store, &EventData::new()).await;
        assert!(!first.success);
        assert_eq!(store.get_i64("ctx:history:len"), Some(0));

        let _ = broker.deliver("octocat", "shared", Vec::new()).await;

        let second = evaluate(&action, id, &mut store, &EventData::new()).await;
        assert!(second.success);
        assert_eq!(second.data["webhook:history:id"], 0);
        assert_eq!(second.data["webhook:author:name"], "octocat");

        let third = evaluate(&action, id, &mut store, &EventData::new()).await;
        assert!(!third.success);
    }

    #[derive(Default)]
    struct Captured {
        requests: Mutex<Vec<(Method, String, String, String)>>,
    }

    /// Serve a local endpoint recording every request and answering `status`.
    async fn endpoint(status: StatusCode) -> (String, Arc<Captured>) {
        let captured = Arc::new(Captured::default());
        let seen = Arc::clone(&captured);
        let app = Router::new().route(
            "/{*path}",
            any(
                move |method: Method, uri: axum::http::Uri, headers: HeaderMap, body: String| {
                    let seen = Arc::clone(&seen);
                    async move {
                        let content_type = headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        seen.requests.lock().unwrap().push((
                            method,
                            uri.to_string(),
                            content_type,
                            body,
                        ));
                        status
                    }
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (format!("http://{addr}"), captured)
    }

    fn reaction_store(settings: &[(&str, &str)]) -> Store {
        let mut raw = Settings::new();
        for (key, value) in settings {
            raw.insert((*key).to_string(), (*value).into());
        }
        Store::from_settings(&raw)
    }

    #[tokio::test]
    async fn should_send_templated_request_when_triggered() {
        let (base, captured) = endpoint(StatusCode::OK).await;
        let reaction = TriggerWebhook::new(reqwest::Client::new());
        let mut store = reaction_store(&[
            ("webhook:url", "{{site:url}}/hooks"),
            ("webhook:method", "put"),
            ("webhook:body", "{\"from\":\"{{webhook:data}}\"}"),
            ("webhook:content:type", "text/plain"),
        ]);
        let mut data = EventData::new();
        data.insert("site:url".to_string(), base.into());
        data.insert("webhook:data".to_string(), "alice".into());

        let result = evaluate(&reaction, AppletId::new(), &mut store, &data).await;

        assert!(result.error.is_none(), "{:?}", result.error);
        let requests = captured.requests.lock().unwrap();
        let (method, uri, content_type, body) = &requests[0];
        assert_eq!(*method, Method::PUT);
        assert_eq!(uri, "/hooks");
        assert_eq!(content_type, "text/plain");
        assert_eq!(body, "{\"from\":\"alice\"}");
    }

    #[tokio::test]
    async fn should_fail_when_response_status_differs_from_expected() {
        let (base, _captured) = endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
        let reaction = TriggerWebhook::new(reqwest::Client::new());
        let url = format!("{base}/fail");
        let mut store = reaction_store(&[
            ("webhook:url", url.as_str()),
            ("webhook:response:status", "200"),
        ]);

        let result = evaluate(&reaction, AppletId::new(), &mut store, &EventData::new()).await;

        assert!(matches!(
            result.error,
            Some(CapabilityError::UnexpectedStatus {
                expected: 200,
                actual: 500
            })
        ));
    }

    #[tokio::test]
    async fn should_fail_when_url_setting_is_missing() {
        let reaction = TriggerWebhook::new(reqwest::Client::new());

        let result = evaluate(&reaction, AppletId::new(), &mut Store::new(), &EventData::new()).await;

        assert!(matches!(
            result.error,
            Some(CapabilityError::MissingSetting(key)) if key == "req:webhook:url"
        ));
    }
}
