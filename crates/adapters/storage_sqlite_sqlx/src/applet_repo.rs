//! `SQLite` implementation of [`AppletRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::{AppletRepository, AuthorizationRepository};
use areaflow_domain::applet::{Applet, AppletStatus, AreaBinding};
use areaflow_domain::authorization::Authorization;
use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::id::{AppletId, AuthorizationId};

use crate::error::{StorageError, decode_error};
use crate::pool::SqliteRepository;

struct Wrapper(Applet);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Applet> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let description: String = row.try_get("description")?;
        let action_json: String = row.try_get("action")?;
        let reaction_json: String = row.try_get("reaction")?;
        let active: bool = row.try_get("active")?;
        let status: String = row.try_get("status")?;

        let id = AppletId::from_str(&id).map_err(decode_error)?;
        let action: AreaBinding = serde_json::from_str(&action_json).map_err(decode_error)?;
        let reaction: AreaBinding = serde_json::from_str(&reaction_json).map_err(decode_error)?;
        let status = AppletStatus::from_str(&status).map_err(decode_error)?;

        Ok(Self(Applet {
            id,
            name,
            description,
            action,
            reaction,
            active,
            status,
        }))
    }
}

fn not_found(id: AppletId) -> AreaFlowError {
    NotFoundError {
        entity: "Applet",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed applet repository.
pub struct SqliteAppletRepository {
    pool: SqlitePool,
}

impl SqliteAppletRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AppletRepository for SqliteAppletRepository {
    async fn create(&self, applet: Applet) -> Result<Applet, AreaFlowError> {
        let action_json = serde_json::to_string(&applet.action).map_err(StorageError::from)?;
        let reaction_json = serde_json::to_string(&applet.reaction).map_err(StorageError::from)?;

        sqlx::query(
            "INSERT INTO applets (id, name, description, action, reaction, active, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(applet.id.to_string())
        .bind(&applet.name)
        .bind(&applet.description)
        .bind(&action_json)
        .bind(&reaction_json)
        .bind(applet.active)
        .bind(applet.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(applet)
    }

    async fn get_by_id(&self, id: AppletId) -> Result<Option<Applet>, AreaFlowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM applets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Applet>, AreaFlowError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM applets ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    // Both bindings are NOT NULL, so every stored row can be scheduled.
    async fn get_runnable(&self) -> Result<Vec<Applet>, AreaFlowError> {
        self.get_all().await
    }

    async fn update(&self, applet: Applet) -> Result<Applet, AreaFlowError> {
        let action_json = serde_json::to_string(&applet.action).map_err(StorageError::from)?;
        let reaction_json = serde_json::to_string(&applet.reaction).map_err(StorageError::from)?;

        let result = sqlx::query(
            "UPDATE applets SET name = ?, description = ?, action = ?, reaction = ?, active = ?, status = ? WHERE id = ?",
        )
        .bind(&applet.name)
        .bind(&applet.description)
        .bind(&action_json)
        .bind(&reaction_json)
        .bind(applet.active)
        .bind(applet.status.as_str())
        .bind(applet.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(applet.id));
        }
        Ok(applet)
    }

    async fn delete(&self, id: AppletId) -> Result<(), AreaFlowError> {
        sqlx::query("DELETE FROM applets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn set_active(&self, id: AppletId, active: bool) -> Result<(), AreaFlowError> {
        let result = sqlx::query("UPDATE applets SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn set_status(&self, id: AppletId, status: AppletStatus) -> Result<(), AreaFlowError> {
        let result = sqlx::query("UPDATE applets SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

impl AppletRepository for SqliteRepository {
    async fn create(&self, applet: Applet) -> Result<Applet, AreaFlowError> {
        self.applets.create(applet).await
    }

    async fn get_by_id(&self, id: AppletId) -> Result<Option<Applet>, AreaFlowError> {
        self.applets.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<Applet>, AreaFlowError> {
        self.applets.get_all().await
    }

    async fn get_runnable(&self) -> Result<Vec<Applet>, AreaFlowError> {
        self.applets.get_runnable().await
    }

    async fn update(&self, applet: Applet) -> Result<Applet, AreaFlowError> {
        self.applets.update(applet).await
    }

    async fn delete(&self, id: AppletId) -> Result<(), AreaFlowError> {
        self.applets.delete(id).await
    }

    async fn set_active(&self, id: AppletId, active: bool) -> Result<(), AreaFlowError> {
        self.applets.set_active(id, active).await
    }

    async fn set_status(&self, id: AppletId, status: AppletStatus) -> Result<(), AreaFlowError> {
        self.applets.set_status(id, status).await
    }
}

impl AuthorizationRepository for SqliteRepository {
    async fn create(&self, authorization: Authorization) -> Result<Authorization, AreaFlowError> {
        self.authorizations.create(authorization).await
    }

    async fn get_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>, AreaFlowError> {
        self.authorizations.get_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use areaflow_domain::applet::{AreaRef, Side};

    async fn setup() -> SqliteAppletRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteAppletRepository::new(db.pool().clone())
    }

    fn valid_applet() -> Applet {
        Applet::builder()
            .name("Every minute")
            .description("ping a URL")
            .action(
                AreaBinding::new(AreaRef::new("time", "wait_time"))
                    .setting("req:time:duration", "1")
                    .setting("req:time:unit", "minutes"),
            )
            .reaction(
                AreaBinding::new(AreaRef::new("webhook", "trigger_webhook"))
                    .setting("req:webhook:url", "http://localhost/ping"),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_applet() {
        let repo = setup().await;
        let applet = valid_applet();
        let id = applet.id;

        repo.create(applet.clone()).await.unwrap();
        let fetched = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.name, "Every minute");
        assert_eq!(fetched.description, "ping a URL");
        assert_eq!(fetched.action, applet.action);
        assert_eq!(fetched.reaction, applet.reaction);
        assert!(fetched.active);
        assert_eq!(fetched.status, AppletStatus::Stopped);
    }

    #[tokio::test]
    async fn should_return_none_when_applet_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(AppletId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_list_applets_ordered_by_name() {
        let repo = setup().await;
        let mut second = valid_applet();
        second.name = "Zulu".to_string();
        let mut first = valid_applet();
        first.name = "Alpha".to_string();
        repo.create(second).await.unwrap();
        repo.create(first).await.unwrap();

        let names: Vec<String> = repo
            .get_runnable()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();

        assert_eq!(names, vec!["Alpha", "Zulu"]);
    }

    #[tokio::test]
    async fn should_persist_new_binding_when_updated() {
        let repo = setup().await;
        let mut applet = valid_applet();
        let id = applet.id;
        repo.create(applet.clone()).await.unwrap();

        applet.set_binding(
            Side::Action,
            AreaBinding::new(AreaRef::new("webhook", "applet_triggered")),
        );
        repo.update(applet).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.action.area.to_string(), "webhook:applet_triggered");
        assert!(fetched.action.settings.is_empty());
    }

    #[tokio::test]
    async fn should_return_not_found_when_updating_missing_applet() {
        let repo = setup().await;
        let result = repo.update(valid_applet()).await;
        assert!(matches!(result, Err(AreaFlowError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_write_back_active_flag_and_status() {
        let repo = setup().await;
        let applet = valid_applet();
        let id = applet.id;
        repo.create(applet).await.unwrap();

        repo.set_active(id, false).await.unwrap();
        repo.set_status(id, AppletStatus::Running).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.status, AppletStatus::Running);
    }

    #[tokio::test]
    async fn should_return_not_found_when_setting_status_of_missing_applet() {
        let repo = setup().await;
        let result = repo.set_status(AppletId::new(), AppletStatus::Running).await;
        assert!(matches!(result, Err(AreaFlowError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_delete_applet() {
        let repo = setup().await;
        let applet = valid_applet();
        let id = applet.id;
        repo.create(applet).await.unwrap();

        repo.delete(id).await.unwrap();

        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }
}
