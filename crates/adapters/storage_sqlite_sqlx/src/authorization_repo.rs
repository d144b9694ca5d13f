//! `SQLite` implementation of [`AuthorizationRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use areaflow_app::ports::AuthorizationRepository;
use areaflow_domain::applet::Settings;
use areaflow_domain::authorization::Authorization;
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::AuthorizationId;

use crate::error::{StorageError, decode_error};

struct Wrapper(Authorization);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let service: String = row.try_get("service")?;
        let access_token: String = row.try_get("access_token")?;
        let refresh_token: Option<String> = row.try_get("refresh_token")?;
        let expires_at: Option<String> = row.try_get("expires_at")?;
        let extra_json: String = row.try_get("extra")?;

        let id = AuthorizationId::from_str(&id).map_err(decode_error)?;
        let expires_at = expires_at
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.to_utc())
                    .map_err(decode_error)
            })
            .transpose()?;
        let extra: Settings = serde_json::from_str(&extra_json).map_err(decode_error)?;

        Ok(Self(Authorization {
            id,
            service,
            access_token,
            refresh_token,
            expires_at,
            extra,
        }))
    }
}

/// `SQLite`-backed store of third-party credentials.
pub struct SqliteAuthorizationRepository {
    pool: SqlitePool,
}

impl SqliteAuthorizationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AuthorizationRepository for SqliteAuthorizationRepository {
    async fn create(&self, authorization: Authorization) -> Result<Authorization, AreaFlowError> {
        let extra_json = serde_json::to_string(&authorization.extra).map_err(StorageError::from)?;
        let expires_at = authorization.expires_at.map(|ts| ts.to_rfc3339());

        sqlx::query(
            "INSERT INTO authorizations (id, service, access_token, refresh_token, expires_at, extra) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(authorization.id.to_string())
        .bind(&authorization.service)
        .bind(&authorization.access_token)
        .bind(&authorization.refresh_token)
        .bind(&expires_at)
        .bind(&extra_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(authorization)
    }

    async fn get_by_id(&self, id: AuthorizationId) -> Result<Option<Authorization>, AreaFlowError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM authorizations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }
}
