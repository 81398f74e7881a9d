//! Fire-and-forget audit event recorder.
//!
//! Audit consumption lives outside this service; the engine only emits.
//! `record` never blocks the calling request and never surfaces an error
//! into its control flow.

use sqlx::postgres::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditRecorder {
    pool: PgPool,
}

impl AuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Emit one audit event. The insert runs on a detached task; failures
    /// are logged and dropped.
    pub fn record(
        &self,
        action: &str,
        actor_user_id: Option<Uuid>,
        entity: &str,
        entity_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        let pool = self.pool.clone();
        let action = action.to_string();
        let entity = entity.to_string();

        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO audit_events (event_id, actor_user_id, action, entity, entity_id, details)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(actor_user_id)
            .bind(&action)
            .bind(&entity)
            .bind(&entity_id)
            .bind(&details)
            .execute(&pool)
            .await;

            if let Err(e) = result {
                tracing::warn!(action = %action, error = %e, "Failed to record audit event");
            }
        });
    }
}
