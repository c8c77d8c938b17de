//! PostgreSQL storage for course-service.

use crate::models::{ContentBlock, ContentType, Topic, Unit};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::ContentRepository;
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(FromRow)]
struct TopicRow {
    topic_id: i64,
    unit_id: i64,
    number: Option<String>,
    title: String,
    unit_name: String,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "course-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for Database {
    #[instrument(skip(self))]
    async fn ai_content_types(&self) -> Result<Vec<ContentType>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ai_content_types"])
            .start_timer();

        let types = sqlx::query_as::<_, ContentType>(
            r#"
            SELECT content_type_id, description, ai_enabled, display_order, active
            FROM content_types
            WHERE ai_enabled AND active
            ORDER BY display_order ASC, description ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list AI content types: {}", e))
        })?;

        timer.observe_duration();

        Ok(types)
    }

    #[instrument(skip(self))]
    async fn content_types(&self) -> Result<Vec<ContentType>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["content_types"])
            .start_timer();

        let types = sqlx::query_as::<_, ContentType>(
            r#"
            SELECT content_type_id, description, ai_enabled, display_order, active
            FROM content_types
            WHERE active
            ORDER BY display_order ASC, description ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list content types: {}", e))
        })?;

        timer.observe_duration();

        Ok(types)
    }

    #[instrument(skip(self))]
    async fn content_type(&self, description: &str) -> Result<Option<ContentType>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["content_type"])
            .start_timer();

        let content_type = sqlx::query_as::<_, ContentType>(
            r#"
            SELECT content_type_id, description, ai_enabled, display_order, active
            FROM content_types
            WHERE description = $1
            "#,
        )
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get content type: {}", e))
        })?;

        timer.observe_duration();

        Ok(content_type)
    }

    #[instrument(skip(self))]
    async fn register_content_type(&self, description: &str) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["register_content_type"])
            .start_timer();

        // The no-op update makes RETURNING yield the id of an existing row too.
        let content_type_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO content_types (description, ai_enabled, display_order)
            VALUES (
                $1, TRUE,
                (SELECT COALESCE(MAX(display_order), 0) + 1 FROM content_types)
            )
            ON CONFLICT (description) DO UPDATE SET description = EXCLUDED.description
            RETURNING content_type_id
            "#,
        )
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to register content type: {}", e))
        })?;

        timer.observe_duration();

        info!(content_type_id, description = %description, "Content type registered");

        Ok(content_type_id)
    }

    #[instrument(skip(self))]
    async fn set_content_type_ai(
        &self,
        content_type_id: i64,
        enabled: bool,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_content_type_ai"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE content_types
            SET ai_enabled = $2
            WHERE content_type_id = $1
            "#,
        )
        .bind(content_type_id)
        .bind(enabled)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update content type: {}", e))
        })?;

        timer.observe_duration();

        info!(content_type_id, enabled, "Content type AI flag updated");

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn topic_with_unit(&self, topic_id: i64) -> Result<Option<(Topic, Unit)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["topic_with_unit"])
            .start_timer();

        let row = sqlx::query_as::<_, TopicRow>(
            r#"
            SELECT t.topic_id, t.unit_id, t.number, t.title, u.name AS unit_name
            FROM topics t
            JOIN units u ON u.unit_id = t.unit_id
            WHERE t.topic_id = $1
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get topic: {}", e)))?;

        timer.observe_duration();

        Ok(row.map(|r| {
            (
                Topic {
                    topic_id: r.topic_id,
                    unit_id: r.unit_id,
                    number: r.number,
                    title: r.title,
                },
                Unit {
                    unit_id: r.unit_id,
                    name: r.unit_name,
                },
            )
        }))
    }

    #[instrument(skip(self))]
    async fn content_blocks(&self, topic_id: i64) -> Result<Vec<ContentBlock>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["content_blocks"])
            .start_timer();

        let blocks = sqlx::query_as::<_, ContentBlock>(
            r#"
            SELECT block_id, topic_id, content_type, body, display_order, ai_sources
            FROM content_blocks
            WHERE topic_id = $1
            ORDER BY display_order ASC, block_id ASC
            "#,
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list content blocks: {}", e))
        })?;

        timer.observe_duration();

        Ok(blocks)
    }

    #[instrument(skip(self))]
    async fn find_block(
        &self,
        topic_id: i64,
        content_type: &str,
    ) -> Result<Option<ContentBlock>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_block"])
            .start_timer();

        let block = sqlx::query_as::<_, ContentBlock>(
            r#"
            SELECT block_id, topic_id, content_type, body, display_order, ai_sources
            FROM content_blocks
            WHERE topic_id = $1 AND content_type = $2
            ORDER BY display_order ASC, block_id ASC
            LIMIT 1
            "#,
        )
        .bind(topic_id)
        .bind(content_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find content block: {}", e))
        })?;

        timer.observe_duration();

        Ok(block)
    }

    #[instrument(skip(self, body))]
    async fn insert_block(
        &self,
        topic_id: i64,
        content_type: &str,
        body: &str,
        ai_sources: &str,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_block"])
            .start_timer();

        let block_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO content_blocks (topic_id, content_type, body, display_order, ai_sources)
            VALUES (
                $1, $2, $3,
                (SELECT COALESCE(MAX(display_order), 0) + 1 FROM content_blocks WHERE topic_id = $1),
                $4
            )
            RETURNING block_id
            "#,
        )
        .bind(topic_id)
        .bind(content_type)
        .bind(body)
        .bind(ai_sources)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create content block: {}", e))
        })?;

        timer.observe_duration();

        info!(block_id, "Content block created");

        Ok(block_id)
    }

    #[instrument(skip(self, body))]
    async fn update_block(
        &self,
        block_id: i64,
        body: &str,
        ai_sources: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_block"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE content_blocks
            SET body = $2, ai_sources = $3
            WHERE block_id = $1
            "#,
        )
        .bind(block_id)
        .bind(body)
        .bind(ai_sources)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update content block: {}", e))
        })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Content block {} not found",
                block_id
            )));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn credential(&self, key: &str) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["credential"])
            .start_timer();

        let secret = sqlx::query_scalar::<_, String>(
            r#"
            SELECT secret FROM provider_credentials WHERE key_name = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read credential: {}", e)))?;

        timer.observe_duration();

        Ok(secret)
    }

    #[instrument(skip(self, value))]
    async fn save_credential(&self, key: &str, value: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_credential"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO provider_credentials (key_name, secret, updated_utc)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key_name) DO UPDATE SET secret = EXCLUDED.secret, updated_utc = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save credential: {}", e)))?;

        timer.observe_duration();

        info!(key_name = %key, "Provider credential saved");

        Ok(())
    }
}
