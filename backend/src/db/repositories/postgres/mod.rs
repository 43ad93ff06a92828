//! Postgres repository implementation using Diesel.
//!
//! This module implements the repository traits against a Postgres database.
//! The schema lives in the embedded migrations under `migrations/`: one table
//! per entity, with foreign keys from reports and predictions to stations and
//! unique constraints on user email and username.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Pool statistics, logged on every health check
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Timestamptz;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task;

use crate::api::{
    CrowdReport, NewCrowdReport, NewPrediction, NewStation, NewUser, Prediction, Station,
    StationAverage, StationId, User, UserId,
};
use crate::db::repository::{
    ErrorContext, PredictionRepository, ReportRepository, RepositoryError, RepositoryResult,
    StationRepository, UserRepository,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
    /// - `PG_POOL_MAX`: Maximum pool size (default: 10)
    /// - `PG_POOL_MIN`: Minimum pool size (default: 1)
    /// - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
    /// - `PG_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Health monitoring and statistics
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::from(e).with_operation("get_connection");
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    ///
    /// Returns current pool state and query statistics for monitoring.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

fn station_not_found(operation: &str, station_id: StationId) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Station {} not found", station_id),
        ErrorContext::new(operation)
            .with_entity("station")
            .with_entity_id(station_id),
    )
}

/// Foreign keys named in the migrations.
const REPORT_STATION_FK: &str = "crowd_reports_station_id_fkey";
const REPORT_USER_FK: &str = "crowd_reports_user_id_fkey";
const PREDICTION_STATION_FK: &str = "predictions_station_id_fkey";

/// Map an insert failure, naming the missing parent when a foreign key
/// on `station_id` or `user_id` was violated.
fn foreign_key_error(
    err: diesel::result::Error,
    operation: &str,
    station_id: StationId,
    user_id: Option<UserId>,
) -> RepositoryError {
    use diesel::result::{DatabaseErrorKind, Error};

    if let Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) = &err {
        match info.constraint_name() {
            Some(REPORT_STATION_FK) | Some(PREDICTION_STATION_FK) => {
                return station_not_found(operation, station_id);
            }
            Some(REPORT_USER_FK) => {
                if let Some(user_id) = user_id {
                    return RepositoryError::not_found_with_context(
                        format!("User {} not found", user_id),
                        ErrorContext::new(operation)
                            .with_entity("user")
                            .with_entity_id(user_id),
                    );
                }
            }
            _ => {}
        }
    }
    RepositoryError::from(err).with_operation(operation)
}

#[async_trait]
impl StationRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let healthy = self
            .with_conn(|conn| {
                sql_query("SELECT 1")
                    .execute(conn)
                    .map(|_| true)
                    .map_err(RepositoryError::from)
            })
            .await;

        let stats = self.get_pool_stats();
        log::debug!(
            "Postgres pool: {}/{} connections in use, {} queries ({} failed, {} retried)",
            stats.connections_in_use,
            stats.max_size,
            stats.total_queries,
            stats.failed_queries,
            stats.retried_operations
        );
        healthy
    }

    async fn create_station(&self, station: &NewStation) -> RepositoryResult<Station> {
        let row = NewStationRow::from(station);
        self.with_conn(move |conn| {
            let inserted: StationRow = diesel::insert_into(stations::table)
                .values(&row)
                .returning(StationRow::as_returning())
                .get_result(conn)
                .map_err(RepositoryError::from)?;
            Station::try_from(inserted)
        })
        .await
    }

    async fn get_station(&self, station_id: StationId) -> RepositoryResult<Station> {
        self.with_conn(move |conn| {
            let row = stations::table
                .filter(stations::id.eq(station_id.value()))
                .select(StationRow::as_select())
                .first::<StationRow>(conn)
                .optional()
                .map_err(RepositoryError::from)?
                .ok_or_else(|| station_not_found("get_station", station_id))?;
            Station::try_from(row)
        })
        .await
    }

    async fn list_stations(&self, skip: i64, limit: i64) -> RepositoryResult<Vec<Station>> {
        self.with_conn(move |conn| {
            let rows = stations::table
                .select(StationRow::as_select())
                .order(stations::id.asc())
                .offset(skip.max(0))
                .limit(limit.max(0))
                .load::<StationRow>(conn)
                .map_err(RepositoryError::from)?;
            rows.into_iter().map(Station::try_from).collect()
        })
        .await
    }

    async fn count_stations(&self) -> RepositoryResult<i64> {
        self.with_conn(|conn| {
            stations::table
                .count()
                .get_result::<i64>(conn)
                .map_err(RepositoryError::from)
        })
        .await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn create_user(&self, user: &NewUser) -> RepositoryResult<User> {
        let row = NewUserRow::from(user);
        self.with_conn(move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .returning(UserRow::as_returning())
                .get_result::<UserRow>(conn)
                .map(User::from)
                .map_err(|e| RepositoryError::from(e).with_operation("create_user"))
        })
        .await
    }

    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User> {
        self.with_conn(move |conn| {
            users::table
                .filter(users::id.eq(user_id.value()))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map_err(RepositoryError::from)?
                .map(User::from)
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        format!("User {} not found", user_id),
                        ErrorContext::new("get_user")
                            .with_entity("user")
                            .with_entity_id(user_id),
                    )
                })
        })
        .await
    }

    async fn find_user_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            users::table
                .filter(users::username.eq(&username))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map(|row| row.map(User::from))
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn find_user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> RepositoryResult<Option<User>> {
        let email = email.to_string();
        let username = username.to_string();
        self.with_conn(move |conn| {
            users::table
                .filter(users::email.eq(&email).or(users::username.eq(&username)))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map(|row| row.map(User::from))
                .map_err(RepositoryError::from)
        })
        .await
    }
}

#[async_trait]
impl ReportRepository for PostgresRepository {
    async fn insert_report(&self, report: &NewCrowdReport) -> RepositoryResult<CrowdReport> {
        let station_id = report.station_id;
        let user_id = report.user_id;
        let row = NewCrowdReportRow::from(report);
        self.with_conn(move |conn| {
            let inserted: CrowdReportRow = diesel::insert_into(crowd_reports::table)
                .values(&row)
                .returning(CrowdReportRow::as_returning())
                .get_result(conn)
                .map_err(|e| {
                    foreign_key_error(e, "insert_report", station_id, Some(user_id))
                })?;
            CrowdReport::try_from(inserted)
        })
        .await
    }

    async fn reports_for_station_since(
        &self,
        station_id: StationId,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<CrowdReport>> {
        self.with_conn(move |conn| {
            let rows = crowd_reports::table
                .filter(crowd_reports::station_id.eq(station_id.value()))
                .filter(crowd_reports::created_at.ge(since))
                .select(CrowdReportRow::as_select())
                .order((crowd_reports::created_at.desc(), crowd_reports::id.desc()))
                .load::<CrowdReportRow>(conn)
                .map_err(RepositoryError::from)?;
            rows.into_iter().map(CrowdReport::try_from).collect()
        })
        .await
    }

    async fn recent_reports(&self, limit: i64) -> RepositoryResult<Vec<CrowdReport>> {
        self.with_conn(move |conn| {
            let rows = crowd_reports::table
                .select(CrowdReportRow::as_select())
                .order((crowd_reports::created_at.desc(), crowd_reports::id.desc()))
                .limit(limit.max(0))
                .load::<CrowdReportRow>(conn)
                .map_err(RepositoryError::from)?;
            rows.into_iter().map(CrowdReport::try_from).collect()
        })
        .await
    }

    async fn all_reports(&self) -> RepositoryResult<Vec<CrowdReport>> {
        self.with_conn(|conn| {
            let rows = crowd_reports::table
                .select(CrowdReportRow::as_select())
                .order((crowd_reports::created_at.asc(), crowd_reports::id.asc()))
                .load::<CrowdReportRow>(conn)
                .map_err(RepositoryError::from)?;
            rows.into_iter().map(CrowdReport::try_from).collect()
        })
        .await
    }

    async fn count_reports(&self, since: Option<DateTime<Utc>>) -> RepositoryResult<i64> {
        self.with_conn(move |conn| {
            let mut query = crowd_reports::table.into_boxed();
            if let Some(since) = since {
                query = query.filter(crowd_reports::created_at.ge(since));
            }
            query
                .count()
                .get_result::<i64>(conn)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn station_averages(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Vec<StationAverage>> {
        self.with_conn(move |conn| {
            let rows: Vec<StationAverageRow> = match since {
                Some(since) => sql_query(
                    "SELECT station_id, AVG(crowd_level)::float8 AS average_crowd, \
                     COUNT(*) AS report_count \
                     FROM crowd_reports WHERE created_at >= $1 \
                     GROUP BY station_id ORDER BY station_id",
                )
                .bind::<Timestamptz, _>(since)
                .load(conn),
                None => sql_query(
                    "SELECT station_id, AVG(crowd_level)::float8 AS average_crowd, \
                     COUNT(*) AS report_count \
                     FROM crowd_reports GROUP BY station_id ORDER BY station_id",
                )
                .load(conn),
            }
            .map_err(RepositoryError::from)?;
            Ok(rows.into_iter().map(StationAverage::from).collect())
        })
        .await
    }
}

#[async_trait]
impl PredictionRepository for PostgresRepository {
    async fn insert_prediction(&self, prediction: &NewPrediction) -> RepositoryResult<Prediction> {
        let station_id = prediction.station_id;
        let row = NewPredictionRow::from(prediction);
        self.with_conn(move |conn| {
            diesel::insert_into(predictions::table)
                .values(&row)
                .returning(PredictionRow::as_returning())
                .get_result::<PredictionRow>(conn)
                .map(Prediction::from)
                .map_err(|e| foreign_key_error(e, "insert_prediction", station_id, None))
        })
        .await
    }

    async fn predictions_for_station(
        &self,
        station_id: StationId,
        limit: i64,
    ) -> RepositoryResult<Vec<Prediction>> {
        self.with_conn(move |conn| {
            let rows = predictions::table
                .filter(predictions::station_id.eq(station_id.value()))
                .select(PredictionRow::as_select())
                .order((predictions::created_at.desc(), predictions::id.desc()))
                .limit(limit.max(0))
                .load::<PredictionRow>(conn)
                .map_err(RepositoryError::from)?;
            Ok(rows.into_iter().map(Prediction::from).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error};

    struct Violation(Option<&'static str>);

    impl DatabaseErrorInformation for Violation {
        fn message(&self) -> &str {
            "insert or update violates foreign key constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.0
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn fk_violation(constraint: Option<&'static str>) -> Error {
        Error::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new(Violation(constraint)),
        )
    }

    fn not_found_message(err: RepositoryError) -> String {
        match err {
            RepositoryError::NotFound { message, .. } => message,
            other => panic!("expected NotFound, got {}", other),
        }
    }

    #[test]
    fn test_station_fk_names_the_station() {
        let err = foreign_key_error(
            fk_violation(Some(REPORT_STATION_FK)),
            "insert_report",
            StationId::new(4),
            Some(UserId::new(9)),
        );
        assert_eq!(not_found_message(err), "Station 4 not found");

        let err = foreign_key_error(
            fk_violation(Some(PREDICTION_STATION_FK)),
            "insert_prediction",
            StationId::new(5),
            None,
        );
        assert_eq!(not_found_message(err), "Station 5 not found");
    }

    #[test]
    fn test_user_fk_names_the_user() {
        let err = foreign_key_error(
            fk_violation(Some(REPORT_USER_FK)),
            "insert_report",
            StationId::new(4),
            Some(UserId::new(9)),
        );
        assert_eq!(not_found_message(err), "User 9 not found");
    }

    #[test]
    fn test_other_errors_keep_their_origin() {
        let err = foreign_key_error(fk_violation(None), "insert_report", StationId::new(4), None);
        let message = not_found_message(err);
        assert!(!message.contains("Station"));

        let err = foreign_key_error(Error::NotFound, "insert_report", StationId::new(4), None);
        assert!(err.to_string().contains("operation=insert_report"));
    }
}
