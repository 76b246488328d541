use crate::config::IngestConfig;
use crate::ingest::{record_outcome, Ingestor, ResolvedRow};
use crate::parse_csv::parse_csv_rows;
use crate::reconcile::{task_for, UpsertOutcome};
use crate::types::{Fixture, HomeAway, ImportSummary, ManagedTeam, Pitch, ResolvedFixture};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Acquire, FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parse error: {0}")]
    CsvParse(#[from] csv::Error),
    #[error("Other error: {0}")]
    Other(String),
}

const PG_UNIQUE_VIOLATION: &str = "23505";

pub async fn connect(database_url: &str) -> Result<PgPool, ImportError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(FromRow)]
struct FixtureRow {
    id: i64,
    organization_id: i64,
    team_id: i64,
    opposition_name: String,
    home_away: String,
    kickoff_datetime: DateTime<Utc>,
    kickoff_time_text: String,
    pitch_id: Option<i64>,
    instructions: Option<String>,
    is_cancelled: bool,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FixtureRow {
    fn into_fixture(self) -> Result<Fixture, ImportError> {
        let home_away = HomeAway::from_text(&self.home_away).ok_or_else(|| {
            ImportError::Other(format!("fixture {} has home_away '{}'", self.id, self.home_away))
        })?;
        Ok(Fixture {
            id: self.id,
            organization_id: self.organization_id,
            team_id: self.team_id,
            opposition_name: self.opposition_name,
            home_away,
            kickoff_datetime: self.kickoff_datetime,
            kickoff_time_text: self.kickoff_time_text,
            pitch_id: self.pitch_id,
            instructions: self.instructions,
            is_cancelled: self.is_cancelled,
            is_archived: self.is_archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub async fn load_registry(
    pool: &PgPool,
    organization_id: i64,
) -> Result<Vec<ManagedTeam>, ImportError> {
    let rows = sqlx::query(
        "SELECT id, name FROM teams WHERE organization_id = $1 ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ManagedTeam {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect())
}

pub async fn load_pitches(pool: &PgPool, organization_id: i64) -> Result<Vec<Pitch>, ImportError> {
    let rows = sqlx::query(
        "SELECT id, organization_id, name, aliases FROM pitches \
         WHERE organization_id = $1 ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Pitch {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            aliases: row
                .try_get::<Vec<String>, _>("aliases")
                .unwrap_or_default(),
        })
        .collect())
}

/// Run the full text pipeline against Postgres. All writes for the
/// batch share one transaction so a half-imported paste never persists.
pub async fn import_text(
    pool: &PgPool,
    organization_id: i64,
    text: &str,
    config: &IngestConfig,
) -> Result<ImportSummary, ImportError> {
    let ingestor = build_ingestor(pool, organization_id, config).await?;
    let mut summary = ImportSummary::default();
    let rows = ingestor.resolve_text(text, &mut summary);
    persist_batch(pool, rows, &mut summary).await?;
    Ok(summary)
}

/// Run the CSV pipeline against Postgres.
pub async fn import_csv_file(
    pool: &PgPool,
    organization_id: i64,
    csv_path: &str,
    config: &IngestConfig,
) -> Result<ImportSummary, ImportError> {
    let data = tokio::fs::read_to_string(csv_path).await?;
    let row_maps = parse_csv_rows(&data)?;
    info!(csv_path, rows = row_maps.len(), "read CSV rows");

    let ingestor = build_ingestor(pool, organization_id, config).await?;
    let mut summary = ImportSummary::default();
    let rows = ingestor.resolve_row_maps(&row_maps, &mut summary);
    persist_batch(pool, rows, &mut summary).await?;
    Ok(summary)
}

async fn build_ingestor(
    pool: &PgPool,
    organization_id: i64,
    config: &IngestConfig,
) -> Result<Ingestor, ImportError> {
    let registry = load_registry(pool, organization_id).await?;
    let pitches = load_pitches(pool, organization_id).await?;
    info!(
        organization_id,
        teams = registry.len(),
        pitches = pitches.len(),
        "loaded reference data"
    );
    Ok(Ingestor::new(organization_id, registry, pitches, config))
}

async fn persist_batch(
    pool: &PgPool,
    rows: Vec<ResolvedRow>,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        match row.outcome {
            Ok(resolved) => match upsert_row(&mut tx, &resolved).await {
                Ok(outcome) => record_outcome(summary, &row.row_reference, outcome, &resolved),
                Err(error) => {
                    warn!(row_reference = %row.row_reference, %error, "row failed");
                    summary.record_error(&row.row_reference, error.to_string());
                }
            },
            Err(error) => {
                warn!(row_reference = %row.row_reference, %error, "row failed");
                summary.record_error(&row.row_reference, error.to_string());
            }
        }
    }

    tx.commit().await?;
    info!(
        added = summary.added,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors.len(),
        "batch committed"
    );
    Ok(())
}

/// One row's writes inside a savepoint on the batch transaction. A SQL
/// error aborts a Postgres transaction until rollback, so without the
/// savepoint one bad row would poison every row after it and the final
/// commit. Rolling back to the savepoint keeps the batch usable.
async fn upsert_row(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
) -> Result<UpsertOutcome, ImportError> {
    let mut row_tx = tx.begin().await?;
    match upsert_fixture_pg(&mut row_tx, resolved).await {
        Ok(outcome) => {
            row_tx.commit().await?;
            Ok(outcome)
        }
        Err(error) => {
            row_tx.rollback().await?;
            Err(error)
        }
    }
}

/// Day-granularity identity lookup: same organization, team and
/// opposition (case-insensitive) on the same calendar day.
async fn find_fixture_pg(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
    kickoff: DateTime<Utc>,
) -> Result<Option<Fixture>, ImportError> {
    let day_start = kickoff.date_naive().and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    let row: Option<FixtureRow> = sqlx::query_as(
        "SELECT id, organization_id, team_id, opposition_name, home_away, \
                kickoff_datetime, kickoff_time_text, pitch_id, instructions, \
                is_cancelled, is_archived, created_at, updated_at \
         FROM fixtures \
         WHERE organization_id = $1 AND team_id = $2 \
           AND lower(opposition_name) = $3 \
           AND kickoff_datetime >= $4 AND kickoff_datetime < $5",
    )
    .bind(resolved.organization_id)
    .bind(resolved.managed_team_id)
    .bind(resolved.opposition_name.trim().to_lowercase())
    .bind(day_start)
    .bind(day_end)
    .fetch_optional(tx.as_mut())
    .await?;

    row.map(FixtureRow::into_fixture).transpose()
}

/// Same find-or-create contract as the in-memory reconciliation engine,
/// expressed against the relational schema: update on identity hit,
/// insert otherwise, and recover an insert that loses the race to the
/// unique index by re-querying and updating.
///
/// The insert runs in its own savepoint: a failed statement aborts a
/// Postgres transaction, so the duplicate must be rolled back before
/// the recovery re-query can execute.
async fn upsert_fixture_pg(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
) -> Result<UpsertOutcome, ImportError> {
    let kickoff = resolved
        .kickoff_datetime
        .ok_or_else(|| ImportError::Other("fixture has no kickoff datetime".to_string()))?;

    if let Some(existing) = find_fixture_pg(tx, resolved, kickoff).await? {
        update_fixture_pg(tx, &existing, resolved, kickoff).await?;
        return Ok(UpsertOutcome::Updated(existing.id));
    }

    match try_insert_fixture_pg(tx, resolved, kickoff).await {
        Ok(fixture_id) => {
            ensure_task_pg(tx, resolved, fixture_id).await?;
            Ok(UpsertOutcome::Added(fixture_id))
        }
        Err(ImportError::Database(sqlx::Error::Database(db_error)))
            if db_error.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
        {
            warn!("insert hit a duplicate fixture, retrying as update");
            match find_fixture_pg(tx, resolved, kickoff).await? {
                Some(existing) => {
                    update_fixture_pg(tx, &existing, resolved, kickoff).await?;
                    Ok(UpsertOutcome::Updated(existing.id))
                }
                None => Err(ImportError::Database(sqlx::Error::Database(db_error))),
            }
        }
        Err(other) => Err(other),
    }
}

async fn try_insert_fixture_pg(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
    kickoff: DateTime<Utc>,
) -> Result<i64, ImportError> {
    let mut insert_tx = tx.begin().await?;
    match insert_fixture_pg(&mut insert_tx, resolved, kickoff).await {
        Ok(fixture_id) => {
            insert_tx.commit().await?;
            Ok(fixture_id)
        }
        Err(error) => {
            insert_tx.rollback().await?;
            Err(error)
        }
    }
}

async fn insert_fixture_pg(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
    kickoff: DateTime<Utc>,
) -> Result<i64, ImportError> {
    let row = sqlx::query(
        "INSERT INTO fixtures ( \
            organization_id, team_id, opposition_name, home_away, \
            kickoff_datetime, kickoff_time_text, pitch_id, instructions, \
            is_cancelled, is_archived, created_at, updated_at \
         ) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, FALSE, NOW(), NOW()) \
         RETURNING id",
    )
    .bind(resolved.organization_id)
    .bind(resolved.managed_team_id)
    .bind(&resolved.opposition_name)
    .bind(resolved.home_away.as_str())
    .bind(kickoff)
    .bind(&resolved.kickoff_time_text)
    .bind(resolved.pitch_id)
    .bind(&resolved.instructions_text)
    .fetch_one(tx.as_mut())
    .await?;

    Ok(row.get("id"))
}

async fn update_fixture_pg(
    tx: &mut Transaction<'_, Postgres>,
    existing: &Fixture,
    resolved: &ResolvedFixture,
    kickoff: DateTime<Utc>,
) -> Result<(), ImportError> {
    // pitch and instructions only overwrite when the re-import carries
    // them; a re-imported fixture is always live again
    sqlx::query(
        "UPDATE fixtures SET \
            opposition_name = $2, home_away = $3, kickoff_datetime = $4, \
            kickoff_time_text = $5, \
            pitch_id = COALESCE($6, pitch_id), \
            instructions = COALESCE($7, instructions), \
            is_archived = FALSE, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(existing.id)
    .bind(&resolved.opposition_name)
    .bind(resolved.home_away.as_str())
    .bind(kickoff)
    .bind(&resolved.kickoff_time_text)
    .bind(resolved.pitch_id)
    .bind(&resolved.instructions_text)
    .execute(tx.as_mut())
    .await?;

    ensure_task_pg(tx, resolved, existing.id).await?;
    Ok(())
}

async fn ensure_task_pg(
    tx: &mut Transaction<'_, Postgres>,
    resolved: &ResolvedFixture,
    fixture_id: i64,
) -> Result<(), ImportError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tasks WHERE fixture_id = $1)")
            .bind(fixture_id)
            .fetch_one(tx.as_mut())
            .await?;
    if exists {
        return Ok(());
    }

    let (task_type, status) = task_for(resolved.home_away);
    sqlx::query(
        "INSERT INTO tasks (organization_id, fixture_id, task_type, status, created_at) \
         VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (fixture_id) DO NOTHING",
    )
    .bind(resolved.organization_id)
    .bind(fixture_id)
    .bind(task_type.as_str())
    .bind(status.as_str())
    .execute(tx.as_mut())
    .await?;

    Ok(())
}
