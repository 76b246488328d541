use crate::reconcile::{identity_key_of, FixtureIdentityKey};
use crate::types::{Fixture, HomeAway, Task, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct NewFixture {
    pub organization_id: i64,
    pub team_id: i64,
    pub opposition_name: String,
    pub home_away: HomeAway,
    pub kickoff_datetime: DateTime<Utc>,
    pub kickoff_time_text: String,
    pub pitch_id: Option<i64>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub organization_id: i64,
    pub fixture_id: i64,
    pub task_type: TaskType,
    pub status: TaskStatus,
}

/// Repository seam between the reconciliation engine and whatever holds
/// the fixtures. The engine only needs identity-key lookups and writes;
/// unique-constraint semantics surface as `StoreError::UniqueViolation`.
pub trait FixtureStore {
    fn find_fixture(&self, key: &FixtureIdentityKey) -> Result<Option<Fixture>, StoreError>;
    fn insert_fixture(&mut self, fixture: NewFixture) -> Result<i64, StoreError>;
    fn update_fixture(&mut self, fixture: &Fixture) -> Result<(), StoreError>;
    fn task_exists_for(&self, fixture_id: i64) -> Result<bool, StoreError>;
    fn insert_task(&mut self, task: NewTask) -> Result<i64, StoreError>;
}

/// In-memory store used by tests and the CLI dry-run path. Enforces the
/// procedural identity-key uniqueness the way the relational store's
/// constraint would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    fixtures: HashMap<i64, Fixture>,
    tasks: Vec<Task>,
    next_fixture_id: i64,
    next_task_id: i64,
}

impl MemoryStore {
    pub fn fixtures(&self) -> Vec<Fixture> {
        let mut fixtures: Vec<Fixture> = self.fixtures.values().cloned().collect();
        fixtures.sort_by_key(|f| f.id);
        fixtures
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn archive_all(&mut self) {
        for fixture in self.fixtures.values_mut() {
            fixture.is_archived = true;
        }
    }
}

impl FixtureStore for MemoryStore {
    fn find_fixture(&self, key: &FixtureIdentityKey) -> Result<Option<Fixture>, StoreError> {
        Ok(self
            .fixtures
            .values()
            .find(|f| &identity_key_of(f) == key)
            .cloned())
    }

    fn insert_fixture(&mut self, fixture: NewFixture) -> Result<i64, StoreError> {
        let key = crate::reconcile::fixture_identity_key(
            fixture.organization_id,
            fixture.team_id,
            &fixture.opposition_name,
            fixture.kickoff_datetime.date_naive(),
        );
        if self.fixtures.values().any(|f| identity_key_of(f) == key) {
            return Err(StoreError::UniqueViolation(format!(
                "fixture already exists for {} on {}",
                fixture.opposition_name, key.date
            )));
        }

        self.next_fixture_id += 1;
        let id = self.next_fixture_id;
        let now = Utc::now();
        self.fixtures.insert(
            id,
            Fixture {
                id,
                organization_id: fixture.organization_id,
                team_id: fixture.team_id,
                opposition_name: fixture.opposition_name,
                home_away: fixture.home_away,
                kickoff_datetime: fixture.kickoff_datetime,
                kickoff_time_text: fixture.kickoff_time_text,
                pitch_id: fixture.pitch_id,
                instructions: fixture.instructions,
                is_cancelled: false,
                is_archived: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn update_fixture(&mut self, fixture: &Fixture) -> Result<(), StoreError> {
        if !self.fixtures.contains_key(&fixture.id) {
            return Err(StoreError::InvalidRecord(format!(
                "no fixture with id {}",
                fixture.id
            )));
        }
        self.fixtures.insert(fixture.id, fixture.clone());
        Ok(())
    }

    fn task_exists_for(&self, fixture_id: i64) -> Result<bool, StoreError> {
        Ok(self.tasks.iter().any(|t| t.fixture_id == fixture_id))
    }

    fn insert_task(&mut self, task: NewTask) -> Result<i64, StoreError> {
        if self.tasks.iter().any(|t| t.fixture_id == task.fixture_id) {
            return Err(StoreError::UniqueViolation(format!(
                "task already exists for fixture {}",
                task.fixture_id
            )));
        }
        self.next_task_id += 1;
        let id = self.next_task_id;
        self.tasks.push(Task {
            id,
            organization_id: task.organization_id,
            fixture_id: task.fixture_id,
            task_type: task.task_type,
            status: task.status,
        });
        Ok(id)
    }
}
