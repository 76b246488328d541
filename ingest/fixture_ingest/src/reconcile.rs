use crate::store::{FixtureStore, NewFixture, NewTask, StoreError};
use crate::types::{Fixture, HomeAway, ResolvedFixture, TaskStatus, TaskType};
use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

/// Derived identity of a fixture for deduplication. Two records with
/// the same key describe the same real-world match.
///
/// The date portion only: re-imports frequently carry a corrected
/// kick-off time for an already-known fixture, so time-of-day must not
/// split the identity. Opposition is compared case-insensitively for
/// the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixtureIdentityKey {
    pub organization_id: i64,
    pub team_id: i64,
    pub opposition: String,
    pub date: NaiveDate,
}

pub fn fixture_identity_key(
    organization_id: i64,
    team_id: i64,
    opposition: &str,
    date: NaiveDate,
) -> FixtureIdentityKey {
    FixtureIdentityKey {
        organization_id,
        team_id,
        opposition: opposition.trim().to_lowercase(),
        date,
    }
}

pub fn identity_key_of(fixture: &Fixture) -> FixtureIdentityKey {
    fixture_identity_key(
        fixture.organization_id,
        fixture.team_id,
        &fixture.opposition_name,
        fixture.kickoff_datetime.date_naive(),
    )
}

/// Task type and initial status follow deterministically from the
/// fixture's home/away side.
pub fn task_for(home_away: HomeAway) -> (TaskType, TaskStatus) {
    match home_away {
        HomeAway::Home => (TaskType::HomeEmail, TaskStatus::Pending),
        HomeAway::Away => (TaskType::AwayEmail, TaskStatus::Waiting),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added(i64),
    Updated(i64),
}

/// Find-or-create a fixture for one resolved row and guarantee exactly
/// one follow-up task exists for it.
///
/// A unique-constraint violation on the insert is recovered by
/// re-querying and falling back to update semantics, so losing an
/// insert race to a concurrent run of the same import is harmless.
pub fn upsert_fixture<S: FixtureStore>(
    store: &mut S,
    resolved: &ResolvedFixture,
) -> Result<UpsertOutcome, StoreError> {
    let kickoff = resolved.kickoff_datetime.ok_or_else(|| {
        StoreError::InvalidRecord("fixture has no kickoff datetime".to_string())
    })?;
    let key = fixture_identity_key(
        resolved.organization_id,
        resolved.managed_team_id,
        &resolved.opposition_name,
        kickoff.date_naive(),
    );

    if let Some(existing) = store.find_fixture(&key)? {
        return update_existing(store, existing, resolved).map(UpsertOutcome::Updated);
    }

    match store.insert_fixture(new_fixture(resolved, kickoff)) {
        Ok(fixture_id) => {
            ensure_task(store, resolved, fixture_id)?;
            debug!(fixture_id, opposition = %resolved.opposition_name, "created fixture");
            Ok(UpsertOutcome::Added(fixture_id))
        }
        Err(StoreError::UniqueViolation(detail)) => {
            warn!(%detail, "insert hit a duplicate fixture, retrying as update");
            match store.find_fixture(&key)? {
                Some(existing) => {
                    update_existing(store, existing, resolved).map(UpsertOutcome::Updated)
                }
                None => Err(StoreError::UniqueViolation(detail)),
            }
        }
        Err(other) => Err(other),
    }
}

fn new_fixture(resolved: &ResolvedFixture, kickoff: chrono::DateTime<Utc>) -> NewFixture {
    NewFixture {
        organization_id: resolved.organization_id,
        team_id: resolved.managed_team_id,
        opposition_name: resolved.opposition_name.clone(),
        home_away: resolved.home_away,
        kickoff_datetime: kickoff,
        kickoff_time_text: resolved.kickoff_time_text.clone(),
        pitch_id: resolved.pitch_id,
        instructions: resolved.instructions_text.clone(),
    }
}

fn update_existing<S: FixtureStore>(
    store: &mut S,
    mut existing: Fixture,
    resolved: &ResolvedFixture,
) -> Result<i64, StoreError> {
    existing.opposition_name = resolved.opposition_name.clone();
    existing.home_away = resolved.home_away;
    if let Some(kickoff) = resolved.kickoff_datetime {
        // time-of-day corrections ride along with the re-import
        existing.kickoff_datetime = kickoff;
    }
    existing.kickoff_time_text = resolved.kickoff_time_text.clone();
    if resolved.pitch_id.is_some() {
        existing.pitch_id = resolved.pitch_id;
    }
    if resolved.instructions_text.is_some() {
        existing.instructions = resolved.instructions_text.clone();
    }
    // a re-imported fixture is live again even if a cleanup pass had archived it
    existing.is_archived = false;
    existing.updated_at = Utc::now();

    let fixture_id = existing.id;
    store.update_fixture(&existing)?;
    ensure_task(store, resolved, fixture_id)?;
    debug!(fixture_id, opposition = %resolved.opposition_name, "updated fixture");
    Ok(fixture_id)
}

/// Check-then-create with fixture-scoped uniqueness: a fixture never
/// persists without a task and never collects a second one from
/// repeated ingestion.
fn ensure_task<S: FixtureStore>(
    store: &mut S,
    resolved: &ResolvedFixture,
    fixture_id: i64,
) -> Result<(), StoreError> {
    if store.task_exists_for(fixture_id)? {
        return Ok(());
    }
    let (task_type, status) = task_for(resolved.home_away);
    store.insert_task(NewTask {
        organization_id: resolved.organization_id,
        fixture_id,
        task_type,
        status,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn resolved(opposition: &str, home_away: HomeAway) -> ResolvedFixture {
        ResolvedFixture {
            organization_id: 1,
            managed_team_id: 10,
            managed_team_name: "U9 Red".to_string(),
            opposition_name: opposition.to_string(),
            home_away,
            kickoff_datetime: Some(Utc.with_ymd_and_hms(2025, 10, 5, 10, 0, 0).unwrap()),
            kickoff_time_text: "10:00".to_string(),
            pitch_id: None,
            instructions_text: None,
        }
    }

    #[test]
    fn test_insert_then_update_on_same_identity() {
        let mut store = MemoryStore::default();
        let first = upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        let id = match first {
            UpsertOutcome::Added(id) => id,
            other => panic!("expected Added, got {:?}", other),
        };

        // same org/team/opposition/date with a corrected kickoff time
        let mut corrected = resolved("Hove Rivervale", HomeAway::Away);
        corrected.kickoff_datetime = Some(Utc.with_ymd_and_hms(2025, 10, 5, 11, 30, 0).unwrap());
        corrected.kickoff_time_text = "11:30".to_string();

        let second = upsert_fixture(&mut store, &corrected).unwrap();
        assert_eq!(second, UpsertOutcome::Updated(id));

        let fixtures = store.fixtures();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].kickoff_time_text, "11:30");
        assert_eq!(fixtures[0].kickoff_datetime.time().format("%H:%M").to_string(), "11:30");
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn test_opposition_identity_is_case_insensitive() {
        let mut store = MemoryStore::default();
        upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        let second =
            upsert_fixture(&mut store, &resolved("HOVE RIVERVALE", HomeAway::Away)).unwrap();
        assert!(matches!(second, UpsertOutcome::Updated(_)));
        assert_eq!(store.fixtures().len(), 1);
    }

    #[test]
    fn test_different_date_is_a_new_fixture() {
        let mut store = MemoryStore::default();
        upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();

        let mut next_week = resolved("Hove Rivervale", HomeAway::Away);
        next_week.kickoff_datetime = Some(Utc.with_ymd_and_hms(2025, 10, 12, 10, 0, 0).unwrap());
        let outcome = upsert_fixture(&mut store, &next_week).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Added(_)));
        assert_eq!(store.fixtures().len(), 2);
        assert_eq!(store.tasks().len(), 2);
    }

    #[test]
    fn test_task_type_follows_home_away() {
        let mut store = MemoryStore::default();
        upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        upsert_fixture(&mut store, &resolved("Saltdean United", HomeAway::Home)).unwrap();

        let tasks = store.tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_type, TaskType::AwayEmail);
        assert_eq!(tasks[0].status, TaskStatus::Waiting);
        assert_eq!(tasks[1].task_type, TaskType::HomeEmail);
        assert_eq!(tasks[1].status, TaskStatus::Pending);
    }

    #[test]
    fn test_update_unarchives() {
        let mut store = MemoryStore::default();
        upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        store.archive_all();
        assert!(store.fixtures()[0].is_archived);

        upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        assert!(!store.fixtures()[0].is_archived);
    }

    #[test]
    fn test_missing_kickoff_is_rejected() {
        let mut store = MemoryStore::default();
        let mut row = resolved("Hove Rivervale", HomeAway::Away);
        row.kickoff_datetime = None;
        assert!(matches!(
            upsert_fixture(&mut store, &row),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    /// Store wrapper counting identity lookups.
    struct CountingStore {
        inner: MemoryStore,
        finds: std::cell::Cell<usize>,
    }

    impl FixtureStore for CountingStore {
        fn find_fixture(
            &self,
            key: &FixtureIdentityKey,
        ) -> Result<Option<Fixture>, StoreError> {
            self.finds.set(self.finds.get() + 1);
            self.inner.find_fixture(key)
        }
        fn insert_fixture(&mut self, fixture: NewFixture) -> Result<i64, StoreError> {
            self.inner.insert_fixture(fixture)
        }
        fn update_fixture(&mut self, fixture: &Fixture) -> Result<(), StoreError> {
            self.inner.update_fixture(fixture)
        }
        fn task_exists_for(&self, fixture_id: i64) -> Result<bool, StoreError> {
            self.inner.task_exists_for(fixture_id)
        }
        fn insert_task(&mut self, task: NewTask) -> Result<i64, StoreError> {
            self.inner.insert_task(task)
        }
    }

    #[test]
    fn test_insert_path_looks_up_identity_once() {
        let mut store = CountingStore {
            inner: MemoryStore::default(),
            finds: std::cell::Cell::new(0),
        };
        let outcome =
            upsert_fixture(&mut store, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Added(_)));
        // the insert-collision recovery handles the race, no second
        // lookup before the insert
        assert_eq!(store.finds.get(), 1);
    }

    /// Store wrapper that simulates losing the insert race: the lookup
    /// misses until an insert has collided once.
    struct RacyStore {
        inner: MemoryStore,
        hide_from_find: bool,
    }

    impl FixtureStore for RacyStore {
        fn find_fixture(
            &self,
            key: &FixtureIdentityKey,
        ) -> Result<Option<Fixture>, StoreError> {
            if self.hide_from_find {
                return Ok(None);
            }
            self.inner.find_fixture(key)
        }
        fn insert_fixture(&mut self, fixture: NewFixture) -> Result<i64, StoreError> {
            let result = self.inner.insert_fixture(fixture);
            if matches!(result, Err(StoreError::UniqueViolation(_))) {
                // the conflicting row becomes visible after the collision
                self.hide_from_find = false;
            }
            result
        }
        fn update_fixture(&mut self, fixture: &Fixture) -> Result<(), StoreError> {
            self.inner.update_fixture(fixture)
        }
        fn task_exists_for(&self, fixture_id: i64) -> Result<bool, StoreError> {
            self.inner.task_exists_for(fixture_id)
        }
        fn insert_task(&mut self, task: NewTask) -> Result<i64, StoreError> {
            self.inner.insert_task(task)
        }
    }

    #[test]
    fn test_unique_violation_recovers_as_update() {
        let mut inner = MemoryStore::default();
        upsert_fixture(&mut inner, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();

        let mut racy = RacyStore {
            inner,
            hide_from_find: true,
        };
        let outcome =
            upsert_fixture(&mut racy, &resolved("Hove Rivervale", HomeAway::Away)).unwrap();
        assert!(matches!(outcome, UpsertOutcome::Updated(_)));
        assert_eq!(racy.inner.fixtures().len(), 1);
        assert_eq!(racy.inner.tasks().len(), 1);
    }
}
