//! In-memory preference store and persistence gateway.

use crate::core_modules::history::WorkoutHistory;
use crate::core_modules::session::WorkoutPlan;
use crate::core_modules::summary::WorkoutSummaryRecord;
use crate::error::StoreError;
use crate::interfaces::{PersistenceGateway, PreferenceStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryPreferences {
    plans: Arc<Mutex<HashMap<String, WorkoutPlan>>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_workout_plan(&self, user_id: impl Into<String>, plan: WorkoutPlan) {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), plan);
    }
}

impl PreferenceStore for InMemoryPreferences {
    async fn workout_plan(&self, user_id: &str) -> Result<Option<WorkoutPlan>, StoreError> {
        Ok(self
            .plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied())
    }
}

/// Keeps every saved summary per user. Can be told to reject writes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    histories: Arc<Mutex<HashMap<String, WorkoutHistory>>>,
    save_attempts: Arc<AtomicUsize>,
    reject_writes: bool,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every write fails.
    pub fn rejecting() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    pub fn history(&self, user_id: &str) -> WorkoutHistory {
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `save_workout_summary` calls, rejected ones included.
    pub fn save_attempts(&self) -> usize {
        self.save_attempts.load(Ordering::SeqCst)
    }
}

impl PersistenceGateway for InMemoryHistory {
    async fn save_workout_summary(
        &self,
        user_id: &str,
        record: &WorkoutSummaryRecord,
    ) -> Result<(), StoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes {
            return Err(StoreError::Rejected(format!("writes disabled for {user_id}")));
        }
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn preferences_round_trip_per_user() {
        let store = InMemoryPreferences::new();
        store.set_workout_plan("ada", WorkoutPlan::new(8, 4).unwrap());
        assert_eq!(
            store.workout_plan("ada").await.unwrap(),
            Some(WorkoutPlan::new(8, 4).unwrap())
        );
        assert_eq!(store.workout_plan("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn history_appends_and_can_reject() {
        let record = WorkoutSummaryRecord {
            workout_type: "squat".into(),
            total_reps: 2,
            total_sets: 1,
            accuracy: 100,
            timestamp: Utc::now(),
        };

        let gateway = InMemoryHistory::new();
        gateway.save_workout_summary("ada", &record).await.unwrap();
        assert_eq!(gateway.history("ada").records(), &[record.clone()]);

        let rejecting = InMemoryHistory::rejecting();
        assert!(matches!(
            rejecting.save_workout_summary("ada", &record).await,
            Err(StoreError::Rejected(_))
        ));
        assert!(rejecting.history("ada").is_empty());
        assert_eq!(gateway.save_attempts(), 1);
        assert_eq!(rejecting.save_attempts(), 1);
    }
}
