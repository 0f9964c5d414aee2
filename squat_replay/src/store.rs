//! JSON files standing in for the user document store.
//!
//! `preferences.json` maps user ids to workout plans and `history.json` maps user
//! ids to their saved summaries. Writes go through a temp file and a rename so a
//! crash never leaves a half-written document behind.

use serde::Serialize;
use serde::de::DeserializeOwned;
use squat_coach::error::StoreError;
use squat_coach::{PersistenceGateway, PreferenceStore, WorkoutHistory, WorkoutPlan, WorkoutSummaryRecord};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const PREFERENCES_FILE: &str = "preferences.json";
const HISTORY_FILE: &str = "history.json";

type Plans = BTreeMap<String, WorkoutPlan>;
type Histories = BTreeMap<String, WorkoutHistory>;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn set_workout_plan(&self, user_id: &str, plan: WorkoutPlan) -> Result<(), StoreError> {
        let mut plans: Plans = self.read(PREFERENCES_FILE).await?;
        plans.insert(user_id.to_string(), plan);
        self.write(PREFERENCES_FILE, &plans).await
    }

    pub async fn history(&self, user_id: &str) -> Result<WorkoutHistory, StoreError> {
        let mut histories: Histories = self.read(HISTORY_FILE).await?;
        Ok(histories.remove(user_id).unwrap_or_default())
    }

    async fn read<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, StoreError> {
        match tokio::fs::read(self.dir.join(file)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write<T: Serialize + Sync>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(file);
        let staging = target.with_extension("json.tmp");
        tokio::fs::write(&staging, serde_json::to_vec_pretty(value)?).await?;
        tokio::fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), "document written");
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    async fn workout_plan(&self, user_id: &str) -> Result<Option<WorkoutPlan>, StoreError> {
        let plans: Plans = self.read(PREFERENCES_FILE).await?;
        Ok(plans.get(user_id).copied())
    }
}

impl PersistenceGateway for JsonFileStore {
    async fn save_workout_summary(
        &self,
        user_id: &str,
        record: &WorkoutSummaryRecord,
    ) -> Result<(), StoreError> {
        let mut histories: Histories = self.read(HISTORY_FILE).await?;
        histories
            .entry(user_id.to_string())
            .or_default()
            .push(record.clone());
        self.write(HISTORY_FILE, &histories).await
    }
}
