use serde_json::{Map, Value};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info};

use domain::restriction::RestrictionCategory;
use warden_application::{
    error::{AppError, AppResult},
    ports::outgoing::restriction_persistence::{PersistedRecord, RestrictionPersistencePort},
};

/// One JSON object per category, `{"<subject>,<scope>": "<epoch millis>"}`,
/// rewritten through a temp file and a rename on every mutation.
pub struct JsonFileRestrictionPersistence {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRestrictionPersistence {
    pub async fn new(data_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to create data dir {}: {e}", data_dir.display()),
            })?;

        info!(data_dir = %data_dir.display(), "File restriction persistence ready");
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn file_path(&self, category: RestrictionCategory) -> PathBuf {
        self.data_dir.join(format!("{}s.json", category.as_str()))
    }

    async fn read_object(path: &Path) -> AppResult<Map<String, Value>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&raw)? {
            Value::Object(object) => Ok(object),
            other => Err(AppError::PersistenceError {
                message: format!(
                    "{} must hold a JSON object, found {}",
                    path.display(),
                    json_kind(&other)
                ),
            }),
        }
    }

    async fn write_object(path: &Path, object: &Map<String, Value>) -> AppResult<()> {
        let data = serde_json::to_vec_pretty(object)?;
        let temp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to replace {}: {e}", path.display()),
            })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait::async_trait]
impl RestrictionPersistencePort for JsonFileRestrictionPersistence {
    async fn load_all(&self, category: RestrictionCategory) -> AppResult<Vec<PersistedRecord>> {
        let path = self.file_path(category);
        let object = Self::read_object(&path).await?;

        // Non-string values are handed on verbatim so the store reports them.
        let records = object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(raw) => PersistedRecord::new(key, raw),
                other => PersistedRecord::new(key, other.to_string()),
            })
            .collect::<Vec<_>>();

        debug!(path = %path.display(), records = records.len(), "Loaded restriction file");
        Ok(records)
    }

    async fn persist(
        &self,
        category: RestrictionCategory,
        record: &PersistedRecord,
    ) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.file_path(category);

        let mut object = Self::read_object(&path).await?;
        object.insert(record.key.clone(), Value::String(record.value.clone()));
        Self::write_object(&path, &object).await
    }

    async fn erase(&self, category: RestrictionCategory, key: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.file_path(category);

        let mut object = Self::read_object(&path).await?;
        if object.remove(key).is_none() {
            return Ok(());
        }
        Self::write_object(&path, &object).await
    }
}
