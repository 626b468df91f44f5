use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{FileId, SensorId, TaskId};
use super::CustomAttributes;

/// External platform a file can be exposed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub platform_identifier: String,
}

impl Platform {
    pub fn new(platform_identifier: impl Into<String>) -> Self {
        Self {
            platform_identifier: platform_identifier.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorage {
    pub bucket: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFragment {
    #[serde(rename = "type")]
    pub fragment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub sensors: Vec<SensorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_name: Option<String>,
    #[serde(default)]
    pub value_fragments: Vec<ValueFragment>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityState {
    pub published: bool,
    pub state_changing: bool,
    #[serde(default)]
    pub exposed_to_platforms: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VisibilityState {
    /// Set-add semantics: returns false when the platform was already present
    pub fn expose_to(&mut self, platform: &Platform) -> bool {
        if self.exposed_to_platforms.contains(platform) {
            return false;
        }
        self.exposed_to_platforms.push(platform.clone());
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: FileId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_task: Option<TaskId>,
    pub storage: FileStorage,
    pub metadata: FileMetadata,
    #[serde(default)]
    pub visibility_state: VisibilityState,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a file document
#[derive(Debug, Clone, Builder)]
pub struct NewFile {
    #[builder(into)]
    pub name: String,
    pub storage: FileStorage,
    pub metadata: FileMetadata,
    pub created_by_task: Option<TaskId>,
    #[builder(into)]
    pub description: Option<String>,
    #[builder(into)]
    pub url: Option<String>,
    #[builder(default)]
    pub custom_attributes: CustomAttributes,
}

impl From<NewFile> for File {
    fn from(new: NewFile) -> Self {
        let now = Utc::now();
        Self {
            id: FileId::generate(),
            name: new.name,
            description: new.description,
            created_by_task: new.created_by_task,
            storage: new.storage,
            metadata: new.metadata,
            visibility_state: VisibilityState::default(),
            custom_attributes: new.custom_attributes,
            url: new.url,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expose_to_is_set_add() {
        let mut state = VisibilityState::default();
        let platform = Platform::new("cumulocity");

        assert!(state.expose_to(&platform));
        assert!(!state.expose_to(&platform));
        assert_eq!(state.exposed_to_platforms.len(), 1);
    }

    #[test]
    fn test_new_file_starts_unpublished() {
        let file: File = NewFile::builder()
            .name("data.csv")
            .storage(FileStorage {
                bucket: "b".to_string(),
                path: "p/data.csv".to_string(),
            })
            .metadata(FileMetadata {
                sensors: vec![SensorId::from("s1")],
                date_from: None,
                date_to: None,
                managed_object_id: None,
                managed_object_name: None,
                value_fragments: vec![],
            })
            .build()
            .into();

        assert_eq!(file.name, "data.csv");
        assert!(!file.visibility_state.published);
        assert!(!file.visibility_state.state_changing);
        assert!(file.created_by_task.is_none());

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["visibilityState"]["published"], false);
        assert_eq!(value["storage"]["bucket"], "b");
    }
}
