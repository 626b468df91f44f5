//! Routing keys on the `General` exchange

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::models::TaskType;

use super::MessagingError;

/// Every routing key this service publishes to or consumes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutingKey {
    TaskScheduledDataFetch,
    TaskScheduledDataUpload,
    TaskScheduledObjectSync,
    TaskStatus,
    TaskStatusFailed,
    TaskStatusDataFetchResult,
    TaskStatusObjectSync,
    TaskStatusObjectSyncResult,
    TaskMode,
    TaskModeChanged,
    UserUser,
    FileStatusDeletion,
    FileStatusVisibilityState,
    FileResultVisibilityState,
}

impl RoutingKey {
    pub const ALL: [RoutingKey; 14] = [
        RoutingKey::TaskScheduledDataFetch,
        RoutingKey::TaskScheduledDataUpload,
        RoutingKey::TaskScheduledObjectSync,
        RoutingKey::TaskStatus,
        RoutingKey::TaskStatusFailed,
        RoutingKey::TaskStatusDataFetchResult,
        RoutingKey::TaskStatusObjectSync,
        RoutingKey::TaskStatusObjectSyncResult,
        RoutingKey::TaskMode,
        RoutingKey::TaskModeChanged,
        RoutingKey::UserUser,
        RoutingKey::FileStatusDeletion,
        RoutingKey::FileStatusVisibilityState,
        RoutingKey::FileResultVisibilityState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingKey::TaskScheduledDataFetch => "task.scheduled.data_fetch",
            RoutingKey::TaskScheduledDataUpload => "task.scheduled.data_upload",
            RoutingKey::TaskScheduledObjectSync => "task.scheduled.object_sync",
            RoutingKey::TaskStatus => "task.status",
            RoutingKey::TaskStatusFailed => "task.status.failed",
            RoutingKey::TaskStatusDataFetchResult => "task.status.data_fetch.result",
            RoutingKey::TaskStatusObjectSync => "task.status.object_sync",
            RoutingKey::TaskStatusObjectSyncResult => "task.status.object_sync.result",
            RoutingKey::TaskMode => "task.mode",
            RoutingKey::TaskModeChanged => "task.mode.changed",
            RoutingKey::UserUser => "user.user",
            RoutingKey::FileStatusDeletion => "file.status.deletion",
            RoutingKey::FileStatusVisibilityState => "file.status.visibility.state",
            RoutingKey::FileResultVisibilityState => "file.result.visibility.state",
        }
    }

    /// Key a freshly created task of this type is scheduled on
    pub fn scheduled(task_type: TaskType) -> Self {
        match task_type {
            TaskType::DataFetch => RoutingKey::TaskScheduledDataFetch,
            TaskType::DataUpload => RoutingKey::TaskScheduledDataUpload,
            TaskType::ObjectSync => RoutingKey::TaskScheduledObjectSync,
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingKey {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| MessagingError::UnknownRoutingKey(s.to_string()))
    }
}

impl Serialize for RoutingKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoutingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form_round_trips() {
        for key in RoutingKey::ALL {
            assert_eq!(key.as_str().parse::<RoutingKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_unknown_key_is_error() {
        assert!(matches!(
            "task.status.unknown".parse::<RoutingKey>(),
            Err(MessagingError::UnknownRoutingKey(_))
        ));
    }

    #[test]
    fn test_scheduled_key_per_task_type() {
        assert_eq!(
            RoutingKey::scheduled(TaskType::DataUpload).as_str(),
            "task.scheduled.data_upload"
        );
    }
}
