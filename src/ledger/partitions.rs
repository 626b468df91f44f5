/// Key layout for the Fjall partitions
///
/// Partition structure:
/// - `tasks`: task:{task_id} -> Task (JSON)
/// - `task_names`: task_name:{name} -> task_id
/// - `files`: file:{file_id} -> File (JSON)
/// - `file_task_index`: file_task:{task_id}\x1f{sensor_id}\x1f{name} -> file_id
/// - `sensors`: sensor:{sensor_id} -> Sensor (JSON)
/// - `sensor_index`: sensor_mo:{managed_object_id}\x1f{managed_object_name}\x1f{fragment_type} -> sensor_id
/// - `groups`: group:{group_id} -> Group (JSON)
/// - `group_index`: group_mo:{managed_object_id} -> group_id

const FIELD_SEPARATOR: char = '\u{1f}';

pub const TASK_PREFIX: &str = "task:";

pub fn encode_task_key(task_id: &str) -> Vec<u8> {
    format!("{TASK_PREFIX}{task_id}").into_bytes()
}

pub fn encode_task_name_key(name: &str) -> Vec<u8> {
    format!("task_name:{name}").into_bytes()
}

pub fn encode_file_key(file_id: &str) -> Vec<u8> {
    format!("file:{file_id}").into_bytes()
}

/// One entry per sensor of a file created by a task
pub fn encode_file_task_index_key(task_id: &str, sensor_id: &str, name: &str) -> Vec<u8> {
    format!("file_task:{task_id}{FIELD_SEPARATOR}{sensor_id}{FIELD_SEPARATOR}{name}").into_bytes()
}

pub fn encode_sensor_key(sensor_id: &str) -> Vec<u8> {
    format!("sensor:{sensor_id}").into_bytes()
}

/// Natural key of a synchronized sensor
pub fn encode_sensor_index_key(
    managed_object_id: &str,
    managed_object_name: &str,
    value_fragment_type: &str,
) -> Vec<u8> {
    format!(
        "sensor_mo:{managed_object_id}{FIELD_SEPARATOR}{managed_object_name}{FIELD_SEPARATOR}{value_fragment_type}"
    )
    .into_bytes()
}

pub fn encode_group_key(group_id: &str) -> Vec<u8> {
    format!("group:{group_id}").into_bytes()
}

pub fn encode_group_index_key(managed_object_id: &str) -> Vec<u8> {
    format!("group_mo:{managed_object_id}").into_bytes()
}

/// Decode an id stored as the value of an index entry
pub fn decode_id(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_keys() {
        assert_eq!(encode_task_key("t1"), b"task:t1");
        assert_eq!(encode_task_name_key("nightly"), b"task_name:nightly");
    }

    #[test]
    fn test_sensor_index_key_separates_fields() {
        // "a" + "bc" must not collide with "ab" + "c"
        assert_ne!(
            encode_sensor_index_key("1", "a", "bc"),
            encode_sensor_index_key("1", "ab", "c")
        );
    }

    #[test]
    fn test_file_task_index_key() {
        assert_eq!(
            encode_file_task_index_key("t1", "s1", "a.csv"),
            "file_task:t1\u{1f}s1\u{1f}a.csv".as_bytes()
        );
    }

    #[test]
    fn test_group_index_key() {
        assert_eq!(encode_group_index_key("500"), b"group_mo:500");
        assert_eq!(decode_id(b"g-1"), "g-1");
    }
}
