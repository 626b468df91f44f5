use serde::{Deserialize, Serialize};

use super::ids::{GroupId, SensorId};
use super::CustomAttributes;

/// A measurement series of a managed object on the external platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub managed_object_id: String,
    pub managed_object_name: String,
    pub value_fragment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fragment_display_name: Option<String>,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
}

impl Sensor {
    /// Description of the value fragment, if one is usable for uploads
    pub fn value_fragment_description(&self) -> Option<&str> {
        self.value_fragment_display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_name: Option<String>,
    #[serde(default)]
    pub sensors: Vec<SensorId>,
    #[serde(default)]
    pub sub_groups: Vec<GroupId>,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
}

impl Group {
    /// Add-to-set for both member lists; returns true if anything changed
    pub fn add_members(&mut self, sensors: &[SensorId], groups: &[GroupId]) -> bool {
        let mut changed = false;
        for sensor in sensors {
            if !self.sensors.contains(sensor) {
                self.sensors.push(sensor.clone());
                changed = true;
            }
        }
        for group in groups {
            if group != &self.id && !self.sub_groups.contains(group) {
                self.sub_groups.push(group.clone());
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(display_name: Option<&str>) -> Sensor {
        Sensor {
            id: SensorId::from("s1"),
            name: "Temperature".to_string(),
            description: None,
            managed_object_id: "100".to_string(),
            managed_object_name: "Boiler".to_string(),
            value_fragment_type: "c8y_Temperature".to_string(),
            value_fragment_display_name: display_name.map(str::to_string),
            custom_attributes: CustomAttributes::new(),
        }
    }

    #[test]
    fn test_value_fragment_description_rejects_blank() {
        assert_eq!(sensor(Some("Temp")).value_fragment_description(), Some("Temp"));
        assert_eq!(sensor(Some("   ")).value_fragment_description(), None);
        assert_eq!(sensor(None).value_fragment_description(), None);
    }

    #[test]
    fn test_group_add_members_is_idempotent() {
        let mut group = Group {
            id: GroupId::from("g1"),
            name: "Plant".to_string(),
            description: None,
            managed_object_id: Some("500".to_string()),
            managed_object_name: Some("Plant".to_string()),
            sensors: vec![SensorId::from("s1")],
            sub_groups: vec![],
            custom_attributes: CustomAttributes::new(),
        };

        let sensors = [SensorId::from("s1"), SensorId::from("s2")];
        let groups = [GroupId::from("g2"), GroupId::from("g1")];

        assert!(group.add_members(&sensors, &groups));
        assert!(!group.add_members(&sensors, &groups));
        assert_eq!(group.sensors.len(), 2);
        // a group never contains itself
        assert_eq!(group.sub_groups, vec![GroupId::from("g2")]);
    }
}
