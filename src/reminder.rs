use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tablet reminder: fires once per day at `hour:minute`, local time.
/// All fields are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub hour: u32,
    pub minute: u32,
}

impl Reminder {
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        hour: u32,
        minute: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            hour,
            minute,
        }
    }
}

/// Creation-boundary validation. The scheduler and store trust that every
/// reminder they receive has already passed this check.
pub fn validate(owner_id: &str, name: &str, hour: u32, minute: u32) -> Result<()> {
    if owner_id.trim().is_empty() {
        anyhow::bail!("ownerId must not be empty");
    }
    if name.trim().is_empty() {
        anyhow::bail!("name must not be empty");
    }
    if hour > 23 {
        anyhow::bail!("hour must be in 0..=23, got {hour}");
    }
    if minute > 59 {
        anyhow::bail!("minute must be in 0..=59, got {minute}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_unique_ids() {
        let a = Reminder::new("user-1", "aspirin", 9, 30);
        let b = Reminder::new("user-1", "aspirin", 9, 30);
        assert_ne!(a.id, b.id);
        assert_eq!(a.owner_id, "user-1");
        assert_eq!(a.name, "aspirin");
        assert_eq!((a.hour, a.minute), (9, 30));
    }

    #[test]
    fn test_validate_accepts_boundary_times() {
        assert!(validate("user-1", "aspirin", 0, 0).is_ok());
        assert!(validate("user-1", "aspirin", 23, 59).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_times() {
        assert!(validate("user-1", "aspirin", 24, 0).is_err());
        assert!(validate("user-1", "aspirin", 0, 60).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(validate("", "aspirin", 9, 30).is_err());
        assert!(validate("user-1", "", 9, 30).is_err());
        assert!(validate("user-1", "   ", 9, 30).is_err());
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let reminder = Reminder::new("user-1", "aspirin", 9, 30);
        let value = serde_json::to_value(&reminder).unwrap();
        assert!(value.get("ownerId").is_some());
        assert!(value.get("owner_id").is_none());
    }
}
