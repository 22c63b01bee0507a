use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contact-form message left by a site visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    pub fn subject_or_default(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("No Subject")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_without_subject() {
        let json = r#"{"id": 5, "name": "Ada", "email": "ada@example.com", "subject": null,
                       "message": "Hello", "created_at": "2026-10-18T09:30:00Z", "is_read": false}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.subject_or_default(), "No Subject");
        assert!(!message.is_read);
    }
}
