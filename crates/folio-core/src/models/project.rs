use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category value the API treats as "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectImage {
    pub id: i64,
    /// URL of the uploaded image
    pub image: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub order: i32,
}

/// A portfolio project as served by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client: Option<String>,
    /// Free text: "2023", "Jan 2023", ...
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub images: Vec<ProjectImage>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Project {
    pub fn main_image(&self) -> Option<&ProjectImage> {
        self.images
            .iter()
            .find(|img| img.is_main)
            .or_else(|| self.images.iter().min_by_key(|img| img.order))
    }

    /// Draft holding this project's editable fields, for partial edits.
    pub fn to_draft(&self) -> ProjectDraft {
        ProjectDraft {
            title: self.title.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            client: self.client.clone(),
            date: self.date.clone(),
            featured: self.featured,
            tags: self.tags.clone(),
        }
    }
}

/// Editable fields of a project, sent on create and update.
///
/// The API reads tags from repeated form fields, so drafts are sent as a
/// form rather than JSON. The slug is derived from the title server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDraft {
    pub title: String,
    pub category: String,
    pub description: String,
    pub client: Option<String>,
    pub date: String,
    pub featured: bool,
    pub tags: Vec<String>,
}

impl ProjectDraft {
    /// Title, category, description and date are required by the API.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("title", &self.title),
            ("category", &self.category),
            ("description", &self.description),
            ("date", &self.date),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("title", self.title.trim().to_string()),
            ("category", self.category.trim().to_string()),
            ("description", self.description.clone()),
            ("date", self.date.trim().to_string()),
            ("featured", self.featured.to_string()),
        ];
        if let Some(client) = self.client.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            fields.push(("client", client.to_string()));
        }
        fields.extend(
            self.tags
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .map(|tag| ("tags", tag.to_string())),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project() {
        let json = r#"{
            "id": 3, "title": "Poster Series", "slug": "poster-series", "category": "Print",
            "description": "Six posters", "client": null, "date": "2023",
            "created_at": "2026-01-05T10:00:00.123456Z", "updated_at": "2026-01-06T10:00:00Z",
            "featured": true,
            "images": [
                {"id": 1, "image": "http://x/media/a.png", "is_main": false, "alt_text": "", "order": 1},
                {"id": 2, "image": "http://x/media/b.png", "is_main": false, "alt_text": "", "order": 0}
            ],
            "tags": ["typography", "print"]
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert!(project.featured);
        assert_eq!(project.client, None);
        assert_eq!(project.tags, vec!["typography", "print"]);
        assert_eq!(project.main_image().map(|img| img.id), Some(2));
    }

    #[test]
    fn test_draft_form_repeats_tags_and_skips_blank_client() {
        let draft = ProjectDraft {
            title: " Brand Book ".to_string(),
            category: "Branding".to_string(),
            description: "Guidelines".to_string(),
            client: Some("  ".to_string()),
            date: "2024".to_string(),
            featured: false,
            tags: vec!["logo".to_string(), "".to_string(), "grid".to_string()],
        };
        let fields = draft.form_fields();
        assert!(fields.contains(&("title", "Brand Book".to_string())));
        assert!(fields.contains(&("featured", "false".to_string())));
        assert!(!fields.iter().any(|(key, _)| *key == "client"));
        let tags: Vec<_> = fields.iter().filter(|(key, _)| *key == "tags").collect();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_draft_missing_field() {
        let mut draft = ProjectDraft {
            title: "T".to_string(),
            category: "C".to_string(),
            description: "D".to_string(),
            date: "2024".to_string(),
            ..ProjectDraft::default()
        };
        assert_eq!(draft.missing_field(), None);
        draft.category = " ".to_string();
        assert_eq!(draft.missing_field(), Some("category"));
    }
}
