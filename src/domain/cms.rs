use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageStatus {
    Draft,
    Published,
    Unpublished,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "DRAFT",
            PageStatus::Published => "PUBLISHED",
            PageStatus::Unpublished => "UNPUBLISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(PageStatus::Draft),
            "PUBLISHED" => Some(PageStatus::Published),
            "UNPUBLISHED" => Some(PageStatus::Unpublished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CmsPage {
    pub id: Uuid,
    pub page_name: String,
    pub content: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
