use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Badge variants, collapsed from the legacy one-model-per-variant scheme
/// into a single tag carried on the badge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    CheckIn,
    GreenHalo,
    SocialConnect,
    GreenFlagged,
    Halod,
    SaferDating,
}

impl BadgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeType::CheckIn => "CHECK_IN",
            BadgeType::GreenHalo => "GREEN_HALO",
            BadgeType::SocialConnect => "SOCIAL_CONNECT",
            BadgeType::GreenFlagged => "GREEN_FLAGGED",
            BadgeType::Halod => "HALOD",
            BadgeType::SaferDating => "SAFER_DATING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CHECK_IN" => Some(BadgeType::CheckIn),
            "GREEN_HALO" => Some(BadgeType::GreenHalo),
            "SOCIAL_CONNECT" => Some(BadgeType::SocialConnect),
            "GREEN_FLAGGED" => Some(BadgeType::GreenFlagged),
            "HALOD" => Some(BadgeType::Halod),
            "SAFER_DATING" => Some(BadgeType::SaferDating),
            _ => None,
        }
    }

    /// Static HTML body stamped onto the badge at creation time, keyed by
    /// variant.
    pub fn html_template(self) -> &'static str {
        match self {
            BadgeType::CheckIn => include_str!("templates/check_in.html"),
            BadgeType::GreenHalo => include_str!("templates/green_halo.html"),
            BadgeType::SocialConnect => include_str!("templates/social_connect.html"),
            BadgeType::GreenFlagged => include_str!("templates/green_flagged.html"),
            BadgeType::Halod => include_str!("templates/halod.html"),
            BadgeType::SaferDating => include_str!("templates/safer_dating.html"),
        }
    }
}

/// Fallback body for badges created without an explicit type.
pub const DEFAULT_HTML_TEMPLATE: &str = include_str!("templates/badge.html");

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub id: Uuid,
    pub title: String,
    pub icon_key: String,
    pub html_content: String,
    pub badge_type: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<BadgeMedia>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BadgeMedia {
    pub media_type: String,
    pub media_key: String,
}

/// Minimal projection used by the admin user view (assigned/unassigned lists).
#[derive(Debug, Clone, Serialize)]
pub struct BadgeRef {
    pub id: Uuid,
    pub title: String,
}
