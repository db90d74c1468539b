use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const DUPLICATE_THEATER: &str = "A theater with this name and location already exists";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theater {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub capacity: i32,
    pub amenities: Vec<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/replace payload for a theater.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TheaterInput {
    #[validate(length(min = 1, max = 100, message = "Theater name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "Theater location is required"))]
    pub location: String,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub city: Option<String>,
    #[validate(length(max = 50))]
    pub state: Option<String>,
    #[validate(length(max = 10))]
    pub zip_code: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(range(min = 1, max = 10000, message = "Capacity must be between 1 and 10000"))]
    pub capacity: i32,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl TheaterInput {
    /// Trims text fields and lower-cases the email, like the stored form.
    pub fn normalised(mut self) -> Self {
        fn trim(field: &mut Option<String>) {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self.name = self.name.trim().to_string();
        self.location = self.location.trim().to_string();
        trim(&mut self.address);
        trim(&mut self.city);
        trim(&mut self.state);
        trim(&mut self.zip_code);
        trim(&mut self.phone);
        trim(&mut self.description);
        trim(&mut self.email);
        self.email = self.email.map(|e| e.to_lowercase());
        self.amenities = self
            .amenities
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TheaterFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

impl TheaterFilter {
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.limit
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TheaterPage {
    pub theaters: Vec<Theater>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn input() -> TheaterInput {
        serde_json::from_value(serde_json::json!({
            "name": "  Grand Cinema ",
            "location": "Downtown",
            "email": "Box@Grand.Example",
            "capacity": 120,
            "amenities": [" IMAX ", ""]
        }))
        .unwrap()
    }

    #[test]
    fn defaults_and_normalisation() {
        let theater = input().normalised();
        assert_eq!(theater.name, "Grand Cinema");
        assert_eq!(theater.email.as_deref(), Some("box@grand.example"));
        assert_eq!(theater.amenities, vec!["IMAX"]);
        assert!(theater.is_active);
        assert!(theater.validate().is_ok());
    }

    #[test]
    fn capacity_bounds_are_validated() {
        let mut theater = input();
        theater.capacity = 0;
        assert!(theater.validate().is_err());
        theater.capacity = 10_001;
        assert!(theater.validate().is_err());
    }

    #[test]
    fn offset_starts_at_page_one() {
        let filter = TheaterFilter { page: 3, limit: 10, ..Default::default() };
        assert_eq!(filter.offset(), 20);
        let filter = TheaterFilter { page: 0, limit: 10, ..Default::default() };
        assert_eq!(filter.offset(), 0);
    }
}
