use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub title: String,
    /// Default booking length in minutes.
    pub duration_minutes: i32,
    /// Minor currency units; `None` when the price is quoted on site.
    pub price_cents: Option<i64>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Service {
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn default_length(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        Service {
            id: "svc-1".to_string(),
            title: "Haircut".to_string(),
            duration_minutes: 45,
            price_cents: Some(2500),
            is_active: true,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bookable_requires_active_and_not_deleted() {
        let mut svc = service();
        assert!(svc.is_bookable());

        svc.is_active = false;
        assert!(!svc.is_bookable());

        svc.is_active = true;
        svc.deleted_at = Some(Utc::now());
        assert!(!svc.is_bookable());
    }

    #[test]
    fn test_default_length() {
        assert_eq!(service().default_length(), Duration::minutes(45));
    }
}
