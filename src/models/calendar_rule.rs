use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalendarRuleType {
    DayOff,
    CustomDay,
    RangeOff,
    RangeCustom,
}

impl CalendarRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarRuleType::DayOff => "DAY_OFF",
            CalendarRuleType::CustomDay => "CUSTOM_DAY",
            CalendarRuleType::RangeOff => "RANGE_OFF",
            CalendarRuleType::RangeCustom => "RANGE_CUSTOM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DAY_OFF" => Some(CalendarRuleType::DayOff),
            "CUSTOM_DAY" => Some(CalendarRuleType::CustomDay),
            "RANGE_OFF" => Some(CalendarRuleType::RangeOff),
            "RANGE_CUSTOM" => Some(CalendarRuleType::RangeCustom),
            _ => None,
        }
    }

    pub fn is_off(&self) -> bool {
        matches!(self, CalendarRuleType::DayOff | CalendarRuleType::RangeOff)
    }
}

/// Date-specific override of the weekly working-hour template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRule {
    pub id: String,
    pub service_id: String,
    pub rule_type: CalendarRuleType,
    pub start_date: NaiveDate,
    /// `None` means the rule applies to `start_date` only.
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: bool,
}

impl CalendarRule {
    pub fn last_date(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.last_date()
    }

    /// Number of days the rule spans; smaller is more specific.
    pub fn span_days(&self) -> i64 {
        (self.last_date() - self.start_date).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn rule(rule_type: CalendarRuleType, start: u32, end: Option<u32>) -> CalendarRule {
        CalendarRule {
            id: "rule-1".to_string(),
            service_id: "svc-1".to_string(),
            rule_type,
            start_date: date(start),
            end_date: end.map(date),
            start_time: None,
            end_time: None,
            is_active: true,
        }
    }

    #[test]
    fn test_single_day_rule_covers_only_its_date() {
        let r = rule(CalendarRuleType::DayOff, 16, None);
        assert!(r.covers(date(16)));
        assert!(!r.covers(date(15)));
        assert!(!r.covers(date(17)));
        assert_eq!(r.span_days(), 1);
    }

    #[test]
    fn test_range_rule_is_inclusive() {
        let r = rule(CalendarRuleType::RangeOff, 10, Some(14));
        assert!(r.covers(date(10)));
        assert!(r.covers(date(14)));
        assert!(!r.covers(date(15)));
        assert_eq!(r.span_days(), 5);
    }

    #[test]
    fn test_rule_type_round_trips_storage_name() {
        for t in [
            CalendarRuleType::DayOff,
            CalendarRuleType::CustomDay,
            CalendarRuleType::RangeOff,
            CalendarRuleType::RangeCustom,
        ] {
            assert_eq!(CalendarRuleType::parse(t.as_str()), Some(t));
        }
        assert_eq!(CalendarRuleType::parse("HOLIDAY"), None);
    }
}
