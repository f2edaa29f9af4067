//! Raw form payloads and their validation into typed inputs.
//!
//! Every handler deserializes the submitted strings into one of these
//! structs, validates, and either persists the typed input or re-renders
//! the form with the collected messages and the submitted values intact.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::{
    activity::ActivityInput,
    destination::Destination,
    packing::{PackingItemInput, TripPackingInput},
    tag::Tag,
    trip::{Trip, TripInput},
};

pub type FieldErrors = Vec<String>;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripForm {
    pub title: String,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: String,
    pub is_public: Option<String>,
}

impl TripForm {
    pub fn from_trip(trip: &Trip) -> Self {
        Self {
            title: trip.title.clone(),
            destination: trip.destination_id.to_string(),
            start_date: trip.start_date.format(DATE_FORMAT).to_string(),
            end_date: trip.end_date.format(DATE_FORMAT).to_string(),
            budget: format!("{:.2}", trip.budget),
            is_public: trip.is_public.then(|| "on".to_string()),
        }
    }

    pub fn validate(&self, destinations: &[Destination]) -> Result<TripInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push("Title is required.".into());
        }

        let destination_id = self.destination.trim().parse::<i64>().ok();
        let destination_id = match destination_id {
            Some(id) if destinations.iter().any(|d| d.id == id) => Some(id),
            _ => {
                errors.push("Choose a destination.".into());
                None
            }
        };

        let start_date = parse_date(&self.start_date, "start date", &mut errors);
        let end_date = parse_date(&self.end_date, "end date", &mut errors);
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                errors.push("End date must be on or after the start date.".into());
            }
        }

        let budget = parse_money(&self.budget, "budget", &mut errors);
        if let Some(value) = budget {
            if value < 0.0 {
                errors.push("Budget cannot be negative.".into());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(TripInput {
            title,
            destination_id: destination_id.unwrap_or_default(),
            start_date: start_date.unwrap_or_default(),
            end_date: end_date.unwrap_or_default(),
            budget: budget.unwrap_or_default(),
            is_public: self.is_public.is_some(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityForm {
    pub title: String,
    pub date: String,
    pub cost: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActivityForm {
    pub fn validate(&self, trip: &Trip, owner_tags: &[Tag]) -> Result<ActivityInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.push("Title is required.".into());
        }

        let date = parse_date(&self.date, "date", &mut errors);
        if let Some(value) = date {
            if value < trip.start_date || value > trip.end_date {
                errors.push("Activity date must fall within the trip dates.".into());
            }
        }

        let cost = parse_money(&self.cost, "cost", &mut errors);
        if let Some(value) = cost {
            if value < 0.0 {
                errors.push("Cost cannot be negative.".into());
            }
        }

        let mut tag_ids = Vec::new();
        for raw in &self.tags {
            match raw.parse::<i64>() {
                Ok(id) if owner_tags.iter().any(|tag| tag.id == id) => tag_ids.push(id),
                _ => {
                    errors.push("Choose tags from your own list.".into());
                    break;
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(ActivityInput {
            title,
            date: date.unwrap_or_default(),
            cost: cost.unwrap_or_default(),
            notes: self.notes.trim().to_string(),
            tag_ids,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackingItemForm {
    pub name: String,
    #[serde(default)]
    pub category: String,
}

impl PackingItemForm {
    pub fn validate(&self) -> Result<PackingItemInput, FieldErrors> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(vec!["Name is required.".into()]);
        }
        Ok(PackingItemInput {
            name,
            category: self.category.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagForm {
    pub name: String,
}

impl TagForm {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(vec!["Name is required.".into()]);
        }
        Ok(name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripPackingForm {
    pub item: String,
    pub quantity: String,
    pub is_packed: Option<String>,
    #[serde(default)]
    pub note: String,
}

impl TripPackingForm {
    pub fn validate(&self, owner_items: &[crate::models::packing::PackingItem]) -> Result<TripPackingInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let item_id = self.item.trim().parse::<i64>().ok();
        let item_id = match item_id {
            Some(id) if owner_items.iter().any(|item| item.id == id) => Some(id),
            _ => {
                errors.push("Choose an item from your own catalog.".into());
                None
            }
        };

        let quantity = match self.quantity.trim().parse::<i64>() {
            Ok(value) if value >= 1 => Some(value),
            Ok(_) => {
                errors.push("Quantity must be at least 1.".into());
                None
            }
            Err(_) => {
                errors.push("Quantity must be a whole number.".into());
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(TripPackingInput {
            item_id: item_id.unwrap_or_default(),
            quantity: quantity.unwrap_or(1),
            is_packed: self.is_packed.is_some(),
            note: self.note.trim().to_string(),
        })
    }
}

fn parse_date(raw: &str, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(format!("Enter a valid {field}."));
            None
        }
    }
}

/// Empty money fields mean zero, matching the model defaults.
fn parse_money(raw: &str, field: &str, errors: &mut FieldErrors) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            errors.push(format!("Enter a valid {field}."));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn destination() -> Destination {
        Destination {
            id: 7,
            name: "Lisbon".into(),
            country: "Portugal".into(),
            description: String::new(),
            latitude: Some(38.72225),
            longitude: Some(-9.13934),
        }
    }

    fn trip() -> Trip {
        Trip {
            id: 1,
            owner_id: 1,
            title: "Lisbon Getaway".into(),
            destination_id: 7,
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2026, 6, 10).expect("date"),
            budget: 500.0,
            is_public: true,
            created_at: Utc::now(),
        }
    }

    fn trip_form() -> TripForm {
        TripForm {
            title: "Lisbon Getaway".into(),
            destination: "7".into(),
            start_date: "2026-06-01".into(),
            end_date: "2026-06-10".into(),
            budget: "500".into(),
            is_public: Some("on".into()),
        }
    }

    #[test]
    fn valid_trip_form_passes() {
        let input = trip_form().validate(&[destination()]).expect("valid form");
        assert_eq!(input.title, "Lisbon Getaway");
        assert_eq!(input.destination_id, 7);
        assert_eq!(input.budget, 500.0);
        assert!(input.is_public);
    }

    #[test]
    fn trip_end_before_start_is_rejected() {
        let mut form = trip_form();
        form.end_date = "2026-05-30".into();
        let errors = form.validate(&[destination()]).expect_err("invalid range");
        assert!(errors
            .iter()
            .any(|msg| msg.contains("End date must be on or after")));
    }

    #[test]
    fn trip_negative_budget_is_rejected() {
        let mut form = trip_form();
        form.budget = "-10".into();
        let errors = form.validate(&[destination()]).expect_err("negative budget");
        assert!(errors.iter().any(|msg| msg.contains("Budget cannot be negative")));
    }

    #[test]
    fn trip_blank_title_and_unknown_destination_are_rejected() {
        let mut form = trip_form();
        form.title = "   ".into();
        form.destination = "99".into();
        let errors = form.validate(&[destination()]).expect_err("two failures");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn activity_outside_trip_span_is_rejected() {
        let form = ActivityForm {
            title: "Day trip".into(),
            date: "2026-06-12".into(),
            cost: "10".into(),
            notes: String::new(),
            tags: Vec::new(),
        };
        let errors = form.validate(&trip(), &[]).expect_err("out of range");
        assert!(errors
            .iter()
            .any(|msg| msg.contains("within the trip dates")));
    }

    #[test]
    fn activity_negative_cost_is_rejected() {
        let form = ActivityForm {
            title: "Day trip".into(),
            date: "2026-06-02".into(),
            cost: "-5".into(),
            notes: String::new(),
            tags: Vec::new(),
        };
        let errors = form.validate(&trip(), &[]).expect_err("negative cost");
        assert!(errors.iter().any(|msg| msg.contains("Cost cannot be negative")));
    }

    #[test]
    fn activity_foreign_tag_is_rejected() {
        let own = Tag {
            id: 3,
            owner_id: 1,
            name: "food".into(),
        };
        let form = ActivityForm {
            title: "Dinner".into(),
            date: "2026-06-02".into(),
            cost: "30".into(),
            notes: String::new(),
            tags: vec!["3".into(), "9".into()],
        };
        let errors = form.validate(&trip(), &[own]).expect_err("foreign tag");
        assert!(errors.iter().any(|msg| msg.contains("your own list")));
    }

    #[test]
    fn packing_quantity_below_one_is_rejected() {
        let item = crate::models::packing::PackingItem {
            id: 4,
            owner_id: 1,
            name: "Socks".into(),
            category: "Clothes".into(),
        };
        let form = TripPackingForm {
            item: "4".into(),
            quantity: "0".into(),
            is_packed: None,
            note: String::new(),
        };
        let errors = form.validate(&[item]).expect_err("zero quantity");
        assert!(errors.iter().any(|msg| msg.contains("at least 1")));
    }

    #[test]
    fn packing_item_name_must_not_be_blank() {
        let form = PackingItemForm {
            name: "  ".into(),
            category: String::new(),
        };
        assert!(form.validate().is_err());
    }
}
