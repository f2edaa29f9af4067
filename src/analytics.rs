//! Trip spend aggregates, computed over fully materialized activity rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::activity::ActivityWithTags;

/// Bucket label for activities without any tag.
pub const UNTAGGED_LABEL: &str = "No tag";

#[derive(Debug, Clone, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagTotal {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopActivity {
    pub title: String,
    pub cost: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct TripAnalytics {
    pub total_cost: f64,
    pub remaining: f64,
    /// Share of the budget already spent, one decimal; `None` without a
    /// positive budget.
    pub budget_pct: Option<f64>,
    /// Spend per day, ascending by date.
    pub by_day: Vec<DayTotal>,
    /// Spend per tag, descending by total. An activity with several tags
    /// contributes its cost to each of them.
    pub by_tag: Vec<TagTotal>,
    pub most_expensive_activity: Option<TopActivity>,
    pub most_expensive_day: Option<DayTotal>,
}

pub fn analyze(budget: f64, activities: &[ActivityWithTags]) -> TripAnalytics {
    let total_cost: f64 = activities.iter().map(|entry| entry.activity.cost).sum();
    let remaining = budget - total_cost;
    let budget_pct = if budget > 0.0 {
        Some(round_one(total_cost / budget * 100.0))
    } else {
        None
    };

    let mut day_totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for entry in activities {
        *day_totals.entry(entry.activity.date).or_insert(0.0) += entry.activity.cost;
    }
    let by_day: Vec<DayTotal> = day_totals
        .into_iter()
        .map(|(date, total)| DayTotal { date, total })
        .collect();

    let mut tag_totals: BTreeMap<String, f64> = BTreeMap::new();
    for entry in activities {
        if entry.tags.is_empty() {
            *tag_totals.entry(UNTAGGED_LABEL.to_string()).or_insert(0.0) +=
                entry.activity.cost;
        } else {
            for tag in &entry.tags {
                *tag_totals.entry(tag.clone()).or_insert(0.0) += entry.activity.cost;
            }
        }
    }
    let mut by_tag: Vec<TagTotal> = tag_totals
        .into_iter()
        .map(|(name, total)| TagTotal { name, total })
        .collect();
    // BTreeMap already yields name order, so ties stay alphabetical.
    by_tag.sort_by(|a, b| b.total.total_cmp(&a.total));

    let most_expensive_activity = activities
        .iter()
        .max_by(|a, b| {
            a.activity
                .cost
                .total_cmp(&b.activity.cost)
                .then(a.activity.date.cmp(&b.activity.date))
        })
        .map(|entry| TopActivity {
            title: entry.activity.title.clone(),
            cost: entry.activity.cost,
            date: entry.activity.date,
        });

    let mut most_expensive_day: Option<DayTotal> = None;
    for day in &by_day {
        if most_expensive_day
            .as_ref()
            .map_or(true, |best| day.total > best.total)
        {
            most_expensive_day = Some(day.clone());
        }
    }

    TripAnalytics {
        total_cost,
        remaining,
        budget_pct,
        by_day,
        by_tag,
        most_expensive_activity,
        most_expensive_day,
    }
}

/// Packed share of a trip's packing list, one decimal; undefined for an
/// empty list.
pub fn packing_completion(packed: i64, total: i64) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(round_one(packed as f64 / total as f64 * 100.0))
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::Activity;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).expect("valid date")
    }

    fn entry(title: &str, day: u32, cost: f64, tags: &[&str]) -> ActivityWithTags {
        ActivityWithTags {
            activity: Activity {
                id: 0,
                trip_id: 1,
                title: title.to_string(),
                date: date(day),
                cost,
                notes: String::new(),
            },
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn budget_totals_match_example() {
        let activities = vec![
            entry("Surf lesson", 2, 120.0, &["sport"]),
            entry("Museum", 3, 80.0, &[]),
        ];
        let stats = analyze(500.0, &activities);
        assert_eq!(stats.total_cost, 200.0);
        assert_eq!(stats.remaining, 300.0);
        assert_eq!(stats.budget_pct, Some(40.0));
    }

    #[test]
    fn zero_budget_has_no_percentage() {
        let stats = analyze(0.0, &[entry("Walk", 1, 10.0, &[])]);
        assert_eq!(stats.budget_pct, None);
        assert_eq!(stats.remaining, -10.0);
    }

    #[test]
    fn day_totals_ascend_and_group() {
        let activities = vec![
            entry("Dinner", 3, 40.0, &[]),
            entry("Breakfast", 1, 10.0, &[]),
            entry("Lunch", 3, 20.0, &[]),
        ];
        let stats = analyze(100.0, &activities);
        assert_eq!(
            stats.by_day,
            vec![
                DayTotal { date: date(1), total: 10.0 },
                DayTotal { date: date(3), total: 60.0 },
            ]
        );
        assert_eq!(
            stats.most_expensive_day,
            Some(DayTotal { date: date(3), total: 60.0 })
        );
    }

    #[test]
    fn tag_totals_descend_with_untagged_bucket() {
        let activities = vec![
            entry("Kayak", 1, 50.0, &["sport", "water"]),
            entry("Snack", 1, 5.0, &[]),
            entry("Climb", 2, 30.0, &["sport"]),
        ];
        let stats = analyze(100.0, &activities);
        assert_eq!(
            stats.by_tag,
            vec![
                TagTotal { name: "sport".into(), total: 80.0 },
                TagTotal { name: "water".into(), total: 50.0 },
                TagTotal { name: UNTAGGED_LABEL.into(), total: 5.0 },
            ]
        );
    }

    #[test]
    fn most_expensive_tie_breaks_on_latest_date() {
        let activities = vec![
            entry("Early splurge", 1, 90.0, &[]),
            entry("Late splurge", 5, 90.0, &[]),
        ];
        let stats = analyze(200.0, &activities);
        let top = stats.most_expensive_activity.expect("has activities");
        assert_eq!(top.title, "Late splurge");
        assert_eq!(top.date, date(5));
    }

    #[test]
    fn empty_trip_has_no_extremes() {
        let stats = analyze(100.0, &[]);
        assert!(stats.by_day.is_empty());
        assert!(stats.by_tag.is_empty());
        assert_eq!(stats.most_expensive_activity, None);
        assert_eq!(stats.most_expensive_day, None);
    }

    #[test]
    fn packing_completion_rounds_and_handles_empty() {
        assert_eq!(packing_completion(0, 0), None);
        assert_eq!(packing_completion(1, 2), Some(50.0));
        assert_eq!(packing_completion(1, 3), Some(33.3));
        assert_eq!(packing_completion(2, 3), Some(66.7));
    }
}
