//! Usage statistics derived from the call history

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::storage::ApiCallLogEntry;

/// Number of active days shown in the daily chart
pub const RECENT_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

impl DailyCount {
    /// `Mon Oct 19 2026`
    pub fn label(&self) -> String {
        self.date.format("%a %b %d %Y").to_string()
    }
}

/// Dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub success_rate: String,
    /// First-seen order
    pub scraper_stats: Vec<UsageCount>,
    /// Date order
    pub daily_stats: Vec<DailyCount>,
    /// Date order, labelled `October 2026`
    pub monthly_stats: Vec<UsageCount>,
    pub recent_days: Vec<DailyCount>,
    pub most_used_scraper: Option<String>,
    pub peak_day: Option<DailyCount>,
    pub average_calls_per_day: u64,
}

impl AnalyticsReport {
    /// Compute statistics; days and months are taken in UTC
    pub fn from_history(entries: &[ApiCallLogEntry]) -> Self {
        let total_calls = entries.len();
        let successful_calls = entries.iter().filter(|e| e.success).count();
        let failed_calls = total_calls - successful_calls;

        let scraper_stats = count_in_first_seen_order(entries.iter().map(|e| e.scraper.clone()));

        let day_order = count_in_first_seen_order(entries.iter().map(|e| e.timestamp.date_naive()));
        let mut monthly: BTreeMap<(i32, u32), usize> = BTreeMap::new();
        for entry in entries {
            let date = entry.timestamp.date_naive();
            *monthly.entry((date.year(), date.month())).or_insert(0) += 1;
        }

        let peak_day = first_max(&day_order).map(|(date, count)| DailyCount { date, count });
        let most_used_scraper = first_max(&scraper_stats).map(|(label, _)| label);

        let mut daily_stats: Vec<DailyCount> = day_order
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect();
        daily_stats.sort_by_key(|d| d.date);

        let recent_days = daily_stats[daily_stats.len().saturating_sub(RECENT_DAYS)..].to_vec();

        let average_calls_per_day = if daily_stats.is_empty() {
            0
        } else {
            (total_calls as f64 / daily_stats.len() as f64).round() as u64
        };

        let monthly_stats = monthly
            .into_iter()
            .filter_map(|((year, month), count)| {
                NaiveDate::from_ymd_opt(year, month, 1).map(|first| UsageCount {
                    label: first.format("%B %Y").to_string(),
                    count,
                })
            })
            .collect();

        Self {
            total_calls,
            successful_calls,
            failed_calls,
            success_rate: success_rate(successful_calls, total_calls),
            scraper_stats: scraper_stats
                .into_iter()
                .map(|(label, count)| UsageCount { label, count })
                .collect(),
            daily_stats,
            monthly_stats,
            recent_days,
            most_used_scraper,
            peak_day,
            average_calls_per_day,
        }
    }
}

/// Percentage with one decimal, `"0%"` when there were no calls
pub fn success_rate(successful: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", successful as f64 / total as f64 * 100.0)
}

fn count_in_first_seen_order<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();

    for key in keys {
        match positions.get(&key) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    counts
}

/// Highest count; ties go to the earliest entry
fn first_max<K: Clone>(counts: &[(K, usize)]) -> Option<(K, usize)> {
    let mut best: Option<&(K, usize)> = None;
    for candidate in counts {
        if best.map(|b| candidate.1 > b.1).unwrap_or(true) {
            best = Some(candidate);
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn call(scraper: &str, success: bool, y: i32, m: u32, d: u32, h: u32) -> ApiCallLogEntry {
        let entry = if success {
            ApiCallLogEntry::success(scraper, Map::new())
        } else {
            ApiCallLogEntry::failure(scraper, Map::new(), "boom")
        };
        entry.at(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_empty_history() {
        let report = AnalyticsReport::from_history(&[]);
        assert_eq!(report.total_calls, 0);
        assert_eq!(report.success_rate, "0%");
        assert!(report.most_used_scraper.is_none());
        assert!(report.peak_day.is_none());
        assert_eq!(report.average_calls_per_day, 0);
    }

    #[test]
    fn test_counts_and_rates() {
        let entries = vec![
            call("amazon", true, 2026, 9, 30, 23),
            call("flipkart", false, 2026, 10, 1, 0),
            call("amazon", true, 2026, 10, 1, 12),
        ];
        let report = AnalyticsReport::from_history(&entries);

        assert_eq!(report.total_calls, 3);
        assert_eq!(report.successful_calls, 2);
        assert_eq!(report.failed_calls, 1);
        assert_eq!(report.success_rate, "66.7%");
        assert_eq!(report.most_used_scraper.as_deref(), Some("amazon"));
        assert_eq!(
            report.monthly_stats,
            vec![
                UsageCount { label: "September 2026".into(), count: 1 },
                UsageCount { label: "October 2026".into(), count: 2 },
            ]
        );

        let peak = report.peak_day.unwrap();
        assert_eq!(peak.date, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(peak.count, 2);
        assert_eq!(peak.label(), "Thu Oct 01 2026");
        assert_eq!(report.average_calls_per_day, 2);
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let entries = vec![
            call("wikipedia", true, 2026, 10, 5, 1),
            call("amazon", true, 2026, 10, 3, 1),
        ];
        let report = AnalyticsReport::from_history(&entries);

        assert_eq!(report.most_used_scraper.as_deref(), Some("wikipedia"));
        assert_eq!(
            report.peak_day.unwrap().date,
            NaiveDate::from_ymd_opt(2026, 10, 5).unwrap()
        );
        // daily stats are still in date order
        assert_eq!(report.daily_stats[0].date.day(), 3);
    }

    #[test]
    fn test_recent_days_keeps_last_seven_active_days() {
        let entries: Vec<_> = (1..=10).rev().map(|d| call("amazon", true, 2026, 10, d, 8)).collect();
        let report = AnalyticsReport::from_history(&entries);

        assert_eq!(report.daily_stats.len(), 10);
        let days: Vec<u32> = report.recent_days.iter().map(|d| d.date.day()).collect();
        assert_eq!(days, vec![4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_report_serialises() {
        let report = AnalyticsReport::from_history(&[call("amazon", true, 2026, 10, 19, 9)]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["totalCalls"], serde_json::json!(1));
        assert_eq!(value["successRate"], serde_json::json!("100.0%"));
        assert_eq!(value["dailyStats"][0]["date"], serde_json::json!("2026-10-19"));
    }
}
