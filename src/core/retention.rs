/// Grandfather-father-son retention engine
///
/// Pure classification logic: given the artifacts currently in the
/// destination and the configured keep counts, partition them into a retain
/// set and a purge set. No I/O happens here; the store owns deletion.
///
/// Classification walks the artifacts newest-first with strict precedence
/// monthly > weekly > daily:
/// - an artifact dated the 1st of a month is a monthly candidate;
/// - an artifact dated a Sunday (and not the 1st) is a weekly candidate;
/// - anything not retained as monthly or weekly competes for a daily slot.
///
/// Each calendar month and each ISO week (starting Monday) contributes at
/// most one representative, so re-runs or clock skew producing several
/// qualifying snapshots in one period cannot drain a quota. Walking
/// newest-first guarantees the most recent snapshot within a period wins.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Deserialize;

use super::store::BackupArtifact;

/// Keep counts per retention class. A value of 0 means keep none of that
/// class; its candidates fall through to daily-or-purge evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetentionPolicy {
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl RetentionPolicy {
    pub fn max_retained(&self) -> u32 {
        self.daily + self.weekly + self.monthly
    }
}

/// Partition of the artifact set. `retain` and `purge` together are exactly
/// the input set; both are ordered newest-first.
#[derive(Debug, Clone, Default)]
pub struct RetentionDecision {
    pub retain: Vec<BackupArtifact>,
    pub purge: Vec<BackupArtifact>,
}

/// Classify `artifacts` under `policy`.
///
/// Deterministic and idempotent: classifying the retain set again with the
/// same policy retains all of it. Input order does not matter; ties on the
/// timestamp are broken by filename, descending.
pub fn classify(artifacts: &[BackupArtifact], policy: &RetentionPolicy) -> RetentionDecision {
    let mut sorted: Vec<&BackupArtifact> = artifacts.iter().collect();
    sorted.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.file_name.cmp(&a.file_name))
    });

    let mut daily_kept = 0u32;
    let mut weekly_kept = 0u32;
    let mut monthly_kept = 0u32;
    let mut kept_months: HashSet<(i32, u32)> = HashSet::new();
    let mut kept_weeks: HashSet<NaiveDate> = HashSet::new();

    let mut decision = RetentionDecision::default();

    for artifact in sorted {
        let date = artifact.timestamp.date();
        let is_monthly = date.day() == 1;
        let is_weekly = !is_monthly && date.weekday() == Weekday::Sun;
        let mut keep = false;

        if is_monthly && monthly_kept < policy.monthly {
            let month_key = (date.year(), date.month());
            if !kept_months.contains(&month_key) {
                tracing::debug!("Keeping monthly: {}", artifact.file_name);
                keep = true;
                monthly_kept += 1;
                kept_months.insert(month_key);
            }
        }

        if !keep && is_weekly && weekly_kept < policy.weekly {
            let week_start = week_start(date);
            if !kept_weeks.contains(&week_start) {
                tracing::debug!(
                    "Keeping weekly: {} (week starting {})",
                    artifact.file_name,
                    week_start
                );
                keep = true;
                weekly_kept += 1;
                kept_weeks.insert(week_start);
            }
        }

        if !keep && daily_kept < policy.daily {
            tracing::debug!("Keeping daily: {}", artifact.file_name);
            keep = true;
            daily_kept += 1;
        }

        if keep {
            decision.retain.push(artifact.clone());
        } else {
            decision.purge.push(artifact.clone());
        }
    }

    decision
}

/// Monday of the ISO week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ARTIFACT_PREFIX, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use std::path::PathBuf;

    fn artifact(stamp: &str) -> BackupArtifact {
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).unwrap();
        let file_name = format!("{}{}.tar.gz", ARTIFACT_PREFIX, stamp);
        BackupArtifact {
            path: PathBuf::from("/backups").join(&file_name),
            file_name,
            timestamp,
            encrypted: false,
        }
    }

    fn names(artifacts: &[BackupArtifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.file_name.as_str()).collect()
    }

    fn policy(daily: u32, weekly: u32, monthly: u32) -> RetentionPolicy {
        RetentionPolicy { daily, weekly, monthly }
    }

    #[test]
    fn empty_input_yields_empty_decision() {
        let decision = classify(&[], &policy(7, 4, 6));
        assert!(decision.retain.is_empty());
        assert!(decision.purge.is_empty());
    }

    #[test]
    fn mixed_classes_daily3_weekly2_monthly1() {
        // 2023-01-15 and 2023-01-08 are Sundays; 2023-01-01 is a month start.
        let artifacts = vec![
            artifact("20230115T120000"),
            artifact("20230114T120000"),
            artifact("20230113T120000"),
            artifact("20230112T120000"),
            artifact("20230111T120000"),
            artifact("20230108T120000"),
            artifact("20230101T120000"),
            artifact("20221201T120000"),
            artifact("20221101T120000"),
        ];

        let decision = classify(&artifacts, &policy(3, 2, 1));

        assert_eq!(
            names(&decision.retain),
            vec![
                "vaultwarden-data-20230115T120000.tar.gz", // weekly
                "vaultwarden-data-20230114T120000.tar.gz", // daily
                "vaultwarden-data-20230113T120000.tar.gz", // daily
                "vaultwarden-data-20230112T120000.tar.gz", // daily
                "vaultwarden-data-20230108T120000.tar.gz", // weekly
                "vaultwarden-data-20230101T120000.tar.gz", // monthly
            ]
        );
        assert_eq!(
            names(&decision.purge),
            vec![
                "vaultwarden-data-20230111T120000.tar.gz",
                "vaultwarden-data-20221201T120000.tar.gz",
                "vaultwarden-data-20221101T120000.tar.gz",
            ]
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let artifacts = vec![
            artifact("20230115T120000"),
            artifact("20230114T120000"),
            artifact("20230108T120000"),
            artifact("20230101T120000"),
            artifact("20221225T120000"),
            artifact("20221201T120000"),
        ];
        let p = policy(2, 2, 2);

        let first = classify(&artifacts, &p);
        let again = classify(&first.retain, &p);

        assert!(again.purge.is_empty());
        assert_eq!(names(&again.retain), names(&first.retain));
    }

    #[test]
    fn retain_size_bounded_by_quota_sum() {
        // Forty consecutive days, small quotas.
        let mut artifacts = Vec::new();
        for day in 1..=30 {
            artifacts.push(artifact(&format!("202303{:02}T030000", day)));
        }
        for day in 1..=10 {
            artifacts.push(artifact(&format!("202304{:02}T030000", day)));
        }
        let p = policy(4, 2, 1);

        let decision = classify(&artifacts, &p);

        assert!(decision.retain.len() as u32 <= p.max_retained());
        assert_eq!(decision.retain.len() + decision.purge.len(), artifacts.len());
    }

    #[test]
    fn month_start_on_sunday_is_monthly_only() {
        // 2023-01-01 was a Sunday and the 1st of the month. Monthly
        // precedence must suppress its weekly classification, so the weekly
        // quota stays untouched.
        let artifacts = vec![artifact("20230101T120000")];

        let decision = classify(&artifacts, &policy(0, 0, 1));
        assert_eq!(decision.retain.len(), 1);

        // With only a weekly quota, the same artifact is not a weekly
        // candidate at all and falls through to purge.
        let decision = classify(&artifacts, &policy(0, 1, 0));
        assert!(decision.retain.is_empty());
        assert_eq!(decision.purge.len(), 1);
    }

    #[test]
    fn monthly_keep_does_not_mark_week_as_represented() {
        // 2023-02-01 (a Wednesday) is kept monthly. Sunday 2023-02-05 falls
        // in the same ISO week (Mon 01-30 .. Sun 02-05) and is still kept
        // weekly: monthly keeps record month keys only, never week keys.
        let artifacts = vec![
            artifact("20230205T120000"),
            artifact("20230201T120000"),
        ];

        let decision = classify(&artifacts, &policy(0, 1, 1));

        assert_eq!(
            names(&decision.retain),
            vec![
                "vaultwarden-data-20230205T120000.tar.gz", // weekly
                "vaultwarden-data-20230201T120000.tar.gz", // monthly
            ]
        );
    }

    #[test]
    fn exhausted_monthly_quota_sends_month_start_to_daily_not_weekly() {
        // A second 1st-of-month artifact is a monthly candidate by date, so
        // it never competes for a weekly slot even on a Sunday; with the
        // monthly quota spent it falls through to daily-or-purge.
        let artifacts = vec![
            artifact("20230101T120000"), // Sunday, month start
            artifact("20230101T060000"), // also Sunday, month start
        ];

        let decision = classify(&artifacts, &policy(0, 5, 1));

        assert_eq!(names(&decision.retain), vec!["vaultwarden-data-20230101T120000.tar.gz"]);
        assert_eq!(names(&decision.purge), vec!["vaultwarden-data-20230101T060000.tar.gz"]);
    }

    #[test]
    fn zero_quota_disables_class() {
        // Sundays fall through to daily when the weekly quota is zero.
        let artifacts = vec![
            artifact("20230115T120000"), // Sunday
            artifact("20230114T120000"),
        ];

        let decision = classify(&artifacts, &policy(1, 0, 0));

        assert_eq!(names(&decision.retain), vec!["vaultwarden-data-20230115T120000.tar.gz"]);
        assert_eq!(names(&decision.purge), vec!["vaultwarden-data-20230114T120000.tar.gz"]);
    }

    #[test]
    fn one_representative_per_week() {
        // Two Sundays cannot exist in one ISO week, but two snapshots on the
        // same Sunday can (re-run). Only the newest consumes the weekly slot.
        let artifacts = vec![
            artifact("20230108T230000"),
            artifact("20230108T010000"),
        ];

        let decision = classify(&artifacts, &policy(0, 4, 0));

        assert_eq!(names(&decision.retain), vec!["vaultwarden-data-20230108T230000.tar.gz"]);
        assert_eq!(names(&decision.purge), vec!["vaultwarden-data-20230108T010000.tar.gz"]);
    }

    #[test]
    fn one_representative_per_month() {
        let artifacts = vec![
            artifact("20230201T230000"),
            artifact("20230201T010000"),
            artifact("20230101T120000"),
        ];

        let decision = classify(&artifacts, &policy(0, 0, 6));

        assert_eq!(
            names(&decision.retain),
            vec![
                "vaultwarden-data-20230201T230000.tar.gz",
                "vaultwarden-data-20230101T120000.tar.gz",
            ]
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut artifacts = vec![
            artifact("20230101T120000"),
            artifact("20230115T120000"),
            artifact("20230111T120000"),
            artifact("20230114T120000"),
        ];
        let p = policy(2, 1, 1);

        let forward = classify(&artifacts, &p);
        artifacts.reverse();
        let reversed = classify(&artifacts, &p);

        assert_eq!(names(&forward.retain), names(&reversed.retain));
        assert_eq!(names(&forward.purge), names(&reversed.purge));
    }

    #[test]
    fn week_start_is_monday() {
        // 2023-01-15 is a Sunday; its ISO week starts Monday 2023-01-09.
        let sunday = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2023, 1, 9).unwrap());

        let monday = NaiveDate::from_ymd_opt(2023, 1, 9).unwrap();
        assert_eq!(week_start(monday), monday);
    }
}
