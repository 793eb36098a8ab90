//! Deterministic readiness scoring.
//!
//! `StudentMetrics` carries six raw counts. The score is a fixed-weight sum of
//! three completion ratios:
//!
//! score = 0.2 * videos + 0.2 * notes + 0.6 * assignments
//!
//! Ratios are only computed when all three totals are positive; otherwise the
//! whole score is 0. An optional cap pulls lopsided progress down to 0.5.

use serde::{Deserialize, Deserializer, Serialize};

pub const VIDEO_WEIGHT: f64 = 0.2;
pub const NOTE_WEIGHT: f64 = 0.2;
pub const ASSIGNMENT_WEIGHT: f64 = 0.6;

/// Any weighted partial below this floor makes the total eligible for capping.
pub const CAP_FLOOR: f64 = 0.3;
/// Ceiling applied to capped totals.
pub const CAP_CEILING: f64 = 0.5;

/// Raw progress counts for one student. Keys match the dashboard payload.
/// Absent and `null` fields both read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StudentMetrics {
    #[serde(deserialize_with = "null_as_zero")]
    pub videos_watched: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub total_videos: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub notes_completed: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub total_notes: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub assignments_done: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub total_assignments: f64,
}

fn null_as_zero<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(0.0))
}

impl StudentMetrics {
    /// All three totals must be positive at once; there is no per-component gate.
    pub fn has_all_totals(&self) -> bool {
        self.total_videos > 0.0 && self.total_notes > 0.0 && self.total_assignments > 0.0
    }
}

/// Where a reported score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Llm,
    Primitive,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Llm => "llm",
            ScoreSource::Primitive => "primitive",
        }
    }
}

/// Which optional rules the formula applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScorePolicy {
    pub cap_enabled: bool,
    pub clamp_ratios: bool,
}

/// Intermediate values of one deterministic computation.
/// Extreme inputs (e.g. 1e308 out of 1e-308) overflow the ratio; check
/// [`ScoreBreakdown::is_finite`] before reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub video_score: f64,
    pub note_score: f64,
    pub assignment_score: f64,
    pub uncapped_total: f64,
    pub total: f64,
    pub capped: bool,
    pub label: &'static str,
    pub completion_percentage: i64,
}

impl ScoreBreakdown {
    pub fn is_finite(&self) -> bool {
        self.uncapped_total.is_finite()
    }
}

/// Compute the weighted score. Pure and infallible.
pub fn deterministic_score(metrics: &StudentMetrics, policy: ScorePolicy) -> f64 {
    breakdown(metrics, policy).total
}

/// Same as [`deterministic_score`] but keeps every intermediate value.
pub fn breakdown(metrics: &StudentMetrics, policy: ScorePolicy) -> ScoreBreakdown {
    let (video_score, note_score, assignment_score) = if metrics.has_all_totals() {
        let ratio = |done: f64, total: f64| {
            let r = done / total;
            if policy.clamp_ratios {
                r.clamp(0.0, 1.0)
            } else {
                r
            }
        };
        (
            ratio(metrics.videos_watched, metrics.total_videos) * VIDEO_WEIGHT,
            ratio(metrics.notes_completed, metrics.total_notes) * NOTE_WEIGHT,
            ratio(metrics.assignments_done, metrics.total_assignments) * ASSIGNMENT_WEIGHT,
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    let uncapped_total = video_score + note_score + assignment_score;

    let lopsided =
        video_score < CAP_FLOOR || note_score < CAP_FLOOR || assignment_score < CAP_FLOOR;
    let capped = policy.cap_enabled && lopsided && uncapped_total > CAP_CEILING;
    let total = if capped { CAP_CEILING } else { uncapped_total };

    ScoreBreakdown {
        video_score,
        note_score,
        assignment_score,
        uncapped_total,
        total,
        capped,
        label: readiness_label(total),
        completion_percentage: completion_percentage(total),
    }
}

/// Bands shown on the student dashboard.
pub fn readiness_label(score: f64) -> &'static str {
    if score >= 0.8 {
        "Excellent"
    } else if score >= 0.6 {
        "Good"
    } else if score >= 0.4 {
        "Fair"
    } else {
        "Needs Improvement"
    }
}

pub fn completion_percentage(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP_ON: ScorePolicy = ScorePolicy {
        cap_enabled: true,
        clamp_ratios: false,
    };
    const CAP_OFF: ScorePolicy = ScorePolicy {
        cap_enabled: false,
        clamp_ratios: false,
    };

    fn m(v: f64, tv: f64, n: f64, tn: f64, a: f64, ta: f64) -> StudentMetrics {
        StudentMetrics {
            videos_watched: v,
            total_videos: tv,
            notes_completed: n,
            total_notes: tn,
            assignments_done: a,
            total_assignments: ta,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn any_missing_total_yields_zero() {
        for metrics in [
            m(5.0, 0.0, 5.0, 10.0, 5.0, 10.0),
            m(5.0, 10.0, 5.0, 0.0, 5.0, 10.0),
            m(5.0, 10.0, 5.0, 10.0, 5.0, -1.0),
            StudentMetrics::default(),
        ] {
            for policy in [CAP_ON, CAP_OFF] {
                let b = breakdown(&metrics, policy);
                assert_eq!(b.total, 0.0, "{metrics:?}");
                assert!(!b.capped);
            }
        }
    }

    #[test]
    fn full_completion_is_exactly_one() {
        let metrics = m(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(deterministic_score(&metrics, CAP_OFF), 1.0);
    }

    #[test]
    fn cap_compares_weighted_partials_not_ratios() {
        // Video and note partials top out at 0.2, so the cap fires on any total above 0.5.
        let b = breakdown(&m(1.0, 1.0, 1.0, 1.0, 1.0, 1.0), CAP_ON);
        assert!(b.capped);
        assert_eq!(b.total, CAP_CEILING);
        assert_eq!(b.uncapped_total, 1.0);
    }

    #[test]
    fn half_completion_sits_on_cap_boundary_uncapped() {
        let b = breakdown(&m(5.0, 10.0, 5.0, 10.0, 5.0, 10.0), CAP_ON);
        assert!(approx(b.video_score, 0.1));
        assert!(approx(b.note_score, 0.1));
        assert!(approx(b.assignment_score, 0.3));
        assert!(approx(b.total, 0.5));
        assert!(!b.capped);
    }

    #[test]
    fn lopsided_progress_is_capped_only_when_enabled() {
        let metrics = m(0.0, 10.0, 10.0, 10.0, 10.0, 10.0);

        let on = breakdown(&metrics, CAP_ON);
        assert!(on.capped);
        assert_eq!(on.total, CAP_CEILING);
        assert!(approx(on.uncapped_total, 0.8));

        let off = breakdown(&metrics, CAP_OFF);
        assert!(!off.capped);
        assert!(approx(off.total, 0.8));
    }

    #[test]
    fn over_completion_passes_through_unless_clamped() {
        let metrics = m(20.0, 10.0, 10.0, 10.0, 10.0, 10.0);
        assert!(approx(deterministic_score(&metrics, CAP_OFF), 1.2));

        let clamped = ScorePolicy {
            cap_enabled: false,
            clamp_ratios: true,
        };
        assert!(approx(deterministic_score(&metrics, clamped), 1.0));
    }

    #[test]
    fn overflowing_ratio_is_flagged_non_finite() {
        let b = breakdown(&m(1e308, 1e-308, 1.0, 1.0, 1.0, 1.0), CAP_OFF);
        assert!(!b.is_finite());
        assert!(breakdown(&m(1.0, 1.0, 1.0, 1.0, 1.0, 1.0), CAP_OFF).is_finite());
    }

    #[test]
    fn null_fields_read_as_zero() {
        let parsed: StudentMetrics = serde_json::from_str(
            r#"{"VideosWatched": null, "TotalVideos": 4, "TotalNotes": null}"#,
        )
        .unwrap();
        assert_eq!(parsed.videos_watched, 0.0);
        assert_eq!(parsed.total_videos, 4.0);
        assert_eq!(parsed.total_notes, 0.0);
        assert!(serde_json::from_str::<StudentMetrics>(r#"{"TotalNotes": "4"}"#).is_err());
    }

    #[test]
    fn labels_follow_dashboard_bands() {
        assert_eq!(readiness_label(0.95), "Excellent");
        assert_eq!(readiness_label(0.8), "Excellent");
        assert_eq!(readiness_label(0.6), "Good");
        assert_eq!(readiness_label(0.45), "Fair");
        assert_eq!(readiness_label(0.1), "Needs Improvement");
        assert_eq!(completion_percentage(0.505), 51);
    }

    #[test]
    fn metrics_json_uses_pascal_case_and_defaults() {
        let parsed: StudentMetrics =
            serde_json::from_str(r#"{"VideosWatched": 3, "TotalAssignments": 4.5}"#).unwrap();
        assert_eq!(parsed.videos_watched, 3.0);
        assert_eq!(parsed.total_assignments, 4.5);
        assert_eq!(parsed.total_videos, 0.0);

        let original = m(1.25, 7.0, 0.1, 3.3, 1e-3, 123_456.789);
        let json = serde_json::to_string(&original).unwrap();
        let back: StudentMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
