//! Console rendering of a quality analysis
//!
//! Renderers return strings so the binary decides where they go.

use crate::analysis::trends::{DailyTrend, TrendAnalysis};
use crate::analysis::QualityAnalysis;
use crate::health::HealthReport;
use crate::review::ConflictReview;
use std::fmt::Write;

/// Days shown by the trend table
pub const TREND_DISPLAY_DAYS: usize = 7;

const RULE: &str = "============================================================";

/// Headline numbers from every section
pub fn render_summary(analysis: &QualityAnalysis) -> String {
    let mut out = String::new();
    let raw = &analysis.raw_data;
    let consensus = &analysis.consensus;
    let conflicts = &analysis.conflicts;
    let coverage = &analysis.coverage;
    let quality = &analysis.quality_metrics;

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "CONSENSUS QUALITY SUMMARY");
    let _ = writeln!(out, "Generated: {}", analysis.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "{}", RULE);

    let _ = writeln!(out, "\nRaw data");
    let _ = writeln!(out, "  Observations:          {}", raw.total_observations);
    let _ = writeln!(out, "  Part numbers:          {}", raw.unique_part_numbers);
    let _ = writeln!(out, "  Recent (30 days):      {}", raw.recent_observations);
    let _ = writeln!(
        out,
        "  Avg per part number:   {:.1} (min {}, max {})",
        raw.distribution.avg_per_part, raw.distribution.min_per_part, raw.distribution.max_per_part
    );
    let signals = &raw.trust_signals;
    for (label, share) in [
        ("Verified sellers", signals.verified_sellers),
        ("Business sellers", signals.business_sellers),
        ("OEM references", signals.oem_references),
        ("Detailed descriptions", signals.detailed_descriptions),
    ] {
        let _ = writeln!(out, "  {:<22} {} ({:.1}%)", format!("{}:", label), share.count, share.percentage);
    }

    let _ = writeln!(out, "\nConsensus");
    let _ = writeln!(out, "  Consensus fitments:    {}", consensus.total_consensus_fitments);
    for share in &consensus.status_distribution {
        let _ = writeln!(
            out,
            "    {:<20} {:>6} ({:.1}%)",
            share.description, share.count, share.percentage
        );
    }
    let _ = writeln!(
        out,
        "  Production ready:      {} ({:.1}%)",
        consensus.production_ready.count, consensus.production_ready.percentage
    );
    let _ = writeln!(
        out,
        "  Support per fitment:   {:.1} avg (min {}, max {})",
        consensus.supporting_observations.avg,
        consensus.supporting_observations.min,
        consensus.supporting_observations.max
    );

    let _ = writeln!(out, "\nConflicts");
    let _ = writeln!(out, "  Total:                 {}", conflicts.total_conflicts);
    let _ = writeln!(out, "  Pending:               {}", conflicts.pending);
    let _ = writeln!(out, "  Resolved:              {}", conflicts.resolved);
    let _ = writeln!(out, "  Dismissed:             {}", conflicts.dismissed);
    let _ = writeln!(out, "  Resolution rate:       {:.1}%", conflicts.resolution_rate);
    if conflicts.pending > 0 {
        for bucket in &conflicts.pending_age_distribution {
            let _ = writeln!(out, "    {:<12} {}", bucket.range, bucket.count);
        }
    }

    let _ = writeln!(out, "\nCoverage");
    let _ = writeln!(out, "  Eligible part numbers: {}", coverage.eligible_part_numbers);
    let _ = writeln!(out, "  Processed:             {}", coverage.processed_part_numbers);
    let _ = writeln!(out, "  Processing rate:       {:.1}%", coverage.processing_rate);
    let _ = writeln!(out, "  Overall coverage:      {:.1}%", coverage.overall_coverage);

    let _ = writeln!(out, "\nQuality");
    let _ = writeln!(out, "  Data efficiency:       {:.1}%", quality.data_efficiency);
    let _ = writeln!(out, "  Average confidence:    {:.1}", quality.average_confidence);
    let _ = writeln!(out, "  High quality (>= 80):  {:.1}%", quality.high_quality_percentage);
    let _ = writeln!(out, "  Avg observation weight: {:.2}", quality.average_observation_weight);

    out
}

/// Confidence histogram, highest bucket first
pub fn render_confidence_breakdown(analysis: &QualityAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nConfidence score distribution");
    for bucket in &analysis.consensus.confidence_distribution {
        let bar = "#".repeat((bucket.percentage / 2.0).round() as usize);
        let _ = writeln!(
            out,
            "  {:>6}: {:>6} ({:>5.1}%) {}",
            bucket.range, bucket.count, bucket.percentage, bar
        );
    }
    out
}

/// Processing coverage of raw part numbers
pub fn render_part_coverage(analysis: &QualityAnalysis) -> String {
    let coverage = &analysis.coverage;
    let mut out = String::new();
    let _ = writeln!(out, "\nPart number coverage (>= {} observations)", analysis.parameters.min_observations);
    let _ = writeln!(out, "  Part numbers seen:     {}", coverage.raw_part_numbers);
    let _ = writeln!(out, "  Eligible:              {}", coverage.eligible_part_numbers);
    let _ = writeln!(out, "  Processed:             {}", coverage.processed_part_numbers);
    let _ = writeln!(out, "  Unprocessed eligible:  {}", coverage.unprocessed_part_numbers);
    let _ = writeln!(out, "  Processing rate:       {:.1}%", coverage.processing_rate);
    let _ = writeln!(out, "  Overall coverage:      {:.1}%", coverage.overall_coverage);
    out
}

/// The last `TREND_DISPLAY_DAYS` days of the window, oldest first
pub fn recent_days(trends: &TrendAnalysis) -> &[DailyTrend] {
    let start = trends.daily.len().saturating_sub(TREND_DISPLAY_DAYS);
    &trends.daily[start..]
}

/// Most recent days of the trend window plus period totals
pub fn render_quality_trends(analysis: &QualityAnalysis) -> String {
    let trends = &analysis.trends;
    let mut out = String::new();
    let _ = writeln!(out, "\nQuality trends (last {} days)", trends.period_days);
    let _ = writeln!(out, "  {:<12} {:>12} {:>12}", "Date", "Observations", "Consensus");

    for day in recent_days(trends) {
        let _ = writeln!(
            out,
            "  {:<12} {:>12} {:>12}",
            day.date, day.observations, day.consensus_updates
        );
    }

    let _ = writeln!(
        out,
        "  Period totals: {} observations, {} consensus updates",
        trends.total_observations_in_period, trends.total_consensus_in_period
    );
    out
}

/// Conflict review: summary tables, then one block per shown record
///
/// Linked observations are listed only when `show_listings` is set.
pub fn render_conflict_review(review: &ConflictReview, show_listings: bool) -> String {
    let mut out = String::new();
    if review.total == 0 {
        let _ = writeln!(out, "No conflicts found matching the criteria");
        return out;
    }

    let _ = writeln!(
        out,
        "Found {} {} conflicts (average age {:.1} days)",
        review.total, review.filter.status, review.average_age_days
    );

    let _ = writeln!(out, "\nTop {} parts with most conflicts:", crate::review::TOP_PARTS);
    for (part_number, count) in &review.top_parts {
        let _ = writeln!(out, "  {}: {} conflicts", part_number, count);
    }

    let _ = writeln!(out, "\nConflict types:");
    for (conflict_type, count) in &review.type_counts {
        let _ = writeln!(out, "  {}: {}", conflict_type.label(), count);
    }

    let shown = review.conflicts.len();
    for (i, detail) in review.conflicts.iter().enumerate() {
        let record = &detail.record;
        let _ = writeln!(out, "\n--- Conflict {}/{} ---", i + 1, shown);
        let _ = writeln!(out, "Part Number: {}", record.part_number);
        let _ = writeln!(out, "Conflict: {}", record.conflict_description);
        let _ = writeln!(
            out,
            "Created: {} ({} days ago)",
            record.created_date.format("%Y-%m-%d %H:%M"),
            detail.age_days
        );
        let _ = writeln!(out, "Status: {}", record.resolution_status);
        let _ = writeln!(out, "Linked observations: {}", detail.listings.len());

        if show_listings {
            for listing in &detail.listings {
                let _ = writeln!(
                    out,
                    "  {} {} {} (Weight: {:.2}, Seller: {})",
                    listing.vehicle_year,
                    listing.vehicle_make,
                    listing.vehicle_model,
                    listing.weight,
                    if listing.business_seller { "Business" } else { "Individual" }
                );
            }
        }
    }
    out
}

/// Health check verdict
pub fn render_health_check(report: &HealthReport) -> String {
    let mut out = String::new();
    if !report.issues.is_empty() {
        let _ = writeln!(out, "CRITICAL ISSUES FOUND:");
        for issue in &report.issues {
            let _ = writeln!(out, "  [x] {}", issue);
        }
    }
    if !report.warnings.is_empty() {
        let _ = writeln!(out, "WARNINGS:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  [!] {}", warning);
        }
    }
    if report.is_clean() {
        let _ = writeln!(out, "System health check passed - no issues found");
    }
    out
}
