//! Integration tests for conflict review and the health check

mod helpers;

use chrono::Duration;
use fitcon_common::time::{self, format_timestamp};
use fitcon_common::{NewObservation, ResolutionStatus};
use fitcon_engine::consensus::WeightPolicy;
use fitcon_qa::{report, review_conflicts, run_health_check, ConflictFilter, ConflictType};
use helpers::{create_test_db, mixed_catalog, process, readonly, seed};
use sqlx::SqlitePool;

/// mixed_catalog plus YEAR-1, a 2000 and a 2015 TL
async fn catalog_with_two_conflicts(pool: &SqlitePool) {
    let mut catalog = mixed_catalog();
    catalog.push(NewObservation::new("YEAR-1", 2000, "Acura", "TL"));
    catalog.push(NewObservation::new("YEAR-1", 2015, "Acura", "TL"));
    seed(pool, &catalog).await;
    process(pool).await;
}

async fn backdate_conflicts(pool: &SqlitePool, part_number: &str, days: i64) {
    sqlx::query("UPDATE conflicting_fitments SET created_date = ? WHERE part_number = ?")
        .bind(format_timestamp(&(time::now() - Duration::days(days))))
        .bind(part_number)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_review_lists_pending_conflicts_with_listings() {
    let (dir, pool) = create_test_db().await;
    catalog_with_two_conflicts(&pool).await;
    let ro = readonly(&dir).await;

    let review = review_conflicts(
        &ro,
        &ConflictFilter::default(),
        &WeightPolicy::default(),
        time::now(),
    )
    .await
    .unwrap();

    assert_eq!(review.total, 2);
    assert_eq!(review.conflicts.len(), 2);
    assert_eq!(
        review.type_counts,
        vec![(ConflictType::YearRange, 1), (ConflictType::CrossManufacturer, 1)]
    );
    assert_eq!(
        review.top_parts,
        vec![("XMAKE-1".to_string(), 1), ("YEAR-1".to_string(), 1)]
    );
    assert_eq!(review.average_age_days, 0.0);

    let xmake = review
        .conflicts
        .iter()
        .find(|c| c.record.part_number == "XMAKE-1")
        .unwrap();
    assert_eq!(xmake.conflict_type, ConflictType::CrossManufacturer);
    assert_eq!(xmake.listings.len(), 2);
    assert!(xmake.listings.iter().all(|l| l.weight == 1.0 && !l.business_seller));
    let mut makes: Vec<&str> = xmake.listings.iter().map(|l| l.vehicle_make.as_str()).collect();
    makes.sort();
    assert_eq!(makes, vec!["Acura", "Honda"]);
}

#[tokio::test]
async fn test_review_filters_by_part_status_and_limit() {
    let (dir, pool) = create_test_db().await;
    catalog_with_two_conflicts(&pool).await;
    let ro = readonly(&dir).await;
    let weights = WeightPolicy::default();
    let now = time::now();

    let filter = ConflictFilter {
        part_number: Some("YEAR-1".to_string()),
        ..ConflictFilter::default()
    };
    let review = review_conflicts(&ro, &filter, &weights, now).await.unwrap();
    assert_eq!(review.total, 1);
    assert_eq!(review.conflicts[0].conflict_type, ConflictType::YearRange);
    let years: Vec<i64> = review.conflicts[0]
        .listings
        .iter()
        .map(|l| l.vehicle_year)
        .collect();
    assert_eq!(years, vec![2000, 2015]);

    let filter = ConflictFilter {
        status: ResolutionStatus::Resolved,
        ..ConflictFilter::default()
    };
    let review = review_conflicts(&ro, &filter, &weights, now).await.unwrap();
    assert_eq!(review.total, 0);
    assert!(review.top_parts.is_empty());
    assert!(review.type_counts.is_empty());

    let filter = ConflictFilter {
        limit: 1,
        ..ConflictFilter::default()
    };
    let review = review_conflicts(&ro, &filter, &weights, now).await.unwrap();
    assert_eq!(review.total, 2);
    assert_eq!(review.conflicts.len(), 1);
}

#[tokio::test]
async fn test_review_age_filter_keeps_only_old_conflicts() {
    let (dir, pool) = create_test_db().await;
    catalog_with_two_conflicts(&pool).await;
    backdate_conflicts(&pool, "YEAR-1", 40).await;
    let ro = readonly(&dir).await;
    let weights = WeightPolicy::default();
    let now = time::now();

    let all = review_conflicts(&ro, &ConflictFilter::default(), &weights, now)
        .await
        .unwrap();
    // Newest first
    assert_eq!(all.conflicts[0].record.part_number, "XMAKE-1");
    assert_eq!(all.conflicts[1].age_days, 40);
    assert_eq!(all.average_age_days, 20.0);

    let filter = ConflictFilter {
        min_age_days: Some(30),
        ..ConflictFilter::default()
    };
    let old = review_conflicts(&ro, &filter, &weights, now).await.unwrap();
    assert_eq!(old.total, 1);
    assert_eq!(old.conflicts[0].record.part_number, "YEAR-1");

    let filter = ConflictFilter {
        min_age_days: Some(-1),
        ..ConflictFilter::default()
    };
    assert!(review_conflicts(&ro, &filter, &weights, now).await.is_err());
}

#[tokio::test]
async fn test_conflict_review_renders() {
    let (dir, pool) = create_test_db().await;
    catalog_with_two_conflicts(&pool).await;
    let ro = readonly(&dir).await;

    let review = review_conflicts(
        &ro,
        &ConflictFilter::default(),
        &WeightPolicy::default(),
        time::now(),
    )
    .await
    .unwrap();

    let text = report::render_conflict_review(&review, true);
    assert!(text.contains("Found 2 PENDING conflicts"));
    assert!(text.contains("Year Range: 1"));
    assert!(text.contains("Cross-Manufacturer: 1"));
    assert!(text.contains("--- Conflict 1/2 ---"));
    assert!(text.contains("Seller: Individual"));

    let brief = report::render_conflict_review(&review, false);
    assert!(!brief.contains("Seller:"));

    let json = serde_json::to_value(&review).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["filter"]["status"], "PENDING");

    let empty = review_conflicts(
        &ro,
        &ConflictFilter {
            status: ResolutionStatus::Dismissed,
            ..ConflictFilter::default()
        },
        &WeightPolicy::default(),
        time::now(),
    )
    .await
    .unwrap();
    assert_eq!(
        report::render_conflict_review(&empty, false).trim(),
        "No conflicts found matching the criteria"
    );
}

#[tokio::test]
async fn test_health_check_of_empty_database() {
    let (dir, _pool) = create_test_db().await;
    let ro = readonly(&dir).await;

    let health = run_health_check(&ro, time::now()).await.unwrap();
    assert!(!health.passed());
    assert_eq!(
        health.issues,
        vec![
            "No observations found".to_string(),
            "No recent observations (last 7 days)".to_string(),
        ]
    );
    assert!(health.warnings.is_empty());
    assert!(report::render_health_check(&health).contains("CRITICAL ISSUES FOUND:"));
}

#[tokio::test]
async fn test_health_check_of_small_processed_catalog() {
    let (dir, pool) = create_test_db().await;
    seed(&pool, &mixed_catalog()).await;
    process(&pool).await;
    let ro = readonly(&dir).await;

    let health = run_health_check(&ro, time::now()).await.unwrap();
    assert_eq!(health.metrics.observations, 6);
    assert_eq!(health.metrics.consensus_fitments, 4);
    assert_eq!(health.metrics.processing_rate, 66.7);
    assert_eq!(health.metrics.low_confidence_rate, 75.0);
    assert_eq!(health.issues, vec!["High low-confidence rate: 75.0%".to_string()]);
    assert_eq!(
        health.warnings,
        vec![
            "Low observation count: 6".to_string(),
            "Low recent data: 6 observations in last 7 days".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_health_check_counts_old_pending_conflicts() {
    let (dir, pool) = create_test_db().await;
    seed(&pool, &mixed_catalog()).await;
    let old = format_timestamp(&(time::now() - Duration::days(45)));
    for i in 0..51 {
        sqlx::query(
            r#"
            INSERT INTO conflicting_fitments
                (part_number, conflict_description, resolution_status, created_date)
            VALUES (?, 'Cross-manufacturer fitment: Acura, Honda', 'PENDING', ?)
            "#,
        )
        .bind(format!("OLD-{}", i))
        .bind(&old)
        .execute(&pool)
        .await
        .unwrap();
    }
    // Resolved records never count
    sqlx::query(
        r#"
        INSERT INTO conflicting_fitments
            (part_number, conflict_description, resolution_status, created_date)
        VALUES ('DONE-1', 'Multiple models: A, B, C, D', 'RESOLVED', ?)
        "#,
    )
    .bind(&old)
    .execute(&pool)
    .await
    .unwrap();
    let ro = readonly(&dir).await;

    let health = run_health_check(&ro, time::now()).await.unwrap();
    assert_eq!(health.metrics.old_pending_conflicts, 51);
    assert!(health.warnings.contains(&"Many old conflicts: 51".to_string()));
}
