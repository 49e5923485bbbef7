//! Integration tests for single part number reconciliation
//!
//! Each test runs against a throwaway SQLite file with the full schema.

mod helpers;

use fitcon_common::{FitmentSignature, FitmentStatus, ResolutionStatus};
use fitcon_engine::consensus::WeightPolicy;
use fitcon_engine::db::{conflicts, consensus, observations};
use fitcon_engine::{ConsensusProcessor, ProcessorConfig, SignatureMode, SkipReason};
use helpers::{abc_123, count_rows, create_test_db, listing, processor, seed};

#[tokio::test]
async fn test_abc_123_scenario() {
    let (_dir, pool) = create_test_db().await;
    let ids = seed(&pool, &abc_123()).await;

    let summary = processor(&pool).process_part_number("ABC-123", 2).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.total_groups, 2);
    assert_eq!(summary.total_observations, 3);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.skip_reason, None);

    let records = consensus::consensus_for_part(&pool, "ABC-123").await.unwrap();
    assert_eq!(records.len(), 2);

    let tl_2010 = &records[0];
    assert_eq!(
        tl_2010.signature,
        FitmentSignature::new(2010, "Acura", "TL", "Base", "3.5L V6")
    );
    assert_eq!(tl_2010.supporting_observations_count, 2);
    // (1 + 1 + 1) + (1 + 0.5)
    assert_eq!(tl_2010.total_weight_score, 4.5);
    // 20 + 40 + 15
    assert_eq!(tl_2010.confidence_score, 75.0);
    assert_eq!(tl_2010.status, FitmentStatus::MediumConfidence);
    assert_eq!(
        consensus::supporting_observation_ids(&pool, tl_2010.id).await.unwrap(),
        vec![ids[0], ids[1]]
    );

    let tl_2011 = &records[1];
    assert_eq!(tl_2011.signature.year, 2011);
    assert_eq!(tl_2011.supporting_observations_count, 1);
    assert_eq!(tl_2011.confidence_score, 30.0);
    assert_eq!(tl_2011.status, FitmentStatus::NeedsReview);

    assert_eq!(count_rows(&pool, "conflicting_fitments").await, 0);
}

#[tokio::test]
async fn test_single_observation_is_skipped() {
    let (_dir, pool) = create_test_db().await;
    seed(&pool, &[listing("LONE-1", 2010, "Acura", "TL")]).await;

    let summary = processor(&pool).process_part_number("LONE-1", 2).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.skip_reason, Some(SkipReason::InsufficientData));
    assert_eq!(summary.total_observations, 1);
    assert_eq!(count_rows(&pool, "consensus_fitments").await, 0);
}

#[tokio::test]
async fn test_unknown_part_number_is_skipped() {
    let (_dir, pool) = create_test_db().await;

    let summary = processor(&pool).process_part_number("NOPE", 1).await.unwrap();

    assert!(summary.is_skipped());
    assert_eq!(summary.total_observations, 0);
}

#[tokio::test]
async fn test_zero_min_observations_is_rejected() {
    let (_dir, pool) = create_test_db().await;
    assert!(processor(&pool).process_part_number("ABC-123", 0).await.is_err());
}

#[tokio::test]
async fn test_wide_year_span_creates_conflict() {
    let (_dir, pool) = create_test_db().await;
    let ids = seed(
        &pool,
        &[
            listing("SPAN-1", 2000, "Acura", "TL"),
            listing("SPAN-1", 2015, "Acura", "TL"),
        ],
    )
    .await;

    let summary = processor(&pool).process_part_number("SPAN-1", 2).await.unwrap();
    assert_eq!(summary.conflicts, 1);
    assert_eq!(summary.conflict_messages, 1);

    let records = conflicts::conflicts_for_part(&pool, "SPAN-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].conflict_description,
        "Suspicious year range: 2000-2015 (span: 15 years)"
    );
    assert_eq!(records[0].resolution_status, ResolutionStatus::Pending);
    assert_eq!(
        conflicts::conflict_observation_ids(&pool, records[0].id).await.unwrap(),
        ids
    );
}

#[tokio::test]
async fn test_generation_year_span_is_not_a_conflict() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("SPAN-2", 2005, "Acura", "TL"),
            listing("SPAN-2", 2010, "Acura", "TL"),
        ],
    )
    .await;

    let summary = processor(&pool).process_part_number("SPAN-2", 2).await.unwrap();

    assert_eq!(summary.conflicts, 0);
    assert_eq!(count_rows(&pool, "conflicting_fitments").await, 0);
}

#[tokio::test]
async fn test_cross_manufacturer_creates_conflict() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("XMAKE-1", 2008, "Honda", "Accord"),
            listing("XMAKE-1", 2008, "Acura", "TSX"),
        ],
    )
    .await;

    processor(&pool).process_part_number("XMAKE-1", 2).await.unwrap();

    let records = conflicts::conflicts_for_part(&pool, "XMAKE-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].conflict_description,
        "Cross-manufacturer fitment: Acura, Honda"
    );
}

#[tokio::test]
async fn test_single_make_is_not_a_conflict() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("ONEMAKE-1", 2008, "Acura", "TSX"),
            listing("ONEMAKE-1", 2009, "Acura", "TSX"),
            listing("ONEMAKE-1", 2009, "Acura", "TL"),
        ],
    )
    .await;

    processor(&pool).process_part_number("ONEMAKE-1", 2).await.unwrap();

    assert!(conflicts::conflicts_for_part(&pool, "ONEMAKE-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_conflict_links_every_observation_of_the_part() {
    let (_dir, pool) = create_test_db().await;
    let ids = seed(
        &pool,
        &[
            listing("LINK-1", 2008, "Acura", "TSX"),
            listing("LINK-1", 2008, "Acura", "TSX"),
            listing("LINK-1", 2008, "Honda", "Accord"),
        ],
    )
    .await;

    processor(&pool).process_part_number("LINK-1", 2).await.unwrap();

    let records = conflicts::conflicts_for_part(&pool, "LINK-1").await.unwrap();
    let linked = conflicts::conflict_observation_ids(&pool, records[0].id)
        .await
        .unwrap();
    assert_eq!(linked, ids);
}

#[tokio::test]
async fn test_total_weight_is_additive() {
    let (_dir, pool) = create_test_db().await;
    let a = listing("ADD-1", 2012, "Ford", "Focus").verified_seller(true);
    let b = listing("ADD-1", 2012, "Ford", "Focus").detailed_description(true);
    seed(&pool, &[a, b]).await;

    processor(&pool).process_part_number("ADD-1", 2).await.unwrap();

    let policy = WeightPolicy::default();
    let loaded = observations::load_for_part(&pool, "ADD-1").await.unwrap();
    let expected = policy.weight(&loaded[0]) + policy.weight(&loaded[1]);

    let records = consensus::consensus_for_part(&pool, "ADD-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total_weight_score, expected);
    assert_eq!(records[0].supporting_observations_count, 2);
}

#[tokio::test]
async fn test_reprocessing_is_idempotent() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("IDEM-1", 2000, "Honda", "Civic"),
            listing("IDEM-1", 2000, "Honda", "Civic").oem_reference(true),
            listing("IDEM-1", 2014, "Acura", "ILX"),
        ],
    )
    .await;
    let engine = processor(&pool);

    let first = engine.process_part_number("IDEM-1", 2).await.unwrap();
    let before = consensus::consensus_for_part(&pool, "IDEM-1").await.unwrap();

    let second = engine.process_part_number("IDEM-1", 2).await.unwrap();
    let after = consensus::consensus_for_part(&pool, "IDEM-1").await.unwrap();

    assert_eq!(first.conflicts, 1);
    assert_eq!(second.conflicts, 0);
    assert_eq!(second.conflict_messages, first.conflict_messages);
    assert_eq!(second.processed, first.processed);
    assert_eq!(second.created, 0);

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.id, a.id);
        assert_eq!(b.signature, a.signature);
        assert_eq!(b.confidence_score, a.confidence_score);
        assert_eq!(b.supporting_observations_count, a.supporting_observations_count);
        assert_eq!(b.total_weight_score, a.total_weight_score);
        assert_eq!(b.status, a.status);
    }

    assert_eq!(count_rows(&pool, "conflicting_fitments").await, 1);
    assert_eq!(count_rows(&pool, "conflict_observations").await, 3);
}

#[tokio::test]
async fn test_support_set_is_replaced_not_merged() {
    let (_dir, pool) = create_test_db().await;
    let ids = seed(
        &pool,
        &[
            listing("SUP-1", 2010, "Acura", "TL"),
            listing("SUP-1", 2010, "Acura", "TL"),
            listing("OTHER", 2010, "Acura", "TL"),
        ],
    )
    .await;
    let engine = processor(&pool);
    engine.process_part_number("SUP-1", 2).await.unwrap();
    let record = &consensus::consensus_for_part(&pool, "SUP-1").await.unwrap()[0];

    // Stale link that is not a member of the group
    sqlx::query("INSERT INTO consensus_support (consensus_id, observation_id) VALUES (?, ?)")
        .bind(record.id)
        .bind(ids[2])
        .execute(&pool)
        .await
        .unwrap();

    engine.process_part_number("SUP-1", 2).await.unwrap();

    assert_eq!(
        consensus::supporting_observation_ids(&pool, record.id).await.unwrap(),
        vec![ids[0], ids[1]]
    );
}

#[tokio::test]
async fn test_new_observation_refreshes_existing_record() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("GROW-1", 2010, "Acura", "TL"),
            listing("GROW-1", 2010, "Acura", "TL"),
        ],
    )
    .await;
    let engine = processor(&pool);
    engine.process_part_number("GROW-1", 2).await.unwrap();

    seed(&pool, &[listing("GROW-1", 2010, "Acura", "TL").verified_seller(true)]).await;
    let summary = engine.process_part_number("GROW-1", 2).await.unwrap();

    assert_eq!(summary.created, 0);
    let records = consensus::consensus_for_part(&pool, "GROW-1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].supporting_observations_count, 3);
    assert_eq!(records[0].total_weight_score, 4.0);
    // 20 + 40 + 30
    assert_eq!(records[0].confidence_score, 90.0);
    assert_eq!(records[0].status, FitmentStatus::HighConfidence);
    assert_eq!(count_rows(&pool, "consensus_support").await, 3);
}

#[tokio::test]
async fn test_recompute_overwrites_manual_status() {
    let (_dir, pool) = create_test_db().await;
    seed(&pool, &abc_123()).await;
    let engine = processor(&pool);
    engine.process_part_number("ABC-123", 2).await.unwrap();

    sqlx::query("UPDATE consensus_fitments SET status = 'VERIFIED'")
        .execute(&pool)
        .await
        .unwrap();
    engine.process_part_number("ABC-123", 2).await.unwrap();

    let verified = consensus::consensus_by_status(&pool, FitmentStatus::Verified)
        .await
        .unwrap();
    assert!(verified.is_empty());
}

#[tokio::test]
async fn test_stored_status_always_matches_score() {
    let (_dir, pool) = create_test_db().await;
    seed(&pool, &abc_123()).await;
    seed(
        &pool,
        &[
            listing("MIX-1", 2015, "Mazda", "3").verified_seller(true).oem_reference(true),
            listing("MIX-1", 2015, "Mazda", "3").oem_reference(true),
            listing("MIX-1", 2015, "Mazda", "3"),
            listing("MIX-1", 2016, "Mazda", "3").detailed_description(true),
        ],
    )
    .await;
    let engine = processor(&pool);
    engine.process_part_number("ABC-123", 2).await.unwrap();
    engine.process_part_number("MIX-1", 2).await.unwrap();

    for part_number in ["ABC-123", "MIX-1"] {
        for record in consensus::consensus_for_part(&pool, part_number).await.unwrap() {
            assert!((0.0..=100.0).contains(&record.confidence_score));
            assert_eq!(
                record.status,
                fitcon_engine::consensus::status_for(record.confidence_score)
            );
        }
    }
}

#[tokio::test]
async fn test_malformed_observation_fails_the_part() {
    let (_dir, pool) = create_test_db().await;
    sqlx::query(
        r#"
        INSERT INTO observations (part_number, vehicle_year, vehicle_make, vehicle_model, extraction_date)
        VALUES ('BAD-1', 2010, '', 'TL', '2024-01-01T00:00:00.000000Z'),
               ('BAD-1', 2010, 'Acura', 'TL', '2024-01-01T00:00:00.000000Z')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = processor(&pool).process_part_number("BAD-1", 2).await.unwrap_err();

    assert!(err.to_string().contains("vehicle_make"));
    assert!(!err.is_fatal());
    assert_eq!(count_rows(&pool, "consensus_fitments").await, 0);
}

#[tokio::test]
async fn test_exact_mode_keeps_case_variants_apart() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("CASE-1", 2010, "Acura", "TL"),
            listing("CASE-1", 2010, "ACURA", "TL"),
        ],
    )
    .await;

    let summary = processor(&pool).process_part_number("CASE-1", 2).await.unwrap();

    assert_eq!(summary.total_groups, 2);
    // "ACURA" and "Acura" are distinct makes to the exact matcher
    assert_eq!(summary.conflicts, 1);
}

#[tokio::test]
async fn test_normalized_mode_merges_case_variants() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("CASE-2", 2010, "Acura", "TL"),
            listing("CASE-2", 2010, "ACURA", " TL "),
        ],
    )
    .await;
    let engine = ConsensusProcessor::new(
        pool.clone(),
        ProcessorConfig {
            signature_mode: SignatureMode::Normalized,
            ..ProcessorConfig::default()
        },
    );

    let summary = engine.process_part_number("CASE-2", 2).await.unwrap();

    assert_eq!(summary.total_groups, 1);
    assert_eq!(summary.conflicts, 0);
    let records = consensus::consensus_for_part(&pool, "CASE-2").await.unwrap();
    assert_eq!(records[0].signature.make, "ACURA");
    assert_eq!(records[0].signature.model, "TL");
    assert_eq!(records[0].supporting_observations_count, 2);
}

fn normalized_processor(pool: &sqlx::SqlitePool) -> ConsensusProcessor {
    ConsensusProcessor::new(
        pool.clone(),
        ProcessorConfig {
            signature_mode: SignatureMode::Normalized,
            ..ProcessorConfig::default()
        },
    )
}

#[tokio::test]
async fn test_normalized_record_keeps_spelling_when_new_variant_arrives() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("CASE-3", 2010, "acura", "TL"),
            listing("CASE-3", 2010, "acura", "TL"),
        ],
    )
    .await;
    let engine = normalized_processor(&pool);
    engine.process_part_number("CASE-3", 2).await.unwrap();

    // "Acura" sorts before "acura" but must not fork the record
    seed(&pool, &[listing("CASE-3", 2010, "Acura", "TL")]).await;
    let summary = engine.process_part_number("CASE-3", 2).await.unwrap();

    assert_eq!(summary.created, 0);
    let records = consensus::consensus_for_part(&pool, "CASE-3").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].signature.make, "acura");
    assert_eq!(records[0].supporting_observations_count, 3);
    assert_eq!(count_rows(&pool, "consensus_support").await, 3);
}

#[tokio::test]
async fn test_normalized_run_retires_duplicate_spellings() {
    let (_dir, pool) = create_test_db().await;
    seed(
        &pool,
        &[
            listing("CASE-4", 2010, "Acura", "TL"),
            listing("CASE-4", 2010, "ACURA", "TL"),
        ],
    )
    .await;
    processor(&pool).process_part_number("CASE-4", 2).await.unwrap();
    assert_eq!(count_rows(&pool, "consensus_fitments").await, 2);

    normalized_processor(&pool)
        .process_part_number("CASE-4", 2)
        .await
        .unwrap();

    let records = consensus::consensus_for_part(&pool, "CASE-4").await.unwrap();
    assert_eq!(records.len(), 1);
    // Exact grouping wrote "ACURA" first; the oldest record survives
    assert_eq!(records[0].signature.make, "ACURA");
    assert_eq!(records[0].supporting_observations_count, 2);
    assert_eq!(count_rows(&pool, "consensus_support").await, 2);
}

#[tokio::test]
async fn test_concurrent_runs_on_same_part_do_not_duplicate() {
    let (_dir, pool) = create_test_db().await;
    seed(&pool, &abc_123()).await;
    seed(
        &pool,
        &[
            listing("ABC-123", 1999, "Honda", "Civic"),
            listing("ABC-123", 2012, "Honda", "Civic"),
        ],
    )
    .await;

    let a = processor(&pool);
    let b = processor(&pool);
    let (ra, rb) = tokio::join!(
        a.process_part_number("ABC-123", 2),
        b.process_part_number("ABC-123", 2)
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(count_rows(&pool, "consensus_fitments").await, 4);
    assert_eq!(count_rows(&pool, "conflicting_fitments").await, 1);
    assert_eq!(count_rows(&pool, "consensus_support").await, 5);
}
