//! Signature grouping
//!
//! Partitions one part number's observations into buckets that share a
//! fitment signature. Every observation lands in exactly one bucket and no
//! bucket is empty.

use fitcon_common::{FitmentSignature, Observation};
use std::collections::BTreeMap;

/// How observation fields are compared when grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMode {
    /// Byte-for-byte, case-sensitive comparison
    #[default]
    Exact,
    /// Trim, collapse inner whitespace and ignore case
    Normalized,
}

/// Observations sharing one fitment signature
#[derive(Debug, Clone)]
pub struct FitmentGroup {
    /// Signature written to the consensus record
    pub signature: FitmentSignature,
    /// Members, in load order
    pub observations: Vec<Observation>,
}

impl FitmentGroup {
    /// Year of the first member (the group's representative year)
    pub fn representative_year(&self) -> i64 {
        self.observations
            .first()
            .map(|o| o.vehicle_year)
            .unwrap_or(self.signature.year)
    }

    pub fn observation_ids(&self) -> Vec<i64> {
        self.observations.iter().map(|o| o.id).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Group observations by fitment signature
///
/// Groups come back ordered by their comparison key so downstream output is
/// independent of input order.
pub fn group_by_signature(observations: Vec<Observation>, mode: SignatureMode) -> Vec<FitmentGroup> {
    let mut buckets: BTreeMap<FitmentSignature, Vec<Observation>> = BTreeMap::new();

    for observation in observations {
        let key = match mode {
            SignatureMode::Exact => observation.signature(),
            SignatureMode::Normalized => normalized_signature(&observation),
        };
        buckets.entry(key).or_default().push(observation);
    }

    buckets
        .into_iter()
        .map(|(key, observations)| {
            let signature = match mode {
                SignatureMode::Exact => key,
                SignatureMode::Normalized => canonical_spelling(&observations),
            };
            FitmentGroup {
                signature,
                observations,
            }
        })
        .collect()
}

fn normalize_field(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Comparison key used by `SignatureMode::Normalized`
pub fn normalized_key(signature: &FitmentSignature) -> FitmentSignature {
    FitmentSignature {
        year: signature.year,
        make: normalize_field(&signature.make),
        model: normalize_field(&signature.model),
        trim: normalize_field(&signature.trim),
        engine: normalize_field(&signature.engine),
    }
}

fn normalized_signature(observation: &Observation) -> FitmentSignature {
    normalized_key(&observation.signature())
}

/// Spelling proposed for a normalized group: the smallest raw variant, with
/// whitespace tidied, so the choice does not depend on load order.
/// The upserter keeps the spelling of an existing record instead.
fn canonical_spelling(observations: &[Observation]) -> FitmentSignature {
    let tidy = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    observations
        .iter()
        .map(|o| FitmentSignature {
            year: o.vehicle_year,
            make: tidy(&o.vehicle_make),
            model: tidy(&o.vehicle_model),
            trim: tidy(&o.vehicle_trim),
            engine: tidy(&o.vehicle_engine),
        })
        .min()
        .unwrap_or_else(|| FitmentSignature::new(0, "", "", "", ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcon_common::time;

    fn obs(id: i64, year: i64, make: &str, model: &str, trim: &str, engine: &str) -> Observation {
        Observation {
            id,
            part_number: "ABC-123".to_string(),
            vehicle_year: year,
            vehicle_make: make.to_string(),
            vehicle_model: model.to_string(),
            vehicle_trim: trim.to_string(),
            vehicle_engine: engine.to_string(),
            is_verified_seller: false,
            seller_is_business: false,
            has_oem_reference: false,
            has_detailed_description: false,
            extraction_date: time::now(),
        }
    }

    #[test]
    fn test_identical_signatures_share_a_group() {
        let groups = group_by_signature(
            vec![
                obs(1, 2010, "Acura", "TL", "Base", "3.5L V6"),
                obs(2, 2010, "Acura", "TL", "Base", "3.5L V6"),
                obs(3, 2011, "Acura", "TL", "Base", "3.5L V6"),
            ],
            SignatureMode::Exact,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].signature.year, 2010);
        assert_eq!(groups[0].observation_ids(), vec![1, 2]);
        assert_eq!(groups[1].observation_ids(), vec![3]);
    }

    #[test]
    fn test_grouping_is_a_partition() {
        let input = vec![
            obs(1, 2010, "Acura", "TL", "", ""),
            obs(2, 2010, "Acura", "TSX", "", ""),
            obs(3, 2010, "Acura", "TL", "", ""),
            obs(4, 2012, "Honda", "Accord", "EX", ""),
        ];
        let groups = group_by_signature(input, SignatureMode::Exact);

        let mut ids: Vec<i64> = groups.iter().flat_map(|g| g.observation_ids()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_exact_mode_is_case_sensitive() {
        let groups = group_by_signature(
            vec![obs(1, 2010, "Acura", "TL", "", ""), obs(2, 2010, "ACURA", "TL", "", "")],
            SignatureMode::Exact,
        );
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_normalized_mode_merges_case_and_whitespace() {
        let groups = group_by_signature(
            vec![
                obs(1, 2010, "acura", "TL", "", "3.5L  V6"),
                obs(2, 2010, " Acura ", "tl", "", "3.5l V6"),
            ],
            SignatureMode::Normalized,
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        // Smallest raw variant wins as a whole ("Acura" < "acura")
        assert_eq!(
            groups[0].signature,
            FitmentSignature::new(2010, "Acura", "tl", "", "3.5l V6")
        );
    }

    #[test]
    fn test_group_order_independent_of_input_order() {
        let a = vec![
            obs(1, 2011, "Acura", "TL", "", ""),
            obs(2, 2010, "Acura", "TL", "", ""),
        ];
        let mut b = a.clone();
        b.reverse();

        let sigs_a: Vec<_> = group_by_signature(a, SignatureMode::Exact)
            .into_iter()
            .map(|g| g.signature)
            .collect();
        let sigs_b: Vec<_> = group_by_signature(b, SignatureMode::Exact)
            .into_iter()
            .map(|g| g.signature)
            .collect();
        assert_eq!(sigs_a, sigs_b);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(group_by_signature(Vec::new(), SignatureMode::Exact).is_empty());
    }
}
