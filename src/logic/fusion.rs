//! Reduction of several per-model diagnoses into one.
//!
//! Pure and deterministic: the result depends only on the order and content
//! of the inputs.

use crate::models::{Diagnosis, Provenance, Treatment};

/// Confidence boost for the agreeing group, by share of invoked models.
pub fn agreement_boost(ratio: f64) -> f64 {
    if ratio >= 1.0 {
        0.15
    } else if ratio >= 0.75 {
        0.10
    } else if ratio >= 0.5 {
        0.05
    } else {
        0.0
    }
}

struct Group<'a> {
    name: &'a str,
    members: Vec<&'a Diagnosis>,
    confidence_sum: f64,
}

/// Group by exact name in first-seen order and pick the winner: largest
/// group, then highest summed confidence, then earliest.
fn winning_group(diagnoses: &[Diagnosis]) -> Option<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();

    for diagnosis in diagnoses {
        match groups.iter_mut().find(|g| g.name == diagnosis.name()) {
            Some(group) => {
                group.members.push(diagnosis);
                group.confidence_sum += diagnosis.confidence();
            }
            None => groups.push(Group {
                name: diagnosis.name(),
                members: vec![diagnosis],
                confidence_sum: diagnosis.confidence(),
            }),
        }
    }

    let mut winner: Option<Group<'_>> = None;
    for group in groups {
        let better = match &winner {
            None => true,
            Some(best) => {
                group.members.len() > best.members.len()
                    || (group.members.len() == best.members.len()
                        && group.confidence_sum > best.confidence_sum)
            }
        };
        if better {
            winner = Some(group);
        }
    }
    winner
}

/// Fuse successful diagnoses. `invoked` is the number of models asked,
/// successful or not, and is the denominator of the agreement ratio.
///
/// Returns `None` for an empty input.
pub fn fuse(diagnoses: &[Diagnosis], invoked: usize) -> Option<Diagnosis> {
    let group = winning_group(diagnoses)?;
    let size = group.members.len();

    let mean = group.confidence_sum / size as f64;
    let confidence = if size >= 2 && invoked > 0 {
        mean + agreement_boost(size as f64 / invoked as f64)
    } else {
        mean
    };

    let mut description = group.members[0].description();
    for member in &group.members[1..] {
        if member.description().chars().count() > description.chars().count() {
            description = member.description();
        }
    }

    let treatments: Vec<Treatment> = group
        .members
        .iter()
        .flat_map(|d| d.treatments().iter().cloned())
        .collect();

    tracing::debug!(
        name = group.name,
        agreed = size,
        succeeded = diagnoses.len(),
        invoked,
        confidence,
        "fused diagnoses"
    );

    Some(
        Diagnosis::new(group.name, description, confidence, treatments)
            .with_provenance(Provenance::consensus(size as u32, diagnoses.len() as u32)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    fn diag(name: &str, confidence: f64, description: &str, methods: &[&str]) -> Diagnosis {
        let treatments = methods
            .iter()
            .map(|m| Treatment::new(*m, Tier::Medium, Tier::Medium, "¥30-50/亩", "x"))
            .collect();
        Diagnosis::new(name, description, confidence, treatments)
    }

    #[test]
    fn boost_bands() {
        assert_eq!(agreement_boost(1.0), 0.15);
        assert_eq!(agreement_boost(0.8), 0.10);
        assert_eq!(agreement_boost(0.75), 0.10);
        assert_eq!(agreement_boost(2.0 / 3.0), 0.05);
        assert_eq!(agreement_boost(0.5), 0.05);
        assert_eq!(agreement_boost(0.4), 0.0);
    }

    #[test]
    fn majority_name_wins_with_boost() {
        let input = vec![
            diag("A", 0.6, "a", &["m1"]),
            diag("A", 0.8, "a", &["m2"]),
            diag("B", 0.9, "b", &["m3"]),
        ];
        let fused = fuse(&input, 3).unwrap();

        assert_eq!(fused.name(), "A");
        // mean 0.7, ratio 2/3 gives +0.05
        assert!((fused.confidence() - 0.75).abs() < 1e-9);
        assert_eq!(fused.provenance(), &Provenance::consensus(2, 3));
    }

    #[test]
    fn full_agreement_is_clamped() {
        let input = vec![diag("A", 0.95, "", &["m"]), diag("A", 0.9, "", &["m"])];
        let fused = fuse(&input, 2).unwrap();
        assert_eq!(fused.confidence(), 1.0);
    }

    #[test]
    fn failed_models_dilute_the_ratio() {
        let input = vec![diag("A", 0.6, "", &["m"]), diag("A", 0.6, "", &["m"])];
        // two of four invoked agree: ratio 0.5
        let fused = fuse(&input, 4).unwrap();
        assert!((fused.confidence() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn tie_broken_by_summed_confidence_then_order() {
        let input = vec![diag("A", 0.5, "", &["m"]), diag("B", 0.9, "", &["m"])];
        let fused = fuse(&input, 2).unwrap();
        assert_eq!(fused.name(), "B");
        // a lone winner gets no boost
        assert_eq!(fused.confidence(), 0.9);

        let input = vec![diag("A", 0.7, "", &["m"]), diag("B", 0.7, "", &["m"])];
        assert_eq!(fuse(&input, 2).unwrap().name(), "A");
    }

    #[test]
    fn longest_description_first_wins_ties() {
        let input = vec![
            diag("A", 0.5, "短描述", &["m"]),
            diag("A", 0.5, "更长的描述内容", &["m"]),
            diag("A", 0.5, "同样长的描述内", &["m"]),
        ];
        let fused = fuse(&input, 3).unwrap();
        assert_eq!(fused.description(), "更长的描述内容");
    }

    #[test]
    fn treatments_concatenated_and_deduplicated() {
        let input = vec![
            diag("A", 0.5, "", &["m1", "m2"]),
            diag("B", 0.5, "", &["x"]),
            diag("A", 0.5, "", &["m2", "m3", "m4", "m5"]),
        ];
        let fused = fuse(&input, 3).unwrap();
        let methods: Vec<&str> = fused.treatments().iter().map(|t| t.method.as_str()).collect();
        assert_eq!(methods, vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn empty_input() {
        assert!(fuse(&[], 3).is_none());
    }

    #[test]
    fn fusion_is_deterministic() {
        let input = vec![
            diag("A", 0.6, "a", &["m1"]),
            diag("B", 0.8, "b", &["m2"]),
            diag("A", 0.7, "aa", &["m3"]),
        ];
        assert_eq!(fuse(&input, 3), fuse(&input, 3));
    }
}
