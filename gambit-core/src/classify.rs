//! Taxonomic classification from distances to reference genomes
//!
//! A reference genome "matches" a taxon in its lineage when the query's
//! distance to it is within that taxon's threshold. The lowest such taxon is
//! the genome's matched taxon.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::db::AnnotatedGenome;
use crate::taxonomy::{Taxon, TaxonId, Taxonomy};

/// A query's distance to one reference genome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// Position of the genome among the database's reference genomes
    pub ref_index: usize,
    pub genome: AnnotatedGenome,
    pub distance: f32,
    /// Lowest taxon in the genome's lineage whose threshold `distance` satisfies
    pub matched_taxon: Option<Taxon>,
}

/// Outcome of classifying a single query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifierResult {
    pub success: bool,
    pub predicted_taxon: Option<Taxon>,
    /// Reference match that supports the prediction
    pub primary_match: Option<Match>,
    /// Reference at minimum distance, whether or not it matched anything
    pub closest_match: Option<Match>,
    /// Most general thresholded taxon below the prediction in the closest
    /// genome's lineage, i.e. the next taxon the query fell short of
    pub next_taxon: Option<Taxon>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ClassifierResult {
    /// Result for a query that could not be classified at all
    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// First taxon in the lineage of `taxon_id`, itself included, within threshold of `distance`
pub fn matching_taxon(taxonomy: &Taxonomy, taxon_id: TaxonId, distance: f32) -> Option<&Taxon> {
    taxonomy.lineage(taxon_id).find(|t| t.matches_distance(distance))
}

/// Index of the smallest distance, first occurrence on ties
pub fn find_closest(distances: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &d) in distances.iter().enumerate() {
        if best.map_or(true, |(_, b)| d < b) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn make_match(taxonomy: &Taxonomy, genomes: &[AnnotatedGenome], distances: &[f32], i: usize) -> Match {
    let genome = &genomes[i];
    Match {
        ref_index: i,
        genome: genome.clone(),
        distance: distances[i],
        matched_taxon: matching_taxon(taxonomy, genome.taxon_id, distances[i]).cloned(),
    }
}

/// Classify a query from its distances to every reference genome
///
/// `distances[i]` is the distance to `genomes[i]`. In non-strict mode the
/// prediction comes from the closest genome alone. In strict mode every
/// genome's matched taxon is taken into account; conflicting matches are
/// resolved to their lowest common ancestor with a warning.
pub fn classify(taxonomy: &Taxonomy, genomes: &[AnnotatedGenome], distances: &[f32], strict: bool) -> ClassifierResult {
    if genomes.len() != distances.len() {
        return ClassifierResult::failed(format!(
            "got {} distances for {} reference genomes",
            distances.len(),
            genomes.len()
        ));
    }

    let closest = match find_closest(distances) {
        Some(i) => make_match(taxonomy, genomes, distances, i),
        None => {
            return ClassifierResult {
                success: true,
                warnings: vec!["reference database is empty".to_string()],
                ..ClassifierResult::default()
            }
        }
    };

    let mut warnings = Vec::new();
    if let Some(warning) = tie_warning(taxonomy, genomes, distances, closest.distance) {
        warnings.push(warning);
    }

    let (predicted, primary) = if strict {
        classify_strict(taxonomy, genomes, distances, &mut warnings)
    } else {
        let predicted = closest.matched_taxon.clone();
        let primary = predicted.as_ref().map(|_| closest.clone());
        (predicted, primary)
    };

    let next_taxon = next_taxon(taxonomy, closest.genome.taxon_id, predicted.as_ref().map(|t| t.id));

    ClassifierResult {
        success: true,
        predicted_taxon: predicted,
        primary_match: primary,
        closest_match: Some(closest),
        next_taxon,
        warnings,
        error: None,
    }
}

fn classify_strict(
    taxonomy: &Taxonomy,
    genomes: &[AnnotatedGenome],
    distances: &[f32],
    warnings: &mut Vec<String>,
) -> (Option<Taxon>, Option<Match>) {
    let matched: Vec<Option<&Taxon>> = genomes
        .iter()
        .zip(distances)
        .map(|(g, &d)| matching_taxon(taxonomy, g.taxon_id, d))
        .collect();

    let distinct: BTreeSet<TaxonId> = matched.iter().flatten().map(|t| t.id).collect();
    if distinct.is_empty() {
        return (None, None);
    }

    // Deepest matched taxon, consistent if every other one is its ancestor
    let deepest = distinct
        .iter()
        .copied()
        .max_by_key(|&id| taxonomy.depth(id))
        .unwrap_or_default();
    let consistent = distinct.iter().all(|&id| taxonomy.is_descendant_or_self(deepest, id));

    let consensus = if consistent {
        Some(deepest)
    } else {
        let names: Vec<&str> = distinct
            .iter()
            .filter_map(|&id| taxonomy.get(id))
            .map(|t| t.name.as_str())
            .collect();
        warnings.push(format!(
            "Query matched inconsistent set of taxa: {}. Reporting lowest common ancestor of this set.",
            names.join(", ")
        ));
        taxonomy.lca(distinct.iter().copied())
    };

    let Some(consensus) = consensus else {
        return (None, None);
    };

    let primary = matched
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_some_and(|t| taxonomy.is_descendant_or_self(t.id, consensus)))
        .map(|(i, _)| i)
        .min_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)))
        .map(|i| make_match(taxonomy, genomes, distances, i));

    (taxonomy.get(consensus).cloned(), primary)
}

/// Warning if genomes tied at the minimum distance match different taxa
fn tie_warning(taxonomy: &Taxonomy, genomes: &[AnnotatedGenome], distances: &[f32], min: f32) -> Option<String> {
    let tied: BTreeSet<Option<TaxonId>> = genomes
        .iter()
        .zip(distances)
        .filter(|(_, d)| **d == min)
        .map(|(g, &d)| matching_taxon(taxonomy, g.taxon_id, d).map(|t| t.id))
        .collect();

    if tied.len() > 1 {
        let names: Vec<String> = tied
            .iter()
            .map(|id| match id.and_then(|id| taxonomy.get(id)) {
                Some(t) => t.name.clone(),
                None => "<none>".to_string(),
            })
            .collect();
        Some(format!(
            "Multiple reference genomes at minimum distance {} match different taxa: {}",
            min,
            names.join(", ")
        ))
    } else {
        None
    }
}

/// Most general thresholded taxon strictly below `predicted` in the lineage of `taxon_id`
///
/// None if `predicted` is not in that lineage.
fn next_taxon(taxonomy: &Taxonomy, taxon_id: TaxonId, predicted: Option<TaxonId>) -> Option<Taxon> {
    if predicted.is_some_and(|p| !taxonomy.is_descendant_or_self(taxon_id, p)) {
        return None;
    }
    taxonomy
        .lineage(taxon_id)
        .take_while(|t| Some(t.id) != predicted)
        .filter(|t| t.distance_threshold.is_some())
        .last()
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::tests::{example_taxonomy, taxon};

    fn genomes(taxa: &[TaxonId]) -> Vec<AnnotatedGenome> {
        taxa.iter()
            .enumerate()
            .map(|(i, &taxon_id)| AnnotatedGenome {
                key: format!("g{}", i),
                description: format!("Genome {}", i),
                taxon_id,
            })
            .collect()
    }

    fn predicted_id(result: &ClassifierResult) -> Option<TaxonId> {
        result.predicted_taxon.as_ref().map(|t| t.id)
    }

    #[test]
    fn test_matching_taxon_walks_lineage() {
        let tax = example_taxonomy();
        assert_eq!(matching_taxon(&tax, 4, 0.05).map(|t| t.id), Some(4));
        assert_eq!(matching_taxon(&tax, 4, 0.1).map(|t| t.id), Some(4));
        assert_eq!(matching_taxon(&tax, 4, 0.2).map(|t| t.id), Some(2));
        assert_eq!(matching_taxon(&tax, 4, 0.5).map(|t| t.id), Some(1));
        assert_eq!(matching_taxon(&tax, 4, 0.7), None);
    }

    #[test]
    fn test_find_closest_first_occurrence() {
        assert_eq!(find_closest(&[0.5, 0.2, 0.9, 0.2]), Some(1));
        assert_eq!(find_closest(&[]), None);
    }

    #[test]
    fn test_nonstrict() {
        let tax = example_taxonomy();
        let genomes = genomes(&[4, 3, 5]);

        let result = classify(&tax, &genomes, &[0.25, 0.4, 0.5], false);
        assert!(result.success);
        assert_eq!(predicted_id(&result), Some(2));
        assert_eq!(result.primary_match, result.closest_match);
        assert_eq!(result.closest_match.as_ref().map(|m| m.ref_index), Some(0));
        assert_eq!(result.next_taxon.as_ref().map(|t| t.id), Some(4));
        assert!(result.warnings.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_no_match() {
        let tax = example_taxonomy();
        let result = classify(&tax, &genomes(&[4, 3]), &[0.8, 0.9], false);
        assert!(result.success);
        assert!(result.predicted_taxon.is_none());
        assert!(result.primary_match.is_none());
        assert_eq!(result.closest_match.as_ref().map(|m| m.ref_index), Some(0));
        assert!(result.closest_match.as_ref().unwrap().matched_taxon.is_none());
        // Genus is the broadest taxon the query missed
        assert_eq!(result.next_taxon.as_ref().map(|t| t.id), Some(1));
    }

    #[test]
    fn test_strict_consistent_takes_deepest() {
        let tax = example_taxonomy();
        // Genome 0 matches subspecies 4, genome 1 matches genus 1 only
        let genomes = genomes(&[4, 3]);
        let nonstrict = classify(&tax, &genomes, &[0.08, 0.5], false);
        let strict = classify(&tax, &genomes, &[0.08, 0.5], true);
        assert_eq!(predicted_id(&nonstrict), Some(4));
        assert_eq!(predicted_id(&strict), Some(4));
        assert_eq!(strict.primary_match.as_ref().map(|m| m.ref_index), Some(0));
        assert!(strict.warnings.is_empty());
    }

    #[test]
    fn test_strict_conflict_reports_lca() {
        let tax = example_taxonomy();
        // Closest genome matches species 2, another matches species 3
        let genomes = genomes(&[4, 3]);
        let distances = [0.2, 0.25];

        let nonstrict = classify(&tax, &genomes, &distances, false);
        assert_eq!(predicted_id(&nonstrict), Some(2));
        assert!(nonstrict.warnings.is_empty());

        let strict = classify(&tax, &genomes, &distances, true);
        assert_eq!(predicted_id(&strict), Some(1));
        assert_eq!(strict.warnings.len(), 1);
        assert!(strict.warnings[0].contains("Genus species"));
        assert!(strict.warnings[0].contains("Genus other"));
        // Both matched taxa are below the genus; the closer genome supports it
        assert_eq!(strict.primary_match.as_ref().map(|m| m.ref_index), Some(0));
    }

    #[test]
    fn test_strict_prediction_off_closest_lineage() {
        let tax = Taxonomy::new(vec![
            taxon(1, "Alpha", "species", None, Some(0.05)),
            taxon(2, "Beta", "species", None, Some(0.2)),
        ])
        .unwrap();
        // Closest genome misses its own threshold, the next one matches an unrelated root
        let result = classify(&tax, &genomes(&[1, 2]), &[0.08, 0.1], true);
        assert_eq!(predicted_id(&result), Some(2));
        assert_eq!(result.closest_match.as_ref().map(|m| m.ref_index), Some(0));
        assert_eq!(result.primary_match.as_ref().map(|m| m.ref_index), Some(1));
        assert!(result.next_taxon.is_none());

        let nonstrict = classify(&tax, &genomes(&[1, 2]), &[0.08, 0.1], false);
        assert!(nonstrict.predicted_taxon.is_none());
        assert_eq!(nonstrict.next_taxon.as_ref().map(|t| t.id), Some(1));
    }

    #[test]
    fn test_tie_warning() {
        let tax = example_taxonomy();
        let genomes = genomes(&[4, 3]);
        let result = classify(&tax, &genomes, &[0.2, 0.2], false);
        assert_eq!(result.closest_match.as_ref().map(|m| m.ref_index), Some(0));
        assert_eq!(predicted_id(&result), Some(2));
        assert_eq!(result.warnings.len(), 1);

        // Ties within the same taxon are not reported
        let genomes = crate::classify::tests::genomes(&[4, 4]);
        assert!(classify(&tax, &genomes, &[0.05, 0.05], false).warnings.is_empty());
    }

    #[test]
    fn test_failed_and_empty() {
        let result = ClassifierResult::failed("bad file");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("bad file"));
        assert!(result.predicted_taxon.is_none());

        let tax = example_taxonomy();
        let result = classify(&tax, &genomes(&[4]), &[0.1, 0.2], false);
        assert!(!result.success);

        let result = classify(&tax, &[], &[], true);
        assert!(result.success);
        assert!(result.closest_match.is_none());
    }
}
