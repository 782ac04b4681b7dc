//! Taxonomy tree used for classification
//!
//! Taxa form a forest through their `parent_id`. A taxon's lineage starts at
//! the taxon itself and walks up to its root.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{GambitError, GambitResult};

pub type TaxonId = i64;

fn default_report() -> bool {
    true
}

/// A taxon in the reference database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    pub id: TaxonId,
    pub key: String,
    pub name: String,

    #[serde(default)]
    pub rank: Option<String>,

    #[serde(default)]
    pub ncbi_id: Option<i64>,

    #[serde(default)]
    pub parent_id: Option<TaxonId>,

    /// Query genomes within this distance of a member genome belong to the taxon
    #[serde(default)]
    pub distance_threshold: Option<f32>,

    /// Whether this taxon may be reported as a classification result
    #[serde(default = "default_report")]
    pub report: bool,
}

impl Taxon {
    /// Threshold test used for classification
    pub fn matches_distance(&self, distance: f32) -> bool {
        self.distance_threshold.is_some_and(|t| distance <= t)
    }
}

/// Validated collection of taxa with parent lookups
#[derive(Debug, Clone)]
pub struct Taxonomy {
    taxa: Vec<Taxon>,
    index: HashMap<TaxonId, usize>,
    parents: Vec<Option<usize>>,
}

impl Taxonomy {
    /// Fails if ids repeat, a parent is missing or the parent links contain a cycle
    pub fn new(taxa: Vec<Taxon>) -> GambitResult<Self> {
        let mut index = HashMap::with_capacity(taxa.len());
        for (i, taxon) in taxa.iter().enumerate() {
            if index.insert(taxon.id, i).is_some() {
                return Err(GambitError::validation(format!("duplicate taxon id {}", taxon.id)));
            }
        }

        let parents = taxa
            .iter()
            .map(|taxon| match taxon.parent_id {
                None => Ok(None),
                Some(pid) => index.get(&pid).copied().map(Some).ok_or_else(|| {
                    GambitError::validation(format!("taxon {} has unknown parent {}", taxon.id, pid))
                }),
            })
            .collect::<GambitResult<Vec<_>>>()?;

        let taxonomy = Self { taxa, index, parents };
        taxonomy.check_acyclic()?;
        Ok(taxonomy)
    }

    fn check_acyclic(&self) -> GambitResult<()> {
        // 0 = unvisited, 1 = on current path, 2 = known to reach a root
        let mut state = vec![0u8; self.taxa.len()];

        for start in 0..self.taxa.len() {
            let mut path = Vec::new();
            let mut current = Some(start);

            while let Some(i) = current {
                match state[i] {
                    2 => break,
                    1 => {
                        return Err(GambitError::validation(format!(
                            "taxonomy contains a cycle through taxon {}",
                            self.taxa[i].id
                        )))
                    }
                    _ => {
                        state[i] = 1;
                        path.push(i);
                        current = self.parents[i];
                    }
                }
            }

            for i in path {
                state[i] = 2;
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    pub fn taxa(&self) -> &[Taxon] {
        &self.taxa
    }

    pub fn get(&self, id: TaxonId) -> Option<&Taxon> {
        self.index.get(&id).map(|&i| &self.taxa[i])
    }

    pub fn contains(&self, id: TaxonId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn parent(&self, id: TaxonId) -> Option<&Taxon> {
        let i = *self.index.get(&id)?;
        self.parents[i].map(|p| &self.taxa[p])
    }

    /// The taxon followed by its ancestors up to the root
    pub fn lineage(&self, id: TaxonId) -> Lineage<'_> {
        Lineage {
            taxonomy: self,
            next: self.index.get(&id).copied(),
        }
    }

    /// Number of ancestors, 0 for a root
    pub fn depth(&self, id: TaxonId) -> usize {
        self.lineage(id).count().saturating_sub(1)
    }

    /// True if `id` is `ancestor` or lies below it
    pub fn is_descendant_or_self(&self, id: TaxonId, ancestor: TaxonId) -> bool {
        self.lineage(id).any(|t| t.id == ancestor)
    }

    pub fn children(&self, id: TaxonId) -> impl Iterator<Item = &Taxon> + '_ {
        self.taxa.iter().filter(move |t| t.parent_id == Some(id))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Taxon> + '_ {
        self.taxa.iter().filter(|t| t.parent_id.is_none())
    }

    /// Lowest common ancestor of all given taxa, `None` if they share no root
    pub fn lca<I: IntoIterator<Item = TaxonId>>(&self, ids: I) -> Option<TaxonId> {
        let mut ids = ids.into_iter();
        let first = ids.next()?;
        let mut common: Vec<TaxonId> = self.lineage(first).map(|t| t.id).collect();

        for id in ids {
            let ancestors: HashSet<TaxonId> = self.lineage(id).map(|t| t.id).collect();
            // Keep the deepest shared ancestor and everything above it
            let pos = common.iter().position(|a| ancestors.contains(a))?;
            common.drain(..pos);
        }

        common.first().copied()
    }

    /// Nearest ancestor-or-self of `id` flagged for reporting
    pub fn report_taxon(&self, id: TaxonId) -> Option<&Taxon> {
        self.lineage(id).find(|t| t.report)
    }
}

/// Iterator over a taxon and its ancestors
pub struct Lineage<'a> {
    taxonomy: &'a Taxonomy,
    next: Option<usize>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a Taxon;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        self.next = self.taxonomy.parents[i];
        Some(&self.taxonomy.taxa[i])
    }
}
