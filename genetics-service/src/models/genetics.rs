//! Read-only rows returned by the dataset queries.
//!
//! Field names are the JSON wire names of the `/api` endpoints.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A gene together with the number of trait associations recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GeneSummary {
    pub gene_id: i64,
    pub gene_symbol: String,
    pub gene_name: String,
    pub description: Option<String>,
    pub association_count: i64,
}

/// A trait together with the number of gene associations recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TraitSummary {
    pub trait_id: i64,
    pub trait_name: String,
    pub category: Option<String>,
    pub inheritance_pattern: Option<String>,
    pub gene_count: i64,
}

/// Number of traits sharing one inheritance pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct InheritancePatternCount {
    pub pattern: Option<String>,
    pub count: i64,
}

/// A gene ranked by how many distinct studies report one of its associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StudiedGene {
    pub gene: String,
    pub studies: i64,
}
