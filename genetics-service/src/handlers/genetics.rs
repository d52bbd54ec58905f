//! Read-only JSON views over the genetics dataset.

use crate::models::{GeneSummary, InheritancePatternCount, StudiedGene, TraitSummary};
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;

/// `GET /api/genes`: every gene with its association count, by symbol.
pub async fn api_genes(State(state): State<AppState>) -> Result<Json<Vec<GeneSummary>>, AppError> {
    let genes = state.db.list_genes().await?;
    tracing::debug!(count = genes.len(), "Listed genes");
    Ok(Json(genes))
}

/// `GET /api/traits`: every trait with its associated gene count, by name.
pub async fn api_traits(
    State(state): State<AppState>,
) -> Result<Json<Vec<TraitSummary>>, AppError> {
    let traits = state.db.list_traits().await?;
    tracing::debug!(count = traits.len(), "Listed traits");
    Ok(Json(traits))
}

/// `GET /api/charts/inheritance-patterns`
pub async fn inheritance_patterns(
    State(state): State<AppState>,
) -> Result<Json<Vec<InheritancePatternCount>>, AppError> {
    Ok(Json(state.db.inheritance_pattern_counts().await?))
}

/// `GET /api/charts/most-studied`: at most ten genes by distinct studies.
pub async fn most_studied(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudiedGene>>, AppError> {
    Ok(Json(state.db.most_studied_genes().await?))
}
