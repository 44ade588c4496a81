use super::{correlate, MatchOptions, Radius};
use crate::{McError, Result, Table};

/// Merge catalogs into one table in which every object appears once.
///
/// The first catalog seeds the result. Each following catalog is correlated
/// against everything combined so far (using a single radius `rc`, in
/// degrees) and only its unmatched rows are appended. All catalogs must
/// share one schema.
pub fn combine(catalogs: &[Table], rc: f64, x_col: &str, y_col: &str) -> Result<Table> {
    let (first, rest) = catalogs
        .split_first()
        .ok_or_else(|| McError::Schema("no catalogs to combine".to_string()))?;

    tracing::info!("Combining {} catalogs using Rc = {:.6}", catalogs.len(), rc);

    let mut combined = first.clone();
    let radius = Radius::Uniform(rc);
    let options = MatchOptions::default();

    for (i, catalog) in rest.iter().enumerate() {
        let result = correlate(
            &combined.positions(x_col, y_col)?,
            &catalog.positions(x_col, y_col)?,
            &radius,
            &options,
        )?;

        combined.concat(&catalog.select(result.unmatched_candidates()))?;

        tracing::info!(
            "catalog {}: {} matched, {} new",
            i + 1,
            result.matched_count(),
            result.unmatched_candidates().len()
        );
    }

    tracing::info!("combined catalog holds {} objects", combined.len());
    Ok(combined)
}
