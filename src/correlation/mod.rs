//! Nearest-neighbor correlation of two position sets.
//!
//! Every reference point is paired with its nearest candidate when the
//! flat-sky separation is within the correlation radius. Pairings are then
//! made one-to-one: a candidate claimed by several reference points stays
//! with the closest one.

mod combine;

pub use combine::combine;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::catalogs::SkyKdTree;
use crate::progress::Progress;
use crate::{McError, Result, SkyPosition};

pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Unit of a correlation radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    #[serde(alias = "deg", alias = "degree")]
    Degrees,
    #[serde(alias = "arcsecond", alias = "arcsec", alias = "arcsecs", alias = "as")]
    Arcseconds,
}

impl AngleUnit {
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value,
            AngleUnit::Arcseconds => value / ARCSEC_PER_DEGREE,
        }
    }
}

impl FromStr for AngleUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrees" | "degree" | "deg" => Ok(AngleUnit::Degrees),
            "arcseconds" | "arcsecond" | "arcsec" | "arcsecs" | "as" => Ok(AngleUnit::Arcseconds),
            other => anyhow::bail!("unknown angle unit '{}'", other),
        }
    }
}

/// Correlation radius: one value for all reference points or one per point
#[derive(Debug, Clone, PartialEq)]
pub enum Radius {
    Uniform(f64),
    PerPoint(Vec<f64>),
}

impl From<f64> for Radius {
    fn from(value: f64) -> Self {
        Radius::Uniform(value)
    }
}

impl From<Vec<f64>> for Radius {
    fn from(values: Vec<f64>) -> Self {
        Radius::PerPoint(values)
    }
}

impl Radius {
    /// Effective per-point radii in degrees, floored at `options.min_radius`
    pub fn resolve(&self, n_points: usize, options: &MatchOptions) -> Result<Vec<f64>> {
        let mut radii = match self {
            Radius::Uniform(r) => vec![*r; n_points],
            Radius::PerPoint(values) => {
                if values.len() != n_points {
                    return Err(McError::SizeMismatch {
                        what: "Rc and reference positions",
                        left: values.len(),
                        right: n_points,
                    });
                }
                values.clone()
            }
        };

        for r in radii.iter_mut() {
            *r = options.unit.to_degrees(*r);
        }
        if let Some(floor) = options.min_radius {
            let floor = options.unit.to_degrees(floor);
            for r in radii.iter_mut() {
                if *r < floor {
                    *r = floor;
                }
            }
        }
        Ok(radii)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MatchOptions {
    /// Radii below this are raised to it
    pub min_radius: Option<f64>,
    /// Unit of both the radius and `min_radius`
    pub unit: AngleUnit,
}

/// A reference point's counterpart in the candidate set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub index: usize,
    pub separation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    matches: Vec<Option<Match>>,
    unmatched_candidates: Vec<usize>,
}

impl MatchResult {
    /// One entry per reference point
    pub fn matches(&self) -> &[Option<Match>] {
        &self.matches
    }

    pub fn match_index(&self) -> Vec<Option<usize>> {
        self.matches.iter().map(|m| m.map(|m| m.index)).collect()
    }

    pub fn separations(&self) -> Vec<Option<f64>> {
        self.matches.iter().map(|m| m.map(|m| m.separation)).collect()
    }

    /// Reference indices holding a match, ascending
    pub fn matched_indices(&self) -> Vec<usize> {
        self.matches
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.map(|_| i))
            .collect()
    }

    /// Candidate indices claimed by no reference point, ascending
    pub fn unmatched_candidates(&self) -> &[usize] {
        &self.unmatched_candidates
    }

    pub fn matched_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_some()).count()
    }
}

/// Correlate `candidates` onto `reference`.
///
/// For each reference point the nearest candidate (lowest index among exact
/// ties) is kept if its separation does not exceed that point's effective
/// radius. Results are passed through [`clean_duplicates`].
///
/// Fails with [`McError::NonFinitePosition`] if either set holds a NaN or
/// infinite coordinate.
pub fn correlate(
    reference: &[SkyPosition],
    candidates: &[SkyPosition],
    radius: &Radius,
    options: &MatchOptions,
) -> Result<MatchResult> {
    check_finite(reference)?;
    check_finite(candidates)?;
    let radii = radius.resolve(reference.len(), options)?;
    let tree = SkyKdTree::build(candidates.to_vec());

    let mut progress = Progress::new("Correlating...", reference.len());
    let mut matches = Vec::with_capacity(reference.len());
    for (i, (point, &rc)) in reference.iter().zip(radii.iter()).enumerate() {
        progress.tick(i);
        let nearest = tree
            .nearest_neighbor([point.alpha, point.delta])
            .filter(|&(_, separation)| separation <= rc)
            .map(|(index, separation)| Match { index, separation });
        matches.push(nearest);
    }

    let dropped = clean_duplicates(&mut matches);
    if dropped > 0 {
        tracing::debug!("{} duplicate claims released", dropped);
    }

    let mut claimed = vec![false; candidates.len()];
    for m in matches.iter().flatten() {
        claimed[m.index] = true;
    }
    let unmatched_candidates = claimed
        .iter()
        .enumerate()
        .filter_map(|(j, &taken)| (!taken).then_some(j))
        .collect();

    Ok(MatchResult {
        matches,
        unmatched_candidates,
    })
}

fn check_finite(points: &[SkyPosition]) -> Result<()> {
    match points
        .iter()
        .position(|p| !(p.alpha.is_finite() && p.delta.is_finite()))
    {
        Some(row) => Err(McError::NonFinitePosition { row }),
        None => Ok(()),
    }
}

/// Array form of [`correlate`] taking separate coordinate slices.
pub fn correlate_xy(
    ax: &[f64],
    ay: &[f64],
    bx: &[f64],
    by: &[f64],
    radius: &Radius,
    options: &MatchOptions,
) -> Result<MatchResult> {
    if ax.len() != ay.len() {
        return Err(McError::SizeMismatch {
            what: "Ax and Ay",
            left: ax.len(),
            right: ay.len(),
        });
    }
    if bx.len() != by.len() {
        return Err(McError::SizeMismatch {
            what: "Bx and By",
            left: bx.len(),
            right: by.len(),
        });
    }

    let reference: Vec<SkyPosition> = ax
        .iter()
        .zip(ay.iter())
        .map(|(&x, &y)| SkyPosition::new(x, y))
        .collect();
    let candidates: Vec<SkyPosition> = bx
        .iter()
        .zip(by.iter())
        .map(|(&x, &y)| SkyPosition::new(x, y))
        .collect();
    correlate(&reference, &candidates, radius, options)
}

/// Make matches one-to-one.
///
/// A candidate claimed by several reference points stays with the one at the
/// smallest separation; on an exact tie the lowest reference index wins. All
/// other claimants become unmatched. Returns the number of claims released.
pub fn clean_duplicates(matches: &mut [Option<Match>]) -> usize {
    let mut owner: HashMap<usize, usize> = HashMap::new();
    let mut progress = Progress::new("Cleaning...", matches.len());

    for (i, m) in matches.iter().enumerate() {
        progress.tick(i);
        let Some(m) = m else { continue };
        match owner.entry(m.index) {
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
            Entry::Occupied(mut slot) => {
                let held = matches[*slot.get()].map(|h| h.separation);
                if held.is_some_and(|sep| m.separation < sep) {
                    slot.insert(i);
                }
            }
        }
    }

    let mut released = 0;
    for (i, m) in matches.iter_mut().enumerate() {
        if let Some(claim) = m {
            if owner.get(&claim.index) != Some(&i) {
                *m = None;
                released += 1;
            }
        }
    }
    released
}
