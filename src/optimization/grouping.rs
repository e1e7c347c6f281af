//! Splitting datasets into independent linear problems.
//!
//! Without CLP linking every (dataset, global index) pair is a problem of
//! its own. With linking, global values of all datasets are aligned within
//! a tolerance and all datasets that share an aligned value are solved
//! together, their row blocks stacked in dataset order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{KinFitError, Result};

/// How a global value snaps onto the values already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMethod {
    /// Closest value in either direction
    #[default]
    Nearest,
    /// Closest value at or below
    Backward,
    /// Closest value at or above
    Forward,
}

/// Snap `value` onto the closest candidate of `targets` allowed by `method`,
/// if that candidate is within `tolerance`. Otherwise `value` is returned.
pub fn align_value(value: f64, targets: &[f64], tolerance: f64, method: LinkMethod) -> f64 {
    targets
        .iter()
        .copied()
        .filter(|&target| match method {
            LinkMethod::Nearest => true,
            LinkMethod::Backward => target <= value,
            LinkMethod::Forward => target >= value,
        })
        .map(|target| (target, (target - value).abs()))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .filter(|&(_, distance)| distance <= tolerance)
        .map_or(value, |(target, _)| target)
}

/// Align the global axes of several datasets.
///
/// The first axis is the reference; every following axis is aligned onto
/// the sorted union of all values aligned so far.
///
/// # Errors
///
/// * `KinFitError::Alignment` if two values of one dataset land on the same
///   aligned value
pub fn align_global_axes(
    axes: &[(&str, &[f64])],
    tolerance: f64,
    method: LinkMethod,
) -> Result<Vec<Vec<f64>>> {
    let mut seen: Vec<f64> = Vec::new();
    let mut aligned_axes = Vec::with_capacity(axes.len());

    for (index, (label, axis)) in axes.iter().enumerate() {
        let aligned: Vec<f64> = if index == 0 {
            axis.to_vec()
        } else {
            axis.iter()
                .map(|&value| align_value(value, &seen, tolerance, method))
                .collect()
        };

        let mut sorted = aligned.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(KinFitError::Alignment(format!(
                "global axis of dataset '{label}' aligns twice onto {}; lower the link tolerance",
                pair[0]
            )));
        }

        seen.extend_from_slice(&aligned);
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        seen.dedup();
        aligned_axes.push(aligned);
    }
    Ok(aligned_axes)
}

/// One row block of a problem: a global index of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProblemMember {
    /// Position of the dataset in model order
    pub dataset: usize,
    pub global_index: usize,
}

/// An independent linear problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSpec {
    /// Global value the problem is solved at; decides which interval-bound
    /// constraints and relations apply
    pub global_value: f64,
    pub members: Vec<ProblemMember>,
}

/// Split datasets with the given global axes into problems.
///
/// Unlinked problems are ordered dataset by dataset; linked problems by
/// ascending aligned value, members in dataset order.
pub fn problem_layout(
    axes: &[(&str, &[f64])],
    link_clp: bool,
    tolerance: f64,
    method: LinkMethod,
) -> Result<Vec<ProblemSpec>> {
    if !link_clp {
        return Ok(axes
            .iter()
            .enumerate()
            .flat_map(|(dataset, (_, axis))| {
                axis.iter()
                    .enumerate()
                    .map(move |(global_index, &global_value)| ProblemSpec {
                        global_value,
                        members: vec![ProblemMember {
                            dataset,
                            global_index,
                        }],
                    })
            })
            .collect());
    }

    let aligned = align_global_axes(axes, tolerance, method)?;
    let mut entries: Vec<(f64, ProblemMember)> = aligned
        .iter()
        .enumerate()
        .flat_map(|(dataset, axis)| {
            axis.iter()
                .enumerate()
                .map(move |(global_index, &value)| {
                    (
                        value,
                        ProblemMember {
                            dataset,
                            global_index,
                        },
                    )
                })
        })
        .collect();
    // stable: members with equal values stay in dataset order
    entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut problems: Vec<ProblemSpec> = Vec::new();
    for (value, member) in entries {
        match problems.last_mut() {
            Some(problem) if problem.global_value == value => problem.members.push(member),
            _ => problems.push(ProblemSpec {
                global_value: value,
                members: vec![member],
            }),
        }
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_value_methods() {
        let targets = [1.0, 2.0, 3.0];
        assert_eq!(align_value(2.2, &targets, 0.5, LinkMethod::Nearest), 2.0);
        assert_eq!(align_value(2.2, &targets, 0.5, LinkMethod::Forward), 2.2);
        assert_eq!(align_value(2.2, &targets, 1.0, LinkMethod::Forward), 3.0);
        assert_eq!(align_value(2.8, &targets, 1.0, LinkMethod::Backward), 2.0);
        assert_eq!(align_value(5.0, &targets, 1.0, LinkMethod::Nearest), 5.0);
        assert_eq!(align_value(0.5, &[], 1.0, LinkMethod::Nearest), 0.5);
    }

    #[test]
    fn test_align_axes_union() {
        let first = [1.0, 2.0, 3.0];
        let second = [1.05, 2.5, 3.05];
        let third = [2.45];
        let aligned = align_global_axes(
            &[("a", &first[..]), ("b", &second[..]), ("c", &third[..])],
            0.1,
            LinkMethod::Nearest,
        )
        .unwrap();
        assert_eq!(aligned[1], vec![1.0, 2.5, 3.0]);
        // 2.5 joined the union after the second dataset
        assert_eq!(aligned[2], vec![2.5]);
    }

    #[test]
    fn test_ambiguous_alignment() {
        let first = [1.0, 2.0];
        let second = [0.95, 1.05];
        let result = align_global_axes(&[("a", &first[..]), ("b", &second[..])], 0.1, LinkMethod::Nearest);
        assert!(matches!(result, Err(KinFitError::Alignment(_))));
    }

    #[test]
    fn test_unlinked_layout() {
        let first = [1.0, 2.0];
        let second = [1.0];
        let problems =
            problem_layout(&[("a", &first[..]), ("b", &second[..])], false, 0.0, LinkMethod::Nearest)
                .unwrap();
        assert_eq!(problems.len(), 3);
        assert_eq!(problems[2].members[0].dataset, 1);
    }

    #[test]
    fn test_linked_layout() {
        let first = [1.0, 2.0, 3.0];
        let second = [2.01, 4.0];
        let problems =
            problem_layout(&[("a", &first[..]), ("b", &second[..])], true, 0.05, LinkMethod::Nearest)
                .unwrap();
        let values: Vec<f64> = problems.iter().map(|p| p.global_value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            problems[1].members,
            vec![
                ProblemMember {
                    dataset: 0,
                    global_index: 1
                },
                ProblemMember {
                    dataset: 1,
                    global_index: 0
                },
            ]
        );
        assert_eq!(problems[3].members[0].dataset, 1);
    }
}
