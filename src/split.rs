use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::errors::SplitError;

/// Row indices of each partition, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub train_groups: usize,
    pub test_groups: usize,
}

/// Shuffles the distinct groups with a seeded RNG and sends the first
/// `ceil(test_size * groups)` of them to test. A group never straddles the
/// two partitions.
pub fn group_shuffle_split(
    groups: &[String],
    test_size: f64,
    seed: u64,
) -> Result<GroupSplit, SplitError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SplitError::InvalidTestSize(test_size));
    }

    let mut unique: Vec<&str> = groups.iter().map(String::as_str).collect();
    unique.sort_unstable();
    unique.dedup();

    let n_groups = unique.len();
    let n_test = (test_size * n_groups as f64).ceil() as usize;
    let n_train = n_groups.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(SplitError::TooFewGroups {
            groups: n_groups,
            test_size,
            train: n_train,
            test: n_test,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    unique.shuffle(&mut rng);
    let test_set: HashSet<&str> = unique[..n_test].iter().copied().collect();

    let (test, train): (Vec<usize>, Vec<usize>) =
        (0..groups.len()).partition(|&i| test_set.contains(groups[i].as_str()));

    Ok(GroupSplit {
        train,
        test,
        train_groups: n_train,
        test_groups: n_test,
    })
}

#[cfg(test)]
mod tests {
    use super::group_shuffle_split;
    use crate::errors::SplitError;

    fn groups(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_follow_ceiling() {
        let g = groups(&["a", "a", "b", "b", "c", "c", "d", "d", "e", "e"]);
        let split = group_shuffle_split(&g, 0.3, 7).unwrap();
        // ceil(0.3 * 5) = 2 groups in test
        assert_eq!(split.test_groups, 2);
        assert_eq!(split.train_groups, 3);
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.train.len(), 6);
    }

    #[test]
    fn rejects_degenerate_sizes() {
        let g = groups(&["a", "b"]);
        assert_eq!(
            group_shuffle_split(&g, 0.0, 1),
            Err(SplitError::InvalidTestSize(0.0))
        );
        assert!(matches!(
            group_shuffle_split(&groups(&["a", "a"]), 0.5, 1),
            Err(SplitError::TooFewGroups { groups: 1, .. })
        ));
        assert!(group_shuffle_split(&g, 0.5, 1).is_ok());
    }
}
