use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Class selection: which classes are drawn
// ---------------------------------------------------------------------------

/// Selected class indices (0-based).
pub type ClassFilter = BTreeSet<usize>;

/// Every class selected.
pub fn init_class_filter(class_count: usize) -> ClassFilter {
    (0..class_count).collect()
}

/// Build a filter from 1-based class numbers as typed on the command line.
/// Numbers outside `1..=class_count` are dropped with a warning; an empty
/// request means "all classes".
pub fn from_class_numbers(numbers: &[usize], class_count: usize) -> ClassFilter {
    if numbers.is_empty() {
        return init_class_filter(class_count);
    }
    numbers
        .iter()
        .filter_map(|&n| {
            if (1..=class_count).contains(&n) {
                Some(n - 1)
            } else {
                log::warn!("ignoring class {n}: job has {class_count} classes");
                None
            }
        })
        .collect()
}

/// Indices of classes that pass the filter, ascending.
pub fn visible_classes(filter: &ClassFilter, class_count: usize) -> Vec<usize> {
    filter.iter().copied().filter(|&c| c < class_count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_all() {
        assert_eq!(visible_classes(&init_class_filter(3), 3), vec![0, 1, 2]);
        assert_eq!(from_class_numbers(&[], 2), init_class_filter(2));
    }

    #[test]
    fn one_based_numbers() {
        let f = from_class_numbers(&[3, 1, 9], 4);
        assert_eq!(visible_classes(&f, 4), vec![0, 2]);
    }

    #[test]
    fn out_of_range_indices_hidden() {
        let f: ClassFilter = [0, 5].into_iter().collect();
        assert_eq!(visible_classes(&f, 3), vec![0]);
    }
}
