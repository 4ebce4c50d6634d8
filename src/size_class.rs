//! Size class table for the buffer pool

use crate::error::{Error, Result};

/// Ordered table of supported slot sizes
///
/// Requests round up to the smallest class that fits, bounding internal
/// fragmentation at the class granularity. The free state of each class
/// lives in the arenas; this table is pure lookup.
#[derive(Debug, Clone)]
pub struct SizeClassTable {
    /// Class sizes in bytes, strictly increasing
    classes: Vec<usize>,
}

impl SizeClassTable {
    /// Build a table from an explicit class list
    ///
    /// The list must be non-empty and strictly increasing.
    pub fn new(classes: Vec<usize>) -> Result<Self> {
        if classes.is_empty() {
            return Err(Error::InvalidConfig("size class table is empty".into()));
        }
        if classes[0] == 0 {
            return Err(Error::InvalidConfig(
                "size class of 0 bytes is not allocatable".into(),
            ));
        }
        for pair in classes.windows(2) {
            if pair[1] <= pair[0] {
                return Err(Error::InvalidConfig(format!(
                    "size classes must be strictly increasing, got {} after {}",
                    pair[1], pair[0]
                )));
            }
        }
        Ok(Self { classes })
    }

    /// Index of the smallest class that can hold `size`
    ///
    /// Fails with `SizeTooLarge` above the maximum class.
    pub fn class_for(&self, size: usize) -> Result<usize> {
        let index = self.classes.partition_point(|&class| class < size);
        if index == self.classes.len() {
            return Err(Error::SizeTooLarge {
                requested: size,
                max: self.max_size(),
            });
        }
        Ok(index)
    }

    /// Slot size of the class at `index`
    pub fn size_of(&self, index: usize) -> usize {
        self.classes[index]
    }

    /// Largest supported request size
    pub fn max_size(&self) -> usize {
        self.classes.last().copied().unwrap_or(0)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class sizes in increasing order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.classes.iter().copied()
    }
}

/// Build a geometrically growing class table
///
/// Sizes start at `min_size` and grow by `growth_percent` until they
/// pass `max_size`; 20% growth from 64 gives [64, 77, 93, 112, ...].
/// The step is always at least one byte, so the table stays strictly
/// increasing even for tiny sizes or a zero growth percentage.
pub fn geometric_classes(min_size: usize, max_size: usize, growth_percent: u32) -> Vec<usize> {
    let factor = 1.0 + f64::from(growth_percent) / 100.0;
    std::iter::successors(Some(min_size), |&size| {
        Some(((size as f64 * factor).ceil() as usize).max(size + 1))
    })
    .take_while(|&size| size <= max_size)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up_to_smallest_fit() {
        let table = SizeClassTable::new(vec![64, 256, 1024]).unwrap();

        assert_eq!(table.class_for(0).unwrap(), 0);
        assert_eq!(table.class_for(64).unwrap(), 0);
        assert_eq!(table.class_for(65).unwrap(), 1);
        assert_eq!(table.class_for(100).unwrap(), 1);
        assert_eq!(table.size_of(table.class_for(100).unwrap()), 256);
        assert_eq!(table.class_for(1024).unwrap(), 2);
    }

    #[test]
    fn test_too_large_request() {
        let table = SizeClassTable::new(vec![64, 256, 1024]).unwrap();

        assert_eq!(
            table.class_for(2000),
            Err(Error::SizeTooLarge {
                requested: 2000,
                max: 1024
            })
        );
    }

    #[test]
    fn test_rejects_non_increasing_tables() {
        assert!(SizeClassTable::new(vec![]).is_err());
        assert!(SizeClassTable::new(vec![0, 64]).is_err());
        assert!(SizeClassTable::new(vec![64, 64]).is_err());
        assert!(SizeClassTable::new(vec![256, 64]).is_err());
    }

    #[test]
    fn test_geometric_classes() {
        let classes = geometric_classes(64, 500, 20);

        assert_eq!(classes[0], 64);
        for pair in classes.windows(2) {
            let ratio = pair[1] as f64 / pair[0] as f64;
            assert!(ratio > 1.0 && ratio <= 1.25, "ratio: {}", ratio);
        }

        // Bounded by max_size, and valid as a table
        assert!(classes.iter().all(|&s| s <= 500));
        assert!(SizeClassTable::new(classes).is_ok());

        // Coarser growth reaches the maximum in fewer classes
        let coarse = geometric_classes(64, 500, 50);
        assert!(coarse.len() < geometric_classes(64, 500, 20).len());
    }

    #[test]
    fn test_geometric_classes_degenerate_growth_still_increases() {
        let classes = geometric_classes(1, 8, 0);
        assert_eq!(classes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
