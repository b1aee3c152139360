//! Train/val/test partitioning.
//!
//! Counts are derived from the ratios by rounding, with `test` absorbing the
//! remainder so the three counts always sum to the number of assets. The
//! order of assignment is a shuffle of the input; whether that shuffle is
//! reproducible is decided by the caller through the seed.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LabelforgeError;

const RATIO_TOLERANCE: f64 = 1e-6;

/// One of the three evaluation partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Directory and column name for this split.
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = LabelforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(LabelforgeError::invalid(format!("unknown split '{other}'"))),
        }
    }
}

/// Target fractions for each split.
///
/// Only built through [`SplitRatios::new`], so the three values are always
/// non-negative and sum to one. Deserializing goes through the same check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RatioFields")]
pub struct SplitRatios {
    train: f64,
    val: f64,
    test: f64,
}

#[derive(Deserialize)]
struct RatioFields {
    train: f64,
    val: f64,
    test: f64,
}

impl TryFrom<RatioFields> for SplitRatios {
    type Error = LabelforgeError;

    fn try_from(fields: RatioFields) -> Result<Self, Self::Error> {
        Self::new(fields.train, fields.val, fields.test)
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// Build ratios, rejecting negative, non-finite, or non-unit-sum values.
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self, LabelforgeError> {
        for (name, value) in [("train", train), ("val", val), ("test", test)] {
            if !value.is_finite() || value < 0.0 {
                return Err(LabelforgeError::invalid(format!(
                    "{name} ratio must be a non-negative number, got {value}"
                )));
            }
        }

        let sum = train + val + test;
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(LabelforgeError::invalid(format!(
                "split ratios must sum to 1.0, got {sum}"
            )));
        }

        Ok(Self { train, val, test })
    }

    pub fn train(&self) -> f64 {
        self.train
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn test(&self) -> f64 {
        self.test
    }

    /// Parse a `train,val,test` triple such as `0.8,0.1,0.1`.
    pub fn parse(raw: &str) -> Result<Self, LabelforgeError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(LabelforgeError::invalid(format!(
                "expected three comma-separated ratios, got '{raw}'"
            )));
        }

        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| LabelforgeError::invalid(format!("invalid ratio '{part}'")))?;
        }

        Self::new(values[0], values[1], values[2])
    }

    /// JSON descriptor stored on the version row, e.g. `{"train":0.8,"val":0.1,"test":0.1}`.
    pub fn descriptor(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Inverse of [`SplitRatios::descriptor`].
    pub fn from_descriptor(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

impl FromStr for SplitRatios {
    type Err = LabelforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Number of assets per split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl SplitCounts {
    /// Derive counts for `total` assets.
    ///
    /// `train` and `val` are rounded; `test` takes whatever is left. When
    /// rounding overshoots (e.g. two 0.5 ratios on a single asset) `val` is
    /// clamped so the counts never exceed `total`.
    pub fn for_total(total: usize, ratios: &SplitRatios) -> Self {
        let train = ((total as f64 * ratios.train()).round() as usize).min(total);
        let val = ((total as f64 * ratios.val()).round() as usize).min(total - train);
        let test = total - train - val;
        Self { train, val, test }
    }

    pub fn total(&self) -> usize {
        self.train + self.val + self.test
    }

    pub fn get(&self, split: Split) -> usize {
        match split {
            Split::Train => self.train,
            Split::Val => self.val,
            Split::Test => self.test,
        }
    }
}

impl fmt::Display for SplitCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "train={} val={} test={}",
            self.train, self.val, self.test
        )
    }
}

/// How the asset order is shuffled before assignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShuffleMode {
    /// Fresh randomness on every save; partitions move between runs.
    #[default]
    Random,
    /// Seeded from the version id; an unchanged asset set keeps its partition.
    PerVersion,
}

/// Result of partitioning: the counts and each item's split.
#[derive(Clone, Debug)]
pub struct Partition<T> {
    pub counts: SplitCounts,
    pub assignments: Vec<(T, Split)>,
}

impl<T> Partition<T> {
    /// Items assigned to `split`, in assignment order.
    pub fn members(&self, split: Split) -> impl Iterator<Item = &T> {
        self.assignments
            .iter()
            .filter(move |(_, s)| *s == split)
            .map(|(item, _)| item)
    }
}

/// Shuffle `items` and assign them to splits according to `ratios`.
pub fn partition<T>(mut items: Vec<T>, ratios: &SplitRatios, seed: Option<u64>) -> Partition<T> {
    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        items.shuffle(&mut rng);
    }

    assign_in_order(items, ratios)
}

/// Assign already-ordered items: first `train` to Train, next `val` to Val, rest to Test.
pub fn assign_in_order<T>(items: Vec<T>, ratios: &SplitRatios) -> Partition<T> {
    let counts = SplitCounts::for_total(items.len(), ratios);

    let assignments = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let split = if idx < counts.train {
                Split::Train
            } else if idx < counts.train + counts.val {
                Split::Val
            } else {
                Split::Test
            };
            (item, split)
        })
        .collect();

    Partition {
        counts,
        assignments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_assets_split_eight_one_one() {
        let counts = SplitCounts::for_total(10, &SplitRatios::default());
        assert_eq!(
            counts,
            SplitCounts {
                train: 8,
                val: 1,
                test: 1
            }
        );
    }

    #[test]
    fn single_asset_goes_to_train() {
        let counts = SplitCounts::for_total(1, &SplitRatios::default());
        assert_eq!(
            counts,
            SplitCounts {
                train: 1,
                val: 0,
                test: 0
            }
        );
    }

    #[test]
    fn empty_input_is_a_noop() {
        let p = partition(Vec::<u32>::new(), &SplitRatios::default(), None);
        assert_eq!(p.counts.total(), 0);
        assert!(p.assignments.is_empty());
    }

    #[test]
    fn overshooting_rounding_is_clamped() {
        let ratios = SplitRatios::new(0.5, 0.5, 0.0).unwrap();
        let counts = SplitCounts::for_total(1, &ratios);
        assert_eq!(counts.total(), 1);
        assert_eq!(counts.train, 1);
        assert_eq!(counts.val, 0);
    }

    #[test]
    fn assignment_follows_order() {
        let p = assign_in_order((0..10).collect::<Vec<_>>(), &SplitRatios::default());
        let train: Vec<_> = p.members(Split::Train).copied().collect();
        assert_eq!(train, (0..8).collect::<Vec<_>>());
        assert_eq!(p.members(Split::Val).copied().collect::<Vec<_>>(), vec![8]);
        assert_eq!(p.members(Split::Test).copied().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn seeded_partition_is_reproducible() {
        let items: Vec<u32> = (0..50).collect();
        let a = partition(items.clone(), &SplitRatios::default(), Some(7));
        let b = partition(items, &SplitRatios::default(), Some(7));
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn ratios_must_sum_to_one() {
        assert!(SplitRatios::new(0.7, 0.2, 0.2).is_err());
        assert!(SplitRatios::new(0.7, 0.2, 0.1).is_ok());
        assert!(SplitRatios::new(1.1, -0.1, 0.0).is_err());
    }

    #[test]
    fn parse_and_descriptor() {
        let ratios = SplitRatios::parse("0.7, 0.2, 0.1").expect("parse ratios");
        assert_eq!((ratios.train(), ratios.val(), ratios.test()), (0.7, 0.2, 0.1));
        assert!(SplitRatios::parse("0.7,0.3").is_err());
        assert!(SplitRatios::parse("a,b,c").is_err());

        let descriptor = SplitRatios::default().descriptor();
        assert_eq!(descriptor, r#"{"train":0.8,"val":0.1,"test":0.1}"#);
        assert_eq!(
            SplitRatios::from_descriptor(&descriptor),
            Some(SplitRatios::default())
        );
        assert_eq!(
            SplitRatios::from_descriptor(r#"{"train":0.9,"val":0.9,"test":0.9}"#),
            None
        );
        assert_eq!(
            SplitRatios::from_descriptor(r#"{"train":1.5,"val":-0.5,"test":0.0}"#),
            None
        );
    }

    #[test]
    fn split_names_round_trip() {
        for split in Split::ALL {
            assert_eq!(split.as_str().parse::<Split>().unwrap(), split);
        }
        assert!("holdout".parse::<Split>().is_err());
        assert!("valid".parse::<Split>().is_err());
    }
}
