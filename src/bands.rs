//! Reference bands and ROM classification
//!
//! Reference bands are clinical ranges of motion keyed by camera view, activity
//! and joint group. They are immutable configuration data: the built-in table is
//! constructed once and callers layer overrides on a copy.
//!
//! Classification checks good bands first, then moderate, then bad. Some cells
//! declare a bad range that contains the good range (side/walking knee is
//! 0-80 around a 50-70 sweet spot); priority order resolves those overlaps, and a
//! value matching no declared band is a major opportunity.

use crate::config::BandOverride;
use crate::types::{Activity, CameraView, JointGroup};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Inclusive range in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Classification of a joint's range of motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    SweetSpot,
    MinorOpportunity,
    MajorOpportunity,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::SweetSpot => "sweet_spot",
            Classification::MinorOpportunity => "minor_opportunity",
            Classification::MajorOpportunity => "major_opportunity",
        }
    }

    /// Heading used by report renderers
    pub fn label(&self) -> &'static str {
        match self {
            Classification::SweetSpot => "STRIDE SWEET SPOT",
            Classification::MinorOpportunity => "MINOR IMPROVEMENT OPPORTUNITY",
            Classification::MajorOpportunity => "MAJOR IMPROVEMENT OPPORTUNITY",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Good/moderate/bad ranges for one joint group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointBands {
    pub good: Vec<Band>,
    pub moderate: Vec<Band>,
    pub bad: Vec<Band>,
}

impl JointBands {
    fn from_pairs(good: &[(f64, f64)], moderate: &[(f64, f64)], bad: &[(f64, f64)]) -> Self {
        let to_bands = |pairs: &[(f64, f64)]| {
            pairs
                .iter()
                .map(|&(min, max)| Band::new(min, max))
                .collect::<Vec<_>>()
        };
        Self {
            good: to_bands(good),
            moderate: to_bands(moderate),
            bad: to_bands(bad),
        }
    }

    /// Ordered membership: good, then moderate, then major by default
    pub fn classify(&self, value: f64) -> Classification {
        if self.good.iter().any(|b| b.contains(value)) {
            Classification::SweetSpot
        } else if self.moderate.iter().any(|b| b.contains(value)) {
            Classification::MinorOpportunity
        } else {
            Classification::MajorOpportunity
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for band in self.good.iter().chain(&self.moderate).chain(&self.bad) {
            if !band.min.is_finite() || !band.max.is_finite() {
                return Err("band bounds must be finite".to_string());
            }
            if band.min > band.max {
                return Err(format!("band min {} exceeds max {}", band.min, band.max));
            }
        }
        Ok(())
    }
}

type BandKey = (CameraView, Activity, JointGroup);

/// Bands of every group for one view and activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandTable {
    pub view: CameraView,
    pub activity: Activity,
    pub groups: BTreeMap<JointGroup, JointBands>,
}

/// Reference bands for every (view, activity, group) cell
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceBandSet {
    cells: HashMap<BandKey, JointBands>,
}

impl ReferenceBandSet {
    /// The built-in clinical table, built on first use
    pub fn standard() -> &'static ReferenceBandSet {
        static STANDARD: OnceLock<ReferenceBandSet> = OnceLock::new();
        STANDARD.get_or_init(build_standard_table)
    }

    /// An empty set; every lookup misses
    pub fn empty() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Copy of this set with the given cells replaced
    pub fn with_overrides(&self, overrides: &[BandOverride]) -> ReferenceBandSet {
        let mut set = self.clone();
        for o in overrides {
            set.insert(o.view, o.activity, o.group, o.bands.clone());
        }
        set
    }

    pub fn insert(
        &mut self,
        view: CameraView,
        activity: Activity,
        group: JointGroup,
        bands: JointBands,
    ) {
        self.cells.insert((view, activity, group), bands);
    }

    pub fn get(
        &self,
        view: CameraView,
        activity: Activity,
        group: JointGroup,
    ) -> Option<&JointBands> {
        self.cells.get(&(view, activity, group))
    }

    /// Classify a ROM value; cells without bands classify as major opportunity
    pub fn classify(
        &self,
        view: CameraView,
        activity: Activity,
        group: JointGroup,
        value: f64,
    ) -> Classification {
        match self.get(view, activity, group) {
            Some(bands) => bands.classify(value),
            None => Classification::MajorOpportunity,
        }
    }

    /// The cells of one view and activity, groups without bands omitted
    pub fn table(&self, view: CameraView, activity: Activity) -> BandTable {
        let groups = JointGroup::ALL
            .iter()
            .filter_map(|&g| self.get(view, activity, g).map(|b| (g, b.clone())))
            .collect();
        BandTable {
            view,
            activity,
            groups,
        }
    }

    /// Whether any group has bands for this context
    pub fn covers(&self, view: CameraView, activity: Activity) -> bool {
        JointGroup::ALL
            .iter()
            .any(|&g| self.cells.contains_key(&(view, activity, g)))
    }
}

fn build_standard_table() -> ReferenceBandSet {
    use Activity::*;
    use CameraView::*;
    use JointGroup::*;

    let mut set = ReferenceBandSet::empty();
    let mut add = |view, activity, group, good: &[(f64, f64)], moderate: &[(f64, f64)], bad: &[(f64, f64)]| {
        set.insert(view, activity, group, JointBands::from_pairs(good, moderate, bad));
    };

    add(Side, Walking, Spine, &[(0.0, 5.0)], &[(5.0, 10.0)], &[(10.0, 30.0)]);
    add(Side, Walking, Hip, &[(25.0, 45.0)], &[(15.0, 25.0)], &[(0.0, 15.0)]);
    add(Side, Walking, Knee, &[(50.0, 70.0)], &[(40.0, 50.0)], &[(0.0, 80.0)]);
    add(Side, Walking, Ankle, &[(20.0, 45.0)], &[(15.0, 20.0)], &[(0.0, 55.0)]);

    add(Back, Walking, Spine, &[(0.0, 5.0)], &[(5.0, 10.0)], &[(10.0, 30.0)]);
    add(Back, Walking, Hip, &[(0.0, 10.0)], &[(10.0, 15.0)], &[(15.0, 50.0)]);
    add(Back, Walking, Knee, &[(0.0, 5.0)], &[(5.0, 10.0)], &[(10.0, 30.0)]);
    add(Back, Walking, Ankle, &[(20.0, 50.0)], &[(15.0, 20.0)], &[(0.0, 15.0)]);

    add(Side, Running, Spine, &[(5.0, 15.0)], &[(2.0, 20.0)], &[(0.0, 30.0)]);
    add(Side, Running, Hip, &[(60.0, 70.0)], &[(40.0, 90.0)], &[(40.0, 90.0)]);
    add(Side, Running, Knee, &[(120.0, 130.0)], &[(90.0, 175.0)], &[(90.0, 175.0)]);
    add(Side, Running, Ankle, &[(65.0, 75.0)], &[(55.0, 85.0)], &[(55.0, 95.0)]);

    add(Back, Running, Spine, &[(1.0, 10.0)], &[(10.0, 20.0)], &[(20.0, 30.0)]);
    add(Back, Running, Hip, &[(0.0, 10.0)], &[(10.0, 20.0)], &[(20.0, 40.0)]);
    add(Back, Running, Knee, &[(0.0, 5.0)], &[(5.0, 10.0)], &[(10.0, 30.0)]);
    add(Back, Running, Ankle, &[(20.0, 50.0)], &[(15.0, 20.0)], &[(0.0, 15.0)]);

    // Reach task: too little and too much motion are both penalised
    add(Side, PickupPen, Spine, &[(30.0, 60.0)], &[(20.0, 30.0), (60.0, 75.0)], &[(0.0, 20.0), (75.0, 90.0)]);
    add(Side, PickupPen, Hip, &[(50.0, 90.0)], &[(40.0, 50.0), (90.0, 100.0)], &[(0.0, 40.0), (100.0, 120.0)]);
    add(Side, PickupPen, Knee, &[(20.0, 70.0)], &[(10.0, 20.0), (70.0, 90.0)], &[(0.0, 10.0), (90.0, 120.0)]);
    add(Side, PickupPen, Ankle, &[(10.0, 25.0)], &[(5.0, 10.0), (25.0, 35.0)], &[(0.0, 5.0), (35.0, 45.0)]);

    for group in JointGroup::ALL {
        add(Back, PickupPen, group, &[(0.0, 5.0)], &[(5.0, 10.0)], &[(10.0, 20.0)]);
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_covers_every_cell() {
        let set = ReferenceBandSet::standard();
        for view in CameraView::ALL {
            for activity in Activity::ALL {
                for group in JointGroup::ALL {
                    let bands = set.get(view, activity, group);
                    assert!(bands.is_some(), "missing {view}/{activity}/{group:?}");
                    assert!(bands.unwrap().validate().is_ok());
                }
            }
        }
    }

    #[test]
    fn test_priority_good_over_moderate_at_shared_boundary() {
        let set = ReferenceBandSet::standard();
        // 50 closes knee moderate (40-50) and opens knee good (50-70)
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 50.0),
            Classification::SweetSpot
        );
        // 15 closes ankle moderate (15-20) and the bad band (0-15) in back/walking
        assert_eq!(
            set.classify(CameraView::Back, Activity::Walking, JointGroup::Ankle, 15.0),
            Classification::MinorOpportunity
        );
    }

    #[test]
    fn test_inclusive_bounds() {
        let set = ReferenceBandSet::standard();
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 70.0),
            Classification::SweetSpot
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 40.0),
            Classification::MinorOpportunity
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 39.9),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_bad_band_containing_good_band() {
        // side/walking knee bad (0-80) fully contains good (50-70)
        let set = ReferenceBandSet::standard();
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 60.0),
            Classification::SweetSpot
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 75.0),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_value_outside_all_bands_is_major() {
        let set = ReferenceBandSet::standard();
        assert_eq!(
            set.classify(CameraView::Back, Activity::Walking, JointGroup::Knee, 95.0),
            Classification::MajorOpportunity
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::Running, JointGroup::Knee, -3.0),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_pickup_pen_upper_bands() {
        let set = ReferenceBandSet::standard();
        assert_eq!(
            set.classify(CameraView::Side, Activity::PickupPen, JointGroup::Hip, 95.0),
            Classification::MinorOpportunity
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::PickupPen, JointGroup::Hip, 110.0),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_missing_cell_is_major() {
        let set = ReferenceBandSet::empty();
        assert!(!set.covers(CameraView::Side, Activity::Walking));
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Hip, 30.0),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_overrides_replace_only_their_cell() {
        let overrides = vec![BandOverride {
            view: CameraView::Side,
            activity: Activity::Walking,
            group: JointGroup::Knee,
            bands: JointBands::from_pairs(&[(10.0, 30.0)], &[], &[]),
        }];
        let set = ReferenceBandSet::standard().with_overrides(&overrides);
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Knee, 20.0),
            Classification::SweetSpot
        );
        assert_eq!(
            set.classify(CameraView::Side, Activity::Walking, JointGroup::Hip, 30.0),
            Classification::SweetSpot
        );
        // The shared table is untouched
        assert_eq!(
            ReferenceBandSet::standard().classify(
                CameraView::Side,
                Activity::Walking,
                JointGroup::Knee,
                20.0
            ),
            Classification::MajorOpportunity
        );
    }

    #[test]
    fn test_table_lists_groups_in_order() {
        let table = ReferenceBandSet::standard().table(CameraView::Side, Activity::Walking);
        let groups: Vec<_> = table.groups.keys().copied().collect();
        assert_eq!(groups, JointGroup::ALL.to_vec());
        assert_eq!(table.groups[&JointGroup::Knee].good, vec![Band::new(50.0, 70.0)]);

        let empty = ReferenceBandSet::empty().table(CameraView::Back, Activity::Running);
        assert!(empty.groups.is_empty());
    }
}
