//! Footwear and training recommendations
//!
//! Both recommenders are rule tables over a small feature vector of averaged
//! ROM values. Frontal-plane (back view) rules come before sagittal-plane
//! refinements. Footwear takes the first matching rule; training collects every
//! matching rule in table order.

use crate::rom::RomRecord;
use crate::types::{Activity, CameraView, JointGroup};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Averaged ROM per joint group (degrees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RomFeatures {
    pub ankle: Option<f64>,
    pub knee: Option<f64>,
    pub hip: Option<f64>,
    pub spine: Option<f64>,
}

impl RomFeatures {
    /// Mean of the available sides of each group
    pub fn from_records(records: &[RomRecord]) -> Self {
        let group_mean = |group: JointGroup| {
            let values: Vec<f64> = records
                .iter()
                .filter(|r| r.joint.group() == group)
                .filter_map(RomRecord::value)
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        Self {
            ankle: group_mean(JointGroup::Ankle),
            knee: group_mean(JointGroup::Knee),
            hip: group_mean(JointGroup::Hip),
            spine: group_mean(JointGroup::Spine),
        }
    }

    pub fn get(&self, group: JointGroup) -> Option<f64> {
        match group {
            JointGroup::Ankle => self.ankle,
            JointGroup::Knee => self.knee,
            JointGroup::Hip => self.hip,
            JointGroup::Spine => self.spine,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Cmp {
    Above,
    Below,
}

/// Strict threshold test on one feature; a missing feature never matches
#[derive(Debug, Clone, Copy)]
struct Condition {
    group: JointGroup,
    cmp: Cmp,
    threshold: f64,
}

impl Condition {
    fn holds(&self, features: &RomFeatures) -> bool {
        match (features.get(self.group), self.cmp) {
            (Some(v), Cmp::Above) => v > self.threshold,
            (Some(v), Cmp::Below) => v < self.threshold,
            (None, _) => false,
        }
    }
}

const fn above(group: JointGroup, threshold: f64) -> Condition {
    Condition {
        group,
        cmp: Cmp::Above,
        threshold,
    }
}

const fn below(group: JointGroup, threshold: f64) -> Condition {
    Condition {
        group,
        cmp: Cmp::Below,
        threshold,
    }
}

#[derive(Debug, Clone, Copy)]
enum Predicate {
    Any(&'static [Condition]),
    All(&'static [Condition]),
    NoneOf(&'static [Condition]),
}

impl Predicate {
    fn holds(&self, features: &RomFeatures) -> bool {
        match self {
            Predicate::Any(c) => c.iter().any(|c| c.holds(features)),
            Predicate::All(c) => c.iter().all(|c| c.holds(features)),
            Predicate::NoneOf(c) => !c.iter().any(|c| c.holds(features)),
        }
    }
}

/// Applies to gait activities only
const GAIT: &[Activity] = &[Activity::Walking, Activity::Running];
const ANY_ACTIVITY: &[Activity] = &[Activity::Walking, Activity::Running, Activity::PickupPen];

struct Rule<T: 'static> {
    view: CameraView,
    activities: &'static [Activity],
    when: Predicate,
    then: T,
}

impl<T> Rule<T> {
    fn matches(&self, features: &RomFeatures, view: CameraView, activity: Activity) -> bool {
        self.view == view && self.activities.contains(&activity) && self.when.holds(features)
    }
}

/// Shoe category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootwearCategory {
    MotionControl,
    Stability,
    MaxCushioning,
    Minimalist,
    Neutral,
}

impl FootwearCategory {
    pub fn label(&self) -> &'static str {
        match self {
            FootwearCategory::MotionControl => "Motion Control",
            FootwearCategory::Stability => "Stability",
            FootwearCategory::MaxCushioning => "Maximum Cushioning",
            FootwearCategory::Minimalist => "Minimalist/Neutral",
            FootwearCategory::Neutral => "Neutral",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FootwearCategory::MotionControl => {
                "Excessive overpronation and knee valgus detected. Shoes with extra support on the inside of the foot help guide your stride and reduce extra inward rolling."
            }
            FootwearCategory::Stability => {
                "Moderate overpronation detected. Dual-density midsole and guided motion control recommended."
            }
            FootwearCategory::MaxCushioning => {
                "Limited ankle mobility and heel-strike pattern detected. Enhanced shock absorption needed."
            }
            FootwearCategory::Minimalist => {
                "Excellent mobility and efficient movement pattern. Minimal interference recommended."
            }
            FootwearCategory::Neutral => {
                "Balanced biomechanics detected. Standard neutral support recommended."
            }
        }
    }
}

impl fmt::Display for FootwearCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootwearRecommendation {
    pub category: FootwearCategory,
    pub reason: String,
}

impl From<FootwearCategory> for FootwearRecommendation {
    fn from(category: FootwearCategory) -> Self {
        Self {
            category,
            reason: category.reason().to_string(),
        }
    }
}

const SEVERE_PRONATION: &[Condition] = &[above(JointGroup::Ankle, 20.0), above(JointGroup::Knee, 15.0)];
const MODERATE_PRONATION: &[Condition] = &[
    above(JointGroup::Ankle, 15.0),
    above(JointGroup::Knee, 10.0),
    above(JointGroup::Hip, 15.0),
];
const HEEL_STRIKE: &[Condition] = &[below(JointGroup::Ankle, 30.0), above(JointGroup::Spine, 10.0)];
const HIGH_MOBILITY: &[Condition] = &[above(JointGroup::Ankle, 60.0), above(JointGroup::Knee, 100.0)];

static FOOTWEAR_RULES: &[Rule<FootwearCategory>] = &[
    Rule {
        view: CameraView::Back,
        activities: ANY_ACTIVITY,
        when: Predicate::Any(SEVERE_PRONATION),
        then: FootwearCategory::MotionControl,
    },
    Rule {
        view: CameraView::Back,
        activities: ANY_ACTIVITY,
        when: Predicate::Any(MODERATE_PRONATION),
        then: FootwearCategory::Stability,
    },
    Rule {
        view: CameraView::Side,
        activities: GAIT,
        when: Predicate::All(HEEL_STRIKE),
        then: FootwearCategory::MaxCushioning,
    },
    Rule {
        view: CameraView::Side,
        activities: GAIT,
        when: Predicate::All(HIGH_MOBILITY),
        then: FootwearCategory::Minimalist,
    },
];

pub fn recommend_footwear(
    features: &RomFeatures,
    view: CameraView,
    activity: Activity,
) -> FootwearRecommendation {
    FOOTWEAR_RULES
        .iter()
        .find(|r| r.matches(features, view, activity))
        .map(|r| r.then)
        .unwrap_or(FootwearCategory::Neutral)
        .into()
}

/// Exercise text as stored in the rule table
#[derive(Debug, Clone, Copy)]
struct ExerciseText {
    name: &'static str,
    description: &'static str,
    target: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub description: String,
    pub target: String,
}

impl From<&ExerciseText> for Exercise {
    fn from(text: &ExerciseText) -> Self {
        Self {
            name: text.name.to_string(),
            description: text.description.to_string(),
            target: text.target.to_string(),
        }
    }
}

const GLUTE_BRIDGE: ExerciseText = ExerciseText {
    name: "Single-Leg Glute Bridge",
    description: "3x12 each leg. Strengthens hip abductors to control knee valgus and pelvic stability.",
    target: "Hip abductor strength, pelvic control",
};

const INVERSION_CALF_RAISE: ExerciseText = ExerciseText {
    name: "Calf Raises with Inversion Hold",
    description: "3x15 with 3-sec hold. Strengthens posterior tibialis to control excessive pronation.",
    target: "Ankle stability, pronation control",
};

const LATERAL_BAND_WALK: ExerciseText = ExerciseText {
    name: "Lateral Band Walks",
    description: "3x15 each direction. Maintains hip abductor strength and lateral stability.",
    target: "Hip stability maintenance",
};

const DORSIFLEXION_STRETCH: ExerciseText = ExerciseText {
    name: "Wall Ankle Dorsiflexion Stretch",
    description: "3x30 seconds each foot. Improves ankle mobility for better heel-to-toe transition.",
    target: "Ankle dorsiflexion, calf flexibility",
};

const HIP_90_90: ExerciseText = ExerciseText {
    name: "90/90 Hip Stretch + Hip Flexor Activation",
    description: "3x30 sec stretch + 10 leg lifts. Improves hip flexion ROM and activation.",
    target: "Hip mobility and flexor strength",
};

const WALL_SIT: ExerciseText = ExerciseText {
    name: "Wall Sits with Calf Raises",
    description: "3x45 seconds. Builds knee flexion endurance and calf strength simultaneously.",
    target: "Knee flexion endurance, shock absorption",
};

const DEAD_BUG: ExerciseText = ExerciseText {
    name: "Dead Bug with Opposite Arm/Leg",
    description: "3x10 each side. Improves core stability and trunk control during movement.",
    target: "Core stability, trunk alignment",
};

const GENERAL_PROGRAM: &[ExerciseText] = &[
    ExerciseText {
        name: "Single-Leg Romanian Deadlift",
        description: "3x8 each leg. Maintains posterior chain strength and balance.",
        target: "Overall stability and strength",
    },
    ExerciseText {
        name: "Calf Raise to Heel Walk",
        description: "3x10 transitions. Enhances ankle control through full range of motion.",
        target: "Ankle strength and control",
    },
];

const OVERPRONATION: &[Condition] = &[above(JointGroup::Ankle, 15.0), above(JointGroup::Knee, 10.0)];
const LIMITED_ANKLE: &[Condition] = &[below(JointGroup::Ankle, 30.0)];
const LIMITED_HIP: &[Condition] = &[below(JointGroup::Hip, 35.0)];
const LIMITED_KNEE: &[Condition] = &[below(JointGroup::Knee, 60.0)];
const POOR_TRUNK_CONTROL: &[Condition] = &[above(JointGroup::Spine, 15.0), below(JointGroup::Spine, 3.0)];

static TRAINING_RULES: &[Rule<&[ExerciseText]>] = &[
    Rule {
        view: CameraView::Back,
        activities: ANY_ACTIVITY,
        when: Predicate::Any(OVERPRONATION),
        then: &[GLUTE_BRIDGE, INVERSION_CALF_RAISE],
    },
    Rule {
        view: CameraView::Back,
        activities: ANY_ACTIVITY,
        when: Predicate::NoneOf(OVERPRONATION),
        then: &[LATERAL_BAND_WALK],
    },
    Rule {
        view: CameraView::Side,
        activities: GAIT,
        when: Predicate::All(LIMITED_ANKLE),
        then: &[DORSIFLEXION_STRETCH],
    },
    Rule {
        view: CameraView::Side,
        activities: GAIT,
        when: Predicate::All(LIMITED_HIP),
        then: &[HIP_90_90],
    },
    Rule {
        view: CameraView::Side,
        activities: GAIT,
        when: Predicate::All(LIMITED_KNEE),
        then: &[WALL_SIT],
    },
    Rule {
        view: CameraView::Side,
        activities: ANY_ACTIVITY,
        when: Predicate::Any(POOR_TRUNK_CONTROL),
        then: &[DEAD_BUG],
    },
];

/// Every matching exercise in rule order, falling back to a general program
pub fn recommend_training(
    features: &RomFeatures,
    view: CameraView,
    activity: Activity,
) -> Vec<Exercise> {
    let mut exercises: Vec<Exercise> = TRAINING_RULES
        .iter()
        .filter(|r| r.matches(features, view, activity))
        .flat_map(|r| r.then.iter().map(Exercise::from))
        .collect();
    if exercises.is_empty() {
        exercises = GENERAL_PROGRAM.iter().map(Exercise::from).collect();
    }
    exercises
}
