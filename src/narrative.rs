//! Pre-authored narrative text
//!
//! Report renderers look up a short clinical explanation per joint group,
//! camera view, activity and classification. Pickup-pen has no authored text.

use crate::bands::Classification;
use crate::types::{Activity, CameraView, JointGroup};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lookup key, rendered as `<group>.<view>.<activity>.<classification>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NarrativeKey {
    pub group: JointGroup,
    pub view: CameraView,
    pub activity: Activity,
    pub classification: Classification,
}

impl NarrativeKey {
    pub fn new(
        group: JointGroup,
        view: CameraView,
        activity: Activity,
        classification: Classification,
    ) -> Self {
        Self {
            group,
            view,
            activity,
            classification,
        }
    }

    pub fn text(&self) -> Option<&'static str> {
        NARRATIVES
            .iter()
            .find(|(g, v, a, c, _)| {
                *g == self.group && *v == self.view && *a == self.activity && *c == self.classification
            })
            .map(|(.., text)| *text)
    }
}

impl fmt::Display for NarrativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.group.as_str(),
            self.view,
            self.activity,
            self.classification
        )
    }
}

/// Narrative attached to a joint in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub key: String,
    /// `None` when no text is authored for the key
    pub text: Option<String>,
}

impl Narrative {
    /// Placeholder for a joint that was not classified
    pub fn not_computed(group: JointGroup, view: CameraView, activity: Activity) -> Self {
        Self {
            key: format!("{}.{}.{}.not_computed", group.as_str(), view, activity),
            text: None,
        }
    }
}

impl From<NarrativeKey> for Narrative {
    fn from(key: NarrativeKey) -> Self {
        Self {
            key: key.to_string(),
            text: key.text().map(str::to_string),
        }
    }
}

use Activity::{Running, Walking};
use CameraView::{Back, Side};
use Classification::{MajorOpportunity as Major, MinorOpportunity as Minor, SweetSpot as Sweet};
use JointGroup::{Ankle, Hip, Knee, Spine};

type Entry = (JointGroup, CameraView, Activity, Classification, &'static str);

static NARRATIVES: &[Entry] = &[
    // spine
    (Spine, Side, Walking, Sweet, "Neutral alignment (±2.5° from vertical) helps maintain natural lumbar lordosis/thoracic kyphosis for optimal shock absorption and energy transfer."),
    (Spine, Side, Running, Sweet, "Neutral alignment (±7.5° from vertical) helps maintain natural lumbar lordosis/thoracic kyphosis for optimal shock absorption and energy transfer."),
    (Spine, Back, Walking, Sweet, "Minimal lateral deviation (<2.5° per side) which correlates with hip abductor strength and balanced step width."),
    (Spine, Back, Running, Sweet, "Minimal lateral deviation (<5° per side) which correlates with hip abductor strength and balanced step width."),
    (Spine, Side, Walking, Minor, "Moderate forward lean (5-7°) or backward lean (3-5°) is associated with reduced hip extension or ankle mobility deficits, increasing lumbar spine compensatory flexion."),
    (Spine, Side, Running, Minor, "Moderate forward lean or backward lean is associated with reduced hip extension or ankle mobility deficits, increasing lumbar spine compensatory flexion."),
    (Spine, Back, Walking, Minor, "Moderate lateral lean (5-7° per side), often compensating for hip adduction or ankle inversion/eversion asymmetry."),
    (Spine, Back, Running, Minor, "Moderate lateral lean (5-10° per side), often compensating for hip adduction or ankle inversion/eversion asymmetry."),
    (Spine, Side, Walking, Major, "Not enough trunk lean: Lack of forward lean (walking too upright) reduces forward propulsion, which limits ankle propulsion and increases risk of calf strain. Too much trunk lean: Severe anterior/posterior tilt, altering pelvic orientation, is linked to hamstring strain (excessive forward lean) or facet joint compression (excessive backward lean)."),
    (Spine, Side, Running, Major, "Not enough trunk lean: Lack of forward lean (running too upright) reduces forward propulsion, which limits ankle propulsion and increases risk of calf strain. Too much trunk lean: Severe anterior/posterior tilt, altering pelvic orientation, is linked to hamstring strain (excessive forward lean) or facet joint compression (excessive backward lean)."),
    (Spine, Back, Walking, Major, "Pronounced lateral bending (>10° per side), increases spinal disc shear forces and is associated with unilateral hip weakness or ankle instability."),
    (Spine, Back, Running, Major, "Pronounced lateral bending (>10° per side), increases spinal disc shear forces and is associated with unilateral hip weakness or ankle instability."),
    // hip
    (Hip, Side, Walking, Sweet, "Hip flexion at initial contact (~30°) and extension during stance optimize propulsion."),
    (Hip, Side, Running, Sweet, "Hip flexion at initial contact (~50°) and extension during stance optimize propulsion."),
    (Hip, Back, Walking, Sweet, "Minimal motion maintains coronal alignment and reduces hip abductor fatigue."),
    (Hip, Back, Running, Sweet, "Minimal motion maintains coronal alignment and reduces hip abductor fatigue."),
    (Hip, Side, Walking, Minor, "Moderately limited hip range of motion increases lumbar spine compensation and hamstring strain."),
    (Hip, Side, Running, Minor, "Moderately limited range of motion increases lumbar spine compensation and hamstring strain."),
    (Hip, Back, Walking, Minor, "Moderate levels of increased pelvic drop heightens iliotibial band syndrome risk."),
    (Hip, Back, Running, Minor, "Moderate levels of increased pelvic drop heightens iliotibial band syndrome risk."),
    (Hip, Side, Walking, Major, "Severe restriction (<15° flexion-extension) alters pelvic tilt and elevates lower back pain risk."),
    (Hip, Side, Running, Major, "Severe restriction (<40°) or poorly controlled motion (>90°) alters pelvic tilt and elevates lower back pain risk."),
    (Hip, Back, Walking, Major, "Excessive adduction correlates with tibial stress fractures and labral impingement."),
    (Hip, Back, Running, Major, "Excessive adduction correlates with tibial stress fractures and labral impingement."),
    // knee
    (Knee, Side, Walking, Sweet, "50-70° knee flexion during stance phase optimizes shock absorption."),
    (Knee, Side, Running, Sweet, "Good knee flexion during stance phase optimizes shock absorption."),
    (Knee, Back, Walking, Sweet, "Minimal valgus/varus motion protects against patellofemoral knee pain."),
    (Knee, Back, Running, Sweet, "Minimal valgus/varus motion protects against patellofemoral knee pain."),
    (Knee, Side, Walking, Minor, "Moderately reduced flexion increases patellofemoral joint stress."),
    (Knee, Side, Running, Minor, "Reduced flexion increases patellofemoral joint stress."),
    (Knee, Back, Walking, Minor, "Moderate adduction/abduction correlates with early cartilage wear."),
    (Knee, Back, Running, Minor, "Moderate adduction/abduction correlates with early cartilage wear."),
    (Knee, Side, Walking, Major, "You have limited knee flexion, which may reduce running efficiency. Consider deep squats, hamstring stretches, and eccentric loading to improve flexibility."),
    (Knee, Side, Running, Major, "Stiff-knee gait raises ACL injury risk due to poor energy dissipation."),
    (Knee, Back, Walking, Major, "High knee adduction valgus/varus motion can result in patellofemoral knee pain."),
    (Knee, Back, Running, Major, "High knee adduction valgus/varus motion can result in patellofemoral knee pain."),
    // ankle
    (Ankle, Side, Walking, Sweet, "Good ankle motion facilitates smooth heel-to-toe transition and shock absorption."),
    (Ankle, Side, Running, Sweet, "Good ankle motion facilitates smooth heel-to-toe transition and shock absorption."),
    (Ankle, Back, Walking, Sweet, "Healthy ankle range of motion in the frontal plane allows the foot to move inward (inversion) and outward (eversion) smoothly. This range supports stable, adaptable movement during activities like walking, helping the foot absorb shock and adjust to uneven surfaces."),
    (Ankle, Back, Running, Sweet, "Healthy ankle range of motion in the frontal plane allows the foot to move inward (inversion) and outward (eversion) smoothly, with a total range of about 35 degrees-typically up to 23 degrees of inversion and 12 degrees of eversion. This range supports stable, adaptable movement during running, helping the foot absorb shock and adjust to uneven surfaces."),
    (Ankle, Side, Walking, Minor, "Slightly reduced ankle range of motion increases forefoot loading and compensatory knee motion."),
    (Ankle, Side, Running, Minor, "Slightly reduced ankle range of motion increases forefoot loading and compensatory knee motion."),
    (Ankle, Back, Walking, Minor, "Moderately limits lateral balance control, reducing walking stability in older adults."),
    (Ankle, Back, Running, Minor, "Moderately limits lateral balance control, reducing walking stability in older adults."),
    (Ankle, Side, Walking, Major, "Severe dorsiflexion deficits (<5°) or excessive plantarflexion (>50°) elevates risk of plantar fasciitis and Achilles tendinopathy."),
    (Ankle, Side, Running, Major, "Severe dorsiflexion deficits (<5°) or excessive plantarflexion elevates risk of plantar fasciitis and Achilles tendinopathy."),
    (Ankle, Back, Walking, Major, "Associated with instability, compensatory pelvic motion, and medial tibial stress syndrome."),
    (Ankle, Back, Running, Major, "Associated with instability, compensatory pelvic motion, and medial tibial stress syndrome."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = NarrativeKey::new(Knee, Side, Walking, Sweet);
        assert_eq!(key.to_string(), "knee.side.walking.sweet_spot");

        let key = NarrativeKey::new(Spine, Back, Activity::PickupPen, Major);
        assert_eq!(key.to_string(), "spine.back.pickup-pen.major_opportunity");
    }

    #[test]
    fn test_every_gait_cell_has_text() {
        for group in JointGroup::ALL {
            for view in CameraView::ALL {
                for activity in [Walking, Running] {
                    for class in [Sweet, Minor, Major] {
                        let key = NarrativeKey::new(group, view, activity, class);
                        assert!(key.text().is_some(), "missing narrative for {key}");
                    }
                }
            }
        }
        assert_eq!(NARRATIVES.len(), 48);
    }

    #[test]
    fn test_pickup_pen_has_no_text() {
        let narrative = Narrative::from(NarrativeKey::new(Hip, Side, Activity::PickupPen, Sweet));
        assert_eq!(narrative.key, "hip.side.pickup-pen.sweet_spot");
        assert_eq!(narrative.text, None);
    }
}
