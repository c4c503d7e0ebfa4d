//! Crop hint groups
//!
//! Hand-curated mapping from crop name to the disease labels that can occur
//! on that crop. A client-supplied crop hint restricts predictions to the
//! matching group. Keys are lowercase; member strings must match the label
//! set byte for byte, which is enforced at load time.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::labels::LabelSet;

/// Built-in crop groups, keyed by the hint string clients send.
const CROP_GROUP_TABLE: &[(&str, &[&str])] = &[
    (
        "rice",
        &[
            "Bacterial leaf blight in rice leaf",
            "Brown spot in rice leaf",
            "Leaf smut in rice leaf",
            "Sogatella rice",
        ],
    ),
    (
        "corn",
        &[
            "Blight in corn Leaf",
            "Common Rust in corn Leaf",
            "Corn (maize) healthy",
            "Gray Leaf Spot in corn Leaf",
            "corn crop",
        ],
    ),
    (
        "citrus",
        &["Orange Haunglongbing Citrus greening", "lemon canker"],
    ),
    (
        "apple",
        &[
            "Apple Apple scab",
            "Apple Black rot",
            "Apple Cedar apple rust",
            "Apple healthy",
        ],
    ),
    (
        "tomato",
        &[
            "Tomato Bacterial spot",
            "Tomato Early blight",
            "Tomato Late blight",
            "Tomato Leaf Mold",
            "Tomato Septoria leaf spot",
            "Tomato Spider mites Two spotted spider mite",
            "Tomato Target Spot",
            "Tomato Tomato mosaic virus",
            "Tomato healthy",
            "tomato canker",
        ],
    ),
    (
        "grape",
        &[
            "Grape Black rot",
            "Grape Esca Black Measles",
            "Grape Leaf blight Isariopsis Leaf Spot",
            "Grape healthy",
        ],
    ),
    (
        "potato",
        &[
            "Potato Early blight",
            "Potato Late blight",
            "Potato healthy",
            "potato crop",
            "potato hollow heart",
        ],
    ),
    (
        "cherry",
        &[
            "Cherry (including sour) Powdery mildew",
            "Cherry (including_sour) healthy",
        ],
    ),
    (
        "pepper",
        &["Pepper bell Bacterial spot", "Pepper bell healthy"],
    ),
    (
        "strawberry",
        &["Strawberry Leaf scorch", "Strawberry healthy"],
    ),
    (
        "tea",
        &[
            "algal leaf in tea",
            "anthracnose in tea",
            "bird eye spot in tea",
            "brown blight in tea",
            "healthy tea leaf",
            "red leaf spot in tea",
        ],
    ),
    ("blueberry", &["Blueberry healthy"]),
    ("peach", &["Peach healthy"]),
    ("raspberry", &["Raspberry healthy"]),
    ("soybean", &["Soybean healthy"]),
    (
        "other",
        &[
            "Garlic",
            "ginger",
            "onion",
            "Cercospora leaf spot",
            "cabbage looper",
            "Nitrogen deficiency in plant",
            "Waterlogging in plant",
            "potassium deficiency in plant",
        ],
    ),
];

/// Crop name → allowed label set.
#[derive(Debug, Clone)]
pub struct CropGroups {
    groups: HashMap<String, HashSet<String>>,
}

impl CropGroups {
    /// The built-in group table served in production.
    pub fn builtin() -> Self {
        let groups = CROP_GROUP_TABLE
            .iter()
            .map(|(crop, members)| {
                (
                    (*crop).to_string(),
                    members.iter().map(|m| (*m).to_string()).collect(),
                )
            })
            .collect();
        Self { groups }
    }

    /// Build a group table from explicit entries (used by tests).
    pub fn from_entries<I, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, M)>,
        M: IntoIterator<Item = String>,
    {
        let groups = entries
            .into_iter()
            .map(|(crop, members)| (crop, members.into_iter().collect()))
            .collect();
        Self { groups }
    }

    /// Look up the allowed labels for an already-normalized hint.
    pub fn get(&self, crop: &str) -> Option<&HashSet<String>> {
        self.groups.get(crop)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HashSet<String>)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Verify every group member names a real label.
    ///
    /// Membership is an exact string match; a single typo in either table
    /// would make that label silently unmaskable, so mismatches are fatal.
    pub fn validate(&self, labels: &LabelSet) -> Result<()> {
        let known: HashSet<&str> = labels.iter().collect();
        let mut crops: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        crops.sort_unstable();
        for crop in crops {
            let mut unmatched: Vec<String> = self.groups[crop]
                .iter()
                .filter(|member| !known.contains(member.as_str()))
                .cloned()
                .collect();
            if !unmatched.is_empty() {
                unmatched.sort_unstable();
                return Err(Error::CropGroup {
                    crop: crop.to_string(),
                    unmatched,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every built-in group member, deduplicated, as a label set.
    fn all_member_labels() -> LabelSet {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for (_, members) in CROP_GROUP_TABLE {
            for member in *members {
                if seen.insert(*member) {
                    labels.push((*member).to_string());
                }
            }
        }
        LabelSet::from_labels(labels).unwrap()
    }

    #[test]
    fn builtin_table_is_well_formed() {
        let groups = CropGroups::builtin();
        assert_eq!(groups.iter().count(), 16);
        for (crop, members) in groups.iter() {
            assert_eq!(crop, crop.to_lowercase(), "crop keys must be lowercase");
            assert!(!members.is_empty(), "group '{crop}' has no members");
        }
        assert!(groups.get("tomato").unwrap().contains("Tomato healthy"));
        assert!(groups.get("rice").unwrap().contains("Sogatella rice"));
    }

    #[test]
    fn validate_accepts_superset_label_set() {
        let mut labels: Vec<String> = all_member_labels().iter().map(String::from).collect();
        labels.push("Some extra label".to_string());
        let labels = LabelSet::from_labels(labels).unwrap();
        CropGroups::builtin().validate(&labels).unwrap();
    }

    #[test]
    fn validate_fails_loudly_on_unmatched_members() {
        let labels =
            LabelSet::from_labels(vec!["Apple healthy".to_string(), "corn crop".to_string()])
                .unwrap();
        let err = CropGroups::builtin().validate(&labels).unwrap_err();
        match err {
            Error::CropGroup { crop, unmatched } => {
                assert_eq!(crop, "apple");
                assert!(unmatched.contains(&"Apple Apple scab".to_string()));
                assert!(!unmatched.contains(&"Apple healthy".to_string()));
            }
            other => panic!("expected CropGroup error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_crop_lookup_is_none() {
        assert!(CropGroups::builtin().get("dragonfruit").is_none());
        // Lookups are exact; callers normalize case before calling.
        assert!(CropGroups::builtin().get("Tomato").is_none());
    }
}
