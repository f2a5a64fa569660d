//! Candidate selection: pick "the animal in the photo" from detector output.

use anyhow::{anyhow, Result};

use crate::detect::Detection;

/// Species labels that count as a triage candidate, matched case-sensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeciesAllowList {
    species: Vec<String>,
}

impl SpeciesAllowList {
    pub const DEFAULT_SPECIES: [&'static str; 4] = ["dog", "cat", "cow", "horse"];

    pub fn new<I, S>(species: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in species {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(anyhow!("species allow-list entries must be non-empty"));
            }
            if !list.contains(&name) {
                list.push(name);
            }
        }
        if list.is_empty() {
            return Err(anyhow!("species allow-list must not be empty"));
        }
        Ok(Self { species: list })
    }

    pub fn contains(&self, species: &str) -> bool {
        self.species.iter().any(|s| s == species)
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }
}

impl Default for SpeciesAllowList {
    fn default() -> Self {
        Self {
            species: Self::DEFAULT_SPECIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Select the allowed detection covering the most of a `width` x `height` photo.
///
/// Boxes are clipped to the photo before ranking, so a detection that mostly
/// hangs off the frame ranks by what is actually visible. Ties keep the
/// earliest detection in detector order. Boxes with no visible area are never
/// selected.
pub fn select_candidate<'a>(
    detections: &'a [Detection],
    allow_list: &SpeciesAllowList,
    width: u32,
    height: u32,
) -> Option<&'a Detection> {
    let mut best = None;
    let mut max_area = 0u64;
    for detection in detections {
        if !allow_list.contains(&detection.species) {
            continue;
        }
        let area = detection.bbox.clamp_to(width, height).area();
        if area > max_area {
            max_area = area;
            best = Some(detection);
        }
    }
    if let Some(candidate) = best {
        log::debug!(
            "selected {} candidate (visible area {}, confidence {:.3})",
            candidate.species,
            max_area,
            candidate.confidence
        );
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(species: &str, w: u32, h: u32) -> Detection {
        Detection::new(species, BoundingBox::new(0, 0, w, h).unwrap(), 0.8)
    }

    #[test]
    fn picks_largest_allowed_detection() {
        let detections = vec![det("dog", 10, 10), det("person", 90, 90), det("cow", 20, 20)];
        let selected = select_candidate(&detections, &SpeciesAllowList::default(), 100, 100).unwrap();
        assert_eq!(selected.species, "cow");
    }

    #[test]
    fn equal_area_keeps_first_in_detector_order() {
        let cat_first = vec![det("cat", 10, 20), det("horse", 20, 10)];
        let horse_first = vec![det("horse", 20, 10), det("cat", 10, 20)];
        let allow = SpeciesAllowList::default();

        for _ in 0..5 {
            assert_eq!(select_candidate(&cat_first, &allow, 100, 100).unwrap().species, "cat");
            assert_eq!(select_candidate(&horse_first, &allow, 100, 100).unwrap().species, "horse");
        }
    }

    #[test]
    fn ranks_by_area_visible_in_the_photo() {
        // 60x60 box of which only a 10x60 strip lies inside the photo.
        let off_frame = Detection::new("dog", BoundingBox::new(90, 0, 150, 60).unwrap(), 0.9);
        let in_frame = det("cat", 30, 30);
        let detections = vec![off_frame, in_frame];

        let selected = select_candidate(&detections, &SpeciesAllowList::default(), 100, 100);
        assert_eq!(selected.unwrap().species, "cat");

        // A wider photo shows the whole dog.
        let selected = select_candidate(&detections, &SpeciesAllowList::default(), 200, 100);
        assert_eq!(selected.unwrap().species, "dog");
    }

    #[test]
    fn fully_off_frame_detection_is_never_selected() {
        let detections = vec![Detection::new(
            "horse",
            BoundingBox::new(120, 120, 180, 180).unwrap(),
            0.9,
        )];
        assert!(select_candidate(&detections, &SpeciesAllowList::default(), 100, 100).is_none());
    }

    #[test]
    fn labels_are_matched_case_sensitively() {
        let detections = vec![det("Dog", 10, 10)];
        assert!(select_candidate(&detections, &SpeciesAllowList::default(), 100, 100).is_none());
    }

    #[test]
    fn no_allowed_species_yields_none() {
        let detections = vec![det("bird", 10, 10), det("person", 50, 50)];
        assert!(select_candidate(&detections, &SpeciesAllowList::default(), 100, 100).is_none());
        assert!(select_candidate(&[], &SpeciesAllowList::default(), 100, 100).is_none());
    }

    #[test]
    fn custom_allow_list_changes_selection() {
        let detections = vec![det("dog", 50, 50), det("bird", 10, 10)];
        let allow = SpeciesAllowList::new(["bird"]).unwrap();
        assert_eq!(select_candidate(&detections, &allow, 100, 100).unwrap().species, "bird");
    }

    #[test]
    fn allow_list_rejects_empty_input() {
        assert!(SpeciesAllowList::new(Vec::<String>::new()).is_err());
        assert!(SpeciesAllowList::new([" "]).is_err());
        let list = SpeciesAllowList::new(["dog", "dog", "cat"]).unwrap();
        assert_eq!(list.species().to_vec(), vec!["dog".to_string(), "cat".to_string()]);
    }
}
