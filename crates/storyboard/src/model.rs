use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ImageRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SlotId(pub Uuid);

impl SlotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ShotId(pub Uuid);

impl ShotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a draft slot across one drafting run.
///
/// `Completed` slots are swept out by compaction; `Error` slots are kept so
/// the user can fix the pair and retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RenderModel {
    #[default]
    #[serde(rename = "veo-3.1-generate-preview")]
    Veo31Preview,
    #[serde(rename = "veo-3.1-fast-generate-preview")]
    Veo31FastPreview,
}

impl RenderModel {
    pub fn as_str(&self) -> &str {
        match self {
            RenderModel::Veo31Preview => "veo-3.1-generate-preview",
            RenderModel::Veo31FastPreview => "veo-3.1-fast-generate-preview",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    SixteenNine,
    #[serde(rename = "9:16")]
    NineSixteen,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    FourThree,
    #[serde(rename = "3:4")]
    ThreeFour,
    #[serde(rename = "21:9")]
    TwentyOneNine,
}

impl AspectRatio {
    pub fn as_str(&self) -> &str {
        match self {
            AspectRatio::SixteenNine => "16:9",
            AspectRatio::NineSixteen => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::FourThree => "4:3",
            AspectRatio::ThreeFour => "3:4",
            AspectRatio::TwentyOneNine => "21:9",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl Resolution {
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::Hd1080 => "1080p",
            Resolution::Hd720 => "720p",
            Resolution::Uhd4k => "4k",
        }
    }
}

/// An editable start/end pair awaiting generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSlot {
    pub id: SlotId,
    #[serde(default)]
    pub source: Option<ImageRef>,
    #[serde(default)]
    pub target: Option<ImageRef>,
    pub status: SlotStatus,
}

impl DraftSlot {
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub fn new(source: Option<ImageRef>, target: Option<ImageRef>) -> Self {
        Self {
            id: SlotId::new(),
            source,
            target,
            status: SlotStatus::Idle,
        }
    }

    /// A static beat: the same frame on both sides.
    pub fn hold(image: ImageRef) -> Self {
        Self::new(Some(image.clone()), Some(image))
    }

    /// A motion beat between two distinct frames.
    pub fn transition(source: ImageRef, target: ImageRef) -> Self {
        Self::new(Some(source), Some(target))
    }

    pub fn is_blank(&self) -> bool {
        self.source.is_none() && self.target.is_none()
    }

    pub fn is_eligible(&self) -> bool {
        self.source.is_some() && self.target.is_some() && self.status != SlotStatus::Completed
    }
}

/// A finalized, sequence-numbered entry in the series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shot {
    pub id: ShotId,
    pub sequence_order: i64,
    pub topic: String,
    pub visual_analysis: String,
    pub action_prompt: String,
    pub source_image: ImageRef,
    pub target_image: ImageRef,
    pub model: RenderModel,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

impl Shot {
    pub fn new(
        sequence_order: i64,
        topic: impl Into<String>,
        visual_analysis: impl Into<String>,
        action_prompt: impl Into<String>,
        source_image: ImageRef,
        target_image: ImageRef,
    ) -> Self {
        Self {
            id: ShotId::new(),
            sequence_order,
            topic: topic.into(),
            visual_analysis: visual_analysis.into(),
            action_prompt: action_prompt.into(),
            source_image,
            target_image,
            model: RenderModel::default(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
        }
    }
}

/// A named reference frame pinned to the project as visual DNA for the cast,
/// recurring sets, or props.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualAnchor {
    pub id: AnchorId,
    pub name: String,
    pub image: ImageRef,
    pub kind: AnchorKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Character,
    Scene,
    Prop,
}

fn default_starting_sequence() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub shots: Vec<Shot>,
    #[serde(default)]
    pub draft_slots: Vec<DraftSlot>,
    #[serde(default = "default_starting_sequence")]
    pub starting_sequence_number: i64,
    #[serde(default)]
    pub anchors: Vec<VisualAnchor>,
}

impl Project {
    /// A fresh project carries exactly one blank slot so the drafting queue
    /// is never empty.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            title: title.into(),
            last_modified: Utc::now(),
            shots: Vec::new(),
            draft_slots: vec![DraftSlot::empty()],
            starting_sequence_number: default_starting_sequence(),
            anchors: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// The sequence number the next successful draft item will take,
    /// computed against the current shot count.
    pub fn next_sequence_number(&self) -> i64 {
        self.starting_sequence_number + self.shots.len() as i64
    }

    pub fn eligible_slot_ids(&self) -> Vec<SlotId> {
        self.draft_slots
            .iter()
            .filter(|s| s.is_eligible())
            .map(|s| s.id)
            .collect()
    }

    /// Shots in display/export order. Insertion order is preserved in
    /// `shots`; callers sort on demand.
    pub fn sorted_shots(&self) -> Vec<&Shot> {
        let mut shots: Vec<&Shot> = self.shots.iter().collect();
        shots.sort_by_key(|s| s.sequence_order);
        shots
    }

    /// Deletes a shot without renumbering the rest; its sequence number is
    /// never reused.
    pub fn delete_shot(&mut self, id: ShotId) -> bool {
        let before = self.shots.len();
        self.shots.retain(|s| s.id != id);
        self.shots.len() != before
    }

    pub fn set_starting_sequence(&mut self, number: i64) {
        self.starting_sequence_number = number.max(1);
    }

    pub fn add_anchor(&mut self, anchor: VisualAnchor) {
        self.anchors.push(anchor);
    }

    pub fn remove_anchor(&mut self, id: AnchorId) -> bool {
        let before = self.anchors.len();
        self.anchors.retain(|a| a.id != id);
        self.anchors.len() != before
    }

    /// Wipes shots, drafting queue, and anchors back to the initial state,
    /// keeping the project identity and title.
    pub fn reset(&mut self) {
        self.shots.clear();
        self.draft_slots = vec![DraftSlot::empty()];
        self.anchors.clear();
        self.starting_sequence_number = default_starting_sequence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: &str) -> ImageRef {
        ImageRef::from_bytes("image/png", tag.as_bytes())
    }

    #[test]
    fn new_project_has_one_blank_slot() {
        let project = Project::new("Night Market");
        assert_eq!(project.draft_slots.len(), 1);
        assert!(project.draft_slots[0].is_blank());
        assert_eq!(project.next_sequence_number(), 1);
    }

    #[test]
    fn next_sequence_number_tracks_offset_and_count() {
        let mut project = Project::new("Night Market");
        project.set_starting_sequence(5);
        project.shots.push(Shot::new(
            5,
            "t",
            "a",
            "p",
            frame("a"),
            frame("b"),
        ));
        assert_eq!(project.next_sequence_number(), 6);
    }

    #[test]
    fn deleting_a_shot_never_renumbers() {
        let mut project = Project::new("Night Market");
        for n in 1..=3 {
            project
                .shots
                .push(Shot::new(n, "t", "a", "p", frame("a"), frame("b")));
        }
        let victim = project.shots[1].id;
        assert!(project.delete_shot(victim));
        let orders: Vec<i64> = project.sorted_shots().iter().map(|s| s.sequence_order).collect();
        assert_eq!(orders, vec![1, 3]);
        assert_eq!(project.next_sequence_number(), 3);
    }

    #[test]
    fn reset_preserves_identity_and_title() {
        let mut project = Project::new("Night Market");
        let id = project.id;
        project.set_starting_sequence(7);
        project
            .shots
            .push(Shot::new(7, "t", "a", "p", frame("a"), frame("b")));
        project.anchors.push(VisualAnchor {
            id: AnchorId::new(),
            name: "Lead".into(),
            image: frame("lead"),
            kind: AnchorKind::Character,
        });
        project.reset();
        assert_eq!(project.id, id);
        assert_eq!(project.title, "Night Market");
        assert!(project.shots.is_empty());
        assert!(project.anchors.is_empty());
        assert_eq!(project.starting_sequence_number, 1);
        assert_eq!(project.draft_slots.len(), 1);
        assert!(project.draft_slots[0].is_blank());
    }

    #[test]
    fn metadata_tags_serialize_with_wire_spellings() {
        let shot = Shot::new(1, "t", "a", "p", frame("a"), frame("b"));
        let json = serde_json::to_value(&shot).unwrap();
        assert_eq!(json["model"], "veo-3.1-generate-preview");
        assert_eq!(json["aspect_ratio"], "16:9");
        assert_eq!(json["resolution"], "1080p");
    }
}
