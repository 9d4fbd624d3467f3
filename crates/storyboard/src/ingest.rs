use serde::{Deserialize, Serialize};

use crate::{ensure_floor, DraftSlot, ImageRef};

/// Which side of the pairs a batch drop binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Fill the start frames positionally.
    SourceOnly,
    /// Fill the end frames positionally.
    TargetOnly,
    /// Append new pairs according to the batch mode.
    Mixed,
}

/// How a mixed drop turns a run of images into pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Consecutive pairing, two images per slot.
    #[default]
    Standard,
    /// Hold, transition, hold, ... so stills become alternating static
    /// beats and motion beats without manual re-pairing.
    Chained,
    /// Every image becomes its own hold slot.
    Looper,
}

/// Folds a run of dropped images into the drafting queue.
///
/// Blank slots are dropped from the working set first; only slots carrying
/// at least one frame survive a drop. Incoming order is preserved, nothing
/// is deduplicated, and new slots always start idle with fresh ids. The
/// result is floor-normalized: it never comes back empty.
pub fn ingest(
    current: Vec<DraftSlot>,
    incoming: Vec<ImageRef>,
    target: DropTarget,
    mode: BatchMode,
) -> Vec<DraftSlot> {
    let mut slots: Vec<DraftSlot> = current.into_iter().filter(|s| !s.is_blank()).collect();

    match target {
        DropTarget::SourceOnly => {
            for (i, image) in incoming.into_iter().enumerate() {
                match slots.get_mut(i) {
                    Some(slot) => slot.source = Some(image),
                    None => slots.push(DraftSlot::new(Some(image), None)),
                }
            }
        }
        DropTarget::TargetOnly => {
            for (i, image) in incoming.into_iter().enumerate() {
                match slots.get_mut(i) {
                    Some(slot) => slot.target = Some(image),
                    None => slots.push(DraftSlot::new(None, Some(image))),
                }
            }
        }
        DropTarget::Mixed => match mode {
            BatchMode::Standard => {
                let mut images = incoming.into_iter();
                while let Some(source) = images.next() {
                    slots.push(DraftSlot::new(Some(source), images.next()));
                }
            }
            BatchMode::Chained => {
                for window in ChainWindows::new(&incoming) {
                    let (current, next) = window;
                    slots.push(DraftSlot::hold(current.clone()));
                    if let Some(next) = next {
                        slots.push(DraftSlot::transition(current.clone(), next.clone()));
                    }
                }
            }
            BatchMode::Looper => {
                for image in incoming {
                    slots.push(DraftSlot::hold(image));
                }
            }
        },
    }

    ensure_floor(&mut slots);
    slots
}

/// Each image with its successor, if any. The last window has no successor,
/// which is what makes chained ingestion end on a final hold.
struct ChainWindows<'a> {
    images: &'a [ImageRef],
    index: usize,
}

impl<'a> ChainWindows<'a> {
    fn new(images: &'a [ImageRef]) -> Self {
        Self { images, index: 0 }
    }
}

impl<'a> Iterator for ChainWindows<'a> {
    type Item = (&'a ImageRef, Option<&'a ImageRef>);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.images.get(self.index)?;
        let next = self.images.get(self.index + 1);
        self.index += 1;
        Some((current, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlotStatus;

    fn frame(tag: &str) -> ImageRef {
        ImageRef::from_bytes("image/png", tag.as_bytes())
    }

    fn frames(n: usize) -> Vec<ImageRef> {
        (0..n).map(|i| frame(&format!("frame-{i}"))).collect()
    }

    #[test]
    fn standard_mixed_pairs_two_at_a_time() {
        for n in 1..=6 {
            let slots = ingest(Vec::new(), frames(n), DropTarget::Mixed, BatchMode::Standard);
            assert_eq!(slots.len(), n.div_ceil(2), "n = {n}");
            let last = slots.last().unwrap();
            assert_eq!(last.target.is_none(), n % 2 == 1, "n = {n}");
        }
    }

    #[test]
    fn chained_mixed_yields_two_n_minus_one() {
        for n in 1..=5 {
            let slots = ingest(Vec::new(), frames(n), DropTarget::Mixed, BatchMode::Chained);
            assert_eq!(slots.len(), 2 * n - 1, "n = {n}");
        }
    }

    #[test]
    fn chained_alternates_holds_and_transitions() {
        let imgs = frames(3);
        let slots = ingest(Vec::new(), imgs.clone(), DropTarget::Mixed, BatchMode::Chained);
        // hold(0), 0->1, hold(1), 1->2, hold(2)
        assert_eq!(slots[0].source, slots[0].target);
        assert_eq!(slots[0].source.as_ref(), Some(&imgs[0]));
        assert_eq!(slots[1].source.as_ref(), Some(&imgs[0]));
        assert_eq!(slots[1].target.as_ref(), Some(&imgs[1]));
        assert_eq!(slots[2].source, slots[2].target);
        assert_eq!(slots[3].source.as_ref(), Some(&imgs[1]));
        assert_eq!(slots[3].target.as_ref(), Some(&imgs[2]));
        assert_eq!(slots[4].source.as_ref(), Some(&imgs[2]));
        assert_eq!(slots[4].target.as_ref(), Some(&imgs[2]));
    }

    #[test]
    fn looper_makes_one_hold_per_image() {
        let slots = ingest(Vec::new(), frames(4), DropTarget::Mixed, BatchMode::Looper);
        assert_eq!(slots.len(), 4);
        for slot in &slots {
            assert!(slot.source.is_some());
            assert_eq!(slot.source, slot.target);
            assert_eq!(slot.status, SlotStatus::Idle);
        }
    }

    #[test]
    fn empty_drop_normalizes_to_one_blank_slot() {
        let current = vec![DraftSlot::empty(), DraftSlot::empty()];
        let slots = ingest(current, Vec::new(), DropTarget::Mixed, BatchMode::Chained);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].is_blank());
    }

    #[test]
    fn source_drop_overwrites_positionally_then_extends() {
        let mut keep = DraftSlot::new(Some(frame("old-a")), Some(frame("old-b")));
        keep.status = SlotStatus::Error;
        let keep_id = keep.id;
        let current = vec![DraftSlot::empty(), keep];

        let imgs = frames(3);
        let slots = ingest(current, imgs.clone(), DropTarget::SourceOnly, BatchMode::Standard);

        // The blank slot was excluded; the surviving slot got the first image.
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].id, keep_id);
        assert_eq!(slots[0].source.as_ref(), Some(&imgs[0]));
        assert_eq!(slots[0].target.as_ref(), Some(&frame("old-b")));
        assert_eq!(slots[1].source.as_ref(), Some(&imgs[1]));
        assert!(slots[1].target.is_none());
        assert_eq!(slots[2].source.as_ref(), Some(&imgs[2]));
    }

    #[test]
    fn target_drop_is_symmetric() {
        let slots = ingest(Vec::new(), frames(2), DropTarget::TargetOnly, BatchMode::Standard);
        assert_eq!(slots.len(), 2);
        for slot in &slots {
            assert!(slot.source.is_none());
            assert!(slot.target.is_some());
        }
    }

    #[test]
    fn surviving_slots_precede_new_ones() {
        let keep = DraftSlot::new(Some(frame("keep")), None);
        let keep_id = keep.id;
        let slots = ingest(
            vec![keep],
            frames(2),
            DropTarget::Mixed,
            BatchMode::Looper,
        );
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].id, keep_id);
    }
}
