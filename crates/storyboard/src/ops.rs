use crate::{DraftSlot, ImageRef, SlotId, SlotStatus};

/// Which image field of a slot a manual assignment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    Source,
    Target,
}

/// The editing surface never shows zero rows; an emptied queue gets one
/// fresh blank slot back.
pub fn ensure_floor(slots: &mut Vec<DraftSlot>) {
    if slots.is_empty() {
        slots.push(DraftSlot::empty());
    }
}

/// Appends one blank idle slot.
pub fn add_slot(slots: &mut Vec<DraftSlot>) {
    slots.push(DraftSlot::empty());
}

/// Deletes a slot. Unknown ids are a no-op; removing the last slot leaves a
/// fresh blank one in its place.
pub fn remove_slot(slots: &mut Vec<DraftSlot>, id: SlotId) {
    slots.retain(|s| s.id != id);
    ensure_floor(slots);
}

/// Copies a slot's start frame over its end frame, including absence.
pub fn sync_source_to_target(slots: &mut [DraftSlot], id: SlotId) {
    if let Some(slot) = slots.iter_mut().find(|s| s.id == id) {
        slot.target = slot.source.clone();
    }
}

/// "The end of this beat is the start of the next": copies a slot's end
/// frame into the following slot's start frame. No-op on the last slot or
/// an unknown id.
pub fn push_target_to_next(slots: &mut [DraftSlot], id: SlotId) {
    let Some(index) = slots.iter().position(|s| s.id == id) else {
        return;
    };
    if index + 1 >= slots.len() {
        return;
    }
    let target = slots[index].target.clone();
    slots[index + 1].source = target;
}

/// Overwrites one image field directly. Re-editing a slot that already
/// finished (or failed) pulls it back to idle so it can be drafted again.
pub fn assign_image(slots: &mut [DraftSlot], id: SlotId, field: SlotField, image: ImageRef) {
    let Some(slot) = slots.iter_mut().find(|s| s.id == id) else {
        return;
    };
    match field {
        SlotField::Source => slot.source = Some(image),
        SlotField::Target => slot.target = Some(image),
    }
    if matches!(slot.status, SlotStatus::Error | SlotStatus::Completed) {
        slot.status = SlotStatus::Idle;
    }
}

/// Post-run sweep: completed slots became shots and leave the queue; error
/// slots stay visible for inspection and retry.
pub fn compact(slots: &mut Vec<DraftSlot>) {
    slots.retain(|s| s.status != SlotStatus::Completed);
    ensure_floor(slots);
}
