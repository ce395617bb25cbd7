use tracing::debug;

use crate::touch::codes::TRACKING_ID_RELEASED;
use crate::touch::sample::SampleEvent;
use crate::touch::surface::{Side, SurfaceGeometry};

/// Per-slot contact state as accumulated from raw samples.
///
/// Position fields stay `None` until the first sample for that axis arrives.
/// `side` is decided by the first X sample after the contact is (re)created and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub slot: usize,
    pub tracking_id: Option<i32>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub side: Side,
}

impl Contact {
    fn fresh(slot: usize, tracking_id: Option<i32>) -> Self {
        Self {
            slot,
            tracking_id,
            x: None,
            y: None,
            side: Side::Unknown,
        }
    }
}

/// A contact with a known position, as handed to the estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub slot: usize,
    pub tracking_id: Option<i32>,
    pub x: i32,
    pub y: i32,
    pub side: Side,
}

/// Read-only view of all positioned contacts, ascending by slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactSnapshot {
    points: Vec<TouchPoint>,
}

impl ContactSnapshot {
    pub fn new(mut points: Vec<TouchPoint>) -> Self {
        points.sort_by_key(|p| p.slot);
        Self { points }
    }

    pub fn points(&self) -> &[TouchPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// First contact that started on the left half, wherever it is now.
    pub fn first_left(&self) -> Option<&TouchPoint> {
        self.points.iter().find(|p| p.side == Side::Left)
    }
}

/// Owns the authoritative slot table.
///
/// The table has a fixed capacity taken from the device's slot range; an empty
/// entry means no contact is tracked in that slot.
#[derive(Debug, Clone)]
pub struct SlotTracker {
    slots: Vec<Option<Contact>>,
    // None while an out-of-range slot is selected
    current_slot: Option<usize>,
    geometry: SurfaceGeometry,
}

impl SlotTracker {
    pub fn new(geometry: SurfaceGeometry, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating slot tracker with {} slots", capacity);
        Self {
            slots: vec![None; capacity],
            current_slot: Some(0),
            geometry,
        }
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current_slot
    }

    pub fn contact(&self, slot: usize) -> Option<&Contact> {
        self.slots.get(slot).and_then(|entry| entry.as_ref())
    }

    /// All tracked contacts, positioned or not.
    pub fn tracked(&self) -> impl Iterator<Item = &Contact> {
        self.slots.iter().filter_map(|entry| entry.as_ref())
    }

    /// Applies one decoded sample. Events that are not slot related are
    /// ignored.
    pub fn apply(&mut self, event: SampleEvent) {
        match event {
            SampleEvent::SlotSelect(slot) => self.select(slot),
            SampleEvent::TrackingId(id) => {
                let Some(slot) = self.current_slot else {
                    debug!("Tracking id {} for unselectable slot dropped", id);
                    return;
                };
                if id == TRACKING_ID_RELEASED {
                    self.slots[slot] = None;
                } else {
                    self.slots[slot] = Some(Contact::fresh(slot, Some(id)));
                }
            }
            SampleEvent::PositionX(x) => {
                let geometry = self.geometry;
                if let Some(contact) = self.current_contact_mut() {
                    contact.x = Some(x);
                    if contact.side == Side::Unknown {
                        contact.side = geometry.side_of(x);
                    }
                }
            }
            SampleEvent::PositionY(y) => {
                if let Some(contact) = self.current_contact_mut() {
                    contact.y = Some(y);
                }
            }
            SampleEvent::Click { .. } | SampleEvent::FrameBoundary | SampleEvent::Ignored => {}
        }
    }

    pub fn snapshot(&self) -> ContactSnapshot {
        let points = self
            .tracked()
            .filter_map(|contact| match (contact.x, contact.y) {
                (Some(x), Some(y)) => Some(TouchPoint {
                    slot: contact.slot,
                    tracking_id: contact.tracking_id,
                    x,
                    y,
                    side: contact.side,
                }),
                _ => None,
            })
            .collect();
        ContactSnapshot { points }
    }

    fn select(&mut self, slot: i32) {
        self.current_slot = usize::try_from(slot)
            .ok()
            .filter(|slot| *slot < self.slots.len());
        if self.current_slot.is_none() {
            debug!(
                "Slot {} outside table of {} slots, dropping its samples",
                slot,
                self.slots.len()
            );
        }
    }

    // Position samples create the contact if the id sample was missed
    fn current_contact_mut(&mut self) -> Option<&mut Contact> {
        let Some(slot) = self.current_slot else {
            debug!("Position sample for unselectable slot dropped");
            return None;
        };
        Some(self.slots[slot].get_or_insert_with(|| Contact::fresh(slot, None)))
    }
}
