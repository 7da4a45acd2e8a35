use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::{BallId, Registry};

/// One recorded position sample. `time` is in transport quarter notes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub ball_id: BallId,
    pub time: f64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RecordedEvent {
    pub fn new(ball_id: BallId, time: f64, x: f32, y: f32) -> Self {
        Self {
            ball_id,
            time,
            x,
            y,
            z: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Sorts by time. Stable, so equal-time samples keep insertion order.
pub fn sort_events(events: &mut [RecordedEvent]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Index of the first sample strictly later than `time`.
pub fn upper_bound(events: &[RecordedEvent], time: f64) -> usize {
    events.partition_point(|event| event.time <= time)
}

/// Per-ball recorded samples, each sequence kept sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timelines {
    events: BTreeMap<BallId, Vec<RecordedEvent>>,
}

impl Timelines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a live-recorded sample. Only re-sorts when the sample lands
    /// before the current tail. Unknown balls and non-finite samples are
    /// ignored.
    pub fn append(
        &mut self,
        registry: &Registry,
        ball_id: BallId,
        time: f64,
        x: f32,
        y: f32,
        z: f32,
    ) -> bool {
        let event = RecordedEvent {
            ball_id,
            time,
            x,
            y,
            z,
        };
        if !event.is_finite() || !registry.contains(ball_id) {
            return false;
        }

        let events = self.events.entry(ball_id).or_default();
        let needs_sort = events.last().is_some_and(|last| time < last.time);
        events.push(event);
        if needs_sort {
            sort_events(events);
        }
        true
    }

    /// Inserts an edit at an arbitrary time. Always re-sorts. Rejects the
    /// same input as [`Self::append`].
    pub fn insert_at(
        &mut self,
        registry: &Registry,
        ball_id: BallId,
        time: f64,
        x: f32,
        y: f32,
        z: f32,
    ) -> bool {
        let event = RecordedEvent {
            ball_id,
            time,
            x,
            y,
            z,
        };
        if !event.is_finite() || !registry.contains(ball_id) {
            return false;
        }

        let events = self.events.entry(ball_id).or_default();
        events.push(event);
        sort_events(events);
        true
    }

    /// Adds a batch of samples and restores ordering once.
    pub(crate) fn extend_sorted(
        &mut self,
        ball_id: BallId,
        samples: impl IntoIterator<Item = RecordedEvent>,
    ) {
        let events = self.events.entry(ball_id).or_default();
        events.extend(samples);
        sort_events(events);
    }

    /// Replaces a whole sequence, sorting it first. Empty sequences are kept
    /// so that a loaded empty timeline survives a round trip.
    pub(crate) fn replace(&mut self, ball_id: BallId, mut events: Vec<RecordedEvent>) {
        sort_events(&mut events);
        self.events.insert(ball_id, events);
    }

    pub fn clear(&mut self, ball_id: BallId) {
        self.events.remove(&ball_id);
    }

    pub fn clear_all(&mut self) {
        self.events.clear();
    }

    /// Sample count for one ball; 0 when it has no timeline.
    pub fn count(&self, ball_id: BallId) -> usize {
        self.events.get(&ball_id).map_or(0, Vec::len)
    }

    pub fn events(&self, ball_id: BallId) -> &[RecordedEvent] {
        self.events.get(&ball_id).map_or(&[], Vec::as_slice)
    }

    pub fn has_timeline(&self, ball_id: BallId) -> bool {
        self.events.contains_key(&ball_id)
    }

    /// Number of balls that own a timeline, empty ones included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BallId, &[RecordedEvent])> {
        self.events
            .iter()
            .map(|(&ball_id, events)| (ball_id, events.as_slice()))
    }

    /// Drops every timeline whose ball is no longer in `registry`.
    pub(crate) fn retain_registered(&mut self, registry: &Registry) -> usize {
        let before = self.events.len();
        self.events.retain(|ball_id, _| registry.contains(*ball_id));
        before - self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ids: &[BallId]) -> Registry {
        let mut registry = Registry::new(1e-5);
        for &id in ids {
            registry.add(id, 0.0, 0.0);
        }
        registry
    }

    fn is_sorted(events: &[RecordedEvent]) -> bool {
        events.windows(2).all(|pair| pair[0].time <= pair[1].time)
    }

    #[test]
    fn append_ignores_unknown_balls() {
        let registry = registry_with(&[1]);
        let mut timelines = Timelines::new();

        assert!(!timelines.append(&registry, 7, 1.0, 0.1, 0.1, 0.0));
        assert_eq!(timelines.count(7), 0);
        assert!(!timelines.has_timeline(7));
    }

    #[test]
    fn stays_sorted_after_every_mutation() {
        let registry = registry_with(&[1]);
        let mut timelines = Timelines::new();
        let times = [0.5, 1.0, 0.75, 3.0, 3.0, 0.0, 2.25, -1.0, 10.0, 9.5];

        for (index, &time) in times.iter().enumerate() {
            if index % 3 == 0 {
                timelines.insert_at(&registry, 1, time, 0.0, 0.0, 0.0);
            } else {
                timelines.append(&registry, 1, time, 0.0, 0.0, 0.0);
            }
            assert!(is_sorted(timelines.events(1)), "unsorted after {time}");
        }
        assert_eq!(timelines.count(1), times.len());
    }

    #[test]
    fn rejects_non_finite_samples() {
        let registry = registry_with(&[1]);
        let mut timelines = Timelines::new();

        assert!(!timelines.append(&registry, 1, f64::NAN, 0.1, 0.1, 0.0));
        assert!(!timelines.insert_at(&registry, 1, f64::INFINITY, 0.1, 0.1, 0.0));
        assert!(!timelines.append(&registry, 1, 1.0, f32::NAN, 0.1, 0.0));
        assert!(!timelines.insert_at(&registry, 1, 1.0, 0.1, f32::NEG_INFINITY, 0.0));
        assert!(!timelines.append(&registry, 1, 1.0, 0.1, 0.1, f32::NAN));
        assert!(!timelines.has_timeline(1));

        for time in [1.0, 2.0, 3.0] {
            assert!(timelines.append(&registry, 1, time, 0.1, 0.1, 0.0));
        }
        assert!(is_sorted(timelines.events(1)));
        assert_eq!(timelines.count(1), 3);
    }

    #[test]
    fn in_order_append_keeps_tail() {
        let registry = registry_with(&[1]);
        let mut timelines = Timelines::new();
        timelines.append(&registry, 1, 1.0, 0.1, 0.0, 0.0);
        timelines.append(&registry, 1, 1.0, 0.2, 0.0, 0.0);
        timelines.append(&registry, 1, 2.0, 0.3, 0.0, 0.0);

        let xs: Vec<f32> = timelines.events(1).iter().map(|event| event.x).collect();
        assert_eq!(xs, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn clear_and_clear_all() {
        let registry = registry_with(&[1, 2]);
        let mut timelines = Timelines::new();
        timelines.append(&registry, 1, 1.0, 0.0, 0.0, 0.0);
        timelines.append(&registry, 2, 1.0, 0.0, 0.0, 0.0);

        timelines.clear(1);
        assert_eq!(timelines.count(1), 0);
        assert_eq!(timelines.count(2), 1);

        timelines.clear_all();
        assert!(timelines.is_empty());
    }

    #[test]
    fn upper_bound_skips_equal_times() {
        let events: Vec<RecordedEvent> = [1.0, 2.0, 2.0, 5.0]
            .iter()
            .map(|&time| RecordedEvent::new(1, time, 0.0, 0.0))
            .collect();

        assert_eq!(upper_bound(&events, 0.5), 0);
        assert_eq!(upper_bound(&events, 2.0), 3);
        assert_eq!(upper_bound(&events, 9.0), 4);
    }
}
