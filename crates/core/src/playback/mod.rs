use serde::{Deserialize, Serialize};

use crate::{
    registry::{BallId, Registry},
    timeline::{upper_bound, RecordedEvent, Timelines},
    Pad,
};

/// Transport state pushed in by the host once per tick. The core never
/// polls a clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    /// Position in quarter notes.
    pub transport_time: f64,
    pub tempo: f64,
    pub is_playing: bool,
    pub time_signature_numerator: i32,
    pub time_signature_denominator: i32,
    pub is_valid: bool,
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self {
            transport_time: 0.0,
            tempo: 120.0,
            is_playing: false,
            time_signature_numerator: 4,
            time_signature_denominator: 4,
            is_valid: false,
        }
    }
}

impl TransportSnapshot {
    pub fn stopped_at(time: f64, tempo: f64) -> Self {
        Self {
            transport_time: time,
            tempo,
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn playing_at(time: f64, tempo: f64) -> Self {
        Self {
            is_playing: true,
            ..Self::stopped_at(time, tempo)
        }
    }
}

/// Read-only view answering "where should this ball be at time T".
/// Every lookup is a binary search over the sorted timeline.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackQuery<'a> {
    timelines: &'a Timelines,
    registry: &'a Registry,
    epsilon: f32,
}

impl<'a> PlaybackQuery<'a> {
    pub fn new(timelines: &'a Timelines, registry: &'a Registry, epsilon: f32) -> Self {
        Self {
            timelines,
            registry,
            epsilon,
        }
    }

    /// Latest sample at or before `time`.
    pub fn last_at_or_before(&self, ball_id: BallId, time: f64) -> Option<&'a RecordedEvent> {
        let events = self.timelines.events(ball_id);
        match upper_bound(events, time) {
            0 => None,
            index => events.get(index - 1),
        }
    }

    pub fn first(&self, ball_id: BallId) -> Option<&'a RecordedEvent> {
        self.timelines.events(ball_id).first()
    }

    /// Like [`Self::last_at_or_before`], but only reports a sample when the
    /// ball actually has to move. A ball missing from the registry has no
    /// position to compare with, so its sample is always reported.
    pub fn at_playback_time(&self, ball_id: BallId, time: f64) -> Option<&'a RecordedEvent> {
        let event = self.last_at_or_before(ball_id, time)?;
        match self.registry.get(ball_id) {
            Some(ball) => {
                let moved = (ball.x() - event.x).abs() > self.epsilon
                    || (ball.y() - event.y).abs() > self.epsilon;
                moved.then_some(event)
            }
            None => Some(event),
        }
    }
}

/// Per-tick driver that applies recorded motion to non-recording balls.
#[derive(Debug, Clone, Default)]
pub struct TransportFollower {
    was_playing: bool,
    last_time: f64,
}

impl TransportFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one transport snapshot. Returns how many balls moved.
    pub fn tick(&mut self, pad: &mut Pad, snapshot: &TransportSnapshot) -> usize {
        if !snapshot.is_valid {
            return 0;
        }

        let mut moved = 0;
        let stopped_now = self.was_playing && !snapshot.is_playing;
        self.was_playing = snapshot.is_playing;
        if stopped_now {
            tracing::debug!(time = snapshot.transport_time, "transport stopped, resetting balls");
            moved += pad.reset_all_to_start_or_center();
        }

        let time = snapshot.transport_time;
        if snapshot.is_playing {
            moved += follow(pad, |query, id| query.at_playback_time(id, time).copied());
        } else if (time - self.last_time).abs() > pad.config().epsilons.scrub_time {
            moved += follow(pad, |query, id| query.last_at_or_before(id, time).copied());
        }
        self.last_time = time;
        moved
    }
}

fn follow<F>(pad: &mut Pad, mut lookup: F) -> usize
where
    F: FnMut(&PlaybackQuery<'_>, BallId) -> Option<RecordedEvent>,
{
    let targets: Vec<RecordedEvent> = {
        let query = pad.query();
        pad.registry()
            .balls()
            .iter()
            .filter(|ball| !ball.is_recording)
            .filter_map(|ball| lookup(&query, ball.id()))
            .collect()
    };

    targets
        .iter()
        .filter(|event| pad.set_position(event.ball_id, event.x, event.y))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f32; 4] = [0.1, 0.2, 0.3, 0.4];

    fn pad_with_samples(times: &[f64]) -> Pad {
        let mut pad = Pad::empty();
        pad.add_ball(1, 0.0, 0.0);
        for (&time, &value) in times.iter().zip(VALUES.iter()) {
            pad.record_event(1, time, value, value, 0.0);
        }
        pad
    }

    #[test]
    fn last_at_or_before_picks_latest_earlier_sample() {
        let pad = pad_with_samples(&[1.0, 2.0, 5.0]);
        let query = pad.query();

        assert_eq!(query.last_at_or_before(1, 3.0).unwrap().time, 2.0);
        assert!(query.last_at_or_before(1, 0.5).is_none());
        assert_eq!(query.last_at_or_before(1, 5.0).unwrap().time, 5.0);
        assert!(query.last_at_or_before(2, 5.0).is_none());
    }

    #[test]
    fn first_returns_earliest() {
        let mut pad = pad_with_samples(&[3.0, 4.0]);
        pad.insert_event_at(1, 0.5, -0.2, -0.2, 0.0);

        assert_eq!(pad.query().first(1).unwrap().time, 0.5);
        assert!(pad.query().first(42).is_none());
    }

    #[test]
    fn playback_suppresses_unchanged_positions() {
        let mut pad = Pad::empty();
        pad.add_ball(1, 0.3, 0.3);
        pad.record_event(1, 1.0, 0.3, 0.300_05, 0.0);
        assert!(pad.query().at_playback_time(1, 1.5).is_none());

        pad.record_event(1, 2.0, 0.4, 0.4, 0.0);
        let event = pad.query().at_playback_time(1, 2.5).unwrap();
        assert_eq!((event.x, event.y), (0.4, 0.4));
    }

    #[test]
    fn playback_reports_samples_for_unregistered_balls() {
        let mut registry = Registry::new(1e-5);
        registry.add(4, 0.0, 0.0);
        let mut timelines = Timelines::new();
        timelines.append(&registry, 4, 1.0, 0.0, 0.0, 0.0);
        registry.remove(4);

        let query = PlaybackQuery::new(&timelines, &registry, 1e-4);
        assert!(query.at_playback_time(4, 2.0).is_some());
    }

    #[test]
    fn follower_plays_back_non_recording_balls() {
        let mut pad = pad_with_samples(&[0.0, 1.0, 2.0]);
        pad.add_ball(2, 0.5, 0.5);
        pad.set_recording(2, true);
        pad.record_event(2, 0.0, -0.5, -0.5, 0.0);
        pad.drain_moves();
        let mut follower = TransportFollower::new();

        let moved = follower.tick(&mut pad, &TransportSnapshot::playing_at(1.5, 120.0));
        assert_eq!(moved, 1);
        assert_eq!(pad.ball(1).unwrap().position(), (0.2, 0.2));
        assert_eq!(pad.ball(2).unwrap().position(), (0.5, 0.5));

        let moved = follower.tick(&mut pad, &TransportSnapshot::playing_at(1.6, 120.0));
        assert_eq!(moved, 0);
    }

    #[test]
    fn follower_resets_on_stop_and_scrubs_while_stopped() {
        let mut pad = pad_with_samples(&[1.0, 2.0, 3.0]);
        pad.add_ball(2, 0.7, 0.7);
        let mut follower = TransportFollower::new();

        follower.tick(&mut pad, &TransportSnapshot::playing_at(2.5, 120.0));
        assert_eq!(pad.ball(1).unwrap().position(), (0.2, 0.2));

        follower.tick(&mut pad, &TransportSnapshot::stopped_at(2.5, 120.0));
        assert_eq!(pad.ball(1).unwrap().position(), (0.1, 0.1));
        assert_eq!(pad.ball(2).unwrap().position(), (0.0, 0.0));

        follower.tick(&mut pad, &TransportSnapshot::stopped_at(3.5, 120.0));
        assert_eq!(pad.ball(1).unwrap().position(), (0.3, 0.3));
    }

    #[test]
    fn follower_ignores_invalid_snapshots() {
        let mut pad = pad_with_samples(&[0.0]);
        let mut follower = TransportFollower::new();
        let snapshot = TransportSnapshot {
            is_valid: false,
            ..TransportSnapshot::playing_at(1.0, 120.0)
        };

        assert_eq!(follower.tick(&mut pad, &snapshot), 0);
        assert_eq!(pad.ball(1).unwrap().position(), (0.0, 0.0));
    }
}
