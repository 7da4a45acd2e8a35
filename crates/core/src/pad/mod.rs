use crate::{
    config::PadConfig,
    playback::{PlaybackQuery, TransportSnapshot},
    registry::{Ball, BallId, BallMoved, Registry, SourceInfo},
    timeline::{RecordedEvent, Timelines},
    tween,
};

/// The controller surface: every ball plus its recorded timeline.
///
/// Removing a ball always removes its timeline, so no sample outlives the
/// ball it belongs to.
#[derive(Debug, Clone)]
pub struct Pad {
    config: PadConfig,
    registry: Registry,
    timelines: Timelines,
}

impl Default for Pad {
    /// A single ball (id 1) at the origin and no recordings.
    fn default() -> Self {
        Self::with_config(PadConfig::default())
    }
}

impl Pad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PadConfig) -> Self {
        let mut pad = Self::empty_with_config(config);
        pad.add_ball(1, 0.0, 0.0);
        pad
    }

    /// A pad with no balls at all.
    pub fn empty() -> Self {
        Self::empty_with_config(PadConfig::default())
    }

    pub fn empty_with_config(config: PadConfig) -> Self {
        Self {
            registry: Registry::new(config.epsilons.position),
            timelines: Timelines::new(),
            config,
        }
    }

    pub fn config(&self) -> &PadConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn timelines(&self) -> &Timelines {
        &self.timelines
    }

    pub fn query(&self) -> PlaybackQuery<'_> {
        PlaybackQuery::new(
            &self.timelines,
            &self.registry,
            self.config.epsilons.playback,
        )
    }

    pub fn add_ball(&mut self, id: BallId, x: f32, y: f32) -> bool {
        self.registry.add(id, x, y)
    }

    pub fn add_source(&mut self, id: BallId, x: f32, y: f32, source: SourceInfo) -> bool {
        self.registry.insert(Ball::new(id, x, y).with_source(source))
    }

    pub(crate) fn insert_ball(&mut self, ball: Ball) -> bool {
        self.registry.insert(ball)
    }

    /// Removes the ball and, with it, its timeline.
    pub fn remove_ball(&mut self, id: BallId) -> Option<Ball> {
        let removed = self.registry.remove(id)?;
        self.timelines.clear(id);
        tracing::debug!(id, "removed ball and its timeline");
        Some(removed)
    }

    /// Drops every ball and every timeline.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.timelines.clear_all();
    }

    pub fn set_position(&mut self, id: BallId, x: f32, y: f32) -> bool {
        self.registry.set_position(id, x, y)
    }

    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.registry.get(id)
    }

    pub fn balls(&self) -> &[Ball] {
        self.registry.balls()
    }

    pub fn source_mut(&mut self, id: BallId) -> Option<&mut SourceInfo> {
        self.registry.get_mut(id).map(|ball| &mut ball.source)
    }

    pub fn set_muted(&mut self, id: BallId, muted: bool) -> bool {
        self.update_flags(id, |ball| ball.is_muted = muted)
    }

    pub fn set_soloed(&mut self, id: BallId, soloed: bool) -> bool {
        self.update_flags(id, |ball| ball.is_soloed = soloed)
    }

    pub fn set_recording(&mut self, id: BallId, recording: bool) -> bool {
        self.update_flags(id, |ball| ball.is_recording = recording)
    }

    pub fn next_source_number(&self) -> i32 {
        self.registry.next_source_number()
    }

    pub fn drain_moves(&mut self) -> Vec<BallMoved> {
        self.registry.drain_moves()
    }

    pub fn record_event(&mut self, id: BallId, time: f64, x: f32, y: f32, z: f32) -> bool {
        self.timelines.append(&self.registry, id, time, x, y, z)
    }

    pub fn insert_event_at(&mut self, id: BallId, time: f64, x: f32, y: f32, z: f32) -> bool {
        self.timelines.insert_at(&self.registry, id, time, x, y, z)
    }

    pub fn clear_events(&mut self, id: BallId) {
        self.timelines.clear(id);
    }

    pub fn clear_all_events(&mut self) {
        self.timelines.clear_all();
    }

    pub fn event_count(&self, id: BallId) -> usize {
        self.timelines.count(id)
    }

    pub fn events(&self, id: BallId) -> &[RecordedEvent] {
        self.timelines.events(id)
    }

    pub(crate) fn timelines_mut(&mut self) -> &mut Timelines {
        &mut self.timelines
    }

    /// Pointer drag. Muted balls do not move; recording balls also capture
    /// a sample at the transport time when the snapshot is valid.
    pub fn drag_ball(&mut self, id: BallId, x: f32, y: f32, transport: &TransportSnapshot) -> bool {
        let Some(ball) = self.registry.get(id) else {
            return false;
        };
        if ball.is_muted {
            return false;
        }
        if ball.is_recording && transport.is_valid {
            self.record_event(id, transport.transport_time, x, y, 0.0);
        }
        self.set_position(id, x, y)
    }

    /// Stores the ball's current position as a sample at the transport time.
    pub fn set_keyframe(&mut self, id: BallId, transport: &TransportSnapshot) -> bool {
        if !transport.is_valid {
            return false;
        }
        let Some((x, y)) = self.registry.get(id).map(Ball::position) else {
            return false;
        };
        self.insert_event_at(id, transport.transport_time, x, y, 0.0)
    }

    /// Interpolates from the live position to the next recorded sample.
    pub fn tween_to_next(&mut self, id: BallId, current_time: f64, tempo: f64) -> usize {
        tween::tween_to_next(
            &self.registry,
            &mut self.timelines,
            id,
            current_time,
            tempo,
            &self.config.tween,
        )
    }

    /// Snaps every ball to its first recorded sample, or to the origin when
    /// it has none. Returns how many balls moved.
    pub fn reset_all_to_start_or_center(&mut self) -> usize {
        let targets: Vec<(BallId, f32, f32)> = self
            .registry
            .balls()
            .iter()
            .map(|ball| match self.timelines.events(ball.id()).first() {
                Some(event) => (ball.id(), event.x, event.y),
                None => (ball.id(), 0.0, 0.0),
            })
            .collect();

        targets
            .into_iter()
            .filter(|&(id, x, y)| self.registry.set_position(id, x, y))
            .count()
    }

    /// Drops timelines that have no ball.
    pub(crate) fn prune_orphan_timelines(&mut self) -> usize {
        self.timelines.retain_registered(&self.registry)
    }

    fn update_flags(&mut self, id: BallId, update: impl FnOnce(&mut Ball)) -> bool {
        match self.registry.get_mut(id) {
            Some(ball) => {
                update(ball);
                true
            }
            None => false,
        }
    }
}
