use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User-visible ball number. Unique within a live registry.
pub type BallId = i32;

pub const DEFAULT_OSC_PREFIX: &str = "/track/1";
pub const DEFAULT_COLOUR: Colour = Colour(0xff4a_90e2);

/// Packed ARGB colour, stored on the wire as a 32-bit int.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour(pub u32);

impl Colour {
    pub fn from_argb_bits(bits: i32) -> Self {
        Self(bits as u32)
    }

    pub fn argb_bits(self) -> i32 {
        self.0 as i32
    }
}

impl Default for Colour {
    fn default() -> Self {
        DEFAULT_COLOUR
    }
}

/// Display and routing metadata. The timeline logic never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub osc_prefix: String,
    pub colour: Colour,
    pub name: String,
    pub number: i32,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            osc_prefix: DEFAULT_OSC_PREFIX.to_string(),
            colour: DEFAULT_COLOUR,
            name: String::new(),
            number: 1,
        }
    }
}

/// A movable point on the pad. Coordinates live in [-1, 1] on both axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    id: BallId,
    uid: Uuid,
    x: f32,
    y: f32,
    pub source: SourceInfo,
    pub is_muted: bool,
    pub is_soloed: bool,
    pub is_recording: bool,
}

impl Ball {
    pub fn new(id: BallId, x: f32, y: f32) -> Self {
        Self {
            id,
            uid: Uuid::new_v4(),
            x: clamp_coordinate(x),
            y: clamp_coordinate(y),
            source: SourceInfo::default(),
            is_muted: false,
            is_soloed: false,
            is_recording: false,
        }
    }

    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> BallId {
        self.id
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Formats the ball as `"<id> <x> <y>"` with three decimals.
    pub fn output_string(&self) -> String {
        format!("{} {:.3} {:.3}", self.id, self.x, self.y)
    }
}

/// Emitted for every accepted position change, and only for those.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallMoved {
    pub id: BallId,
    pub x: f32,
    pub y: f32,
}

/// Clamps to [-1, 1]. Non-finite input lands on the origin.
pub fn clamp_coordinate(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Owns every ball. One canonical list with two lookup indices: by display
/// id and by durable uid.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    balls: Vec<Ball>,
    by_id: HashMap<BallId, usize>,
    by_uid: HashMap<Uuid, usize>,
    moves: Vec<BallMoved>,
    position_epsilon: f32,
}

impl Registry {
    pub fn new(position_epsilon: f32) -> Self {
        Self {
            position_epsilon,
            ..Default::default()
        }
    }

    /// Adds a ball with default metadata. Returns false when the id is taken.
    pub fn add(&mut self, id: BallId, x: f32, y: f32) -> bool {
        self.insert(Ball::new(id, x, y))
    }

    /// Inserts a fully built ball. Duplicate ids are rejected.
    pub fn insert(&mut self, mut ball: Ball) -> bool {
        if self.by_id.contains_key(&ball.id) {
            return false;
        }
        while self.by_uid.contains_key(&ball.uid) {
            ball.uid = Uuid::new_v4();
        }

        ball.x = clamp_coordinate(ball.x);
        ball.y = clamp_coordinate(ball.y);
        let index = self.balls.len();
        self.by_id.insert(ball.id, index);
        self.by_uid.insert(ball.uid, index);
        self.balls.push(ball);
        true
    }

    /// Removes the ball with `id`. The caller owns the timeline cascade.
    pub fn remove(&mut self, id: BallId) -> Option<Ball> {
        let index = self.by_id.get(&id).copied()?;
        let ball = self.balls.remove(index);
        self.reindex();
        Some(ball)
    }

    pub fn clear(&mut self) {
        self.balls.clear();
        self.by_id.clear();
        self.by_uid.clear();
    }

    /// Moves a ball. Returns true if the move was accepted and notified.
    pub fn set_position(&mut self, id: BallId, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let epsilon = self.position_epsilon;
        let Some(ball) = self.get_mut(id) else {
            return false;
        };

        let new_x = x.clamp(-1.0, 1.0);
        let new_y = y.clamp(-1.0, 1.0);
        if (ball.x - new_x).abs() < epsilon && (ball.y - new_y).abs() < epsilon {
            return false;
        }

        ball.x = new_x;
        ball.y = new_y;
        self.moves.push(BallMoved {
            id,
            x: new_x,
            y: new_y,
        });
        true
    }

    pub fn get(&self, id: BallId) -> Option<&Ball> {
        self.by_id.get(&id).map(|&index| &self.balls[index])
    }

    pub fn get_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        let index = self.by_id.get(&id).copied()?;
        self.balls.get_mut(index)
    }

    pub fn get_by_uid(&self, uid: Uuid) -> Option<&Ball> {
        self.by_uid.get(&uid).map(|&index| &self.balls[index])
    }

    pub fn contains(&self, id: BallId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn ids(&self) -> Vec<BallId> {
        self.balls.iter().map(Ball::id).collect()
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    /// Next free source number: one past the highest in use.
    pub fn next_source_number(&self) -> i32 {
        self.balls
            .iter()
            .map(|ball| ball.source.number)
            .max()
            .map_or(1, |highest| highest.max(0) + 1)
    }

    /// Takes the queued position-changed notifications.
    pub fn drain_moves(&mut self) -> Vec<BallMoved> {
        std::mem::take(&mut self.moves)
    }

    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_uid.clear();
        for (index, ball) in self.balls.iter().enumerate() {
            self.by_id.insert(ball.id, index);
            self.by_uid.insert(ball.uid, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(1e-5)
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut registry = registry();
        assert!(registry.add(1, 0.5, 0.5));
        assert!(!registry.add(1, -0.5, -0.5));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(1).unwrap().position(), (0.5, 0.5));
    }

    #[test]
    fn add_clamps_coordinates() {
        let mut registry = registry();
        registry.add(3, 4.0, -7.5);
        assert_eq!(registry.get(3).unwrap().position(), (1.0, -1.0));
    }

    #[test]
    fn set_position_notifies_only_accepted_moves() {
        let mut registry = registry();
        registry.add(1, 0.0, 0.0);

        assert!(registry.set_position(1, 0.25, 2.0));
        assert!(!registry.set_position(1, 0.250_001, 1.0));
        assert!(!registry.set_position(9, 0.1, 0.1));
        assert!(!registry.set_position(1, f32::NAN, 0.1));

        let moves = registry.drain_moves();
        assert_eq!(
            moves,
            vec![BallMoved {
                id: 1,
                x: 0.25,
                y: 1.0
            }]
        );
        assert!(registry.drain_moves().is_empty());
    }

    #[test]
    fn lookups_survive_removal() {
        let mut registry = registry();
        registry.add(1, 0.0, 0.0);
        registry.add(2, 0.1, 0.1);
        registry.add(3, 0.2, 0.2);
        let uid = registry.get(3).unwrap().uid();

        assert!(registry.remove(2).is_some());
        assert!(registry.remove(2).is_none());

        assert!(registry.get(2).is_none());
        assert_eq!(registry.get(3).unwrap().x(), 0.2);
        assert_eq!(registry.get_by_uid(uid).unwrap().id(), 3);
        assert_eq!(registry.ids(), vec![1, 3]);
    }

    #[test]
    fn uids_are_distinct_from_ids() {
        let mut registry = registry();
        registry.add(1, 0.0, 0.0);
        registry.add(2, 0.0, 0.0);

        let first = registry.get(1).unwrap().uid();
        let second = registry.get(2).unwrap().uid();
        assert_ne!(first, second);
    }

    #[test]
    fn next_source_number_follows_highest() {
        let mut registry = registry();
        assert_eq!(registry.next_source_number(), 1);

        registry.add(1, 0.0, 0.0);
        registry.get_mut(1).unwrap().source.number = 4;
        registry.add(2, 0.0, 0.0);
        assert_eq!(registry.next_source_number(), 5);
    }

    #[test]
    fn output_string_uses_three_decimals() {
        let ball = Ball::new(2, 0.3, -0.5);
        assert_eq!(ball.output_string(), "2 0.300 -0.500");
    }
}
