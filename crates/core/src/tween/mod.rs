//! Densifies a timeline between the live ball position and the next recorded
//! sample so that sparse manual edits play back like recorded motion.

use crate::{
    config::TweenConfig,
    registry::{BallId, Registry},
    timeline::{upper_bound, RecordedEvent, Timelines},
};

/// Generates interpolated samples from the ball's current position towards
/// the first sample strictly after `current_time`. Returns how many samples
/// were added; 0 when the ball is unknown or nothing lies ahead.
pub fn tween_to_next(
    registry: &Registry,
    timelines: &mut Timelines,
    ball_id: BallId,
    current_time: f64,
    tempo: f64,
    config: &TweenConfig,
) -> usize {
    let Some(ball) = registry.get(ball_id) else {
        return 0;
    };
    let events = timelines.events(ball_id);
    let Some(next) = events.get(upper_bound(events, current_time)).copied() else {
        return 0;
    };

    let span = next.time - current_time;
    if !span.is_finite() || span <= 0.0 {
        return 0;
    }

    let interval = mean_interval(events).unwrap_or_else(|| nominal_interval(tempo, config));
    let steps = step_count(span, interval, config);
    let (start_x, start_y, start_z) = (ball.x(), ball.y(), 0.0_f32);

    let samples: Vec<RecordedEvent> = (1..=steps)
        .map(|step| {
            let t = step as f64 / (steps + 1) as f64;
            let weight = t as f32;
            RecordedEvent {
                ball_id,
                time: current_time + span * t,
                x: start_x + (next.x - start_x) * weight,
                y: start_y + (next.y - start_y) * weight,
                z: start_z + (next.z - start_z) * weight,
            }
        })
        .collect();

    tracing::debug!(ball_id, steps, span, interval, "tweening to next sample");
    timelines.extend_sorted(ball_id, samples);
    steps
}

/// Mean of the positive gaps between consecutive samples.
pub fn mean_interval(events: &[RecordedEvent]) -> Option<f64> {
    let (sum, count) = events
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|delta| *delta > 0.0)
        .fold((0.0, 0usize), |(sum, count), delta| (sum + delta, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// The nominal sampling interval expressed in quarter notes at `tempo`.
pub fn nominal_interval(tempo: f64, config: &TweenConfig) -> f64 {
    let tempo = if tempo.is_finite() && tempo > 0.0 {
        tempo
    } else {
        config.fallback_tempo
    };
    config.nominal_interval_ms / 1000.0 * tempo / 60.0
}

/// Number of samples to generate across `span`: one per `interval`, minus
/// the endpoint that already exists, bounded to [1, span * ceiling] and to
/// the absolute `max_steps`.
fn step_count(span: f64, interval: f64, config: &TweenConfig) -> usize {
    let ceiling = (span * config.max_steps_per_quarter)
        .ceil()
        .min(config.max_steps)
        .max(1.0);
    let wanted = if interval > 0.0 && interval.is_finite() {
        (span / interval).round() - 1.0
    } else {
        1.0
    };
    wanted.clamp(1.0, ceiling) as usize
}
