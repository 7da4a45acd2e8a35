//! Binary persistence for a [`Pad`].
//!
//! Layout (little-endian): the ball count, then one record per ball
//! (`id`, `x`, `y`, OSC prefix, ARGB colour, source name, source number,
//! mute, solo, recording), then an optional timeline section introduced by
//! [`TIMELINE_SECTION_TAG`] and a byte length. Payload: timeline count, then
//! per timeline the ball key, sample count and `(key, time, x, y, z)` samples.
//!
//! Loading never fails. Damaged input degrades to defaults at the smallest
//! granularity possible: one sample, one ball, one section.

mod reader;
mod writer;

use std::io::Write;

pub use reader::{attempt, StateReader};
pub use writer::StateWriter;

use crate::{
    config::{Limits, PadConfig},
    registry::{Ball, Colour, SourceInfo},
    timeline::{RecordedEvent, Timelines},
    Pad, PadError, Result,
};

/// "REC2": length-prefixed timeline section.
pub const TIMELINE_SECTION_TAG: i32 = 0x5245_4332;
/// "RECM": unframed timeline section written by older versions.
pub const LEGACY_TIMELINE_MARKER: i32 = 0x5245_434D;

const POSITION_ONLY_RECORD_LEN: usize = 12;

pub fn serialize<W: Write>(pad: &Pad, sink: W) -> Result<()> {
    let mut writer = StateWriter::new(sink);
    write_pad(pad, &mut writer)
}

/// Serializes into a fresh buffer.
pub fn to_bytes(pad: &Pad) -> Result<Vec<u8>> {
    let mut writer = StateWriter::new(Vec::new());
    write_pad(pad, &mut writer)?;
    Ok(writer.into_inner())
}

pub(crate) fn write_pad<W: Write>(pad: &Pad, writer: &mut StateWriter<W>) -> Result<()> {
    let balls = pad.balls();
    writer.write_i32(len_i32(balls.len(), "ball count")?)?;
    for ball in balls {
        write_ball(ball, writer)?;
    }
    write_timeline_section(pad.timelines(), writer)
}

fn write_ball<W: Write>(ball: &Ball, writer: &mut StateWriter<W>) -> Result<()> {
    writer.write_i32(ball.id())?;
    writer.write_f32(ball.x())?;
    writer.write_f32(ball.y())?;
    writer.write_string(&ball.source.osc_prefix)?;
    writer.write_i32(ball.source.colour.argb_bits())?;
    writer.write_string(&ball.source.name)?;
    writer.write_i32(ball.source.number)?;
    writer.write_bool(ball.is_muted)?;
    writer.write_bool(ball.is_soloed)?;
    writer.write_bool(ball.is_recording)
}

fn write_timeline_section<W: Write>(
    timelines: &Timelines,
    writer: &mut StateWriter<W>,
) -> Result<()> {
    let mut payload = StateWriter::new(Vec::new());
    payload.write_i32(len_i32(timelines.len(), "timeline count")?)?;
    for (ball_id, events) in timelines.iter() {
        payload.write_i32(ball_id)?;
        payload.write_i32(len_i32(events.len(), "event count")?)?;
        for event in events {
            payload.write_i32(event.ball_id)?;
            payload.write_f64(event.time)?;
            payload.write_f32(event.x)?;
            payload.write_f32(event.y)?;
            payload.write_f32(event.z)?;
        }
    }

    let payload = payload.into_inner();
    let len = u32::try_from(payload.len()).map_err(|_| PadError::OutOfRange {
        what: "timeline section length",
        value: payload.len() as i64,
    })?;
    writer.write_i32(TIMELINE_SECTION_TAG)?;
    writer.write_u32(len)?;
    writer.write_bytes(&payload)
}

fn len_i32(len: usize, what: &'static str) -> Result<i32> {
    i32::try_from(len).map_err(|_| PadError::OutOfRange {
        what,
        value: len as i64,
    })
}

/// Loads a pad from `bytes` using the default config.
pub fn from_bytes(bytes: &[u8]) -> Pad {
    deserialize(&mut StateReader::new(bytes), &PadConfig::default())
}

/// Reads a pad and leaves `reader` just past the pad state, so a following
/// reader can pick up where this one stopped.
pub fn deserialize(reader: &mut StateReader<'_>, config: &PadConfig) -> Pad {
    let mut pad = Pad::empty_with_config(config.clone());

    if let Err(err) = read_registry(reader, &mut pad) {
        tracing::warn!(%err, "ball registry unreadable, resetting to a single default ball");
        return Pad::with_config(config.clone());
    }

    if let Err(err) = read_timeline_section(reader, &mut pad) {
        tracing::warn!(%err, "timeline section unreadable, dropping recorded events");
        pad.clear_all_events();
    }

    let orphans = pad.prune_orphan_timelines();
    if orphans > 0 {
        tracing::warn!(orphans, "dropped timelines without a matching ball");
    }
    pad
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordShape {
    /// `id, x, y` only, from the earliest saves.
    PositionOnly,
    /// Position followed by optional trailing generations of fields.
    Extended,
}

impl RecordShape {
    /// Complete current-shape records that end at the end of the stream or
    /// at a well-formed timeline section always win. Otherwise position-only
    /// records are recognised when they fill the rest of the stream exactly,
    /// or end right at a well-formed timeline section, and every record holds
    /// a plausible id and in-range coordinates.
    fn detect(reader: &StateReader<'_>, count: usize, limits: &Limits) -> Self {
        if count == 0 || reads_as_current(reader, count, limits) {
            return Self::Extended;
        }
        let Some(len) = count.checked_mul(POSITION_ONLY_RECORD_LEN) else {
            return Self::Extended;
        };
        let fits = match reader.remaining() {
            remaining if remaining == len => true,
            remaining if remaining > len => section_starts_at(reader, len, limits),
            _ => false,
        };
        if !fits {
            return Self::Extended;
        }

        let mut probe = *reader;
        let plausible = (0..count).all(|_| {
            let record = (probe.read_i32(), probe.read_f32(), probe.read_f32());
            match record {
                (Ok(id), Ok(x), Ok(y)) => {
                    (0..=limits.max_ball_id).contains(&id)
                        && (-1.0..=1.0).contains(&x)
                        && (-1.0..=1.0).contains(&y)
                }
                _ => false,
            }
        });
        if plausible {
            Self::PositionOnly
        } else {
            Self::Extended
        }
    }
}

/// True when `count` full current-shape records (every optional field
/// present) can be read and are followed by nothing or by a timeline section.
fn reads_as_current(reader: &StateReader<'_>, count: usize, limits: &Limits) -> bool {
    let mut probe = *reader;
    let complete = (0..count).all(|_| skip_current_record(&mut probe, limits).is_ok());
    complete && (probe.is_exhausted() || section_starts_at(&probe, 0, limits))
}

fn skip_current_record(reader: &mut StateReader<'_>, limits: &Limits) -> Result<()> {
    let id = reader.read_i32()?;
    if !(0..=limits.max_ball_id).contains(&id) {
        return Err(PadError::OutOfRange {
            what: "ball id",
            value: id.into(),
        });
    }
    reader.skip(8)?;
    read_source(reader)?;
    reader.skip(3)
}

/// Checks for a timeline section `offset` bytes ahead whose header is
/// consistent: a framed section must fit in the stream and open with an
/// in-range timeline count, and a legacy one must open with one.
fn section_starts_at(reader: &StateReader<'_>, offset: usize, limits: &Limits) -> bool {
    let count_in_range = |at: usize| {
        reader
            .peek_i32_at(at)
            .is_some_and(|count| (0..=limits.max_timelines).contains(&count))
    };
    match reader.peek_i32_at(offset) {
        Some(TIMELINE_SECTION_TAG) => {
            let Some(len) = reader.peek_i32_at(offset + 4).map(|len| len as u32 as usize) else {
                return false;
            };
            let fits = offset
                .checked_add(8)
                .and_then(|start| start.checked_add(len))
                .is_some_and(|end| end <= reader.remaining());
            fits && len >= 4 && count_in_range(offset + 8)
        }
        Some(LEGACY_TIMELINE_MARKER) => count_in_range(offset + 4),
        _ => false,
    }
}

fn read_registry(reader: &mut StateReader<'_>, pad: &mut Pad) -> Result<()> {
    let limits = pad.config().limits.clone();
    let count = reader.read_i32()?;
    if !(0..=limits.max_balls).contains(&count) {
        return Err(PadError::OutOfRange {
            what: "ball count",
            value: count.into(),
        });
    }

    let count = count as usize;
    let shape = RecordShape::detect(reader, count, &limits);
    if shape == RecordShape::PositionOnly {
        tracing::debug!(count, "reading position-only ball records");
    }

    for index in 0..count {
        if reader.is_exhausted() {
            tracing::warn!(index, count, "stream ended before every ball was read");
            break;
        }
        match read_ball(reader, shape, &limits) {
            Ok(ball) => {
                let id = ball.id();
                if !pad.insert_ball(ball) {
                    tracing::warn!(id, "duplicate ball id in stream, keeping the first");
                }
            }
            Err(err) => {
                tracing::warn!(index, %err, "discarding partial ball record");
                break;
            }
        }
    }
    Ok(())
}

fn read_ball(reader: &mut StateReader<'_>, shape: RecordShape, limits: &Limits) -> Result<Ball> {
    let id = reader.read_i32()?;
    if !(0..=limits.max_ball_id).contains(&id) {
        return Err(PadError::OutOfRange {
            what: "ball id",
            value: id.into(),
        });
    }
    let x = reader.read_f32()?;
    let y = reader.read_f32()?;
    let mut ball = Ball::new(id, x, y);
    if shape == RecordShape::PositionOnly {
        return Ok(ball);
    }

    let Some(source) = attempt(reader, "source info", read_source) else {
        return Ok(ball);
    };
    ball.source = source;

    // Each flag arrived in a later format generation; stop at the first gap.
    let Some(muted) = attempt(reader, "mute", StateReader::read_bool) else {
        return Ok(ball);
    };
    ball.is_muted = muted;
    let Some(soloed) = attempt(reader, "solo", StateReader::read_bool) else {
        return Ok(ball);
    };
    ball.is_soloed = soloed;
    ball.is_recording = attempt(reader, "recording", StateReader::read_bool).unwrap_or(false);
    Ok(ball)
}

fn read_source(reader: &mut StateReader<'_>) -> Result<SourceInfo> {
    Ok(SourceInfo {
        osc_prefix: reader.read_string()?,
        colour: Colour::from_argb_bits(reader.read_i32()?),
        name: reader.read_string()?,
        number: reader.read_i32()?,
    })
}

fn read_timeline_section(reader: &mut StateReader<'_>, pad: &mut Pad) -> Result<()> {
    match reader.peek_i32() {
        Some(TIMELINE_SECTION_TAG) => {
            reader.skip(4)?;
            let len = reader.read_u32()? as usize;
            let mut section = reader.split_off(len);
            if section.remaining() < len {
                tracing::warn!(
                    expected = len,
                    available = section.remaining(),
                    "timeline section is truncated"
                );
            }
            read_timelines(&mut section, pad)
        }
        Some(LEGACY_TIMELINE_MARKER) => {
            tracing::debug!("reading legacy unframed timeline section");
            reader.skip(4)?;
            read_timelines(reader, pad)
        }
        Some(other) => {
            tracing::debug!(marker = format_args!("{other:#010x}"), "no timeline section present");
            Ok(())
        }
        None => {
            tracing::debug!("no timeline section present");
            Ok(())
        }
    }
}

fn read_timelines(reader: &mut StateReader<'_>, pad: &mut Pad) -> Result<()> {
    let limits = pad.config().limits.clone();
    let count = reader.read_i32()?;
    if !(0..=limits.max_timelines).contains(&count) {
        return Err(PadError::OutOfRange {
            what: "timeline count",
            value: count.into(),
        });
    }

    for _ in 0..count {
        let Some(key) = attempt(reader, "timeline key", StateReader::read_i32) else {
            break;
        };
        let Some(len) = attempt(reader, "event count", StateReader::read_i32) else {
            break;
        };
        if !(0..=limits.max_events_per_ball).contains(&len) {
            return Err(PadError::OutOfRange {
                what: "event count",
                value: len.into(),
            });
        }

        let (events, complete) = read_events(reader, key, len as usize);
        pad.timelines_mut().replace(key, events);
        if !complete {
            break;
        }
    }
    Ok(())
}

/// Reads up to `len` samples. Non-finite samples are skipped one by one; a
/// sample cut off by the end of the stream is discarded and ends the read.
fn read_events(reader: &mut StateReader<'_>, key: i32, len: usize) -> (Vec<RecordedEvent>, bool) {
    let mut events = Vec::with_capacity(len.min(reader.remaining() / 24));
    for index in 0..len {
        match read_event(reader) {
            Ok(event) if event.is_finite() => events.push(event),
            Ok(_) => tracing::warn!(ball_id = key, index, "skipping non-finite sample"),
            Err(err) => {
                tracing::warn!(ball_id = key, index, %err, "sample cut off, stopping");
                return (events, false);
            }
        }
    }
    (events, true)
}

fn read_event(reader: &mut StateReader<'_>) -> Result<RecordedEvent> {
    Ok(RecordedEvent {
        ball_id: reader.read_i32()?,
        time: reader.read_f64()?,
        x: reader.read_f32()?,
        y: reader.read_f32()?,
        z: reader.read_f32()?,
    })
}
