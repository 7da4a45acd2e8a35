//! Core library for the JYPad 2D controller.
//!
//! A pad holds a set of balls whose positions drive continuous control
//! output. Each ball can carry a recorded timeline of position samples,
//! indexed by transport time, which is recorded while dragging, played back
//! from the host transport, densified by tweening and persisted in a
//! versioned binary format that tolerates truncated and older data.

pub mod codec;
pub mod config;
pub mod error;
pub mod pad;
pub mod playback;
pub mod registry;
pub mod session;
pub mod timeline;
pub mod tween;

pub use codec::{StateReader, StateWriter};
pub use config::{AppConfig, PadConfig};
pub use error::{PadError, Result};
pub use pad::Pad;
pub use playback::{PlaybackQuery, TransportFollower, TransportSnapshot};
pub use registry::{Ball, BallId, BallMoved, Colour, Registry, SourceInfo};
pub use session::{DataTable, OscSettings, SessionState, TableRow};
pub use timeline::{RecordedEvent, Timelines};
