//! The complete persisted blob: pad state followed by the auxiliary
//! sections the host stores alongside it.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, attempt, StateReader, StateWriter},
    config::PadConfig,
    Pad, PadError, Result,
};

pub const DEFAULT_ZOOM_SCALE: f32 = 9.746;
pub const ZOOM_RANGE: (f32, f32) = (0.1, 10.0);

/// Free-form annotation row stored next to the pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub name: String,
    pub value1: f32,
    pub value2: f32,
    pub note: String,
}

impl TableRow {
    pub fn new(name: impl Into<String>, value1: f32, value2: f32, note: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value1,
            value2,
            note: note.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    rows: Vec<TableRow>,
}

impl Default for DataTable {
    fn default() -> Self {
        Self {
            rows: vec![
                TableRow::new("Example 1", 0.5, -0.3, "Note"),
                TableRow::new("Example 2", -0.2, 0.8, ""),
            ],
        }
    }
}

impl DataTable {
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn push(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    pub fn remove(&mut self, index: usize) -> Option<TableRow> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut TableRow> {
        self.rows.get_mut(index)
    }

    /// Removes rows whose name or note mentions `source_number`.
    pub fn remove_rows_for_source(&mut self, source_number: i32) -> usize {
        let needle = source_number.to_string();
        let before = self.rows.len();
        self.rows
            .retain(|row| !row.name.contains(&needle) && !row.note.contains(&needle));
        before - self.rows.len()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// One line per row: `"1. name | v1, v2 | note"`.
    pub fn to_display_string(&self) -> String {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let mut line = format!(
                    "{}. {} | {:.3}, {:.3}",
                    index + 1,
                    row.name,
                    row.value1,
                    row.value2
                );
                if !row.note.is_empty() {
                    line.push_str(" | ");
                    line.push_str(&row.note);
                }
                line.push('\n');
                line
            })
            .collect()
    }
}

/// Where position messages would be sent. Stored only; sending is the
/// host's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscSettings {
    pub ip_address: String,
    pub port: i32,
    pub enabled: bool,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            ip_address: "127.0.0.1".to_string(),
            port: 4002,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub pad: Pad,
    pub table: DataTable,
    pub osc: OscSettings,
    pub zoom_scale: f32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_pad(Pad::default())
    }
}

impl SessionState {
    pub fn with_pad(pad: Pad) -> Self {
        Self {
            pad,
            table: DataTable::default(),
            osc: OscSettings::default(),
            zoom_scale: DEFAULT_ZOOM_SCALE,
        }
    }

    pub fn serialize<W: Write>(&self, sink: W) -> Result<()> {
        let mut writer = StateWriter::new(sink);
        codec::write_pad(&self.pad, &mut writer)?;
        write_table(&self.table, &mut writer)?;
        writer.write_string(&self.osc.ip_address)?;
        writer.write_i32(self.osc.port)?;
        writer.write_bool(self.osc.enabled)?;
        writer.write_f32(self.zoom_scale)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Restores a session. Sections missing from the end keep their
    /// defaults; nothing here fails.
    pub fn from_bytes(bytes: &[u8], config: &PadConfig) -> Self {
        let mut reader = StateReader::new(bytes);
        let pad = codec::deserialize(&mut reader, config);
        let mut session = Self::with_pad(pad);

        match read_table(&mut reader, config.limits.max_table_rows) {
            Ok(Some(table)) => session.table = table,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "data table unreadable, clearing it");
                session.table = DataTable::empty();
                return session;
            }
        }

        if let Some(osc) = attempt(&mut reader, "osc settings", read_osc) {
            session.osc = osc;
        }
        if let Some(zoom) = attempt(&mut reader, "zoom scale", StateReader::read_f32) {
            session.zoom_scale = clamp_zoom(zoom);
        }
        session
    }

    pub fn load(path: &std::path::Path, config: &PadConfig) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes, config))
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.serialize(&mut file)?;
        Ok(file.flush()?)
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(ZOOM_RANGE.0, ZOOM_RANGE.1)
    } else {
        DEFAULT_ZOOM_SCALE
    }
}

fn write_table<W: Write>(table: &DataTable, writer: &mut StateWriter<W>) -> Result<()> {
    let count = i32::try_from(table.rows.len()).map_err(|_| PadError::OutOfRange {
        what: "table row count",
        value: table.rows.len() as i64,
    })?;
    writer.write_i32(count)?;
    for row in &table.rows {
        writer.write_string(&row.name)?;
        writer.write_f32(row.value1)?;
        writer.write_f32(row.value2)?;
        writer.write_string(&row.note)?;
    }
    Ok(())
}

/// `Ok(None)` when the stream ends before the table starts.
fn read_table(reader: &mut StateReader<'_>, max_rows: i32) -> Result<Option<DataTable>> {
    if reader.is_exhausted() {
        return Ok(None);
    }
    let count = reader.read_i32()?;
    if !(0..=max_rows).contains(&count) {
        return Err(PadError::OutOfRange {
            what: "table row count",
            value: count.into(),
        });
    }

    let mut table = DataTable::empty();
    for index in 0..count {
        match read_row(reader) {
            Ok(row) => table.push(row),
            Err(err) => {
                tracing::warn!(index, %err, "discarding partial table row");
                break;
            }
        }
    }
    Ok(Some(table))
}

fn read_row(reader: &mut StateReader<'_>) -> Result<TableRow> {
    Ok(TableRow {
        name: reader.read_string()?,
        value1: reader.read_f32()?,
        value2: reader.read_f32()?,
        note: reader.read_string()?,
    })
}

fn read_osc(reader: &mut StateReader<'_>) -> Result<OscSettings> {
    Ok(OscSettings {
        ip_address: reader.read_string()?,
        port: reader.read_i32()?,
        enabled: reader.read_bool()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionState {
        let mut pad = Pad::empty();
        pad.add_ball(1, 0.1, 0.2);
        pad.record_event(1, 0.0, 0.1, 0.2, 0.0);
        let mut session = SessionState::with_pad(pad);
        session.table.push(TableRow::new("Source 3", 1.0, 2.0, "bass"));
        session.osc = OscSettings {
            ip_address: "10.0.0.2".to_string(),
            port: 9000,
            enabled: false,
        };
        session.zoom_scale = 2.5;
        session
    }

    #[test]
    fn round_trips_every_section() {
        let original = session();
        let bytes = original.to_bytes().unwrap();
        let loaded = SessionState::from_bytes(&bytes, &PadConfig::default());

        assert_eq!(loaded.pad.event_count(1), 1);
        assert_eq!(loaded.table, original.table);
        assert_eq!(loaded.osc, original.osc);
        assert_eq!(loaded.zoom_scale, 2.5);
    }

    #[test]
    fn pad_state_without_timelines_keeps_table_aligned() {
        let original = session();
        let mut pad = original.pad.clone();
        pad.clear_all_events();
        let mut bytes = codec::to_bytes(&pad).unwrap();
        // Saves from before recording existed end the pad state right after
        // the balls.
        bytes.truncate(bytes.len() - 12);
        let mut writer = StateWriter::new(&mut bytes);
        write_table(&original.table, &mut writer).unwrap();

        let loaded = SessionState::from_bytes(&bytes, &PadConfig::default());
        assert_eq!(loaded.pad.balls().len(), 1);
        assert!(loaded.pad.timelines().is_empty());
        assert_eq!(loaded.table, original.table);
        assert_eq!(loaded.osc, OscSettings::default());
        assert_eq!(loaded.zoom_scale, DEFAULT_ZOOM_SCALE);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut original = session();
        original.zoom_scale = 55.0;
        let loaded =
            SessionState::from_bytes(&original.to_bytes().unwrap(), &PadConfig::default());
        assert_eq!(loaded.zoom_scale, 10.0);
    }

    #[test]
    fn corrupt_table_count_clears_table() {
        let original = session();
        let mut bytes = codec::to_bytes(&original.pad).unwrap();
        bytes.extend_from_slice(&(-4_i32).to_le_bytes());

        let loaded = SessionState::from_bytes(&bytes, &PadConfig::default());
        assert_eq!(loaded.pad.event_count(1), 1);
        assert!(loaded.table.rows().is_empty());
    }

    #[test]
    fn removes_rows_mentioning_source() {
        let mut table = DataTable::default();
        table.push(TableRow::new("Source 3", 0.0, 0.0, ""));
        table.push(TableRow::new("Lead", 0.0, 0.0, "from 3"));

        assert_eq!(table.remove_rows_for_source(3), 2);
        assert_eq!(table.rows().len(), 2);
    }

    #[test]
    fn display_string_lists_rows() {
        let table = DataTable::default();
        assert_eq!(
            table.to_display_string(),
            "1. Example 1 | 0.500, -0.300 | Note\n2. Example 2 | -0.200, 0.800\n"
        );
    }
}
