use crate::error::FormError;
use crate::geo::DroneTelemetry;
use log::debug;
use std::fmt;

/// The telemetry values the operator can enter, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Latitude,
    Longitude,
    Altitude,
    Compass,
    Pitch,
}

impl FieldKey {
    pub const ALL: [FieldKey; 5] = [
        FieldKey::Latitude,
        FieldKey::Longitude,
        FieldKey::Altitude,
        FieldKey::Compass,
        FieldKey::Pitch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FieldKey::Latitude => "DRONE LATITUDE:",
            FieldKey::Longitude => "DRONE LONGITUDE:",
            FieldKey::Altitude => "DRONE ALTITUDE (m):",
            FieldKey::Compass => "COMPASS (deg):",
            FieldKey::Pitch => "CAMERA PITCH (deg):",
        }
    }

    fn apply(self, telemetry: &mut DroneTelemetry, value: f64) {
        match self {
            FieldKey::Latitude => telemetry.latitude = value,
            FieldKey::Longitude => telemetry.longitude = value,
            FieldKey::Altitude => telemetry.altitude_m = value,
            FieldKey::Compass => telemetry.compass_deg = value,
            FieldKey::Pitch => telemetry.camera_pitch_deg = value,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKey::Latitude => "latitude",
            FieldKey::Longitude => "longitude",
            FieldKey::Altitude => "altitude",
            FieldKey::Compass => "compass",
            FieldKey::Pitch => "pitch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One labeled numeric input.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryField {
    pub key: FieldKey,
    pub label: &'static str,
    /// Last committed text; empty until the first successful commit.
    pub text_value: String,
    /// Uncommitted text left on the field when focus moved away. Shown and
    /// restored on refocus; never applied to the telemetry.
    pub draft: String,
    pub is_active: bool,
}

impl TelemetryField {
    /// Text to show for the field when it is not being edited.
    pub fn display_text(&self) -> &str {
        if self.draft.is_empty() {
            &self.text_value
        } else {
            &self.draft
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommitOutcome {
    /// Value stored, focus moved to the given field.
    Advanced(FieldKey),
    /// Value stored on the last field; the form no longer has focus.
    Completed,
}

/// One visible row of the editor, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow<'a> {
    /// Position within the visible window (0 = top row).
    pub slot: usize,
    pub key: FieldKey,
    pub label: &'static str,
    /// Edit buffer for the active row, committed value otherwise.
    pub text: &'a str,
    pub is_active: bool,
}

/// Draw model of the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct FormView<'a> {
    pub rows: Vec<FieldRow<'a>>,
    pub can_scroll_up: bool,
    pub can_scroll_down: bool,
}

/// Scrollable telemetry entry form.
///
/// Holds the drone telemetry it edits: a value only reaches
/// [`DroneTelemetry`] through [`TelemetryForm::commit`], so the telemetry
/// always reflects Enter-confirmed input.
#[derive(Debug, Clone)]
pub struct TelemetryForm {
    fields: Vec<TelemetryField>,
    active: Option<usize>,
    edit_buffer: String,
    scroll_position: usize,
    visible_count: usize,
    telemetry: DroneTelemetry,
}

impl TelemetryForm {
    pub fn new(visible_count: usize) -> Self {
        let fields = FieldKey::ALL
            .iter()
            .map(|&key| TelemetryField {
                key,
                label: key.label(),
                text_value: String::new(),
                draft: String::new(),
                is_active: false,
            })
            .collect::<Vec<_>>();
        let visible_count = visible_count.clamp(1, fields.len());
        Self {
            fields,
            active: None,
            edit_buffer: String::new(),
            scroll_position: 0,
            visible_count,
            telemetry: DroneTelemetry::default(),
        }
    }

    pub fn telemetry(&self) -> &DroneTelemetry {
        &self.telemetry
    }

    pub fn fields(&self) -> &[TelemetryField] {
        &self.fields
    }

    pub fn active(&self) -> Option<FieldKey> {
        self.active.map(|i| self.fields[i].key)
    }

    pub fn edit_buffer(&self) -> &str {
        &self.edit_buffer
    }

    pub fn scroll_position(&self) -> usize {
        self.scroll_position
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    fn max_scroll(&self) -> usize {
        self.fields.len().saturating_sub(self.visible_count)
    }

    fn index_of(&self, key: FieldKey) -> usize {
        self.fields
            .iter()
            .position(|f| f.key == key)
            .unwrap_or_default()
    }

    /// Focus `key`. Uncommitted input on the previous field stays on that
    /// field as a draft; the telemetry only changes on commit.
    pub fn activate(&mut self, key: FieldKey) {
        self.activate_index(self.index_of(key));
    }

    pub fn activate_first(&mut self) {
        self.activate_index(0);
    }

    fn activate_index(&mut self, index: usize) {
        self.release_active();
        let field = &mut self.fields[index];
        field.is_active = true;
        self.edit_buffer = field.display_text().to_string();
        let key = field.key;
        self.active = Some(index);
        self.scroll_into_view(index);
        debug!("telemetry field {} active", key);
    }

    /// Drop focus. Uncommitted input stays on the field as a draft.
    pub fn deactivate(&mut self) {
        self.release_active();
    }

    fn release_active(&mut self) {
        let buffer = std::mem::take(&mut self.edit_buffer);
        if let Some(prev) = self.active.take() {
            let field = &mut self.fields[prev];
            field.is_active = false;
            field.draft = if buffer == field.text_value { String::new() } else { buffer };
        }
    }

    /// Move focus one field up or down. Returns false at either end or
    /// when nothing is focused.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        let Some(current) = self.active else {
            return false;
        };
        let next = match direction {
            Direction::Up if current > 0 => current - 1,
            Direction::Down if current + 1 < self.fields.len() => current + 1,
            _ => return false,
        };
        self.activate_index(next);
        true
    }

    /// Move the visible window without changing focus.
    pub fn scroll_by(&mut self, steps: i32) {
        let target = self.scroll_position as i64 + steps as i64;
        self.scroll_position = target.clamp(0, self.max_scroll() as i64) as usize;
    }

    fn scroll_into_view(&mut self, index: usize) {
        if index < self.scroll_position {
            self.scroll_position = index;
        } else if index >= self.scroll_position + self.visible_count {
            self.scroll_position = index + 1 - self.visible_count;
        }
        self.scroll_position = self.scroll_position.min(self.max_scroll());
    }

    /// Append a character to the edit buffer. Only digits, `.` and `-` are
    /// accepted; returns whether the character was taken.
    pub fn type_char(&mut self, c: char) -> bool {
        if self.active.is_none() {
            return false;
        }
        if c.is_ascii_digit() || c == '.' || c == '-' {
            self.edit_buffer.push(c);
            true
        } else {
            false
        }
    }

    pub fn backspace(&mut self) {
        if self.active.is_some() {
            self.edit_buffer.pop();
        }
    }

    /// Validate and store the edit buffer, then advance focus.
    pub fn commit(&mut self) -> Result<CommitOutcome, FormError> {
        let index = self.active.ok_or(FormError::NoActiveField)?;
        let key = self.fields[index].key;
        let value = match self.edit_buffer.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                return Err(FormError::InvalidNumber {
                    field: key,
                    text: self.edit_buffer.clone(),
                })
            }
        };

        self.edit_buffer = self.edit_buffer.trim().to_string();
        self.fields[index].text_value.clone_from(&self.edit_buffer);
        self.fields[index].draft.clear();
        key.apply(&mut self.telemetry, value);
        debug!("telemetry {} = {}", key, value);

        if self.navigate(Direction::Down) {
            Ok(CommitOutcome::Advanced(self.fields[index + 1].key))
        } else {
            self.deactivate();
            Ok(CommitOutcome::Completed)
        }
    }

    /// True once every field has been committed at least once.
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| !f.text_value.is_empty())
    }

    pub fn view(&self) -> FormView<'_> {
        let end = (self.scroll_position + self.visible_count).min(self.fields.len());
        let rows = self.fields[self.scroll_position..end]
            .iter()
            .enumerate()
            .map(|(slot, f)| FieldRow {
                slot,
                key: f.key,
                label: f.label,
                text: if f.is_active {
                    self.edit_buffer.as_str()
                } else {
                    f.display_text()
                },
                is_active: f.is_active,
            })
            .collect();
        FormView {
            rows,
            can_scroll_up: self.scroll_position > 0,
            can_scroll_down: end < self.fields.len(),
        }
    }

    /// Field shown in the given visible slot, if any.
    pub fn key_at_slot(&self, slot: usize) -> Option<FieldKey> {
        if slot >= self.visible_count {
            return None;
        }
        self.fields.get(self.scroll_position + slot).map(|f| f.key)
    }
}
