//! Decoder for the controller's ASCII telemetry line.
//!
//! One line carries ten comma-separated `KEY:VALUE` fields in a fixed order:
//!
//! ```text
//! P:<float>,T:<float>,MV:<float>,SH:<float>,F:<token>,M:<token>,ESD:<token>,ESTADO:<text>,RELIEF:<token>,PURGE:<token>
//! ```
//!
//! `ESTADO` is the only value allowed to contain whitespace or colons. Nothing
//! here does I/O and nothing panics: a line that does not match is simply `None`.
use crate::types::{Reading, SampleFields};

const FIELD_KEYS: [&str; 10] = [
    "P", "T", "MV", "SH", "F", "M", "ESD", "ESTADO", "RELIEF", "PURGE",
];

/// ESD token the controller sends while the emergency shutdown is engaged.
pub const ESD_ACTIVE_TOKEN: &str = "Activado";

/// Decode one trimmed line. Returns `None` on any grammar or number mismatch.
pub fn parse_line(line: &str) -> Option<SampleFields> {
    let mut values: [&str; 10] = [""; 10];
    let mut parts = line.split(',');
    for (slot, key) in values.iter_mut().zip(FIELD_KEYS) {
        let (found_key, value) = parts.next()?.split_once(':')?;
        if found_key != key {
            return None;
        }
        *slot = value;
    }
    if parts.next().is_some() {
        return None;
    }
    let [p, t, mv, sh, flow, mode, esd, state, relief, purge] = values;
    if ![flow, mode, esd, relief, purge].iter().all(|v| is_token(v)) || !is_state_text(state) {
        return None;
    }
    Some(SampleFields {
        reading: Reading {
            pressure: parse_number(p)?,
            temperature: parse_number(t)?,
        },
        valve_opening: parse_number(mv)?,
        superheat: parse_number(sh)?,
        flow_mode: flow.to_owned(),
        control_mode: mode.to_owned(),
        emergency_shutdown: esd.to_owned(),
        system_state: state.to_owned(),
        relief_valve: relief.to_owned(),
        purge_valve: purge.to_owned(),
    })
}

// Digits, dots and minus signs only; `f64::from_str` alone would also take
// "inf", "1e3" or "+4".
fn parse_number(raw: &str) -> Option<f64> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
        return None;
    }
    raw.parse().ok()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_token(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(is_word_char)
}

fn is_state_text(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| is_word_char(c) || c.is_whitespace() || c == ':')
}

/// Presentation tier of the free-text system state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Nominal,
}

/// Evaluated top to bottom; the first rule with a matching keyword wins.
const SEVERITY_RULES: [(Severity, &[&str]); 2] = [
    (Severity::Critical, &["Alivio", "Purga", "Emergencia"]),
    (
        Severity::Warning,
        &["Advertencia", "Recuperación", "Precalentamiento"],
    ),
];

pub fn classify_state(state: &str) -> Severity {
    SEVERITY_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| state.contains(k)))
        .map(|(severity, _)| *severity)
        .unwrap_or(Severity::Nominal)
}
