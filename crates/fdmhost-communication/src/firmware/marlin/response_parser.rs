//! Marlin Response Parser
//!
//! Classifies response lines and extracts temperature telemetry. Marlin
//! reports temperatures both in reply to `M105` and piggy-backed on other
//! acknowledgments, so every line read from the device goes through
//! [`parse_temperature`].

use fdmhost_core::TemperatureReading;
use std::fmt;

/// Marlin response types
#[derive(Debug, Clone, PartialEq)]
pub enum MarlinResponse {
    /// Acknowledgment (possibly carrying telemetry)
    Ok(String),
    /// Error report
    Error(String),
    /// Identification text naming the firmware
    Firmware(String),
    /// Anything else (echo, busy, telemetry without ok)
    Message(String),
}

impl MarlinResponse {
    /// Classify a response line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let text = line.to_string();
        Some(if is_error(line) {
            Self::Error(text)
        } else if is_acknowledgment(line) {
            Self::Ok(text)
        } else if has_firmware_signature(line) {
            Self::Firmware(text)
        } else {
            Self::Message(text)
        })
    }
}

impl fmt::Display for MarlinResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(text) => write!(f, "ok:{}", text),
            Self::Error(text) => write!(f, "error:{}", text),
            Self::Firmware(text) => write!(f, "firmware:{}", text),
            Self::Message(text) => write!(f, "message:{}", text),
        }
    }
}

fn has_word(line: &str, word: &str) -> bool {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case(word))
}

/// Check for the acknowledgment token `ok`
pub fn is_acknowledgment(line: &str) -> bool {
    has_word(line, "ok")
}

/// Check for the error token `error`
pub fn is_error(line: &str) -> bool {
    has_word(line, "error")
}

/// Check if a line identifies Marlin firmware (Creality builds say "Ender")
pub fn has_firmware_signature(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("marlin") || lower.contains("ender")
}

#[derive(Clone, Copy)]
enum Sensor {
    Hotend,
    FirstExtruder,
    Bed,
}

/// Extract temperatures from a response line
///
/// Understands `T:<cur>`, `T0:<cur>` and `B:<cur>`, each optionally followed
/// by `/<target>` with or without whitespace around the slash. `T0` only
/// counts when the line has no `T` field. Fields that fail to parse are
/// left as `None`.
pub fn parse_temperature(line: &str) -> TemperatureReading {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut reading = TemperatureReading::default();
    let mut first_extruder: (Option<f64>, Option<f64>) = (None, None);
    let mut saw_hotend = false;
    let mut saw_bed = false;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        i += 1;

        let Some((label, rest)) = token.split_once(':') else {
            continue;
        };
        let sensor = match label {
            "T" if !saw_hotend => Sensor::Hotend,
            "T0" => Sensor::FirstExtruder,
            "B" if !saw_bed => Sensor::Bed,
            _ => continue,
        };

        let (current, target) = match rest.split_once('/') {
            Some((current, "")) => {
                // "T:25.0/ 200.0"
                let target = tokens.get(i).and_then(|t| parse_number(t));
                if target.is_some() {
                    i += 1;
                }
                (parse_number(current), target)
            }
            Some((current, target)) => (parse_number(current), parse_number(target)),
            None => {
                let mut target = None;
                if let Some(next) = tokens.get(i).and_then(|t| t.strip_prefix('/')) {
                    i += 1;
                    if next.is_empty() {
                        // "T:25.0 / 200.0"
                        target = tokens.get(i).and_then(|t| parse_number(t));
                        if target.is_some() {
                            i += 1;
                        }
                    } else {
                        target = parse_number(next);
                    }
                }
                (parse_number(rest), target)
            }
        };

        match sensor {
            Sensor::Hotend => {
                saw_hotend = true;
                reading.hotend = current;
                reading.hotend_target = target;
            }
            Sensor::FirstExtruder => {
                if first_extruder == (None, None) {
                    first_extruder = (current, target);
                }
            }
            Sensor::Bed => {
                saw_bed = true;
                reading.bed = current;
                reading.bed_target = target;
            }
        }
    }

    if !saw_hotend {
        reading.hotend = first_extruder.0;
        reading.hotend_target = first_extruder.1;
    }

    reading
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
