use std::io::Write;

use anyhow::Result;
use chrono::prelude::*;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::rotary::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One action name per line
    Text,
    /// One JSON object per line, with a timestamp
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub action: Action,
}

// Print a single action
pub fn write_action<W: Write>(out: &mut W, format: Format, action: Action) -> Result<()> {
    match format {
        Format::Text => writeln!(out, "{}", action)?,
        Format::Json => {
            let record = ActionRecord {
                timestamp: Utc::now(),
                action,
            };
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text() {
        let mut out = Vec::new();
        write_action(&mut out, Format::Text, Action::Clockwise).unwrap();
        write_action(&mut out, Format::Text, Action::ButtonReleased).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "clockwise\nbuttonReleased\n");
    }

    #[test]
    fn json() {
        let mut out = Vec::new();
        write_action(&mut out, Format::Json, Action::CounterClockwise).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.ends_with('\n'));

        let record: ActionRecord = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(record.action, Action::CounterClockwise);
        assert!(line.contains(r#""action":"counterClockwise""#));
    }
}
