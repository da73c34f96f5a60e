//! # Interaction Scripts
//!
//! Line-oriented scripts that replay a user session against one picker.
//!
//! ```text
//! # comments and blank lines are ignored
//! init 42
//! open
//! type engin
//! wait 500
//! scroll 20
//! down
//! enter
//! depend university_id=10
//! invalidate
//! ```

use crate::driver::UiEvent;
use crate::error::AppError;
use picklist_core::{DependencyFilter, Key};

/// One executable line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Event(UiEvent),
    /// Let time pass, in milliseconds.
    Wait(u64),
}

/// A parsed line with its source text, for echoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub number: usize,
    pub source: String,
    pub step: ScriptStep,
}

fn script_error(number: usize, message: impl Into<String>) -> AppError {
    AppError::Script {
        line: number,
        message: message.into(),
    }
}

fn parse_number<T: std::str::FromStr>(number: usize, raw: &str, what: &str) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| script_error(number, format!("expected {} but found '{}'", what, raw.trim())))
}

fn parse_line(number: usize, line: &str) -> Result<ScriptStep, AppError> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let event = match command {
        "open" => UiEvent::Open,
        "close" => UiEvent::Close,
        "escape" => UiEvent::Key(Key::Escape),
        "down" => UiEvent::Key(Key::ArrowDown),
        "up" => UiEvent::Key(Key::ArrowUp),
        "enter" => UiEvent::Key(Key::Enter),
        "clear" => UiEvent::ClearSelection,
        "invalidate" => UiEvent::InvalidateCollection,
        // Keeps inner spaces; the controller trims the term itself.
        "type" => UiEvent::Input(rest.to_string()),
        "wait" => return Ok(ScriptStep::Wait(parse_number(number, rest, "milliseconds")?)),
        "scroll" => UiEvent::Scroll {
            remaining_px: parse_number(number, rest, "pixels")?,
        },
        "select" => {
            let id = rest.trim();
            if id.is_empty() {
                return Err(script_error(number, "select needs an id"));
            }
            UiEvent::Select(id.to_string())
        }
        "init" => {
            let id = rest.trim();
            UiEvent::Initialize((!id.is_empty()).then(|| id.to_string()))
        }
        "depend" => {
            let filter: DependencyFilter = rest
                .trim()
                .parse()
                .map_err(|e: picklist_core::PicklistError| script_error(number, e.to_string()))?;
            UiEvent::SetDependency {
                field: filter.field,
                value: filter.value,
            }
        }
        other => return Err(script_error(number, format!("unknown command '{}'", other))),
    };
    Ok(ScriptStep::Event(event))
}

/// Parse a whole script. Line numbers are one-based.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, AppError> {
    let mut lines = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim_start();
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_line(number, line)?;
        lines.push(ScriptLine {
            number,
            source: line.trim_end().to_string(),
            step,
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picklist_core::FilterValue;

    #[test]
    fn parses_every_command() {
        let script = "\
# session
init 42
open
type  civil eng
wait 500
scroll 20
down
up
enter
select 7
escape
close
clear
invalidate
depend university_id=10
";
        let steps: Vec<_> = parse_script(script)
            .expect("valid script")
            .into_iter()
            .map(|l| l.step)
            .collect();
        assert_eq!(steps.len(), 14);
        assert_eq!(steps[0], ScriptStep::Event(UiEvent::Initialize(Some("42".into()))));
        assert_eq!(steps[2], ScriptStep::Event(UiEvent::Input(" civil eng".into())));
        assert_eq!(steps[3], ScriptStep::Wait(500));
        assert_eq!(
            steps[4],
            ScriptStep::Event(UiEvent::Scroll { remaining_px: 20 })
        );
        assert_eq!(
            steps[13],
            ScriptStep::Event(UiEvent::SetDependency {
                field: "university_id".into(),
                value: FilterValue::Number(10),
            })
        );
    }

    #[test]
    fn bare_type_clears_search() {
        let lines = parse_script("type").expect("valid script");
        assert_eq!(lines[0].step, ScriptStep::Event(UiEvent::Input(String::new())));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_script("open\n\nwait soon").expect_err("bad wait");
        assert!(matches!(err, AppError::Script { line: 3, .. }));

        let err = parse_script("fly away").expect_err("unknown command");
        assert!(err.to_string().contains("unknown command 'fly'"));

        let err = parse_script("depend university_id").expect_err("bad filter");
        assert!(matches!(err, AppError::Script { line: 1, .. }));
    }
}
