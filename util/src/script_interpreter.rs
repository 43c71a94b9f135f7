//! # Motion script interpreter module
//!
//! This module provides an interpreter for motion scripts, an ordered list of
//! telecommands which drive a localisation session one generation at a time.
//!
//! A script is made of steps of the form
//!
//! ```text
//! # Drive into the room then turn left
//! step: {"type": "MOVE", "payload": 20.0};
//! step: {"type": "ROTATE", "payload": 90.0};
//! ```
//!
//! Anything which isn't a step (comments, blank lines) is ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A script interpreter.
///
/// After initialising with the path to the script use `.next_tc()` (or
/// iterate over the interpreter) to acquire the telecommands in order.
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    tcs: VecDeque<Tc>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("The step pattern could not be compiled: {0}")]
    PatternError(regex::Error),

    #[error("Script contains an invalid TC on line {0}: {1}")]
    InvalidTc(usize, TcParseError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = script_path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script_str(&script)?;
        interp.script_path = Some(path);

        Ok(interp)
    }

    /// Create a new interpreter from the text of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {
        let re = RegexBuilder::new(r"^\s*step\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        let mut tcs = VecDeque::new();

        for cap in re.captures_iter(script) {
            let payload = match cap.get(1) {
                Some(p) => p,
                None => continue,
            };

            let tc = Tc::from_json(payload.as_str()).map_err(|e| {
                let line = script[..payload.start()].matches('\n').count() + 1;
                ScriptError::InvalidTc(line, e)
            })?;

            tcs.push_back(tc);
        }

        if tcs.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(Self {
            script_path: None,
            tcs,
        })
    }

    /// Pop the next telecommand, or `None` at the end of the script.
    pub fn next_tc(&mut self) -> Option<Tc> {
        self.tcs.pop_front()
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.tcs.len()
    }

    /// The path the script was loaded from, if any.
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }
}

impl Iterator for ScriptInterpreter {
    type Item = Tc;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tc()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::robot::RobotCmd;

    #[test]
    fn test_parse_script() {
        let script = r#"
            # Comments and blank lines are skipped

            step: {"type": "MOVE", "payload": 20.0};
            step: {"type": "ROTATE", "payload": -90};
            step: {"type": "REINIT"};
        "#;

        let mut interp = ScriptInterpreter::from_script_str(script).unwrap();

        assert_eq!(interp.get_num_tcs(), 3);
        assert_eq!(
            interp.next_tc(),
            Some(Tc::Robot(RobotCmd::Move { distance: 20.0 }))
        );
        assert_eq!(
            interp.next_tc(),
            Some(Tc::Robot(RobotCmd::Rotate { degrees: -90.0 }))
        );
        assert_eq!(interp.next_tc(), Some(Tc::Reinit));
        assert_eq!(interp.next_tc(), None);
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            ScriptInterpreter::from_script_str("# nothing here\n"),
            Err(ScriptError::ScriptEmpty)
        ));

        let bad = "step: {\"type\": \"MOVE\", \"payload\": 1.0};\nstep: {\"type\": \"FLY\"};\n";
        assert!(matches!(
            ScriptInterpreter::from_script_str(bad),
            Err(ScriptError::InvalidTc(2, TcParseError::InvalidType(_)))
        ));

        assert!(matches!(
            ScriptInterpreter::new("/does/not/exist.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
