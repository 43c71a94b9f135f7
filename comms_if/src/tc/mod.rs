//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands drive a localisation session, either from a motion
//! script or from an operator.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// Internal
use crate::eqpt::robot::RobotCmd;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static TYPE_HAS_NO_PAYLOAD: [TcType; 2] = [TcType::None, TcType::Reinit];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction given to the localisation session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Do nothing this cycle.
    None,

    /// Actuate the robot and localise against the resulting readings.
    Robot(RobotCmd),

    /// Throw away the current particles and start again from a uniform
    /// population.
    Reinit,
}

/// Telecommand types.
///
/// The type is used to identify the purpose of the telecommand, and
/// determines how the payload is interpreted.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Copy)]
pub enum TcType {
    None,
    Move,
    Rotate,
    RotateSensor,
    Reinit,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),

    #[error("TC of type {0:?} is expected to have a payload but it doesn't")]
    MissingPayload(TcType),

    #[error("TC of type {0:?} has a payload which isn't a finite number")]
    InvalidPayload(TcType),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet of the form
    /// `{"type": "MOVE", "payload": 20.0}`.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        // Parse the JSON string into a value
        let val: Value = match serde_json::from_str(json_str) {
            Ok(v) => v,
            Err(e) => return Err(TcParseError::InvalidJson(e)),
        };

        // Get the type of the TC
        let type_str = match val["type"].as_str() {
            Some(s) => s,
            None => {
                return Err(TcParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };
        let tc_type = match TcType::from_str(type_str) {
            Some(t) => t,
            None => {
                return Err(TcParseError::InvalidType(format!(
                    "{} is not a recognised TC type",
                    type_str
                )))
            }
        };

        // Types without payloads are complete already
        if TYPE_HAS_NO_PAYLOAD.contains(&tc_type) {
            return Ok(match tc_type {
                TcType::Reinit => Tc::Reinit,
                _ => Tc::None,
            });
        }

        // Otherwise the payload is the amount of the robot command
        if val["payload"].is_null() {
            return Err(TcParseError::MissingPayload(tc_type));
        }
        let amount = match val["payload"].as_f64() {
            Some(a) if a.is_finite() => a,
            _ => return Err(TcParseError::InvalidPayload(tc_type)),
        };

        let cmd = match tc_type {
            TcType::Move => RobotCmd::Move { distance: amount },
            TcType::Rotate => RobotCmd::Rotate { degrees: amount },
            TcType::RotateSensor => RobotCmd::RotateSensor { degrees: amount },
            TcType::None | TcType::Reinit => unreachable!(),
        };

        Ok(Tc::Robot(cmd))
    }
}

impl TcType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(TcType::None),
            "MOVE" => Some(TcType::Move),
            "ROTATE" => Some(TcType::Rotate),
            "SENSOR" => Some(TcType::RotateSensor),
            "REINIT" => Some(TcType::Reinit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_json() {
        assert_eq!(
            Tc::from_json(r#"{"type": "MOVE", "payload": 20.0}"#).unwrap(),
            Tc::Robot(RobotCmd::Move { distance: 20.0 })
        );
        assert_eq!(
            Tc::from_json(r#"{"type": "SENSOR", "payload": -45}"#).unwrap(),
            Tc::Robot(RobotCmd::RotateSensor { degrees: -45.0 })
        );
        assert_eq!(Tc::from_json(r#"{"type": "REINIT"}"#).unwrap(), Tc::Reinit);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            Tc::from_json(r#"{"type": "ROTATE"}"#),
            Err(TcParseError::MissingPayload(TcType::Rotate))
        ));
        assert!(matches!(
            Tc::from_json(r#"{"type": "JUMP", "payload": 1.0}"#),
            Err(TcParseError::InvalidType(_))
        ));
        assert!(matches!(
            Tc::from_json(r#"{"type": "MOVE", "payload": "far"}"#),
            Err(TcParseError::InvalidPayload(TcType::Move))
        ));
        assert!(matches!(
            Tc::from_json("not json"),
            Err(TcParseError::InvalidJson(_))
        ));
    }
}
