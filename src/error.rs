//! Error type shared by the signal controller, its configuration and the AMQP bridge.
//!
//! Invalid input (`InvalidAlert`, `UnknownDirection`, `InvalidConfig`) is rejected at the
//! boundary and never reaches the state machine. `Observer` failures are transient: the
//! control loop logs them and backs off instead of stopping.

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControlError {
    /// Emergency alert failed validation (empty id, non-positive duration, bad priority).
    #[error("invalid emergency alert: {reason}")]
    InvalidAlert { reason: String },

    /// A lane name that is not one of north/south/east/west.
    #[error("unknown direction {0:?}")]
    UnknownDirection(String),

    /// Configuration values that break the timing bounds.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// JSON that does not match the expected shape (config file or wire message).
    #[error("failed to decode json: {0}")]
    Decode(#[from] serde_json::Error),

    /// A tick observer returned an error.
    #[error("observer {observer} failed: {error}")]
    Observer {
        observer: &'static str,
        error: String,
    },

    #[error("controller has been shut down")]
    ShutDown,

    #[error("amqp error: {0}")]
    Amqp(#[from] amiquip::Error),

    #[error("background task failed: {0}")]
    Join(String),
}

impl ControlError {
    /// Short stable label for log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::InvalidAlert { .. } => "invalid_alert",
            ControlError::UnknownDirection(_) => "unknown_direction",
            ControlError::InvalidConfig { .. } => "invalid_config",
            ControlError::ConfigIo(_) => "config_io",
            ControlError::Decode(_) => "decode",
            ControlError::Observer { .. } => "observer_failed",
            ControlError::ShutDown => "shut_down",
            ControlError::Amqp(_) => "amqp",
            ControlError::Join(_) => "join",
        }
    }

    /// Whether the control loop should retry after a backoff rather than treat the
    /// error as a rejected input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ControlError::Observer { .. } | ControlError::Amqp(_) | ControlError::Join(_)
        )
    }

    pub(crate) fn invalid_alert(reason: impl Into<String>) -> Self {
        ControlError::InvalidAlert {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        ControlError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(ControlError::invalid_alert("x").as_label(), "invalid_alert");
        assert_eq!(
            ControlError::UnknownDirection("up".into()).as_label(),
            "unknown_direction"
        );
        assert_eq!(ControlError::ShutDown.as_label(), "shut_down");
    }

    #[test]
    fn test_only_observer_style_errors_are_transient() {
        let observer = ControlError::Observer {
            observer: "log",
            error: "disk full".into(),
        };
        assert!(observer.is_transient());
        assert!(!ControlError::invalid_alert("zero duration").is_transient());
        assert!(!ControlError::UnknownDirection("up".into()).is_transient());
    }

    #[test]
    fn test_display_includes_reason() {
        let err = ControlError::invalid_config("min_green_secs must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration: min_green_secs must be > 0"
        );
    }
}
