//! Error types for tessel_core
//!
//! Every variant here is a programmer error: a malformed transition table, a
//! duplicate fixed index, a controlled/uncontrolled mode switch or an invalid
//! configuration. Expected runtime non-events (an event with no matching
//! transition, navigating an empty collection) are never errors.

use thiserror::Error;

use crate::controlled::ControlMode;

/// Errors raised while validating a machine definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// The initial state has no node in the definition
    #[error("initial state {0} is not declared in the machine definition")]
    UndefinedInitialState(String),

    /// A transition points at a state that has no node
    #[error("transition from {from} on {event} targets undeclared state {target}")]
    UndefinedTarget {
        from: String,
        event: String,
        target: String,
    },

    /// A delayed event is scheduled by a state that cannot handle it
    #[error("state {state} schedules {event} after a delay but declares no transition for it")]
    UnhandledDelayedEvent { state: String, event: String },

    /// The same state was declared twice
    #[error("state {0} is declared more than once")]
    DuplicateState(String),
}

/// Errors raised by the descendant registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two records asked for the same fixed index
    #[error("explicit index {index} is already claimed by another descendant")]
    DuplicateIndex { index: usize },
}

/// Errors raised by the controlled-value reconciler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// A component switched between controlled and uncontrolled after creation
    #[error(
        "{component} switched from {from} to {to}; decide between a controlled or \
         uncontrolled value for the lifetime of the component"
    )]
    ModeSwitch {
        component: &'static str,
        from: ControlMode,
        to: ControlMode,
    },
}

/// Errors raised while loading runtime configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Any error produced by the Tessel runtime
#[derive(Error, Debug)]
pub enum TesselError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for tessel operations
pub type Result<T> = std::result::Result<T, TesselError>;
