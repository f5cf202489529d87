use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("an infusion is already running")]
    AlreadyRunning,
    #[error("infusion running")]
    InfusionRunning,
    #[error("plunger retraction in progress")]
    RetractionInProgress,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("motion worker is not running")]
    WorkerUnavailable,
}

impl PumpError {
    /// True for admission-control rejections (another operation is active).
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PumpError::AlreadyRunning | PumpError::InfusionRunning | PumpError::RetractionInProgress
        )
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing stepper driver")]
    MissingDriver,
    #[error("default syringe {0} mL has no calibration profile")]
    UnknownDefaultSyringe(u32),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
