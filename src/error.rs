/// Errors raised at the boundary of a stress-test run.
///
/// The simulation core itself is pure arithmetic over already-typed inputs;
/// everything here is either input rejection or I/O around the core.
#[derive(Debug, thiserror::Error)]
pub enum FlowRiskError {
    #[error("unknown scenario type: {0}")]
    UnknownScenarioKind(String),

    #[error("invalid parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: &'static str },

    #[error("invalid assumption {name}: {value}")]
    InvalidAssumption { name: &'static str, value: f64 },

    #[error("horizon_months {horizon} outside [{min}, {max}]")]
    HorizonOutOfRange { horizon: u32, min: u32, max: u32 },

    #[error("n_sims {n_sims} outside [{min}, {max}]")]
    SimCountOutOfRange { n_sims: u32, min: u32, max: u32 },

    /// Opaque wrapper for anything that went wrong inside a run. Details are
    /// logged where the failure is caught, never carried to the caller.
    #[error("run computation failed")]
    ComputationFailed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
