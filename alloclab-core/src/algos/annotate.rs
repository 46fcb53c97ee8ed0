//! Annotate — emit a dated note into the run report.

use super::Algo;
use crate::engine::{AlgoContext, EngineError};

/// Append `"<date> <node path>: <message>"` to the run report's notes and
/// continue. The observable unit for logging-style branches inside an `Or`.
pub struct Annotate {
    message: String,
}

impl Annotate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Algo for Annotate {
    fn name(&self) -> &str {
        "annotate"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        let line = format!("{} {}: {}", ctx.date(), ctx.node_path(), self.message);
        ctx.note(line);
        Ok(true)
    }
}
