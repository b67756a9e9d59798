mod generator;
mod output;

pub use generator::{CsrGenerator, GenerateError, GeneratedCsr};
pub use output::write_artifacts;
