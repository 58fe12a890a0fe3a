/// Errors raised while assembling the assistant from its settings.
///
/// Answer generation itself never fails: "no keywords" and "no matches" are
/// successful outcomes carrying a guidance string. Binary crates wrap
/// `GroundingError` via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum GroundingError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidSetting { name: &'static str, value: String },
}
