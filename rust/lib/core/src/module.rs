use axum::Router;

/// A service module that contributes HTTP routes.
///
/// The `teamd` binary collects every module and merges its router at the
/// root. A module owns its state and calls `.with_state()` itself.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Return the module's routes. Paths are absolute.
    fn routes(&self) -> Router;
}
