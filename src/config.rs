/// Service-level behavior switches for the access core.
///
/// There is deliberately only one knob: whether team/repository
/// association changes implicitly subscribe the affected members to the
/// repository. Everything else in the core is contract, not policy.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Watch a repository on behalf of team members when the member
    /// joins a team or a repository is assigned to their team.
    pub auto_watch: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { auto_watch: true }
    }
}
