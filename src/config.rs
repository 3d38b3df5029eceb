/// Tuning knobs for how joined frames affect their owning transaction.
///
/// The defaults give the classic behaviour: a failing participant dooms the
/// whole physical transaction, and the owner learns about it on `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// When set, `rollback` on a joined frame marks the owner rollback-only.
    pub global_rollback_on_participation_failure: bool,
    /// When set, `commit` on a joined frame fails as soon as the owner is rollback-only.
    pub fail_early_on_global_rollback_only: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            global_rollback_on_participation_failure: true,
            fail_early_on_global_rollback_only: false,
        }
    }
}

impl ManagerConfig {
    pub fn global_rollback_on_participation_failure(mut self, enabled: bool) -> Self {
        self.global_rollback_on_participation_failure = enabled;
        self
    }

    pub fn fail_early_on_global_rollback_only(mut self, enabled: bool) -> Self {
        self.fail_early_on_global_rollback_only = enabled;
        self
    }
}
