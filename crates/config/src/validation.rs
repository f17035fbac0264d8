use crate::ConfigResult;

/// Per-section validation hook, run after loading.
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}
