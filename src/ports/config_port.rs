//! Configuration access port trait.

/// Sectioned key/value configuration, INI-shaped.
///
/// Numeric keys are read as raw strings so the domain can reject values that
/// do not parse instead of silently defaulting them.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
