//! Configuration access port trait.
//!
//! Typed getters return `Ok(None)` for a missing key and an error for a
//! value that is present but does not parse.

use crate::domain::error::MeridianError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, MeridianError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, MeridianError>;
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, MeridianError>;
}
