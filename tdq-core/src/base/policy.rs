//! Configurable objects.
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// A configurable object, having type parameter.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    ///
    /// Fails if the configuration is structurally invalid for the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}
