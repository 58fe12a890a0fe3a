use crate::error::GroundingError;

/// Read an optional numeric setting. Unset is `None`; set but unparseable is an error.
pub fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, GroundingError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| GroundingError::InvalidSetting { name, value: raw }),
        Err(_) => Ok(None),
    }
}
