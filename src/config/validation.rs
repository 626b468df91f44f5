use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("messaging.exchange must not be empty")]
    EmptyExchange,

    #[error("messaging.prefetch must be at least 1")]
    InvalidPrefetch,

    #[error("messaging.channel_capacity ({capacity}) must be >= prefetch ({prefetch})")]
    ChannelTooSmall { capacity: usize, prefetch: usize },

    #[error("server.max_body_bytes must be positive")]
    InvalidBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_messaging(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_messaging(config: &Config) -> Result<(), ValidationError> {
    let messaging = &config.messaging;
    if messaging.exchange.trim().is_empty() {
        return Err(ValidationError::EmptyExchange);
    }
    if messaging.prefetch == 0 {
        return Err(ValidationError::InvalidPrefetch);
    }
    if messaging.channel_capacity < messaging.prefetch {
        return Err(ValidationError::ChannelTooSmall {
            capacity: messaging.channel_capacity,
            prefetch: messaging.prefetch,
        });
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_body_bytes == 0 {
        return Err(ValidationError::InvalidBodyLimit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_prefetch_and_capacity() {
        let mut config = Config::default();
        config.messaging.prefetch = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidPrefetch)));

        config.messaging.prefetch = 8;
        config.messaging.channel_capacity = 4;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ChannelTooSmall { capacity: 4, prefetch: 8 })
        ));
    }

    #[test]
    fn test_empty_exchange() {
        let mut config = Config::default();
        config.messaging.exchange = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyExchange)));
    }

    #[test]
    fn test_zero_body_limit() {
        let mut config = Config::default();
        config.server.max_body_bytes = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidBodyLimit)));
    }
}
