//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a port number
pub fn validate_port_range(port: u16, field_name: &str, domain: &str) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be 0", field_name),
        });
    }

    // Port 1-1023 are typically reserved for system services
    if port <= 1023 {
        log::warn!("{} port {} is in the reserved range (1-1023)", field_name, port);
    }

    Ok(())
}

/// Validate that `span` consecutive ports starting at `first` stay within u16
pub fn validate_port_span(
    first: u16,
    span: usize,
    field_name: &str,
    domain: &str,
) -> ConfigResult<()> {
    let last = (first as u64).saturating_add(span as u64).saturating_sub(1);
    if last > u16::MAX as u64 {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} range of {} ports starting at {} exceeds {}",
                field_name,
                span,
                first,
                u16::MAX
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1usize, "workers", "execution").is_ok());
        assert!(validate_positive(0usize, "workers", "execution").is_err());
    }

    #[test]
    fn test_validate_port_range() {
        assert!(validate_port_range(50050, "min_port", "execution").is_ok());
        // reserved range only warns
        assert!(validate_port_range(80, "min_port", "execution").is_ok());
        assert!(validate_port_range(0, "min_port", "execution").is_err());
    }

    #[test]
    fn test_validate_port_span() {
        assert!(validate_port_span(65534, 2, "ports", "execution").is_ok());
        assert!(validate_port_span(65535, 2, "ports", "execution").is_err());
        assert!(validate_port_span(1, usize::MAX, "ports", "execution").is_err());

        match validate_port_span(65000, 1000, "ports", "execution") {
            Err(ConfigError::DomainError { domain, message }) => {
                assert_eq!(domain, "execution");
                assert!(message.contains("65000"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
