//! Runtime configuration for the consolidation core.

use serde::{Deserialize, Serialize};

use crate::day::DayClock;
use crate::error::{Error, Result};
use crate::money::DecimalPolicy;

/// Configuration shared by the decision engine and the item applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// IANA time zone used to compute canonical days.
    pub timezone: String,

    /// Decimal places used when comparing and sending quantities and costs.
    pub decimal_scale: u32,

    /// Page size requested by the fallback scanner.
    pub fallback_page_limit: u32,

    /// Maximum number of listing pages the fallback scanner reads.
    pub fallback_max_pages: u32,

    /// Maximum concurrent backend calls while applying a reconciliation delta.
    pub apply_max_in_flight: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            decimal_scale: DecimalPolicy::DEFAULT_SCALE,
            fallback_page_limit: 50,
            fallback_max_pages: 4,
            apply_max_in_flight: 8,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from `ORDERDESK_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// - `ORDERDESK_TIMEZONE`
    /// - `ORDERDESK_DECIMAL_SCALE`
    /// - `ORDERDESK_FALLBACK_PAGE_LIMIT`
    /// - `ORDERDESK_FALLBACK_MAX_PAGES`
    /// - `ORDERDESK_APPLY_MAX_IN_FLIGHT`
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but malformed, or the resulting
    /// configuration fails [`CoreConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(timezone) = get("ORDERDESK_TIMEZONE") {
            config.timezone = timezone;
        }
        if let Some(scale) = parse_var::<u32>("ORDERDESK_DECIMAL_SCALE", get("ORDERDESK_DECIMAL_SCALE"))? {
            config.decimal_scale = scale;
        }
        if let Some(limit) = parse_var::<u32>(
            "ORDERDESK_FALLBACK_PAGE_LIMIT",
            get("ORDERDESK_FALLBACK_PAGE_LIMIT"),
        )? {
            config.fallback_page_limit = limit;
        }
        if let Some(pages) = parse_var::<u32>(
            "ORDERDESK_FALLBACK_MAX_PAGES",
            get("ORDERDESK_FALLBACK_MAX_PAGES"),
        )? {
            config.fallback_max_pages = pages;
        }
        if let Some(in_flight) = parse_var::<usize>(
            "ORDERDESK_APPLY_MAX_IN_FLIGHT",
            get("ORDERDESK_APPLY_MAX_IN_FLIGHT"),
        )? {
            config.apply_max_in_flight = in_flight;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the time zone is unknown, the scale is out of
    /// range, or any size limit is zero.
    pub fn validate(&self) -> Result<()> {
        DayClock::from_name(&self.timezone)?;
        if self.decimal_scale > DecimalPolicy::MAX_SCALE {
            return Err(Error::InvalidInput(format!(
                "ORDERDESK_DECIMAL_SCALE must be at most {}",
                DecimalPolicy::MAX_SCALE
            )));
        }
        if self.fallback_page_limit == 0 {
            return Err(Error::InvalidInput(
                "ORDERDESK_FALLBACK_PAGE_LIMIT must be greater than 0".to_string(),
            ));
        }
        if self.fallback_max_pages == 0 {
            return Err(Error::InvalidInput(
                "ORDERDESK_FALLBACK_MAX_PAGES must be greater than 0".to_string(),
            ));
        }
        if self.apply_max_in_flight == 0 {
            return Err(Error::InvalidInput(
                "ORDERDESK_APPLY_MAX_IN_FLIGHT must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the day clock for the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimezone`] if the zone is unknown.
    pub fn day_clock(&self) -> Result<DayClock> {
        DayClock::from_name(&self.timezone)
    }

    /// Returns the decimal policy for the configured scale.
    #[must_use]
    pub const fn decimal_policy(&self) -> DecimalPolicy {
        DecimalPolicy::new(self.decimal_scale)
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| Error::InvalidInput(format!("{name}='{raw}' is invalid: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().unwrap();
        assert_eq!(config.day_clock().unwrap(), DayClock::utc());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("ORDERDESK_TIMEZONE", "America/Lima"),
            ("ORDERDESK_DECIMAL_SCALE", "3"),
            ("ORDERDESK_FALLBACK_PAGE_LIMIT", "20"),
            ("ORDERDESK_FALLBACK_MAX_PAGES", " 2 "),
            ("ORDERDESK_APPLY_MAX_IN_FLIGHT", "4"),
        ]))
        .unwrap();

        assert_eq!(config.timezone, "America/Lima");
        assert_eq!(config.decimal_policy().scale(), 3);
        assert_eq!(config.fallback_page_limit, 20);
        assert_eq!(config.fallback_max_pages, 2);
        assert_eq!(config.apply_max_in_flight, 4);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[("ORDERDESK_TIMEZONE", "  ")])).unwrap();
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[("ORDERDESK_FALLBACK_PAGE_LIMIT", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ORDERDESK_FALLBACK_PAGE_LIMIT"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[("ORDERDESK_APPLY_MAX_IN_FLIGHT", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err =
            CoreConfig::from_lookup(lookup(&[("ORDERDESK_TIMEZONE", "Nowhere/Else")])).unwrap_err();
        assert!(matches!(err, Error::InvalidTimezone { .. }));
    }
}
