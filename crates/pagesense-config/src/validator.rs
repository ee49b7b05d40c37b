//! Configuration validation.

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_pool(config, &mut result);
        Self::validate_viewport(config, &mut result);
        Self::validate_locator(config, &mut result);
        Self::validate_stability(config, &mut result);
        Self::validate_scroll(config, &mut result);
        Self::validate_segmenter(config, &mut result);
        Self::validate_logging(config, &mut result);

        Ok(result)
    }

    fn validate_pool(config: &Config, result: &mut ValidationResult) {
        let pool = &config.pool;

        if pool.connect_attempts == 0 {
            result.add_error(ValidationError::new(
                "pool.connect_attempts",
                "connect_attempts must be greater than 0",
            ));
        }

        if pool.connect_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "pool.connect_timeout_ms",
                "connect_timeout_ms must be greater than 0",
            ));
        }

        if pool.sweep_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "pool.sweep_interval_secs",
                "sweep_interval_secs must be greater than 0",
            ));
        }

        if pool.idle_ttl_secs < pool.sweep_interval_secs {
            result.add_warning(ValidationWarning::new(
                "pool.idle_ttl_secs",
                "idle_ttl_secs is shorter than the sweep interval, idle handles live up to one extra interval",
            ));
        }

        if let Some(ref pattern) = pool.container_host_pattern {
            if let Err(e) = Regex::new(pattern) {
                result.add_error(ValidationError::new(
                    "pool.container_host_pattern",
                    format!("Invalid regex: {}", e),
                ));
            }
        }
    }

    fn validate_viewport(config: &Config, result: &mut ValidationResult) {
        if config.viewport.width == 0 || config.viewport.height == 0 {
            result.add_error(ValidationError::new(
                "viewport",
                "Viewport width and height must be greater than 0",
            ));
        }
    }

    fn validate_locator(config: &Config, result: &mut ValidationResult) {
        if config.locator.attempts == 0 {
            result.add_error(ValidationError::new(
                "locator.attempts",
                "attempts must be greater than 0",
            ));
        }
    }

    fn validate_stability(config: &Config, result: &mut ValidationResult) {
        let stability = &config.stability;

        if !(0.0..=1.0).contains(&stability.pixel_threshold) {
            result.add_error(ValidationError::new(
                "stability.pixel_threshold",
                "pixel_threshold must be within 0..=1",
            ));
        }

        if !(0.0..=1.0).contains(&stability.white_pixel_ratio) {
            result.add_error(ValidationError::new(
                "stability.white_pixel_ratio",
                "white_pixel_ratio must be within 0..=1",
            ));
        }

        if !(0.0..=100.0).contains(&stability.change_threshold_percent) {
            result.add_error(ValidationError::new(
                "stability.change_threshold_percent",
                "change_threshold_percent must be within 0..=100",
            ));
        }

        if stability.screenshot_scale <= 0.0 || stability.screenshot_scale > 1.0 {
            result.add_error(ValidationError::new(
                "stability.screenshot_scale",
                "screenshot_scale must be within (0, 1]",
            ));
        }

        if stability.stable_samples == 0 {
            result.add_error(ValidationError::new(
                "stability.stable_samples",
                "stable_samples must be greater than 0",
            ));
        }

        if stability.max_comparisons < stability.stable_samples {
            result.add_warning(ValidationWarning::new(
                "stability.max_comparisons",
                "max_comparisons is below stable_samples, pages can never settle",
            ));
        }

        if stability.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "stability.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if stability.jpeg_quality == 0 || stability.jpeg_quality > 100 {
            result.add_error(ValidationError::new(
                "stability.jpeg_quality",
                "jpeg_quality must be within 1..=100",
            ));
        }

        if stability.pull_duration_ms > stability.timeout_ms {
            result.add_warning(ValidationWarning::new(
                "stability.pull_duration_ms",
                "pull_duration_ms exceeds timeout_ms, only one comparison fits the budget",
            ));
        }
    }

    fn validate_scroll(config: &Config, result: &mut ValidationResult) {
        if config.scroll.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "scroll.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        if config.scroll.height_growth_limit_px <= 0.0 {
            result.add_error(ValidationError::new(
                "scroll.height_growth_limit_px",
                "height_growth_limit_px must be positive",
            ));
        }
    }

    fn validate_segmenter(config: &Config, result: &mut ValidationResult) {
        let segmenter = &config.segmenter;

        if segmenter.collapse_max_size <= 0.0 {
            result.add_error(ValidationError::new(
                "segmenter.collapse_max_size",
                "collapse_max_size must be positive",
            ));
        }

        if segmenter.icon_max_size > segmenter.collapse_max_size {
            result.add_warning(ValidationWarning::new(
                "segmenter.icon_max_size",
                "icon_max_size is larger than collapse_max_size",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = config.logging.level.to_lowercase();
        // Directive strings like "pagesense=debug" are accepted as-is.
        if !level.contains('=') && !valid_levels.contains(&level.as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, valid_levels
                ),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
