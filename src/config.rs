use std::env;
use tracing::warn;

pub const MAX_STACK_FRAMES_VAR: &str = "SABLE_MAX_STACK_FRAMES";
pub const MAX_CALL_DEPTH_VAR: &str = "SABLE_MAX_CALL_DEPTH";
pub const QUIET_VAR: &str = "SABLE_QUIET";

/// Limits and output behaviour for one interpreter run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Frames shown by a stack trace before the rest are summarised.
    pub max_stack_frames: usize,
    pub max_call_depth: usize,
    /// Whether `print` also writes to stdout.
    pub echo_output: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_stack_frames: 10,
            max_call_depth: 256,
            echo_output: true,
        }
    }
}

impl InterpreterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read_limit = |key: &str, fallback: usize| match lookup(key) {
            None => fallback,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    warn!(variable = key, value = %raw, "ignoring invalid limit");
                    fallback
                }
            },
        };

        let quiet = lookup(QUIET_VAR)
            .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            max_stack_frames: read_limit(MAX_STACK_FRAMES_VAR, defaults.max_stack_frames),
            max_call_depth: read_limit(MAX_CALL_DEPTH_VAR, defaults.max_call_depth),
            echo_output: !quiet,
        }
    }

    pub fn with_max_stack_frames(mut self, frames: usize) -> Self {
        self.max_stack_frames = frames;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_variables_use_defaults() {
        assert_eq!(
            InterpreterConfig::from_lookup(lookup_from(&[])),
            InterpreterConfig::default()
        );
    }

    #[test]
    fn variables_override_defaults() {
        let config = InterpreterConfig::from_lookup(lookup_from(&[
            (MAX_STACK_FRAMES_VAR, "3"),
            (MAX_CALL_DEPTH_VAR, " 40 "),
            (QUIET_VAR, "true"),
        ]));
        assert_eq!(config.max_stack_frames, 3);
        assert_eq!(config.max_call_depth, 40);
        assert!(!config.echo_output);
    }

    #[test]
    fn invalid_limits_fall_back() {
        let config = InterpreterConfig::from_lookup(lookup_from(&[
            (MAX_STACK_FRAMES_VAR, "lots"),
            (MAX_CALL_DEPTH_VAR, "0"),
        ]));
        assert_eq!(config.max_stack_frames, 10);
        assert_eq!(config.max_call_depth, 256);
    }
}
