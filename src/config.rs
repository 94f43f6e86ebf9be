//! Virtual machine limits.
//!
//! Defaults are compiled in; each limit can be overridden from the
//! environment (`VERVE_MAX_FRAMES`, `VERVE_MAX_STACK`, `VERVE_MAX_HEAP`).

/// Maximum operand stack size.
pub const STACK_MAX: usize = 65536;
/// Maximum call frames.
pub const FRAMES_MAX: usize = 1024;
/// Maximum number of live heap objects (strings, lists and objects).
pub const HEAP_MAX: usize = 1 << 24;

/// Resource limits for one VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub max_frames: usize,
    pub max_stack: usize,
    pub max_heap_objects: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: FRAMES_MAX,
            max_stack: STACK_MAX,
            max_heap_objects: HEAP_MAX,
        }
    }
}

impl VmConfig {
    /// Defaults, overridden by any well-formed `VERVE_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: usize| -> usize {
            let Some(raw) = lookup(key) else {
                return default;
            };
            match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(key, value = %raw, "ignoring invalid limit");
                    default
                }
            }
        };

        Self {
            max_frames: read("VERVE_MAX_FRAMES", defaults.max_frames),
            max_stack: read("VERVE_MAX_STACK", defaults.max_stack),
            max_heap_objects: read("VERVE_MAX_HEAP", defaults.max_heap_objects),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_overrides() {
        let config = VmConfig::from_lookup(|_| None);
        assert_eq!(config, VmConfig::default());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let vars: HashMap<&str, &str> = [
            ("VERVE_MAX_FRAMES", "16"),
            ("VERVE_MAX_STACK", "not-a-number"),
            ("VERVE_MAX_HEAP", "0"),
        ]
        .into_iter()
        .collect();
        let config = VmConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.max_frames, 16);
        assert_eq!(config.max_stack, STACK_MAX);
        assert_eq!(config.max_heap_objects, HEAP_MAX);
    }
}
