//! Rendering errors for the operator.

use std::error::Error;

/// How much detail an error message carries when shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorVerbosity {
    /// Top-level message only.
    #[default]
    Short,
    /// Top-level message followed by every `source()` in the chain.
    Full,
}

impl ErrorVerbosity {
    pub fn from_flag(print_error_stack: bool) -> Self {
        if print_error_stack {
            Self::Full
        } else {
            Self::Short
        }
    }

    pub fn render(self, err: &(dyn Error + 'static)) -> String {
        let mut out = err.to_string();
        if self == Self::Full {
            let mut source = err.source();
            while let Some(cause) = source {
                out.push_str("\n  caused by: ");
                out.push_str(&cause.to_string());
                source = cause.source();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::error::ConfigError;

    fn sample() -> ConfigError {
        ConfigError::Io {
            path: "/mods/autopacker.yaml".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        }
    }

    #[test]
    fn short_is_single_line() {
        let text = ErrorVerbosity::Short.render(&sample());
        assert!(!text.contains('\n'), "got: {text}");
        assert!(text.contains("/mods/autopacker.yaml"));
    }

    #[test]
    fn full_lists_the_source_chain() {
        let text = ErrorVerbosity::from_flag(true).render(&sample());
        assert!(text.contains("caused by: access denied"), "got: {text}");
    }
}
