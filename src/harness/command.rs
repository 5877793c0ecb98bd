//! Command line resolution
//!
//! Argument templates refer to the isolated project through a placeholder.
//! Resolution is plain string substitution on every token.

use std::path::Path;

/// Turns argument templates into a shell command line
#[derive(Debug, Clone)]
pub struct CommandResolver {
    cli: String,
    placeholder: String,
}

impl CommandResolver {
    pub fn new(cli: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            cli: cli.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Replace every placeholder occurrence in every token
    ///
    /// The isolated root must not itself contain the placeholder; if it does,
    /// the marker survives substitution. This is logged, not rejected.
    pub fn substitute<S: AsRef<str>>(&self, tokens: &[S], isolated_root: &Path) -> Vec<String> {
        let root = isolated_root.display().to_string();
        if root.contains(&self.placeholder) {
            tracing::warn!(
                root = %root,
                placeholder = %self.placeholder,
                "Isolated root contains the placeholder; substitution will not be total"
            );
        }

        tokens
            .iter()
            .map(|token| token.as_ref().replace(&self.placeholder, &root))
            .collect()
    }

    /// Build `<cli> <arg1> <arg2> ...` for the given isolated root
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S], isolated_root: &Path) -> String {
        let mut command_line = self.cli.clone();
        for token in self.substitute(tokens, isolated_root) {
            command_line.push(' ');
            command_line.push_str(&token);
        }
        command_line
    }
}
