//! Retypes dictated text into the focused window via `xdotool`

use std::process::Command;

use tracing::debug;

use super::{CollaboratorError, Typist};

pub struct XdotoolTypist;

impl Typist for XdotoolTypist {
    fn type_text(&self, text: &str) -> Result<(), CollaboratorError> {
        if text.is_empty() {
            return Ok(());
        }

        debug!(chars = text.len(), "typing text");
        // Passed as an argument, never through a shell
        let status = Command::new("xdotool")
            .args(["type", "--"])
            .arg(text)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(CollaboratorError::Unavailable(
                "xdotool",
                format!("exited with {}", status),
            ))
        }
    }
}
