//! Remote command type.

/// A named command to run on a node.
///
/// The command text is opaque to the pipeline; the label is what progress
/// observers see once the command has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub label: String,
    pub command: String,
}

impl RemoteCommand {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self { label: label.into(), command: command.into() }
    }
}
