//! Diagnostic trace capture.
//!
//! The agent writes its reasoning trace to an injected [`TraceSink`]. Each
//! request owns its own sink, so concurrent requests never share output.

use tracing::trace;

/// Receiver for agent diagnostic output.
pub trait TraceSink: Send {
    /// Record one labelled entry.
    fn record(&mut self, label: &str, text: &str);
}

/// In-memory trace buffer, rendered into `QueryResult.diagnostic_trace`.
#[derive(Debug, Clone, Default)]
pub struct AgentTrace {
    entries: Vec<(String, String)>,
}

impl AgentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `[label]\ntext` blocks separated by blank lines.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(label, text)| format!("[{}]\n{}", label, text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl TraceSink for AgentTrace {
    fn record(&mut self, label: &str, text: &str) {
        trace!(label = %label, bytes = text.len(), "Agent trace entry");
        self.entries.push((label.to_string(), text.to_string()));
    }
}
