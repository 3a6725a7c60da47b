use serde::{Deserialize, Serialize};

use super::Span;

/// Callee name recorded for computed and otherwise unresolvable calls.
pub const DYNAMIC_CALLEE: &str = "<dynamic>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Function,
    Method,
    Constructor,
    Super,
    Dynamic,
}

/// Position of a call inside a method chain, with the neighboring callee
/// names. Positions are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    pub position: usize,
    pub previous: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    pub kind: CallKind,
    pub argument_count: usize,
    /// Receiver expression text for method calls (`obj` in `obj.run()`).
    pub receiver: Option<String>,
    pub chain: Option<ChainContext>,
    pub span: Span,
}

impl CallSite {
    pub fn new(callee: impl Into<String>, kind: CallKind, argument_count: usize, span: Span) -> Self {
        Self {
            callee: callee.into(),
            kind,
            argument_count,
            receiver: None,
            chain: None,
            span,
        }
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_chain(mut self, chain: ChainContext) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.callee == DYNAMIC_CALLEE
    }
}
