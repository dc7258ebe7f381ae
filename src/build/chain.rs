//! Stylesheet transform chains.
//!
//! A [`TransformChain`] stores its steps in execution order: the first step
//! receives the source file and each following step receives the output of
//! the one before it. Chains written in the right-to-left convention (last
//! written step runs first) are converted with [`TransformChain::from_authored`].
//!
//! The only valid execution order is
//! `style-compile -> post-process -> extract -> file-emit`, where
//! post-process and extract may be omitted.

use super::declaration::{TransformKind, TransformStep};
use super::error::BuildError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

impl TransformChain {
    /// Chain from steps listed in execution order.
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    /// Chain from steps listed right-to-left.
    pub fn from_authored(mut authored: Vec<TransformStep>) -> Self {
        authored.reverse();
        Self { steps: authored }
    }

    /// A chain with no steps, used by pipelines that do not transform sources.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, kind: TransformKind) -> Option<&TransformStep> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Check the chain runs in the required order.
    pub fn validate(&self) -> Result<(), BuildError> {
        let order = self.describe();

        match self.steps.first() {
            Some(step) if step.kind == TransformKind::StyleCompile => {}
            Some(step) => {
                return Err(BuildError::ChainOrder(format!(
                    "'{}' runs first but must follow style-compile (execution order: {})",
                    step.kind, order
                )))
            }
            None => return Err(BuildError::ChainOrder("chain has no steps".to_string())),
        }

        if self.steps.last().map(|s| s.kind) != Some(TransformKind::FileEmit) {
            return Err(BuildError::ChainOrder(format!(
                "chain must end with file-emit (execution order: {})",
                order
            )));
        }

        for pair in self.steps.windows(2) {
            if pair[0].kind.rank() >= pair[1].kind.rank() {
                return Err(BuildError::ChainOrder(format!(
                    "'{}' cannot run after '{}' (execution order: {})",
                    pair[1].kind, pair[0].kind, order
                )));
            }
        }

        Ok(())
    }

    /// Execution order as `a -> b -> c`.
    pub fn describe(&self) -> String {
        self.steps.iter().map(|s| s.kind.label()).collect::<Vec<_>>().join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransformKind::*;

    fn steps(kinds: &[TransformKind]) -> Vec<TransformStep> {
        kinds.iter().map(|k| TransformStep::new(*k)).collect()
    }

    #[test]
    fn test_from_authored_reverses() {
        let chain = TransformChain::from_authored(steps(&[FileEmit, Extract, PostProcess, StyleCompile]));
        let kinds: Vec<_> = chain.steps().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StyleCompile, PostProcess, Extract, FileEmit]);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn test_optional_steps_may_be_omitted() {
        assert!(TransformChain::new(steps(&[StyleCompile, FileEmit])).validate().is_ok());
        assert!(TransformChain::new(steps(&[StyleCompile, Extract, FileEmit])).validate().is_ok());
    }

    #[test]
    fn test_execution_order_written_as_authored_is_rejected() {
        // Left-to-right listing passed where right-to-left was expected
        let chain = TransformChain::from_authored(steps(&[StyleCompile, PostProcess, Extract, FileEmit]));
        let err = chain.validate().unwrap_err();
        assert!(matches!(err, BuildError::ChainOrder(_)));
        assert!(err.to_string().contains("file-emit -> extract -> post-process -> style-compile"));
    }

    #[test]
    fn test_post_process_before_compile_rejected() {
        let chain = TransformChain::new(steps(&[StyleCompile, Extract, PostProcess, FileEmit]));
        let err = chain.validate().unwrap_err();
        assert!(err.to_string().contains("'post-process' cannot run after 'extract'"));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let chain = TransformChain::new(steps(&[StyleCompile, PostProcess, PostProcess, FileEmit]));
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_missing_emit_rejected() {
        let chain = TransformChain::new(steps(&[StyleCompile, PostProcess]));
        assert!(chain.validate().is_err());
        assert!(TransformChain::empty().validate().is_err());
    }
}
