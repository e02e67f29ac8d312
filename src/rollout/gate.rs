/// Decides whether a rollout proceeds past a phase boundary
pub trait ConfirmGate: Send + Sync {
    fn confirm(&self, phase: &str) -> bool;
}

/// Non-interactive runs never stop at a gate
pub struct AlwaysProceed;

impl ConfirmGate for AlwaysProceed {
    fn confirm(&self, _phase: &str) -> bool {
        true
    }
}

impl<F> ConfirmGate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, phase: &str) -> bool {
        self(phase)
    }
}

/// Asks the operator on the terminal; a failed prompt counts as "no"
pub struct PromptGate;

impl ConfirmGate for PromptGate {
    fn confirm(&self, phase: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(format!("{}?", phase))
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
