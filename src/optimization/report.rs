use std::fmt;

/// A reason for a line search trial to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    LossNotFinite,
    ConstraintNotFinite,
    LossNotImproving,
    ConstraintExceeded,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::LossNotFinite => "violated because loss is not finite",
            Self::ConstraintNotFinite => "violated because constraint is not finite",
            Self::LossNotImproving => "violated because loss not improving",
            Self::ConstraintExceeded => "violated because constraint is violated",
        };

        f.write_str(msg)
    }
}

/// How the line search of an update ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineSearchOutcome {
    /// A trial met both conditions, it's now the target's parameters.
    Accepted,
    /// No trial met both conditions but the last one was kept anyway.
    AcceptedWithViolation(Vec<Violation>),
    /// No trial met both conditions, the parameters were restored. The violations belong to
    /// the last trial and are empty if no trial was evaluated.
    Rejected(Vec<Violation>),
}

impl LineSearchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Accepted => &[],
            Self::AcceptedWithViolation(v) | Self::Rejected(v) => v,
        }
    }
}

/// Diagnostics of a single `optimize` call, identical on every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// The loss before the update.
    pub loss_before: f64,
    /// The loss at the committed parameters.
    pub loss_after: f64,
    /// The constraint at the committed parameters, `None` if they weren't moved.
    pub constraint_after: Option<f64>,
    pub initial_step_size: f64,
    /// The amount of trials evaluated by the line search.
    pub backtracks: usize,
    pub outcome: LineSearchOutcome,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss {:.6} -> {:.6}, step {:.4e}, {} backtracks",
            self.loss_before, self.loss_after, self.initial_step_size, self.backtracks
        )?;

        if let Some(c) = self.constraint_after {
            write!(f, ", constraint {c:.6}")?;
        }

        match &self.outcome {
            LineSearchOutcome::Accepted => write!(f, ", accepted"),
            LineSearchOutcome::AcceptedWithViolation(_) => write!(f, ", accepted with violation"),
            LineSearchOutcome::Rejected(_) => write!(f, ", rejected"),
        }
    }
}
