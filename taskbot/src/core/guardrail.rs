//! Perceive-before-grasp guardrail.

use std::collections::HashSet;

use crate::core::task::Step;

/// Steps after guardrail injection, with the number of inserted perceives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub steps: Vec<Step>,
    pub corrections: usize,
}

/// Insert `perceive(object)` before every grasp whose object was not yet perceived.
///
/// A single left-to-right pass. Only explicit perceives count as perceived,
/// so every grasp without an earlier explicit perceive gets its own. Running
/// the pass on its own output yields zero corrections.
pub fn inject_perceives(steps: &[Step]) -> Injection {
    let mut perceived: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(steps.len());
    let mut corrections = 0;

    for step in steps {
        match step {
            Step::Perceive { object } => {
                perceived.insert(object.as_str());
            }
            Step::Grasp { object, .. } if !perceived.contains(object.as_str()) => {
                out.push(Step::perceive(object.as_str()));
                corrections += 1;
            }
            _ => {}
        }
        out.push(step.clone());
    }

    Injection {
        steps: out,
        corrections,
    }
}
