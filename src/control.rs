//! Control signals threaded through statement execution
//!
//! A statement finishes with a [`Signal`]. Loops consume `Break` and
//! `Continue`; only `Return` crosses a loop boundary, and a call turns it into
//! the call's result.

use crate::value::Value;

/// How a statement (or block) finished
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Signal {
    /// True when the enclosing block must stop executing statements
    pub fn interrupts(&self) -> bool {
        !matches!(self, Signal::Normal)
    }
}

/// What a loop does after one iteration of its body
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStep {
    /// Evaluate the condition / advance the iterator again
    Next,
    /// Leave the loop; the enclosing construct sees `Normal`
    Exit,
    /// Leave the loop and hand the signal to the enclosing construct
    Unwind(Signal),
}

/// Per-loop bookkeeping for the exhaustion (`else`) clause
///
/// The flag is raised on entry and lowered by the first `Break` or `Return`;
/// the clause runs only if it is still raised once the condition or iterator
/// is exhausted.
#[derive(Debug)]
pub struct LoopFrame {
    exhaustion_pending: bool,
    iterations: usize,
}

impl LoopFrame {
    pub fn enter() -> Self {
        LoopFrame {
            exhaustion_pending: true,
            iterations: 0,
        }
    }

    /// Fold the body's signal into the loop state
    pub fn absorb(&mut self, signal: Signal) -> LoopStep {
        self.iterations += 1;
        match signal {
            Signal::Normal | Signal::Continue => LoopStep::Next,
            Signal::Break => {
                self.exhaustion_pending = false;
                LoopStep::Exit
            }
            Signal::Return(value) => {
                self.exhaustion_pending = false;
                LoopStep::Unwind(Signal::Return(value))
            }
        }
    }

    /// Whether the exhaustion clause must run
    pub fn runs_exhaustion_clause(&self) -> bool {
        self.exhaustion_pending
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_skips_exhaustion_clause() {
        let mut frame = LoopFrame::enter();
        assert_eq!(frame.absorb(Signal::Normal), LoopStep::Next);
        assert_eq!(frame.absorb(Signal::Break), LoopStep::Exit);
        assert!(!frame.runs_exhaustion_clause());
        assert_eq!(frame.iterations(), 2);
    }

    #[test]
    fn test_continue_keeps_exhaustion_clause() {
        let mut frame = LoopFrame::enter();
        assert_eq!(frame.absorb(Signal::Continue), LoopStep::Next);
        assert_eq!(frame.absorb(Signal::Normal), LoopStep::Next);
        assert!(frame.runs_exhaustion_clause());
    }

    #[test]
    fn test_empty_loop_runs_exhaustion_clause() {
        let frame = LoopFrame::enter();
        assert!(frame.runs_exhaustion_clause());
        assert_eq!(frame.iterations(), 0);
    }

    #[test]
    fn test_return_unwinds_and_skips_clause() {
        let mut frame = LoopFrame::enter();
        let step = frame.absorb(Signal::Return(Value::Int(1)));
        assert_eq!(step, LoopStep::Unwind(Signal::Return(Value::Int(1))));
        assert!(!frame.runs_exhaustion_clause());
    }

    #[test]
    fn test_interrupts() {
        assert!(!Signal::Normal.interrupts());
        assert!(Signal::Break.interrupts());
        assert!(Signal::Return(Value::None).interrupts());
    }
}
