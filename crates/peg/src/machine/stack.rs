//! Stack frames of the parsing machine.
//!
//! The machine keeps one frame-kind stack recording the pop order plus four
//! typed stacks holding the frame payloads. The kinds stay in lockstep with
//! the typed stacks; the failure handler pops by kind.

use crate::semantics::SemanticResponse;

/// Marks a left-recursion memo whose seed has not grown yet.
pub(crate) const LR_FAIL: usize = usize::MAX;

/// An input position: byte index plus 1-based column and line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Subject {
    pub ir: usize,
    pub cr: usize,
    pub lr: usize,
}

impl Subject {
    pub fn start() -> Subject {
        Subject { ir: 0, cr: 1, lr: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Backtrack,
    Call,
    Capture,
    LrCall,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BacktrackFrame {
    pub subject: Subject,
    pub rc: usize,
    pub pc: usize,
}

/// Memo record of one left-recursive call, scoped to its stack frame.
#[derive(Debug)]
pub(crate) struct LrMemo {
    /// Subject at the call site (the seed position).
    pub seed: Subject,
    /// Best answer so far; `answer.ir == LR_FAIL` until the seed grows once.
    pub answer: Subject,
    /// Response count on entry.
    pub rc: usize,
    /// Resume point after the call instruction.
    pub ret_pc: usize,
    /// Entry of the callee body, used to recognize the same call site.
    pub body_pc: usize,
    /// Responses captured by the best answer.
    pub responses: Vec<SemanticResponse>,
    /// Precedence of the call that planted the memo.
    pub prec: usize,
}
