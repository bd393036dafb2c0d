//! Call frame implementation for function calls

use crate::bytecode::Callee;
use crate::value::Value;

/// Call frame for function calls
///
/// A call is built in two steps: `new-stack-frame` records the callee as
/// pending, `set-return-addr` turns it into an active frame. Each active frame
/// tracks:
/// - Its own local slots (parameters first)
/// - Where to return to (`None` for the frame the host started)
/// - The operand stack height when it became active
///
/// ## Stack Layout Example
///
/// ```text
/// call add(1, 2) from main:
///
/// operand stack  [..main temps..] [1][2]   -> set-return-addr
///                [..main temps..]          <- add.stack_base
/// add.locals     [1][2][local c]
/// ```
///
/// `return` truncates the operand stack back to `stack_base` before pushing
/// the result, so a callee can never leak temporaries into its caller.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// What this frame is running
    pub callee: Callee,
    /// Local slots; empty for native frames
    pub locals: Vec<Value>,
    /// Instruction to continue at after the call; `None` ends the invocation
    pub return_addr: Option<usize>,
    /// Operand stack height at activation
    pub stack_base: usize,
}

impl CallFrame {
    pub fn is_native(&self) -> bool {
        matches!(self.callee, Callee::Native(_))
    }
}
