//! Control flow type

use super::values::Val;

/// Control flow state produced by executing a statement
///
/// `Return` is not an error: it unwinds through enclosing `if`/`for` bodies
/// until `execute_block` converts it back into a plain value. Failures travel
/// separately as `Err(ExecError)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    None,
    Return(Val),
}

impl Control {
    pub fn is_return(&self) -> bool {
        matches!(self, Control::Return(_))
    }
}
