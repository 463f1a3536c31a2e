//! `log` and `now` built-ins

use crate::context::RuntimeContext;
use crate::executor::errors::RuntimeError;
use crate::executor::types::Val;

/// log(...args) - Write the arguments, space separated, to the log sink
pub fn log(args: &[Val], ctx: &RuntimeContext) -> Result<Val, RuntimeError> {
    let message = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    ctx.log(&message);
    Ok(Val::Null)
}

/// now() - Current time from the context clock, in epoch milliseconds
pub fn now(args: &[Val], ctx: &RuntimeContext) -> Result<Val, RuntimeError> {
    if !args.is_empty() {
        return Err(RuntimeError::invalid_argument(
            "now",
            format!("expected 0 arguments, got {}", args.len()),
        ));
    }
    Ok(Val::Num(ctx.now().timestamp_millis() as f64))
}
