//! Calculator command backed by `fend-core`, under a wall-clock budget.
//!
//! Each call evaluates in a fresh [`fend_core::Context`], so nothing a user
//! defines leaks into the next call. The evaluator polls a [`Deadline`]
//! through [`fend_core::Interrupt`]; once the budget is spent it aborts and
//! the command replies that the code took too long, without billing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use adi_core::command::{CommandContext, PluginRegistry, RegistryError, Response};

const USAGE: &str = "a calculator
  Operators: +, -, *, /, ^, !, mod
  Functions: sin, cos, tan, asin, acos, atan, sqrt, abs, ln, log, exp
  Constants: e, pi
  Units convert with `to`, e.g. 5 feet to meters";

/// Register the calculator.
pub fn register(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    plugins.register("calc", calc)
}

fn calc(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info(USAGE);
    }
    let deadline = Deadline::after(ctx.eval_timeout);
    match evaluate(args, &deadline) {
        Ok(value) => Response::charged(format!("{args}={value}")),
        Err(EvalError::TimedOut) => {
            tracing::warn!(user = %ctx.user, timeout = ?ctx.eval_timeout, "evaluation timed out");
            Response::info("code took too long")
        }
        Err(EvalError::Invalid(message)) => Response::info(format!("error: {message}")),
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A wall-clock budget the evaluator polls at its own checkpoints.
///
/// The first poll past the deadline latches `expired`, so a failed
/// evaluation can tell an abort from a genuine error.
#[derive(Debug)]
pub struct Deadline {
    at: Option<Instant>,
    expired: AtomicBool,
}

impl Deadline {
    /// A deadline `budget` from now. A budget too large to represent never
    /// expires.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            expired: AtomicBool::new(false),
        }
    }

    /// Whether a poll has seen the deadline pass.
    pub fn has_expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed)
    }
}

impl fend_core::Interrupt for Deadline {
    fn should_interrupt(&self) -> bool {
        if self.has_expired() {
            return true;
        }
        let passed = self.at.is_some_and(|at| Instant::now() >= at);
        if passed {
            self.expired.store(true, Ordering::Relaxed);
        }
        passed
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Reasons an expression produces no result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The evaluator rejected the input.
    #[error("{0}")]
    Invalid(String),

    /// The deadline passed before evaluation finished.
    #[error("evaluation timed out")]
    TimedOut,
}

/// Evaluate `input` in a fresh context, aborting once `deadline` passes.
pub fn evaluate(input: &str, deadline: &Deadline) -> Result<String, EvalError> {
    use fend_core::Interrupt;

    if deadline.should_interrupt() {
        return Err(EvalError::TimedOut);
    }
    let mut context = fend_core::Context::new();
    context.set_random_u32_fn(random_u32);

    match fend_core::evaluate_with_interrupt(input, &mut context, deadline) {
        Ok(result) => {
            let value = result.get_main_result();
            if value.is_empty() {
                Err(EvalError::Invalid("no result".to_owned()))
            } else {
                Ok(value.to_owned())
            }
        }
        Err(_) if deadline.has_expired() => Err(EvalError::TimedOut),
        Err(message) => Err(EvalError::Invalid(message)),
    }
}

fn random_u32() -> u32 {
    use rand::Rng;
    rand::rng().random()
}
