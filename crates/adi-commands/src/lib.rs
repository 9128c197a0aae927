//! Built-in command handlers for the adi bot.
//!
//! Each module registers its handlers through [`register_all`], which the
//! binary calls once before the command registry is assembled. Handlers
//! follow one contract:
//!
//! - commands that need arguments reply with a usage line when called
//!   without any, and never bill it;
//! - input errors are plain replies with `charge: false`;
//! - collaborator failures are logged and reply `internal error`;
//! - only a completed action sets `charge: true`.

pub mod calc;
pub mod level;
pub mod misc;
pub mod points;
pub mod proxy;

use adi_core::command::{CommandContext, PluginRegistry, RegistryError, Response};
use adi_core::platform::PlatformUser;
use adi_ledger::{AccountRef, Points};

/// Register every built-in handler in declaration order.
///
/// # Errors
///
/// Fails on a duplicate or malformed name.
pub fn register_all(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    points::register(plugins)?;
    level::register(plugins)?;
    proxy::register(plugins)?;
    misc::register(plugins)?;
    calc::register(plugins)?;
    Ok(())
}

/// Look up a platform user by name. A directory failure becomes the
/// `internal error` reply.
pub(crate) fn find_user(
    ctx: &CommandContext<'_>,
    name: &str,
) -> Result<Option<PlatformUser>, Response> {
    ctx.platform.find_user_by_name(name).map_err(|e| {
        tracing::error!(name, error = %e, "user lookup failed");
        Response::internal_error()
    })
}

/// Resolve `bank`, `pot` or a user name to an account.
pub(crate) fn find_account(
    ctx: &CommandContext<'_>,
    name: &str,
) -> Result<Option<AccountRef>, Response> {
    ctx.state.account_by_name(ctx.platform, name).map_err(|e| {
        tracing::error!(name, error = %e, "account lookup failed");
        Response::internal_error()
    })
}

/// Parse a point amount against the balance that has to cover it.
///
/// `all` means the whole balance. `owner` names the account in error
/// replies; `None` addresses the caller.
pub(crate) fn parse_points(
    balance: Points,
    owner: Option<&str>,
    text: &str,
) -> Result<Points, Response> {
    if text == "all" {
        if balance.is_zero() {
            return Err(Response::info(match owner {
                None => "you have no points".to_owned(),
                Some(name) => format!("{name} got no points"),
            }));
        }
        return Ok(balance);
    }

    let amount = match text.parse::<Points>() {
        Ok(amount) if !amount.is_zero() => amount,
        _ => return Err(Response::info("points have to be positive")),
    };
    if balance < amount {
        return Err(Response::info(match owner {
            None => format!("you do not have enough points. you have {balance}"),
            Some(name) => format!("{name} does not have enough points. {name} has {balance}"),
        }));
    }
    Ok(amount)
}
