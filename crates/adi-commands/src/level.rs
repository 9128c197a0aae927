//! Level commands: user levels, required levels and user ids.

use adi_core::command::{CommandContext, PluginRegistry, RegistryError, Response};
use adi_ledger::Level;

use crate::find_user;

/// Register the level commands.
pub fn register(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    plugins.register("lvl", lvl)?;
    plugins.register("setlvl", setlvl)?;
    plugins.register("rqlvl", rqlvl)?;
    plugins.register("setrqlvl", setrqlvl)?;
    plugins.register("id", id)?;
    Ok(())
}

fn lvl(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        let level = ctx.state.user_mut(&ctx.user).level;
        return Response::charged(format!("your level: {level}"));
    }
    let user = match find_user(ctx, args) {
        Ok(Some(user)) => user,
        Ok(None) => return Response::info("user not found"),
        Err(reply) => return reply,
    };
    let level = ctx.state.user_mut(&user.id).level;
    Response::charged(format!("{} level: {level}", user.name))
}

fn setlvl(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("set level of user");
    }
    let [name, level] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: setlvl [user] [level]");
    };
    let Ok(level) = level.parse::<Level>() else {
        return Response::info("syntax: setlvl [user] [level]");
    };
    let user = match find_user(ctx, name) {
        Ok(Some(user)) => user,
        Ok(None) => return Response::info("user not found"),
        Err(reply) => return reply,
    };
    ctx.state.user_mut(&user.id).level = level;
    tracing::info!(user = %user.id, level = %level, by = %ctx.user, "level changed");
    Response::charged(format!("{} level is now {level}", user.name))
}

fn rqlvl(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("find out the required level of a command");
    }
    match ctx.state.commands.get(args) {
        Some(command) => {
            Response::charged(format!("{args} requires level {}", command.required_level))
        }
        None => Response::info("command not found"),
    }
}

fn setrqlvl(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("set required level for a command");
    }
    let [name, level] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: setrqlvl [command] [level]");
    };
    let Ok(level) = level.parse::<Level>() else {
        return Response::info("syntax: setrqlvl [command] [level]");
    };
    let Some(command) = ctx.state.commands.get_mut(name) else {
        return Response::info("command not found");
    };
    command.required_level = level;
    tracing::info!(command = name, level = %level, "required level changed");
    Response::charged(format!("{name} now requires level {level}"))
}

fn id(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::charged(format!("your id: {}", ctx.user));
    }
    match find_user(ctx, args) {
        Ok(Some(user)) => Response::charged(format!("{} id: {}", user.name, user.id)),
        Ok(None) => Response::info("user not found"),
        Err(reply) => reply,
    }
}
