//! Proxy commands: runtime aliases that expand to another invocation.

use adi_core::command::{Command, CommandContext, PluginRegistry, RegistryError, Response};
use regex::Regex;

/// Register the proxy commands.
pub fn register(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    plugins.register("setproxy", setproxy)?;
    plugins.register("delproxy", delproxy)?;
    Ok(())
}

/// Replace platform-formatted links `<url|label>` and `<url>` with the
/// bare url.
pub fn unfurl(text: &str) -> Result<String, regex::Error> {
    let links = Regex::new(r"<((?:https?|ftp)://[^|>]+)(?:\|[^>]*)?>")?;
    Ok(links.replace_all(text, "$1").into_owned())
}

/// `setproxy name text...`: create or update a proxy.
fn setproxy(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("sets a proxy command");
    }
    let mut words = args.split_whitespace();
    let (Some(name), Some(_)) = (words.next(), words.clone().next()) else {
        return Response::info("syntax: setproxy [name] [cmd]");
    };
    let text = match unfurl(&words.collect::<Vec<_>>().join(" ")) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "link pattern failed to compile");
            return Response::internal_error();
        }
    };

    let commands = &mut ctx.state.commands;
    match commands.get_mut(name) {
        Some(existing) if existing.handler.is_some() => {
            return Response::info(format!("{name} is not a proxy command"));
        }
        Some(existing) => existing.proxy = Some(text.clone()),
        None => {
            let proxy = Command::proxy(name, text.clone(), ctx.state.default_level);
            if let Err(e) = commands.insert(proxy) {
                tracing::warn!(error = %e, "proxy rejected");
                return Response::info(format!("{name} is not a valid command name"));
            }
            if let Err(e) = commands.reset() {
                tracing::error!(error = %e, "command pattern rebuild failed");
                commands.remove(name);
                return Response::internal_error();
            }
        }
    }
    tracing::info!(command = name, proxy = %text, by = %ctx.user, "proxy set");
    Response::charged(format!("set {name} to \"{text}\""))
}

/// `delproxy name`: remove a proxy. Handler commands cannot be removed.
fn delproxy(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("deletes a proxy command");
    }
    let commands = &mut ctx.state.commands;
    if !commands.get(args).is_some_and(Command::is_proxy) {
        return Response::info("command does not exist");
    }
    commands.remove(args);
    if let Err(e) = commands.reset() {
        tracing::error!(error = %e, "command pattern rebuild failed");
        return Response::internal_error();
    }
    tracing::info!(command = args, by = %ctx.user, "proxy deleted");
    Response::charged(format!("{args} deleted"))
}
