//! Small utility commands.

use adi_core::command::{CommandContext, PluginRegistry, RegistryError, Response};
use rand::Rng;
use rand::seq::IndexedRandom;

/// Register the utility commands.
pub fn register(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    plugins.register("hidden", hidden)?;
    plugins.register("setvis", setvis)?;
    plugins.register("coin", coin)?;
    plugins.register("rnd", rnd)?;
    plugins.register("say", say)?;
    Ok(())
}

/// List the commands the help text leaves out.
fn hidden(ctx: &mut CommandContext<'_>, _args: &str) -> Response {
    let mut names: Vec<&str> = ctx
        .state
        .commands
        .iter()
        .filter(|c| !c.visible)
        .map(|c| c.name.as_str())
        .collect();
    names.sort_unstable();
    Response::charged(names.join(", "))
}

fn setvis(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("set visibility of a command");
    }
    let [name, visibility] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: setvis [command] [visible|hidden]");
    };
    let commands = &mut ctx.state.commands;
    let Some(command) = commands.get_mut(name) else {
        return Response::info("command not found");
    };
    command.visible = visibility == "visible";
    let state = if command.visible { "visible" } else { "hidden" };
    if let Err(e) = commands.reset() {
        tracing::error!(error = %e, "command pattern rebuild failed");
        return Response::internal_error();
    }
    Response::charged(format!("{name} is now {state}"))
}

fn coin(ctx: &mut CommandContext<'_>, _args: &str) -> Response {
    Response::charged(if ctx.rng.random_bool(0.5) { "heads" } else { "tails" })
}

/// `rnd a,b,c`: pick one of the comma separated options.
fn rnd(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("randomly prints one of the comma separated texts given");
    }
    let options: Vec<&str> = args
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .collect();
    match options.choose(&mut *ctx.rng) {
        Some(choice) => Response::charged(*choice),
        None => Response::info("nothing to choose from"),
    }
}

fn say(_ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("says something");
    }
    Response::charged(args)
}
