//! Point commands: balances, transfers, duels, ranking, prices and the
//! lottery.

use std::fmt::Write as _;

use adi_core::bank::{PurchaseError, TicketRequest};
use adi_core::command::{CommandContext, PluginRegistry, RegistryError, Response};
use adi_ledger::{AccountRef, LedgerError, Points};
use rand::Rng;

use crate::{find_account, parse_points};

const LOTTERY_HELP: &str = "the lottery is drawn periodically. users can buy multiple tickets.
one of the sold tickets is chosen as winner and gets the whole pot.
if a drawing comes up and only one user bought tickets:
\t- bought ticket(s) stay in the game
\t- bank pays a small sum into the pot if it has the cash
use 'lottery [tickets|all]' to buy tickets, 'lottery info' to get infos";

/// Register the point commands.
pub fn register(plugins: &mut PluginRegistry) -> Result<(), RegistryError> {
    plugins.register("pts", pts)?;
    plugins.register("givepts", givepts)?;
    plugins.register("trpts", trpts)?;
    plugins.register("duel", duel)?;
    plugins.register("rank", rank)?;
    plugins.register("cost", cost)?;
    plugins.register("setprc", setprc)?;
    plugins.register("lottery", lottery)?;
    Ok(())
}

/// Resolve a name or produce the reply for a missing one.
macro_rules! account_or_reply {
    ($ctx:expr, $name:expr, $missing:expr) => {
        match find_account($ctx, $name) {
            Ok(Some(account)) => account,
            Ok(None) => return Response::info($missing),
            Err(reply) => return reply,
        }
    };
}

fn transfer_reply(err: &LedgerError, self_transfer: &str) -> Response {
    match err {
        LedgerError::SelfTransfer { .. } => Response::info(self_transfer),
        other => {
            tracing::error!(error = %other, "transfer failed after validation");
            Response::internal_error()
        }
    }
}

/// `pts [name]`: show a balance.
fn pts(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        let me = AccountRef::User(ctx.user.clone());
        return Response::charged(format!("your points: {}", ctx.state.balance(&me)));
    }
    let account = account_or_reply!(ctx, args, "user not found");
    Response::charged(format!("{args} points: {}", ctx.state.balance(&account)))
}

/// `givepts name points|all`: move points from the caller.
fn givepts(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("give points to user");
    }
    let [name, amount] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: givepts [user] [points|all]");
    };

    let src = AccountRef::User(ctx.user.clone());
    let amount = match parse_points(ctx.state.balance(&src), None, amount) {
        Ok(amount) => amount,
        Err(reply) => return reply,
    };
    let dst = account_or_reply!(ctx, name, "user not found");
    if let Err(e) = ctx.state.transfer(&src, &dst, amount) {
        return transfer_reply(&e, "can't give points to yourself");
    }
    Response::charged(format!(
        "{name} points {}. your points: {}",
        ctx.state.balance(&dst),
        ctx.state.balance(&src)
    ))
}

/// `trpts src dst points|all`: move points between any two accounts.
fn trpts(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("transfer points");
    }
    let [from, to, amount] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: trpts [src] [dst] [points|all]");
    };

    let src = account_or_reply!(ctx, from, format!("user {from} not found"));
    let amount = match parse_points(ctx.state.balance(&src), Some(from), amount) {
        Ok(amount) => amount,
        Err(reply) => return reply,
    };
    let dst = account_or_reply!(ctx, to, format!("user {to} not found"));
    if let Err(e) = ctx.state.transfer(&src, &dst, amount) {
        return transfer_reply(&e, "source and destination can not be the same");
    }
    Response::charged(format!(
        "{from} points are now {}. {to} points are now {}",
        ctx.state.balance(&src),
        ctx.state.balance(&dst)
    ))
}

/// `duel name points|all`: a coin flip for the stake.
fn duel(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("challenge somebody to get their points");
    }
    let [name, amount] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: duel [user] [points|all]");
    };
    if name == "pot" {
        return Response::info(format!("can't duel {name}"));
    }

    let me = AccountRef::User(ctx.user.clone());
    let opponent = account_or_reply!(ctx, name, "user not found");
    if opponent == me {
        return Response::info("can't duel yourself");
    }
    let mine = ctx.state.balance(&me);
    let theirs = ctx.state.balance(&opponent);
    if theirs.is_zero() {
        return Response::info(format!("{name} has no points"));
    }

    let stake = if amount == "all" {
        if mine.is_zero() {
            return Response::info("you have no points");
        }
        mine.min(theirs)
    } else {
        let Ok(stake) = amount.parse::<Points>() else {
            return Response::info("syntax: duel [user] [points|all]");
        };
        if stake.is_zero() {
            return Response::info("must be more than 0 points");
        }
        if stake > mine {
            return Response::info(format!("not enough points. your points: {mine}"));
        }
        if stake > theirs {
            return Response::info(format!(
                "{name} does not have enough points. {name} points: {theirs}"
            ));
        }
        stake
    };

    let won = ctx.rng.random_bool(0.5);
    let (from, to) = if won { (&opponent, &me) } else { (&me, &opponent) };
    if let Err(e) = ctx.state.transfer(from, to, stake) {
        return transfer_reply(&e, "can't duel yourself");
    }
    tracing::info!(user = %ctx.user, opponent = %opponent, stake = %stake, won, "duel");

    let verb = if won { "took" } else { "lost" };
    Response::charged(format!(
        "you {verb} {stake} points. your points: {}. {name} points: {}",
        ctx.state.balance(&me),
        ctx.state.balance(&opponent)
    ))
}

/// `rank`: users by points, richest first.
fn rank(ctx: &mut CommandContext<'_>, _args: &str) -> Response {
    let directory = match ctx.platform.users() {
        Ok(users) => users,
        Err(e) => {
            tracing::error!(error = %e, "user directory unavailable");
            return Response::internal_error();
        }
    };

    let mut text = String::new();
    let named = ctx.state.users.ranked().into_iter().filter_map(|user| {
        directory
            .iter()
            .find(|entry| entry.id == user.id)
            .map(|entry| (entry.name.as_str(), user.points))
    });
    for (place, (name, points)) in (1u64..).zip(named) {
        let _ = writeln!(text, "{place}. {name} ({points})");
    }
    Response::charged(text)
}

/// `cost command`: show a price.
fn cost(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("find out the price of a command");
    }
    match ctx.state.commands.get(args) {
        Some(command) => Response::charged(format!("{args} costs {}", command.price)),
        None => Response::info("command not found"),
    }
}

/// `setprc command price`: change a price.
fn setprc(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    if args.is_empty() {
        return Response::info("set price of a command");
    }
    let [name, price] = args.split_whitespace().collect::<Vec<_>>()[..] else {
        return Response::info("syntax: setprc [command] [price]");
    };
    let Ok(price) = price.parse::<Points>() else {
        return Response::info("syntax: setprc [command] [price]");
    };
    let Some(command) = ctx.state.commands.get_mut(name) else {
        return Response::info("command not found");
    };
    command.price = price;
    tracing::info!(command = name, price = %price, "price changed");
    Response::charged(format!("{name} now costs {price}"))
}

/// `lottery [help|info|N|all]`: status, help, holdings, or buy tickets.
fn lottery(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    let lot = &ctx.state.bank.lottery;
    match args {
        "" => Response::info(format!(
            "tickets[price:{}, sold:{}], drawing:{}, pot:{} | try 'lottery help' for help",
            lot.ticket_price,
            lot.tickets_sold,
            lot.next_draw().format("%d.%b %H:%M %Z"),
            lot.pot
        )),
        "help" => Response::info(LOTTERY_HELP),
        "info" => {
            if lot.tickets_sold == 0 {
                return Response::info("no one has bought a ticket");
            }
            let holders = u64::try_from(lot.holders()).unwrap_or(u64::MAX);
            match lot.tickets.get(&ctx.user) {
                Some(&mine) => Response::info(format!(
                    "you have {mine} tickets. {} other users bought {} tickets",
                    holders.saturating_sub(1),
                    lot.tickets_sold.saturating_sub(mine)
                )),
                None => Response::info(format!(
                    "you did not buy tickets. {holders} other users bought {} tickets",
                    lot.tickets_sold
                )),
            }
        }
        _ => buy_tickets(ctx, args),
    }
}

fn buy_tickets(ctx: &mut CommandContext<'_>, args: &str) -> Response {
    let request = if args == "all" {
        TicketRequest::All
    } else {
        match args.parse::<u64>() {
            Ok(0) => return Response::info("needs to be at least 1"),
            Ok(n) => TicketRequest::Count(n),
            Err(_) => return Response::info("syntax: lottery [tickets|all]"),
        }
    };

    let buyer = ctx.user.clone();
    match ctx.state.buy_tickets(&buyer, request) {
        Ok(purchase) => Response::charged(format!(
            "you bought {} tickets for {}. your points:{}. pot: {}",
            purchase.tickets,
            purchase.cost,
            ctx.state.balance(&AccountRef::User(buyer)),
            ctx.state.bank.lottery.pot
        )),
        Err(PurchaseError::NotEnoughPoints) => Response::info("you do not have enough points."),
        Err(PurchaseError::TooMany) => Response::info("can't buy that much tickets"),
        Err(PurchaseError::ZeroTickets) => Response::info("needs to be at least 1"),
        Err(PurchaseError::NoTicketPrice) => {
            tracing::error!("lottery has no ticket price");
            Response::internal_error()
        }
    }
}
