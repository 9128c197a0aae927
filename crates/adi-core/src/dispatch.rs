//! The dispatch and authorization pipeline.
//!
//! Every inbound message walks the same steps and stops at the first
//! failure:
//!
//! 1. **Address**: the text must start with the bot's mention token, or
//!    with the short-command sigil when one is configured. Anything else is
//!    ignored without a reply.
//! 2. **Parse**: the rest must match a live command name, otherwise the
//!    help text is returned.
//! 3. **Resolve user**: the sender is created on first reference.
//! 4. **Level gate**, then 5. **price gate**, both evaluated against the
//!    command as invoked (for a proxy, the alias).
//! 6. **Proxy**: the argument text is substituted into the proxy template
//!    and re-parsed once. A proxy pointing at another proxy is refused.
//! 7. **Invoke** the handler.
//! 8. **Bill**: iff the invoked command has a non-zero price and the
//!    response asks to be charged, move the price from the user to the
//!    bank.

use std::time::Duration;

use adi_ledger::{Level, Points, UserId};
use rand::RngCore;
use regex::Regex;

use crate::command::{CommandContext, Response};
use crate::platform::{ChatPlatform, Message};
use crate::state::BotState;

// ---------------------------------------------------------------------------
// Address filter
// ---------------------------------------------------------------------------

/// Recognises messages addressed to the bot.
#[derive(Debug, Clone)]
pub struct AddressMatcher {
    pattern: Regex,
}

impl AddressMatcher {
    /// Match `<@bot_id>` followed by optional whitespace, or `sign` when
    /// short commands are enabled.
    ///
    /// # Errors
    ///
    /// Fails only if the pattern exceeds the regex size limit.
    pub fn new(bot_id: &str, short_sign: Option<&str>) -> Result<Self, regex::Error> {
        let mention = format!(r"<@{}>\s*", regex::escape(bot_id));
        let source = match short_sign {
            Some(sign) => format!("^(?:{mention}|{})", regex::escape(sign)),
            None => format!("^{mention}"),
        };
        Ok(Self {
            pattern: Regex::new(&source)?,
        })
    }

    /// The text after the address marker, or `None` if the message is not
    /// addressed to the bot.
    pub fn strip<'t>(&self, text: &'t str) -> Option<&'t str> {
        let m = self.pattern.find(text)?;
        text.get(m.end()..)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a dispatch attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No command matched; carries the help text.
    Help(String),

    /// The user's level is below the command's.
    Unprivileged {
        /// The user's level.
        level: Level,
        /// The command's required level.
        required: Level,
    },

    /// The user cannot afford the command.
    InsufficientPoints {
        /// The user's balance.
        points: Points,
        /// The command's price.
        price: Points,
    },

    /// A proxy expanded to another proxy.
    ProxyChain {
        /// The invoked alias.
        alias: String,
        /// The proxy it pointed at.
        target: String,
    },

    /// The resolved command has no handler bound.
    Unbound {
        /// The command without a handler.
        command: String,
    },

    /// A handler ran.
    Completed {
        /// The handler's command name.
        command: String,
        /// What the handler returned.
        response: Response,
        /// What the user was billed.
        charged: Points,
    },
}

impl Outcome {
    /// The chat reply for this outcome. Empty means stay silent.
    pub fn reply_text(&self) -> String {
        match self {
            Self::Help(help) => help.clone(),
            Self::Unprivileged { level, required } => {
                format!("unprivileged. your level: {level}. required: {required}")
            }
            Self::InsufficientPoints { points, price } => {
                format!("not enough points. your points: {points}. required: {price}")
            }
            Self::ProxyChain { alias, target } => {
                format!("{alias} is misconfigured: proxy target {target} is itself a proxy")
            }
            Self::Unbound { .. } => Response::internal_error().text,
            Self::Completed { response, .. } => response.text.clone(),
        }
    }
}

/// A reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message body.
    pub text: String,
    /// Channel the triggering message came from.
    pub channel: String,
}

/// Substitute `args` for the first `%s` in `template`, or use the template
/// verbatim if it has none.
pub fn expand_proxy(template: &str, args: &str) -> String {
    if template.contains("%s") {
        template.replacen("%s", args, 1)
    } else {
        template.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes addressed messages through the authorization pipeline.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    matcher: Option<AddressMatcher>,
    short_sign: Option<String>,
    eval_timeout: Duration,
}

impl Dispatcher {
    /// A dispatcher that ignores everything until [`connect`](Self::connect).
    pub const fn new(short_sign: Option<String>, eval_timeout: Duration) -> Self {
        Self {
            matcher: None,
            short_sign,
            eval_timeout,
        }
    }

    /// Rebuild the address matcher for the bot's user id.
    pub fn connect(&mut self, bot_id: &str) -> Result<(), regex::Error> {
        self.matcher = Some(AddressMatcher::new(bot_id, self.short_sign.as_deref())?);
        tracing::info!(bot_id, short_commands = self.short_sign.is_some(), "address matcher ready");
        Ok(())
    }

    /// Whether a matcher has been built.
    pub const fn is_connected(&self) -> bool {
        self.matcher.is_some()
    }

    /// Handle one inbound message. `None` means send nothing.
    pub fn handle_message(
        &self,
        state: &mut BotState,
        platform: &dyn ChatPlatform,
        rng: &mut dyn RngCore,
        message: &Message,
    ) -> Option<Reply> {
        let Some(matcher) = &self.matcher else {
            tracing::debug!("message before connect, ignored");
            return None;
        };
        let text = matcher.strip(&message.text)?;
        tracing::info!(user = %message.user, channel = %message.channel, text, "command received");

        let text = self
            .execute(state, platform, rng, &message.user, text)
            .reply_text();
        if text.is_empty() {
            return None;
        }
        Some(Reply {
            text,
            channel: message.channel.clone(),
        })
    }

    /// Run the pipeline on already-addressed text.
    pub fn execute(
        &self,
        state: &mut BotState,
        platform: &dyn ChatPlatform,
        rng: &mut dyn RngCore,
        user: &UserId,
        text: &str,
    ) -> Outcome {
        let Some(parsed) = state.commands.parse(text) else {
            return Outcome::Help(state.commands.help_text().to_owned());
        };
        let Some(command) = state.commands.get(&parsed.name).cloned() else {
            return Outcome::Help(state.commands.help_text().to_owned());
        };

        let caller = state.user_mut(user);
        if caller.level < command.required_level {
            return Outcome::Unprivileged {
                level: caller.level,
                required: command.required_level,
            };
        }
        if command.price > caller.points {
            return Outcome::InsufficientPoints {
                points: caller.points,
                price: command.price,
            };
        }

        let (target, args) = match &command.proxy {
            Some(template) => {
                let expanded = expand_proxy(template, &parsed.args);
                let Some(inner) = state.commands.parse(&expanded) else {
                    return Outcome::Help(state.commands.help_text().to_owned());
                };
                let Some(target) = state.commands.get(&inner.name).cloned() else {
                    return Outcome::Help(state.commands.help_text().to_owned());
                };
                if target.is_proxy() {
                    tracing::warn!(alias = %command.name, target = %target.name, "proxy chain refused");
                    return Outcome::ProxyChain {
                        alias: command.name,
                        target: target.name,
                    };
                }
                (target, inner.args)
            }
            None => (command.clone(), parsed.args),
        };

        let Some(handler) = target.handler else {
            tracing::error!(command = %target.name, "command has no handler");
            return Outcome::Unbound {
                command: target.name,
            };
        };

        let mut ctx = CommandContext {
            state,
            user: user.clone(),
            platform,
            rng,
            eval_timeout: self.eval_timeout,
        };
        let response = handler(&mut ctx, &args);

        let charged = if command.price > Points::ZERO && response.charge {
            state.bill(user, command.price);
            command.price
        } else {
            Points::ZERO
        };
        tracing::info!(
            user = %user,
            command = %target.name,
            charge = response.charge,
            charged = %charged,
            "command completed"
        );

        Outcome::Completed {
            command: target.name,
            response,
            charged,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::command::{Command, CommandRegistry};
    use crate::platform::MemoryPlatform;

    fn echo(_: &mut CommandContext<'_>, args: &str) -> Response {
        if args.is_empty() {
            return Response::info("usage: echo text");
        }
        Response::charged(args)
    }

    fn silent(_: &mut CommandContext<'_>, _: &str) -> Response {
        Response::charged("")
    }

    fn setup(level: u8, points: u64, command: Command) -> BotState {
        let mut state = BotState::default();
        state.commands = CommandRegistry::new(vec![
            command,
            Command::with_handler("silent", silent, Level::default()),
        ])
        .unwrap();
        let user = state.user_mut(&UserId::from("U1"));
        user.level = Level::new(level);
        user.points = Points::new(points);
        state
    }

    fn priced(name: &str, level: u8, price: u64) -> Command {
        let mut command = Command::with_handler(name, echo, Level::new(level));
        command.price = Points::new(price);
        command
    }

    fn run(state: &mut BotState, text: &str) -> Outcome {
        let dispatcher = Dispatcher::new(None, Duration::from_secs(1));
        let platform = MemoryPlatform::new("UBOT");
        let mut rng = SmallRng::seed_from_u64(1);
        dispatcher.execute(state, &platform, &mut rng, &UserId::from("U1"), text)
    }

    #[test]
    fn address_matcher_mention_and_sigil() {
        let plain = AddressMatcher::new("UBOT", None).unwrap();
        assert_eq!(plain.strip("<@UBOT>  pts"), Some("pts"));
        assert_eq!(plain.strip("!pts"), None);
        assert_eq!(plain.strip("hey <@UBOT> pts"), None);

        let short = AddressMatcher::new("UBOT", Some("!")).unwrap();
        assert_eq!(short.strip("!pts"), Some("pts"));
        assert_eq!(short.strip("<@UBOT> pts"), Some("pts"));

        let dot = AddressMatcher::new("UBOT", Some(".")).unwrap();
        assert_eq!(dot.strip("xpts"), None);
    }

    #[test]
    fn level_is_checked_before_price() {
        let mut state = setup(0, 0, priced("big", 5, 100));
        let outcome = run(&mut state, "big now");
        assert_eq!(
            outcome.reply_text(),
            "unprivileged. your level: 0. required: 5"
        );
    }

    #[test]
    fn price_gate_reports_balance() {
        let mut state = setup(5, 3, priced("big", 5, 100));
        assert_eq!(
            run(&mut state, "big now").reply_text(),
            "not enough points. your points: 3. required: 100"
        );
    }

    #[test]
    fn usage_reply_is_not_billed() {
        let mut state = setup(0, 50, priced("echo", 0, 5));
        let outcome = run(&mut state, "echo");
        assert_eq!(outcome.reply_text(), "usage: echo text");
        assert_eq!(state.user_mut(&UserId::from("U1")).points, Points::new(50));
        assert_eq!(state.bank.points, Points::ZERO);
    }

    #[test]
    fn charged_response_bills_price_to_bank() {
        let mut state = setup(10, 50, priced("echo", 10, 5));
        let outcome = run(&mut state, "echo hi");
        assert!(matches!(outcome, Outcome::Completed { charged, .. } if charged == Points::new(5)));
        assert_eq!(state.user_mut(&UserId::from("U1")).points, Points::new(45));
        assert_eq!(state.bank.points, Points::new(5));
    }

    #[test]
    fn unknown_command_returns_help() {
        let mut state = setup(0, 0, priced("echo", 0, 0));
        assert_eq!(run(&mut state, "what").reply_text(), "commands: echo, silent");
    }

    #[test]
    fn proxy_substitutes_and_bills_alias_price() {
        let mut alias = Command::proxy("shout", "echo %s!", Level::default());
        alias.price = Points::new(2);
        let mut state = setup(0, 10, alias);
        state.commands.insert(priced("echo", 9, 7)).unwrap();
        state.commands.reset().unwrap();

        let outcome = run(&mut state, "shout hey");
        assert_eq!(outcome.reply_text(), "hey!");
        assert_eq!(state.user_mut(&UserId::from("U1")).points, Points::new(8));
        assert_eq!(state.bank.points, Points::new(2));
    }

    #[test]
    fn proxy_without_placeholder_is_verbatim() {
        assert_eq!(expand_proxy("say hi", "ignored"), "say hi");
        assert_eq!(expand_proxy("say %s and %s", "a"), "say a and %s");
    }

    #[test]
    fn proxy_chains_are_refused() {
        let mut state = setup(0, 0, Command::proxy("a", "b", Level::default()));
        state
            .commands
            .insert(Command::proxy("b", "silent", Level::default()))
            .unwrap();
        state.commands.reset().unwrap();
        assert!(matches!(run(&mut state, "a"), Outcome::ProxyChain { .. }));
    }

    #[test]
    fn handle_message_ignores_unaddressed_and_empty_replies() {
        let mut state = setup(0, 0, priced("echo", 0, 0));
        let mut dispatcher = Dispatcher::new(None, Duration::from_secs(1));
        let platform = MemoryPlatform::new("UBOT");
        let mut rng = SmallRng::seed_from_u64(1);
        let message = |text: &str| Message {
            text: text.to_owned(),
            user: UserId::from("U1"),
            timestamp: "1".to_owned(),
            channel: "C1".to_owned(),
        };

        assert_eq!(
            dispatcher.handle_message(&mut state, &platform, &mut rng, &message("<@UBOT> echo x")),
            None
        );
        dispatcher.connect("UBOT").unwrap();
        assert_eq!(
            dispatcher.handle_message(&mut state, &platform, &mut rng, &message("echo x")),
            None
        );
        assert_eq!(
            dispatcher.handle_message(&mut state, &platform, &mut rng, &message("<@UBOT> silent")),
            None
        );
        let reply = dispatcher
            .handle_message(&mut state, &platform, &mut rng, &message("<@UBOT> echo x"))
            .unwrap();
        assert_eq!(reply.text, "x");
        assert_eq!(reply.channel, "C1");
    }
}
