//! End-to-end tests: built-in handlers driven through the dispatcher.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use adi_core::bank::Bank;
use adi_core::command::{Command, CommandRegistry, PluginRegistry};
use adi_core::dispatch::{Dispatcher, Outcome};
use adi_core::platform::{MemoryPlatform, PlatformUser};
use adi_core::state::BotState;
use adi_core::users::UserRegistry;
use adi_ledger::{AccountRef, Level, Points, UserId};
use rand::SeedableRng;
use rand::rngs::SmallRng;

struct Harness {
    state: BotState,
    platform: MemoryPlatform,
    dispatcher: Dispatcher,
    rng: SmallRng,
}

impl Harness {
    fn new() -> Self {
        let mut plugins = PluginRegistry::new();
        adi_commands::register_all(&mut plugins).unwrap();
        let commands = CommandRegistry::from_parts(Vec::new(), &plugins, Level::new(0)).unwrap();

        let mut bank = Bank::default();
        bank.lottery.ticket_price = Points::new(10);
        let mut state = BotState::new(UserRegistry::new(), commands, bank, Level::new(0));
        state.user_mut(&UserId::from("U1")).points = Points::new(100);
        state.user_mut(&UserId::from("U2")).points = Points::new(20);

        let platform = MemoryPlatform::new("UBOT")
            .with_general_channel("CGEN")
            .with_user(PlatformUser::active("U1", "alice"))
            .with_user(PlatformUser::active("U2", "bob"));

        Self {
            state,
            platform,
            dispatcher: Dispatcher::new(None, Duration::from_secs(1)),
            rng: SmallRng::seed_from_u64(7),
        }
    }

    fn as_user(&mut self, user: &str, text: &str) -> Outcome {
        self.dispatcher.execute(
            &mut self.state,
            &self.platform,
            &mut self.rng,
            &UserId::from(user),
            text,
        )
    }

    fn say(&mut self, text: &str) -> String {
        self.as_user("U1", text).reply_text()
    }

    fn points(&self, user: &str) -> Points {
        self.state.balance(&AccountRef::User(UserId::from(user)))
    }

    fn set_command(&mut self, name: &str, level: u8, price: u64) {
        let command = self.state.commands.get_mut(name).unwrap();
        command.required_level = Level::new(level);
        command.price = Points::new(price);
    }
}

#[test]
fn priced_command_bills_on_success() {
    let mut h = Harness::new();
    h.state.user_mut(&UserId::from("U1")).level = Level::new(10);
    h.state.user_mut(&UserId::from("U1")).points = Points::new(50);
    h.set_command("say", 10, 5);

    assert_eq!(h.say("say hello"), "hello");
    assert_eq!(h.points("U1"), Points::new(45));
    assert_eq!(h.state.bank.points, Points::new(5));
}

#[test]
fn usage_text_is_free_even_when_priced() {
    let mut h = Harness::new();
    h.set_command("say", 0, 5);
    assert_eq!(h.say("say"), "says something");
    assert_eq!(h.points("U1"), Points::new(100));
    assert_eq!(h.state.bank.points, Points::ZERO);
}

#[test]
fn level_gate_wins_over_price_gate() {
    let mut h = Harness::new();
    h.state.user_mut(&UserId::from("U1")).points = Points::ZERO;
    h.set_command("coin", 5, 100);
    assert_eq!(h.say("coin"), "unprivileged. your level: 0. required: 5");
}

#[test]
fn points_queries() {
    let mut h = Harness::new();
    assert_eq!(h.say("pts"), "your points: 100");
    assert_eq!(h.say("pts bob"), "bob points: 20");
    assert_eq!(h.say("pts pot"), "pot points: 0");
    assert_eq!(h.say("pts carol"), "user not found");

    h.platform.set_failing(true);
    assert_eq!(h.say("pts bob"), "internal error");
}

#[test]
fn givepts_moves_points_and_rejects_self() {
    let mut h = Harness::new();
    assert_eq!(h.say("givepts bob 30"), "bob points 50. your points: 70");
    assert_eq!(h.say("givepts alice 1"), "can't give points to yourself");
    assert_eq!(h.points("U1"), Points::new(70));
    assert_eq!(
        h.say("givepts bob 500"),
        "you do not have enough points. you have 70"
    );
    assert_eq!(h.say("givepts bob"), "syntax: givepts [user] [points|all]");
}

#[test]
fn trpts_rejects_same_account() {
    let mut h = Harness::new();
    h.state.bank.points = Points::new(10);
    assert_eq!(
        h.say("trpts bank bank 5"),
        "source and destination can not be the same"
    );
    assert_eq!(h.state.bank.points, Points::new(10));
    assert_eq!(
        h.say("trpts bank pot all"),
        "bank points are now 0. pot points are now 10"
    );
    assert_eq!(h.say("trpts bank pot all"), "bank got no points");
    assert_eq!(h.say("trpts nobody pot 1"), "user nobody not found");
}

#[test]
fn duel_conserves_points() {
    let mut h = Harness::new();
    let before = h.state.total_supply();
    assert_eq!(h.say("duel pot 5"), "can't duel pot");
    assert_eq!(h.say("duel alice 5"), "can't duel yourself");
    let reply = h.say("duel bob 10");
    assert!(reply.starts_with("you took 10 points") || reply.starts_with("you lost 10 points"));
    assert_eq!(h.state.total_supply(), before);
    let total = h.points("U1").value() + h.points("U2").value();
    assert_eq!(total, 120);
}

#[test]
fn rank_orders_by_points() {
    let mut h = Harness::new();
    assert_eq!(h.say("rank"), "1. alice (100)\n2. bob (20)\n");
}

#[test]
fn lottery_purchase_and_info() {
    let mut h = Harness::new();
    assert_eq!(
        h.say("lottery 3"),
        "you bought 3 tickets for 30. your points:70. pot: 30"
    );
    assert_eq!(
        h.as_user("U2", "lottery all").reply_text(),
        "you bought 2 tickets for 20. your points:0. pot: 50"
    );
    assert_eq!(
        h.say("lottery info"),
        "you have 3 tickets. 1 other users bought 2 tickets"
    );
    assert_eq!(
        h.as_user("U3", "lottery info").reply_text(),
        "you did not buy tickets. 2 other users bought 5 tickets"
    );
    assert_eq!(h.say("lottery 0"), "needs to be at least 1");
    assert_eq!(h.say("lottery many"), "syntax: lottery [tickets|all]");
    assert_eq!(h.say("lottery 8"), "you do not have enough points.");
    assert!(h.say("lottery").starts_with("tickets[price:10, sold:5], drawing:"));
}

#[test]
fn lottery_overflow_leaves_state_untouched() {
    let mut h = Harness::new();
    let before = h.state.bank.clone();
    assert_eq!(
        h.say(&format!("lottery {}", u64::MAX)),
        "can't buy that much tickets"
    );
    assert_eq!(h.state.bank, before);
    assert_eq!(h.points("U1"), Points::new(100));
}

#[test]
fn level_commands() {
    let mut h = Harness::new();
    assert_eq!(h.say("lvl"), "your level: 0");
    assert_eq!(h.say("setlvl bob 4"), "bob level is now 4");
    assert_eq!(h.say("lvl bob"), "bob level: 4");
    assert_eq!(h.say("setrqlvl rank 2"), "rank now requires level 2");
    assert_eq!(h.say("rqlvl rank"), "rank requires level 2");
    assert_eq!(h.say("rank"), "unprivileged. your level: 0. required: 2");
    assert_eq!(h.say("id"), "your id: U1");
    assert_eq!(h.say("id bob"), "bob id: U2");
    assert_eq!(h.say("setlvl bob x"), "syntax: setlvl [user] [level]");
}

#[test]
fn proxy_lifecycle() {
    let mut h = Harness::new();
    assert_eq!(
        h.say("setproxy greet say hello %s"),
        "set greet to \"say hello %s\""
    );
    assert_eq!(h.say("greet bob"), "hello bob");
    assert!(!h.say("").contains("greet"));
    assert_eq!(h.say("hidden"), "greet");

    assert_eq!(h.say("setproxy greet say hi"), "set greet to \"say hi\"");
    assert_eq!(h.say("greet"), "hi");

    assert_eq!(h.say("setproxy say coin"), "say is not a proxy command");
    assert_eq!(h.say("delproxy say"), "command does not exist");
    assert_eq!(h.say("delproxy greet"), "greet deleted");
    assert!(h.say("greet").starts_with("commands: "));
}

#[test]
fn proxy_price_is_the_alias_price() {
    let mut h = Harness::new();
    h.say("setproxy shout say %s!");
    h.set_command("shout", 0, 3);
    h.set_command("say", 0, 50);
    assert_eq!(h.say("shout hey"), "hey!");
    assert_eq!(h.points("U1"), Points::new(97));
}

#[test]
fn proxy_to_proxy_is_refused() {
    let mut h = Harness::new();
    h.say("setproxy inner say hi");
    h.say("setproxy outer inner");
    assert!(matches!(h.as_user("U1", "outer"), Outcome::ProxyChain { .. }));
}

#[test]
fn visibility_changes_help() {
    let mut h = Harness::new();
    assert!(h.say("").contains("coin"));
    assert_eq!(h.say("setvis coin hidden"), "coin is now hidden");
    assert!(!h.say("").contains("coin"));
    assert_eq!(h.say("setvis coin visible"), "coin is now visible");
    assert!(h.say("").contains("coin"));
}

#[test]
fn prices_can_be_set_and_read() {
    let mut h = Harness::new();
    assert_eq!(h.say("setprc coin 4"), "coin now costs 4");
    assert_eq!(h.say("cost coin"), "coin costs 4");
    assert_eq!(h.say("cost nope"), "command not found");
}

#[test]
fn misc_commands() {
    let mut h = Harness::new();
    let flip = h.say("coin");
    assert!(flip == "heads" || flip == "tails");
    let pick = h.say("rnd red, green ,blue");
    assert!(["red", "green", "blue"].contains(&pick.as_str()));
    assert_eq!(h.say("rnd only"), "only");
    for _ in 0..20 {
        let pick = h.say("rnd a,,b, ");
        assert!(pick == "a" || pick == "b", "picked {pick:?}");
    }
    h.set_command("rnd", 0, 1);
    let before = h.points("U1");
    assert_eq!(h.say("rnd , ,"), "nothing to choose from");
    assert_eq!(h.points("U1"), before);
    assert_eq!(h.say("say a\nb"), "a\nb");
}

#[test]
fn calc_evaluates_and_times_out() {
    let mut h = Harness::new();
    assert_eq!(h.say("calc 1+2*3"), "1+2*3=7");
    assert!(h.say("calc 1+").starts_with("error: "));

    h.set_command("calc", 0, 5);
    h.dispatcher = Dispatcher::new(None, Duration::ZERO);
    assert_eq!(h.say("calc 2^10"), "code took too long");
    assert_eq!(h.points("U1"), Points::new(100));
}

#[test]
fn persisted_metadata_survives_merge() {
    let mut plugins = PluginRegistry::new();
    adi_commands::register_all(&mut plugins).unwrap();
    let mut pts = Command::proxy("pts", "ignored", Level::new(3));
    pts.price = Points::new(2);
    pts.visible = true;
    let registry = CommandRegistry::from_parts(
        vec![pts, Command::proxy("hi", "say hi", Level::new(0))],
        &plugins,
        Level::new(1),
    )
    .unwrap();

    let pts = registry.get("pts").unwrap();
    assert!(pts.handler.is_some());
    assert!(!pts.is_proxy());
    assert_eq!(pts.price, Points::new(2));
    assert_eq!(registry.get("coin").unwrap().required_level, Level::new(1));
    assert!(registry.get("hi").unwrap().is_proxy());
}
