//! The periodic tick: lottery draw, salary, conservation check.
//!
//! The bot loop calls [`run_tick`] on every timer fire and flushes the
//! store afterwards. Each step logs its own failures and never aborts the
//! tick.
//!
//! ```text
//! draw lottery -> announce winner -> pay salary -> verify conservation
//! ```

use adi_ledger::{Account, ConservationResult, Points, UserId, verify_conservation};
use chrono::{DateTime, Utc};

use crate::bank::{DrawOutcome, DrawReport, TicketDraw};
use crate::platform::{ChatPlatform, Presence};
use crate::state::BotState;

/// Name used when the winner cannot be looked up.
pub const UNKNOWN_WINNER: &str = "somebody";

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Lottery result.
    pub draw: DrawReport,
    /// Number of users paid a salary point.
    pub salaries_paid: u64,
    /// Whether the winner announcement was sent.
    pub announced: bool,
    /// Total supply check across the whole tick.
    pub conservation: ConservationResult,
}

/// Run one tick at `now`.
pub fn run_tick(
    state: &mut BotState,
    platform: &dyn ChatPlatform,
    draw: &mut dyn TicketDraw,
    now: DateTime<Utc>,
    system_user_id: &str,
) -> TickReport {
    let before = state.total_supply();

    let report = state.draw_lottery(now, draw);
    let announced = match &report.outcome {
        DrawOutcome::Won { winner, payout, .. } => announce_winner(platform, winner, *payout),
        _ => false,
    };

    let salaries_paid = pay_salary(state, platform, system_user_id);

    // Salary and top-up move points between accounts; only saturation
    // changes the total.
    let conservation = verify_conservation(before, state.total_supply());
    tracing::debug!(
        bank = %state.bank.points,
        pot = %state.bank.lottery.pot,
        salaries_paid,
        balanced = conservation.is_balanced(),
        "tick complete"
    );

    TickReport {
        draw: report,
        salaries_paid,
        announced,
        conservation,
    }
}

/// Pay one point from the bank to every active human user.
///
/// Bots, the platform's system account and away users are skipped. Stops
/// paying once the bank is empty. A directory failure skips the salary.
pub fn pay_salary(state: &mut BotState, platform: &dyn ChatPlatform, system_user_id: &str) -> u64 {
    let users = match platform.users() {
        Ok(users) => users,
        Err(e) => {
            tracing::warn!(error = %e, "user directory unavailable, salary skipped");
            return 0;
        }
    };

    let mut paid = 0u64;
    for user in users {
        if state.bank.points.is_zero()
            || user.is_bot
            || user.id.as_str() == system_user_id
            || user.presence != Presence::Active
        {
            continue;
        }
        state.bank.sub(Points::new(1));
        state.user_mut(&user.id).add(Points::new(1));
        paid = paid.saturating_add(1);
    }
    paid
}

/// Post the winner to the general channel. Returns whether it was sent.
fn announce_winner(platform: &dyn ChatPlatform, winner: &UserId, payout: Points) -> bool {
    let name = match platform.user_info(winner) {
        Ok(user) => user.name,
        Err(e) => {
            tracing::warn!(user = %winner, error = %e, "winner lookup failed");
            UNKNOWN_WINNER.to_owned()
        }
    };
    let text = format!("{name} won the lottery pot of {payout} points");
    tracing::info!(winner = %winner, payout = %payout, "{text}");

    match platform.general_channel() {
        Ok(Some(channel)) => {
            platform.send_message(&text, &channel);
            true
        }
        Ok(None) => {
            tracing::warn!("no general channel, winner announcement skipped");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "general channel lookup failed, winner announcement skipped");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::platform::{MemoryPlatform, PlatformUser};

    struct FixedDraw(u64);

    impl TicketDraw for FixedDraw {
        fn draw(&mut self, _total: u64) -> u64 {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn platform() -> MemoryPlatform {
        let bot = PlatformUser {
            is_bot: true,
            ..PlatformUser::active("UB", "helper")
        };
        let away = PlatformUser {
            presence: Presence::Away,
            ..PlatformUser::active("U3", "carol")
        };
        MemoryPlatform::new("UBOT")
            .with_general_channel("CGEN")
            .with_user(PlatformUser::active("U1", "alice"))
            .with_user(PlatformUser::active("U2", "bob"))
            .with_user(PlatformUser::active("USLACKBOT", "slackbot"))
            .with_user(bot)
            .with_user(away)
    }

    #[test]
    fn salary_pays_active_humans_only() {
        let mut state = BotState::default();
        state.bank.points = Points::new(10);
        let paid = pay_salary(&mut state, &platform(), "USLACKBOT");
        assert_eq!(paid, 2);
        assert_eq!(state.bank.points, Points::new(8));
        assert_eq!(state.users.get(&UserId::from("U1")).unwrap().points, Points::new(1));
        assert!(state.users.get(&UserId::from("UB")).is_none());
    }

    #[test]
    fn salary_stops_when_bank_is_empty() {
        let mut state = BotState::default();
        state.bank.points = Points::new(1);
        assert_eq!(pay_salary(&mut state, &platform(), "USLACKBOT"), 1);
        assert_eq!(state.bank.points, Points::ZERO);
    }

    #[test]
    fn salary_skipped_on_directory_failure() {
        let mut state = BotState::default();
        state.bank.points = Points::new(10);
        let platform = platform();
        platform.set_failing(true);
        assert_eq!(pay_salary(&mut state, &platform, "USLACKBOT"), 0);
        assert_eq!(state.bank.points, Points::new(10));
    }

    #[test]
    fn winning_tick_announces_and_conserves() {
        let mut state = BotState::default();
        state.bank.lottery.last_draw = now() - chrono::Duration::days(3);
        state.bank.lottery.pot = Points::new(30);
        state.bank.lottery.tickets.insert(UserId::from("U1"), 1);
        state.bank.lottery.tickets.insert(UserId::from("U2"), 2);
        state.bank.lottery.tickets_sold = 3;
        let platform = platform();

        let report = run_tick(&mut state, &platform, &mut FixedDraw(1), now(), "USLACKBOT");
        assert!(report.announced);
        assert!(report.conservation.is_balanced());
        assert_eq!(state.users.get(&UserId::from("U2")).unwrap().points, Points::new(30));
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "bob won the lottery pot of 30 points");
        assert_eq!(sent[0].channel, "CGEN");
    }

    #[test]
    fn winner_missing_from_directory_is_announced_as_somebody() {
        let mut state = BotState::default();
        state.bank.lottery.last_draw = now() - chrono::Duration::days(3);
        state.bank.lottery.pot = Points::new(30);
        state.bank.lottery.tickets.insert(UserId::from("UGONE"), 2);
        state.bank.lottery.tickets_sold = 2;
        let platform = platform();

        let report = run_tick(&mut state, &platform, &mut FixedDraw(1), now(), "USLACKBOT");
        assert!(report.announced);
        assert_eq!(state.users.get(&UserId::from("UGONE")).unwrap().points, Points::new(30));
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, format!("{UNKNOWN_WINNER} won the lottery pot of 30 points"));
        assert_eq!(sent[0].text, "somebody won the lottery pot of 30 points");
        assert_eq!(sent[0].channel, "CGEN");
    }

    #[test]
    fn failed_channel_lookup_skips_announcement() {
        let mut state = BotState::default();
        state.bank.lottery.last_draw = now() - chrono::Duration::days(3);
        state.bank.lottery.pot = Points::new(30);
        state.bank.lottery.tickets.insert(UserId::from("U1"), 1);
        state.bank.lottery.tickets.insert(UserId::from("U2"), 1);
        state.bank.lottery.tickets_sold = 2;
        let platform = platform();
        platform.set_failing(true);

        let report = run_tick(&mut state, &platform, &mut FixedDraw(0), now(), "USLACKBOT");
        assert!(!report.announced);
        assert!(platform.sent().is_empty());
        assert_eq!(state.users.get(&UserId::from("U1")).unwrap().points, Points::new(30));
    }
}
