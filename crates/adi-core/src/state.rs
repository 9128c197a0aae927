//! The application state owned by the dispatcher.
//!
//! [`BotState`] holds the user registry, the live command registry and the
//! bank. Exactly one owner mutates it; handlers receive it through
//! [`CommandContext`](crate::command::CommandContext). Accounts that live
//! in different structures are addressed with [`AccountRef`] and resolved
//! here.

use adi_ledger::{Account, AccountRef, LedgerError, Level, Points, UserId, total_supply};
use chrono::{DateTime, Utc};

use crate::bank::{Bank, DrawOutcome, DrawReport, Purchase, PurchaseError, TicketDraw, TicketRequest};
use crate::command::CommandRegistry;
use crate::platform::{ChatPlatform, PlatformError};
use crate::users::{User, UserRegistry};

/// Users, commands and the bank.
#[derive(Debug, Clone, Default)]
pub struct BotState {
    /// All known users.
    pub users: UserRegistry,
    /// Live commands.
    pub commands: CommandRegistry,
    /// House account and lottery.
    pub bank: Bank,
    /// Level given to users on first reference.
    pub default_level: Level,
}

impl BotState {
    /// Assemble state from its parts.
    pub const fn new(
        users: UserRegistry,
        commands: CommandRegistry,
        bank: Bank,
        default_level: Level,
    ) -> Self {
        Self {
            users,
            commands,
            bank,
            default_level,
        }
    }

    /// The user with this id, created at the default level if new.
    pub fn user_mut(&mut self, id: &UserId) -> &mut User {
        self.users.get_or_create(id, self.default_level)
    }

    /// Resolve an account reference to its balance holder.
    ///
    /// Unknown users are created, as every referenced user is.
    pub fn account_mut(&mut self, account: &AccountRef) -> &mut dyn Account {
        match account {
            AccountRef::User(id) => self.users.get_or_create(id, self.default_level),
            AccountRef::Bank => &mut self.bank,
            AccountRef::Pot => &mut self.bank.lottery.pot,
        }
    }

    /// Current balance of an account. Unknown users hold nothing.
    pub fn balance(&self, account: &AccountRef) -> Points {
        match account {
            AccountRef::User(id) => self.users.get(id).map_or(Points::ZERO, |u| u.points),
            AccountRef::Bank => self.bank.points,
            AccountRef::Pot => self.bank.lottery.pot,
        }
    }

    /// Move `amount` between two distinct accounts.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SelfTransfer`] if both sides are the same account,
    /// [`LedgerError::InsufficientFunds`] if the source cannot cover the
    /// amount. Neither balance changes on error.
    pub fn transfer(
        &mut self,
        from: &AccountRef,
        to: &AccountRef,
        amount: Points,
    ) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer {
                account: from.clone(),
            });
        }
        let available = self.balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        self.account_mut(from).sub(amount);
        self.account_mut(to).add(amount);
        tracing::info!(%from, %to, amount = %amount, "points transferred");
        Ok(())
    }

    /// Bill `price` to a user and credit the bank. Saturating on both
    /// sides.
    pub fn bill(&mut self, user: &UserId, price: Points) {
        self.user_mut(user).sub(price);
        self.bank.add(price);
        tracing::debug!(user = %user, price = %price, bank = %self.bank.points, "command billed");
    }

    /// Sum of every balance: users, bank and pot.
    pub fn total_supply(&self) -> u128 {
        total_supply(
            self.users
                .iter()
                .map(|u| u.points)
                .chain([self.bank.points, self.bank.lottery.pot]),
        )
    }

    /// Resolve an account by name: `bank`, `pot`, or a platform user name.
    ///
    /// `Ok(None)` means no such user exists.
    pub fn account_by_name(
        &self,
        platform: &dyn ChatPlatform,
        name: &str,
    ) -> Result<Option<AccountRef>, PlatformError> {
        if let Some(reserved) = AccountRef::reserved(name) {
            return Ok(Some(reserved));
        }
        Ok(platform
            .find_user_by_name(name)?
            .map(|u| AccountRef::User(u.id)))
    }

    /// Sell lottery tickets to `buyer` from their wallet.
    pub fn buy_tickets(
        &mut self,
        buyer: &UserId,
        request: TicketRequest,
    ) -> Result<Purchase, PurchaseError> {
        let default_level = self.default_level;
        let wallet = self.users.get_or_create(buyer, default_level);
        self.bank.buy_tickets(buyer, wallet, request)
    }

    /// Run one draw attempt and pay any winner.
    pub fn draw_lottery(&mut self, now: DateTime<Utc>, source: &mut dyn TicketDraw) -> DrawReport {
        let report = self.bank.draw(now, source);
        if let DrawOutcome::Won { winner, payout, .. } = &report.outcome {
            self.user_mut(winner).add(*payout);
        }
        report
    }
}
