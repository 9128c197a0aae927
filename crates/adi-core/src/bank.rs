//! The bank and the lottery engine.
//!
//! The bank is the house account: every command charge lands here, and it
//! funds the salary trickle and the lottery top-up. The lottery sells
//! tickets into a pot and periodically draws a winner with odds
//! proportional to ticket count.
//!
//! # Draw policy
//!
//! A draw runs once `last_draw + draw_every` has passed:
//!
//! 1. No tickets sold: only `last_draw` advances.
//! 2. At least two holders: each holder gets a contiguous half-open range
//!    of ticket indices in id order, a uniform index in `[0, sold)` picks
//!    the winner, who receives the whole pot. Tickets and pot reset.
//! 3. A single holder: tickets and pot carry over.
//!
//! In cases 2 and 3 the bank then moves `invest` into the pot if it holds
//! strictly more than `invest`. `last_draw` advances to now.

use std::collections::BTreeMap;
use std::time::Duration;

use adi_ledger::{Account, Points, UserId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The global house account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    /// House balance.
    pub points: Points,
    /// Lottery state.
    #[serde(default)]
    pub lottery: Lottery,
}

impl Account for Bank {
    fn balance(&self) -> Points {
        self.points
    }

    fn add(&mut self, amount: Points) {
        self.points.add(amount);
    }

    fn sub(&mut self, amount: Points) {
        self.points.sub(amount);
    }
}

/// Lottery state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lottery {
    /// Prize accumulator.
    pub pot: Points,
    /// When the last draw period ended.
    pub last_draw: DateTime<Utc>,
    /// Length of a draw period.
    #[serde(with = "duration_secs")]
    pub draw_every: Duration,
    /// Tickets sold since the last payout.
    pub tickets_sold: u64,
    /// Tickets per holder since the last payout.
    #[serde(default)]
    pub tickets: BTreeMap<UserId, u64>,
    /// Points moved from the bank into the pot each period.
    pub invest: Points,
    /// Price of one ticket.
    pub ticket_price: Points,
}

impl Default for Lottery {
    fn default() -> Self {
        Self {
            pot: Points::ZERO,
            last_draw: DateTime::<Utc>::default(),
            draw_every: Duration::from_secs(24 * 60 * 60),
            tickets_sold: 0,
            tickets: BTreeMap::new(),
            invest: Points::ZERO,
            ticket_price: Points::new(1),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Draw source
// ---------------------------------------------------------------------------

/// Source of the winning ticket index.
pub trait TicketDraw {
    /// A uniform index in `[0, total)`. `total` is never zero.
    fn draw(&mut self, total: u64) -> u64;
}

/// Draws from any [`Rng`]. Production wraps `rand::rng()`.
#[derive(Debug)]
pub struct RngDraw<R>(pub R);

impl<R: Rng> TicketDraw for RngDraw<R> {
    fn draw(&mut self, total: u64) -> u64 {
        self.0.random_range(0..total)
    }
}

/// A holder's slice of the ticket index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRange {
    /// Ticket holder.
    pub holder: UserId,
    /// First index, inclusive.
    pub start: u64,
    /// Last index, exclusive.
    pub end: u64,
}

impl TicketRange {
    /// Whether `index` falls in this range.
    pub const fn contains(&self, index: u64) -> bool {
        self.start <= index && index < self.end
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What a draw attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The period has not elapsed.
    NotDue,
    /// Nobody bought a ticket this period.
    NoTickets,
    /// Only one holder; tickets and pot carried over.
    CarriedOver {
        /// Tickets carried over.
        tickets: u64,
    },
    /// A winner was paid.
    Won {
        /// The winning holder.
        winner: UserId,
        /// The pot paid out.
        payout: Points,
        /// The winner's ticket count.
        tickets: u64,
    },
}

/// The result of one draw attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawReport {
    /// What happened to the tickets.
    pub outcome: DrawOutcome,
    /// Points the bank moved into the pot.
    pub invested: Points,
}

/// How many tickets to buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketRequest {
    /// As many as the balance covers.
    All,
    /// Exactly this many.
    Count(u64),
}

/// A completed purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchase {
    /// Tickets bought.
    pub tickets: u64,
    /// Points paid.
    pub cost: Points,
}

/// Reasons a ticket purchase is refused. No state changes on refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseError {
    /// The buyer cannot afford the tickets.
    #[error("not enough points")]
    NotEnoughPoints,

    /// A count of zero was requested.
    #[error("at least one ticket is required")]
    ZeroTickets,

    /// The cost or a ticket counter would overflow.
    #[error("ticket count overflows")]
    TooMany,

    /// The lottery has no ticket price configured.
    #[error("ticket price is zero")]
    NoTicketPrice,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Lottery {
    /// When the next draw becomes due.
    pub fn next_draw(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.draw_every)
            .ok()
            .and_then(|d| self.last_draw.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether a draw is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_draw()
    }

    /// Number of distinct ticket holders.
    pub fn holders(&self) -> usize {
        self.tickets.values().filter(|&&n| n > 0).count()
    }

    /// Assign each holder a contiguous range in id order.
    pub fn ranges(&self) -> Vec<TicketRange> {
        let mut offset = 0u64;
        self.tickets
            .iter()
            .filter(|&(_, &n)| n > 0)
            .map(|(holder, &n)| {
                let start = offset;
                offset = offset.saturating_add(n);
                TicketRange {
                    holder: holder.clone(),
                    start,
                    end: offset,
                }
            })
            .collect()
    }

    /// Validate a purchase for a buyer holding `balance` without mutating.
    ///
    /// Checks the cost multiplication, the global counter and the buyer's
    /// counter for overflow before affordability.
    pub fn quote(
        &self,
        buyer: &UserId,
        balance: Points,
        request: TicketRequest,
    ) -> Result<Purchase, PurchaseError> {
        if self.ticket_price.is_zero() {
            return Err(PurchaseError::NoTicketPrice);
        }
        let tickets = match request {
            TicketRequest::All => {
                if balance < self.ticket_price {
                    return Err(PurchaseError::NotEnoughPoints);
                }
                balance
                    .checked_div(self.ticket_price)
                    .ok_or(PurchaseError::NoTicketPrice)?
            }
            TicketRequest::Count(0) => return Err(PurchaseError::ZeroTickets),
            TicketRequest::Count(n) => n,
        };

        let cost = self
            .ticket_price
            .checked_mul(tickets)
            .ok_or(PurchaseError::TooMany)?;
        if self.tickets_sold.checked_add(tickets).is_none() {
            return Err(PurchaseError::TooMany);
        }
        let held = self.tickets.get(buyer).copied().unwrap_or(0);
        if held.checked_add(tickets).is_none() {
            return Err(PurchaseError::TooMany);
        }
        if cost > balance {
            return Err(PurchaseError::NotEnoughPoints);
        }
        Ok(Purchase { tickets, cost })
    }

    /// Record a validated purchase: count the tickets and fill the pot.
    /// The caller debits the buyer.
    fn record(&mut self, buyer: &UserId, purchase: Purchase) {
        let held = self.tickets.entry(buyer.clone()).or_insert(0);
        *held = held.saturating_add(purchase.tickets);
        self.tickets_sold = self.tickets_sold.saturating_add(purchase.tickets);
        self.pot.add(purchase.cost);
    }
}

impl Bank {
    /// Sell tickets to `buyer`, debiting `wallet` and crediting the pot.
    ///
    /// Nothing changes unless the purchase succeeds.
    pub fn buy_tickets(
        &mut self,
        buyer: &UserId,
        wallet: &mut dyn Account,
        request: TicketRequest,
    ) -> Result<Purchase, PurchaseError> {
        let purchase = self.lottery.quote(buyer, wallet.balance(), request)?;
        wallet.sub(purchase.cost);
        self.lottery.record(buyer, purchase);
        tracing::info!(
            user = %buyer,
            tickets = purchase.tickets,
            cost = %purchase.cost,
            pot = %self.lottery.pot,
            "lottery tickets sold"
        );
        Ok(purchase)
    }

    /// Run one draw attempt at `now`.
    ///
    /// The caller credits `payout` to the winner (see
    /// [`BotState::draw_lottery`](crate::state::BotState::draw_lottery)).
    pub fn draw(&mut self, now: DateTime<Utc>, source: &mut dyn TicketDraw) -> DrawReport {
        let lot = &mut self.lottery;
        if !lot.is_due(now) {
            return DrawReport {
                outcome: DrawOutcome::NotDue,
                invested: Points::ZERO,
            };
        }
        if lot.tickets_sold == 0 {
            lot.last_draw = now;
            tracing::debug!("lottery period ended without tickets");
            return DrawReport {
                outcome: DrawOutcome::NoTickets,
                invested: Points::ZERO,
            };
        }

        let outcome = if lot.holders() >= 2 {
            let ranges = lot.ranges();
            let total = ranges.last().map_or(0, |r| r.end);
            let index = source.draw(total);
            match ranges.into_iter().find(|r| r.contains(index)) {
                Some(range) => {
                    let payout = lot.pot;
                    lot.pot = Points::ZERO;
                    lot.tickets_sold = 0;
                    lot.tickets.clear();
                    tracing::info!(
                        winner = %range.holder,
                        payout = %payout,
                        index,
                        total,
                        "lottery drawn"
                    );
                    DrawOutcome::Won {
                        tickets: range.end.saturating_sub(range.start),
                        winner: range.holder,
                        payout,
                    }
                }
                None => {
                    tracing::warn!(index, total, "draw index outside ticket ranges");
                    DrawOutcome::CarriedOver {
                        tickets: lot.tickets_sold,
                    }
                }
            }
        } else {
            tracing::info!(tickets = lot.tickets_sold, "single lottery holder, carrying over");
            DrawOutcome::CarriedOver {
                tickets: lot.tickets_sold,
            }
        };

        let invest = lot.invest;
        let invested = if self.points > invest {
            self.points.sub(invest);
            self.lottery.pot.add(invest);
            invest
        } else {
            Points::ZERO
        };
        self.lottery.last_draw = now;

        DrawReport { outcome, invested }
    }
}
