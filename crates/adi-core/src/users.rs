//! The user registry.
//!
//! Users are keyed by the platform's opaque identifier and created lazily
//! on first reference with the process-wide default level and zero points.
//! Records are never deleted.

use std::collections::BTreeMap;

use adi_ledger::{Account, Level, Points, UserId};
use serde::{Deserialize, Serialize};

/// A user's standing in the economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Platform identifier.
    pub id: UserId,
    /// Permission rank.
    pub level: Level,
    /// Wallet balance.
    pub points: Points,
}

impl User {
    /// A fresh user with zero points.
    pub const fn new(id: UserId, level: Level) -> Self {
        Self {
            id,
            level,
            points: Points::ZERO,
        }
    }
}

impl Account for User {
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

/// All known users, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRegistry {
    users: BTreeMap<UserId, User>,
}

impl UserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a persisted user list.
    ///
    /// A later record for the same id replaces an earlier one.
    pub fn from_users(users: Vec<User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self { users }
    }

    /// Return the user with this id, creating it at `default_level` with
    /// zero points if absent.
    ///
    /// Repeated calls with the same id return the same record.
    pub fn get_or_create(&mut self, id: &UserId, default_level: Level) -> &mut User {
        self.users.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(user = %id, level = %default_level, "user created");
            User::new(id.clone(), default_level)
        })
    }

    /// Look up a user without creating it.
    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Mutable lookup without creating.
    pub fn get_mut(&mut self, id: &UserId) -> Option<&mut User> {
        self.users.get_mut(id)
    }

    /// Iterate over all users in id order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users ordered by points, richest first. Ties keep id order.
    pub fn ranked(&self) -> Vec<&User> {
        let mut ranked: Vec<&User> = self.users.values().collect();
        ranked.sort_by(|a, b| b.points.cmp(&a.points));
        ranked
    }

    /// Snapshot for persistence.
    pub fn to_vec(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_record() {
        let mut users = UserRegistry::new();
        let id = UserId::from("U1");
        users.get_or_create(&id, Level::new(3)).add(Points::new(7));
        let again = users.get_or_create(&id, Level::new(9));
        assert_eq!(again.points, Points::new(7));
        assert_eq!(again.level, Level::new(3));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn new_users_start_with_zero_points() {
        let mut users = UserRegistry::new();
        let user = users.get_or_create(&UserId::from("U2"), Level::new(1));
        assert_eq!(user.points, Points::ZERO);
        assert_eq!(user.level, Level::new(1));
    }

    #[test]
    fn ranked_is_descending_by_points() {
        let users = UserRegistry::from_users(vec![
            User {
                id: UserId::from("A"),
                level: Level::default(),
                points: Points::new(5),
            },
            User {
                id: UserId::from("B"),
                level: Level::default(),
                points: Points::new(50),
            },
            User {
                id: UserId::from("C"),
                level: Level::default(),
                points: Points::new(5),
            },
        ]);
        let order: Vec<&str> = users.ranked().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn user_account_saturates() {
        let mut user = User::new(UserId::from("U1"), Level::default());
        user.sub(Points::new(1));
        assert_eq!(user.balance(), Points::ZERO);
    }
}
