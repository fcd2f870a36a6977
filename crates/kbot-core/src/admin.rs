use std::collections::HashSet;

use crate::domain::UserId;

/// Users allowed to run privileged commands.
///
/// Seeded with one admin at startup and only grows (no removal path).
#[derive(Clone, Debug)]
pub struct AdminSet {
    admins: HashSet<UserId>,
}

impl AdminSet {
    pub fn new(seed: UserId) -> Self {
        Self {
            admins: HashSet::from([seed]),
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    /// Returns `false` if the user was already an admin.
    pub fn add(&mut self, user_id: UserId) -> bool {
        self.admins.insert(user_id)
    }

}
