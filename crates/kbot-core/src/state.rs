use tokio::sync::Mutex;

use crate::{admin::AdminSet, domain::UserId, quota::QuotaBook};

/// Process-wide mutable bot state.
///
/// Built once at startup and handed to the router behind an `Arc`. Each field
/// has its own lock; every quota operation completes inside one acquisition so
/// the reset-then-increment sequence cannot interleave.
pub struct BotState {
    pub quotas: Mutex<QuotaBook>,
    pub admins: Mutex<AdminSet>,
}

impl BotState {
    pub fn new(daily_limit: u32, seed_admin: UserId) -> Self {
        Self {
            quotas: Mutex::new(QuotaBook::new(daily_limit)),
            admins: Mutex::new(AdminSet::new(seed_admin)),
        }
    }
}
