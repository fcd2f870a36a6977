//! Per-chat daily message quotas.
//!
//! A chat's counter is zeroed the first time it is touched on a new calendar day
//! and otherwise only grows. Only granted Questions increment it.

use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::ChatId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatQuotaRecord {
    pub chat_id: ChatId,
    pub messages_today: u32,
    pub last_reset_date: NaiveDate,
}

impl ChatQuotaRecord {
    fn new(chat_id: ChatId, today: NaiveDate) -> Self {
        Self {
            chat_id,
            messages_today: 0,
            last_reset_date: today,
        }
    }

    fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.last_reset_date < today {
            self.messages_today = 0;
            self.last_reset_date = today;
            return true;
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The Question may proceed; `used` already includes it.
    Granted { used: u32 },
    /// The chat hit its daily cap; nothing was incremented.
    Exhausted { limit: u32 },
}

/// Quota records for every chat seen by this process.
#[derive(Clone, Debug)]
pub struct QuotaBook {
    daily_limit: u32,
    records: HashMap<ChatId, ChatQuotaRecord>,
}

impl QuotaBook {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit: daily_limit.max(1),
            records: HashMap::new(),
        }
    }

    /// Rebuild a book from records produced by [`QuotaBook::snapshot`].
    pub fn restore(daily_limit: u32, records: impl IntoIterator<Item = ChatQuotaRecord>) -> Self {
        let mut book = Self::new(daily_limit);
        for r in records {
            book.records.insert(r.chat_id, r);
        }
        book
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// Lazily create the chat's record and zero it if `today` is a new day.
    pub fn roll_over_at(&mut self, chat_id: ChatId, today: NaiveDate) -> &ChatQuotaRecord {
        self.record_mut(chat_id, today)
    }

    /// Reset-if-new-day, limit check and increment as a single step.
    pub fn try_consume_at(&mut self, chat_id: ChatId, today: NaiveDate) -> QuotaDecision {
        let limit = self.daily_limit;
        let rec = self.record_mut(chat_id, today);
        if rec.messages_today >= limit {
            return QuotaDecision::Exhausted { limit };
        }
        rec.messages_today += 1;
        QuotaDecision::Granted {
            used: rec.messages_today,
        }
    }

    fn record_mut(&mut self, chat_id: ChatId, today: NaiveDate) -> &mut ChatQuotaRecord {
        let rec = self
            .records
            .entry(chat_id)
            .or_insert_with(|| ChatQuotaRecord::new(chat_id, today));
        if rec.roll_over(today) {
            tracing::debug!(chat_id = chat_id.0, %today, "daily quota reset");
        }
        rec
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&ChatQuotaRecord> {
        self.records.get(&chat_id)
    }

    /// All records, ordered by chat id.
    pub fn snapshot(&self) -> Vec<ChatQuotaRecord> {
        let mut out: Vec<ChatQuotaRecord> = self.records.values().cloned().collect();
        out.sort_by_key(|r| r.chat_id);
        out
    }
}
