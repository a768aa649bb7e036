pub mod render;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use teloxide::types::{ChatId, MessageId, UserId};
use tokio::sync::Mutex;

pub const CALLBACK_ANONYMOUS: &str = "ask_anon";
pub const CALLBACK_OPEN: &str = "ask_open";

/// How a question is presented to the administrators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Anonymous,
    Open,
}

impl Mode {
    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            CALLBACK_ANONYMOUS => Some(Mode::Anonymous),
            CALLBACK_OPEN => Some(Mode::Open),
            _ => None,
        }
    }

    pub fn callback_data(self) -> &'static str {
        match self {
            Mode::Anonymous => CALLBACK_ANONYMOUS,
            Mode::Open => CALLBACK_OPEN,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Anonymous => write!(f, "anonymous"),
            Mode::Open => write!(f, "open"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingChoice {
    mode: Mode,
    chosen_at: DateTime<Utc>,
}

/// A forwarded copy of a question, identified by the admin chat it landed in.
/// Message ids are only unique within one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    pub admin_chat: ChatId,
    pub message_id: MessageId,
}

/// Who gets the answer to a forwarded question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTarget {
    pub asker: UserId,
    pub mode: Mode,
    pub asked_at: DateTime<Utc>,
}

/// In-memory correlation tables: the menu choice waiting for each user's next
/// message, and the forwarded copies waiting for an administrator's reply.
#[derive(Default)]
pub struct RelayState {
    choices: Mutex<HashMap<UserId, PendingChoice>>,
    questions: Mutex<HashMap<QuestionKey, QuestionTarget>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the mode for the user's next message, replacing any earlier choice
    pub async fn choose(&self, user: UserId, mode: Mode) {
        self.choices.lock().await.insert(
            user,
            PendingChoice {
                mode,
                chosen_at: Utc::now(),
            },
        );
    }

    pub async fn take_choice(&self, user: UserId) -> Option<Mode> {
        self.choices.lock().await.remove(&user).map(|c| c.mode)
    }

    pub async fn restore_choice(&self, user: UserId, mode: Mode) {
        self.choose(user, mode).await;
    }

    pub async fn cancel(&self, user: UserId) -> bool {
        self.choices.lock().await.remove(&user).is_some()
    }

    pub async fn record_question(&self, key: QuestionKey, target: QuestionTarget) {
        self.questions.lock().await.insert(key, target);
    }

    /// Remove and return the target; each forwarded copy is answered once.
    pub async fn take_question(&self, key: QuestionKey) -> Option<QuestionTarget> {
        self.questions.lock().await.remove(&key)
    }

    pub async fn restore_question(&self, key: QuestionKey, target: QuestionTarget) {
        self.questions.lock().await.entry(key).or_insert(target);
    }

    /// Drop entries older than their TTL. A zero TTL never expires.
    /// Returns the number of removed choices and questions.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        choice_ttl: Duration,
        question_ttl: Duration,
    ) -> (usize, usize) {
        let removed_choices = if choice_ttl.is_zero() {
            0
        } else {
            let mut choices = self.choices.lock().await;
            let before = choices.len();
            choices.retain(|_, c| now - c.chosen_at < choice_ttl);
            before - choices.len()
        };

        let removed_questions = if question_ttl.is_zero() {
            0
        } else {
            let mut questions = self.questions.lock().await;
            let before = questions.len();
            questions.retain(|_, q| now - q.asked_at < question_ttl);
            before - questions.len()
        };

        (removed_choices, removed_questions)
    }

    pub async fn counts(&self) -> (usize, usize) {
        let choices = self.choices.lock().await.len();
        let questions = self.questions.lock().await.len();
        (choices, questions)
    }
}
