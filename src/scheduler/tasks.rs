use chrono::{Duration, Utc};
use tracing::info;

use crate::bot::AppState;
use crate::config::RelayConfig;
use crate::scheduler::Scheduler;

const HEARTBEAT_CRON: &str = "0 0 * * * *";

// A thousand years; keeps `Duration::hours` far from overflowing
const MAX_TTL_HOURS: u64 = 24 * 365 * 1000;

fn hours(h: u64) -> Duration {
    Duration::hours(h.min(MAX_TTL_HOURS) as i64)
}

/// Expire stale entries from both correlation tables
pub async fn sweep_relay(state: &AppState, relay: &RelayConfig) -> (usize, usize) {
    let removed = state
        .relay
        .sweep(
            Utc::now(),
            hours(relay.choice_ttl_hours),
            hours(relay.question_ttl_hours),
        )
        .await;

    if removed != (0, 0) {
        info!(
            "Sweep: expired {} pending choice(s) and {} unanswered question(s)",
            removed.0, removed.1
        );
    }
    removed
}

/// Register the sweep and the hourly heartbeat
pub async fn register_builtin_tasks(scheduler: &Scheduler, relay: RelayConfig) -> anyhow::Result<()> {
    let sweep_cron = relay.sweep_cron.clone();
    scheduler
        .add_job(&sweep_cron, "relay-sweep", move |state| {
            let relay = relay.clone();
            Box::pin(async move {
                sweep_relay(&state, &relay).await;
            })
        })
        .await?;

    scheduler
        .add_job(HEARTBEAT_CRON, "heartbeat", |state| {
            Box::pin(async move {
                let (choices, questions) = state.relay.counts().await;
                info!(
                    "Heartbeat: {} pending choice(s), {} open question(s)",
                    choices, questions
                );
            })
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::relay::{Mode, QuestionKey, QuestionTarget};
    use teloxide::types::{ChatId, MessageId, UserId};

    fn state() -> AppState {
        let config =
            Config::from_toml("[telegram]\nbot_token = \"t\"\nadmin_ids = [1]\n").unwrap();
        AppState::new(config, UserId(999))
    }

    #[tokio::test]
    async fn test_sweep_uses_configured_ttls() {
        let state = state();
        let key = QuestionKey {
            admin_chat: ChatId(1),
            message_id: MessageId(10),
        };
        state
            .relay
            .record_question(
                key,
                QuestionTarget {
                    asker: UserId(5),
                    mode: Mode::Anonymous,
                    asked_at: Utc::now() - Duration::hours(48),
                },
            )
            .await;
        state.relay.choose(UserId(5), Mode::Open).await;

        let relay = RelayConfig {
            choice_ttl_hours: 24,
            question_ttl_hours: 24,
            ..RelayConfig::default()
        };
        assert_eq!(sweep_relay(&state, &relay).await, (0, 1));
        assert_eq!(state.relay.counts().await, (1, 0));
    }

    #[tokio::test]
    async fn test_sweep_disabled_with_zero_ttl() {
        let state = state();
        state
            .relay
            .record_question(
                QuestionKey {
                    admin_chat: ChatId(1),
                    message_id: MessageId(1),
                },
                QuestionTarget {
                    asker: UserId(5),
                    mode: Mode::Open,
                    asked_at: Utc::now() - Duration::days(400),
                },
            )
            .await;

        let relay = RelayConfig {
            choice_ttl_hours: 0,
            question_ttl_hours: 0,
            ..RelayConfig::default()
        };
        assert_eq!(sweep_relay(&state, &relay).await, (0, 0));
    }

    #[test]
    fn test_hours_saturates() {
        assert_eq!(hours(2), Duration::hours(2));
        assert_eq!(hours(u64::MAX), Duration::days(365 * 1000));
    }
}
