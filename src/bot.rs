use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use teloxide::types::{ChatId, MessageId, UserId};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::platform::{Content, IncomingMessage, Messenger};
use crate::relay::{render, Mode, QuestionKey, QuestionTarget, RelayState};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub relay: RelayState,
    /// The bot's own account, so it never relays itself
    pub bot_id: UserId,
}

impl AppState {
    pub fn new(config: Config, bot_id: UserId) -> Self {
        Self {
            config,
            relay: RelayState::new(),
            bot_id,
        }
    }

    fn admin_chats(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.config
            .telegram
            .admin_ids
            .iter()
            .map(|&id| ChatId::from(UserId(id)))
    }
}

/// /start: greet and show the menu
pub async fn handle_start(messenger: &dyn Messenger, state: &AppState, chat: ChatId) -> Result<()> {
    messenger
        .send_menu(chat, &state.config.messages.greeting)
        .await?;
    Ok(())
}

/// /cancel: forget the pending menu choice
pub async fn handle_cancel(
    messenger: &dyn Messenger,
    state: &AppState,
    user: UserId,
    chat: ChatId,
) -> Result<()> {
    let text = if state.relay.cancel(user).await {
        &state.config.messages.cancelled
    } else {
        &state.config.messages.nothing_to_cancel
    };
    messenger.send_text(chat, text).await?;
    Ok(())
}

/// A menu button was pressed
pub async fn handle_mode_choice(
    messenger: &dyn Messenger,
    state: &AppState,
    user: UserId,
    chat: ChatId,
    mode: Mode,
) -> Result<()> {
    state.relay.choose(user, mode).await;
    debug!("User {} chose {} mode", user.0, mode);
    messenger.send_text(chat, render::mode_prompt(mode)).await?;
    Ok(())
}

/// A button was pressed. Data that is not a menu choice is ignored.
pub async fn handle_callback_data(
    messenger: &dyn Messenger,
    state: &AppState,
    user: UserId,
    chat: ChatId,
    data: Option<&str>,
) -> Result<()> {
    match data.and_then(Mode::from_callback_data) {
        Some(mode) => handle_mode_choice(messenger, state, user, chat, mode).await,
        None => {
            debug!("Ignoring callback data {:?} from {}", data, user.0);
            Ok(())
        }
    }
}

/// Any other message: an administrator's answer, a question, or a stray message
pub async fn handle_incoming(
    messenger: &dyn Messenger,
    state: &AppState,
    msg: &IncomingMessage,
) -> Result<()> {
    if msg.sender.id == state.bot_id {
        return Ok(());
    }

    if msg.content == Content::Empty {
        messenger
            .send_text(msg.chat_id, &state.config.messages.empty_question)
            .await?;
        return Ok(());
    }

    if let Some(reply_to) = msg.reply_to {
        if state.config.is_admin(msg.sender.id.0) {
            return deliver_answer(messenger, state, msg, reply_to).await;
        }
    }

    match state.relay.take_choice(msg.sender.id).await {
        Some(mode) => forward_question(messenger, state, msg, mode).await,
        None => {
            messenger
                .send_text(msg.chat_id, &state.config.messages.choose_mode_first)
                .await?;
            Ok(())
        }
    }
}

async fn forward_question(
    messenger: &dyn Messenger,
    state: &AppState,
    msg: &IncomingMessage,
    mode: Mode,
) -> Result<()> {
    let target = QuestionTarget {
        asker: msg.sender.id,
        mode,
        asked_at: Utc::now(),
    };

    let deliveries = state
        .admin_chats()
        .map(|admin| async move {
            match forward_to_admin(messenger, state, msg, mode, admin, target).await {
                Ok(()) => {
                    info!(
                        "Question from {} forwarded to admin {}",
                        msg.sender.id.0, admin.0
                    );
                    true
                }
                Err(e) => {
                    error!("Failed to forward question to admin {}: {:#}", admin.0, e);
                    false
                }
            }
        });
    let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();

    if delivered == 0 {
        state.relay.restore_choice(msg.sender.id, mode).await;
        messenger
            .send_text(msg.chat_id, &state.config.messages.question_not_delivered)
            .await?;
        return Ok(());
    }

    messenger
        .send_menu(msg.chat_id, &state.config.messages.question_sent)
        .await?;
    Ok(())
}

async fn forward_to_admin(
    messenger: &dyn Messenger,
    state: &AppState,
    msg: &IncomingMessage,
    mode: Mode,
    admin: ChatId,
    target: QuestionTarget,
) -> Result<()> {
    // Nothing is recorded until every part reached the admin, so a half-sent
    // question can't be answered.
    let sent = match &msg.content {
        Content::Text(text) => {
            let html = render::text_question(mode, &msg.sender, text);
            messenger.send_html(admin, &html).await?
        }
        Content::Media => {
            let header = render::question_header(mode, &msg.sender);
            let mut sent = messenger.send_html(admin, &header).await?;
            let copied = messenger
                .copy_to(admin, msg.chat_id, msg.message_id)
                .await?;
            sent.push(copied);
            sent
        }
        Content::Empty => Vec::new(),
    };

    for message_id in sent {
        let key = QuestionKey {
            admin_chat: admin,
            message_id,
        };
        state.relay.record_question(key, target).await;
    }
    Ok(())
}

async fn deliver_answer(
    messenger: &dyn Messenger,
    state: &AppState,
    msg: &IncomingMessage,
    reply_to: MessageId,
) -> Result<()> {
    let key = QuestionKey {
        admin_chat: msg.chat_id,
        message_id: reply_to,
    };
    let Some(target) = state.relay.take_question(key).await else {
        debug!(
            "Admin {} replied to message {}, which is not an open question",
            msg.sender.id.0, reply_to.0
        );
        return Ok(());
    };

    match send_answer(messenger, state, msg, ChatId::from(target.asker)).await {
        Ok(()) => {
            info!(
                "Answer from admin {} delivered to {} ({} question)",
                msg.sender.id.0, target.asker.0, target.mode
            );
            messenger
                .reply_text(msg.chat_id, msg.message_id, &state.config.messages.answer_sent)
                .await?;
        }
        Err(e) => {
            error!("Failed to deliver answer to {}: {:#}", target.asker.0, e);
            state.relay.restore_question(key, target).await;
            messenger
                .reply_text(
                    msg.chat_id,
                    msg.message_id,
                    &state.config.messages.answer_not_delivered,
                )
                .await?;
        }
    }
    Ok(())
}

async fn send_answer(
    messenger: &dyn Messenger,
    state: &AppState,
    msg: &IncomingMessage,
    asker: ChatId,
) -> Result<()> {
    let prefix = &state.config.messages.answer_prefix;
    match &msg.content {
        Content::Text(text) => {
            messenger
                .send_text(asker, &render::answer(prefix, text))
                .await?;
        }
        Content::Media => {
            messenger.send_text(asker, prefix).await?;
            messenger
                .copy_to(asker, msg.chat_id, msg.message_id)
                .await?;
        }
        Content::Empty => {}
    }
    Ok(())
}
