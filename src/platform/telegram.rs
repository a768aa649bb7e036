use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, ReplyParameters,
};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use crate::bot::{handle_callback_data, handle_cancel, handle_incoming, handle_start, AppState};
use crate::config::MessagesConfig;
use crate::platform::{Content, IncomingMessage, Messenger, Sender};
use crate::relay::Mode;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "задать вопрос")]
    Start,
    #[command(description = "отменить отправку вопроса")]
    Cancel,
}

/// The two-button menu, one button per row
pub fn mode_keyboard(messages: &MessagesConfig) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            messages.anonymous_button.clone(),
            Mode::Anonymous.callback_data(),
        )],
        vec![InlineKeyboardButton::callback(
            messages.open_button.clone(),
            Mode::Open.callback_data(),
        )],
    ])
}

/// Telegram rejects messages over 4096 characters; stay below that in bytes
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Split long messages for Telegram's 4096 char limit
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    split_chunks(text, max_len, false)
}

/// Like [`split_message`], but never cuts through an HTML entity such as `&amp;`
pub fn split_html(text: &str, max_len: usize) -> Vec<String> {
    split_chunks(text, max_len, true)
}

fn split_chunks(text: &str, max_len: usize, html: bool) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }

        let mut actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        if html && actual_end < text.len() {
            let window = &text[start..actual_end];
            if let Some(amp) = window.rfind('&') {
                if amp > 0 && !window[amp..].contains(';') {
                    actual_end = start + amp;
                }
            }
        }

        let chunk = &text[start..actual_end];
        // Telegram refuses blank messages
        if !chunk.trim().is_empty() {
            chunks.push(chunk.to_string());
        }
        start = actual_end;
    }

    chunks
}

/// [`Messenger`] over the Telegram Bot API
pub struct TelegramMessenger {
    bot: Bot,
    menu: InlineKeyboardMarkup,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, messages: &MessagesConfig) -> Self {
        Self {
            bot,
            menu: mode_keyboard(messages),
        }
    }

    /// Send `chunks` in order. The first one may reply to a message,
    /// the last one carries the menu.
    async fn send_chunks(
        &self,
        chat: ChatId,
        chunks: Vec<String>,
        html: bool,
        reply_to: Option<MessageId>,
        with_menu: bool,
    ) -> Result<Vec<MessageId>> {
        let last = chunks.len().saturating_sub(1);
        let mut ids = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = self.bot.send_message(chat, chunk);
            if html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let (0, Some(id)) = (i, reply_to) {
                request = request.reply_parameters(ReplyParameters::new(id));
            }
            if with_menu && i == last {
                request = request.reply_markup(self.menu.clone());
            }
            ids.push(request.await?.id);
        }

        Ok(ids)
    }
}

fn first(ids: Vec<MessageId>) -> Result<MessageId> {
    ids.first()
        .copied()
        .context("Nothing was sent: the text is blank")
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        first(self.send_chunks(chat, chunks, false, None, false).await?)
    }

    async fn send_html(&self, chat: ChatId, html: &str) -> Result<Vec<MessageId>> {
        let chunks = split_html(html, MAX_MESSAGE_LEN);
        self.send_chunks(chat, chunks, true, None, false).await
    }

    async fn send_menu(&self, chat: ChatId, text: &str) -> Result<MessageId> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        first(self.send_chunks(chat, chunks, false, None, true).await?)
    }

    async fn reply_text(&self, chat: ChatId, reply_to: MessageId, text: &str) -> Result<()> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        self.send_chunks(chat, chunks, false, Some(reply_to), false)
            .await?;
        Ok(())
    }

    async fn copy_to(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId> {
        let copied = self.bot.copy_message(to, from, message_id).await?;
        Ok(copied)
    }
}

/// Decide what a message carries. Blank text counts as nothing.
fn classify(text: Option<&str>, has_media: bool) -> Content {
    match text {
        Some(t) if !t.trim().is_empty() => Content::Text(t.to_string()),
        Some(_) => Content::Empty,
        None if has_media => Content::Media,
        None => Content::Empty,
    }
}

fn has_media(msg: &Message) -> bool {
    msg.photo().is_some()
        || msg.video().is_some()
        || msg.document().is_some()
        || msg.voice().is_some()
        || msg.audio().is_some()
        || msg.video_note().is_some()
        || msg.animation().is_some()
}

fn to_incoming(msg: &Message) -> Option<IncomingMessage> {
    let user = msg.from.as_ref()?;
    Some(IncomingMessage {
        chat_id: msg.chat.id,
        message_id: msg.id,
        sender: Sender {
            id: user.id,
            full_name: user.full_name(),
            username: user.username.clone(),
        },
        content: classify(msg.text(), has_media(msg)),
        reply_to: msg.reply_to_message().map(|r| r.id),
    })
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(dptree::endpoint(handle_message)),
        )
}

/// Run the Telegram dispatcher until Ctrl-C
pub async fn run(state: Arc<AppState>, bot: Bot) -> Result<()> {
    bot.set_my_commands(Command::bot_commands())
        .await
        .context("Failed to register bot commands")?;

    let messenger = Arc::new(TelegramMessenger::new(bot.clone(), &state.config.messages));

    info!("Starting Telegram platform...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, messenger])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    messenger: Arc<TelegramMessenger>,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let result = match cmd {
        Command::Start => handle_start(messenger.as_ref(), &state, msg.chat.id).await,
        Command::Cancel => handle_cancel(messenger.as_ref(), &state, user.id, msg.chat.id).await,
    };
    if let Err(e) = result {
        error!("Failed to handle {:?} from {}: {:#}", cmd, user.id.0, e);
    }
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    messenger: Arc<TelegramMessenger>,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    if let Err(e) =
        handle_callback_data(messenger.as_ref(), &state, q.from.id, chat, q.data.as_deref()).await
    {
        error!("Failed to handle menu choice from {}: {:#}", q.from.id.0, e);
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn handle_message(
    msg: Message,
    messenger: Arc<TelegramMessenger>,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(incoming) = to_incoming(&msg) else {
        return Ok(());
    };

    if let Err(e) = handle_incoming(messenger.as_ref(), &state, &incoming).await {
        error!(
            "Error handling message from {}: {:#}",
            incoming.sender.id.0, e
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Some("Question"), false),
            Content::Text("Question".to_string())
        );
        assert_eq!(classify(Some("   \n"), false), Content::Empty);
        assert_eq!(classify(None, true), Content::Media);
        assert_eq!(classify(None, false), Content::Empty);
    }

    #[test]
    fn test_mode_keyboard_has_one_button_per_row() {
        let keyboard = mode_keyboard(&MessagesConfig::default());
        let rows = &keyboard.inline_keyboard;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 1));

        assert_eq!(rows[0][0].text, "📩 Анонимно");
        assert!(matches!(
            &rows[0][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "ask_anon"
        ));
        assert_eq!(rows[1][0].text, "✉️ Открыто");
        assert!(matches!(
            &rows[1][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "ask_open"
        ));
    }

    #[test]
    fn test_split_message_short_text_is_untouched() {
        assert_eq!(split_message("short", 4000), vec!["short".to_string()]);
    }

    #[test]
    fn test_split_message_prefers_newlines_and_spaces() {
        let chunks = split_message("first line\nsecond line here", 15);
        assert_eq!(chunks, vec!["first line\n", "second line ", "here"]);
        assert!(chunks.iter().all(|c| c.len() <= 15));
    }

    #[test]
    fn test_split_message_respects_char_boundaries() {
        let text = "вопрос".repeat(1000);
        let chunks = split_message(&text, MAX_MESSAGE_LEN);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_html_keeps_entities_whole() {
        let text = format!("{}&lt;{}", "a".repeat(8), "b".repeat(8));
        let chunks = split_html(&text, 10);
        assert!(chunks.iter().all(|c| !c.ends_with('&') && !c.ends_with("&l")));
        assert_eq!(chunks[1].get(..4), Some("&lt;"));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_long_question_fits_in_telegram_messages() {
        let header = "✉️ <b>Вопрос от Yusuf (@yusuf):</b>";
        let body = "слово ".repeat(700);
        let html = format!("{header}\n\n{body}");
        assert!(html.len() > MAX_MESSAGE_LEN);

        let chunks = split_html(&html, MAX_MESSAGE_LEN);
        assert!(chunks.len() > 1);
        assert!(chunks[0].starts_with(header));
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LEN));
    }

    #[test]
    fn test_commands_parse() {
        assert!(matches!(
            Command::parse("/start", "askrelay_bot"),
            Ok(Command::Start)
        ));
        assert!(matches!(
            Command::parse("/cancel", "askrelay_bot"),
            Ok(Command::Cancel)
        ));
        assert!(Command::parse("/unknown", "askrelay_bot").is_err());
    }
}
