use html_escape::encode_text;

use crate::platform::Sender;
use crate::relay::Mode;

/// "Full Name (@username)", or just the name when there is no username
pub fn user_info(sender: &Sender) -> String {
    match &sender.username {
        Some(username) => format!("{} (@{})", sender.full_name, username),
        None => sender.full_name.clone(),
    }
}

/// HTML header shown to administrators above a question
pub fn question_header(mode: Mode, sender: &Sender) -> String {
    match mode {
        Mode::Anonymous => "📩 <b>Анонимный вопрос:</b>".to_string(),
        Mode::Open => format!("✉️ <b>Вопрос от {}:</b>", encode_text(&user_info(sender))),
    }
}

/// Full HTML text of a text question
pub fn text_question(mode: Mode, sender: &Sender, text: &str) -> String {
    format!("{}\n\n{}", question_header(mode, sender), encode_text(text))
}

/// Plain-text answer delivered back to the asker
pub fn answer(prefix: &str, text: &str) -> String {
    format!("{}\n{}", prefix, text)
}

pub fn mode_prompt(mode: Mode) -> &'static str {
    match mode {
        Mode::Anonymous => "Отправьте свой анонимный вопрос.",
        Mode::Open => "Отправьте свой открытый вопрос.",
    }
}
