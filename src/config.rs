use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub admin_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Hours a menu choice waits for its question. 0 keeps it forever.
    #[serde(default = "default_choice_ttl_hours")]
    pub choice_ttl_hours: u64,
    /// Hours a forwarded question stays answerable. 0 keeps it forever.
    #[serde(default = "default_question_ttl_hours")]
    pub question_ttl_hours: u64,
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            choice_ttl_hours: default_choice_ttl_hours(),
            question_ttl_hours: default_question_ttl_hours(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

/// User-facing texts. Every field can be overridden from the `[messages]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MessagesConfig {
    pub greeting: String,
    pub anonymous_button: String,
    pub open_button: String,
    pub empty_question: String,
    pub choose_mode_first: String,
    pub question_sent: String,
    pub question_not_delivered: String,
    pub answer_prefix: String,
    pub answer_sent: String,
    pub answer_not_delivered: String,
    pub cancelled: String,
    pub nothing_to_cancel: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            greeting: "Ассаляму алейкум ва рахматуллахи ва баракатуху ✨!\n\n\
                       Добро пожаловать в наш бот — место, где вы можете получить ответ \
                       на свой вопрос от уважаемых имамов и преподавателей.\n\n\
                       Выберите, как хотите отправить ваш вопрос:\n\
                       — 📩 Анонимно\n\
                       — ✉️ Открыто (с именем)\n\n\
                       Пусть Аллах сделает этот шаг благом для вас и уммы!"
                .to_string(),
            anonymous_button: "📩 Анонимно".to_string(),
            open_button: "✉️ Открыто".to_string(),
            empty_question: "Пожалуйста, напишите текст вопроса.".to_string(),
            choose_mode_first: "Пожалуйста, нажмите /start и выберите режим отправки вопроса."
                .to_string(),
            question_sent: "✅ Ваш вопрос отправлен. Ждите ответа.".to_string(),
            question_not_delivered:
                "⚠️ Не удалось отправить вопрос. Попробуйте ещё раз немного позже.".to_string(),
            answer_prefix: "📨 Ответ наставника:".to_string(),
            answer_sent: "✅ Ответ отправлен спрашивающему.".to_string(),
            answer_not_delivered:
                "⚠️ Не удалось доставить ответ. Можно ответить на вопрос ещё раз.".to_string(),
            cancelled: "Отправка вопроса отменена.".to_string(),
            nothing_to_cancel: "Нечего отменять. Нажмите /start, чтобы задать вопрос."
                .to_string(),
        }
    }
}

fn default_choice_ttl_hours() -> u64 {
    24
}

fn default_question_ttl_hours() -> u64 {
    24 * 7
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

/// Parse a comma-separated id list such as `"123, 456"`.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("Invalid admin id: {s:?}"))
        })
        .collect()
}

impl Config {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.telegram.admin_ids.contains(&user_id)
    }

    /// Load the TOML file, then apply `BOT_TOKEN` / `ADMIN_IDS` from the environment.
    /// A missing file is fine as long as the environment supplies both values.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            Self::from_toml("[telegram]\n")?
        };

        config.apply_overrides(
            std::env::var("BOT_TOKEN").ok(),
            std::env::var("ADMIN_IDS").ok(),
        )?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn apply_overrides(
        &mut self,
        bot_token: Option<String>,
        admin_ids: Option<String>,
    ) -> Result<()> {
        if let Some(token) = bot_token.filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(raw) = admin_ids.filter(|s| !s.trim().is_empty()) {
            self.telegram.admin_ids =
                parse_admin_ids(&raw).context("Failed to parse ADMIN_IDS")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("No bot token: set telegram.bot_token or BOT_TOKEN");
        }
        if self.telegram.admin_ids.is_empty() {
            bail!("No administrators: set telegram.admin_ids or ADMIN_IDS");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_ids = [42]
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.admin_ids, vec![42]);
        assert_eq!(config.relay.choice_ttl_hours, 24);
        assert_eq!(config.relay.question_ttl_hours, 168);
        assert_eq!(config.relay.sweep_cron, "0 */10 * * * *");
        assert_eq!(config.messages.answer_prefix, "📨 Ответ наставника:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_messages_table_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [telegram]
            bot_token = "t"
            admin_ids = [1]

            [messages]
            greeting = "Hello!"
            "#,
        )
        .unwrap();

        assert_eq!(config.messages.greeting, "Hello!");
        assert_eq!(config.messages.anonymous_button, "📩 Анонимно");
    }

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_admin_ids(" 7 ,").unwrap(), vec![7]);
        assert!(parse_admin_ids("1, two").is_err());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut config = Config::from_toml(
            r#"
            [telegram]
            bot_token = "from-file"
            admin_ids = [1]
            "#,
        )
        .unwrap();

        config
            .apply_overrides(Some("from-env".to_string()), Some("5,6".to_string()))
            .unwrap();

        assert_eq!(config.telegram.bot_token, "from-env");
        assert_eq!(config.telegram.admin_ids, vec![5, 6]);
        assert!(config.is_admin(6));
        assert!(!config.is_admin(1));
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = Config::from_toml("[telegram]\nbot_token = \"t\"\nadmin_ids = [9]\n").unwrap();
        config
            .apply_overrides(Some("  ".to_string()), Some(String::new()))
            .unwrap();
        assert_eq!(config.telegram.bot_token, "t");
        assert_eq!(config.telegram.admin_ids, vec![9]);
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let config = Config::from_toml("[telegram]\n").unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_toml("[telegram]\nbot_token = \"t\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("administrators"));
    }
}
