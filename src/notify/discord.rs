/// Discord delivery for signal notifications
///
/// Posts one embed per signal through the REST API; the embed color is
/// derived from the mint so a token keeps its color across messages.

use crate::logger::{self, LogTag};
use crate::utils::string_to_color;

pub struct DiscordNotifier {
    http: reqwest::Client,
    bot_token: String,
}

impl DiscordNotifier {
    pub fn new(bot_token: &str) -> Result<Self, String> {
        if bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }
        Ok(Self {
            http: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
        })
    }

    pub async fn send_signal(
        &self,
        channel_id: &str,
        description: &str,
        mint: &str,
    ) -> Result<(), String> {
        let url = format!(
            "https://discord.com/api/v10/channels/{}/messages",
            channel_id
        );
        let body = serde_json::json!({
            "embeds": [{
                "title": "",
                "description": description,
                "color": string_to_color(mint),
            }]
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Discord request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Discord responded {} for channel {}",
                response.status(),
                channel_id
            ));
        }

        logger::debug(
            LogTag::Discord,
            &format!("Sent signal embed to channel {}", channel_id),
        );

        Ok(())
    }
}
