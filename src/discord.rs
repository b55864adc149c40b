//! Run notifications posted to a Discord webhook.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::engine::RunSummary;

const USERNAME: &str = "Larch";

#[derive(Serialize, Debug)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize, Debug)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
}

#[derive(Serialize, Debug)]
struct DiscordPayload {
    username: String,
    embeds: Vec<DiscordEmbed>,
}

pub struct DiscordWebhook {
    url: String,
    client: reqwest::Client,
}

fn embed(title: &str, description: &str, success: bool, fields: Vec<DiscordField>) -> DiscordEmbed {
    DiscordEmbed {
        title: title.to_string(),
        description: description.to_string(),
        color: if success { 0x00FF00 } else { 0xFF0000 },
        timestamp: chrono::Utc::now().to_rfc3339(),
        fields,
    }
}

fn summary_fields(summary: &RunSummary) -> Vec<DiscordField> {
    [
        ("Processed", summary.processed),
        ("Created", summary.created),
        ("Updated", summary.updated),
        ("Demoted", summary.demoted),
        ("Deleted", summary.deleted),
        ("Skipped", summary.skipped),
        ("Failed", summary.failed),
        ("Ambiguous", summary.ambiguous),
        ("Conflicts", summary.conflicts),
    ]
    .into_iter()
    .map(|(name, value)| DiscordField {
        name: name.to_string(),
        value: value.to_string(),
        inline: true,
    })
    .collect()
}

impl DiscordWebhook {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send_notification(
        &self,
        title: &str,
        description: &str,
        success: bool,
    ) -> Result<()> {
        self.send(embed(title, description, success, Vec::new())).await
    }

    /// Post the counts of a finished run; failed rows turn the embed red.
    pub async fn send_summary(&self, title: &str, summary: &RunSummary) -> Result<()> {
        let success = summary.failed == 0;
        self.send(embed(
            title,
            &summary.to_string(),
            success,
            summary_fields(summary),
        ))
        .await
    }

    async fn send(&self, embed: DiscordEmbed) -> Result<()> {
        let title = embed.title.clone();
        let payload = DiscordPayload {
            username: USERNAME.to_string(),
            embeds: vec![embed],
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            error!("Failed to send Discord notification: {}", error_text);
            anyhow::bail!("Discord notification failed: {}", error_text);
        }

        info!("Sent Discord notification: {}", title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_payload() {
        let summary = RunSummary {
            processed: 10,
            created: 4,
            failed: 1,
            ..Default::default()
        };
        let payload = DiscordPayload {
            username: USERNAME.to_string(),
            embeds: vec![embed("Run finished", "", summary.failed == 0, summary_fields(&summary))],
        };
        let json = serde_json::to_value(&payload).unwrap();
        let embed = &json["embeds"][0];
        assert_eq!(embed["color"], 0xFF0000);
        assert_eq!(embed["fields"][0]["name"], "Processed");
        assert_eq!(embed["fields"][0]["value"], "10");
        assert_eq!(embed["fields"].as_array().unwrap().len(), 9);
    }

    #[test]
    fn test_plain_notification_has_no_fields() {
        let json = serde_json::to_value(embed("Run started", "3 files", true, Vec::new())).unwrap();
        assert!(json.get("fields").is_none());
        assert_eq!(json["color"], 0x00FF00);
    }
}
