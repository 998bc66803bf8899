use owo_colors::OwoColorize;
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{CommandOutput, resolve_user_id};
use crate::api::{HttpLinkApi, LinkApi, LinkStatusReport};
use crate::config::Config;
use crate::error::Result;
use crate::platform::Platform;

/// A row in the linked-accounts table
#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "External ID")]
    external_id: String,
    #[tabled(rename = "Target")]
    target: String,
}

fn render_links_table(report: &LinkStatusReport, platform: &Platform) -> String {
    let rows: Vec<LinkRow> = report
        .links
        .iter()
        .map(|link| LinkRow {
            platform: link.platform.clone(),
            account: link.display_name().to_string(),
            external_id: link.external_id.clone(),
            target: if platform.matches(&link.platform) {
                "*".to_string()
            } else {
                String::new()
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// Look up the accounts linked to a user, marking those on `platform`.
pub async fn cmd_status(
    platform: Option<Platform>,
    user_id: Option<String>,
    output_json: bool,
) -> Result<()> {
    let config = Config::load()?;
    let platform = platform.unwrap_or_else(|| config.platform.clone());
    let user_id = resolve_user_id(&config, user_id)?;
    let api = HttpLinkApi::from_config(&config)?;

    let report = api.check_link_status(&user_id).await?;
    let linked = report.is_linked(&platform);

    let text = if report.links.is_empty() {
        format!("No linked accounts for user {}", user_id.cyan())
    } else {
        let summary = if linked {
            format!("{} is linked", platform).green().to_string()
        } else {
            format!("{} is not linked", platform).yellow().to_string()
        };
        format!(
            "{}\n\n{} account(s), {summary}",
            render_links_table(&report, &platform),
            report.links.len()
        )
    };

    CommandOutput::new(json!({
        "user_id": user_id,
        "platform": platform.to_string(),
        "linked": linked,
        "links": report.links,
    }))
    .with_text(text)
    .print(output_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AccountLink;

    #[test]
    fn test_links_table_marks_target_platform() {
        let report = LinkStatusReport {
            links: vec![
                AccountLink {
                    platform: "steam".to_string(),
                    external_id: "7656".to_string(),
                    platform_username: None,
                },
                AccountLink {
                    platform: "mc".to_string(),
                    external_id: "069a79f4".to_string(),
                    platform_username: Some("Notch".to_string()),
                },
            ],
        };

        insta::assert_snapshot!(render_links_table(&report, &Platform::Minecraft), @r"
        ╭──────────┬─────────┬─────────────┬────────╮
        │ Platform │ Account │ External ID │ Target │
        ├──────────┼─────────┼─────────────┼────────┤
        │ steam    │ 7656    │ 7656        │        │
        │ mc       │ Notch   │ 069a79f4    │ *      │
        ╰──────────┴─────────┴─────────────┴────────╯
        ");
    }
}
