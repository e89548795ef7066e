//! check-config command - validate the directory configuration without connecting

use super::CommandContext;
use crate::config::authenticator_config;
use anyhow::Result;
use colored::Colorize;
use dirbind_auth::AuthenticatorConfig;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub address: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_mode: &'static str,
    pub user_filter: String,
    pub attributes: Vec<String>,
    pub start_tls: bool,
    pub verify_server_certificate: bool,
    pub connect_timeout_seconds: u64,
    pub operation_timeout_seconds: Option<u64>,
}

impl From<&AuthenticatorConfig> for ConfigSummary {
    fn from(config: &AuthenticatorConfig) -> Self {
        let transport = config.transport();
        Self {
            address: config.address().to_string(),
            base_dn: config.base_dn().to_string(),
            bind_dn: config.bind_dn().to_string(),
            bind_mode: config.service_bind_mode().as_str(),
            user_filter: config.filter().to_string(),
            attributes: config.attributes().to_vec(),
            start_tls: transport.start_tls,
            verify_server_certificate: transport.verify_server_certificate,
            connect_timeout_seconds: transport.connect_timeout.as_secs(),
            operation_timeout_seconds: transport.operation_timeout.map(|t| t.as_secs()),
        }
    }
}

pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = authenticator_config(&ctx.config)?;
    let summary = ConfigSummary::from(&config);

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for line in text_lines(&summary) {
        ctx.info(&line);
    }
    Ok(())
}

fn text_lines(summary: &ConfigSummary) -> Vec<String> {
    let mut lines = vec![
        format!("{}", "Directory configuration is valid".green().bold()),
        format!("  {}: {}", "Address".cyan(), summary.address),
        format!("  {}: {}", "Base DN".cyan(), summary.base_dn),
        format!(
            "  {}: {} ({})",
            "Service bind".cyan(),
            summary.bind_dn,
            summary.bind_mode
        ),
        format!("  {}: {}", "User filter".cyan(), summary.user_filter),
    ];
    if !summary.attributes.is_empty() {
        lines.push(format!(
            "  {}: {}",
            "Attributes".cyan(),
            summary.attributes.join(", ")
        ));
    }
    lines.push(format!("  {}: {}", "STARTTLS".cyan(), summary.start_tls));
    lines.push(format!(
        "  {}: {}",
        "Verify certificate".cyan(),
        summary.verify_server_certificate
    ));
    lines.push(format!(
        "  {}: {}s",
        "Connect timeout".cyan(),
        summary.connect_timeout_seconds
    ));
    lines.push(format!(
        "  {}: {}",
        "Operation timeout".cyan(),
        summary
            .operation_timeout_seconds
            .map_or_else(|| "disabled".to_string(), |secs| format!("{}s", secs))
    ));
    if !summary.verify_server_certificate {
        lines.push(format!(
            "  {}",
            "Certificate verification is disabled; do not use in production".yellow()
        ));
    }
    lines
}
