//! Permission prompt shown in the terminal.

use std::collections::HashMap;
use std::io::{self, IsTerminal};

use async_trait::async_trait;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;

use smarttank_core::{Error, Permission, PermissionDecision, PermissionPrompt};

/// Asks once for all requested permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn request(
        &self,
        permissions: &[Permission],
    ) -> smarttank_core::Result<HashMap<Permission, PermissionDecision>> {
        if !io::stdin().is_terminal() {
            return Err(Error::Prompt("not running in a terminal".to_string()));
        }

        let names: Vec<&str> = permissions.iter().map(|p| p.android_name()).collect();
        let question = format!("SmartTank needs {} to find your device", names.join(", "));

        let choice = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .items(&["Allow", "Deny", "Deny and don't ask again"])
                .default(0)
                .interact()
        })
        .await
        .map_err(|e| Error::Prompt(e.to_string()))?
        .map_err(|e| Error::Prompt(e.to_string()))?;

        let decision = match choice {
            0 => PermissionDecision::Granted,
            1 => PermissionDecision::Denied,
            _ => PermissionDecision::NeverAskAgain,
        };
        Ok(permissions.iter().map(|p| (*p, decision)).collect())
    }
}
