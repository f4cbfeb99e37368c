use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use trafficlight::{
    CredentialKey, CredentialStore, Error, FileCredentialStore, HttpTransport, ParticleClient,
    ReconnectScheduler, StatusCommand,
};

use crate::config::AppConfig;
use crate::display::ConsoleDisplay;

pub struct CommandExecutor {
    config: AppConfig,
    credentials: Arc<FileCredentialStore>,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Result<Self> {
        let credentials_path = config.credentials_path()?;
        debug!(path = %credentials_path.display(), "Using credentials file");
        Ok(Self {
            credentials: Arc::new(FileCredentialStore::new(credentials_path)),
            config,
        })
    }

    /// Follow the light until Ctrl-C.
    pub async fn watch(&self) -> Result<()> {
        let stream = self.config.stream.clone();
        let client = ParticleClient::new(&stream)?;
        let transport = HttpTransport::new(&stream)?;

        if self.credentials.get(CredentialKey::UserToken).await?.is_none() {
            println!("No user token set yet; run `trafficlight token <TOKEN>` to start streaming");
        }

        let scheduler = Arc::new(ReconnectScheduler::new(
            stream,
            self.credentials.clone(),
            Arc::new(client),
            Arc::new(ConsoleDisplay::stdout()),
            Arc::new(transport),
        ));
        let handle = scheduler.spawn();

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Interrupted, shutting down");
        handle.shutdown().await;
        Ok(())
    }

    pub async fn set_status(&self, command: StatusCommand) -> Result<()> {
        let token = self.require(CredentialKey::UserToken).await?;
        let device_id = self.require(CredentialKey::DeviceId).await?;

        let client = ParticleClient::new(&self.config.stream)?;
        let response = client
            .set_status(&token, &device_id, command)
            .await
            .with_context(|| format!("Failed to set status to {}", command.label()))?;

        let device = response.name.as_deref().unwrap_or(&response.id);
        println!("✓ {} is now {}", device, command.label());
        Ok(())
    }

    /// Store `value` under `key`; an omitted or blank value removes it.
    pub async fn store_secret(&self, key: CredentialKey, value: Option<String>) -> Result<()> {
        match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => {
                self.credentials.set(key, value).await?;
                println!("✓ Stored {}", key);
            }
            None => {
                self.credentials.delete(key).await?;
                println!("✓ Removed {}", key);
            }
        }
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        println!("{}", self.config.show()?);
        println!("# credentials: {}", self.credentials.path().display());
        Ok(())
    }

    async fn require(&self, key: CredentialKey) -> Result<String> {
        let value = self.credentials.get(key).await?;
        let hint = match key {
            CredentialKey::UserToken => "run `trafficlight token <TOKEN>` first",
            CredentialKey::DeviceId => "run `trafficlight device <ID>` first",
        };
        value.ok_or(Error::MissingCredential(key)).context(hint)
    }
}
