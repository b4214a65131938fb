//! Shared helpers for facade tests

use std::sync::Arc;

use strongbox::Strongbox;
use strongbox_core::config::Config;
use strongbox_server::InMemoryServer;
use tempfile::TempDir;

pub const API_URL: &str = "http://localhost:8000";

/// A handle and the directory holding its data
pub struct Device {
    pub sb: Strongbox,
    pub dir: TempDir,
}

impl std::ops::Deref for Device {
    type Target = Strongbox;

    fn deref(&self) -> &Strongbox {
        &self.sb
    }
}

pub fn server() -> Arc<InMemoryServer> {
    Arc::new(InMemoryServer::new())
}

pub fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
}

/// A device without an account
pub async fn device(server: &Arc<InMemoryServer>) -> Device {
    let dir = tempfile::tempdir().unwrap();
    let sb = Strongbox::open_with_server(config(&dir), server.clone())
        .await
        .unwrap();
    Device { sb, dir }
}

/// A device with a freshly created account and no welcome document
pub async fn signed_up(server: &Arc<InMemoryServer>, username: &str) -> Device {
    let device = device(server).await;
    device
        .create_account(username, API_URL, false)
        .await
        .unwrap();
    device
}

/// A second device of the account on `first`, synced
pub async fn second_device(server: &Arc<InMemoryServer>, first: &Device) -> Device {
    let account_string = first.export_account_string().await.unwrap();
    let device = device(server).await;
    device.import_account(&account_string, None).await.unwrap();
    device.sync(None).await.unwrap();
    device
}
