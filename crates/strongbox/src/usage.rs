//! Storage usage

use strongbox_core::domain::{UncompressedUsage, UsageMetrics};
use strongbox_core::ports::IServerApi;

use crate::errors::UsageError;
use crate::Strongbox;

impl Strongbox {
    /// Server-side usage of every file and the account's data cap
    pub async fn get_usage(&self) -> Result<UsageMetrics, UsageError> {
        let account = self.account().await?;
        let usage = self.server.get_usage(&account).await?;
        Ok(UsageMetrics::new(usage.usages, usage.cap))
    }

    /// Plaintext size of every visible document, computed locally
    pub async fn get_uncompressed_usage(&self) -> Result<UncompressedUsage, UsageError> {
        let total = self
            .read(|tree| {
                Ok(tree
                    .visible_ids()
                    .iter()
                    .filter_map(|id| tree.find(id).ok())
                    .filter(|meta| meta.is_document())
                    .filter_map(|meta| meta.document_size)
                    .sum::<u64>())
            })
            .await?;
        Ok(UncompressedUsage::new(total))
    }
}
