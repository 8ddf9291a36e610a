//! Core and translation upgrades. The host offers no per-step outcome for
//! these, so results use the optimistic policy.

use crate::error::HostResult;
use crate::guard::guarded;
use crate::host::{CoreHost, TranslationHost};
use crate::normalize::normalize;
use crate::types::{ItemAction, ItemActionResult, ItemKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CoreManager {
    host: Arc<dyn CoreHost>,
}

impl CoreManager {
    pub fn new(host: Arc<dyn CoreHost>) -> Self {
        Self { host }
    }

    pub async fn upgrade(&self) -> ItemActionResult {
        info!("Upgrading core");
        let raw = guarded(self.host.upgrade_core()).await;
        optimistic(raw, ItemKind::Core)
    }
}

pub struct TranslationManager {
    host: Arc<dyn TranslationHost>,
}

impl TranslationManager {
    pub fn new(host: Arc<dyn TranslationHost>) -> Self {
        Self { host }
    }

    pub async fn upgrade(&self) -> ItemActionResult {
        info!("Upgrading translations");
        let raw = guarded(self.host.upgrade_translations()).await;
        optimistic(raw, ItemKind::Translation)
    }
}

fn optimistic(raw: HostResult<Value>, kind: ItemKind) -> ItemActionResult {
    if let Err(e) = &raw {
        warn!(kind = %kind, "Upgrade reported an error: {}", e);
    }
    let raw = raw.map(|_| Value::Bool(true));
    normalize(kind.plural(), &raw, ItemAction::Upgrade, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::test_support::{MemoryCoreHost, MemoryTranslationHost};
    use serde_json::json;

    #[tokio::test]
    async fn core_upgrade_reports_fixed_record() {
        let host = Arc::new(MemoryCoreHost::new(Ok(json!({"updated": "6.5"}))));
        let result = CoreManager::new(host).upgrade().await;

        assert_eq!(result.item, "core");
        assert_eq!(result.kind, "core");
        assert!(result.success);
        assert_eq!(result.response, json!(true));
    }

    #[tokio::test]
    async fn core_fault_still_counts_as_success() {
        let host = Arc::new(MemoryCoreHost::panicking("upgrader crashed"));
        let result = CoreManager::new(host).upgrade().await;

        assert!(result.success);
        assert!(result.response["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("upgrader crashed in "));
    }

    #[tokio::test]
    async fn translation_platform_error_fails() {
        let host = Arc::new(MemoryTranslationHost::new(Err(HostError::platform(
            "fs_unavailable",
            "Could not access filesystem.",
        ))));
        let result = TranslationManager::new(host).upgrade().await;

        assert_eq!(result.item, "translations");
        assert_eq!(result.kind, "translation");
        assert!(!result.success);
        assert_eq!(result.error_code(), Some("fs_unavailable"));
    }
}
