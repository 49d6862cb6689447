//! Audit log queries

use serde::Serialize;

use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::AuditLogRepository;
use crate::models::{AuditLog, ChangelogQuery};
use crate::utils::errors::Result;
use crate::utils::helpers::find_diff_keys;

/// One audit row with the keys that differ between its snapshots
#[derive(Debug, Clone, Serialize)]
pub struct ChangelogEntry {
    #[serde(flatten)]
    pub log: AuditLog,
    pub changed_keys: Vec<String>,
}

impl From<AuditLog> for ChangelogEntry {
    fn from(log: AuditLog) -> Self {
        let null = serde_json::Value::Null;
        let changed_keys = find_diff_keys(
            log.old_data.as_ref().unwrap_or(&null),
            log.new_data.as_ref().unwrap_or(&null),
        );
        Self { log, changed_keys }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogService {
    logs: AuditLogRepository,
}

impl AuditLogService {
    pub fn new(logs: AuditLogRepository) -> Self {
        Self { logs }
    }

    pub async fn list(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<AuditLog>> {
        self.logs.list(filters, page).await
    }

    pub async fn changelog(&self, query: &ChangelogQuery) -> Result<Vec<ChangelogEntry>> {
        let logs = self.logs.changelog(query).await?;
        Ok(logs.into_iter().map(ChangelogEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_changed_keys_of_update_and_insert() {
        let update = ChangelogEntry::from(AuditLog {
            log_id: 1,
            timestamp: Utc::now(),
            table_name: "events".into(),
            user_id: Some(1),
            table_primary_key: "4".into(),
            old_data: Some(json!({"title": "A", "capacity": 10})),
            new_data: Some(json!({"title": "A", "capacity": 20})),
        });
        assert_eq!(update.changed_keys, vec!["capacity"]);

        let insert = ChangelogEntry::from(AuditLog {
            old_data: None,
            ..update.log.clone()
        });
        assert!(insert.changed_keys.contains(&"title".to_string()));
    }
}
