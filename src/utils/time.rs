use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Name given to the backup taken automatically before a backup is loaded.
pub fn auto_backup_name(at: DateTime<Utc>) -> String {
    format!("Auto-Backup {}", at.format("%Y-%m-%d %H.%M.%S"))
}
