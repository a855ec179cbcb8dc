use std::sync::Arc;

use tempfile::TempDir;

use crate::{
    config::PermissionConfig,
    db::Database,
    notifier::{BroadcastNotifier, MembershipNotifierRef},
    service::PermissionService,
};

pub(crate) async fn setup_database() -> (TempDir, Database) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = PermissionConfig {
        database_path: temp_dir
            .path()
            .join("permission.db")
            .to_string_lossy()
            .into_owned(),
        ..PermissionConfig::default()
    };
    let database = Database::connect(&config).await.expect("connect database");
    (temp_dir, database)
}

pub(crate) async fn setup_service() -> (TempDir, PermissionService, Arc<BroadcastNotifier>) {
    let (temp_dir, database) = setup_database().await;
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let notifier_ref: MembershipNotifierRef = notifier.clone();
    let service = PermissionService::new(database, notifier_ref);
    (temp_dir, service, notifier)
}
