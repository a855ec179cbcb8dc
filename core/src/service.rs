use std::sync::Arc;

use anyhow::Result;

use crate::{
    access::AccessEvaluator,
    config::PermissionConfig,
    db::Database,
    doc_activity::DocActivityHandler,
    grant::GrantManager,
    locks::KeyedLocks,
    notifier::{BroadcastNotifier, MembershipNotifierRef},
    publish::PublicationManager,
    seats::SeatReconciler,
};

/// Everything the permission engine exposes, wired over one database.
///
/// The grant manager and the seat reconciler share one [`KeyedLocks`] so
/// seat promotion and owner transfer on the same workspace never interleave.
#[derive(Clone)]
pub struct PermissionService {
    pub database: Database,
    pub access: AccessEvaluator,
    pub grants: GrantManager,
    pub seats: SeatReconciler,
    pub publication: PublicationManager,
    pub doc_activity: DocActivityHandler,
    pub locks: KeyedLocks,
}

impl PermissionService {
    pub fn new(database: Database, notifier: MembershipNotifierRef) -> Self {
        let locks = KeyedLocks::new();
        let repositories = database.repositories();

        Self {
            access: AccessEvaluator::from_repositories(repositories),
            grants: GrantManager::from_repositories(repositories, notifier, locks.clone()),
            seats: SeatReconciler::from_repositories(repositories, locks.clone()),
            publication: PublicationManager::from_repositories(repositories),
            doc_activity: DocActivityHandler::from_repositories(repositories),
            locks,
            database,
        }
    }

    /// Opens the configured database and publishes membership events on a
    /// broadcast channel sized by `notification_channel_capacity`.
    pub async fn connect(config: &PermissionConfig) -> Result<(Self, Arc<BroadcastNotifier>)> {
        let database = Database::connect(config).await?;
        let notifier = Arc::new(BroadcastNotifier::new(config.notification_channel_capacity));
        let service = Self::new(database, notifier.clone());
        Ok((service, notifier))
    }
}
