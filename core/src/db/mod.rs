use std::{path::PathBuf, sync::Arc};

use anyhow::Result;

use self::{
    doc_role_repo::DocRoleRepositoryRef,
    doc_visibility_repo::DocVisibilityRepositoryRef,
    sqlite::{
        connection::{self as sqlite_connection, SqlitePool, SqliteSettings},
        doc_role_repo::SqliteDocRoleRepository,
        doc_visibility_repo::SqliteDocVisibilityRepository,
        workspace_member_repo::SqliteWorkspaceMemberRepository,
        workspace_repo::SqliteWorkspaceRepository,
    },
    workspace_member_repo::WorkspaceMemberRepositoryRef,
    workspace_repo::WorkspaceRepositoryRef,
};
use crate::config::PermissionConfig;

pub mod doc_role_repo;
pub mod doc_visibility_repo;
pub mod sqlite;
pub mod workspace_member_repo;
pub mod workspace_repo;

#[derive(Clone)]
pub struct RepositoryRegistry {
    workspace_repo: WorkspaceRepositoryRef,
    workspace_member_repo: WorkspaceMemberRepositoryRef,
    doc_role_repo: DocRoleRepositoryRef,
    doc_visibility_repo: DocVisibilityRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        workspace_repo: WorkspaceRepositoryRef,
        workspace_member_repo: WorkspaceMemberRepositoryRef,
        doc_role_repo: DocRoleRepositoryRef,
        doc_visibility_repo: DocVisibilityRepositoryRef,
    ) -> Self {
        Self {
            workspace_repo,
            workspace_member_repo,
            doc_role_repo,
            doc_visibility_repo,
        }
    }

    pub fn workspace_repo(&self) -> WorkspaceRepositoryRef {
        self.workspace_repo.clone()
    }

    pub fn workspace_member_repo(&self) -> WorkspaceMemberRepositoryRef {
        self.workspace_member_repo.clone()
    }

    pub fn doc_role_repo(&self) -> DocRoleRepositoryRef {
        self.doc_role_repo.clone()
    }

    pub fn doc_visibility_repo(&self) -> DocVisibilityRepositoryRef {
        self.doc_visibility_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    pub async fn connect(config: &PermissionConfig) -> Result<Self> {
        let settings = SqliteSettings::from_config(config)?;
        let pool = sqlite_connection::open(&settings).await?;
        let path = settings.path;

        let repositories = RepositoryRegistry::new(
            Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            Arc::new(SqliteWorkspaceMemberRepository::new(pool.clone())),
            Arc::new(SqliteDocRoleRepository::new(pool.clone())),
            Arc::new(SqliteDocVisibilityRepository::new(pool.clone())),
        );

        Ok(Self {
            pool,
            path,
            repositories: Arc::new(repositories),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> &RepositoryRegistry {
        &self.repositories
    }
}
