use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use barffine_permission::{
    PermissionService,
    config::PermissionConfig,
    db::Database,
    member_status::MembershipStatus,
    notifier::TracingNotifier,
    roles::{DocAction, WorkspaceRole},
    visibility::WorkspaceVisibility,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Barffine permission administration", long_about = None)]
struct Cli {
    /// Config file to load instead of the default lookup
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run database migrations
    Migrate,
    /// Create a workspace and its owner membership
    CreateWorkspace(CreateWorkspaceArgs),
    /// Promote waitlisted members up to a seat limit
    RefreshSeats(RefreshSeatsArgs),
    /// Evaluate a workspace permission
    CheckWorkspace(CheckWorkspaceArgs),
    /// Evaluate a document permission
    CheckPage(CheckPageArgs),
    /// Hand workspace ownership to an active member
    TransferOwner(TransferOwnerArgs),
    /// Print workspace members as JSON
    ListMembers(ListMembersArgs),
}

#[derive(Args, Debug)]
struct CreateWorkspaceArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    #[arg(long = "owner-id", value_name = "ID")]
    owner_id: String,
    #[arg(long)]
    public: bool,
    #[arg(long = "enable-url-preview")]
    enable_url_preview: bool,
}

#[derive(Args, Debug)]
struct RefreshSeatsArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    #[arg(long = "seat-limit")]
    seat_limit: i64,
}

#[derive(Args, Debug)]
struct CheckWorkspaceArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    /// Omit to evaluate an anonymous caller
    #[arg(long = "user-id", value_name = "ID")]
    user_id: Option<String>,
    #[arg(long, default_value = "collaborator", value_parser = parse_workspace_role)]
    role: WorkspaceRole,
}

#[derive(Args, Debug)]
struct CheckPageArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    #[arg(long = "doc-id", value_name = "ID")]
    doc_id: String,
    #[arg(long = "user-id", value_name = "ID")]
    user_id: Option<String>,
    #[arg(long, default_value = "read", value_parser = parse_doc_action)]
    action: DocAction,
}

#[derive(Args, Debug)]
struct TransferOwnerArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    #[arg(long = "user-id", value_name = "ID")]
    user_id: String,
}

#[derive(Args, Debug)]
struct ListMembersArgs {
    #[arg(long = "workspace-id", value_name = "ID")]
    workspace_id: String,
    #[arg(long, default_value_t = 0)]
    offset: i64,
    #[arg(long, default_value_t = 50)]
    limit: i64,
}

fn parse_workspace_role(value: &str) -> Result<WorkspaceRole, String> {
    WorkspaceRole::parse(value).ok_or_else(|| format!("unknown workspace role '{value}'"))
}

fn parse_doc_action(value: &str) -> Result<DocAction, String> {
    DocAction::parse(value).ok_or_else(|| format!("unknown doc action '{value}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = PermissionConfig::load_with(cli.config)?;
    let database = Database::connect(&config)
        .await
        .with_context(|| format!("failed to open {}", config.database_path))?;
    info!(path = %database.database_path().display(), "permission database ready");

    let service = PermissionService::new(database, Arc::new(TracingNotifier));

    match cli.command {
        Command::Migrate => {
            info!("migrations completed");
            Ok(())
        }
        Command::CreateWorkspace(args) => run_create_workspace(&service, args).await,
        Command::RefreshSeats(args) => run_refresh_seats(&service, args).await,
        Command::CheckWorkspace(args) => run_check_workspace(&service, args).await,
        Command::CheckPage(args) => run_check_page(&service, args).await,
        Command::TransferOwner(args) => run_transfer_owner(&service, args).await,
        Command::ListMembers(args) => run_list_members(&service, args).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_create_workspace(
    service: &PermissionService,
    args: CreateWorkspaceArgs,
) -> anyhow::Result<()> {
    let CreateWorkspaceArgs {
        workspace_id,
        owner_id,
        public,
        enable_url_preview,
    } = args;

    let owner = service
        .grants
        .create_workspace(
            &workspace_id,
            &owner_id,
            WorkspaceVisibility {
                public,
                enable_url_preview,
            },
        )
        .await?;

    println!(
        "Created workspace {} owned by {} (membership {})",
        owner.workspace_id, owner.user_id, owner.id
    );
    Ok(())
}

async fn run_refresh_seats(service: &PermissionService, args: RefreshSeatsArgs) -> anyhow::Result<()> {
    if args.seat_limit < 0 {
        bail!("seat limit must not be negative");
    }

    let promoted = service
        .seats
        .refresh_seat_status(&args.workspace_id, args.seat_limit)
        .await?;

    println!(
        "Promoted {} waitlisted member(s) in {}",
        promoted.len(),
        args.workspace_id
    );
    for member in promoted {
        println!("  {} -> {}", member.user_id, member.status);
    }
    Ok(())
}

async fn run_check_workspace(
    service: &PermissionService,
    args: CheckWorkspaceArgs,
) -> anyhow::Result<()> {
    let allowed = service
        .access
        .try_check_workspace(&args.workspace_id, args.user_id.as_deref(), args.role)
        .await?;

    println!(
        "{} {} role {} in {}",
        args.user_id.as_deref().unwrap_or("anonymous"),
        if allowed { "has" } else { "lacks" },
        args.role,
        args.workspace_id
    );
    Ok(())
}

async fn run_check_page(service: &PermissionService, args: CheckPageArgs) -> anyhow::Result<()> {
    let allowed = service
        .access
        .try_check_page(
            &args.workspace_id,
            &args.doc_id,
            args.action,
            args.user_id.as_deref(),
        )
        .await?;

    println!(
        "{} {} {} {}/{}",
        args.user_id.as_deref().unwrap_or("anonymous"),
        if allowed { "may" } else { "may not" },
        args.action,
        args.workspace_id,
        args.doc_id
    );
    Ok(())
}

async fn run_transfer_owner(
    service: &PermissionService,
    args: TransferOwnerArgs,
) -> anyhow::Result<()> {
    if !service
        .access
        .is_workspace_member(&args.workspace_id, &args.user_id, WorkspaceRole::Collaborator)
        .await?
    {
        bail!(
            "{} is not an active member of {}",
            args.user_id,
            args.workspace_id
        );
    }

    service
        .grants
        .grant(
            &args.workspace_id,
            &args.user_id,
            WorkspaceRole::Owner,
            MembershipStatus::Accepted,
        )
        .await?;

    let owner = service.access.workspace_owner(&args.workspace_id).await?;
    println!("Owner of {} is now {}", args.workspace_id, owner.user_id);
    Ok(())
}

async fn run_list_members(service: &PermissionService, args: ListMembersArgs) -> anyhow::Result<()> {
    let members = service
        .grants
        .list_members(&args.workspace_id, args.offset, args.limit)
        .await?;

    println!("{}", serde_json::to_string_pretty(&members)?);
    Ok(())
}
