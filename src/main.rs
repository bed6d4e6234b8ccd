use std::{process, sync::Arc, time::Duration};

use sitecreator::{
    application::{
        access::AccessService,
        chrome::ChromeService,
        error::AppError,
        repos::{AclsRepo, GroupsRepo, NodesRepo, NodesWriteRepo, ProfilesRepo, SidebarRepo},
        resolver::UrlResolver,
        sidebar::SidebarService,
        tree::TreeService,
        users::UserDirectoryService,
    },
    cache::{CacheConfig, ObjectCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState, IdentityState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Init(_) => run_init(settings).await,
        config::Command::ExportUsers(args) => run_export_users(settings, args).await,
        config::Command::ImportUsers(args) => run_import_users(settings, args).await,
    }
}

/// Every service, wired against one repository handle and one object cache.
struct ApplicationContext {
    cache: Arc<ObjectCache>,
    nodes: Arc<dyn NodesRepo>,
    tree: TreeService,
    resolver: UrlResolver,
    sidebar: SidebarService,
    users: UserDirectoryService,
    chrome: ChromeService,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let nodes: Arc<dyn NodesRepo> = repositories.clone();
    let writer: Arc<dyn NodesWriteRepo> = repositories.clone();
    let acls: Arc<dyn AclsRepo> = repositories.clone();
    let groups: Arc<dyn GroupsRepo> = repositories.clone();
    let profiles: Arc<dyn ProfilesRepo> = repositories.clone();
    let sidebar_repo: Arc<dyn SidebarRepo> = repositories;

    let cache = Arc::new(ObjectCache::new(&CacheConfig::from(&settings.cache)));

    let access = AccessService::new(
        nodes.clone(),
        writer.clone(),
        acls.clone(),
        groups.clone(),
        profiles.clone(),
        cache.clone(),
    );
    let tree = TreeService::new(nodes.clone(), writer, acls, access, cache.clone());
    let resolver = UrlResolver::new(tree.clone(), nodes.clone(), cache.clone());
    let sidebar = SidebarService::new(sidebar_repo, tree.clone(), cache.clone());
    let users = UserDirectoryService::new(profiles, groups, cache.clone());
    let chrome = ChromeService::new(
        settings.site.clone(),
        settings.auth.clone(),
        sidebar.clone(),
    );

    ApplicationContext {
        cache,
        nodes,
        tree,
        resolver,
        sidebar,
        users,
        chrome,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| {
            AppError::from(InfraError::configuration(
                "uploads.max_request_bytes does not fit in memory",
            ))
        })?;

    let http_state = HttpState {
        tree: app.tree.clone(),
        resolver: app.resolver.clone(),
        nodes: app.nodes.clone(),
        chrome: app.chrome.clone(),
        files: settings.files.clone(),
    };
    let admin_state = AdminState {
        tree: app.tree.clone(),
        sidebar: app.sidebar.clone(),
        users: app.users.clone(),
        chrome: app.chrome.clone(),
        cache: app.cache.clone(),
        upload_limit_bytes,
    };
    let identity_state = IdentityState {
        users: app.users.clone(),
        auth: settings.auth.clone(),
    };

    let router = http::build_router(http_state, admin_state, identity_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| {
            AppError::from(InfraError::io(
                format!("failed to bind {}", settings.server.addr),
                err,
            ))
        })?;
    info!(
        target = "sitecreator::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await
        .map_err(|err| AppError::command("serve", err))?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "sitecreator::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        return;
    }
    info!(
        target = "sitecreator::serve",
        grace_seconds = grace.as_secs(),
        "shutdown requested, draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "sitecreator::serve",
            "graceful shutdown timed out, exiting"
        );
        process::exit(0);
    });
}

async fn run_init(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let root = app
        .tree
        .initialize_site()
        .await
        .map_err(|err| AppError::command("init", err))?;

    info!(
        target = "sitecreator::init",
        page = %root.id(),
        "site root is ready"
    );
    Ok(())
}

async fn run_export_users(
    settings: config::Settings,
    args: config::ExportUsersArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let csv = app
        .users
        .export_csv()
        .await
        .map_err(|err| AppError::command("export-users", err))?;

    tokio::fs::write(&args.file, csv)
        .await
        .map_err(|err| AppError::from(InfraError::file("write", &args.file, err)))?;

    info!(
        target = "sitecreator::export_users",
        file = %args.file.display(),
        "users exported"
    );
    Ok(())
}

async fn run_import_users(
    settings: config::Settings,
    args: config::ImportUsersArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let bytes = tokio::fs::read(&args.file)
        .await
        .map_err(|err| AppError::from(InfraError::file("read", &args.file, err)))?;
    let text = String::from_utf8_lossy(&bytes);

    let report = app
        .users
        .import_csv(&text, args.complete)
        .await
        .map_err(|err| AppError::command("import-users", err))?;

    for rejection in &report.rejected {
        warn!(
            target = "sitecreator::import_users",
            line = rejection.line,
            content = %rejection.content,
            reason = rejection.reason,
            "roster line rejected"
        );
    }
    info!(
        target = "sitecreator::import_users",
        file = %args.file.display(),
        imported = report.imported,
        rejected = report.rejected.len(),
        complete = args.complete,
        "users imported"
    );
    Ok(())
}
