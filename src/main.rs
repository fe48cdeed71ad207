use std::{process, sync::Arc, time::Duration};

use atrium::{
    application::{
        admin::AdminMenuService,
        error::AppError,
        menu::{MenuResolutionService, MenuSnapshot},
        repos::{MenuRepo, MenuWriteRepo},
    },
    cache::{CacheConfig, CacheTrigger, MENU_NAMESPACE, SharedPurge, TieredCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HeaderCookieRoleResolver, HttpState, RoleResolver},
        redis, telemetry,
    },
};
use tokio::{sync::watch, try_join};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Purge(_) => run_purge(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings).await;
    serve_http(&settings, app.http_state, app.admin_state).await
}

async fn run_purge(settings: config::Settings) -> Result<(), AppError> {
    let shared = redis::shared_store(&settings.cache).await;
    let cache = TieredCache::<MenuSnapshot>::new(CacheConfig::from(&settings.cache), shared);

    let report = cache.invalidate(MENU_NAMESPACE).await;
    match report.shared {
        SharedPurge::Purged(removed) => {
            info!(target = "atrium::purge", removed, "shared menu cache purged");
            Ok(())
        }
        SharedPurge::Disabled => {
            warn!(
                target = "atrium::purge",
                "no shared cache tier configured; nothing to purge"
            );
            Ok(())
        }
        SharedPurge::Failed => Err(AppError::from(InfraError::cache(
            "shared cache tier did not accept the purge",
        ))),
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

struct ApplicationContext {
    http_state: HttpState,
    admin_state: AdminState,
}

async fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let shared = redis::shared_store(&settings.cache).await;
    let cache = Arc::new(TieredCache::<MenuSnapshot>::new(
        CacheConfig::from(&settings.cache),
        shared,
    ));
    let trigger = CacheTrigger::new(cache.clone());

    let reader: Arc<dyn MenuRepo> = repositories.clone();
    let writer: Arc<dyn MenuWriteRepo> = repositories;
    let roles: Arc<dyn RoleResolver> =
        Arc::new(HeaderCookieRoleResolver::from(&settings.auth));

    let menus = Arc::new(MenuResolutionService::new(
        reader.clone(),
        cache,
        settings.menu.limits(),
    ));
    let admin_menus = Arc::new(AdminMenuService::new(
        reader.clone(),
        writer,
        trigger.clone(),
    ));

    ApplicationContext {
        http_state: HttpState {
            menus,
            trigger,
            repo: reader,
            roles: roles.clone(),
        },
        admin_state: AdminState {
            menus: admin_menus,
            roles,
        },
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "atrium::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listeners bound"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!(target = "atrium::serve", "shutdown signal received; draining connections");
            let _ = shutdown_tx.send(true);
        }
    }

    drain(servers, settings.server.graceful_shutdown).await
}

async fn drain<F>(servers: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = Result<((), ()), std::io::Error>>,
{
    match tokio::time::timeout(grace, servers).await {
        Ok(result) => result
            .map(|_| ())
            .map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "atrium::serve",
                grace_ms = grace.as_millis() as u64,
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
