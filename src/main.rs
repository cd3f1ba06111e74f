//! Application bootstrap: load config, connect the pool, wire
//! repositories into services, and start the HTTP server with the full
//! middleware chain.

use actix_web::{web, App, HttpServer};

use tracetrack::auth::AuthService;
use tracetrack::config::AppConfig;
use tracetrack::db::Db;
use tracetrack::middleware::{AuthMiddleware, LoggingMiddleware, RateLimitMiddleware, SecurityHeadersMiddleware};
use tracetrack::ratelimit::RateLimiter;
use tracetrack::repository::{
    AuditRepository, BagRepository, BillRepository, LinkRepository, ScanRepository,
    SessionRepository, StatsRepository, UserRepository,
};
use tracetrack::services::{BagService, BillService, ScanService};
use tracetrack::stats::{spawn_reconciliation_task, StatsCache};
use tracetrack::{handlers, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    telemetry::init(&config);

    let db = Db::connect(&config).await?;
    tracing::info!("connected to database");

    let users = UserRepository::new(db.clone());
    let sessions = SessionRepository::new(db.clone());
    let bags = BagRepository::new(db.clone());
    let links = LinkRepository::new(db.clone());
    let scans = ScanRepository::new(db.clone());
    let bills = BillRepository::new(db.clone());
    let audit = AuditRepository::new(db.clone());
    let stats_repo = StatsRepository::new(db.clone());

    let auth_service = AuthService::new(users, sessions, &config);
    let bag_service = BagService::new(db.clone(), bags.clone(), links.clone());
    let bill_service = BillService::new(db.clone(), bills, bags.clone(), config.parent_weight_kg);
    let scan_service = ScanService::new(db.clone());
    let rate_limiter = RateLimiter::new();
    let stats_cache = std::sync::Arc::new(StatsCache::new(stats_repo.clone()));

    spawn_reconciliation_task(stats_repo, stats_cache.clone());

    let bind_addr = config.bind_addr.clone();
    let hsts = config.deployment_https;
    let request_timeout = config.request_timeout();

    let config_data = web::Data::new(config);
    let db_data = web::Data::new(db);
    let auth_data = web::Data::new(auth_service);
    let bag_data = web::Data::new(bag_service);
    let bill_data = web::Data::new(bill_service);
    let scan_data = web::Data::new(scan_service);
    let rate_limiter_data = web::Data::new(rate_limiter);
    let stats_cache_data = web::Data::from(stats_cache);
    let audit_data = web::Data::new(audit);

    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(db_data.clone())
            .app_data(auth_data.clone())
            .app_data(bag_data.clone())
            .app_data(bill_data.clone())
            .app_data(scan_data.clone())
            .app_data(rate_limiter_data.clone())
            .app_data(stats_cache_data.clone())
            .app_data(audit_data.clone())
            // Registration is in reverse execution order: the last `.wrap()`
            // runs first on the request, so auth must be registered before
            // rate limiting resolves an identity to key quotas on.
            .wrap(RateLimitMiddleware)
            .wrap(AuthMiddleware)
            .wrap(LoggingMiddleware)
            .wrap(SecurityHeadersMiddleware { hsts })
            .configure(handlers::health_handlers::configure)
            .configure(handlers::auth_handlers::configure)
            .configure(handlers::bag_handlers::configure)
            .configure(handlers::bill_handlers::configure)
            .configure(handlers::scan_handlers::configure)
            .configure(handlers::stats_handlers::configure)
    })
    .client_request_timeout(request_timeout)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
