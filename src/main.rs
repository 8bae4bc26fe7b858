use actix_web::{middleware, web, App, HttpServer};

use dish_allergens::{breaker, config::Config, db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().expect("Invalid configuration");

    // set up database connection pool
    let pool = db::init_pool(&config.database_url, config.pool_max_size)
        .expect("Failed to create pool.");

    let circuit_breaker = breaker::new_circuit_breaker();

    log::info!(
        "starting HTTP server at http://{}:{}",
        config.host,
        config.port
    );

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(circuit_breaker.clone()))
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
