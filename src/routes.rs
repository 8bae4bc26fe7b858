use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::breaker::{run_query, CircuitBreakerType};
use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewAllergenLikelihood, NewDish};
use crate::query;

type Pool = web::Data<DbPool>;
type Breaker = web::Data<CircuitBreakerType>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub dish_id: i32,
}

#[get("/")]
async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "API is up and running" }))
}

#[post("/dishes")]
async fn create_dish(
    pool: Pool,
    breaker: Breaker,
    new_dish: web::Json<NewDish>,
) -> Result<HttpResponse, ApiError> {
    let new_dish = new_dish.into_inner();
    let dish = run_query(pool, breaker, move |conn| query::create_dish(conn, &new_dish)).await?;
    Ok(HttpResponse::Created().json(dish))
}

#[get("/dishes")]
async fn get_all_dishes(pool: Pool, breaker: Breaker) -> Result<HttpResponse, ApiError> {
    let dishes = run_query(pool, breaker, query::find_all_dishes).await?;
    Ok(HttpResponse::Ok().json(dishes))
}

#[get("/dishes/search")]
async fn search_dishes(
    pool: Pool,
    breaker: Breaker,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, ApiError> {
    let SearchParams { query: text } = params.into_inner();
    let dishes = run_query(pool, breaker, move |conn| query::search_dishes(conn, &text)).await?;
    Ok(HttpResponse::Ok().json(dishes))
}

#[get("/dishes/summary")]
async fn get_dish_summary(
    pool: Pool,
    breaker: Breaker,
    params: web::Query<SummaryParams>,
) -> Result<HttpResponse, ApiError> {
    let dish_id = params.dish_id;
    let summary =
        run_query(pool, breaker, move |conn| query::find_dish_summary(conn, dish_id)).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/dishes/{dish_id}")]
async fn get_dish(
    pool: Pool,
    breaker: Breaker,
    dish_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let dish_id = dish_id.into_inner();
    let dish = run_query(pool, breaker, move |conn| query::find_dish(conn, dish_id)).await?;
    Ok(HttpResponse::Ok().json(dish))
}

#[delete("/dishes/{dish_id}")]
async fn delete_dish(
    pool: Pool,
    breaker: Breaker,
    dish_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let dish_id = dish_id.into_inner();
    run_query(pool, breaker, move |conn| query::delete_dish(conn, dish_id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/allergens")]
async fn create_allergen_likelihood(
    pool: Pool,
    breaker: Breaker,
    new_entry: web::Json<NewAllergenLikelihood>,
) -> Result<HttpResponse, ApiError> {
    let new_entry = new_entry.into_inner();
    let entry = run_query(pool, breaker, move |conn| {
        query::create_allergen_likelihood(conn, &new_entry)
    })
    .await?;
    Ok(HttpResponse::Created().json(entry))
}

#[get("/allergens")]
async fn get_all_allergen_likelihoods(
    pool: Pool,
    breaker: Breaker,
) -> Result<HttpResponse, ApiError> {
    let entries = run_query(pool, breaker, query::find_all_allergen_likelihoods).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[get("/allergens/by-dish/{dish_id}")]
async fn get_allergen_likelihoods_by_dish(
    pool: Pool,
    breaker: Breaker,
    dish_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let dish_id = dish_id.into_inner();
    let entries = run_query(pool, breaker, move |conn| {
        query::find_allergen_likelihoods_by_dish(conn, dish_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(entries))
}

//both the legacy /id/ form and the plain form are served
#[get("/allergens/id/{entry_id}")]
async fn get_allergen_likelihood_by_id(
    pool: Pool,
    breaker: Breaker,
    entry_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    find_allergen_likelihood(pool, breaker, entry_id.into_inner()).await
}

#[get("/allergens/{entry_id}")]
async fn get_allergen_likelihood(
    pool: Pool,
    breaker: Breaker,
    entry_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    find_allergen_likelihood(pool, breaker, entry_id.into_inner()).await
}

async fn find_allergen_likelihood(
    pool: Pool,
    breaker: Breaker,
    entry_id: i32,
) -> Result<HttpResponse, ApiError> {
    let entry = run_query(pool, breaker, move |conn| {
        query::find_allergen_likelihood(conn, entry_id)
    })
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[delete("/allergens/{entry_id}")]
async fn delete_allergen_likelihood(
    pool: Pool,
    breaker: Breaker,
    entry_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let entry_id = entry_id.into_inner();
    run_query(pool, breaker, move |conn| {
        query::delete_allergen_likelihood(conn, entry_id)
    })
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

fn validation_error<E: std::fmt::Display>(err: E, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(err.to_string()).into()
}

/// Registers every route. Literal paths go before `{id}` patterns so that
/// `/dishes/search` is never read as a dish id.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(validation_error))
        .app_data(web::QueryConfig::default().error_handler(validation_error))
        .app_data(web::PathConfig::default().error_handler(validation_error))
        .service(root)
        .service(create_dish)
        .service(get_all_dishes)
        .service(search_dishes)
        .service(get_dish_summary)
        .service(get_dish)
        .service(delete_dish)
        .service(create_allergen_likelihood)
        .service(get_all_allergen_likelihoods)
        .service(get_allergen_likelihoods_by_dish)
        .service(get_allergen_likelihood_by_id)
        .service(get_allergen_likelihood)
        .service(delete_allergen_likelihood);
}
