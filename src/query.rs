use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::unicode_lower;
use crate::error::{QueryError, Record};
use crate::models::{
    AllergenLikelihood, Dish, DishDetail, NestedAllergen, NewAllergenLikelihood, NewDish,
};
use crate::schema::{allergen_likelihoods, dishes};

type QueryOutcome<T> = Result<T, QueryError>;

/// Turns a unique-constraint violation at insert time into `AlreadyExists`.
/// The surrounding transaction is rolled back when the error is returned.
fn downgrade_unique_violation(record: Record) -> impl FnOnce(DieselError) -> QueryError {
    move |err| match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            log::warn!("unique constraint hit on {record} insert: {}", info.message());
            QueryError::AlreadyExists(record)
        }
        other => QueryError::Database(other),
    }
}

fn dish_exists(conn: &mut SqliteConnection, dish_id: i32) -> QueryResult<bool> {
    dishes::table
        .find(dish_id)
        .select(dishes::id)
        .first::<i32>(conn)
        .optional()
        .map(|found| found.is_some())
}

fn with_allergens(conn: &mut SqliteConnection, found: Vec<Dish>) -> QueryResult<Vec<DishDetail>> {
    let entries = AllergenLikelihood::belonging_to(&found)
        .select(AllergenLikelihood::as_select())
        .order(allergen_likelihoods::id)
        .load(conn)?;

    Ok(entries
        .grouped_by(&found)
        .into_iter()
        .zip(found)
        .map(|(allergens, dish)| DishDetail::new(dish, allergens))
        .collect())
}

pub fn create_dish(conn: &mut SqliteConnection, new_dish: &NewDish) -> QueryOutcome<DishDetail> {
    let dish = conn.immediate_transaction(|conn| {
        let existing = dishes::table
            .filter(dishes::name.eq(&new_dish.name))
            .select(dishes::id)
            .first::<i32>(conn)
            .optional()?;
        if existing.is_some() {
            return Err(QueryError::AlreadyExists(Record::Dish));
        }

        diesel::insert_into(dishes::table)
            .values(new_dish)
            .returning(Dish::as_returning())
            .get_result(conn)
            .map_err(downgrade_unique_violation(Record::Dish))
    })?;

    log::debug!("created dish {} ({})", dish.id, dish.name);
    Ok(DishDetail::new(dish, Vec::new()))
}

pub fn find_dish(conn: &mut SqliteConnection, dish_id: i32) -> QueryOutcome<DishDetail> {
    let dish = dishes::table
        .find(dish_id)
        .select(Dish::as_select())
        .first(conn)
        .optional()?
        .ok_or(QueryError::NotFound(Record::Dish))?;

    let allergens = AllergenLikelihood::belonging_to(&dish)
        .select(AllergenLikelihood::as_select())
        .order(allergen_likelihoods::id)
        .load(conn)?;
    Ok(DishDetail::new(dish, allergens))
}

pub fn find_all_dishes(conn: &mut SqliteConnection) -> QueryOutcome<Vec<DishDetail>> {
    let all_dishes = dishes::table
        .select(Dish::as_select())
        .order(dishes::id)
        .load(conn)?;
    Ok(with_allergens(conn, all_dishes)?)
}

/// Escapes LIKE wildcards so the query matches as a literal substring.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Dishes whose name contains `query`, ignoring case in any script.
pub fn search_dishes(conn: &mut SqliteConnection, query: &str) -> QueryOutcome<Vec<DishDetail>> {
    let pattern = contains_pattern(&query.to_lowercase());
    let matched = dishes::table
        .filter(unicode_lower(dishes::name).like(pattern).escape('\\'))
        .select(Dish::as_select())
        .order(dishes::id)
        .load(conn)?;
    Ok(with_allergens(conn, matched)?)
}

/// Allergens of an existing dish. Unlike `find_allergen_likelihoods_by_dish`
/// an unknown dish is reported as not found.
pub fn find_dish_summary(
    conn: &mut SqliteConnection,
    dish_id: i32,
) -> QueryOutcome<Vec<NestedAllergen>> {
    conn.transaction(|conn| {
        if !dish_exists(conn, dish_id)? {
            return Err(QueryError::NotFound(Record::Dish));
        }
        let entries = allergen_likelihoods::table
            .filter(allergen_likelihoods::dish_id.eq(dish_id))
            .select(AllergenLikelihood::as_select())
            .order(allergen_likelihoods::id)
            .load(conn)?;
        Ok(entries.into_iter().map(NestedAllergen::from).collect())
    })
}

/// Removes the dish. Its allergen entries go with it through the
/// `ON DELETE CASCADE` foreign key.
pub fn delete_dish(conn: &mut SqliteConnection, dish_id: i32) -> QueryOutcome<()> {
    let deleted = diesel::delete(dishes::table.find(dish_id)).execute(conn)?;
    if deleted == 0 {
        return Err(QueryError::NotFound(Record::Dish));
    }
    log::debug!("deleted dish {dish_id}");
    Ok(())
}

/// Checks run in order: dish existence, likelihood range, duplicate pair.
pub fn create_allergen_likelihood(
    conn: &mut SqliteConnection,
    new_entry: &NewAllergenLikelihood,
) -> QueryOutcome<AllergenLikelihood> {
    let entry = conn.immediate_transaction(|conn| {
        if !dish_exists(conn, new_entry.dish_id)? {
            return Err(QueryError::ReferenceMissing);
        }
        if !new_entry.likelihood_in_range() {
            return Err(QueryError::InvalidLikelihood(new_entry.likelihood));
        }

        let duplicate = allergen_likelihoods::table
            .filter(allergen_likelihoods::dish_id.eq(new_entry.dish_id))
            .filter(allergen_likelihoods::allergen.eq(&new_entry.allergen))
            .select(allergen_likelihoods::id)
            .first::<i32>(conn)
            .optional()?;
        if duplicate.is_some() {
            return Err(QueryError::AlreadyExists(Record::AllergenLikelihood));
        }

        diesel::insert_into(allergen_likelihoods::table)
            .values(new_entry)
            .returning(AllergenLikelihood::as_returning())
            .get_result(conn)
            .map_err(downgrade_unique_violation(Record::AllergenLikelihood))
    })?;

    log::debug!(
        "created allergen {} ({}) for dish {}",
        entry.id,
        entry.allergen,
        entry.dish_id
    );
    Ok(entry)
}

pub fn find_allergen_likelihood(
    conn: &mut SqliteConnection,
    entry_id: i32,
) -> QueryOutcome<AllergenLikelihood> {
    allergen_likelihoods::table
        .find(entry_id)
        .select(AllergenLikelihood::as_select())
        .first(conn)
        .optional()?
        .ok_or(QueryError::NotFound(Record::AllergenLikelihood))
}

pub fn find_all_allergen_likelihoods(
    conn: &mut SqliteConnection,
) -> QueryOutcome<Vec<AllergenLikelihood>> {
    Ok(allergen_likelihoods::table
        .select(AllergenLikelihood::as_select())
        .order(allergen_likelihoods::id)
        .load(conn)?)
}

/// Entries for `dish_id`; an unknown dish simply has none.
pub fn find_allergen_likelihoods_by_dish(
    conn: &mut SqliteConnection,
    dish_id: i32,
) -> QueryOutcome<Vec<AllergenLikelihood>> {
    Ok(allergen_likelihoods::table
        .filter(allergen_likelihoods::dish_id.eq(dish_id))
        .select(AllergenLikelihood::as_select())
        .order(allergen_likelihoods::id)
        .load(conn)?)
}

pub fn delete_allergen_likelihood(conn: &mut SqliteConnection, entry_id: i32) -> QueryOutcome<()> {
    let deleted = diesel::delete(allergen_likelihoods::table.find(entry_id)).execute(conn)?;
    if deleted == 0 {
        return Err(QueryError::NotFound(Record::AllergenLikelihood));
    }
    log::debug!("deleted allergen {entry_id}");
    Ok(())
}
