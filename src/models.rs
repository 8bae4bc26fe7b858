use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{allergen_likelihoods, dishes};

pub const LIKELIHOOD_MIN: i32 = 0;
pub const LIKELIHOOD_MAX: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = dishes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Dish {
    pub id: i32,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = dishes)]
pub struct NewDish {
    pub name: String,
    pub country: String,
}

/// A dish together with the allergens recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DishDetail {
    #[serde(flatten)]
    pub dish: Dish,
    pub allergens: Vec<NestedAllergen>,
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Queryable,
    Selectable,
    Identifiable,
    Associations,
)]
#[diesel(table_name = allergen_likelihoods)]
#[diesel(belongs_to(Dish))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AllergenLikelihood {
    pub id: i32,
    pub dish_id: i32,
    pub allergen: String,
    pub likelihood: i32,
}

#[derive(Debug, Clone, Deserialize, Insertable)]
#[diesel(table_name = allergen_likelihoods)]
pub struct NewAllergenLikelihood {
    pub dish_id: i32,
    pub allergen: String,
    pub likelihood: i32,
}

impl NewAllergenLikelihood {
    pub fn likelihood_in_range(&self) -> bool {
        (LIKELIHOOD_MIN..=LIKELIHOOD_MAX).contains(&self.likelihood)
    }
}

/// Allergen entry as embedded in a dish, without its own id or owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedAllergen {
    pub allergen: String,
    pub likelihood: i32,
}

impl From<AllergenLikelihood> for NestedAllergen {
    fn from(entry: AllergenLikelihood) -> Self {
        Self {
            allergen: entry.allergen,
            likelihood: entry.likelihood,
        }
    }
}

impl DishDetail {
    pub(crate) fn new(dish: Dish, allergens: Vec<AllergenLikelihood>) -> Self {
        Self {
            dish,
            allergens: allergens.into_iter().map(NestedAllergen::from).collect(),
        }
    }
}
