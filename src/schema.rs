diesel::table! {
    dishes (id) {
        id -> Integer,
        name -> Text,
        country -> Text,
    }
}

diesel::table! {
    allergen_likelihoods (id) {
        id -> Integer,
        dish_id -> Integer,
        allergen -> Text,
        likelihood -> Integer,
    }
}

diesel::joinable!(allergen_likelihoods -> dishes (dish_id));

diesel::allow_tables_to_appear_in_same_query!(allergen_likelihoods, dishes);
