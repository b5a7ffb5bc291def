/// diesel table for promo codes
table! {
    promo_codes (id) {
        id -> Integer,
        code -> VarChar,
        description -> VarChar,
        discount_type -> VarChar,
        discount_value -> Double,
        min_order_amount -> Double,
        max_discount -> Nullable<Double>,
        start_date -> Timestamp,
        end_date -> Timestamp,
        usage_limit -> Nullable<Integer>,
        used_count -> Integer,
        per_user_limit -> Integer,
        first_time_only -> Bool,
        is_active -> Bool,
        created_by -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

/// diesel table for per user promo code usages
table! {
    promo_code_usages (promo_code_id, user_id) {
        promo_code_id -> Integer,
        user_id -> Integer,
        count -> Integer,
        used_at -> Timestamp,
    }
}

/// diesel table for the discount columns of orders
table! {
    orders (id) {
        id -> Integer,
        user_id -> Integer,
        total -> Double,
        discount_code -> Nullable<VarChar>,
        discount_type -> Nullable<VarChar>,
        discount_value -> Nullable<Double>,
        discount_amount -> Nullable<Double>,
        final_total -> Nullable<Double>,
    }
}

joinable!(promo_code_usages -> promo_codes (promo_code_id));
allow_tables_to_appear_in_same_query!(promo_codes, promo_code_usages, orders);
