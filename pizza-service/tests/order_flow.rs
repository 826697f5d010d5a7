mod support;

use anyhow::{anyhow, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use httpmock::prelude::*;
use serde_json::json;
use pizza_service::franchise_handlers::{
    create_franchise, create_store, CreateFranchiseRequest, CreateStoreRequest,
};
use pizza_service::order_handlers::{
    add_menu_item, create_order, get_menu, get_orders, NewOrderRequest, OrdersQuery,
};
use pizza_service::store::{NewMenuItem, OrderItem};
use pizza_service::tokens::AuthUser;
use pizza_service::AppState;
use support::{
    build_state, build_state_with_factory, random_name, seed_admin, seed_diner, SeededUser,
    TestDatabase,
};

async fn authenticate(state: &AppState, seeded: &SeededUser) -> Result<AuthUser> {
    let user = state
        .tokens
        .store()
        .find_user_by_id(seeded.id)
        .await?
        .ok_or_else(|| anyhow!("seeded user missing"))?;
    let token = state.tokens.issue(&user).await?;
    Ok(AuthUser { user, token })
}

fn veggie() -> NewMenuItem {
    NewMenuItem {
        title: "Veggie".to_string(),
        description: "A garden of delight".to_string(),
        image: "pizza1.png".to_string(),
        price: 0.0038,
    }
}

/// Seeds a franchise with one store, returning (franchise_id, store_id).
async fn seed_storefront(state: &AppState, admin: &SeededUser) -> Result<(i64, i64)> {
    let auth = authenticate(state, admin).await?;
    let Json(franchise) = create_franchise(
        State(state.clone()),
        auth,
        Json(CreateFranchiseRequest {
            name: random_name("franchise"),
            admins: Vec::new(),
        }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;

    let auth = authenticate(state, admin).await?;
    let Json(store) = create_store(
        State(state.clone()),
        auth,
        Path(franchise.id),
        Json(CreateStoreRequest {
            name: "SLC".to_string(),
        }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;

    Ok((franchise.id, store.id))
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn menu_is_public_and_admin_extends_it() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = build_state(pool.clone())?;

    let admin = seed_admin(&pool).await?;
    let auth = authenticate(&state, &admin).await?;

    let Json(menu) = add_menu_item(State(state.clone()), auth, Json(veggie()))
        .await
        .map_err(|err| anyhow!("{err:?}"))?;
    assert!(menu.iter().any(|item| item.title == "Veggie"));

    // Anyone can read the menu without authenticating.
    let Json(listed) = get_menu(State(state.clone()))
        .await
        .map_err(|err| anyhow!("{err:?}"))?;
    assert_eq!(listed.len(), menu.len());

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn diner_cannot_extend_the_menu() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = build_state(pool.clone())?;

    let diner = seed_diner(&pool).await?;
    let auth = authenticate(&state, &diner).await?;

    let err = add_menu_item(State(state.clone()), auth, Json(veggie()))
        .await
        .expect_err("diner must not extend the menu");
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn diner_places_an_order_and_sees_it_in_history() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = build_state(pool.clone())?;

    let admin = seed_admin(&pool).await?;
    let diner = seed_diner(&pool).await?;
    let (franchise_id, store_id) = seed_storefront(&state, &admin).await?;

    let auth = authenticate(&state, &admin).await?;
    let Json(menu) = add_menu_item(State(state.clone()), auth, Json(veggie()))
        .await
        .map_err(|err| anyhow!("{err:?}"))?;
    let item = &menu[0];

    let auth = authenticate(&state, &diner).await?;
    let Json(placed) = create_order(
        State(state.clone()),
        auth.clone(),
        Json(NewOrderRequest {
            franchise_id,
            store_id,
            items: vec![OrderItem {
                menu_id: item.id,
                description: item.title.clone(),
                price: item.price,
            }],
        }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;

    assert_eq!(placed.order.franchise_id, franchise_id);
    assert_eq!(placed.order.store_id, store_id);
    assert_eq!(placed.order.items.len(), 1);
    assert_eq!(placed.order.items[0].menu_id, item.id);
    // No factory is configured in tests, so no fulfillment receipt comes back.
    assert!(placed.jwt.is_none());

    let Json(history) = get_orders(
        State(state.clone()),
        auth,
        Query(OrdersQuery { page: None }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;
    assert_eq!(history.diner_id, diner.id);
    assert_eq!(history.page, 1);
    assert!(history.orders.iter().any(|order| order.id == placed.order.id));

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn order_without_items_is_rejected() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = build_state(pool.clone())?;

    let admin = seed_admin(&pool).await?;
    let diner = seed_diner(&pool).await?;
    let (franchise_id, store_id) = seed_storefront(&state, &admin).await?;

    let auth = authenticate(&state, &diner).await?;
    let err = create_order(
        State(state.clone()),
        auth,
        Json(NewOrderRequest {
            franchise_id,
            store_id,
            items: Vec::new(),
        }),
    )
    .await
    .expect_err("an empty order must be rejected");
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn factory_receipt_is_attached_to_the_order() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();

    let server = MockServer::start();
    let fulfillment = server.mock(|when, then| {
        when.method(POST)
            .path("/api/order")
            .header("authorization", "Bearer test-factory-key");
        then.status(200).json_body(json!({
            "jwt": "factory.order.receipt",
            "reportUrl": "https://factory.test/report/1",
        }));
    });

    let state = build_state_with_factory(pool.clone(), Some(server.base_url()))?;
    let admin = seed_admin(&pool).await?;
    let diner = seed_diner(&pool).await?;
    let (franchise_id, store_id) = seed_storefront(&state, &admin).await?;

    let auth = authenticate(&state, &diner).await?;
    let Json(placed) = create_order(
        State(state.clone()),
        auth,
        Json(NewOrderRequest {
            franchise_id,
            store_id,
            items: vec![OrderItem {
                menu_id: 1,
                description: "Veggie".to_string(),
                price: 0.0038,
            }],
        }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;

    fulfillment.assert();
    assert_eq!(placed.jwt.as_deref(), Some("factory.order.receipt"));
    assert_eq!(
        placed.report_url.as_deref(),
        Some("https://factory.test/report/1")
    );

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn factory_rejection_fails_the_order_call() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();

    let server = MockServer::start();
    let fulfillment = server.mock(|when, then| {
        when.method(POST).path("/api/order");
        then.status(500);
    });

    let state = build_state_with_factory(pool.clone(), Some(server.base_url()))?;
    let admin = seed_admin(&pool).await?;
    let diner = seed_diner(&pool).await?;
    let (franchise_id, store_id) = seed_storefront(&state, &admin).await?;

    let auth = authenticate(&state, &diner).await?;
    let err = create_order(
        State(state.clone()),
        auth,
        Json(NewOrderRequest {
            franchise_id,
            store_id,
            items: vec![OrderItem {
                menu_id: 1,
                description: "Veggie".to_string(),
                price: 0.0038,
            }],
        }),
    )
    .await
    .expect_err("a factory rejection must fail the order call");

    fulfillment.assert();
    assert_eq!(
        err.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );

    // The order row itself is written before the fulfillment call.
    let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diner_orders WHERE diner_id = $1")
        .bind(diner.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(recorded, 1);

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres: embedded or external)")]
async fn order_history_is_scoped_to_the_caller() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let state = build_state(pool.clone())?;

    let admin = seed_admin(&pool).await?;
    let first = seed_diner(&pool).await?;
    let second = seed_diner(&pool).await?;
    let (franchise_id, store_id) = seed_storefront(&state, &admin).await?;

    let auth = authenticate(&state, &first).await?;
    create_order(
        State(state.clone()),
        auth,
        Json(NewOrderRequest {
            franchise_id,
            store_id,
            items: vec![OrderItem {
                menu_id: 1,
                description: "Veggie".to_string(),
                price: 0.0038,
            }],
        }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;

    let auth = authenticate(&state, &second).await?;
    let Json(history) = get_orders(
        State(state.clone()),
        auth,
        Query(OrdersQuery { page: None }),
    )
    .await
    .map_err(|err| anyhow!("{err:?}"))?;
    assert_eq!(history.diner_id, second.id);
    assert!(history.orders.is_empty());

    db.teardown().await?;
    Ok(())
}
