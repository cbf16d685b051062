//! Multi-item sale behavior against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use bolsita_core::sale::{Cart, Discount};
use bolsita_core::{
    CoreError, EntryKind, EntryPatch, Money, NewProduct, OwnerId, PaymentMethod, Product,
    ValidationError,
};
use bolsita_db::{Database, DbConfig, DbError, MemoryStore, OwnerDb, RetryPolicy};

async fn shop() -> OwnerDb {
    Database::new(DbConfig::in_memory())
        .await
        .unwrap()
        .owner(OwnerId::new("shop-1"))
}

async fn add(shop: &OwnerDb, name: &str, cents: i64, stock: i64) -> Product {
    shop.products()
        .create(NewProduct {
            name: name.to_string(),
            cost_price: Money::from_cents(cents / 2),
            sale_price: Money::from_cents(cents),
            stock,
            barcode: None,
        })
        .await
        .unwrap()
}

async fn stock_of(shop: &OwnerDb, product: &Product) -> i64 {
    shop.products().get(&product.id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn test_scenario_sale_succeeds() {
    let shop = shop().await;
    let a = add(&shop, "A", 1000, 5).await;
    let b = add(&shop, "B", 500, 1).await;

    let cart = Cart::from_items([(&a, 2), (&b, 1)]).unwrap();
    let entry = shop
        .sales()
        .record_multi_item_sale(
            &cart,
            Some(String::new()),
            PaymentMethod::Cash,
            Discount::Fixed(Money::from_cents(100)),
        )
        .await
        .unwrap();

    assert_eq!(entry.amount, Money::from_cents(2400));
    assert_eq!(entry.discount_amount, Some(Money::from_cents(100)));
    assert_eq!(entry.concept, "Venta de 2 productos diferentes");
    assert_eq!(entry.category_id, None);
    assert_eq!(entry.payment_method, Some(PaymentMethod::Cash));

    let items = entry.items.clone().unwrap();
    let gross: Money = items.iter().map(|i| i.line_total()).sum();
    assert_eq!(gross - entry.discount_amount.unwrap(), entry.amount);

    assert_eq!(stock_of(&shop, &a).await, 3);
    assert_eq!(stock_of(&shop, &b).await, 0);

    let ledger = shop.ledger().list().await.unwrap();
    assert_eq!(ledger, vec![entry]);
}

#[tokio::test]
async fn test_scenario_insufficient_stock_writes_nothing() {
    let shop = shop().await;
    let a = add(&shop, "A", 1000, 5).await;
    let b = add(&shop, "B", 500, 0).await;

    let mut b_in_cart = b.clone();
    b_in_cart.stock = 1;
    let cart = Cart::from_items([(&a, 2), (&b_in_cart, 1)]).unwrap();

    let err = shop
        .sales()
        .record_multi_item_sale(
            &cart,
            None,
            PaymentMethod::Cash,
            Discount::Fixed(Money::from_cents(100)),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        DbError::Rule(CoreError::InsufficientStock {
            product: "B".to_string(),
            available: 0,
            requested: 1,
        })
        .to_string()
    );
    assert_eq!(stock_of(&shop, &a).await, 5);
    assert_eq!(stock_of(&shop, &b).await, 0);
    assert!(shop.ledger().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_carts_within_stock_decrement_exactly() {
    let shop = shop().await;
    let products = vec![
        add(&shop, "Arroz", 150, 10).await,
        add(&shop, "Frijol", 220, 4).await,
        add(&shop, "Aceite", 399, 7).await,
    ];

    for quantities in [[1, 1, 1], [3, 0, 2], [6, 3, 4]] {
        let before: Vec<i64> = futures_stock(&shop, &products).await;
        let items: Vec<(&Product, i64)> = products
            .iter()
            .zip(quantities)
            .filter(|(_, q)| *q > 0)
            .collect();
        let cart = Cart::from_items(items).unwrap();
        let expected = cart.subtotal().unwrap();

        let entry = shop
            .sales()
            .record_multi_item_sale(&cart, None, PaymentMethod::Card, Discount::None)
            .await
            .unwrap();
        assert_eq!(entry.amount, expected);

        let after = futures_stock(&shop, &products).await;
        for i in 0..products.len() {
            assert_eq!(after[i], before[i] - quantities[i]);
        }
    }

    assert_eq!(shop.ledger().list().await.unwrap().len(), 3);
}

async fn futures_stock(shop: &OwnerDb, products: &[Product]) -> Vec<i64> {
    let mut out = Vec::with_capacity(products.len());
    for p in products {
        out.push(stock_of(shop, p).await);
    }
    out
}

#[tokio::test]
async fn test_duplicate_lines_checked_against_combined_quantity() {
    let shop = shop().await;
    let a = add(&shop, "A", 100, 3).await;

    let cart = Cart::from_items([(&a, 2), (&a, 2)]).unwrap();
    let err = shop
        .sales()
        .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Rule(CoreError::InsufficientStock { requested: 4, .. })
    ));
    assert_eq!(stock_of(&shop, &a).await, 3);
}

#[tokio::test]
async fn test_discount_above_subtotal_rejected_before_store() {
    let shop = shop().await;
    let a = add(&shop, "A", 100, 3).await;
    let cart = Cart::from_items([(&a, 1)]).unwrap();

    let err = shop
        .sales()
        .record_multi_item_sale(
            &cart,
            None,
            PaymentMethod::Cash,
            Discount::Fixed(Money::from_cents(101)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Rule(CoreError::DiscountExceedsSubtotal { .. })
    ));
    assert_eq!(stock_of(&shop, &a).await, 3);
}

#[tokio::test]
async fn test_sale_entry_edits_keep_items_and_amount_consistent() {
    let shop = shop().await;
    let a = add(&shop, "A", 1000, 5).await;
    let cart = Cart::from_items([(&a, 2)]).unwrap();
    let sale = shop
        .sales()
        .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
        .await
        .unwrap();

    for patch in [
        EntryPatch {
            amount: Some(Money::from_cents(1)),
            ..Default::default()
        },
        EntryPatch {
            kind: Some(EntryKind::Expense),
            ..Default::default()
        },
    ] {
        let err = shop.ledger().update(&sale.id, patch).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::Validation(ValidationError::Locked { .. }))
        ));
    }

    let edited = shop
        .ledger()
        .update(
            &sale.id,
            EntryPatch {
                concept: Some("Venta mostrador".to_string()),
                category_id: Some(Some("ventas".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.concept, "Venta mostrador");
    assert_eq!(edited.category_id.as_deref(), Some("ventas"));

    let stored = shop.ledger().get(&sale.id).await.unwrap().unwrap();
    let gross: Money = stored.items.as_ref().unwrap().iter().map(|i| i.line_total()).sum();
    assert_eq!(gross - stored.discount_amount.unwrap(), stored.amount);
    assert_eq!(stored.amount, Money::from_cents(2000));
    assert!(stored.is_income());
}

#[tokio::test]
async fn test_price_above_limit_rejected() {
    let shop = shop().await;
    let err = shop
        .products()
        .create(NewProduct {
            name: "Lingote".to_string(),
            cost_price: Money::zero(),
            sale_price: Money::from_cents(i64::MAX / 2),
            stock: 10,
            barcode: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Rule(CoreError::Validation(ValidationError::OutOfRange { .. }))
    ));
    assert!(shop.products().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overflowing_cart_writes_nothing() {
    let shop = shop().await;
    let a = add(&shop, "A", 1000, 10).await;

    // A cart restored from JSON never went through `Cart::add`.
    let cart: Cart = serde_json::from_value(serde_json::json!({
        "lines": [{
            "productId": a.id,
            "productName": "A",
            "unitPrice": i64::MAX / 2,
            "quantity": 3,
        }]
    }))
    .unwrap();

    let err = shop
        .sales()
        .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));
    assert_eq!(stock_of(&shop, &a).await, 10);
    assert!(shop.ledger().list().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let store = Arc::new(MemoryStore::new());
    let policy = RetryPolicy::new(50, Duration::from_millis(1), Duration::from_millis(20));
    let db = Database::with_store(store, policy);
    let shop = db.owner(OwnerId::new("race"));

    let a = add(&shop, "A", 100, 10).await;
    let b = add(&shop, "B", 100, 10).await;

    let mut handles = Vec::new();
    for n in 0..16 {
        let shop = shop.clone();
        let (a, b) = (a.clone(), b.clone());
        handles.push(tokio::spawn(async move {
            let cart = if n % 2 == 0 {
                Cart::from_items([(&a, 1), (&b, 1)]).unwrap()
            } else {
                Cart::from_items([(&a, 2)]).unwrap()
            };
            shop.sales()
                .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
                .await
        }));
    }

    let mut sold_a = 0;
    let mut sold_b = 0;
    let mut successes = 0;
    for (n, handle) in handles.into_iter().enumerate() {
        match handle.await.unwrap() {
            Ok(_) => {
                successes += 1;
                if n % 2 == 0 {
                    sold_a += 1;
                    sold_b += 1;
                } else {
                    sold_a += 2;
                }
            }
            Err(DbError::Rule(CoreError::InsufficientStock { .. })) | Err(DbError::Contention { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let stock_a = stock_of(&shop, &a).await;
    let stock_b = stock_of(&shop, &b).await;
    assert!(stock_a >= 0 && stock_b >= 0);
    assert_eq!(stock_a, 10 - sold_a);
    assert_eq!(stock_b, 10 - sold_b);
    assert_eq!(shop.ledger().list().await.unwrap().len(), successes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_racing_sales_at_most_one_wins() {
    let shop = shop().await;
    let a = add(&shop, "A", 100, 5).await;

    let cart = Cart::from_items([(&a, 3)]).unwrap();
    let (first, second) = tokio::join!(
        tokio::spawn({
            let (shop, cart) = (shop.clone(), cart.clone());
            async move {
                shop.sales()
                    .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
                    .await
            }
        }),
        tokio::spawn({
            let (shop, cart) = (shop.clone(), cart.clone());
            async move {
                shop.sales()
                    .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
                    .await
            }
        }),
    );

    let wins = [first.unwrap(), second.unwrap()]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(wins, 1);
    assert_eq!(stock_of(&shop, &a).await, 2);
}

#[tokio::test]
async fn test_subscription_sees_sale() {
    let shop = shop().await;
    let a = add(&shop, "A", 100, 5).await;

    let mut live = shop.products().subscribe().await.unwrap();
    assert_eq!(live.current()[0].stock, 5);

    let cart = Cart::from_items([(&a, 2)]).unwrap();
    shop.sales()
        .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
        .await
        .unwrap();

    let snapshot = live.changed().await.unwrap();
    assert_eq!(snapshot[0].stock, 3);
    live.unsubscribe();
}
