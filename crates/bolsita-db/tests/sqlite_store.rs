//! The sale and payment flows on the SQLite backend.

use bolsita_core::sale::{Cart, Discount};
use bolsita_core::{
    CoreError, DebtDirection, Money, NewDebt, NewProduct, OwnerId, PaymentMethod, Product,
};
use bolsita_db::{Database, DbConfig, DbError, OwnerDb};

async fn sqlite_shop() -> (Database, OwnerDb) {
    let db = Database::new(DbConfig::sqlite_in_memory()).await.unwrap();
    let shop = db.owner(OwnerId::new("shop-1"));
    (db, shop)
}

async fn add(shop: &OwnerDb, name: &str, cents: i64, stock: i64) -> Product {
    shop.products()
        .create(NewProduct {
            name: name.to_string(),
            cost_price: Money::from_cents(cents / 2),
            sale_price: Money::from_cents(cents),
            stock,
            barcode: Some(format!("750{name}")),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sale_commits_on_sqlite() {
    let (db, shop) = sqlite_shop().await;
    let a = add(&shop, "A", 1000, 5).await;
    let b = add(&shop, "B", 500, 1).await;

    let cart = Cart::from_items([(&a, 2), (&b, 1)]).unwrap();
    let entry = shop
        .sales()
        .record_multi_item_sale(
            &cart,
            None,
            PaymentMethod::Transfer,
            Discount::Fixed(Money::from_cents(100)),
        )
        .await
        .unwrap();

    assert_eq!(entry.amount, Money::from_cents(2400));
    assert_eq!(shop.products().get(&a.id).await.unwrap().unwrap().stock, 3);
    assert_eq!(shop.products().get(&b.id).await.unwrap().unwrap().stock, 0);

    let stored = shop.ledger().get(&entry.id).await.unwrap().unwrap();
    assert_eq!(stored, entry);
    db.close().await;
}

#[tokio::test]
async fn test_failed_sale_rolls_back_on_sqlite() {
    let (db, shop) = sqlite_shop().await;
    let a = add(&shop, "A", 1000, 5).await;
    let b = add(&shop, "B", 500, 0).await;

    let mut b_in_cart = b.clone();
    b_in_cart.stock = 3;
    let cart = Cart::from_items([(&a, 2), (&b_in_cart, 1)]).unwrap();

    let err = shop
        .sales()
        .record_multi_item_sale(&cart, None, PaymentMethod::Cash, Discount::None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Rule(CoreError::InsufficientStock { available: 0, .. })
    ));
    assert_eq!(shop.products().get(&a.id).await.unwrap().unwrap().stock, 5);
    assert!(shop.ledger().list().await.unwrap().is_empty());
    db.close().await;
}

#[tokio::test]
async fn test_payments_and_profile_on_sqlite() {
    let (db, shop) = sqlite_shop().await;
    let debt = shop
        .debts()
        .create(NewDebt {
            direction: DebtDirection::Payable,
            person_name: "Distribuidora".to_string(),
            initial_amount: Money::from_cents(3_000),
            concept: "Pedido".to_string(),
            due_date: None,
        })
        .await
        .unwrap();

    let (after, _) = shop
        .debts()
        .apply_payment(&debt.id, Money::from_cents(1_200))
        .await
        .unwrap();
    assert_eq!(after.current_balance, Money::from_cents(1_800));

    assert_eq!(shop.profile().next_receipt_number().await.unwrap(), 1);
    assert_eq!(shop.profile().next_receipt_number().await.unwrap(), 2);

    let found = shop.products().find_by_barcode("750none").await.unwrap();
    assert!(found.is_none());
    db.close().await;
}

#[tokio::test]
async fn test_import_many_rows_on_sqlite() {
    let (db, shop) = sqlite_shop().await;
    let rows: Vec<NewProduct> = (0..450)
        .map(|n| NewProduct {
            name: format!("Producto {n:03}"),
            cost_price: Money::from_cents(50),
            sale_price: Money::from_cents(100),
            stock: n % 7,
            barcode: None,
        })
        .collect();

    let imported = shop.products().import(rows).await.unwrap();
    assert_eq!(imported, 450);

    let products = shop.products().list().await.unwrap();
    assert_eq!(products.len(), 450);
    assert_eq!(products[0].name, "Producto 000");
    db.close().await;
}
