//! Test fixtures: an order catalog and helpers to seed it.

#![allow(dead_code)]

use softdel_core::{Catalog, EntityRef, EntitySchema, FieldRule, Record};
use softdel_metadata::RecordRepo;
use std::sync::Arc;

/// Orders own items and notes; items own parts; customers own orders.
/// `audit_log` carries no status columns.
pub fn order_catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new([
            EntitySchema::new("customers").relation("orders", "orders", "customer_id"),
            EntitySchema::new("orders")
                .relation("items", "order_items", "order_id")
                .relation("notes", "order_notes", "order_id"),
            EntitySchema::new("order_items")
                .relation("parts", "item_parts", "item_id")
                .rule(FieldRule::Required {
                    field: "sku".to_string(),
                }),
            EntitySchema::new("item_parts"),
            EntitySchema::new("order_notes").rule(FieldRule::MaxLength {
                field: "body".to_string(),
                max: 40,
            }),
            EntitySchema::new("audit_log").without_status(),
        ])
        .expect("order catalog is consistent"),
    )
}

pub fn order_ref(id: i64) -> EntityRef {
    EntityRef::new("orders", id)
}

pub fn item_ref(id: i64) -> EntityRef {
    EntityRef::new("order_items", id)
}

pub fn part_ref(id: i64) -> EntityRef {
    EntityRef::new("item_parts", id)
}

pub fn note_ref(id: i64) -> EntityRef {
    EntityRef::new("order_notes", id)
}

pub async fn seed_order(store: &dyn RecordRepo, id: i64) -> Record {
    let order = Record::new("orders", id).with_attribute("customer_id", 1);
    store.insert_record(&order).await.expect("insert order");
    order
}

pub async fn seed_item(store: &dyn RecordRepo, id: i64, order_id: i64) -> Record {
    let item = Record::new("order_items", id)
        .with_attribute("order_id", order_id)
        .with_attribute("sku", format!("SKU-{id}"));
    store.insert_record(&item).await.expect("insert item");
    item
}

pub async fn seed_part(store: &dyn RecordRepo, id: i64, item_id: i64) -> Record {
    let part = Record::new("item_parts", id).with_attribute("item_id", item_id);
    store.insert_record(&part).await.expect("insert part");
    part
}

pub async fn seed_note(store: &dyn RecordRepo, id: i64, order_id: i64) -> Record {
    let note = Record::new("order_notes", id)
        .with_attribute("order_id", order_id)
        .with_attribute("body", "leave at the door");
    store.insert_record(&note).await.expect("insert note");
    note
}

/// Order #1 with items #10 and #11.
pub async fn seed_order_with_items(store: &dyn RecordRepo) -> Record {
    let order = seed_order(store, 1).await;
    seed_item(store, 10, 1).await;
    seed_item(store, 11, 1).await;
    order
}
