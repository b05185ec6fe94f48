//! Synchronization states of real object end points.

use entigraph_core::{
    ClientTransaction, CoreError, ObjectCommandKind, ObjectEndPointSyncState,
    OppositeObjectIdSetter, SyncStateKind, UnsynchronizedObjectEndPointSyncState, Value,
};
use entigraph_testkit::prelude::*;
use std::sync::Arc;

/// Inserts an order for `customer1` behind the back of a transaction that
/// has loaded `customer1.Orders` already, then loads it into the transaction.
fn unsynchronized_order(domain: &TestDomain, tx: &mut ClientTransaction) -> entigraph_core::ObjectId {
    tx.related_objects(&domain.customer1, "Orders").unwrap();
    let order = object_id("Order", 42);
    domain
        .source
        .insert(
            order.clone(),
            [
                ("OrderNumber".to_string(), Value::from(42i64)),
                ("Customer".to_string(), Value::from(domain.customer1.clone())),
            ],
        )
        .unwrap();
    tx.get_object(&order).unwrap();
    order
}

#[test]
fn test_loaded_object_starts_unknown() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.get_object(&domain.order1).unwrap();

    let id = end_point(&domain.order1, "Customer");
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Unknown);
}

#[test]
fn test_null_foreign_key_starts_synchronized() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.get_object(&domain.computer2).unwrap();

    let id = end_point(&domain.computer2, "Employee");
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_unidirectional_relation_starts_synchronized() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.get_object(&domain.location1).unwrap();

    let id = end_point(&domain.location1, "Client");
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_new_object_starts_synchronized() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = tx.new_object("Order").unwrap();

    let id = end_point(&order, "Customer");
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_loading_collection_resolves_registered_end_points() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.get_object(&domain.order1).unwrap();
    tx.get_object(&domain.order_without_order_item).unwrap();

    tx.related_objects(&domain.customer1, "Orders").unwrap();

    for order in [&domain.order1, &domain.order_without_order_item] {
        let id = end_point(order, "Customer");
        assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
    }
}

#[test]
fn test_object_loaded_after_collection_is_synchronized() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.related_objects(&domain.customer2, "Orders").unwrap();

    let id = end_point(&domain.order2, "Customer");
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_is_synchronized_loads_opposite_once() {
    let domain = TestDomain::seeded();
    let loader = CountingLazyLoader::new();
    let mut tx = domain.builder().lazy_loader(loader.clone()).build();
    tx.get_object(&domain.order1).unwrap();
    let id = end_point(&domain.order1, "Customer");

    assert!(tx.is_synchronized(&id).unwrap());
    assert!(tx.is_synchronized(&id).unwrap());

    assert_eq!(loader.calls(LoadKind::Opposite, &id), 1);
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_unknown_set_resolves_before_creating_command() {
    let domain = TestDomain::seeded();
    let loader = CountingLazyLoader::new();
    let mut tx = domain.builder().lazy_loader(loader.clone()).build();
    tx.get_object(&domain.order1).unwrap();
    let id = end_point(&domain.order1, "Customer");

    let command = tx.create_set_command(&id, Some(&domain.customer2)).unwrap();

    assert_eq!(command.kind(), ObjectCommandKind::SetOneMany);
    assert_eq!(command.old_related_object(), Some(&domain.customer1));
    assert_eq!(loader.calls(LoadKind::Opposite, &id), 1);
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
}

#[test]
fn test_unknown_state_propagates_load_failure() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .lazy_loader(Arc::new(FailingLazyLoader))
        .build();
    tx.get_object(&domain.order1).unwrap();
    let id = end_point(&domain.order1, "Customer");

    let err = tx.is_synchronized(&id).unwrap_err();

    assert!(matches!(err, CoreError::Load { .. }));
    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Unknown);
}

#[test]
fn test_object_missing_from_loaded_collection_is_unsynchronized() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = unsynchronized_order(&domain, &mut tx);
    let id = end_point(&order, "Customer");

    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Unsynchronized);
    assert!(!tx.is_synchronized(&id).unwrap());
    assert!(!tx
        .related_objects(&domain.customer1, "Orders")
        .unwrap()
        .contains(&order));
}

#[test]
fn test_unsynchronized_set_is_rejected() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = unsynchronized_order(&domain, &mut tx);

    for target in [None, Some(&domain.customer1), Some(&domain.customer2)] {
        let err = tx.set_related_object(&order, "Customer", target).unwrap_err();
        assert!(err.is_out_of_sync(), "unexpected error {err}");
    }
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn test_unsynchronized_delete_is_rejected() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = unsynchronized_order(&domain, &mut tx);

    let err = tx.delete_object(&order).unwrap_err();

    assert!(matches!(err, CoreError::OutOfSync { .. }));
    assert!(!tx.data_containers().get(&order).unwrap().is_deleted());
}

#[test]
fn test_unsynchronized_state_rejects_commands_directly() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = unsynchronized_order(&domain, &mut tx);
    let id = end_point(&order, "Customer");
    let state = UnsynchronizedObjectEndPointSyncState;

    let set = state.create_set_command(&mut tx, &id, None, OppositeObjectIdSetter::RealObject);
    let delete = state.create_delete_command(&mut tx, &id, OppositeObjectIdSetter::RealObject);

    assert!(set.unwrap_err().is_out_of_sync());
    assert!(delete.unwrap_err().is_out_of_sync());
}

#[test]
fn test_synchronize_adds_object_to_opposite_collection() {
    let domain = TestDomain::seeded();
    let stats = Arc::new(entigraph_core::TransactionStats::new());
    let mut tx = domain.builder().stats(stats.clone()).build();
    let order = unsynchronized_order(&domain, &mut tx);
    let id = end_point(&order, "Customer");

    tx.synchronize(&id).unwrap();

    assert_eq!(tx.sync_state_kind(&id).unwrap(), SyncStateKind::Synchronized);
    assert!(tx
        .related_objects(&domain.customer1, "Orders")
        .unwrap()
        .contains(&order));
    assert!(tx
        .original_related_objects(&domain.customer1, "Orders")
        .unwrap()
        .contains(&order));
    assert!(!tx
        .end_point_has_changed(&end_point(&domain.customer1, "Orders"))
        .unwrap());
    assert_eq!(stats.synchronizations(), 1);

    tx.set_related_object(&order, "Customer", Some(&domain.customer2))
        .unwrap();
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_synchronize_on_synchronized_end_point_does_not_load() {
    let domain = TestDomain::seeded();
    let loader = CountingLazyLoader::new();
    let mut tx = domain.builder().lazy_loader(loader.clone()).build();
    tx.get_object(&domain.computer2).unwrap();
    let id = end_point(&domain.computer2, "Employee");

    tx.synchronize(&id).unwrap();

    assert_eq!(loader.total_calls(LoadKind::Opposite), 0);
    assert_eq!(loader.total_calls(LoadKind::VirtualObject), 0);
    assert_eq!(loader.total_calls(LoadKind::Collection), 0);
}

#[test]
fn test_unload_returns_end_points_to_unknown() {
    let domain = TestDomain::seeded();
    let loader = CountingLazyLoader::new();
    let mut tx = domain.builder().lazy_loader(loader.clone()).build();
    let orders = end_point(&domain.customer1, "Orders");
    tx.related_objects(&domain.customer1, "Orders").unwrap();
    let order_customer = end_point(&domain.order1, "Customer");
    assert_eq!(
        tx.sync_state_kind(&order_customer).unwrap(),
        SyncStateKind::Synchronized
    );

    tx.unload_virtual_end_point(&orders).unwrap();

    assert_eq!(
        tx.sync_state_kind(&order_customer).unwrap(),
        SyncStateKind::Unknown
    );
    assert!(!tx.end_points().get(&orders).unwrap().is_data_complete());

    tx.related_objects(&domain.customer1, "Orders").unwrap();
    assert_eq!(loader.calls(LoadKind::Collection, &orders), 2);
    assert_eq!(
        tx.sync_state_kind(&order_customer).unwrap(),
        SyncStateKind::Synchronized
    );
}

#[test]
fn test_unload_of_changed_end_point_is_rejected() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer1, "Orders");
    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .remove(&domain.order1)
        .unwrap();

    let err = tx.unload_virtual_end_point(&orders).unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert!(tx.end_points().get(&orders).unwrap().is_data_complete());
}

#[test]
fn test_virtual_object_reloads_after_unload() {
    let domain = TestDomain::seeded();
    let loader = CountingLazyLoader::new();
    let mut tx = domain.builder().lazy_loader(loader.clone()).build();
    let computer = end_point(&domain.employee1, "Computer");

    assert_eq!(
        tx.related_object(&domain.employee1, "Computer").unwrap(),
        Some(domain.computer1.clone())
    );
    tx.related_object(&domain.employee1, "Computer").unwrap();
    assert_eq!(loader.calls(LoadKind::VirtualObject, &computer), 1);

    tx.unload_virtual_end_point(&computer).unwrap();
    assert_eq!(
        tx.related_object(&domain.employee1, "Computer").unwrap(),
        Some(domain.computer1.clone())
    );
    assert_eq!(loader.calls(LoadKind::VirtualObject, &computer), 2);
}

#[test]
fn test_sync_state_of_virtual_end_point_is_rejected() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let err = tx
        .sync_state_kind(&end_point(&domain.customer1, "Orders"))
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}
