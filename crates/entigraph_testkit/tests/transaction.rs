//! Deletion, commit and rollback through the client transaction.

use entigraph_core::{
    ChangeDetection, ClientTransaction, CoreError, DataContainerState, InMemoryPersistenceSource,
    PersistedChangeKind, TransactionConfig, TransactionState, TransactionStats, Value,
};
use entigraph_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn test_move_order_between_customers() {
    init_test_tracing();
    scenarios::test_move_order_between_customers(&TestDomain::seeded());
}

#[test]
fn test_rollback_restores_relations() {
    scenarios::test_rollback_restores_relations(&TestDomain::seeded());
}

#[test]
fn test_commit_persists_foreign_keys() {
    scenarios::test_commit_persists_foreign_keys(&TestDomain::seeded());
}

/// Opens a transaction over an employee supervising itself and one subordinate.
fn self_supervised_employees() -> (
    Arc<InMemoryPersistenceSource>,
    ClientTransaction,
    [entigraph_core::ObjectId; 2],
) {
    let mapping = employee_hierarchy_mapping();
    let source = Arc::new(InMemoryPersistenceSource::new(Arc::clone(&mapping)));
    let boss = object_id("Employee", 1);
    let worker = object_id("Employee", 2);
    for employee in [&boss, &worker] {
        source
            .insert(
                employee.clone(),
                [("Supervisor".to_string(), Value::from(boss.clone()))],
            )
            .unwrap();
    }
    let tx = ClientTransaction::new(mapping, source.clone());
    (source, tx, [boss, worker])
}

#[test]
fn test_delete_of_self_referencing_object() {
    let (source, mut tx, [boss, worker]) = self_supervised_employees();
    assert!(tx
        .related_objects(&boss, "Subordinates")
        .unwrap()
        .contains(&boss));

    tx.delete_object(&boss).unwrap();

    assert_eq!(
        tx.data_containers().get(&boss).unwrap().state(),
        DataContainerState::Deleted
    );
    assert_eq!(tx.related_object(&worker, "Supervisor").unwrap(), None);

    tx.commit().unwrap();
    assert!(!source.contains(&boss));
    assert_eq!(
        source.row(&worker).unwrap().get("Supervisor"),
        Some(&Value::Null)
    );
}

#[test]
fn test_rollback_of_self_referencing_delete() {
    let (_source, mut tx, [boss, worker]) = self_supervised_employees();

    tx.delete_object(&boss).unwrap();
    tx.rollback().unwrap();

    assert_eq!(
        tx.related_object(&boss, "Supervisor").unwrap(),
        Some(boss.clone())
    );
    assert_eq!(
        tx.related_object(&worker, "Supervisor").unwrap(),
        Some(boss.clone())
    );
    let subordinates = tx.related_objects(&boss, "Subordinates").unwrap().to_vec();
    assert_eq!(subordinates.len(), 2);
    assert!(subordinates.contains(&boss) && subordinates.contains(&worker));
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn test_delete_unlinks_every_related_object() {
    let domain = TestDomain::seeded();
    let listener = RecordingListener::new();
    let mut tx = domain.builder().listener(listener.clone()).build();

    tx.delete_object(&domain.order1).unwrap();

    assert!(!tx
        .related_objects(&domain.customer1, "Orders")
        .unwrap()
        .contains(&domain.order1));
    assert_eq!(tx.related_object(&domain.order_item1, "Order").unwrap(), None);
    assert_eq!(tx.related_object(&domain.order_item2, "Order").unwrap(), None);
    assert_eq!(tx.related_object(&domain.order_ticket1, "Order").unwrap(), None);
    assert_eq!(tx.related_object(&domain.order1, "Customer").unwrap(), None);
    assert_eq!(
        tx.data_containers().get(&domain.order1).unwrap().state(),
        DataContainerState::Deleted
    );

    let events = listener.events();
    let deleting = events
        .iter()
        .position(|event| event == &ListenerEvent::ObjectDeleting(domain.order1.clone()))
        .unwrap();
    let deleted = events
        .iter()
        .position(|event| event == &ListenerEvent::ObjectDeleted(domain.order1.clone()))
        .unwrap();
    assert!(deleting < deleted);
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_delete_of_virtual_side_clears_foreign_key() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    tx.delete_object(&domain.employee1).unwrap();

    assert_eq!(tx.related_object(&domain.computer1, "Employee").unwrap(), None);
    assert!(tx
        .end_point_has_changed(&end_point(&domain.computer1, "Employee"))
        .unwrap());
}

#[test]
fn test_delete_empty_collection_owner_touches_collection() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer3, "Orders");

    tx.delete_object(&domain.customer3).unwrap();

    assert!(tx.end_point_has_been_touched(&orders).unwrap());
    assert!(!tx.end_point_has_changed(&orders).unwrap());
}

#[test]
fn test_deleted_object_cannot_be_changed() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.delete_object(&domain.order2).unwrap();

    let set = tx.set_related_object(&domain.order2, "Customer", Some(&domain.customer1));
    let link = tx.set_related_object(&domain.order_ticket1, "Order", Some(&domain.order2));
    let again = tx.delete_object(&domain.order2);

    assert!(matches!(set, Err(CoreError::ObjectDeleted { .. })));
    assert!(matches!(link, Err(CoreError::ObjectDeleted { .. })));
    assert!(matches!(again, Err(CoreError::ObjectDeleted { .. })));
}

#[test]
fn test_commit_rejects_unset_mandatory_relation() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.delete_object(&domain.order1).unwrap();

    let err = tx.commit().unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert!(domain.source.contains(&domain.order1));
    assert!(tx.has_changed().unwrap());
}

#[test]
fn test_commit_of_delete_removes_rows_and_objects() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.delete_object(&domain.order1).unwrap();
    tx.delete_object(&domain.order_ticket1).unwrap();

    tx.commit().unwrap();

    assert!(!domain.source.contains(&domain.order1));
    assert!(!domain.source.contains(&domain.order_ticket1));
    assert!(tx.data_containers().get(&domain.order1).is_none());
    assert!(!tx.has_changed().unwrap());
    let item_row = domain.source.row(&domain.order_item1).unwrap();
    assert_eq!(item_row.get("Order"), Some(&Value::Null));
    assert_eq!(
        tx.related_objects(&domain.customer1, "Orders").unwrap().to_vec(),
        vec![domain.order_without_order_item.clone()]
    );
}

#[test]
fn test_rollback_restores_deleted_object() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let before = RelationSnapshot::capture(&domain, &mut tx).unwrap();
    tx.delete_object(&domain.order1).unwrap();

    tx.rollback().unwrap();

    assert_eq!(
        tx.data_containers().get(&domain.order1).unwrap().state(),
        DataContainerState::Unchanged
    );
    assert_eq!(RelationSnapshot::capture(&domain, &mut tx).unwrap(), before);
    assert_eq!(
        tx.related_object(&domain.order_ticket1, "Order").unwrap(),
        Some(domain.order1.clone())
    );
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_rollback_forgets_new_objects() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = tx.new_object("Order").unwrap();
    tx.set_related_object(&order, "Customer", Some(&domain.customer2))
        .unwrap();

    tx.rollback().unwrap();

    assert!(tx.data_containers().get(&order).is_none());
    assert_eq!(
        tx.related_objects(&domain.customer2, "Orders").unwrap().to_vec(),
        vec![domain.order2.clone()]
    );
    assert!(matches!(
        tx.get_object(&order),
        Err(CoreError::ObjectNotFound { .. })
    ));
}

#[test]
fn test_commit_of_new_object_inserts_row() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = tx.new_object("Order").unwrap();
    tx.set_property_value(&order, "OrderNumber", 99i64).unwrap();
    tx.related_objects_mut(&domain.customer3, "Orders")
        .unwrap()
        .add(order.clone())
        .unwrap();

    let changes = tx.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, PersistedChangeKind::New);
    tx.commit().unwrap();

    let row = domain.source.row(&order).unwrap();
    assert_eq!(row.get("OrderNumber"), Some(&Value::from(99i64)));
    assert_eq!(row.get("Customer"), Some(&Value::from(domain.customer3.clone())));
    assert_eq!(
        tx.data_containers().get(&order).unwrap().state(),
        DataContainerState::Unchanged
    );
    assert!(tx.changes().is_empty());
}

#[test]
fn test_new_object_deleted_again_is_not_persisted() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let order = tx.new_object("Order").unwrap();
    tx.delete_object(&order).unwrap();

    assert!(tx.changes().is_empty());
    tx.commit().unwrap();

    assert!(!domain.source.contains(&order));
    assert_eq!(domain.source.persist_calls(), 0);
}

#[test]
fn test_foreign_key_property_cannot_be_written_directly() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let err = tx
        .set_property_value(&domain.order1, "Customer", Value::from(domain.customer2.clone()))
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
}

#[test]
fn test_property_read_notifies_but_relation_read_does_not() {
    let domain = TestDomain::seeded();
    let listener = RecordingListener::new();
    let mut tx = domain.builder().listener(listener.clone()).build();

    tx.related_object(&domain.order1, "Customer").unwrap();
    assert!(listener.is_empty());

    tx.property_value(&domain.order1, "OrderNumber").unwrap();
    assert_eq!(
        listener.events(),
        vec![ListenerEvent::PropertyValueRead {
            object_id: domain.order1.clone(),
            property_name: "OrderNumber".to_string(),
        }]
    );
}

#[test]
fn test_failed_persist_keeps_changes() {
    let domain = TestDomain::seeded();
    let source = Arc::new(FailingPersistenceSource::new(domain.source.clone()));
    let mut tx = ClientTransaction::builder(Arc::clone(&domain.mapping), source.clone()).build();
    tx.set_related_object(&domain.order2, "Customer", Some(&domain.customer3))
        .unwrap();

    source.fail_persist(true);
    assert!(tx.commit().is_err());
    assert!(tx.has_changed().unwrap());
    assert_eq!(
        domain.source.row(&domain.order2).unwrap().get("Customer"),
        Some(&Value::from(domain.customer2.clone()))
    );

    source.fail_persist(false);
    tx.commit().unwrap();
    assert!(!tx.has_changed().unwrap());
    assert_eq!(
        domain.source.row(&domain.order2).unwrap().get("Customer"),
        Some(&Value::from(domain.customer3.clone()))
    );
}

#[test]
fn test_commit_without_changes_skips_persistence() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.related_objects(&domain.customer1, "Orders").unwrap();

    tx.commit().unwrap();

    assert_eq!(domain.source.persist_calls(), 0);
}

#[test]
fn test_commit_without_persisting() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .config(TransactionConfig::new().persist_on_commit(false))
        .build();
    tx.set_related_object(&domain.order2, "Customer", None).unwrap();

    tx.commit().unwrap();

    assert!(!tx.has_changed().unwrap());
    assert_eq!(domain.source.persist_calls(), 0);
    assert_eq!(
        tx.original_related_object(&domain.order2, "Customer").unwrap(),
        None
    );
}

#[test]
fn test_commit_with_consistency_check() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .config(TransactionConfig::new().verify_consistency_on_commit(true))
        .build();
    tx.set_related_object(&domain.computer2, "Employee", Some(&domain.employee2))
        .unwrap();
    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .remove(&domain.order_without_order_item)
        .unwrap();

    tx.commit().unwrap();
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_set_change_detection_ignores_reordering() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .config(TransactionConfig::new().collection_change_detection(ChangeDetection::Set))
        .build();
    let orders = end_point(&domain.customer1, "Orders");

    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .set_all(vec![
            domain.order_without_order_item.clone(),
            domain.order1.clone(),
        ])
        .unwrap();

    assert!(!tx.end_point_has_changed(&orders).unwrap());
    assert!(tx.end_point_has_been_touched(&orders).unwrap());
}

#[test]
fn test_set_change_detection_rollback_restores_order() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .config(TransactionConfig::new().collection_change_detection(ChangeDetection::Set))
        .build();

    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .set_all(vec![
            domain.order_without_order_item.clone(),
            domain.order1.clone(),
        ])
        .unwrap();
    tx.rollback().unwrap();

    assert_eq!(
        tx.related_objects(&domain.customer1, "Orders")
            .unwrap()
            .to_vec(),
        vec![domain.order1.clone(), domain.order_without_order_item.clone()]
    );
}

#[test]
fn test_set_change_detection_commit_takes_over_order() {
    let domain = TestDomain::seeded();
    let mut tx = domain
        .builder()
        .config(TransactionConfig::new().collection_change_detection(ChangeDetection::Set))
        .build();
    let reordered = vec![
        domain.order_without_order_item.clone(),
        domain.order1.clone(),
    ];

    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .set_all(reordered.clone())
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(
        tx.related_objects(&domain.customer1, "Orders")
            .unwrap()
            .to_vec(),
        reordered
    );
    assert_eq!(
        tx.original_related_objects(&domain.customer1, "Orders")
            .unwrap()
            .to_vec(),
        reordered
    );
    assert!(!tx
        .end_point_has_been_touched(&end_point(&domain.customer1, "Orders"))
        .unwrap());
}

#[test]
fn test_sequence_change_detection_sees_reordering() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer1, "Orders");

    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .set_all(vec![
            domain.order_without_order_item.clone(),
            domain.order1.clone(),
        ])
        .unwrap();

    assert!(tx.end_point_has_changed(&orders).unwrap());
}

#[test]
fn test_discarded_transaction_rejects_everything() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    tx.discard();

    assert_eq!(tx.state(), TransactionState::Discarded);
    assert!(!tx.is_active());
    assert!(matches!(
        tx.related_objects(&domain.customer1, "Orders"),
        Err(CoreError::InvalidOperation { .. })
    ));
    assert!(tx.commit().is_err());
    assert!(tx.rollback().is_err());
    assert!(tx.new_object("Order").is_err());
}

#[test]
fn test_missing_object_is_not_found() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let err = tx.get_object(&object_id("Order", 200)).unwrap_err();

    assert!(matches!(err, CoreError::ObjectNotFound { .. }));
}

#[test]
fn test_listener_sees_commit_and_rollback() {
    let domain = TestDomain::seeded();
    let listener = RecordingListener::new();
    let mut tx = domain.builder().listener(listener.clone()).build();

    tx.commit().unwrap();
    tx.rollback().unwrap();

    assert_eq!(
        listener.events_of(tx.id()),
        vec![
            ListenerEvent::Committing,
            ListenerEvent::Committed,
            ListenerEvent::RolledBack
        ]
    );
}

#[test]
fn test_stats_count_transaction_work() {
    let domain = TestDomain::seeded();
    let stats = Arc::new(TransactionStats::new());
    let mut tx = domain.builder().stats(Arc::clone(&stats)).build();

    tx.related_objects(&domain.customer1, "Orders").unwrap();
    tx.set_related_object(&domain.order1, "Customer", Some(&domain.customer2))
        .unwrap();
    tx.delete_object(&domain.order_without_order_item).unwrap();
    tx.commit().unwrap();
    tx.rollback().unwrap();

    let snapshot = stats.snapshot();
    assert!(snapshot.objects_loaded >= 3);
    assert!(snapshot.end_points_loaded >= 2);
    assert!(snapshot.commands_performed >= 3);
    assert_eq!(snapshot.objects_deleted, 1);
    assert_eq!(snapshot.commits, 1);
    assert_eq!(snapshot.rollbacks, 1);
    assert_eq!(snapshot.changes_persisted, 2);
}
