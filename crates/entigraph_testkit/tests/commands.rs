//! Command creation, expansion and lifecycle.

use entigraph_core::{
    CollectionCommandKind, CommandState, CompositeCommand, CoreError, DataManagementCommand,
    ObjectCommandKind, OppositeObjectIdSetter, RelationEndPointCommand,
};
use entigraph_testkit::prelude::*;

#[test]
fn test_set_same_null_on_one_to_one() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let id = end_point(&domain.computer2, "Employee");

    let command = tx.create_set_command(&id, None).unwrap();

    assert_eq!(command.kind(), ObjectCommandKind::SetSame);
    assert_eq!(command.old_related_object(), None);
    assert_eq!(command.new_related_object(), None);
    assert_eq!(command.setter(), OppositeObjectIdSetter::RealObject);
    assert_eq!(command.modified_end_point_id(), &id);
    assert_eq!(command.domain_object(), &domain.computer2);
}

#[test]
fn test_set_same_object_touches_both_sides() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    tx.set_related_object(&domain.computer1, "Employee", Some(&domain.employee1))
        .unwrap();

    let real = end_point(&domain.computer1, "Employee");
    let virtual_side = end_point(&domain.employee1, "Computer");
    assert!(!tx.end_point_has_changed(&real).unwrap());
    assert!(tx.end_point_has_been_touched(&real).unwrap());
    assert!(tx.end_point_has_been_touched(&virtual_side).unwrap());
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn test_dispatch_by_relation_shape() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let one_one = tx
        .create_set_command(&end_point(&domain.computer2, "Employee"), Some(&domain.employee2))
        .unwrap();
    let one_many = tx
        .create_set_command(&end_point(&domain.order1, "Customer"), Some(&domain.customer3))
        .unwrap();
    let unidirectional = tx
        .create_set_command(&end_point(&domain.location1, "Client"), None)
        .unwrap();
    let virtual_one_one = tx
        .create_set_command(&end_point(&domain.employee2, "Computer"), Some(&domain.computer2))
        .unwrap();

    assert_eq!(one_one.kind(), ObjectCommandKind::SetOneOne);
    assert_eq!(one_many.kind(), ObjectCommandKind::SetOneMany);
    assert_eq!(unidirectional.kind(), ObjectCommandKind::SetUnidirectional);
    assert_eq!(virtual_one_one.kind(), ObjectCommandKind::SetOneOne);
    assert_eq!(virtual_one_one.setter(), OppositeObjectIdSetter::VirtualObject);
}

#[test]
fn test_set_command_rejects_wrong_class() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let err = tx
        .create_set_command(&end_point(&domain.order1, "Customer"), Some(&domain.employee1))
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}

#[test]
fn test_set_command_rejects_collection_end_point() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let err = tx
        .create_set_command(&end_point(&domain.customer1, "Orders"), None)
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidArgument { .. }));
}

#[test]
fn test_creating_a_command_changes_nothing() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let command = tx
        .create_set_command(&end_point(&domain.order1, "Customer"), Some(&domain.customer2))
        .unwrap();

    assert_eq!(command.state(), CommandState::Created);
    assert_eq!(
        tx.related_object(&domain.order1, "Customer").unwrap(),
        Some(domain.customer1.clone())
    );
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn test_one_many_expansion_covers_both_collections() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let command = tx
        .create_set_command(&end_point(&domain.order1, "Customer"), Some(&domain.customer2))
        .unwrap();

    let expanded = RelationEndPointCommand::from(command)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();

    let ids: Vec<_> = expanded
        .commands()
        .iter()
        .map(|command| command.modified_end_point_id().clone())
        .collect();
    assert_eq!(
        ids,
        vec![
            end_point(&domain.order1, "Customer"),
            end_point(&domain.customer2, "Orders"),
            end_point(&domain.customer1, "Orders"),
        ]
    );
    assert!(expanded
        .commands()
        .iter()
        .all(|command| command.state() == CommandState::Created));
}

#[test]
fn test_one_one_expansion_unlinks_previous_partner() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let command = tx
        .create_set_command(&end_point(&domain.employee2, "Computer"), Some(&domain.computer1))
        .unwrap();

    let expanded = RelationEndPointCommand::from(command)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();

    let ids: Vec<_> = expanded
        .commands()
        .iter()
        .map(|command| command.modified_end_point_id().clone())
        .collect();
    assert_eq!(
        ids,
        vec![
            end_point(&domain.employee2, "Computer"),
            end_point(&domain.computer1, "Employee"),
            end_point(&domain.employee1, "Computer"),
        ]
    );
}

#[test]
fn test_perform_without_begin_changes_both_sides() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let command = tx
        .create_set_command(&end_point(&domain.computer2, "Employee"), Some(&domain.employee2))
        .unwrap();
    let mut expanded = RelationEndPointCommand::from(command)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();

    expanded.perform(&mut tx).unwrap();

    assert_eq!(
        tx.related_object(&domain.computer2, "Employee").unwrap(),
        Some(domain.employee2.clone())
    );
    assert_eq!(
        tx.related_object(&domain.employee2, "Computer").unwrap(),
        Some(domain.computer2.clone())
    );
    assert!(expanded
        .commands()
        .iter()
        .all(|command| command.state() == CommandState::Performed));
}

#[test]
fn test_lifecycle_notifies_listeners_in_order() {
    let domain = TestDomain::seeded();
    let listener = RecordingListener::new();
    let mut tx = domain.builder().listener(listener.clone()).build();
    let id = end_point(&domain.computer2, "Employee");
    let command = tx.create_set_command(&id, Some(&domain.employee2)).unwrap();
    let mut command = RelationEndPointCommand::from(command);

    command.begin(&mut tx).unwrap();
    let after_begin = listener.events();
    command.perform(&mut tx).unwrap();
    command.end(&mut tx).unwrap();

    assert_eq!(command.state(), CommandState::Ended);
    assert!(after_begin.contains(&ListenerEvent::RelationChanging {
        end_point_id: id.clone(),
        old: None,
        new: Some(domain.employee2.clone()),
    }));
    assert!(!after_begin
        .iter()
        .any(|event| matches!(event, ListenerEvent::RelationChanged { .. })));
    assert!(listener.relation_changes().contains(&(
        id,
        None,
        Some(domain.employee2.clone())
    )));
}

#[test]
fn test_failed_perform_keeps_command_state() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer1, "Orders");
    let mut command = tx.create_remove_command(&orders, &domain.order1).unwrap();
    tx.related_objects_mut(&domain.customer1, "Orders")
        .unwrap()
        .remove(&domain.order1)
        .unwrap();

    let err = command.perform(&mut tx).unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
    assert_eq!(command.state(), CommandState::Created);
    assert!(command.end(&mut tx).is_err());
}

#[test]
fn test_failed_touch_keeps_command_state() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let missing = end_point(&object_id("Customer", 99), "Orders");
    let mut touch = RelationEndPointCommand::from(
        entigraph_core::RelationEndPointTouchCommand::new(missing),
    );

    touch.begin(&mut tx).unwrap();
    assert!(touch.perform(&mut tx).is_err());

    assert_eq!(touch.state(), CommandState::Begun);
}

#[test]
fn test_end_before_perform_is_rejected() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let command = tx
        .create_set_command(&end_point(&domain.computer2, "Employee"), Some(&domain.employee2))
        .unwrap();
    let mut command = RelationEndPointCommand::from(command);

    command.begin(&mut tx).unwrap();
    let err = command.end(&mut tx).unwrap_err();

    assert!(matches!(err, CoreError::InvalidOperation { .. }));
}

#[test]
fn test_inverse_undoes_expanded_change() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let before = RelationSnapshot::capture(&domain, &mut tx).unwrap();
    let command = tx
        .create_set_command(&end_point(&domain.order1, "Customer"), Some(&domain.customer2))
        .unwrap();
    let mut expanded = RelationEndPointCommand::from(command)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();
    let mut inverse = expanded.inverse().unwrap();

    expanded.notify_and_perform(&mut tx).unwrap();
    assert_ne!(RelationSnapshot::capture(&domain, &mut tx).unwrap(), before);
    inverse.notify_and_perform(&mut tx).unwrap();

    let after = RelationSnapshot::capture(&domain, &mut tx).unwrap();
    assert_eq!(after.order_customers, before.order_customers);
    assert_eq!(
        after.orders[0].iter().collect::<std::collections::HashSet<_>>(),
        before.orders[0].iter().collect::<std::collections::HashSet<_>>()
    );
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_collection_commands_by_kind() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer1, "Orders");

    let add = tx.create_add_command(&orders, domain.order2.clone()).unwrap();
    let insert = tx.create_insert_command(&orders, 0, domain.order2.clone()).unwrap();
    let remove = tx.create_remove_command(&orders, &domain.order1).unwrap();
    let replace = tx.create_replace_command(&orders, 1, domain.order2.clone()).unwrap();
    let replace_same = tx.create_replace_command(&orders, 0, domain.order1.clone()).unwrap();
    let set = tx
        .create_set_collection_command(&orders, vec![domain.order2.clone()])
        .unwrap();

    assert_eq!(add.kind(), &CollectionCommandKind::Insert { index: 2 });
    assert_eq!(insert.kind(), &CollectionCommandKind::Insert { index: 0 });
    assert_eq!(remove.kind(), &CollectionCommandKind::Remove { index: 0 });
    assert_eq!(replace.kind(), &CollectionCommandKind::Replace { index: 1 });
    assert_eq!(replace_same.kind(), &CollectionCommandKind::ReplaceSame { index: 0 });
    assert_eq!(
        set.kind(),
        &CollectionCommandKind::SetCollection {
            old_items: vec![domain.order1.clone(), domain.order_without_order_item.clone()],
            new_items: vec![domain.order2.clone()],
        }
    );
}

#[test]
fn test_delete_commands_cannot_be_expanded_or_inverted() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();

    let delete = tx
        .create_delete_command(&end_point(&domain.order1, "Customer"))
        .unwrap();
    assert!(matches!(delete.inverse(), Err(CoreError::NotSupported { .. })));
    assert!(matches!(
        delete.expand_to_all_related_objects(&mut tx),
        Err(CoreError::NotSupported { .. })
    ));

    let delete = tx
        .create_delete_command(&end_point(&domain.customer1, "Orders"))
        .unwrap();
    assert!(matches!(delete.inverse(), Err(CoreError::NotSupported { .. })));
}

#[test]
fn test_execute_runs_composites_of_expanded_commands() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let first = tx
        .create_set_command(&end_point(&domain.computer2, "Employee"), Some(&domain.employee2))
        .unwrap();
    let first = RelationEndPointCommand::from(first)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();
    let second = tx
        .create_set_command(&end_point(&domain.order2, "Customer"), Some(&domain.customer3))
        .unwrap();
    let second = RelationEndPointCommand::from(second)
        .expand_to_all_related_objects(&mut tx)
        .unwrap();

    let mut composite = CompositeCommand::from(first).combine(second);
    assert_eq!(composite.len(), 5);
    composite.notify_and_perform(&mut tx).unwrap();

    assert_eq!(
        tx.related_object(&domain.employee2, "Computer").unwrap(),
        Some(domain.computer2.clone())
    );
    assert!(tx
        .related_objects(&domain.customer3, "Orders")
        .unwrap()
        .contains(&domain.order2));
    assert_bidirectional(&domain, &mut tx);
}

#[test]
fn test_touch_command_only_touches() {
    let domain = TestDomain::seeded();
    let mut tx = domain.transaction();
    let orders = end_point(&domain.customer1, "Orders");
    tx.related_objects(&domain.customer1, "Orders").unwrap();

    tx.execute(entigraph_core::RelationEndPointTouchCommand::new(orders.clone()))
        .unwrap();

    assert!(tx.end_point_has_been_touched(&orders).unwrap());
    assert!(!tx.end_point_has_changed(&orders).unwrap());
}
