//! Cross-module scenario helpers.
//!
//! Provides checks of the bidirectional relation invariant over the seeded
//! [`TestDomain`] and reusable scenarios exercising transactions end to end.

use crate::fixtures::TestDomain;
use entigraph_core::{verify_consistency, ClientTransaction, CoreError, CoreResult, ObjectId};

/// Loads every relation of the domain's well-known objects that still exist.
pub fn load_all_relations(domain: &TestDomain, tx: &mut ClientTransaction) -> CoreResult<()> {
    for customer in domain.customers() {
        tx.related_objects(&customer, "Orders")?;
    }
    for order in domain.orders() {
        if is_gone(tx, &order) {
            continue;
        }
        tx.related_object(&order, "Customer")?;
        tx.related_object(&order, "OrderTicket")?;
        tx.related_objects(&order, "OrderItems")?;
    }
    for employee in domain.employees() {
        tx.related_object(&employee, "Computer")?;
    }
    for computer in domain.computers() {
        tx.related_object(&computer, "Employee")?;
    }
    Ok(())
}

/// Returns `true` if the object is registered and deleted.
pub fn is_deleted(tx: &ClientTransaction, object_id: &ObjectId) -> bool {
    tx.data_containers()
        .get(object_id)
        .is_some_and(|container| container.is_deleted())
}

/// Returns `true` if the object is deleted or no longer exists at all.
///
/// Objects deleted by a committed transaction are forgotten and removed
/// from the persistence source.
pub fn is_gone(tx: &mut ClientTransaction, object_id: &ObjectId) -> bool {
    is_deleted(tx, object_id)
        || matches!(
            tx.get_object(object_id),
            Err(CoreError::ObjectNotFound { .. })
        )
}

/// Asserts that both sides of every relation in the domain agree.
///
/// # Panics
///
/// Panics naming the first disagreement.
pub fn assert_bidirectional(domain: &TestDomain, tx: &mut ClientTransaction) {
    load_all_relations(domain, tx).expect("relations load");

    for customer in domain.customers() {
        let orders = tx
            .related_objects(&customer, "Orders")
            .expect("orders load")
            .to_vec();
        for order in orders {
            assert!(!is_deleted(tx, &order), "{customer} holds deleted {order}");
            assert_eq!(
                tx.related_object(&order, "Customer").expect("customer loads"),
                Some(customer.clone()),
                "{customer}.Orders holds {order}, which points elsewhere"
            );
        }
    }
    for order in domain.orders() {
        if is_gone(tx, &order) {
            continue;
        }
        if let Some(customer) = tx.related_object(&order, "Customer").expect("customer loads") {
            let holds = tx
                .related_objects(&customer, "Orders")
                .expect("orders load")
                .contains(&order);
            assert!(holds, "{order} points at {customer}, which does not hold it");
        }
    }
    for computer in domain.computers() {
        let employee = tx.related_object(&computer, "Employee").expect("employee loads");
        if let Some(employee) = employee {
            assert_eq!(
                tx.related_object(&employee, "Computer").expect("computer loads"),
                Some(computer.clone()),
                "{computer} points at {employee}, which points elsewhere"
            );
        }
    }
    for employee in domain.employees() {
        let computer = tx.related_object(&employee, "Computer").expect("computer loads");
        if let Some(computer) = computer {
            assert_eq!(
                tx.related_object(&computer, "Employee").expect("employee loads"),
                Some(employee.clone()),
                "{employee} points at {computer}, which points elsewhere"
            );
        }
    }

    verify_consistency(tx).expect("consistency verifier agrees");
}

/// Snapshot of the domain's relations used to compare states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSnapshot {
    /// `Customer.Orders` per customer.
    pub orders: Vec<Vec<ObjectId>>,
    /// `Order.Customer` per order.
    pub order_customers: Vec<Option<ObjectId>>,
    /// `Computer.Employee` per computer.
    pub computer_employees: Vec<Option<ObjectId>>,
}

impl RelationSnapshot {
    /// Captures the current relations of the domain's objects.
    pub fn capture(domain: &TestDomain, tx: &mut ClientTransaction) -> CoreResult<Self> {
        let mut orders = Vec::new();
        for customer in domain.customers() {
            orders.push(tx.related_objects(&customer, "Orders")?.to_vec());
        }
        let mut order_customers = Vec::new();
        for order in domain.orders() {
            order_customers.push(tx.related_object(&order, "Customer")?);
        }
        let mut computer_employees = Vec::new();
        for computer in domain.computers() {
            computer_employees.push(tx.related_object(&computer, "Employee")?);
        }
        Ok(Self {
            orders,
            order_customers,
            computer_employees,
        })
    }
}

/// Reusable transaction scenarios.
pub mod scenarios {
    use super::*;
    use entigraph_core::Value;

    /// Moves an order between customers through the real side.
    pub fn test_move_order_between_customers(domain: &TestDomain) {
        let mut tx = domain.transaction();
        tx.set_related_object(&domain.order1, "Customer", Some(&domain.customer2))
            .expect("set customer");

        assert!(!tx
            .related_objects(&domain.customer1, "Orders")
            .expect("orders load")
            .contains(&domain.order1));
        assert!(tx
            .related_objects(&domain.customer2, "Orders")
            .expect("orders load")
            .contains(&domain.order1));
        assert_bidirectional(domain, &mut tx);
    }

    /// Changes relations and properties, then rolls back.
    pub fn test_rollback_restores_relations(domain: &TestDomain) {
        let mut tx = domain.transaction();
        let before = RelationSnapshot::capture(domain, &mut tx).expect("snapshot");

        tx.set_related_object(&domain.order1, "Customer", Some(&domain.customer3))
            .expect("set customer");
        tx.set_related_object(&domain.computer2, "Employee", Some(&domain.employee1))
            .expect("set employee");
        tx.set_property_value(&domain.customer1, "Name", Value::from("changed"))
            .expect("set name");
        tx.rollback().expect("rollback");

        let after = RelationSnapshot::capture(domain, &mut tx).expect("snapshot");
        assert_eq!(before, after);
        assert!(!tx.has_changed().expect("has changed"));
        assert_bidirectional(domain, &mut tx);
    }

    /// Commits relation changes and checks the persisted rows.
    pub fn test_commit_persists_foreign_keys(domain: &TestDomain) {
        let mut tx = domain.transaction();
        tx.related_objects_mut(&domain.customer3, "Orders")
            .expect("orders load")
            .add(domain.order2.clone())
            .expect("add order");
        tx.commit().expect("commit");

        let row = domain.source.row(&domain.order2).expect("row exists");
        assert_eq!(row.get("Customer"), Some(&Value::from(domain.customer3.clone())));
        assert!(!tx.has_changed().expect("has changed"));
    }
}
