//! Property-based test generators using proptest.
//!
//! Provides strategies for object IDs and for sequences of relation
//! operations over the seeded [`TestDomain`].

use crate::fixtures::TestDomain;
use entigraph_core::{ClassId, ClientTransaction, CoreResult, ObjectId};
use proptest::prelude::*;

/// Strategy for generating object IDs of one class.
pub fn object_id_strategy(class: &'static str) -> impl Strategy<Value = ObjectId> {
    prop::array::uniform16(any::<u8>())
        .prop_map(move |bytes| ObjectId::from_bytes(ClassId::new(class), bytes))
}

/// One relation operation on the seeded order domain.
///
/// Objects are named by their index into the pools of [`TestDomain`]:
/// three customers, three orders, two employees and two computers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationOperation {
    /// Sets `Order.Customer`.
    SetOrderCustomer {
        /// Order index.
        order: usize,
        /// Customer index, `None` for null.
        customer: Option<usize>,
    },
    /// Adds an order to `Customer.Orders`.
    AddOrder {
        /// Customer index.
        customer: usize,
        /// Order index.
        order: usize,
    },
    /// Removes an order from `Customer.Orders`.
    RemoveOrder {
        /// Customer index.
        customer: usize,
        /// Order index.
        order: usize,
    },
    /// Replaces the whole `Customer.Orders` collection.
    SetOrders {
        /// Customer index.
        customer: usize,
        /// Order indices.
        orders: Vec<usize>,
    },
    /// Sets `Computer.Employee` (real side).
    SetComputerEmployee {
        /// Computer index.
        computer: usize,
        /// Employee index, `None` for null.
        employee: Option<usize>,
    },
    /// Sets `Employee.Computer` (virtual side).
    SetEmployeeComputer {
        /// Employee index.
        employee: usize,
        /// Computer index, `None` for null.
        computer: Option<usize>,
    },
    /// Deletes an order.
    DeleteOrder {
        /// Order index.
        order: usize,
    },
    /// Commits the transaction.
    Commit,
    /// Rolls the transaction back.
    Rollback,
}

impl RelationOperation {
    /// Applies the operation.
    ///
    /// Operations the engine rejects (for example changes of deleted
    /// objects) return the error without changing the transaction.
    pub fn apply(&self, domain: &TestDomain, tx: &mut ClientTransaction) -> CoreResult<()> {
        let customers = domain.customers();
        let orders = domain.orders();
        let employees = domain.employees();
        let computers = domain.computers();
        match self {
            Self::SetOrderCustomer { order, customer } => tx.set_related_object(
                &orders[*order],
                "Customer",
                customer.map(|index| &customers[index]),
            ),
            Self::AddOrder { customer, order } => tx
                .related_objects_mut(&customers[*customer], "Orders")?
                .add(orders[*order].clone()),
            Self::RemoveOrder { customer, order } => tx
                .related_objects_mut(&customers[*customer], "Orders")?
                .remove(&orders[*order])
                .map(|_| ()),
            Self::SetOrders {
                customer,
                orders: indices,
            } => {
                let mut items: Vec<ObjectId> = Vec::new();
                for index in indices {
                    if !items.contains(&orders[*index]) {
                        items.push(orders[*index].clone());
                    }
                }
                tx.related_objects_mut(&customers[*customer], "Orders")?
                    .set_all(items)
            }
            Self::SetComputerEmployee { computer, employee } => tx.set_related_object(
                &computers[*computer],
                "Employee",
                employee.map(|index| &employees[index]),
            ),
            Self::SetEmployeeComputer { employee, computer } => tx.set_related_object(
                &employees[*employee],
                "Computer",
                computer.map(|index| &computers[index]),
            ),
            Self::DeleteOrder { order } => tx.delete_object(&orders[*order]),
            Self::Commit => tx.commit(),
            Self::Rollback => tx.rollback(),
        }
    }
}

impl TestDomain {
    /// Returns `customer1`, `customer2` and `customer3`.
    pub fn customers(&self) -> [ObjectId; 3] {
        [
            self.customer1.clone(),
            self.customer2.clone(),
            self.customer3.clone(),
        ]
    }

    /// Returns `order1`, `order_without_order_item` and `order2`.
    pub fn orders(&self) -> [ObjectId; 3] {
        [
            self.order1.clone(),
            self.order_without_order_item.clone(),
            self.order2.clone(),
        ]
    }

    /// Returns `employee1` and `employee2`.
    pub fn employees(&self) -> [ObjectId; 2] {
        [self.employee1.clone(), self.employee2.clone()]
    }

    /// Returns `computer1` and `computer2`.
    pub fn computers(&self) -> [ObjectId; 2] {
        [self.computer1.clone(), self.computer2.clone()]
    }
}

/// Strategy for generating single relation operations.
///
/// Commits are generated rarely: the seeded tickets make committing a
/// deleted `order1` or `order2` fail on their mandatory relation.
pub fn relation_operation_strategy() -> impl Strategy<Value = RelationOperation> {
    prop_oneof![
        4 => (0..3usize, prop::option::of(0..3usize))
            .prop_map(|(order, customer)| RelationOperation::SetOrderCustomer { order, customer }),
        3 => (0..3usize, 0..3usize)
            .prop_map(|(customer, order)| RelationOperation::AddOrder { customer, order }),
        2 => (0..3usize, 0..3usize)
            .prop_map(|(customer, order)| RelationOperation::RemoveOrder { customer, order }),
        1 => (0..3usize, prop::collection::vec(0..3usize, 0..3))
            .prop_map(|(customer, orders)| RelationOperation::SetOrders { customer, orders }),
        3 => (0..2usize, prop::option::of(0..2usize))
            .prop_map(|(computer, employee)| RelationOperation::SetComputerEmployee {
                computer,
                employee
            }),
        3 => (0..2usize, prop::option::of(0..2usize))
            .prop_map(|(employee, computer)| RelationOperation::SetEmployeeComputer {
                employee,
                computer
            }),
        1 => (0..3usize).prop_map(|order| RelationOperation::DeleteOrder { order }),
        1 => Just(RelationOperation::Commit),
        1 => Just(RelationOperation::Rollback),
    ]
}

/// Strategy for generating operation sequences.
pub fn operation_sequence_strategy(
    max_len: usize,
) -> impl Strategy<Value = Vec<RelationOperation>> {
    prop::collection::vec(relation_operation_strategy(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_object_id_strategy_keeps_class(id in object_id_strategy("Order")) {
            prop_assert_eq!(id.class_id().as_str(), "Order");
        }

        #[test]
        fn test_operation_indices_in_range(op in relation_operation_strategy()) {
            let domain = TestDomain::empty();
            let mut tx = domain.transaction();
            // Every object is missing in the empty domain; only the
            // indexing must not panic.
            let _ = op.apply(&domain, &mut tx);
        }
    }
}
