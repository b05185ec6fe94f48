//! Test fixtures and transaction helpers.
//!
//! Provides the order domain used across the test suites: its mapping, a
//! persistence source seeded with a small object graph, and helpers for
//! opening transactions over it.

use entigraph_core::{
    ClassDefinition, ClassId, ClientTransaction, ClientTransactionBuilder, CoreError, CoreResult,
    DataContainer, InMemoryPersistenceSource, MappingConfiguration, ObjectId, PersistedChange,
    PersistenceSource, RelationDefinition, RelationEndPointDefinition, RelationEndPointId, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Builds the mapping of the order domain.
///
/// | Relation                | Virtual side            | Real side            |
/// |-------------------------|-------------------------|----------------------|
/// | `CustomerToOrder`       | `Customer.Orders` (1:n) | `Order.Customer`     |
/// | `OrderToOrderItem`      | `Order.OrderItems` (1:n)| `OrderItem.Order`    |
/// | `OrderToOrderTicket`    | `Order.OrderTicket`     | `OrderTicket.Order`  |
/// | `EmployeeToComputer`    | `Employee.Computer`     | `Computer.Employee`  |
/// | `LocationToClient`      | anonymous               | `Location.Client`    |
///
/// `OrderTicket.Order` is mandatory; `SpecialOrder` derives from `Order`.
pub fn order_domain_mapping() -> Arc<MappingConfiguration> {
    MappingConfiguration::builder()
        .class(ClassDefinition::new("Customer").with_property("Name"))
        .class(ClassDefinition::new("Order").with_property("OrderNumber"))
        .class(ClassDefinition::new("SpecialOrder").with_base_class("Order"))
        .class(ClassDefinition::new("OrderItem").with_property("Product"))
        .class(ClassDefinition::new("OrderTicket").with_property("FileName"))
        .class(ClassDefinition::new("Employee").with_property("Name"))
        .class(ClassDefinition::new("Computer").with_property("SerialNumber"))
        .class(ClassDefinition::new("Location").with_property("City"))
        .class(ClassDefinition::new("Client"))
        .relation(RelationDefinition::one_to_many(
            "CustomerToOrder",
            "Customer",
            "Orders",
            "Order",
            "Customer",
        ))
        .relation(RelationDefinition::one_to_many(
            "OrderToOrderItem",
            "Order",
            "OrderItems",
            "OrderItem",
            "Order",
        ))
        .relation(
            RelationDefinition::one_to_one(
                "OrderToOrderTicket",
                "Order",
                "OrderTicket",
                "OrderTicket",
                "Order",
            )
            .mandatory(),
        )
        .relation(RelationDefinition::one_to_one(
            "EmployeeToComputer",
            "Employee",
            "Computer",
            "Computer",
            "Employee",
        ))
        .relation(RelationDefinition::unidirectional(
            "LocationToClient",
            "Location",
            "Client",
            "Client",
        ))
        .build()
        .expect("order domain mapping is valid")
}

/// Builds a mapping with a self-referencing relation.
///
/// `Employee.Subordinates` (1:n) is the virtual side of
/// `Employee.Supervisor`, so an employee can supervise itself.
pub fn employee_hierarchy_mapping() -> Arc<MappingConfiguration> {
    MappingConfiguration::builder()
        .class(ClassDefinition::new("Employee").with_property("Name"))
        .relation(RelationDefinition::one_to_many(
            "EmployeeToSubordinate",
            "Employee",
            "Subordinates",
            "Employee",
            "Supervisor",
        ))
        .build()
        .expect("employee hierarchy mapping is valid")
}

/// Creates a deterministic object ID.
pub fn object_id(class: &str, n: u8) -> ObjectId {
    let mut bytes = [0u8; 16];
    bytes[15] = n;
    ObjectId::from_bytes(ClassId::new(class), bytes)
}

/// Shorthand for `RelationEndPointId::new(object.clone(), property)`.
pub fn end_point(object: &ObjectId, property: &str) -> RelationEndPointId {
    RelationEndPointId::new(object.clone(), property)
}

/// The order domain: mapping, persistence source and well-known objects.
///
/// In the seeded source:
/// - `customer1` has the orders `order1` and `order_without_order_item`
/// - `customer2` has `order2`, `customer3` has none
/// - `order1` has `order_item1` and `order_item2` and the ticket `order_ticket1`
/// - `order2` has the ticket `order_ticket2`
/// - `computer1` belongs to `employee1`; `computer2` and `employee2` are unassigned
/// - `location1` points at `client1`
#[derive(Debug, Clone)]
pub struct TestDomain {
    /// The mapping.
    pub mapping: Arc<MappingConfiguration>,
    /// The persistence source.
    pub source: Arc<InMemoryPersistenceSource>,
    /// Customer with two orders.
    pub customer1: ObjectId,
    /// Customer with one order.
    pub customer2: ObjectId,
    /// Customer without orders.
    pub customer3: ObjectId,
    /// Order of `customer1` with two items and a ticket.
    pub order1: ObjectId,
    /// Order of `customer1` without items and without a ticket.
    pub order_without_order_item: ObjectId,
    /// Order of `customer2` with a ticket.
    pub order2: ObjectId,
    /// First item of `order1`.
    pub order_item1: ObjectId,
    /// Second item of `order1`.
    pub order_item2: ObjectId,
    /// Ticket of `order1`.
    pub order_ticket1: ObjectId,
    /// Ticket of `order2`.
    pub order_ticket2: ObjectId,
    /// Employee owning `computer1`.
    pub employee1: ObjectId,
    /// Employee without a computer.
    pub employee2: ObjectId,
    /// Computer of `employee1`.
    pub computer1: ObjectId,
    /// Unassigned computer.
    pub computer2: ObjectId,
    /// Location pointing at `client1`.
    pub location1: ObjectId,
    /// Client of `location1`.
    pub client1: ObjectId,
}

impl TestDomain {
    /// Creates the domain with an empty persistence source.
    pub fn empty() -> Self {
        let mapping = order_domain_mapping();
        let source = Arc::new(InMemoryPersistenceSource::new(Arc::clone(&mapping)));
        Self {
            mapping,
            source,
            customer1: object_id("Customer", 1),
            customer2: object_id("Customer", 2),
            customer3: object_id("Customer", 3),
            order1: object_id("Order", 1),
            order_without_order_item: object_id("Order", 2),
            order2: object_id("Order", 3),
            order_item1: object_id("OrderItem", 1),
            order_item2: object_id("OrderItem", 2),
            order_ticket1: object_id("OrderTicket", 1),
            order_ticket2: object_id("OrderTicket", 2),
            employee1: object_id("Employee", 1),
            employee2: object_id("Employee", 2),
            computer1: object_id("Computer", 1),
            computer2: object_id("Computer", 2),
            location1: object_id("Location", 1),
            client1: object_id("Client", 1),
        }
    }

    /// Creates the domain with the seeded object graph.
    pub fn seeded() -> Self {
        let domain = Self::empty();
        domain.seed().expect("seed rows match the order domain mapping");
        domain
    }

    fn seed(&self) -> CoreResult<()> {
        let source = &self.source;
        source.insert(self.customer1.clone(), [text("Name", "Kunde 1")])?;
        source.insert(self.customer2.clone(), [text("Name", "Kunde 2")])?;
        source.insert(self.customer3.clone(), [text("Name", "Kunde 3")])?;
        source.insert(
            self.order1.clone(),
            [
                integer("OrderNumber", 1),
                reference("Customer", &self.customer1),
            ],
        )?;
        source.insert(
            self.order_without_order_item.clone(),
            [
                integer("OrderNumber", 2),
                reference("Customer", &self.customer1),
            ],
        )?;
        source.insert(
            self.order2.clone(),
            [
                integer("OrderNumber", 3),
                reference("Customer", &self.customer2),
            ],
        )?;
        source.insert(
            self.order_item1.clone(),
            [text("Product", "Mainboard"), reference("Order", &self.order1)],
        )?;
        source.insert(
            self.order_item2.clone(),
            [text("Product", "CPU Fan"), reference("Order", &self.order1)],
        )?;
        source.insert(
            self.order_ticket1.clone(),
            [
                text("FileName", "C:\\order1.png"),
                reference("Order", &self.order1),
            ],
        )?;
        source.insert(
            self.order_ticket2.clone(),
            [
                text("FileName", "C:\\order2.png"),
                reference("Order", &self.order2),
            ],
        )?;
        source.insert(self.employee1.clone(), [text("Name", "Mitarbeiter 1")])?;
        source.insert(self.employee2.clone(), [text("Name", "Mitarbeiter 2")])?;
        source.insert(
            self.computer1.clone(),
            [
                text("SerialNumber", "12345-xzy-56"),
                reference("Employee", &self.employee1),
            ],
        )?;
        source.insert(
            self.computer2.clone(),
            [text("SerialNumber", "63457-kol-34")],
        )?;
        source.insert(self.client1.clone(), [])?;
        source.insert(
            self.location1.clone(),
            [text("City", "Wien"), reference("Client", &self.client1)],
        )?;
        Ok(())
    }

    /// Starts building a transaction over the domain.
    pub fn builder(&self) -> ClientTransactionBuilder {
        ClientTransaction::builder(Arc::clone(&self.mapping), self.source.clone())
    }

    /// Opens a transaction with default configuration.
    pub fn transaction(&self) -> ClientTransaction {
        self.builder().build()
    }
}

impl Default for TestDomain {
    fn default() -> Self {
        Self::seeded()
    }
}

fn text(name: &str, value: &str) -> (String, Value) {
    (name.to_string(), Value::from(value))
}

fn integer(name: &str, value: i64) -> (String, Value) {
    (name.to_string(), Value::from(value))
}

fn reference(name: &str, object: &ObjectId) -> (String, Value) {
    (name.to_string(), Value::from(object.clone()))
}

/// A persistence source that can be switched to reject commits.
///
/// Loads are forwarded to the wrapped source.
#[derive(Debug)]
pub struct FailingPersistenceSource {
    inner: Arc<InMemoryPersistenceSource>,
    fail_persist: AtomicBool,
}

impl FailingPersistenceSource {
    /// Wraps `inner`. Persisting succeeds until [`fail_persist`](Self::fail_persist) is set.
    pub fn new(inner: Arc<InMemoryPersistenceSource>) -> Self {
        Self {
            inner,
            fail_persist: AtomicBool::new(false),
        }
    }

    /// Makes every later `persist` call fail (or succeed again).
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

impl PersistenceSource for FailingPersistenceSource {
    fn load_data_container(&self, object_id: &ObjectId) -> CoreResult<Option<DataContainer>> {
        self.inner.load_data_container(object_id)
    }

    fn load_related_data_containers(
        &self,
        end_point_id: &RelationEndPointId,
        real_definition: &RelationEndPointDefinition,
    ) -> CoreResult<Vec<DataContainer>> {
        self.inner
            .load_related_data_containers(end_point_id, real_definition)
    }

    fn persist(&self, changes: &[PersistedChange]) -> CoreResult<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(CoreError::load("persistence source is unavailable"));
        }
        self.inner.persist(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_source_holds_graph() {
        let domain = TestDomain::seeded();
        assert!(domain.source.contains(&domain.customer1));
        assert!(domain.source.contains(&domain.location1));
        assert_eq!(domain.source.len(), 16);
    }

    #[test]
    fn test_empty_domain() {
        let domain = TestDomain::empty();
        assert!(domain.source.is_empty());
        let mut tx = domain.transaction();
        assert!(tx.get_object(&domain.customer1).is_err());
    }

    #[test]
    fn test_customer_orders_in_store_order() {
        let domain = TestDomain::seeded();
        let mut tx = domain.transaction();
        let orders = tx.related_objects(&domain.customer1, "Orders").unwrap();
        assert_eq!(
            orders.to_vec(),
            vec![domain.order1.clone(), domain.order_without_order_item.clone()]
        );
    }

    #[test]
    fn test_failing_source() {
        let domain = TestDomain::seeded();
        let failing = Arc::new(FailingPersistenceSource::new(domain.source.clone()));
        let mut tx = ClientTransaction::new(Arc::clone(&domain.mapping), failing.clone());
        tx.set_property_value(&domain.customer1, "Name", "Kunde 1a")
            .unwrap();

        failing.fail_persist(true);
        assert!(tx.commit().is_err());

        failing.fail_persist(false);
        tx.commit().unwrap();
        assert_eq!(
            domain.source.row(&domain.customer1).unwrap().get("Name"),
            Some(&Value::from("Kunde 1a"))
        );
    }
}
