use crate::{
    build::{ConfiguredStrategy, FetchDecisionContext, LoadPlanBuilder, LoadPlanBuildingStrategy},
    model::{
        AttributeDescriptor, AttributeType, BasicType, CollectionDescriptor, CompositeType,
        EntityDescriptor, FetchStrategy, IdentifierDescriptor, MetadataRegistry,
    },
    obs::{PlanTraceEvent, PlanTraceSink},
    plan::LoadPlan,
    walk::MetadataWalker,
};
use std::sync::{Arc, Mutex};

///
/// Commerce model
///
/// Customer ──orders──▶ Order (deferred)
/// Order     id {customerId ─▶ Customer, orderSeq}  (non-encapsulated)
///           shipping: Address { street, country ─▶ Country }
///           lines: [OrderLine { product ─▶ Product, quantity }]  (joined)
/// CustomerProfile  id = customer ─▶ Customer  (derived identity)
/// Invoice          id: InvoiceKey { customer ─▶ Customer, number }  (encapsulated composite)
///

pub(crate) fn order_id_type() -> Arc<CompositeType> {
    Arc::new(CompositeType::new(
        "OrderId",
        vec![
            AttributeDescriptor::to_one("customerId", "Customer", ["customer_id"]).not_null(),
            AttributeDescriptor::basic("orderSeq", BasicType::Int).not_null(),
        ],
    ))
}

pub(crate) fn customer() -> EntityDescriptor {
    EntityDescriptor::new("Customer", IdentifierDescriptor::simple("id", BasicType::Int))
        .with_attribute(AttributeDescriptor::basic("name", BasicType::Text))
        .with_attribute(AttributeDescriptor::collection(
            "orders",
            Arc::new(CollectionDescriptor::new(
                "Customer.orders",
                AttributeType::Entity {
                    target: "Order".to_string(),
                },
            )),
        ))
}

pub(crate) fn order() -> EntityDescriptor {
    let address = Arc::new(CompositeType::new(
        "Address",
        vec![
            AttributeDescriptor::basic("street", BasicType::Text),
            AttributeDescriptor::to_one("country", "Country", ["country_code"]),
        ],
    ));
    let line = Arc::new(CompositeType::new(
        "OrderLine",
        vec![
            AttributeDescriptor::to_one("product", "Product", ["product_id"]).not_null(),
            AttributeDescriptor::basic("quantity", BasicType::Int),
        ],
    ));

    EntityDescriptor::new("Order", IdentifierDescriptor::non_encapsulated(order_id_type()))
        .with_attribute(AttributeDescriptor::composite("shipping", address))
        .with_attribute(
            AttributeDescriptor::collection(
                "lines",
                Arc::new(CollectionDescriptor::new(
                    "Order.lines",
                    AttributeType::Composite(line),
                )),
            )
            .with_fetch(FetchStrategy::IMMEDIATE_JOIN),
        )
        .with_attribute(AttributeDescriptor::basic("note", BasicType::Text))
}

pub(crate) fn product() -> EntityDescriptor {
    EntityDescriptor::new("Product", IdentifierDescriptor::simple("id", BasicType::Int))
        .with_attribute(AttributeDescriptor::basic("name", BasicType::Text))
}

pub(crate) fn country() -> EntityDescriptor {
    EntityDescriptor::new("Country", IdentifierDescriptor::simple("code", BasicType::Text))
}

pub(crate) fn customer_profile() -> EntityDescriptor {
    EntityDescriptor::new(
        "CustomerProfile",
        IdentifierDescriptor::encapsulated(
            AttributeDescriptor::to_one("customer", "Customer", ["customer_id"]).not_null(),
        ),
    )
    .with_attribute(AttributeDescriptor::basic("bio", BasicType::Text))
}

pub(crate) fn invoice() -> EntityDescriptor {
    let key = Arc::new(CompositeType::new(
        "InvoiceKey",
        vec![
            AttributeDescriptor::to_one("customer", "Customer", ["customer_id"]).not_null(),
            AttributeDescriptor::basic("number", BasicType::Int).not_null(),
        ],
    ));

    EntityDescriptor::new(
        "Invoice",
        IdentifierDescriptor::encapsulated(AttributeDescriptor::composite("id", key).not_null()),
    )
    .with_attribute(AttributeDescriptor::basic("total", BasicType::Int))
}

pub(crate) fn commerce_registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    for entity in [
        customer(),
        order(),
        product(),
        country(),
        customer_profile(),
        invoice(),
    ] {
        registry.register(entity).expect("fixture entity registers");
    }
    registry.validate().expect("fixture registry validates");

    registry
}

/// Walk `entity` as a root with the default configured strategy.
pub(crate) fn plan_for(registry: &MetadataRegistry, entity: &str) -> LoadPlan {
    let mut builder = LoadPlanBuilder::new(registry, ConfiguredStrategy::default());
    MetadataWalker::new(registry)
        .walk_entity(&mut builder, entity)
        .expect("fixture walk succeeds");

    builder.into_load_plan().expect("fixture plan builds")
}

///
/// EagerStrategy
/// Joins every association immediately.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct EagerStrategy {
    pub(crate) root_entities: bool,
    pub(crate) root_collections: bool,
}

impl Default for EagerStrategy {
    fn default() -> Self {
        Self {
            root_entities: true,
            root_collections: true,
        }
    }
}

impl LoadPlanBuildingStrategy for EagerStrategy {
    fn supports_root_entity_returns(&self) -> bool {
        self.root_entities
    }

    fn supports_root_collection_returns(&self) -> bool {
        self.root_collections
    }

    fn decide_fetch_strategy(
        &self,
        _attribute: &AttributeDescriptor,
        _context: &FetchDecisionContext<'_>,
    ) -> FetchStrategy {
        FetchStrategy::IMMEDIATE_JOIN
    }
}

///
/// RecordingSink
///

#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<PlanTraceEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<PlanTraceEvent> {
        self.events.lock().expect("trace lock").clone()
    }
}

impl PlanTraceSink for RecordingSink {
    fn on_event(&self, event: PlanTraceEvent) {
        self.events.lock().expect("trace lock").push(event);
    }
}
