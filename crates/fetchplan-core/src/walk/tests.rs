use super::*;
use crate::{
    build::ConfiguredStrategy,
    config::BuilderConfig,
    model::{BasicType, CompositeType, FetchStrategy, IdentifierDescriptor},
    obs::PlanTraceEvent,
    path::PropertyPath,
    plan::{Fetch, HydratedValueExtractor, LoadPlan, LoadPlanDisposition},
    test_fixtures::{EagerStrategy, RecordingSink, commerce_registry, plan_for},
};
use std::sync::Arc;

fn path(segments: &[&str]) -> PropertyPath {
    let (first, rest) = segments.split_first().expect("non-empty path");
    rest.iter()
        .fold(PropertyPath::root(*first), |path, segment| path.append(*segment))
}

fn shape(plan: &LoadPlan) -> Vec<(String, &'static str, u32)> {
    plan.nodes()
        .map(|node| {
            (
                node.path().full_path(),
                node.kind_label(),
                node.table_group().get(),
            )
        })
        .collect()
}

fn eager_plan(registry: &MetadataRegistry, entity: &str) -> LoadPlan {
    let mut builder = LoadPlanBuilder::new(registry, EagerStrategy::default());
    MetadataWalker::new(registry)
        .walk_entity(&mut builder, entity)
        .expect("walk");

    builder.into_load_plan().expect("plan")
}

#[test]
fn order_walk_builds_nodes_in_visitation_order() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");

    assert_eq!(
        shape(&plan),
        vec![
            ("Order".to_string(), "entity-return", 0),
            ("Order.<id>.customerId".to_string(), "entity-fetch", 1),
            ("Order.shipping".to_string(), "composite-fetch", 0),
            ("Order.shipping.country".to_string(), "entity-fetch", 2),
            ("Order.lines".to_string(), "collection-fetch", 3),
            ("Order.lines.<elements>".to_string(), "composite-element-graph", 3),
            ("Order.lines.<elements>.product".to_string(), "entity-fetch", 4),
        ]
    );
}

#[test]
fn nested_identifier_descriptions_are_injected_everywhere() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");

    for node in plan.nodes() {
        if let Some(reference) = node.as_entity_reference() {
            assert!(
                reference.identifier_description().is_some(),
                "{} has no identifier description",
                node.path()
            );
        }
    }

    let customer = plan
        .find(&path(&["Order", "<id>", "customerId"]))
        .expect("customer");
    assert!(plan.identifier_description(customer).expect("injected").is_empty());
}

#[test]
fn deferred_collection_on_customer_leaves_a_single_node() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Customer");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.disposition(), LoadPlanDisposition::EntityLoader);
}

/// Author ──books──▶ [Book], Book ──author──▶ Author.
fn library_registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry
        .register(
            EntityDescriptor::new("Author", IdentifierDescriptor::simple("id", BasicType::Int))
                .with_attribute(AttributeDescriptor::collection(
                    "books",
                    Arc::new(CollectionDescriptor::new(
                        "Author.books",
                        AttributeType::Entity {
                            target: "Book".to_string(),
                        },
                    )),
                )),
        )
        .expect("author");
    registry
        .register(
            EntityDescriptor::new("Book", IdentifierDescriptor::simple("id", BasicType::Int))
                .with_attribute(AttributeDescriptor::to_one("author", "Author", ["author_id"])),
        )
        .expect("book");
    registry.validate().expect("valid");

    registry
}

/// Account ──primaryCard──▶ Card, Card id {account ─▶ Account, seq}.
fn wallet_registry() -> MetadataRegistry {
    let card_id = Arc::new(CompositeType::new(
        "CardId",
        vec![
            AttributeDescriptor::to_one("account", "Account", ["account_id"]).not_null(),
            AttributeDescriptor::basic("seq", BasicType::Int).not_null(),
        ],
    ));
    let mut registry = MetadataRegistry::new();
    registry
        .register(
            EntityDescriptor::new("Account", IdentifierDescriptor::simple("id", BasicType::Int))
                .with_attribute(AttributeDescriptor::to_one(
                    "primaryCard",
                    "Card",
                    ["card_account_id", "card_seq"],
                )),
        )
        .expect("account");
    registry
        .register(EntityDescriptor::new(
            "Card",
            IdentifierDescriptor::non_encapsulated(card_id),
        ))
        .expect("card");
    registry.validate().expect("valid");

    registry
}

#[test]
fn circular_association_is_skipped_on_second_visit() {
    let registry = library_registry();
    let sink = RecordingSink::default();
    let mut builder =
        LoadPlanBuilder::new(&registry, EagerStrategy::default()).with_trace(&sink);
    MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Author")
        .expect("walk terminates");
    let plan = builder.into_load_plan().expect("plan");

    let inner = path(&["Author", "books", "<elements>", "author"]);
    assert!(plan.find(&inner).is_some());
    assert!(plan.find(&inner.append("books")).is_none());
    assert!(sink.events().contains(&PlanTraceEvent::CircularAssociationSkipped {
        path: "Author.books.<elements>.author.books".to_string(),
    }));
}

#[test]
fn key_many_to_one_back_to_fetch_owner_links_instead_of_fetching() {
    let registry = wallet_registry();
    let plan = plan_for(&registry, "Account");

    assert_eq!(
        shape(&plan),
        vec![
            ("Account".to_string(), "entity-return", 0),
            ("Account.primaryCard".to_string(), "entity-fetch", 1),
            (
                "Account.primaryCard.<id>.account".to_string(),
                "bidirectional-entity-fetch",
                0
            ),
        ]
    );

    let root = plan.returns()[0];
    let card = plan
        .find(&path(&["Account", "primaryCard"]))
        .expect("card fetch");
    let description = plan.identifier_description(card).expect("injected");
    let [link] = description.fetches() else {
        panic!("expected the account link");
    };
    let Some(Fetch::BidirectionalEntity(fetch)) = plan.node(*link).as_fetch() else {
        panic!("expected a bidirectional fetch");
    };
    assert_eq!(fetch.target, root);
    assert_eq!(fetch.info.owner, card);
    assert!(plan.node(*link).as_entity_reference().is_none());
    assert!(matches!(
        description.extractor_for(*link),
        Some(HydratedValueExtractor::Component { index: 0, .. })
    ));
}

#[test]
fn collection_root_elements_fetch_their_key_many_to_one() {
    // A collection root has no owning entity to link back to.
    let registry = commerce_registry();
    let strategy = ConfiguredStrategy::new(BuilderConfig {
        supports_root_collection_returns: true,
        ..BuilderConfig::default()
    });
    let mut builder = LoadPlanBuilder::new(&registry, strategy);
    MetadataWalker::new(&registry)
        .walk_collection(&mut builder, "Customer.orders")
        .expect("walk");
    let plan = builder.into_load_plan().expect("plan");

    let customer = plan
        .find(&path(&["Customer.orders", "<elements>", "<id>", "customerId"]))
        .expect("customer fetch");
    assert_eq!(plan.node(customer).kind_label(), "entity-fetch");
}

#[test]
fn entity_element_graph_opens_its_own_reference() {
    let registry = commerce_registry();
    let plan = eager_plan(&registry, "Customer");

    let orders = plan.find(&path(&["Customer", "orders"])).expect("orders");
    let graph = plan
        .collection_reference(orders)
        .and_then(|reference| reference.element_graph())
        .expect("element graph");
    let node = plan.node(graph);

    assert_eq!(node.kind_label(), "entity-element-graph");
    assert_eq!(
        node.as_entity_reference().expect("reference").entity().name,
        "Order"
    );
    assert_ne!(node.table_group(), plan.node(orders).table_group());

    let description = plan.identifier_description(graph).expect("injected");
    let [customer] = description.fetches() else {
        panic!("expected the customerId fetch");
    };
    assert_eq!(plan.node(*customer).parent(), Some(graph));
    assert!(matches!(
        description.extractor_for(*customer),
        Some(HydratedValueExtractor::Component { index: 0, .. })
    ));

    // customerId points back at the customer owning the collection.
    let root = plan.returns()[0];
    assert_eq!(plan.node(*customer).kind_label(), "bidirectional-entity-fetch");
    assert!(matches!(
        plan.node(*customer).as_fetch(),
        Some(Fetch::BidirectionalEntity(link)) if link.target == root
    ));
    assert_eq!(plan.node(*customer).table_group(), plan.node(root).table_group());
    assert!(
        plan.find(&path(&["Customer", "orders", "<elements>", "<id>", "customerId", "orders"]))
            .is_none()
    );
}

#[test]
fn root_collection_walk_builds_collection_initializer() {
    let registry = commerce_registry();
    let strategy = ConfiguredStrategy::new(BuilderConfig {
        supports_root_collection_returns: true,
        ..BuilderConfig::default()
    });
    let mut builder = LoadPlanBuilder::new(&registry, strategy);
    MetadataWalker::new(&registry)
        .walk_collection(&mut builder, "Customer.orders")
        .expect("walk");
    let plan = builder.into_load_plan().expect("plan");

    assert_eq!(plan.disposition(), LoadPlanDisposition::CollectionInitializer);
    let root = plan.returns()[0];
    assert_eq!(plan.node(root).kind_label(), "collection-return");
    assert!(plan.node(root).fetches().is_empty());

    let graph = plan
        .collection_reference(root)
        .and_then(|reference| reference.element_graph())
        .expect("element graph");
    assert_eq!(
        plan.node(graph).path(),
        &path(&["Customer.orders", "<elements>"])
    );
    assert!(
        plan.find(&path(&["Customer.orders", "<elements>", "<id>", "customerId"]))
            .is_some()
    );
    assert!(
        plan.find(&path(&["Customer.orders", "<elements>", "lines", "<elements>", "product"]))
            .is_some()
    );
}

#[test]
fn root_collection_walk_is_refused_by_default() {
    let registry = commerce_registry();
    let mut builder = LoadPlanBuilder::new(&registry, ConfiguredStrategy::default());

    let err = MetadataWalker::new(&registry)
        .walk_collection(&mut builder, "Customer.orders")
        .expect_err("refused");

    assert!(err.is_unsupported());
    assert_eq!(builder.path_depth(), 0);
    assert!(builder.plan().is_empty());
}

#[test]
fn unknown_root_is_a_lookup_failure_and_still_finishes() {
    let registry = commerce_registry();
    let sink = RecordingSink::default();
    let mut builder =
        LoadPlanBuilder::new(&registry, ConfiguredStrategy::default()).with_trace(&sink);

    let err = MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Warehouse")
        .expect_err("unknown");

    assert!(err.is_metadata_lookup());
    assert_eq!(
        sink.events().last(),
        Some(&PlanTraceEvent::WalkFinished {
            returns: 0,
            nodes: 0,
        })
    );
}

#[test]
fn depth_limit_defers_nested_associations() {
    let registry = commerce_registry();
    let mut builder = LoadPlanBuilder::new(
        &registry,
        ConfiguredStrategy::new(BuilderConfig {
            max_fetch_depth: Some(1),
            ..BuilderConfig::default()
        }),
    );
    MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Order")
        .expect("walk");
    let plan = builder.into_load_plan().expect("plan");

    assert!(plan.find(&path(&["Order", "shipping", "country"])).is_some());
    assert!(plan.find(&path(&["Order", "lines"])).is_some());
    assert!(
        plan.find(&path(&["Order", "lines", "<elements>", "product"]))
            .is_none()
    );
}

#[test]
fn collection_cap_defers_extra_collections() {
    let registry = commerce_registry();
    let mut builder = LoadPlanBuilder::new(
        &registry,
        ConfiguredStrategy::new(BuilderConfig {
            max_joined_collections: Some(0),
            ..BuilderConfig::default()
        }),
    );
    MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Order")
        .expect("walk");
    let plan = builder.into_load_plan().expect("plan");

    assert!(plan.find(&path(&["Order", "lines"])).is_none());
    assert_eq!(plan.node(plan.returns()[0]).fetches().len(), 1);
}

#[test]
fn builder_is_reusable_for_a_second_root() {
    let registry = commerce_registry();
    let mut builder = LoadPlanBuilder::new(&registry, ConfiguredStrategy::default());
    let walker = MetadataWalker::new(&registry);

    walker.walk_entity(&mut builder, "Customer").expect("first");
    walker.walk_entity(&mut builder, "Product").expect("second");
    let plan = builder.into_load_plan().expect("plan");

    assert_eq!(plan.returns().len(), 2);
    assert_eq!(plan.disposition(), LoadPlanDisposition::Mixed);
    assert_ne!(
        plan.node(plan.returns()[0]).table_group(),
        plan.node(plan.returns()[1]).table_group()
    );
}

#[test]
fn encapsulated_composite_identifier_keeps_component_fetch_under_composite() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Invoice");
    let root = plan.returns()[0];

    let description = plan.identifier_description(root).expect("injected");
    let [key] = description.fetches() else {
        panic!("expected one identifier fetch");
    };
    assert!(!description.has_extractors());
    assert_eq!(plan.node(*key).kind_label(), "composite-fetch");
    assert_eq!(plan.node(*key).path(), &path(&["Invoice", "id"]));
    assert_eq!(plan.node(*key).fetches().len(), 1);
    assert!(plan.node(root).fetches().is_empty());
}

#[test]
fn derived_identity_description_has_no_extractor_map() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "CustomerProfile");
    let root = plan.returns()[0];

    let description = plan.identifier_description(root).expect("injected");
    assert_eq!(description.fetches().len(), 1);
    assert!(!description.has_extractors());
    assert_eq!(
        plan.node(description.fetches()[0]).path(),
        &path(&["CustomerProfile", "customer"])
    );
}

#[test]
fn root_collection_role_counts_as_visited() {
    let registry = commerce_registry();
    let sink = RecordingSink::default();
    let mut builder =
        LoadPlanBuilder::new(&registry, EagerStrategy::default()).with_trace(&sink);
    MetadataWalker::new(&registry)
        .walk_collection(&mut builder, "Customer.orders")
        .expect("walk");
    let plan = builder.into_load_plan().expect("plan");

    let customer = path(&["Customer.orders", "<elements>", "<id>", "customerId"]);
    assert!(plan.find(&customer).is_some());
    assert!(plan.find(&customer.append("orders")).is_none());
    assert!(sink.events().contains(&PlanTraceEvent::CircularAssociationSkipped {
        path: "Customer.orders.<elements>.<id>.customerId.orders".to_string(),
    }));
}

#[test]
fn keyed_collection_builds_an_entity_index_graph() {
    let mut registry = MetadataRegistry::new();
    registry
        .register(EntityDescriptor::new(
            "Region",
            IdentifierDescriptor::simple("code", BasicType::Text),
        ))
        .expect("region");
    registry
        .register(
            EntityDescriptor::new("Warehouse", IdentifierDescriptor::simple("id", BasicType::Int))
                .with_attribute(AttributeDescriptor::collection(
                    "stock",
                    Arc::new(
                        CollectionDescriptor::new(
                            "Warehouse.stock",
                            AttributeType::Basic(BasicType::Int),
                        )
                        .with_index(AttributeType::Entity {
                            target: "Region".to_string(),
                        }),
                    ),
                )
                .with_fetch(FetchStrategy::IMMEDIATE_JOIN)),
        )
        .expect("warehouse");
    registry.validate().expect("valid");

    let plan = plan_for(&registry, "Warehouse");
    assert_eq!(
        shape(&plan),
        vec![
            ("Warehouse".to_string(), "entity-return", 0),
            ("Warehouse.stock".to_string(), "collection-fetch", 1),
            (
                "Warehouse.stock.<index>".to_string(),
                "entity-element-graph",
                2
            ),
        ]
    );

    let stock = plan
        .find(&path(&["Warehouse", "stock"]))
        .expect("stock fetch");
    let reference = plan
        .node(stock)
        .as_collection_reference()
        .expect("collection reference");
    assert!(reference.element_graph().is_none());
    let index = reference.index_graph().expect("index graph");
    assert!(
        plan.node(index)
            .as_entity_reference()
            .expect("entity graph")
            .identifier_description()
            .is_some()
    );
}

fn tags(role: &str) -> AttributeDescriptor {
    AttributeDescriptor::collection(
        "tags",
        Arc::new(CollectionDescriptor::new(
            role,
            AttributeType::Basic(BasicType::Text),
        )),
    )
    .with_fetch(FetchStrategy::IMMEDIATE_JOIN)
}

#[test]
fn collection_inside_encapsulated_composite_identifier_is_rejected() {
    let key = Arc::new(CompositeType::new(
        "TicketKey",
        vec![
            AttributeDescriptor::to_one("owner", "Customer", ["owner_id"]).not_null(),
            tags("TicketKey.tags"),
        ],
    ));
    let mut registry = commerce_registry();
    registry
        .register(EntityDescriptor::new(
            "Ticket",
            IdentifierDescriptor::encapsulated(AttributeDescriptor::composite("id", key)),
        ))
        .expect("ticket");
    registry.validate().expect("valid");

    let mut builder = LoadPlanBuilder::new(&registry, EagerStrategy::default());
    let err = MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Ticket")
        .expect_err("collection in identifier");

    assert!(err.is_walk_protocol());
    assert_eq!(err.origin, crate::error::ErrorOrigin::Identifier);
    assert!(
        err.message
            .contains("identifier cannot contain persistent collections"),
        "message: {}",
        err.message
    );
    assert_eq!(err.path.as_deref(), Some("Ticket.id"));
    assert!(builder.plan().find(&path(&["Ticket", "id", "tags"])).is_none());
}

#[test]
fn collection_inside_identifier_component_composite_is_rejected() {
    let spot = Arc::new(CompositeType::new(
        "Spot",
        vec![
            AttributeDescriptor::basic("aisle", BasicType::Int),
            tags("Spot.tags"),
        ],
    ));
    let shelf_id = Arc::new(CompositeType::new(
        "ShelfId",
        vec![
            AttributeDescriptor::to_one("owner", "Customer", ["owner_id"]).not_null(),
            AttributeDescriptor::composite("location", spot),
        ],
    ));
    let mut registry = commerce_registry();
    registry
        .register(EntityDescriptor::new(
            "Shelf",
            IdentifierDescriptor::non_encapsulated(shelf_id),
        ))
        .expect("shelf");
    registry.validate().expect("valid");

    let mut builder = LoadPlanBuilder::new(&registry, ConfiguredStrategy::default());
    let err = MetadataWalker::new(&registry)
        .walk_entity(&mut builder, "Shelf")
        .expect_err("collection in identifier");

    assert!(err.is_walk_protocol());
    assert_eq!(err.path.as_deref(), Some("Shelf.<id>.location"));
    assert!(builder.is_poisoned());
}
