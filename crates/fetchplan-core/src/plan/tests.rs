use super::*;
use crate::{
    path::PropertyPath,
    test_fixtures::{commerce_registry, plan_for},
    value::Value,
};

fn path(segments: &[&str]) -> PropertyPath {
    let (first, rest) = segments.split_first().expect("non-empty path");
    rest.iter()
        .fold(PropertyPath::root(*first), |path, segment| path.append(*segment))
}

#[test]
fn suffixed_alias_appends_table_group() {
    let mut plan = LoadPlan::default();
    let first = plan.allocate_table_group();
    let second = plan.allocate_table_group();

    assert_eq!(suffixed_alias("customer_id", first), "customer_id_0");
    assert_eq!(suffixed_alias("customer_id", second), "customer_id_1");
}

#[test]
fn component_extractor_reads_tuple_position() {
    let owner = Value::Tuple(vec![Value::Int(7), Value::Int(3)]);
    let extractor = HydratedValueExtractor::Component {
        index: 1,
        property: "orderSeq".to_string(),
    };

    assert_eq!(extractor.extract(&owner).expect("component"), Value::Int(3));
    assert_eq!(
        HydratedValueExtractor::Whole.extract(&owner).expect("whole"),
        owner
    );
}

#[test]
fn component_extractor_rejects_scalar_owner() {
    let extractor = HydratedValueExtractor::Component {
        index: 0,
        property: "customerId".to_string(),
    };
    let err = extractor.extract(&Value::Int(7)).expect_err("scalar owner");

    assert_eq!(err.class, crate::error::ErrorClass::InvalidRow);
}

#[test]
fn order_plan_children_follow_declaration_order() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");

    let root = plan.returns()[0];
    let children: Vec<_> = plan
        .node(root)
        .fetches()
        .iter()
        .map(|id| plan.node(*id).path().clone())
        .collect();

    assert_eq!(
        children,
        vec![path(&["Order", "shipping"]), path(&["Order", "lines"])]
    );
    assert_eq!(plan.disposition(), LoadPlanDisposition::EntityLoader);
}

#[test]
fn identifier_fetch_is_owned_by_reference_but_not_a_child() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");
    let root = plan.returns()[0];

    let description = plan.identifier_description(root).expect("injected");
    let [customer] = description.fetches() else {
        panic!("expected one identifier fetch, got {:?}", description.fetches());
    };

    assert_eq!(plan.node(*customer).parent(), Some(root));
    assert!(!plan.node(root).fetches().contains(customer));
    assert_eq!(
        plan.node(*customer).path(),
        &path(&["Order", "<id>", "customerId"])
    );
    assert_eq!(
        description.extractor_for(*customer),
        Some(&HydratedValueExtractor::Component {
            index: 0,
            property: "customerId".to_string(),
        })
    );
}

#[test]
fn owning_entity_reference_climbs_composites() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");

    let shipping = plan.find(&path(&["Order", "shipping"])).expect("shipping");
    let country = plan
        .find(&path(&["Order", "shipping", "country"]))
        .expect("country");

    assert_eq!(plan.owning_entity_reference(shipping), Some(plan.returns()[0]));
    assert_eq!(plan.owning_entity_reference(country), Some(country));
    assert_eq!(
        plan.node(shipping).table_group(),
        plan.node(plan.returns()[0]).table_group()
    );
    assert_ne!(
        plan.node(country).table_group(),
        plan.node(shipping).table_group()
    );
}

#[test]
fn collection_fetch_exposes_composite_element_graph() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");

    let lines = plan.find(&path(&["Order", "lines"])).expect("lines");
    let reference = plan.collection_reference(lines).expect("collection");
    let graph = reference.element_graph().expect("composite elements");

    assert!(reference.index_graph().is_none());
    assert!(!plan.node(lines).is_fetch_owner());
    assert!(plan.node(lines).fetches().is_empty());
    assert_eq!(plan.node(graph).kind_label(), "composite-element-graph");
    assert_eq!(
        plan.node(graph).path(),
        &path(&["Order", "lines", "<elements>"])
    );
    assert_eq!(plan.node(graph).parent(), Some(lines));
    assert_eq!(plan.node(graph).fetches().len(), 1);
}

#[test]
fn identifier_description_cannot_be_injected_twice() {
    let registry = commerce_registry();
    let mut plan = plan_for(&registry, "Customer");
    let root = plan.returns()[0];

    let err = plan
        .node_mut(root)
        .as_entity_reference_mut()
        .expect("entity return")
        .inject_identifier_description(IdentifierDescription::default())
        .expect_err("second injection");

    assert!(err.is_double_injection());
    assert!(plan.identifier_description(root).expect("kept").is_empty());
}

#[test]
fn adding_a_fetch_to_a_collection_reference_is_rejected() {
    let registry = commerce_registry();
    let mut plan = plan_for(&registry, "Order");
    let lines = plan.find(&path(&["Order", "lines"])).expect("lines");
    let Some(Fetch::Collection(fetch)) = plan.node(lines).as_fetch().cloned() else {
        panic!("lines is a collection fetch");
    };
    let group = plan.node(lines).table_group();

    let err = plan
        .add_fetch(
            lines,
            path(&["Order", "lines", "bogus"]),
            group,
            Fetch::Collection(fetch),
        )
        .expect_err("collection cannot own fetches");

    assert!(err.is_walk_protocol());
}

#[test]
fn fetches_lookup_is_checked() {
    let registry = commerce_registry();
    let plan = plan_for(&registry, "Order");
    let root = plan.returns()[0];

    assert_eq!(plan.fetches(root).map(<[NodeId]>::len), Some(2));
    assert!(plan.fetches(NodeId(99)).is_none());
}
