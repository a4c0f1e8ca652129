//! Tests for domain_hierarchy

use rust_decimal_macros::dec;

use domain_hierarchy::{
    build_tree, ensure_no_cycle, HierarchyError, HierarchyStats, HierarchyUnit, UnitStatus, UnitType,
};

fn sample_units() -> Vec<HierarchyUnit> {
    let dept = HierarchyUnit::new("Renewals Department", UnitType::Department, "mgr-001")
        .unwrap()
        .with_budget(dec!(5000000))
        .unwrap();
    let north = HierarchyUnit::new("North Region", UnitType::Region, "mgr-002")
        .unwrap()
        .under(dept.id)
        .with_budget(dec!(1500000))
        .unwrap();
    let south = HierarchyUnit::new("South Region", UnitType::Region, "mgr-003")
        .unwrap()
        .under(dept.id);
    let mut delhi = HierarchyUnit::new("Delhi State", UnitType::State, "mgr-004")
        .unwrap()
        .under(north.id);
    delhi.status = UnitStatus::Restructuring;
    delhi.target_cases = 120;
    let mut team = HierarchyUnit::new("Senior Renewal Team", UnitType::Team, "mgr-005").unwrap();
    team.target_cases = 40;

    vec![south, delhi, team, north, dept]
}

#[test]
fn test_tree_orders_by_type_then_name() {
    let tree = build_tree(&sample_units());

    let roots: Vec<&str> = tree.iter().map(|n| n.unit.unit_name.as_str()).collect();
    assert_eq!(roots, vec!["Renewals Department", "Senior Renewal Team"]);

    let regions: Vec<&str> = tree[0].children.iter().map(|n| n.unit.unit_name.as_str()).collect();
    assert_eq!(regions, vec!["North Region", "South Region"]);
    assert_eq!(tree[0].children[0].children[0].unit.unit_name, "Delhi State");
}

#[test]
fn test_stats() {
    let stats = HierarchyStats::compute(&sample_units());

    assert_eq!(stats.total_units, 5);
    assert_eq!(stats.by_type["region"], 2);
    assert_eq!(stats.by_status["restructuring"], 1);
    assert_eq!(stats.by_parent["root"], 2);
    assert_eq!(stats.by_parent["Renewals Department"], 2);
    assert_eq!(stats.total_budget, dec!(6500000));
    assert_eq!(stats.total_target_cases, 160);
}

#[test]
fn test_reparent_department_under_its_state_is_a_cycle() {
    let units = sample_units();
    let dept = units.iter().find(|u| u.unit_type == UnitType::Department).unwrap();
    let delhi = units.iter().find(|u| u.unit_type == UnitType::State).unwrap();

    let err = ensure_no_cycle(&units, dept.id, Some(delhi.id)).unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));
}

#[test]
fn test_tree_node_serializes_flat() {
    let tree = build_tree(&sample_units());
    let json = serde_json::to_value(&tree[1]).unwrap();
    assert_eq!(json["unit_name"], "Senior Renewal Team");
    assert_eq!(json["unit_type"], "team");
    assert!(json["children"].as_array().unwrap().is_empty());
}
