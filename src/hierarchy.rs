use crate::config::EngineConfig;
use crate::schema::{HierarchyNode, LineItem};
use crate::utils::{match_keyword, round_to_cents, trailing_number};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Builds cost-element (project -> category -> vendor) and work-breakdown
/// (phase -> work package -> line item) trees from flat line items.
///
/// Spend is summed bottom-up. A node's budget is, in order of preference:
/// an explicit project budget, the sum of its children's budgets, or its
/// spend times `budget_estimate_factor`.
pub struct HierarchyBuilder<'a> {
    config: &'a EngineConfig,
    project_names: BTreeMap<String, String>,
    project_budgets: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HierarchyTotals {
    pub total_budget: f64,
    pub total_spend: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'n> {
    pub depth: usize,
    pub node: &'n HierarchyNode,
}

// Parameters shared by every node of one tree.
struct NodeSpec<'s> {
    id: String,
    name: String,
    level: usize,
    parent_id: Option<String>,
    currency: &'s str,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            project_names: BTreeMap::new(),
            project_budgets: BTreeMap::new(),
        }
    }

    pub fn with_project_names(mut self, names: BTreeMap<String, String>) -> Self {
        self.project_names = names;
        self
    }

    pub fn with_project_budgets(mut self, budgets: BTreeMap<String, f64>) -> Self {
        self.project_budgets = budgets;
        self
    }

    pub fn category_for(&self, item: &LineItem) -> String {
        match_keyword(&item.description, &self.config.category_vocabulary)
            .unwrap_or(self.config.default_category.as_str())
            .to_string()
    }

    pub fn work_package_for(&self, item: &LineItem) -> String {
        match_keyword(&item.description, &self.config.work_package_vocabulary)
            .unwrap_or(self.config.default_work_package.as_str())
            .to_string()
    }

    /// 1-based phase number from the PO number's trailing digits. A PO
    /// without digits counts as 0 and lands in the first phase.
    pub fn phase_for(&self, item: &LineItem) -> usize {
        let suffix = trailing_number(&item.po_number).unwrap_or(0);
        self.config
            .phase_boundaries
            .iter()
            .position(|bound| suffix <= *bound)
            .unwrap_or(self.config.phase_boundaries.len())
            + 1
    }

    pub fn build_cost_element_tree(&self, items: &[LineItem], currency: &str) -> Vec<HierarchyNode> {
        // project -> category -> vendor id -> (vendor name, items)
        let mut grouped: BTreeMap<&str, BTreeMap<String, BTreeMap<&str, (&str, Vec<&LineItem>)>>> =
            BTreeMap::new();

        for item in items {
            let vendor = grouped
                .entry(item.project_id.as_str())
                .or_default()
                .entry(self.category_for(item))
                .or_default()
                .entry(item.vendor_id.as_str())
                .or_insert_with(|| (item.vendor_name.as_str(), Vec::new()));
            vendor.1.push(item);
        }

        debug!(
            "Cost element tree: {} line items across {} projects",
            items.len(),
            grouped.len()
        );

        grouped
            .into_iter()
            .map(|(project_id, categories)| {
                let category_nodes = categories
                    .into_iter()
                    .map(|(category, vendors)| {
                        let category_id = format!("{}/{}", project_id, category);
                        let vendor_nodes = vendors
                            .into_iter()
                            .map(|(vendor_id, (vendor_name, vendor_items))| {
                                let spend = vendor_items.iter().map(|i| i.amount).sum();
                                self.rollup(
                                    NodeSpec {
                                        id: format!("{}/{}", category_id, vendor_id),
                                        name: vendor_name.to_string(),
                                        level: 2,
                                        parent_id: Some(category_id.clone()),
                                        currency,
                                    },
                                    Vec::new(),
                                    spend,
                                    None,
                                )
                            })
                            .collect();

                        self.rollup(
                            NodeSpec {
                                id: category_id.clone(),
                                name: category,
                                level: 1,
                                parent_id: Some(project_id.to_string()),
                                currency,
                            },
                            vendor_nodes,
                            0.0,
                            None,
                        )
                    })
                    .collect();

                let name = self
                    .project_names
                    .get(project_id)
                    .cloned()
                    .unwrap_or_else(|| project_id.to_string());

                self.rollup(
                    NodeSpec {
                        id: project_id.to_string(),
                        name,
                        level: 0,
                        parent_id: None,
                        currency,
                    },
                    category_nodes,
                    0.0,
                    self.project_budgets.get(project_id).copied(),
                )
            })
            .collect()
    }

    pub fn build_work_breakdown_tree(&self, items: &[LineItem], currency: &str) -> Vec<HierarchyNode> {
        // phase -> work package -> items, in input order
        let mut grouped: BTreeMap<usize, BTreeMap<String, Vec<&LineItem>>> = BTreeMap::new();
        for item in items {
            grouped
                .entry(self.phase_for(item))
                .or_default()
                .entry(self.work_package_for(item))
                .or_default()
                .push(item);
        }

        debug!(
            "Work breakdown tree: {} line items across {} phases",
            items.len(),
            grouped.len()
        );

        grouped
            .into_iter()
            .map(|(phase, packages)| {
                let phase_id = format!("phase-{}", phase);
                let package_nodes = packages
                    .into_iter()
                    .map(|(package, package_items)| {
                        let package_id = format!("{}/{}", phase_id, slug(&package));
                        let item_nodes = package_items
                            .into_iter()
                            .enumerate()
                            .map(|(idx, item)| {
                                self.rollup(
                                    NodeSpec {
                                        id: format!("{}/{}-{}", package_id, idx + 1, slug(&item.po_number)),
                                        name: format!("{} - {}", item.po_number, item.vendor_name),
                                        level: 2,
                                        parent_id: Some(package_id.clone()),
                                        currency,
                                    },
                                    Vec::new(),
                                    item.amount,
                                    None,
                                )
                            })
                            .collect();

                        self.rollup(
                            NodeSpec {
                                id: package_id.clone(),
                                name: package,
                                level: 1,
                                parent_id: Some(phase_id.clone()),
                                currency,
                            },
                            item_nodes,
                            0.0,
                            None,
                        )
                    })
                    .collect();

                self.rollup(
                    NodeSpec {
                        id: phase_id.clone(),
                        name: format!("Phase {}", phase),
                        level: 0,
                        parent_id: None,
                        currency,
                    },
                    package_nodes,
                    0.0,
                    None,
                )
            })
            .collect()
    }

    fn rollup(
        &self,
        spec: NodeSpec<'_>,
        children: Vec<HierarchyNode>,
        own_spend: f64,
        explicit_budget: Option<f64>,
    ) -> HierarchyNode {
        let total_spend = if children.is_empty() {
            round_to_cents(own_spend)
        } else {
            round_to_cents(children.iter().map(|c| c.total_spend).sum())
        };

        let total_budget = match explicit_budget {
            Some(budget) => round_to_cents(budget),
            None if !children.is_empty() => {
                round_to_cents(children.iter().map(|c| c.total_budget).sum())
            }
            None => round_to_cents(total_spend * self.config.budget_estimate_factor),
        };

        HierarchyNode {
            id: spec.id,
            name: spec.name,
            level: spec.level,
            parent_id: spec.parent_id,
            currency: spec.currency.to_string(),
            total_budget,
            total_spend,
            variance: round_to_cents(total_budget - total_spend),
            children,
        }
    }
}

pub fn build_cost_element_tree(
    items: &[LineItem],
    currency: &str,
    project_names: Option<&BTreeMap<String, String>>,
) -> Vec<HierarchyNode> {
    let config = EngineConfig::default();
    let builder = HierarchyBuilder::new(&config)
        .with_project_names(project_names.cloned().unwrap_or_default());
    builder.build_cost_element_tree(items, currency)
}

pub fn build_work_breakdown_tree(items: &[LineItem], currency: &str) -> Vec<HierarchyNode> {
    let config = EngineConfig::default();
    HierarchyBuilder::new(&config).build_work_breakdown_tree(items, currency)
}

/// Pre-order, depth-first listing with each node's depth.
pub fn flatten_tree(roots: &[HierarchyNode]) -> Vec<FlatNode<'_>> {
    fn visit<'n>(node: &'n HierarchyNode, depth: usize, out: &mut Vec<FlatNode<'n>>) {
        out.push(FlatNode { depth, node });
        for child in &node.children {
            visit(child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for root in roots {
        visit(root, 0, &mut out);
    }
    out
}

pub fn find_node<'n>(roots: &'n [HierarchyNode], id: &str) -> Option<&'n HierarchyNode> {
    for root in roots {
        if root.id == id {
            return Some(root);
        }
        if let Some(found) = find_node(&root.children, id) {
            return Some(found);
        }
    }
    None
}

/// Names from the root down to the node with `id`, inclusive.
pub fn node_path(roots: &[HierarchyNode], id: &str) -> Option<Vec<String>> {
    for root in roots {
        if root.id == id {
            return Some(vec![root.name.clone()]);
        }
        if let Some(mut rest) = node_path(&root.children, id) {
            rest.insert(0, root.name.clone());
            return Some(rest);
        }
    }
    None
}

pub fn forest_totals(roots: &[HierarchyNode]) -> HierarchyTotals {
    let total_budget = round_to_cents(roots.iter().map(|n| n.total_budget).sum());
    let total_spend = round_to_cents(roots.iter().map(|n| n.total_spend).sum());
    HierarchyTotals {
        total_budget,
        total_spend,
        variance: round_to_cents(total_budget - total_spend),
    }
}

fn slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(project: &str, vendor: &str, po: &str, description: &str, amount: f64) -> LineItem {
        LineItem {
            project_id: project.to_string(),
            vendor_id: vendor.to_lowercase(),
            vendor_name: vendor.to_string(),
            po_number: po.to_string(),
            description: description.to_string(),
            amount,
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    fn sample_items() -> Vec<LineItem> {
        vec![
            item("P1", "Acme", "PO-001", "UI design sprint", 1000.0),
            item("P1", "Acme", "PO-060", "Design review", 500.0),
            item("P1", "Globex", "PO-075", "Backend development", 2500.0),
            item("P1", "Initech", "PO-120", "Catering", 100.0),
            item("P2", "Globex", "PO-030", "Load testing", 750.0),
        ]
    }

    fn assert_rollup(node: &HierarchyNode) {
        if !node.is_leaf() {
            let child_spend: f64 = node.children.iter().map(|c| c.total_spend).sum();
            assert!((node.total_spend - child_spend).abs() < 1e-6, "node {}", node.id);
            for child in &node.children {
                assert_eq!(child.level, node.level + 1);
                assert_eq!(child.parent_id.as_deref(), Some(node.id.as_str()));
                assert_rollup(child);
            }
        }
        assert!((node.variance - (node.total_budget - node.total_spend)).abs() < 0.011);
    }

    #[test]
    fn test_category_extraction() {
        let config = EngineConfig::default();
        let builder = HierarchyBuilder::new(&config);
        assert_eq!(builder.category_for(&item("P", "V", "1", "SOFTWARE licence", 1.0)), "Software");
        assert_eq!(builder.category_for(&item("P", "V", "1", "office chairs", 1.0)), "General");
    }

    #[test]
    fn test_injected_vocabulary() {
        let config = EngineConfig {
            category_vocabulary: vec!["Catering".to_string()],
            default_category: "Misc".to_string(),
            ..EngineConfig::default()
        };
        let builder = HierarchyBuilder::new(&config);
        assert_eq!(builder.category_for(&item("P", "V", "1", "Team catering", 1.0)), "Catering");
        assert_eq!(builder.category_for(&item("P", "V", "1", "UI design", 1.0)), "Misc");
    }

    #[test]
    fn test_phase_boundaries() {
        let config = EngineConfig::default();
        let builder = HierarchyBuilder::new(&config);
        assert_eq!(builder.phase_for(&item("P", "V", "PO-050", "", 1.0)), 1);
        assert_eq!(builder.phase_for(&item("P", "V", "PO-051", "", 1.0)), 2);
        assert_eq!(builder.phase_for(&item("P", "V", "PO-100", "", 1.0)), 2);
        assert_eq!(builder.phase_for(&item("P", "V", "PO-101", "", 1.0)), 3);
        assert_eq!(builder.phase_for(&item("P", "V", "MANUAL", "", 1.0)), 1);
    }

    #[test]
    fn test_cost_element_tree_shape() {
        let tree = build_cost_element_tree(&sample_items(), "USD", None);
        assert_eq!(tree.len(), 2);

        let p1 = &tree[0];
        assert_eq!(p1.id, "P1");
        assert_eq!(p1.name, "P1");
        assert_eq!(p1.total_spend, 4100.0);
        assert_eq!(p1.total_budget, 4920.0);
        assert_eq!(p1.variance, 820.0);
        assert_eq!(p1.currency, "USD");

        let names: Vec<&str> = p1.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Design", "Development", "General"]);

        let design = &p1.children[0];
        assert_eq!(design.children.len(), 1);
        assert_eq!(design.children[0].name, "Acme");
        assert_eq!(design.children[0].total_spend, 1500.0);
        assert_eq!(design.children[0].total_budget, 1800.0);

        for root in &tree {
            assert_rollup(root);
        }
    }

    #[test]
    fn test_project_names_and_budgets() {
        let config = EngineConfig::default();
        let names = BTreeMap::from([("P1".to_string(), "Apollo".to_string())]);
        let budgets = BTreeMap::from([("P1".to_string(), 4000.0)]);
        let tree = HierarchyBuilder::new(&config)
            .with_project_names(names)
            .with_project_budgets(budgets)
            .build_cost_element_tree(&sample_items(), "EUR");

        assert_eq!(tree[0].name, "Apollo");
        assert_eq!(tree[0].total_budget, 4000.0);
        assert_eq!(tree[0].variance, -100.0);
        assert_eq!(tree[1].name, "P2");
        assert_eq!(tree[1].total_budget, 900.0);
    }

    #[test]
    fn test_work_breakdown_tree_shape() {
        let tree = build_work_breakdown_tree(&sample_items(), "USD");
        let phases: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(phases, vec!["Phase 1", "Phase 2", "Phase 3"]);

        let phase1 = &tree[0];
        assert_eq!(phase1.total_spend, 1750.0);
        let packages: Vec<&str> = phase1.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(packages, vec!["Design", "Testing"]);

        let phase3 = &tree[2];
        assert_eq!(phase3.children[0].name, "General Work");
        let leaf = &phase3.children[0].children[0];
        assert!(leaf.is_leaf());
        assert_eq!(leaf.name, "PO-120 - Initech");
        assert_eq!(leaf.total_spend, 100.0);
        assert_eq!(leaf.total_budget, 120.0);

        for root in &tree {
            assert_rollup(root);
        }
    }

    #[test]
    fn test_rollup_with_fractional_amounts() {
        let items = vec![
            item("P1", "A", "PO-1", "design", 0.1),
            item("P1", "B", "PO-2", "design", 0.2),
            item("P1", "C", "PO-3", "design", 33.333),
        ];
        let tree = build_cost_element_tree(&items, "USD", None);
        assert_rollup(&tree[0]);
        assert_eq!(tree[0].total_spend, 33.63);
    }

    #[test]
    fn test_flatten_find_and_path() {
        let tree = build_cost_element_tree(&sample_items(), "USD", None);
        let flat = flatten_tree(&tree);
        assert_eq!(flat.len(), flatten_count(&tree));
        assert_eq!(flat[0].depth, 0);
        assert_eq!(flat[0].node.id, "P1");
        assert_eq!(flat[1].depth, 1);
        assert_eq!(flat[2].depth, 2);

        let node = find_node(&tree, "P1/Development/globex").unwrap();
        assert_eq!(node.total_spend, 2500.0);
        assert!(find_node(&tree, "missing").is_none());

        let path = node_path(&tree, "P1/Development/globex").unwrap();
        assert_eq!(path, vec!["P1", "Development", "Globex"]);
        assert!(node_path(&tree, "missing").is_none());
    }

    fn flatten_count(nodes: &[HierarchyNode]) -> usize {
        nodes.iter().map(|n| 1 + flatten_count(&n.children)).sum()
    }

    #[test]
    fn test_forest_totals() {
        let tree = build_cost_element_tree(&sample_items(), "USD", None);
        let totals = forest_totals(&tree);
        assert_eq!(totals.total_spend, 4850.0);
        assert_eq!(totals.total_budget, 5820.0);
        assert_eq!(totals.variance, 970.0);

        assert_eq!(
            forest_totals(&[]),
            HierarchyTotals {
                total_budget: 0.0,
                total_spend: 0.0,
                variance: 0.0
            }
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(build_cost_element_tree(&[], "USD", None).is_empty());
        assert!(build_work_breakdown_tree(&[], "USD").is_empty());
    }
}
