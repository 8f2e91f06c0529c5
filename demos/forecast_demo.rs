use chrono::NaiveDate;
use cost_forecast_engine::*;
use std::collections::BTreeMap;

fn main() -> Result<()> {
    println!("📊 Cost Forecast Demo\n");

    let engine = ForecastEngine::new(EngineConfig::default())?;
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

    let request = DistributionRequest {
        total_budget: 250_000.0,
        start_date: start,
        end_date: end,
        granularity: Granularity::Month,
        profile: DistributionProfile::Curve { history: None },
    };

    println!("1️⃣  S-curve distribution of {:.2}", request.total_budget);
    let plan = engine.calculate(&request).into_result()?;
    for period in &plan.periods {
        println!(
            "   {:<10} {:>12.2}  ({:>5.1}%)",
            period.label, period.amount, period.percentage
        );
    }
    println!("   confidence: {:?}\n", plan.confidence);

    println!("2️⃣  Profile comparison (most even first)");
    for comparison in engine.compare_profiles(&request) {
        println!(
            "   {:?}: variance metric {:.2}",
            comparison.profile, comparison.variance_metric
        );
    }
    println!();

    let now = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    println!("3️⃣  Reprofile with 140,000.00 spent as of {}", now);
    let revised = engine.reprofile(&request, 140_000.0, now).into_result()?;
    for period in &revised.periods {
        println!("   {:<10} {:>12.2}", period.label, period.amount);
    }
    println!();

    let mut history = EstimateHistory::new();
    history.record("P-100", &plan, start)?;
    history.record("P-100", &revised, now)?;
    for change in history.changes("P-100")? {
        println!(
            "   estimate {} -> {}: {:+.2} ({:+.1}%)",
            change.from,
            change.to,
            change.delta,
            change.delta_percent.unwrap_or(0.0)
        );
    }
    println!();

    println!("4️⃣  Import header detection");
    let headers = ["Project No", "PO #", "Supplier", "Line Description", "Value", "Order Date"];
    let suggestions = detect_mapping(&headers, TargetSchema::Commitment);
    for s in &suggestions {
        println!(
            "   {:<18} -> {:<12} ({:.2})",
            s.source_header, s.target_column, s.confidence
        );
    }
    println!(
        "   missing required: {:?}\n",
        missing_required(TargetSchema::Commitment, &suggestions)
    );

    println!("5️⃣  Cost element tree");
    let items = vec![
        line_item("P-100", "acme", "Acme Design", "PO-010", "UX design", 18_000.0),
        line_item("P-100", "byte", "Byte Works", "PO-060", "Backend development", 52_000.0),
        line_item("P-100", "byte", "Byte Works", "PO-140", "Load testing", 9_500.0),
        line_item("P-200", "iron", "Iron Rack", "PO-020", "Rack hardware", 31_000.0),
    ];
    let names = BTreeMap::from([
        ("P-100".to_string(), "Customer Portal".to_string()),
        ("P-200".to_string(), "Data Centre Refresh".to_string()),
    ]);
    let ces = HierarchyBuilder::new(engine.config())
        .with_project_names(names)
        .build_cost_element_tree(&items, "EUR");
    for flat in flatten_tree(&ces) {
        println!(
            "   {}{:<24} budget {:>10.2}  spend {:>10.2}  variance {:>10.2}",
            "  ".repeat(flat.depth),
            flat.node.name,
            flat.node.total_budget,
            flat.node.total_spend,
            flat.node.variance
        );
    }
    println!();

    println!("6️⃣  Portfolio anomalies");
    let portfolio: Vec<ProjectSnapshot> = [
        ("P-100", 20_000.0, 45.0, 30_000.0, 35_000.0),
        ("P-200", 18_000.0, 96.0, 10_000.0, 12_000.0),
        ("P-300", 21_000.0, 30.0, 5_000.0, 22_000.0),
        ("P-400", 19_500.0, 55.0, 40_000.0, 41_000.0),
    ]
    .iter()
    .map(|(id, variance, spend, commitments, actuals)| ProjectSnapshot {
        project_id: id.to_string(),
        project_name: None,
        budget: 100_000.0,
        total_commitments: *commitments,
        total_actuals: *actuals,
        variance: *variance,
        spend_percentage: *spend,
    })
    .collect();

    for anomaly in engine.detect_anomalies(&portfolio) {
        println!(
            "   [{:?}] {:?} {} ({:.0}% confidence)",
            anomaly.severity,
            anomaly.anomaly_type,
            anomaly.description,
            anomaly.confidence * 100.0
        );
    }

    Ok(())
}

fn line_item(
    project_id: &str,
    vendor_id: &str,
    vendor_name: &str,
    po_number: &str,
    description: &str,
    amount: f64,
) -> LineItem {
    LineItem {
        project_id: project_id.to_string(),
        vendor_id: vendor_id.to_string(),
        vendor_name: vendor_name.to_string(),
        po_number: po_number.to_string(),
        description: description.to_string(),
        amount,
        issue_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
    }
}
