use cellar_core::{AdditiveCost, AppleCost, CostInputs, PackagingCost, Unit};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn build_sheet(lines: usize) -> CostInputs {
    let mut apples = Vec::with_capacity(lines);
    let mut additives = Vec::with_capacity(lines);
    let mut packaging = Vec::with_capacity(lines);
    for i in 0..lines {
        apples.push(AppleCost {
            variety: format!("V{}", i % 12),
            weight: 250.0 + i as f64,
            weight_unit: Unit::Kilogram,
            cost_per_unit: Decimal::new(55, 2),
        });
        additives.push(AdditiveCost {
            name: format!("A{i}"),
            amount: Decimal::new(5, 0),
            unit: "g".into(),
            cost_per_unit: Decimal::new(12, 2),
        });
        packaging.push(PackagingCost {
            item_type: "bottle".into(),
            quantity: 240,
            price_per_unit: Decimal::new(38, 2),
        });
    }
    CostInputs {
        apples,
        additives,
        packaging,
        labor_cost: Decimal::new(1_200, 0),
        overhead_cost: Decimal::new(300, 0),
        units_produced: 12_000,
        volume_liters: 9_000.0,
    }
}

fn bench_cogs(c: &mut Criterion) {
    let sheet = build_sheet(1_000);
    c.bench_function("cogs 1000-line sheet", |b| {
        b.iter(|| {
            let _ = black_box(cellar_econ::aggregate_cogs(&sheet));
        })
    });
    c.bench_function("apple cost by variety", |b| {
        b.iter(|| {
            let _ = black_box(cellar_econ::apple_cost_by_variety(&sheet));
        })
    });
}

criterion_group!(benches, bench_cogs);
criterion_main!(benches);
