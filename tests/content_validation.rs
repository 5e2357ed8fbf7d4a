use std::path::PathBuf;

use care_navigator::catalog::Catalog;
use care_navigator::engine::CARE_MODULE_ID;
use care_navigator::scoring::Tier;

fn content_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("content")
}

#[test]
fn shipped_content_passes_validation() {
    let catalog = Catalog::load(content_dir()).expect("shipped content must validate");
    let snapshot = catalog.snapshot();

    let module = snapshot.module(CARE_MODULE_ID).expect("care module present");
    assert!(!module.questions.is_empty());
    assert!(!module.behavior_gates.is_empty());

    // threshold bands cover every tier
    for tier in Tier::ALL {
        assert!(
            module.thresholds.contains_key(&tier),
            "missing threshold band for {tier}"
        );
    }

    // every flag the module can emit carries registry display metadata
    for name in &module.flags_emitted {
        assert!(
            care_navigator::flags::lookup(name).is_some(),
            "flag {name} missing from registry"
        );
    }

    // base costs for every tier, positive hourly rate
    for tier in Tier::ALL {
        assert!(snapshot.cost.tier_monthly_base.contains_key(&tier));
    }
    assert!(snapshot.cost.in_home_hourly_rate > 0.0);

    // VA table covers the full rating ladder both ways
    for rating in (0..=100).step_by(10) {
        assert!(
            snapshot.va_rates.monthly_amount(rating, true).is_some(),
            "missing VA rate for {rating}%"
        );
        assert!(snapshot.va_rates.monthly_amount(rating, false).is_some());
    }
    assert_eq!(snapshot.va_rates.monthly_amount(70, true), Some(1908.95));

    assert!(!snapshot.addons.is_empty());
    assert_eq!(snapshot.regional.national.multiplier, 1.0);
}

#[test]
fn reload_is_idempotent() {
    let catalog = Catalog::load(content_dir()).unwrap();
    let before = catalog.snapshot();
    catalog.reload().unwrap();
    let after = catalog.snapshot();
    assert_eq!(
        before.module(CARE_MODULE_ID).unwrap().questions.len(),
        after.module(CARE_MODULE_ID).unwrap().questions.len()
    );
}
