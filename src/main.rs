use permit_sdk::ExhaustionPolicy;
use stress_test::{stress_test_random, stress_test_scaling};

fn main() -> std::io::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let passed = rt.block_on(async_main());
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

async fn async_main() -> bool {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            MUTUAL EXCLUSION STRESS TESTS                   ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut passed = true;

    // Test 1: small clusters, first miss ends the run
    let stats = stress_test_random(200, 4, ExhaustionPolicy::SingleShot).await;
    stats.print();
    passed &= stats.passed();

    // Test 2: small clusters, every line consumed
    let stats = stress_test_random(200, 4, ExhaustionPolicy::Exhaustive).await;
    stats.print();
    passed &= stats.passed();

    // Test 3: larger clusters
    let stats = stress_test_random(100, 16, ExhaustionPolicy::Exhaustive).await;
    stats.print();
    passed &= stats.passed();

    // Test 4: scaling
    stress_test_scaling(32, 8).await;

    if passed {
        println!("\n✓ All stress tests completed successfully!");
    } else {
        println!("\n✗ Invariant violations detected");
    }
    passed
}
