//! Demonstrates filter-gated lookups against the in-memory store.
//!
//! Run with `cargo run --example gated_lookups`. Set `RUST_LOG=debug` to see
//! filter sizing and scan logs.

use bloomgate::{Accessor, AccessorSettings, FilterParams, GatedStore, MemoryStore, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== bloomgate: gated lookups ===\n");

    let settings = AccessorSettings::new()
        .name("users")
        .use_filter(true)
        .filter_params(FilterParams::new(7, 10_000, 2));
    let users = Accessor::with_client(settings, MemoryStore::new())?;
    users.ping()?;
    println!("Accessor {:?} is {:?}", users.name(), users.state());

    // Writes populate the store, then the filter
    for id in 1000..1005 {
        let user = User { id, name: format!("user-{}", id) };
        users.set_value(&id.to_string(), "user:", &user, Duration::from_secs(600))?;
    }
    println!("Wrote 5 users");

    println!("\nLooking up written users:");
    for id in [1000, 1002, 1004] {
        let user: User = users.get_value(&id.to_string(), "user:")?;
        println!("  user:{} -> {:?}", id, user);
    }

    println!("\nLooking up unknown users (answered by the filter):");
    for id in [9001, 9002, 9003] {
        match users.exists(&id.to_string(), "user:") {
            Ok(found) => println!("  user:{} -> store says {}", id, found),
            Err(e) if e.is_filtered_miss() => println!("  user:{} -> filtered, no store call", id),
            Err(e) => return Err(e),
        }
    }

    // Deletes leave the filter untouched; the store answers instead
    users.delete("1000", "user:")?;
    println!("\nAfter deleting user:1000, exists = {}", users.exists("1000", "user:")?);

    println!("\nKeys in store: {:?}", users.scan_keys("user:*", 2)?);

    if let Some(stats) = users.filter_stats() {
        println!(
            "\nFilter: {} bits, {} hashes, {} inserts, fill {:.4}, est. FP rate {:.6}",
            stats.num_bits,
            stats.num_hashes,
            stats.insertions,
            stats.fill_ratio,
            stats.estimated_false_positive_rate
        );
    }
    let gate = users.gate_stats();
    println!(
        "Gate: {} checks, {} short-circuited ({:.0}%)",
        gate.filter_checks,
        gate.filtered_misses,
        gate.short_circuit_rate() * 100.0
    );

    Ok(())
}
