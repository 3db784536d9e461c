//! Entities command implementation.

use refsync_engine::EntityType;

/// Runs the entities command.
pub fn run() {
    println!("{:<12} {:<14} {}", "ENTITY", "REMOTE PATH", "TABLE");
    for entity in EntityType::ALL {
        println!(
            "{:<12} {:<14} {}",
            entity.name(),
            entity.remote_path(),
            entity.table_name()
        );
    }
}
