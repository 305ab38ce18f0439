use gantry_core::{GantryError, GantryResult, Settings};
use gantry_orm::{
    apply_one, connect, MigrationConfig, MigrationDirection, MigrationManager, MigrationRegistry,
    MigrationRunner, MigrationStatus, MigrationStatusEntry, MigrationStore, OperatorError,
};
use std::sync::Arc;

fn manager(settings: &Settings) -> MigrationManager {
    MigrationManager::with_config(MigrationConfig {
        migrations_dir: settings.migrations_dir.clone(),
    })
}

fn load_registry(settings: &Settings) -> GantryResult<MigrationRegistry> {
    manager(settings)
        .load_registry()
        .map_err(|e| GantryError::Migration(e.to_string()))
}

async fn open_store(settings: &Settings) -> GantryResult<Arc<dyn MigrationStore>> {
    connect(settings)
        .await
        .map_err(|e| GantryError::Database(e.to_string()))
}

pub async fn create(settings: &Settings, name: &str) -> GantryResult<()> {
    let filename = manager(settings)
        .create_migration(name)
        .map_err(|e| GantryError::Migration(e.to_string()))?;

    println!(
        "Created migration: {}",
        settings.migrations_dir.join(filename).display()
    );
    Ok(())
}

pub async fn run(settings: &Settings) -> GantryResult<()> {
    let registry = load_registry(settings)?;
    if registry.is_empty() {
        println!("No migrations found in {}", settings.migrations_dir.display());
    }

    let store = open_store(settings).await?;
    let result = MigrationRunner::new(&registry, store.as_ref())
        .run()
        .await
        .map_err(|e| GantryError::Migration(e.to_string()))?;

    println!(
        "Applied {} migration(s), {} already up to date ({} ms)",
        result.applied_count(),
        result.skipped.len(),
        result.execution_time_ms
    );
    for id in &result.applied {
        println!("  {}", id);
    }
    Ok(())
}

/// `migrate up <id>` / `migrate down <id>`
pub async fn manual(
    settings: &Settings,
    id: &str,
    direction: MigrationDirection,
) -> GantryResult<()> {
    let registry = load_registry(settings)?;

    // An unknown id never needs a connection
    if !registry.contains(id) {
        tracing::warn!(migration_id = %id, "Invalid migration id");
        return Ok(());
    }

    let store = open_store(settings).await?;
    apply_manual(&registry, store.as_ref(), id, direction).await
}

/// Unknown ids are an operator typo, not a failure
pub async fn apply_manual(
    registry: &MigrationRegistry,
    store: &dyn MigrationStore,
    id: &str,
    direction: MigrationDirection,
) -> GantryResult<()> {
    match apply_one(registry, store, id, direction).await {
        Ok(()) => {
            println!("Migration {} {}: done", id, direction);
            Ok(())
        }
        Err(OperatorError::UnknownId(id)) => {
            tracing::warn!(migration_id = %id, "Invalid migration id");
            Ok(())
        }
        Err(err) => Err(GantryError::Migration(err.to_string())),
    }
}

pub async fn status(settings: &Settings, json: bool) -> GantryResult<()> {
    let registry = load_registry(settings)?;
    let store = open_store(settings).await?;

    let entries = MigrationRunner::new(&registry, store.as_ref())
        .status()
        .await
        .map_err(|e| GantryError::Database(e.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", render_status(&entries));
    }
    Ok(())
}

fn render_status(entries: &[MigrationStatusEntry]) -> String {
    let mut out = String::from("Migration Status:\n================\n");

    if entries.is_empty() {
        out.push_str("No migrations found\n");
        return out;
    }

    for entry in entries {
        let line = match &entry.status {
            MigrationStatus::Applied { applied_at } => format!(
                "  ✅ {}  {} (applied {})\n",
                entry.id,
                entry.description,
                applied_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            MigrationStatus::Pending => {
                format!("  ⏳ {}  {}\n", entry.id, entry.description)
            }
        };
        out.push_str(&line);
    }

    let pending = entries
        .iter()
        .filter(|entry| entry.status == MigrationStatus::Pending)
        .count();
    out.push_str(&format!("\n{} pending, {} total\n", pending, entries.len()));
    out
}
