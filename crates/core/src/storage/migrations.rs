//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial roster schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'UPCOMING',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS captains (
                id TEXT PRIMARY KEY,
                tournament_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                tier INTEGER NOT NULL CHECK (tier BETWEEN 1 AND 5),
                role TEXT NOT NULL,
                credits INTEGER NOT NULL CHECK (credits >= 0),
                FOREIGN KEY (tournament_id) REFERENCES tournaments(id) ON DELETE CASCADE,
                UNIQUE(tournament_id, user_id)
            );

            -- One row per tier a captain has drafted from
            CREATE TABLE IF NOT EXISTS captain_picked_tiers (
                captain_id TEXT NOT NULL,
                tier INTEGER NOT NULL,
                FOREIGN KEY (captain_id) REFERENCES captains(id) ON DELETE CASCADE,
                UNIQUE(captain_id, tier)
            );

            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                tournament_id TEXT NOT NULL,
                name TEXT NOT NULL,
                tier INTEGER NOT NULL CHECK (tier BETWEEN 1 AND 5),
                role TEXT NOT NULL,
                starting_price INTEGER NOT NULL,
                specialities TEXT NOT NULL DEFAULT '[]',
                captain_id TEXT,
                FOREIGN KEY (tournament_id) REFERENCES tournaments(id) ON DELETE CASCADE,
                FOREIGN KEY (captain_id) REFERENCES captains(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_captains_tournament ON captains(tournament_id);
            CREATE INDEX IF NOT EXISTS idx_players_tournament ON players(tournament_id);
            CREATE INDEX IF NOT EXISTS idx_players_captain ON players(captain_id);
        "#,
    },
    Migration {
        version: 2,
        description: "Add auction state and ledgers",
        sql: r#"
            CREATE TABLE IF NOT EXISTS auctions (
                id TEXT PRIMARY KEY,
                tournament_id TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 0,
                is_paused INTEGER NOT NULL DEFAULT 0,
                bid_mode TEXT NOT NULL DEFAULT 'OPEN',
                timer_seconds INTEGER NOT NULL,
                current_timer INTEGER NOT NULL,
                current_player_id TEXT,
                round INTEGER NOT NULL DEFAULT 0,
                started_at TEXT,
                ended_at TEXT,
                FOREIGN KEY (tournament_id) REFERENCES tournaments(id) ON DELETE CASCADE
            );

            -- Provisional bids, append-only
            CREATE TABLE IF NOT EXISTS auction_bids (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL,
                captain_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                round INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (auction_id) REFERENCES auctions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS auction_skip_votes (
                auction_id TEXT NOT NULL,
                captain_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                round INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (auction_id) REFERENCES auctions(id) ON DELETE CASCADE,
                UNIQUE(auction_id, round, captain_id)
            );

            CREATE TABLE IF NOT EXISTS auction_history (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL,
                player_id TEXT NOT NULL,
                player_name TEXT NOT NULL,
                captain_id TEXT NOT NULL,
                captain_name TEXT NOT NULL,
                tier INTEGER NOT NULL,
                final_bid INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (auction_id) REFERENCES auctions(id) ON DELETE CASCADE,
                UNIQUE(auction_id, player_id)
            );
        "#,
    },
    Migration {
        version: 3,
        description: "Add round indexes for ledger hydration",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_auction_bids_round
                ON auction_bids(auction_id, round);
            CREATE INDEX IF NOT EXISTS idx_auction_skip_votes_round
                ON auction_skip_votes(auction_id, round);
            CREATE INDEX IF NOT EXISTS idx_auction_history_auction
                ON auction_history(auction_id, timestamp);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
