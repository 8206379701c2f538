//! SQLite schema for the packtree project database.
//!
//! The database is a snapshot of one [`Warehouse`](crate::warehouse::Warehouse):
//! - `locations`, `packages` and `quants` hold the physical state
//! - `move_lines` holds in-flight movement lines
//! - `hierarchy_links` and `link_move_lines` hold proposed edits and the
//!   lines that justify them
//! - `store_meta` tracks the schema version and the last save
//!
//! Package parent references are deferred so a snapshot can be written in id
//! order regardless of which package was created first.

/// Migration v1: core tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS locations (
    location_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0)
);

CREATE TABLE IF NOT EXISTS packages (
    package_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    parent_id INTEGER REFERENCES packages(package_id) DEFERRABLE INITIALLY DEFERRED,
    CHECK (parent_id IS NULL OR parent_id <> package_id)
);

CREATE TABLE IF NOT EXISTS quants (
    quant_id INTEGER PRIMARY KEY,
    product TEXT NOT NULL,
    lot TEXT,
    location_id INTEGER NOT NULL REFERENCES locations(location_id),
    package_id INTEGER REFERENCES packages(package_id)
        ON DELETE SET NULL DEFERRABLE INITIALLY DEFERRED,
    quantity REAL NOT NULL,
    reserved_quantity REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS move_lines (
    move_line_id INTEGER PRIMARY KEY,
    move_id INTEGER,
    picking_id INTEGER,
    product TEXT NOT NULL,
    lot TEXT,
    source_location_id INTEGER NOT NULL REFERENCES locations(location_id),
    destination_location_id INTEGER NOT NULL REFERENCES locations(location_id),
    source_package_id INTEGER REFERENCES packages(package_id) DEFERRABLE INITIALLY DEFERRED,
    destination_package_id INTEGER REFERENCES packages(package_id) DEFERRABLE INITIALLY DEFERRED,
    result_parent_package_id INTEGER REFERENCES packages(package_id) DEFERRABLE INITIALLY DEFERRED,
    quantity REAL NOT NULL,
    quantity_done REAL NOT NULL DEFAULT 0,
    selected INTEGER NOT NULL DEFAULT 0 CHECK (selected IN (0, 1))
);

CREATE TABLE IF NOT EXISTS hierarchy_links (
    link_id INTEGER PRIMARY KEY,
    parent_id INTEGER REFERENCES packages(package_id)
        ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
    child_id INTEGER NOT NULL REFERENCES packages(package_id)
        ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS link_move_lines (
    link_id INTEGER NOT NULL REFERENCES hierarchy_links(link_id) ON DELETE CASCADE,
    move_line_id INTEGER NOT NULL REFERENCES move_lines(move_line_id) ON DELETE CASCADE,
    PRIMARY KEY (link_id, move_line_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_saved_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);

CREATE INDEX IF NOT EXISTS idx_packages_parent ON packages(parent_id);
CREATE INDEX IF NOT EXISTS idx_quants_package ON quants(package_id);
CREATE INDEX IF NOT EXISTS idx_links_child ON hierarchy_links(child_id);
";

/// Migration v2: completion flag on movement lines and lookup indexes for
/// move and picking grouping.
pub const MIGRATION_V2_SQL: &str = r"
ALTER TABLE move_lines ADD COLUMN done INTEGER NOT NULL DEFAULT 0 CHECK (done IN (0, 1));

CREATE INDEX IF NOT EXISTS idx_move_lines_move ON move_lines(move_id);
CREATE INDEX IF NOT EXISTS idx_move_lines_picking ON move_lines(picking_id);
";

/// Indexes the latest schema must contain.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_packages_parent",
    "idx_quants_package",
    "idx_links_child",
    "idx_move_lines_move",
    "idx_move_lines_picking",
];
