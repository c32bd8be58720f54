use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Set, Statement,
};

use crate::domain::Module;
use crate::models::reservation_settings;

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;
    ensure_default_settings(&db).await?;

    Ok(db)
}

async fn execute(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS patrons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            first_name TEXT,
            email TEXT,
            phone TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Four parallel catalogs, one per module
    for (table, extra) in [
        ("books", "isbn"),
        ("games", "publisher"),
        ("films", "director"),
        ("discs", "artist"),
    ] {
        execute(
            db,
            &format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    {extra} TEXT,
                    status TEXT NOT NULL DEFAULT 'available',
                    added_at TEXT NOT NULL,
                    novelty_override TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#
            ),
        )
        .await?;
    }

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS item_genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            genre_id INTEGER NOT NULL,
            UNIQUE (module, item_id, genre_id)
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS reservation_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module TEXT NOT NULL UNIQUE,
            enabled BOOLEAN NOT NULL DEFAULT 1,
            general_cap INTEGER NOT NULL DEFAULT 5,
            novelty_cap INTEGER NOT NULL DEFAULT 1,
            novelty_window_days INTEGER NOT NULL DEFAULT 30,
            novelty_tracking_enabled BOOLEAN NOT NULL DEFAULT 1,
            ready_expiry_days INTEGER NOT NULL DEFAULT 7,
            reminder_days_before INTEGER NOT NULL DEFAULT 2,
            loan_duration_days INTEGER NOT NULL DEFAULT 21,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS genre_limits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module TEXT NOT NULL,
            genre_id INTEGER NOT NULL,
            max_concurrent INTEGER NOT NULL,
            enabled BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (module, genre_id)
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patron_id INTEGER NOT NULL,
            module TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            loan_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            return_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (patron_id) REFERENCES patrons(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patron_id INTEGER NOT NULL,
            module TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'waiting',
            queue_position INTEGER NOT NULL CHECK (queue_position >= 0),
            comment TEXT,
            created_at TEXT NOT NULL,
            notified_at TEXT,
            expires_at TEXT,
            reminded_at TEXT,
            converted_at TEXT,
            loan_id INTEGER,
            updated_at TEXT NOT NULL,
            CHECK (loan_id IS NULL OR status = 'converted'),
            FOREIGN KEY (patron_id) REFERENCES patrons(id),
            FOREIGN KEY (loan_id) REFERENCES loans(id) ON DELETE SET NULL
        )
        "#,
    )
    .await?;

    // At most one active reservation per (patron, item)
    execute(
        db,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_patron_item
        ON reservations (patron_id, module, item_id)
        WHERE status IN ('waiting', 'ready')
        "#,
    )
    .await?;

    // Queue slots are unique per item among active reservations
    execute(
        db,
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_active_position
        ON reservations (module, item_id, queue_position)
        WHERE status IN ('waiting', 'ready')
        "#,
    )
    .await?;

    execute(
        db,
        "CREATE INDEX IF NOT EXISTS idx_reservations_patron \
         ON reservations (patron_id, module, status)",
    )
    .await?;

    execute(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS notification_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_code TEXT NOT NULL,
            reservation_id INTEGER NOT NULL,
            patron_id INTEGER NOT NULL,
            module TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            payload TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Insert the default parameter row of every module that has none yet
async fn ensure_default_settings(db: &DatabaseConnection) -> Result<(), DbErr> {
    for module in Module::ALL {
        let existing = reservation_settings::Entity::find()
            .filter(reservation_settings::Column::Module.eq(module))
            .one(db)
            .await?;

        if existing.is_some() {
            continue;
        }

        reservation_settings::ActiveModel {
            module: Set(module),
            enabled: Set(true),
            general_cap: Set(5),
            novelty_cap: Set(1),
            novelty_window_days: Set(30),
            novelty_tracking_enabled: Set(true),
            ready_expiry_days: Set(7),
            reminder_days_before: Set(2),
            loan_duration_days: Set(21),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
