use chrono::{Duration, Utc};
use sea_orm::*;

use crate::domain::{ItemStatus, Module, NoveltyOverride};
use crate::models::{book, disc, film, game, genre_limit, item_genre, patron};

const GENRE_NOVEL: i32 = 1;
const GENRE_STRATEGY: i32 = 10;
const GENRE_DOCUMENTARY: i32 = 20;
const GENRE_JAZZ: i32 = 30;

async fn tag(
    db: &DatabaseConnection,
    module: Module,
    item_id: i32,
    genre_id: i32,
) -> Result<(), DbErr> {
    item_genre::ActiveModel {
        module: Set(module),
        item_id: Set(item_id),
        genre_id: Set(genre_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    if patron::Entity::find().count(db).await? > 0 {
        tracing::info!("Demo data already present, skipping");
        return Ok(());
    }

    let now = Utc::now();

    // 1. Patrons (the last one has a lapsed membership)
    for (name, email, is_active) in [
        ("Durand", "durand@example.org", true),
        ("Martin", "martin@example.org", true),
        ("Lefebvre", "lefebvre@example.org", false),
    ] {
        patron::ActiveModel {
            name: Set(name.to_owned()),
            email: Set(Some(email.to_owned())),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    // 2. One catalog entry per module, plus a fresh novelty book
    let classic = book::ActiveModel {
        title: Set("Les Misérables".to_owned()),
        isbn: Set(Some("9782253096344".to_owned())),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(900)),
        novelty_override: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tag(db, Module::Books, classic.id, GENRE_NOVEL).await?;

    let novelty = book::ActiveModel {
        title: Set("Le Grand Monde".to_owned()),
        isbn: Set(Some("9782702180815".to_owned())),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(3)),
        novelty_override: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tag(db, Module::Books, novelty.id, GENRE_NOVEL).await?;

    let game = game::ActiveModel {
        title: Set("Terraforming Mars".to_owned()),
        publisher: Set(Some("Intrafin".to_owned())),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(400)),
        novelty_override: Set(Some(NoveltyOverride::ForceNew)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tag(db, Module::Games, game.id, GENRE_STRATEGY).await?;

    let film = film::ActiveModel {
        title: Set("Microcosmos".to_owned()),
        director: Set(Some("Claude Nuridsany".to_owned())),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(60)),
        novelty_override: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tag(db, Module::Films, film.id, GENRE_DOCUMENTARY).await?;

    let disc = disc::ActiveModel {
        title: Set("Kind of Blue".to_owned()),
        artist: Set(Some("Miles Davis".to_owned())),
        status: Set(ItemStatus::Available),
        added_at: Set(now - Duration::days(10)),
        novelty_override: Set(Some(NoveltyOverride::ForceNotNew)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    tag(db, Module::Discs, disc.id, GENRE_JAZZ).await?;

    // 3. Strategy games are popular, one at a time
    genre_limit::ActiveModel {
        module: Set(Module::Games),
        genre_id: Set(GENRE_STRATEGY),
        max_concurrent: Set(1),
        enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(())
}
