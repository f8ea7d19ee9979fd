//! Shared entity fixtures for integration tests.
//!
//! Every test gets its own in-memory SQLite database.

#![allow(dead_code)]

use spot::{
    Config, Direction, Entity, EntityType, Field, Hooks, Mapper, PoolConfig, Record, Relation,
    RelationSpec, Value,
};

pub struct Author;

impl EntityType for Author {
    fn datasource() -> &'static str {
        "authors"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("name", Field::string().required()),
            ("email", Field::of("email").unique()),
        ]
    }
}

pub struct Post;

impl EntityType for Post {
    fn datasource() -> &'static str {
        "posts"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("title", Field::string().required()),
            ("body", Field::text()),
            ("status", Field::int().default(0).index()),
            ("featured", Field::bool().default(false)),
            ("author_id", Field::int()),
            ("meta", Field::serialized()),
            ("date_created", Field::datetime()),
        ]
    }

    fn relations() -> Vec<(&'static str, RelationSpec)> {
        vec![
            ("author", Relation::has_one::<Author>().with("id", ":entity.author_id")),
            (
                "comments",
                Relation::has_many::<Comment>()
                    .with("post_id", ":entity.id")
                    .order_by("id", Direction::Asc),
            ),
            (
                "tags",
                Relation::has_many_through::<Tag, PostTag>()
                    .with("id", ":throughEntity.tag_id")
                    .through_with("post_id", ":entity.id")
                    .order_by("name", Direction::Asc),
            ),
        ]
    }

    fn hooks() -> Hooks {
        Hooks {
            before_insert: |entity| {
                if entity.get("date_created").is_null() {
                    entity.set("date_created", "2024-01-01 12:00:00");
                }
                true
            },
            ..Hooks::default()
        }
    }
}

pub struct Comment;

impl EntityType for Comment {
    fn datasource() -> &'static str {
        "comments"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("post_id", Field::int().index()),
            ("body", Field::text().required()),
        ]
    }
}

pub struct Tag;

impl EntityType for Tag {
    fn datasource() -> &'static str {
        "tags"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("name", Field::string().required().unique()),
        ]
    }
}

pub struct PostTag;

impl EntityType for PostTag {
    fn datasource() -> &'static str {
        "post_tags"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("post_id", Field::int().index_named("post_tag")),
            ("tag_id", Field::int().index_named("post_tag")),
        ]
    }
}

/// Routes `tracing` output to the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mapper over a fresh in-memory SQLite database.
pub async fn memory_mapper() -> Mapper {
    init_tracing();
    let mut config = Config::new();
    config
        .add_connection("test", "sqlite::memory:", &PoolConfig::default(), true)
        .await
        .expect("sqlite memory connection");
    Mapper::new(config)
}

/// Mapper with every fixture table migrated.
pub async fn migrated_mapper() -> Mapper {
    let mapper = memory_mapper().await;
    mapper.migrate::<Author>().await.expect("migrate authors");
    mapper.migrate::<Post>().await.expect("migrate posts");
    mapper.migrate::<Comment>().await.expect("migrate comments");
    mapper.migrate::<Tag>().await.expect("migrate tags");
    mapper.migrate::<PostTag>().await.expect("migrate post_tags");
    mapper
}

pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Inserts a post and returns it.
pub async fn create_post(mapper: &Mapper, title: &str, status: i64) -> Entity {
    mapper
        .create::<Post>(record(&[("title", Value::from(title)), ("status", Value::Int(status))]))
        .await
        .expect("insert post")
        .expect("post saved")
}
