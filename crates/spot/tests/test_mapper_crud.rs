//! Integration tests for mapper CRUD against SQLite.

mod common;

use chrono::NaiveDate;
use common::{create_post, memory_mapper, migrated_mapper, record, Author, Post};
use spot::{Conditions, Identifier, SpotError, Value};

#[tokio::test]
async fn test_insert_assigns_primary_key() {
    let mapper = migrated_mapper().await;

    let mut post = mapper.get::<Post>(Identifier::New).await.unwrap().unwrap();
    assert!(post.is_new());
    post.set("title", "First").set("status", 2);

    let key = mapper.insert(&mut post).await.unwrap();
    assert_eq!(key, Some(Value::Int(1)));
    assert_eq!(post.primary_key(), Some(&Value::Int(1)));
    assert!(!post.is_new());
    assert!(!post.is_dirty());

    let second = create_post(&mapper, "Second", 0).await;
    assert_eq!(second.primary_key(), Some(&Value::Int(2)));
}

#[tokio::test]
async fn test_get_by_key_round_trips_field_types() {
    let mapper = migrated_mapper().await;
    let mut post = mapper
        .get::<Post>(record(&[
            ("title", Value::from("Typed")),
            ("featured", Value::Bool(true)),
            ("meta", Value::from(serde_json::json!({"views": 3}))),
        ]))
        .await
        .unwrap()
        .unwrap();
    assert!(mapper.save(&mut post).await.unwrap());

    let loaded = mapper.get::<Post>(1).await.unwrap().expect("stored post");
    assert_eq!(loaded.get("title"), &Value::from("Typed"));
    assert_eq!(loaded.get("body"), &Value::Null);
    assert_eq!(loaded.get("status"), &Value::Int(0));
    assert_eq!(loaded.get("featured"), &Value::Bool(true));
    assert_eq!(loaded.get("meta"), &Value::from(serde_json::json!({"views": 3})));
    let created = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap();
    assert_eq!(loaded.get("date_created"), &Value::DateTime(created));
}

#[tokio::test]
async fn test_round_trip_stores_defaults_for_unset_fields() {
    let mapper = migrated_mapper().await;
    mapper.query_log().clear();
    let post = mapper
        .create::<Post>(record(&[("title", Value::from("Defaults"))]))
        .await
        .unwrap()
        .unwrap();

    let insert = mapper.query_log().entries().remove(0);
    assert_eq!(insert.binds.get("status"), Some(&Value::Int(0)));
    assert_eq!(insert.binds.get("featured"), Some(&Value::Int(0)));

    let loaded = mapper
        .get::<Post>(post.primary_key().cloned().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.get("title"), &Value::from("Defaults"));
    assert_eq!(loaded.get("status"), &Value::Int(0));
    assert_eq!(loaded.get("featured"), &Value::Bool(false));
    assert_eq!(loaded.get("meta"), &Value::Null);
}

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let mapper = migrated_mapper().await;
    assert!(mapper.get::<Post>(99).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_fails_validation_for_blank_required_field() {
    let mapper = migrated_mapper().await;
    let mut post = mapper.get::<Post>(Identifier::New).await.unwrap().unwrap();
    post.set("title", "   ");

    assert!(!mapper.save(&mut post).await.unwrap());
    assert_eq!(
        post.field_errors("title"),
        ["Required field 'title' was left blank".to_string()]
    );
    assert!(post.is_new());

    let count = mapper.count(&mapper.all::<Post>().unwrap()).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_zero_and_false_count_as_present() {
    let mapper = migrated_mapper().await;
    let mut author = mapper.get::<Author>(Identifier::New).await.unwrap().unwrap();
    author.set("name", 0);
    assert!(mapper.validate(&mut author));
    assert!(!author.has_errors());
}

#[tokio::test]
async fn test_update_writes_only_modified_fields() {
    let mapper = migrated_mapper().await;
    let mut post = create_post(&mapper, "Original", 1).await;
    mapper.query_log().clear();

    post.set("status", 5);
    assert!(mapper.save(&mut post).await.unwrap());

    let logged = mapper.query_log().last().unwrap();
    assert_eq!(
        logged.sql,
        "UPDATE \"posts\" SET \"status\" = :status WHERE ( \"id\" = :id )"
    );
    assert_eq!(logged.binds.get("status"), Some(&Value::Int(5)));

    let loaded = mapper.get::<Post>(1).await.unwrap().unwrap();
    assert_eq!(loaded.get("status"), &Value::Int(5));
    assert_eq!(loaded.get("title"), &Value::from("Original"));
}

#[tokio::test]
async fn test_same_value_assignment_is_written() {
    let mapper = migrated_mapper().await;
    let mut post = create_post(&mapper, "Same", 1).await;
    mapper.query_log().clear();

    post.set("title", "Same");
    assert!(post.is_dirty());
    assert!(post.is_modified("title"));
    assert_eq!(post.data_modified().len(), 1);

    assert!(mapper.save(&mut post).await.unwrap());
    let logged = mapper.query_log().entries();
    assert_eq!(logged.len(), 1);
    assert_eq!(
        logged[0].sql,
        "UPDATE \"posts\" SET \"title\" = :title WHERE ( \"id\" = :id )"
    );
    assert!(!post.is_dirty());
}

#[tokio::test]
async fn test_save_without_modified_fields_sends_nothing() {
    let mapper = migrated_mapper().await;
    let mut post = create_post(&mapper, "Unchanged", 1).await;
    assert!(!post.is_dirty());
    mapper.query_log().clear();

    assert!(mapper.save(&mut post).await.unwrap());
    assert!(mapper.update(&mut post).await.unwrap());
    assert!(mapper.query_log().is_empty());
}

#[tokio::test]
async fn test_save_updates_new_entity_with_primary_key() {
    let mapper = migrated_mapper().await;
    create_post(&mapper, "Original", 1).await;
    mapper.query_log().clear();

    let mut post = mapper
        .get::<Post>(record(&[("id", Value::Int(1)), ("title", Value::from("Replaced"))]))
        .await
        .unwrap()
        .unwrap();
    assert!(post.is_new());

    assert!(mapper.save(&mut post).await.unwrap());
    assert!(!post.is_new());
    let logged = mapper.query_log().entries();
    assert_eq!(logged.len(), 1);
    assert!(logged[0].sql.starts_with("UPDATE \"posts\""));

    assert_eq!(mapper.count(&mapper.all::<Post>().unwrap()).await.unwrap(), 1);
    let loaded = mapper.get::<Post>(1).await.unwrap().unwrap();
    assert_eq!(loaded.get("title"), &Value::from("Replaced"));
    assert_eq!(loaded.get("status"), &Value::Int(1));
}

#[tokio::test]
async fn test_unknown_keys_are_not_written() {
    let mapper = migrated_mapper().await;
    let post = mapper
        .create::<Post>(record(&[
            ("title", Value::from("Over-posted")),
            ("is_admin", Value::Bool(true)),
        ]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.get("is_admin"), &Value::Bool(true));

    let logged = mapper
        .query_log()
        .entries()
        .into_iter()
        .find(|q| q.sql.starts_with("INSERT"))
        .unwrap();
    assert!(!logged.sql.contains("is_admin"));
}

#[tokio::test]
async fn test_delete_entity_and_conditions() {
    let mapper = migrated_mapper().await;
    let mut first = create_post(&mapper, "One", 1).await;
    create_post(&mapper, "Two", 2).await;
    create_post(&mapper, "Three", 2).await;

    assert!(mapper.delete(&mut first).await.unwrap());
    assert!(mapper.get::<Post>(1).await.unwrap().is_none());
    assert!(!mapper.delete(&mut first).await.unwrap());

    let deleted = mapper
        .delete_where::<Post>(Conditions::new().eq("status", 2).unwrap())
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(mapper.count(&mapper.all::<Post>().unwrap()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_first_and_select() {
    let mapper = migrated_mapper().await;
    create_post(&mapper, "Alpha", 1).await;
    create_post(&mapper, "Beta", 2).await;

    let beta = mapper
        .first::<Post>(Conditions::new().eq("status", 2).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(beta.get("title"), &Value::from("Beta"));

    let titles = mapper
        .execute(&mapper.select::<Post>(&["id", "title"]).unwrap())
        .await
        .unwrap();
    assert_eq!(titles.len(), 2);
    let row = &titles.to_records()[0];
    assert_eq!(row.get("title"), Some(&Value::from("Alpha")));
    // unselected fields read as defaults
    assert_eq!(row.get("status"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn test_raw_query_wraps_entities() {
    let mapper = migrated_mapper().await;
    create_post(&mapper, "Raw", 3).await;

    let posts = mapper
        .query::<Post>(
            "SELECT * FROM posts WHERE status = :status",
            &record(&[("status", Value::Int(3))]),
        )
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts.first().unwrap().get("title"), &Value::from("Raw"));
}

#[tokio::test]
async fn test_truncate_and_drop_datasource() {
    let mapper = migrated_mapper().await;
    create_post(&mapper, "Gone", 1).await;

    mapper.truncate_datasource::<Post>().await.unwrap();
    assert_eq!(mapper.count(&mapper.all::<Post>().unwrap()).await.unwrap(), 0);

    mapper.drop_datasource::<Post>().await.unwrap();
    let err = mapper.get::<Post>(1).await.unwrap_err();
    assert!(err.is_datasource_missing());
}

#[tokio::test]
async fn test_missing_datasource_is_distinct_error() {
    let mapper = memory_mapper().await;
    let err = mapper.execute(&mapper.all::<Post>().unwrap()).await.unwrap_err();
    match err {
        SpotError::DatasourceMissing { datasource, .. } => assert_eq!(datasource, "posts"),
        other => panic!("expected a missing datasource, got {other:?}"),
    }
}

#[tokio::test]
async fn test_every_statement_is_logged() {
    let mapper = migrated_mapper().await;
    mapper.query_log().clear();
    create_post(&mapper, "Logged", 1).await;
    mapper.get::<Post>(1).await.unwrap();

    let entries = mapper.query_log().entries();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].sql.starts_with("INSERT INTO \"posts\""));
    assert_eq!(entries[0].adapter, "test");
    assert_eq!(entries[1].binds.get("id"), Some(&Value::Int(1)));
}
