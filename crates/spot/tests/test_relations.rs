//! Integration tests for lazily loaded relations.

mod common;

use common::{create_post, memory_mapper, migrated_mapper, record, Author, Comment, PostTag, Tag};
use spot::{
    Direction, EntityType, Field, Mapper, Relation, RelationKind, RelationSpec, SpotError, Value,
};

/// Tree of categories related to itself.
struct Category;

impl EntityType for Category {
    fn datasource() -> &'static str {
        "categories"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::int().primary().serial()),
            ("name", Field::string().required()),
            ("parent_id", Field::int()),
        ]
    }

    fn relations() -> Vec<(&'static str, RelationSpec)> {
        vec![
            ("parent", Relation::has_one_self().with("id", ":entity.parent_id")),
            (
                "children",
                Relation::has_many_self()
                    .with("parent_id", ":entity.id")
                    .order_by("name", Direction::Asc),
            ),
        ]
    }
}

/// Entity with relations that cannot be resolved.
struct Broken;

impl EntityType for Broken {
    fn datasource() -> &'static str {
        "broken"
    }

    fn fields() -> Vec<(&'static str, Field)> {
        vec![("id", Field::int().primary().serial())]
    }

    fn relations() -> Vec<(&'static str, RelationSpec)> {
        vec![
            ("unknown_field", Relation::has_many::<Comment>().with("post_id", ":entity.missing")),
            ("no_through_conditions", Relation::has_many_through::<Tag, PostTag>().with("id", ":throughEntity.tag_id")),
            ("bad_operator", Relation::has_many::<Comment>().with("post_id :between", ":entity.id")),
        ]
    }
}

async fn create_author(mapper: &Mapper, name: &str) -> Value {
    let author = mapper
        .create::<Author>(record(&[("name", Value::from(name))]))
        .await
        .unwrap()
        .unwrap();
    author.primary_key().cloned().unwrap()
}

async fn add_comment(mapper: &Mapper, post_id: &Value, body: &str) {
    mapper
        .create::<Comment>(record(&[("post_id", post_id.clone()), ("body", Value::from(body))]))
        .await
        .unwrap()
        .unwrap();
}

async fn create_tag(mapper: &Mapper, name: &str) -> Value {
    let tag = mapper
        .create::<Tag>(record(&[("name", Value::from(name))]))
        .await
        .unwrap()
        .unwrap();
    tag.primary_key().cloned().unwrap()
}

async fn tag_post(mapper: &Mapper, post_id: &Value, tag_id: &Value) {
    mapper
        .create::<PostTag>(record(&[("post_id", post_id.clone()), ("tag_id", tag_id.clone())]))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_relations_are_lazy() {
    let mapper = migrated_mapper().await;
    let post = create_post(&mapper, "Lazy", 1).await;
    let post = mapper
        .get::<common::Post>(post.primary_key().cloned().unwrap())
        .await
        .unwrap()
        .unwrap();
    mapper.query_log().clear();

    let comments = post.relation("comments").expect("declared relation");
    assert_eq!(comments.kind(), RelationKind::HasMany);
    assert!(!comments.is_loaded());
    assert!(mapper.query_log().is_empty());

    assert!(comments.all().await.unwrap().is_empty());
    assert!(comments.is_loaded());
    assert_eq!(mapper.query_log().len(), 1);

    // loaded results are reused
    comments.all().await.unwrap();
    assert_eq!(mapper.query_log().len(), 1);
}

#[tokio::test]
async fn test_has_one() {
    let mapper = migrated_mapper().await;
    let author_id = create_author(&mapper, "Ada").await;
    let post = mapper
        .create::<common::Post>(record(&[
            ("title", Value::from("Owned")),
            ("author_id", author_id.clone()),
        ]))
        .await
        .unwrap()
        .unwrap();

    let author = post.relation("author").unwrap();
    assert_eq!(author.kind(), RelationKind::HasOne);
    assert_eq!(author.get("name").await.unwrap(), Value::from("Ada"));
    assert_eq!(author.entity().await.unwrap().unwrap().primary_key(), Some(&author_id));
    assert_eq!(author.count().await.unwrap(), 1);

    let query = author.query().await.unwrap();
    assert_eq!(query.limit_value(), Some(1));
}

#[tokio::test]
async fn test_has_one_without_match() {
    let mapper = migrated_mapper().await;
    let post = create_post(&mapper, "Orphan", 1).await;

    let author = post.relation("author").unwrap();
    assert!(author.entity().await.unwrap().is_none());
    assert_eq!(author.get("name").await.unwrap(), Value::Null);
    assert_eq!(author.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_has_many_in_declared_order() {
    let mapper = migrated_mapper().await;
    let post = create_post(&mapper, "Discussed", 1).await;
    let other = create_post(&mapper, "Quiet", 1).await;
    let post_id = post.primary_key().cloned().unwrap();

    add_comment(&mapper, &post_id, "first").await;
    add_comment(&mapper, &other.primary_key().cloned().unwrap(), "elsewhere").await;
    add_comment(&mapper, &post_id, "second").await;

    let comments = post.relation("comments").unwrap();
    mapper.query_log().clear();
    assert_eq!(comments.count().await.unwrap(), 2);
    assert!(mapper.query_log().last().unwrap().sql.starts_with("SELECT COUNT(*)"));
    assert!(!comments.is_loaded());
    let queries = mapper.query_log().len();
    assert_eq!(comments.count().await.unwrap(), 2);
    assert_eq!(mapper.query_log().len(), queries);

    let bodies: Vec<Value> = comments
        .all()
        .await
        .unwrap()
        .iter()
        .map(|c| c.get("body").clone())
        .collect();
    assert_eq!(bodies, vec![Value::from("first"), Value::from("second")]);
    assert_eq!(comments.first().await.unwrap().unwrap().get("body"), &Value::from("first"));
}

#[tokio::test]
async fn test_has_many_through() {
    let mapper = migrated_mapper().await;
    let post = create_post(&mapper, "Tagged", 1).await;
    let untagged = create_post(&mapper, "Untagged", 1).await;
    let post_id = post.primary_key().cloned().unwrap();

    let rust = create_tag(&mapper, "rust").await;
    let orm = create_tag(&mapper, "orm").await;
    create_tag(&mapper, "unused").await;
    tag_post(&mapper, &post_id, &rust).await;
    tag_post(&mapper, &post_id, &orm).await;
    // duplicate join rows collapse to one tag
    tag_post(&mapper, &post_id, &rust).await;

    let tags = post.relation("tags").unwrap();
    assert_eq!(tags.kind(), RelationKind::HasManyThrough);
    let names: Vec<Value> = tags
        .all()
        .await
        .unwrap()
        .iter()
        .map(|t| t.get("name").clone())
        .collect();
    assert_eq!(names, vec![Value::from("orm"), Value::from("rust")]);
    assert_eq!(tags.count().await.unwrap(), 2);

    let none = untagged.relation("tags").unwrap();
    assert!(none.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_self_relations() {
    let mapper = memory_mapper().await;
    mapper.migrate::<Category>().await.unwrap();

    let root = mapper
        .create::<Category>(record(&[("name", Value::from("root"))]))
        .await
        .unwrap()
        .unwrap();
    let root_id = root.primary_key().cloned().unwrap();
    for name in ["zeta", "alpha"] {
        mapper
            .create::<Category>(record(&[("name", Value::from(name)), ("parent_id", root_id.clone())]))
            .await
            .unwrap()
            .unwrap();
    }

    let children = root.relation("children").unwrap();
    let loaded = children.all().await.unwrap();
    let names: Vec<Value> = loaded.iter().map(|c| c.get("name").clone()).collect();
    assert_eq!(names, vec![Value::from("alpha"), Value::from("zeta")]);

    let child = loaded.first().unwrap();
    let parent = child.relation("parent").unwrap();
    assert_eq!(parent.get("name").await.unwrap(), Value::from("root"));
    assert!(root.relation("parent").unwrap().entity().await.unwrap().is_none());
}

#[tokio::test]
async fn test_misconfigured_relations_fail_on_access() {
    let mapper = memory_mapper().await;
    mapper.migrate::<Broken>().await.unwrap();
    let broken = mapper
        .create::<Broken>(record(&[]))
        .await
        .unwrap()
        .expect("entity without required fields saves");

    for name in ["unknown_field", "no_through_conditions", "bad_operator"] {
        let handle = broken.relation(name).unwrap();
        let err = handle.all().await.unwrap_err();
        assert!(matches!(err, SpotError::Configuration(_)), "{name}: {err:?}");
        assert!(!handle.is_loaded());
    }
}

#[tokio::test]
async fn test_relation_snapshot_uses_owner_values_at_load() {
    let mapper = migrated_mapper().await;
    let first = create_author(&mapper, "First").await;
    let second = create_author(&mapper, "Second").await;

    let mut post = mapper
        .create::<common::Post>(record(&[("title", Value::from("Moved")), ("author_id", first)]))
        .await
        .unwrap()
        .unwrap();

    post.set("author_id", second.clone());
    mapper.save(&mut post).await.unwrap();
    let stale = post.relation("author").unwrap();
    assert_eq!(stale.get("name").await.unwrap(), Value::from("First"));

    mapper.load_relations(&mut post);
    let fresh = post.relation("author").unwrap();
    assert_eq!(fresh.get("name").await.unwrap(), Value::from("Second"));
}
