use sea_orm::Database;
use uuid::Uuid;

use engine::{CreateCategoryCmd, CreateProductCmd, Engine, EngineError, Money, UpdateCategoryCmd};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn category(engine: &Engine, name: &str, parent: Option<Uuid>) -> Uuid {
    let mut cmd = CreateCategoryCmd::new(name);
    if let Some(parent) = parent {
        cmd = cmd.parent_id(parent);
    }
    engine.create_category(cmd).await.unwrap()
}

/// Electronics > Smartphones > Android
async fn three_level_tree(engine: &Engine) -> (Uuid, Uuid, Uuid) {
    let electronics = category(engine, "Electronics", None).await;
    let smartphones = category(engine, "Smartphones", Some(electronics)).await;
    let android = category(engine, "Android", Some(smartphones)).await;
    (electronics, smartphones, android)
}

#[tokio::test]
async fn create_derives_slug_and_enforces_global_uniqueness() {
    let engine = engine_with_db().await;
    let id = category(&engine, "Home & Garden", None).await;

    let created = engine.category(id).await.unwrap();
    assert_eq!(created.slug, "home-garden");
    assert!(created.is_active);
    assert_eq!(created.parent_id, None);
    assert_eq!(engine.category_by_slug("home-garden").await.unwrap().id, id);

    // Name uniqueness is global and case-insensitive, not per parent.
    let err = engine
        .create_category(CreateCategoryCmd::new("home & garden"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::AlreadyExists {
            entity: "category",
            field: "name",
            value: "home & garden".to_string()
        }
    );

    let err = engine
        .create_category(CreateCategoryCmd::new("Gardening").slug("home-garden"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::AlreadyExists { field: "slug", .. }
    ));

    let ghost = Uuid::new_v4();
    let err = engine
        .create_category(CreateCategoryCmd::new("Orphan").parent_id(ghost))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "category", .. }));
}

#[tokio::test]
async fn depth_path_and_ancestry_walk_the_parent_chain() {
    let engine = engine_with_db().await;
    let (electronics, smartphones, android) = three_level_tree(&engine).await;

    assert_eq!(engine.category_depth(electronics).await.unwrap(), 0);
    assert_eq!(engine.category_depth(smartphones).await.unwrap(), 1);
    assert_eq!(engine.category_depth(android).await.unwrap(), 2);

    assert_eq!(
        engine.category_path(android).await.unwrap(),
        "Electronics > Smartphones > Android"
    );
    assert_eq!(engine.category_path(electronics).await.unwrap(), "Electronics");

    let ancestors = engine.find_all_ancestors(android).await.unwrap();
    let ancestor_ids: Vec<Uuid> = ancestors.iter().map(|c| c.id).collect();
    assert_eq!(ancestor_ids, vec![electronics, smartphones], "root-first");

    let descendants = engine.find_all_descendants(electronics).await.unwrap();
    let descendant_ids: Vec<Uuid> = descendants.iter().map(|c| c.id).collect();
    assert_eq!(descendant_ids, vec![smartphones, android]);

    assert!(engine.is_ancestor_of(electronics, android).await.unwrap());
    assert!(engine.is_ancestor_of(smartphones, android).await.unwrap());
    assert!(!engine.is_ancestor_of(android, electronics).await.unwrap());
    assert!(
        !engine.is_ancestor_of(android, android).await.unwrap(),
        "a category is not its own ancestor"
    );
}

#[tokio::test]
async fn move_rejects_cycles_and_reports_both_ids() {
    let engine = engine_with_db().await;
    let (electronics, smartphones, android) = three_level_tree(&engine).await;

    let err = engine
        .move_category(electronics, Some(android))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::CircularReference {
            category_id: electronics,
            new_parent_id: android
        }
    );

    let err = engine
        .move_category(smartphones, Some(smartphones))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::CircularReference {
            category_id: smartphones,
            new_parent_id: smartphones
        }
    );

    let ghost = Uuid::new_v4();
    assert!(matches!(
        engine.move_category(ghost, Some(electronics)).await.unwrap_err(),
        EngineError::NotFound { .. }
    ));
    assert!(matches!(
        engine.move_category(android, Some(ghost)).await.unwrap_err(),
        EngineError::NotFound { .. }
    ));

    // The failed attempts changed nothing.
    assert_eq!(
        engine.category_path(android).await.unwrap(),
        "Electronics > Smartphones > Android"
    );
}

#[tokio::test]
async fn move_reparents_and_none_moves_to_root() {
    let engine = engine_with_db().await;
    let (electronics, smartphones, android) = three_level_tree(&engine).await;

    engine.move_category(android, Some(electronics)).await.unwrap();
    assert_eq!(engine.category_depth(android).await.unwrap(), 1);
    assert_eq!(
        engine.category_path(android).await.unwrap(),
        "Electronics > Android"
    );

    engine.move_category(android, None).await.unwrap();
    assert_eq!(engine.category_depth(android).await.unwrap(), 0);
    assert_eq!(engine.category_path(android).await.unwrap(), "Android");

    // Smartphones is a leaf now.
    assert!(engine.find_all_descendants(smartphones).await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivate_cascades_down_and_is_idempotent() {
    let engine = engine_with_db().await;
    let (electronics, smartphones, android) = three_level_tree(&engine).await;
    let cameras = category(&engine, "Cameras", Some(electronics)).await;

    engine.deactivate_category(smartphones).await.unwrap();
    assert!(engine.category(electronics).await.unwrap().is_active);
    assert!(!engine.category(smartphones).await.unwrap().is_active);
    assert!(!engine.category(android).await.unwrap().is_active);
    assert!(engine.category(cameras).await.unwrap().is_active);

    // Idempotent, including descendants that are already inactive.
    engine.deactivate_category(smartphones).await.unwrap();
    engine.deactivate_category(android).await.unwrap();

    // Reactivation is explicit and does not cascade.
    engine.activate_category(smartphones).await.unwrap();
    assert!(engine.category(smartphones).await.unwrap().is_active);
    assert!(!engine.category(android).await.unwrap().is_active);
}

#[tokio::test]
async fn permanent_delete_requires_no_children_and_no_products() {
    let engine = engine_with_db().await;
    let (electronics, smartphones, android) = three_level_tree(&engine).await;

    let err = engine
        .delete_category_permanently(electronics)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "category_id", .. }));

    let camera = engine
        .create_product(
            CreateProductCmd::new("Pixel 9", "PIX-9", Money::new(899_00)).category_id(android),
        )
        .await
        .unwrap();
    let err = engine.delete_category_permanently(android).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { .. }));

    engine.set_product_category(camera, None).await.unwrap();
    engine.delete_category_permanently(android).await.unwrap();
    assert!(matches!(
        engine.category(android).await.unwrap_err(),
        EngineError::NotFound { .. }
    ));

    engine.delete_category_permanently(smartphones).await.unwrap();
    engine.delete_category_permanently(electronics).await.unwrap();
}

#[tokio::test]
async fn reorder_renumbers_listed_then_omitted_siblings() {
    let engine = engine_with_db().await;
    let parent = category(&engine, "Parent", None).await;
    let a = category(&engine, "Alpha", Some(parent)).await;
    let b = category(&engine, "Beta", Some(parent)).await;
    let c = category(&engine, "Gamma", Some(parent)).await;
    let d = category(&engine, "Delta", Some(parent)).await;

    // Created in order, so sort_order is 0..=3 before the reorder.
    engine.reorder_categories(Some(parent), &[d, b]).await.unwrap();

    let children = engine.list_child_categories(parent).await.unwrap();
    let ids: Vec<Uuid> = children.iter().map(|c| c.id).collect();
    // Listed ids first in list order; omitted siblings keep their prior
    // relative order after them.
    assert_eq!(ids, vec![d, b, a, c]);
    let orders: Vec<i32> = children.iter().map(|c| c.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn reorder_rejects_foreign_and_duplicate_ids() {
    let engine = engine_with_db().await;
    let parent = category(&engine, "Parent", None).await;
    let child = category(&engine, "Child", Some(parent)).await;
    let stranger = category(&engine, "Stranger", None).await;

    let err = engine
        .reorder_categories(Some(parent), &[stranger])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "ordered_ids", .. }));

    let err = engine
        .reorder_categories(Some(parent), &[child, child])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidData { field: "ordered_ids", .. }));

    // Root level reorders work with `None` as the parent.
    engine
        .reorder_categories(None, &[stranger, parent])
        .await
        .unwrap();
    let roots = engine.list_root_categories().await.unwrap();
    let ids: Vec<Uuid> = roots.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![stranger, parent]);
}

#[tokio::test]
async fn update_category_patches_fields_and_keeps_names_unique() {
    let engine = engine_with_db().await;
    let books = category(&engine, "Books", None).await;
    let games = category(&engine, "Games", None).await;

    engine
        .update_category(
            books,
            UpdateCategoryCmd::new()
                .name("Paper Books")
                .description("dead trees"),
        )
        .await
        .unwrap();
    let updated = engine.category(books).await.unwrap();
    assert_eq!(updated.name, "Paper Books");
    assert_eq!(updated.description.as_deref(), Some("dead trees"));
    assert_eq!(updated.slug, "books", "slug is stable once assigned");

    let err = engine
        .update_category(games, UpdateCategoryCmd::new().name("paper books"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists { field: "name", .. }));

    // An empty description clears the stored one.
    engine
        .update_category(books, UpdateCategoryCmd::new().description(""))
        .await
        .unwrap();
    assert_eq!(engine.category(books).await.unwrap().description, None);
}
