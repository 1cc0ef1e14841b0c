use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Category, CreateCategoryCmd, EngineError, ResultEngine, UpdateCategoryCmd, categories,
    products, util,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

fn circular(category_id: Uuid, new_parent_id: Uuid) -> EngineError {
    EngineError::CircularReference {
        category_id,
        new_parent_id,
    }
}

impl Engine {
    /// Creates a category and returns its id.
    ///
    /// The slug is derived from the name when not supplied. Name and slug are
    /// unique across the whole tree, not per parent. When `sort_order` is
    /// omitted the category is appended after its current siblings.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidData`] if the name is blank or no slug can be
    ///   derived
    /// - [`EngineError::NotFound`] if the requested parent does not exist
    /// - [`EngineError::AlreadyExists`] if the name or slug is taken
    pub async fn create_category(&self, cmd: CreateCategoryCmd) -> ResultEngine<Uuid> {
        let name = normalize_required_name(&cmd.name, "name")?;
        let slug_source = cmd.slug.as_deref().unwrap_or(&name);
        let slug = util::slugify(slug_source).ok_or_else(|| EngineError::InvalidData {
            field: "slug",
            reason: format!("cannot derive a slug from '{slug_source}'"),
        })?;
        let description = normalize_optional_text(cmd.description.as_deref());

        with_tx!(self, |db_tx| {
            if let Some(parent_id) = cmd.parent_id {
                self.require_category(&db_tx, parent_id).await?;
            }

            let name_taken = categories::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if name_taken {
                return Err(EngineError::AlreadyExists {
                    entity: "category",
                    field: "name",
                    value: name,
                });
            }

            let slug_taken = categories::Entity::find()
                .filter(categories::Column::Slug.eq(slug.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if slug_taken {
                return Err(EngineError::AlreadyExists {
                    entity: "category",
                    field: "slug",
                    value: slug,
                });
            }

            let sort_order = match cmd.sort_order {
                Some(sort_order) => sort_order,
                None => self
                    .child_categories(&db_tx, cmd.parent_id)
                    .await?
                    .iter()
                    .map(|sibling| sibling.sort_order + 1)
                    .max()
                    .unwrap_or(0),
            };

            let category = Category::new(name, slug, description, cmd.parent_id, sort_order);
            let category_id = category.id;
            categories::ActiveModel::from(&category).insert(&db_tx).await?;
            Ok(category_id)
        })
    }

    /// Fetches a category by id.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn category(&self, category_id: Uuid) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, category_id).await?;
            Category::try_from(model)
        })
    }

    /// Fetches a category by slug.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no category uses this slug.
    pub async fn category_by_slug(&self, slug: &str) -> ResultEngine<Category> {
        let slug = slug.trim().to_string();
        with_tx!(self, |db_tx| {
            let model = categories::Entity::find()
                .filter(categories::Column::Slug.eq(slug.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "category",
                    id: slug.clone(),
                })?;
            Category::try_from(model)
        })
    }

    /// Lists root categories ordered by `(sort_order, name)`.
    pub async fn list_root_categories(&self) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            self.child_categories(&db_tx, None)
                .await?
                .into_iter()
                .map(Category::try_from)
                .collect()
        })
    }

    /// Lists direct children of a category ordered by `(sort_order, name)`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the parent does not exist.
    pub async fn list_child_categories(&self, parent_id: Uuid) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, parent_id).await?;
            self.child_categories(&db_tx, Some(parent_id))
                .await?
                .into_iter()
                .map(Category::try_from)
                .collect()
        })
    }

    /// Updates a category's own fields. Parent changes go through
    /// [`Engine::move_category`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such category exists
    /// - [`EngineError::AlreadyExists`] if the new name is taken by another
    ///   category
    pub async fn update_category(
        &self,
        category_id: Uuid,
        cmd: UpdateCategoryCmd,
    ) -> ResultEngine<()> {
        let name = cmd
            .name
            .as_deref()
            .map(|raw| normalize_required_name(raw, "name"))
            .transpose()?;

        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;

            if let Some(name) = &name {
                let taken = categories::Entity::find()
                    .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                    .filter(categories::Column::Id.ne(category_id.to_string()))
                    .one(&db_tx)
                    .await?
                    .is_some();
                if taken {
                    return Err(EngineError::AlreadyExists {
                        entity: "category",
                        field: "name",
                        value: name.clone(),
                    });
                }
            }

            let mut active = categories::ActiveModel {
                id: ActiveValue::Set(category_id.to_string()),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(description) = cmd.description.as_deref() {
                // An empty description clears the stored one.
                active.description = ActiveValue::Set(normalize_optional_text(Some(description)));
            }
            if let Some(sort_order) = cmd.sort_order {
                active.sort_order = ActiveValue::Set(sort_order);
            }
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Re-parents a category. `None` moves it to the root level.
    ///
    /// The category keeps its `sort_order` among the new siblings; call
    /// [`Engine::reorder_categories`] afterwards to renumber them.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if either category does not exist
    /// - [`EngineError::CircularReference`] if the new parent is the category
    ///   itself or one of its descendants
    pub async fn move_category(
        &self,
        category_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;

            if let Some(parent_id) = new_parent_id {
                if parent_id == category_id {
                    return Err(circular(category_id, parent_id));
                }
                let parent = self.require_category(&db_tx, parent_id).await?;
                let chain = self.parent_chain(&db_tx, &parent).await?;
                let target = category_id.to_string();
                if chain.iter().any(|ancestor| ancestor.id == target) {
                    return Err(circular(category_id, parent_id));
                }
            }

            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id.to_string()),
                parent_id: ActiveValue::Set(new_parent_id.map(|id| id.to_string())),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Deactivates a category and all of its descendants. Idempotent.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn deactivate_category(&self, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;

            let mut ids: Vec<String> = vec![category_id.to_string()];
            ids.extend(
                self.descendant_models(&db_tx, category_id)
                    .await?
                    .into_iter()
                    .map(|model| model.id),
            );

            let now = Utc::now();
            for id in ids {
                let active = categories::ActiveModel {
                    id: ActiveValue::Set(id),
                    is_active: ActiveValue::Set(false),
                    updated_at: ActiveValue::Set(now),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            Ok(())
        })
    }

    /// Reactivates a single category. Does **not** cascade: descendants stay
    /// inactive until reactivated one by one.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn activate_category(&self, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;
            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id.to_string()),
                is_active: ActiveValue::Set(true),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Hard-deletes a category.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if no such category exists
    /// - [`EngineError::InvalidData`] if the category still has child
    ///   categories or linked products; reparent or remove those first
    pub async fn delete_category_permanently(&self, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;

            let has_children = categories::Entity::find()
                .filter(categories::Column::ParentId.eq(category_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            if has_children {
                return Err(EngineError::InvalidData {
                    field: "category_id",
                    reason: format!("category '{category_id}' still has child categories"),
                });
            }

            let has_products = products::Entity::find()
                .filter(products::Column::CategoryId.eq(category_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            if has_products {
                return Err(EngineError::InvalidData {
                    field: "category_id",
                    reason: format!("category '{category_id}' still has linked products"),
                });
            }

            categories::Entity::delete_by_id(category_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Number of ancestor hops to the root. Root categories have depth 0.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn category_depth(&self, category_id: Uuid) -> ResultEngine<u32> {
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, category_id).await?;
            let chain = self.parent_chain(&db_tx, &model).await?;
            Ok(chain.len() as u32)
        })
    }

    /// Human-readable path from the root to the category, segments joined by
    /// `" > "`, e.g. `"Electronics > Smartphones > Android"`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn category_path(&self, category_id: Uuid) -> ResultEngine<String> {
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, category_id).await?;
            let chain = self.parent_chain(&db_tx, &model).await?;
            let mut segments: Vec<String> =
                chain.into_iter().rev().map(|model| model.name).collect();
            segments.push(model.name);
            Ok(segments.join(" > "))
        })
    }

    /// All categories below the given one, discovered breadth-first. Children
    /// on the same level come in `(sort_order, name)` order.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn find_all_descendants(&self, category_id: Uuid) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, category_id).await?;
            self.descendant_models(&db_tx, category_id)
                .await?
                .into_iter()
                .map(Category::try_from)
                .collect()
        })
    }

    /// All categories above the given one, ordered root-first.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if no such category exists.
    pub async fn find_all_ancestors(&self, category_id: Uuid) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let model = self.require_category(&db_tx, category_id).await?;
            self.parent_chain(&db_tx, &model)
                .await?
                .into_iter()
                .rev()
                .map(Category::try_from)
                .collect()
        })
    }

    /// `true` iff walking up from `descendant_id` reaches `ancestor_id`
    /// before the root. A category is not its own ancestor.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if either category does not exist.
    pub async fn is_ancestor_of(
        &self,
        ancestor_id: Uuid,
        descendant_id: Uuid,
    ) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, ancestor_id).await?;
            let descendant = self.require_category(&db_tx, descendant_id).await?;
            let chain = self.parent_chain(&db_tx, &descendant).await?;
            let target = ancestor_id.to_string();
            Ok(chain.iter().any(|ancestor| ancestor.id == target))
        })
    }

    /// Renumbers the children of `parent_id` (`None` for the root level).
    ///
    /// Listed categories get `sort_order` 0..n in list order. Siblings left
    /// out of the list keep their relative order and are renumbered after the
    /// listed set.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the parent does not exist
    /// - [`EngineError::InvalidData`] if the list repeats an id or names a
    ///   category that is not a child of `parent_id`
    pub async fn reorder_categories(
        &self,
        parent_id: Option<Uuid>,
        ordered_ids: &[Uuid],
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            if let Some(parent_id) = parent_id {
                self.require_category(&db_tx, parent_id).await?;
            }

            let siblings = self.child_categories(&db_tx, parent_id).await?;
            let sibling_ids: HashSet<&str> =
                siblings.iter().map(|model| model.id.as_str()).collect();

            let mut listed: HashSet<String> = HashSet::with_capacity(ordered_ids.len());
            for id in ordered_ids {
                let id_str = id.to_string();
                if !sibling_ids.contains(id_str.as_str()) {
                    return Err(EngineError::InvalidData {
                        field: "ordered_ids",
                        reason: format!("category '{id}' is not a child of the given parent"),
                    });
                }
                if !listed.insert(id_str) {
                    return Err(EngineError::InvalidData {
                        field: "ordered_ids",
                        reason: format!("category '{id}' is listed more than once"),
                    });
                }
            }

            let mut assignments: Vec<(String, i32)> = ordered_ids
                .iter()
                .enumerate()
                .map(|(index, id)| (id.to_string(), index as i32))
                .collect();
            let mut next = ordered_ids.len() as i32;
            for sibling in &siblings {
                if !listed.contains(&sibling.id) {
                    assignments.push((sibling.id.clone(), next));
                    next += 1;
                }
            }

            let now = Utc::now();
            for (id, sort_order) in assignments {
                let active = categories::ActiveModel {
                    id: ActiveValue::Set(id),
                    sort_order: ActiveValue::Set(sort_order),
                    updated_at: ActiveValue::Set(now),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            Ok(())
        })
    }

    /// Models on the parent chain of `model`, nearest ancestor first.
    ///
    /// Iterative, so arbitrarily deep trees cannot overflow the stack. A
    /// repeated id means the stored chain loops; that is reported instead of
    /// walking forever.
    async fn parent_chain(
        &self,
        db: &DatabaseTransaction,
        model: &categories::Model,
    ) -> ResultEngine<Vec<categories::Model>> {
        let mut chain = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([model.id.clone()]);
        let mut next = model.parent_id.clone();
        while let Some(parent_id) = next {
            if !seen.insert(parent_id.clone()) {
                return Err(EngineError::ProcessingFailure {
                    operation: "category walk",
                    reason: format!("parent chain loops at category '{parent_id}'"),
                });
            }
            let parent = categories::Entity::find_by_id(parent_id.clone())
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "category",
                    id: parent_id,
                })?;
            next = parent.parent_id.clone();
            chain.push(parent);
        }
        Ok(chain)
    }

    /// Models of the whole subtree below `root_id`, breadth-first.
    async fn descendant_models(
        &self,
        db: &DatabaseTransaction,
        root_id: Uuid,
    ) -> ResultEngine<Vec<categories::Model>> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([root_id.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([root_id.to_string()]);
        while let Some(parent_id) = queue.pop_front() {
            let children = categories::Entity::find()
                .filter(categories::Column::ParentId.eq(parent_id))
                .order_by_asc(categories::Column::SortOrder)
                .order_by_asc(categories::Column::Name)
                .all(db)
                .await?;
            for child in children {
                if !seen.insert(child.id.clone()) {
                    return Err(EngineError::ProcessingFailure {
                        operation: "category walk",
                        reason: format!("category '{}' appears twice in the tree", child.id),
                    });
                }
                queue.push_back(child.id.clone());
                out.push(child);
            }
        }
        Ok(out)
    }
}
