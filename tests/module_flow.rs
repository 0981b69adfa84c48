mod common;

use architect_crud::builder::{ActionBuilder, ColumnBuilder, FieldBuilder, FormSchemaBuilder, TableSchemaBuilder};
use architect_crud::error::AppError;
use architect_crud::module::{ActionOutcome, FilterPayload, Module, MutationOutcome, SkipReason};
use architect_crud::module_state::{ModuleState, SEARCH};
use architect_crud::schema::{ActionScope, FormSchema, FormType, OptionSource, SelectOption, SortDirection};
use architect_crud::service::{AuditLogger, Capabilities, PermissionMode, PgAuditLogger, Principal, Row};
use common::{articles, AuditEvent, Harness};
use futures::StreamExt;
use rstest::rstest;
use serde_json::{json, Map, Value};

fn table() -> TableSchemaBuilder {
    let mut t = TableSchemaBuilder::new("articles");
    t.column(ColumnBuilder::new("id").sortable(true))
        .column(ColumnBuilder::new("title").sortable(true))
        .column(ColumnBuilder::new("email").searchable(true))
        .filter(
            "status",
            "Status",
            OptionSource::Static(vec![SelectOption::new("pending", "Pending")]),
        )
        .filter_link("Drafts", "status = 'draft'")
        .filter_link("Live", "status = 'live'")
        .date_column("created_at")
        .action(ActionBuilder::new("delete", ActionScope::Bulk))
        .per_page(10, [2, 10]);
    t
}

fn form() -> FormSchema {
    let mut f = FormSchemaBuilder::new();
    f.field(FieldBuilder::new("title").rules(["required", "min_length:4"]))
        .field(
            FieldBuilder::new("status")
                .options(vec![SelectOption::new("draft", "Draft"), SelectOption::new("live", "Live")])
                .default_value(json!("draft")),
        )
        .field(FieldBuilder::new("author").expression("authors.name").readonly(true));
    f.build().unwrap()
}

fn module() -> Module {
    Module::new("articles", table().build().unwrap(), form())
}

fn payload(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn search_term_becomes_like_over_searchable_columns() {
    let h = Harness::new(articles(3));
    let mut state = ModuleState::new();
    state.set_filter(SEARCH, "alice");
    module().list(&h.admin(), &state).await.unwrap();

    let (sql, params) = h.executor.last_matching("SELECT id AS id").unwrap();
    assert!(sql.contains("(email LIKE ?)"), "{}", sql);
    assert_eq!(params, [json!("%alice%")]);
    let (count_sql, count_params) = h.executor.last_matching("SELECT COUNT(*)").unwrap();
    assert!(count_sql.contains("(email LIKE ?)"));
    assert_eq!(count_params, params);
}

#[tokio::test]
async fn dropdown_filter_binds_its_column() {
    let h = Harness::new(articles(3));
    let m = module();
    let mut state = ModuleState::new();
    let mut submitted = FilterPayload::new();
    submitted.insert("dropdowns_0".into(), "pending".into());
    m.filter_set(&h.admin(), &mut state, &submitted).unwrap().unwrap();
    m.list(&h.admin(), &state).await.unwrap();

    let (sql, params) = h.executor.last_matching("SELECT id AS id").unwrap();
    assert!(sql.contains("status = ?"), "{}", sql);
    assert_eq!(params, [json!("pending")]);
}

#[tokio::test]
async fn csv_export_has_label_header_and_one_line_per_row() {
    let h = Harness::new(articles(3));
    let mut t = TableSchemaBuilder::new("articles");
    t.column(ColumnBuilder::new("id").label("id"))
        .column(ColumnBuilder::new("title").label("title"));
    let m = Module::new("articles", t.build().unwrap(), FormSchema::default());

    let stream = m.export_csv(&h.admin(), &ModuleState::new()).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;
    let bytes: Vec<u8> = chunks.into_iter().flat_map(Result::unwrap).collect();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "id,title\n1,Article 1\n2,Article 2\n3,Article 3\n"
    );
    let (sql, _) = h.executor.last_matching("SELECT").unwrap();
    assert!(!sql.contains("LIMIT"));
}

#[tokio::test]
async fn csv_export_neutralizes_formula_cells() {
    let h = Harness::new(vec![json!({"id": 1, "title": "=HYPERLINK(\"x\")"})]);
    let mut t = TableSchemaBuilder::new("articles");
    t.column(ColumnBuilder::new("id")).column(ColumnBuilder::new("title"));
    let m = Module::new("articles", t.build().unwrap(), FormSchema::default());

    let chunks: Vec<_> = m.export_csv(&h.admin(), &ModuleState::new()).await.unwrap().collect().await;
    let text = String::from_utf8(chunks.into_iter().flat_map(Result::unwrap).collect()).unwrap();
    assert_eq!(text, "Id,Title\n1,\"'=HYPERLINK(\"\"x\"\")\"\n");
}

#[tokio::test]
async fn export_requires_grant_for_non_admins() {
    let h = Harness::new(articles(1));
    let m = module();
    let user = h.ctx(Principal::user("u1"));
    assert!(matches!(
        m.export_csv(&user, &ModuleState::new()).await,
        Err(AppError::PermissionDenied(_))
    ));
    h.grants.grant("u1", "articles", PermissionMode::Export);
    assert!(m.export_csv(&user, &ModuleState::new()).await.is_ok());
}

#[tokio::test]
async fn update_records_one_audit_event_with_old_and_new() {
    let h = Harness::new(articles(2));
    let m = module();
    let before = h.executor.row(1).unwrap();

    let outcome = m
        .update(&h.admin(), &json!(1), &payload(json!({"title": "Renamed", "author": "ignored"})))
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Done { id: json!(1) });

    let events = h.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        AuditEvent::Updated {
            table: "articles".into(),
            id: json!(1),
            old: before,
            new: payload(json!({"title": "Renamed"})),
        }
    );
    assert_eq!(h.executor.row(1).unwrap()["title"], json!("Renamed"));
}

#[tokio::test]
async fn delete_capability_off_denies_everyone() {
    let h = Harness::new(articles(1));
    let m = module().with_capabilities(Capabilities {
        delete: false,
        ..Capabilities::default()
    });
    h.grants.grant("u1", "articles", PermissionMode::Delete);
    assert!(!m.has_delete(&h.admin(), &json!(1)).await.unwrap());
    assert!(!m.has_delete(&h.ctx(Principal::user("u1")), &json!(1)).await.unwrap());
    assert!(matches!(
        m.destroy(&h.admin(), &json!(1)).await,
        Err(AppError::PermissionDenied(_))
    ));
    assert!(h.executor.row(1).is_some());
}

#[tokio::test]
async fn page_past_the_end_is_empty_with_totals() {
    let h = Harness::new(articles(5));
    let m = module();
    let mut state = ModuleState::new();
    state.set_per_page(2, &[2, 10]);

    let listing = m.set_page(&h.admin(), &mut state, 9).await.unwrap();
    assert!(listing.rows.is_empty());
    assert_eq!(listing.page, 9);
    assert_eq!(listing.total_rows, 5);
    assert_eq!(listing.total_pages, 3);

    let listing = m.set_page(&h.admin(), &mut state, 3).await.unwrap();
    assert_eq!(listing.rows.len(), 1);
}

#[tokio::test]
async fn per_page_outside_allow_list_keeps_state() {
    let h = Harness::new(articles(5));
    let m = module();
    let mut state = ModuleState::new();
    state.set_page(2);
    let listing = m.set_per_page(&h.admin(), &mut state, 7).await.unwrap();
    assert_eq!(listing.per_page, 10);
    assert_eq!(state.page(), 2);
    let listing = m.set_per_page(&h.admin(), &mut state, 2).await.unwrap();
    assert_eq!(listing.per_page, 2);
    assert_eq!(state.page(), 1);
}

#[tokio::test]
async fn sort_toggle_flips_same_column_and_resets_new_column_to_desc() {
    let h = Harness::new(articles(1));
    let m = module();
    let mut state = ModuleState::new();

    m.set_sort(&h.admin(), &mut state, 1).await.unwrap();
    assert_eq!(state.order_by("id"), "title");
    assert_eq!(state.sort(SortDirection::Asc), SortDirection::Desc);

    let listing = m.set_sort(&h.admin(), &mut state, 1).await.unwrap();
    assert_eq!(state.sort(SortDirection::Desc), SortDirection::Asc);
    assert_eq!(listing.columns[1].sorted, Some(SortDirection::Asc));

    m.set_sort(&h.admin(), &mut state, 0).await.unwrap();
    assert_eq!(state.order_by("title"), "id");
    assert_eq!(state.sort(SortDirection::Asc), SortDirection::Desc);

    // email is not sortable
    m.set_sort(&h.admin(), &mut state, 2).await.unwrap();
    assert_eq!(state.order_by("title"), "id");
}

#[tokio::test]
async fn unknown_table_action_is_a_warning_outcome() {
    let h = Harness::new(articles(1));
    let outcome = module().table_action(&h.admin(), "publish", &[json!(1)]).await.unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::Unknown {
            action: "publish".into()
        }
    );
    assert!(h.audit.events().is_empty());
}

#[tokio::test]
async fn bulk_delete_rechecks_each_id() {
    let h = Harness::new(articles(3));
    let m = module().with_record_policy(|mode, id| !(mode == PermissionMode::Delete && id == &json!(2)));

    let outcome = m
        .table_action(&h.admin(), "delete", &[json!(1), json!(2), json!(99)])
        .await
        .unwrap();
    let ActionOutcome::Completed { succeeded, skipped, .. } = outcome else {
        panic!("expected a completed outcome");
    };
    assert_eq!(succeeded, [json!(1)]);
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0].id, json!(2));
    assert_eq!(skipped[0].reason, SkipReason::Denied);
    assert_eq!(skipped[1].reason, SkipReason::NotFound);

    assert!(h.executor.row(1).is_none());
    assert!(h.executor.row(2).is_some());
    assert!(matches!(h.audit.events().as_slice(), [AuditEvent::Deleted { .. }]));
}

#[tokio::test]
async fn denial_is_distinct_from_not_found() {
    let h = Harness::new(articles(1));
    let m = module();
    let user = h.ctx(Principal::user("u1"));
    assert!(matches!(
        m.render_edit_form(&user, &json!(1)).await,
        Err(AppError::PermissionDenied(_))
    ));
    assert!(matches!(
        m.render_edit_form(&h.admin(), &json!(42)).await,
        Err(AppError::NotFound(_))
    ));
    h.grants.grant("u1", "articles", PermissionMode::Edit);
    assert!(m.render_edit_form(&user, &json!(1)).await.is_ok());
}

#[tokio::test]
async fn create_and_edit_need_a_form() {
    let h = Harness::new(articles(1));
    let m = Module::new("articles", table().build().unwrap(), FormSchema::default());
    assert!(!m.has_create(&h.admin()).await.unwrap());
    assert!(!m.has_edit(&h.admin(), &json!(1)).await.unwrap());
    assert!(m.has_show(&h.admin(), &json!(1)).await.unwrap());
    assert!(matches!(
        m.render_create_form(&h.admin()).await,
        Err(AppError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn store_validates_then_inserts_and_audits() {
    let h = Harness::new(articles(2));
    let m = module();
    let mut state = ModuleState::new();
    state.set_page(4);

    let outcome = m
        .store(&h.admin(), &mut state, &payload(json!({"title": "abc"})))
        .await
        .unwrap();
    let MutationOutcome::Invalid { errors } = outcome else {
        panic!("expected validation errors");
    };
    assert_eq!(errors["title"], ["title must be at least 4 characters"]);
    assert!(h.executor.last_matching("INSERT").is_none());
    assert!(h.audit.events().is_empty());
    assert_eq!(state.page(), 4);

    let outcome = m
        .store(&h.admin(), &mut state, &payload(json!({"title": "Fresh", "author": "x"})))
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Done { id: json!(3) });
    let (sql, params) = h.executor.last_matching("INSERT").unwrap();
    assert_eq!(sql, "INSERT INTO articles (title, status) VALUES (?, ?) RETURNING id");
    assert_eq!(params, [json!("Fresh"), json!("draft")]);
    assert_eq!(
        h.audit.events(),
        [AuditEvent::Created {
            table: "articles".into(),
            id: json!(3),
            values: payload(json!({"title": "Fresh", "status": "draft"})),
        }]
    );
    assert_eq!(state.page(), 1);
}

#[tokio::test]
async fn persistence_failure_is_reported_without_audit() {
    let h = Harness::new(articles(1));
    let m = module();
    h.executor.set_fail_writes(true);

    let outcome = m
        .update(&h.admin(), &json!(1), &payload(json!({"title": "Renamed"})))
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Failed);
    assert!(!m.destroy(&h.admin(), &json!(1)).await.unwrap());
    assert!(h.audit.events().is_empty());
}

#[tokio::test]
async fn audit_failure_does_not_undo_the_mutation() {
    let h = Harness::new(articles(1));
    *h.audit.fail.lock().unwrap() = true;
    assert!(module().destroy(&h.admin(), &json!(1)).await.unwrap());
    assert!(h.executor.row(1).is_none());
}

#[tokio::test]
async fn show_form_is_readonly_and_keeps_field_order() {
    let h = Harness::new(articles(1));
    let m = module();
    let view = m.render_show_form(&h.admin(), &json!(1)).await.unwrap();
    assert_eq!(view.form_type, FormType::Show);
    let names: Vec<&str> = view.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["title", "status", "author"]);
    assert!(view.fields.iter().all(|f| f.readonly));
    assert_eq!(view.field("title").unwrap().value, json!("Article 1"));
    let (sql, _) = h.executor.last_matching("SELECT title").unwrap();
    assert_eq!(sql, "SELECT title, status, authors.name AS author FROM articles WHERE id = ?");

    let create = m.render_create_form(&h.admin()).await.unwrap();
    assert_eq!(create.field("status").unwrap().value, json!("draft"));
    assert_eq!(create.field("status").unwrap().options.len(), 2);
    assert!(create.field("title").unwrap().required);
    assert!(!create.field("title").unwrap().readonly);
}

#[tokio::test]
async fn invalid_filter_payload_leaves_state_untouched() {
    let h = Harness::new(articles(1));
    let m = module();
    let mut state = ModuleState::new();
    state.set_page(3);
    let mut submitted = FilterPayload::new();
    submitted.insert("date_start".into(), "yesterday".into());
    submitted.insert("dropdowns_5".into(), "x".into());

    let errors = m.filter_set(&h.admin(), &mut state, &submitted).unwrap().unwrap_err();
    assert!(errors.contains_key("date_start"));
    assert!(errors.contains_key("dropdowns_5"));
    assert!(!state.has_filters());
    assert_eq!(state.page(), 3);

    let mut submitted = FilterPayload::new();
    submitted.insert("date_start".into(), "2024-01-01".into());
    submitted.insert(SEARCH.into(), "  ".into());
    m.filter_set(&h.admin(), &mut state, &submitted).unwrap().unwrap();
    assert!(state.has_filters());
    assert_eq!(state.filter(SEARCH), None);
    assert_eq!(state.page(), 1);

    state.set_page(2);
    m.filter_clear(&mut state);
    assert!(!state.has_filters());
    assert_eq!(state.page(), 1);
}

#[tokio::test]
async fn filter_links_toggle_and_count() {
    let h = Harness::new(articles(4));
    let m = module();
    let mut state = ModuleState::new();

    let listing = m.set_active_filter_link(&h.admin(), &mut state, 1).await.unwrap();
    assert!(listing.filter_links[1].active);
    assert!(listing.has_filters);
    let (sql, _) = h.executor.last_matching("SELECT id AS id").unwrap();
    assert!(sql.contains("WHERE (status = 'live')"), "{}", sql);

    m.set_active_filter_link(&h.admin(), &mut state, 1).await.unwrap();
    assert_eq!(state.active_filter_link(), None);

    assert_eq!(m.filter_link_count(&h.admin(), 0).await.unwrap(), 4);
    let (sql, _) = h.executor.last_matching("SELECT COUNT(*)").unwrap();
    assert_eq!(sql, "SELECT COUNT(*) AS total FROM articles WHERE (status = 'draft')");
    assert!(matches!(
        m.filter_link_count(&h.admin(), 7).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn filter_form_reports_current_values() {
    let h = Harness::new(articles(1));
    let m = module();
    let mut state = ModuleState::new();
    state.set_filter("dropdowns_0", "pending");
    state.set_filter(SEARCH, "bob");
    let form = m.render_filter_form(&h.admin(), &state).await.unwrap();
    assert_eq!(form.search.as_deref(), Some("bob"));
    assert!(form.date_range);
    assert_eq!(form.dropdowns[0].key, "dropdowns_0");
    assert_eq!(form.dropdowns[0].selected.as_deref(), Some("pending"));
    assert_eq!(form.filter_links.len(), 2);
}

#[rstest]
#[case(PermissionMode::Create)]
#[case(PermissionMode::Edit)]
#[case(PermissionMode::Show)]
#[case(PermissionMode::Delete)]
#[case(PermissionMode::Export)]
#[tokio::test]
async fn non_admin_needs_a_grant_per_mode(#[case] mode: PermissionMode) {
    let h = Harness::new(articles(1));
    let m = module();
    let user = h.ctx(Principal::user("u2"));
    assert!(!allowed(&m, &user, mode).await);
    h.grants.grant("u2", "articles", mode);
    assert!(allowed(&m, &user, mode).await);
    h.grants.grant("u2", "other", mode);
    h.grants.revoke("u2", "articles", mode);
    assert!(!allowed(&m, &user, mode).await);
}

async fn allowed(m: &Module, ctx: &architect_crud::module::Context, mode: PermissionMode) -> bool {
    let id = json!(1);
    match mode {
        PermissionMode::Create => m.has_create(ctx).await,
        PermissionMode::Export => m.has_export(ctx).await,
        PermissionMode::Edit => m.has_edit(ctx, &id).await,
        PermissionMode::Show => m.has_show(ctx, &id).await,
        PermissionMode::Delete => m.has_delete(ctx, &id).await,
    }
    .unwrap()
}

#[tokio::test]
async fn verify_casts_placeholders_to_catalog_types() {
    let h = Harness::new(vec![json!({"id": 1, "title": "First", "author_id": 1})]);
    h.executor
        .set_catalog(&[("id", "integer"), ("title", "text"), ("author_id", "integer")]);
    let mut t = TableSchemaBuilder::new("articles");
    t.column(ColumnBuilder::new("id"))
        .column(ColumnBuilder::new("title"))
        .filter("articles.author_id", "Author", OptionSource::default())
        .filter("authors.country", "Country", OptionSource::default());
    let mut f = FormSchemaBuilder::new();
    f.field(FieldBuilder::new("title"))
        .field(FieldBuilder::new("author_id").rules(["integer"]));
    let mut m = Module::new("articles", t.build().unwrap(), f.build().unwrap());
    m.verify(h.executor.as_ref()).await.unwrap();
    assert_eq!(m.table().primary_key_type.as_deref(), Some("integer"));

    let mut state = ModuleState::new();
    let mut submitted = FilterPayload::new();
    submitted.insert("dropdowns_0".into(), "1".into());
    submitted.insert("dropdowns_1".into(), "NZ".into());
    m.filter_set(&h.admin(), &mut state, &submitted).unwrap().unwrap();
    m.list(&h.admin(), &state).await.unwrap();
    let (sql, params) = h.executor.last_matching("SELECT id AS id").unwrap();
    assert!(
        sql.contains("WHERE articles.author_id = ?::integer AND authors.country = ?"),
        "{}",
        sql
    );
    assert_eq!(params[..2], [json!("1"), json!("NZ")]);

    let outcome = m
        .update(&h.admin(), &json!(1), &payload(json!({"author_id": "2"})))
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Done { id: json!(1) });
    let (sql, params) = h.executor.last_matching("UPDATE").unwrap();
    assert_eq!(sql, "UPDATE articles SET author_id = ?::integer WHERE id = ?::integer");
    assert_eq!(params, [json!("2"), json!(1)]);

    let mut state = ModuleState::new();
    m.store(&h.admin(), &mut state, &payload(json!({"title": "Second", "author_id": "1"})))
        .await
        .unwrap();
    let (sql, _) = h.executor.last_matching("INSERT").unwrap();
    assert_eq!(
        sql,
        "INSERT INTO articles (title, author_id) VALUES (?::text, ?::integer) RETURNING id"
    );
}

#[tokio::test]
async fn verify_keeps_declared_types() {
    let h = Harness::new(articles(1));
    h.executor.set_catalog(&[("id", "bigint"), ("status", "text")]);
    let mut t = table();
    t.primary_key_type("uuid");
    let mut m = Module::new("articles", t.build().unwrap(), form());
    m.verify(h.executor.as_ref()).await.unwrap();
    assert_eq!(m.table().primary_key_type.as_deref(), Some("uuid"));
    assert_eq!(m.table().filters[0].pg_type.as_deref(), Some("text"));
}

#[tokio::test]
async fn verify_fails_for_a_missing_table() {
    let h = Harness::new(articles(1));
    let mut m = module();
    assert!(matches!(m.verify(h.executor.as_ref()).await, Err(AppError::Config(_))));
}

#[tokio::test]
async fn failed_snapshot_read_is_a_failed_mutation() {
    let h = Harness::new(articles(3));
    h.executor.fail_reads_for(json!(2));
    let m = module();

    let outcome = m
        .table_action(&h.admin(), "delete", &[json!(1), json!(2), json!(3)])
        .await
        .unwrap();
    let ActionOutcome::Completed { succeeded, skipped, .. } = outcome else {
        panic!("expected a completed outcome");
    };
    assert_eq!(succeeded, [json!(1), json!(3)]);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].id, json!(2));
    assert_eq!(skipped[0].reason, SkipReason::Failed);
    assert!(h.executor.row(2).is_some());

    assert!(!m.destroy(&h.admin(), &json!(2)).await.unwrap());
    let outcome = m
        .update(&h.admin(), &json!(2), &payload(json!({"title": "Renamed"})))
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Failed);
    assert!(h.executor.last_matching("UPDATE").is_none());
    assert_eq!(h.audit.events().len(), 2);
}

#[tokio::test]
async fn audit_events_carry_the_acting_user() {
    let h = Harness::new(articles(2));
    h.grants.grant("editor", "articles", PermissionMode::Create);
    let m = module();
    let mut state = ModuleState::new();
    m.store(&h.ctx(Principal::user("editor")), &mut state, &payload(json!({"title": "Fresh"})))
        .await
        .unwrap();
    m.destroy(&h.admin(), &json!(1)).await.unwrap();
    assert_eq!(h.audit.actors(), ["editor", "root"]);
}

#[tokio::test]
async fn pg_audit_rows_record_the_actor() {
    let h = Harness::new(Vec::new());
    let logger = PgAuditLogger::new(h.executor.clone());
    let old: Row = payload(json!({"title": "Gone"}));
    logger.log_deleted("alice", "articles", &json!(5), &old).await.unwrap();

    let (sql, params) = h.executor.last_matching("INSERT INTO").unwrap();
    assert!(sql.contains("audit_log (action, table_name, record_id, old_values, new_values, actor)"), "{}", sql);
    assert_eq!(
        params,
        [
            json!("delete"),
            json!("articles"),
            json!("5"),
            json!({"title": "Gone"}),
            Value::Null,
            json!("alice"),
        ]
    );
}
