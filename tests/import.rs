mod common;

use std::time::Duration;

use common::{FaultyStore, record_titled, store_with_fields};
use csv_upsert::{
    ImportError, ImportOptions, ImportResult, Importer,
    coerce::FieldValue,
    import_csv,
    retry::RetryPolicy,
    schema::{ChoiceOption, FieldSpec, FieldType},
    store::{DataStore, MemoryStore},
};

fn fast_options() -> ImportOptions {
    ImportOptions {
        batch_pause: Duration::ZERO,
        record_lookup: RetryPolicy::immediate(),
        ..ImportOptions::default()
    }
}

#[tokio::test]
async fn alice_and_bob_are_created_with_coerced_ages() {
    let (store, id) = store_with_fields(
        "People",
        &[("name", "Name", FieldType::Text), ("age", "Age", FieldType::Number)],
    )
    .await;

    let result = import_csv(&store, &id, "Name,Age\nAlice,30\nBob,notanumber\n")
        .await
        .unwrap();
    assert_eq!(
        result,
        ImportResult {
            created: 2,
            updated: 0,
            skipped: 0
        }
    );

    let alice = record_titled(&store, &id, "Alice").await.unwrap();
    assert_eq!(alice.value("age"), Some(&FieldValue::Number(30.0)));
    assert_eq!(alice.value("name"), Some(&FieldValue::Text("Alice".into())));
    let bob = record_titled(&store, &id, "Bob").await.unwrap();
    assert!(bob.value("age").is_none());
}

#[tokio::test]
async fn malformed_input_fails_before_touching_the_store() {
    let (inner, id) = store_with_fields("People", &[("name", "Name", FieldType::Text)]).await;
    let store = FaultyStore::wrap(inner);

    let err = Importer::new(&store, fast_options())
        .import_csv(&id, "onlyheader")
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::MalformedInput));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn reimporting_the_same_csv_only_updates() {
    let (store, id) = store_with_fields(
        "Books",
        &[("title", "Title", FieldType::Text), ("pages", "Pages", FieldType::Number)],
    )
    .await;
    let csv = "Title,Pages\nDune,412\nEmma,474\nUlysses,730\n";
    let importer = Importer::new(&store, fast_options());

    let first = importer.import_csv(&id, csv).await.unwrap();
    assert_eq!(first.created, 3);

    let second = importer.import_csv(&id, csv).await.unwrap();
    assert_eq!(
        second,
        ImportResult {
            created: 0,
            updated: 3,
            skipped: 0
        }
    );
    assert_eq!(store.records(&id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn repeated_title_in_one_file_creates_then_updates() {
    let (store, id) = store_with_fields(
        "Books",
        &[("title", "Title", FieldType::Text), ("pages", "Pages", FieldType::Number)],
    )
    .await;

    let result = Importer::new(&store, fast_options())
        .import_csv(&id, "Title,Pages\nDune,100\ndune,412\n")
        .await
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 1);

    let records = store.records(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Dune");
    assert_eq!(records[0].value("pages"), Some(&FieldValue::Number(412.0)));
}

#[tokio::test]
async fn existing_records_match_case_insensitively_and_keep_absent_values() {
    let (store, id) = store_with_fields(
        "People",
        &[("name", "Name", FieldType::Text), ("age", "Age", FieldType::Number)],
    )
    .await;
    import_csv(&store, &id, "Name,Age\nAlice,30\n").await.unwrap();

    let result = import_csv(&store, &id, "name,age\nALICE,\n").await.unwrap();
    assert_eq!(result.updated, 1);
    let alice = record_titled(&store, &id, "alice").await.unwrap();
    assert_eq!(alice.value("age"), Some(&FieldValue::Number(30.0)));
}

#[tokio::test]
async fn failing_rows_are_skipped_without_stopping_the_run() {
    let (inner, id) = store_with_fields("People", &[("name", "Name", FieldType::Text)]).await;
    let mut store = FaultyStore::wrap(inner);
    store.failing_titles.insert("Boom".to_string());
    store.idless_titles.insert("Ghost".to_string());

    let csv = "Name\nAlice\nBoom\nGhost\nBob\n";
    let result = Importer::new(&store, fast_options())
        .import_csv(&id, csv)
        .await
        .unwrap();
    assert_eq!(result.total(), 4);
    assert_eq!(result.skipped, 2);
    assert_eq!(result.created, 2);
    assert!(record_titled(&store, &id, "Bob").await.is_some());
}

#[tokio::test]
async fn field_write_failures_leave_other_fields_written() {
    let (inner, id) = store_with_fields(
        "People",
        &[
            ("name", "Name", FieldType::Text),
            ("age", "Age", FieldType::Number),
            ("active", "Active", FieldType::Checkbox),
        ],
    )
    .await;
    let mut store = FaultyStore::wrap(inner);
    store.failing_fields.insert("age".to_string());

    let result = Importer::new(&store, fast_options())
        .import_csv(&id, "Name,Age,Active\nAlice,30,yes\n")
        .await
        .unwrap();
    assert_eq!(result.created, 1);
    let alice = record_titled(&store, &id, "Alice").await.unwrap();
    assert!(alice.value("age").is_none());
    assert_eq!(alice.value("active"), Some(&FieldValue::Boolean(true)));
}

#[tokio::test]
async fn rows_without_a_matched_column_are_untitled() {
    let (store, id) = store_with_fields("People", &[("name", "Name", FieldType::Text)]).await;

    let result = Importer::new(&store, fast_options())
        .import_csv(&id, "Colour,Size\nred,1\nblue,2\n")
        .await
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 1);
    let records = store.records(&id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Untitled");
}

#[tokio::test]
async fn empty_title_cell_falls_back_to_untitled() {
    let (store, id) = store_with_fields(
        "People",
        &[("name", "Name", FieldType::Text), ("age", "Age", FieldType::Number)],
    )
    .await;
    import_csv(&store, &id, "Name,Age\n,5\n").await.unwrap();
    let record = record_titled(&store, &id, "Untitled").await.unwrap();
    assert_eq!(record.value("age"), Some(&FieldValue::Number(5.0)));
}

#[tokio::test]
async fn choice_values_resolve_to_option_ids() {
    let store = MemoryStore::new();
    let id = store.create_collection().await.unwrap().unwrap();
    let config = csv_upsert::provision::build_config(
        "Tickets",
        vec![
            FieldSpec::new("title", "Title", FieldType::Text),
            FieldSpec::new("status", "Status", FieldType::Choice).with_choices(vec![ChoiceOption {
                id: "open".into(),
                label: "Open".into(),
                color: "1".into(),
                active: true,
            }]),
        ],
    );
    store.save_configuration(&id, &config).await.unwrap();

    let result = import_csv(&store, &id, "Title,Status\nA,Open\nB,Closed\n")
        .await
        .unwrap();
    assert_eq!(result.created, 2);
    let a = record_titled(&store, &id, "A").await.unwrap();
    assert_eq!(a.value("status"), Some(&FieldValue::Choice("open".into())));
    let b = record_titled(&store, &id, "B").await.unwrap();
    assert!(b.value("status").is_none());
}

#[tokio::test(start_paused = true)]
async fn batches_preserve_order_across_pauses() {
    let (store, id) = store_with_fields(
        "Numbers",
        &[("title", "Title", FieldType::Text), ("n", "N", FieldType::Number)],
    )
    .await;
    let mut csv = String::from("Title,N\n");
    for i in 0..120 {
        csv.push_str(&format!("item-{},{i}\n", i % 60));
    }
    let options = ImportOptions {
        batch_size: 50,
        batch_pause: Duration::from_millis(10),
        record_lookup: RetryPolicy::immediate(),
    };

    let result = Importer::new(&store, options)
        .import_csv(&id, &csv)
        .await
        .unwrap();
    assert_eq!(result.created, 60);
    assert_eq!(result.updated, 60);
    let item = record_titled(&store, &id, "item-7").await.unwrap();
    assert_eq!(item.value("n"), Some(&FieldValue::Number(67.0)));
}
