//! End-to-end behaviour of DbClient against the in-memory store

use coredata_db::{DbClient, DbError, InMemoryStore};
use coredata_models::{Event, Reading, ValueDescriptor};

fn client() -> (DbClient, InMemoryStore) {
    let store = InMemoryStore::new();
    (DbClient::with_store(store.clone()), store)
}

#[tokio::test]
async fn added_event_is_retrievable_with_its_reading() {
    let (client, _) = client();
    let mut event = Event::new("d1", vec![Reading::new("temp", "72")]);

    let id = client.add_event(&mut event).await.unwrap();
    assert!(!id.is_nil());
    assert!(event.created > 0);

    let readings = client.readings_by_device("d1", 10).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].device, "d1");
    assert_eq!(readings[0].created, event.created);
    assert_eq!(readings[0].value, "72");

    let loaded = client.event_by_id(&id.to_hex()).await.unwrap();
    assert_eq!(loaded.device, "d1");
    assert_eq!(loaded.readings, readings);
}

#[tokio::test]
async fn duplicate_value_descriptor_name_is_rejected() {
    let (client, _) = client();
    let mut first = ValueDescriptor::new("temp");
    first.uom_label = "degF".into();
    client.add_value_descriptor(first).await.unwrap();

    let mut second = ValueDescriptor::new("temp");
    second.uom_label = "degC".into();
    let err = client.add_value_descriptor(second).await.unwrap_err();
    assert!(matches!(err, DbError::NotUnique(ref n) if n == "temp"));

    let all = client.value_descriptors().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "temp");
    assert_eq!(all[0].uom_label, "degF");
}

#[tokio::test]
async fn only_identical_names_conflict() {
    let (client, _) = client();
    for name in ["temp", "Temp", "TEMP", "temp ", "café", "cafe"] {
        client
            .add_value_descriptor(ValueDescriptor::new(name))
            .await
            .unwrap();
    }
    assert_eq!(client.value_descriptors().await.unwrap().len(), 6);

    let err = client
        .add_value_descriptor(ValueDescriptor::new("café"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotUnique(ref n) if n == "café"));
}

#[tokio::test]
async fn deleted_entities_are_not_found() {
    let (client, _) = client();

    let mut event = Event::new("d1", vec![]);
    let event_id = client.add_event(&mut event).await.unwrap().to_hex();
    let reading_id = client
        .add_reading(Reading::new("temp", "1"))
        .await
        .unwrap()
        .to_hex();
    let vd_id = client
        .add_value_descriptor(ValueDescriptor::new("pressure"))
        .await
        .unwrap()
        .to_hex();

    client.delete_event_by_id(&event_id).await.unwrap();
    client.delete_reading_by_id(&reading_id).await.unwrap();
    client.delete_value_descriptor_by_id(&vd_id).await.unwrap();

    assert!(matches!(
        client.event_by_id(&event_id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        client.reading_by_id(&reading_id).await,
        Err(DbError::NotFound)
    ));
    assert!(matches!(
        client.value_descriptor_by_id(&vd_id).await,
        Err(DbError::NotFound)
    ));

    // A second delete has nothing to remove
    assert!(matches!(
        client.delete_event_by_id(&event_id).await,
        Err(DbError::NotFound)
    ));
}

#[tokio::test]
async fn zero_limit_returns_nothing() {
    let (client, store) = client();
    let mut event = Event::new("d1", vec![Reading::new("temp", "72")]);
    client.add_event(&mut event).await.unwrap();
    let calls = store.operation_count();

    assert!(client.events_for_device_limit("d1", 0).await.unwrap().is_empty());
    assert!(client
        .events_by_creation_time(0, i64::MAX, 0)
        .await
        .unwrap()
        .is_empty());
    assert!(client.readings_by_device("d1", 0).await.unwrap().is_empty());
    assert!(client
        .readings_by_value_descriptor("temp", 0)
        .await
        .unwrap()
        .is_empty());
    assert!(client
        .readings_by_value_descriptor_names(&["temp"], 0)
        .await
        .unwrap()
        .is_empty());
    assert!(client
        .readings_by_creation_time(0, i64::MAX, 0)
        .await
        .unwrap()
        .is_empty());
    assert!(client
        .readings_by_device_and_value_descriptor("d1", "temp", 0)
        .await
        .unwrap()
        .is_empty());

    assert_eq!(store.operation_count(), calls);
}

#[tokio::test]
async fn updating_event_leaves_readings_alone() {
    let (client, _) = client();
    let mut event = Event::new(
        "d1",
        vec![Reading::new("temp", "72"), Reading::new("humidity", "30")],
    );
    let id = client.add_event(&mut event).await.unwrap();
    let original = client.event_by_id(&id.to_hex()).await.unwrap();

    let mut changed = original.clone();
    changed.device = "d9".into();
    changed.pushed = 42;
    changed.readings.clear();
    client.update_event(changed).await.unwrap();

    let updated = client.event_by_id(&id.to_hex()).await.unwrap();
    assert_eq!(updated.device, "d9");
    assert_eq!(updated.pushed, 42);
    assert!(updated.modified > 0);
    assert_eq!(updated.readings, original.readings);
    assert_eq!(client.reading_count().await.unwrap(), 2);
}

#[tokio::test]
async fn malformed_id_never_reaches_the_store() {
    let (client, store) = client();
    let before = store.operation_count();

    assert!(matches!(
        client.delete_reading_by_id("not-a-hex-id").await,
        Err(DbError::InvalidIdentifier(ref s)) if s == "not-a-hex-id"
    ));
    assert!(matches!(
        client.event_by_id("xyz").await,
        Err(DbError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        client.delete_value_descriptor_by_id("").await,
        Err(DbError::InvalidIdentifier(_))
    ));

    assert_eq!(store.operation_count(), before);
}

#[tokio::test]
async fn age_zero_excludes_just_added_event() {
    let store = InMemoryStore::new();
    let client = DbClient::with_store(store).with_clock(|| 1_700_000_000_000);
    let mut event = Event::new("d1", vec![]);
    client.add_event(&mut event).await.unwrap();

    assert!(client.events_older_than_age(0).await.unwrap().is_empty());
    assert_eq!(client.events_older_than_age(-1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn time_range_queries_are_inclusive() {
    let store = InMemoryStore::new();
    for (now, device) in [(100, "a"), (200, "b"), (300, "c")] {
        let client = DbClient::with_store(store.clone()).with_clock(move || now);
        let mut event = Event::new(device, vec![Reading::new("temp", "1")]);
        client.add_event(&mut event).await.unwrap();
    }
    let client = DbClient::with_store(store);

    let events = client.events_by_creation_time(100, 200, 10).await.unwrap();
    let devices: Vec<_> = events.iter().map(|e| e.device.as_str()).collect();
    assert_eq!(devices, ["a", "b"]);

    let readings = client.readings_by_creation_time(200, 300, 1).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].device, "b");
}

#[tokio::test]
async fn scrub_clears_events_and_readings() {
    let (client, _) = client();
    for device in ["d1", "d2"] {
        let mut event = Event::new(device, vec![Reading::new("temp", "1")]);
        client.add_event(&mut event).await.unwrap();
    }
    client
        .add_value_descriptor(ValueDescriptor::new("temp"))
        .await
        .unwrap();

    client.scrub_all_events().await.unwrap();
    assert_eq!(client.event_count().await.unwrap(), 0);
    assert_eq!(client.reading_count().await.unwrap(), 0);
    assert_eq!(client.value_descriptors().await.unwrap().len(), 1);

    client.scrub_all_value_descriptors().await.unwrap();
    assert!(client.value_descriptors().await.unwrap().is_empty());
}

#[tokio::test]
async fn events_for_device_filters_and_caps() {
    let (client, _) = client();
    for device in ["d1", "d2", "d1", "d1"] {
        let mut event = Event::new(device, vec![]);
        client.add_event(&mut event).await.unwrap();
    }

    assert_eq!(client.events().await.unwrap().len(), 4);
    assert_eq!(client.events_for_device("d1").await.unwrap().len(), 3);
    assert_eq!(client.events_for_device_limit("d1", 2).await.unwrap().len(), 2);
    assert!(client.events_for_device("d3").await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_client_is_inactive() {
    let (client, _) = client();
    client.close().await;

    assert!(matches!(client.events().await, Err(DbError::NoActiveClient)));
    assert!(matches!(
        client.add_reading(Reading::new("temp", "1")).await,
        Err(DbError::NoActiveClient)
    ));
}
