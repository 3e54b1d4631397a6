//! Event operations

use std::collections::HashMap;
use std::ops::Bound;

use coredata_models::{fields, Event, ObjectId, Reading, Timestamp};
use tracing::{debug, instrument};

use crate::client::parse_id;
use crate::filter::{Filter, Update};
use crate::schema::{Collection, EventDocument};
use crate::store::{from_document, to_document, Document};
use crate::{DbClient, DbResult};

/// Reading ids resolved per store lookup when loading events
pub(crate) const READING_LOOKUP_BATCH: usize = 1_000;

impl DbClient {
    /// All events in store order
    #[instrument(skip(self))]
    pub async fn events(&self) -> DbResult<Vec<Event>> {
        self.get_events(&Filter::All).await
    }

    /// Add an event and its readings.
    ///
    /// Assigns the event id and creation time, and stamps every reading with
    /// a fresh id, the same creation time and the event's device. Readings
    /// are written before the event; if the event insert fails the readings
    /// stay behind.
    #[instrument(skip(self, event), fields(device = %event.device, readings = event.readings.len()))]
    pub async fn add_event(&self, event: &mut Event) -> DbResult<ObjectId> {
        event.created = self.now();
        event.id = ObjectId::new();

        if !event.readings.is_empty() {
            let created = event.created;
            let device = event.device.clone();
            let mut docs = Vec::with_capacity(event.readings.len());
            for reading in event.readings.iter_mut() {
                reading.id = ObjectId::new();
                reading.created = created;
                reading.device = device.clone();
                docs.push(to_document(&*reading)?);
            }
            self.store().insert_many(Collection::Readings, docs).await?;
        }

        let doc = to_document(&EventDocument::from_event(event))?;
        self.store().insert_one(Collection::Events, doc).await?;

        debug!("Added event {}", event.id);
        Ok(event.id)
    }

    /// Update an event's own fields. Its readings are never touched, neither
    /// the stored references nor the reading documents.
    #[instrument(skip(self, event), fields(id = %event.id))]
    pub async fn update_event(&self, mut event: Event) -> DbResult<()> {
        event.modified = self.now();

        let mut set = to_document(&EventDocument::from_event(&event))?;
        set.remove(fields::READINGS);
        set.remove(fields::ID);

        self.store()
            .update_by_id(Collection::Events, event.id, Update::Set(set))
            .await
    }

    #[instrument(skip(self))]
    pub async fn event_by_id(&self, id: &str) -> DbResult<Event> {
        let id = parse_id(id)?;
        self.get_event(&Filter::eq(fields::ID, id.to_hex())).await
    }

    pub async fn event_count(&self) -> DbResult<u64> {
        self.store().count(Collection::Events, &Filter::All).await
    }

    pub async fn event_count_by_device(&self, device: &str) -> DbResult<u64> {
        self.store()
            .count(Collection::Events, &Filter::eq(fields::DEVICE, device))
            .await
    }

    /// Remove the event document only; its readings remain
    pub async fn delete_event_by_id(&self, id: &str) -> DbResult<()> {
        self.delete_by_id(id, Collection::Events).await
    }

    #[instrument(skip(self))]
    pub async fn events_for_device_limit(
        &self,
        device: &str,
        limit: usize,
    ) -> DbResult<Vec<Event>> {
        self.get_events_limit(&Filter::eq(fields::DEVICE, device), limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn events_for_device(&self, device: &str) -> DbResult<Vec<Event>> {
        self.get_events(&Filter::eq(fields::DEVICE, device)).await
    }

    /// Events created within `[start, end]`
    #[instrument(skip(self))]
    pub async fn events_by_creation_time(
        &self,
        start: Timestamp,
        end: Timestamp,
        limit: usize,
    ) -> DbResult<Vec<Event>> {
        let filter = Filter::range(fields::CREATED, Bound::Included(start), Bound::Included(end));
        self.get_events_limit(&filter, limit).await
    }

    /// Events with `now - created > age`
    #[instrument(skip(self))]
    pub async fn events_older_than_age(&self, age: i64) -> DbResult<Vec<Event>> {
        let expire = self.now().saturating_sub(age);
        let filter = Filter::range(fields::CREATED, Bound::Unbounded, Bound::Excluded(expire));
        self.get_events(&filter).await
    }

    /// Events already exported downstream
    #[instrument(skip(self))]
    pub async fn events_pushed(&self) -> DbResult<Vec<Event>> {
        let filter = Filter::range(fields::PUSHED, Bound::Excluded(0), Bound::Unbounded);
        self.get_events(&filter).await
    }

    /// Delete every reading, then every event. Not atomic across the two.
    #[instrument(skip(self))]
    pub async fn scrub_all_events(&self) -> DbResult<()> {
        let readings = self
            .store()
            .delete_many(Collection::Readings, &Filter::All)
            .await?;
        let events = self
            .store()
            .delete_many(Collection::Events, &Filter::All)
            .await?;

        debug!("Scrubbed {} events and {} readings", events, readings);
        Ok(())
    }

    async fn get_events(&self, filter: &Filter) -> DbResult<Vec<Event>> {
        let docs = self.store().find(Collection::Events, filter, None).await?;
        self.load_events(docs).await
    }

    async fn get_events_limit(&self, filter: &Filter, limit: usize) -> DbResult<Vec<Event>> {
        let docs = self.find_limit(Collection::Events, filter, limit).await?;
        self.load_events(docs).await
    }

    async fn get_event(&self, filter: &Filter) -> DbResult<Event> {
        let doc = self.store().find_one(Collection::Events, filter).await?;
        let mut events = self.load_events(vec![doc]).await?;
        Ok(events.remove(0))
    }

    /// Resolve stored reading references in batches of `READING_LOOKUP_BATCH`
    /// ids. References to readings that no longer exist are dropped.
    async fn load_events(&self, docs: Vec<Document>) -> DbResult<Vec<Event>> {
        let stored = docs
            .into_iter()
            .map(from_document::<EventDocument>)
            .collect::<DbResult<Vec<_>>>()?;

        let ids: Vec<String> = stored
            .iter()
            .flat_map(|e| e.readings.iter().map(ObjectId::to_hex))
            .collect();

        let mut readings: HashMap<ObjectId, Reading> = HashMap::with_capacity(ids.len());
        for batch in ids.chunks(READING_LOOKUP_BATCH) {
            let filter = Filter::is_in(fields::ID, batch.iter().cloned());
            let docs = self
                .store()
                .find(Collection::Readings, &filter, None)
                .await?;
            for doc in docs {
                let reading: Reading = from_document(doc)?;
                readings.insert(reading.id, reading);
            }
        }

        Ok(stored
            .into_iter()
            .map(|e| {
                let resolved = e
                    .readings
                    .iter()
                    .filter_map(|id| readings.get(id).cloned())
                    .collect();
                e.into_event(resolved)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::READING_LOOKUP_BATCH;
    use crate::{DbClient, DbError, InMemoryStore};
    use coredata_models::{Event, Reading};

    fn client() -> DbClient {
        DbClient::with_store(InMemoryStore::new())
    }

    #[tokio::test]
    async fn test_add_stamps_readings() {
        let client = client().with_clock(|| 1_000);
        let mut event = Event::new(
            "d1",
            vec![Reading::new("temp", "72"), Reading::new("humidity", "40")],
        );

        let id = client.add_event(&mut event).await.unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.created, 1_000);
        for reading in &event.readings {
            assert!(!reading.id.is_nil());
            assert_eq!(reading.created, 1_000);
            assert_eq!(reading.device, "d1");
        }

        let loaded = client.event_by_id(&id.to_hex()).await.unwrap();
        assert_eq!(loaded, event);
    }

    #[tokio::test]
    async fn test_deleted_reading_is_dropped_from_event() {
        let client = client();
        let mut event = Event::new(
            "d1",
            vec![Reading::new("temp", "72"), Reading::new("humidity", "40")],
        );
        client.add_event(&mut event).await.unwrap();

        let gone = event.readings[0].id.to_hex();
        client.delete_reading_by_id(&gone).await.unwrap();

        let loaded = client.event_by_id(&event.id.to_hex()).await.unwrap();
        assert_eq!(loaded.readings.len(), 1);
        assert_eq!(loaded.readings[0].name, "humidity");
    }

    #[tokio::test]
    async fn test_update_missing_event() {
        let client = client();
        let err = client.update_event(Event::new("d1", vec![])).await;
        assert!(matches!(err, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn test_pushed_and_counts() {
        let client = client();
        let mut a = Event::new("d1", vec![]);
        let mut b = Event::new("d2", vec![]);
        client.add_event(&mut a).await.unwrap();
        client.add_event(&mut b).await.unwrap();

        a.pushed = 5;
        client.update_event(a.clone()).await.unwrap();

        let pushed = client.events_pushed().await.unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].id, a.id);

        assert_eq!(client.event_count().await.unwrap(), 2);
        assert_eq!(client.event_count_by_device("d2").await.unwrap(), 1);
        assert_eq!(client.event_count_by_device("d3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_large_events_load_in_batches() {
        let store = InMemoryStore::new();
        let client = DbClient::with_store(store.clone());
        let count = READING_LOOKUP_BATCH * 2 + 500;
        let readings = (0..count)
            .map(|i| Reading::new("temp", i.to_string()))
            .collect();
        let mut big = Event::new("d1", readings);
        let mut small = Event::new("d1", vec![Reading::new("temp", "x")]);
        client.add_event(&mut big).await.unwrap();
        client.add_event(&mut small).await.unwrap();

        let before = store.operation_count();
        let events = client.events_for_device("d1").await.unwrap();
        // one event query plus three reading batches
        assert_eq!(store.operation_count() - before, 4);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], big);
        assert_eq!(events[1].readings, small.readings);
    }

    #[tokio::test]
    async fn test_extreme_age_does_not_overflow() {
        let client = client().with_clock(|| 1_000);
        let mut event = Event::new("d1", vec![]);
        client.add_event(&mut event).await.unwrap();

        assert_eq!(client.events_older_than_age(i64::MIN).await.unwrap().len(), 1);
        assert!(client.events_older_than_age(i64::MAX).await.unwrap().is_empty());
    }
}
