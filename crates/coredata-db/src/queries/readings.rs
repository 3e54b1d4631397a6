//! Reading operations

use std::ops::Bound;

use coredata_models::{fields, ObjectId, Reading, Timestamp};
use tracing::{debug, instrument};

use crate::client::parse_id;
use crate::filter::{Filter, Update};
use crate::schema::Collection;
use crate::store::{from_document, to_document};
use crate::{DbClient, DbResult};

impl DbClient {
    #[instrument(skip(self))]
    pub async fn readings(&self) -> DbResult<Vec<Reading>> {
        let docs = self
            .store()
            .find(Collection::Readings, &Filter::All, None)
            .await?;
        docs.into_iter().map(from_document).collect()
    }

    /// Store a standalone reading with a fresh id and creation time
    #[instrument(skip(self, reading), fields(name = %reading.name))]
    pub async fn add_reading(&self, mut reading: Reading) -> DbResult<ObjectId> {
        reading.id = ObjectId::new();
        reading.created = self.now();

        self.store()
            .insert_one(Collection::Readings, to_document(&reading)?)
            .await?;

        debug!("Added reading {}", reading.id);
        Ok(reading.id)
    }

    /// Replace a reading by id, stamping its modification time
    #[instrument(skip(self, reading), fields(id = %reading.id))]
    pub async fn update_reading(&self, mut reading: Reading) -> DbResult<()> {
        reading.modified = self.now();
        let doc = to_document(&reading)?;
        self.store()
            .update_by_id(Collection::Readings, reading.id, Update::Replace(doc))
            .await
    }

    #[instrument(skip(self))]
    pub async fn reading_by_id(&self, id: &str) -> DbResult<Reading> {
        let id = parse_id(id)?;
        let doc = self
            .store()
            .find_one(Collection::Readings, &Filter::eq(fields::ID, id.to_hex()))
            .await?;
        from_document(doc)
    }

    pub async fn reading_count(&self) -> DbResult<u64> {
        self.store().count(Collection::Readings, &Filter::All).await
    }

    pub async fn delete_reading_by_id(&self, id: &str) -> DbResult<()> {
        self.delete_by_id(id, Collection::Readings).await
    }

    #[instrument(skip(self))]
    pub async fn readings_by_device(&self, device: &str, limit: usize) -> DbResult<Vec<Reading>> {
        self.get_readings_limit(&Filter::eq(fields::DEVICE, device), limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn readings_by_value_descriptor(
        &self,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<Reading>> {
        self.get_readings_limit(&Filter::eq(fields::NAME, name), limit)
            .await
    }

    /// Readings whose name is any of `names`
    #[instrument(skip(self, names), fields(names = names.len()))]
    pub async fn readings_by_value_descriptor_names<S: AsRef<str>>(
        &self,
        names: &[S],
        limit: usize,
    ) -> DbResult<Vec<Reading>> {
        let filter = Filter::is_in(fields::NAME, names.iter().map(|n| n.as_ref()));
        self.get_readings_limit(&filter, limit).await
    }

    /// Readings created within `[start, end]`
    #[instrument(skip(self))]
    pub async fn readings_by_creation_time(
        &self,
        start: Timestamp,
        end: Timestamp,
        limit: usize,
    ) -> DbResult<Vec<Reading>> {
        let filter = Filter::range(fields::CREATED, Bound::Included(start), Bound::Included(end));
        self.get_readings_limit(&filter, limit).await
    }

    #[instrument(skip(self))]
    pub async fn readings_by_device_and_value_descriptor(
        &self,
        device: &str,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<Reading>> {
        let filter = Filter::eq(fields::DEVICE, device).and(Filter::eq(fields::NAME, name));
        self.get_readings_limit(&filter, limit).await
    }

    async fn get_readings_limit(&self, filter: &Filter, limit: usize) -> DbResult<Vec<Reading>> {
        let docs = self
            .find_limit(Collection::Readings, filter, limit)
            .await?;
        docs.into_iter().map(from_document).collect()
    }
}
