//! Value descriptor operations

use coredata_models::{fields, ObjectId, ValueDescriptor};
use tracing::{debug, instrument, warn};

use crate::client::parse_id;
use crate::filter::{Filter, Update};
use crate::schema::Collection;
use crate::store::{from_document, to_document};
use crate::{DbClient, DbError, DbResult};

impl DbClient {
    /// Add a value descriptor.
    ///
    /// The name must be unique. The store rejects a duplicate atomically and
    /// the existing descriptor is left as it was.
    #[instrument(skip(self, vd), fields(name = %vd.name))]
    pub async fn add_value_descriptor(&self, mut vd: ValueDescriptor) -> DbResult<ObjectId> {
        vd.created = self.now();
        vd.id = ObjectId::new();

        match self
            .store()
            .insert_one(Collection::ValueDescriptors, to_document(&vd)?)
            .await
        {
            Ok(()) => {
                debug!("Added value descriptor {}", vd.id);
                Ok(vd.id)
            }
            Err(DbError::NotUnique(_)) => Err(DbError::NotUnique(vd.name)),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn value_descriptors(&self) -> DbResult<Vec<ValueDescriptor>> {
        self.get_value_descriptors(&Filter::All).await
    }

    pub async fn value_descriptor_count(&self) -> DbResult<u64> {
        self.store()
            .count(Collection::ValueDescriptors, &Filter::All)
            .await
    }

    /// Replace a value descriptor by id. Fails with `NotUnique` when a
    /// different descriptor already owns the new name.
    #[instrument(skip(self, vd), fields(id = %vd.id, name = %vd.name))]
    pub async fn update_value_descriptor(&self, mut vd: ValueDescriptor) -> DbResult<()> {
        match self.value_descriptor_by_name(&vd.name).await {
            Ok(existing) if existing.id != vd.id => return Err(DbError::NotUnique(vd.name)),
            Ok(_) | Err(DbError::NotFound) => {}
            Err(e) => return Err(e),
        }

        vd.modified = self.now();
        let doc = to_document(&vd)?;

        // A concurrent writer can still claim the name; the unique index catches it
        self.store()
            .update_by_id(Collection::ValueDescriptors, vd.id, Update::Replace(doc))
            .await
            .map_err(|e| match e {
                DbError::NotUnique(_) => DbError::NotUnique(vd.name),
                e => e,
            })
    }

    /// Delete a value descriptor by id, refusing while any reading still
    /// carries its name
    #[instrument(skip(self))]
    pub async fn delete_value_descriptor_by_id(&self, id: &str) -> DbResult<()> {
        let oid = parse_id(id)?;
        let vd = self
            .get_value_descriptor(&Filter::eq(fields::ID, oid.to_hex()))
            .await?;

        let in_use = self
            .store()
            .count(Collection::Readings, &Filter::eq(fields::NAME, vd.name.as_str()))
            .await?;
        if in_use > 0 {
            warn!("Value descriptor {} still used by {} readings", vd.name, in_use);
            return Err(DbError::ValueDescriptorInUse(vd.name));
        }

        self.delete_by_id(id, Collection::ValueDescriptors).await
    }

    #[instrument(skip(self))]
    pub async fn value_descriptor_by_name(&self, name: &str) -> DbResult<ValueDescriptor> {
        self.get_value_descriptor(&Filter::eq(fields::NAME, name))
            .await
    }

    /// Fetch each name in turn. Unknown names are skipped; any other error
    /// aborts the whole lookup.
    pub async fn value_descriptors_by_name<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> DbResult<Vec<ValueDescriptor>> {
        let mut found = Vec::with_capacity(names.len());
        for name in names {
            match self.value_descriptor_by_name(name.as_ref()).await {
                Ok(vd) => found.push(vd),
                Err(DbError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    #[instrument(skip(self))]
    pub async fn value_descriptor_by_id(&self, id: &str) -> DbResult<ValueDescriptor> {
        let id = parse_id(id)?;
        self.get_value_descriptor(&Filter::eq(fields::ID, id.to_hex()))
            .await
    }

    pub async fn value_descriptors_by_uom_label(
        &self,
        uom_label: &str,
    ) -> DbResult<Vec<ValueDescriptor>> {
        self.get_value_descriptors(&Filter::eq(fields::UOM_LABEL, uom_label))
            .await
    }

    /// Descriptors whose label set contains `label`
    pub async fn value_descriptors_by_label(&self, label: &str) -> DbResult<Vec<ValueDescriptor>> {
        self.get_value_descriptors(&Filter::eq(fields::LABELS, label))
            .await
    }

    pub async fn value_descriptors_by_type(
        &self,
        value_type: &str,
    ) -> DbResult<Vec<ValueDescriptor>> {
        self.get_value_descriptors(&Filter::eq(fields::TYPE, value_type))
            .await
    }

    #[instrument(skip(self))]
    pub async fn scrub_all_value_descriptors(&self) -> DbResult<()> {
        let deleted = self
            .store()
            .delete_many(Collection::ValueDescriptors, &Filter::All)
            .await?;
        debug!("Scrubbed {} value descriptors", deleted);
        Ok(())
    }

    async fn get_value_descriptors(&self, filter: &Filter) -> DbResult<Vec<ValueDescriptor>> {
        let docs = self
            .store()
            .find(Collection::ValueDescriptors, filter, None)
            .await?;
        docs.into_iter().map(from_document).collect()
    }

    async fn get_value_descriptor(&self, filter: &Filter) -> DbResult<ValueDescriptor> {
        let doc = self
            .store()
            .find_one(Collection::ValueDescriptors, filter)
            .await?;
        from_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use crate::{DbClient, DbError, InMemoryStore};
    use coredata_models::{Reading, ValueDescriptor};

    fn descriptor(name: &str, uom: &str, value_type: &str, labels: &[&str]) -> ValueDescriptor {
        ValueDescriptor {
            uom_label: uom.into(),
            value_type: value_type.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            ..ValueDescriptor::new(name)
        }
    }

    #[tokio::test]
    async fn test_update_rename_conflict() {
        let client = DbClient::with_store(InMemoryStore::new());
        client
            .add_value_descriptor(ValueDescriptor::new("temp"))
            .await
            .unwrap();
        let id = client
            .add_value_descriptor(ValueDescriptor::new("humidity"))
            .await
            .unwrap();

        let mut vd = client.value_descriptor_by_id(&id.to_hex()).await.unwrap();
        vd.name = "temp".into();
        let err = client.update_value_descriptor(vd).await.unwrap_err();
        assert!(matches!(err, DbError::NotUnique(ref n) if n == "temp"));

        let unchanged = client.value_descriptor_by_id(&id.to_hex()).await.unwrap();
        assert_eq!(unchanged.name, "humidity");
    }

    #[tokio::test]
    async fn test_update_same_name_and_missing() {
        let client = DbClient::with_store(InMemoryStore::new()).with_clock(|| 9);
        let id = client
            .add_value_descriptor(ValueDescriptor::new("temp"))
            .await
            .unwrap();

        let mut vd = client.value_descriptor_by_id(&id.to_hex()).await.unwrap();
        vd.uom_label = "degF".into();
        client.update_value_descriptor(vd).await.unwrap();

        let stored = client.value_descriptor_by_name("temp").await.unwrap();
        assert_eq!(stored.uom_label, "degF");
        assert_eq!(stored.modified, 9);

        let ghost = ValueDescriptor {
            id: coredata_models::ObjectId::new(),
            ..ValueDescriptor::new("ghost")
        };
        assert!(matches!(
            client.update_value_descriptor(ghost).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_lookups() {
        let client = DbClient::with_store(InMemoryStore::new());
        for vd in [
            descriptor("temp", "degF", "F", &["hvac", "climate"]),
            descriptor("humidity", "%", "F", &["climate"]),
            descriptor("rpm", "rpm", "I", &["motor"]),
        ] {
            client.add_value_descriptor(vd).await.unwrap();
        }

        assert_eq!(client.value_descriptors().await.unwrap().len(), 3);
        assert_eq!(client.value_descriptor_count().await.unwrap(), 3);
        assert_eq!(
            client
                .value_descriptors_by_uom_label("degF")
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            client
                .value_descriptors_by_label("climate")
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(client.value_descriptors_by_type("I").await.unwrap().len(), 1);

        let named = client
            .value_descriptors_by_name(&["rpm", "unknown", "temp"])
            .await
            .unwrap();
        let names: Vec<_> = named.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["rpm", "temp"]);
    }

    #[tokio::test]
    async fn test_name_lookup_aborts_on_store_failure() {
        let client = DbClient::with_store(InMemoryStore::new());
        client.close().await;
        let err = client.value_descriptors_by_name(&["temp"]).await.unwrap_err();
        assert!(matches!(err, DbError::NoActiveClient));
    }

    #[tokio::test]
    async fn test_delete_refused_while_referenced() {
        let client = DbClient::with_store(InMemoryStore::new());
        let id = client
            .add_value_descriptor(ValueDescriptor::new("temp"))
            .await
            .unwrap();
        let reading_id = client
            .add_reading(Reading::new("temp", "72"))
            .await
            .unwrap();

        let err = client
            .delete_value_descriptor_by_id(&id.to_hex())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ValueDescriptorInUse(ref n) if n == "temp"));

        client
            .delete_reading_by_id(&reading_id.to_hex())
            .await
            .unwrap();
        client
            .delete_value_descriptor_by_id(&id.to_hex())
            .await
            .unwrap();
        assert!(client.value_descriptors().await.unwrap().is_empty());
    }
}
