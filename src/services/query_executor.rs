// Query translation and execution
//
// Every call runs the same pipeline, strictly in order:
// project -> resolve joins -> execute -> normalize (then fold joined records in).

use serde_json::Value;

use crate::error::AdapterError;
use crate::models::{
    CollectionDescriptor, Filter, JoinSpec, QuerySpec, Record, Reduced, RemoteQuery, SortKey,
};
use crate::services::connection_manager::{join_key, ConnectionManager, JoinTables};
use crate::services::normalizer::ResultNormalizer;

pub struct QueryExecutor {
    connections: ConnectionManager,
}

impl QueryExecutor {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    /// Run a find, resolving any joins the query carries
    pub async fn find(
        &self,
        identity: &str,
        collection: &str,
        spec: &QuerySpec,
    ) -> Result<Vec<Record>, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;
        let fields = Self::project(&descriptor, spec.select.as_deref())?;
        self.run(identity, &descriptor, spec, fields).await
    }

    /// Run a joined query. The parent projection is always the full field set.
    pub async fn join(
        &self,
        identity: &str,
        collection: &str,
        spec: &QuerySpec,
    ) -> Result<Vec<Record>, AdapterError> {
        let descriptor = self.connections.collection(identity, collection).await?;
        let fields = descriptor.remote_fields();
        self.run(identity, &descriptor, spec, fields).await
    }

    async fn run(
        &self,
        identity: &str,
        descriptor: &CollectionDescriptor,
        spec: &QuerySpec,
        fields: Vec<String>,
    ) -> Result<Vec<Record>, AdapterError> {
        let query = Self::build(descriptor, spec, fields)?;
        if let Some(Reduced::Nothing) = query.filter.as_ref().map(Filter::reduce) {
            tracing::debug!("Filter on {} matches no records, skipping query", descriptor.name());
            return Ok(Vec::new());
        }

        let tables = self.connections.resolve_join(identity, &spec.joins).await?;

        let session = self.connections.get_session(identity).await?;
        tracing::debug!(
            "Querying {} on {} ({} fields, session {})",
            descriptor.name(),
            identity,
            query.fields.len(),
            session.session_id()
        );
        let rows = session.client.query(&query).await?;

        let mut records = ResultNormalizer::records(descriptor, rows);
        if !spec.joins.is_empty() {
            Self::fold_joins(descriptor, &mut records, &spec.joins, &tables);
        }
        Ok(records)
    }

    /// Resolve requested logical names to remote names.
    ///
    /// `None` selects every defined field in definition order. Unknown names are
    /// dropped with a warning; an explicit selection that leaves nothing is an error.
    pub fn project(
        descriptor: &CollectionDescriptor,
        select: Option<&[String]>,
    ) -> Result<Vec<String>, AdapterError> {
        let Some(requested) = select else {
            return Ok(descriptor.remote_fields());
        };

        let mut fields: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            match descriptor.remote_name(name) {
                Some(remote) => {
                    if !fields.iter().any(|f| f == remote) {
                        fields.push(remote.to_string());
                    }
                }
                None => {
                    tracing::warn!("Ignoring unknown field {}.{} in projection", descriptor.name(), name);
                }
            }
        }

        if fields.is_empty() {
            return Err(AdapterError::NoSuchFields {
                collection: descriptor.name().to_string(),
            });
        }
        Ok(fields)
    }

    /// Translate filter, sort and paging into remote names.
    ///
    /// Join parent keys are added to the projection so joined records can be matched.
    pub fn build(
        descriptor: &CollectionDescriptor,
        spec: &QuerySpec,
        mut fields: Vec<String>,
    ) -> Result<RemoteQuery, AdapterError> {
        let rename = |name: &str| Self::to_remote(descriptor, name);

        let filter = match &spec.filter {
            Some(filter) => {
                filter.check_negations()?;
                Some(filter.try_map_fields(&rename).map_err(|field| {
                    AdapterError::ContractAssertion(format!(
                        "Unknown field {}.{} in filter",
                        descriptor.name(),
                        field
                    ))
                })?)
            }
            None => None,
        };

        let sort = spec
            .sort
            .iter()
            .map(|key| {
                rename(&key.field)
                    .map(|field| SortKey {
                        field,
                        direction: key.direction,
                    })
                    .ok_or_else(|| {
                        AdapterError::ContractAssertion(format!(
                            "Unknown field {}.{} in sort",
                            descriptor.name(),
                            key.field
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for join in &spec.joins {
            let remote = rename(&join.parent_key).ok_or_else(|| {
                AdapterError::ContractAssertion(format!(
                    "Join {} uses unknown parent key {}.{}",
                    join.alias,
                    descriptor.name(),
                    join.parent_key
                ))
            })?;
            if !fields.contains(&remote) {
                fields.push(remote);
            }
        }

        Ok(RemoteQuery {
            collection: descriptor.name().to_string(),
            fields,
            filter,
            sort,
            limit: spec.limit,
            skip: spec.skip,
        })
    }

    /// Logical names win; remote names already in the definition pass through.
    fn to_remote(descriptor: &CollectionDescriptor, name: &str) -> Option<String> {
        descriptor
            .remote_name(name)
            .or_else(|| descriptor.is_remote_field(name).then_some(name))
            .map(str::to_string)
    }

    /// Attach the related record (or null) under each join alias.
    ///
    /// Records are already deserialized here, so parent keys given by their
    /// remote name are looked up under the logical one.
    fn fold_joins(
        descriptor: &CollectionDescriptor,
        records: &mut [Record],
        joins: &[JoinSpec],
        tables: &JoinTables,
    ) {
        let parent_keys: Vec<&str> = joins
            .iter()
            .map(|join| descriptor.logical_key(&join.parent_key).unwrap_or(join.parent_key.as_str()))
            .collect();

        for record in records.iter_mut() {
            for (join, parent_key) in joins.iter().zip(&parent_keys) {
                let related = record
                    .get(*parent_key)
                    .and_then(join_key)
                    .and_then(|key| tables.get(&join.alias).and_then(|table| table.get(&key)))
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                record.insert(join.alias.clone(), related);
            }
        }
    }
}
