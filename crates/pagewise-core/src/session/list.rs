//! Consumer-facing record list.
//!
//! One `RecordList` per consumer. It owns the live query session, the
//! baseline cache and the cancellation coordinator, and publishes every
//! state change through a `watch` channel. All methods take `&self`; state
//! sits behind `RefCell` and no borrow is held across a store round-trip.

use crate::{
    cache::{Baseline, TtlCache},
    config::AccessConfig,
    error::AccessError,
    obs::{GlobalMetricsSink, MetricsEvent, MetricsSink, OverlayKind, PageKind},
    query::{Caller, FilterSpec, ListSchema, RoleScopeResolver, SearchCriteria, eval},
    record::{ID_FIELD, Record, RecordId, RecordPatch},
    session::{
        CancelToken, CancellationCoordinator,
        engine::{FirstPage, QueryEngine},
        overlay,
        state::{ListSnapshot, ListStats, PageSource, QuerySession, SessionStatus},
    },
    store::{Page, RecordStore},
};
use serde_json::{Map, Value as JsonValue};
use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    rc::Rc,
    sync::Arc,
};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info};

///
/// SearchOutcome
///

#[derive(Clone, Debug)]
pub enum SearchOutcome {
    /// The result became the published state.
    Published(ListSnapshot),
    /// A newer query took over before this one finished; nothing was
    /// published.
    Superseded,
    /// Nothing to do: no more pages, a fetch already in flight, or no
    /// session yet.
    Unchanged,
}

impl SearchOutcome {
    #[must_use]
    pub const fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&ListSnapshot> {
        match self {
            Self::Published(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

///
/// ListState
///

#[derive(Debug)]
struct ListState {
    session: Option<QuerySession>,
    last_filter: Option<FilterSpec>,
    cache: TtlCache,
}

///
/// RecordList
///

pub struct RecordList<S> {
    engine: QueryEngine<S>,
    caller: Caller,
    resolver: RoleScopeResolver,
    coordinator: CancellationCoordinator,
    state: RefCell<ListState>,
    publisher: watch::Sender<ListSnapshot>,
    disposed: Cell<bool>,
}

impl<S: RecordStore> RecordList<S> {
    pub fn new(
        store: S,
        schema: ListSchema,
        caller: Caller,
        config: &AccessConfig,
    ) -> Result<Self, AccessError> {
        Self::with_sink(store, schema, caller, config, Rc::new(GlobalMetricsSink))
    }

    /// Build a list reporting to `sink`.
    ///
    /// The config is checked here, so a page size the store would reject
    /// never reaches it.
    pub fn with_sink(
        store: S,
        schema: ListSchema,
        caller: Caller,
        config: &AccessConfig,
        sink: Rc<dyn MetricsSink>,
    ) -> Result<Self, AccessError> {
        config.validate()?;
        let resolver = RoleScopeResolver::new(schema.owner_field());
        let (publisher, _) = watch::channel(ListSnapshot::default());

        Ok(Self {
            engine: QueryEngine::new(store, schema, config.page_size, sink),
            caller,
            resolver,
            coordinator: CancellationCoordinator::new(),
            state: RefCell::new(ListState {
                session: None,
                last_filter: None,
                cache: TtlCache::new(config.cache_ttl()),
            }),
            publisher,
            disposed: Cell::new(false),
        })
    }

    pub const fn store(&self) -> &S {
        self.engine.store()
    }

    pub const fn schema(&self) -> &ListSchema {
        self.engine.schema()
    }

    pub const fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Owned receiver of every published snapshot. Dropping it unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.publisher.subscribe()
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> ListSnapshot {
        self.publisher.borrow().clone()
    }

    /// Aggregates over the currently published records.
    pub fn stats(&self) -> ListStats {
        ListStats::from_records(&self.publisher.borrow().records, self.schema())
    }

    /// Start a new search, superseding whatever is in flight.
    ///
    /// Invalid criteria and denied scopes fail here, before any store call,
    /// and leave the current session untouched.
    pub async fn start_search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, AccessError> {
        self.ensure_attached()?;
        let filter = FilterSpec::from_criteria(self.schema(), criteria)?;
        let filter = self.resolver.scope(&filter, &self.caller)?;

        self.start_first_page(filter, PageKind::First).await
    }

    /// Re-run the last search against the store, discarding the cache.
    pub async fn refresh(&self) -> Result<SearchOutcome, AccessError> {
        self.ensure_attached()?;
        let filter = {
            let mut state = self.state.borrow_mut();
            state.cache.invalidate();
            state.last_filter.clone()
        };
        let filter = match filter {
            Some(filter) => filter,
            None => self
                .resolver
                .scope(&FilterSpec::unfiltered(self.schema()), &self.caller)?,
        };

        self.start_first_page(filter, PageKind::First).await
    }

    /// Exact-match lookup on one indexed field, always served by the store.
    pub async fn lookup(&self, field: &str, raw: &str) -> Result<SearchOutcome, AccessError> {
        self.ensure_attached()?;
        let criteria = SearchCriteria::new().eq(field, raw);
        if criteria.is_empty() {
            return Err(AccessError::criteria_invalid(format!(
                "enter a value to look up by '{field}'"
            )));
        }
        let filter = FilterSpec::from_criteria(self.schema(), &criteria)?;
        let filter = self.resolver.scope(&filter, &self.caller)?;

        self.start_first_page(filter, PageKind::Lookup).await
    }

    /// Fetch and append the next page of the current session.
    pub async fn load_more(&self) -> Result<SearchOutcome, AccessError> {
        self.ensure_attached()?;

        let (token, query, fingerprint, source, baseline_request) = {
            let mut state = self.state.borrow_mut();
            let Some(session) = state.session.as_mut() else {
                return Ok(SearchOutcome::Unchanged);
            };
            if !session.has_more
                || session.next_in_flight
                || session.status == SessionStatus::Loading
            {
                return Ok(SearchOutcome::Unchanged);
            }

            session.next_in_flight = true;
            session.status = SessionStatus::Loading;
            let query = self.engine.next_page_query(
                &session.filter,
                session.source,
                session.last_cursor.clone(),
            );
            let request = (
                session.token.clone(),
                query,
                session.filter.fingerprint(),
                session.source,
                session.source == PageSource::Baseline
                    || self.engine.is_baseline_request(&session.filter),
            );
            self.publish(session.snapshot());

            request
        };

        let after = query.after.clone();
        let result = self.engine.fetch(query, PageKind::Next, fingerprint).await;
        if !self.coordinator.is_current(&token) {
            return Ok(self.superseded(&token));
        }

        let mut state = self.state.borrow_mut();
        let ListState { session, cache, .. } = &mut *state;
        let Some(session) = session.as_mut() else {
            return Ok(SearchOutcome::Superseded);
        };
        session.next_in_flight = false;

        match result {
            Ok(page) => {
                let (records, cursor) = page.into_parts();
                if baseline_request
                    && cache
                        .get_at(Instant::now())
                        .is_some_and(|baseline| baseline.cursor == after)
                {
                    cache.extend(&records, cursor.clone(), Instant::now());
                }

                let fresh = match source {
                    PageSource::Store => eval::apply(&records, &session.filter),
                    PageSource::Baseline => records
                        .into_iter()
                        .filter(|record| eval::matches(record, &session.filter))
                        .collect(),
                };
                // a record moved by a local update can show up again
                let mut seen: HashSet<RecordId> =
                    session.accumulated.iter().map(|r| r.id().clone()).collect();
                let mut next = session.accumulated.to_vec();
                next.extend(fresh.into_iter().filter(|r| seen.insert(r.id().clone())));

                session.replace_records(next);
                session.has_more = cursor.is_some();
                session.last_cursor = cursor;
                session.pages += 1;
                session.status = SessionStatus::Success;
                session.error = None;

                let snapshot = session.snapshot();
                self.publish(snapshot.clone());

                Ok(SearchOutcome::Published(snapshot))
            }
            Err(err) => {
                session.status = SessionStatus::Error;
                session.error = Some(err.clone());
                if err.is_terminal() {
                    session.has_more = false;
                    session.last_cursor = None;
                }
                self.publish(session.snapshot());

                Err(err)
            }
        }
    }

    /// Cancel anything in flight and publish an empty idle state.
    pub fn clear(&self) -> Result<(), AccessError> {
        self.ensure_attached()?;
        self.coordinator.cancel();
        {
            let mut state = self.state.borrow_mut();
            state.session = None;
            state.last_filter = None;
        }
        self.publish(ListSnapshot::default());

        Ok(())
    }

    /// Drop the cached baseline; the next search goes to the store.
    pub fn invalidate_cache(&self) -> Result<(), AccessError> {
        self.ensure_attached()?;
        self.state.borrow_mut().cache.invalidate();

        Ok(())
    }

    /// Detach the consumer. In-flight results are discarded and every later
    /// operation fails with `Detached`.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.coordinator.cancel();
        let mut state = self.state.borrow_mut();
        state.session = None;
        state.cache.invalidate();
        debug!(list = self.schema().name(), "record list disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Reflect a record the store has already created.
    pub fn notify_created(&self, record: Record) -> Result<(), AccessError> {
        self.ensure_attached()?;
        let list = self.schema().name();
        let mut state = self.state.borrow_mut();
        let ListState { session, cache, .. } = &mut *state;

        cache.apply(|baseline| {
            overlay::apply_create(
                &baseline.records,
                record.clone(),
                &self.baseline_filter(baseline),
                !baseline.complete(),
            )
        });
        if let Some(session) = session.as_mut()
            && let Some(next) = overlay::apply_create(
                &session.accumulated,
                record,
                &session.filter,
                session.has_more,
            )
        {
            session.replace_records(next);
            self.publish(session.snapshot());
        }
        self.engine.record_metric(MetricsEvent::Overlay {
            list,
            kind: OverlayKind::Create,
        });

        Ok(())
    }

    /// Reflect an update the store has already applied.
    pub fn notify_updated(&self, id: &RecordId, patch: &RecordPatch) -> Result<(), AccessError> {
        self.ensure_attached()?;
        patch.validate()?;
        let list = self.schema().name();
        let mut state = self.state.borrow_mut();
        let ListState { session, cache, .. } = &mut *state;

        cache.apply(|baseline| {
            overlay::apply_update(
                &baseline.records,
                id,
                patch,
                &self.baseline_filter(baseline),
                !baseline.complete(),
            )
            .ok()
            .flatten()
        });
        if let Some(session) = session.as_mut()
            && let Some(next) = overlay::apply_update(
                &session.accumulated,
                id,
                patch,
                &session.filter,
                session.has_more,
            )?
        {
            session.replace_records(next);
            self.publish(session.snapshot());
        }
        self.engine.record_metric(MetricsEvent::Overlay {
            list,
            kind: OverlayKind::Update,
        });

        Ok(())
    }

    /// Reflect a delete the store has already applied.
    pub fn notify_deleted(&self, id: &RecordId) -> Result<(), AccessError> {
        self.ensure_attached()?;
        let list = self.schema().name();
        let mut state = self.state.borrow_mut();
        let ListState { session, cache, .. } = &mut *state;

        cache.apply(|baseline| overlay::apply_delete(&baseline.records, id));
        if let Some(session) = session.as_mut()
            && let Some(next) = overlay::apply_delete(&session.accumulated, id)
        {
            session.replace_records(next);
            self.publish(session.snapshot());
        }
        self.engine.record_metric(MetricsEvent::Overlay {
            list,
            kind: OverlayKind::Delete,
        });

        Ok(())
    }

    /// Create a record in the store, then show it.
    pub async fn create_record(&self, fields: Map<String, JsonValue>) -> Result<Record, AccessError> {
        self.ensure_attached()?;
        if fields.contains_key(ID_FIELD) {
            return Err(AccessError::criteria_invalid(
                "the store assigns identifiers; remove 'id' from the new record",
            ));
        }
        self.engine.normalizer().patch(&fields)?;

        let doc = self.engine.store().create(fields).await?;
        let record = self.engine.normalizer().record(doc);
        info!(list = self.schema().name(), id = %record.id(), "record created");
        if !self.is_disposed() {
            self.notify_created(record.clone())?;
        }

        Ok(record)
    }

    /// Update a record in the store, then reflect the change.
    pub async fn update_record(
        &self,
        id: &RecordId,
        changes: Map<String, JsonValue>,
    ) -> Result<(), AccessError> {
        self.ensure_attached()?;
        let patch = self.engine.normalizer().patch(&changes)?;
        patch.validate()?;

        self.engine.store().update(id, changes).await?;
        info!(list = self.schema().name(), %id, "record updated");
        if !self.is_disposed() {
            self.notify_updated(id, &patch)?;
        }

        Ok(())
    }

    /// Delete a record in the store, then drop it from the list.
    pub async fn delete_record(&self, id: &RecordId) -> Result<(), AccessError> {
        self.ensure_attached()?;

        self.engine.store().delete(id).await?;
        info!(list = self.schema().name(), %id, "record deleted");
        if !self.is_disposed() {
            self.notify_deleted(id)?;
        }

        Ok(())
    }

    async fn start_first_page(
        &self,
        filter: FilterSpec,
        kind: PageKind,
    ) -> Result<SearchOutcome, AccessError> {
        let token = self.coordinator.new_token();
        let fingerprint = filter.fingerprint();
        let list = self.schema().name();

        let query = {
            let mut state = self.state.borrow_mut();
            state.last_filter = Some(filter.clone());
            let bypass = kind == PageKind::Lookup;
            let plan = self
                .engine
                .plan_first_page(&filter, &state.cache, Instant::now(), bypass);

            match plan {
                FirstPage::Cached(view) => {
                    self.engine.record_metric(MetricsEvent::CacheHit { list });
                    debug!(list, token = token.epoch(), %fingerprint, records = view.records.len(), "served from cache");

                    let mut session = QuerySession::loading(token, filter);
                    session.has_more = view.has_more();
                    session.last_cursor = view.cursor;
                    session.truncated = view.truncated;
                    session.from_cache = true;
                    session.source = PageSource::Baseline;
                    session.pages = 1;
                    session.status = SessionStatus::Success;
                    session.replace_records(view.records);

                    let snapshot = session.snapshot();
                    state.session = Some(session);
                    self.publish(snapshot.clone());

                    return Ok(SearchOutcome::Published(snapshot));
                }
                FirstPage::Fetch(query) => {
                    if state.cache.is_enabled() && !bypass {
                        self.engine.record_metric(MetricsEvent::CacheMiss { list });
                    }
                    let mut session = QuerySession::loading(token.clone(), filter.clone());
                    if let Some(previous) = state.session.as_ref().filter(|p| p.filter == filter) {
                        session.retain_from(previous);
                    }
                    self.publish(session.snapshot());
                    state.session = Some(session);

                    query
                }
            }
        };

        let result = self.engine.fetch(query, kind, fingerprint).await;
        if !self.coordinator.is_current(&token) {
            return Ok(self.superseded(&token));
        }

        let mut state = self.state.borrow_mut();
        let ListState { session, cache, .. } = &mut *state;
        let Some(session) = session.as_mut() else {
            return Ok(SearchOutcome::Superseded);
        };

        match result {
            Ok(page) => {
                // lookups bypass the cache both ways
                let seeds = kind != PageKind::Lookup && cache.is_enabled();
                if seeds && self.engine.is_baseline_request(&filter) {
                    self.seed_cache(cache, &page, &filter);
                }
                let (records, cursor) = page.into_parts();

                session.replace_records(eval::apply(&records, &filter));
                session.has_more = cursor.is_some();
                session.last_cursor = cursor;
                session.pages = 1;
                session.status = SessionStatus::Success;

                let snapshot = session.snapshot();
                self.publish(snapshot.clone());

                Ok(SearchOutcome::Published(snapshot))
            }
            Err(err) => {
                session.status = SessionStatus::Error;
                session.error = Some(err.clone());
                session.has_more = false;
                self.publish(session.snapshot());

                Err(err)
            }
        }
    }

    fn seed_cache(&self, cache: &mut TtlCache, page: &Page, filter: &FilterSpec) {
        let records = page.records().to_vec();
        let count = u64::try_from(records.len()).unwrap_or(u64::MAX);
        cache.put(Baseline {
            records: Arc::new(records),
            cursor: page.cursor().cloned(),
            sort: filter.sort().clone(),
            owner_scope: filter.owner_scope().cloned(),
        });
        self.engine.record_metric(MetricsEvent::CacheSeed {
            list: self.schema().name(),
            records: count,
        });
    }

    // The filter a cached baseline answers: everything in its scope, in
    // baseline order.
    fn baseline_filter(&self, baseline: &Baseline) -> FilterSpec {
        let unfiltered = FilterSpec::unfiltered(self.schema());
        match &baseline.owner_scope {
            Some(owner) => unfiltered.scoped_to(self.schema().owner_field(), owner),
            None => unfiltered,
        }
    }

    fn superseded(&self, token: &CancelToken) -> SearchOutcome {
        let list = self.schema().name();
        debug!(list, token = token.epoch(), "stale result discarded");
        self.engine.record_metric(MetricsEvent::Superseded { list });

        SearchOutcome::Superseded
    }

    fn publish(&self, snapshot: ListSnapshot) {
        self.publisher.send_replace(snapshot);
    }

    fn ensure_attached(&self) -> Result<(), AccessError> {
        if self.disposed.get() {
            return Err(AccessError::detached());
        }

        Ok(())
    }
}
