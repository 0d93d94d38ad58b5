//! Paginated query engine.
//!
//! Decides how a filter is served (derived from the cached baseline, or
//! fetched page by page from the store) and performs the store round-trips.
//! Session bookkeeping and publishing live in `session::list`.

use crate::{
    cache::{Baseline, TtlCache},
    error::AccessError,
    obs::{MetricsEvent, MetricsSink, PageKind},
    query::{CompareOp, ComparePredicate, FilterFingerprint, FilterSpec, ListSchema, eval},
    record::{Normalizer, Record, RecordId},
    session::state::PageSource,
    store::{Cursor, Page, RecordStore, StoreQuery},
};
use std::rc::Rc;
use tokio::time::Instant;
use tracing::{debug, warn};

///
/// CachedView
///
/// A filter answered from the baseline without a round-trip.
///

#[derive(Clone, Debug)]
pub(crate) struct CachedView {
    pub(crate) records: Vec<Record>,
    pub(crate) cursor: Option<Cursor>,
    pub(crate) truncated: bool,
}

impl CachedView {
    pub(crate) const fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

///
/// FirstPage
///

#[derive(Clone, Debug)]
pub(crate) enum FirstPage {
    Cached(CachedView),
    Fetch(StoreQuery),
}

///
/// QueryEngine
///

pub struct QueryEngine<S> {
    store: S,
    schema: ListSchema,
    normalizer: Normalizer,
    page_size: u32,
    sink: Rc<dyn MetricsSink>,
}

impl<S: RecordStore> QueryEngine<S> {
    pub fn new(store: S, schema: ListSchema, page_size: u32, sink: Rc<dyn MetricsSink>) -> Self {
        Self {
            normalizer: schema.normalizer(),
            store,
            schema,
            page_size,
            sink,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn schema(&self) -> &ListSchema {
        &self.schema
    }

    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn record_metric(&self, event: MetricsEvent<'_>) {
        self.sink.record(event);
    }

    /// First-page request: the store-indexable subset of `filter`.
    pub fn first_page_query(&self, filter: &FilterSpec) -> StoreQuery {
        StoreQuery::new(
            filter.store_predicates().to_vec(),
            filter.sort().clone(),
            self.page_size,
        )
    }

    /// Unfiltered request in baseline order, within `owner_scope`.
    pub fn baseline_query(&self, owner_scope: Option<&RecordId>) -> StoreQuery {
        let predicates = owner_scope
            .map(|owner| {
                vec![ComparePredicate::new(
                    self.schema.owner_field(),
                    CompareOp::Eq,
                    owner.as_str(),
                )]
            })
            .unwrap_or_default();

        StoreQuery::new(predicates, self.schema.default_sort().clone(), self.page_size)
    }

    pub(crate) fn next_page_query(
        &self,
        filter: &FilterSpec,
        source: PageSource,
        cursor: Option<Cursor>,
    ) -> StoreQuery {
        match source {
            PageSource::Store => self.first_page_query(filter),
            PageSource::Baseline => self.baseline_query(filter.owner_scope()),
        }
        .after(cursor)
    }

    /// Whether the store request for `filter` is the baseline request, so its
    /// unfiltered pages may seed or extend the cache.
    pub fn is_baseline_request(&self, filter: &FilterSpec) -> bool {
        filter
            .unscoped_store_predicates(self.schema.owner_field())
            .next()
            .is_none()
            && filter.sort() == self.schema.default_sort()
    }

    /// Whether `baseline` holds every record `filter` could match so far.
    ///
    /// A complete baseline covers any filter within its scope. A partial one
    /// covers only filters that add nothing but client predicates or a
    /// different order on top of the same scope.
    pub fn covers(&self, baseline: &Baseline, filter: &FilterSpec) -> bool {
        let same_scope = baseline.owner_scope.as_ref() == filter.owner_scope();
        let wider_complete = baseline.owner_scope.is_none() && baseline.complete();
        if !same_scope && !wider_complete {
            return false;
        }

        baseline.complete()
            || filter
                .unscoped_store_predicates(self.schema.owner_field())
                .next()
                .is_none()
    }

    /// Choose how to serve the first page of `filter`.
    pub(crate) fn plan_first_page(
        &self,
        filter: &FilterSpec,
        cache: &TtlCache,
        now: Instant,
        bypass_cache: bool,
    ) -> FirstPage {
        let baseline = if bypass_cache { None } else { cache.get_at(now) };

        match baseline {
            Some(baseline) if self.covers(baseline, filter) => {
                let records = eval::apply_all(&baseline.records, filter);
                let resumable = !baseline.complete() && filter.sort() == &baseline.sort;

                FirstPage::Cached(CachedView {
                    records,
                    cursor: if resumable {
                        baseline.cursor.clone()
                    } else {
                        None
                    },
                    truncated: !baseline.complete() && !resumable,
                })
            }
            _ => FirstPage::Fetch(self.first_page_query(filter)),
        }
    }

    /// One store round-trip, normalized. Errors come back classified.
    pub(crate) async fn fetch(
        &self,
        query: StoreQuery,
        kind: PageKind,
        fingerprint: FilterFingerprint,
    ) -> Result<Page, AccessError> {
        let list = self.schema.name();
        debug!(
            list,
            %fingerprint,
            ?kind,
            limit = query.limit,
            resumed = query.after.is_some(),
            "store page requested"
        );

        match self.store.query(query).await {
            Ok(raw) => {
                let page = Page::from_raw(raw, &self.normalizer);
                let records = u64::try_from(page.records().len()).unwrap_or(u64::MAX);
                self.sink.record(MetricsEvent::StorePage {
                    list,
                    kind,
                    records,
                });
                debug!(list, %fingerprint, records, exhausted = page.exhausted(), "store page received");

                Ok(page)
            }
            Err(err) => {
                let err = AccessError::from_store(err);
                self.sink.record(MetricsEvent::StoreError {
                    list,
                    kind: err.kind,
                });
                warn!(list, %fingerprint, error = %err.display_with_class(), "store request failed");

                Err(err)
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        obs::GlobalMetricsSink,
        query::{Caller, Role, RoleScopeResolver, SearchCriteria, SortDirection, SortSpec},
        store::MemoryStore,
        test_support::{order, work_orders},
    };
    use std::{sync::Arc, time::Duration};

    fn engine() -> QueryEngine<MemoryStore> {
        QueryEngine::new(
            MemoryStore::new(work_orders()),
            work_orders(),
            25,
            Rc::new(GlobalMetricsSink),
        )
    }

    fn filter(criteria: &SearchCriteria) -> FilterSpec {
        FilterSpec::from_criteria(&work_orders(), criteria).expect("criteria should normalize")
    }

    fn baseline(complete: bool, owner: Option<&str>) -> Baseline {
        Baseline {
            records: Arc::new(vec![
                order("c", "u-1", "open", 30).with_field("client", "Alpha"),
                order("b", "u-2", "closed", 20),
                order("a", "u-1", "open", 10).with_field("client", "alphabet"),
            ]),
            cursor: (!complete).then(|| Cursor::new("more")),
            sort: work_orders().default_sort().clone(),
            owner_scope: owner.map(RecordId::from),
        }
    }

    fn warm(baseline: Baseline) -> (TtlCache, Instant) {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let now = Instant::now();
        cache.put_at(baseline, now);
        (cache, now)
    }

    #[test]
    fn text_only_filters_are_served_from_a_partial_baseline() {
        let engine = engine();
        let (cache, now) = warm(baseline(false, None));

        let plan = engine.plan_first_page(&filter(&SearchCriteria::new().text("alpha")), &cache, now, false);

        let FirstPage::Cached(view) = plan else {
            panic!("expected a cached view");
        };
        assert_eq!(view.records.len(), 2);
        assert!(view.has_more(), "same order resumes the baseline cursor");
        assert!(!view.truncated);
    }

    #[test]
    fn store_predicates_need_a_complete_baseline() {
        let engine = engine();
        let status_open = filter(&SearchCriteria::new().eq("status", "open"));

        let (partial, now) = warm(baseline(false, None));
        assert!(matches!(
            engine.plan_first_page(&status_open, &partial, now, false),
            FirstPage::Fetch(_)
        ));

        let (complete, now) = warm(baseline(true, None));
        let FirstPage::Cached(view) = engine.plan_first_page(&status_open, &complete, now, false) else {
            panic!("expected a cached view");
        };
        assert_eq!(view.records.len(), 2);
        assert!(!view.has_more());
    }

    #[test]
    fn reordering_a_partial_baseline_is_truncated() {
        let engine = engine();
        let (cache, now) = warm(baseline(false, None));
        let by_number = filter(&SearchCriteria::new().sort_by("number", SortDirection::Asc));

        let FirstPage::Cached(view) = engine.plan_first_page(&by_number, &cache, now, false) else {
            panic!("expected a cached view");
        };

        assert!(view.truncated);
        assert!(!view.has_more());
        assert_eq!(view.records[0].id().as_str(), "a");
    }

    #[test]
    fn baselines_never_cross_scopes() {
        let engine = engine();
        let schema = work_orders();
        let scoped = RoleScopeResolver::new(schema.owner_field())
            .scope(&FilterSpec::unfiltered(&schema), &Caller::new("u-1", Role::Technician))
            .expect("scope should succeed");

        let (other, now) = warm(baseline(false, Some("u-2")));
        assert!(matches!(
            engine.plan_first_page(&scoped, &other, now, false),
            FirstPage::Fetch(_)
        ));

        let (wide, now) = warm(baseline(true, None));
        let FirstPage::Cached(view) = engine.plan_first_page(&scoped, &wide, now, false) else {
            panic!("expected a cached view");
        };
        assert!(view.records.iter().all(|r| r.value("owner") == "u-1".into()));
    }

    #[test]
    fn bypass_ignores_a_warm_cache() {
        let engine = engine();
        let (cache, now) = warm(baseline(true, None));

        let plan = engine.plan_first_page(&FilterSpec::unfiltered(&work_orders()), &cache, now, true);

        assert!(matches!(plan, FirstPage::Fetch(_)));
    }

    #[test]
    fn baseline_requests_are_scope_only_in_default_order() {
        let engine = engine();

        assert!(engine.is_baseline_request(&filter(&SearchCriteria::new().text("x"))));
        assert!(engine.is_baseline_request(&filter(&SearchCriteria::new().owner("u-1"))));
        assert!(!engine.is_baseline_request(&filter(&SearchCriteria::new().eq("status", "open"))));
        assert!(!engine.is_baseline_request(
            &filter(&SearchCriteria::new().sort_by("number", SortDirection::Asc))
        ));
    }

    #[test]
    fn baseline_continuation_uses_the_baseline_query() {
        let engine = engine();
        let spec = filter(&SearchCriteria::new().text("x").owner("u-1"));

        let query = engine.next_page_query(&spec, PageSource::Baseline, Some(Cursor::new("k")));

        assert_eq!(query.predicates.len(), 1);
        assert_eq!(query.sort, SortSpec::new("created_at", SortDirection::Desc));
        assert_eq!(query.after, Some(Cursor::new("k")));
    }
}
