use crate::config::{AppConfig, ExpiryRule, Target, TargetKind};
use crate::expiry::calculate_expiry_timestamp;
use crate::miniflux::{Category, EntriesRequest, Feed, ReaderApi};
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Find expired entries but leave them unread
    pub dry_run: bool,
}

/// What happened to one configured rule
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule: ExpiryRule,
    /// Unix timestamp used as `before`
    pub cutoff: Option<i64>,
    pub matched: usize,
    pub marked: usize,
    pub error: Option<String>,
}

impl RuleOutcome {
    fn new(rule: ExpiryRule) -> Self {
        Self {
            rule,
            cutoff: None,
            matched: 0,
            marked: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub dry_run: bool,
    pub outcomes: Vec<RuleOutcome>,
}

impl SweepReport {
    pub fn total_matched(&self) -> usize {
        self.outcomes.iter().map(|o| o.matched).sum()
    }

    pub fn total_marked(&self) -> usize {
        self.outcomes.iter().map(|o| o.marked).sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// Build the entries query for one category or feed
pub fn build_entries_request(
    base_url: &str,
    kind: TargetKind,
    target: &str,
    before: &str,
) -> Result<EntriesRequest> {
    EntriesRequest::new(base_url, kind, target, before)
}

/// Title -> id lookups, each list fetched at most once per sweep
#[derive(Default)]
struct TitleIndex {
    categories: Option<Vec<Category>>,
    feeds: Option<Vec<Feed>>,
}

impl TitleIndex {
    /// Path segment for a target. Titles without a server-side match are
    /// passed through unchanged and encoded later as a single segment.
    async fn resolve(
        &mut self,
        api: &dyn ReaderApi,
        kind: TargetKind,
        target: &Target,
    ) -> Result<String> {
        let title = match target {
            Target::Id(id) => return Ok(id.to_string()),
            Target::Title(title) => title,
        };
        let wanted = title.to_lowercase();

        let found = match kind {
            TargetKind::Category => {
                if self.categories.is_none() {
                    self.categories = Some(api.list_categories().await?);
                }
                self.categories
                    .iter()
                    .flatten()
                    .find(|c| c.title.to_lowercase() == wanted)
                    .map(|c| c.id)
            }
            TargetKind::Feed => {
                if self.feeds.is_none() {
                    self.feeds = Some(api.list_feeds().await?);
                }
                self.feeds
                    .iter()
                    .flatten()
                    .find(|f| f.title.to_lowercase() == wanted)
                    .map(|f| f.id)
            }
        };

        match found {
            Some(id) => {
                tracing::debug!("Resolved {} '{}' to id {}", kind.label(), title, id);
                Ok(id.to_string())
            }
            None => {
                tracing::warn!(
                    "No {} titled '{}' on the server, using it verbatim",
                    kind.label(),
                    title
                );
                Ok(title.clone())
            }
        }
    }
}

/// Find unread entries older than each rule's expiry and mark them read
pub async fn find_and_mark_expired_entries(
    api: &dyn ReaderApi,
    config: &AppConfig,
    options: SweepOptions,
) -> Result<SweepReport> {
    let rules = config.rules()?;

    tracing::debug!("Starting to find and mark expired entries");

    let mut index = TitleIndex::default();
    let mut report = SweepReport {
        dry_run: options.dry_run,
        outcomes: Vec::with_capacity(rules.len()),
    };

    for rule in rules {
        let mut outcome = RuleOutcome::new(rule.clone());

        if let Err(e) = sweep_rule(api, config, &mut index, &rule, options, &mut outcome).await {
            tracing::error!("Failed to expire entries for {}: {}", rule, e);
            outcome.error = Some(e.to_string());
        }

        report.outcomes.push(outcome);
    }

    Ok(report)
}

async fn sweep_rule(
    api: &dyn ReaderApi,
    config: &AppConfig,
    index: &mut TitleIndex,
    rule: &ExpiryRule,
    options: SweepOptions,
    outcome: &mut RuleOutcome,
) -> Result<()> {
    tracing::debug!("Get {} entries: {}, {}", rule.kind.label(), rule.target, rule.expiry);

    let before = calculate_expiry_timestamp(&rule.expiry)?;
    outcome.cutoff = before.parse().ok();

    let segment = index.resolve(api, rule.kind, &rule.target).await?;
    let request = build_entries_request(config.base_url(), rule.kind, &segment, &before)?;

    let entry_ids = collect_entry_ids(api, &request, config.http.page_size).await?;
    outcome.matched = entry_ids.len();

    if options.dry_run {
        tracing::info!("{}: {} expired entries (dry run, not marked)", rule, entry_ids.len());
        return Ok(());
    }

    for batch in entry_ids.chunks(config.http.mark_batch_size) {
        api.mark_entries_read(batch).await?;
        outcome.marked += batch.len();
    }

    tracing::info!("{}: marked {} expired entries as read", rule, outcome.marked);

    Ok(())
}

/// Page through every entry matching `request`. The server may return
/// fewer than `page_size` entries per page, so only `total` ends the scan.
async fn collect_entry_ids(
    api: &dyn ReaderApi,
    request: &EntriesRequest,
    page_size: u32,
) -> Result<Vec<i64>> {
    let mut ids = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let page = api.entries(request, page_size, offset).await?;
        let count = page.entries.len();

        ids.extend(page.entries.iter().map(|entry| entry.id));
        offset += count as u64;

        if count == 0 || offset >= page.total {
            break;
        }
    }

    Ok(ids)
}
