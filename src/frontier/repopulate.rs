use super::filter::{filter_links, FilterContext};
use super::queue::FRONT_PRIORITY;
use super::state::CrawlState;
use crate::capabilities::Capabilities;
use crate::events::{ActivityLog, Component};

/// Ways of refilling an empty frontier, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillStrategy {
    /// Re-run link extraction over every stored capture of the source
    ArchivedCaptures,
    /// Queue the source's start URL again
    StartUrl,
}

pub const REFILL_ORDER: [RefillStrategy; 2] =
    [RefillStrategy::ArchivedCaptures, RefillStrategy::StartUrl];

impl RefillStrategy {
    async fn apply(
        self,
        caps: &Capabilities,
        log: &ActivityLog,
        state: &mut CrawlState,
        link_priority: u32,
    ) -> usize {
        match self {
            Self::ArchivedCaptures => {
                let captures = match caps.store.list_captures(state.source_id).await {
                    Ok(captures) => captures,
                    Err(e) => {
                        log.warn(Component::Frontier, format!("Cannot list captures: {}", e));
                        return 0;
                    }
                };

                let mut added = 0;
                for capture in &captures {
                    let candidates: Vec<String> = caps
                        .links
                        .extract_links(capture.best_html(), &capture.url)
                        .iter()
                        .map(|link| caps.links.normalize(link))
                        .collect();
                    let survivors = filter_links(
                        &candidates,
                        &FilterContext {
                            source_domain: &state.source_domain,
                            url_seen: &state.url_seen,
                            frontier: &state.frontier,
                            current_depth: 0,
                            max_depth: state.limits.max_depth,
                        },
                    );
                    for url in survivors {
                        if state.push(&url, 1, link_priority) {
                            added += 1;
                        }
                    }
                }
                added
            }
            Self::StartUrl => {
                let start = state.start_url.clone();
                state.forget(&start);
                usize::from(state.push(&start, 0, FRONT_PRIORITY))
            }
        }
    }
}

/// Refills an empty frontier; the first strategy that adds anything wins
///
/// The start-URL strategy always adds its entry, so the frontier is never
/// left empty by this call.
pub async fn repopulate(
    caps: &Capabilities,
    log: &ActivityLog,
    state: &mut CrawlState,
    link_priority: u32,
) -> usize {
    state.refills += 1;

    for strategy in REFILL_ORDER {
        let added = strategy.apply(caps, log, state, link_priority).await;
        if added > 0 {
            log.info(
                Component::Frontier,
                format!(
                    "Repopulated frontier with {} entries via {:?} (refill {}/{})",
                    added, strategy, state.refills, state.limits.max_refills
                ),
            );
            return added;
        }
        log.debug(Component::Frontier, format!("{:?} yielded nothing", strategy));
    }

    0
}
