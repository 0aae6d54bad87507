//! Gateway ordering.
//!
//! Pure: decides which URLs to try and in what order, never touches the
//! network.
//!
//! | Request                      | Order                                 |
//! |------------------------------|---------------------------------------|
//! | record, `pinned_local`       | local (if configured), primary, fallbacks |
//! | record, any other status     | primary, fallbacks                    |
//! | direct CID, no record        | primary, fallbacks                    |
//!
//! `migrating` records use the public list: the worker may already have
//! released the local pin by the time the fetch happens.

use snapie_core::ContentId;
use snapie_state::IpfsStatus;
use url::Url;

use crate::config::GatewayConfig;

/// Candidate content URLs for `cid`, in the order they should be tried.
///
/// `ipfs_status` is `None` for direct-CID requests that have no record.
pub fn resolve_gateways(
    config: &GatewayConfig,
    cid: &ContentId,
    ipfs_status: Option<IpfsStatus>,
) -> Vec<Url> {
    let local = match (ipfs_status, config.local_gateway.as_ref()) {
        (Some(IpfsStatus::PinnedLocal), Some(local)) => Some(local),
        _ => None,
    };

    local
        .into_iter()
        .chain(config.public_gateways())
        .filter_map(|base| content_url(base, cid))
        .collect()
}

/// `{base}/ipfs/{cid}`, keeping any path prefix on the base.
pub fn content_url(base: &Url, cid: &ContentId) -> Option<Url> {
    let mut url = base.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push("ipfs").push(cid.as_str());
        }
        Err(()) => {
            tracing::warn!(gateway = %base, "gateway URL cannot carry a path, skipping");
            return None;
        }
    }
    Some(url)
}
