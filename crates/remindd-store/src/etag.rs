use sha2::{Digest, Sha256};

use crate::types::ListQuery;

/// Derive a strong ETag for a listing response from the store version and
/// the full set of query parameters. Any mutation bumps the version, so a
/// matching tag guarantees an identical page. The limit is hashed in its
/// clamped form, the one the page fetch actually uses.
pub fn list_etag(version: u64, query: &ListQuery) -> String {
    let raw = format!(
        "v={}|c={}|l={}|q={}|s={}|o={}",
        version,
        query.cursor.as_deref().unwrap_or(""),
        query.effective_limit(),
        query.search,
        query.sort_by.map(|s| s.as_str()).unwrap_or(""),
        query.order.as_str(),
    );
    let sum = Sha256::digest(raw.as_bytes());
    format!("\"r{}\"", hex::encode(&sum[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, SortBy};

    #[test]
    fn same_inputs_same_tag() {
        let q = ListQuery::default();
        assert_eq!(list_etag(7, &q), list_etag(7, &q));
    }

    #[test]
    fn version_changes_tag() {
        let q = ListQuery::default();
        assert_ne!(list_etag(1, &q), list_etag(2, &q));
    }

    #[test]
    fn equivalent_limits_share_a_tag() {
        let base = ListQuery::default();
        // 0 clamps to the default of 50; anything above the cap clamps to 100.
        let explicit_default = ListQuery {
            limit: 50,
            ..base.clone()
        };
        assert_eq!(list_etag(3, &base), list_etag(3, &explicit_default));

        let at_cap = ListQuery {
            limit: 100,
            ..base.clone()
        };
        let over_cap = ListQuery {
            limit: 100_000,
            ..base.clone()
        };
        assert_eq!(list_etag(3, &at_cap), list_etag(3, &over_cap));
        assert_ne!(list_etag(3, &base), list_etag(3, &at_cap));
    }

    #[test]
    fn every_parameter_participates() {
        let base = ListQuery::default();
        let variants = [
            ListQuery {
                cursor: Some("x".into()),
                ..base.clone()
            },
            ListQuery {
                limit: 10,
                ..base.clone()
            },
            ListQuery {
                search: "coffee".into(),
                ..base.clone()
            },
            ListQuery {
                sort_by: Some(SortBy::Message),
                ..base.clone()
            },
            ListQuery {
                order: Order::Desc,
                ..base.clone()
            },
        ];
        let tag = list_etag(3, &base);
        for v in &variants {
            assert_ne!(tag, list_etag(3, v));
        }
    }
}
