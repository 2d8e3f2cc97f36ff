//! Property tests: both URL normalisations are idempotent over arbitrary
//! well-formed HTTP URLs.

use boardwatch::{canonical_job_url, normalize_listing_identity};
use proptest::prelude::*;

fn arb_query_key() -> impl Strategy<Value = String> {
    prop_oneof![
        // Volatile keys the canonicaliser strips.
        Just("page".to_string()),
        Just("utm_source".to_string()),
        Just("gh_src".to_string()),
        Just("start".to_string()),
        // Meaningful keys that must survive.
        "[a-z]{1,8}",
    ]
}

fn arb_url() -> impl Strategy<Value = String> {
    (
        "[a-z]{1,10}\\.[a-z]{2,5}",
        proptest::collection::vec("[a-zA-Z0-9 _-]{0,12}", 0..4),
        proptest::collection::vec((arb_query_key(), "[a-zA-Z0-9 %+-]{0,10}"), 0..5),
    )
        .prop_map(|(host, segments, params)| {
            let mut url = format!("https://{host}");
            for seg in &segments {
                url.push('/');
                url.push_str(&urlencoding::encode(seg));
            }
            if !params.is_empty() {
                url.push('?');
                let q: Vec<String> = params
                    .iter()
                    .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                    .collect();
                url.push_str(&q.join("&"));
            }
            url
        })
}

proptest! {
    #[test]
    fn canonical_job_url_is_idempotent(url in arb_url()) {
        let once = canonical_job_url(&url);
        prop_assert_eq!(canonical_job_url(&once), once);
    }

    #[test]
    fn listing_identity_is_idempotent(url in arb_url()) {
        let once = normalize_listing_identity(&url);
        prop_assert_eq!(normalize_listing_identity(&once), once.clone());
        // And the two compose without oscillating.
        let canonical = canonical_job_url(&once);
        prop_assert_eq!(canonical_job_url(&canonical), canonical);
    }

    #[test]
    fn canonical_never_reintroduces_volatile_params(url in arb_url()) {
        let once = canonical_job_url(&url);
        prop_assert!(!once.contains("utm_source="));
        prop_assert!(!once.contains("gh_src="));
    }
}
